//! Core domain types shared across Tyr crates.
//!
//! Everything here is plain data: the host wire shapes, the verdict
//! lattice, persisted record types, and the time grammar. No IO, no async.

mod request;
mod response;
mod time;
mod verdict;

pub mod record;

pub use request::{PermissionRequest, RequestError, canonical_tool_input};
pub use response::{Behavior, HookResponse};
pub use time::{Retention, TimeGrammarError, parse_duration, parse_time_spec};
pub use verdict::Verdict;

/// Hook event name Tyr answers to. Requests with any other event are
/// rejected at the edge.
pub const HOOK_EVENT_NAME: &str = "PermissionRequest";

/// Tool name whose input carries a shell command string.
pub const BASH_TOOL: &str = "Bash";

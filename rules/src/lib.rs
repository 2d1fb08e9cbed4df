//! Permission rules: loading the host's layered settings files, matching
//! commands against their Bash patterns, and hot-reloading on change.

mod parse;
mod pattern;
mod scopes;
mod store;

pub use pattern::Pattern;
pub use scopes::{scope_paths, user_settings_dir};
pub use store::{RuleMatch, RuleStore, RulesDebugInfo};

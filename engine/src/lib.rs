//! The judge engine: validate the incoming request, consult the provider
//! pipeline, persist the audit trail, and shape the response.

mod fingerprint;
mod ingress;
mod judge;

pub use fingerprint::config_hash;
pub use ingress::{IngressError, parse_request};
pub use judge::{Engine, JudgeOptions};

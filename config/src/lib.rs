//! Tyr's own configuration: the JSONC config file, the env dotfile, and
//! path resolution.
//!
//! Raw deserialization structs (with `Option` fields and legacy key
//! spellings) stay private in this crate. The loader resolves them into
//! [`TyrConfig`] at the parse boundary; the rest of the workspace only
//! sees resolved values.

mod env_file;
mod file;
mod paths;
mod settings;

pub use env_file::{load_env_file, read_env_file, set_env_var};
pub use file::{load_config, set_config_key, show_config};
pub use paths::{config_path, db_path, env_file_path, tyr_dir};
pub use settings::{ConfigError, LlmBackendConfig, LlmProviderKind, ProviderTag, TyrConfig};

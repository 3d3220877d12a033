//! Configuration file discovery and loading
//!
//! Crates describe their own settings as serde types; this module only knows
//! where config files live and how to parse them.

mod loader;

pub use loader::{ConfigFile, find_config_file, load_toml};

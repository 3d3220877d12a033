//! Configuration file loading

use crate::error::{Error, Result, ResultExt};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// A parsed configuration file together with where it came from
#[derive(Debug, Clone)]
pub struct ConfigFile<T> {
    /// Parsed settings
    pub schema: T,
    /// Path the settings were read from, `None` when defaults were used
    pub path: Option<PathBuf>,
}

impl<T: DeserializeOwned + Default> ConfigFile<T> {
    /// Load from an explicit path, or the first candidate found, or defaults
    ///
    /// An explicit path that does not exist is an error; missing candidates
    /// are not.
    pub fn load(explicit: Option<&Path>, candidates: &[&str]) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::config_not_found(path));
            }
            return Ok(Self {
                schema: load_toml(path)?,
                path: Some(path.to_path_buf()),
            });
        }

        match find_config_file(candidates) {
            Some(path) => Ok(Self {
                schema: load_toml(&path)?,
                path: Some(path),
            }),
            None => Ok(Self::defaults()),
        }
    }

    /// Defaults only, no file
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            schema: T::default(),
            path: None,
        }
    }
}

/// Find a configuration file in the working directory, then the home directory
#[must_use]
pub fn find_config_file(candidates: &[&str]) -> Option<PathBuf> {
    let local = candidates.iter().map(PathBuf::from);
    let home = dirs::home_dir()
        .into_iter()
        .flat_map(|home| candidates.iter().map(move |c| home.join(c)));

    local.chain(home).find(|p| p.is_file())
}

/// Load and parse a TOML file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(Error::from)
        .context(format!("Failed to read config file {}", path.display()))?;

    toml::from_str(&content)
        .map_err(Error::from)
        .context(format!("Failed to parse config file {}", path.display()))
}

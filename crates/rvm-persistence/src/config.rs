//! Storage layout configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PersistenceError, Result};

/// Directory created under the host's private storage root.
pub const DEFAULT_ROOT_DIR: &str = ".restorable-viewmodel-states";

/// Prefix of each per-owner directory.
pub const DEFAULT_PROVIDER_PREFIX: &str = ".provider-";

/// Prefix of each per-view-model state file.
pub const DEFAULT_STATE_PREFIX: &str = ".state-";

/// Where state files live relative to the host's private storage root.
///
/// ```text
/// <base>/<root_dir_name>/<provider_prefix><owner type>/<state_prefix><view model type>
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root_dir_name: String,
    pub provider_prefix: String,
    pub state_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir_name: DEFAULT_ROOT_DIR.to_string(),
            provider_prefix: DEFAULT_PROVIDER_PREFIX.to_string(),
            state_prefix: DEFAULT_STATE_PREFIX.to_string(),
        }
    }
}

impl StorageConfig {
    /// Load a configuration from a TOML file.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file
    /// is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No storage config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(PersistenceError::Io {
                    operation: "read",
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };
        Self::from_toml_str(&content).map_err(|reason| PersistenceError::Config {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Root directory holding every owner's state directory.
    pub fn root_dir(&self, base: &Path) -> PathBuf {
        base.join(&self.root_dir_name)
    }

    /// Directory holding the state files of one owner type.
    pub fn owner_dir(&self, base: &Path, owner_type: &str) -> PathBuf {
        self.root_dir(base)
            .join(format!("{}{}", self.provider_prefix, storage_name(owner_type)))
    }

    /// State file of one view model type inside an owner directory.
    pub fn state_file(&self, owner_dir: &Path, view_model_type: &str) -> PathBuf {
        owner_dir.join(format!("{}{}", self.state_prefix, storage_name(view_model_type)))
    }

    /// Recover the type name from an owner directory name, if it has the prefix.
    pub fn owner_from_dir_name<'a>(&self, dir_name: &'a str) -> Option<&'a str> {
        dir_name.strip_prefix(self.provider_prefix.as_str())
    }

    /// Recover the type name from a state file name, if it has the prefix.
    pub fn view_model_from_file_name<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        file_name.strip_prefix(self.state_prefix.as_str())
    }
}

/// Turn a fully-qualified Rust type name into a stable file name component.
///
/// `::` becomes `.`; anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn storage_name(type_name: &str) -> String {
    type_name
        .replace("::", ".")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

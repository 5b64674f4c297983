use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, info_span, warn};

use rvm_persistence::{ByteStore, FileStore, PersistenceError, StorageConfig, decode_envelope};

/// One decoded state file.
#[derive(Debug, Clone)]
pub struct InspectReport {
    pub path: PathBuf,
    pub saved_at: String,
    pub digest: String,
    pub entries: Vec<EntryRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    pub key: String,
    pub type_name: &'static str,
    pub value: String,
}

/// One owner directory under the state root.
#[derive(Debug, Clone)]
pub struct OwnerListing {
    pub owner: String,
    pub dir: PathBuf,
    pub files: Vec<StateFileListing>,
}

#[derive(Debug, Clone)]
pub struct StateFileListing {
    pub view_model: String,
    pub path: PathBuf,
    pub status: FileStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Valid { entries: usize, saved_at: String },
    Invalid { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearOutcome {
    pub dir: PathBuf,
    pub removed: usize,
}

pub fn run_inspect(path: &Path) -> Result<InspectReport> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let decoded = decode_envelope(&bytes).with_context(|| format!("decode {}", path.display()))?;
    debug!(entries = decoded.record.len(), "Decoded {}", path.display());

    let entries = decoded
        .record
        .iter()
        .map(|(key, value)| EntryRow {
            key: key.clone(),
            type_name: value.type_name(),
            value: value.to_string(),
        })
        .collect();

    Ok(InspectReport {
        path: path.to_path_buf(),
        saved_at: decoded.saved_at,
        digest: decoded.digest,
        entries,
    })
}

pub fn run_list(base_dir: &Path, config_path: Option<&Path>) -> Result<Vec<OwnerListing>> {
    let config = load_config(config_path)?;
    let root = config.root_dir(base_dir);
    let span = info_span!("list", root = %root.display());
    let _guard = span.enter();

    if !root.is_dir() {
        info!("No state root found");
        return Ok(Vec::new());
    }

    let mut owners = Vec::new();
    for entry in fs::read_dir(&root).with_context(|| format!("read {}", root.display()))? {
        let entry = entry?;
        let dir = entry.path();
        let Some(owner) = file_name(&dir).and_then(|n| config.owner_from_dir_name(n)) else {
            debug!("Skipping {}", dir.display());
            continue;
        };
        if !dir.is_dir() {
            continue;
        }
        owners.push(OwnerListing {
            owner: owner.to_string(),
            files: list_state_files(&config, &dir)?,
            dir,
        });
    }
    owners.sort_by(|a, b| a.owner.cmp(&b.owner));
    info!(owners = owners.len(), "Listed state directories");
    Ok(owners)
}

fn list_state_files(config: &StorageConfig, dir: &Path) -> Result<Vec<StateFileListing>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() || path.extension().is_some_and(|ext| ext == "tmp") {
            continue;
        }
        let Some(view_model) = file_name(&path).and_then(|n| config.view_model_from_file_name(n))
        else {
            continue;
        };

        let status = match fs::read(&path) {
            Ok(bytes) => match decode_envelope(&bytes) {
                Ok(decoded) => FileStatus::Valid {
                    entries: decoded.record.len(),
                    saved_at: decoded.saved_at,
                },
                Err(e) => {
                    warn!(error = %e, "Unreadable state file {}", path.display());
                    FileStatus::Invalid {
                        reason: invalid_reason(&e),
                    }
                }
            },
            Err(e) => FileStatus::Invalid {
                reason: e.to_string(),
            },
        };
        files.push(StateFileListing {
            view_model: view_model.to_string(),
            path,
            status,
        });
    }
    files.sort_by(|a, b| a.view_model.cmp(&b.view_model));
    Ok(files)
}

pub fn run_clear(
    base_dir: &Path,
    owner: &str,
    config_path: Option<&Path>,
) -> Result<ClearOutcome> {
    let config = load_config(config_path)?;
    let dir = config.owner_dir(base_dir, owner);
    let removed = FileStore::new()
        .clear_dir(&dir)
        .with_context(|| format!("clear {}", dir.display()))?;
    info!(owner, removed, "Cleared saved state");
    Ok(ClearOutcome { dir, removed })
}

/// Load the layout from an explicit TOML file, or use the defaults.
fn load_config(path: Option<&Path>) -> Result<StorageConfig> {
    match path {
        Some(path) if !path.exists() => bail!("config file {} does not exist", path.display()),
        Some(path) => StorageConfig::load(path).context("load storage config"),
        None => Ok(StorageConfig::default()),
    }
}

fn invalid_reason(error: &PersistenceError) -> String {
    match error.suggestion() {
        Some(hint) => format!("{} {hint}", error.user_message()),
        None => error.user_message(),
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(std::ffi::OsStr::to_str)
}

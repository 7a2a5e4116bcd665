//! File-backed state and token stores.
//!
//! Both files live under the configured state directory:
//!
//! - `state.json`: the deployment state document (mode `0644`)
//! - `token.json`: the cluster token (mode `0600`)
//!
//! Writes go to a sibling temp file, are synced, then renamed into place, so
//! readers only ever see a complete document.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::state::STATE_VERSION;
use crate::domain::{ClusterToken, DeploymentState};
use crate::error::{ConfigError, Result};
use crate::port::outbound::store::{StateStore, TokenStore};

pub const STATE_FILE: &str = "state.json";
pub const TOKEN_FILE: &str = "token.json";

const STATE_MODE: u32 = 0o644;
const TOKEN_MODE: u32 = 0o600;

/// Write `bytes` to `path` atomically with the given unix mode.
fn write_atomic(path: &Path, bytes: &[u8], mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    let cleanup_and_err = |e| {
        let _ = fs::remove_file(&temp_path);
        e
    };

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options.open(&temp_path)?;
    file.write_all(bytes).map_err(cleanup_and_err)?;
    file.sync_all().map_err(cleanup_and_err)?;
    fs::rename(&temp_path, path).map_err(cleanup_and_err)?;
    Ok(())
}

/// Read `path`, `None` when it does not exist.
fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Deployment state stored as pretty JSON.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<DeploymentState> {
        let Some(contents) = read_optional(&self.path)? else {
            return Ok(DeploymentState::empty());
        };
        let state: DeploymentState = serde_json::from_str(&contents)?;
        if state.version > STATE_VERSION {
            return Err(ConfigError::InvalidValue {
                field: "state",
                reason: format!(
                    "{} has schema version {}, newer than supported {}",
                    self.path.display(),
                    state.version,
                    STATE_VERSION
                ),
            }
            .into());
        }
        Ok(state)
    }

    fn persist(&self, state: &DeploymentState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        write_atomic(&self.path, json.as_bytes(), STATE_MODE)?;
        debug!(path = %self.path.display(), nodes = state.nodes.len(), "State persisted");
        Ok(())
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// Cluster token stored with owner-only permissions.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(TOKEN_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<ClusterToken>> {
        read_optional(&self.path)?
            .map(|contents| serde_json::from_str(&contents).map_err(Into::into))
            .transpose()
    }

    fn save(&self, token: &ClusterToken) -> Result<()> {
        let json = serde_json::to_vec_pretty(token)?;
        write_atomic(&self.path, &json, TOKEN_MODE)?;
        debug!(path = %self.path.display(), token = %token, "Token persisted");
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

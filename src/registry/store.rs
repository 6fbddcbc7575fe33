//! JSON document backing the registry.
//!
//! The whole collection is rewritten on every mutation. Writes go to a
//! sibling `.tmp` file which is then renamed over the document, so readers
//! only ever see a complete array.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::agent::Agent;
use crate::error::RegistryError;

/// File name of the persisted agent collection inside the config directory.
pub const AGENTS_FILE: &str = "agents.json";

/// Resolve the platform-specific default directory.
/// Linux: ~/.config/cogmesh
/// macOS: ~/Library/Application Support/cogmesh
pub fn default_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "cogmesh").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Load the agent array at `path`. A missing file yields `Ok(None)`.
pub fn load(path: &Path) -> Result<Option<Vec<Agent>>, RegistryError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No agents file, starting empty");
            return Ok(None);
        }
        Err(source) => {
            return Err(RegistryError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let agents: Vec<Agent> =
        serde_json::from_str(&contents).map_err(|source| RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::debug!(path = %path.display(), count = agents.len(), "Loaded agents");
    Ok(Some(agents))
}

/// Write `agents` to `path` as a pretty-printed JSON array.
pub fn save<'a>(
    path: &Path,
    agents: impl IntoIterator<Item = &'a Agent>,
) -> Result<(), RegistryError> {
    let agents: Vec<&Agent> = agents.into_iter().collect();
    let data = serde_json::to_vec_pretty(&agents).map_err(|source| RegistryError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    let io_err = |source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&tmp, &data).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;

    tracing::debug!(path = %path.display(), count = agents.len(), "Persisted agents");
    Ok(())
}

// File-backed registry store.
//
// Layout on disk: `{"schemaVersion": 1, "sessions": {id: record, ...}}` at
// `~/.wren/registry.json`. Two hardening measures over naive read-write:
//   - writes go to a temp file and land via atomic rename, so readers never
//     observe a torn document;
//   - `update` holds an exclusive advisory lock on a sidecar `.lock` file
//     for the whole read-modify-write, so concurrent sessions on one host
//     cannot clobber each other's entries.

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use super::{RegistryStore, SessionMap};
use crate::config::constants::REGISTRY_SCHEMA_VERSION;
use crate::error::{MeshError, MeshResult};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryDocument {
    schema_version: u32,
    sessions: SessionMap,
}

pub struct FileRegistryStore {
    path: PathBuf,
}

impl FileRegistryStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default shared location: `~/.wren/registry.json`.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Cannot determine home directory")?;
        Ok(home.join(".wren").join("registry.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Parse the on-disk document. Missing file, parse failure, or a schema
    /// we don't understand all degrade to an empty mapping.
    fn read_document(&self) -> SessionMap {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return SessionMap::new(),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "Registry unreadable, treating as empty");
                return SessionMap::new();
            }
        };

        match serde_json::from_str::<RegistryDocument>(&raw) {
            Ok(doc) if doc.schema_version == REGISTRY_SCHEMA_VERSION => doc.sessions,
            Ok(doc) => {
                tracing::warn!(
                    found = doc.schema_version,
                    expected = REGISTRY_SCHEMA_VERSION,
                    "Unknown registry schema version, treating as empty"
                );
                SessionMap::new()
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "Registry corrupt, treating as empty");
                SessionMap::new()
            }
        }
    }

    /// Serialize and publish via temp file + atomic rename.
    fn write_document(&self, sessions: &SessionMap) -> MeshResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(MeshError::registry_io)?;
        }

        let doc = RegistryDocument {
            schema_version: REGISTRY_SCHEMA_VERSION,
            sessions: sessions.clone(),
        };
        let json = serde_json::to_string_pretty(&doc).map_err(MeshError::registry_io)?;

        // Per-process temp name so concurrent writers never share a temp file.
        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(format!(".tmp-{}", std::process::id()));
        let tmp = self.path.with_file_name(tmp_name);

        std::fs::write(&tmp, json).map_err(MeshError::registry_io)?;
        std::fs::rename(&tmp, &self.path).map_err(MeshError::registry_io)?;
        Ok(())
    }

    fn acquire_lock(&self) -> MeshResult<File> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(MeshError::registry_io)?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.lock_path())
            .map_err(MeshError::registry_io)?;
        lock.lock_exclusive().map_err(MeshError::registry_io)?;
        Ok(lock)
    }
}

impl RegistryStore for FileRegistryStore {
    fn read(&self) -> SessionMap {
        self.read_document()
    }

    fn write(&self, sessions: &SessionMap) -> MeshResult<()> {
        self.write_document(sessions)
    }

    fn update(&self, mutate: &mut dyn FnMut(&mut SessionMap)) -> MeshResult<()> {
        let lock = self.acquire_lock()?;
        let mut sessions = self.read_document();
        mutate(&mut sessions);
        let result = self.write_document(&sessions);
        // Lock released on drop; unlock explicitly so failures show up here.
        if let Err(err) = fs2::FileExt::unlock(&lock) {
            tracing::warn!(%err, "Failed to release registry lock");
        }
        result
    }
}

//! # Autosave
//!
//! The history serializes its checkpoint stack into an opaque JSON blob and
//! hands it to a [`Backup`] slot. Two backends are provided:
//!
//! - **Memory**: for tests and embedding
//! - **File**: a single file on disk, replaced atomically on save
//!
//! ## Format
//!
//! ```text
//! { version: 3, entities, baseEntities, stack: [{ modified, deleted,
//!   annotation, selectedIds }], nextIds, index, timestamp }
//! ```
//!
//! `entities` holds every locally modified entity once, keyed by
//! `id@version` from the stack entries. `baseEntities` holds the originals
//! of everything edited (plus their child nodes and parent ways) so a restore
//! looks the same even before the area is downloaded again. Blobs with any
//! other `version` are rejected as [`BackupError::Incompatible`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use mapedit_osm::{Entity, EntityId, NextIds};
use serde::{Deserialize, Serialize};

use crate::BackupError;

pub const AUTOSAVE_VERSION: u64 = 3;

/// A persistence slot for the serialized history
pub trait Backup: fmt::Debug + Send {
    /// The saved blob, if any
    fn load(&self) -> Result<Option<String>, BackupError>;

    fn save(&mut self, blob: &str) -> Result<(), BackupError>;

    fn clear(&mut self) -> Result<(), BackupError>;
}

/// In-memory slot
#[derive(Debug, Clone, Default)]
pub struct MemoryBackup {
    slot: Option<String>,
}

impl MemoryBackup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self { slot: Some(blob.into()) }
    }

    pub fn blob(&self) -> Option<&str> {
        self.slot.as_deref()
    }
}

impl Backup for MemoryBackup {
    fn load(&self) -> Result<Option<String>, BackupError> {
        Ok(self.slot.clone())
    }

    fn save(&mut self, blob: &str) -> Result<(), BackupError> {
        self.slot = Some(blob.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), BackupError> {
        self.slot = None;
        Ok(())
    }
}

/// File-backed slot
#[derive(Debug, Clone)]
pub struct FileBackup {
    path: PathBuf,
}

impl FileBackup {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Backup for FileBackup {
    fn load(&self) -> Result<Option<String>, BackupError> {
        match fs::read_to_string(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, blob: &str) -> Result<(), BackupError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        // the previous blob stays in place until the new one is complete
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, blob)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), BackupError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// One checkpoint as saved
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCheckpoint {
    /// `id@version` keys into [`SavedHistory::entities`]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modified: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deleted: Vec<EntityId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_ids: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedHistory {
    pub version: u64,
    pub entities: Vec<Entity>,
    pub base_entities: Vec<Entity>,
    pub stack: Vec<SavedCheckpoint>,
    pub next_ids: NextIds,
    pub index: usize,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: Option<u64>,
}

impl SavedHistory {
    pub fn to_json(&self) -> Result<String, BackupError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a blob, refusing any format version other than the current one
    pub fn from_json(blob: &str) -> Result<Self, BackupError> {
        let probe: VersionProbe = serde_json::from_str(blob)?;
        match probe.version {
            Some(AUTOSAVE_VERSION) => Ok(serde_json::from_str(blob)?),
            found => Err(BackupError::Incompatible {
                found: found.unwrap_or(0),
            }),
        }
    }
}

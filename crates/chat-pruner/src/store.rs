//! Transcript persistence keyed by conversation id.
//!
//! The persisted format is a JSON array of `{"role", "content"}` objects whose
//! first element is the system turn. [`FileStore`] keeps one file per
//! conversation and writes atomically (temp file + rename), so a crash
//! mid-write never leaves a truncated transcript behind. [`MemoryStore`] keeps
//! blobs in process memory.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::Turn;
use crate::error::StoreError;
use crate::transcript::Transcript;

/// Load/save port for transcripts.
pub trait TranscriptStore: Send + Sync {
    fn load(&self, id: &str) -> Result<Transcript, StoreError>;

    /// Overwrite the whole stored transcript for `id`.
    fn save(&self, id: &str, transcript: &Transcript) -> Result<(), StoreError>;

    /// Size in bytes of the blob currently stored for `id`.
    fn stored_size(&self, id: &str) -> Result<u64, StoreError>;

    /// Check that `id` can be stored at all, without touching storage.
    fn validate_id(&self, id: &str) -> Result<(), StoreError> {
        let _ = id;
        Ok(())
    }
}

fn decode(id: &str, bytes: &[u8]) -> Result<Transcript, StoreError> {
    let turns: Vec<Turn> = serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        id: id.to_string(),
        reason: e.to_string(),
    })?;
    Transcript::from_turns(turns).map_err(|reason| StoreError::Corrupt {
        id: id.to_string(),
        reason,
    })
}

// ── FileStore ──────────────────────────────────────────────────────

/// One pretty-printed JSON file per conversation.
///
/// Directory layout:
/// ```text
/// conversations/
///   conversation_20260101_120000.json
///   conversation_20260102_093012.json
/// ```
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for an id. Ids ending in `.json` are rejected so that no
    /// two ids share a file.
    fn file_name(id: &str) -> Result<String, StoreError> {
        let invalid = id.is_empty()
            || id.contains("..")
            || id.contains('/')
            || id.contains('\\')
            || id.contains('\0')
            || id.ends_with(".json");
        if invalid {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(format!("{id}.json"))
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.dir.join(Self::file_name(id)?))
    }
}

impl TranscriptStore for FileStore {
    fn load(&self, id: &str) -> Result<Transcript, StoreError> {
        let path = self.path_for(id)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(StoreError::io(id, e)),
        };
        decode(id, &bytes)
    }

    fn save(&self, id: &str, transcript: &Transcript) -> Result<(), StoreError> {
        let file_name = Self::file_name(id)?;
        let final_path = self.dir.join(&file_name);
        let tmp_path = self.dir.join(format!(".{file_name}.tmp"));

        let json = serde_json::to_string_pretty(transcript).map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        let written = write_synced(&tmp_path, json.as_bytes())
            .and_then(|()| std::fs::rename(&tmp_path, &final_path));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(StoreError::io(id, e));
        }
        Ok(())
    }

    fn stored_size(&self, id: &str) -> Result<u64, StoreError> {
        let path = self.path_for(id)?;
        match std::fs::metadata(&path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(StoreError::io(id, e)),
        }
    }

    fn validate_id(&self, id: &str) -> Result<(), StoreError> {
        Self::file_name(id).map(|_| ())
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

// ── MemoryStore ────────────────────────────────────────────────────

/// In-process store holding compact JSON blobs.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes for `id`, bypassing serialization.
    pub fn put_raw(&self, id: &str, bytes: impl Into<Vec<u8>>) {
        let mut blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        blobs.insert(id.to_string(), bytes.into());
    }

    /// Raw bytes currently stored for `id`.
    pub fn get_raw(&self, id: &str) -> Option<Vec<u8>> {
        let blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        blobs.get(id).cloned()
    }
}

impl TranscriptStore for MemoryStore {
    fn load(&self, id: &str) -> Result<Transcript, StoreError> {
        let bytes = self
            .get_raw(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        decode(id, &bytes)
    }

    fn save(&self, id: &str, transcript: &Transcript) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(transcript).map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        self.put_raw(id, bytes);
        Ok(())
    }

    fn stored_size(&self, id: &str) -> Result<u64, StoreError> {
        let blobs = self.blobs.lock().unwrap_or_else(|e| e.into_inner());
        blobs
            .get(id)
            .map(|b| b.len() as u64)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

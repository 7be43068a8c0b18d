//! Local mirror of the task list.
//!
//! The mirror is a warm-start cache, never the source of truth: it is
//! written after every change to the collection and read once at session
//! start, then superseded by the remote list. Missing or corrupt data reads
//! as "no cached tasks".
//!
//! Each user has one durable key, `tasks_<encoded user_id>`, holding the
//! list as a JSON array.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use parking_lot::Mutex;

use tasknest_proto::Task;

/// Errors that can occur while writing the mirror.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// The task list could not be encoded.
    #[error("failed to encode task list: {0}")]
    Encode(#[from] serde_json::Error),

    /// The backing file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Durable per-user storage for the task list.
pub trait TaskMirror: Send + Sync {
    /// Reads the cached list. `None` if absent or unreadable.
    fn load(&self, user_id: &str) -> Option<Vec<Task>>;

    /// Replaces the cached list.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError`] if the list cannot be encoded or stored.
    fn save(&self, user_id: &str, tasks: &[Task]) -> Result<(), MirrorError>;
}

/// Storage key for a user's task list.
///
/// ASCII letters, digits and `-` pass through; every other byte becomes
/// `_` followed by two hex digits. The mapping is injective and the result
/// is a safe file name.
#[must_use]
pub fn mirror_key(user_id: &str) -> String {
    let mut key = String::with_capacity(6 + user_id.len());
    key.push_str("tasks_");
    for byte in user_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            key.push(char::from(byte));
        } else {
            let _ = write!(key, "_{byte:02X}");
        }
    }
    key
}

fn decode(user_id: &str, raw: &str) -> Option<Vec<Task>> {
    match serde_json::from_str(raw) {
        Ok(tasks) => Some(tasks),
        Err(e) => {
            tracing::warn!(user_id, error = %e, "ignoring corrupt task mirror");
            None
        }
    }
}

/// Mirror backed by one JSON file per user in a directory.
#[derive(Debug, Clone)]
pub struct FileMirror {
    dir: PathBuf,
}

impl FileMirror {
    /// Creates a mirror rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file holding `user_id`'s tasks.
    #[must_use]
    pub fn path_for(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", mirror_key(user_id)))
    }
}

impl TaskMirror for FileMirror {
    fn load(&self, user_id: &str) -> Option<Vec<Task>> {
        let path = self.path_for(user_id);
        match std::fs::read_to_string(&path) {
            Ok(raw) => decode(user_id, &raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read task mirror");
                None
            }
        }
    }

    fn save(&self, user_id: &str, tasks: &[Task]) -> Result<(), MirrorError> {
        let encoded = serde_json::to_string(tasks)?;
        let path = self.path_for(user_id);
        let write_err = |source| MirrorError::Write {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(write_err)?;
        // Write-then-rename so a crash never leaves a half-written file.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, encoded).map_err(write_err)?;
        std::fs::rename(&tmp, &path).map_err(write_err)?;
        tracing::debug!(path = %path.display(), count = tasks.len(), "task mirror written");
        Ok(())
    }
}

/// Mirror held in process memory. Values are stored encoded, exactly as
/// the file mirror would write them.
#[derive(Debug, Default)]
pub struct MemoryMirror {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryMirror {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores raw text under a user's key, bypassing encoding.
    pub fn put_raw(&self, user_id: &str, raw: impl Into<String>) {
        self.entries.lock().insert(mirror_key(user_id), raw.into());
    }

    /// Returns the raw text stored for a user.
    pub fn raw(&self, user_id: &str) -> Option<String> {
        self.entries.lock().get(&mirror_key(user_id)).cloned()
    }
}

impl TaskMirror for MemoryMirror {
    fn load(&self, user_id: &str) -> Option<Vec<Task>> {
        let raw = self.raw(user_id)?;
        decode(user_id, &raw)
    }

    fn save(&self, user_id: &str, tasks: &[Task]) -> Result<(), MirrorError> {
        let encoded = serde_json::to_string(tasks)?;
        self.entries.lock().insert(mirror_key(user_id), encoded);
        Ok(())
    }
}

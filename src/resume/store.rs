//! Durable storage for [`ProgressState`]
//!
//! Saves are whole-state snapshots written to a temp file in the target
//! directory, fsynced, then renamed over the previous snapshot. A crash at
//! any point leaves either the old or the new snapshot on disk, never a
//! mixture.

use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::state::{ProgressState, LEGACY_SCHEMA_VERSION, SCHEMA_VERSION};

/// Maximum allowed progress file size (256 MB) to prevent memory exhaustion
pub const MAX_STATE_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// File-backed progress store
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    /// Create a store for the given progress file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Progress file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a progress file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn open_lock(&self) -> Result<RwLock<File>, ResumeError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ResumeError::IoError(e.to_string()))?;
        }
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| ResumeError::LockError(format!("Failed to create lock file: {e}")))?;
        Ok(RwLock::new(lock_file))
    }

    /// Load the persisted state
    ///
    /// A missing file yields an empty state. A file that cannot be parsed is
    /// moved aside (`<path>.corrupt-<unix-ms>`) and an empty state is
    /// returned. Errors are reserved for I/O failures, oversized files and
    /// files written by a newer schema.
    pub fn load(&self) -> Result<ProgressState, ResumeError> {
        debug!(path = %self.path.display(), "Loading progress state");

        let Some(contents) = self.read_contents()? else {
            info!(path = %self.path.display(), "No progress file, starting fresh");
            return Ok(ProgressState::new());
        };

        let mut state: ProgressState = match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(e) => {
                self.quarantine(&e.to_string())?;
                return Ok(ProgressState::new());
            }
        };
        check_version(&state)?;

        state.upgrade();
        info!(
            processed = state.processed().len(),
            succeeded = state.succeeded().len(),
            problematic = state.problematic().len(),
            checkpoints = state.metadata().total_checkpoints(),
            "Progress state loaded"
        );
        Ok(state)
    }

    /// Check the persisted state without repairing or moving anything
    ///
    /// Unlike [`load`](Self::load), an unparseable file is an error and
    /// invariant violations are reported instead of repaired. A missing file
    /// verifies as an empty state.
    pub fn verify(&self) -> Result<ProgressState, ResumeError> {
        let Some(contents) = self.read_contents()? else {
            return Ok(ProgressState::new());
        };

        let mut state: ProgressState = serde_json::from_str(&contents)
            .map_err(|e| ResumeError::SerializationError(e.to_string()))?;
        check_version(&state)?;
        state.validate().map_err(ResumeError::Inconsistent)?;
        state.upgrade();
        Ok(state)
    }

    fn read_contents(&self) -> Result<Option<String>, ResumeError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let lock = self.open_lock()?;
        let _guard = lock
            .read()
            .map_err(|e| ResumeError::LockError(format!("Failed to acquire read lock: {e}")))?;

        let metadata =
            std::fs::metadata(&self.path).map_err(|e| ResumeError::IoError(e.to_string()))?;
        if metadata.len() > MAX_STATE_FILE_SIZE {
            return Err(ResumeError::StateTooLarge {
                size: metadata.len(),
                max: MAX_STATE_FILE_SIZE,
            });
        }

        std::fs::read_to_string(&self.path)
            .map(Some)
            .map_err(|e| ResumeError::IoError(e.to_string()))
    }

    /// Persist a whole-state snapshot atomically
    pub fn save(&self, state: &ProgressState) -> Result<(), ResumeError> {
        debug!(
            path = %self.path.display(),
            processed = state.processed().len(),
            "Saving progress state"
        );

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| ResumeError::SerializationError(e.to_string()))?;

        let mut lock = self.open_lock()?;
        let _guard = lock
            .write()
            .map_err(|e| ResumeError::LockError(format!("Failed to acquire write lock: {e}")))?;

        let parent_dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
            .map_err(|e| ResumeError::IoError(format!("Failed to create temp file: {e}")))?;

        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| ResumeError::IoError(format!("Failed to write to temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| ResumeError::IoError(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| ResumeError::IoError(format!("Failed to sync temp file: {e}")))?;

        temp_file
            .persist(&self.path)
            .map_err(|e| ResumeError::IoError(format!("Failed to persist temp file: {e}")))?;

        // Make the rename itself durable
        if let Ok(dir) = File::open(parent_dir) {
            let _ = dir.sync_all();
        }

        debug!(
            path = %self.path.display(),
            succeeded = state.succeeded().len(),
            problematic = state.problematic().len(),
            "Progress state saved"
        );
        Ok(())
    }

    /// Delete the progress file (and its lock file) if present
    pub fn reset(&self) -> Result<(), ResumeError> {
        for path in [self.path.clone(), self.lock_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => info!(path = %path.display(), "Removed progress file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ResumeError::IoError(e.to_string())),
            }
        }
        Ok(())
    }

    fn quarantine(&self, reason: &str) -> Result<(), ResumeError> {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".corrupt-{}", chrono::Utc::now().timestamp_millis()));
        let target = PathBuf::from(name);

        warn!(
            path = %self.path.display(),
            moved_to = %target.display(),
            error = %reason,
            "Progress file is unreadable, moving it aside and starting fresh"
        );
        std::fs::rename(&self.path, &target).map_err(|e| ResumeError::IoError(e.to_string()))
    }
}

fn check_version(state: &ProgressState) -> Result<(), ResumeError> {
    let version = state.schema_version();
    if version == SCHEMA_VERSION || version == LEGACY_SCHEMA_VERSION {
        return Ok(());
    }
    warn!(
        found_version = %version,
        expected_version = SCHEMA_VERSION,
        "Progress state schema version mismatch"
    );
    Err(ResumeError::SchemaVersionMismatch {
        expected: SCHEMA_VERSION.to_string(),
        found: version.to_string(),
    })
}

/// Errors related to progress persistence
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// Schema version mismatch
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version
        expected: String,
        /// Found schema version
        found: String,
    },

    /// State file too large
    #[error("state file too large: {size} bytes (max: {max} bytes)")]
    StateTooLarge {
        /// Actual file size
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// Loaded state breaks the progress invariants
    #[error("progress state is inconsistent: {}", .0.join("; "))]
    Inconsistent(Vec<String>),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Lock error
    #[error("lock error: {0}")]
    LockError(String),
}

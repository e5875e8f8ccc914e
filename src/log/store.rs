//! Log directory layout, file creation, and the fsync discipline.
//!
//! Phase lines are predictions of intent: cheap to lose, since the
//! pre-image is recoverable from the prior action state. Action lines are
//! evidence that a remote command has been issued and must survive a
//! crash, so every action write is followed by an `fsync`.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use crate::error::{GxactError, Result};
use crate::log::record::LogRecord;

/// Default directory name under the host's data root.
pub const DEFAULT_DIR_NAME: &str = "extglobalxact";

/// Owns the log directory and the open file handle for one set's log.
pub struct LogStore {
    dir: PathBuf,
}

impl LogStore {
    /// Open the log store rooted at `<data_root>/extglobalxact`, creating
    /// the directory with mode 0700 if it does not already exist.
    pub fn open(data_root: &Path) -> Result<Self> {
        let dir = data_root.join(DEFAULT_DIR_NAME);
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, prefix: &str) -> PathBuf {
        self.dir.join(prefix)
    }

    /// Create a new set file named by `prefix`. Fails with
    /// `InvalidTransactionState` if a file by that name already exists:
    /// a collision is a programming error, not a recoverable condition.
    pub fn create_set_file(&self, prefix: &str) -> Result<LogHandle> {
        let path = self.path_for(prefix);
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .mode(0o600)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    GxactError::InvalidTransactionState(format!(
                        "set file already exists: {}",
                        path.display()
                    ))
                } else {
                    GxactError::Io(e)
                }
            })?;

        Ok(LogHandle { path, file })
    }

    /// Open an existing set file for the recovery worker (read + append).
    pub fn open_existing(&self, prefix: &str) -> Result<LogHandle> {
        let path = self.path_for(prefix);
        let file = OpenOptions::new().append(true).read(true).open(&path)?;
        Ok(LogHandle { path, file })
    }

    /// Every on-disk set currently present in the directory, by prefix.
    pub fn list_in_flight(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    if !name.ends_with(".lock") {
                        out.push(name.to_string());
                    }
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Remove a set file by prefix. Only called by the coordinator on
    /// successful COMPLETE, or by the recovery worker once its member
    /// list has been fully drained.
    pub fn remove(&self, prefix: &str) -> Result<()> {
        let path = self.path_for(prefix);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Advisory interlock against two recovery workers racing the same set
    /// (a restart-triggered worker and an administrator-triggered one).
    /// The lock file is removed when the returned guard drops.
    pub fn acquire_recovery_lock(&self, prefix: &str) -> Result<RecoveryLock> {
        let path = self.dir.join(format!("{}.lock", prefix));
        OpenOptions::new()
            .create_new(true)
            .write(true)
            .mode(0o600)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    GxactError::InvalidTransactionState(format!(
                        "recovery already in progress for {}",
                        prefix
                    ))
                } else {
                    GxactError::Io(e)
                }
            })?;
        Ok(RecoveryLock { path })
    }
}

impl Clone for LogStore {
    fn clone(&self) -> Self {
        Self {
            dir: self.dir.clone(),
        }
    }
}

/// Held for the duration of one recovery pass; removes its lock file on
/// drop, including on panic unwind.
pub struct RecoveryLock {
    path: PathBuf,
}

impl Drop for RecoveryLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// An open handle to one set's log file.
pub struct LogHandle {
    path: PathBuf,
    file: File,
}

impl LogHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a phase line. Flushed to the OS but *not* fsynced: losing
    /// it on crash is safe, since the prior action line already recorded
    /// the evidence needed to resume.
    pub fn write_phase(&mut self, record: &LogRecord) -> Result<()> {
        self.file.write_all(record.encode().as_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    /// Append an action line and fsync before returning. Must complete
    /// before the corresponding SQL command is issued to the remote.
    pub fn write_action_durable(&mut self, record: &LogRecord) -> Result<()> {
        let line = record.encode();
        if line.len() > crate::log::record::MAX_LINE_LEN {
            return Err(GxactError::InvalidTransactionState(
                "action line exceeds maximum length".into(),
            ));
        }
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Read and parse every record in the file, in on-disk order.
    ///
    /// Lines that don't parse are skipped with a caller-visible warning
    /// hook via the returned `Vec` of line-level errors, so the recovery
    /// loader can decide whether a given mismatch is fatal.
    pub fn read_all(&mut self) -> Result<Vec<LogRecord>> {
        use std::io::{BufRead, BufReader, Seek, SeekFrom};

        self.file.seek(SeekFrom::Start(0))?;
        let reader = BufReader::new(&mut self.file);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            match LogRecord::parse_line(&line) {
                Ok(rec) => records.push(rec),
                Err(e) => {
                    log::warn!("skipping unparsable log line '{}': {}", line, e);
                }
            }
        }
        Ok(records)
    }
}

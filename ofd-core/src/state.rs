//! Local state shared between runs: the receipt sequence counter and the
//! handoff files that chain one receipt onto an earlier one.
//!
//! Both live as plain files in the logs directory. The counter's
//! read-modify-write is serialized with a lock file; every write goes through
//! an atomic rename. Reading a handoff file and later using it is not locked,
//! so two operators working the same directory can still see stale handoffs.
//!
//! The lock file records the holder's PID. Taking the lock waits at most
//! `LOCK_ATTEMPTS * LOCK_BACKOFF` on the calling thread. A lock older than
//! `STALE_LOCK_AGE` is left over from a killed run and is taken over; a
//! younger one can be removed by hand once no run is in progress.
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::receipt::ReceiptRef;
use crate::receipt::document::{self, DocumentError};

pub const SEQUENCE_FILE: &str = "last_seq.txt";

const LOCK_ATTEMPTS: u32 = 20;
const LOCK_BACKOFF: Duration = Duration::from_millis(50);
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("{path} is locked by another run; remove it if no run is in progress")]
    Locked { path: PathBuf },
    #[error("sequence counter {path} is at its maximum value")]
    Exhausted { path: PathBuf },
    #[error("{} not found: submit a {} receipt first", .path.display(), .key.produced_by())]
    MissingPrerequisite { key: HandoffKey, path: PathBuf },
}

/// Source of receipt sequence numbers.
pub trait ReceiptSequence {
    /// Advance the counter and return the new value.
    fn next_sequence(&self) -> Result<u64, StoreError>;

    /// Last issued value, 0 if none.
    fn current(&self) -> Result<u64, StoreError>;
}

/// Counter persisted as a decimal integer in a text file.
///
/// A missing or unparsable file counts as 0.
///
/// # Examples
/// ```rust
/// use ofd_core::state::{FileSequence, ReceiptSequence};
///
/// let dir = tempfile::tempdir()?;
/// let counter = FileSequence::new(dir.path().join("last_seq.txt"));
/// assert_eq!(counter.next_sequence()?, 1);
/// assert_eq!(counter.next_sequence()?, 2);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileSequence {
    path: PathBuf,
}

impl FileSequence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SEQUENCE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<u64, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(DocumentError::io(&self.path, e).into()),
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }
        match trimmed.parse::<u64>() {
            Ok(value) => Ok(value),
            Err(_) => {
                tracing::warn!(path = %self.path.display(), content = trimmed, "unparsable sequence counter, restarting from 0");
                Ok(0)
            }
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }
}

impl ReceiptSequence for FileSequence {
    fn next_sequence(&self) -> Result<u64, StoreError> {
        let _guard = LockFile::acquire(self.lock_path())?;
        let next = self
            .read()?
            .checked_add(1)
            .ok_or_else(|| StoreError::Exhausted {
                path: self.path.clone(),
            })?;
        document::write_atomic(&self.path, next.to_string().as_bytes())?;
        tracing::debug!(path = %self.path.display(), next, "sequence advanced");
        Ok(next)
    }

    fn current(&self) -> Result<u64, StoreError> {
        self.read()
    }
}

/// Exclusive lock held for as long as the value lives.
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    fn acquire(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DocumentError::io(parent, e))?;
            }
        }
        for attempt in 0..LOCK_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // Holder PID, for whoever finds a leftover lock.
                    let _ = write!(file, "{}", std::process::id());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if is_stale(&path) {
                        let holder = std::fs::read_to_string(&path).unwrap_or_default();
                        tracing::warn!(
                            path = %path.display(),
                            holder = holder.trim(),
                            "removing stale sequence lock"
                        );
                        let _ = std::fs::remove_file(&path);
                        continue;
                    }
                    if attempt + 1 < LOCK_ATTEMPTS {
                        std::thread::sleep(LOCK_BACKOFF);
                    }
                }
                Err(e) => return Err(DocumentError::io(&path, e).into()),
            }
        }
        Err(StoreError::Locked { path })
    }
}

fn is_stale(path: &Path) -> bool {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Handoff slots written by one receipt kind and read by another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandoffKey {
    /// Written after a sale, read by refund and credit receipts.
    LastSale,
    /// Written after a credit, read by credit-refund receipts.
    LastCredit,
}

impl HandoffKey {
    pub fn file_name(&self) -> &'static str {
        match self {
            HandoffKey::LastSale => "last_sale_info.json",
            HandoffKey::LastCredit => "last_credit_info.json",
        }
    }

    fn produced_by(&self) -> &'static str {
        match self {
            HandoffKey::LastSale => "sale",
            HandoffKey::LastCredit => "credit",
        }
    }
}

/// Typed access to the handoff files.
#[derive(Debug, Clone)]
pub struct HandoffStore {
    dir: PathBuf,
}

impl HandoffStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, key: HandoffKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Read a stored reference. Besides the bare four-field block, a full
    /// OFD response carrying a nested `SaleReceiptInfo` is accepted.
    pub fn load(&self, key: HandoffKey) -> Result<Option<ReceiptRef>, StoreError> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        let value: serde_json::Value = document::read_json(&path)?;
        let reference = match serde_json::from_value::<ReceiptRef>(value.clone()) {
            Ok(reference) => reference,
            Err(source) => match value.get("SaleReceiptInfo") {
                Some(nested) => serde_json::from_value(nested.clone())
                    .map_err(|source| DocumentError::Json { path, source })?,
                None => return Err(DocumentError::Json { path, source }.into()),
            },
        };
        Ok(Some(reference))
    }

    /// Like [`load`][HandoffStore::load] but a missing file is an error.
    pub fn require(&self, key: HandoffKey) -> Result<ReceiptRef, StoreError> {
        self.load(key)?.ok_or_else(|| StoreError::MissingPrerequisite {
            key,
            path: self.path(key),
        })
    }

    pub fn save(&self, key: HandoffKey, reference: &ReceiptRef) -> Result<PathBuf, StoreError> {
        let path = self.path(key);
        document::write_json(&path, reference)?;
        tracing::info!(path = %path.display(), receipt_seq = reference.receipt_seq(), "handoff saved");
        Ok(path)
    }
}

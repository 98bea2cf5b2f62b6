//! Reader history file store.
//!
//! A [`HistoryStore`] session holds the history file open together with an
//! exclusive advisory lock on `<path>.lock`, parses it once into a base
//! [`Snapshot`], stages page updates in an [`Overlay`], and on save writes the
//! result to the sibling `<path>.new`. The original file is never written.
//!
//! ```no_run
//! use pbsync_core::history::{HistoryStore, SaveOutcome};
//!
//! let mut store = HistoryStore::new();
//! store.open("~/.local/share/zathura/history")?;
//! store.update("/books/b.pdf", 42);
//! if let SaveOutcome::Written { path, .. } = store.save()? {
//!     println!("wrote {}", path.display());
//! }
//! store.close();
//! # Ok::<(), pbsync_core::history::HistoryError>(())
//! ```

pub mod codec;
mod overlay;


pub use overlay::Overlay;

use crate::safe_io::{FileLock, atomic_write, with_suffix};
use dirs_next::home_dir;
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Suffix of the sibling file a save writes to.
pub const NEW_SUFFIX: &str = ".new";
/// Suffix of the sibling advisory lock file.
pub const LOCK_SUFFIX: &str = ".lock";

/// Reading position of one history entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Record {
    pub page: u32,
}

impl Record {
    pub fn new(page: u32) -> Self {
        Self { page }
    }
}

/// History entries keyed by their exact path string.
pub type Snapshot = BTreeMap<String, Record>;

#[derive(Debug, Error)]
pub enum HistoryError {
    /// The history file could not be opened or created.
    #[error("cannot open history file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The lock is held by another process or handle.
    #[error("history file is locked by another process (lock file: {})", lock_path.display())]
    Locked { lock_path: PathBuf },
    /// The lock file could not be created or locked.
    #[error("cannot lock {}: {source}", lock_path.display())]
    Lock {
        lock_path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read history file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The sibling output file could not be written.
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("history store is not open")]
    NotOpen,
}

/// Result of a successful [`HistoryStore::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing was staged; no file was touched.
    NoChanges,
    /// `updated` entries were written to the sibling file at `path`.
    Written { path: PathBuf, updated: usize },
}

/// Resolve a leading `~` component against `home`.
///
/// Returns `None` only when the path needs a home directory and none is known.
/// `~user` forms are not expanded.
pub fn expand_home(path: &Path, home: Option<&Path>) -> Option<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = home?;
            if rest.as_os_str().is_empty() {
                Some(home.to_path_buf())
            } else {
                Some(home.join(rest))
            }
        }
        Err(_) => Some(path.to_path_buf()),
    }
}

struct Session {
    path: PathBuf,
    file: File,
    _lock: FileLock,
    snapshot: Snapshot,
    overlay: Overlay,
}

/// One open/update/save/close lifecycle over a history file.
#[derive(Default)]
pub struct HistoryStore {
    session: Option<Session>,
}

impl HistoryStore {
    /// A closed store. Call [`open`](Self::open) before updating.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path`, lock it and load its entries.
    ///
    /// Any session already open is closed first. On failure nothing stays
    /// acquired and the store remains closed.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), HistoryError> {
        self.close();

        let requested = path.as_ref();
        let path = expand_home(requested, home_dir().as_deref()).ok_or_else(|| {
            HistoryError::Open {
                path: requested.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "home directory not found"),
            }
        })?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| HistoryError::Open {
                path: path.clone(),
                source,
            })?;

        let lock_path = with_suffix(&path, LOCK_SUFFIX);
        let lock = match FileLock::try_acquire(&lock_path) {
            Ok(Some(lock)) => lock,
            Ok(None) => return Err(HistoryError::Locked { lock_path }),
            Err(source) => return Err(HistoryError::Lock { lock_path, source }),
        };

        let text = read_all(&mut file).map_err(|source| HistoryError::Read {
            path: path.clone(),
            source,
        })?;
        let snapshot = codec::parse(&text);
        debug!(
            "loaded {} record(s) from {} (lock: {})",
            snapshot.len(),
            path.display(),
            lock.path().display()
        );

        self.session = Some(Session {
            path,
            file,
            _lock: lock,
            snapshot,
            overlay: Overlay::new(),
        });
        Ok(())
    }

    /// Stage a new page for `key`.
    ///
    /// Returns whether the update was staged. Keys the history file does not
    /// already contain are ignored, as is every update on a closed store.
    pub fn update(&mut self, key: &str, page: u32) -> bool {
        let Some(session) = self.session.as_mut() else {
            debug!("{key}: store is closed, update ignored");
            return false;
        };
        let staged = session.overlay.apply(&session.snapshot, key, page);
        if staged {
            debug!("{key}: staged page {page}");
        } else {
            debug!("{key}: not in history, update ignored");
        }
        staged
    }

    /// Write the staged updates to `<path>.new`.
    ///
    /// With nothing staged this is a no-op reporting [`SaveOutcome::NoChanges`].
    /// The snapshot and overlay are committed only after the sibling file is
    /// fully written; on error the session is unchanged and may save again.
    pub fn save(&mut self) -> Result<SaveOutcome, HistoryError> {
        let session = self.session.as_mut().ok_or(HistoryError::NotOpen)?;

        if session.overlay.is_empty() {
            info!("no changes to save for {}", session.path.display());
            return Ok(SaveOutcome::NoChanges);
        }

        for (key, record) in session.overlay.iter() {
            debug!("{key}: saving page {}", record.page);
        }

        let mut merged = session.snapshot.clone();
        session.overlay.merge_into(&mut merged);

        let original = read_all(&mut session.file).map_err(|source| HistoryError::Read {
            path: session.path.clone(),
            source,
        })?;
        let rendered = codec::render(&original, &merged);

        let target = with_suffix(&session.path, NEW_SUFFIX);
        atomic_write(&target, &rendered).map_err(|source| HistoryError::Write {
            path: target.clone(),
            source,
        })?;

        let updated = session.overlay.len();
        session.snapshot = merged;
        session.overlay.clear();
        info!("wrote {updated} update(s) to {}", target.display());

        Ok(SaveOutcome::Written {
            path: target,
            updated,
        })
    }

    /// Release the lock and file handle and drop all loaded state.
    /// Safe to call on a closed or never-opened store.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("closing {}", session.path.display());
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Resolved path of the open history file.
    pub fn path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    /// Whether any update is staged and not yet saved.
    pub fn has_pending_changes(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.overlay.is_empty())
    }

    /// Staged updates in key order.
    pub fn pending(&self) -> impl Iterator<Item = (&str, Record)> {
        self.session.iter().flat_map(|s| s.overlay.iter())
    }

    /// Current value for `key`, staged updates taking precedence.
    pub fn get(&self, key: &str) -> Option<Record> {
        let session = self.session.as_ref()?;
        session
            .overlay
            .get(key)
            .or_else(|| session.snapshot.get(key).copied())
    }
}

impl Drop for HistoryStore {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_all(file: &mut File) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

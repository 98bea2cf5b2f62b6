//! Safe file I/O utilities: atomic writes and advisory locking.
//!
//! - [`atomic_write()`] - Write bytes atomically (temp file + rename)
//! - [`FileLock`] - RAII advisory lock using fs2
//! - [`with_suffix()`] - Build a sibling path (`history` -> `history.new`)
//!
//! Locks are advisory: every process touching the history file has to go
//! through [`FileLock`] on the same sibling path for the exclusion to hold.

use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append `suffix` to the full file name of `path`.
///
/// Unlike [`Path::with_extension`], an existing extension is kept:
/// `notes.txt` + `.lock` gives `notes.txt.lock`.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Atomically write bytes to a file.
///
/// Writes to `<path>.tmp` with fsync, then renames onto `path`. The target is
/// either fully written or left as it was; a stale temp file is removed when
/// the write fails part way.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created, written, synced,
/// or renamed.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp_path = with_suffix(path, ".tmp");

    let result = write_synced(&tmp_path, contents).and_then(|()| fs::rename(&tmp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_synced(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;

    {
        let mut writer = BufWriter::new(&mut file);
        writer.write_all(contents)?;
        writer.flush()?;
    }

    // Sync to disk before rename
    file.sync_all()
}

/// RAII exclusive lock using fs2 advisory locking.
///
/// The lock is released when the value is dropped. The lock file itself stays
/// on disk: removing it while another process is waiting on it would let two
/// holders lock two different inodes.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Try to acquire an exclusive lock without blocking.
    ///
    /// Creates the lock file if it doesn't exist. Returns `Ok(Some(FileLock))`
    /// if the lock was acquired, `Ok(None)` if it is held elsewhere (another
    /// process, or another handle in this one), or `Err` on I/O error.
    pub fn try_acquire(lock_path: &Path) -> io::Result<Option<Self>> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file,
                path: lock_path.to_path_buf(),
            })),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            // fs2 reports contention as a raw OS error that may not map to WouldBlock
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Path of the lock file this guard holds.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Release through fs2's trait explicitly; ignore errors during drop
        let _ = FileExt::unlock(&self.file);
    }
}

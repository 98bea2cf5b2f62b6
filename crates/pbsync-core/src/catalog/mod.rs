//! Read-only view of the e-reader's book catalog.
//!
//! A mounted device carries a SQLite catalog (`system/config/books.db`) that
//! maps book hashes to file locations, and a reader cache directory with one
//! `<HASH>/position.cfg` per opened book. [`Catalog::records`] joins the two
//! into `(path, page)` records with the device mount prefix stripped.
//!
//! The database connection belongs to the [`Catalog`] value and is closed
//! when it is dropped.

mod position;

pub use position::PositionParser;

use crate::config::ConfigDefaults;
use log::{debug, warn};
use regex::Regex;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Catalog database, relative to the mount point.
pub const BOOKS_DB: &str = "system/config/books.db";
/// Per-book reader state, relative to the mount point.
pub const READER_CACHE_DIR: &str = "system/state/cache/reader";
pub const POSITION_FILE: &str = "position.cfg";

const LOCATE_SQL: &str = "
    SELECT p.Path, f.Name
    FROM Items i
    JOIN Files f ON f.BookID = i.OID
    JOIN Paths p ON p.OID = f.PathID
    WHERE i.HashUUID = ?1
    LIMIT 1";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot open catalog {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("cannot scan reader cache {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid path pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("catalog query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogOptions {
    /// Regex removed from the start of every catalog path.
    pub mount_prefix_pattern: String,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            mount_prefix_pattern: ConfigDefaults::MOUNT_PREFIX_PATTERN.to_string(),
        }
    }
}

/// One book's reading position as recorded on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    /// Reader cache directory name, as found on disk.
    pub hash: String,
    /// Book path with the mount prefix removed.
    pub path: String,
    pub page: u32,
}

pub struct Catalog {
    root: PathBuf,
    conn: Connection,
    positions: PositionParser,
    mount_prefix: Regex,
}

impl Catalog {
    /// Open the catalog of the device mounted at `mount_point`.
    pub fn open(mount_point: &Path, options: &CatalogOptions) -> Result<Self, CatalogError> {
        let mount_prefix = compile(&options.mount_prefix_pattern)?;
        let positions = PositionParser::new().map_err(|source| CatalogError::Pattern {
            pattern: "position".to_string(),
            source,
        })?;

        let db_path = mount_point.join(BOOKS_DB);
        let conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| CatalogError::Open {
            path: db_path.clone(),
            source,
        })?;
        debug!("opened catalog {}", db_path.display());

        Ok(Self {
            root: mount_point.to_path_buf(),
            conn,
            positions,
            mount_prefix,
        })
    }

    /// Device path of the book with `hash`, or `None` when the catalog has
    /// no complete entry for it. Hashes are matched upper-case.
    pub fn locate(&self, hash: &str) -> Result<Option<String>, CatalogError> {
        let mut stmt = self.conn.prepare_cached(LOCATE_SQL)?;
        let row = stmt
            .query_row([hash.to_uppercase()], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                ))
            })
            .optional()?;

        Ok(match row {
            Some((Some(dir), name)) if !dir.is_empty() => {
                Some(format!("{dir}{}", name.unwrap_or_default()))
            }
            _ => None,
        })
    }

    /// Strip the mount prefix from a device path.
    pub fn rewrite_path(&self, path: &str) -> String {
        self.mount_prefix.replace(path, "").into_owned()
    }

    /// Every book that has both a reading position and a catalog entry, in
    /// cache directory order.
    pub fn records(&self) -> Result<Vec<CatalogRecord>, CatalogError> {
        let cache_dir = self.root.join(READER_CACHE_DIR);
        let entries = fs::read_dir(&cache_dir).map_err(|source| CatalogError::Scan {
            path: cache_dir.clone(),
            source,
        })?;

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();

        let mut records = Vec::new();
        for dir in dirs {
            let Some(hash) = book_hash(&dir) else {
                continue;
            };
            let Some(page) = self.positions.read(&dir.join(POSITION_FILE)) else {
                debug!("{hash}: no reading position, skipped");
                continue;
            };
            let Some(location) = self.locate(hash)? else {
                warn!("{hash}: not found in catalog, skipped");
                continue;
            };
            records.push(CatalogRecord {
                hash: hash.to_string(),
                path: self.rewrite_path(&location),
                page,
            });
        }

        debug!("collected {} record(s) from {}", records.len(), cache_dir.display());
        Ok(records)
    }
}

fn compile(pattern: &str) -> Result<Regex, CatalogError> {
    Regex::new(pattern).map_err(|source| CatalogError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Directory name up to the first `.`.
fn book_hash(dir: &Path) -> Option<&str> {
    let name = dir.file_name()?.to_str()?;
    let hash = name.split('.').next()?;
    (!hash.is_empty()).then_some(hash)
}

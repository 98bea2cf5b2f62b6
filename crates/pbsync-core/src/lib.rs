//! pbsync-core: reading-position sync between an e-reader catalog and a
//! document viewer's history file.
//!
//! - [`history`] - load, update and re-emit the viewer's history file
//! - [`catalog`] - read book positions from a mounted e-reader
//! - [`sync`] - feed catalog positions into a history store
//! - [`config`] - TOML configuration

pub mod catalog;
pub mod config;
pub mod history;
pub mod safe_io;
pub mod sync;

pub use catalog::{Catalog, CatalogError, CatalogOptions, CatalogRecord};
pub use config::{Config, ConfigDefaults, ConfigError};
pub use history::{HistoryError, HistoryStore, Record, SaveOutcome};
pub use sync::{SyncReport, sync_positions};

//! CLI argument parsing with clap.
//!
//! Positional arguments override the config file; whatever neither supplies
//! falls back to the built-in defaults.

use clap::{ArgAction, Parser};
use pbsync_core::{CatalogOptions, Config};
use std::io::{self, ErrorKind};
use std::path::PathBuf;

const CLI_AFTER_HELP: &str = "\
The new history is written next to the original as HISTORY.new; the original
file is never modified. Review it with `diff HISTORY{,.new}` and apply it with
`cp HISTORY{,.new}`.

Config file: --config > $PBSYNC_CONFIG > <config dir>/pbsync/config.toml";

/// pbsync - sync book positions from a PocketBook e-reader into zathura's history
#[derive(Parser, Debug)]
#[command(
    name = "pbsync",
    version,
    about = "Sync book positions between a PocketBook e-reader and zathura",
    after_help = CLI_AFTER_HELP
)]
pub struct Cli {
    /// PocketBook mount point: the directory containing "system"
    #[arg(value_name = "MOUNT_POINT")]
    pub mount_point: PathBuf,

    /// Zathura history file [default: ~/.local/share/zathura/history]
    #[arg(value_name = "HISTORY")]
    pub history: Option<String>,

    /// Prefix to the books location on this device
    #[arg(value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Config file to load
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

/// Everything a sync run needs, after merging CLI and config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub mount_point: PathBuf,
    pub history_path: String,
    pub prefix: String,
    pub catalog: CatalogOptions,
}

impl Cli {
    pub fn resolve(self, config: Config) -> io::Result<Settings> {
        let prefix = self.prefix.or(config.prefix.clone()).ok_or_else(|| {
            io::Error::new(
                ErrorKind::InvalidInput,
                "no books prefix given (pass PREFIX or set `prefix` in the config file)",
            )
        })?;

        Ok(Settings {
            mount_point: self.mount_point,
            history_path: self.history.unwrap_or_else(|| config.history_path.clone()),
            prefix,
            catalog: config.catalog_options(),
        })
    }
}

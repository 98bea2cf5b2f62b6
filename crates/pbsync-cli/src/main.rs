// pbsync-cli: CLI frontend for pbsync
// Argument parsing, logging setup, user-facing report

mod cli;

use clap::Parser;
use cli::{Cli, Settings};
use log::LevelFilter;
use pbsync_core::{Catalog, Config, HistoryStore, SaveOutcome, sync_positions};
use std::io;
use std::path::Path;
use std::process::ExitCode;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // RUST_LOG, when set, takes precedence over -v
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn load_settings(cli: Cli) -> io::Result<Settings> {
    let config = match Config::resolve_path(cli.config.clone()) {
        Some(path) => Config::load(&path).map_err(io::Error::other)?,
        None => Config::default(),
    };
    cli.resolve(config)
}

fn print_saved(history: &Path, written: &Path) {
    let history = history.display();
    println!("New zathura history was saved at {}", written.display());
    println!();
    println!("Check the difference using:");
    println!(" diff {history}{{,.new}}");
    println!();
    println!("To apply these changes use:");
    println!(" cp {history}{{,.new}}");
}

fn run(settings: &Settings) -> io::Result<()> {
    // The catalog connection only lives as long as this block
    let records = {
        let catalog =
            Catalog::open(&settings.mount_point, &settings.catalog).map_err(io::Error::other)?;
        catalog.records().map_err(io::Error::other)?
    };
    log::info!(
        "read {} book position(s) from {}",
        records.len(),
        settings.mount_point.display()
    );

    let mut store = HistoryStore::new();
    store
        .open(&settings.history_path)
        .map_err(io::Error::other)?;

    let report = sync_positions(&records, &mut store, &settings.prefix);
    log::info!(
        "{} staged, {} ignored of {} record(s)",
        report.staged,
        report.ignored,
        report.seen
    );

    if !store.has_pending_changes() {
        println!("No changes.");
        store.close();
        return Ok(());
    }

    println!("Updated positions:");
    for (key, record) in store.pending() {
        println!("  {key} page: {}", record.page);
    }
    println!();

    let history = store
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.history_path.clone().into());
    let outcome = store.save();
    store.close();

    match outcome.map_err(io::Error::other)? {
        SaveOutcome::Written { path, .. } => print_saved(&history, &path),
        SaveOutcome::NoChanges => println!("No changes."),
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match load_settings(cli).and_then(|settings| run(&settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[ERROR] {e}");
            ExitCode::FAILURE
        }
    }
}

//! Feed catalog positions into a history store.

use crate::catalog::CatalogRecord;
use crate::history::HistoryStore;

/// Counts from one [`sync_positions`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub seen: usize,
    pub staged: usize,
    pub ignored: usize,
}

/// Stage one update per record, keyed as `prefix + path`.
///
/// Records whose key the history does not already contain are ignored by the
/// store; records with an empty path never reach it.
pub fn sync_positions(
    records: &[CatalogRecord],
    store: &mut HistoryStore,
    prefix: &str,
) -> SyncReport {
    let mut report = SyncReport::default();

    for record in records {
        report.seen += 1;
        if record.path.is_empty() {
            report.ignored += 1;
            continue;
        }
        let key = format!("{prefix}{}", record.path);
        if store.update(&key, record.page) {
            report.staged += 1;
        } else {
            report.ignored += 1;
        }
    }

    report
}

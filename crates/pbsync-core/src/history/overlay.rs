//! Pending updates layered over the base snapshot.

use std::collections::BTreeMap;

use super::{Record, Snapshot};

/// Updates accepted since the last successful save, keyed like the snapshot.
#[derive(Debug, Default, Clone)]
pub struct Overlay {
    pending: BTreeMap<String, Record>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `page` for `key`. Returns `false` (and stages nothing) when the
    /// key is neither pending nor present in `base`: the file format gives no
    /// safe place to insert a new scope, so unknown keys are never invented.
    pub fn apply(&mut self, base: &Snapshot, key: &str, page: u32) -> bool {
        if let Some(record) = self.pending.get_mut(key) {
            record.page = page;
            return true;
        }
        if base.contains_key(key) {
            self.pending.insert(key.to_string(), Record::new(page));
            return true;
        }
        false
    }

    /// Fold the pending updates into `base`, each as delete-then-insert.
    ///
    /// The overlay itself is left intact; callers [`clear`](Self::clear) it
    /// once the merged result has been committed.
    pub fn merge_into(&self, base: &mut Snapshot) {
        for (key, record) in &self.pending {
            base.remove(key);
            base.insert(key.clone(), *record);
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn get(&self, key: &str) -> Option<Record> {
        self.pending.get(key).copied()
    }

    /// Pending updates in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Record)> {
        self.pending.iter().map(|(k, r)| (k.as_str(), *r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Snapshot {
        [("/a", 1), ("/b", 2)]
            .into_iter()
            .map(|(k, p)| (k.to_string(), Record::new(p)))
            .collect()
    }

    #[test]
    fn test_apply_known_key() {
        let mut overlay = Overlay::new();
        assert!(overlay.apply(&base(), "/a", 10));
        assert_eq!(overlay.get("/a"), Some(Record::new(10)));
        assert_eq!(overlay.len(), 1);
    }

    #[test]
    fn test_apply_unknown_key_is_noop() {
        let mut overlay = Overlay::new();
        assert!(!overlay.apply(&base(), "/missing", 10));
        assert!(!overlay.apply(&base(), "", 10));
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_apply_overwrites_pending_value() {
        let mut overlay = Overlay::new();
        overlay.apply(&base(), "/b", 5);
        assert!(overlay.apply(&base(), "/b", 6));
        assert_eq!(overlay.get("/b"), Some(Record::new(6)));
        assert_eq!(overlay.len(), 1);
    }

    #[test]
    fn test_apply_pending_key_checked_before_base() {
        // A key already staged stays updatable even against an empty base
        let mut overlay = Overlay::new();
        overlay.apply(&base(), "/a", 3);
        assert!(overlay.apply(&Snapshot::new(), "/a", 4));
        assert_eq!(overlay.get("/a"), Some(Record::new(4)));
    }

    #[test]
    fn test_merge_into_replaces_values() {
        let mut overlay = Overlay::new();
        overlay.apply(&base(), "/b", 20);

        let mut merged = base();
        overlay.merge_into(&mut merged);

        assert_eq!(merged.get("/a"), Some(&Record::new(1)));
        assert_eq!(merged.get("/b"), Some(&Record::new(20)));
        assert_eq!(merged.len(), 2);
        assert!(!overlay.is_empty(), "merge leaves clearing to the caller");

        overlay.clear();
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_iter_is_key_ordered() {
        let mut overlay = Overlay::new();
        overlay.apply(&base(), "/b", 7);
        overlay.apply(&base(), "/a", 8);
        let keys: Vec<_> = overlay.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["/a", "/b"]);
    }
}

use std::collections::HashSet;

use crate::tree::{ContentTree, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LedgerKey {
    Text(NodeId),
    Attribute(NodeId, String),
}

impl LedgerKey {
    pub fn node(&self) -> NodeId {
        match self {
            LedgerKey::Text(node) | LedgerKey::Attribute(node, _) => *node,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub key: LedgerKey,
    pub original: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    pub dropped: usize,
}

#[derive(Debug, Default)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
    keys: HashSet<LedgerKey>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the leaf already has an original on record.
    pub fn record_text(&mut self, node: NodeId, original: &str) -> bool {
        self.record(LedgerKey::Text(node), original)
    }

    pub fn record_attribute(&mut self, node: NodeId, name: &str, original: &str) -> bool {
        self.record(LedgerKey::Attribute(node, name.to_ascii_lowercase()), original)
    }

    fn record(&mut self, key: LedgerKey, original: &str) -> bool {
        if !self.keys.insert(key.clone()) {
            return false;
        }
        self.entries.push(LedgerEntry {
            key,
            original: original.to_string(),
        });
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every original back whose node is still attached, drop the
    /// rest, and clear the ledger.
    pub fn restore<T: ContentTree + ?Sized>(&mut self, tree: &mut T) -> RestoreReport {
        let mut report = RestoreReport::default();
        self.keys.clear();
        // newest first, the way an undo stack unwinds
        for entry in std::mem::take(&mut self.entries).into_iter().rev() {
            let node = entry.key.node();
            if !tree.is_attached(node) {
                report.dropped += 1;
                continue;
            }
            let written = match &entry.key {
                LedgerKey::Text(_) => tree.set_text(node, &entry.original),
                LedgerKey::Attribute(_, name) => tree.set_attribute(node, name, &entry.original),
            };
            match written {
                Ok(()) => report.restored += 1,
                Err(err) => {
                    tracing::warn!(%node, %err, "ledger entry could not be restored");
                    report.dropped += 1;
                }
            }
        }
        tracing::debug!(restored = report.restored, dropped = report.dropped, "ledger restored");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Document;

    #[test]
    fn test_first_write_wins() {
        let mut doc = Document::new();
        let root = doc.root();
        let t = doc.append_text(root, "I hate it").unwrap();
        let mut ledger = Ledger::new();

        assert!(ledger.record_text(t, "I hate it"));
        doc.set_text(t, "I dislike it").unwrap();
        assert!(!ledger.record_text(t, "I dislike it"));
        assert_eq!(ledger.len(), 1);

        let report = ledger.restore(&mut doc);
        assert_eq!(report, RestoreReport { restored: 1, dropped: 0 });
        assert_eq!(doc.text(t).unwrap(), "I hate it");
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_attributes_and_detached_nodes() {
        let mut doc = Document::new();
        let root = doc.root();
        let img = doc.append_element(root, "img").unwrap();
        doc.set_attribute(img, "alt", "hated cat").unwrap();
        let p = doc.append_element(root, "p").unwrap();
        let t = doc.append_text(p, "hate").unwrap();

        let mut ledger = Ledger::new();
        ledger.record_attribute(img, "ALT", "hated cat");
        doc.set_attribute(img, "alt", "disliked cat").unwrap();
        ledger.record_text(t, "hate");
        doc.set_text(t, "dislike").unwrap();
        doc.remove(p).unwrap();

        let report = ledger.restore(&mut doc);
        assert_eq!(report, RestoreReport { restored: 1, dropped: 1 });
        assert_eq!(doc.attribute(img, "alt"), Some("hated cat"));
    }

    #[test]
    fn test_restore_empty_is_noop() {
        let mut doc = Document::new();
        let mut ledger = Ledger::new();
        assert_eq!(ledger.restore(&mut doc), RestoreReport::default());
        assert_eq!(ledger.restore(&mut doc), RestoreReport::default());
        assert!(doc.take_records().is_empty());
    }
}

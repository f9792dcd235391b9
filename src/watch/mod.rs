pub mod debounce;

use std::collections::HashSet;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::tree::{MutationRecord, NodeId};

pub use debounce::Debouncer;

/// What changed during one coalescing window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    /// Roots of inserted subtrees.
    pub added: Vec<NodeId>,
    /// Text leaves whose content changed.
    pub text_changed: Vec<NodeId>,
    /// Allow-listed attributes that changed.
    pub attributes: Vec<(NodeId, String)>,
    /// Nodes removed from the tree.
    pub removed: usize,
}

impl Invalidation {
    fn push_added(&mut self, seen: &mut HashSet<NodeId>, id: NodeId) {
        if seen.insert(id) {
            self.added.push(id);
        }
    }
}

#[derive(Debug)]
pub struct MutationWatcher {
    debouncer: Debouncer,
    config: EngineConfig,
    pending: Invalidation,
    seen_added: HashSet<NodeId>,
    seen_text: HashSet<NodeId>,
    seen_attrs: HashSet<(NodeId, String)>,
}

impl MutationWatcher {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            debouncer: Debouncer::new(config.debounce()),
            config: config.clone(),
            pending: Invalidation::default(),
            seen_added: HashSet::new(),
            seen_text: HashSet::new(),
            seen_attrs: HashSet::new(),
        }
    }

    /// Take in a batch of records. Returns whether any qualified (and so
    /// re-armed the debounce timer).
    pub fn observe(&mut self, records: Vec<MutationRecord>, now: Instant) -> bool {
        let mut qualifying = 0usize;
        for record in records {
            match record {
                MutationRecord::ChildList { added, removed, .. } => {
                    if added.is_empty() && removed.is_empty() {
                        continue;
                    }
                    qualifying += 1;
                    self.pending.removed += removed.len();
                    for id in added {
                        self.pending.push_added(&mut self.seen_added, id);
                    }
                }
                MutationRecord::CharacterData { target } => {
                    qualifying += 1;
                    if self.seen_text.insert(target) {
                        self.pending.text_changed.push(target);
                    }
                }
                MutationRecord::Attribute { target, name } => {
                    if !self.config.is_allowlisted_attribute(&name) {
                        continue;
                    }
                    let name = name.to_ascii_lowercase();
                    qualifying += 1;
                    if self.seen_attrs.insert((target, name.clone())) {
                        self.pending.attributes.push((target, name));
                    }
                }
            }
        }

        if qualifying == 0 {
            return false;
        }
        if self.debouncer.is_pending() {
            tracing::trace!(
                qualifying,
                superseded = self.debouncer.canceled() + 1,
                "pending rebuild superseded"
            );
        }
        self.debouncer.schedule(now);
        true
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Release the accumulated invalidation once the window has closed.
    pub fn poll(&mut self, now: Instant) -> Option<Invalidation> {
        if !self.debouncer.poll(now) {
            return None;
        }
        tracing::trace!(fired = self.debouncer.fired(), "invalidation settled");
        Some(self.drain())
    }

    /// Release the accumulated invalidation now, canceling the timer. Used
    /// when a caller cannot wait for the window (a highlight request must not
    /// resolve against a buffer known to be stale).
    pub fn flush(&mut self) -> Option<Invalidation> {
        if !self.debouncer.is_pending() {
            return None;
        }
        self.debouncer.cancel();
        Some(self.drain())
    }

    fn drain(&mut self) -> Invalidation {
        self.seen_added.clear();
        self.seen_text.clear();
        self.seen_attrs.clear();
        let inv = std::mem::take(&mut self.pending);
        tracing::debug!(
            added = inv.added.len(),
            text_changed = inv.text_changed.len(),
            attributes = inv.attributes.len(),
            removed = inv.removed,
            "tree invalidated"
        );
        inv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ContentTree, Document};
    use std::time::Duration;

    fn watcher() -> MutationWatcher {
        MutationWatcher::new(&EngineConfig::default())
    }

    #[test]
    fn test_burst_coalesces_into_one_invalidation() {
        let mut doc = Document::new();
        let root = doc.root();
        let mut w = watcher();
        let t0 = Instant::now();

        let a = doc.append_text(root, "a").unwrap();
        assert!(w.observe(doc.take_records(), t0));
        doc.set_text(a, "b").unwrap();
        doc.set_text(a, "c").unwrap();
        assert!(w.observe(doc.take_records(), t0 + Duration::from_millis(100)));

        assert!(w.poll(t0 + Duration::from_millis(250)).is_none());
        let inv = w.poll(t0 + Duration::from_millis(320)).unwrap();
        assert_eq!(inv.added, vec![a]);
        assert_eq!(inv.text_changed, vec![a]);
        assert!(w.poll(t0 + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_attribute_allowlist() {
        let mut doc = Document::new();
        let root = doc.root();
        let img = doc.append_element(root, "img").unwrap();
        doc.take_records();
        let mut w = watcher();
        let t0 = Instant::now();

        doc.set_attribute(img, "src", "x.png").unwrap();
        doc.set_attribute(img, "class", "big").unwrap();
        assert!(!w.observe(doc.take_records(), t0));
        assert!(!w.is_pending());

        doc.set_attribute(img, "ALT", "a photo").unwrap();
        assert!(w.observe(doc.take_records(), t0));
        let inv = w.flush().unwrap();
        assert_eq!(inv.attributes, vec![(img, "alt".to_string())]);
        assert!(!w.is_pending());
    }

    #[test]
    fn test_removal_counts() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.append_element(root, "p").unwrap();
        doc.take_records();
        let mut w = watcher();

        doc.remove(p).unwrap();
        assert!(w.observe(doc.take_records(), Instant::now()));
        assert_eq!(w.flush().unwrap().removed, 1);
    }
}

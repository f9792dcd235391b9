pub mod filter;
pub mod normalize;

use std::cmp::Ordering;
use std::ops::Range;
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::tree::{ContentTree, NodeId};

pub use filter::LeafFilter;
pub use normalize::Normalized;

/// One leaf's placement in the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMapEntry {
    pub node: NodeId,
    pub start: usize,        // byte offset (inclusive)
    pub end: usize,          // byte offset (exclusive)
    pub text: String,        // normalized text, == buffer[start..end]
    pub lead_skip: usize,    // bytes of the collapsed leaf text dropped at its front
}

impl NodeMapEntry {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Intersection with `[start, end)`, in entry-local offsets.
    pub fn local_overlap(&self, start: usize, end: usize) -> Option<Range<usize>> {
        let s = start.max(self.start);
        let e = end.min(self.end);
        (s < e).then(|| s - self.start..e - self.start)
    }
}

/// Immutable snapshot. Rebuilds replace it and bump the version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextIndex {
    version: u64,
    buffer: String,
    entries: Vec<NodeMapEntry>,
}

impl TextIndex {
    /// Version 0: nothing indexed yet.
    pub fn empty() -> Self {
        Self {
            version: 0,
            buffer: String::new(),
            entries: Vec::new(),
        }
    }

    /// Walk `root` depth-first and project every qualifying leaf.
    ///
    /// Whitespace collapsing runs across leaf boundaries: a leaf's leading
    /// space is dropped when the buffer is empty or already ends in a space,
    /// and a trailing space at the very end of the buffer is trimmed.
    pub fn build<T: ContentTree + ?Sized>(
        tree: &T,
        root: NodeId,
        config: &EngineConfig,
        version: u64,
    ) -> Self {
        let filter = LeafFilter::new(config);
        let mut buffer = String::new();
        let mut entries: Vec<NodeMapEntry> = Vec::new();

        for leaf in filter.text_leaves(tree, root) {
            let raw = tree.text(leaf).unwrap_or_default();
            let collapsed = Normalized::collapse(raw);
            let mut text = collapsed.as_str();
            let mut lead_skip = 0;
            if text.starts_with(' ') && (buffer.is_empty() || buffer.ends_with(' ')) {
                text = &text[1..];
                lead_skip = 1;
            }
            if text.is_empty() {
                continue;
            }
            let start = buffer.len();
            buffer.push_str(text);
            entries.push(NodeMapEntry {
                node: leaf,
                start,
                end: buffer.len(),
                text: text.to_string(),
                lead_skip,
            });
        }

        if buffer.ends_with(' ') {
            buffer.pop();
            if let Some(last) = entries.last_mut() {
                last.text.pop();
                last.end -= 1;
                if last.text.is_empty() {
                    entries.pop();
                }
            }
        }

        Self { version, buffer, entries }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn entries(&self) -> &[NodeMapEntry] {
        &self.entries
    }

    /// Clamp to the buffer and round down to a char boundary.
    pub fn clamp(&self, offset: usize) -> usize {
        normalize::floor_char_boundary(&self.buffer, offset)
    }

    /// Text of `[start, end)` after clamping both bounds.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        let start = self.clamp(start);
        let end = self.clamp(end).max(start);
        &self.buffer[start..end]
    }

    /// Position of the entry containing `offset`, by binary search.
    pub fn entry_index_at(&self, offset: usize) -> Option<usize> {
        self.entries
            .binary_search_by(|entry| {
                if offset < entry.start {
                    Ordering::Greater
                } else if offset >= entry.end {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            })
            .ok()
    }

    pub fn entry_at(&self, offset: usize) -> Option<&NodeMapEntry> {
        self.entry_index_at(offset).and_then(|i| self.entries.get(i))
    }

    /// Entries overlapping `[start, end)`, first and last located in
    /// O(log n).
    pub fn overlapping(&self, start: usize, end: usize) -> &[NodeMapEntry] {
        if start >= end {
            return &[];
        }
        let first = self.entries.partition_point(|e| e.end <= start);
        let last = self.entries.partition_point(|e| e.start < end);
        if first >= last {
            return &[];
        }
        &self.entries[first..last]
    }

    /// Check the map invariants: sorted, contiguous, and concatenating to
    /// the buffer.
    pub fn is_consistent(&self) -> bool {
        let mut expected_start = 0;
        for entry in &self.entries {
            if entry.start != expected_start
                || entry.end < entry.start
                || self.buffer.get(entry.start..entry.end) != Some(entry.text.as_str())
            {
                return false;
            }
            expected_start = entry.end;
        }
        expected_start == self.buffer.len()
    }
}

impl Default for TextIndex {
    fn default() -> Self {
        Self::empty()
    }
}

/// Produces [`TextIndex`] snapshots, throttled to one non-forced rebuild per
/// interval.
#[derive(Debug, Clone)]
pub struct Indexer {
    min_interval: Duration,
    last_build: Option<Instant>,
    version: u64,
}

impl Indexer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_build: None,
            version: 0,
        }
    }

    /// Whether a non-forced rebuild at `now` would be skipped.
    pub fn is_throttled(&self, now: Instant) -> bool {
        self.last_build
            .is_some_and(|last| now.saturating_duration_since(last) < self.min_interval)
    }

    /// Build a new snapshot of the whole tree, unless throttled and not
    /// forced.
    pub fn rebuild<T: ContentTree + ?Sized>(
        &mut self,
        tree: &T,
        config: &EngineConfig,
        now: Instant,
        force: bool,
    ) -> Option<TextIndex> {
        if !force && self.is_throttled(now) {
            tracing::trace!("index rebuild throttled");
            return None;
        }
        self.version += 1;
        self.last_build = Some(now);
        let index = TextIndex::build(tree, tree.root(), config, self.version);
        tracing::debug!(
            version = index.version(),
            len = index.len(),
            leaves = index.entries().len(),
            forced = force,
            "index rebuilt"
        );
        Some(index)
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

impl Default for Indexer {
    fn default() -> Self {
        Self::new(Duration::from_millis(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Document, NodeSpec};

    fn index_of(spec: NodeSpec) -> (Document, TextIndex) {
        let doc = Document::from_spec(&spec).unwrap();
        let index = TextIndex::build(&doc, doc.root(), &EngineConfig::default(), 1);
        (doc, index)
    }

    #[test]
    fn test_adjacent_leaves() {
        let (_, index) = index_of(NodeSpec::element(
            "p",
            vec![NodeSpec::text("Hello "), NodeSpec::text("world")],
        ));
        assert_eq!(index.buffer(), "Hello world");
        assert_eq!(index.entries().len(), 2);
        assert_eq!(index.entries()[1].start, 6);
        assert!(index.is_consistent());
    }

    #[test]
    fn test_collapse_across_leaves_and_trim() {
        let (_, index) = index_of(NodeSpec::element(
            "body",
            vec![
                NodeSpec::text("\n  "),
                NodeSpec::element("p", vec![NodeSpec::text("  Read\u{00A0} ")]),
                NodeSpec::text("\n\n"),
                NodeSpec::element("a", vec![NodeSpec::text(" more ")]),
                NodeSpec::text("  "),
            ],
        ));
        assert_eq!(index.buffer(), "Read more");
        assert!(index.is_consistent());
        let more = index.entry_at(6).unwrap();
        assert_eq!(more.text, "more");
        assert_eq!(more.lead_skip, 1);
    }

    #[test]
    fn test_case_and_punctuation_kept() {
        let (_, index) = index_of(NodeSpec::element("p", vec![NodeSpec::text("Wait...  WHAT?!")]));
        assert_eq!(index.buffer(), "Wait... WHAT?!");
    }

    #[test]
    fn test_excluded_subtrees_not_indexed() {
        let (_, index) = index_of(NodeSpec::element(
            "body",
            vec![
                NodeSpec::text("before "),
                NodeSpec::element("style", vec![NodeSpec::text("p{}")]),
                NodeSpec::element("input", vec![]).with_attr("value", "typed"),
                NodeSpec::text("after"),
            ],
        ));
        assert_eq!(index.buffer(), "before after");
    }

    #[test]
    fn test_entry_lookup_by_binary_search() {
        let (_, index) = index_of(NodeSpec::element(
            "p",
            vec![NodeSpec::text("ab "), NodeSpec::text("cd "), NodeSpec::text("ef")],
        ));
        assert_eq!(index.entry_index_at(0), Some(0));
        assert_eq!(index.entry_index_at(3), Some(1));
        assert_eq!(index.entry_index_at(7), Some(2));
        assert_eq!(index.entry_index_at(8), None);

        let covered = index.overlapping(1, 4);
        assert_eq!(covered.len(), 2);
        assert_eq!(covered[0].local_overlap(1, 4), Some(1..3));
        assert_eq!(covered[1].local_overlap(1, 4), Some(0..1));
        assert!(index.overlapping(4, 4).is_empty());
    }

    #[test]
    fn test_slice_clamps() {
        let (_, index) = index_of(NodeSpec::text("caf\u{e9}"));
        assert_eq!(index.slice(0, 100), "caf\u{e9}");
        assert_eq!(index.slice(5, 100), "");
        assert_eq!(index.clamp(4), 3);
    }

    #[test]
    fn test_indexer_throttles_unless_forced() {
        let doc = Document::from_spec(&NodeSpec::text("x")).unwrap();
        let config = EngineConfig::default();
        let mut indexer = Indexer::new(Duration::from_millis(300));
        let t0 = Instant::now();

        let first = indexer.rebuild(&doc, &config, t0, false).unwrap();
        assert_eq!(first.version(), 1);
        assert!(indexer.rebuild(&doc, &config, t0 + Duration::from_millis(100), false).is_none());

        let forced = indexer.rebuild(&doc, &config, t0 + Duration::from_millis(100), true).unwrap();
        assert_eq!(forced.version(), 2);
        assert!(indexer.rebuild(&doc, &config, t0 + Duration::from_millis(450), false).is_some());
    }
}

//! Chunk locator.
//!
//! Maps an externally reported fragment (a narration chunk) onto the current
//! buffer. The fragment may not byte-match the buffer: the reporter
//! normalizes differently, or the tree moved under us. So the search walks a
//! ladder of progressively weaker strategies and takes the first hit:
//!
//! 1. the whole fragment, within a window around the expected offset
//! 2. the whole fragment, anywhere
//! 3. the fragment's head (60 chars by default)
//! 4. shrinking prefixes, 80 down to 12 chars in steps of 12
//!
//! Every step picks the occurrence nearest the expected offset.

use std::ops::Range;

use memchr::memmem;

use crate::config::EngineConfig;
use crate::index::normalize::{char_prefix, char_to_byte, floor_char_boundary};
use crate::index::{Normalized, TextIndex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLocator {
    window: usize,
    head_chars: usize,
    prefix_max: usize,
    prefix_min: usize,
    prefix_step: usize,
}

impl ChunkLocator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            window: config.search_window,
            head_chars: config.head_prefix_chars,
            prefix_max: config.prefix_max_chars,
            prefix_min: config.prefix_min_chars.max(1),
            prefix_step: config.prefix_step_chars.max(1),
        }
    }

    /// Buffer offset where `chunk` (normalized) starts, or `None` when no
    /// strategy matches.
    pub fn locate(&self, index: &TextIndex, chunk: &str, approx: usize) -> Option<usize> {
        let norm = Normalized::trimmed(chunk);
        self.locate_normalized(index, norm.as_str(), approx)
    }

    /// Buffer offset of the `char_index`-th character of `chunk`.
    ///
    /// The local index counts chars of the raw chunk and is carried through
    /// the chunk's own whitespace normalization before being added to the
    /// located start.
    pub fn resolve(
        &self,
        index: &TextIndex,
        chunk: &str,
        char_index: usize,
        approx: usize,
    ) -> Option<usize> {
        let norm = Normalized::trimmed(chunk);
        let start = self.locate_normalized(index, norm.as_str(), approx)?;
        let local = norm.from_raw(char_to_byte(chunk, char_index));
        Some(index.clamp(start + local))
    }

    fn locate_normalized(&self, index: &TextIndex, needle: &str, approx: usize) -> Option<usize> {
        if needle.is_empty() || index.is_empty() {
            return None;
        }
        let buffer = index.buffer();
        let approx = approx.min(buffer.len());

        let lo = floor_char_boundary(buffer, approx.saturating_sub(self.window));
        let hi = floor_char_boundary(buffer, approx.saturating_add(self.window + needle.len()));
        if let Some(pos) = nearest(buffer, needle, lo..hi, approx) {
            tracing::trace!(pos, "chunk found in window");
            return Some(pos);
        }
        if let Some(pos) = nearest(buffer, needle, 0..buffer.len(), approx) {
            tracing::trace!(pos, "chunk found in full buffer");
            return Some(pos);
        }

        for chars in self.prefix_ladder() {
            let prefix = char_prefix(needle, chars);
            if prefix.len() >= needle.len() || prefix.chars().count() < self.prefix_min {
                continue;
            }
            if let Some(pos) = nearest(buffer, prefix, 0..buffer.len(), approx) {
                tracing::debug!(pos, prefix_chars = chars, "chunk found by prefix");
                return Some(pos);
            }
        }

        tracing::debug!(chunk_len = needle.len(), "chunk not found");
        None
    }

    /// Head length first, then `max, max - step, ...` above the floor, then
    /// the floor itself.
    fn prefix_ladder(&self) -> Vec<usize> {
        let mut ladder = vec![self.head_chars];
        let mut n = self.prefix_max;
        while n > self.prefix_min {
            ladder.push(n);
            n = n.saturating_sub(self.prefix_step);
        }
        ladder.push(self.prefix_min);
        ladder
    }
}

/// Occurrence of `needle` inside `haystack[range]` closest to `approx`.
pub(crate) fn nearest(haystack: &str, needle: &str, range: Range<usize>, approx: usize) -> Option<usize> {
    if range.end <= range.start || range.end - range.start < needle.len() {
        return None;
    }
    let scope = &haystack.as_bytes()[range.start..range.end];
    let mut best: Option<usize> = None;
    for hit in memmem::find_iter(scope, needle.as_bytes()) {
        let pos = range.start + hit;
        match best {
            Some(b) if b.abs_diff(approx) <= pos.abs_diff(approx) => break,
            _ => best = Some(pos),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ContentTree, Document, NodeSpec};

    fn index_of(texts: &[&str]) -> TextIndex {
        let spec = NodeSpec::element("p", texts.iter().map(|t| NodeSpec::text(*t)).collect());
        let doc = Document::from_spec(&spec).unwrap();
        TextIndex::build(&doc, doc.root(), &EngineConfig::default(), 1)
    }

    #[test]
    fn test_exact_chunk_nearest_to_hint() {
        let index = index_of(&["the cat and the cat and the cat"]);
        let locator = ChunkLocator::new(&EngineConfig::default());

        assert_eq!(locator.locate(&index, "the cat", 0), Some(0));
        assert_eq!(locator.locate(&index, "the cat", 12), Some(12));
        assert_eq!(locator.locate(&index, "the cat", 30), Some(24));
    }

    #[test]
    fn test_whitespace_drift_is_normalized() {
        let index = index_of(&["Hello ", "world"]);
        let locator = ChunkLocator::new(&EngineConfig::default());

        assert_eq!(locator.locate(&index, "  Hello\n\tworld ", 0), Some(0));
        assert_eq!(locator.resolve(&index, "Hello world", 6, 0), Some(6));
        assert_eq!(locator.resolve(&index, "Hello    world", 9, 0), Some(6));
    }

    #[test]
    fn test_outside_window_falls_back_to_full_search() {
        let filler = "x".repeat(20_000);
        let text = format!("needle here {filler}");
        let index = index_of(&[text.as_str()]);
        let locator = ChunkLocator::new(&EngineConfig::default());

        assert_eq!(locator.locate(&index, "needle here", 19_000), Some(0));
    }

    #[test]
    fn test_prefix_fallback() {
        let index = index_of(&["The quick brown fox jumps over the lazy dog."]);
        let locator = ChunkLocator::new(&EngineConfig::default());

        // tail drifted: only a prefix still matches
        assert_eq!(
            locator.locate(&index, "quick brown fox leaps over a sleepy cat", 0),
            Some(4)
        );
    }

    #[test]
    fn test_not_found() {
        let index = index_of(&["The quick brown fox"]);
        let locator = ChunkLocator::new(&EngineConfig::default());

        assert_eq!(locator.locate(&index, "completely unrelated text here", 0), None);
        assert_eq!(locator.locate(&index, "   ", 0), None);
        assert_eq!(locator.locate(&TextIndex::empty(), "fox", 0), None);
    }

    #[test]
    fn test_prefix_ladder() {
        let locator = ChunkLocator::new(&EngineConfig::default());
        assert_eq!(locator.prefix_ladder(), vec![60, 80, 68, 56, 44, 32, 20, 12]);
    }
}

pub mod resolve;
pub mod viewport;

use std::ops::Range;

use crate::config::EngineConfig;
use crate::error::{Diagnostics, EngineError};
use crate::index::normalize::{floor_char_boundary, is_space};
use crate::index::TextIndex;
use crate::tree::{ContentTree, NodeId, TreeError};

pub use resolve::{resolve_span, LiveSpan, SpanMatch};
pub use viewport::{FixedLayout, Layout, Rect, Viewport};

/// One leaf's contribution to the wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CapturedSpan {
    leaf: NodeId,
    original: String,
    cut: Range<usize>,          // raw byte range moved into the wrapper
    piece: NodeId,              // text leaf inside the wrapper
    tail: Option<NodeId>,       // split-off remainder after the cut
}

impl CapturedSpan {
    fn head(&self) -> &str {
        &self.original[..self.cut.start]
    }

    fn rest(&self) -> &str {
        &self.original[self.cut.end..]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightWrapper {
    element: NodeId,
    range: Range<usize>,
    version: u64,
    spans: Vec<CapturedSpan>,
}

impl HighlightWrapper {
    pub fn element(&self) -> NodeId {
        self.element
    }

    /// Buffer range requested, after clamping.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Index version the range was resolved against.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Leaves the wrapper took text from, in order.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.spans.iter().map(|s| s.leaf)
    }

    fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(self.element)
            .chain(self.spans.iter().map(|s| s.piece))
            .chain(self.spans.iter().filter_map(|s| s.tail))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HighlightResult {
    /// Same start as the current highlight; nothing done.
    Unchanged,
    Highlighted(Range<usize>),
    /// Empty range, or no covered leaf could be resolved.
    Nothing,
}

/// Holds at most one wrapper. Each covered leaf is cut at its span and the
/// span moved into the wrapper, which sits after the first affected leaf.
#[derive(Debug)]
pub struct Highlighter {
    current: Option<HighlightWrapper>,
    pending_scroll: Option<NodeId>,
    wrapper_tag: String,
    wrapper_class: String,
    live_prefix_chars: usize,
    widen_on_failure: bool,
    scroll_margin: f32,
}

impl Highlighter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            current: None,
            pending_scroll: None,
            wrapper_tag: config.wrapper_tag.clone(),
            wrapper_class: config.wrapper_class.clone(),
            live_prefix_chars: config.live_prefix_chars,
            widen_on_failure: config.widen_on_failure,
            scroll_margin: config.scroll_margin,
        }
    }

    pub fn current(&self) -> Option<&HighlightWrapper> {
        self.current.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Whether `node` is the wrapper or one of the nodes it created.
    pub fn owns(&self, node: NodeId) -> bool {
        self.current
            .as_ref()
            .is_some_and(|w| w.nodes().any(|n| n == node))
    }

    /// Whether a request starting at `start` would be a no-op. A wrapper
    /// resolved against another index version never matches: its offsets
    /// point into a buffer that no longer exists.
    pub fn is_current_start(&self, index: &TextIndex, start: usize) -> bool {
        let start = index.clamp(start);
        self.current
            .as_ref()
            .is_some_and(|w| w.version == index.version() && w.range.start == start)
    }

    pub fn highlight_range<T: ContentTree + ?Sized>(
        &mut self,
        tree: &mut T,
        index: &TextIndex,
        start: usize,
        end: usize,
        diag: &mut Diagnostics,
    ) -> HighlightResult {
        let start = index.clamp(start);
        let end = index.clamp(end);
        if self.is_current_start(index, start) {
            return HighlightResult::Unchanged;
        }
        self.clear(tree, diag);
        if start >= end {
            return HighlightResult::Nothing;
        }

        let mut wrapper: Option<NodeId> = None;
        let mut spans = Vec::new();
        for entry in index.overlapping(start, end) {
            let Some(local) = entry.local_overlap(start, end) else {
                continue;
            };
            if !tree.is_attached(entry.node) {
                diag.record(EngineError::NodeDetached(entry.node));
                continue;
            }
            let Some(live) = tree.text(entry.node).map(str::to_owned) else {
                diag.record(EngineError::NodeDetached(entry.node));
                continue;
            };
            let Some(span) = resolve_span(
                &live,
                entry,
                local,
                self.live_prefix_chars,
                self.widen_on_failure,
            ) else {
                tracing::debug!(leaf = %entry.node, "span not found in live leaf, skipped");
                continue;
            };
            if span.how == SpanMatch::Widened {
                tracing::warn!(leaf = %entry.node, "highlight widened to whole leaf");
            }
            if span.raw.is_empty() {
                continue;
            }
            match self.cut(tree, entry.node, live, span.raw, &mut wrapper) {
                Ok(captured) => spans.push(captured),
                Err(err) => diag.record(err.into()),
            }
        }

        let Some(element) = wrapper else {
            return HighlightResult::Nothing;
        };
        self.current = Some(HighlightWrapper {
            element,
            range: start..end,
            version: index.version(),
            spans,
        });
        self.pending_scroll = Some(element);
        HighlightResult::Highlighted(start..end)
    }

    /// Highlight the whitespace-delimited word at `offset`.
    pub fn highlight_word<T: ContentTree + ?Sized>(
        &mut self,
        tree: &mut T,
        index: &TextIndex,
        offset: usize,
        diag: &mut Diagnostics,
    ) -> HighlightResult {
        match word_bounds(index.buffer(), offset) {
            Some(range) => self.highlight_range(tree, index, range.start, range.end, diag),
            None => HighlightResult::Nothing,
        }
    }

    /// Cut `raw` out of `leaf` and move it into the wrapper, creating the
    /// wrapper on the first call.
    fn cut<T: ContentTree + ?Sized>(
        &self,
        tree: &mut T,
        leaf: NodeId,
        original: String,
        raw: Range<usize>,
        wrapper: &mut Option<NodeId>,
    ) -> Result<CapturedSpan, TreeError> {
        let parent = tree.parent(leaf).ok_or(TreeError::UnknownNode(leaf))?;
        let next = tree.next_sibling(leaf);

        let piece = tree.create_text(&original[raw.clone()]);
        let element = match *wrapper {
            Some(element) => element,
            None => {
                let element = tree.create_element(&self.wrapper_tag);
                tree.set_attribute(element, "class", &self.wrapper_class)?;
                tree.insert_before(parent, element, next)?;
                *wrapper = Some(element);
                element
            }
        };
        tree.insert_before(element, piece, None)?;

        // `next` is still the leaf's old successor, so the tail lands right
        // after the wrapper (first leaf) or right after the leaf (others).
        let tail = if raw.end < original.len() {
            let tail = tree.create_text(&original[raw.end..]);
            tree.insert_before(parent, tail, next)?;
            Some(tail)
        } else {
            None
        };
        tree.set_text(leaf, &original[..raw.start])?;

        Ok(CapturedSpan {
            leaf,
            original,
            cut: raw,
            piece,
            tail,
        })
    }

    /// Remove the wrapper, putting every leaf back. Returns `false` when
    /// nothing was highlighted.
    pub fn clear<T: ContentTree + ?Sized>(&mut self, tree: &mut T, diag: &mut Diagnostics) -> bool {
        let Some(wrapper) = self.current.take() else {
            return false;
        };
        self.pending_scroll = None;

        for span in &wrapper.spans {
            let tail_intact = match span.tail {
                Some(tail) => tree.is_attached(tail) && tree.text(tail) == Some(span.rest()),
                None => true,
            };
            let intact = tail_intact
                && tree.is_attached(span.leaf)
                && tree.text(span.leaf) == Some(span.head());

            if intact {
                if let Some(tail) = span.tail {
                    if let Err(err) = tree.remove(tail) {
                        diag.record(err.into());
                    }
                }
                if let Err(err) = tree.set_text(span.leaf, &span.original) {
                    diag.record(err.into());
                }
                if let Err(err) = tree.remove(span.piece) {
                    diag.record(err.into());
                }
                continue;
            }

            tracing::debug!(leaf = %span.leaf, "leaf changed under highlight, reinserting text");
            if !tree.is_attached(span.leaf) {
                diag.record(EngineError::NodeDetached(span.leaf));
            }
            let reinserted = tree.parent(wrapper.element).map(|parent| {
                tree.insert_before(parent, span.piece, Some(wrapper.element))
            });
            if let Some(Err(err)) = reinserted {
                diag.record(err.into());
            }
        }

        if tree.kind(wrapper.element).is_some() {
            if let Err(err) = tree.remove(wrapper.element) {
                diag.record(err.into());
            }
        }
        true
    }

    /// Frame callback: now that layout is known, scroll the wrapper into view
    /// unless it is already visible. Returns whether a scroll happened.
    pub fn on_frame<T, L>(&mut self, tree: &T, layout: &mut L) -> bool
    where
        T: ContentTree + ?Sized,
        L: Layout + ?Sized,
    {
        let Some(element) = self.pending_scroll.take() else {
            return false;
        };
        if !tree.is_attached(element) {
            return false;
        }
        let Some(rect) = layout.bounding_rect(element) else {
            return false;
        };
        let viewport = Viewport::new(layout.viewport(), self.scroll_margin);
        if viewport.is_visible(&rect) {
            return false;
        }
        layout.scroll_into_view(element);
        true
    }
}

/// Bounds of the non-whitespace run at `offset`. On whitespace, the next
/// word to the right is used.
pub fn word_bounds(buffer: &str, offset: usize) -> Option<Range<usize>> {
    let mut offset = floor_char_boundary(buffer, offset);
    if let Some(skip) = buffer[offset..].find(|c: char| !is_space(c)) {
        offset += skip;
    } else {
        return None;
    }

    let start = buffer[..offset]
        .char_indices()
        .rev()
        .find(|&(_, c)| is_space(c))
        .map_or(0, |(i, c)| i + c.len_utf8());
    let end = buffer[offset..]
        .find(is_space)
        .map_or(buffer.len(), |i| offset + i);
    Some(start..end)
}

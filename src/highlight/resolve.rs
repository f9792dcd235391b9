use std::ops::Range;

use crate::index::normalize::{char_prefix, floor_char_boundary};
use crate::index::{NodeMapEntry, Normalized};
use crate::locate::nearest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanMatch {
    Exact,
    Nearest,
    Prefix,
    Widened,
}

/// Raw byte range in the live leaf text, and how it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSpan {
    pub raw: Range<usize>,
    pub how: SpanMatch,
}

pub fn resolve_span(
    live: &str,
    entry: &NodeMapEntry,
    local: Range<usize>,
    prefix_chars: usize,
    widen: bool,
) -> Option<LiveSpan> {
    let norm = Normalized::collapse(live);
    let text = norm.as_str();
    let want = entry.text.get(local.clone())?;
    let expected = local.start + entry.lead_skip;

    let found = if text.get(expected..expected + want.len()) == Some(want) {
        Some((expected..expected + want.len(), SpanMatch::Exact))
    } else if let Some(pos) = nearest(text, want, 0..text.len(), expected) {
        Some((pos..pos + want.len(), SpanMatch::Nearest))
    } else {
        let prefix = char_prefix(want, prefix_chars);
        (prefix.len() < want.len() && !prefix.trim().is_empty())
            .then(|| nearest(text, prefix, 0..text.len(), expected))
            .flatten()
            .map(|pos| {
                let end = floor_char_boundary(text, pos + want.len());
                (pos..end, SpanMatch::Prefix)
            })
    };

    match found {
        Some((range, how)) => Some(LiveSpan {
            raw: norm.raw_range(range),
            how,
        }),
        None if widen && !live.is_empty() => Some(LiveSpan {
            raw: 0..live.len(),
            how: SpanMatch::Widened,
        }),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ContentTree, Document};

    fn entry(text: &str, lead_skip: usize) -> NodeMapEntry {
        let id = Document::new().root();
        NodeMapEntry {
            node: id,
            start: 0,
            end: text.len(),
            text: text.to_string(),
            lead_skip,
        }
    }

    #[test]
    fn test_exact_at_expected_position() {
        let e = entry("the cat saw the dog", 0);
        let span = resolve_span("the cat saw the dog", &e, 12..15, 12, true).unwrap();
        assert_eq!(span, LiveSpan { raw: 12..15, how: SpanMatch::Exact });
    }

    #[test]
    fn test_raw_whitespace_is_mapped_back() {
        let e = entry("Read more", 1);
        let live = "\n   Read\n   more";
        let span = resolve_span(live, &e, 5..9, 12, true).unwrap();
        assert_eq!(&live[span.raw.clone()], "more");
        assert_eq!(span.how, SpanMatch::Exact);
    }

    #[test]
    fn test_drifted_leaf_uses_nearest() {
        let e = entry("one two three", 0);
        let live = "zero one two three";
        let span = resolve_span(live, &e, 4..7, 12, true).unwrap();
        assert_eq!(&live[span.raw], "two");
    }

    #[test]
    fn test_prefix_then_widen() {
        let e = entry("a very long sentence here", 0);
        let live = "a very long sentinel there";
        let span = resolve_span(live, &e, 0..25, 12, true).unwrap();
        assert_eq!(span.how, SpanMatch::Prefix);
        assert_eq!(span.raw.start, 0);

        let gone = resolve_span("nothing alike", &e, 0..25, 12, true).unwrap();
        assert_eq!(gone, LiveSpan { raw: 0..13, how: SpanMatch::Widened });
        assert!(resolve_span("nothing alike", &e, 0..25, 12, false).is_none());
    }
}

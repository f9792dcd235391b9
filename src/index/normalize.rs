use std::ops::Range;

#[inline]
pub fn is_space(c: char) -> bool {
    c.is_whitespace() || c == '\u{00A0}'
}

/// Collapsed text plus, for every byte of it, the raw byte it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    text: String,
    // offsets.len() == text.len() + 1; the last slot is the raw length
    offsets: Vec<usize>,
}

impl Normalized {
    /// Collapse whitespace runs without trimming.
    pub fn collapse(raw: &str) -> Self {
        let mut text = String::with_capacity(raw.len());
        let mut offsets = Vec::with_capacity(raw.len() + 1);
        let mut in_space = false;

        for (pos, ch) in raw.char_indices() {
            if is_space(ch) {
                if !in_space {
                    text.push(' ');
                    offsets.push(pos);
                    in_space = true;
                }
                continue;
            }
            in_space = false;
            text.push(ch);
            offsets.extend(pos..pos + ch.len_utf8());
        }
        offsets.push(raw.len());

        Self { text, offsets }
    }

    /// Collapse and trim both ends.
    pub fn trimmed(raw: &str) -> Self {
        let mut norm = Self::collapse(raw);
        if norm.text.ends_with(' ') {
            norm.text.pop();
            // the end sentinel moves back to where the trailing run began
            let end = norm.offsets[norm.text.len()];
            norm.offsets.truncate(norm.text.len());
            norm.offsets.push(end);
        }
        if norm.text.starts_with(' ') {
            norm.text.remove(0);
            norm.offsets.remove(0);
        }
        norm
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Raw byte range covering the normalized range `range`.
    pub fn raw_range(&self, range: Range<usize>) -> Range<usize> {
        let start = range.start.min(self.text.len());
        let end = range.end.clamp(start, self.text.len());
        self.offsets[start]..self.offsets[end]
    }

    /// Normalized offset of the raw byte `raw`: the last normalized byte
    /// whose source is at or before it.
    pub fn from_raw(&self, raw: usize) -> usize {
        let pos = self.offsets.partition_point(|&o| o <= raw);
        let mut n = pos.saturating_sub(1).min(self.text.len());
        while !self.text.is_char_boundary(n) {
            n -= 1;
        }
        n
    }
}

/// Collapse and trim, discarding the offset map.
pub fn normalize(raw: &str) -> String {
    Normalized::trimmed(raw).into_string()
}

/// Byte offset of the `char_index`-th char of `text`, clamped to its length.
pub fn char_to_byte(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map_or(text.len(), |(byte_idx, _)| byte_idx)
}

/// Largest char boundary of `text` at or below `offset`.
pub fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Longest prefix of `text` holding at most `chars` characters.
pub fn char_prefix(text: &str, chars: usize) -> &str {
    &text[..char_to_byte(text, chars)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_runs_and_nbsp() {
        let norm = Normalized::collapse("a \t\n b\u{00A0}\u{00A0}c ");
        assert_eq!(norm.as_str(), "a b c ");
    }

    #[test]
    fn test_trimmed() {
        assert_eq!(normalize("  Hello,   World!  "), "Hello, World!");
        assert_eq!(normalize(" \n "), "");
        assert_eq!(normalize("CaSe?"), "CaSe?");
    }

    #[test]
    fn test_raw_range_spans_collapsed_run() {
        let raw = "one   two";
        let norm = Normalized::collapse(raw);
        assert_eq!(norm.as_str(), "one two");
        // "two" in normalized space starts at 4
        assert_eq!(&raw[norm.raw_range(4..7)], "two");
        // the collapsed space maps back to the whole run
        assert_eq!(&raw[norm.raw_range(3..4)], "   ");
    }

    #[test]
    fn test_trimmed_offsets() {
        let raw = "  ab  ";
        let norm = Normalized::trimmed(raw);
        assert_eq!(norm.as_str(), "ab");
        assert_eq!(norm.raw_range(0..2), 2..4);
        assert_eq!(norm.from_raw(3), 1);
    }

    #[test]
    fn test_from_raw_inside_run() {
        let norm = Normalized::collapse("a    b");
        assert_eq!(norm.from_raw(0), 0);
        assert_eq!(norm.from_raw(3), 1);
        assert_eq!(norm.from_raw(5), 2);
    }

    #[test]
    fn test_multibyte() {
        let raw = "caf\u{e9}  ol\u{e9}";
        let norm = Normalized::collapse(raw);
        assert_eq!(norm.as_str(), "caf\u{e9} ol\u{e9}");
        assert_eq!(&raw[norm.raw_range(6..10)], "ol\u{e9}");
        assert_eq!(char_to_byte("caf\u{e9}x", 4), 5);
        assert_eq!(floor_char_boundary("\u{e9}", 1), 0);
        assert_eq!(char_prefix("h\u{e9}llo", 2), "h\u{e9}");
    }
}

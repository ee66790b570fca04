//! Byte-offset ⇄ line/column conversion.
//!
//! The incremental parser's cache (C7) needs to translate editor-protocol
//! `{line, character}` ranges into byte offsets within the cached document
//! text, and back. [`LineIndex`] builds a table of newline offsets once per
//! document and answers both directions in O(log n).

use text_size::TextSize;

/// A 0-based line/column pair, as used by the editor-protocol boundary
/// (distinct from [`super::Position`], which is 1-based and used
/// everywhere else in the crate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

/// Maps byte offsets to 0-based line/column and back, for a fixed snapshot
/// of document text.
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    /// Byte offset of the start of each line (line 0 always starts at 0).
    newlines: Vec<TextSize>,
    len: TextSize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut newlines = vec![TextSize::from(0)];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                newlines.push(TextSize::from(i as u32 + 1));
            }
        }
        Self { newlines, len: TextSize::from(text.len() as u32) }
    }

    pub fn line_count(&self) -> usize {
        self.newlines.len()
    }

    /// Convert a byte offset into a 0-based line/column pair.
    pub fn line_col(&self, offset: TextSize) -> LineCol {
        let offset = offset.min(self.len);
        let line = match self.newlines.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert_at) => insert_at - 1,
        };
        let col = u32::from(offset) - u32::from(self.newlines[line]);
        LineCol { line: line as u32, col }
    }

    /// Convert a 0-based line/column pair into a byte offset, clamped to
    /// the document's bounds.
    pub fn offset(&self, line_col: LineCol) -> TextSize {
        let line = (line_col.line as usize).min(self.newlines.len() - 1);
        let line_start = self.newlines[line];
        let next_line_start = self.newlines.get(line + 1).copied().unwrap_or(self.len);
        let candidate = u32::from(line_start) + line_col.col;
        TextSize::from(candidate.min(u32::from(next_line_start)))
    }

    /// Byte offset of the start of the given 0-based line, if in range.
    pub fn line_start(&self, line: u32) -> Option<TextSize> {
        self.newlines.get(line as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_round_trips() {
        let text = "alpha\nbeta\ngamma";
        let idx = LineIndex::new(text);
        let beta_b = TextSize::from(text.find('b').unwrap() as u32);
        let lc = idx.line_col(beta_b);
        assert_eq!(lc, LineCol { line: 1, col: 0 });
        assert_eq!(idx.offset(lc), beta_b);
    }

    #[test]
    fn line_start_of_first_line_is_zero() {
        let idx = LineIndex::new("hello\nworld");
        assert_eq!(idx.line_start(0), Some(TextSize::from(0)));
        assert_eq!(idx.line_start(1), Some(TextSize::from(6)));
        assert_eq!(idx.line_start(2), None);
    }
}

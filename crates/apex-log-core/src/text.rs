//! Byte-offset / line-column conversions for Apex source text.
//!
//! Adapted from the teacher's LSP-oriented `LineIndex` (UTF-16 columns for
//! protocol compatibility); `apex-symbols` only ever needs byte columns, so
//! the UTF-16-specific conversions are dropped and this stays a plain
//! byte-offset index.

pub use text_size::{TextRange, TextSize};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

/// Pre-computed line start/end offsets for a particular text snapshot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LineIndex {
    line_starts: Vec<TextSize>,
    line_ends: Vec<TextSize>,
    text_len: TextSize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut line_starts = Vec::with_capacity(128);
        let mut line_ends = Vec::with_capacity(128);
        line_starts.push(TextSize::from(0));

        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => {
                    line_ends.push(TextSize::from(i as u32));
                    line_starts.push(TextSize::from((i + 1) as u32));
                    i += 1;
                }
                b'\r' => {
                    if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                        line_ends.push(TextSize::from(i as u32));
                        line_starts.push(TextSize::from((i + 2) as u32));
                        i += 2;
                    } else {
                        line_ends.push(TextSize::from(i as u32));
                        line_starts.push(TextSize::from((i + 1) as u32));
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        }

        line_ends.push(TextSize::from(text.len() as u32));

        Self {
            line_starts,
            line_ends,
            text_len: TextSize::from(text.len() as u32),
        }
    }

    #[inline]
    pub fn text_len(&self) -> TextSize {
        self.text_len
    }

    #[inline]
    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }

    #[inline]
    pub fn line_start(&self, line: u32) -> Option<TextSize> {
        self.line_starts.get(line as usize).copied()
    }

    fn line_index(&self, offset: TextSize) -> usize {
        let offset = offset.min(self.text_len);
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(insert) => insert.saturating_sub(1),
        }
    }

    /// Convert a byte offset to a byte-column line/column pair.
    pub fn line_col(&self, offset: TextSize) -> LineCol {
        let offset = offset.min(self.text_len);
        let line = self.line_index(offset);
        let line_start = self.line_starts[line];
        let line_end = self.line_ends[line];
        let col = offset.min(line_end) - line_start;
        LineCol {
            line: line as u32,
            col: u32::from(col),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn line_col_across_multiple_lines() {
        let text = "class C {\n  void m() {\n    int x = 1;\n  }\n}\n";
        let index = LineIndex::new(text);
        assert_eq!(index.line_count(), 6);

        let offset_of_int = text.find("int").unwrap() as u32;
        let lc = index.line_col(TextSize::from(offset_of_int));
        assert_eq!(lc, LineCol { line: 2, col: 4 });
    }

    #[test]
    fn line_col_handles_crlf() {
        let text = "a\r\nb\r\nc";
        let index = LineIndex::new(text);
        let offset_of_c = text.find('c').unwrap() as u32;
        let lc = index.line_col(TextSize::from(offset_of_c));
        assert_eq!(lc, LineCol { line: 2, col: 0 });
    }
}

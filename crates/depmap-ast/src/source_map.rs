//! Byte-offset to line-number mapping.
//!
//! `rustpython-ast` nodes carry `TextRange` byte offsets; entities want
//! 1-based line numbers. The index is built once per file and queried with a
//! binary search.

use rustpython_ast::text_size::TextRange;

#[derive(Debug)]
pub(crate) struct LineIndex {
    /// Byte offset at which each line starts; `line_starts[0] == 0`.
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (offset, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(offset + 1);
            }
        }
        Self { line_starts }
    }

    /// 1-based line containing the given byte offset.
    pub(crate) fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|&start| start <= offset)
    }

    /// 1-based line at which a node's range starts.
    pub(crate) fn line_of_range(&self, range: &TextRange) -> usize {
        self.line_of(usize::from(range.start()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_lookup() {
        let index = LineIndex::new("a\nbb\nccc\n");
        assert_eq!(index.line_of(0), 1);
        assert_eq!(index.line_of(1), 1);
        assert_eq!(index.line_of(2), 2);
        assert_eq!(index.line_of(4), 2);
        assert_eq!(index.line_of(5), 3);
        assert_eq!(index.line_of(8), 3);
    }

    #[test]
    fn test_empty_source() {
        let index = LineIndex::new("");
        assert_eq!(index.line_of(0), 1);
    }

    #[test]
    fn test_offset_past_end_clamps_to_last_line() {
        let index = LineIndex::new("x\ny");
        assert_eq!(index.line_of(100), 2);
    }
}

/// Span tracking for source positions
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A region of source text (byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// A one-character span at the given offset
    pub fn at(pos: usize) -> Self {
        Span {
            start: pos,
            end: pos + 1,
        }
    }

    /// Covers from the start of one span to the end of another
    pub fn merge(start: Span, end: Span) -> Self {
        Span {
            start: start.start,
            end: end.end,
        }
    }

    /// Convert to a Range for use with ariadne
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Dummy span for synthetic nodes
    pub fn dummy() -> Self {
        Span { start: 0, end: 0 }
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span {
            start: range.start,
            end: range.end,
        }
    }
}

impl From<Span> for Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

/// Byte range of the 1-based line `line` within `source`; used to point
/// diagnostics at statement lines, which only carry line numbers.
pub fn line_range(source: &str, line: usize) -> Range<usize> {
    let mut current = 1;
    let mut start = 0;
    for (i, ch) in source.char_indices() {
        if current == line && ch == '\n' {
            return start..i;
        }
        if ch == '\n' {
            current += 1;
            start = i + 1;
        }
    }
    if current == line {
        start..source.len()
    } else {
        0..source.len().min(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge() {
        let merged = Span::merge(Span::new(2, 4), Span::new(6, 9));
        assert_eq!(merged, Span::new(2, 9));
    }

    #[test]
    fn test_line_range() {
        let source = "a = 1;\nb = 2;\nc = 3;";
        assert_eq!(&source[line_range(source, 1)], "a = 1;");
        assert_eq!(&source[line_range(source, 2)], "b = 2;");
        assert_eq!(&source[line_range(source, 3)], "c = 3;");
    }
}

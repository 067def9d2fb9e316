use serde::{Deserialize, Serialize};

/// Source location of a token or AST node in the original rule text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the start in the source.
    pub offset: usize,
    /// Length in bytes.
    pub length: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
}

impl Span {
    pub fn new(offset: usize, length: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            length,
            line,
            column,
        }
    }

    pub fn dummy() -> Self {
        Self {
            offset: 0,
            length: 0,
            line: 0,
            column: 0,
        }
    }

    pub fn merge(self, other: Span) -> Span {
        let start = self.offset.min(other.offset);
        let end = (self.offset + self.length).max(other.offset + other.length);
        let (line, column) = if self.offset <= other.offset {
            (self.line, self.column)
        } else {
            (other.line, other.column)
        };
        Span {
            offset: start,
            length: end - start,
            line,
            column,
        }
    }

    /// A short excerpt of `source` covering this span, used in diagnostics.
    pub fn snippet<'a>(&self, source: &'a str) -> &'a str {
        let end = (self.offset + self.length).min(source.len());
        let start = self.offset.min(end);
        &source[start..end]
    }
}

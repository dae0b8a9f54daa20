//! Source location tracking.

use std::fmt;
use std::path::PathBuf;

/// A span in the source code. Lines and columns are 1-based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub file: PathBuf,
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Span {
    pub fn new(file: PathBuf, start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Self {
            file,
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Span used for values that have no source position (builtins, externals).
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.start_line == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return write!(f, "-");
        }
        write!(f, "{}:{}:{}", self.file.display(), self.start_line, self.start_col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_position() {
        let span = Span::new(PathBuf::from("app/swipe.go"), 12, 3, 12, 40);
        assert_eq!(span.to_string(), "app/swipe.go:12:3");
    }

    #[test]
    fn test_unknown_span() {
        assert_eq!(Span::unknown().to_string(), "-");
        assert!(Span::unknown().is_unknown());
    }
}

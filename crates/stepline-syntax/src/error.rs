//! Compile errors.

use thiserror::Error;

/// Source that does not compile.
///
/// Line and column are 1-based; the column counts bytes from the line start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line}, column {column})")]
pub struct CompileError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl CompileError {
    pub fn new(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }

    /// Shorthand for the generic parser rejection.
    pub fn invalid_syntax(line: u32, column: u32) -> Self {
        Self::new("invalid syntax", line, column)
    }
}

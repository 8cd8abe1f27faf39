//! Logical line scanner.
//! - LineIndex: byte offset to 1-based line/column
//! - logical_lines: join physical lines the way Python does and measure indentation

use text_size::{TextRange, TextSize};

use crate::error::CompileError;
use crate::lexer::{Lexer, TokenKind};

const TAB_WIDTH: u32 = 8;

/// Maps byte offsets to 1-based line and column numbers.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<TextSize>,
}

impl LineIndex {
    #[must_use]
    pub fn new(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut starts = vec![TextSize::from(0)];
        for (idx, byte) in bytes.iter().enumerate() {
            let is_break = match byte {
                b'\n' => true,
                b'\r' => bytes.get(idx + 1) != Some(&b'\n'),
                _ => false,
            };
            if is_break {
                starts.push(TextSize::from(idx as u32 + 1));
            }
        }
        Self { starts }
    }

    /// Number of physical lines.
    #[must_use]
    pub fn line_count(&self) -> u32 {
        self.starts.len() as u32
    }

    #[must_use]
    pub fn line_col(&self, offset: TextSize) -> (u32, u32) {
        let line = self.starts.partition_point(|start| *start <= offset).max(1);
        let column = u32::from(offset - self.starts[line - 1]) + 1;
        (line as u32, column)
    }
}

/// A significant token with its position and bracket nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigToken {
    pub kind: TokenKind,
    pub range: TextRange,
    pub line: u32,
    pub column: u32,
    /// Number of brackets open around the token. A bracket pair shares the
    /// depth of its surroundings.
    pub depth: u32,
}

impl SigToken {
    #[must_use]
    pub fn text<'src>(&self, source: &'src str) -> &'src str {
        &source[self.range]
    }

    #[must_use]
    pub fn is_top_level(&self) -> bool {
        self.depth == 0
    }
}

/// One logical line: a statement (or a clause header) as Python sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    pub indent: u32,
    pub tokens: Vec<SigToken>,
}

impl LogicalLine {
    /// Physical line of the first token.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.tokens.first().map_or(0, |token| token.line)
    }

    #[must_use]
    pub fn first(&self) -> &SigToken {
        &self.tokens[0]
    }

    #[must_use]
    pub fn last(&self) -> &SigToken {
        &self.tokens[self.tokens.len() - 1]
    }
}

/// Split source into logical lines.
///
/// Blank and comment-only lines are dropped. Every returned line has at
/// least one token.
pub fn logical_lines(source: &str) -> Result<Vec<LogicalLine>, CompileError> {
    let index = LineIndex::new(source);
    let mut lines = Vec::new();
    let mut current: Vec<SigToken> = Vec::new();
    let mut open: Vec<SigToken> = Vec::new();
    let mut indent = 0u32;
    let mut line_indent = 0u32;
    let mut at_line_start = true;

    for token in Lexer::new(source) {
        let (line, column) = index.line_col(token.range.start());
        match token.kind {
            TokenKind::Whitespace => {
                if at_line_start {
                    line_indent = indent_width(token.text(source));
                }
                continue;
            }
            TokenKind::Comment => continue,
            TokenKind::Continuation => {
                at_line_start = false;
                continue;
            }
            TokenKind::Newline => {
                if open.is_empty() {
                    if !current.is_empty() {
                        lines.push(LogicalLine {
                            indent,
                            tokens: std::mem::take(&mut current),
                        });
                    }
                    line_indent = 0;
                    at_line_start = true;
                }
                continue;
            }
            TokenKind::Error => {
                return Err(error_token_message(token.text(source), line, column));
            }
            _ => {}
        }

        if current.is_empty() {
            indent = line_indent;
        }
        at_line_start = false;

        let depth = if token.kind.is_close_bracket() {
            let text = token.text(source);
            let Some(opener) = open.pop() else {
                return Err(CompileError::new(format!("unmatched '{text}'"), line, column));
            };
            if token.kind.matching_open() != Some(opener.kind) {
                return Err(CompileError::new(
                    format!(
                        "closing parenthesis '{text}' does not match opening parenthesis '{}'",
                        opener.text(source)
                    ),
                    line,
                    column,
                ));
            }
            open.len() as u32
        } else {
            open.len() as u32
        };

        let sig = SigToken {
            kind: token.kind,
            range: token.range,
            line,
            column,
            depth,
        };
        if token.kind.is_open_bracket() {
            open.push(sig);
        }
        current.push(sig);
    }

    if let Some(opener) = open.last() {
        return Err(CompileError::new(
            format!("'{}' was never closed", opener.text(source)),
            opener.line,
            opener.column,
        ));
    }
    if !current.is_empty() {
        lines.push(LogicalLine {
            indent,
            tokens: current,
        });
    }
    Ok(lines)
}

fn indent_width(text: &str) -> u32 {
    text.chars().fold(0, |width, ch| match ch {
        '\t' => (width / TAB_WIDTH + 1) * TAB_WIDTH,
        '\x0C' => 0,
        _ => width + 1,
    })
}

fn error_token_message(text: &str, line: u32, column: u32) -> CompileError {
    let unprefixed = text.trim_start_matches(|ch: char| "rRuUbBfF".contains(ch));
    if unprefixed.starts_with("'''") || unprefixed.starts_with("\"\"\"") {
        CompileError::new("unterminated triple-quoted string literal", line, column)
    } else if unprefixed.starts_with('\'') || unprefixed.starts_with('"') {
        CompileError::new("unterminated string literal", line, column)
    } else if text == "\\" {
        CompileError::new(
            "unexpected character after line continuation character",
            line,
            column,
        )
    } else {
        let ch = text.chars().next().unwrap_or('?');
        CompileError::new(format!("invalid character '{ch}'"), line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_numbers(source: &str) -> Vec<(u32, u32)> {
        logical_lines(source)
            .unwrap()
            .iter()
            .map(|line| (line.line(), line.indent))
            .collect()
    }

    #[test]
    fn line_index_maps_offsets() {
        let index = LineIndex::new("ab\ncd\r\nef");
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.line_col(TextSize::from(0)), (1, 1));
        assert_eq!(index.line_col(TextSize::from(4)), (2, 2));
        assert_eq!(index.line_col(TextSize::from(7)), (3, 1));
    }

    #[test]
    fn blank_and_comment_lines_are_dropped() {
        let source = "# header\n\nx = 1\n    # indented comment\ny = 2\n";
        assert_eq!(line_numbers(source), vec![(3, 0), (5, 0)]);
    }

    #[test]
    fn brackets_join_physical_lines() {
        let source = "call(a,\n     b)\nnext_one()\n";
        let lines = logical_lines(source).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line(), 1);
        assert_eq!(lines[0].last().line, 2);
        assert_eq!(lines[1].line(), 3);
    }

    #[test]
    fn backslash_joins_physical_lines() {
        let source = "total = 1 + \\\n    2\n";
        let lines = logical_lines(source).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].indent, 0);
    }

    #[test]
    fn tabs_expand_to_multiples_of_eight() {
        let source = "if x:\n\ty = 1\nif z:\n  \tw = 2\n";
        assert_eq!(line_numbers(source), vec![(1, 0), (2, 8), (3, 0), (4, 8)]);
    }

    #[test]
    fn bracket_depth_is_recorded() {
        let lines = logical_lines("f(a[0])").unwrap();
        let depths: Vec<_> = lines[0].tokens.iter().map(|token| token.depth).collect();
        assert_eq!(depths, vec![0, 0, 1, 1, 2, 1, 0]);
    }

    #[test]
    fn unmatched_close_is_reported() {
        let err = logical_lines("x = 1)\n").unwrap_err();
        assert_eq!(err.message, "unmatched ')'");
        assert_eq!((err.line, err.column), (1, 6));
    }

    #[test]
    fn mismatched_close_is_reported() {
        let err = logical_lines("x = [1, 2)\n").unwrap_err();
        assert_eq!(
            err.message,
            "closing parenthesis ')' does not match opening parenthesis '['"
        );
    }

    #[test]
    fn unclosed_bracket_is_reported() {
        let err = logical_lines("x = (1,\n  2\n").unwrap_err();
        assert_eq!(err.message, "'(' was never closed");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn unterminated_string_is_reported() {
        let err = logical_lines("a = 1\nb = 'oops\n").unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
        assert_eq!(err.line, 2);
    }
}

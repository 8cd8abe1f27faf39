//! `stepline-syntax` - Breakable-line analysis for Python source.
//!
//! This crate answers one question for the debugger: at which lines of a
//! Python file can execution stop?
//!
//! - **Lexer**: Tokenizes source text into a stream of tokens
//! - **Scanner**: Groups tokens into logical lines with their indentation
//! - **Parser**: Recovers the statement structure and rejects invalid source
//! - **Compiler**: Lowers statements into code units carrying line tables
//! - **Breakable lines**: Walks the line tables of every unit
//!
//! # Example
//!
//! ```
//! use stepline_syntax::{compute_breakable_lines, nearest_breakable_line};
//!
//! let source = "def f():\n    pass\n";
//! let lines = compute_breakable_lines(source).unwrap();
//! assert_eq!(lines.into_iter().collect::<Vec<_>>(), vec![1, 2]);
//!
//! assert_eq!(nearest_breakable_line(5, false, source), Some(2));
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod breakable;
pub mod cache;
pub mod compiler;
mod error;
pub mod lexer;
pub mod parser;
pub mod scanner;

pub use breakable::{compute_breakable_lines, nearest_breakable_line, nearest_in};
pub use cache::{BreakLineCache, FsSourceLoader, SourceLoader};
pub use compiler::{compile, CodeUnit, Constant, UnitKind};
pub use error::CompileError;
pub use lexer::{lex, Lexer, Token, TokenKind};

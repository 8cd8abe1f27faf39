//! Token definitions for Python source.
//!
//! Only the distinctions needed to recover statement structure are kept:
//! keywords, brackets, the punctuation that delimits statements and
//! clause headers, and a single bucket for every other operator.

use logos::Logos;

fn lex_triple_quoted(lex: &mut logos::Lexer<TokenKind>) -> bool {
    let Some(quote) = lex.slice().bytes().last() else {
        return false;
    };
    let bytes = lex.remainder().as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if i + 2 < bytes.len() && bytes[i] == quote && bytes[i + 1] == quote && bytes[i + 2] == quote
        {
            lex.bump(i + 3);
            return true;
        }
        i += 1;
    }

    lex.bump(bytes.len());
    false
}

/// All token kinds produced for Python source.
///
/// Token kinds are divided into categories:
/// - Trivia (whitespace, comments, explicit line joins)
/// - Line structure (newlines)
/// - Brackets and punctuation
/// - Keywords
/// - Literals and identifiers
/// - Errors
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
#[derive(Default)]
pub enum TokenKind {
    // =========================================================================
    // TRIVIA
    // =========================================================================
    /// Horizontal whitespace (spaces, tabs, form feeds)
    #[regex(r"[ \t\x0C]+")]
    Whitespace,

    /// Comment: # ...
    #[regex(r"#[^\r\n]*", allow_greedy = true)]
    Comment,

    /// Explicit line join: a backslash right before the line break
    #[regex(r"\\\r?\n")]
    Continuation,

    // =========================================================================
    // LINE STRUCTURE
    // =========================================================================
    /// Physical line break
    #[regex(r"\r\n|\n|\r")]
    Newline,

    // =========================================================================
    // BRACKETS
    // =========================================================================
    /// `(`
    #[token("(")]
    LParen,

    /// `)`
    #[token(")")]
    RParen,

    /// `[`
    #[token("[")]
    LBracket,

    /// `]`
    #[token("]")]
    RBracket,

    /// `{`
    #[token("{")]
    LBrace,

    /// `}`
    #[token("}")]
    RBrace,

    // =========================================================================
    // PUNCTUATION
    // =========================================================================
    /// `:`
    #[token(":")]
    Colon,

    /// `;`
    #[token(";")]
    Semicolon,

    /// `,`
    #[token(",")]
    Comma,

    /// `.`
    #[token(".")]
    Dot,

    /// `...`
    #[token("...")]
    Ellipsis,

    /// `@` (decorators and matrix multiplication)
    #[token("@")]
    At,

    /// `=`
    #[token("=")]
    Assign,

    /// `:=`
    #[token(":=")]
    Walrus,

    /// `->`
    #[token("->")]
    Arrow,

    /// Arithmetic, bitwise, comparison and augmented assignment operators
    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("**")]
    #[token("/")]
    #[token("//")]
    #[token("%")]
    #[token("&")]
    #[token("|")]
    #[token("^")]
    #[token("~")]
    #[token("<<")]
    #[token(">>")]
    #[token("<")]
    #[token(">")]
    #[token("<=")]
    #[token(">=")]
    #[token("==")]
    #[token("!=")]
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("**=")]
    #[token("/=")]
    #[token("//=")]
    #[token("%=")]
    #[token("&=")]
    #[token("|=")]
    #[token("^=")]
    #[token("<<=")]
    #[token(">>=")]
    #[token("@=")]
    Operator,

    // =========================================================================
    // KEYWORDS
    // =========================================================================
    #[token("False")]
    KwFalse,
    #[token("None")]
    KwNone,
    #[token("True")]
    KwTrue,
    #[token("and")]
    KwAnd,
    #[token("as")]
    KwAs,
    #[token("assert")]
    KwAssert,
    #[token("async")]
    KwAsync,
    #[token("await")]
    KwAwait,
    #[token("break")]
    KwBreak,
    #[token("class")]
    KwClass,
    #[token("continue")]
    KwContinue,
    #[token("def")]
    KwDef,
    #[token("del")]
    KwDel,
    #[token("elif")]
    KwElif,
    #[token("else")]
    KwElse,
    #[token("except")]
    KwExcept,
    #[token("finally")]
    KwFinally,
    #[token("for")]
    KwFor,
    #[token("from")]
    KwFrom,
    #[token("global")]
    KwGlobal,
    #[token("if")]
    KwIf,
    #[token("import")]
    KwImport,
    #[token("in")]
    KwIn,
    #[token("is")]
    KwIs,
    #[token("lambda")]
    KwLambda,
    #[token("nonlocal")]
    KwNonlocal,
    #[token("not")]
    KwNot,
    #[token("or")]
    KwOr,
    #[token("pass")]
    KwPass,
    #[token("raise")]
    KwRaise,
    #[token("return")]
    KwReturn,
    #[token("try")]
    KwTry,
    #[token("while")]
    KwWhile,
    #[token("with")]
    KwWith,
    #[token("yield")]
    KwYield,

    // =========================================================================
    // LITERALS
    // =========================================================================
    /// Single-line string with an optional prefix: 'a', b"b", rf'{x}'
    #[regex(r#"[rRuUbBfF]{0,2}'([^'\\\r\n]|\\[^\r\n]|\\\r?\n)*'"#)]
    #[regex(r#"[rRuUbBfF]{0,2}"([^"\\\r\n]|\\[^\r\n]|\\\r?\n)*""#)]
    String,

    /// Triple-quoted string; may span lines
    #[regex(r#"[rRuUbBfF]{0,2}'''"#, lex_triple_quoted)]
    #[regex(r#"[rRuUbBfF]{0,2}""""#, lex_triple_quoted)]
    LongString,

    /// Integer, float, or imaginary literal
    #[regex(r"[0-9][0-9_]*(\.[0-9_]*)?([eE][+-]?[0-9_]+)?[jJ]?")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9_]+)?[jJ]?")]
    #[regex(r"0[xX][0-9a-fA-F_]+|0[oO][0-7_]+|0[bB][01_]+")]
    Number,

    // =========================================================================
    // IDENTIFIERS
    // =========================================================================
    /// Identifier (including soft keywords such as `match` and `case`)
    #[regex(r"[A-Za-z_\x{80}-\x{10FFFF}][A-Za-z0-9_\x{80}-\x{10FFFF}]*")]
    Ident,

    // =========================================================================
    // SPECIAL TOKENS
    // =========================================================================
    /// Lexer error: unterminated string or unrecognized character
    #[regex(r#"[rRuUbBfF]{0,2}'([^'\\\r\n]|\\[^\r\n])*"#, priority = 1)]
    #[regex(r#"[rRuUbBfF]{0,2}"([^"\\\r\n]|\\[^\r\n])*"#, priority = 1)]
    #[default]
    Error,
}

impl TokenKind {
    /// Returns `true` if this token carries no statement structure.
    #[inline]
    pub fn is_trivia(self) -> bool {
        matches!(self, Self::Whitespace | Self::Comment | Self::Continuation)
    }

    /// Returns `true` for opening brackets.
    pub fn is_open_bracket(self) -> bool {
        matches!(self, Self::LParen | Self::LBracket | Self::LBrace)
    }

    /// Returns `true` for closing brackets.
    pub fn is_close_bracket(self) -> bool {
        matches!(self, Self::RParen | Self::RBracket | Self::RBrace)
    }

    /// Returns the opening bracket matched by a closing one.
    pub fn matching_open(self) -> Option<Self> {
        Some(match self {
            Self::RParen => Self::LParen,
            Self::RBracket => Self::LBracket,
            Self::RBrace => Self::LBrace,
            _ => return None,
        })
    }

    /// Returns `true` for string literals of any quoting style.
    pub fn is_string(self) -> bool {
        matches!(self, Self::String | Self::LongString)
    }

    /// Returns `true` if this token is a reserved keyword.
    pub fn is_keyword(self) -> bool {
        (Self::KwFalse as u16..=Self::KwYield as u16).contains(&(self as u16))
    }

    /// Returns `true` if a simple statement cannot end with this token.
    pub fn is_dangling(self) -> bool {
        matches!(
            self,
            Self::Assign
                | Self::Walrus
                | Self::Arrow
                | Self::Dot
                | Self::Colon
                | Self::At
                | Self::Operator
                | Self::KwAnd
                | Self::KwAs
                | Self::KwAssert
                | Self::KwAsync
                | Self::KwAwait
                | Self::KwClass
                | Self::KwDef
                | Self::KwDel
                | Self::KwElif
                | Self::KwElse
                | Self::KwExcept
                | Self::KwFinally
                | Self::KwFor
                | Self::KwFrom
                | Self::KwGlobal
                | Self::KwIf
                | Self::KwImport
                | Self::KwIn
                | Self::KwIs
                | Self::KwLambda
                | Self::KwNonlocal
                | Self::KwNot
                | Self::KwOr
                | Self::KwTry
                | Self::KwWhile
                | Self::KwWith
        )
    }

    /// Returns `true` if a simple statement cannot start with this token.
    pub fn cannot_start_statement(self) -> bool {
        matches!(
            self,
            Self::Assign
                | Self::Walrus
                | Self::Arrow
                | Self::Colon
                | Self::Comma
                | Self::Dot
                | Self::Semicolon
                | Self::KwAnd
                | Self::KwOr
                | Self::KwIn
                | Self::KwIs
                | Self::KwAs
        )
    }
}

//! Statement structure recovery.
//! - parse_module: logical lines to a statement tree
//! - block structure from indentation, clause chaining (`elif`/`else`/`except`/`finally`)
//! - context checks (`return` outside function, `break` outside loop)
//!
//! Expressions are not parsed. The compiler only needs statement lines and
//! the handful of expression forms that create nested code units.

use smol_str::SmolStr;

use crate::error::CompileError;
use crate::lexer::TokenKind;
use crate::scanner::{logical_lines, LogicalLine, SigToken};

/// What a simple statement does, as far as code generation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleKind {
    /// Produces no instructions (`global`, `nonlocal`).
    Declaration,
    /// A lone string literal; a docstring when it opens a body.
    StringExpr,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleStmt {
    pub kind: SimpleKind,
    pub line: u32,
    pub tokens: Vec<SigToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    If,
    Elif,
    Else,
    While,
    For,
    Try,
    Except,
    Finally,
    With,
    Match,
    Case,
}

impl ClauseKind {
    /// Whether the clause header evaluates something at its own line.
    #[must_use]
    pub fn emits_code(self) -> bool {
        !matches!(self, Self::Else)
    }

    fn is_loop(self) -> bool {
        matches!(self, Self::While | Self::For)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub kind: ClauseKind,
    pub line: u32,
    /// Header tokens between the keyword and the header colon.
    pub header: Vec<SigToken>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub is_class: bool,
    pub name: SmolStr,
    pub decorators: Vec<SimpleStmt>,
    pub line: u32,
    pub header: Vec<SigToken>,
    pub body: Vec<Stmt>,
}

impl Definition {
    /// First line of the definition: its first decorator, if any.
    #[must_use]
    pub fn first_line(&self) -> u32 {
        self.decorators.first().map_or(self.line, |decorator| decorator.line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Simple(SimpleStmt),
    Compound(Vec<Clause>),
    Definition(Definition),
}

#[derive(Debug, Clone, Copy, Default)]
struct Context {
    in_function: bool,
    in_loop: bool,
}

/// Parse a whole module into a statement tree.
pub fn parse_module(source: &str) -> Result<Vec<Stmt>, CompileError> {
    let lines = logical_lines(source)?;
    let mut parser = Parser {
        source,
        lines,
        pos: 0,
        levels: vec![0],
    };
    let body = parser.block(0, Context::default())?;
    if let Some(line) = parser.peek() {
        let token = line.first();
        return Err(CompileError::new(
            "unindent does not match any outer indentation level",
            token.line,
            token.column,
        ));
    }
    Ok(body)
}

struct Parser<'src> {
    source: &'src str,
    lines: Vec<LogicalLine>,
    pos: usize,
    levels: Vec<u32>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&LogicalLine> {
        self.lines.get(self.pos)
    }

    fn text(&self, token: &SigToken) -> &str {
        token.text(self.source)
    }

    fn block(&mut self, indent: u32, ctx: Context) -> Result<Vec<Stmt>, CompileError> {
        let mut body: Vec<Stmt> = Vec::new();
        let mut decorators: Vec<SimpleStmt> = Vec::new();

        while let Some(line) = self.peek() {
            if line.indent < indent {
                if !self.levels.contains(&line.indent) {
                    let token = line.first();
                    return Err(CompileError::new(
                        "unindent does not match any outer indentation level",
                        token.line,
                        token.column,
                    ));
                }
                break;
            }
            if line.indent > indent {
                let token = line.first();
                return Err(CompileError::new("unexpected indent", token.line, token.column));
            }
            let line = self.lines[self.pos].clone();
            self.pos += 1;

            let first = *line.first();
            if first.kind == TokenKind::At {
                self.check_simple(&line.tokens)?;
                decorators.push(SimpleStmt {
                    kind: SimpleKind::Other,
                    line: first.line,
                    tokens: line.tokens,
                });
                continue;
            }

            if let Some(kind) = self.clause_kind(&line) {
                if !decorators.is_empty() {
                    return Err(CompileError::invalid_syntax(first.line, first.column));
                }
                let clause = self.clause(kind, &line, indent, ctx)?;
                attach_clause(&mut body, clause, &first)?;
                continue;
            }

            if let Some(is_class) = definition_keyword(&line) {
                let definition =
                    self.definition(is_class, &line, std::mem::take(&mut decorators), indent)?;
                body.push(Stmt::Definition(definition));
                continue;
            }

            if let Some(decorator) = decorators.first() {
                let token = decorator.tokens[0];
                return Err(CompileError::invalid_syntax(token.line, token.column));
            }
            for stmt in self.simple_statements(&line.tokens, ctx)? {
                body.push(Stmt::Simple(stmt));
            }
        }

        if let Some(decorator) = decorators.first() {
            let token = decorator.tokens[0];
            return Err(CompileError::invalid_syntax(token.line, token.column));
        }
        Ok(body)
    }

    fn clause_kind(&self, line: &LogicalLine) -> Option<ClauseKind> {
        let tokens = &line.tokens;
        let first = tokens[0];
        let kind = match first.kind {
            TokenKind::KwIf => ClauseKind::If,
            TokenKind::KwElif => ClauseKind::Elif,
            TokenKind::KwElse => ClauseKind::Else,
            TokenKind::KwWhile => ClauseKind::While,
            TokenKind::KwFor => ClauseKind::For,
            TokenKind::KwTry => ClauseKind::Try,
            TokenKind::KwExcept => ClauseKind::Except,
            TokenKind::KwFinally => ClauseKind::Finally,
            TokenKind::KwWith => ClauseKind::With,
            TokenKind::KwAsync => match tokens.get(1).map(|token| token.kind) {
                Some(TokenKind::KwFor) => ClauseKind::For,
                Some(TokenKind::KwWith) => ClauseKind::With,
                _ => return None,
            },
            TokenKind::Ident => {
                let soft = match self.text(&first) {
                    "match" => ClauseKind::Match,
                    "case" => ClauseKind::Case,
                    _ => return None,
                };
                let second = tokens.get(1)?;
                let opens_block = line.last().kind == TokenKind::Colon;
                let looks_like_subject = !matches!(
                    second.kind,
                    TokenKind::Assign
                        | TokenKind::Dot
                        | TokenKind::Colon
                        | TokenKind::Operator
                        | TokenKind::Comma
                        | TokenKind::Walrus
                );
                if opens_block && looks_like_subject {
                    soft
                } else {
                    return None;
                }
            }
            _ => return None,
        };
        Some(kind)
    }

    fn clause(
        &mut self,
        kind: ClauseKind,
        line: &LogicalLine,
        indent: u32,
        ctx: Context,
    ) -> Result<Clause, CompileError> {
        let tokens = &line.tokens;
        let keyword_len = match tokens[0].kind {
            TokenKind::KwAsync => 2,
            _ => 1,
        };
        let colon = header_colon(tokens).ok_or_else(|| expected_colon(line.last()))?;
        if colon < keyword_len {
            return Err(CompileError::invalid_syntax(tokens[colon].line, tokens[colon].column));
        }
        let header = tokens[keyword_len..colon].to_vec();
        let needs_header = !matches!(
            kind,
            ClauseKind::Else | ClauseKind::Try | ClauseKind::Finally | ClauseKind::Except
        );
        if needs_header && header.is_empty() {
            let token = tokens[colon];
            return Err(CompileError::invalid_syntax(token.line, token.column));
        }
        if matches!(kind, ClauseKind::Else | ClauseKind::Try | ClauseKind::Finally)
            && !header.is_empty()
        {
            return Err(expected_colon(&tokens[keyword_len - 1]));
        }

        let body_ctx = Context {
            in_loop: ctx.in_loop || kind.is_loop(),
            ..ctx
        };
        let body = self.body(&tokens[colon + 1..], &tokens[colon], indent, body_ctx)?;
        Ok(Clause {
            kind,
            line: tokens[0].line,
            header,
            body,
        })
    }

    fn definition(
        &mut self,
        is_class: bool,
        line: &LogicalLine,
        decorators: Vec<SimpleStmt>,
        indent: u32,
    ) -> Result<Definition, CompileError> {
        let tokens = &line.tokens;
        let keyword_len = match tokens[0].kind {
            TokenKind::KwAsync => 2,
            _ => 1,
        };
        let Some(name) = tokens.get(keyword_len).filter(|token| token.kind == TokenKind::Ident)
        else {
            let token = tokens.get(keyword_len).unwrap_or(&tokens[keyword_len - 1]);
            return Err(CompileError::invalid_syntax(token.line, token.column));
        };
        let name = SmolStr::new(self.text(name));
        if !is_class
            && tokens.get(keyword_len + 1).map(|token| token.kind) != Some(TokenKind::LParen)
        {
            let token = tokens.get(keyword_len + 1).unwrap_or(&tokens[keyword_len]);
            return Err(expected_token("'('", token));
        }
        let colon = header_colon(tokens).ok_or_else(|| expected_colon(line.last()))?;
        let header = tokens[keyword_len + 1..colon].to_vec();
        let body_ctx = Context {
            in_function: !is_class,
            in_loop: false,
        };
        let body = self.body(&tokens[colon + 1..], &tokens[colon], indent, body_ctx)?;
        Ok(Definition {
            is_class,
            name,
            decorators,
            line: tokens[0].line,
            header,
            body,
        })
    }

    /// Body of a compound statement: inline after the colon, or an indented block.
    fn body(
        &mut self,
        inline: &[SigToken],
        colon: &SigToken,
        indent: u32,
        ctx: Context,
    ) -> Result<Vec<Stmt>, CompileError> {
        if !inline.is_empty() {
            return Ok(self
                .simple_statements(inline, ctx)?
                .into_iter()
                .map(Stmt::Simple)
                .collect());
        }
        let Some(next) = self.peek() else {
            return Err(CompileError::new(
                "expected an indented block",
                colon.line + 1,
                1,
            ));
        };
        if next.indent <= indent {
            let token = next.first();
            return Err(CompileError::new(
                "expected an indented block",
                token.line,
                token.column,
            ));
        }
        let child = next.indent;
        self.levels.push(child);
        let body = self.block(child, ctx);
        self.levels.pop();
        body
    }

    fn simple_statements(
        &self,
        tokens: &[SigToken],
        ctx: Context,
    ) -> Result<Vec<SimpleStmt>, CompileError> {
        let mut stmts = Vec::new();
        for segment in split_statements(tokens)? {
            self.check_simple(segment)?;
            self.check_context(segment, ctx)?;
            let kind = match segment[0].kind {
                TokenKind::KwGlobal | TokenKind::KwNonlocal => SimpleKind::Declaration,
                _ if segment.iter().all(|token| token.kind.is_string()) => SimpleKind::StringExpr,
                _ => SimpleKind::Other,
            };
            stmts.push(SimpleStmt {
                kind,
                line: segment[0].line,
                tokens: segment.to_vec(),
            });
        }
        Ok(stmts)
    }

    fn check_simple(&self, tokens: &[SigToken]) -> Result<(), CompileError> {
        let first = tokens[0];
        if first.kind.cannot_start_statement() {
            return Err(CompileError::invalid_syntax(first.line, first.column));
        }
        let last = tokens[tokens.len() - 1];
        let star_import = self.text(&last) == "*"
            && tokens.len() >= 2
            && tokens[tokens.len() - 2].kind == TokenKind::KwImport;
        if last.kind.is_dangling() && !star_import {
            return Err(CompileError::invalid_syntax(last.line, last.column));
        }
        if let Some(token) = tokens.iter().find(|token| {
            token.is_top_level()
                && matches!(
                    token.kind,
                    TokenKind::KwDef
                        | TokenKind::KwClass
                        | TokenKind::KwElif
                        | TokenKind::KwWhile
                        | TokenKind::KwTry
                        | TokenKind::KwExcept
                        | TokenKind::KwFinally
                        | TokenKind::KwWith
                )
        }) {
            return Err(CompileError::invalid_syntax(token.line, token.column));
        }
        Ok(())
    }

    fn check_context(&self, tokens: &[SigToken], ctx: Context) -> Result<(), CompileError> {
        let first = tokens[0];
        match first.kind {
            TokenKind::KwReturn if !ctx.in_function => Err(CompileError::new(
                "'return' outside function",
                first.line,
                first.column,
            )),
            TokenKind::KwBreak if !ctx.in_loop => Err(CompileError::new(
                "'break' outside loop",
                first.line,
                first.column,
            )),
            TokenKind::KwContinue if !ctx.in_loop => Err(CompileError::new(
                "'continue' not properly in loop",
                first.line,
                first.column,
            )),
            _ => {
                if !ctx.in_function {
                    if let Some(token) = tokens
                        .iter()
                        .find(|token| token.kind == TokenKind::KwYield && !in_lambda(tokens, token))
                    {
                        return Err(CompileError::new(
                            "'yield' outside function",
                            token.line,
                            token.column,
                        ));
                    }
                }
                Ok(())
            }
        }
    }
}

fn definition_keyword(line: &LogicalLine) -> Option<bool> {
    let tokens = &line.tokens;
    let kind = match tokens[0].kind {
        TokenKind::KwAsync => tokens.get(1)?.kind,
        kind => kind,
    };
    match kind {
        TokenKind::KwDef => Some(false),
        TokenKind::KwClass if tokens[0].kind != TokenKind::KwAsync => Some(true),
        _ => None,
    }
}

/// Index of the colon closing a clause header. Colons that belong to a
/// `lambda` at the top level are skipped.
fn header_colon(tokens: &[SigToken]) -> Option<usize> {
    let mut pending_lambdas = 0usize;
    for (idx, token) in tokens.iter().enumerate() {
        if !token.is_top_level() {
            continue;
        }
        match token.kind {
            TokenKind::KwLambda => pending_lambdas += 1,
            TokenKind::Colon if pending_lambdas > 0 => pending_lambdas -= 1,
            TokenKind::Colon => return Some(idx),
            _ => {}
        }
    }
    None
}

fn in_lambda(tokens: &[SigToken], target: &SigToken) -> bool {
    tokens
        .iter()
        .take_while(|token| token.range.start() < target.range.start())
        .any(|token| token.kind == TokenKind::KwLambda)
}

fn split_statements(tokens: &[SigToken]) -> Result<Vec<&[SigToken]>, CompileError> {
    let mut segments = Vec::new();
    let mut start = 0usize;
    for (idx, token) in tokens.iter().enumerate() {
        if token.kind != TokenKind::Semicolon || !token.is_top_level() {
            continue;
        }
        if idx == start {
            return Err(CompileError::invalid_syntax(token.line, token.column));
        }
        segments.push(&tokens[start..idx]);
        start = idx + 1;
    }
    if start < tokens.len() {
        segments.push(&tokens[start..]);
    }
    Ok(segments)
}

fn attach_clause(
    body: &mut Vec<Stmt>,
    clause: Clause,
    first: &SigToken,
) -> Result<(), CompileError> {
    let continues = matches!(
        clause.kind,
        ClauseKind::Elif | ClauseKind::Else | ClauseKind::Except | ClauseKind::Finally
    );
    if !continues {
        body.push(Stmt::Compound(vec![clause]));
        return Ok(());
    }
    let Some(Stmt::Compound(clauses)) = body.last_mut() else {
        return Err(CompileError::invalid_syntax(first.line, first.column));
    };
    let opener = clauses[0].kind;
    let previous = clauses[clauses.len() - 1].kind;
    let allowed = match clause.kind {
        ClauseKind::Elif => matches!(previous, ClauseKind::If | ClauseKind::Elif),
        ClauseKind::Else => match opener {
            ClauseKind::If => matches!(previous, ClauseKind::If | ClauseKind::Elif),
            ClauseKind::For | ClauseKind::While => previous == opener,
            ClauseKind::Try => previous == ClauseKind::Except,
            _ => false,
        },
        ClauseKind::Except => {
            opener == ClauseKind::Try
                && matches!(previous, ClauseKind::Try | ClauseKind::Except)
        }
        ClauseKind::Finally => {
            opener == ClauseKind::Try
                && matches!(
                    previous,
                    ClauseKind::Try | ClauseKind::Except | ClauseKind::Else
                )
        }
        _ => false,
    };
    if !allowed {
        return Err(CompileError::invalid_syntax(first.line, first.column));
    }
    clauses.push(clause);
    Ok(())
}

fn expected_colon(token: &SigToken) -> CompileError {
    expected_token("':'", token)
}

fn expected_token(what: &str, token: &SigToken) -> CompileError {
    CompileError::new(format!("expected {what}"), token.line, token.column)
}

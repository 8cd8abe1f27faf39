//! Code generation down to line tables.
//!
//! The compiler lowers the statement tree into [`CodeUnit`]s. Only the
//! address to line mapping is modeled: each statement contributes a number
//! of instructions at the lines the interpreter would attribute them to, and
//! nested scopes become nested units in the constant pool.

mod line_table;

pub use line_table::{LineStep, LineTable, LineTableBuilder, INSTRUCTION_SIZE};

use std::fmt::Write as _;

use smol_str::SmolStr;

use crate::error::CompileError;
use crate::lexer::TokenKind;
use crate::parser::{parse_module, Clause, ClauseKind, Definition, SimpleKind, SimpleStmt, Stmt};
use crate::scanner::SigToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Module,
    Function,
    Class,
    Lambda,
    Comprehension,
}

impl UnitKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Function => "function",
            Self::Class => "class",
            Self::Lambda => "lambda",
            Self::Comprehension => "comprehension",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    None,
    Str(SmolStr),
    Code(Box<CodeUnit>),
}

/// A compiled scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUnit {
    pub kind: UnitKind,
    pub name: SmolStr,
    pub first_line: u32,
    pub line_table: LineTable,
    pub constants: Vec<Constant>,
}

impl CodeUnit {
    /// Nested units held in the constant pool.
    pub fn nested(&self) -> impl Iterator<Item = &CodeUnit> {
        self.constants.iter().filter_map(|constant| match constant {
            Constant::Code(unit) => Some(unit.as_ref()),
            _ => None,
        })
    }

    /// Indented rendering of the unit tree.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = writeln!(
            out,
            "{indent}{} {} @{}",
            self.kind.as_str(),
            self.name,
            self.first_line
        );
        if !self.line_table.is_empty() {
            let steps: Vec<String> = self
                .line_table
                .steps()
                .iter()
                .map(ToString::to_string)
                .collect();
            let _ = writeln!(out, "{indent}  steps {}", steps.join(" "));
        }
        for constant in &self.constants {
            match constant {
                Constant::None => {
                    let _ = writeln!(out, "{indent}  const None");
                }
                Constant::Str(text) => {
                    let _ = writeln!(out, "{indent}  const {text}");
                }
                Constant::Code(unit) => unit.dump_into(out, depth + 1),
            }
        }
    }
}

/// Compile module source.
pub fn compile(source: &str) -> Result<CodeUnit, CompileError> {
    let module = parse_module(source)?;
    let mut unit = UnitBuilder::new(UnitKind::Module, SmolStr::new_static("<module>"), 1);
    let compiler = Compiler { source };
    compiler.body(&mut unit, &module, BodyKind::Module);
    Ok(unit.finish())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Module,
    Class,
    Function,
    Block,
}

struct UnitBuilder {
    kind: UnitKind,
    name: SmolStr,
    first_line: u32,
    table: LineTableBuilder,
    constants: Vec<Constant>,
}

impl UnitBuilder {
    fn new(kind: UnitKind, name: SmolStr, first_line: u32) -> Self {
        Self {
            kind,
            name,
            first_line,
            table: LineTableBuilder::new(first_line),
            constants: Vec::new(),
        }
    }

    fn emit(&mut self, line: u32, count: u32) {
        self.table.emit(line, count);
    }

    /// Literal constants are interned; every nested unit gets its own slot.
    fn add_constant(&mut self, constant: Constant) {
        if matches!(constant, Constant::Code(_)) || !self.constants.contains(&constant) {
            self.constants.push(constant);
        }
    }

    /// Append the implicit `return None`.
    fn finish(mut self) -> CodeUnit {
        self.table.emit_here(2);
        self.add_constant(Constant::None);
        CodeUnit {
            kind: self.kind,
            name: self.name,
            first_line: self.first_line,
            line_table: self.table.finish(),
            constants: self.constants,
        }
    }
}

struct Compiler<'src> {
    source: &'src str,
}

impl Compiler<'_> {
    fn body(&self, unit: &mut UnitBuilder, stmts: &[Stmt], kind: BodyKind) {
        for (idx, stmt) in stmts.iter().enumerate() {
            match stmt {
                Stmt::Simple(simple) if idx == 0 && simple.kind == SimpleKind::StringExpr => {
                    self.docstring(unit, simple, kind);
                }
                Stmt::Simple(simple) => self.simple(unit, simple),
                Stmt::Compound(clauses) => self.compound(unit, clauses),
                Stmt::Definition(definition) => self.definition(unit, definition),
            }
        }
    }

    fn docstring(&self, unit: &mut UnitBuilder, stmt: &SimpleStmt, kind: BodyKind) {
        let text = stmt
            .tokens
            .iter()
            .map(|token| token.text(self.source))
            .collect::<Vec<_>>()
            .join(" ");
        match kind {
            BodyKind::Function => unit.add_constant(Constant::Str(SmolStr::new(text))),
            BodyKind::Module | BodyKind::Class => {
                unit.add_constant(Constant::Str(SmolStr::new(text)));
                unit.emit(stmt.line, 2);
            }
            BodyKind::Block => self.simple(unit, stmt),
        }
    }

    fn simple(&self, unit: &mut UnitBuilder, stmt: &SimpleStmt) {
        if stmt.kind == SimpleKind::Declaration {
            return;
        }
        unit.emit(stmt.line, instruction_count(&stmt.tokens));
        self.expressions(unit, &stmt.tokens);
    }

    fn compound(&self, unit: &mut UnitBuilder, clauses: &[Clause]) {
        for clause in clauses {
            if clause.kind.emits_code() {
                unit.emit(clause.line, instruction_count(&clause.header));
                self.expressions(unit, &clause.header);
            }
            self.body(unit, &clause.body, BodyKind::Block);
            if matches!(clause.kind, ClauseKind::For | ClauseKind::While) {
                unit.emit(clause.line, 1);
            }
        }
    }

    fn definition(&self, unit: &mut UnitBuilder, definition: &Definition) {
        for decorator in &definition.decorators {
            unit.emit(decorator.line, instruction_count(&decorator.tokens));
            self.expressions(unit, &decorator.tokens);
        }
        unit.emit(definition.line, instruction_count(&definition.header));
        self.expressions(unit, &definition.header);

        let (kind, body_kind) = if definition.is_class {
            (UnitKind::Class, BodyKind::Class)
        } else {
            (UnitKind::Function, BodyKind::Function)
        };
        let first_line = definition.first_line();
        let mut nested = UnitBuilder::new(kind, definition.name.clone(), first_line);
        if definition.is_class {
            // __module__ and __qualname__ bindings
            nested.emit(first_line, 4);
        }
        self.body(&mut nested, &definition.body, body_kind);
        unit.add_constant(Constant::Code(Box::new(nested.finish())));
    }

    /// Attach lambdas and comprehensions found in `tokens` to `unit`.
    fn expressions(&self, unit: &mut UnitBuilder, tokens: &[SigToken]) {
        let mut idx = 0;
        while idx < tokens.len() {
            let token = &tokens[idx];
            let scope = if token.kind == TokenKind::KwLambda {
                Some((UnitKind::Lambda, SmolStr::new_static("<lambda>"), lambda_end(tokens, idx)))
            } else if token.kind.is_open_bracket() {
                let end = closing_bracket(tokens, idx);
                comprehension_name(tokens, idx, end)
                    .map(|name| (UnitKind::Comprehension, SmolStr::new_static(name), end))
            } else {
                None
            };
            let Some((kind, name, end)) = scope else {
                idx += 1;
                continue;
            };
            let mut nested = UnitBuilder::new(kind, name, token.line);
            nested.emit(token.line, instruction_count(&tokens[idx..end]));
            self.expressions(&mut nested, &tokens[idx + 1..end]);
            unit.add_constant(Constant::Code(Box::new(nested.finish())));
            idx = end;
        }
    }
}

/// Rough instruction count for a statement or header.
fn instruction_count(tokens: &[SigToken]) -> u32 {
    1 + tokens.len() as u32 / 2
}

/// One past the last token of the lambda starting at `start`.
fn lambda_end(tokens: &[SigToken], start: usize) -> usize {
    let depth = tokens[start].depth;
    tokens[start + 1..]
        .iter()
        .position(|token| {
            token.depth < depth || (token.depth == depth && token.kind == TokenKind::Comma)
        })
        .map_or(tokens.len(), |offset| start + 1 + offset)
}

/// One past the bracket closing the one at `open`.
fn closing_bracket(tokens: &[SigToken], open: usize) -> usize {
    let depth = tokens[open].depth;
    tokens[open + 1..]
        .iter()
        .position(|token| token.depth == depth && token.kind.is_close_bracket())
        .map_or(tokens.len(), |offset| open + 2 + offset)
}

fn comprehension_name(tokens: &[SigToken], open: usize, end: usize) -> Option<&'static str> {
    let inner_depth = tokens[open].depth + 1;
    let inner = tokens.get(open + 1..end)?;
    let for_at = inner
        .iter()
        .position(|token| token.depth == inner_depth && token.kind == TokenKind::KwFor)?;
    let name = match tokens[open].kind {
        TokenKind::LParen => "<genexpr>",
        TokenKind::LBracket => "<listcomp>",
        _ if inner[..for_at]
            .iter()
            .any(|token| token.depth == inner_depth && token.kind == TokenKind::Colon) =>
        {
            "<dictcomp>"
        }
        _ => "<setcomp>",
    };
    Some(name)
}

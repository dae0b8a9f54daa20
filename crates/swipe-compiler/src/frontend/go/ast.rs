//! Go AST types.
//!
//! An owned subset of the Go syntax tree, close to `go/ast` in shape. Type
//! expressions are ordinary expressions, as in Go itself.

use std::path::PathBuf;
use crate::diagnostic::Span;

/// A parsed Go source file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub package: Ident,
    /// Raw `//go:build` expression or `// +build` line, if any.
    pub build_constraint: Option<String>,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
}

impl ParsedFile {
    /// Returns the import declared under the given local name.
    pub fn import_by_name(&self, name: &str) -> Option<&ImportSpec> {
        self.imports.iter().find(|i| i.local_name() == name)
    }
}

/// An import specification.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpec {
    /// Explicit local name (`alias "path"`), `.` or `_`.
    pub name: Option<String>,
    pub path: String,
    pub span: Span,
}

impl ImportSpec {
    /// The identifier this import is referenced by inside the file.
    pub fn local_name(&self) -> &str {
        match &self.name {
            Some(name) => name,
            None => default_package_name(&self.path),
        }
    }
}

/// Guesses a package name from its import path: the last element without a
/// major version suffix or `go-`/`go.` prefixes.
pub fn default_package_name(path: &str) -> &str {
    let mut parts = path.rsplit('/');
    let mut last = parts.next().unwrap_or(path);
    if last.len() > 1 && last.starts_with('v') && last[1..].chars().all(|c| c.is_ascii_digit()) {
        last = parts.next().unwrap_or(last);
    }
    let last = last
        .strip_prefix("go-")
        .or_else(|| last.strip_prefix("go."))
        .unwrap_or(last);
    last.strip_suffix(".go")
        .or_else(|| last.strip_suffix("-go"))
        .unwrap_or(last)
}

/// An identifier with its position.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self { name: name.into(), span }
    }

    pub fn synthetic(name: impl Into<String>) -> Self {
        Self::new(name, Span::unknown())
    }

    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(|c| c.is_uppercase())
    }
}

/// Top-level or local declarations.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Func(FuncDecl),
    Type(Vec<TypeSpec>),
    Const(Vec<ValueSpec>),
    Var(Vec<ValueSpec>),
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: Ident,
    pub recv: Option<Field>,
    pub sig: FuncType,
    pub body: Option<Block>,
    pub doc: Vec<String>,
    pub span: Span,
}

/// A single `type Name T` or `type Name = T` spec.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    pub name: Ident,
    pub alias: bool,
    pub ty: Expr,
    pub doc: Vec<String>,
    pub span: Span,
}

/// A const or var spec. `iota` is the position of the spec in its group.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSpec {
    pub names: Vec<Ident>,
    pub ty: Option<Expr>,
    pub values: Vec<Expr>,
    pub iota: i64,
    pub doc: Vec<String>,
    pub span: Span,
}

/// Parameter, result, struct field or interface method.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub names: Vec<Ident>,
    pub ty: Expr,
    pub tag: Option<String>,
    pub variadic: bool,
    pub doc: Vec<String>,
    pub comment: Vec<String>,
    pub span: Span,
}

impl Field {
    pub fn new(names: Vec<Ident>, ty: Expr) -> Self {
        let span = ty.span.clone();
        Self {
            names,
            ty,
            tag: None,
            variadic: false,
            doc: Vec::new(),
            comment: Vec::new(),
            span,
        }
    }

    pub fn is_embedded(&self) -> bool {
        self.names.is_empty()
    }
}

/// A function signature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FuncType {
    pub params: Vec<Field>,
    pub results: Vec<Field>,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Imag,
    Char,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Ident(String),
    BasicLit { kind: LitKind, value: String },
    CompositeLit { ty: Option<Box<Expr>>, elts: Vec<Expr> },
    KeyValue { key: Box<Expr>, value: Box<Expr> },
    FuncLit { sig: FuncType, body: Block },
    Paren(Box<Expr>),
    Selector { x: Box<Expr>, sel: Ident },
    Index { x: Box<Expr>, index: Vec<Expr> },
    Slice { x: Box<Expr>, low: Option<Box<Expr>>, high: Option<Box<Expr>>, max: Option<Box<Expr>> },
    /// `x.(T)`; `ty` is `None` for `x.(type)`.
    TypeAssert { x: Box<Expr>, ty: Option<Box<Expr>> },
    Call { fun: Box<Expr>, args: Vec<Expr>, ellipsis: bool },
    Star(Box<Expr>),
    Unary { op: String, x: Box<Expr> },
    Binary { op: String, x: Box<Expr>, y: Box<Expr> },
    /// `[N]T`, `[...]T` (len is an `Ellipsis`) or `[]T` (len is `None`).
    ArrayType { len: Option<Box<Expr>>, elt: Box<Expr> },
    MapType { key: Box<Expr>, value: Box<Expr> },
    ChanType { dir: ChanDir, value: Box<Expr> },
    FuncType(FuncType),
    /// Methods have one name; embedded elements have none.
    InterfaceType(Vec<Field>),
    StructType(Vec<Field>),
    Ellipsis(Option<Box<Expr>>),
    /// Source text the parser does not model; printed back verbatim.
    Bad(String),
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Ident(name.into()), Span::unknown())
    }

    pub fn selector(x: Expr, sel: impl Into<String>) -> Self {
        let span = x.span.clone();
        Self::new(
            ExprKind::Selector {
                x: Box::new(x),
                sel: Ident::new(sel, span.clone()),
            },
            span,
        )
    }

    /// Strips any number of enclosing parentheses.
    pub fn unparen(&self) -> &Expr {
        match &self.kind {
            ExprKind::Paren(inner) => inner.unparen(),
            _ => self,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }
}

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    Return(Vec<Expr>),
    Block(Block),
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        body: Block,
        els: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        x: Expr,
        body: Block,
    },
    Switch {
        init: Option<Box<Stmt>>,
        tag: Option<Expr>,
        clauses: Vec<CaseClause>,
    },
    TypeSwitch {
        init: Option<Box<Stmt>>,
        bind: Option<Ident>,
        x: Expr,
        clauses: Vec<CaseClause>,
    },
    Select(Vec<CommClause>),
    /// `=`, `:=` and compound assignments.
    Assign { lhs: Vec<Expr>, op: String, rhs: Vec<Expr> },
    IncDec { x: Expr, inc: bool },
    Go(Expr),
    Defer(Expr),
    Decl(Decl),
    Labeled { label: Ident, stmt: Box<Stmt> },
    Branch { tok: String, label: Option<Ident> },
    Send { chan: Expr, value: Expr },
    Empty,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// A braced statement list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// A `case`/`default` clause of a switch. `default` clauses have an empty list.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseClause {
    pub list: Vec<Expr>,
    pub default: bool,
    pub body: Vec<Stmt>,
}

/// A select clause; `comm` is `None` for `default`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommClause {
    pub comm: Option<Box<Stmt>>,
    pub body: Vec<Stmt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_package_name() {
        assert_eq!(default_package_name("context"), "context");
        assert_eq!(default_package_name("github.com/go-kit/kit/endpoint"), "endpoint");
        assert_eq!(default_package_name("github.com/swipe-io/swipe/v2"), "swipe");
        assert_eq!(default_package_name("github.com/satori/go.uuid"), "uuid");
        assert_eq!(default_package_name("github.com/l-vitaly/go-kit"), "kit");
    }

    #[test]
    fn test_unparen() {
        let inner = Expr::ident("x");
        let e = Expr::new(
            ExprKind::Paren(Box::new(Expr::new(ExprKind::Paren(Box::new(inner)), Span::unknown()))),
            Span::unknown(),
        );
        assert_eq!(e.unparen().as_ident(), Some("x"));
    }
}

//! Per-file import table.
//!
//! Generators ask the [`Importer`] for the local name of every package they
//! reference. Expressions copied from user code (request decoders, the
//! config zero value) are rewritten so their package references and local
//! bindings are valid in the generated file.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::frontend::go::ast::{
    default_package_name, Block, CaseClause, Decl, Expr, ExprKind, Field, FuncType, Ident, Stmt, StmtKind,
};
use crate::frontend::go::printer;
use crate::schema::FuncRef;
use crate::types::{write_type, FileRef, NamedType, Type, Universe};

const KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough", "for", "func", "go",
    "goto", "if", "import", "interface", "map", "package", "range", "return", "select", "struct", "switch", "type",
    "var",
];

const PREDECLARED: &[&str] = &[
    "any", "bool", "byte", "comparable", "complex64", "complex128", "error", "float32", "float64", "int", "int8",
    "int16", "int32", "int64", "rune", "string", "uint", "uint8", "uint16", "uint32", "uint64", "uintptr", "true",
    "false", "iota", "nil", "append", "cap", "clear", "close", "complex", "copy", "delete", "imag", "len", "make",
    "max", "min", "new", "panic", "print", "println", "real", "recover",
];

/// Locals declared by generated function bodies. Import names never take
/// them, so a package reference is not shadowed inside those bodies.
const GENERATED_LOCALS: &[&str] = &[
    "b", "c", "cfg", "code", "ctx", "data", "ep", "err", "errs", "logger", "next", "now", "ok", "opt", "options",
    "opts", "q", "r", "req", "request", "resp", "response", "result", "s", "statusCode", "tgt", "u", "vars", "w",
];

/// Picks `name`, or `name_2`, `name_3`, ... when taken.
pub fn disambiguate(name: &str, collides: impl Fn(&str) -> bool) -> String {
    if !KEYWORDS.contains(&name) && !collides(name) {
        return name.to_string();
    }
    (2..)
        .map(|n| format!("{name}_{n}"))
        .find(|candidate| !collides(candidate))
        .unwrap_or_else(|| name.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ImportInfo {
    name: String,
    /// The chosen name differs from the package's own name.
    differs: bool,
}

/// Import table of one generated file.
pub struct Importer<'u> {
    universe: &'u Universe,
    pkg_path: String,
    imports: BTreeMap<String, ImportInfo>,
}

impl<'u> Importer<'u> {
    /// An empty table for a file in package `pkg_path`.
    pub fn new(universe: &'u Universe, pkg_path: impl Into<String>) -> Self {
        Self {
            universe,
            pkg_path: pkg_path.into(),
            imports: BTreeMap::new(),
        }
    }

    pub fn pkg_path(&self) -> &str {
        &self.pkg_path
    }

    pub fn universe(&self) -> &'u Universe {
        self.universe
    }

    /// Local name for `path`; empty for the file's own package.
    pub fn import(&mut self, name: &str, path: &str) -> String {
        if path == self.pkg_path {
            return String::new();
        }
        let unvendored = match path.rfind("vendor/") {
            Some(i) if i == 0 || path.as_bytes()[i - 1] == b'/' => &path[i + "vendor/".len()..],
            _ => path,
        };
        if let Some(info) = self.imports.get(unvendored) {
            return info.name.clone();
        }
        let own = self.package_name(unvendored);
        let name = if name.is_empty() { own.clone() } else { name.to_string() };
        let chosen = disambiguate(&name, |n| GENERATED_LOCALS.contains(&n) || self.name_in_file_scope(n));
        self.imports.insert(
            unvendored.to_string(),
            ImportInfo {
                differs: chosen != own,
                name: chosen.clone(),
            },
        );
        chosen
    }

    /// `name` qualified for use in this file: `pkg.Name` or `Name`.
    pub fn qualified(&mut self, name: &str, path: &str) -> String {
        let pkg = self.import("", path);
        if pkg.is_empty() {
            name.to_string()
        } else {
            format!("{pkg}.{name}")
        }
    }

    /// Go source of `ty`, importing every package it mentions.
    pub fn type_string(&mut self, ty: &Type) -> String {
        let mut out = String::new();
        write_type(self.universe, ty, &mut out, &mut |named: &NamedType| {
            if named.pkg_path.is_empty() {
                named.name.clone()
            } else {
                let pkg = self.import(&named.pkg_name, &named.pkg_path);
                if pkg.is_empty() {
                    named.name.clone()
                } else {
                    format!("{pkg}.{}", named.name)
                }
            }
        });
        out
    }

    /// Local names of the packages imported so far.
    pub fn import_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.imports.values().map(|info| info.name.as_str())
    }

    pub fn has_imports(&self) -> bool {
        !self.imports.is_empty()
    }

    /// Import lines sorted by path: `\t"path"\n` or `\tname "path"\n`.
    pub fn sorted_imports(&self) -> Vec<String> {
        self.imports
            .iter()
            .map(|(path, info)| {
                if info.differs {
                    format!("\t{} {:?}\n", info.name, path)
                } else {
                    format!("\t{path:?}\n")
                }
            })
            .collect()
    }

    /// Source of a user expression, rewritten for this file.
    pub fn expr_source(&mut self, func: &FuncRef) -> String {
        printer::expr(&self.rewrite_pkg_refs(func.file, &func.expr))
    }

    /// Copies `expr`, written in `file`, so it is valid in this file.
    ///
    /// Package-level identifiers of another package become selectors,
    /// package selectors use this file's import names, and bindings
    /// declared inside the expression that clash with file-scope names are
    /// renamed.
    pub fn rewrite_pkg_refs(&mut self, file: FileRef, expr: &Expr) -> Expr {
        let mut rewriter = Rewriter {
            importer: self,
            file,
            scopes: Vec::new(),
            renamed: HashSet::new(),
        };
        let mut copy = expr.clone();
        rewriter.expr(&mut copy);
        copy
    }

    fn package_name(&self, path: &str) -> String {
        match self.universe.package(path) {
            Some(pkg) => pkg.name.clone(),
            None => default_package_name(path).to_string(),
        }
    }

    fn name_in_file_scope(&self, name: &str) -> bool {
        if self.imports.values().any(|info| info.name == name) {
            return true;
        }
        if PREDECLARED.contains(&name) {
            return true;
        }
        self.universe
            .package(&self.pkg_path)
            .is_some_and(|pkg| pkg.scope.contains_key(name))
    }
}

struct Rewriter<'a, 'u> {
    importer: &'a mut Importer<'u>,
    file: FileRef,
    /// Local bindings of the fragment, original name to emitted name.
    scopes: Vec<HashMap<String, String>>,
    renamed: HashSet<String>,
}

impl Rewriter<'_, '_> {
    fn lookup_local(&self, name: &str) -> Option<&String> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn source_pkg(&self) -> &crate::types::Package {
        &self.importer.universe.packages[self.file.pkg]
    }

    fn declare(&mut self, ident: &mut Ident) {
        if ident.name == "_" {
            return;
        }
        let original = ident.name.clone();
        let clashes = |n: &str| self.importer.name_in_file_scope(n) || self.renamed.contains(n);
        let name = if clashes(&original) {
            let chosen = disambiguate(&original, |n| {
                clashes(n) || self.scopes.iter().any(|s| s.values().any(|v| v == n))
            });
            self.renamed.insert(chosen.clone());
            chosen
        } else {
            original.clone()
        };
        ident.name = name.clone();
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(original, name);
        }
    }

    fn ident(&mut self, expr: &mut Expr) {
        let ExprKind::Ident(name) = &expr.kind else {
            return;
        };
        if let Some(local) = self.lookup_local(name) {
            expr.kind = ExprKind::Ident(local.clone());
            return;
        }
        let (pkg_name, pkg_path) = {
            let pkg = self.source_pkg();
            (pkg.name.clone(), pkg.path.clone())
        };
        if pkg_path == self.importer.pkg_path || !self.source_pkg().scope.contains_key(name) {
            return;
        }
        let alias = self.importer.import(&pkg_name, &pkg_path);
        let name = name.clone();
        *expr = Expr::selector(Expr::new(ExprKind::Ident(alias), expr.span.clone()), name);
    }

    fn expr(&mut self, expr: &mut Expr) {
        if matches!(expr.kind, ExprKind::Ident(_)) {
            self.ident(expr);
            return;
        }
        match &mut expr.kind {
            ExprKind::Ident(_) | ExprKind::BasicLit { .. } | ExprKind::Bad(_) => {}
            ExprKind::Selector { x, .. } => {
                if let ExprKind::Ident(name) = &x.kind {
                    if self.lookup_local(name).is_none() {
                        let file = self.importer.universe.file(self.file);
                        if let Some(spec) = file.import_by_name(name) {
                            let path = spec.path.clone();
                            let pkg_name = self.importer.package_name(&path);
                            let alias = self.importer.import(&pkg_name, &path);
                            x.kind = ExprKind::Ident(alias);
                            return;
                        }
                    }
                }
                self.expr(x);
            }
            ExprKind::CompositeLit { ty, elts } => {
                let keyed_by_value = matches!(
                    ty.as_deref().map(|t| &t.kind),
                    Some(ExprKind::MapType { .. } | ExprKind::ArrayType { .. })
                );
                if let Some(ty) = ty {
                    self.expr(ty);
                }
                for elt in elts {
                    match &mut elt.kind {
                        ExprKind::KeyValue { key, value } => {
                            if keyed_by_value || !matches!(key.kind, ExprKind::Ident(_)) {
                                self.expr(key);
                            }
                            self.expr(value);
                        }
                        _ => self.expr(elt),
                    }
                }
            }
            ExprKind::KeyValue { key, value } => {
                self.expr(key);
                self.expr(value);
            }
            ExprKind::FuncLit { sig, body } => {
                self.scopes.push(HashMap::new());
                self.func_type(sig, true);
                self.block(body);
                self.scopes.pop();
            }
            ExprKind::Paren(x) | ExprKind::Star(x) | ExprKind::Unary { x, .. } => self.expr(x),
            ExprKind::Index { x, index } => {
                self.expr(x);
                index.iter_mut().for_each(|e| self.expr(e));
            }
            ExprKind::Slice { x, low, high, max } => {
                self.expr(x);
                for e in [low, high, max].into_iter().flatten() {
                    self.expr(e);
                }
            }
            ExprKind::TypeAssert { x, ty } => {
                self.expr(x);
                if let Some(ty) = ty {
                    self.expr(ty);
                }
            }
            ExprKind::Call { fun, args, .. } => {
                self.expr(fun);
                args.iter_mut().for_each(|e| self.expr(e));
            }
            ExprKind::Binary { x, y, .. } => {
                self.expr(x);
                self.expr(y);
            }
            ExprKind::ArrayType { len, elt } => {
                if let Some(len) = len {
                    self.expr(len);
                }
                self.expr(elt);
            }
            ExprKind::MapType { key, value } => {
                self.expr(key);
                self.expr(value);
            }
            ExprKind::ChanType { value, .. } => self.expr(value),
            ExprKind::FuncType(sig) => self.func_type(sig, false),
            ExprKind::InterfaceType(fields) | ExprKind::StructType(fields) => {
                for field in fields {
                    self.expr(&mut field.ty);
                }
            }
            ExprKind::Ellipsis(elt) => {
                if let Some(elt) = elt {
                    self.expr(elt);
                }
            }
        }
    }

    fn func_type(&mut self, sig: &mut FuncType, bind: bool) {
        for field in sig.params.iter_mut().chain(sig.results.iter_mut()) {
            self.field(field, bind);
        }
    }

    fn field(&mut self, field: &mut Field, bind: bool) {
        self.expr(&mut field.ty);
        if bind {
            for name in &mut field.names {
                self.declare(name);
            }
        }
    }

    fn block(&mut self, block: &mut Block) {
        self.scopes.push(HashMap::new());
        for stmt in &mut block.stmts {
            self.stmt(stmt);
        }
        self.scopes.pop();
    }

    fn stmts(&mut self, stmts: &mut [Stmt]) {
        self.scopes.push(HashMap::new());
        for stmt in stmts {
            self.stmt(stmt);
        }
        self.scopes.pop();
    }

    fn bind_exprs(&mut self, exprs: &mut [Expr]) {
        for e in exprs {
            if let ExprKind::Ident(name) = &e.kind {
                let mut ident = Ident::new(name.clone(), e.span.clone());
                self.declare(&mut ident);
                e.kind = ExprKind::Ident(ident.name);
            }
        }
    }

    fn clauses(&mut self, clauses: &mut [CaseClause]) {
        for clause in clauses {
            clause.list.iter_mut().for_each(|e| self.expr(e));
            self.stmts(&mut clause.body);
        }
    }

    fn stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Expr(e) | StmtKind::Go(e) | StmtKind::Defer(e) => self.expr(e),
            StmtKind::Return(exprs) => exprs.iter_mut().for_each(|e| self.expr(e)),
            StmtKind::Block(block) => self.block(block),
            StmtKind::If { init, cond, body, els } => {
                self.scopes.push(HashMap::new());
                if let Some(init) = init {
                    self.stmt(init);
                }
                self.expr(cond);
                self.block(body);
                if let Some(els) = els {
                    self.stmt(els);
                }
                self.scopes.pop();
            }
            StmtKind::For { init, cond, post, body } => {
                self.scopes.push(HashMap::new());
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(cond) = cond {
                    self.expr(cond);
                }
                if let Some(post) = post {
                    self.stmt(post);
                }
                self.block(body);
                self.scopes.pop();
            }
            StmtKind::Range { key, value, define, x, body } => {
                self.expr(x);
                self.scopes.push(HashMap::new());
                let targets = [key.as_mut(), value.as_mut()].into_iter().flatten();
                for target in targets {
                    if *define {
                        self.bind_exprs(std::slice::from_mut(target));
                    } else {
                        self.expr(target);
                    }
                }
                self.block(body);
                self.scopes.pop();
            }
            StmtKind::Switch { init, tag, clauses } => {
                self.scopes.push(HashMap::new());
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(tag) = tag {
                    self.expr(tag);
                }
                self.clauses(clauses);
                self.scopes.pop();
            }
            StmtKind::TypeSwitch { init, bind, x, clauses } => {
                self.scopes.push(HashMap::new());
                if let Some(init) = init {
                    self.stmt(init);
                }
                self.expr(x);
                if let Some(bind) = bind {
                    self.declare(bind);
                }
                self.clauses(clauses);
                self.scopes.pop();
            }
            StmtKind::Select(clauses) => {
                for clause in clauses {
                    self.scopes.push(HashMap::new());
                    if let Some(comm) = &mut clause.comm {
                        self.stmt(comm);
                    }
                    self.stmts(&mut clause.body);
                    self.scopes.pop();
                }
            }
            StmtKind::Assign { lhs, op, rhs } => {
                rhs.iter_mut().for_each(|e| self.expr(e));
                if op == ":=" {
                    self.bind_new(lhs);
                } else {
                    lhs.iter_mut().for_each(|e| self.expr(e));
                }
            }
            StmtKind::IncDec { x, .. } => self.expr(x),
            StmtKind::Decl(Decl::Var(specs) | Decl::Const(specs)) => {
                for spec in specs {
                    if let Some(ty) = &mut spec.ty {
                        self.expr(ty);
                    }
                    spec.values.iter_mut().for_each(|e| self.expr(e));
                    for name in &mut spec.names {
                        self.declare(name);
                    }
                }
            }
            StmtKind::Decl(Decl::Type(specs)) => {
                for spec in specs {
                    self.expr(&mut spec.ty);
                    self.declare(&mut spec.name);
                }
            }
            StmtKind::Decl(Decl::Func(_)) => {}
            StmtKind::Labeled { stmt, .. } => self.stmt(stmt),
            StmtKind::Send { chan, value } => {
                self.expr(chan);
                self.expr(value);
            }
            StmtKind::Branch { .. } | StmtKind::Empty => {}
        }
    }

    /// `:=` redeclares names already bound in the same scope.
    fn bind_new(&mut self, lhs: &mut [Expr]) {
        for e in lhs {
            let ExprKind::Ident(name) = &e.kind else {
                self.expr(e);
                continue;
            };
            let existing = self.scopes.last().and_then(|s| s.get(name)).cloned();
            match existing {
                Some(local) => e.kind = ExprKind::Ident(local),
                None => self.bind_exprs(std::slice::from_mut(e)),
            }
        }
    }
}

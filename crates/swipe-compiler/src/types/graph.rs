//! Reference graph over package-level objects.
//!
//! Every declaration is a node. Function and method bodies contribute edges
//! to the objects they mention (callees, composite literal types, selector
//! targets) and record the named types they return as composite literals.
//! Error discovery walks this graph from the methods implementing a service.

use std::collections::VecDeque;
use std::fmt;

use indexmap::{IndexMap, IndexSet};

use super::universe::{FileRef, ObjectKind};
use super::{NamedId, Type, Universe};
use crate::diagnostic::Span;
use crate::frontend::go::ast::{Block, Decl, Expr, ExprKind, Stmt, StmtKind};

/// Identifies a package-level object; methods carry their receiver type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjKey {
    pub pkg: String,
    pub recv: Option<String>,
    pub name: String,
}

impl ObjKey {
    pub fn object(pkg: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pkg: pkg.into(),
            recv: None,
            name: name.into(),
        }
    }

    pub fn method(pkg: impl Into<String>, recv: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pkg: pkg.into(),
            recv: Some(recv.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.recv {
            Some(recv) => write!(f, "{}.({}).{}", self.pkg, recv, self.name),
            None => write!(f, "{}.{}", self.pkg, self.name),
        }
    }
}

/// A `return T{...}` or `return &T{...}` observed in a body.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSite {
    pub named: NamedId,
    pub pointer: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    edges: IndexMap<ObjKey, Vec<ObjKey>>,
    returns: IndexMap<ObjKey, Vec<ReturnSite>>,
}

impl CallGraph {
    pub fn build(universe: &Universe) -> Self {
        let mut graph = Self::default();
        for (file_ref, file) in universe.files() {
            let pkg_path = &universe.packages[file_ref.pkg].path;
            for decl in &file.decls {
                match decl {
                    Decl::Func(func) => {
                        let (key, recv) = match &func.recv {
                            Some(recv) => {
                                let type_name = receiver_type_name(&recv.ty).unwrap_or_default();
                                let var = recv.names.first().map(|n| n.name.clone());
                                (
                                    ObjKey::method(pkg_path.clone(), type_name.clone(), func.name.name.clone()),
                                    var.map(|v| (v, type_name)),
                                )
                            }
                            None => (ObjKey::object(pkg_path.clone(), func.name.name.clone()), None),
                        };
                        let mut walker = BodyWalker {
                            universe,
                            file: file_ref,
                            recv,
                            refs: IndexSet::new(),
                            returns: Vec::new(),
                            closure_depth: 0,
                        };
                        if let Some(body) = &func.body {
                            walker.block(body);
                        }
                        graph.edges.insert(key.clone(), walker.refs.into_iter().collect());
                        graph.returns.insert(key, walker.returns);
                    }
                    Decl::Type(specs) => {
                        for spec in specs {
                            graph.add_node(ObjKey::object(pkg_path.clone(), spec.name.name.clone()));
                        }
                    }
                    Decl::Const(specs) | Decl::Var(specs) => {
                        for name in specs.iter().flat_map(|s| s.names.iter()) {
                            graph.add_node(ObjKey::object(pkg_path.clone(), name.name.clone()));
                        }
                    }
                }
            }
        }
        graph
    }

    fn add_node(&mut self, key: ObjKey) {
        self.edges.entry(key).or_default();
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains(&self, key: &ObjKey) -> bool {
        self.edges.contains_key(key)
    }

    pub fn references(&self, key: &ObjKey) -> &[ObjKey] {
        self.edges.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn returns(&self, key: &ObjKey) -> &[ReturnSite] {
        self.returns.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every recorded return site, by declaring function in source order.
    pub fn all_returns(&self) -> impl Iterator<Item = (&ObjKey, &ReturnSite)> {
        self.returns
            .iter()
            .flat_map(|(key, sites)| sites.iter().map(move |site| (key, site)))
    }

    /// Breadth-first walk from `start`, visiting each node once.
    pub fn reachable(&self, start: &ObjKey) -> Vec<&ObjKey> {
        let mut seen: IndexSet<&ObjKey> = IndexSet::new();
        let mut queue = VecDeque::new();
        if let Some((key, _)) = self.edges.get_key_value(start) {
            queue.push_back(key);
        }
        while let Some(key) = queue.pop_front() {
            if !seen.insert(key) {
                continue;
            }
            for next in self.references(key) {
                if let Some((next, _)) = self.edges.get_key_value(next) {
                    queue.push_back(next);
                }
            }
        }
        seen.into_iter().collect()
    }
}

fn receiver_type_name(expr: &Expr) -> Option<String> {
    match &expr.unparen().kind {
        ExprKind::Star(inner) => receiver_type_name(inner),
        ExprKind::Index { x, .. } => receiver_type_name(x),
        ExprKind::Ident(name) => Some(name.clone()),
        _ => None,
    }
}

struct BodyWalker<'u> {
    universe: &'u Universe,
    file: FileRef,
    /// Receiver variable and receiver type name.
    recv: Option<(String, String)>,
    refs: IndexSet<ObjKey>,
    returns: Vec<ReturnSite>,
    closure_depth: usize,
}

impl BodyWalker<'_> {
    fn pkg_path(&self) -> &str {
        &self.universe.packages[self.file.pkg].path
    }

    fn block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(e) | StmtKind::Go(e) | StmtKind::Defer(e) => self.expr(e),
            StmtKind::Return(results) => {
                for result in results {
                    if self.closure_depth == 0 {
                        self.return_site(result);
                    }
                    self.expr(result);
                }
            }
            StmtKind::Block(block) => self.block(block),
            StmtKind::If { init, cond, body, els } => {
                if let Some(init) = init {
                    self.stmt(init);
                }
                self.expr(cond);
                self.block(body);
                if let Some(els) = els {
                    self.stmt(els);
                }
            }
            StmtKind::For { init, cond, post, body } => {
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
            }
            StmtKind::Range { x, body, .. } => {
                self.expr(x);
                self.block(body);
            }
            StmtKind::Switch { init, tag, clauses } => {
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(tag) = tag {
                    self.expr(tag);
                }
                for clause in clauses {
                    clause.list.iter().for_each(|e| self.expr(e));
                    self.stmts(&clause.body);
                }
            }
            StmtKind::TypeSwitch { init, x, clauses, .. } => {
                if let Some(init) = init {
                    self.stmt(init);
                }
                self.expr(x);
                for clause in clauses {
                    clause.list.iter().for_each(|e| self.expr(e));
                    self.stmts(&clause.body);
                }
            }
            StmtKind::Select(clauses) => {
                for clause in clauses {
                    if let Some(comm) = &clause.comm {
                        self.stmt(comm);
                    }
                    self.stmts(&clause.body);
                }
            }
            StmtKind::Assign { lhs, rhs, .. } => {
                lhs.iter().chain(rhs).for_each(|e| self.expr(e));
            }
            StmtKind::IncDec { x, .. } => self.expr(x),
            StmtKind::Send { chan, value } => {
                self.expr(chan);
                self.expr(value);
            }
            StmtKind::Labeled { stmt, .. } => self.stmt(stmt),
            StmtKind::Decl(Decl::Var(specs) | Decl::Const(specs)) => {
                for spec in specs {
                    if let Some(ty) = &spec.ty {
                        self.expr(ty);
                    }
                    spec.values.iter().for_each(|e| self.expr(e));
                }
            }
            StmtKind::Decl(_) | StmtKind::Branch { .. } | StmtKind::Empty => {}
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Ident(name) => {
                if self.universe.packages[self.file.pkg].scope.contains_key(name) {
                    let key = ObjKey::object(self.pkg_path(), name.clone());
                    self.refs.insert(key);
                }
            }
            ExprKind::Selector { x, sel } => {
                if let Some(key) = self.selector_target(x, &sel.name) {
                    self.refs.insert(key);
                } else {
                    self.expr(x);
                }
            }
            ExprKind::CompositeLit { ty, elts } => {
                if let Some(ty) = ty {
                    self.expr(ty);
                }
                elts.iter().for_each(|e| self.expr(e));
            }
            ExprKind::KeyValue { key, value } => {
                self.expr(key);
                self.expr(value);
            }
            ExprKind::FuncLit { body, .. } => {
                self.closure_depth += 1;
                self.block(body);
                self.closure_depth -= 1;
            }
            ExprKind::Paren(x) | ExprKind::Star(x) | ExprKind::Unary { x, .. } => self.expr(x),
            ExprKind::Index { x, index } => {
                self.expr(x);
                index.iter().for_each(|e| self.expr(e));
            }
            ExprKind::Slice { x, low, high, max } => {
                self.expr(x);
                for part in [low, high, max].into_iter().flatten() {
                    self.expr(part);
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
                args.iter().for_each(|e| self.expr(e));
            }
            ExprKind::Binary { x, y, .. } => {
                self.expr(x);
                self.expr(y);
            }
            ExprKind::ArrayType { elt, .. } => self.expr(elt),
            ExprKind::MapType { key, value } => {
                self.expr(key);
                self.expr(value);
            }
            ExprKind::ChanType { value, .. } => self.expr(value),
            ExprKind::Ellipsis(Some(x)) => self.expr(x),
            _ => {}
        }
    }

    /// Resolves `x.sel` to a graph node: a method on the receiver, a method
    /// expression on a local type, or an object of another loaded package.
    fn selector_target(&self, x: &Expr, sel: &str) -> Option<ObjKey> {
        let name = x.unparen().as_ident()?;
        if let Some((var, type_name)) = &self.recv {
            if var == name {
                return Some(ObjKey::method(self.pkg_path(), type_name.clone(), sel));
            }
        }
        let scope = &self.universe.packages[self.file.pkg].scope;
        if let Some(obj) = scope.get(name) {
            return match obj.kind {
                ObjectKind::TypeName(_) => Some(ObjKey::method(self.pkg_path(), name, sel)),
                _ => None,
            };
        }
        let path = &self.universe.file(self.file).import_by_name(name)?.path;
        self.universe
            .lookup(path, sel)
            .map(|_| ObjKey::object(path.clone(), sel))
    }

    fn return_site(&mut self, expr: &Expr) {
        let (lit, pointer) = match &expr.unparen().kind {
            ExprKind::Unary { op, x } if op == "&" => (x.unparen(), true),
            _ => (expr.unparen(), false),
        };
        let ExprKind::CompositeLit { ty: Some(ty), .. } = &lit.kind else {
            return;
        };
        if let Ok(Type::Named(named)) = self.universe.resolve_type(self.file, ty) {
            self.returns.push(ReturnSite {
                named,
                pointer,
                span: expr.span.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::go::{GoPackage, GoParser, ModuleInfo};
    use crate::frontend::SourceSet;
    use std::path::{Path, PathBuf};

    const SRC: &str = r#"package app

type ErrNotFound struct{}

func (ErrNotFound) Error() string { return "not found" }

type svc struct{}

func (s *svc) Get(id int) (string, error) {
	if id == 0 {
		return "", s.missing()
	}
	return "", check(id)
}

func (s *svc) missing() error {
	return &ErrNotFound{}
}

func check(id int) error {
	if id < 0 {
		return ErrNotFound{}
	}
	f := func() error { return nil }
	return f()
}
"#;

    fn load() -> Universe {
        let file = GoParser::new().unwrap().parse(SRC, Path::new("/m/app/a.go")).unwrap();
        Universe::load(SourceSet {
            module: ModuleInfo {
                root: PathBuf::from("/m"),
                path: "example.com/m".to_string(),
            },
            packages: vec![GoPackage {
                name: "app".to_string(),
                path: "example.com/m/app".to_string(),
                dir: PathBuf::from("/m/app"),
                files: vec![file],
            }],
        })
        .unwrap()
    }

    #[test]
    fn test_edges_follow_receiver_calls_and_functions() {
        let u = load();
        let get = ObjKey::method("example.com/m/app", "svc", "Get");
        let refs = u.graph.references(&get);
        assert!(refs.contains(&ObjKey::method("example.com/m/app", "svc", "missing")));
        assert!(refs.contains(&ObjKey::object("example.com/m/app", "check")));
    }

    #[test]
    fn test_returns_reachable_from_method() {
        let u = load();
        let get = ObjKey::method("example.com/m/app", "svc", "Get");
        let sites: Vec<(String, bool)> = u
            .graph
            .reachable(&get)
            .into_iter()
            .flat_map(|key| u.graph.returns(key))
            .map(|site| (u.named(site.named).name.clone(), site.pointer))
            .collect();
        assert_eq!(
            sites,
            [("ErrNotFound".to_string(), true), ("ErrNotFound".to_string(), false)]
        );
    }
}

//! Builds the universe: collects package-level objects, then resolves them
//! lazily so declaration order never matters.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use super::constant::{self, ConstScope, ConstValue, Folded};
use super::universe::{typed, FileRef, Object, ObjectKind, Package, Universe};
use super::{BasicKind, InterfaceType, Method, NamedId, NamedType, Signature, StructType, Type, Var};
use crate::diagnostic::{CompilerError, Span};
use crate::frontend::go::ast::{Decl, Expr, ExprKind, Field, FuncType, LitKind};
use crate::frontend::SourceSet;

/// Name resolution shared by the builder and the finished universe.
pub(super) trait Env {
    fn universe(&self) -> &Universe;

    /// Type named `name` in the scope of package `pkg`.
    fn scope_type(&mut self, pkg: usize, name: &str) -> Option<Type>;

    /// Named type declared outside the module.
    fn external_type(&mut self, path: &str, name: &str) -> Option<Type>;

    /// Underlying type of a named type, resolving it first if needed.
    fn underlying_of(&mut self, id: NamedId) -> Type;

    /// Constant `name` in the scope of package `pkg`.
    fn scope_const(&mut self, pkg: usize, name: &str) -> Option<Folded>;
}

fn qualified_type(env: &mut dyn Env, file: FileRef, pkg: &str, name: &str) -> Option<Type> {
    let path = env.universe().file(file).import_by_name(pkg)?.path.clone();
    match env.universe().package_index(&path) {
        Some(idx) => env.scope_type(idx, name),
        None => env.external_type(&path, name),
    }
}

/// Resolves a type expression.
pub(super) fn type_expr(env: &mut dyn Env, file: FileRef, expr: &Expr) -> Result<Type, CompilerError> {
    let err = |msg: String| CompilerError::type_error(&expr.span, msg);
    match &expr.kind {
        ExprKind::Ident(name) => {
            if let Some(kind) = BasicKind::from_name(name) {
                return Ok(Type::Basic(kind));
            }
            match name.as_str() {
                "error" => return Ok(env.universe().error_type()),
                "any" | "comparable" => return Ok(Type::Interface(InterfaceType::default())),
                _ => {}
            }
            env.scope_type(file.pkg, name)
                .ok_or_else(|| err(format!("undefined: {name}")))
        }
        ExprKind::Selector { x, sel } => {
            let Some(pkg) = x.as_ident() else {
                return Err(err("invalid type expression".to_string()));
            };
            if pkg == "unsafe" && sel.name == "Pointer" {
                return Ok(Type::Basic(BasicKind::UnsafePointer));
            }
            if env.universe().file(file).import_by_name(pkg).is_none() {
                return Err(err(format!("undefined: {pkg}")));
            }
            qualified_type(env, file, pkg, &sel.name)
                .ok_or_else(|| err(format!("undefined: {pkg}.{}", sel.name)))
        }
        ExprKind::Paren(inner) => type_expr(env, file, inner),
        ExprKind::Star(inner) => Ok(Type::pointer(type_expr(env, file, inner)?)),
        ExprKind::ArrayType { len: None, elt } => Ok(Type::slice(type_expr(env, file, elt)?)),
        ExprKind::ArrayType { len: Some(len), elt } => {
            let elem = type_expr(env, file, elt)?;
            let n = match &len.kind {
                ExprKind::Ellipsis(_) => -1,
                _ => {
                    let mut scope = FileScope::new(env, file);
                    constant::eval(len, None, &mut scope)
                        .and_then(|(_, v)| v.as_int())
                        .ok_or_else(|| err("array length must be constant".to_string()))?
                        as i64
                }
            };
            Ok(Type::Array(n, Box::new(elem)))
        }
        ExprKind::Ellipsis(Some(elt)) => Ok(Type::slice(type_expr(env, file, elt)?)),
        ExprKind::MapType { key, value } => Ok(Type::Map(
            Box::new(type_expr(env, file, key)?),
            Box::new(type_expr(env, file, value)?),
        )),
        ExprKind::ChanType { dir, value } => {
            Ok(Type::Chan(*dir, Box::new(type_expr(env, file, value)?)))
        }
        ExprKind::FuncType(ft) => Ok(Type::Signature(Box::new(signature(env, file, ft)?))),
        ExprKind::StructType(fields) => Ok(Type::Struct(struct_type(env, file, fields)?)),
        ExprKind::InterfaceType(fields) => Ok(Type::Interface(interface_type(env, file, fields)?)),
        // Generic instantiation: type arguments are not tracked.
        ExprKind::Index { x, .. } => type_expr(env, file, x),
        _ => Err(err(format!(
            "{} is not a type",
            crate::frontend::go::printer::expr(expr)
        ))),
    }
}

fn vars(env: &mut dyn Env, file: FileRef, fields: &[Field]) -> Result<(Vec<Var>, bool), CompilerError> {
    let mut out = Vec::new();
    let mut variadic = false;
    for field in fields {
        let mut ty = type_expr(env, file, &field.ty)?;
        if field.variadic {
            variadic = true;
            ty = Type::slice(ty);
        }
        if field.names.is_empty() {
            let mut var = Var::new("", ty);
            var.span = field.span.clone();
            out.push(var);
            continue;
        }
        for name in &field.names {
            let mut var = Var::new(name.name.clone(), ty.clone());
            var.span = name.span.clone();
            out.push(var);
        }
    }
    Ok((out, variadic))
}

pub(super) fn signature(env: &mut dyn Env, file: FileRef, ft: &FuncType) -> Result<Signature, CompilerError> {
    let (params, variadic) = vars(env, file, &ft.params)?;
    let (results, _) = vars(env, file, &ft.results)?;
    Ok(Signature {
        params,
        results,
        variadic,
    })
}

/// Name an embedded field is accessed by: the type name without package or `*`.
fn embedded_name(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Selector { sel, .. } => sel.name.clone(),
        ExprKind::Star(inner) | ExprKind::Paren(inner) => embedded_name(inner),
        ExprKind::Index { x, .. } => embedded_name(x),
        _ => String::new(),
    }
}

fn struct_type(env: &mut dyn Env, file: FileRef, fields: &[Field]) -> Result<StructType, CompilerError> {
    let mut out = Vec::new();
    for field in fields {
        let ty = type_expr(env, file, &field.ty)?;
        let mut decorate = |mut var: Var, span: &Span| {
            var.tag = field.tag.clone();
            var.doc = field.doc.clone();
            var.comment = field.comment.clone();
            var.span = span.clone();
            var
        };
        if field.is_embedded() {
            let mut var = Var::new(embedded_name(&field.ty), ty);
            var.embedded = true;
            out.push(decorate(var, &field.span));
            continue;
        }
        for name in &field.names {
            out.push(decorate(Var::new(name.name.clone(), ty.clone()), &name.span));
        }
    }
    Ok(StructType { fields: out })
}

fn interface_type(env: &mut dyn Env, file: FileRef, fields: &[Field]) -> Result<InterfaceType, CompilerError> {
    let mut methods: Vec<Method> = Vec::new();
    let mut embedded = Vec::new();
    for field in fields {
        if let Some(name) = field.names.first() {
            let ExprKind::FuncType(ft) = &field.ty.kind else {
                continue;
            };
            methods.push(Method {
                name: name.name.clone(),
                sig: signature(env, file, ft)?,
                pointer_recv: false,
                doc: field.doc.clone(),
                body: None,
                span: name.span.clone(),
            });
            continue;
        }
        // Union and approximation elements only constrain type parameters.
        if matches!(field.ty.kind, ExprKind::Binary { .. } | ExprKind::Unary { .. }) {
            continue;
        }
        let ty = type_expr(env, file, &field.ty)?;
        if let Type::Named(id) = ty {
            if let Type::Interface(inner) = env.underlying_of(id) {
                methods.extend(inner.methods);
            }
        }
        embedded.push(ty);
    }
    methods.sort_by(|a, b| a.name.cmp(&b.name));
    methods.dedup_by(|a, b| a.name == b.name);
    Ok(InterfaceType { methods, embedded })
}

/// Whether an expression has the shape of a type (used to tell
/// conversions from calls).
fn looks_like_type(env: &mut dyn Env, file: FileRef, expr: &Expr) -> Option<Type> {
    match &expr.kind {
        // Calls into unloaded packages are never taken for conversions, so
        // that `fmt.Sprintf(...)` does not invent a type `fmt.Sprintf`.
        ExprKind::Selector { x, sel } => {
            let pkg = x.as_ident()?;
            let path = env.universe().file(file).import_by_name(pkg)?.path.clone();
            match env.universe().package_index(&path) {
                Some(idx) => env.scope_type(idx, &sel.name),
                None => env
                    .universe()
                    .lookup_named(&path, &sel.name)
                    .map(Type::Named),
            }
        }
        ExprKind::Ident(_)
        | ExprKind::Paren(_)
        | ExprKind::Star(_)
        | ExprKind::ArrayType { .. }
        | ExprKind::MapType { .. }
        | ExprKind::ChanType { .. }
        | ExprKind::FuncType(_)
        | ExprKind::StructType(_)
        | ExprKind::InterfaceType(_) => type_expr(env, file, expr).ok(),
        _ => None,
    }
}

/// Best-effort type of a value expression.
pub(super) fn type_of_expr(env: &mut dyn Env, file: FileRef, expr: &Expr) -> Option<Type> {
    match &expr.kind {
        ExprKind::BasicLit { kind, .. } => Some(Type::Basic(match kind {
            LitKind::Int => BasicKind::UntypedInt,
            LitKind::Float => BasicKind::UntypedFloat,
            LitKind::Imag => BasicKind::Complex128,
            LitKind::Char => BasicKind::UntypedRune,
            LitKind::String => BasicKind::UntypedString,
        })),
        ExprKind::Ident(name) => match name.as_str() {
            "true" | "false" => Some(Type::Basic(BasicKind::UntypedBool)),
            "nil" => Some(Type::Basic(BasicKind::UntypedNil)),
            _ => {
                if let Some(folded) = env.scope_const(file.pkg, name) {
                    return Some(folded.0.unwrap_or_else(|| Type::Basic(folded.1.untyped_kind())));
                }
                match &env.universe().packages[file.pkg].scope.get(name)?.kind {
                    ObjectKind::Var(ty) => Some(ty.clone()),
                    ObjectKind::Func(sig) => Some(Type::Signature(Box::new(sig.clone()))),
                    ObjectKind::Const { ty, .. } => Some(ty.clone()),
                    _ => None,
                }
            }
        },
        ExprKind::Paren(inner) => type_of_expr(env, file, inner),
        ExprKind::Call { fun, .. } => {
            if let Some(ty) = looks_like_type(env, file, fun) {
                return Some(ty);
            }
            match type_of_expr(env, file, fun)? {
                Type::Signature(sig) => sig.results.into_iter().next().map(|v| v.ty),
                _ => None,
            }
        }
        ExprKind::Unary { op, x } if op == "&" => type_of_expr(env, file, x).map(Type::pointer),
        ExprKind::Unary { op, .. } if op == "!" => Some(Type::Basic(BasicKind::UntypedBool)),
        ExprKind::Unary { x, .. } => type_of_expr(env, file, x),
        ExprKind::Binary { op, x, .. } => match op.as_str() {
            "==" | "!=" | "<" | "<=" | ">" | ">=" | "&&" | "||" => {
                Some(Type::Basic(BasicKind::UntypedBool))
            }
            _ => type_of_expr(env, file, x),
        },
        ExprKind::CompositeLit { ty: Some(ty), .. } => type_expr(env, file, ty).ok(),
        ExprKind::FuncLit { sig, .. } => signature(env, file, sig)
            .ok()
            .map(|s| Type::Signature(Box::new(s))),
        ExprKind::Selector { x, sel } => {
            let name = x.as_ident()?;
            // Method expression `T.Method`.
            if let Some(ty) = env.scope_type(file.pkg, name) {
                let method = env.universe().find_method(&ty, &sel.name)?;
                return Some(Type::Signature(Box::new(method.sig.clone())));
            }
            let path = env.universe().file(file).import_by_name(name)?.path.clone();
            let idx = env.universe().package_index(&path)?;
            if let Some(folded) = env.scope_const(idx, &sel.name) {
                return Some(folded.0.unwrap_or_else(|| Type::Basic(folded.1.untyped_kind())));
            }
            match &env.universe().packages[idx].scope.get(&sel.name)?.kind {
                ObjectKind::Var(ty) => Some(ty.clone()),
                ObjectKind::Func(sig) => Some(Type::Signature(Box::new(sig.clone()))),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Constant lookup in the context of one file.
pub(super) struct FileScope<'e> {
    env: &'e mut dyn Env,
    file: FileRef,
}

impl<'e> FileScope<'e> {
    pub(super) fn new(env: &'e mut dyn Env, file: FileRef) -> Self {
        Self { env, file }
    }
}

impl ConstScope for FileScope<'_> {
    fn lookup_const(&mut self, name: &str) -> Option<Folded> {
        self.env.scope_const(self.file.pkg, name)
    }

    fn lookup_qualified(&mut self, pkg: &str, name: &str) -> Option<Folded> {
        let path = self.env.universe().file(self.file).import_by_name(pkg)?.path.clone();
        let idx = self.env.universe().package_index(&path)?;
        self.env.scope_const(idx, name)
    }

    fn conversion_type(&mut self, expr: &Expr) -> Option<Type> {
        looks_like_type(self.env, self.file, expr)
    }

    fn basic_of(&mut self, ty: &Type) -> Option<BasicKind> {
        match ty {
            Type::Basic(kind) => Some(*kind),
            Type::Named(id) => self.env.underlying_of(*id).as_basic(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unresolved,
    InProgress,
    Done,
}

struct ConstSource {
    file: FileRef,
    ty: Option<Expr>,
    value: Option<Expr>,
    iota: i64,
}

struct VarSource {
    file: FileRef,
    name: String,
    ty: Option<Expr>,
    value: Option<Expr>,
}

/// Lazy resolver used while the universe is being built.
struct Resolver {
    u: Universe,
    type_exprs: Vec<Option<(FileRef, Expr)>>,
    state: Vec<State>,
    aliases: HashMap<(usize, String), (FileRef, Expr)>,
    aliases_busy: HashSet<(usize, String)>,
    consts: HashMap<(usize, String), ConstSource>,
    errors: Vec<CompilerError>,
}

impl Env for Resolver {
    fn universe(&self) -> &Universe {
        &self.u
    }

    fn scope_type(&mut self, pkg: usize, name: &str) -> Option<Type> {
        match &self.u.packages[pkg].scope.get(name)?.kind {
            ObjectKind::TypeName(id) => Some(Type::Named(*id)),
            ObjectKind::Alias(_) => Some(self.resolve_alias(pkg, name)),
            _ => None,
        }
    }

    fn external_type(&mut self, path: &str, name: &str) -> Option<Type> {
        let before = self.u.named_types().count();
        let id = self.u.alloc_external(path, name);
        if id >= before {
            self.type_exprs.push(None);
            self.state.push(State::Done);
        }
        Some(Type::Named(id))
    }

    fn underlying_of(&mut self, id: NamedId) -> Type {
        if self.state[id] == State::InProgress {
            let named = self.u.named(id);
            let span = named.span.clone();
            let message = format!("invalid recursive type {}", named.name);
            self.errors.push(CompilerError::type_error(&span, message));
            return Type::Invalid;
        }
        self.resolve_named(id);
        self.u.named(id).underlying.clone()
    }

    fn scope_const(&mut self, pkg: usize, name: &str) -> Option<Folded> {
        if let Some(source) = self.consts.remove(&(pkg, name.to_string())) {
            self.fold_const(pkg, name, source);
        }
        match &self.u.packages[pkg].scope.get(name)?.kind {
            ObjectKind::Const { ty, value: Some(value) } => Some((typed(ty), value.clone())),
            _ => None,
        }
    }
}

impl Resolver {
    fn new(set: SourceSet) -> Self {
        let packages = set
            .packages
            .into_iter()
            .map(|p| Package {
                name: p.name,
                path: p.path,
                dir: p.dir,
                files: p.files,
                scope: IndexMap::new(),
            })
            .collect();
        let u = Universe::empty(set.module, packages);
        let count = u.named_types().count();
        Self {
            u,
            type_exprs: vec![None; count],
            state: vec![State::Done; count],
            aliases: HashMap::new(),
            aliases_busy: HashSet::new(),
            consts: HashMap::new(),
            errors: Vec::new(),
        }
    }

    fn declare(&mut self, pkg: usize, object: Object) {
        if object.name == "_" || object.name == "init" {
            return;
        }
        let scope = &mut self.u.packages[pkg].scope;
        if let Some(prev) = scope.get(&object.name) {
            let message = format!("{} redeclared in this block (previous at {})", object.name, prev.span);
            self.errors.push(CompilerError::type_error(&object.span, message));
            return;
        }
        scope.insert(object.name.clone(), object);
    }

    /// Registers every package-level declaration without resolving it.
    fn collect(&mut self) -> (Vec<(FileRef, usize)>, Vec<(FileRef, usize)>, Vec<VarSource>) {
        let mut funcs = Vec::new();
        let mut methods = Vec::new();
        let mut vars = Vec::new();
        for pkg in 0..self.u.packages.len() {
            for file_idx in 0..self.u.packages[pkg].files.len() {
                let file = FileRef { pkg, file: file_idx };
                let decls = self.u.packages[pkg].files[file_idx].decls.clone();
                for (decl_idx, decl) in decls.into_iter().enumerate() {
                    match decl {
                        Decl::Func(func) if func.recv.is_some() => methods.push((file, decl_idx)),
                        Decl::Func(func) => {
                            funcs.push((file, decl_idx));
                            self.declare(pkg, Object {
                                name: func.name.name,
                                kind: ObjectKind::Func(Signature::default()),
                                file: file_idx,
                                doc: func.doc,
                                span: func.name.span,
                            });
                        }
                        Decl::Type(specs) => {
                            for spec in specs {
                                let kind = if spec.alias {
                                    self.aliases.insert((pkg, spec.name.name.clone()), (file, spec.ty));
                                    ObjectKind::Alias(Type::Invalid)
                                } else {
                                    let id = self.u.alloc_named(NamedType {
                                        name: spec.name.name.clone(),
                                        pkg_path: self.u.packages[pkg].path.clone(),
                                        pkg_name: self.u.packages[pkg].name.clone(),
                                        underlying: Type::Invalid,
                                        methods: Vec::new(),
                                        doc: spec.doc.clone(),
                                        span: spec.name.span.clone(),
                                        external: false,
                                    });
                                    self.type_exprs.push(Some((file, spec.ty)));
                                    self.state.push(State::Unresolved);
                                    ObjectKind::TypeName(id)
                                };
                                self.declare(pkg, Object {
                                    name: spec.name.name,
                                    kind,
                                    file: file_idx,
                                    doc: spec.doc,
                                    span: spec.name.span,
                                });
                            }
                        }
                        Decl::Const(specs) => {
                            let mut last_ty = None;
                            let mut last_values = Vec::new();
                            for spec in specs {
                                if !spec.values.is_empty() {
                                    last_ty = spec.ty.clone();
                                    last_values = spec.values.clone();
                                }
                                for (i, name) in spec.names.iter().enumerate() {
                                    self.consts.insert((pkg, name.name.clone()), ConstSource {
                                        file,
                                        ty: last_ty.clone(),
                                        value: last_values.get(i).cloned(),
                                        iota: spec.iota,
                                    });
                                    self.declare(pkg, Object {
                                        name: name.name.clone(),
                                        kind: ObjectKind::Const {
                                            ty: Type::Invalid,
                                            value: None,
                                        },
                                        file: file_idx,
                                        doc: spec.doc.clone(),
                                        span: name.span.clone(),
                                    });
                                }
                            }
                        }
                        Decl::Var(specs) => {
                            for spec in specs {
                                let single = spec.values.len() == spec.names.len();
                                for (i, name) in spec.names.iter().enumerate() {
                                    vars.push(VarSource {
                                        file,
                                        name: name.name.clone(),
                                        ty: spec.ty.clone(),
                                        value: if single { spec.values.get(i).cloned() } else { None },
                                    });
                                    self.declare(pkg, Object {
                                        name: name.name.clone(),
                                        kind: ObjectKind::Var(Type::Invalid),
                                        file: file_idx,
                                        doc: spec.doc.clone(),
                                        span: name.span.clone(),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
        (funcs, methods, vars)
    }

    fn resolve_named(&mut self, id: NamedId) {
        if self.state[id] != State::Unresolved {
            return;
        }
        self.state[id] = State::InProgress;
        if let Some((file, expr)) = self.type_exprs[id].clone() {
            let underlying = match type_expr(self, file, &expr) {
                Ok(Type::Named(other)) => self.underlying_of(other),
                Ok(ty) => ty,
                Err(e) => {
                    self.errors.push(e);
                    Type::Invalid
                }
            };
            self.u.named[id].underlying = underlying;
        }
        self.state[id] = State::Done;
    }

    fn resolve_alias(&mut self, pkg: usize, name: &str) -> Type {
        if let Some(ObjectKind::Alias(ty)) = self.u.packages[pkg].scope.get(name).map(|o| &o.kind) {
            if *ty != Type::Invalid {
                return ty.clone();
            }
        }
        let key = (pkg, name.to_string());
        let Some((file, expr)) = self.aliases.get(&key).cloned() else {
            return Type::Invalid;
        };
        if !self.aliases_busy.insert(key.clone()) {
            self.errors
                .push(CompilerError::type_error(&expr.span, format!("invalid recursive type alias {name}")));
            return Type::Invalid;
        }
        let ty = type_expr(self, file, &expr).unwrap_or_else(|e| {
            self.errors.push(e);
            Type::Invalid
        });
        if let Some(obj) = self.u.packages[pkg].scope.get_mut(name) {
            obj.kind = ObjectKind::Alias(ty.clone());
        }
        self.aliases_busy.remove(&key);
        ty
    }

    fn fold_const(&mut self, pkg: usize, name: &str, source: ConstSource) {
        let declared = match &source.ty {
            Some(ty) => match type_expr(self, source.file, ty) {
                Ok(ty) => Some(ty),
                Err(e) => {
                    self.errors.push(e);
                    None
                }
            },
            None => None,
        };
        let folded = source.value.as_ref().and_then(|value| {
            let mut scope = FileScope::new(self, source.file);
            constant::eval(value, Some(source.iota), &mut scope)
        });
        let (ty, value) = match folded {
            Some((folded_ty, value)) => {
                let ty = declared
                    .or(folded_ty)
                    .unwrap_or_else(|| Type::Basic(value.untyped_kind()));
                let value = coerce(self, &ty, value);
                (ty, Some(value))
            }
            None => (declared.unwrap_or(Type::Invalid), None),
        };
        if let Some(obj) = self.u.packages[pkg].scope.get_mut(name) {
            obj.kind = ObjectKind::Const { ty, value };
        }
    }

    fn resolve_funcs(&mut self, funcs: &[(FileRef, usize)]) {
        for &(file, decl_idx) in funcs {
            let Decl::Func(func) = &self.u.file(file).decls[decl_idx] else {
                continue;
            };
            let (name, ft) = (func.name.name.clone(), func.sig.clone());
            match signature(self, file, &ft) {
                Ok(sig) => {
                    if let Some(obj) = self.u.packages[file.pkg].scope.get_mut(&name) {
                        obj.kind = ObjectKind::Func(sig);
                    }
                }
                Err(e) => self.errors.push(e),
            }
        }
    }

    fn resolve_methods(&mut self, methods: &[(FileRef, usize)]) {
        for &(file, decl_idx) in methods {
            let Decl::Func(func) = self.u.file(file).decls[decl_idx].clone() else {
                continue;
            };
            let Some(recv) = &func.recv else {
                continue;
            };
            let (base, pointer_recv) = match &recv.ty.unparen().kind {
                ExprKind::Star(inner) => (inner.unparen(), true),
                _ => (recv.ty.unparen(), false),
            };
            let base = match &base.kind {
                ExprKind::Index { x, .. } => x.as_ref(),
                _ => base,
            };
            let Some(type_name) = base.as_ident() else {
                self.errors
                    .push(CompilerError::type_error(&recv.span, "invalid receiver type"));
                continue;
            };
            let id = match self.u.packages[file.pkg].scope.get(type_name).map(|o| &o.kind) {
                Some(ObjectKind::TypeName(id)) => *id,
                _ => {
                    self.errors
                        .push(CompilerError::type_error(&base.span, format!("undefined: {type_name}")));
                    continue;
                }
            };
            let sig = match signature(self, file, &func.sig) {
                Ok(sig) => sig,
                Err(e) => {
                    self.errors.push(e);
                    continue;
                }
            };
            let named = &mut self.u.named[id];
            if named.method(&func.name.name).is_some() {
                let message = format!("method {}.{} already declared", named.name, func.name.name);
                self.errors.push(CompilerError::type_error(&func.name.span, message));
                continue;
            }
            named.methods.push(Method {
                name: func.name.name.clone(),
                sig,
                pointer_recv,
                doc: func.doc.clone(),
                body: func.body.clone(),
                span: func.name.span.clone(),
            });
        }
    }

    fn resolve_vars(&mut self, vars: Vec<VarSource>) {
        for var in vars {
            let ty = match (&var.ty, &var.value) {
                (Some(ty), _) => type_expr(self, var.file, ty).unwrap_or_else(|e| {
                    self.errors.push(e);
                    Type::Invalid
                }),
                (None, Some(value)) => type_of_expr(self, var.file, value).unwrap_or(Type::Invalid),
                (None, None) => Type::Invalid,
            };
            if let Some(obj) = self.u.packages[var.file.pkg].scope.get_mut(&var.name) {
                obj.kind = ObjectKind::Var(ty);
            }
        }
    }
}

/// Converts a folded value to the representation of its declared type.
fn coerce(env: &mut dyn Env, ty: &Type, value: ConstValue) -> ConstValue {
    let kind = match ty {
        Type::Basic(kind) => Some(*kind),
        Type::Named(id) => env.underlying_of(*id).as_basic(),
        _ => None,
    };
    match (kind, value) {
        (Some(k), ConstValue::Int(v)) if k.is_float() => ConstValue::Float(v as f64),
        (Some(k), ConstValue::Float(f)) if k.is_integer() && f.fract() == 0.0 => ConstValue::Int(f as i128),
        (_, v) => v,
    }
}

/// Type-checks a source set into a universe. All errors are collected and
/// returned together.
pub(super) fn resolve(set: SourceSet) -> Result<Universe, CompilerError> {
    let mut resolver = Resolver::new(set);
    let (funcs, methods, vars) = resolver.collect();

    for id in 0..resolver.state.len() {
        resolver.resolve_named(id);
    }
    let aliases: Vec<(usize, String)> = resolver.aliases.keys().cloned().collect();
    for (pkg, name) in aliases {
        resolver.resolve_alias(pkg, &name);
    }
    resolver.resolve_funcs(&funcs);
    resolver.resolve_methods(&methods);
    let consts: Vec<(usize, String)> = resolver.consts.keys().cloned().collect();
    for (pkg, name) in consts {
        resolver.scope_const(pkg, &name);
    }
    resolver.resolve_vars(vars);

    if !resolver.errors.is_empty() {
        let mut errors = resolver.errors;
        errors.sort_by(|a, b| a.span().cmp(&b.span()));
        errors.dedup_by(|a, b| a.to_string() == b.to_string());
        return Err(CompilerError::LoadFailed { errors });
    }
    debug!(
        funcs = funcs.len(),
        methods = methods.len(),
        "resolved package objects"
    );
    Ok(resolver.u)
}

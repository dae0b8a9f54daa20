//! The loaded, type-checked package set.

use std::collections::HashMap;
use std::path::PathBuf;

use indexmap::IndexMap;
use tracing::{debug, info_span};

use super::comments::CommentMap;
use super::constant::{self, ConstValue, Folded};
use super::enums::{self, EnumMember};
use super::graph::CallGraph;
use super::resolve::{self, Env};
use super::{BasicKind, InterfaceType, Method, NamedId, NamedType, Signature, Type, Var};
use crate::diagnostic::{CompilerError, Span};
use crate::frontend::go::ast::{ChanDir, Expr, ParsedFile};
use crate::frontend::go::ModuleInfo;
use crate::frontend::SourceSet;

/// A file of a loaded package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileRef {
    pub pkg: usize,
    pub file: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    TypeName(NamedId),
    Alias(Type),
    Func(Signature),
    Var(Type),
    /// `value` is `None` when the initializer could not be folded.
    Const { ty: Type, value: Option<ConstValue> },
}

/// A package-level declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub name: String,
    pub kind: ObjectKind,
    /// Index of the declaring file inside its package.
    pub file: usize,
    pub doc: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub path: String,
    pub dir: PathBuf,
    pub files: Vec<ParsedFile>,
    pub scope: IndexMap<String, Object>,
}

/// Everything later phases know about the source code. Built once, then
/// shared read-only.
#[derive(Debug)]
pub struct Universe {
    pub module: ModuleInfo,
    pub packages: Vec<Package>,
    pub(super) named: Vec<NamedType>,
    pub(super) externals: HashMap<(String, String), NamedId>,
    pub(super) error_type: NamedId,
    pub enums: IndexMap<NamedId, Vec<EnumMember>>,
    pub comments: CommentMap,
    pub graph: CallGraph,
}

impl Universe {
    /// Type-checks the loaded sources and derives enums, comments and the
    /// call graph.
    pub fn load(set: SourceSet) -> Result<Self, CompilerError> {
        let _span = info_span!("typecheck").entered();
        let mut universe = resolve::resolve(set)?;
        universe.enums = enums::collect(&universe);
        universe.comments = CommentMap::collect(&universe);
        universe.graph = CallGraph::build(&universe);
        debug!(
            packages = universe.packages.len(),
            named = universe.named.len(),
            enums = universe.enums.len(),
            "universe ready"
        );
        Ok(universe)
    }

    pub(super) fn empty(module: ModuleInfo, packages: Vec<Package>) -> Self {
        let error = NamedType {
            name: "error".to_string(),
            pkg_path: String::new(),
            pkg_name: String::new(),
            underlying: Type::Invalid,
            methods: Vec::new(),
            doc: Vec::new(),
            span: Span::unknown(),
            external: true,
        };
        let mut universe = Self {
            module,
            packages,
            named: vec![error],
            externals: HashMap::new(),
            error_type: 0,
            enums: IndexMap::new(),
            comments: CommentMap::default(),
            graph: CallGraph::default(),
        };
        universe.named[0].underlying = Type::Interface(InterfaceType {
            methods: vec![interface_method("Error", vec![], vec![Type::Basic(BasicKind::String)])],
            embedded: Vec::new(),
        });
        universe
    }

    pub fn named(&self, id: NamedId) -> &NamedType {
        &self.named[id]
    }

    pub fn named_types(&self) -> impl Iterator<Item = (NamedId, &NamedType)> {
        self.named.iter().enumerate()
    }

    pub fn error_type(&self) -> Type {
        Type::Named(self.error_type)
    }

    pub fn package(&self, path: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.path == path)
    }

    pub fn package_index(&self, path: &str) -> Option<usize> {
        self.packages.iter().position(|p| p.path == path)
    }

    pub fn file(&self, file: FileRef) -> &ParsedFile {
        &self.packages[file.pkg].files[file.file]
    }

    /// Iterates every file of every package.
    pub fn files(&self) -> impl Iterator<Item = (FileRef, &ParsedFile)> {
        self.packages.iter().enumerate().flat_map(|(pkg, p)| {
            p.files
                .iter()
                .enumerate()
                .map(move |(file, f)| (FileRef { pkg, file }, f))
        })
    }

    /// The loaded file at `path`.
    pub fn file_at(&self, path: &std::path::Path) -> Option<FileRef> {
        self.files().find(|(_, f)| f.path == path).map(|(r, _)| r)
    }

    pub fn lookup(&self, pkg_path: &str, name: &str) -> Option<&Object> {
        self.package(pkg_path)?.scope.get(name)
    }

    /// Finds a named type declared in a loaded package or seen as an external.
    pub fn lookup_named(&self, pkg_path: &str, name: &str) -> Option<NamedId> {
        if let Some(obj) = self.lookup(pkg_path, name) {
            return match obj.kind {
                ObjectKind::TypeName(id) => Some(id),
                _ => None,
            };
        }
        self.externals
            .get(&(pkg_path.to_string(), name.to_string()))
            .copied()
    }

    /// The underlying type, following named types.
    pub fn underlying<'a>(&'a self, ty: &'a Type) -> &'a Type {
        match ty {
            Type::Named(id) => &self.named[*id].underlying,
            other => other,
        }
    }

    pub fn named_of(&self, ty: &Type) -> Option<&NamedType> {
        ty.as_named().map(|id| &self.named[id])
    }

    pub fn is_error(&self, ty: &Type) -> bool {
        ty.as_named() == Some(self.error_type)
    }

    pub fn is_context(&self, ty: &Type) -> bool {
        self.named_of(ty)
            .is_some_and(|n| n.pkg_path == "context" && n.name == "Context")
    }

    pub fn is_named(&self, ty: &Type, pkg_path: &str, name: &str) -> bool {
        self.named_of(ty)
            .is_some_and(|n| n.pkg_path == pkg_path && n.name == name)
    }

    pub fn is_uuid(&self, ty: &Type) -> bool {
        self.named_of(ty)
            .is_some_and(|n| n.name == "UUID" && n.pkg_path.contains("uuid"))
    }

    pub fn is_time(&self, ty: &Type) -> bool {
        self.is_named(ty, "time", "Time")
    }

    pub fn is_duration(&self, ty: &Type) -> bool {
        self.is_named(ty, "time", "Duration")
    }

    pub fn is_url(&self, ty: &Type) -> bool {
        self.is_named(ty, "net/url", "URL")
    }

    pub fn is_interface(&self, ty: &Type) -> bool {
        matches!(self.underlying(ty), Type::Interface(_))
    }

    /// Basic kind of a type, following named types.
    pub fn basic(&self, ty: &Type) -> Option<BasicKind> {
        self.underlying(ty).as_basic()
    }

    /// Methods callable on a value of `ty`. Pointer receivers are included
    /// only for pointer types.
    pub fn method_set<'a>(&'a self, ty: &'a Type) -> Vec<&'a Method> {
        let (named, pointer) = match ty {
            Type::Pointer(elem) => (elem.as_named(), true),
            other => (other.as_named(), false),
        };
        if let Type::Interface(iface) = self.underlying(ty) {
            return iface.methods.iter().collect();
        }
        let Some(id) = named else {
            return Vec::new();
        };
        self.named[id]
            .methods
            .iter()
            .filter(|m| pointer || !m.pointer_recv)
            .collect()
    }

    /// Finds a declared method by name regardless of receiver kind.
    pub fn find_method(&self, ty: &Type, name: &str) -> Option<&Method> {
        let id = ty.deref().as_named()?;
        let named = &self.named[id];
        named.method(name).or_else(|| match &named.underlying {
            Type::Interface(iface) => iface.method(name),
            _ => None,
        })
    }

    /// Reports whether `ty` has every method of `iface` (by name and arity).
    pub fn implements(&self, ty: &Type, iface: &InterfaceType) -> bool {
        let methods = self.method_set(ty);
        iface.methods.iter().all(|want| {
            methods.iter().any(|have| {
                have.name == want.name
                    && have.sig.params.len() == want.sig.params.len()
                    && have.sig.results.len() == want.sig.results.len()
            })
        })
    }

    /// Resolves a type expression written in `file`.
    pub fn resolve_type(&self, file: FileRef, expr: &Expr) -> Result<Type, CompilerError> {
        resolve::type_expr(&mut Frozen(self), file, expr)
    }

    /// Best-effort type of a value expression written in `file`.
    pub fn type_of(&self, file: FileRef, expr: &Expr) -> Option<Type> {
        resolve::type_of_expr(&mut Frozen(self), file, expr)
    }

    /// Folds a constant expression written in `file`.
    pub fn const_value(&self, file: FileRef, expr: &Expr) -> Option<ConstValue> {
        let mut env = Frozen(self);
        let mut scope = resolve::FileScope::new(&mut env, file);
        constant::eval(expr, None, &mut scope).map(|(_, v)| v)
    }

    /// Go source text of a type, qualified by package name.
    pub fn type_name(&self, ty: &Type) -> String {
        let mut out = String::new();
        write_type(self, ty, &mut out, &mut |n| {
            if n.pkg_name.is_empty() {
                n.name.clone()
            } else {
                format!("{}.{}", n.pkg_name, n.name)
            }
        });
        out
    }

    pub(super) fn alloc_named(&mut self, named: NamedType) -> NamedId {
        self.named.push(named);
        self.named.len() - 1
    }

    /// Records a named type declared outside the module.
    pub(super) fn alloc_external(&mut self, path: &str, name: &str) -> NamedId {
        let key = (path.to_string(), name.to_string());
        if let Some(id) = self.externals.get(&key) {
            return *id;
        }
        let underlying = well_known(path, name, self.error_type);
        let pkg_name = crate::frontend::go::ast::default_package_name(path).to_string();
        let id = self.alloc_named(NamedType {
            name: name.to_string(),
            pkg_path: path.to_string(),
            pkg_name,
            underlying,
            methods: Vec::new(),
            doc: Vec::new(),
            span: Span::unknown(),
            external: true,
        });
        self.externals.insert(key, id);
        id
    }
}

/// Writes Go source for `ty`, qualifying named types with `qualify`.
pub fn write_type(
    universe: &Universe,
    ty: &Type,
    out: &mut String,
    qualify: &mut dyn FnMut(&NamedType) -> String,
) {
    match ty {
        Type::Basic(kind) => out.push_str(kind.name()),
        Type::Named(id) => out.push_str(&qualify(universe.named(*id))),
        Type::Pointer(elem) => {
            out.push('*');
            write_type(universe, elem, out, qualify);
        }
        Type::Slice(elem) => {
            out.push_str("[]");
            write_type(universe, elem, out, qualify);
        }
        Type::Array(len, elem) => {
            out.push_str(&format!("[{len}]"));
            write_type(universe, elem, out, qualify);
        }
        Type::Map(key, value) => {
            out.push_str("map[");
            write_type(universe, key, out, qualify);
            out.push(']');
            write_type(universe, value, out, qualify);
        }
        Type::Chan(dir, elem) => {
            out.push_str(match dir {
                ChanDir::Both => "chan ",
                ChanDir::Send => "chan<- ",
                ChanDir::Recv => "<-chan ",
            });
            write_type(universe, elem, out, qualify);
        }
        Type::Signature(sig) => {
            out.push_str("func");
            write_signature(universe, sig, out, qualify);
        }
        Type::Struct(st) if st.fields.is_empty() => out.push_str("struct{}"),
        Type::Struct(st) => {
            out.push_str("struct{ ");
            for (i, field) in st.fields.iter().enumerate() {
                if i > 0 {
                    out.push_str("; ");
                }
                if !field.embedded {
                    out.push_str(&field.name);
                    out.push(' ');
                }
                write_type(universe, &field.ty, out, qualify);
                if let Some(tag) = &field.tag {
                    out.push_str(" `");
                    out.push_str(tag);
                    out.push('`');
                }
            }
            out.push_str(" }");
        }
        Type::Interface(iface) if iface.methods.is_empty() && iface.embedded.is_empty() => {
            out.push_str("interface{}")
        }
        Type::Interface(iface) => {
            out.push_str("interface{ ");
            for (i, method) in iface.methods.iter().enumerate() {
                if i > 0 {
                    out.push_str("; ");
                }
                out.push_str(&method.name);
                write_signature(universe, &method.sig, out, qualify);
            }
            out.push_str(" }");
        }
        Type::Invalid => out.push_str("invalid type"),
    }
}

/// Writes `(params) results` without the `func` keyword.
pub fn write_signature(
    universe: &Universe,
    sig: &Signature,
    out: &mut String,
    qualify: &mut dyn FnMut(&NamedType) -> String,
) {
    out.push('(');
    write_vars(universe, &sig.params, sig.variadic, out, qualify);
    out.push(')');
    match sig.results.as_slice() {
        [] => {}
        [single] if single.name.is_empty() => {
            out.push(' ');
            write_type(universe, &single.ty, out, qualify);
        }
        results => {
            out.push_str(" (");
            write_vars(universe, results, false, out, qualify);
            out.push(')');
        }
    }
}

fn write_vars(
    universe: &Universe,
    vars: &[Var],
    variadic: bool,
    out: &mut String,
    qualify: &mut dyn FnMut(&NamedType) -> String,
) {
    for (i, var) in vars.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        if !var.name.is_empty() {
            out.push_str(&var.name);
            out.push(' ');
        }
        match (&var.ty, variadic && i + 1 == vars.len()) {
            (Type::Slice(elem), true) => {
                out.push_str("...");
                write_type(universe, elem, out, qualify);
            }
            (ty, _) => write_type(universe, ty, out, qualify),
        }
    }
}

fn interface_method(name: &str, params: Vec<Type>, results: Vec<Type>) -> Method {
    Method {
        name: name.to_string(),
        sig: Signature {
            params: params.into_iter().map(|t| Var::new("", t)).collect(),
            results: results.into_iter().map(|t| Var::new("", t)).collect(),
            variadic: false,
        },
        pointer_recv: false,
        doc: Vec::new(),
        body: None,
        span: Span::unknown(),
    }
}

/// Underlying types of external named types the generators care about.
/// Anything else is treated as an opaque struct.
fn well_known(path: &str, name: &str, error: NamedId) -> Type {
    let byte = || Box::new(Type::Basic(BasicKind::Byte));
    let empty_iface = || Type::Interface(InterfaceType::default());
    match (path, name) {
        ("context", "Context") => Type::Interface(InterfaceType {
            methods: vec![
                interface_method(
                    "Done",
                    vec![],
                    vec![Type::Chan(ChanDir::Recv, Box::new(Type::Struct(Default::default())))],
                ),
                interface_method("Err", vec![], vec![Type::Named(error)]),
                interface_method("Value", vec![empty_iface()], vec![empty_iface()]),
            ],
            embedded: Vec::new(),
        }),
        ("time", "Duration") => Type::Basic(BasicKind::Int64),
        ("time", "Month") | ("time", "Weekday") | ("net/http", "ConnState") => {
            Type::Basic(BasicKind::Int)
        }
        ("encoding/json", "RawMessage") | ("net", "IP") => Type::Slice(byte()),
        ("encoding/json", "Number") => Type::Basic(BasicKind::String),
        ("github.com/pborman/uuid", "UUID") => Type::Slice(byte()),
        (p, "UUID") if p.contains("uuid") => Type::Array(16, byte()),
        ("net/http", "Header") | ("net/url", "Values") => Type::Map(
            Box::new(Type::Basic(BasicKind::String)),
            Box::new(Type::slice(Type::Basic(BasicKind::String))),
        ),
        ("io", _) | ("net/http", "Handler") | ("fmt", "Stringer") => empty_iface(),
        _ => Type::Struct(Default::default()),
    }
}

/// Read-only environment over a finished universe.
pub(super) struct Frozen<'u>(pub &'u Universe);

impl Env for Frozen<'_> {
    fn universe(&self) -> &Universe {
        self.0
    }

    fn scope_type(&mut self, pkg: usize, name: &str) -> Option<Type> {
        match &self.0.packages[pkg].scope.get(name)?.kind {
            ObjectKind::TypeName(id) => Some(Type::Named(*id)),
            ObjectKind::Alias(ty) => Some(ty.clone()),
            _ => None,
        }
    }

    fn external_type(&mut self, path: &str, name: &str) -> Option<Type> {
        self.0
            .externals
            .get(&(path.to_string(), name.to_string()))
            .map(|id| Type::Named(*id))
    }

    fn underlying_of(&mut self, id: NamedId) -> Type {
        self.0.named[id].underlying.clone()
    }

    fn scope_const(&mut self, pkg: usize, name: &str) -> Option<Folded> {
        match &self.0.packages[pkg].scope.get(name)?.kind {
            ObjectKind::Const { ty, value: Some(value) } => Some((typed(ty), value.clone())),
            _ => None,
        }
    }
}

/// Drops untyped constant types; folding treats those as `None`.
pub(super) fn typed(ty: &Type) -> Option<Type> {
    match ty {
        Type::Basic(kind) if kind.is_untyped() => None,
        other => Some(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::go::GoParser;
    use crate::frontend::go::GoPackage;
    use std::path::Path;

    fn universe(sources: &[(&str, &str)]) -> Universe {
        let mut parser = GoParser::new().unwrap();
        let files = sources
            .iter()
            .map(|(name, src)| parser.parse(src, &Path::new("/m/app").join(name)).unwrap())
            .collect();
        let set = SourceSet {
            module: ModuleInfo {
                root: PathBuf::from("/m"),
                path: "example.com/m".to_string(),
            },
            packages: vec![GoPackage {
                name: "app".to_string(),
                path: "example.com/m/app".to_string(),
                dir: PathBuf::from("/m/app"),
                files,
            }],
        };
        Universe::load(set).unwrap()
    }

    #[test]
    fn test_method_sets_respect_receivers() {
        let u = universe(&[(
            "a.go",
            "package app\n\ntype S struct{}\n\nfunc (S) A() {}\n\nfunc (*S) B() {}\n",
        )]);
        let id = u.lookup_named("example.com/m/app", "S").unwrap();
        let value = Type::Named(id);
        let pointer = Type::pointer(Type::Named(id));
        assert_eq!(u.method_set(&value).len(), 1);
        assert_eq!(u.method_set(&pointer).len(), 2);
    }

    #[test]
    fn test_externals_and_error() {
        let u = universe(&[(
            "a.go",
            "package app\n\nimport (\n\t\"context\"\n\t\"time\"\n)\n\ntype Svc interface {\n\tRun(ctx context.Context, d time.Duration) error\n}\n",
        )]);
        let id = u.lookup_named("example.com/m/app", "Svc").unwrap();
        let Type::Interface(iface) = &u.named(id).underlying else {
            panic!("expected interface");
        };
        let run = iface.method("Run").unwrap();
        assert!(u.is_context(&run.sig.params[0].ty));
        assert!(u.is_duration(&run.sig.params[1].ty));
        assert_eq!(u.basic(&run.sig.params[1].ty), Some(BasicKind::Int64));
        assert!(u.is_error(&run.sig.results[0].ty));
        assert_eq!(u.type_name(&Type::Signature(Box::new(run.sig.clone()))), "func(ctx context.Context, d time.Duration) error");
    }

    #[test]
    fn test_type_of_option_leaves() {
        let u = universe(&[(
            "a.go",
            "package app\n\ntype I interface{ M() }\n\ntype C struct{ A int }\n\nconst Name = \"svc\"\n\nvar (\n\ta = (*I)(nil)\n\tb = &C{}\n\tc = Name + \"-x\"\n)\n",
        )]);
        let file = FileRef { pkg: 0, file: 0 };
        let pkg = &u.packages[0];
        let var_ty = |name: &str| match &pkg.scope[name].kind {
            ObjectKind::Var(ty) => ty.clone(),
            other => panic!("unexpected {other:?}"),
        };
        let iface = u.lookup_named("example.com/m/app", "I").unwrap();
        let strct = u.lookup_named("example.com/m/app", "C").unwrap();
        assert_eq!(var_ty("a"), Type::pointer(Type::Named(iface)));
        assert_eq!(var_ty("b"), Type::pointer(Type::Named(strct)));
        assert_eq!(var_ty("c"), Type::Basic(BasicKind::UntypedString));
        assert_eq!(
            u.const_value(file, &Expr::ident("Name")),
            Some(ConstValue::String("svc".into()))
        );
    }
}

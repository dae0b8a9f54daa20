//! Error code discovery.
//!
//! A user error type maps to a transport code when it implements `error`
//! and has a `StatusCode() int` (REST) or `ErrorCode() int` (JSON-RPC)
//! method whose body returns a single integer constant.

use indexmap::IndexMap;
use tracing::debug;

use crate::frontend::go::ast::StmtKind;
use crate::types::{ConstValue, InterfaceType, NamedId, ObjKey, Type, Universe};

/// An error type with its transport code.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorCode {
    pub named: NamedId,
    pub name: String,
    pub code: i64,
    /// The generated decoder returns `&T{}` instead of `T{}`.
    pub is_pointer: bool,
}

/// Name of the code method for a transport.
pub fn code_method(jsonrpc: bool) -> &'static str {
    if jsonrpc {
        "ErrorCode"
    } else {
        "StatusCode"
    }
}

/// Every error type of the module with a constant code.
pub fn discover(universe: &Universe, method_name: &str) -> IndexMap<NamedId, ErrorCode> {
    let mut observed: IndexMap<NamedId, bool> = IndexMap::new();
    for (_, site) in universe.graph.all_returns() {
        observed.entry(site.named).or_insert(site.pointer);
    }

    let mut errors = IndexMap::new();
    for (id, named) in universe.named_types() {
        if named.external || matches!(named.underlying, Type::Interface(_)) {
            continue;
        }
        let Some(error_method) = named.method("Error") else {
            continue;
        };
        let Some(code_method) = named.method(method_name) else {
            continue;
        };
        let Some(code) = returned_int(universe, code_method) else {
            continue;
        };
        let is_pointer = observed
            .get(&id)
            .copied()
            .unwrap_or(error_method.pointer_recv || code_method.pointer_recv);
        debug!(error = %named.name, code, is_pointer, "found error code");
        errors.insert(
            id,
            ErrorCode {
                named: id,
                name: named.name.clone(),
                code,
                is_pointer,
            },
        );
    }
    errors
}

fn returned_int(universe: &Universe, method: &crate::types::Method) -> Option<i64> {
    let body = method.body.as_ref()?;
    let [stmt] = body.stmts.as_slice() else {
        return None;
    };
    let StmtKind::Return(values) = &stmt.kind else {
        return None;
    };
    let [value] = values.as_slice() else {
        return None;
    };
    let file = universe.file_at(&method.span.file)?;
    match universe.const_value(file, value)? {
        ConstValue::Int(code) => i64::try_from(code).ok(),
        _ => None,
    }
}

/// Errors reachable from functions returning a go-kit `endpoint.Middleware`;
/// they apply to every method.
pub fn generic(universe: &Universe, errors: &IndexMap<NamedId, ErrorCode>) -> Vec<NamedId> {
    let mut found = Vec::new();
    for pkg in &universe.packages {
        for obj in pkg.scope.values() {
            let crate::types::ObjectKind::Func(sig) = &obj.kind else {
                continue;
            };
            let [result] = sig.results.as_slice() else {
                continue;
            };
            if !universe.is_named(&result.ty, "github.com/go-kit/kit/endpoint", "Middleware") {
                continue;
            }
            collect_reachable(universe, &ObjKey::object(pkg.path.clone(), obj.name.clone()), errors, &mut found);
        }
    }
    found
}

/// Errors a service method can return: everything reachable from the
/// implementations of `method`. With no implementation in the module, every
/// known error is assumed.
pub fn for_method(
    universe: &Universe,
    iface: &InterfaceType,
    method: &str,
    errors: &IndexMap<NamedId, ErrorCode>,
) -> Vec<NamedId> {
    let impls: Vec<NamedId> = universe
        .named_types()
        .filter(|(_, n)| !n.external && !matches!(n.underlying, Type::Interface(_)))
        .filter(|(id, _)| universe.implements(&Type::pointer(Type::Named(*id)), iface))
        .map(|(id, _)| id)
        .collect();
    if impls.is_empty() {
        return errors.keys().copied().collect();
    }
    let mut found = Vec::new();
    for id in impls {
        let named = universe.named(id);
        let key = ObjKey::method(named.pkg_path.clone(), named.name.clone(), method);
        collect_reachable(universe, &key, errors, &mut found);
    }
    found
}

fn collect_reachable(
    universe: &Universe,
    start: &ObjKey,
    errors: &IndexMap<NamedId, ErrorCode>,
    found: &mut Vec<NamedId>,
) {
    for key in universe.graph.reachable(start) {
        let referenced = key
            .recv
            .is_none()
            .then(|| universe.lookup_named(&key.pkg, &key.name))
            .flatten();
        let returned = universe.graph.returns(key).iter().map(|site| site.named);
        for id in referenced.into_iter().chain(returned) {
            if errors.contains_key(&id) && !found.contains(&id) {
                found.push(id);
            }
        }
    }
}

/// Orders errors by code, then name.
pub fn sorted<'a>(errors: impl IntoIterator<Item = &'a ErrorCode>) -> Vec<ErrorCode> {
    let mut list: Vec<ErrorCode> = errors.into_iter().cloned().collect();
    list.sort_by(|a, b| a.code.cmp(&b.code).then_with(|| a.name.cmp(&b.name)));
    list
}

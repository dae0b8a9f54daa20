//! Type shapes shared by the JS client, the JSON-RPC reference and the
//! OpenAPI document: JSON field names, the named types a document has to
//! describe, and the JSDoc rendering of Go types.

use indexmap::{IndexMap, IndexSet};

use crate::schema::config::lookup_tag;
use crate::types::{BasicKind, NamedId, Type, Universe, Var};

/// A serialized struct field, after flattening embedded structs.
#[derive(Debug, Clone)]
pub struct JsonField<'u> {
    /// JSON key.
    pub name: String,
    pub var: &'u Var,
    /// Named struct declaring the field, for doc lookups.
    pub owner: Option<NamedId>,
}

/// JSON key of a struct field; `None` when skipped with `json:"-"`.
pub fn json_name(field: &Var) -> Option<String> {
    let Some(tag) = field.tag.as_deref().and_then(|t| lookup_tag(t, "json")) else {
        return Some(field.name.clone());
    };
    match tag.split(',').next().unwrap_or_default() {
        "-" => None,
        "" => Some(field.name.clone()),
        name => Some(name.to_string()),
    }
}

fn has_json_name(field: &Var) -> bool {
    field
        .tag
        .as_deref()
        .and_then(|t| lookup_tag(t, "json"))
        .is_some_and(|t| !t.split(',').next().unwrap_or_default().is_empty())
}

/// Serialized fields of a struct type (or pointer to one).
pub fn json_fields<'u>(u: &'u Universe, ty: &'u Type) -> Vec<JsonField<'u>> {
    let mut out = Vec::new();
    collect_fields(u, ty, None, &mut out, 0);
    out
}

fn collect_fields<'u>(u: &'u Universe, ty: &'u Type, owner: Option<NamedId>, out: &mut Vec<JsonField<'u>>, depth: usize) {
    // Embedding cycles only go through pointers; stop at a sane depth.
    if depth > 8 {
        return;
    }
    let ty = ty.deref();
    let owner = ty.as_named().or(owner);
    let Type::Struct(st) = u.underlying(ty) else {
        return;
    };
    for field in &st.fields {
        if field.embedded && !has_json_name(field) && matches!(u.underlying(field.ty.deref()), Type::Struct(_)) {
            collect_fields(u, &field.ty, owner, out, depth + 1);
            continue;
        }
        if !field.is_exported() {
            continue;
        }
        if let Some(name) = json_name(field) {
            out.push(JsonField { name, var: field, owner });
        }
    }
}

pub fn is_raw_message(u: &Universe, ty: &Type) -> bool {
    u.is_named(ty, "encoding/json", "RawMessage")
}

/// Named types serialized as plain strings or raw JSON.
fn is_well_known(u: &Universe, ty: &Type) -> bool {
    u.is_uuid(ty) || u.is_time(ty) || is_raw_message(u, ty)
}

/// Named types that get their own entry in generated docs.
pub fn is_documented(u: &Universe, id: NamedId) -> bool {
    let ty = Type::Named(id);
    let named = u.named(id);
    !named.external && !is_well_known(u, &ty)
}

/// Collects the documented named types reachable from `ty`, depth first in
/// first-seen order.
pub fn collect_named(u: &Universe, ty: &Type, out: &mut IndexSet<NamedId>) {
    match ty {
        Type::Pointer(elem) | Type::Slice(elem) | Type::Array(_, elem) | Type::Chan(_, elem) => {
            collect_named(u, elem, out)
        }
        Type::Map(_, value) => collect_named(u, value, out),
        Type::Named(id) => {
            if !is_documented(u, *id) || !out.insert(*id) {
                return;
            }
            let named = u.named(*id);
            match &named.underlying {
                Type::Struct(_) => {
                    for field in json_fields(u, ty) {
                        collect_named(u, &field.var.ty, out);
                    }
                }
                other => collect_named(u, other, out),
            }
        }
        Type::Struct(_) => {
            for field in json_fields(u, ty) {
                collect_named(u, &field.var.ty, out);
            }
        }
        _ => {}
    }
}

/// JSDoc type expression.
pub fn js_type(u: &Universe, ty: &Type) -> String {
    match ty {
        Type::Pointer(elem) => js_type(u, elem),
        Type::Slice(elem) if is_byte(elem) => "string".to_string(),
        Type::Slice(elem) | Type::Array(_, elem) => format!("Array<{}>", js_type(u, elem)),
        Type::Map(_, value) => format!("Object<string, {}>", js_type(u, value)),
        Type::Named(id) => {
            if is_raw_message(u, ty) {
                "*".to_string()
            } else if u.is_uuid(ty) || u.is_time(ty) {
                "string".to_string()
            } else if is_documented(u, *id) {
                u.named(*id).name.clone()
            } else {
                js_type(u, &u.named(*id).underlying)
            }
        }
        Type::Basic(kind) => js_basic(*kind).to_string(),
        Type::Interface(_) => "object".to_string(),
        Type::Struct(_) => "Object".to_string(),
        _ => "*".to_string(),
    }
}

fn js_basic(kind: BasicKind) -> &'static str {
    if kind.is_bool() {
        "boolean"
    } else if kind.is_numeric() {
        "number"
    } else {
        "string"
    }
}

fn is_byte(ty: &Type) -> bool {
    matches!(ty, Type::Basic(BasicKind::Byte | BasicKind::Uint8))
}

/// [`js_type`] for HTML contexts; documented types link to their section.
pub fn doc_type(u: &Universe, ty: &Type) -> String {
    match ty {
        Type::Pointer(elem) => doc_type(u, elem),
        Type::Slice(elem) if is_byte(elem) => "string".to_string(),
        Type::Slice(elem) | Type::Array(_, elem) => format!("Array.&lt;{}&gt;", doc_type(u, elem)),
        Type::Map(_, value) => format!("Object.&lt;string, {}&gt;", doc_type(u, value)),
        Type::Named(id) if is_documented(u, *id) => {
            let name = &u.named(*id).name;
            format!("<a href=\"#{name}\">{name}</a>")
        }
        Type::Named(id) if !is_well_known(u, ty) => doc_type(u, &u.named(*id).underlying),
        other => js_type(u, other),
    }
}

/// `@typedef` block of a documented named type.
pub fn js_typedef(u: &Universe, id: NamedId) -> String {
    let named = u.named(id);
    let ty = Type::Named(id);
    match &named.underlying {
        Type::Struct(_) => {
            let mut out = format!("/**\n* @typedef {{Object}} {}\n", named.name);
            for field in json_fields(u, &ty) {
                out.push_str(&format!("* @property {{{}}} {}\n", js_type(u, &field.var.ty), field.name));
            }
            out.push_str("*/\n\n");
            out
        }
        Type::Interface(_) => format!("/**\n* @typedef {{Object}} {}\n*/\n\n", named.name),
        other => format!("/**\n* @typedef {{{}}} {}\n*/\n\n", js_type(u, other), named.name),
    }
}

/// Method doc comments split into free text and `@param description` lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodDoc {
    pub text: Vec<String>,
    pub params: IndexMap<String, String>,
}

impl MethodDoc {
    pub fn parse(comments: &[String]) -> Self {
        let mut doc = Self::default();
        for line in comments {
            match line.trim().strip_prefix('@') {
                Some(rest) => {
                    let (name, desc) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                    doc.params.insert(name.to_string(), desc.trim().to_string());
                }
                None => doc.text.push(line.clone()),
            }
        }
        doc
    }

    pub fn description(&self) -> String {
        self.text.join("\n").trim().to_string()
    }

    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).map_or("", String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing;
    use pretty_assertions::assert_eq;

    const SRC: &str = concat!(
        "package app\n\n",
        "import (\n\t\"encoding/json\"\n\t\"time\"\n\n\t\"github.com/google/uuid\"\n)\n\n",
        "type Status string\n\n",
        "type Base struct {\n\tCreated time.Time `json:\"created\"`\n}\n\n",
        "type Item struct {\n\tBase\n\tID uuid.UUID `json:\"id\"`\n\tSecret string `json:\"-\"`\n\tStatus Status `json:\"status,omitempty\"`\n\tRaw json.RawMessage\n\tChildren []*Item `json:\"children\"`\n\tMeta map[string]int `json:\"meta\"`\n\tData []byte `json:\"data\"`\n\tprivate int\n}\n",
    );

    fn item(u: &Universe) -> Type {
        Type::Named(u.lookup_named("example.com/m/app", "Item").unwrap())
    }

    #[test]
    fn test_json_fields_flatten_embedded() {
        let u = testing::load(&[("app/types.go", SRC)]);
        let ty = item(&u);
        let names: Vec<_> = json_fields(&u, &ty).into_iter().map(|f| f.name).collect();
        assert_eq!(names, ["created", "id", "status", "Raw", "children", "meta", "data"]);
    }

    #[test]
    fn test_collect_named_skips_well_known() {
        let u = testing::load(&[("app/types.go", SRC)]);
        let mut out = IndexSet::new();
        collect_named(&u, &Type::slice(item(&u)), &mut out);
        let names: Vec<_> = out.iter().map(|id| u.named(*id).name.as_str()).collect();
        assert_eq!(names, ["Item", "Status"]);
    }

    #[test]
    fn test_js_types() {
        let u = testing::load(&[("app/types.go", SRC)]);
        let ty = item(&u);
        assert_eq!(js_type(&u, &Type::slice(Type::pointer(ty.clone()))), "Array<Item>");
        let fields = json_fields(&u, &ty);
        let by_name = |n: &str| fields.iter().find(|f| f.name == n).unwrap().var.ty.clone();
        assert_eq!(js_type(&u, &by_name("id")), "string");
        assert_eq!(js_type(&u, &by_name("Raw")), "*");
        assert_eq!(js_type(&u, &by_name("meta")), "Object<string, number>");
        assert_eq!(js_type(&u, &by_name("data")), "string");
        assert_eq!(doc_type(&u, &by_name("children")), "Array.&lt;<a href=\"#Item\">Item</a>&gt;");

        let status = u.lookup_named("example.com/m/app", "Status").unwrap();
        assert_eq!(js_typedef(&u, status), "/**\n* @typedef {string} Status\n*/\n\n");
        assert!(js_typedef(&u, ty.as_named().unwrap()).contains("* @property {Array<Item>} children\n"));
    }

    #[test]
    fn test_method_doc() {
        let doc = MethodDoc::parse(&["Get returns a user.".to_string(), "@fname first name".to_string()]);
        assert_eq!(doc.description(), "Get returns a user.");
        assert_eq!(doc.param("fname"), "first name");
        assert_eq!(doc.param("id"), "");
    }
}

//! `ConfigEnv(...)` validation: the config struct flattened into env and
//! flag bindings.

use tracing::debug;

use super::service::FuncRef;
use super::SiteInfo;
use crate::diagnostic::{CompilerError, Span};
use crate::frontend::go::unquote;
use crate::naming::{normalize_camel_case, to_kebab, to_screaming_snake};
use crate::option::OptionNode;
use crate::types::{BasicKind, NamedId, Type, Universe};
use crate::writer::ValueKind;

/// A leaf field of the config struct.
#[derive(Debug, Clone)]
pub struct ConfigField {
    /// Environment variable, or flag name when `is_flag`.
    pub name: String,
    /// Go selector path below the config value: `DB.Conn`.
    pub field_path: String,
    pub is_flag: bool,
    pub required: bool,
    pub use_zero: bool,
    pub desc: String,
    pub ty: Type,
    pub kind: ValueKind,
    /// Type as shown in docs, qualified by package name.
    pub type_str: String,
}

impl ConfigField {
    pub fn tag_name(&self) -> &'static str {
        if self.is_flag {
            "flag"
        } else {
            "env"
        }
    }
}

/// One step of the loader, in struct order.
#[derive(Debug, Clone)]
pub enum ConfigEntry {
    /// A nil pointer-to-struct field that must be allocated first.
    Alloc { field_path: String, ty: Type },
    Field(ConfigField),
}

#[derive(Debug, Clone)]
pub struct ConfigSpec {
    pub site: SiteInfo,
    pub named: NamedId,
    /// Type of the loader result: `*Config` or `Config`.
    pub ty: Type,
    /// The value the loader starts from, such as `&Config{Name: "x"}`.
    pub init: FuncRef,
    pub func_name: String,
    pub doc_enable: bool,
    pub doc_output: String,
    pub entries: Vec<ConfigEntry>,
}

impl ConfigSpec {
    pub fn fields(&self) -> impl Iterator<Item = &ConfigField> {
        self.entries.iter().filter_map(|e| match e {
            ConfigEntry::Field(f) => Some(f),
            ConfigEntry::Alloc { .. } => None,
        })
    }
}

/// Validates a `ConfigEnv` option tree.
pub fn validate(universe: &Universe, site: SiteInfo, node: &OptionNode) -> Result<ConfigSpec, Vec<CompilerError>> {
    let one = |e: CompilerError| vec![e];
    let value = node.require("optionsStruct").and_then(|n| n.require_value()).map_err(one)?;
    let ty = value
        .ty
        .clone()
        .ok_or_else(|| one(CompilerError::shape(&value.span, "ConfigEnv: cannot determine the type of the config value")))?;
    let named = ty
        .deref()
        .as_named()
        .filter(|id| matches!(universe.named(*id).underlying, Type::Struct(_)))
        .ok_or_else(|| {
            one(CompilerError::shape(
                &value.span,
                format!("ConfigEnv: the config value must be a struct, found {}", universe.type_name(&ty)),
            ))
        })?;

    let func_name = node
        .string("ConfigEnvFuncName")
        .map_err(one)?
        .unwrap_or_else(|| "LoadConfig".to_string());
    let doc_output = node.string("ConfigEnvDocOutput").map_err(one)?.unwrap_or_default();

    let mut walker = Walker {
        universe,
        entries: Vec::new(),
        errors: Vec::new(),
    };
    walker.walk(named, None, &value.span);
    if !walker.errors.is_empty() {
        return Err(walker.errors);
    }
    debug!(config = %universe.named(named).name, fields = walker.entries.len(), "validated ConfigEnv");

    Ok(ConfigSpec {
        init: FuncRef {
            expr: value.expr.clone(),
            file: site.file,
            ty: Some(ty.clone()),
        },
        site,
        named,
        ty,
        func_name,
        doc_enable: node.exists("ConfigEnvDocEnable"),
        doc_output,
        entries: walker.entries,
    })
}

/// Name and path of the enclosing struct field.
struct Parent {
    name: String,
    field_path: String,
    is_flag: bool,
}

struct Walker<'u> {
    universe: &'u Universe,
    entries: Vec<ConfigEntry>,
    errors: Vec<CompilerError>,
}

impl Walker<'_> {
    fn walk(&mut self, id: NamedId, parent: Option<&Parent>, span: &Span) {
        let Type::Struct(st) = &self.universe.named(id).underlying else {
            return;
        };
        for field in &st.fields {
            if !field.is_exported() {
                continue;
            }
            let mut opts = field_opts(&field.name, field.tag.as_deref().unwrap_or_default());
            if let Some(parent) = parent {
                let sep = if opts.is_flag || parent.is_flag { "-" } else { "_" };
                opts.name = format!("{}{}{}", parent.name, sep, opts.name);
                opts.field_path = format!("{}.{}", parent.field_path, opts.field_path);
            }

            if let Some(kind) = ValueKind::of(self.universe, &field.ty) {
                if opts.is_flag && !flag_supported(&kind) {
                    self.errors.push(CompilerError::semantic(
                        &field.span,
                        format!("field {}: flags support string, int, int64, float64 and bool only", opts.field_path),
                    ));
                    continue;
                }
                self.entries.push(ConfigEntry::Field(ConfigField {
                    name: opts.name,
                    field_path: opts.field_path,
                    is_flag: opts.is_flag,
                    required: opts.required,
                    use_zero: opts.use_zero,
                    desc: opts.desc,
                    type_str: self.universe.type_name(&field.ty),
                    ty: field.ty.clone(),
                    kind,
                }));
                continue;
            }

            let next = Parent {
                name: opts.name,
                field_path: opts.field_path,
                is_flag: opts.is_flag,
            };
            match &field.ty {
                Type::Pointer(elem) if self.is_struct(elem) => {
                    self.entries.push(ConfigEntry::Alloc {
                        field_path: next.field_path.clone(),
                        ty: (**elem).clone(),
                    });
                    if let Some(child) = elem.as_named() {
                        self.walk(child, Some(&next), span);
                    }
                }
                ty if self.is_struct(ty) => {
                    if let Some(child) = ty.as_named() {
                        self.walk(child, Some(&next), span);
                    }
                }
                ty => debug!(field = %next.field_path, ty = %self.universe.type_name(ty), "skipping unsupported config field"),
            }
        }
    }

    fn is_struct(&self, ty: &Type) -> bool {
        ty.as_named().is_some_and(|id| !self.universe.named(id).external)
            && matches!(self.universe.underlying(ty), Type::Struct(_))
    }
}

fn flag_supported(kind: &ValueKind) -> bool {
    matches!(
        kind,
        ValueKind::Basic(BasicKind::String | BasicKind::Int | BasicKind::Int64 | BasicKind::Float64 | BasicKind::Bool)
    )
}

#[derive(Debug, Default, PartialEq)]
struct FieldOpts {
    name: String,
    field_path: String,
    is_flag: bool,
    required: bool,
    use_zero: bool,
    desc: String,
}

fn field_opts(field: &str, tag: &str) -> FieldOpts {
    let mut opts = FieldOpts {
        name: to_screaming_snake(&normalize_camel_case(field)),
        field_path: field.to_string(),
        ..FieldOpts::default()
    };
    if let Some(desc) = lookup_tag(tag, "desc") {
        opts.desc = desc;
    }
    if let Some(env) = lookup_tag(tag, "env") {
        let (name, options) = env.split_once(',').unwrap_or((env.as_str(), ""));
        let mut rest = options;
        while !rest.is_empty() {
            if let Some(desc) = rest.strip_prefix("desc:") {
                opts.desc = desc.to_string();
                break;
            }
            let (option, tail) = rest.split_once(',').unwrap_or((rest, ""));
            match option {
                "required" => opts.required = true,
                "use_zero" => opts.use_zero = true,
                "use_flag" => {
                    opts.is_flag = true;
                    opts.name = to_kebab(field);
                }
                _ => {}
            }
            rest = tail;
        }
        if !name.is_empty() {
            opts.name = name.to_string();
        }
    }
    if let Some(flag) = lookup_tag(tag, "flag") {
        let (name, options) = flag.split_once(',').unwrap_or((flag.as_str(), ""));
        if options.split(',').any(|o| o == "required") {
            opts.required = true;
        }
        if !name.is_empty() {
            opts.is_flag = true;
            opts.name = name.to_string();
        }
    }
    opts
}

/// Value of `key` in a Go struct tag (`key:"value" other:"x"`).
pub fn lookup_tag(tag: &str, key: &str) -> Option<String> {
    let mut rest = tag.trim_start();
    while !rest.is_empty() {
        let colon = rest.find(':')?;
        let name = &rest[..colon];
        let after = rest[colon + 1..].strip_prefix('"')?;
        let mut end = None;
        let mut escaped = false;
        for (i, c) in after.char_indices() {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => {
                    end = Some(i);
                    break;
                }
                _ => escaped = false,
            }
        }
        let end = end?;
        if name == key {
            return Some(unquote(&format!("\"{}\"", &after[..end])));
        }
        rest = after[end + 1..].trim_start();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::{find_build_sites, OptionParser};
    use crate::types::testing;
    use std::path::PathBuf;

    #[test]
    fn test_lookup_tag() {
        let tag = r#"json:"id" env:"NAME,required,desc:the name" flag:"bind""#;
        assert_eq!(lookup_tag(tag, "env").as_deref(), Some("NAME,required,desc:the name"));
        assert_eq!(lookup_tag(tag, "flag").as_deref(), Some("bind"));
        assert_eq!(lookup_tag(tag, "json").as_deref(), Some("id"));
        assert_eq!(lookup_tag(tag, "desc"), None);
    }

    #[test]
    fn test_field_opts() {
        let opts = field_opts("FldIntReq", r#"env:",required,desc:d""#);
        assert_eq!(opts.name, "FLD_INT_REQ");
        assert!(opts.required && !opts.use_zero && !opts.is_flag);
        assert_eq!(opts.desc, "d");

        let opts = field_opts("HTTPAddr", r#"env:",use_flag,use_zero""#);
        assert!(opts.is_flag && opts.use_zero);
        assert_eq!(opts.name, "http-addr");

        let opts = field_opts("Bind", r#"flag:"bind-addr" desc:"listen address""#);
        assert!(opts.is_flag);
        assert_eq!(opts.name, "bind-addr");
        assert_eq!(opts.desc, "listen address");

        assert_eq!(field_opts("MaxPrice", r#"env:"MAX""#).name, "MAX");
        assert_eq!(field_opts("FldUIntReq", "").name, "FLD_U_INT_REQ");
    }

    #[test]
    fn test_walks_nested_structs() {
        let u = testing::load(&[
            (
                "app/config.go",
                concat!(
                    "package app\n\n",
                    "import (\n\t\"net/url\"\n\t\"time\"\n)\n\n",
                    "type DB struct {\n\tConn string `env:\",required\"`\n\tTimeout time.Duration\n}\n\n",
                    "type Config struct {\n",
                    "\tName string\n",
                    "\tDB DB `env:\"DB2\"`\n",
                    "\tCache *DB\n",
                    "\tPorts []int\n",
                    "\tHome *url.URL\n",
                    "\tLabels map[string]string\n",
                    "\tStarted time.Time\n",
                    "\tch chan int\n",
                    "}\n",
                ),
            ),
            (
                "app/swipe.go",
                "package app\n\nimport \"github.com/swipe-io/swipe/v2\"\n\nfunc Swipe() {\n\tswipe.Build(swipe.ConfigEnv(&Config{Name: \"x\"}, swipe.ConfigEnvFuncName(\"Load\"), swipe.ConfigEnvDocEnable()))\n}\n",
            ),
        ]);
        let site = find_build_sites(&u).remove(0);
        let root = OptionParser::new(&u, site.file).parse_site(&site).unwrap();
        let info = SiteInfo {
            file: site.file,
            span: site.span.clone(),
            pkg_path: site.pkg_path.clone(),
            pkg_name: site.pkg_name.clone(),
            base_dir: site.dir.clone(),
            work_dir: PathBuf::from("/m"),
        };
        let spec = validate(&u, info, &root).unwrap();
        assert_eq!(spec.func_name, "Load");
        assert!(spec.doc_enable);
        assert!(spec.ty.is_pointer());

        let names: Vec<_> = spec.fields().map(|f| (f.name.as_str(), f.field_path.as_str())).collect();
        assert_eq!(
            names,
            [
                ("NAME", "Name"),
                ("DB2_CONN", "DB.Conn"),
                ("DB2_TIMEOUT", "DB.Timeout"),
                ("CACHE_CONN", "Cache.Conn"),
                ("CACHE_TIMEOUT", "Cache.Timeout"),
                ("PORTS", "Ports"),
                ("HOME", "Home"),
                ("LABELS", "Labels"),
                ("STARTED", "Started"),
            ]
        );
        assert!(matches!(&spec.entries[3], ConfigEntry::Alloc { field_path, .. } if field_path == "Cache"));
        let timeout = spec.fields().find(|f| f.field_path == "DB.Timeout").unwrap();
        assert_eq!(timeout.kind, ValueKind::Duration);
        assert_eq!(timeout.type_str, "time.Duration");
    }
}

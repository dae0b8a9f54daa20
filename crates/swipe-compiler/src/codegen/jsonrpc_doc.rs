//! `jsonrpc_doc_gen.md`: Markdown reference of the JSON-RPC API as seen by
//! the JS client.

use std::path::PathBuf;

use indexmap::IndexSet;
use tracing::debug;

use super::js_client::exception_name;
use super::jsonrpc_server::rpc_method_name;
use super::shape::{collect_named, doc_type, json_fields, MethodDoc};
use super::{generator_error, GenContext, Generator};
use crate::config::CompilerConfig;
use crate::diagnostic::CompilerError;
use crate::naming::to_lower_camel;
use crate::schema::{ServiceInterface, ServiceMethod, ServiceSpec};
use crate::types::{BasicKind, NamedId, Type, Universe};

pub const FILENAME: &str = "jsonrpc_doc_gen.md";

pub struct JsonRpcDocGenerator<'s> {
    spec: &'s ServiceSpec,
    /// `name` from the module's `package.json`, when there is one.
    package: Option<String>,
}

impl<'s> JsonRpcDocGenerator<'s> {
    pub fn new(spec: &'s ServiceSpec) -> Self {
        Self { spec, package: None }
    }

    fn write_getting_started(&self, ctx: &mut GenContext<'_, '_>, package: &str) {
        ctx.out.w("## Getting Started\n\n");
        ctx.out.w(format!(
            "You can install this with:\n\n```shell script\nnpm install --save-dev {package}\n```\n\n"
        ));
        ctx.out.w(format!(
            "Import the package with the client:\n\n```javascript\nimport API from \"{package}\"\n```\n\n"
        ));
        ctx.out.w("Create a transport, only one method needs to be implemented: `doRequest(Array.<Object>) PromiseLike<Object>`.\n\n");
        ctx.out.w(concat!(
            "For example:\n\n```javascript\nclass FetchTransport {\n",
            "    constructor(url) {\n      this.url = url;\n    }\n\n",
            "    doRequest(requests) {\n",
            "        return fetch(this.url, {method: \"POST\", body: JSON.stringify(requests)})\n",
            "    }\n}\n```\n\n"
        ));
        ctx.out.w(format!(
            "Now for a complete example:\n\n```javascript\nimport API from \"{package}\"\nimport Transport from \"transport\"\n\nconst api = new API(new Transport(\"http://127.0.0.1\"))\n\n// call method here.\n```\n\n"
        ));
    }

    fn write_method(&self, ctx: &mut GenContext<'_, '_>, iface: &ServiceInterface, m: &ServiceMethod) {
        let u = ctx.universe;
        let name = rpc_method_name(self.spec, iface, &m.lc_name);
        let params: Vec<&str> = m.params.iter().map(|p| p.name.as_str()).collect();
        ctx.out.w(format!(
            "### <a name=\"{name}\"></a> {name}({}) ⇒<code>{}</code>\n\n",
            params.join(", "),
            result_type(u, m)
        ));

        let doc = MethodDoc::parse(&m.comments);
        let description = doc.description();
        if !description.is_empty() {
            ctx.out.w(format!("{description}\n\n"));
        }

        if !m.errors.is_empty() {
            ctx.out.w("**Throws**:\n\n");
            for err in &m.errors {
                ctx.out
                    .w(format!("<code>{}</code>\n\n", exception_name(self.spec, iface, err)));
            }
        }

        if !m.params.is_empty() {
            ctx.out.w("| Param | Type | Description |\n|------|------|------|\n");
            for p in &m.params {
                ctx.out.w(format!(
                    "|{}|<code>{}</code>|{}|\n",
                    p.name,
                    doc_type(u, &p.ty),
                    doc.param(&p.name)
                ));
            }
            ctx.out.w("\n");
        }
    }
}

fn result_type(u: &Universe, m: &ServiceMethod) -> String {
    if m.results_named {
        let fields: Vec<String> = m
            .results
            .iter()
            .map(|r| format!("{}: {}", to_lower_camel(&r.name), doc_type(u, &r.ty)))
            .collect();
        return format!("{{{}}}", fields.join(", "));
    }
    m.results
        .first()
        .map_or_else(|| "void".to_string(), |r| doc_type(u, &r.ty))
}

fn write_members(ctx: &mut GenContext<'_, '_>, named: &[NamedId]) {
    let u = ctx.universe;
    let structs: Vec<NamedId> = named
        .iter()
        .copied()
        .filter(|id| matches!(u.named(*id).underlying, Type::Struct(_)))
        .collect();
    if structs.is_empty() {
        return;
    }
    ctx.out.w("## Members\n\n");
    for id in structs {
        let ty = Type::Named(id);
        ctx.out.w(format!("### <a name=\"{0}\"></a> {0}\n\n", u.named(id).name));
        ctx.out.w("| Field | Type | Description |\n|------|------|------|\n");
        for field in json_fields(u, &ty) {
            let description = field
                .owner
                .map(|owner| u.comments.field_text(owner, &field.var.name))
                .unwrap_or_default();
            ctx.out.w(format!(
                "|{}|<code>{}</code>|{description}|\n",
                field.name,
                doc_type(u, &field.var.ty)
            ));
        }
        ctx.out.w("\n");
    }
}

fn write_enums(ctx: &mut GenContext<'_, '_>, named: &[NamedId]) {
    let u = ctx.universe;
    let enums: Vec<_> = named
        .iter()
        .filter_map(|id| u.enums.get(id).map(|members| (*id, members)))
        .collect();
    if enums.is_empty() {
        return;
    }
    ctx.out.w("## Enums\n\n");
    for (id, members) in enums {
        let kind = match u.basic(&Type::Named(id)) {
            Some(k) if k.is_integer() => "number",
            Some(BasicKind::Bool) => "boolean",
            _ => "string",
        };
        ctx.out.w(format!(
            "### <a name=\"{0}\"></a> {0}Enum <code>{kind}</code>\n\n",
            u.named(id).name
        ));
        ctx.out.w("| Name | Value | Description |\n|------|------|------|\n");
        for member in members {
            ctx.out.w(format!("|{}|<code>{}</code>||\n", member.name, member.value));
        }
        ctx.out.w("\n");
    }
}

impl Generator for JsonRpcDocGenerator<'_> {
    fn name(&self) -> &'static str {
        "jsonrpc doc"
    }

    fn filename(&self) -> &str {
        FILENAME
    }

    fn output_dir(&self) -> PathBuf {
        self.spec.site.output_dir(&self.spec.jsonrpc.doc_output)
    }

    fn prepare(&mut self, _config: &CompilerConfig) -> Result<(), CompilerError> {
        let path = self.spec.site.work_dir.join("package.json");
        let Ok(data) = std::fs::read_to_string(&path) else {
            return Ok(());
        };
        let package: serde_json::Value = serde_json::from_str(&data)
            .map_err(|e| generator_error(&*self, format!("invalid {}: {e}", path.display())))?;
        self.package = package.get("name").and_then(|n| n.as_str()).map(str::to_string);
        debug!(package = ?self.package, "read package.json");
        Ok(())
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError> {
        ctx.out.w(format!("# {} JSONRPC Client\n\n", self.spec.name));
        if let Some(package) = &self.package {
            self.write_getting_started(ctx, package);
        }
        ctx.out.w("## API\n\n## Methods\n\n");

        let mut named = IndexSet::new();
        for (iface, m) in self.spec.methods() {
            for v in m.params.iter().chain(&m.results) {
                collect_named(ctx.universe, &v.ty, &mut named);
            }
            let name = rpc_method_name(self.spec, iface, &m.lc_name);
            ctx.out.w(format!("<a href=\"#{name}\">{name}</a>\n\n"));
        }
        for (iface, m) in self.spec.methods() {
            self.write_method(ctx, iface, m);
        }

        let named: Vec<NamedId> = named.into_iter().collect();
        write_members(ctx, &named);
        write_enums(ctx, &named);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::{self, render, swipe_file};
    use crate::schema::Spec;

    const SRC: &str = concat!(
        "package app\n\n",
        "import \"context\"\n\n",
        "type Status int\n\n",
        "const (\n\tActive Status = iota + 1\n\tBlocked\n)\n\n",
        "type Item struct {\n\t// Title of the item.\n\tTitle string `json:\"title\"`\n\tStatus Status `json:\"status\"`\n}\n\n",
        "type ErrNotFound struct{}\n\n",
        "func (ErrNotFound) Error() string { return \"not found\" }\n\n",
        "func (ErrNotFound) ErrorCode() int { return -32004 }\n\n",
        "type Store interface {\n",
        "\t// Find looks an item up.\n",
        "\t// @key lookup key\n",
        "\tFind(ctx context.Context, key string) (Item, error)\n",
        "}\n\n",
        "type store struct{}\n\n",
        "func (store) Find(ctx context.Context, key string) (Item, error) { return Item{}, ErrNotFound{} }\n",
    );

    #[test]
    fn test_markdown_reference() {
        let u = testing::load(&[
            ("app/store.go", SRC),
            (
                "app/swipe.go",
                &swipe_file(concat!(
                    "Service(\n\t\t\tswipe.Interface((*Store)(nil), \"\"),\n",
                    "\t\t\tswipe.JSONRPCEnable(),\n",
                    "\t\t\tswipe.JSONRPCDocEnable(),\n\t\t)"
                )),
            ),
        ]);
        let Spec::Service(spec) = testing::spec(&u) else { panic!("not a service") };
        let (code, _) = render(&u, "example.com/m/app", &JsonRpcDocGenerator::new(&spec));

        assert!(code.contains(" JSONRPC Client\n\n## API\n\n## Methods\n\n<a href=\"#find\">find</a>\n\n"), "{code}");
        assert!(code.contains(
            "### <a name=\"find\"></a> find(key) ⇒<code><a href=\"#Item\">Item</a></code>\n\nFind looks an item up.\n\n"
        ), "{code}");
        assert!(code.contains("**Throws**:\n\n<code>ErrNotFoundException</code>\n\n"), "{code}");
        assert!(code.contains("|key|<code>string</code>|lookup key|\n"), "{code}");
        assert!(code.contains("## Members\n\n### <a name=\"Item\"></a> Item\n\n"), "{code}");
        assert!(code.contains("|title|<code>string</code>|Title of the item.|\n"), "{code}");
        assert!(code.contains("### <a name=\"Status\"></a> StatusEnum <code>number</code>\n\n"), "{code}");
        assert!(code.contains("|Blocked|<code>2</code>||\n"), "{code}");
    }
}

//! `client_jsonrpc_gen.js`: a batching JSON-RPC client with JSDoc types
//! and one exception class per error code.

use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};

use super::jsonrpc_server::rpc_method_name;
use super::runtime::JSONRPC_SCHEDULER;
use super::shape::{collect_named, js_type, js_typedef, MethodDoc};
use super::{GenContext, Generator};
use crate::diagnostic::CompilerError;
use crate::naming::to_lower_camel;
use crate::schema::{ErrorCode, ServiceInterface, ServiceMethod, ServiceSpec};
use crate::types::{Type, Universe};

pub const FILENAME: &str = "client_jsonrpc_gen.js";

/// Class name of the JS exception raised for `err`.
pub fn exception_name(spec: &ServiceSpec, iface: &ServiceInterface, err: &ErrorCode) -> String {
    if spec.interfaces.len() > 1 {
        format!("{}{}Exception", iface.name_export, err.name)
    } else {
        format!("{}Exception", err.name)
    }
}

pub struct JsClientGenerator<'s> {
    spec: &'s ServiceSpec,
}

impl<'s> JsClientGenerator<'s> {
    pub fn new(spec: &'s ServiceSpec) -> Self {
        Self { spec }
    }

    fn write_method(&self, ctx: &mut GenContext<'_, '_>, iface: &ServiceInterface, m: &ServiceMethod) {
        let u = ctx.universe;
        let doc = MethodDoc::parse(&m.comments);
        ctx.out.w("/**\n");
        let description = doc.description();
        if !description.is_empty() {
            for line in description.lines() {
                ctx.out.w(format!("* {line}\n"));
            }
            ctx.out.w("*\n");
        }
        for (i, p) in m.params.iter().enumerate() {
            let ty = if m.variadic && i + 1 == m.params.len() {
                match &p.ty {
                    Type::Slice(elem) => format!("...{}", js_type(u, elem)),
                    other => js_type(u, other),
                }
            } else {
                js_type(u, &p.ty)
            };
            let desc = doc.param(&p.name);
            if desc.is_empty() {
                ctx.out.w(format!("* @param {{{ty}}} {}\n", p.name));
            } else {
                ctx.out.w(format!("* @param {{{ty}}} {} {desc}\n", p.name));
            }
        }
        if let Some(ret) = return_type(u, m) {
            ctx.out.w(format!("* @return {{PromiseLike<{ret}>}}\n"));
        }
        ctx.out.w("**/\n");

        let args: Vec<String> = m
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                if m.variadic && i + 1 == m.params.len() {
                    format!("...{}", p.name)
                } else {
                    p.name.clone()
                }
            })
            .collect();
        let params: Vec<String> = m
            .params
            .iter()
            .map(|p| format!("{}: {}", to_lower_camel(&p.name), p.name))
            .collect();
        ctx.out.w(format!("{}({}) {{\n", m.lc_name, args.join(", ")));
        ctx.out.w(format!(
            "return this.scheduler.__scheduleRequest({:?}, {{{}}}).catch((e) => {{\nthrow {}ConvertError(e);\n}});\n",
            rpc_method_name(self.spec, iface, &m.lc_name),
            params.join(", "),
            m.name_unexport
        ));
        ctx.out.w("}\n\n");
    }
}

/// JSDoc type the promise of `m` resolves to.
fn return_type(u: &Universe, m: &ServiceMethod) -> Option<String> {
    if m.results_named {
        let fields: Vec<String> = m
            .results
            .iter()
            .map(|r| format!("{}: {}", to_lower_camel(&r.name), js_type(u, &r.ty)))
            .collect();
        return Some(format!("{{{}}}", fields.join(", ")));
    }
    m.results.first().map(|r| js_type(u, &r.ty))
}

impl Generator for JsClientGenerator<'_> {
    fn name(&self) -> &'static str {
        "jsonrpc js client"
    }

    fn filename(&self) -> &str {
        FILENAME
    }

    fn output_dir(&self) -> PathBuf {
        self.spec.site.base_dir.clone()
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError> {
        ctx.out.w(JSONRPC_SCHEDULER);

        let mut named = IndexSet::new();
        for iface in &self.spec.interfaces {
            ctx.out.w(format!("class JSONRPCClient{} {{\n", iface.name_export));
            ctx.out
                .w("constructor(transport) {\nthis.scheduler = new JSONRPCScheduler(transport);\n}\n\n");
            for m in &iface.methods {
                for v in m.params.iter().chain(&m.results) {
                    collect_named(ctx.universe, &v.ty, &mut named);
                }
                self.write_method(ctx, iface, m);
            }
            ctx.out.w("}\n\n");
        }

        match self.spec.interfaces.as_slice() {
            [iface] => ctx.out.w(format!("export default JSONRPCClient{}\n\n", iface.name_export)),
            ifaces => {
                ctx.out.w("class JSONRPCClient {\nconstructor(transport) {\n");
                for iface in ifaces {
                    ctx.out.w(format!(
                        "this.{} = new JSONRPCClient{}(transport);\n",
                        iface.name_unexport, iface.name_export
                    ));
                }
                ctx.out.w("}\n}\n\nexport default JSONRPCClient\n\n");
            }
        }

        let mut exceptions: IndexMap<String, i64> = IndexMap::new();
        for (iface, m) in self.spec.methods() {
            for err in &m.errors {
                exceptions.entry(exception_name(self.spec, iface, err)).or_insert(err.code);
            }
        }
        for (name, code) in &exceptions {
            ctx.out.w(format!(
                "export class {name} extends JSONRPCError {{\nconstructor(message, data) {{\nsuper(message, {name:?}, {code}, data);\n}}\n}}\n\n"
            ));
        }

        for (iface, m) in self.spec.methods() {
            ctx.out.w(format!(
                "function {}ConvertError(e) {{\nswitch (e.code) {{\ndefault:\nreturn new JSONRPCError(e.message, \"UnknownError\", e.code, e.data);\n",
                m.name_unexport
            ));
            for err in &m.errors {
                ctx.out.w(format!(
                    "case {}:\nreturn new {}(e.message, e.data);\n",
                    err.code,
                    exception_name(self.spec, iface, err)
                ));
            }
            ctx.out.w("}\n}\n\n");
        }

        for id in named {
            ctx.out.w(js_typedef(ctx.universe, id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::{self, render, swipe_file, SERVICE};
    use crate::schema::Spec;

    #[test]
    fn test_js_client() {
        let u = testing::load(&[
            ("app/service.go", SERVICE),
            (
                "app/swipe.go",
                &swipe_file(concat!(
                    "Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n",
                    "\t\t\tswipe.JSONRPCEnable(),\n",
                    "\t\t\tswipe.ClientsEnable([]string{\"js\"}),\n\t\t)"
                )),
            ),
        ]);
        let Spec::Service(spec) = testing::spec(&u) else { panic!("not a service") };
        let (code, imports) = render(&u, "example.com/m/app", &JsClientGenerator::new(&spec));

        assert!(imports.is_empty());
        assert!(code.starts_with("export class JSONRPCError extends Error"), "{code}");
        assert!(code.contains("class JSONRPCClientAppI {\nconstructor(transport) {\nthis.scheduler = new JSONRPCScheduler(transport);\n}\n"), "{code}");
        assert!(code.contains("/**\n* Get returns a user.\n*\n* @param {string} fname first name\n* @param {number} id\n* @return {PromiseLike<User>}\n**/\nget(fname, id) {\n"), "{code}");
        assert!(code.contains("return this.scheduler.__scheduleRequest(\"get\", {fname: fname, id: id}).catch((e) => {\nthrow appIGetConvertError(e);\n});\n"), "{code}");
        assert!(code.contains("* @return {PromiseLike<{items: Array<User>, total: number}>}\n"), "{code}");
        assert!(code.contains("export default JSONRPCClientAppI\n"), "{code}");
        assert!(code.contains("export class ErrUnauthorizedException extends JSONRPCError {\nconstructor(message, data) {\nsuper(message, \"ErrUnauthorizedException\", -32001, data);\n}\n}\n"), "{code}");
        assert!(code.contains("case -32001:\nreturn new ErrUnauthorizedException(e.message, e.data);\n"), "{code}");
        assert!(code.contains("* @typedef {Object} User\n* @property {string} id\n"), "{code}");
    }
}

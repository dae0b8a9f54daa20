//! `server_gen.go` for JSON-RPC services: endpoint codec maps served from a
//! single POST route.

use std::path::PathBuf;

use super::http_transport::transport_pkg;
use super::rest_server::{write_handler_prelude, write_handler_return, write_new_router};
use super::{GenContext, Generator, FFJSON};
use crate::diagnostic::CompilerError;
use crate::schema::{ServiceInterface, ServiceSpec};

pub const FILENAME: &str = "server_gen.go";

/// Name a method is called by over JSON-RPC.
pub fn rpc_method_name(spec: &ServiceSpec, iface: &ServiceInterface, lc_name: &str) -> String {
    if spec.interfaces.len() > 1 {
        format!("{}.{lc_name}", iface.name_unexport)
    } else {
        lc_name.to_string()
    }
}

pub struct JsonRpcServerGenerator<'s> {
    spec: &'s ServiceSpec,
}

impl<'s> JsonRpcServerGenerator<'s> {
    pub fn new(spec: &'s ServiceSpec) -> Self {
        Self { spec }
    }

    fn write_helpers(&self, ctx: &mut GenContext<'_, '_>) {
        let jsonrpc = transport_pkg(ctx.importer, self.spec);
        let context = ctx.importer.import("context", "context");
        let json = ctx.importer.import("json", "encoding/json");
        let ffjson = ctx.importer.import("ffjson", FFJSON);

        ctx.out.w(format!(
            "func MergeEndpointCodecMaps(ecms ...{jsonrpc}.EndpointCodecMap) {jsonrpc}.EndpointCodecMap {{\n"
        ));
        ctx.out.w(format!("mergedECM := make({jsonrpc}.EndpointCodecMap, 512)\n"));
        ctx.out.w(
            "for _, ecm := range ecms {\nfor key, codec := range ecm {\nmergedECM[key] = codec\n}\n}\nreturn mergedECM\n}\n\n",
        );
        ctx.out.w(format!(
            "func encodeResponseJSONRPC(_ {context}.Context, result interface{{}}) ({json}.RawMessage, error) {{\n"
        ));
        ctx.out
            .w(format!("b, err := {ffjson}.Marshal(result)\nif err != nil {{\nreturn nil, err\n}}\nreturn b, nil\n}}\n\n"));
    }

    fn write_codec_map(&self, ctx: &mut GenContext<'_, '_>, iface: &ServiceInterface) {
        let jsonrpc = transport_pkg(ctx.importer, self.spec);
        let strings = ctx.importer.import("strings", "strings");

        ctx.out.w(format!(
            "func Make{name}EndpointCodecMap(ep {name}EndpointSet, ns ...string) {jsonrpc}.EndpointCodecMap {{\n",
            name = iface.name_export
        ));
        ctx.out.w(format!(
            "var namespace string\nif len(ns) > 0 {{\nnamespace = {strings}.Join(ns, \".\") + \".\"\n}}\n"
        ));
        ctx.out.w(format!("ecm := {jsonrpc}.EndpointCodecMap{{}}\n"));
        for m in &iface.methods {
            ctx.out.w(format!("if ep.{}Endpoint != nil {{\n", m.name));
            ctx.out
                .w(format!("ecm[namespace+{:?}] = {jsonrpc}.EndpointCodec{{\n", m.lc_name));
            ctx.out.w(format!("Endpoint: ep.{}Endpoint,\nDecode: ", m.name));
            if let Some(f) = &m.options.server_request_func {
                let src = ctx.importer.expr_source(f);
                ctx.out.w(src);
            } else {
                let context = ctx.importer.import("context", "context");
                let json = ctx.importer.import("json", "encoding/json");
                ctx.out.w(format!(
                    "func(_ {context}.Context, msg {json}.RawMessage) (interface{{}}, error) {{\n"
                ));
                if m.params.is_empty() {
                    ctx.out.w("return nil, nil\n}");
                } else {
                    let ffjson = ctx.importer.import("ffjson", FFJSON);
                    let fmt = ctx.importer.import("fmt", "fmt");
                    ctx.out.w(format!(
                        "var req {req}\nerr := {ffjson}.Unmarshal(msg, &req)\nif err != nil {{\nreturn nil, {fmt}.Errorf(\"couldn't unmarshal body to {req}: %s\", err)\n}}\nreturn req, nil\n}}",
                        req = m.name_request
                    ));
                }
            }
            ctx.out.w(",\nEncode: ");
            match &m.options.server_response_func {
                Some(f) => {
                    let src = ctx.importer.expr_source(f);
                    ctx.out.w(src);
                }
                None => ctx.out.w("encodeResponseJSONRPC"),
            }
            ctx.out.w(",\n}\n}\n");
        }
        ctx.out.w("return ecm\n}\n\n");
    }
}

impl Generator for JsonRpcServerGenerator<'_> {
    fn name(&self) -> &'static str {
        "jsonrpc server"
    }

    fn filename(&self) -> &str {
        FILENAME
    }

    fn output_dir(&self) -> PathBuf {
        self.spec.site.base_dir.clone()
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError> {
        self.write_helpers(ctx);
        for iface in &self.spec.interfaces {
            self.write_codec_map(ctx, iface);
        }

        write_handler_prelude(ctx, self.spec, "MakeHandlerJSONRPC");
        write_new_router(ctx, self.spec);

        let jsonrpc = transport_pkg(ctx.importer, self.spec);
        let multi = self.spec.interfaces.len() > 1;
        let maps: Vec<String> = self
            .spec
            .interfaces
            .iter()
            .map(|iface| {
                if multi {
                    format!("Make{0}EndpointCodecMap(epSet{0}, {1:?})", iface.name_export, iface.name_unexport)
                } else {
                    format!("Make{0}EndpointCodecMap(epSet{0})", iface.name_export)
                }
            })
            .collect();
        let codecs = if multi {
            format!("MergeEndpointCodecMaps({})", maps.join(", "))
        } else {
            maps.join("")
        };
        ctx.out.w(format!(
            "handler := {jsonrpc}.NewServer({codecs}, opts.genericServerOption...)\n"
        ));
        let path = &self.spec.jsonrpc.path;
        if self.spec.transport.fast {
            ctx.out.w(format!("r.To(\"POST\", {path:?}, handler.RouterHandle())\n"));
        } else {
            ctx.out.w(format!("r.Methods(\"POST\").Path({path:?}).Handler(handler)\n"));
        }
        write_handler_return(ctx, self.spec);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::{self, render, swipe_file, SERVICE};
    use crate::schema::Spec;

    const SECOND: &str = concat!(
        "package app\n\n",
        "import \"context\"\n\n",
        "type Admin interface {\n",
        "\tReset(ctx context.Context, force bool) error\n",
        "}\n",
    );

    #[test]
    fn test_single_interface() {
        let u = testing::load(&[
            ("app/service.go", SERVICE),
            ("app/swipe.go", &swipe_file("Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n\t\t\tswipe.HTTPServer(),\n\t\t\tswipe.JSONRPCEnable(),\n\t\t)")),
        ]);
        let Spec::Service(spec) = testing::spec(&u) else { panic!("not a service") };
        let (code, _) = render(&u, "example.com/m/app", &JsonRpcServerGenerator::new(&spec));

        assert!(code.contains("func MakeAppIEndpointCodecMap(ep AppIEndpointSet, ns ...string) jsonrpc.EndpointCodecMap {\n"), "{code}");
        assert!(code.contains("ecm[namespace+\"get\"] = jsonrpc.EndpointCodec{\nEndpoint: ep.GetEndpoint,\n"), "{code}");
        assert!(code.contains("couldn't unmarshal body to GetRequest: %s"), "{code}");
        assert!(code.contains("Endpoint: ep.PingEndpoint,\nDecode: func(_ context.Context, msg json.RawMessage) (interface{}, error) {\nreturn nil, nil\n},\nEncode: encodeResponseJSONRPC,\n"), "{code}");
        assert!(!code.contains("ServerErrorEncoder"), "{code}");
        assert!(code.contains("handler := jsonrpc.NewServer(MakeAppIEndpointCodecMap(epSetAppI), opts.genericServerOption...)\n"), "{code}");
        assert!(code.contains("r.Methods(\"POST\").Path(\"/rpc\").Handler(handler)\n"), "{code}");
    }

    #[test]
    fn test_multi_interface_namespaces() {
        let u = testing::load(&[
            ("app/service.go", SERVICE),
            ("app/admin.go", SECOND),
            (
                "app/swipe.go",
                &swipe_file(concat!(
                    "Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n",
                    "\t\t\tswipe.Interface((*Admin)(nil), \"\"),\n",
                    "\t\t\tswipe.HTTPServer(),\n\t\t\tswipe.JSONRPCEnable(),\n",
                    "\t\t\tswipe.JSONRPCPath(\"/api\"),\n\t\t)"
                )),
            ),
        ]);
        let Spec::Service(spec) = testing::spec(&u) else { panic!("not a service") };
        let (code, _) = render(&u, "example.com/m/app", &JsonRpcServerGenerator::new(&spec));

        assert!(code.contains("func MakeHandlerJSONRPC(svcAppI AppI, svcAdmin Admin, options ...ServerOption) (http.Handler, error) {\n"), "{code}");
        assert!(code.contains("MergeEndpointCodecMaps(MakeAppIEndpointCodecMap(epSetAppI, \"appI\"), MakeAdminEndpointCodecMap(epSetAdmin, \"admin\"))"), "{code}");
        assert!(code.contains("var req AdminResetRequest\n"), "{code}");
        assert!(code.contains("Path(\"/api\")"), "{code}");
        assert_eq!(rpc_method_name(&spec, &spec.interfaces[1], "reset"), "admin.reset");
    }
}

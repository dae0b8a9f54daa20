//! `client_gen.go` for JSON-RPC services.

use std::path::PathBuf;

use super::http_transport::transport_pkg;
use super::jsonrpc_server::rpc_method_name;
use super::rest_client::{response_type, write_client_middleware, write_client_prelude, FILENAME};
use super::{GenContext, Generator, FFJSON};
use crate::diagnostic::CompilerError;
use crate::schema::{ServiceMethod, ServiceSpec};

pub struct JsonRpcClientGenerator<'s> {
    spec: &'s ServiceSpec,
}

impl<'s> JsonRpcClientGenerator<'s> {
    pub fn new(spec: &'s ServiceSpec) -> Self {
        Self { spec }
    }

    fn write_encoder(&self, ctx: &mut GenContext<'_, '_>, m: &ServiceMethod) {
        if let Some(f) = &m.options.client_request_func {
            let src = ctx.importer.expr_source(f);
            ctx.out.w(src);
            return;
        }
        let context = ctx.importer.import("context", "context");
        let json = ctx.importer.import("json", "encoding/json");
        ctx.out.w(format!(
            "func(_ {context}.Context, obj interface{{}}) ({json}.RawMessage, error) {{\n"
        ));
        if m.params.is_empty() {
            ctx.out.w("return nil, nil\n}");
            return;
        }
        let fmt = ctx.importer.import("fmt", "fmt");
        let ffjson = ctx.importer.import("ffjson", FFJSON);
        ctx.out.w(format!(
            "req, ok := obj.({req})\nif !ok {{\nreturn nil, {fmt}.Errorf(\"couldn't assert request as {req}, got %T\", obj)\n}}\n",
            req = m.name_request
        ));
        ctx.out.w(format!("b, err := {ffjson}.Marshal(req)\n"));
        ctx.out.write_check_err(|w| {
            w.w(format!("return nil, {fmt}.Errorf(\"couldn't marshal request %T: %s\", obj, err)\n"))
        });
        ctx.out.w("return b, nil\n}");
    }

    fn write_decoder(&self, ctx: &mut GenContext<'_, '_>, jsonrpc: &str, m: &ServiceMethod) {
        if let Some(f) = &m.options.client_response_func {
            let src = ctx.importer.expr_source(f);
            ctx.out.w(src);
            return;
        }
        let context = ctx.importer.import("context", "context");
        ctx.out.w(format!(
            "func(_ {context}.Context, response {jsonrpc}.Response) (interface{{}}, error) {{\n"
        ));
        ctx.out.w(format!(
            "if response.Error != nil {{\nreturn nil, {}ErrorDecode(response.Error.Code, response.Error.Message, response.Error.Data)\n}}\n",
            m.name_unexport
        ));
        let Some(ty) = response_type(ctx, m) else {
            ctx.out.w("return nil, nil\n}");
            return;
        };
        let fmt = ctx.importer.import("fmt", "fmt");
        let ffjson = ctx.importer.import("ffjson", FFJSON);
        ctx.out.w(format!("var resp {ty}\n"));
        ctx.out.w(format!("err := {ffjson}.Unmarshal(response.Result, &resp)\n"));
        ctx.out.write_check_err(|w| {
            w.w(format!(
                "return nil, {fmt}.Errorf(\"couldn't unmarshal body to {}: %s\", err)\n",
                m.name_response
            ))
        });
        ctx.out.w("return resp, nil\n}");
    }
}

impl Generator for JsonRpcClientGenerator<'_> {
    fn name(&self) -> &'static str {
        "jsonrpc client"
    }

    fn filename(&self) -> &str {
        FILENAME
    }

    fn output_dir(&self) -> PathBuf {
        self.spec.site.base_dir.clone()
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError> {
        for iface in &self.spec.interfaces {
            write_client_prelude(ctx, self.spec, iface);
            let jsonrpc = transport_pkg(ctx.importer, self.spec);
            for m in &iface.methods {
                let option = format!("opts.{}ClientOption", m.name_unexport);
                ctx.out.w(format!("{option} = append(\n{option},\n"));
                ctx.out.w(format!("{jsonrpc}.ClientRequestEncoder("));
                self.write_encoder(ctx, m);
                ctx.out.w("),\n");
                ctx.out.w(format!("{jsonrpc}.ClientResponseDecoder("));
                self.write_decoder(ctx, &jsonrpc, m);
                ctx.out.w("),\n)\n");
                ctx.out.w(format!(
                    "c.{}Endpoint = {jsonrpc}.NewClient(\nu,\n{:?},\nappend(opts.genericClientOption, {option}...)...,\n).Endpoint()\n",
                    m.name_unexport,
                    rpc_method_name(self.spec, iface, &m.lc_name)
                ));
                write_client_middleware(ctx, m);
            }
            ctx.out.w("return c, nil\n}\n\n");
        }
        Ok(())
    }
}

//! `http_gen.go`: the transport prelude shared by servers and clients.
//!
//! Declares the per-method error decoders used by Go clients, the
//! `middlewareChain` helper and the server option types.

use std::path::PathBuf;

use super::{GenContext, Generator, KIT_ENDPOINT};
use crate::diagnostic::CompilerError;
use crate::importer::Importer;
use crate::schema::{ServiceMethod, ServiceSpec};
use crate::types::Type;

pub const FILENAME: &str = "http_gen.go";

/// Local name of the kit transport package for the spec's protocol.
pub fn transport_pkg(imp: &mut Importer, spec: &ServiceSpec) -> String {
    match (spec.jsonrpc.enable, spec.transport.fast) {
        (true, false) => imp.import("jsonrpc", "github.com/l-vitaly/go-kit/transport/http/jsonrpc"),
        (true, true) => imp.import("jsonrpc", "github.com/l-vitaly/go-kit/transport/fasthttp/jsonrpc"),
        (false, false) => imp.import("kithttp", "github.com/go-kit/kit/transport/http"),
        (false, true) => imp.import("kitfasthttp", "github.com/l-vitaly/go-kit/transport/fasthttp"),
    }
}

/// Local name of the HTTP package: `net/http` or fasthttp.
pub fn http_pkg(imp: &mut Importer, spec: &ServiceSpec) -> String {
    if spec.transport.fast {
        imp.import("fasthttp", "github.com/valyala/fasthttp")
    } else {
        imp.import("http", "net/http")
    }
}

pub struct HttpTransportGenerator<'s> {
    spec: &'s ServiceSpec,
}

impl<'s> HttpTransportGenerator<'s> {
    pub fn new(spec: &'s ServiceSpec) -> Self {
        Self { spec }
    }

    fn write_http_error(&self, ctx: &mut GenContext<'_, '_>) {
        if self.spec.jsonrpc.enable {
            ctx.out.write_type_struct(
                "httpError",
                &[
                    ("code".to_string(), "int".to_string()),
                    ("data".to_string(), "interface{}".to_string()),
                    ("message".to_string(), "string".to_string()),
                ],
            );
            ctx.out.w("func (e *httpError) Error() string {\nreturn e.message\n}\n\n");
            ctx.out.w("func (e *httpError) ErrorCode() int {\nreturn e.code\n}\n\n");
            ctx.out.w("func (e *httpError) ErrorData() interface{} {\nreturn e.data\n}\n\n");
            ctx.out.w("func (e *httpError) SetErrorData(data interface{}) {\ne.data = data\n}\n\n");
            ctx.out.w("func (e *httpError) SetErrorMessage(message string) {\ne.message = message\n}\n\n");
        } else {
            let http = http_pkg(ctx.importer, self.spec);
            let status_text = if self.spec.transport.fast { "StatusMessage" } else { "StatusText" };
            ctx.out
                .write_type_struct("httpError", &[("code".to_string(), "int".to_string())]);
            ctx.out.w(format!(
                "func (e *httpError) Error() string {{\nreturn {http}.{status_text}(e.code)\n}}\n\n"
            ));
            ctx.out.w("func (e *httpError) StatusCode() int {\nreturn e.code\n}\n\n");
        }
    }

    fn write_error_decode(&self, ctx: &mut GenContext<'_, '_>, m: &ServiceMethod) {
        let jsonrpc = self.spec.jsonrpc.enable;
        let params = if jsonrpc {
            "code int, message string, data interface{}"
        } else {
            "code int"
        };
        ctx.out
            .w(format!("func {}ErrorDecode({params}) (err error) {{\n", m.name_unexport));
        ctx.out.w("switch code {\ndefault:\nerr = &httpError{code: code}\n");
        for e in &m.errors {
            let ty = ctx.importer.type_string(&Type::Named(e.named));
            let amp = if e.is_pointer { "&" } else { "" };
            ctx.out.w(format!("case {}:\nerr = {amp}{ty}{{}}\n", e.code));
        }
        ctx.out.w("}\n");
        if jsonrpc {
            ctx.out.w("if err, ok := err.(interface{ SetErrorData(data interface{}) }); ok {\nerr.SetErrorData(data)\n}\n");
            ctx.out.w("if err, ok := err.(interface{ SetErrorMessage(message string) }); ok {\nerr.SetErrorMessage(message)\n}\n");
        }
        ctx.out.w("return\n}\n\n");
    }

    fn write_middleware_chain(&self, ctx: &mut GenContext<'_, '_>) {
        let endpoint = ctx.importer.import("endpoint", KIT_ENDPOINT);
        ctx.out.w(format!(
            "func middlewareChain(middlewares []{endpoint}.Middleware) {endpoint}.Middleware {{\n"
        ));
        ctx.out
            .w(format!("return func(next {endpoint}.Endpoint) {endpoint}.Endpoint {{\n"));
        ctx.out.w("if len(middlewares) == 0 {\nreturn next\n}\n");
        ctx.out.w("outer := middlewares[0]\nothers := middlewares[1:]\n");
        ctx.out.w("for i := len(others) - 1; i >= 0; i-- {\nnext = others[i](next)\n}\n");
        ctx.out.w("return outer(next)\n}\n}\n\n");
    }

    fn write_server_options(&self, ctx: &mut GenContext<'_, '_>) {
        let endpoint = ctx.importer.import("endpoint", KIT_ENDPOINT);
        let transport = transport_pkg(ctx.importer, self.spec);
        let option_ty = format!("{transport}.ServerOption");
        let middleware_ty = format!("{endpoint}.Middleware");

        ctx.out.w("type ServerOption func(*serverOpts)\n\n");
        let mut fields = vec![
            ("genericServerOption".to_string(), format!("[]{option_ty}")),
            ("genericEndpointMiddleware".to_string(), format!("[]{middleware_ty}")),
        ];
        for (_, m) in self.spec.methods() {
            fields.push((format!("{}ServerOption", m.name_unexport), format!("[]{option_ty}")));
            fields.push((format!("{}EndpointMiddleware", m.name_unexport), format!("[]{middleware_ty}")));
        }
        ctx.out.write_type_struct("serverOpts", &fields);

        write_option_setter(ctx, "GenericServerOptions", &option_ty, "genericServerOption", "ServerOption", "serverOpts");
        write_option_setter(
            ctx,
            "GenericServerEndpointMiddlewares",
            &middleware_ty,
            "genericEndpointMiddleware",
            "ServerOption",
            "serverOpts",
        );
        for (_, m) in self.spec.methods() {
            write_option_setter(
                ctx,
                &format!("{}ServerOptions", m.name_export),
                &option_ty,
                &format!("{}ServerOption", m.name_unexport),
                "ServerOption",
                "serverOpts",
            );
            write_option_setter(
                ctx,
                &format!("{}ServerEndpointMiddlewares", m.name_export),
                &middleware_ty,
                &format!("{}EndpointMiddleware", m.name_unexport),
                "ServerOption",
                "serverOpts",
            );
        }
    }
}

/// `func Name(opt ...T) Option { return func(c *opts) { c.field = opt } }`.
pub(crate) fn write_option_setter(
    ctx: &mut GenContext<'_, '_>,
    name: &str,
    ty: &str,
    field: &str,
    option: &str,
    opts: &str,
) {
    ctx.out.w(format!(
        "func {name}(opt ...{ty}) {option} {{\nreturn func(c *{opts}) {{ c.{field} = opt }}\n}}\n\n"
    ));
}

impl Generator for HttpTransportGenerator<'_> {
    fn name(&self) -> &'static str {
        "http transport"
    }

    fn filename(&self) -> &str {
        FILENAME
    }

    fn output_dir(&self) -> PathBuf {
        self.spec.site.base_dir.clone()
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError> {
        if self.spec.go_client() {
            self.write_http_error(ctx);
            for (_, m) in self.spec.methods() {
                self.write_error_decode(ctx, m);
            }
        }
        self.write_middleware_chain(ctx);
        if self.spec.transport.http_server {
            self.write_server_options(ctx);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::{self, render, swipe_file, SERVICE};
    use crate::schema::Spec;

    fn generate(opts: &str) -> (String, Vec<String>) {
        let u = testing::load(&[
            ("app/service.go", SERVICE),
            ("app/swipe.go", &swipe_file(&format!("Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n\t\t\t{opts}\n\t\t)"))),
        ]);
        let Spec::Service(spec) = testing::spec(&u) else { panic!("not a service") };
        render(&u, "example.com/m/app", &HttpTransportGenerator::new(&spec))
    }

    #[test]
    fn test_rest_prelude() {
        let (code, imports) = generate("swipe.HTTPServer(), swipe.ClientsEnable([]string{\"go\"}),");
        assert!(code.contains("func (e *httpError) Error() string {\nreturn http.StatusText(e.code)\n}"), "{code}");
        assert!(code.contains("func appIGetErrorDecode(code int) (err error) {\nswitch code {\ndefault:\nerr = &httpError{code: code}\ncase 401:\nerr = ErrUnauthorized{}\n}\nreturn\n}"), "{code}");
        assert!(code.contains("func middlewareChain(middlewares []endpoint.Middleware) endpoint.Middleware {"), "{code}");
        assert!(code.contains("appIGetServerOption []kithttp.ServerOption\nappIGetEndpointMiddleware []endpoint.Middleware\n"), "{code}");
        assert!(code.contains("func AppIGetServerOptions(opt ...kithttp.ServerOption) ServerOption {\nreturn func(c *serverOpts) { c.appIGetServerOption = opt }\n}"), "{code}");
        assert!(imports.contains(&"\tkithttp \"github.com/go-kit/kit/transport/http\"\n".to_string()));
        assert!(imports.contains(&"\t\"net/http\"\n".to_string()));
    }

    #[test]
    fn test_jsonrpc_prelude_without_client() {
        let (code, _) = generate("swipe.HTTPServer(), swipe.JSONRPCEnable(),");
        assert!(!code.contains("ErrorDecode"), "{code}");
        assert!(code.contains("genericServerOption []jsonrpc.ServerOption\n"), "{code}");
    }

    #[test]
    fn test_jsonrpc_error_decode_sets_data() {
        let (code, _) = generate("swipe.JSONRPCEnable(), swipe.ClientsEnable([]string{\"go\"}),");
        assert!(code.contains("func appIGetErrorDecode(code int, message string, data interface{}) (err error) {"), "{code}");
        assert!(code.contains("case -32001:\nerr = ErrUnauthorized{}\n"), "{code}");
        assert!(code.contains("err.SetErrorMessage(message)"), "{code}");
        assert!(!code.contains("serverOpts"), "{code}");
    }
}

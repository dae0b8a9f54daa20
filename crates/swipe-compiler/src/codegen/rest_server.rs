//! `server_gen.go` for REST services: a gorilla/mux (or fasthttp-routing)
//! router dispatching to go-kit HTTP servers.

use std::path::PathBuf;

use super::http_transport::{http_pkg, transport_pkg};
use super::{field_name, GenContext, Generator, FFJSON};
use crate::diagnostic::CompilerError;
use crate::schema::{ServiceInterface, ServiceMethod, ServiceSpec};
use crate::types::Var;
use crate::writer::{Conversion, ErrSink};

pub const FILENAME: &str = "server_gen.go";

const MUX: &str = "github.com/gorilla/mux";
const ROUTING: &str = "github.com/qiangxue/fasthttp-routing";

/// Route of a method: `/<iface>/<path>` when the service has several
/// interfaces, the method path otherwise.
pub fn route_path(spec: &ServiceSpec, iface: &ServiceInterface, m: &ServiceMethod) -> String {
    let path = m.http_path();
    let path = path.trim_start_matches('/');
    if spec.interfaces.len() > 1 {
        format!("/{}/{path}", iface.name_unexport)
    } else {
        format!("/{path}")
    }
}

/// Verbs whose requests carry a JSON body.
pub fn has_body(verb: &str) -> bool {
    matches!(verb, "POST" | "PUT" | "PATCH")
}

/// Option plumbing shared by the REST and JSON-RPC handlers: applies the
/// server options, builds endpoint sets and wraps every endpoint in its
/// middleware chain.
pub(crate) fn write_handler_prelude(ctx: &mut GenContext<'_, '_>, spec: &ServiceSpec, name: &str) {
    let http = http_pkg(ctx.importer, spec);
    let handler_ty = if spec.transport.fast {
        format!("{http}.RequestHandler")
    } else {
        format!("{http}.Handler")
    };
    let mut params = Vec::new();
    for iface in &spec.interfaces {
        let ty = ctx.importer.type_string(&iface.ty);
        params.push(format!("svc{} {ty}", iface.name_export));
    }
    params.push("options ...ServerOption".to_string());

    ctx.out.w(format!("// {name} HTTP {} Transport\n", spec.prefix()));
    ctx.out
        .w(format!("func {name}({}) ({handler_ty}, error) {{\n", params.join(", ")));
    ctx.out
        .w("opts := &serverOpts{}\nfor _, o := range options {\no(opts)\n}\n");

    let transport = transport_pkg(ctx.importer, spec);
    let encoder = match &spec.default_error_encoder {
        Some(f) => Some(ctx.importer.expr_source(f)),
        None if !spec.jsonrpc.enable => Some("defaultErrorEncoder".to_string()),
        None => None,
    };
    if let Some(encoder) = encoder {
        ctx.out.w(format!(
            "opts.genericServerOption = append(opts.genericServerOption, {transport}.ServerErrorEncoder({encoder}))\n"
        ));
    }

    for iface in &spec.interfaces {
        let set = format!("epSet{}", iface.name_export);
        ctx.out.w(format!(
            "{set} := Make{}EndpointSet(svc{})\n",
            iface.name_export, iface.name_export
        ));
        for m in &iface.methods {
            ctx.out.w(format!(
                "{set}.{name}Endpoint = middlewareChain(append(opts.genericEndpointMiddleware, opts.{unexport}EndpointMiddleware...))({set}.{name}Endpoint)\n",
                name = m.name,
                unexport = m.name_unexport,
            ));
        }
    }
}

/// `r := ...` for the router flavour.
pub(crate) fn write_new_router(ctx: &mut GenContext<'_, '_>, spec: &ServiceSpec) {
    if spec.transport.fast {
        let routing = ctx.importer.import("routing", ROUTING);
        ctx.out.w(format!("r := {routing}.New()\n"));
    } else {
        let mux = ctx.importer.import("mux", MUX);
        ctx.out.w(format!("r := {mux}.NewRouter()\n"));
    }
}

pub(crate) fn write_handler_return(ctx: &mut GenContext<'_, '_>, spec: &ServiceSpec) {
    if spec.transport.fast {
        ctx.out.w("return r.HandleRequest, nil\n}\n\n");
    } else {
        ctx.out.w("return r, nil\n}\n\n");
    }
}

pub struct RestServerGenerator<'s> {
    spec: &'s ServiceSpec,
}

impl<'s> RestServerGenerator<'s> {
    pub fn new(spec: &'s ServiceSpec) -> Self {
        Self { spec }
    }

    fn fast(&self) -> bool {
        self.spec.transport.fast
    }

    fn write_default_error_encoder(&self, ctx: &mut GenContext<'_, '_>) {
        let context = ctx.importer.import("context", "context");
        let http = http_pkg(ctx.importer, self.spec);
        let transport = transport_pkg(ctx.importer, self.spec);
        let ffjson = ctx.importer.import("ffjson", FFJSON);

        ctx.out.write_type_struct(
            "errorWrapper",
            &[
                ("Error".to_string(), "string `json:\"error\"`".to_string()),
                ("Data".to_string(), "interface{} `json:\"data,omitempty\"`".to_string()),
            ],
        );
        let writer_ty = if self.fast() {
            format!("*{http}.RequestCtx")
        } else {
            format!("{http}.ResponseWriter")
        };
        ctx.out.w(format!(
            "func defaultErrorEncoder(ctx {context}.Context, err error, w {writer_ty}) {{\n"
        ));
        ctx.out.w("var errData interface{}\n");
        ctx.out
            .w("if e, ok := err.(interface{ ErrorData() interface{} }); ok {\nerrData = e.ErrorData()\n}\n");
        ctx.out.w(format!(
            "data, merr := {ffjson}.Marshal(errorWrapper{{Error: err.Error(), Data: errData}})\n"
        ));
        if self.fast() {
            ctx.out.w("if merr != nil {\nw.SetBody([]byte(\"unexpected error\"))\nreturn\n}\n");
            ctx.out
                .w("w.Response.Header.Set(\"Content-Type\", \"application/json; charset=utf-8\")\n");
            ctx.out.w(format!("if headerer, ok := err.({transport}.Headerer); ok {{\n"));
            ctx.out
                .w("for k, v := range headerer.Headers() {\nw.Response.Header.Add(k, v)\n}\n}\n");
        } else {
            ctx.out
                .w("if merr != nil {\n_, _ = w.Write([]byte(\"unexpected error\"))\nreturn\n}\n");
            ctx.out.w("w.Header().Set(\"Content-Type\", \"application/json; charset=utf-8\")\n");
            ctx.out.w(format!("if headerer, ok := err.({transport}.Headerer); ok {{\n"));
            ctx.out.w(
                "for k, values := range headerer.Headers() {\nfor _, v := range values {\nw.Header().Add(k, v)\n}\n}\n}\n",
            );
        }
        ctx.out.w(format!("code := {http}.StatusInternalServerError\n"));
        ctx.out
            .w(format!("if sc, ok := err.({transport}.StatusCoder); ok {{\ncode = sc.StatusCode()\n}}\n"));
        if self.fast() {
            ctx.out.w("w.SetStatusCode(code)\nw.SetBody(data)\n}\n\n");
        } else {
            ctx.out.w("w.WriteHeader(code)\n_, _ = w.Write(data)\n}\n\n");
        }
    }

    fn response_writer(&self, ctx: &mut GenContext<'_, '_>) -> String {
        let http = http_pkg(ctx.importer, self.spec);
        if self.fast() {
            format!("*{http}.Response")
        } else {
            format!("{http}.ResponseWriter")
        }
    }

    fn write_encode_response(&self, ctx: &mut GenContext<'_, '_>) {
        let context = ctx.importer.import("context", "context");
        let ffjson = ctx.importer.import("ffjson", FFJSON);
        let writer_ty = self.response_writer(ctx);

        ctx.out.w(format!(
            "func encodeResponseHTTP(ctx {context}.Context, w {writer_ty}, response interface{{}}) (err error) {{\n"
        ));
        ctx.out.w("if f, ok := response.(interface{ Failed() error }); ok && f.Failed() != nil {\nreturn f.Failed()\n}\n");
        ctx.out
            .w("contentType := \"application/json; charset=utf-8\"\nstatusCode := 200\n");
        ctx.out.w(if self.fast() { "h := w.Header\n" } else { "h := w.Header()\n" });
        ctx.out.w("var data []byte\nif response != nil {\n");
        ctx.out
            .w(format!("data, err = {ffjson}.Marshal(response)\nif err != nil {{\nreturn err\n}}\n"));
        ctx.out
            .w("} else {\ncontentType = \"text/plain; charset=utf-8\"\nstatusCode = 201\n}\n");
        ctx.out.w("h.Set(\"Content-Type\", contentType)\n");
        if self.fast() {
            ctx.out.w("w.SetStatusCode(statusCode)\nw.SetBody(data)\n");
        } else {
            ctx.out.w("w.WriteHeader(statusCode)\n_, _ = w.Write(data)\n");
        }
        ctx.out.w("return nil\n}\n\n");
    }

    fn write_decoder(&self, ctx: &mut GenContext<'_, '_>, m: &ServiceMethod) {
        if let Some(f) = &m.options.server_request_func {
            let src = ctx.importer.expr_source(f);
            ctx.out.w(src);
            return;
        }
        let context = ctx.importer.import("context", "context");
        let http = http_pkg(ctx.importer, self.spec);
        ctx.out.w(format!(
            "func(ctx {context}.Context, r *{http}.Request) (interface{{}}, error) {{\n"
        ));
        if m.params.is_empty() {
            ctx.out.w("return nil, nil\n}");
            return;
        }
        ctx.out.w(format!("var req {}\n", m.name_request));

        if has_body(m.http_method()) && m.body_params().next().is_some() {
            let ffjson = ctx.importer.import("ffjson", FFJSON);
            let fmt = ctx.importer.import("fmt", "fmt");
            let io = ctx.importer.import("io", "io");
            if self.fast() {
                ctx.out.w(format!("err := {ffjson}.Unmarshal(r.Body(), &req)\n"));
            } else {
                let ioutil = ctx.importer.import("ioutil", "io/ioutil");
                ctx.out.w(format!("b, err := {ioutil}.ReadAll(r.Body)\n"));
                ctx.out.write_check_err(|w| {
                    w.w(format!(
                        "return nil, {fmt}.Errorf(\"couldn't read body for {}: %w\", err)\n",
                        m.name_request
                    ))
                });
                ctx.out.w(format!("err = {ffjson}.Unmarshal(b, &req)\n"));
            }
            ctx.out.w(format!(
                "if err != nil && err != {io}.EOF {{\nreturn nil, {fmt}.Errorf(\"couldn't unmarshal body to {}: %w\", err)\n}}\n",
                m.name_request
            ));
        }

        let opts = &m.options;
        if !opts.path_vars.is_empty() {
            if self.fast() {
                let transport = transport_pkg(ctx.importer, self.spec);
                let routing = ctx.importer.import("routing", ROUTING);
                let fmt = ctx.importer.import("fmt", "fmt");
                ctx.out.w(format!(
                    "vars, ok := ctx.Value({transport}.ContextKeyRouter).(*{routing}.Context)\n"
                ));
                ctx.out.w(format!(
                    "if !ok {{\nreturn nil, {fmt}.Errorf(\"couldn't assert {transport}.ContextKeyRouter to *{routing}.Context\")\n}}\n"
                ));
            } else {
                let mux = ctx.importer.import("mux", MUX);
                ctx.out.w(format!("vars := {mux}.Vars(r)\n"));
            }
        }
        if !opts.query_vars.is_empty() {
            ctx.out.w(if self.fast() {
                "q := r.URI().QueryArgs()\n"
            } else {
                "q := r.URL.Query()\n"
            });
        }

        for p in &m.params {
            let assign = format!("req.{}", field_name(&p.name));
            if opts.path_vars.contains_key(&p.name) {
                let value = if self.fast() {
                    format!("vars.Param({:?})", p.name)
                } else {
                    format!("vars[{:?}]", p.name)
                };
                self.convert(ctx, p, &assign, &value);
            } else if let Some(query) = opts.query_vars.get(&p.name) {
                let value = if self.fast() {
                    format!("string(q.Peek({query:?}))")
                } else {
                    format!("q.Get({query:?})")
                };
                let tmp = format!("tmp{}", field_name(&p.name));
                ctx.out.w(format!("{tmp} := {value}\nif {tmp} != \"\" {{\n"));
                self.convert(ctx, p, &assign, &tmp);
                ctx.out.w("}\n");
            } else if let Some(header) = opts.header_vars.get(&p.name) {
                let value = if self.fast() {
                    format!("string(r.Header.Peek({header:?}))")
                } else {
                    format!("r.Header.Get({header:?})")
                };
                self.convert(ctx, p, &assign, &value);
            }
        }
        ctx.out.w("return req, nil\n}");
    }

    fn convert(&self, ctx: &mut GenContext<'_, '_>, p: &Var, assign: &str, value: &str) {
        let conversion = Conversion {
            assign,
            value,
            name: &p.name,
            declare: false,
            sink: ErrSink::Return(&["nil"]),
            msg: "",
        };
        ctx.out.write_convert_type(ctx.importer, &p.ty, &conversion);
    }

    fn write_encoder(&self, ctx: &mut GenContext<'_, '_>, m: &ServiceMethod) {
        if let Some(f) = &m.options.server_response_func {
            let src = ctx.importer.expr_source(f);
            ctx.out.w(src);
            return;
        }
        let Some(key) = &m.options.wrap_response else {
            ctx.out.w("encodeResponseHTTP");
            return;
        };
        let context = ctx.importer.import("context", "context");
        let writer_ty = self.response_writer(ctx);
        ctx.out.w(format!(
            "func(ctx {context}.Context, w {writer_ty}, response interface{{}}) error {{\n"
        ));
        ctx.out
            .w(format!("return encodeResponseHTTP(ctx, w, {})\n}}", wrap_value(key, "response")));
    }

    fn write_route(&self, ctx: &mut GenContext<'_, '_>, iface: &ServiceInterface, m: &ServiceMethod) {
        let transport = transport_pkg(ctx.importer, self.spec);
        let verb = m.http_method().to_string();
        let path = route_path(self.spec, iface, m);
        if self.fast() {
            let path = path.replace('{', "<").replace('}', ">");
            ctx.out.w(format!("r.To({verb:?}, {path:?}, "));
        } else {
            ctx.out.w(format!("r.Methods({verb:?}).Path({path:?}).Handler("));
        }
        ctx.out.w(format!(
            "{transport}.NewServer(\nepSet{}.{}Endpoint,\n",
            iface.name_export, m.name
        ));
        self.write_decoder(ctx, m);
        ctx.out.w(",\n");
        self.write_encoder(ctx, m);
        ctx.out.w(",\n");
        ctx.out.w(format!(
            "append(opts.genericServerOption, opts.{}ServerOption...)...,\n)",
            m.name_unexport
        ));
        if self.fast() {
            ctx.out.w(".RouterHandle()");
        }
        ctx.out.w(")\n");
    }
}

/// `map[string]interface{}{"a": map[string]interface{}{"b": value}}` for `a.b`.
pub fn wrap_value(key: &str, value: &str) -> String {
    key.rsplit('.').fold(value.to_string(), |inner, part| {
        format!("map[string]interface{{}}{{{part:?}: {inner}}}")
    })
}

impl Generator for RestServerGenerator<'_> {
    fn name(&self) -> &'static str {
        "rest server"
    }

    fn filename(&self) -> &str {
        FILENAME
    }

    fn output_dir(&self) -> PathBuf {
        self.spec.site.base_dir.clone()
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError> {
        if self.spec.default_error_encoder.is_none() {
            self.write_default_error_encoder(ctx);
        }
        self.write_encode_response(ctx);

        write_handler_prelude(ctx, self.spec, "MakeHandlerREST");
        write_new_router(ctx, self.spec);
        for (iface, m) in self.spec.methods() {
            self.write_route(ctx, iface, m);
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
    use pretty_assertions::assert_eq;

    fn generate(opts: &str) -> (String, Vec<String>) {
        let u = testing::load(&[
            ("app/service.go", SERVICE),
            ("app/swipe.go", &swipe_file(&format!("Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n\t\t\tswipe.HTTPServer(),\n\t\t\t{opts}\n\t\t)"))),
        ]);
        let Spec::Service(spec) = testing::spec(&u) else { panic!("not a service") };
        render(&u, "example.com/m/app", &RestServerGenerator::new(&spec))
    }

    #[test]
    fn test_default_routes() {
        let (code, _) = generate("");
        assert!(code.contains("func MakeHandlerREST(svcAppI AppI, options ...ServerOption) (http.Handler, error) {\n"), "{code}");
        assert!(code.contains("opts.genericServerOption = append(opts.genericServerOption, kithttp.ServerErrorEncoder(defaultErrorEncoder))\n"), "{code}");
        assert!(code.contains("epSetAppI := MakeAppIEndpointSet(svcAppI)\n"), "{code}");
        assert!(code.contains("r.Methods(\"POST\").Path(\"/get\").Handler(kithttp.NewServer(\nepSetAppI.GetEndpoint,\n"), "{code}");
        assert!(code.contains("r.Methods(\"GET\").Path(\"/ping\")"), "{code}");
        assert!(code.contains("b, err := ioutil.ReadAll(r.Body)\n"), "{code}");
        assert!(code.contains("append(opts.genericServerOption, opts.appIGetServerOption...)...,\n))\n"), "{code}");
        assert!(code.contains("return nil, nil\n}"), "{code}");
        assert!(code.contains("statusCode = 201\n"), "{code}");
        assert!(code.contains("return r, nil\n}"), "{code}");
    }

    #[test]
    fn test_bound_params() {
        let (code, _) = generate(concat!(
            "swipe.MethodOptions(AppI.Get,\n",
            "\t\t\t\tswipe.RESTMethod(http.MethodGet),\n",
            "\t\t\t\tswipe.RESTPath(\"/users/{id:[0-9]+}\"),\n",
            "\t\t\t\tswipe.RESTQueryVars([]string{\"fname\", \"first_name\"}),\n",
            "\t\t\t\tswipe.RESTWrapResponse(\"data.user\"),\n",
            "\t\t\t),"
        ));
        assert!(code.contains("r.Methods(\"GET\").Path(\"/users/{id:[0-9]+}\")"), "{code}");
        assert!(code.contains("vars := mux.Vars(r)\nq := r.URL.Query()\n"), "{code}");
        assert!(code.contains("tmpFname := q.Get(\"first_name\")\nif tmpFname != \"\" {\nreq.Fname = tmpFname\n}\n"), "{code}");
        assert!(code.contains("req.Id = "), "{code}");
        assert!(!code.contains("couldn't read body for GetRequest"), "{code}");
        assert!(code.contains("map[string]interface{}{\"data\": map[string]interface{}{\"user\": response}}"), "{code}");
    }

    #[test]
    fn test_wrap_value() {
        assert_eq!(wrap_value("a", "r"), "map[string]interface{}{\"a\": r}");
    }

    #[test]
    fn test_fast_router() {
        let (code, imports) = generate("swipe.HTTPFast(),\n\t\t\tswipe.MethodOptions(AppI.Get, swipe.RESTPath(\"/get/{id}\")),");
        assert!(code.contains("(fasthttp.RequestHandler, error)"), "{code}");
        assert!(code.contains("r := routing.New()\n"), "{code}");
        assert!(code.contains("r.To(\"POST\", \"/get/<id>\", kitfasthttp.NewServer("), "{code}");
        assert!(code.contains("vars.Param(\"id\")"), "{code}");
        assert!(code.contains(").RouterHandle())\n"), "{code}");
        assert!(code.contains("return r.HandleRequest, nil\n"), "{code}");
        assert!(imports.iter().any(|i| i.contains("github.com/qiangxue/fasthttp-routing")));
    }
}

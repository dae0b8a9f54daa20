//! `client_gen.go` for REST services.

use std::path::PathBuf;

use super::client_struct::{constructor_name, struct_name};
use super::http_transport::{http_pkg, transport_pkg};
use super::rest_server::{has_body, route_path};
use super::{field_name, GenContext, Generator, FFJSON};
use crate::diagnostic::CompilerError;
use crate::schema::{ServiceInterface, ServiceMethod, ServiceSpec};
use crate::writer::convert::format_value;

pub const FILENAME: &str = "client_gen.go";

/// Constructor head shared by the REST and JSON-RPC clients: applies the
/// options and parses the target into `u`.
pub(crate) fn write_client_prelude(ctx: &mut GenContext<'_, '_>, spec: &ServiceSpec, iface: &ServiceInterface) {
    let strings = ctx.importer.import("strings", "strings");
    let net = ctx.importer.import("net", "net");
    let url = ctx.importer.import("url", "net/url");
    let iface_type = ctx.importer.type_string(&iface.ty);

    ctx.out.w(format!(
        "func {}(tgt string, options ...ClientOption) ({iface_type}, error) {{\n",
        constructor_name(spec, iface)
    ));
    ctx.out.w(format!(
        "opts := &clientOpts{{}}\nc := &{}{{}}\nfor _, o := range options {{\no(opts)\n}}\n",
        struct_name(iface)
    ));
    ctx.out.w(format!("if {strings}.HasPrefix(tgt, \"[\") {{\n"));
    ctx.out.w(format!("host, port, err := {net}.SplitHostPort(tgt)\n"));
    ctx.out.write_check_err(|w| w.w("return nil, err\n"));
    ctx.out.w("tgt = host + \":\" + port\n}\n");
    ctx.out.w(format!("u, err := {url}.Parse(tgt)\n"));
    ctx.out.write_check_err(|w| w.w("return nil, err\n"));
    ctx.out.w("if u.Scheme == \"\" {\nu.Scheme = \"https\"\n}\n");
}

/// Wraps the endpoint of `m` in its middleware chain.
pub(crate) fn write_client_middleware(ctx: &mut GenContext<'_, '_>, m: &ServiceMethod) {
    ctx.out.w(format!(
        "c.{ep}Endpoint = middlewareChain(append(opts.genericEndpointMiddleware, opts.{ep}EndpointMiddleware...))(c.{ep}Endpoint)\n",
        ep = m.name_unexport
    ));
}

/// Type the response is decoded into, if the method returns anything.
pub(crate) fn response_type(ctx: &mut GenContext<'_, '_>, m: &ServiceMethod) -> Option<String> {
    if m.results_named {
        Some(m.name_response.clone())
    } else {
        m.results.first().map(|r| ctx.importer.type_string(&r.ty))
    }
}

/// `/users/{id:[0-9]+}` becomes `/users/%s`.
pub fn sprintf_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut depth = 0usize;
    for c in path.chars() {
        match c {
            '{' => {
                if depth == 0 {
                    out.push_str("%s");
                }
                depth += 1;
            }
            '}' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            '%' => out.push_str("%%"),
            c => out.push(c),
        }
    }
    out
}

pub struct RestClientGenerator<'s> {
    spec: &'s ServiceSpec,
}

impl<'s> RestClientGenerator<'s> {
    pub fn new(spec: &'s ServiceSpec) -> Self {
        Self { spec }
    }

    fn fast(&self) -> bool {
        self.spec.transport.fast
    }

    fn write_encoder(&self, ctx: &mut GenContext<'_, '_>, iface: &ServiceInterface, m: &ServiceMethod) {
        if let Some(f) = &m.options.client_request_func {
            let src = ctx.importer.expr_source(f);
            ctx.out.w(src);
            return;
        }
        let context = ctx.importer.import("context", "context");
        let http = http_pkg(ctx.importer, self.spec);
        let opts = &m.options;
        let verb = m.http_method().to_string();
        let with_body = has_body(&verb) && m.body_params().next().is_some();
        let uses_req =
            with_body || !opts.path_vars.is_empty() || !opts.query_vars.is_empty() || !opts.header_vars.is_empty();
        let fmt = if uses_req {
            ctx.importer.import("fmt", "fmt")
        } else {
            String::new()
        };

        ctx.out.w(format!(
            "func(_ {context}.Context, r *{http}.Request, request interface{{}}) error {{\n"
        ));
        if uses_req {
            ctx.out.w(format!(
                "req, ok := request.({req})\nif !ok {{\nreturn {fmt}.Errorf(\"couldn't assert request as {req}, got %T\", request)\n}}\n",
                req = m.name_request
            ));
        }
        if self.fast() {
            ctx.out.w(format!("r.Header.SetMethod({verb:?})\n"));
        } else {
            ctx.out.w(format!("r.Method = {verb:?}\n"));
        }

        let path = route_path(self.spec, iface, m);
        let path_expr = if opts.path_vars.is_empty() {
            format!("{path:?}")
        } else {
            let args: Vec<String> = opts
                .path_vars
                .keys()
                .filter_map(|name| m.params.iter().find(|p| &p.name == name))
                .map(|p| format_value(ctx.importer, &p.ty, &format!("req.{}", field_name(&p.name))))
                .collect();
            format!("{fmt}.Sprintf({:?}, {})", sprintf_path(&path), args.join(", "))
        };
        if self.fast() {
            ctx.out.w(format!("r.SetRequestURI({path_expr})\n"));
        } else {
            ctx.out.w(format!("r.URL.Path += {path_expr}\n"));
        }

        if !opts.query_vars.is_empty() {
            ctx.out.w(if self.fast() {
                "q := r.URI().QueryArgs()\n"
            } else {
                "q := r.URL.Query()\n"
            });
            for (param, key) in &opts.query_vars {
                if let Some(p) = m.params.iter().find(|p| &p.name == param) {
                    let value = format_value(ctx.importer, &p.ty, &format!("req.{}", field_name(&p.name)));
                    ctx.out.w(format!("q.Add({key:?}, {value})\n"));
                }
            }
            ctx.out.w(if self.fast() {
                "r.URI().SetQueryString(q.String())\n"
            } else {
                "r.URL.RawQuery = q.Encode()\n"
            });
        }
        for (param, key) in &opts.header_vars {
            if let Some(p) = m.params.iter().find(|p| &p.name == param) {
                let value = format_value(ctx.importer, &p.ty, &format!("req.{}", field_name(&p.name)));
                ctx.out.w(format!("r.Header.Add({key:?}, {value})\n"));
            }
        }

        if with_body {
            let ffjson = ctx.importer.import("ffjson", FFJSON);
            ctx.out.w(format!("data, err := {ffjson}.Marshal(req)\n"));
            ctx.out.write_check_err(|w| {
                w.w(format!("return {fmt}.Errorf(\"couldn't marshal request %T: %s\", req, err)\n"))
            });
            if self.fast() {
                ctx.out.w("r.SetBody(data)\n");
            } else {
                let ioutil = ctx.importer.import("ioutil", "io/ioutil");
                let bytes = ctx.importer.import("bytes", "bytes");
                ctx.out.w(format!("r.Body = {ioutil}.NopCloser({bytes}.NewBuffer(data))\n"));
            }
        }
        ctx.out.w("return nil\n}");
    }

    fn write_decoder(&self, ctx: &mut GenContext<'_, '_>, m: &ServiceMethod) {
        if let Some(f) = &m.options.client_response_func {
            let src = ctx.importer.expr_source(f);
            ctx.out.w(src);
            return;
        }
        let context = ctx.importer.import("context", "context");
        let http = http_pkg(ctx.importer, self.spec);
        let status = if self.fast() { "r.StatusCode()" } else { "r.StatusCode" };

        ctx.out.w(format!(
            "func(_ {context}.Context, r *{http}.Response) (interface{{}}, error) {{\n"
        ));
        ctx.out.w(format!(
            "if statusCode := {status}; statusCode < 200 || statusCode > 299 {{\nreturn nil, {}ErrorDecode(statusCode)\n}}\n",
            m.name_unexport
        ));
        let Some(ty) = response_type(ctx, m) else {
            ctx.out.w("return nil, nil\n}");
            return;
        };
        let ffjson = ctx.importer.import("ffjson", FFJSON);
        let fmt = ctx.importer.import("fmt", "fmt");
        let io = ctx.importer.import("io", "io");
        match &m.options.wrap_response {
            Some(key) => ctx.out.w(format!("var resp {}\n", wrap_struct(key, &ty))),
            None => ctx.out.w(format!("var resp {ty}\n")),
        }
        if self.fast() {
            ctx.out.w(format!("err := {ffjson}.Unmarshal(r.Body(), &resp)\n"));
        } else {
            let ioutil = ctx.importer.import("ioutil", "io/ioutil");
            ctx.out.w(format!("b, err := {ioutil}.ReadAll(r.Body)\n"));
            ctx.out.write_check_err(|w| w.w("return nil, err\n"));
            ctx.out.w(format!("err = {ffjson}.Unmarshal(b, &resp)\n"));
        }
        ctx.out.w(format!(
            "if err != nil && err != {io}.EOF {{\nreturn nil, {fmt}.Errorf(\"couldn't unmarshal body to {}: %s\", err)\n}}\n",
            m.name_response
        ));
        match &m.options.wrap_response {
            Some(key) => {
                let path: Vec<String> = key.split('.').map(field_name).collect();
                ctx.out.w(format!("return resp.{}, nil\n}}", path.join(".")));
            }
            None => ctx.out.w("return resp, nil\n}"),
        }
    }
}

/// Anonymous struct matching a response wrapped under a dotted `key`.
fn wrap_struct(key: &str, ty: &str) -> String {
    key.rsplit('.').fold(ty.to_string(), |inner, part| {
        format!("struct {{\n{} {inner} `json:\"{part}\"`\n}}", field_name(part))
    })
}

impl Generator for RestClientGenerator<'_> {
    fn name(&self) -> &'static str {
        "rest client"
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
            let transport = transport_pkg(ctx.importer, self.spec);
            for m in &iface.methods {
                ctx.out.w(format!(
                    "c.{}Endpoint = {transport}.NewClient(\n{:?},\nu,\n",
                    m.name_unexport,
                    m.http_method()
                ));
                self.write_encoder(ctx, iface, m);
                ctx.out.w(",\n");
                self.write_decoder(ctx, m);
                ctx.out.w(",\n");
                ctx.out.w(format!(
                    "append(opts.genericClientOption, opts.{}ClientOption...)...,\n).Endpoint()\n",
                    m.name_unexport
                ));
                write_client_middleware(ctx, m);
            }
            ctx.out.w("return c, nil\n}\n\n");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::{self, render, swipe_file, SERVICE};
    use crate::schema::Spec;

    fn generate(opts: &str) -> String {
        let u = testing::load(&[
            ("app/service.go", SERVICE),
            (
                "app/swipe.go",
                &swipe_file(&format!(
                    "Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n\t\t\tswipe.ClientsEnable([]string{{\"go\"}}),\n\t\t\t{opts}\n\t\t)"
                )),
            ),
        ]);
        let Spec::Service(spec) = testing::spec(&u) else { panic!("not a service") };
        render(&u, "example.com/m/app", &RestClientGenerator::new(&spec)).0
    }

    #[test]
    fn test_sprintf_path() {
        assert_eq!(sprintf_path("/users/{id:[0-9]{1,3}}/{name}"), "/users/%s/%s");
        assert_eq!(sprintf_path("/100%"), "/100%%");
    }

    #[test]
    fn test_wrap_struct() {
        assert_eq!(wrap_struct("data", "User"), "struct {\nData User `json:\"data\"`\n}");
        assert_eq!(
            wrap_struct("a.b", "int"),
            "struct {\nA struct {\nB int `json:\"b\"`\n} `json:\"a\"`\n}"
        );
    }

    #[test]
    fn test_default_client() {
        let code = generate("");
        assert!(code.contains("func NewClientREST(tgt string, options ...ClientOption) (AppI, error) {\nopts := &clientOpts{}\nc := &clientAppI{}\n"), "{code}");
        assert!(code.contains("if u.Scheme == \"\" {\nu.Scheme = \"https\"\n}\n"), "{code}");
        assert!(code.contains("c.appIGetEndpoint = kithttp.NewClient(\n\"POST\",\nu,\n"), "{code}");
        assert!(code.contains("r.Method = \"POST\"\nr.URL.Path += \"/get\"\ndata, err := ffjson.Marshal(req)\n"), "{code}");
        assert!(code.contains("r.Body = ioutil.NopCloser(bytes.NewBuffer(data))\nreturn nil\n}"), "{code}");
        assert!(code.contains("if statusCode := r.StatusCode; statusCode < 200 || statusCode > 299 {\nreturn nil, appIGetErrorDecode(statusCode)\n}\nvar resp User\n"), "{code}");
        assert!(code.contains("r.Method = \"GET\"\nr.URL.Path += \"/ping\"\nreturn nil\n}"), "{code}");
        assert!(code.contains("c.appIPingEndpoint = middlewareChain(append(opts.genericEndpointMiddleware, opts.appIPingEndpointMiddleware...))(c.appIPingEndpoint)\n"), "{code}");
    }

    #[test]
    fn test_created_status_is_success() {
        let code = generate("");
        assert!(code.contains(
            "if statusCode := r.StatusCode; statusCode < 200 || statusCode > 299 {\nreturn nil, appIPingErrorDecode(statusCode)\n}\nreturn nil, nil\n}"
        ), "{code}");
        assert!(!code.contains("StatusOK"), "{code}");
    }

    #[test]
    fn test_fast_client_status_range() {
        let code = generate("swipe.HTTPFast(),");
        assert!(code.contains("if statusCode := r.StatusCode(); statusCode < 200 || statusCode > 299 {\n"), "{code}");
    }

    #[test]
    fn test_bound_params_and_wrap() {
        let code = generate(concat!(
            "swipe.MethodOptions(AppI.Get,\n",
            "\t\t\t\tswipe.RESTMethod(http.MethodGet),\n",
            "\t\t\t\tswipe.RESTPath(\"/users/{id:[0-9]+}\"),\n",
            "\t\t\t\tswipe.RESTQueryVars([]string{\"fname\", \"first_name\"}),\n",
            "\t\t\t\tswipe.RESTWrapResponse(\"data\"),\n",
            "\t\t\t),"
        ));
        assert!(code.contains("req, ok := request.(GetRequest)\n"), "{code}");
        assert!(code.contains("r.URL.Path += fmt.Sprintf(\"/users/%s\", strconv.FormatInt(int64(req.Id), 10))\n"), "{code}");
        assert!(code.contains("q := r.URL.Query()\nq.Add(\"first_name\", req.Fname)\nr.URL.RawQuery = q.Encode()\n"), "{code}");
        assert!(code.contains("var resp struct {\nData User `json:\"data\"`\n}\n"), "{code}");
        assert!(code.contains("return resp.Data, nil\n}"), "{code}");
        assert!(!code.contains("r.Method = \"GET\"\nr.URL.Path += \"/users\"\ndata, err"), "{code}");
    }
}

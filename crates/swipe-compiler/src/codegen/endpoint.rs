//! `endpoint_gen.go`: request/response structs, endpoint adapters and the
//! endpoint factories used by gateways.

use std::path::PathBuf;

use super::{call_args, field_name, result_names, GenContext, Generator, KIT_ENDPOINT};
use crate::diagnostic::CompilerError;
use crate::naming::to_lower_camel;
use crate::schema::{ServiceInterface, ServiceMethod, ServiceSpec};

pub const FILENAME: &str = "endpoint_gen.go";

pub struct EndpointGenerator<'s> {
    spec: &'s ServiceSpec,
}

impl<'s> EndpointGenerator<'s> {
    pub fn new(spec: &'s ServiceSpec) -> Self {
        Self { spec }
    }
}

impl Generator for EndpointGenerator<'_> {
    fn name(&self) -> &'static str {
        "endpoint"
    }

    fn filename(&self) -> &str {
        FILENAME
    }

    fn output_dir(&self) -> PathBuf {
        self.spec.site.base_dir.clone()
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError> {
        for iface in &self.spec.interfaces {
            for m in &iface.methods {
                write_request_response(ctx, m);
            }
        }
        for iface in &self.spec.interfaces {
            write_endpoint_set(ctx, iface);
            for m in &iface.methods {
                write_make_endpoint(ctx, iface, m);
            }
        }
        Ok(())
    }
}

fn write_request_response(ctx: &mut GenContext<'_, '_>, m: &ServiceMethod) {
    if !m.params.is_empty() {
        let fields: Vec<(String, String)> = m
            .params
            .iter()
            .map(|p| {
                let ty = ctx.importer.type_string(&p.ty);
                (field_name(&p.name), format!("{ty} `json:\"{}\"`", to_lower_camel(&p.name)))
            })
            .collect();
        ctx.out.write_type_struct(&m.name_request, &fields);
    }
    if m.results_named {
        let fields: Vec<(String, String)> = m
            .results
            .iter()
            .map(|r| {
                let ty = ctx.importer.type_string(&r.ty);
                (field_name(&r.name), format!("{ty} `json:\"{}\"`", to_lower_camel(&r.name)))
            })
            .collect();
        ctx.out.write_type_struct(&m.name_response, &fields);
    }
}

fn write_endpoint_set(ctx: &mut GenContext<'_, '_>, iface: &ServiceInterface) {
    let endpoint_pkg = ctx.importer.import("endpoint", KIT_ENDPOINT);
    let iface_type = ctx.importer.type_string(&iface.ty);
    let set_name = format!("{}EndpointSet", iface.name_export);

    let fields: Vec<(String, String)> = iface
        .methods
        .iter()
        .map(|m| (format!("{}Endpoint", m.name), format!("{endpoint_pkg}.Endpoint")))
        .collect();
    ctx.out.write_type_struct(&set_name, &fields);

    ctx.out.w(format!("func Make{set_name}(svc {iface_type}) {set_name} {{\n"));
    ctx.out.w(format!("return {set_name}{{\n"));
    for m in &iface.methods {
        ctx.out
            .w(format!("{}Endpoint: make{}Endpoint(svc),\n", m.name, m.name_export));
    }
    ctx.out.w("}\n}\n\n");
}

fn write_make_endpoint(ctx: &mut GenContext<'_, '_>, iface: &ServiceInterface, m: &ServiceMethod) {
    let endpoint_pkg = ctx.importer.import("endpoint", KIT_ENDPOINT);
    let context_pkg = ctx.importer.import("context", "context");
    let iface_type = ctx.importer.type_string(&iface.ty);

    ctx.out.w(format!(
        "func make{}Endpoint(s {iface_type}) {endpoint_pkg}.Endpoint {{\n",
        m.name_export
    ));
    ctx.out.w(format!(
        "return func(ctx {context_pkg}.Context, request interface{{}}) (interface{{}}, error) {{\n"
    ));
    if !m.params.is_empty() {
        ctx.out.w(format!("req := request.({})\n", m.name_request));
    }

    let mut names = result_names(m);
    if m.return_err.is_some() {
        names.push("err".to_string());
    }
    let mut args = call_args(m, |p| format!("req.{}", field_name(&p.name)));
    if m.param_ctx.is_some() {
        args[0] = "ctx".to_string();
    }
    if !names.is_empty() {
        ctx.out.w(format!("{} := ", names.join(", ")));
    }
    ctx.out.write_func_call("s", &m.name, &args);
    if m.return_err.is_some() {
        ctx.out.write_check_err(|w| w.w("return nil, err\n"));
    }

    let response = if m.results_named {
        let pairs: Vec<String> = m
            .results
            .iter()
            .map(|r| format!("{}: {}", field_name(&r.name), r.name))
            .collect();
        format!("{}{{{}}}", m.name_response, pairs.join(", "))
    } else if m.results.is_empty() {
        "nil".to_string()
    } else {
        "result".to_string()
    };
    ctx.out.w(format!("return {response}, nil\n"));
    ctx.out.w("}\n}\n\n");
}

/// Endpoint factories turning service instances into client endpoints, as
/// consumed by `sd.NewEndpointer`.
pub struct EndpointFactoryGenerator<'s> {
    spec: &'s ServiceSpec,
}

impl<'s> EndpointFactoryGenerator<'s> {
    pub fn new(spec: &'s ServiceSpec) -> Self {
        Self { spec }
    }
}

impl Generator for EndpointFactoryGenerator<'_> {
    fn name(&self) -> &'static str {
        "endpoint factory"
    }

    fn filename(&self) -> &str {
        FILENAME
    }

    fn output_dir(&self) -> PathBuf {
        self.spec.site.base_dir.clone()
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError> {
        let endpoint_pkg = ctx.importer.import("endpoint", KIT_ENDPOINT);
        let io_pkg = ctx.importer.import("io", "io");
        let strings_pkg = ctx.importer.import("strings", "strings");

        for iface in &self.spec.interfaces {
            let iface_type = ctx.importer.type_string(&iface.ty);
            let name = &iface.name_export;
            let impl_name = format!("{}EndpointFactory", iface.name_unexport);
            let method_sig = format!("(instance string) ({endpoint_pkg}.Endpoint, {io_pkg}.Closer, error)");

            ctx.out.w(format!("type {name}EndpointFactory interface {{\n"));
            for m in &iface.methods {
                ctx.out.w(format!("{}EndpointFactory{method_sig}\n", m.name));
            }
            ctx.out.w("}\n\n");

            ctx.out.write_type_struct(
                &impl_name,
                &[
                    ("factory".to_string(), format!("func(instance string) ({iface_type}, error)")),
                    ("instance".to_string(), "string".to_string()),
                ],
            );

            for m in &iface.methods {
                ctx.out.w(format!(
                    "func (f *{impl_name}) {}EndpointFactory{method_sig} {{\n",
                    m.name
                ));
                ctx.out.w("if f.instance != \"\" {\n");
                ctx.out.w(format!(
                    "instance = {strings_pkg}.TrimRight(instance, \"/\") + \"/\" + {strings_pkg}.TrimLeft(f.instance, \"/\")\n"
                ));
                ctx.out.w("}\n");
                ctx.out.w("c, err := f.factory(instance)\n");
                ctx.out.write_check_err(|w| w.w("return nil, nil, err\n"));
                ctx.out.w(format!("return make{}Endpoint(c), nil, nil\n", m.name_export));
                ctx.out.w("}\n\n");
            }

            ctx.out.w(format!(
                "func New{name}Factory(instance string, factory func(instance string) ({iface_type}, error)) {name}EndpointFactory {{\n"
            ));
            ctx.out
                .w(format!("return &{impl_name}{{instance: instance, factory: factory}}\n"));
            ctx.out.w("}\n\n");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::{self, render, swipe_file, SERVICE};
    use crate::schema::Spec;

    fn service(opts: &str) -> (crate::types::Universe, String) {
        let u = testing::load(&[
            ("app/service.go", SERVICE),
            ("app/swipe.go", &swipe_file(&format!("Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n\t\t\t{opts}\n\t\t)"))),
        ]);
        (u, "example.com/m/app".to_string())
    }

    #[test]
    fn test_endpoint_adapters() {
        let (u, pkg) = service("swipe.HTTPServer(),");
        let Spec::Service(spec) = testing::spec(&u) else { panic!("not a service") };
        let (code, imports) = render(&u, &pkg, &EndpointGenerator::new(&spec));

        assert!(code.contains("type GetRequest struct {\nFname string `json:\"fname\"`\nId int `json:\"id\"`\n}"), "{code}");
        assert!(code.contains("type ListResponse struct {\nItems []User `json:\"items\"`\nTotal int `json:\"total\"`\n}"), "{code}");
        assert!(!code.contains("type PingRequest"), "{code}");
        assert!(code.contains("func makeAppIGetEndpoint(s AppI) endpoint.Endpoint {\n"), "{code}");
        assert!(code.contains("req := request.(GetRequest)\nresult, err := s.Get(ctx, req.Fname, req.Id)\nif err != nil {\nreturn nil, err\n}\nreturn result, nil\n"), "{code}");
        assert!(code.contains("items, total, err := s.List(ctx, req.Ids)\n"), "{code}");
        assert!(code.contains("return ListResponse{Items: items, Total: total}, nil\n"), "{code}");
        assert!(code.contains("s.Ping(ctx)\nreturn nil, nil\n"), "{code}");
        assert!(code.contains("func MakeAppIEndpointSet(svc AppI) AppIEndpointSet {\nreturn AppIEndpointSet{\nGetEndpoint: makeAppIGetEndpoint(svc),\n"), "{code}");
        assert_eq!(
            imports,
            ["\t\"context\"\n", "\t\"github.com/go-kit/kit/endpoint\"\n", "\t\"github.com/google/uuid\"\n"]
        );
    }

    #[test]
    fn test_endpoint_factory() {
        let (u, pkg) = service("swipe.ClientsEnable([]string{\"go\"}),");
        let Spec::Service(spec) = testing::spec(&u) else { panic!("not a service") };
        let (code, _) = render(&u, &pkg, &EndpointFactoryGenerator::new(&spec));

        assert!(code.contains("type AppIEndpointFactory interface {\nGetEndpointFactory(instance string) (endpoint.Endpoint, io.Closer, error)\n"), "{code}");
        assert!(code.contains("func (f *appIEndpointFactory) ListEndpointFactory(instance string) (endpoint.Endpoint, io.Closer, error) {\n"), "{code}");
        assert!(code.contains("return makeAppIListEndpoint(c), nil, nil\n"), "{code}");
        assert!(code.contains("func NewAppIFactory(instance string, factory func(instance string) (AppI, error)) AppIEndpointFactory {\n"), "{code}");
    }
}

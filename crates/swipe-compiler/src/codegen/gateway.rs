//! `gateway_gen.go`: load-balanced, retrying endpoints over service
//! instances found by a go-kit `sd.Instancer`.

use std::path::PathBuf;

use super::{GenContext, Generator, KIT_ENDPOINT, KIT_LOG};
use crate::diagnostic::CompilerError;
use crate::schema::{GatewayService, GatewaySpec};

pub const FILENAME: &str = "gateway_gen.go";

const KIT_HTTP: &str = "github.com/go-kit/kit/transport/http";
const KIT_JSONRPC: &str = "github.com/l-vitaly/go-kit/transport/http/jsonrpc";
const KIT_SD: &str = "github.com/go-kit/kit/sd";
const KIT_LB: &str = "github.com/go-kit/kit/sd/lb";

pub struct GatewayGenerator<'s> {
    spec: &'s GatewaySpec,
}

impl<'s> GatewayGenerator<'s> {
    pub fn new(spec: &'s GatewaySpec) -> Self {
        Self { spec }
    }
}

struct Aliases {
    endpoint: String,
    sd: String,
    lb: String,
    time: String,
}

fn write_common(ctx: &mut GenContext<'_, '_>, a: &Aliases) {
    let context = ctx.importer.import("context", "context");
    let kithttp = ctx.importer.import("kithttp", KIT_HTTP);
    let jsonrpc = ctx.importer.import("jsonrpc", KIT_JSONRPC);
    let Aliases { endpoint, sd, lb, time } = a;

    ctx.out.w(format!(
        "const (\nDefaultRetryMax = 99\nDefaultRetryTimeout = {time}.Second * 600\n)\n\n"
    ));
    ctx.out.w(format!("type BalancerFactory func(s {sd}.Endpointer) {lb}.Balancer\n\n"));

    ctx.out.w(format!("func RetryErrorExtractor() {endpoint}.Middleware {{\n"));
    ctx.out.w(format!("return func(next {endpoint}.Endpoint) {endpoint}.Endpoint {{\n"));
    ctx.out.w(format!(
        "return func(ctx {context}.Context, request interface{{}}) (response interface{{}}, err error) {{\n"
    ));
    ctx.out.w("response, err = next(ctx, request)\nif err != nil {\n");
    ctx.out.w(format!("if e, ok := err.({lb}.RetryError); ok {{\nreturn nil, e.Final\n}}\n"));
    ctx.out.w("}\nreturn\n}\n}\n}\n\n");

    ctx.out.w(format!(
        "type EndpointOption struct {{\nBalancer BalancerFactory\nRetryMax int\nRetryTimeout {time}.Duration\n}}\n\n"
    ));

    ctx.out.w(format!("func retryMax(max int) {lb}.Callback {{\n"));
    ctx.out.w("return func(n int, received error) (keepTrying bool, replacement error) {\n");
    ctx.out.w(format!(
        "switch received.(type) {{\ncase {kithttp}.StatusCoder, {jsonrpc}.ErrorCoder:\nreturn false, received\n}}\n"
    ));
    ctx.out.w("return n < max, nil\n}\n}\n\n");
}

fn write_service_types(ctx: &mut GenContext<'_, '_>, a: &Aliases, service: &GatewayService) {
    let io = ctx.importer.import("io", "io");
    let name = &service.name;
    ctx.out.w(format!("type {name}EndpointFactory interface {{\n"));
    for m in &service.methods {
        ctx.out.w(format!(
            "{}EndpointFactory(instance string) ({}.Endpoint, {io}.Closer, error)\n",
            m.name, a.endpoint
        ));
    }
    ctx.out.w("}\n\n");

    ctx.out.w(format!(
        "type {name}Option struct {{\nInstancer {}.Instancer\nEndpointFactory {name}EndpointFactory\n",
        a.sd
    ));
    for m in &service.methods {
        ctx.out.w(format!("{} EndpointOption\n", m.name));
    }
    ctx.out.w("}\n\n");
}

fn write_endpoint_set(ctx: &mut GenContext<'_, '_>, a: &Aliases, services: &[GatewayService]) {
    ctx.out.w("type EndpointSet struct {\n");
    for service in services {
        ctx.out.w(format!("{} struct {{\n", service.name));
        for m in &service.methods {
            ctx.out.w(format!("{}Endpoint {}.Endpoint\n", m.name, a.endpoint));
        }
        ctx.out.w("}\n");
    }
    ctx.out.w("}\n\n");
}

fn write_new_gateway(ctx: &mut GenContext<'_, '_>, a: &Aliases, services: &[GatewayService]) {
    let log = ctx.importer.import("log", KIT_LOG);
    let mut params: Vec<String> = services
        .iter()
        .map(|s| format!("{}Option {}Option", s.option_var(), s.name))
        .collect();
    params.push(format!("logger {log}.Logger"));
    ctx.out
        .w(format!("func NewGateway({}) (ep EndpointSet) {{\n", params.join(", ")));

    for service in services {
        let var = format!("{}Option", service.option_var());
        for m in &service.methods {
            ctx.out.w(format!("{{\nopt := {var}.{}\n", m.name));
            ctx.out.w(format!(
                "if opt.Balancer == nil {{\nopt.Balancer = {}.{}\n}}\n",
                a.lb,
                m.balancer.constructor()
            ));
            ctx.out
                .w("if opt.RetryMax == 0 {\nopt.RetryMax = DefaultRetryMax\n}\n");
            ctx.out
                .w("if opt.RetryTimeout == 0 {\nopt.RetryTimeout = DefaultRetryTimeout\n}\n");
            ctx.out.w(format!(
                "endpointer := {}.NewEndpointer({var}.Instancer, {var}.EndpointFactory.{}EndpointFactory, logger)\n",
                a.sd, m.name
            ));
            ctx.out.w(format!(
                "ep.{}.{}Endpoint = RetryErrorExtractor()({}.RetryWithCallback(opt.RetryTimeout, opt.Balancer(endpointer), retryMax(opt.RetryMax)))\n}}\n",
                service.name, m.name, a.lb
            ));
        }
    }
    ctx.out.w("return\n}\n\n");
}

impl Generator for GatewayGenerator<'_> {
    fn name(&self) -> &'static str {
        "gateway"
    }

    fn filename(&self) -> &str {
        FILENAME
    }

    fn output_dir(&self) -> PathBuf {
        self.spec.site.base_dir.clone()
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError> {
        let aliases = Aliases {
            endpoint: ctx.importer.import("endpoint", KIT_ENDPOINT),
            sd: ctx.importer.import("sd", KIT_SD),
            lb: ctx.importer.import("lb", KIT_LB),
            time: ctx.importer.import("time", "time"),
        };
        write_common(ctx, &aliases);
        for service in &self.spec.services {
            write_service_types(ctx, &aliases, service);
        }
        write_endpoint_set(ctx, &aliases, &self.spec.services);
        write_new_gateway(ctx, &aliases, &self.spec.services);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::{self, render};
    use crate::schema::Spec;

    const SERVICE: &str = concat!(
        "package app\n\n",
        "import \"context\"\n\n",
        "type Interface interface {\n",
        "\tCreate(ctx context.Context, name string) error\n",
        "\tGet(ctx context.Context, id int) (string, error)\n",
        "}\n",
    );

    fn generate(opts: &str) -> (String, Vec<String>) {
        let swipe = format!(
            "//go:build swipe\n\npackage gw\n\nimport (\n\t\"github.com/swipe-io/swipe/v2\"\n\n\t\"example.com/m/app\"\n)\n\nfunc Swipe() {{\n\tswipe.Build(swipe.Gateway({opts}))\n}}\n"
        );
        let u = testing::load(&[("app/service.go", SERVICE), ("gw/swipe.go", &swipe)]);
        let Spec::Gateway(spec) = testing::spec(&u) else { panic!("not a gateway") };
        render(&u, "example.com/m/gw", &GatewayGenerator::new(&spec))
    }

    #[test]
    fn test_gateway_types() {
        let (code, imports) = generate("swipe.GatewayService((*app.Interface)(nil))");
        assert!(code.starts_with("const (\nDefaultRetryMax = 99\nDefaultRetryTimeout = time.Second * 600\n)\n\n"), "{code}");
        assert!(code.contains(
            "type InterfaceEndpointFactory interface {\nCreateEndpointFactory(instance string) (endpoint.Endpoint, io.Closer, error)\nGetEndpointFactory(instance string) (endpoint.Endpoint, io.Closer, error)\n}\n"
        ), "{code}");
        assert!(code.contains(
            "type InterfaceOption struct {\nInstancer sd.Instancer\nEndpointFactory InterfaceEndpointFactory\nCreate EndpointOption\nGet EndpointOption\n}\n"
        ), "{code}");
        assert!(code.contains(
            "type EndpointSet struct {\nInterface struct {\nCreateEndpoint endpoint.Endpoint\nGetEndpoint endpoint.Endpoint\n}\n}\n"
        ), "{code}");
        assert!(code.contains("case kithttp.StatusCoder, jsonrpc.ErrorCoder:\n"), "{code}");
        for path in [KIT_SD, KIT_LB, KIT_LOG, "io"] {
            assert!(imports.iter().any(|i| i.contains(&format!("\"{path}\""))), "{path}: {imports:?}");
        }
    }

    #[test]
    fn test_new_gateway_balancers() {
        let (code, _) = generate(
            "swipe.GatewayService((*app.Interface)(nil), swipe.GatewayServiceMethod(app.Interface.Get, swipe.GatewayBalancer(\"random\")))",
        );
        assert!(code.contains("func NewGateway(interfaceOption InterfaceOption, logger log.Logger) (ep EndpointSet) {\n"), "{code}");
        assert!(code.contains("opt := interfaceOption.Create\nif opt.Balancer == nil {\nopt.Balancer = lb.NewRoundRobin\n}\n"), "{code}");
        assert!(code.contains("opt := interfaceOption.Get\nif opt.Balancer == nil {\nopt.Balancer = lb.NewRandom\n}\n"), "{code}");
        assert!(code.contains(
            "endpointer := sd.NewEndpointer(interfaceOption.Instancer, interfaceOption.EndpointFactory.GetEndpointFactory, logger)\nep.Interface.GetEndpoint = RetryErrorExtractor()(lb.RetryWithCallback(opt.RetryTimeout, opt.Balancer(endpointer), retryMax(opt.RetryMax)))\n}\n"
        ), "{code}");
    }
}

//! `instrumenting_gen.go`: request count and latency middleware backed by
//! go-kit metrics, defaulting to Prometheus collectors.

use std::path::PathBuf;

use super::{forward_args, method_params_as, method_results, param_names, GenContext, Generator};
use crate::diagnostic::CompilerError;
use crate::schema::{ServiceMethod, ServiceSpec};

pub const FILENAME: &str = "instrumenting_gen.go";

const KIT_METRICS: &str = "github.com/go-kit/kit/metrics";
const KIT_PROMETHEUS: &str = "github.com/go-kit/kit/metrics/prometheus";
const PROMETHEUS: &str = "github.com/prometheus/client_golang/prometheus";

pub struct InstrumentingGenerator<'s> {
    spec: &'s ServiceSpec,
}

impl<'s> InstrumentingGenerator<'s> {
    pub fn new(spec: &'s ServiceSpec) -> Self {
        Self { spec }
    }

    fn write_options(&self, ctx: &mut GenContext<'_, '_>) {
        let metrics = ctx.importer.import("metrics", KIT_METRICS);
        ctx.out.write_type_struct(
            "instrumentingOpts",
            &[
                ("requestCount".to_string(), format!("{metrics}.Counter")),
                ("requestLatency".to_string(), format!("{metrics}.Histogram")),
                ("namespace".to_string(), "string".to_string()),
                ("subsystem".to_string(), "string".to_string()),
            ],
        );
        ctx.out.w("type InstrumentingOption func(*instrumentingOpts)\n\n");
        let setters = [
            ("Namespace", "v", "string".to_string(), "namespace"),
            ("Subsystem", "v", "string".to_string(), "subsystem"),
            ("RequestLatency", "requestLatency", format!("{metrics}.Histogram"), "requestLatency"),
            ("RequestCount", "requestCount", format!("{metrics}.Counter"), "requestCount"),
        ];
        for (func, arg, ty, field) in setters {
            ctx.out.w(format!(
                "func {func}({arg} {ty}) InstrumentingOption {{\nreturn func(o *instrumentingOpts) {{\no.{field} = {arg}\n}}\n}}\n\n"
            ));
        }
    }

    fn write_method(&self, ctx: &mut GenContext<'_, '_>, struct_name: &str, m: &ServiceMethod) {
        let results = method_results(ctx.importer, m);
        let time_pkg = m.options.instrumenting.then(|| ctx.importer.import("time", "time"));
        let mut taken: Vec<String> = vec!["s".to_string(), "begin".to_string()];
        taken.extend(ctx.importer.import_names().map(str::to_string));
        let bound = param_names(m, &taken);
        let params = method_params_as(ctx.importer, m, &bound);
        let args = forward_args(m, &bound);
        let returns = !results.is_empty();

        ctx.out
            .write_func(&m.name, &format!("s *{struct_name}"), &params, &results, |w| {
                if let Some(time_pkg) = &time_pkg {
                    w.write_defer(&[format!("begin {time_pkg}.Time")], &[format!("{time_pkg}.Now()")], |w| {
                        w.w(format!("s.opts.requestCount.With(\"method\", {:?}).Add(1)\n", m.name));
                        w.w(format!(
                            "s.opts.requestLatency.With(\"method\", {:?}).Observe({time_pkg}.Since(begin).Seconds())\n",
                            m.name
                        ));
                    });
                }
                if returns {
                    w.w("return ");
                }
                w.write_func_call("s.next", &m.name, &args);
            });
    }

    fn write_constructor(&self, ctx: &mut GenContext<'_, '_>, iface_type: &str, name: &str, struct_name: &str) {
        let kitprometheus = ctx.importer.import("kitprometheus", KIT_PROMETHEUS);
        let prometheus = ctx.importer.import("prometheus", PROMETHEUS);
        let mut defaults = Vec::new();
        if !self.spec.instrumenting.namespace.is_empty() {
            defaults.push(format!("namespace: {:?}", self.spec.instrumenting.namespace));
        }
        if !self.spec.instrumenting.subsystem.is_empty() {
            defaults.push(format!("subsystem: {:?}", self.spec.instrumenting.subsystem));
        }

        ctx.out.w(format!(
            "func NewInstrumenting{name}Middleware(s {iface_type}, opts ...InstrumentingOption) {iface_type} {{\n"
        ));
        ctx.out.w(format!(
            "i := &{struct_name}{{next: s, opts: &instrumentingOpts{{{}}}}}\n",
            defaults.join(", ")
        ));
        ctx.out.w("for _, o := range opts {\no(i.opts)\n}\n");
        ctx.out.w("if i.opts.requestCount == nil {\n");
        ctx.out.w(format!(
            "i.opts.requestCount = {kitprometheus}.NewCounterFrom({prometheus}.CounterOpts{{\nNamespace: i.opts.namespace,\nSubsystem: i.opts.subsystem,\nName: \"request_count\",\nHelp: \"Number of requests received.\",\n}}, []string{{\"method\"}})\n"
        ));
        ctx.out.w("}\n");
        ctx.out.w("if i.opts.requestLatency == nil {\n");
        ctx.out.w(format!(
            "i.opts.requestLatency = {kitprometheus}.NewSummaryFrom({prometheus}.SummaryOpts{{\nNamespace: i.opts.namespace,\nSubsystem: i.opts.subsystem,\nName: \"request_latency_microseconds\",\nHelp: \"Total duration of requests in microseconds.\",\n}}, []string{{\"method\"}})\n"
        ));
        ctx.out.w("}\nreturn i\n}\n\n");
    }
}

impl Generator for InstrumentingGenerator<'_> {
    fn name(&self) -> &'static str {
        "instrumenting"
    }

    fn filename(&self) -> &str {
        FILENAME
    }

    fn output_dir(&self) -> PathBuf {
        self.spec.site.base_dir.clone()
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError> {
        self.write_options(ctx);
        for iface in &self.spec.interfaces {
            let iface_type = ctx.importer.type_string(&iface.ty);
            let struct_name = format!("{}InstrumentingMiddleware", iface.name_export);
            ctx.out.write_type_struct(
                &struct_name,
                &[
                    ("next".to_string(), iface_type.clone()),
                    ("opts".to_string(), "*instrumentingOpts".to_string()),
                ],
            );
            for m in &iface.methods {
                self.write_method(ctx, &struct_name, m);
            }
            self.write_constructor(ctx, &iface_type, &iface.name_export, &struct_name);
        }
        Ok(())
    }
}

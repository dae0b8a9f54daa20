//! `logging_gen.go`: a go-kit logging middleware per interface.

use std::path::PathBuf;

use super::{
    ctx_name, forward_args, method_params_as, method_results, param_names, result_names, GenContext, Generator, KIT_LOG,
};
use crate::diagnostic::CompilerError;
use crate::schema::{ServiceMethod, ServiceSpec};
use crate::types::{Type, Universe, Var};

pub const FILENAME: &str = "logging_gen.go";

pub struct LoggingGenerator<'s> {
    spec: &'s ServiceSpec,
}

impl<'s> LoggingGenerator<'s> {
    pub fn new(spec: &'s ServiceSpec) -> Self {
        Self { spec }
    }

    fn write_method(&self, ctx: &mut GenContext<'_, '_>, struct_name: &str, m: &ServiceMethod) {
        let results = method_results(ctx.importer, m);

        let mut vars: Vec<(String, String)> = result_names(m)
            .into_iter()
            .zip(m.results.iter().map(|r| ctx.importer.type_string(&r.ty)))
            .collect();
        if m.return_err.is_some() {
            vars.push(("err".to_string(), "error".to_string()));
        }

        let time_pkg = m.options.logging.then(|| ctx.importer.import("time", "time"));
        let context_keys: Vec<(String, String)> = if m.options.logging && m.param_ctx.is_some() {
            m.options
                .logging_context
                .iter()
                .map(|(name, key)| (name.clone(), ctx.importer.expr_source(key)))
                .collect()
        } else {
            Vec::new()
        };

        let mut taken: Vec<String> = ["s", "now", "logErr", "le", "ok"].map(String::from).to_vec();
        taken.extend(vars.iter().map(|(n, _)| n.clone()));
        taken.extend(ctx.importer.import_names().map(str::to_string));
        let bound = param_names(m, &taken);
        let params = method_params_as(ctx.importer, m, &bound);

        let defer = time_pkg.map(|time_pkg| {
            let mut kv = vec![
                "\"method\"".to_string(),
                format!("{:?}", m.name),
                "\"took\"".to_string(),
                format!("{time_pkg}.Since(now)"),
            ];
            kv.extend(log_params(ctx.universe, m, &bound));
            let ctx_var = ctx_name(m);
            for (name, key) in &context_keys {
                kv.push(format!("{name:?}"));
                kv.push(format!("{ctx_var}.Value({key})"));
            }
            if m.return_err.is_some() {
                kv.push("\"err\"".to_string());
                kv.push("logErr".to_string());
            }
            (time_pkg, kv)
        });

        let names: Vec<String> = vars.iter().map(|(n, _)| n.clone()).collect();
        let args = forward_args(m, &bound);
        let has_err = m.return_err.is_some();

        ctx.out
            .write_func(&m.name, &format!("s *{struct_name}"), &params, &results, |w| {
                if !vars.is_empty() {
                    w.w("var (\n");
                    for (name, ty) in &vars {
                        w.w(format!("{name} {ty}\n"));
                    }
                    w.w(")\n");
                }
                if let Some((time_pkg, kv)) = &defer {
                    w.write_defer(&[format!("now {time_pkg}.Time")], &[format!("{time_pkg}.Now()")], |w| {
                        if has_err {
                            w.w("logErr := err\n");
                            w.w("if le, ok := err.(interface{ LogError() error }); ok {\nlogErr = le.LogError()\n}\n");
                        }
                        w.w(format!("s.logger.Log({})\n", kv.join(", ")));
                    });
                }
                if !names.is_empty() {
                    w.w(format!("{} = ", names.join(", ")));
                }
                w.write_func_call("s.next", &m.name, &args);
                if !names.is_empty() {
                    w.w(format!("return {}\n", names.join(", ")));
                }
            });
    }
}

/// Key/value pairs logged for the method parameters, bound to `names`.
fn log_params(u: &Universe, m: &ServiceMethod, names: &[String]) -> Vec<String> {
    let includes = &m.options.logging_includes;
    let excludes = &m.options.logging_excludes;
    m.params
        .iter()
        .zip(names)
        .filter(|(p, _)| includes.is_empty() || includes.contains(&p.name))
        .filter(|(p, _)| !excludes.contains(&p.name))
        .filter_map(|(p, name)| log_value(u, p, name).map(|value| [format!("{:?}", p.name), value]))
        .flatten()
        .collect()
}

/// How a parameter is rendered in the log line; `None` skips it.
fn log_value(u: &Universe, p: &Var, name: &str) -> Option<String> {
    if let Type::Named(id) = &p.ty {
        let named = u.named(*id);
        if named.external {
            return Some(name.to_string());
        }
        if has_string_method(u, &p.ty) {
            return Some(format!("{name}.String()"));
        }
    }
    match u.underlying(&p.ty) {
        Type::Slice(_) | Type::Array(..) | Type::Map(..) => Some(format!("len({name})")),
        Type::Struct(_) => None,
        _ => Some(name.to_string()),
    }
}

fn has_string_method(u: &Universe, ty: &Type) -> bool {
    u.method_set(ty).iter().any(|method| {
        method.name == "String"
            && method.sig.params.is_empty()
            && method.sig.results.len() == 1
            && u.basic(&method.sig.results[0].ty).is_some_and(|k| k.is_string())
    })
}

impl Generator for LoggingGenerator<'_> {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn filename(&self) -> &str {
        FILENAME
    }

    fn output_dir(&self) -> PathBuf {
        self.spec.site.base_dir.clone()
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError> {
        let log_pkg = ctx.importer.import("log", KIT_LOG);
        for iface in &self.spec.interfaces {
            let iface_type = ctx.importer.type_string(&iface.ty);
            let struct_name = format!("{}LoggingMiddleware", iface.name_export);
            ctx.out.write_type_struct(
                &struct_name,
                &[
                    ("next".to_string(), iface_type.clone()),
                    ("logger".to_string(), format!("{log_pkg}.Logger")),
                ],
            );
            for m in &iface.methods {
                self.write_method(ctx, &struct_name, m);
            }
            ctx.out.w(format!(
                "func NewLogging{}Middleware(s {iface_type}, logger {log_pkg}.Logger) {iface_type} {{\nreturn &{struct_name}{{next: s, logger: logger}}\n}}\n\n",
                iface.name_export
            ));
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
            ("app/swipe.go", &swipe_file(&format!("Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n\t\t\t{opts}\n\t\t)"))),
        ]);
        let Spec::Service(spec) = testing::spec(&u) else { panic!("not a service") };
        render(&u, "example.com/m/app", &LoggingGenerator::new(&spec)).0
    }

    #[test]
    fn test_logging_all_methods() {
        let code = generate("swipe.Logging(true),");
        assert!(code.contains("type AppILoggingMiddleware struct {\nnext AppI\nlogger log.Logger\n}"), "{code}");
        assert!(code.contains(
            "func (s *AppILoggingMiddleware) Get(ctx context.Context, fname string, id int) (User, error) {\nvar (\nresult User\nerr error\n)\n"
        ), "{code}");
        assert!(code.contains("s.logger.Log(\"method\", \"Get\", \"took\", time.Since(now), \"fname\", fname, \"id\", id, \"err\", logErr)\n"), "{code}");
        assert!(code.contains("\"ids\", len(ids)"), "{code}");
        assert!(code.contains("result, err = s.next.Get(ctx, fname, id)\nreturn result, err\n"), "{code}");
        assert!(code.contains("s.logger.Log(\"method\", \"Ping\", \"took\", time.Since(now))\n}(time.Now())\ns.next.Ping(ctx)\n}"), "{code}");
        assert!(code.contains("func NewLoggingAppIMiddleware(s AppI, logger log.Logger) AppI {\n"), "{code}");
    }

    #[test]
    fn test_params_shadowing_body_names_are_renamed() {
        const CLOCK: &str = concat!(
            "package app\n\n",
            "import \"context\"\n\n",
            "type Clock interface {\n",
            "\tShift(ctx context.Context, time int, now string) error\n",
            "\tStamp(ctx context.Context, result string) (string, error)\n",
            "}\n",
        );
        let u = testing::load(&[
            ("app/clock.go", CLOCK),
            ("app/swipe.go", &swipe_file("Service(\n\t\t\tswipe.Interface((*Clock)(nil), \"\"),\n\t\t\tswipe.Logging(true),\n\t\t)")),
        ]);
        let Spec::Service(spec) = testing::spec(&u) else { panic!("not a service") };
        let code = render(&u, "example.com/m/app", &LoggingGenerator::new(&spec)).0;

        assert!(code.contains("func (s *ClockLoggingMiddleware) Shift(ctx context.Context, time_2 int, now_2 string) error {\n"), "{code}");
        assert!(code.contains("\"took\", time.Since(now), \"time\", time_2, \"now\", now_2, \"err\", logErr)"), "{code}");
        assert!(code.contains("err = s.next.Shift(ctx, time_2, now_2)\n"), "{code}");
        assert!(code.contains("Stamp(ctx context.Context, result_2 string) (string, error) {\nvar (\nresult string\nerr error\n)\n"), "{code}");
        assert!(code.contains("result, err = s.next.Stamp(ctx, result_2)\n"), "{code}");
    }

    #[test]
    fn test_logging_params_filter() {
        let code = generate(concat!(
            "swipe.MethodOptions(AppI.Get,\n",
            "\t\t\t\tswipe.Logging(true),\n",
            "\t\t\t\tswipe.LoggingParams([]string{}, []string{\"fname\"}),\n",
            "\t\t\t),"
        ));
        assert!(code.contains("\"took\", time.Since(now), \"id\", id, \"err\", logErr)"), "{code}");
        assert!(!code.contains("\"method\", \"List\""), "{code}");
        assert!(code.contains("items, total, err = s.next.List(ctx, ids)\nreturn items, total, err\n"), "{code}");
    }
}

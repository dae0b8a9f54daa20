//! `client_struct_gen.go`: client options and the endpoint-backed structs
//! implementing each service interface.

use std::path::PathBuf;

use super::http_transport::{transport_pkg, write_option_setter};
use super::{
    ctx_name, field_name, method_params_as, method_results, param_names, GenContext, Generator, KIT_ENDPOINT,
};
use crate::diagnostic::CompilerError;
use crate::schema::{ServiceInterface, ServiceMethod, ServiceSpec};
use crate::writer::zero_value;

pub const FILENAME: &str = "client_struct_gen.go";

/// Constructor name of the client for `iface`.
pub fn constructor_name(spec: &ServiceSpec, iface: &ServiceInterface) -> String {
    if spec.interfaces.len() > 1 {
        format!("NewClient{}{}", spec.prefix(), iface.name_export)
    } else {
        format!("NewClient{}", spec.prefix())
    }
}

/// Unexported struct implementing `iface` over endpoints.
pub fn struct_name(iface: &ServiceInterface) -> String {
    format!("client{}", iface.name_export)
}

pub struct ClientStructGenerator<'s> {
    spec: &'s ServiceSpec,
}

impl<'s> ClientStructGenerator<'s> {
    pub fn new(spec: &'s ServiceSpec) -> Self {
        Self { spec }
    }

    fn write_aggregate(&self, ctx: &mut GenContext<'_, '_>) {
        let name = format!("{}Client", self.spec.name);
        let fields: Vec<(String, String)> = self
            .spec
            .interfaces
            .iter()
            .map(|iface| (format!("{}Client", iface.name_export), ctx.importer.type_string(&iface.ty)))
            .collect();
        ctx.out.write_type_struct(&name, &fields);

        ctx.out.w(format!(
            "func NewClient{}(tgt string, opts ...ClientOption) (*{name}, error) {{\n",
            self.spec.prefix()
        ));
        for iface in &self.spec.interfaces {
            ctx.out.w(format!(
                "{}Client, err := {}(tgt, opts...)\n",
                iface.name_unexport,
                constructor_name(self.spec, iface)
            ));
            ctx.out.write_check_err(|w| w.w("return nil, err\n"));
        }
        ctx.out.w(format!("return &{name}{{\n"));
        for iface in &self.spec.interfaces {
            ctx.out
                .w(format!("{}Client: {}Client,\n", iface.name_export, iface.name_unexport));
        }
        ctx.out.w("}, nil\n}\n\n");
    }

    fn write_options(&self, ctx: &mut GenContext<'_, '_>) {
        let endpoint = ctx.importer.import("endpoint", KIT_ENDPOINT);
        let transport = transport_pkg(ctx.importer, self.spec);
        let option_ty = format!("{transport}.ClientOption");
        let middleware_ty = format!("{endpoint}.Middleware");

        ctx.out.w("type ClientOption func(*clientOpts)\n\n");
        let mut fields = vec![
            ("genericClientOption".to_string(), format!("[]{option_ty}")),
            ("genericEndpointMiddleware".to_string(), format!("[]{middleware_ty}")),
        ];
        for (_, m) in self.spec.methods() {
            fields.push((format!("{}ClientOption", m.name_unexport), format!("[]{option_ty}")));
            fields.push((format!("{}EndpointMiddleware", m.name_unexport), format!("[]{middleware_ty}")));
        }
        ctx.out.write_type_struct("clientOpts", &fields);

        write_option_setter(ctx, "GenericClientOptions", &option_ty, "genericClientOption", "ClientOption", "clientOpts");
        write_option_setter(
            ctx,
            "GenericClientEndpointMiddlewares",
            &middleware_ty,
            "genericEndpointMiddleware",
            "ClientOption",
            "clientOpts",
        );
        for (_, m) in self.spec.methods() {
            write_option_setter(
                ctx,
                &format!("{}ClientOptions", m.name_export),
                &option_ty,
                &format!("{}ClientOption", m.name_unexport),
                "ClientOption",
                "clientOpts",
            );
            write_option_setter(
                ctx,
                &format!("{}ClientEndpointMiddlewares", m.name_export),
                &middleware_ty,
                &format!("{}EndpointMiddleware", m.name_unexport),
                "ClientOption",
                "clientOpts",
            );
        }
    }

    fn write_client(&self, ctx: &mut GenContext<'_, '_>, iface: &ServiceInterface) {
        let endpoint = ctx.importer.import("endpoint", KIT_ENDPOINT);
        let name = struct_name(iface);
        let fields: Vec<(String, String)> = iface
            .methods
            .iter()
            .map(|m| (format!("{}Endpoint", m.name_unexport), format!("{endpoint}.Endpoint")))
            .collect();
        ctx.out.write_type_struct(&name, &fields);
        for m in &iface.methods {
            self.write_method(ctx, &name, m);
        }
    }

    fn write_method(&self, ctx: &mut GenContext<'_, '_>, struct_name: &str, m: &ServiceMethod) {
        let results = method_results(ctx.importer, m);
        let call_ctx = if m.param_ctx.is_some() {
            ctx_name(m).to_string()
        } else {
            format!("{}.Background()", ctx.importer.import("context", "context"))
        };
        let zeros: Vec<String> = m.results.iter().map(|r| zero_value(ctx.importer, &r.ty)).collect();
        let response_ty = if m.results_named {
            Some(m.name_response.clone())
        } else {
            m.results.first().map(|r| ctx.importer.type_string(&r.ty))
        };

        let mut taken: Vec<String> = ["c", "resp", "err", "response"].map(String::from).to_vec();
        taken.push(m.name_request.clone());
        taken.extend(response_ty.iter().cloned());
        taken.extend(ctx.importer.import_names().map(str::to_string));
        let bound = param_names(m, &taken);
        let params = method_params_as(ctx.importer, m, &bound);
        let request = if m.params.is_empty() {
            "nil".to_string()
        } else {
            let pairs: Vec<String> = m
                .params
                .iter()
                .zip(&bound)
                .map(|(p, name)| format!("{}: {name}", field_name(&p.name)))
                .collect();
            format!("{}{{{}}}", m.name_request, pairs.join(", "))
        };
        let values: Vec<String> = if m.results_named {
            m.results.iter().map(|r| format!("response.{}", field_name(&r.name))).collect()
        } else if m.results.is_empty() {
            Vec::new()
        } else {
            vec!["response".to_string()]
        };
        let endpoint = format!("c.{}Endpoint", m.name_unexport);
        let has_err = m.return_err.is_some();

        ctx.out
            .write_func(&m.name, &format!("c *{struct_name}"), &params, &results, |w| {
                let resp = if response_ty.is_some() { "resp" } else { "_" };
                let err = if has_err { "err" } else { "_" };
                let op = if resp == "_" && err == "_" { "=" } else { ":=" };
                w.w(format!("{resp}, {err} {op} {endpoint}({call_ctx}, {request})\n"));
                if has_err {
                    w.write_check_err(|w| {
                        let mut out = zeros.clone();
                        out.push("err".to_string());
                        w.w(format!("return {}\n", out.join(", ")));
                    });
                }
                if let Some(ty) = &response_ty {
                    if has_err {
                        w.w(format!("response := resp.({ty})\n"));
                    } else {
                        w.w(format!("response, _ := resp.({ty})\n"));
                    }
                }
                let mut out = values.clone();
                if has_err {
                    out.push("nil".to_string());
                }
                if !out.is_empty() {
                    w.w(format!("return {}\n", out.join(", ")));
                }
            });
    }
}

impl Generator for ClientStructGenerator<'_> {
    fn name(&self) -> &'static str {
        "client struct"
    }

    fn filename(&self) -> &str {
        FILENAME
    }

    fn output_dir(&self) -> PathBuf {
        self.spec.site.base_dir.clone()
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError> {
        if self.spec.interfaces.len() > 1 {
            self.write_aggregate(ctx);
        }
        self.write_options(ctx);
        for iface in &self.spec.interfaces {
            self.write_client(ctx, iface);
        }
        Ok(())
    }
}

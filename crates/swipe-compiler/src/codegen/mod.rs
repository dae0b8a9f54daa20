//! Code generation from validated specs.
//!
//! Each generator emits (part of) one file:
//! - `endpoint_gen.go`        endpoint adapters, request/response structs, endpoint factories
//! - `http_gen.go`            error decoders, middleware chain, server options
//! - `logging_gen.go`         logging middleware
//! - `instrumenting_gen.go`   metrics middleware
//! - `server_gen.go`          REST or JSON-RPC server
//! - `client_struct_gen.go`   client struct and client options
//! - `client_gen.go`          REST or JSON-RPC Go client
//! - `client_jsonrpc_gen.js`  JSON-RPC JS client
//! - `jsonrpc_doc_gen.md`     JSON-RPC reference
//! - `openapi_gen.json`       OpenAPI 3 document
//! - `README.md`              service readme from a template
//! - `config_gen.go`          env/flag config loader
//! - `config_doc_gen.md`      config reference
//! - `gateway_gen.go`         load balancing gateway
//!
//! Generators write unindented text into a shared [`GoWriter`]; framing and
//! formatting happen once per file in [`crate::frame`].

pub mod client_struct;
pub mod config;
pub mod config_doc;
pub mod endpoint;
pub mod gateway;
pub mod http_transport;
pub mod instrumenting;
pub mod js_client;
pub mod jsonrpc_client;
pub mod jsonrpc_doc;
pub mod jsonrpc_server;
pub mod logging;
pub mod openapi;
pub mod readme;
pub mod rest_client;
pub mod rest_server;
pub mod runtime;
pub mod shape;

use std::path::PathBuf;

use crate::config::CompilerConfig;
use crate::diagnostic::CompilerError;
use crate::importer::{disambiguate, Importer};
use crate::schema::ServiceMethod;
use crate::types::{Universe, Var};
use crate::writer::GoWriter;

pub const KIT_ENDPOINT: &str = "github.com/go-kit/kit/endpoint";
pub const KIT_LOG: &str = "github.com/go-kit/kit/log";
pub const FFJSON: &str = "github.com/pquerna/ffjson/ffjson";

/// Everything a generator may touch while emitting one file.
pub struct GenContext<'a, 'u> {
    pub universe: &'u Universe,
    /// Import table of the target file, shared by every generator writing it.
    pub importer: &'a mut Importer<'u>,
    pub out: &'a mut GoWriter,
    pub config: &'a CompilerConfig,
}

/// A single-file emitter.
pub trait Generator {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    fn filename(&self) -> &str;

    /// Directory the file is written to.
    fn output_dir(&self) -> PathBuf;

    /// Loads external inputs, such as templates, before processing.
    fn prepare(&mut self, _config: &CompilerConfig) -> Result<(), CompilerError> {
        Ok(())
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError>;
}

/// Name of the context parameter as written in generated wrappers.
pub fn ctx_name(m: &ServiceMethod) -> &str {
    match &m.param_ctx {
        Some(p) if !p.name.is_empty() && p.name != "_" => &p.name,
        _ => "ctx",
    }
}

/// Names of the non-error results as bound in generated bodies.
pub fn result_names(m: &ServiceMethod) -> Vec<String> {
    if m.results_named {
        m.results.iter().map(|r| r.name.clone()).collect()
    } else {
        m.results.iter().map(|_| "result".to_string()).collect()
    }
}

/// Parameters of `m` including the context, with the variadic marker. The
/// non-context parameters are bound to `names` (see [`param_names`]).
pub fn method_params_as(imp: &mut Importer, m: &ServiceMethod, names: &[String]) -> Vec<(String, String)> {
    let mut params = Vec::with_capacity(m.params.len() + 1);
    if let Some(ctx) = &m.param_ctx {
        params.push((ctx_name(m).to_string(), imp.type_string(&ctx.ty)));
    }
    for (i, (p, name)) in m.params.iter().zip(names).enumerate() {
        params.push((name.clone(), param_type(imp, p, m.variadic && i + 1 == m.params.len())));
    }
    params
}

/// Parameter names for a generated method body that declares or references
/// `taken` (receiver, locals, package names). Clashing names get a suffix.
pub fn param_names(m: &ServiceMethod, taken: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(m.params.len());
    for (i, p) in m.params.iter().enumerate() {
        if p.name.is_empty() || p.name == "_" {
            names.push(p.name.clone());
            continue;
        }
        let name = disambiguate(&p.name, |n| {
            taken.iter().any(|t| t == n)
                || n == ctx_name(m)
                || names.iter().any(|x| x == n)
                || m.params.iter().enumerate().any(|(j, q)| j != i && q.name == n)
        });
        names.push(name);
    }
    names
}

/// Unnamed results of `m`, including the trailing error.
pub fn method_results(imp: &mut Importer, m: &ServiceMethod) -> Vec<(String, String)> {
    let mut results: Vec<(String, String)> = m
        .results
        .iter()
        .map(|r| (String::new(), imp.type_string(&r.ty)))
        .collect();
    if m.return_err.is_some() {
        results.push((String::new(), "error".to_string()));
    }
    results
}

/// Arguments forwarding a call to `m`, mapping each parameter with `arg`.
pub fn call_args(m: &ServiceMethod, mut arg: impl FnMut(&Var) -> String) -> Vec<String> {
    let mut args = Vec::with_capacity(m.params.len() + 1);
    if m.param_ctx.is_some() {
        args.push(ctx_name(m).to_string());
    }
    for (i, p) in m.params.iter().enumerate() {
        let mut value = arg(p);
        if m.variadic && i + 1 == m.params.len() {
            value.push_str("...");
        }
        args.push(value);
    }
    args
}

/// Arguments forwarding a call to `m` from a body whose parameters are
/// bound to `names`.
pub fn forward_args(m: &ServiceMethod, names: &[String]) -> Vec<String> {
    let mut names = names.iter();
    call_args(m, |_| names.next().cloned().unwrap_or_default())
}

fn param_type(imp: &mut Importer, p: &Var, variadic: bool) -> String {
    match (&p.ty, variadic) {
        (crate::types::Type::Slice(elem), true) => format!("...{}", imp.type_string(elem)),
        (ty, _) => imp.type_string(ty),
    }
}

/// `Name` of a request/response struct field for parameter `name`.
pub fn field_name(name: &str) -> String {
    crate::naming::uc_first(name)
}

pub(crate) fn generator_error(generator: &dyn Generator, message: impl Into<String>) -> CompilerError {
    CompilerError::generator(generator.name(), message)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Runs generators against in-memory modules.

    use super::*;
    use crate::option::{find_build_sites, OptionParser};
    use crate::schema::{self, SiteInfo, Spec};
    use crate::types::testing as types_testing;

    /// Loads the files and validates the single build site.
    pub fn spec(u: &Universe) -> Spec {
        let site = find_build_sites(u).remove(0);
        let root = OptionParser::new(u, site.file).parse_site(&site).unwrap();
        let info = SiteInfo {
            file: site.file,
            span: site.span.clone(),
            pkg_path: site.pkg_path.clone(),
            pkg_name: site.pkg_name.clone(),
            base_dir: site.dir.clone(),
            work_dir: u.module.root.clone(),
        };
        let spec = match root.name.as_str() {
            "Service" => schema::service::validate(u, info, &root).map(Spec::Service),
            "ConfigEnv" => schema::config::validate(u, info, &root).map(Spec::Config),
            _ => schema::gateway::validate(u, info, &root).map(Spec::Gateway),
        };
        match spec {
            Ok(spec) => spec,
            Err(errs) => panic!("validation failed: {errs:?}"),
        }
    }

    pub fn load(files: &[(&str, &str)]) -> Universe {
        types_testing::load(files)
    }

    /// Output of one generator with its import lines.
    pub fn render(u: &Universe, pkg_path: &str, generator: &dyn Generator) -> (String, Vec<String>) {
        let mut importer = Importer::new(u, pkg_path);
        let mut out = GoWriter::new();
        let config = CompilerConfig::default();
        let mut ctx = GenContext {
            universe: u,
            importer: &mut importer,
            out: &mut out,
            config: &config,
        };
        generator.process(&mut ctx).unwrap();
        (out.into_string(), importer.sorted_imports())
    }

    /// A build file wrapping `root` in `Build(...)`.
    pub fn swipe_file(root: &str) -> String {
        format!(
            "//go:build swipe\n\npackage app\n\nimport (\n\t\"net/http\"\n\n\t\"github.com/swipe-io/swipe/v2\"\n)\n\nvar _ = http.MethodGet\n\nfunc Swipe() {{\n\tswipe.Build(\n\t\tswipe.{root},\n\t)\n}}\n"
        )
    }

    pub const SERVICE: &str = concat!(
        "package app\n\n",
        "import (\n\t\"context\"\n\n\t\"github.com/google/uuid\"\n)\n\n",
        "type ErrUnauthorized struct{}\n\n",
        "func (ErrUnauthorized) Error() string { return \"unauthorized\" }\n\n",
        "func (ErrUnauthorized) StatusCode() int { return 401 }\n\n",
        "func (ErrUnauthorized) ErrorCode() int { return -32001 }\n\n",
        "type User struct {\n\tID uuid.UUID `json:\"id\"`\n\tName string `json:\"name\"`\n\tTags []string `json:\"tags\"`\n}\n\n",
        "// AppI is the application service.\n",
        "type AppI interface {\n",
        "\t// Get returns a user.\n",
        "\t// @fname first name\n",
        "\tGet(ctx context.Context, fname string, id int) (user User, err error)\n",
        "\tList(ctx context.Context, ids []uuid.UUID) (items []User, total int, err error)\n",
        "\tPing(ctx context.Context)\n",
        "}\n\n",
        "type svc struct{}\n\n",
        "func (svc) Get(ctx context.Context, fname string, id int) (User, error) { return User{}, ErrUnauthorized{} }\n\n",
        "func (svc) List(ctx context.Context, ids []uuid.UUID) (items []User, total int, err error) { return }\n\n",
        "func (svc) Ping(ctx context.Context) {}\n",
    );
}

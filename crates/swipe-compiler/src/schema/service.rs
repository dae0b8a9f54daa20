//! `Service(...)` validation.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::debug;

use super::errors::{self, ErrorCode};
use super::{path_vars, SiteInfo, VarPairs};
use crate::diagnostic::{CompilerError, Span};
use crate::frontend::go::ast::{Expr, ExprKind};
use crate::naming::{lc_first, to_camel, to_lower_camel};
use crate::option::{OptionNode, Value};
use crate::types::{FileRef, NamedId, Type, Universe, Var};

/// A function expression spliced into generated code, such as a custom
/// request decoder.
#[derive(Debug, Clone)]
pub struct FuncRef {
    pub expr: Expr,
    /// File the expression was written in; its imports qualify the
    /// expression.
    pub file: FileRef,
    pub ty: Option<Type>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientLang {
    Go,
    Js,
}

impl ClientLang {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "go" => Some(Self::Go),
            "js" => Some(Self::Js),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Transport {
    /// `HTTPServer()` was given.
    pub http_server: bool,
    /// `HTTPFast()`: fasthttp flavoured kit packages.
    pub fast: bool,
}

#[derive(Debug, Clone, Default)]
pub struct JsonRpcOptions {
    pub enable: bool,
    pub path: String,
    pub doc_enable: bool,
    pub doc_output: String,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct OpenapiInfo {
    pub title: String,
    pub description: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct OpenapiContact {
    pub name: String,
    pub email: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct OpenapiLicense {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct OpenapiServer {
    pub description: String,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct OpenapiOptions {
    pub enable: bool,
    pub output: String,
    pub info: OpenapiInfo,
    pub contact: Option<OpenapiContact>,
    pub license: Option<OpenapiLicense>,
    pub servers: Vec<OpenapiServer>,
    /// Tags by method name.
    pub method_tags: IndexMap<String, Vec<String>>,
    pub default_tags: Vec<String>,
    /// Extra error types by method name.
    pub method_errors: IndexMap<String, Vec<NamedId>>,
    pub default_errors: Vec<NamedId>,
}

impl OpenapiOptions {
    pub fn tags(&self, method: &str) -> &[String] {
        self.method_tags.get(method).map_or(&self.default_tags, Vec::as_slice)
    }

    pub fn errors(&self, method: &str) -> &[NamedId] {
        self.method_errors.get(method).map_or(&self.default_errors, Vec::as_slice)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadmeOptions {
    pub enable: bool,
    pub output: String,
    pub template_path: String,
}

#[derive(Debug, Clone, Default)]
pub struct InstrumentingOptions {
    pub namespace: String,
    pub subsystem: String,
}

/// Per-method transport and middleware settings.
#[derive(Debug, Clone, Default)]
pub struct MethodOption {
    pub exclude: bool,
    pub logging: bool,
    pub logging_includes: BTreeSet<String>,
    pub logging_excludes: BTreeSet<String>,
    /// Log key name to the context key expression.
    pub logging_context: IndexMap<String, FuncRef>,
    pub instrumenting: bool,
    /// HTTP verb, upper case.
    pub rest_method: Option<String>,
    pub rest_path: Option<String>,
    /// Path variable to regexp, in path order.
    pub path_vars: IndexMap<String, String>,
    pub query_vars: VarPairs,
    pub header_vars: VarPairs,
    /// JSON key the REST response is wrapped in.
    pub wrap_response: Option<String>,
    pub server_request_func: Option<FuncRef>,
    pub server_response_func: Option<FuncRef>,
    pub client_request_func: Option<FuncRef>,
    pub client_response_func: Option<FuncRef>,
}

/// A validated interface method.
#[derive(Debug, Clone)]
pub struct ServiceMethod {
    pub name: String,
    /// `<Iface><Method>`.
    pub name_export: String,
    /// `<iface><Method>`.
    pub name_unexport: String,
    pub lc_name: String,
    pub name_request: String,
    pub name_response: String,
    /// Parameters without the leading context.
    pub params: Vec<Var>,
    /// The last parameter is variadic.
    pub variadic: bool,
    /// Results without the trailing error.
    pub results: Vec<Var>,
    pub param_ctx: Option<Var>,
    pub return_err: Option<Var>,
    /// More than one non-error result, all named: a response struct is declared.
    pub results_named: bool,
    pub comments: Vec<String>,
    /// Error types the method can return, by code.
    pub errors: Vec<ErrorCode>,
    pub options: MethodOption,
    pub span: Span,
}

impl ServiceMethod {
    /// Default REST verb: `POST` when there is anything to send.
    pub fn http_method(&self) -> &str {
        match &self.options.rest_method {
            Some(m) => m,
            None if self.params.is_empty() => "GET",
            None => "POST",
        }
    }

    pub fn http_path(&self) -> String {
        self.options
            .rest_path
            .clone()
            .unwrap_or_else(|| format!("/{}", self.lc_name))
    }

    /// Parameters bound from the path, query or headers.
    pub fn is_bound_param(&self, name: &str) -> bool {
        self.options.path_vars.contains_key(name)
            || self.options.query_vars.contains_key(name)
            || self.options.header_vars.contains_key(name)
    }

    /// Parameters carried in the JSON body.
    pub fn body_params(&self) -> impl Iterator<Item = &Var> {
        self.params.iter().filter(|p| !self.is_bound_param(&p.name))
    }
}

/// A service interface with its generated names.
#[derive(Debug, Clone)]
pub struct ServiceInterface {
    pub named: NamedId,
    pub ty: Type,
    /// Camel-cased interface name.
    pub name: String,
    pub lc_name: String,
    pub name_export: String,
    pub name_unexport: String,
    /// The `ns` argument was set.
    pub is_name_change: bool,
    pub namespace: String,
    pub methods: Vec<ServiceMethod>,
    pub span: Span,
}

/// The validated `Service` option.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub site: SiteInfo,
    pub id: String,
    pub name: String,
    pub interfaces: Vec<ServiceInterface>,
    pub transport: Transport,
    pub jsonrpc: JsonRpcOptions,
    pub openapi: OpenapiOptions,
    pub readme: ReadmeOptions,
    pub clients: Vec<ClientLang>,
    pub instrumenting: InstrumentingOptions,
    pub default_error_encoder: Option<FuncRef>,
    /// Every error type with a code for the active transport.
    pub errors: Vec<ErrorCode>,
}

impl ServiceSpec {
    /// `REST` or `JSONRPC`; prefixes transport-specific generated names.
    pub fn prefix(&self) -> &'static str {
        if self.jsonrpc.enable {
            "JSONRPC"
        } else {
            "REST"
        }
    }

    pub fn go_client(&self) -> bool {
        self.clients.contains(&ClientLang::Go)
    }

    pub fn js_client(&self) -> bool {
        self.clients.contains(&ClientLang::Js)
    }

    pub fn methods(&self) -> impl Iterator<Item = (&ServiceInterface, &ServiceMethod)> {
        self.interfaces
            .iter()
            .flat_map(|iface| iface.methods.iter().map(move |m| (iface, m)))
    }

    pub fn any_logging(&self) -> bool {
        self.methods().any(|(_, m)| m.options.logging)
    }

    pub fn any_instrumenting(&self) -> bool {
        self.methods().any(|(_, m)| m.options.instrumenting)
    }

    pub fn error(&self, id: NamedId) -> Option<&ErrorCode> {
        self.errors.iter().find(|e| e.named == id)
    }
}

/// Validates a `Service` option tree.
pub fn validate(universe: &Universe, site: SiteInfo, node: &OptionNode) -> Result<ServiceSpec, Vec<CompilerError>> {
    ServiceValidator {
        universe,
        file: site.file,
        errors: Vec::new(),
    }
    .run(site, node)
}

struct ServiceValidator<'u> {
    universe: &'u Universe,
    file: FileRef,
    errors: Vec<CompilerError>,
}

impl<'u> ServiceValidator<'u> {
    fn run(mut self, site: SiteInfo, node: &OptionNode) -> Result<ServiceSpec, Vec<CompilerError>> {
        let name = site
            .work_dir
            .file_name()
            .map(|n| to_camel(&n.to_string_lossy()))
            .unwrap_or_default();

        let jsonrpc = self.jsonrpc(node);
        let openapi = self.openapi(node);
        let readme = self.readme(node);
        let instrumenting = self.instrumenting(node);
        let clients = self.clients(node);

        let transport = Transport {
            http_server: node.exists("HTTPServer"),
            fast: node.exists("HTTPFast"),
        };
        let default_error_encoder = node
            .get("DefaultErrorEncoder")
            .and_then(|n| self.func_ref(n));

        let code_method = errors::code_method(jsonrpc.enable);
        let known = errors::discover(self.universe, code_method);
        let generic = errors::generic(self.universe, &known);

        let base = self.service_level_options(node);
        let defaults = match node.get("MethodDefaultOptions") {
            Some(n) => self.method_options(n, base),
            None => base,
        };
        let overrides = self.method_overrides(node, &defaults);

        let ifaces = node.slice("Interface");
        let mut interfaces = Vec::new();
        for iface_node in ifaces {
            match self.interface(iface_node, ifaces.len(), &defaults, &overrides, &known, &generic) {
                Ok(iface) if !iface.methods.is_empty() => interfaces.push(iface),
                Ok(_) => {}
                Err(e) => self.errors.push(e),
            }
        }
        if ifaces.is_empty() {
            self.errors
                .push(CompilerError::shape(&node.span, "Service: missing required option Interface"));
        }

        for ((id, method), (_, span)) in &overrides {
            if !interfaces.iter().any(|i| i.named == *id) {
                let iface = &self.universe.named(*id).name;
                self.errors.push(CompilerError::shape(
                    span,
                    format!("MethodOptions: {iface}.{method} is not a method of a declared Interface"),
                ));
            }
        }

        if !self.errors.is_empty() {
            self.errors.sort_by(|a, b| a.span().cmp(&b.span()));
            return Err(self.errors);
        }

        debug!(
            interfaces = interfaces.len(),
            errors = known.len(),
            jsonrpc = jsonrpc.enable,
            "validated Service"
        );
        Ok(ServiceSpec {
            site,
            id: name.clone(),
            name,
            interfaces,
            transport,
            jsonrpc,
            openapi,
            readme,
            clients,
            instrumenting,
            default_error_encoder,
            errors: errors::sorted(known.values()),
        })
    }

    fn record<T>(&mut self, result: Result<T, CompilerError>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    fn string(&mut self, node: &OptionNode, key: &str) -> String {
        self.record(node.string(key)).flatten().unwrap_or_default()
    }

    fn leaf_string(&mut self, node: &OptionNode) -> String {
        match node.require_value() {
            Ok(v) => match v.as_str() {
                Some(s) => s.to_string(),
                None => {
                    self.errors
                        .push(CompilerError::shape(&v.span, format!("{}: must be a constant string", node.name)));
                    String::new()
                }
            },
            Err(e) => {
                self.errors.push(e);
                String::new()
            }
        }
    }

    fn jsonrpc(&mut self, node: &OptionNode) -> JsonRpcOptions {
        let path = node.get("JSONRPCPath").map(|n| self.leaf_string(n));
        let doc_output = node.get("JSONRPCDocOutput").map(|n| self.leaf_string(n));
        JsonRpcOptions {
            enable: node.exists("JSONRPCEnable"),
            path: path.unwrap_or_else(|| "/rpc".to_string()),
            doc_enable: node.exists("JSONRPCDocEnable"),
            doc_output: doc_output.unwrap_or_default(),
        }
    }

    fn readme(&mut self, node: &OptionNode) -> ReadmeOptions {
        let output = node.get("ReadmeOutput").map(|n| self.leaf_string(n));
        let template_path = node.get("ReadmeTemplatePath").map(|n| self.leaf_string(n));
        ReadmeOptions {
            enable: node.exists("ReadmeEnable"),
            output: output.unwrap_or_default(),
            template_path: template_path.unwrap_or_default(),
        }
    }

    fn instrumenting(&mut self, node: &OptionNode) -> InstrumentingOptions {
        let Some(inst) = node.get("Instrumenting") else {
            return InstrumentingOptions::default();
        };
        let namespace = inst.get("Namespace").map(|n| self.leaf_string(n));
        let subsystem = inst.get("Subsystem").map(|n| self.leaf_string(n));
        InstrumentingOptions {
            namespace: namespace.unwrap_or_default(),
            subsystem: subsystem.unwrap_or_default(),
        }
    }

    fn clients(&mut self, node: &OptionNode) -> Vec<ClientLang> {
        let Some(clients) = node.get("ClientsEnable") else {
            return Vec::new();
        };
        let Some(value) = self.record(clients.require_value()) else {
            return Vec::new();
        };
        let Some(langs) = value.string_slice() else {
            self.errors.push(CompilerError::shape(
                &value.span,
                "ClientsEnable: must be a []string literal",
            ));
            return Vec::new();
        };
        let mut out = Vec::new();
        for lang in langs {
            match ClientLang::parse(lang) {
                Some(l) if !out.contains(&l) => out.push(l),
                Some(_) => {}
                None => self.errors.push(CompilerError::semantic(
                    &value.span,
                    format!("ClientsEnable: unknown client language {lang:?}, expected go or js"),
                )),
            }
        }
        out
    }

    fn openapi(&mut self, node: &OptionNode) -> OpenapiOptions {
        let mut opts = OpenapiOptions {
            enable: node.exists("OpenapiEnable"),
            ..OpenapiOptions::default()
        };
        opts.output = node
            .get("OpenapiOutput")
            .map(|n| self.leaf_string(n))
            .unwrap_or_else(|| "./".to_string());
        if let Some(info) = node.get("OpenapiInfo") {
            opts.info = OpenapiInfo {
                title: self.string(info, "title"),
                description: self.string(info, "description"),
                version: self.string(info, "version"),
            };
        }
        if let Some(contact) = node.get("OpenapiContact") {
            opts.contact = Some(OpenapiContact {
                name: self.string(contact, "name"),
                email: self.string(contact, "email"),
                url: self.string(contact, "url"),
            });
        }
        if let Some(license) = node.get("OpenapiLicence") {
            opts.license = Some(OpenapiLicense {
                name: self.string(license, "name"),
                url: self.string(license, "url"),
            });
        }
        for server in node.slice("OpenapiServer") {
            opts.servers.push(OpenapiServer {
                description: self.string(server, "description"),
                url: self.string(server, "url"),
            });
        }
        for tags_node in node.slice("OpenapiTags") {
            let methods = self.method_names(tags_node);
            let tags = tags_node
                .get("tags")
                .and_then(|n| n.value.as_ref())
                .and_then(|v| v.string_slice())
                .map(<[String]>::to_vec)
                .unwrap_or_default();
            if methods.is_empty() {
                opts.default_tags.extend(tags);
            } else {
                for method in methods {
                    opts.method_tags.entry(method).or_default().extend(tags.iter().cloned());
                }
            }
        }
        for errors_node in node.slice("OpenapiErrors") {
            let methods = self.method_names(errors_node);
            let mut types = Vec::new();
            if let Some(value) = errors_node.get("errors").and_then(|n| n.value.as_ref()) {
                for expr in value.expr_slice().unwrap_or_default() {
                    match self.universe.type_of(self.file, expr).and_then(|t| t.deref().as_named()) {
                        Some(id) => types.push(id),
                        None => self.errors.push(CompilerError::shape(
                            &expr.span,
                            "OpenapiErrors: errors must be values of named error types",
                        )),
                    }
                }
            }
            if methods.is_empty() {
                opts.default_errors.extend(types);
            } else {
                for method in methods {
                    opts.method_errors.entry(method).or_default().extend(types.iter().copied());
                }
            }
        }
        opts
    }

    /// Method names of an `OpenapiTags`/`OpenapiErrors` `methods` list.
    fn method_names(&mut self, node: &OptionNode) -> Vec<String> {
        let Some(methods) = node.get("methods") else {
            return Vec::new();
        };
        let Some(value) = &methods.value else {
            return Vec::new();
        };
        let mut names = Vec::new();
        for expr in value.expr_slice().unwrap_or_default() {
            match &expr.unparen().kind {
                ExprKind::Selector { sel, .. } => names.push(sel.name.clone()),
                _ => self.errors.push(CompilerError::shape(
                    &expr.span,
                    format!("the {} value must be func selector", methods.name),
                )),
            }
        }
        names
    }

    /// `Logging`/`Instrumenting` given directly to `Service` enable the
    /// middleware for every method.
    fn service_level_options(&mut self, node: &OptionNode) -> MethodOption {
        let mut base = MethodOption::default();
        if let Some(on) = self.record(node.flag("Logging")).flatten() {
            base.logging = on;
        }
        if let Some(on) = self.record(node.flag("Instrumenting")).flatten() {
            base.instrumenting = on;
        }
        base
    }

    fn method_overrides(
        &mut self,
        node: &OptionNode,
        defaults: &MethodOption,
    ) -> IndexMap<(NamedId, String), (MethodOption, Span)> {
        let mut overrides = IndexMap::new();
        for method_node in node.slice("MethodOptions") {
            let Some(signature) = self.record(method_node.require("signature")) else {
                continue;
            };
            let Some(value) = self.record(signature.require_value()) else {
                continue;
            };
            let Some(key) = self.record(method_selector(self.universe, self.file, value)) else {
                continue;
            };
            let opts = self.method_options(method_node, defaults.clone());
            overrides.insert(key, (opts, value.span.clone()));
        }
        overrides
    }

    fn method_options(&mut self, node: &OptionNode, mut opts: MethodOption) -> MethodOption {
        if let Some(on) = self.record(node.flag("Exclude")).flatten() {
            opts.exclude = on;
        }
        if let Some(on) = self.record(node.flag("Logging")).flatten() {
            opts.logging = on;
        }
        if let Some(params) = node.get("LoggingParams") {
            opts.logging_includes = string_set(params.get("includes"));
            opts.logging_excludes = string_set(params.get("excludes"));
        }
        opts.logging_context.clear();
        for ctx in node.slice("LoggingContext") {
            let name = self.string(ctx, "name");
            if let Some(key) = ctx.get("key").and_then(|k| self.func_ref(k)) {
                opts.logging_context.insert(name, key);
            }
        }
        if let Some(on) = self.record(node.flag("Instrumenting")).flatten() {
            opts.instrumenting = on;
        }
        for wrap in ["RESTWrapResponse", "WrapResponse"] {
            if let Some(n) = node.get(wrap) {
                opts.wrap_response = Some(self.leaf_string(n));
            }
        }
        if let Some(method) = node.get("RESTMethod") {
            if let Some(value) = self.record(method.require_value()) {
                match http_method(value) {
                    Some(m) => opts.rest_method = Some(m),
                    None => self.errors.push(CompilerError::shape(
                        &value.span,
                        "RESTMethod: must be a string constant such as http.MethodPost",
                    )),
                }
            }
        }
        if let Some(path_node) = node.get("RESTPath") {
            let path = self.leaf_string(path_node);
            match path_vars::parse(&path) {
                Ok(vars) => opts.path_vars = vars,
                Err(message) => self.errors.push(CompilerError::semantic(&path_node.span, message)),
            }
            opts.rest_path = Some(path);
        }
        let funcs: [(&str, &mut Option<FuncRef>); 4] = [
            ("ServerDecodeRequestFunc", &mut opts.server_request_func),
            ("ServerEncodeResponseFunc", &mut opts.server_response_func),
            ("ClientEncodeRequestFunc", &mut opts.client_request_func),
            ("ClientDecodeResponseFunc", &mut opts.client_response_func),
        ];
        for (key, slot) in funcs {
            if let Some(n) = node.get(key) {
                *slot = self.func_ref(n);
            }
        }
        if let Some(n) = node.get("RESTQueryVars") {
            opts.query_vars = self.var_pairs(n);
        }
        if let Some(n) = node.get("RESTHeaderVars") {
            opts.header_vars = self.var_pairs(n);
        }
        opts
    }

    fn var_pairs(&mut self, node: &OptionNode) -> VarPairs {
        let Some(value) = self.record(node.require_value()) else {
            return VarPairs::new();
        };
        let Some(values) = value.string_slice() else {
            self.errors
                .push(CompilerError::shape(&value.span, format!("{}: must be a []string literal", node.name)));
            return VarPairs::new();
        };
        if values.len() % 2 != 0 {
            self.errors.push(CompilerError::semantic(
                &value.span,
                format!("{}: expected pairs of parameter and name, got {} values", node.name, values.len()),
            ));
            return VarPairs::new();
        }
        values
            .chunks(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect()
    }

    fn func_ref(&mut self, node: &OptionNode) -> Option<FuncRef> {
        let value = self.record(node.require_value())?;
        Some(FuncRef {
            expr: value.expr.clone(),
            file: self.file,
            ty: value.ty.clone(),
        })
    }

    fn interface(
        &mut self,
        node: &OptionNode,
        count: usize,
        defaults: &MethodOption,
        overrides: &IndexMap<(NamedId, String), (MethodOption, Span)>,
        known: &IndexMap<NamedId, ErrorCode>,
        generic: &[NamedId],
    ) -> Result<ServiceInterface, CompilerError> {
        let iface_value = node.require("iface")?.require_value()?;
        let id = interface_ref(self.universe, self.file, iface_value)?;
        let ns = node.string("ns")?.unwrap_or_default();
        let named = self.universe.named(id);
        let Type::Interface(iface_type) = &named.underlying else {
            return Err(not_an_interface(iface_value, &named.name));
        };

        let name = to_camel(&named.name);
        let lc_name = to_lower_camel(&name);
        let (name_export, name_unexport) = if ns.is_empty() {
            (name.clone(), lc_name.clone())
        } else {
            (to_camel(&ns), to_lower_camel(&ns))
        };

        let mut methods = Vec::new();
        for method in &iface_type.methods {
            let options = overrides
                .get(&(id, method.name.clone()))
                .map(|(o, _)| o.clone())
                .unwrap_or_else(|| defaults.clone());
            if options.exclude {
                continue;
            }
            let mut codes: IndexMap<NamedId, ErrorCode> = IndexMap::new();
            let reachable = errors::for_method(self.universe, iface_type, &method.name, known);
            for err in generic.iter().chain(&reachable) {
                if let Some(code) = known.get(err) {
                    codes.entry(*err).or_insert_with(|| code.clone());
                }
            }
            let mut service_method = split_signature(self.universe, &method.sig, &method.span)?;
            service_method.name = method.name.clone();
            service_method.name_export = format!("{name}{}", method.name);
            service_method.name_unexport = format!("{lc_name}{}", method.name);
            service_method.lc_name = lc_first(&method.name);
            let prefix = if count > 1 { name.as_str() } else { "" };
            service_method.name_request = format!("{prefix}{}Request", method.name);
            service_method.name_response = format!("{prefix}{}Response", method.name);
            service_method.comments = method.doc.clone();
            service_method.errors = errors::sorted(codes.values());
            service_method.options = options;
            methods.push(service_method);
        }

        Ok(ServiceInterface {
            named: id,
            ty: Type::Named(id),
            name,
            lc_name,
            name_export,
            name_unexport,
            is_name_change: !ns.is_empty(),
            namespace: ns,
            methods,
            span: node.span.clone(),
        })
    }
}

/// Splits a method signature into its context, positional and error slots.
pub fn split_signature(
    universe: &Universe,
    sig: &crate::types::Signature,
    span: &Span,
) -> Result<ServiceMethod, CompilerError> {
    let mut params = sig.params.clone();
    let param_ctx = match params.first() {
        Some(p) if universe.is_context(&p.ty) => Some(params.remove(0)),
        _ => None,
    };
    for (i, p) in params.iter_mut().enumerate() {
        if p.name.is_empty() || p.name == "_" {
            p.name = format!("p{i}");
        }
    }
    let mut results = sig.results.clone();
    let return_err = match results.last() {
        Some(r) if universe.is_error(&r.ty) => results.pop(),
        _ => None,
    };
    let all_named = results.iter().all(|r| !r.name.is_empty() && r.name != "_");
    let results_named = all_named && results.len() > 1;
    if !results_named && results.len() > 1 {
        return Err(CompilerError::semantic(
            span,
            "interface method with unnamed results cannot be greater than 1",
        ));
    }
    Ok(ServiceMethod {
        name: String::new(),
        name_export: String::new(),
        name_unexport: String::new(),
        lc_name: String::new(),
        name_request: String::new(),
        name_response: String::new(),
        params,
        variadic: sig.variadic,
        results,
        param_ctx,
        return_err,
        results_named,
        comments: Vec::new(),
        errors: Vec::new(),
        options: MethodOption::default(),
        span: span.clone(),
    })
}

/// Resolves `(*Iface)(nil)` to the named interface.
pub fn interface_ref(universe: &Universe, file: FileRef, value: &Value) -> Result<NamedId, CompilerError> {
    let ty = match &value.ty {
        Some(ty) => Some(ty.clone()),
        None => match &value.expr.unparen().kind {
            ExprKind::Call { fun, .. } => universe.resolve_type(file, fun).ok(),
            _ => None,
        },
    };
    let found = ty.as_ref().map(|t| universe.type_name(t)).unwrap_or_else(|| value.source());
    match ty {
        Some(Type::Pointer(elem)) => match elem.as_named() {
            Some(id) if matches!(universe.named(id).underlying, Type::Interface(_)) => Ok(id),
            _ => Err(not_an_interface(value, &found)),
        },
        _ => Err(not_an_interface(value, &found)),
    }
}

fn not_an_interface(value: &Value, found: &str) -> CompilerError {
    CompilerError::shape(
        &value.span,
        format!("the iface option must be a pointer to an interface type; found {found}"),
    )
}

/// Resolves an `Iface.Method` selector.
pub fn method_selector(universe: &Universe, file: FileRef, value: &Value) -> Result<(NamedId, String), CompilerError> {
    let ExprKind::Selector { x, sel } = &value.expr.unparen().kind else {
        return Err(CompilerError::shape(&value.span, "the signature must be selector"));
    };
    let id = universe
        .resolve_type(file, x)
        .ok()
        .and_then(|t| t.as_named())
        .ok_or_else(|| CompilerError::shape(&value.span, "the signature must be an interface method selector"))?;
    let Type::Interface(iface) = &universe.named(id).underlying else {
        return Err(CompilerError::shape(&value.span, "the signature must be an interface method selector"));
    };
    if iface.method(&sel.name).is_none() {
        return Err(CompilerError::shape(
            &sel.span,
            format!("{} has no method {}", universe.named(id).name, sel.name),
        ));
    }
    Ok((id, sel.name.clone()))
}

/// `"POST"` or `http.MethodPost`.
fn http_method(value: &Value) -> Option<String> {
    if let Some(s) = value.as_str() {
        return Some(s.to_uppercase());
    }
    match &value.expr.unparen().kind {
        ExprKind::Selector { sel, .. } => sel.name.strip_prefix("Method").map(str::to_uppercase),
        _ => None,
    }
}

fn string_set(node: Option<&OptionNode>) -> BTreeSet<String> {
    node.and_then(|n| n.value.as_ref())
        .and_then(|v| v.string_slice())
        .map(|s| s.iter().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::{find_build_sites, OptionParser};
    use crate::types::testing;
    use std::path::PathBuf;

    const SERVICE: &str = concat!(
        "package app\n\n",
        "import \"context\"\n\n",
        "type ErrUnauthorized struct{}\n\n",
        "func (ErrUnauthorized) Error() string { return \"unauthorized\" }\n\n",
        "func (ErrUnauthorized) StatusCode() int { return 401 }\n\n",
        "func (ErrUnauthorized) ErrorCode() int { return -32001 }\n\n",
        "type AppI interface {\n",
        "\t// Get returns a user.\n",
        "\tGet(ctx context.Context, fname string, id int) (name string, err error)\n",
        "\tList(ctx context.Context) (items []string, total int, err error)\n",
        "\tPing()\n",
        "}\n\n",
        "type svc struct{}\n\n",
        "func (svc) Get(ctx context.Context, fname string, id int) (string, error) { return \"\", ErrUnauthorized{} }\n\n",
        "func (svc) List(ctx context.Context) (items []string, total int, err error) { return }\n\n",
        "func (svc) Ping() {}\n",
    );

    fn validate_src(swipe: &str) -> Result<ServiceSpec, Vec<CompilerError>> {
        let u = testing::load(&[("app/service.go", SERVICE), ("app/swipe.go", swipe)]);
        let site = find_build_sites(&u).remove(0);
        let root = OptionParser::new(&u, site.file).parse_site(&site).unwrap();
        let info = SiteInfo {
            file: site.file,
            span: site.span.clone(),
            pkg_path: site.pkg_path.clone(),
            pkg_name: site.pkg_name.clone(),
            base_dir: site.dir.clone(),
            work_dir: PathBuf::from("/m/my_app"),
        };
        validate(&u, info, &root)
    }

    fn swipe(opts: &str) -> String {
        format!(
            "package app\n\nimport (\n\t\"net/http\"\n\n\t\"github.com/swipe-io/swipe/v2\"\n)\n\nfunc Swipe() {{\n\tswipe.Build(swipe.Service({opts}))\n}}\n"
        )
    }

    #[test]
    fn test_rest_single_interface() {
        let spec = validate_src(&swipe(
            "swipe.Interface((*AppI)(nil), \"\"), swipe.HTTPServer(), swipe.MethodOptions(AppI.Get, swipe.RESTPath(\"/get/{fname}\"), swipe.RESTMethod(http.MethodPost))",
        ))
        .unwrap();
        assert_eq!(spec.name, "MyApp");
        assert_eq!(spec.prefix(), "REST");
        assert!(spec.transport.http_server);
        let iface = &spec.interfaces[0];
        assert_eq!(iface.name_export, "AppI");
        assert_eq!(iface.name_unexport, "appI");

        let get = iface.methods.iter().find(|m| m.name == "Get").unwrap();
        assert!(get.param_ctx.is_some());
        assert!(get.return_err.is_some());
        assert!(!get.results_named);
        assert_eq!(get.name_request, "GetRequest");
        assert_eq!(get.name_export, "AppIGet");
        assert_eq!(get.http_method(), "POST");
        assert_eq!(get.http_path(), "/get/{fname}");
        assert!(get.options.path_vars.contains_key("fname"));
        assert_eq!(get.comments, ["Get returns a user."]);
        assert_eq!(get.errors.len(), 1);
        assert_eq!(get.errors[0].code, 401);

        let list = iface.methods.iter().find(|m| m.name == "List").unwrap();
        assert!(list.results_named);
        assert_eq!(list.http_method(), "GET");
        assert_eq!(list.http_path(), "/list");
    }

    #[test]
    fn test_jsonrpc_namespaces_and_codes() {
        let spec = validate_src(&swipe(
            "swipe.Interface((*AppI)(nil), \"app\"), swipe.HTTPServer(), swipe.JSONRPCEnable(), swipe.JSONRPCPath(\"/rpc\")",
        ))
        .unwrap();
        assert_eq!(spec.prefix(), "JSONRPC");
        assert_eq!(spec.jsonrpc.path, "/rpc");
        assert_eq!(spec.errors[0].code, -32001);
        let iface = &spec.interfaces[0];
        assert!(iface.is_name_change);
        assert_eq!(iface.name_export, "App");
    }

    #[test]
    fn test_method_defaults_merge() {
        let spec = validate_src(&swipe(
            "swipe.Interface((*AppI)(nil), \"\"), swipe.MethodOptions(AppI.Get, swipe.Logging(true), swipe.LoggingParams([]string{}, []string{\"id\"})), swipe.MethodOptions(AppI.Ping, swipe.Exclude(true)), swipe.MethodDefaultOptions(swipe.Instrumenting(true))",
        ))
        .unwrap();
        let methods = &spec.interfaces[0].methods;
        assert_eq!(methods.len(), 2);
        let get = &methods[0];
        assert!(get.options.logging && get.options.instrumenting);
        assert!(get.options.logging_excludes.contains("id"));
        assert!(!methods[1].options.logging && methods[1].options.instrumenting);
    }

    #[test]
    fn test_validation_errors() {
        let errs = validate_src(&swipe(
            "swipe.Interface((*ErrUnauthorized)(nil), \"\"), swipe.ClientsEnable([]string{\"rust\"})",
        ))
        .unwrap_err();
        let messages: Vec<String> = errs.iter().map(ToString::to_string).collect();
        assert!(messages.iter().any(|m| m.contains("must be a pointer to an interface type")));
        assert!(messages.iter().any(|m| m.contains("unknown client language \"rust\"")));

        let errs = validate_src(&swipe(
            "swipe.Interface((*AppI)(nil), \"\"), swipe.MethodOptions(AppI.Get, swipe.RESTPath(\"/a/{id\"), swipe.RESTQueryVars([]string{\"a\"}))",
        ))
        .unwrap_err();
        let messages: Vec<String> = errs.iter().map(ToString::to_string).collect();
        assert!(messages.iter().any(|m| m.contains("mux: unbalanced braces in \"/a/{id\"")));
        assert!(messages.iter().any(|m| m.contains("expected pairs")));
    }

    #[test]
    fn test_unnamed_results_rejected() {
        let u = testing::load(&[
            ("app/a.go", "package app\n\ntype Bad interface {\n\tTwo() (int, string)\n}\n"),
            (
                "app/swipe.go",
                "package app\n\nimport \"github.com/swipe-io/swipe/v2\"\n\nfunc Swipe() {\n\tswipe.Build(swipe.Service(swipe.Interface((*Bad)(nil), \"\")))\n}\n",
            ),
        ]);
        let site = find_build_sites(&u).remove(0);
        let root = OptionParser::new(&u, site.file).parse_site(&site).unwrap();
        let info = SiteInfo {
            file: site.file,
            span: site.span.clone(),
            pkg_path: site.pkg_path.clone(),
            pkg_name: site.pkg_name.clone(),
            base_dir: site.dir.clone(),
            work_dir: PathBuf::from("/m"),
        };
        let errs = validate(&u, info, &root).unwrap_err();
        assert!(errs[0]
            .to_string()
            .contains("interface method with unnamed results cannot be greater than 1"));
    }
}

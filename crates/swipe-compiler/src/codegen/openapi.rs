//! `openapi_gen.json`: an OpenAPI 3 document for the REST or JSON-RPC
//! transport.

use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::{json, Value};

use super::jsonrpc_server::rpc_method_name;
use super::rest_server::{has_body, route_path};
use super::shape::{collect_named, is_documented, is_raw_message, json_fields, MethodDoc};
use super::{generator_error, GenContext, Generator};
use crate::diagnostic::CompilerError;
use crate::naming::to_lower_camel;
use crate::schema::path_vars::strip_regexps;
use crate::schema::{
    ErrorCode, OpenapiContact, OpenapiLicense, OpenapiServer, ServiceInterface, ServiceMethod, ServiceSpec,
};
use crate::types::{BasicKind, ConstValue, NamedId, Type, Universe, Var};

pub const FILENAME: &str = "openapi_gen.json";

const EXAMPLE_ID: &str = "c9b14c57-7503-447a-9fb9-be6f8920f31f";

#[derive(Debug, Default, Serialize)]
pub struct Document {
    pub openapi: &'static str,
    pub info: Info,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<OpenapiServer>,
    pub paths: IndexMap<String, PathItem>,
    pub components: Components,
}

#[derive(Debug, Default, Serialize)]
pub struct Info {
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<OpenapiContact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<OpenapiLicense>,
}

#[derive(Debug, Default, Serialize)]
pub struct Components {
    pub schemas: IndexMap<String, Schema>,
}

#[derive(Debug, Default, Serialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
}

impl PathItem {
    fn set(&mut self, verb: &str, op: Operation) {
        let slot = match verb {
            "POST" => &mut self.post,
            "PUT" => &mut self.put,
            "PATCH" => &mut self.patch,
            "DELETE" => &mut self.delete,
            _ => &mut self.get,
        };
        *slot = Some(op);
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: IndexMap<String, Response>,
}

#[derive(Debug, Serialize)]
pub struct Parameter {
    #[serde(rename = "in")]
    pub location: &'static str,
    pub name: String,
    pub required: bool,
    pub schema: Schema,
}

#[derive(Debug, Serialize)]
pub struct RequestBody {
    pub required: bool,
    pub content: IndexMap<&'static str, Media>,
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub description: String,
    pub content: IndexMap<&'static str, Media>,
}

#[derive(Debug, Serialize)]
pub struct Media {
    pub schema: Schema,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "$ref", skip_serializing_if = "String::is_empty")]
    pub reference: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub ty: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub format: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

impl Schema {
    fn typed(ty: &str) -> Self {
        Self {
            ty: ty.to_string(),
            ..Self::default()
        }
    }

    fn formatted(ty: &str, format: &str) -> Self {
        Self {
            format: format.to_string(),
            ..Self::typed(ty)
        }
    }

    fn object(properties: IndexMap<String, Schema>) -> Self {
        Self {
            properties: Some(properties),
            ..Self::typed("object")
        }
    }

    fn reference(name: &str) -> Self {
        Self {
            reference: format!("#/components/schemas/{name}"),
            ..Self::default()
        }
    }

    fn example(mut self, value: Value) -> Self {
        self.example = Some(value);
        self
    }
}

fn json_media(schema: Schema) -> IndexMap<&'static str, Media> {
    IndexMap::from([("application/json", Media { schema })])
}

fn response(description: impl Into<String>, schema: Schema) -> Response {
    Response {
        description: description.into(),
        content: json_media(schema),
    }
}

/// Schema of a value of type `ty`; documented named types are referenced.
pub fn type_schema(u: &Universe, ty: &Type) -> Schema {
    match ty {
        Type::Pointer(elem) => type_schema(u, elem),
        Type::Slice(elem) if matches!(**elem, Type::Basic(BasicKind::Byte | BasicKind::Uint8)) => {
            Schema::formatted("string", "byte")
        }
        Type::Slice(elem) | Type::Array(_, elem) => Schema {
            items: Some(Box::new(type_schema(u, elem))),
            ..Schema::typed("array")
        },
        Type::Map(_, value) => Schema {
            additional_properties: Some(Box::new(type_schema(u, value))),
            ..Schema::typed("object")
        },
        Type::Named(id) => {
            if is_raw_message(u, ty) {
                Schema::object(IndexMap::new())
            } else if u.is_time(ty) {
                Schema::formatted("string", "date-time").example(json!("1985-04-02T01:30:00.00Z"))
            } else if u.is_uuid(ty) {
                Schema::formatted("string", "uuid").example(json!("d5c02d83-6fbc-4dd7-8416-9f85ed80de46"))
            } else if is_documented(u, *id) {
                Schema::reference(&u.named(*id).name)
            } else {
                type_schema(u, &u.named(*id).underlying)
            }
        }
        Type::Basic(kind) => basic_schema(*kind),
        _ => Schema::typed("object"),
    }
}

fn basic_schema(kind: BasicKind) -> Schema {
    if kind.is_bool() {
        Schema::typed("boolean")
    } else if kind.is_integer() {
        let format = if kind.bit_size() == 64 { "int64" } else { "int32" };
        Schema::formatted("integer", format)
    } else if kind.is_float() {
        let format = if kind.bit_size() == 32 { "float" } else { "double" };
        Schema::formatted("number", format)
    } else {
        Schema::typed("string")
    }
}

/// Component schema of a documented named type.
fn definition(u: &Universe, id: NamedId) -> Schema {
    let named = u.named(id);
    let ty = Type::Named(id);
    match &named.underlying {
        Type::Struct(_) => {
            let properties = json_fields(u, &ty)
                .into_iter()
                .map(|field| {
                    let mut schema = type_schema(u, &field.var.ty);
                    if let Some(owner) = field.owner {
                        schema.description = u.comments.field_text(owner, &field.var.name);
                    }
                    (field.name, schema)
                })
                .collect();
            Schema {
                description: named.doc.join(" "),
                ..Schema::object(properties)
            }
        }
        underlying => {
            let mut schema = type_schema(u, underlying);
            schema.description = named.doc.join(" ");
            if let Some(members) = u.enums.get(&id) {
                schema.enum_values = members.iter().map(|m| const_json(&m.value)).collect();
            }
            schema
        }
    }
}

fn const_json(value: &ConstValue) -> Value {
    match value {
        ConstValue::Bool(b) => json!(b),
        ConstValue::Int(v) => i64::try_from(*v).map_or_else(|_| json!(v.to_string()), |v| json!(v)),
        ConstValue::Float(v) => json!(v),
        ConstValue::String(s) => json!(s),
    }
}

fn jsonrpc_envelope(extra: (&str, Schema)) -> Schema {
    let mut properties = IndexMap::new();
    properties.insert("jsonrpc".to_string(), Schema::typed("string").example(json!("2.0")));
    properties.insert("id".to_string(), Schema::typed("string").example(json!(EXAMPLE_ID)));
    properties.insert(extra.0.to_string(), extra.1);
    Schema::object(properties)
}

fn jsonrpc_error_schema(code: i64, message: Option<&str>) -> Schema {
    let mut error = IndexMap::new();
    error.insert("code".to_string(), Schema::typed("integer").example(json!(code)));
    let message_schema = Schema::typed("string");
    error.insert(
        "message".to_string(),
        match message {
            Some(m) => message_schema.example(json!(m)),
            None => message_schema,
        },
    );
    jsonrpc_envelope(("error", Schema::object(error)))
}

/// The reserved JSON-RPC 2.0 errors: schema name, code, message, response description.
const JSONRPC_ERRORS: [(&str, i64, &str, &str); 5] = [
    (
        "ParseError",
        -32700,
        "Parse error",
        "Parse error. Invalid JSON was received by the server. An error occurred on the server while parsing the JSON text.",
    ),
    (
        "InvalidRequestError",
        -32600,
        "Invalid Request",
        "Invalid Request. The JSON sent is not a valid Request object.",
    ),
    (
        "MethodNotFoundError",
        -32601,
        "Method not found",
        "Method not found. The method does not exist / is not available.",
    ),
    ("InvalidParamsError", -32602, "Invalid params", "Invalid params. Invalid method parameters."),
    ("InternalError", -32603, "Internal error", "Internal error. Internal JSON-RPC error."),
];

pub struct OpenapiGenerator<'s> {
    spec: &'s ServiceSpec,
}

impl<'s> OpenapiGenerator<'s> {
    pub fn new(spec: &'s ServiceSpec) -> Self {
        Self { spec }
    }

    /// Errors documented for `m`: the ones it returns plus configured extras.
    fn method_errors<'a>(&'a self, m: &'a ServiceMethod) -> Vec<&'a ErrorCode> {
        let mut out: Vec<&ErrorCode> = m.errors.iter().collect();
        for id in self.spec.openapi.errors(&m.name) {
            if let Some(err) = self.spec.error(*id) {
                if !out.iter().any(|e| e.named == err.named) {
                    out.push(err);
                }
            }
        }
        out
    }

    fn result_schema(&self, u: &Universe, m: &ServiceMethod) -> Schema {
        let schema = if m.results_named {
            Schema::object(
                m.results
                    .iter()
                    .map(|r| (to_lower_camel(&r.name), type_schema(u, &r.ty)))
                    .collect(),
            )
        } else if let Some(r) = m.results.first() {
            type_schema(u, &r.ty)
        } else {
            Schema::object(IndexMap::new()).example(Value::Null)
        };
        match &m.options.wrap_response {
            Some(key) => key.rsplit('.').fold(schema, |inner, part| {
                Schema::object(IndexMap::from([(part.to_string(), inner)]))
            }),
            None => schema,
        }
    }

    fn param_properties<'m>(
        &self,
        u: &Universe,
        doc: &MethodDoc,
        params: impl Iterator<Item = &'m Var>,
    ) -> IndexMap<String, Schema> {
        params
            .map(|p| {
                let mut schema = type_schema(u, &p.ty);
                schema.description = doc.param(&p.name).to_string();
                (to_lower_camel(&p.name), schema)
            })
            .collect()
    }

    fn jsonrpc_operation(&self, u: &Universe, iface: &ServiceInterface, m: &ServiceMethod) -> Operation {
        let doc = MethodDoc::parse(&m.comments);
        let params = if m.params.is_empty() {
            Schema::object(IndexMap::new()).example(Value::Null)
        } else {
            Schema::object(self.param_properties(u, &doc, m.params.iter()))
        };
        let method = Schema {
            enum_values: vec![json!(rpc_method_name(self.spec, iface, &m.lc_name))],
            ..Schema::typed("string")
        };
        let mut request = jsonrpc_envelope(("method", method));
        if let Some(props) = request.properties.as_mut() {
            props.insert("params".to_string(), params);
        }

        let mut responses = IndexMap::new();
        responses.insert(
            "200".to_string(),
            response("OK", jsonrpc_envelope(("result", self.result_schema(u, m)))),
        );
        for (name, code, _, description) in JSONRPC_ERRORS {
            responses.insert(format!("x{code}"), response(description, Schema::reference(name)));
        }
        for err in self.method_errors(m) {
            responses.insert(format!("x{}", err.code), response(&err.name, Schema::reference(&err.name)));
        }

        Operation {
            description: doc.description(),
            request_body: Some(RequestBody {
                required: true,
                content: json_media(request),
            }),
            responses,
            ..Operation::default()
        }
    }

    fn rest_operation(&self, u: &Universe, m: &ServiceMethod) -> Operation {
        let doc = MethodDoc::parse(&m.comments);
        let opts = &m.options;
        let mut parameters = Vec::new();
        for p in &m.params {
            let (location, name) = if opts.path_vars.contains_key(&p.name) {
                ("path", p.name.clone())
            } else if let Some(header) = opts.header_vars.get(&p.name) {
                ("header", header.clone())
            } else if let Some(query) = opts.query_vars.get(&p.name) {
                ("query", query.clone())
            } else {
                continue;
            };
            let mut schema = type_schema(u, &p.ty);
            schema.description = doc.param(&p.name).to_string();
            parameters.push(Parameter {
                location,
                name,
                required: true,
                schema,
            });
        }
        // Path parameters lead, then query, then header; declaration order within each.
        parameters.sort_by_key(|p| match p.location {
            "path" => 0,
            "query" => 1,
            _ => 2,
        });

        let request_body = has_body(m.http_method()).then(|| RequestBody {
            required: true,
            content: json_media(Schema::object(self.param_properties(u, &doc, m.body_params()))),
        });

        let mut responses = IndexMap::new();
        responses.insert("200".to_string(), response("OK", self.result_schema(u, m)));
        for err in self.method_errors(m) {
            responses.insert(err.code.to_string(), response(&err.name, Schema::reference(&err.name)));
        }
        responses.insert("500".to_string(), response("FAIL", Schema::reference("Error")));

        Operation {
            summary: m.name.clone(),
            description: doc.description(),
            parameters,
            request_body,
            responses,
            ..Operation::default()
        }
    }

    fn error_schemas(&self, schemas: &mut IndexMap<String, Schema>) {
        let jsonrpc = self.spec.jsonrpc.enable;
        if jsonrpc {
            for (name, code, message, _) in JSONRPC_ERRORS {
                schemas.insert(name.to_string(), jsonrpc_error_schema(code, Some(message)));
            }
        } else {
            schemas.insert("Error".to_string(), rest_error_schema());
        }
        let mut errors: Vec<&ErrorCode> = Vec::new();
        for (_, m) in self.spec.methods() {
            for err in self.method_errors(m) {
                if !errors.iter().any(|e| e.named == err.named) {
                    errors.push(err);
                }
            }
        }
        for err in errors {
            let schema = if jsonrpc {
                jsonrpc_error_schema(err.code, None)
            } else {
                rest_error_schema()
            };
            schemas.insert(err.name.clone(), schema);
        }
    }

    pub fn document(&self, u: &Universe) -> Document {
        let spec = self.spec;
        let opts = &spec.openapi;
        let mut doc = Document {
            openapi: "3.0.0",
            info: Info {
                title: opts.info.title.clone(),
                description: opts.info.description.clone(),
                version: opts.info.version.clone(),
                contact: opts.contact.clone(),
                license: opts.license.clone(),
            },
            servers: opts.servers.clone(),
            ..Document::default()
        };
        self.error_schemas(&mut doc.components.schemas);

        let mut named = IndexSet::new();
        for (iface, m) in spec.methods() {
            for v in m.params.iter().chain(&m.results) {
                collect_named(u, &v.ty, &mut named);
            }
            let (path, verb, mut op) = if spec.jsonrpc.enable {
                let path = format!("/{}", rpc_method_name(spec, iface, &m.lc_name));
                (path, "POST", self.jsonrpc_operation(u, iface, m))
            } else {
                let path = strip_regexps(&route_path(spec, iface, m));
                (path, m.http_method(), self.rest_operation(u, m))
            };
            op.tags = opts.tags(&m.name).to_vec();
            if spec.interfaces.len() > 1 {
                op.tags.push(iface.name_export.clone());
            }
            doc.paths.entry(path).or_default().set(verb, op);
        }
        for id in named {
            doc.components
                .schemas
                .insert(u.named(id).name.clone(), definition(u, id));
        }
        doc
    }
}

fn rest_error_schema() -> Schema {
    Schema::object(IndexMap::from([("error".to_string(), Schema::typed("string"))]))
}

impl Generator for OpenapiGenerator<'_> {
    fn name(&self) -> &'static str {
        "openapi"
    }

    fn filename(&self) -> &str {
        FILENAME
    }

    fn output_dir(&self) -> PathBuf {
        self.spec.site.output_dir(&self.spec.openapi.output)
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError> {
        let doc = self.document(ctx.universe);
        let text = serde_json::to_string_pretty(&doc).map_err(|e| generator_error(self, e.to_string()))?;
        ctx.out.w(text);
        ctx.out.w("\n");
        Ok(())
    }
}

//! Root option dispatch.
//!
//! Every root option (`Service`, `ConfigEnv`, `Gateway`) is registered with
//! the validator that types its option tree and the processor that turns
//! the resulting [`Spec`] into an ordered list of generators. Adding a root
//! option means adding one [`Registration`] here.

use crate::codegen::client_struct::ClientStructGenerator;
use crate::codegen::config::ConfigGenerator;
use crate::codegen::config_doc::ConfigDocGenerator;
use crate::codegen::endpoint::{EndpointFactoryGenerator, EndpointGenerator};
use crate::codegen::gateway::GatewayGenerator;
use crate::codegen::http_transport::HttpTransportGenerator;
use crate::codegen::instrumenting::InstrumentingGenerator;
use crate::codegen::js_client::JsClientGenerator;
use crate::codegen::jsonrpc_client::JsonRpcClientGenerator;
use crate::codegen::jsonrpc_doc::JsonRpcDocGenerator;
use crate::codegen::jsonrpc_server::JsonRpcServerGenerator;
use crate::codegen::logging::LoggingGenerator;
use crate::codegen::openapi::OpenapiGenerator;
use crate::codegen::readme::ReadmeGenerator;
use crate::codegen::rest_client::RestClientGenerator;
use crate::codegen::rest_server::RestServerGenerator;
use crate::codegen::Generator;
use crate::diagnostic::CompilerError;
use crate::option::OptionNode;
use crate::schema::{self, ConfigSpec, GatewaySpec, ServiceSpec, SiteInfo, Spec};
use crate::types::Universe;

/// Types an option tree into a [`Spec`].
pub type Validator = fn(&Universe, SiteInfo, &OptionNode) -> Result<Spec, Vec<CompilerError>>;

/// Selects the generators for a validated spec.
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Generators in the order they must run.
    fn generators<'s>(&self, spec: &'s Spec) -> Result<Vec<Box<dyn Generator + 's>>, CompilerError>;
}

pub struct Registration {
    pub name: &'static str,
    pub validate: Validator,
    pub processor: fn() -> Box<dyn Processor>,
}

pub struct Registry {
    entries: Vec<Registration>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: vec![
                Registration {
                    name: "Service",
                    validate: |u, site, node| schema::service::validate(u, site, node).map(Spec::Service),
                    processor: || Box::new(ServiceProcessor),
                },
                Registration {
                    name: "ConfigEnv",
                    validate: |u, site, node| schema::config::validate(u, site, node).map(Spec::Config),
                    processor: || Box::new(ConfigProcessor),
                },
                Registration {
                    name: "Gateway",
                    validate: |u, site, node| schema::gateway::validate(u, site, node).map(Spec::Gateway),
                    processor: || Box::new(GatewayProcessor),
                },
            ],
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Registration> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.name)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn mismatch(processor: &dyn Processor, spec: &Spec) -> CompilerError {
    CompilerError::ProcessorMismatch {
        processor: processor.name().to_string(),
        spec: spec.kind().to_string(),
    }
}

pub struct ServiceProcessor;

impl ServiceProcessor {
    fn service_generators<'s>(spec: &'s ServiceSpec) -> Vec<Box<dyn Generator + 's>> {
        let mut out: Vec<Box<dyn Generator + 's>> = vec![Box::new(EndpointGenerator::new(spec))];
        let http = spec.transport.http_server || spec.go_client();

        if http {
            out.push(Box::new(HttpTransportGenerator::new(spec)));
        }
        if spec.any_logging() {
            out.push(Box::new(LoggingGenerator::new(spec)));
        }
        if spec.any_instrumenting() {
            out.push(Box::new(InstrumentingGenerator::new(spec)));
        }
        if spec.transport.http_server {
            if spec.jsonrpc.enable {
                out.push(Box::new(JsonRpcServerGenerator::new(spec)));
            } else {
                out.push(Box::new(RestServerGenerator::new(spec)));
            }
        }
        if spec.go_client() {
            out.push(Box::new(EndpointFactoryGenerator::new(spec)));
            out.push(Box::new(ClientStructGenerator::new(spec)));
            if spec.jsonrpc.enable {
                out.push(Box::new(JsonRpcClientGenerator::new(spec)));
            } else {
                out.push(Box::new(RestClientGenerator::new(spec)));
            }
        }
        if spec.js_client() && spec.jsonrpc.enable {
            out.push(Box::new(JsClientGenerator::new(spec)));
        }
        if spec.jsonrpc.doc_enable {
            out.push(Box::new(JsonRpcDocGenerator::new(spec)));
        }
        if spec.openapi.enable {
            out.push(Box::new(OpenapiGenerator::new(spec)));
        }
        if spec.readme.enable {
            out.push(Box::new(ReadmeGenerator::new(spec)));
        }
        out
    }
}

impl Processor for ServiceProcessor {
    fn name(&self) -> &'static str {
        "service"
    }

    fn generators<'s>(&self, spec: &'s Spec) -> Result<Vec<Box<dyn Generator + 's>>, CompilerError> {
        match spec {
            Spec::Service(service) => Ok(Self::service_generators(service)),
            other => Err(mismatch(self, other)),
        }
    }
}

pub struct ConfigProcessor;

impl ConfigProcessor {
    fn config_generators<'s>(spec: &'s ConfigSpec) -> Vec<Box<dyn Generator + 's>> {
        let mut out: Vec<Box<dyn Generator + 's>> = vec![Box::new(ConfigGenerator::new(spec))];
        if spec.doc_enable {
            out.push(Box::new(ConfigDocGenerator::new(spec)));
        }
        out
    }
}

impl Processor for ConfigProcessor {
    fn name(&self) -> &'static str {
        "config"
    }

    fn generators<'s>(&self, spec: &'s Spec) -> Result<Vec<Box<dyn Generator + 's>>, CompilerError> {
        match spec {
            Spec::Config(config) => Ok(Self::config_generators(config)),
            other => Err(mismatch(self, other)),
        }
    }
}

pub struct GatewayProcessor;

impl GatewayProcessor {
    fn gateway_generators<'s>(spec: &'s GatewaySpec) -> Vec<Box<dyn Generator + 's>> {
        vec![Box::new(GatewayGenerator::new(spec))]
    }
}

impl Processor for GatewayProcessor {
    fn name(&self) -> &'static str {
        "gateway"
    }

    fn generators<'s>(&self, spec: &'s Spec) -> Result<Vec<Box<dyn Generator + 's>>, CompilerError> {
        match spec {
            Spec::Gateway(gateway) => Ok(Self::gateway_generators(gateway)),
            other => Err(mismatch(self, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::{self, swipe_file, SERVICE};

    fn generator_names(root: &str) -> Vec<(&'static str, String)> {
        let u = testing::load(&[("app/service.go", SERVICE), ("app/swipe.go", &swipe_file(root))]);
        let spec = testing::spec(&u);
        let registry = Registry::new();
        let registration = registry.lookup(spec.kind()).unwrap();
        let processor = (registration.processor)();
        let names = processor
            .generators(&spec)
            .unwrap()
            .iter()
            .map(|g| (g.name(), g.filename().to_string()))
            .collect();
        names
    }

    #[test]
    fn test_registered_roots() {
        let registry = Registry::new();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["Service", "ConfigEnv", "Gateway"]);
        assert!(registry.lookup("Build").is_none());
    }

    #[test]
    fn test_jsonrpc_service_with_clients() {
        let names = generator_names(concat!(
            "Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n",
            "\t\t\tswipe.HTTPServer(),\n\t\t\tswipe.JSONRPCEnable(),\n",
            "\t\t\tswipe.ClientsEnable([]string{\"go\", \"js\"}),\n",
            "\t\t\tswipe.OpenapiEnable(),\n\t\t)"
        ));
        let files: Vec<&str> = names.iter().map(|(_, f)| f.as_str()).collect();
        assert_eq!(
            files,
            [
                "endpoint_gen.go",
                "http_gen.go",
                "server_gen.go",
                "endpoint_gen.go",
                "client_struct_gen.go",
                "client_gen.go",
                "client_jsonrpc_gen.js",
                "openapi_gen.json",
            ]
        );
        assert_eq!(names[2].0, "jsonrpc server");
    }

    #[test]
    fn test_rest_server_only() {
        let names = generator_names("Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n\t\t\tswipe.HTTPServer(),\n\t\t)");
        let files: Vec<&str> = names.iter().map(|(_, f)| f.as_str()).collect();
        assert_eq!(files, ["endpoint_gen.go", "http_gen.go", "server_gen.go"]);
        assert_eq!(names[2].0, "rest server");
    }

    #[test]
    fn test_processor_mismatch() {
        let u = testing::load(&[("app/service.go", SERVICE), ("app/swipe.go", &swipe_file("Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n\t\t)"))]);
        let spec = testing::spec(&u);
        let err = ConfigProcessor.generators(&spec).err().unwrap();
        assert!(matches!(err, CompilerError::ProcessorMismatch { ref spec, .. } if spec == "Service"));
    }
}

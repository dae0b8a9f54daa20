//! Typed interpretation of option trees.
//!
//! Each root option has a validator that turns its [`OptionNode`] into a
//! [`Spec`]:
//!
//! 1. `Service`   -> [`ServiceSpec`] (interfaces, transport, method options, error codes)
//! 2. `ConfigEnv` -> [`ConfigSpec`]  (struct fields with env/flag bindings)
//! 3. `Gateway`   -> [`GatewaySpec`] (services with balancer policies)
//!
//! Validation errors are positioned and collected per build site.
//!
//! [`OptionNode`]: crate::option::OptionNode

pub mod config;
pub mod errors;
pub mod gateway;
pub mod path_vars;
pub mod service;

use std::path::PathBuf;

use indexmap::IndexMap;

pub use config::{ConfigEntry, ConfigField, ConfigSpec};
pub use errors::ErrorCode;
pub use gateway::{Balancer, GatewayMethod, GatewayService, GatewaySpec};
pub use service::{
    ClientLang, FuncRef, InstrumentingOptions, JsonRpcOptions, MethodOption, OpenapiContact, OpenapiInfo,
    OpenapiLicense, OpenapiOptions, OpenapiServer, ReadmeOptions, ServiceInterface, ServiceMethod, ServiceSpec,
    Transport,
};

use crate::diagnostic::Span;
use crate::types::FileRef;

/// The validated form of one `Build(...)` call.
#[derive(Debug, Clone)]
pub enum Spec {
    Service(ServiceSpec),
    Config(ConfigSpec),
    Gateway(GatewaySpec),
}

impl Spec {
    /// Root option name the spec was validated from.
    pub fn kind(&self) -> &'static str {
        match self {
            Spec::Service(_) => "Service",
            Spec::Config(_) => "ConfigEnv",
            Spec::Gateway(_) => "Gateway",
        }
    }

    pub fn site(&self) -> &SiteInfo {
        match self {
            Spec::Service(s) => &s.site,
            Spec::Config(s) => &s.site,
            Spec::Gateway(s) => &s.site,
        }
    }
}

/// Where a build site lives; generated Go files land in its package.
#[derive(Debug, Clone)]
pub struct SiteInfo {
    pub file: FileRef,
    pub span: Span,
    pub pkg_path: String,
    pub pkg_name: String,
    /// Directory of the build configuration file.
    pub base_dir: PathBuf,
    /// Module root, for paths shown in docs.
    pub work_dir: PathBuf,
}

impl SiteInfo {
    /// Resolves an output option (`"./docs"`) against the base directory.
    pub fn output_dir(&self, output: &str) -> PathBuf {
        if output.is_empty() {
            return self.base_dir.clone();
        }
        let joined = self.base_dir.join(output);
        normalize(&joined)
    }
}

fn normalize(path: &std::path::Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Ordered `param -> external name` pairs of `RESTQueryVars`/`RESTHeaderVars`.
pub type VarPairs = IndexMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dir_resolution() {
        let site = SiteInfo {
            file: FileRef { pkg: 0, file: 0 },
            span: Span::unknown(),
            pkg_path: "example.com/m/app".to_string(),
            pkg_name: "app".to_string(),
            base_dir: PathBuf::from("/m/app"),
            work_dir: PathBuf::from("/m"),
        };
        assert_eq!(site.output_dir(""), PathBuf::from("/m/app"));
        assert_eq!(site.output_dir("./"), PathBuf::from("/m/app"));
        assert_eq!(site.output_dir("./docs"), PathBuf::from("/m/app/docs"));
        assert_eq!(site.output_dir("../api"), PathBuf::from("/m/api"));
    }
}

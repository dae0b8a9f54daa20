//! Signatures of the option DSL.
//!
//! The DSL package only carries marker functions, so it is never loaded.
//! Parameter names and variadic slots come from this table instead.

use crate::frontend::go::ast::default_package_name;

/// One builder function of the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DslFunc {
    pub name: &'static str,
    pub params: &'static [&'static str],
    /// The last parameter is variadic.
    pub variadic: bool,
}

impl DslFunc {
    const fn new(name: &'static str, params: &'static [&'static str]) -> Self {
        Self {
            name,
            params,
            variadic: false,
        }
    }

    const fn variadic(name: &'static str, params: &'static [&'static str]) -> Self {
        Self {
            name,
            params,
            variadic: true,
        }
    }

    /// Index of the variadic slot, if any.
    pub fn variadic_index(&self) -> Option<usize> {
        self.variadic.then(|| self.params.len() - 1)
    }
}

/// The sentinel call that marks a build configuration function.
pub const SENTINEL: &str = "Build";

/// Options accepted directly inside `Build(...)`.
pub const ROOTS: &[&str] = &["Service", "ConfigEnv", "Gateway"];

static FUNCS: &[DslFunc] = &[
    DslFunc::new("Build", &["option"]),
    // Service
    DslFunc::variadic("Service", &["opts"]),
    DslFunc::new("Interface", &["iface", "ns"]),
    DslFunc::new("HTTPServer", &[]),
    DslFunc::new("HTTPFast", &[]),
    DslFunc::new("JSONRPCEnable", &[]),
    DslFunc::new("JSONRPCPath", &["path"]),
    DslFunc::new("JSONRPCDocEnable", &[]),
    DslFunc::new("JSONRPCDocOutput", &["output"]),
    DslFunc::new("OpenapiEnable", &[]),
    DslFunc::new("OpenapiOutput", &["output"]),
    DslFunc::new("OpenapiInfo", &["title", "description", "version"]),
    DslFunc::new("OpenapiContact", &["name", "email", "url"]),
    DslFunc::new("OpenapiLicence", &["name", "url"]),
    DslFunc::new("OpenapiServer", &["description", "url"]),
    DslFunc::new("OpenapiTags", &["methods", "tags"]),
    DslFunc::new("OpenapiErrors", &["methods", "errors"]),
    DslFunc::new("ClientsEnable", &["langs"]),
    DslFunc::new("ReadmeEnable", &[]),
    DslFunc::new("ReadmeOutput", &["output"]),
    DslFunc::new("ReadmeTemplatePath", &["path"]),
    DslFunc::new("DefaultErrorEncoder", &["f"]),
    // Method options
    DslFunc::variadic("MethodOptions", &["signature", "opts"]),
    DslFunc::variadic("MethodDefaultOptions", &["opts"]),
    DslFunc::new("Exclude", &["enable"]),
    DslFunc::variadic("Logging", &["opts"]),
    DslFunc::new("LoggingParams", &["includes", "excludes"]),
    DslFunc::new("LoggingContext", &["key", "name"]),
    DslFunc::variadic("Instrumenting", &["opts"]),
    DslFunc::new("Namespace", &["value"]),
    DslFunc::new("Subsystem", &["value"]),
    DslFunc::new("RESTMethod", &["method"]),
    DslFunc::new("RESTPath", &["path"]),
    DslFunc::new("RESTQueryVars", &["values"]),
    DslFunc::new("RESTHeaderVars", &["values"]),
    DslFunc::new("RESTWrapResponse", &["key"]),
    DslFunc::new("WrapResponse", &["key"]),
    DslFunc::new("ServerDecodeRequestFunc", &["f"]),
    DslFunc::new("ServerEncodeResponseFunc", &["f"]),
    DslFunc::new("ClientEncodeRequestFunc", &["f"]),
    DslFunc::new("ClientDecodeResponseFunc", &["f"]),
    // ConfigEnv
    DslFunc::variadic("ConfigEnv", &["optionsStruct", "opts"]),
    DslFunc::new("ConfigEnvFuncName", &["name"]),
    DslFunc::new("ConfigEnvDocEnable", &[]),
    DslFunc::new("ConfigEnvDocOutput", &["output"]),
    // Gateway
    DslFunc::variadic("Gateway", &["services"]),
    DslFunc::variadic("GatewayService", &["iface", "opts"]),
    DslFunc::variadic("GatewayServiceMethod", &["signature", "opts"]),
    DslFunc::new("GatewayBalancer", &["name"]),
];

pub fn lookup(name: &str) -> Option<&'static DslFunc> {
    FUNCS.iter().find(|f| f.name == name)
}

/// Reports whether an import path is the option DSL package.
pub fn is_dsl_path(path: &str) -> bool {
    default_package_name(path) == "swipe"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let f = lookup("MethodOptions").unwrap();
        assert_eq!(f.variadic_index(), Some(1));
        assert_eq!(lookup("HTTPServer").unwrap().params.len(), 0);
        assert!(lookup("Nope").is_none());
    }

    #[test]
    fn test_dsl_path() {
        assert!(is_dsl_path("github.com/swipe-io/swipe/v2"));
        assert!(is_dsl_path("example.com/tools/swipe"));
        assert!(!is_dsl_path("github.com/go-kit/kit/endpoint"));
    }
}

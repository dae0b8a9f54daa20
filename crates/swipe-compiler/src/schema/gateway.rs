//! `Gateway(...)` validation.

use tracing::debug;

use super::service::{interface_ref, method_selector, split_signature};
use super::SiteInfo;
use crate::diagnostic::{CompilerError, Span};
use crate::naming::lc_first;
use crate::option::OptionNode;
use crate::types::{NamedId, Type, Universe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Balancer {
    Random,
    RoundRobin,
}

impl Balancer {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "random" => Some(Self::Random),
            "roundrobin" => Some(Self::RoundRobin),
            _ => None,
        }
    }

    /// Constructor in `github.com/go-kit/kit/sd/lb`.
    pub fn constructor(self) -> &'static str {
        match self {
            Self::Random => "NewRandom",
            Self::RoundRobin => "NewRoundRobin",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayMethod {
    pub name: String,
    pub balancer: Balancer,
}

#[derive(Debug, Clone)]
pub struct GatewayService {
    pub named: NamedId,
    /// Interface name as declared.
    pub name: String,
    pub methods: Vec<GatewayMethod>,
    pub span: Span,
}

impl GatewayService {
    /// Name of the `NewGateway` parameter for this service.
    pub fn option_var(&self) -> String {
        lc_first(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct GatewaySpec {
    pub site: SiteInfo,
    pub services: Vec<GatewayService>,
}

pub fn validate(universe: &Universe, site: SiteInfo, node: &OptionNode) -> Result<GatewaySpec, Vec<CompilerError>> {
    let mut errors = Vec::new();
    let mut services: Vec<GatewayService> = Vec::new();

    let nodes = node.slice("GatewayService");
    if nodes.is_empty() {
        errors.push(CompilerError::shape(&node.span, "Gateway: missing required option GatewayService"));
    }
    for service_node in nodes {
        match service(universe, &site, service_node) {
            Ok(service) => {
                if services.iter().any(|s| s.named == service.named) {
                    errors.push(CompilerError::semantic(
                        &service.span,
                        format!("GatewayService: {} is declared more than once", service.name),
                    ));
                } else {
                    services.push(service);
                }
            }
            Err(mut e) => errors.append(&mut e),
        }
    }

    if !errors.is_empty() {
        errors.sort_by(|a, b| a.span().cmp(&b.span()));
        return Err(errors);
    }
    debug!(services = services.len(), "validated Gateway");
    Ok(GatewaySpec { site, services })
}

fn service(universe: &Universe, site: &SiteInfo, node: &OptionNode) -> Result<GatewayService, Vec<CompilerError>> {
    let one = |e: CompilerError| vec![e];
    let value = node.require("iface").and_then(|n| n.require_value()).map_err(one)?;
    let id = interface_ref(universe, site.file, value).map_err(one)?;
    let named = universe.named(id);
    let Type::Interface(iface) = &named.underlying else {
        return Err(one(CompilerError::shape(&value.span, "the iface option must be a pointer to an interface type")));
    };

    let mut errors = Vec::new();
    let mut methods = Vec::new();
    for method in &iface.methods {
        if let Err(e) = split_signature(universe, &method.sig, &node.span) {
            errors.push(e);
        }
        methods.push(GatewayMethod {
            name: method.name.clone(),
            balancer: Balancer::RoundRobin,
        });
    }

    for method_node in node.slice("GatewayServiceMethod") {
        let selected = method_node
            .require("signature")
            .and_then(|n| n.require_value())
            .and_then(|v| method_selector(universe, site.file, v));
        let (owner, name) = match selected {
            Ok(sel) => sel,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };
        if owner != id {
            errors.push(CompilerError::shape(
                &method_node.span,
                format!("GatewayServiceMethod: {}.{} does not belong to {}", universe.named(owner).name, name, named.name),
            ));
            continue;
        }
        let Some(balancer_node) = method_node.get("GatewayBalancer") else {
            continue;
        };
        let balancer = match balancer_node.require_value() {
            Ok(v) => v.as_str().and_then(Balancer::parse).ok_or_else(|| {
                CompilerError::semantic(&v.span, "there can only be values: random, roundrobin")
            }),
            Err(e) => Err(e),
        };
        match balancer {
            Ok(balancer) => {
                if let Some(m) = methods.iter_mut().find(|m| m.name == name) {
                    m.balancer = balancer;
                }
            }
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(GatewayService {
        named: id,
        name: named.name.clone(),
        methods,
        span: node.span.clone(),
    })
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
        "type Interface interface {\n",
        "\tCreate(ctx context.Context, name string) error\n",
        "\tGet(ctx context.Context, id int) (string, error)\n",
        "}\n",
    );

    fn validate_src(opts: &str) -> Result<GatewaySpec, Vec<CompilerError>> {
        let swipe = format!(
            "package gw\n\nimport (\n\t\"github.com/swipe-io/swipe/v2\"\n\n\t\"example.com/m/app\"\n)\n\nfunc Swipe() {{\n\tswipe.Build(swipe.Gateway({opts}))\n}}\n"
        );
        let u = testing::load(&[("app/service.go", SERVICE), ("gw/swipe.go", &swipe)]);
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
        validate(&u, info, &root)
    }

    #[test]
    fn test_default_balancer_is_round_robin() {
        let spec = validate_src("swipe.GatewayService((*app.Interface)(nil))").unwrap();
        let service = &spec.services[0];
        assert_eq!(service.name, "Interface");
        assert_eq!(service.option_var(), "interface");
        let methods: Vec<_> = service.methods.iter().map(|m| (m.name.as_str(), m.balancer)).collect();
        assert_eq!(methods, [("Create", Balancer::RoundRobin), ("Get", Balancer::RoundRobin)]);
    }

    #[test]
    fn test_method_balancer_override() {
        let spec = validate_src(
            "swipe.GatewayService((*app.Interface)(nil), swipe.GatewayServiceMethod(app.Interface.Get, swipe.GatewayBalancer(\"random\")))",
        )
        .unwrap();
        let get = spec.services[0].methods.iter().find(|m| m.name == "Get").unwrap();
        assert_eq!(get.balancer, Balancer::Random);
        assert_eq!(get.balancer.constructor(), "NewRandom");
    }

    #[test]
    fn test_unknown_balancer() {
        let errs = validate_src(
            "swipe.GatewayService((*app.Interface)(nil), swipe.GatewayServiceMethod(app.Interface.Get, swipe.GatewayBalancer(\"sticky\")))",
        )
        .unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].to_string().contains("there can only be values: random, roundrobin"));
    }

    #[test]
    fn test_missing_services() {
        let errs = validate_src("").unwrap_err();
        assert!(errs[0].to_string().contains("missing required option GatewayService"));
    }
}

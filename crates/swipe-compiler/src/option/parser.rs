use indexmap::IndexMap;

use super::dsl::{self, DslFunc};
use super::finder::BuildSite;
use super::{OptionNode, Scalar, Value};
use crate::diagnostic::CompilerError;
use crate::frontend::go::ast::{Expr, ExprKind, ParsedFile};
use crate::frontend::go::printer;
use crate::types::{ConstValue, FileRef, Universe};

/// Turns option call expressions of one file into option trees.
///
/// Only the call shape is checked here: the called function must belong to
/// the DSL and the argument count must match its signature. Everything
/// else is left to the schema validators.
pub struct OptionParser<'u> {
    universe: &'u Universe,
    file: FileRef,
}

impl<'u> OptionParser<'u> {
    pub fn new(universe: &'u Universe, file: FileRef) -> Self {
        Self { universe, file }
    }

    /// Parses the single argument of a `Build(...)` call.
    pub fn parse_site(&self, site: &BuildSite) -> Result<OptionNode, CompilerError> {
        match site.args.as_slice() {
            [root] => self.parse(root),
            [] => Err(CompilerError::shape(&site.span, "not enough arguments in call to Build")),
            _ => Err(CompilerError::shape(&site.span, "too many arguments in call to Build")),
        }
    }

    pub fn parse(&self, expr: &Expr) -> Result<OptionNode, CompilerError> {
        let expr = expr.unparen();
        let ExprKind::Call { fun, args, .. } = &expr.kind else {
            return Err(CompilerError::shape(
                &expr.span,
                format!("{} is not an option call", printer::expr(expr)),
            ));
        };
        let Some(name) = self.dsl_name(fun) else {
            return Err(CompilerError::shape(
                &fun.span,
                format!("{} is not a swipe option", printer::expr(fun)),
            ));
        };
        let func = dsl::lookup(name).ok_or_else(|| CompilerError::UnknownOption {
            name: name.to_string(),
            span: fun.span.clone(),
        })?;
        check_arity(func, args, expr)?;

        let mut node = OptionNode {
            func,
            name: func.name.to_string(),
            value: None,
            properties: IndexMap::new(),
            span: expr.span.clone(),
        };
        let variadic = func.variadic_index();
        for (i, arg) in args.iter().enumerate() {
            if variadic.is_some_and(|v| i >= v) {
                if self.is_option_call(arg) {
                    let child = self.parse(arg)?;
                    node.properties.entry(child.name.clone()).or_default().push(child);
                } else if func.params.len() == 1 && args.len() == 1 {
                    node.value = Some(self.value(arg));
                } else {
                    let param = func.params[func.params.len() - 1];
                    node.properties
                        .entry(param.to_string())
                        .or_default()
                        .push(self.leaf(func, param, arg));
                }
            } else if func.params.len() == 1 {
                node.value = Some(self.value(arg));
            } else {
                let param = func.params[i];
                node.properties
                    .entry(param.to_string())
                    .or_default()
                    .push(self.leaf(func, param, arg));
            }
        }
        Ok(node)
    }

    fn file(&self) -> &ParsedFile {
        self.universe.file(self.file)
    }

    /// Name of the DSL function `fun` refers to, through a qualified or dot
    /// import of the DSL package.
    fn dsl_name<'e>(&self, fun: &'e Expr) -> Option<&'e str> {
        match &fun.unparen().kind {
            ExprKind::Selector { x, sel } => {
                let import = self.file().import_by_name(x.as_ident()?)?;
                dsl::is_dsl_path(&import.path).then_some(sel.name.as_str())
            }
            ExprKind::Ident(name) => {
                let dot = self
                    .file()
                    .imports
                    .iter()
                    .any(|i| i.name.as_deref() == Some(".") && dsl::is_dsl_path(&i.path));
                (dot && self.universe.packages[self.file.pkg].scope.get(name).is_none()).then_some(name.as_str())
            }
            _ => None,
        }
    }

    fn is_option_call(&self, expr: &Expr) -> bool {
        match &expr.unparen().kind {
            ExprKind::Call { fun, .. } => self.dsl_name(fun).is_some(),
            _ => false,
        }
    }

    fn leaf(&self, func: &'static DslFunc, param: &str, arg: &Expr) -> OptionNode {
        OptionNode {
            func,
            name: param.to_string(),
            value: Some(self.value(arg)),
            properties: IndexMap::new(),
            span: arg.span.clone(),
        }
    }

    fn value(&self, expr: &Expr) -> Value {
        Value {
            expr: expr.clone(),
            ty: self.universe.type_of(self.file, expr),
            scalar: self.scalar(expr),
            span: expr.span.clone(),
        }
    }

    fn scalar(&self, expr: &Expr) -> Option<Scalar> {
        if let Some(value) = self.universe.const_value(self.file, expr) {
            return match value {
                ConstValue::String(s) => Some(Scalar::String(s)),
                ConstValue::Bool(b) => Some(Scalar::Bool(b)),
                ConstValue::Float(f) => Some(Scalar::Float(f)),
                ConstValue::Int(i) => i64::try_from(i).ok().map(Scalar::Int),
            };
        }
        let ExprKind::CompositeLit { ty: Some(ty), elts } = &expr.unparen().kind else {
            return None;
        };
        let ExprKind::ArrayType { elt, .. } = &ty.kind else {
            return None;
        };
        if elt.as_ident() == Some("string") {
            let strings: Option<Vec<String>> = elts
                .iter()
                .map(|e| match self.universe.const_value(self.file, e) {
                    Some(ConstValue::String(s)) => Some(s),
                    _ => None,
                })
                .collect();
            if let Some(strings) = strings {
                return Some(Scalar::StringSlice(strings));
            }
        }
        Some(Scalar::ExprSlice(elts.clone()))
    }
}

fn check_arity(func: &DslFunc, args: &[Expr], call: &Expr) -> Result<(), CompilerError> {
    let min = if func.variadic { func.params.len() - 1 } else { func.params.len() };
    if args.len() < min {
        return Err(CompilerError::shape(
            &call.span,
            format!("not enough arguments in call to {}", func.name),
        ));
    }
    if !func.variadic && args.len() > func.params.len() {
        return Err(CompilerError::shape(
            &call.span,
            format!("too many arguments in call to {}", func.name),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::find_build_sites;
    use crate::types::{testing, Type};

    const APP: &str = concat!(
        "package app\n\n",
        "import \"context\"\n\n",
        "type AppI interface {\n\tGet(ctx context.Context, fname string) (string, error)\n}\n",
    );

    fn parse_build(body: &str) -> Result<OptionNode, CompilerError> {
        let src = format!(
            "package app\n\nimport \"github.com/swipe-io/swipe/v2\"\n\nfunc Swipe() {{\n\tswipe.Build(\n\t\t{body},\n\t)\n}}\n"
        );
        let u = testing::load(&[("app/app.go", APP), ("app/swipe.go", &src)]);
        let sites = find_build_sites(&u);
        assert_eq!(sites.len(), 1);
        OptionParser::new(&u, sites[0].file).parse_site(&sites[0])
    }

    #[test]
    fn test_service_tree() {
        let root = parse_build(concat!(
            "swipe.Service(\n",
            "swipe.Interface((*AppI)(nil), \"\"),\n",
            "swipe.HTTPServer(),\n",
            "swipe.MethodOptions(AppI.Get, swipe.RESTPath(\"/get/{fname}\"), swipe.RESTMethod(\"POST\")),\n",
            ")",
        ))
        .unwrap();
        assert_eq!(root.name, "Service");
        assert!(root.value.is_none());
        let iface = root.get("Interface").unwrap();
        let ptr = iface.get("iface").unwrap().value.as_ref().unwrap();
        assert!(matches!(&ptr.ty, Some(Type::Pointer(_))));
        assert_eq!(iface.get("ns").unwrap().value.as_ref().unwrap().as_str(), Some(""));
        assert!(root.exists("HTTPServer"));

        let method = root.get("MethodOptions").unwrap();
        let sig = method.get("signature").unwrap().value.as_ref().unwrap();
        assert_eq!(sig.source(), "AppI.Get");
        assert_eq!(method.string("RESTPath").unwrap().as_deref(), Some("/get/{fname}"));
        assert_eq!(method.string("RESTMethod").unwrap().as_deref(), Some("POST"));
    }

    #[test]
    fn test_variadic_options_keep_order() {
        let root = parse_build(concat!(
            "swipe.Service(\n",
            "swipe.Interface((*AppI)(nil), \"a\"),\n",
            "swipe.Interface((*AppI)(nil), \"b\"),\n",
            ")",
        ))
        .unwrap();
        let ns: Vec<_> = root
            .slice("Interface")
            .iter()
            .map(|n| n.get("ns").unwrap().value.as_ref().unwrap().as_str().unwrap())
            .collect();
        assert_eq!(ns, ["a", "b"]);
    }

    #[test]
    fn test_single_leaf_in_variadic_slot() {
        let root = parse_build(concat!(
            "swipe.Service(\n",
            "swipe.MethodDefaultOptions(swipe.Logging(true), swipe.Instrumenting(swipe.Namespace(\"api\"))),\n",
            ")",
        ))
        .unwrap();
        let defaults = root.get("MethodDefaultOptions").unwrap();
        assert_eq!(defaults.flag("Logging").unwrap(), Some(true));
        let inst = defaults.get("Instrumenting").unwrap();
        assert_eq!(inst.string("Namespace").unwrap().as_deref(), Some("api"));
    }

    #[test]
    fn test_string_slice_leaf() {
        let root = parse_build(concat!(
            "swipe.Service(\n",
            "swipe.ClientsEnable([]string{\"go\", \"js\"}),\n",
            "swipe.MethodOptions(AppI.Get, swipe.RESTQueryVars([]string{\"fname\", \"n\"})),\n",
            ")",
        ))
        .unwrap();
        let langs = root.get("ClientsEnable").unwrap().value.as_ref().unwrap();
        assert_eq!(langs.string_slice().unwrap(), ["go", "js"]);
        let vars = root.get("MethodOptions").unwrap().get("RESTQueryVars").unwrap();
        assert_eq!(vars.value.as_ref().unwrap().string_slice().unwrap(), ["fname", "n"]);
    }

    #[test]
    fn test_arity_errors() {
        let err = parse_build("swipe.Service(swipe.Interface((*AppI)(nil)))").unwrap_err();
        assert!(err.to_string().contains("not enough arguments in call to Interface"));
        let err = parse_build("swipe.Service(swipe.RESTPath(\"/a\", \"/b\"))").unwrap_err();
        assert!(err.to_string().contains("too many arguments in call to RESTPath"));
    }

    #[test]
    fn test_unknown_option() {
        let err = parse_build("swipe.Service(swipe.Bogus())").unwrap_err();
        assert!(matches!(err, CompilerError::UnknownOption { ref name, .. } if name == "Bogus"));
    }

    #[test]
    fn test_printed_tree_parses_back_to_same_shape() {
        let original = parse_build(concat!(
            "swipe.Service(\n",
            "swipe.Interface((*AppI)(nil), \"app\"),\n",
            "swipe.HTTPServer(),\n",
            "swipe.JSONRPCEnable(),\n",
            "swipe.JSONRPCPath(\"/rpc\"),\n",
            "swipe.OpenapiInfo(\"title\", \"desc\", \"v1.0.0\"),\n",
            "swipe.MethodOptions(AppI.Get, swipe.RESTQueryVars([]string{\"fname\", \"n\"}), swipe.Logging(false)),\n",
            ")",
        ))
        .unwrap();
        let printed = original.to_source();
        assert!(printed.starts_with("Service(Interface((*AppI)(nil), \"app\"), HTTPServer()"));

        let requalified = requalify(&printed);
        let reparsed = parse_build(&requalified).unwrap();
        assert!(original.same_shape(&reparsed));
    }

    /// Prefixes DSL calls with the package qualifier.
    fn requalify(src: &str) -> String {
        let mut out = String::new();
        let mut word = String::new();
        for c in src.chars() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                continue;
            }
            if c == '(' && dsl::lookup(&word).is_some() && !out.ends_with('.') {
                out.push_str("swipe.");
            }
            out.push_str(&word);
            word.clear();
            out.push(c);
        }
        out.push_str(&word);
        out
    }
}

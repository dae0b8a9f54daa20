//! Option trees: the typed, positioned form of a `Build(...)` argument.
//!
//! ```text
//! Service(Interface((*App)(nil), ""), HTTPServer())
//!
//! Service
//!  ├─ Interface ─┬─ iface = (*App)(nil)   : *App
//!  │             └─ ns    = ""            : "" (string)
//!  └─ HTTPServer
//! ```

pub mod dsl;
pub mod finder;
mod parser;

pub use dsl::DslFunc;
pub use finder::{find_build_sites, BuildSite};
pub use parser::OptionParser;

use indexmap::IndexMap;

use crate::diagnostic::{CompilerError, Span};
use crate::frontend::go::ast::Expr;
use crate::frontend::go::printer;
use crate::types::Type;

/// A constant-folded leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Int(i64),
    Bool(bool),
    Float(f64),
    StringSlice(Vec<String>),
    ExprSlice(Vec<Expr>),
}

/// A leaf argument: the raw expression, its type and, when foldable, its
/// constant value.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub expr: Expr,
    pub ty: Option<Type>,
    pub scalar: Option<Scalar>,
    pub span: Span,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match &self.scalar {
            Some(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &self.scalar {
            Some(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match &self.scalar {
            Some(Scalar::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn string_slice(&self) -> Option<&[String]> {
        match &self.scalar {
            Some(Scalar::StringSlice(v)) => Some(v),
            _ => None,
        }
    }

    /// Elements of a slice literal that did not fold to strings.
    pub fn expr_slice(&self) -> Option<&[Expr]> {
        match &self.scalar {
            Some(Scalar::ExprSlice(v)) => Some(v),
            _ => None,
        }
    }

    /// `nil`, as an untyped leaf.
    pub fn is_nil(&self) -> bool {
        self.expr.unparen().as_ident() == Some("nil")
    }

    pub fn source(&self) -> String {
        printer::expr(&self.expr)
    }
}

/// A node of the option tree.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionNode {
    /// DSL function the node was parsed from; for parameter leaves, the
    /// enclosing function.
    pub func: &'static DslFunc,
    /// Function name for calls, parameter name for leaves.
    pub name: String,
    /// Set when the call has a single non-option argument.
    pub value: Option<Value>,
    /// Children by parameter or option name, in argument order.
    pub properties: IndexMap<String, Vec<OptionNode>>,
    pub span: Span,
}

impl OptionNode {
    pub fn get(&self, key: &str) -> Option<&OptionNode> {
        self.properties.get(key).and_then(|v| v.first())
    }

    pub fn slice(&self, key: &str) -> &[OptionNode] {
        self.properties.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn exists(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// The child `key`, or a shape error positioned on this node.
    pub fn require(&self, key: &str) -> Result<&OptionNode, CompilerError> {
        self.get(key).ok_or_else(|| {
            CompilerError::shape(&self.span, format!("{}: missing required option {}", self.name, key))
        })
    }

    /// The leaf value of this node, or a shape error.
    pub fn require_value(&self) -> Result<&Value, CompilerError> {
        self.value
            .as_ref()
            .ok_or_else(|| CompilerError::shape(&self.span, format!("{}: value required", self.name)))
    }

    /// A string leaf: `Name("x")`. Missing keys yield `None`.
    pub fn string(&self, key: &str) -> Result<Option<String>, CompilerError> {
        let Some(node) = self.get(key) else {
            return Ok(None);
        };
        let value = node.require_value()?;
        value
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| CompilerError::shape(&value.span, format!("{key}: must be a constant string")))
    }

    /// A bool leaf; a bare `Name()` counts as true.
    pub fn flag(&self, key: &str) -> Result<Option<bool>, CompilerError> {
        let Some(node) = self.get(key) else {
            return Ok(None);
        };
        match &node.value {
            None => Ok(Some(true)),
            Some(value) => value
                .as_bool()
                .map(Some)
                .ok_or_else(|| CompilerError::shape(&value.span, format!("{key}: must be a constant bool"))),
        }
    }

    /// Pretty-prints the node back to DSL source.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        self.write_source(&mut out);
        out
    }

    fn write_source(&self, out: &mut String) {
        out.push_str(self.func.name);
        out.push('(');
        let mut args: Vec<String> = Vec::new();
        if let Some(value) = &self.value {
            args.push(value.source());
        } else {
            for (i, param) in self.func.params.iter().enumerate() {
                if Some(i) == self.func.variadic_index() {
                    for (key, children) in &self.properties {
                        if self.func.params[..i].contains(&key.as_str()) {
                            continue;
                        }
                        for child in children {
                            match &child.value {
                                Some(value) if child.name == *param => args.push(value.source()),
                                _ => args.push(child.to_source()),
                            }
                        }
                    }
                } else if let Some(value) = self.get(param).and_then(|c| c.value.as_ref()) {
                    args.push(value.source());
                }
            }
        }
        out.push_str(&args.join(", "));
        out.push(')');
    }

    /// Structural equality ignoring source positions.
    pub fn same_shape(&self, other: &OptionNode) -> bool {
        let values_match = match (&self.value, &other.value) {
            (None, None) => true,
            (Some(a), Some(b)) => a.scalar_eq(b) && a.source() == b.source(),
            _ => false,
        };
        self.func == other.func
            && self.name == other.name
            && values_match
            && self.properties.len() == other.properties.len()
            && self.properties.iter().zip(&other.properties).all(|((ka, va), (kb, vb))| {
                ka == kb && va.len() == vb.len() && va.iter().zip(vb).all(|(a, b)| a.same_shape(b))
            })
    }
}

impl Value {
    fn scalar_eq(&self, other: &Value) -> bool {
        match (&self.scalar, &other.scalar) {
            (Some(Scalar::ExprSlice(a)), Some(Scalar::ExprSlice(b))) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| printer::expr(x) == printer::expr(y))
            }
            (a, b) => a == b,
        }
    }
}

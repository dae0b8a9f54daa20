//! Constant folding for Go constant expressions.

use std::fmt;

use super::{BasicKind, Type};
use crate::frontend::go::ast::{Expr, ExprKind, LitKind};
use crate::frontend::go::unquote;

/// The value of a constant expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    Int(i128),
    Float(f64),
    String(String),
}

impl ConstValue {
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i128),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Kind of an untyped constant with this value.
    pub fn untyped_kind(&self) -> BasicKind {
        match self {
            Self::Bool(_) => BasicKind::UntypedBool,
            Self::Int(_) => BasicKind::UntypedInt,
            Self::Float(_) => BasicKind::UntypedFloat,
            Self::String(_) => BasicKind::UntypedString,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// A folded constant: its type (`None` while untyped) and value.
pub type Folded = (Option<Type>, ConstValue);

/// Name lookup used while folding.
pub trait ConstScope {
    /// Resolves an unqualified identifier to a constant.
    fn lookup_const(&mut self, name: &str) -> Option<Folded>;

    /// Resolves `pkg.Name` where `pkg` is an import name.
    fn lookup_qualified(&mut self, pkg: &str, name: &str) -> Option<Folded>;

    /// Resolves an expression used as a conversion target, if it names a type.
    fn conversion_type(&mut self, expr: &Expr) -> Option<Type>;

    /// Basic kind underlying a type, following named types.
    fn basic_of(&mut self, ty: &Type) -> Option<BasicKind>;
}

/// Folds `expr`. `iota` is the spec index inside a const group.
pub fn eval(expr: &Expr, iota: Option<i64>, scope: &mut dyn ConstScope) -> Option<Folded> {
    match &expr.kind {
        ExprKind::BasicLit { kind, value } => Some((None, literal(*kind, value)?)),
        ExprKind::Ident(name) => match name.as_str() {
            "true" => Some((None, ConstValue::Bool(true))),
            "false" => Some((None, ConstValue::Bool(false))),
            "iota" => iota.map(|i| (None, ConstValue::Int(i as i128))),
            _ => scope.lookup_const(name),
        },
        ExprKind::Paren(inner) => eval(inner, iota, scope),
        ExprKind::Selector { x, sel } => {
            let pkg = x.as_ident()?;
            scope.lookup_qualified(pkg, &sel.name)
        }
        ExprKind::Unary { op, x } => {
            let (ty, value) = eval(x, iota, scope)?;
            let value = match (op.as_str(), value) {
                ("+", v) => v,
                ("-", ConstValue::Int(v)) => ConstValue::Int(-v),
                ("-", ConstValue::Float(v)) => ConstValue::Float(-v),
                ("!", ConstValue::Bool(b)) => ConstValue::Bool(!b),
                ("^", ConstValue::Int(v)) => {
                    let unsigned = ty
                        .as_ref()
                        .and_then(|t| scope.basic_of(t))
                        .map(|k| (k.is_unsigned(), k.bit_size()));
                    match unsigned {
                        Some((true, bits)) => ConstValue::Int(!v & ((1i128 << bits) - 1)),
                        _ => ConstValue::Int(!v),
                    }
                }
                _ => return None,
            };
            Some((ty, value))
        }
        ExprKind::Binary { op, x, y } => {
            let (tx, vx) = eval(x, iota, scope)?;
            let (ty, vy) = eval(y, iota, scope)?;
            let integer_division = [&tx, &ty].into_iter().any(|t| {
                t.as_ref()
                    .and_then(|t| scope.basic_of(t))
                    .is_some_and(BasicKind::is_integer)
            });
            let value = binary(op, vx, vy, integer_division)?;
            let result_ty = match op.as_str() {
                "==" | "!=" | "<" | "<=" | ">" | ">=" => None,
                "<<" | ">>" => tx,
                _ => tx.or(ty),
            };
            Some((result_ty, value))
        }
        ExprKind::Call { fun, args, .. } if args.len() == 1 => {
            if fun.as_ident() == Some("len") {
                let (_, value) = eval(&args[0], iota, scope)?;
                return value.as_str().map(|s| (None, ConstValue::Int(s.len() as i128)));
            }
            let target = scope.conversion_type(fun)?;
            let (_, value) = eval(&args[0], iota, scope)?;
            let value = match (scope.basic_of(&target), value) {
                (Some(k), ConstValue::Float(f)) if k.is_integer() && f.fract() == 0.0 => {
                    ConstValue::Int(f as i128)
                }
                (Some(k), ConstValue::Int(v)) if k.is_float() => ConstValue::Float(v as f64),
                (_, v) => v,
            };
            Some((Some(target), value))
        }
        _ => None,
    }
}

fn literal(kind: LitKind, value: &str) -> Option<ConstValue> {
    match kind {
        LitKind::String => Some(ConstValue::String(unquote(value))),
        LitKind::Char => unquote(value).chars().next().map(|c| ConstValue::Int(c as i128)),
        LitKind::Int => parse_int(value).map(ConstValue::Int),
        LitKind::Float => value.replace('_', "").parse().ok().map(ConstValue::Float),
        LitKind::Imag => None,
    }
}

/// Parses a Go integer literal (decimal, hex, octal, binary, underscores).
pub fn parse_int(lit: &str) -> Option<i128> {
    let lit = lit.replace('_', "");
    let lower = lit.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        i128::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i128::from_str_radix(bin, 2).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i128::from_str_radix(oct, 8).ok()
    } else if lower.len() > 1 && lower.starts_with('0') {
        i128::from_str_radix(&lower[1..], 8).ok()
    } else {
        lower.parse().ok()
    }
}

fn binary(op: &str, x: ConstValue, y: ConstValue, integer_division: bool) -> Option<ConstValue> {
    use ConstValue::*;
    Some(match (x, y) {
        (Int(a), Int(b)) => match op {
            "+" => Int(a.checked_add(b)?),
            "-" => Int(a.checked_sub(b)?),
            "*" => Int(a.checked_mul(b)?),
            "/" if b == 0 => return None,
            "/" if integer_division || a % b == 0 => Int(a / b),
            "/" => Float(a as f64 / b as f64),
            "%" if b != 0 => Int(a % b),
            "&" => Int(a & b),
            "|" => Int(a | b),
            "^" => Int(a ^ b),
            "&^" => Int(a & !b),
            "<<" if (0..127).contains(&b) => Int(a.checked_shl(b as u32)?),
            ">>" if (0..127).contains(&b) => Int(a >> b),
            _ => return compare(op, &(a as f64), &(b as f64)).map(Bool),
        },
        (Int(a), Float(b)) => return binary(op, Float(a as f64), Float(b), false),
        (Float(a), Int(b)) => return binary(op, Float(a), Float(b as f64), false),
        (Float(a), Float(b)) => match op {
            "+" => Float(a + b),
            "-" => Float(a - b),
            "*" => Float(a * b),
            "/" if b != 0.0 => Float(a / b),
            _ => return compare(op, &a, &b).map(Bool),
        },
        (String(a), String(b)) => match op {
            "+" => String(a + &b),
            _ => return compare(op, &a, &b).map(Bool),
        },
        (Bool(a), Bool(b)) => match op {
            "&&" => Bool(a && b),
            "||" => Bool(a || b),
            "==" => Bool(a == b),
            "!=" => Bool(a != b),
            _ => return None,
        },
        _ => return None,
    })
}

fn compare<T: PartialOrd>(op: &str, a: &T, b: &T) -> Option<bool> {
    Some(match op {
        "==" => a == b,
        "!=" => a != b,
        "<" => a < b,
        "<=" => a <= b,
        ">" => a > b,
        ">=" => a >= b,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::go::ast::Decl;
    use crate::frontend::go::GoParser;
    use std::collections::HashMap;
    use std::path::Path;

    #[derive(Default)]
    struct MapScope(HashMap<String, ConstValue>);

    impl ConstScope for MapScope {
        fn lookup_const(&mut self, name: &str) -> Option<Folded> {
            self.0.get(name).cloned().map(|v| (None, v))
        }
        fn lookup_qualified(&mut self, _pkg: &str, _name: &str) -> Option<Folded> {
            None
        }
        fn conversion_type(&mut self, expr: &Expr) -> Option<Type> {
            expr.as_ident().and_then(BasicKind::from_name).map(Type::Basic)
        }
        fn basic_of(&mut self, ty: &Type) -> Option<BasicKind> {
            ty.as_basic()
        }
    }

    fn fold(src: &str, scope: &mut MapScope) -> Option<ConstValue> {
        let source = format!("package p\n\nconst x = {src}\n");
        let file = GoParser::new().unwrap().parse(&source, Path::new("c.go")).unwrap();
        let Decl::Const(specs) = &file.decls[0] else {
            panic!("expected const");
        };
        eval(&specs[0].values[0], Some(3), scope).map(|(_, v)| v)
    }

    #[test]
    fn test_fold_arithmetic() {
        let mut scope = MapScope::default();
        assert_eq!(fold("1 << 10", &mut scope), Some(ConstValue::Int(1024)));
        assert_eq!(fold("(2 + 3) * 4", &mut scope), Some(ConstValue::Int(20)));
        assert_eq!(fold("iota * 10", &mut scope), Some(ConstValue::Int(30)));
        assert_eq!(fold("7 / 2.0", &mut scope), Some(ConstValue::Float(3.5)));
        assert_eq!(fold("int64(7) / 2", &mut scope), Some(ConstValue::Int(3)));
        assert_eq!(fold("0x1F", &mut scope), Some(ConstValue::Int(31)));
    }

    #[test]
    fn test_fold_strings_and_refs() {
        let mut scope = MapScope::default();
        scope.0.insert("Prefix".into(), ConstValue::String("api".into()));
        assert_eq!(fold(r#"Prefix + "/v1""#, &mut scope), Some(ConstValue::String("api/v1".into())));
        assert_eq!(fold(r#"len("abc")"#, &mut scope), Some(ConstValue::Int(3)));
        assert_eq!(fold("!true", &mut scope), Some(ConstValue::Bool(false)));
        assert_eq!(fold("Unknown + 1", &mut scope), None);
    }

    #[test]
    fn test_parse_int_forms() {
        assert_eq!(parse_int("1_000"), Some(1000));
        assert_eq!(parse_int("0o17"), Some(15));
        assert_eq!(parse_int("017"), Some(15));
        assert_eq!(parse_int("0b101"), Some(5));
        assert_eq!(parse_int("0"), Some(0));
    }
}

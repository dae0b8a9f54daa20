//! Text buffer for generated Go code.
//!
//! Output is unindented; [`format::format_go`] re-indents it during framing.

pub mod convert;
pub mod format;

pub use convert::{Conversion, ErrSink, ValueKind};
pub use format::format_go;

use crate::importer::Importer;
use crate::types::{BasicKind, Type};

/// Append-only buffer with helpers for common Go constructs.
#[derive(Debug, Default, Clone)]
pub struct GoWriter {
    buf: String,
}

impl GoWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw text.
    pub fn w(&mut self, s: impl AsRef<str>) {
        self.buf.push_str(s.as_ref());
    }

    pub fn line(&mut self) {
        self.buf.push('\n');
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_string(self) -> String {
        self.buf
    }

    pub fn write_check_err(&mut self, body: impl FnOnce(&mut Self)) {
        self.w("if err != nil {\n");
        body(self);
        self.w("}\n");
    }

    /// `func (recv) name(params) (results) { body }`.
    pub fn write_func(
        &mut self,
        name: &str,
        recv: &str,
        params: &[(String, String)],
        results: &[(String, String)],
        body: impl FnOnce(&mut Self),
    ) {
        self.w("func");
        if !recv.is_empty() {
            self.w(format!(" ({recv})"));
        }
        self.w(format!(" {name}("));
        self.write_signature(params);
        self.w(") ");
        match results {
            [] => {}
            [(name, ty)] if name.is_empty() => self.w(format!("{ty} ")),
            _ => {
                self.w("(");
                self.write_signature(results);
                self.w(") ");
            }
        }
        self.w("{\n");
        body(self);
        self.w("}\n\n");
    }

    /// `defer func(params) { body }(calls)`.
    pub fn write_defer(&mut self, params: &[String], calls: &[String], body: impl FnOnce(&mut Self)) {
        self.w(format!("defer func({}) {{\n", params.join(", ")));
        body(self);
        self.w(format!("}}({})\n", calls.join(", ")));
    }

    /// Name/type pairs. A list without names prints types only; otherwise
    /// empty names print as `_`.
    pub fn write_signature(&mut self, pairs: &[(String, String)]) {
        let unnamed = pairs.iter().all(|(name, _)| name.is_empty());
        for (i, (name, ty)) in pairs.iter().enumerate() {
            if i > 0 {
                self.w(", ");
            }
            if unnamed {
                self.w(ty);
            } else {
                let name = if name.is_empty() { "_" } else { name.as_str() };
                self.w(format!("{name} {ty}"));
            }
        }
    }

    pub fn write_type_struct(&mut self, name: &str, fields: &[(String, String)]) {
        self.w(format!("type {name} struct "));
        self.write_struct_defined(fields);
        self.w("\n\n");
    }

    pub fn write_struct_defined(&mut self, fields: &[(String, String)]) {
        self.w("{\n");
        for (name, ty) in fields {
            self.w(format!("{name} {ty}\n"));
        }
        self.w("}");
    }

    /// `{a: b, c: d}`.
    pub fn write_struct_assign(&mut self, pairs: &[(String, String)]) {
        self.w("{");
        for (i, (key, value)) in pairs.iter().enumerate() {
            if i > 0 {
                self.w(", ");
            }
            self.w(format!("{key}: {value}"));
        }
        self.w("}");
    }

    pub fn write_func_call(&mut self, id: &str, name: &str, params: &[String]) {
        self.w(format!("{id}.{name}({})\n", params.join(", ")));
    }
}

/// Zero value literal of `ty` in the importer's file.
pub fn zero_value(imp: &mut Importer, ty: &Type) -> String {
    match imp.universe().underlying(ty) {
        Type::Basic(kind) if kind.is_bool() => "false".to_string(),
        Type::Basic(kind) if kind.is_string() => "\"\"".to_string(),
        Type::Basic(BasicKind::UnsafePointer) => "nil".to_string(),
        Type::Basic(_) => "0".to_string(),
        Type::Struct(_) | Type::Array(..) => format!("{}{{}}", imp.type_string(ty)),
        _ => "nil".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_func() {
        let mut w = GoWriter::new();
        w.write_func(
            "Get",
            "s *svc",
            &[("ctx".into(), "context.Context".into()), (String::new(), "int".into())],
            &[("name".into(), "string".into()), ("err".into(), "error".into())],
            |w| {
                w.write_check_err(|w| w.w("return\n"));
            },
        );
        assert_eq!(
            w.as_str(),
            "func (s *svc) Get(ctx context.Context, _ int) (name string, err error) {\nif err != nil {\nreturn\n}\n}\n\n"
        );
    }

    #[test]
    fn test_write_func_unnamed_results() {
        let mut w = GoWriter::new();
        let params = [("force".to_string(), "bool".to_string())];
        w.write_func("Reset", "", &params, &[(String::new(), "error".into())], |_| {});
        w.write_func(
            "List",
            "",
            &[],
            &[(String::new(), "[]User".into()), (String::new(), "int".into()), (String::new(), "error".into())],
            |_| {},
        );
        assert_eq!(
            w.as_str(),
            "func Reset(force bool) error {\n}\n\nfunc List() ([]User, int, error) {\n}\n\n"
        );
    }

    #[test]
    fn test_structs_and_defer() {
        let mut w = GoWriter::new();
        w.write_type_struct("GetRequest", &[("ID".into(), "int `json:\"id\"`".into())]);
        w.w("x := T");
        w.write_struct_assign(&[("A".into(), "1".into()), ("B".into(), "b".into())]);
        w.line();
        w.write_defer(&["begin time.Time".into()], &["time.Now()".into()], |w| w.w("observe(begin)\n"));
        assert_eq!(
            w.into_string(),
            "type GetRequest struct {\nID int `json:\"id\"`\n}\n\nx := T{A: 1, B: b}\ndefer func(begin time.Time) {\nobserve(begin)\n}(time.Now())\n"
        );
    }
}

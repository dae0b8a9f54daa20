//! String conversions for env variables, flags, path, query and header values.

use super::GoWriter;
use crate::importer::Importer;
use crate::naming::uc_first;
use crate::types::{BasicKind, Type, Universe};

/// How a value is parsed from and formatted to a string.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Basic(BasicKind),
    Duration,
    Time,
    Url,
    Uuid,
    Slice(Box<ValueKind>),
    Map(BasicKind, BasicKind),
}

impl ValueKind {
    /// Classifies `ty`; `None` for types without a string form.
    pub fn of(universe: &Universe, ty: &Type) -> Option<Self> {
        if universe.is_duration(ty) {
            return Some(Self::Duration);
        }
        if universe.is_time(ty) {
            return Some(Self::Time);
        }
        if universe.is_uuid(ty) {
            return Some(Self::Uuid);
        }
        if let Type::Pointer(elem) = ty {
            return universe.is_url(elem).then_some(Self::Url);
        }
        match universe.underlying(ty) {
            Type::Basic(kind) if kind.is_complex() || *kind == BasicKind::UnsafePointer => None,
            Type::Basic(kind) => Some(Self::Basic(kind.default_kind())),
            Type::Slice(elem) => match Self::of(universe, elem)? {
                Self::Slice(_) | Self::Map(..) => None,
                elem => Some(Self::Slice(Box::new(elem))),
            },
            Type::Map(key, value) => match (Self::of(universe, key)?, Self::of(universe, value)?) {
                (Self::Basic(k), Self::Basic(v)) => Some(Self::Map(k, v)),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Where a failed conversion reports its error.
#[derive(Debug, Clone, Copy)]
pub enum ErrSink<'a> {
    /// `return <values...>, err`.
    Return(&'a [&'a str]),
    /// `<slice> = append(<slice>, err)`.
    Append(&'a str),
}

/// One string-to-value conversion.
#[derive(Debug, Clone, Copy)]
pub struct Conversion<'a> {
    /// Destination expression: `cfg.Addr`, `req.ID`.
    pub assign: &'a str,
    /// Source string expression.
    pub value: &'a str,
    /// Base name for temporaries.
    pub name: &'a str,
    /// Declare the destination with `var`.
    pub declare: bool,
    pub sink: ErrSink<'a>,
    /// Error message prefix; defaults to `convert error`.
    pub msg: &'a str,
}

impl<'a> Conversion<'a> {
    fn nested<'b>(&self, assign: &'b str, value: &'b str, name: &'b str, declare: bool) -> Conversion<'b>
    where
        'a: 'b,
    {
        Conversion {
            assign,
            value,
            name,
            declare,
            sink: self.sink,
            msg: self.msg,
        }
    }
}

impl GoWriter {
    /// Emits code parsing `c.value` into `c.assign`. Returns false, writing
    /// nothing, when `ty` has no string form.
    pub fn write_convert_type(&mut self, imp: &mut Importer, ty: &Type, c: &Conversion) -> bool {
        let Some(kind) = ValueKind::of(imp.universe(), ty) else {
            return false;
        };
        match kind {
            ValueKind::Basic(basic) => self.convert_basic(imp, ty, basic, c),
            ValueKind::Duration | ValueKind::Time | ValueKind::Url | ValueKind::Uuid => {
                let tmp = self.convert_named(imp, ty, &kind, c);
                self.assign(c, &tmp);
            }
            ValueKind::Slice(elem_kind) => {
                let Type::Slice(elem) = imp.universe().underlying(ty).clone() else {
                    return false;
                };
                let strings_pkg = imp.import("strings", "strings");
                let elem_is_string = matches!(*elem_kind, ValueKind::Basic(BasicKind::String))
                    && matches!(*elem, Type::Basic(_));
                if elem_is_string {
                    let decl = if c.declare { "var " } else { "" };
                    self.w(format!("{decl}{} = {strings_pkg}.Split({}, \",\")\n", c.assign, c.value));
                    return true;
                }
                let parts = format!("parts{}", uc_first(c.name));
                let slice_ty = imp.type_string(ty);
                self.w(format!("{parts} := {strings_pkg}.Split({}, \",\")\n", c.value));
                let decl = if c.declare { "var " } else { "" };
                self.w(format!("{decl}{} = make({slice_ty}, len({parts}))\n", c.assign));
                self.w(format!("for i, s := range {parts} {{\n"));
                let item = format!("{}[i]", c.assign);
                self.write_convert_type(imp, &elem, &c.nested(&item, "s", "item", false));
                self.w("}\n");
            }
            ValueKind::Map(..) => {
                let Type::Map(key, value) = imp.universe().underlying(ty).clone() else {
                    return false;
                };
                let strings_pkg = imp.import("strings", "strings");
                let parts = format!("parts{}", uc_first(c.name));
                let map_ty = imp.type_string(ty);
                self.w(format!("{parts} := {strings_pkg}.Split({}, \",\")\n", c.value));
                let decl = if c.declare { "var " } else { "" };
                self.w(format!("{decl}{} = make({map_ty}, len({parts}))\n", c.assign));
                self.w(format!("for _, s := range {parts} {{\n"));
                self.w(format!("kv := {strings_pkg}.SplitN(s, \"=\", 2)\n"));
                self.w("if len(kv) == 2 {\n");
                self.write_convert_type(imp, &key, &c.nested("key", "kv[0]", "key", true));
                let item = format!("{}[key]", c.assign);
                self.write_convert_type(imp, &value, &c.nested(&item, "kv[1]", "val", false));
                self.w("}\n}\n");
            }
        }
        true
    }

    fn convert_basic(&mut self, imp: &mut Importer, ty: &Type, kind: BasicKind, c: &Conversion) {
        let type_name = imp.type_string(ty);
        let call = match kind {
            BasicKind::Int => Some("Atoi({v})".to_string()),
            k if k.is_signed() => Some(format!("ParseInt({{v}}, 10, {})", k.bit_size())),
            k if k.is_unsigned() => Some(format!("ParseUint({{v}}, 10, {})", k.bit_size())),
            k if k.is_float() => Some(format!("ParseFloat({{v}}, {})", k.bit_size())),
            BasicKind::Bool => Some("ParseBool({v})".to_string()),
            _ => None,
        };
        let Some(call) = call else {
            // Strings convert directly.
            let value = if type_name == "string" {
                c.value.to_string()
            } else {
                format!("{type_name}({})", c.value)
            };
            self.assign(c, &value);
            return;
        };
        let tmp = format!("{}{}", c.name, uc_first(kind.name()));
        let strconv_pkg = imp.import("strconv", "strconv");
        self.w(format!(
            "{tmp}, err := {strconv_pkg}.{}\n",
            call.replace("{v}", c.value)
        ));
        self.write_err_sink(imp, c);
        let produced = match kind {
            BasicKind::Int | BasicKind::Int64 | BasicKind::Uint64 | BasicKind::Float64 | BasicKind::Bool => {
                kind.name()
            }
            _ => "",
        };
        let value = if produced == type_name {
            tmp
        } else {
            format!("{type_name}({tmp})")
        };
        self.assign(c, &value);
    }

    fn convert_named(&mut self, imp: &mut Importer, ty: &Type, kind: &ValueKind, c: &Conversion) -> String {
        match kind {
            ValueKind::Duration => {
                let tmp = format!("{}Dur", c.name);
                let time_pkg = imp.import("time", "time");
                self.w(format!("{tmp}, err := {time_pkg}.ParseDuration({})\n", c.value));
                self.write_err_sink(imp, c);
                tmp
            }
            ValueKind::Time => {
                let tmp = format!("{}Time", c.name);
                let time_pkg = imp.import("time", "time");
                self.w(format!("{tmp}, err := {time_pkg}.Parse({time_pkg}.RFC3339, {})\n", c.value));
                self.write_err_sink(imp, c);
                tmp
            }
            ValueKind::Url => {
                let tmp = format!("{}URL", c.name);
                let url_pkg = imp.import("url", "net/url");
                self.w(format!("{tmp}, err := {url_pkg}.Parse({})\n", c.value));
                self.write_err_sink(imp, c);
                tmp
            }
            _ => {
                let tmp = format!("{}UUID", c.name);
                let (pkg_name, pkg_path) = imp
                    .universe()
                    .named_of(ty)
                    .map(|n| (n.pkg_name.clone(), n.pkg_path.clone()))
                    .unwrap_or_default();
                let uuid_pkg = imp.import(&pkg_name, &pkg_path);
                let parse = if pkg_path.contains("satori") { "FromString" } else { "Parse" };
                if pkg_path == "github.com/pborman/uuid" {
                    self.w(format!("{tmp} := {uuid_pkg}.Parse({})\n", c.value));
                    let errors_pkg = imp.import("errors", "errors");
                    self.w(format!("var err error\nif {tmp} == nil {{\nerr = {errors_pkg}.New(\"invalid UUID\")\n}}\n"));
                } else {
                    self.w(format!("{tmp}, err := {uuid_pkg}.{parse}({})\n", c.value));
                }
                self.write_err_sink(imp, c);
                tmp
            }
        }
    }

    fn assign(&mut self, c: &Conversion, value: &str) {
        if c.declare {
            self.w("var ");
        }
        self.w(format!("{} = {value}\n", c.assign));
    }

    fn write_err_sink(&mut self, imp: &mut Importer, c: &Conversion) {
        let fmt_pkg = imp.import("fmt", "fmt");
        let msg = if c.msg.is_empty() { "convert error" } else { c.msg };
        let wrapped = format!("{fmt_pkg}.Errorf({:?}, err)", format!("{msg}: %w"));
        self.write_check_err(|w| match c.sink {
            ErrSink::Return(values) => {
                let mut out: Vec<&str> = values.to_vec();
                out.push(&wrapped);
                w.w(format!("return {}\n", out.join(", ")));
            }
            ErrSink::Append(slice) => w.w(format!("{slice} = append({slice}, {wrapped})\n")),
        });
    }
}

/// Go expression rendering `value` of type `ty` as a string.
pub fn format_value(imp: &mut Importer, ty: &Type, value: &str) -> String {
    let kind = ValueKind::of(imp.universe(), ty);
    match kind {
        Some(ValueKind::Basic(kind)) => {
            match kind {
                BasicKind::String => {
                    if matches!(ty, Type::Basic(_)) {
                        value.to_string()
                    } else {
                        format!("string({value})")
                    }
                }
                BasicKind::Bool => format!("{}.FormatBool(bool({value}))", imp.import("strconv", "strconv")),
                k if k.is_signed() => format!("{}.FormatInt(int64({value}), 10)", imp.import("strconv", "strconv")),
                k if k.is_unsigned() => format!("{}.FormatUint(uint64({value}), 10)", imp.import("strconv", "strconv")),
                k if k.is_float() => format!(
                    "{}.FormatFloat(float64({value}), 'g', -1, {})",
                    imp.import("strconv", "strconv"),
                    k.bit_size()
                ),
                _ => format!("{}.Sprint({value})", imp.import("fmt", "fmt")),
            }
        }
        Some(ValueKind::Time) => {
            let time_pkg = imp.import("time", "time");
            format!("{value}.Format({time_pkg}.RFC3339)")
        }
        Some(ValueKind::Duration | ValueKind::Url | ValueKind::Uuid) => format!("{value}.String()"),
        Some(ValueKind::Slice(elem)) if *elem == ValueKind::Basic(BasicKind::String) => {
            format!("{}.Join({value}, \",\")", imp.import("strings", "strings"))
        }
        _ => format!("{}.Sprint({value})", imp.import("fmt", "fmt")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::testing;

    const SRC: &str = concat!(
        "package app\n\n",
        "import (\n\t\"net/url\"\n\t\"time\"\n\n\t\"github.com/google/uuid\"\n)\n\n",
        "type Status string\n\n",
        "type T struct {\n",
        "\tPort int\n",
        "\tRatio float32\n",
        "\tIDs []int64\n",
        "\tNames []string\n",
        "\tLabels map[string]int\n",
        "\tTimeout time.Duration\n",
        "\tHome *url.URL\n",
        "\tID uuid.UUID\n",
        "\tStatus Status\n",
        "}\n",
    );

    fn field_type(u: &Universe, name: &str) -> Type {
        let id = u.lookup_named("example.com/m/app", "T").unwrap();
        let Type::Struct(st) = &u.named(id).underlying else {
            panic!("not a struct");
        };
        st.fields.iter().find(|f| f.name == name).unwrap().ty.clone()
    }

    fn convert(field: &str, sink: ErrSink) -> (String, Vec<String>) {
        let u = testing::load(&[("app/t.go", SRC)]);
        let ty = field_type(&u, field);
        let mut imp = Importer::new(&u, "example.com/m/app");
        let mut w = GoWriter::new();
        let conversion = Conversion {
            assign: "cfg.X",
            value: "xTmp",
            name: "x",
            declare: false,
            sink,
            msg: "convert X error",
        };
        assert!(w.write_convert_type(&mut imp, &ty, &conversion));
        (w.into_string(), imp.sorted_imports())
    }

    #[test]
    fn test_convert_int_into_error_slice() {
        let (code, imports) = convert("Port", ErrSink::Append("errs"));
        assert_eq!(
            code,
            "xInt, err := strconv.Atoi(xTmp)\nif err != nil {\nerrs = append(errs, fmt.Errorf(\"convert X error: %w\", err))\n}\ncfg.X = xInt\n"
        );
        assert_eq!(imports, ["\t\"fmt\"\n", "\t\"strconv\"\n"]);
    }

    #[test]
    fn test_convert_float32_returns() {
        let (code, _) = convert("Ratio", ErrSink::Return(&["nil"]));
        assert!(code.starts_with("xFloat32, err := strconv.ParseFloat(xTmp, 32)\n"), "{code}");
        assert!(code.contains("return nil, fmt.Errorf(\"convert X error: %w\", err)\n"), "{code}");
        assert!(code.ends_with("cfg.X = float32(xFloat32)\n"), "{code}");
    }

    #[test]
    fn test_convert_slices_and_maps() {
        let (code, _) = convert("Names", ErrSink::Append("errs"));
        assert_eq!(code, "cfg.X = strings.Split(xTmp, \",\")\n");

        let (code, _) = convert("IDs", ErrSink::Append("errs"));
        assert!(code.contains("partsX := strings.Split(xTmp, \",\")\ncfg.X = make([]int64, len(partsX))\n"), "{code}");
        assert!(code.contains("itemInt64, err := strconv.ParseInt(s, 10, 64)"), "{code}");
        assert!(code.contains("cfg.X[i] = itemInt64\n"), "{code}");

        let (code, _) = convert("Labels", ErrSink::Append("errs"));
        assert!(code.contains("kv := strings.SplitN(s, \"=\", 2)"), "{code}");
        assert!(code.contains("var key = kv[0]\n"), "{code}");
        assert!(code.contains("cfg.X[key] = valInt\n"), "{code}");
    }

    #[test]
    fn test_convert_named_kinds() {
        let (code, imports) = convert("Timeout", ErrSink::Append("errs"));
        assert!(code.starts_with("xDur, err := time.ParseDuration(xTmp)\n"), "{code}");
        assert!(imports.contains(&"\t\"time\"\n".to_string()));

        let (code, _) = convert("Home", ErrSink::Append("errs"));
        assert!(code.starts_with("xURL, err := url.Parse(xTmp)\n"), "{code}");
        assert!(code.ends_with("cfg.X = xURL\n"));

        let (code, _) = convert("ID", ErrSink::Append("errs"));
        assert!(code.starts_with("xUUID, err := uuid.Parse(xTmp)\n"), "{code}");

        let (code, _) = convert("Status", ErrSink::Append("errs"));
        assert_eq!(code, "cfg.X = Status(xTmp)\n");
    }

    #[test]
    fn test_format_value() {
        let u = testing::load(&[("app/t.go", SRC)]);
        let mut imp = Importer::new(&u, "example.com/m/gen");
        assert_eq!(format_value(&mut imp, &field_type(&u, "Port"), "req.Port"), "strconv.FormatInt(int64(req.Port), 10)");
        assert_eq!(format_value(&mut imp, &field_type(&u, "Status"), "req.Status"), "string(req.Status)");
        assert_eq!(format_value(&mut imp, &field_type(&u, "ID"), "req.ID"), "req.ID.String()");
        assert_eq!(format_value(&mut imp, &field_type(&u, "Names"), "req.Names"), "strings.Join(req.Names, \",\")");
        assert_eq!(
            format_value(&mut imp, &field_type(&u, "Ratio"), "r"),
            "strconv.FormatFloat(float64(r), 'g', -1, 32)"
        );
    }
}

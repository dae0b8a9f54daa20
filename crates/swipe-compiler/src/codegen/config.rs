//! `config_gen.go`: loads a config struct from environment variables and
//! command line flags.

use std::path::PathBuf;

use super::{GenContext, Generator};
use crate::diagnostic::CompilerError;
use crate::naming::to_lower_camel;
use crate::schema::{ConfigEntry, ConfigField, ConfigSpec};
use crate::types::{BasicKind, Type};
use crate::writer::{zero_value, Conversion, ErrSink, ValueKind};

pub const FILENAME: &str = "config_gen.go";

pub struct ConfigGenerator<'s> {
    spec: &'s ConfigSpec,
}

impl<'s> ConfigGenerator<'s> {
    pub fn new(spec: &'s ConfigSpec) -> Self {
        Self { spec }
    }

    fn write_env(&self, ctx: &mut GenContext<'_, '_>, f: &ConfigField) {
        let os = ctx.importer.import("os", "os");
        let name = to_lower_camel(&f.field_path.replace('.', "_"));
        let tmp = format!("{name}Tmp");
        ctx.out.w(format!("{tmp}, ok := {os}.LookupEnv({:?})\n", f.name));
        ctx.out.w("if ok {\n");
        let assign = format!("cfg.{}", f.field_path);
        let msg = format!("convert {} error", f.name);
        ctx.out.write_convert_type(
            ctx.importer,
            &f.ty,
            &Conversion {
                assign: &assign,
                value: &tmp,
                name: &name,
                declare: false,
                sink: ErrSink::Append("errs"),
                msg: &msg,
            },
        );
        if f.required && f.use_zero {
            let errors = ctx.importer.import("errors", "errors");
            ctx.out.w(format!(
                "}} else {{\nerrs = append(errs, {errors}.New({:?}))\n",
                required_message(f)
            ));
        }
        ctx.out.w("}\n");
    }

    fn write_flag(&self, ctx: &mut GenContext<'_, '_>, f: &ConfigField) {
        let flag = ctx.importer.import("flag", "flag");
        let ValueKind::Basic(kind) = f.kind else {
            return;
        };
        let (setter, go_type) = match kind {
            BasicKind::Int => ("IntVar", "int"),
            BasicKind::Int64 => ("Int64Var", "int64"),
            BasicKind::Float64 => ("Float64Var", "float64"),
            BasicKind::Bool => ("BoolVar", "bool"),
            _ => ("StringVar", "string"),
        };
        let field = format!("cfg.{}", f.field_path);
        let (target, default) = if matches!(f.ty, Type::Basic(_)) {
            (format!("&{field}"), field)
        } else {
            (format!("(*{go_type})(&{field})"), format!("{go_type}({field})"))
        };
        ctx.out.w(format!(
            "{flag}.{setter}({target}, {:?}, {default}, {:?})\n",
            f.name, f.desc
        ));
    }

    fn write_required(&self, ctx: &mut GenContext<'_, '_>, f: &ConfigField) {
        let errors = ctx.importer.import("errors", "errors");
        let check = if f.use_zero {
            format!("!setFlags[{:?}]", f.name)
        } else {
            format!("cfg.{} == {}", f.field_path, zero_value(ctx.importer, &f.ty))
        };
        ctx.out.w(format!(
            "if {check} {{\nerrs = append(errs, {errors}.New({:?}))\n}}\n",
            required_message(f)
        ));
    }

    fn write_load(&self, ctx: &mut GenContext<'_, '_>, ty: &str) {
        ctx.out.w(format!(
            "func {}() (cfg {ty}, errs []error) {{\n",
            self.spec.func_name
        ));
        let init = ctx.importer.expr_source(&self.spec.init);
        ctx.out.w(format!("cfg = {init}\n"));

        for entry in &self.spec.entries {
            match entry {
                ConfigEntry::Alloc { field_path, ty } => {
                    let ty = ctx.importer.type_string(ty);
                    ctx.out.w(format!(
                        "if cfg.{field_path} == nil {{\ncfg.{field_path} = &{ty}{{}}\n}}\n"
                    ));
                }
                ConfigEntry::Field(f) if f.is_flag => self.write_flag(ctx, f),
                ConfigEntry::Field(f) => self.write_env(ctx, f),
            }
        }

        let flags: Vec<&ConfigField> = self.spec.fields().filter(|f| f.is_flag).collect();
        if !flags.is_empty() {
            let flag = ctx.importer.import("flag", "flag");
            ctx.out.w(format!("{flag}.Parse()\n"));
            if flags.iter().any(|f| f.required && f.use_zero) {
                ctx.out.w(format!(
                    "setFlags := map[string]bool{{}}\n{flag}.Visit(func(f *{flag}.Flag) {{ setFlags[f.Name] = true }})\n"
                ));
            }
        }
        for f in self.spec.fields() {
            if f.required && (f.is_flag || !f.use_zero) {
                self.write_required(ctx, f);
            }
        }
        ctx.out.w("return\n}\n\n");
    }

    fn write_string(&self, ctx: &mut GenContext<'_, '_>, ty: &str) {
        ctx.out.w(format!("func (cfg {ty}) String() string {{\nout := `\n"));
        let mut fields = self.spec.fields().peekable();
        if fields.peek().is_some() {
            let fmt = ctx.importer.import("fmt", "fmt");
            for f in fields {
                if f.is_flag {
                    ctx.out.w(format!("--{} ", f.name));
                } else {
                    ctx.out.w(format!("{}=", f.name));
                }
                ctx.out.w(format!("`+{fmt}.Sprintf(\"%v\", cfg.{})+`", f.field_path));
                if !f.desc.is_empty() {
                    ctx.out.w(format!(" ;{}", f.desc));
                }
                ctx.out.w("\n");
            }
        }
        ctx.out.w("`\nreturn out\n}\n\n");
    }
}

fn required_message(f: &ConfigField) -> String {
    format!("{} {} required", f.tag_name(), f.name)
}

impl Generator for ConfigGenerator<'_> {
    fn name(&self) -> &'static str {
        "config"
    }

    fn filename(&self) -> &str {
        FILENAME
    }

    fn output_dir(&self) -> PathBuf {
        self.spec.site.base_dir.clone()
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError> {
        let ty = ctx.importer.type_string(&self.spec.ty);
        self.write_load(ctx, &ty);
        self.write_string(ctx, &ty);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::{self, render};
    use crate::schema::Spec;

    const CONFIG: &str = concat!(
        "package app\n\n",
        "import \"time\"\n\n",
        "type Port int\n\n",
        "type DB struct {\n\tConn string `env:\",required\"`\n\tTimeout time.Duration\n}\n\n",
        "type Config struct {\n",
        "\tFldIntReq int `env:\",required,desc:d\"`\n",
        "\tName string `env:\",required,use_zero\"`\n",
        "\tBind string `flag:\"bind-addr\" desc:\"listen address\"`\n",
        "\tPort Port `env:\",use_flag\"`\n",
        "\tCache *DB\n",
        "}\n",
    );

    const BUILD: &str = "//go:build swipe\n\npackage app\n\nimport \"github.com/swipe-io/swipe/v2\"\n\nfunc Swipe() {\n\tswipe.Build(swipe.ConfigEnv(&Config{Name: \"x\"}))\n}\n";

    fn generate() -> (String, Vec<String>) {
        let u = testing::load(&[("app/config.go", CONFIG), ("app/swipe.go", BUILD)]);
        let Spec::Config(spec) = testing::spec(&u) else { panic!("not a config") };
        render(&u, "example.com/m/app", &ConfigGenerator::new(&spec))
    }

    #[test]
    fn test_loader() {
        let (code, imports) = generate();
        assert!(code.starts_with("func LoadConfig() (cfg *Config, errs []error) {\ncfg = &Config{Name: \"x\"}\n"), "{code}");
        assert!(code.contains(
            "fldIntReqTmp, ok := os.LookupEnv(\"FLD_INT_REQ\")\nif ok {\nfldIntReqInt, err := strconv.Atoi(fldIntReqTmp)\nif err != nil {\nerrs = append(errs, fmt.Errorf(\"convert FLD_INT_REQ error: %w\", err))\n}\ncfg.FldIntReq = fldIntReqInt\n}\n"
        ), "{code}");
        assert!(code.contains(
            "nameTmp, ok := os.LookupEnv(\"NAME\")\nif ok {\ncfg.Name = nameTmp\n} else {\nerrs = append(errs, errors.New(\"env NAME required\"))\n}\n"
        ), "{code}");
        assert!(code.contains("flag.StringVar(&cfg.Bind, \"bind-addr\", cfg.Bind, \"listen address\")\n"), "{code}");
        assert!(code.contains("flag.IntVar((*int)(&cfg.Port), \"port\", int(cfg.Port), \"\")\n"), "{code}");
        assert!(code.contains("if cfg.Cache == nil {\ncfg.Cache = &DB{}\n}\ncacheConnTmp, ok := os.LookupEnv(\"CACHE_CONN\")\n"), "{code}");
        assert!(code.contains("cacheTimeoutDur, err := time.ParseDuration(cacheTimeoutTmp)\n"), "{code}");
        assert!(code.contains(
            "flag.Parse()\nif cfg.FldIntReq == 0 {\nerrs = append(errs, errors.New(\"env FLD_INT_REQ required\"))\n}\nif cfg.Cache.Conn == \"\" {\nerrs = append(errs, errors.New(\"env CACHE_CONN required\"))\n}\nreturn\n}\n"
        ), "{code}");
        assert!(!code.contains("setFlags"), "{code}");
        assert!(imports.contains(&"\t\"flag\"\n".to_string()));
    }

    #[test]
    fn test_string_listing() {
        let (code, _) = generate();
        assert!(code.contains("func (cfg *Config) String() string {\nout := `\n"), "{code}");
        assert!(code.contains("FLD_INT_REQ=`+fmt.Sprintf(\"%v\", cfg.FldIntReq)+` ;d\n"), "{code}");
        assert!(code.contains("--bind-addr `+fmt.Sprintf(\"%v\", cfg.Bind)+` ;listen address\n"), "{code}");
        assert!(code.ends_with("`\nreturn out\n}\n\n"), "{code}");
    }
}

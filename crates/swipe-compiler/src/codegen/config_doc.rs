//! `config_doc_gen.md`: tables of the environment variables and flags a
//! config loader reads.

use std::path::PathBuf;

use super::{GenContext, Generator};
use crate::diagnostic::CompilerError;
use crate::schema::{ConfigField, ConfigSpec};

pub const FILENAME: &str = "config_doc_gen.md";

pub struct ConfigDocGenerator<'s> {
    spec: &'s ConfigSpec,
}

impl<'s> ConfigDocGenerator<'s> {
    pub fn new(spec: &'s ConfigSpec) -> Self {
        Self { spec }
    }
}

fn write_table<'a>(ctx: &mut GenContext<'_, '_>, title: &str, fields: impl Iterator<Item = &'a ConfigField>) {
    ctx.out.w(format!("## {title}\n\n"));
    ctx.out
        .w("| Name | Type | Description | Required |\n|------|------|------|------|\n");
    for f in fields {
        let desc = if f.desc.is_empty() { " " } else { f.desc.as_str() };
        let required = if f.required { "yes" } else { "no" };
        ctx.out
            .w(format!("|{}|<code>{}</code>|{desc}|{required}|\n", f.name, f.type_str));
    }
    ctx.out.w("\n");
}

impl Generator for ConfigDocGenerator<'_> {
    fn name(&self) -> &'static str {
        "config doc"
    }

    fn filename(&self) -> &str {
        FILENAME
    }

    fn output_dir(&self) -> PathBuf {
        self.spec.site.output_dir(&self.spec.doc_output)
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError> {
        ctx.out.w("# Config\n\n");
        write_table(ctx, "Environment variables", self.spec.fields().filter(|f| !f.is_flag));
        write_table(ctx, "Flags", self.spec.fields().filter(|f| f.is_flag));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::{self, render};
    use crate::schema::Spec;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tables() {
        let u = testing::load(&[
            (
                "app/config.go",
                "package app\n\ntype Config struct {\n\tFldIntReq int `env:\",required,desc:d\"`\n\tBind string `flag:\"bind\"`\n}\n",
            ),
            (
                "app/swipe.go",
                "//go:build swipe\n\npackage app\n\nimport \"github.com/swipe-io/swipe/v2\"\n\nfunc Swipe() {\n\tswipe.Build(swipe.ConfigEnv(&Config{}, swipe.ConfigEnvDocEnable(), swipe.ConfigEnvDocOutput(\"./docs\")))\n}\n",
            ),
        ]);
        let Spec::Config(spec) = testing::spec(&u) else { panic!("not a config") };
        let generator = ConfigDocGenerator::new(&spec);
        assert_eq!(generator.output_dir(), spec.site.base_dir.join("docs"));

        let (code, _) = render(&u, "example.com/m/app", &generator);
        assert_eq!(
            code,
            concat!(
                "# Config\n\n",
                "## Environment variables\n\n",
                "| Name | Type | Description | Required |\n|------|------|------|------|\n",
                "|FLD_INT_REQ|<code>int</code>|d|yes|\n\n",
                "## Flags\n\n",
                "| Name | Type | Description | Required |\n|------|------|------|------|\n",
                "|bind|<code>string</code>| |no|\n\n",
            )
        );
    }
}

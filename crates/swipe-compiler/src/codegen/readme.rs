//! `README.md` rendered from a user-editable template.
//!
//! The template lives in `.swipe/README.tpl.md` next to the build file (or
//! at `ReadmeTemplatePath`); the default one is written on first run. The
//! template sees:
//!
//! ```text
//! id, service_name, root_pkg_path,
//! jsonrpc_doc: { enabled, path },
//! git: { tags, last_tag }
//! ```

use std::path::{Path, PathBuf};
use std::process::Command;

use minijinja::{context, Environment};
use tracing::debug;

use super::jsonrpc_doc;
use super::runtime::README_TEMPLATE;
use super::{generator_error, GenContext, Generator};
use crate::config::CompilerConfig;
use crate::diagnostic::CompilerError;
use crate::schema::ServiceSpec;

pub const FILENAME: &str = "README.md";
const TEMPLATE_DIR: &str = ".swipe";
const TEMPLATE_FILE: &str = "README.tpl.md";

/// Version tags of the repository, newest first.
pub trait TagSource: Send + Sync {
    fn tags(&self, dir: &Path) -> Vec<String>;
}

/// Reads tags with `git for-each-ref`; no git, no tags.
#[derive(Debug, Default)]
pub struct GitTags;

impl TagSource for GitTags {
    fn tags(&self, dir: &Path) -> Vec<String> {
        let output = Command::new("git")
            .args(["for-each-ref", "--sort=-creatordate", "--format=%(refname:short)", "refs/tags"])
            .current_dir(dir)
            .output();
        match output {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Ok(out) => {
                debug!(status = %out.status, "git for-each-ref failed");
                Vec::new()
            }
            Err(e) => {
                debug!(error = %e, "git unavailable");
                Vec::new()
            }
        }
    }
}

pub struct ReadmeGenerator<'s> {
    spec: &'s ServiceSpec,
    tag_source: Box<dyn TagSource + 's>,
    template: String,
    tags: Vec<String>,
}

impl<'s> ReadmeGenerator<'s> {
    pub fn new(spec: &'s ServiceSpec) -> Self {
        Self {
            spec,
            tag_source: Box::new(GitTags),
            template: README_TEMPLATE.to_string(),
            tags: Vec::new(),
        }
    }

    pub fn with_tag_source(mut self, source: impl TagSource + 's) -> Self {
        self.tag_source = Box::new(source);
        self
    }

    fn template_path(&self) -> PathBuf {
        let site = &self.spec.site;
        match self.spec.readme.template_path.as_str() {
            "" => site.base_dir.join(TEMPLATE_DIR).join(TEMPLATE_FILE),
            path => site.output_dir(path),
        }
    }

    /// Loads the template, writing the default one when missing.
    fn load_template(&mut self, config: &CompilerConfig) -> Result<(), CompilerError> {
        let path = self.template_path();
        if path.is_file() {
            self.template = std::fs::read_to_string(&path).map_err(|e| CompilerError::io(&path, e.to_string()))?;
            debug!(path = %path.display(), "loaded readme template");
            return Ok(());
        }
        if !self.spec.readme.template_path.is_empty() {
            return Err(generator_error(
                &*self,
                format!("template not found: {}", path.display()),
            ));
        }
        if config.write {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir).map_err(|e| CompilerError::io(dir, e.to_string()))?;
            }
            std::fs::write(&path, README_TEMPLATE).map_err(|e| CompilerError::io(&path, e.to_string()))?;
            debug!(path = %path.display(), "wrote default readme template");
        }
        self.template = README_TEMPLATE.to_string();
        Ok(())
    }

    /// Path of the JSON-RPC reference relative to the README.
    fn doc_path(&self) -> String {
        let doc = self
            .spec
            .site
            .output_dir(&self.spec.jsonrpc.doc_output)
            .join(jsonrpc_doc::FILENAME);
        pathdiff::diff_paths(&doc, self.output_dir())
            .unwrap_or(doc)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

impl Generator for ReadmeGenerator<'_> {
    fn name(&self) -> &'static str {
        "readme"
    }

    fn filename(&self) -> &str {
        FILENAME
    }

    fn output_dir(&self) -> PathBuf {
        self.spec.site.output_dir(&self.spec.readme.output)
    }

    fn prepare(&mut self, config: &CompilerConfig) -> Result<(), CompilerError> {
        self.load_template(config)?;
        self.tags = self.tag_source.tags(&self.spec.site.work_dir);
        Ok(())
    }

    fn process(&self, ctx: &mut GenContext<'_, '_>) -> Result<(), CompilerError> {
        let mut env = Environment::new();
        env.add_template(TEMPLATE_FILE, &self.template)
            .map_err(|e| generator_error(self, e.to_string()))?;
        let template = env
            .get_template(TEMPLATE_FILE)
            .map_err(|e| generator_error(self, e.to_string()))?;
        let rendered = template
            .render(context! {
                id => &self.spec.id,
                service_name => &self.spec.name,
                root_pkg_path => &ctx.universe.module.path,
                jsonrpc_doc => context! {
                    enabled => self.spec.jsonrpc.doc_enable,
                    path => self.doc_path(),
                },
                git => context! {
                    tags => &self.tags,
                    last_tag => self.tags.first(),
                },
            })
            .map_err(|e| generator_error(self, e.to_string()))?;
        ctx.out.w(rendered);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::{self, render, swipe_file, SERVICE};
    use crate::schema::Spec;

    struct FixedTags(Vec<&'static str>);

    impl TagSource for FixedTags {
        fn tags(&self, _dir: &Path) -> Vec<String> {
            self.0.iter().map(|t| t.to_string()).collect()
        }
    }

    fn service(extra: &str) -> crate::types::Universe {
        let root = format!(
            "Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n{extra}\t\t\tswipe.ReadmeEnable(),\n\t\t)"
        );
        testing::load(&[("app/service.go", SERVICE), ("app/swipe.go", &swipe_file(&root))])
    }

    #[test]
    fn test_default_template() {
        let u = service("\t\t\tswipe.JSONRPCEnable(),\n\t\t\tswipe.JSONRPCDocEnable(),\n\t\t\tswipe.JSONRPCDocOutput(\"./docs\"),\n");
        let Spec::Service(spec) = testing::spec(&u) else { panic!("not a service") };
        let mut generator = ReadmeGenerator::new(&spec).with_tag_source(FixedTags(vec!["v1.1.0", "v1.0.0"]));
        let config = CompilerConfig {
            write: false,
            ..CompilerConfig::default()
        };
        generator.prepare(&config).unwrap();
        let (code, _) = render(&u, "example.com/m/app", &generator);

        assert!(code.contains(" : A short description of the service. <code>v1.1.0</code>"), "{code}");
        assert!(code.contains("[JSON-RPC reference](docs/jsonrpc_doc_gen.md)"), "{code}");
        assert!(code.contains(&format!(
            "[v1.1.0](https://{0}/tree/v1.1.0), [v1.0.0](https://{0}/tree/v1.0.0)",
            u.module.path
        )), "{code}");
    }

    #[test]
    fn test_custom_template_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let u = service("\t\t\tswipe.ReadmeTemplatePath(\"readme.tpl\"),\n");
        let Spec::Service(mut spec) = testing::spec(&u) else { panic!("not a service") };
        spec.site.base_dir = dir.path().to_path_buf();
        std::fs::write(dir.path().join("readme.tpl"), "{{ service_name }} has {{ git.tags | length }} tags").unwrap();

        let mut generator = ReadmeGenerator::new(&spec).with_tag_source(FixedTags(vec![]));
        generator.prepare(&CompilerConfig::default()).unwrap();
        let (code, _) = render(&u, "example.com/m/app", &generator);
        assert_eq!(code, format!("{} has 0 tags", spec.name));
    }

    #[test]
    fn test_default_template_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let u = service("");
        let Spec::Service(mut spec) = testing::spec(&u) else { panic!("not a service") };
        spec.site.base_dir = dir.path().to_path_buf();

        let mut generator = ReadmeGenerator::new(&spec).with_tag_source(FixedTags(vec![]));
        generator.prepare(&CompilerConfig::default()).unwrap();
        let written = dir.path().join(".swipe/README.tpl.md");
        assert_eq!(std::fs::read_to_string(&written).unwrap(), README_TEMPLATE);
    }

    #[test]
    fn test_missing_custom_template() {
        let dir = tempfile::tempdir().unwrap();
        let u = service("\t\t\tswipe.ReadmeTemplatePath(\"nope.tpl\"),\n");
        let Spec::Service(mut spec) = testing::spec(&u) else { panic!("not a service") };
        spec.site.base_dir = dir.path().to_path_buf();
        let mut generator = ReadmeGenerator::new(&spec).with_tag_source(FixedTags(vec![]));
        let err = generator.prepare(&CompilerConfig::default()).unwrap_err();
        assert!(err.to_string().contains("template not found"), "{err}");
    }
}

//! Drives a generation run.
//!
//! ```text
//! load ─► discover ─► generate (per site, parallel) ─► merge ─► frame ─► sweep ─► write
//! ```
//!
//! Sites never affect each other: a site that fails validation is reported
//! in [`Output::failures`] and the others still produce their files. Output
//! files are keyed by `output_dir/filename`; generators of one site that
//! target the same key append to the same buffer and share its imports.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

use crate::codegen::{GenContext, Generator};
use crate::config::CompilerConfig;
use crate::diagnostic::{CompilerError, Span};
use crate::frame::{self, FileKind, Framed};
use crate::frontend::go::GoFrontend;
use crate::frontend::Frontend;
use crate::importer::Importer;
use crate::option::{find_build_sites, BuildSite, OptionParser};
use crate::registry::Registry;
use crate::schema::SiteInfo;
use crate::types::Universe;
use crate::writer::GoWriter;

/// Shared flag that stops a run between steps.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), CompilerError> {
        if self.is_cancelled() {
            return Err(CompilerError::Cancelled);
        }
        Ok(())
    }
}

/// One output file.
#[derive(Debug, Clone)]
pub struct FileResult {
    pub pkg_path: String,
    pub output_path: PathBuf,
    pub content: String,
    /// Generator, format and write errors of this file.
    pub errs: Vec<CompilerError>,
}

/// A build site that produced no files.
#[derive(Debug, Clone)]
pub struct SiteFailure {
    pub file: PathBuf,
    pub pkg_path: String,
    pub errors: Vec<CompilerError>,
}

#[derive(Debug, Clone, Default)]
pub struct Output {
    /// Sorted by output path.
    pub results: Vec<FileResult>,
    pub failures: Vec<SiteFailure>,
}

impl Output {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.results.iter().all(|r| r.errs.is_empty())
    }

    pub fn error_count(&self) -> usize {
        self.failures.iter().map(|f| f.errors.len()).sum::<usize>()
            + self.results.iter().map(|r| r.errs.len()).sum::<usize>()
    }
}

/// A file as produced by one site, before framing.
struct Chunk {
    path: PathBuf,
    pkg_name: String,
    pkg_path: String,
    imports: Vec<String>,
    body: String,
    errs: Vec<CompilerError>,
}

struct SiteOutput {
    span: Span,
    pkg_path: String,
    base_dir: PathBuf,
    result: Result<Vec<Chunk>, Vec<CompilerError>>,
}

struct FileBuffer<'u> {
    importer: Importer<'u>,
    writer: GoWriter,
    errs: Vec<CompilerError>,
}

pub struct Orchestrator {
    config: CompilerConfig,
    registry: Registry,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            registry: Registry::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Loads the module and runs every build site in a pool of
    /// `config.jobs` threads.
    pub fn run(&self) -> Result<Output, CompilerError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs)
            .build();
        match pool {
            Ok(pool) => pool.install(|| self.run_inner()),
            Err(e) => {
                warn!(error = %e, "falling back to the global thread pool");
                self.run_inner()
            }
        }
    }

    fn run_inner(&self) -> Result<Output, CompilerError> {
        let universe = {
            let _span = info_span!("load").entered();
            let set = GoFrontend.load(&self.config)?;
            Universe::load(set)?
        };
        self.cancel.check()?;
        self.generate(&universe)
    }

    /// Runs every build site of an already loaded universe.
    pub fn generate(&self, universe: &Universe) -> Result<Output, CompilerError> {
        let sites = {
            let _span = info_span!("discover").entered();
            find_build_sites(universe)
        };
        info!(sites = sites.len(), "discovered build sites");

        let site_outputs: Vec<SiteOutput> = {
            let _span = info_span!("generate").entered();
            sites
                .par_iter()
                .map(|site| self.run_site(universe, site))
                .collect::<Result<_, _>>()?
        };

        let mut failures = Vec::new();
        let mut base_dirs = BTreeSet::new();
        let mut files: IndexMap<PathBuf, (Span, Chunk)> = IndexMap::new();
        for site in site_outputs {
            base_dirs.insert(site.base_dir.clone());
            let chunks = match site.result {
                Ok(chunks) => chunks,
                Err(errors) => {
                    failures.push(SiteFailure {
                        file: site.span.file.clone(),
                        pkg_path: site.pkg_path,
                        errors,
                    });
                    continue;
                }
            };
            let clashes: Vec<CompilerError> = chunks
                .iter()
                .filter_map(|chunk| {
                    files.get(&chunk.path).map(|(other, _)| {
                        CompilerError::semantic(
                            &site.span,
                            format!("{} is already generated by the build at {other}", chunk.path.display()),
                        )
                    })
                })
                .collect();
            if !clashes.is_empty() {
                failures.push(SiteFailure {
                    file: site.span.file.clone(),
                    pkg_path: site.pkg_path,
                    errors: clashes,
                });
                continue;
            }
            for chunk in chunks {
                files.insert(chunk.path.clone(), (site.span.clone(), chunk));
            }
        }

        self.cancel.check()?;
        let mut results: Vec<FileResult> = files
            .into_values()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(_, chunk)| self.frame(chunk))
            .collect();
        results.sort_by(|a, b| a.output_path.cmp(&b.output_path));

        if self.config.write {
            self.cancel.check()?;
            let mut dirs = base_dirs;
            dirs.extend(
                results
                    .iter()
                    .filter_map(|r| r.output_path.parent().map(Path::to_path_buf)),
            );
            self.sweep(&dirs)?;
            self.write(&mut results)?;
        }

        Ok(Output { results, failures })
    }

    fn site_info(&self, universe: &Universe, site: &BuildSite) -> SiteInfo {
        SiteInfo {
            file: site.file,
            span: site.span.clone(),
            pkg_path: site.pkg_path.clone(),
            pkg_name: site.pkg_name.clone(),
            base_dir: site.dir.clone(),
            work_dir: universe.module.root.clone(),
        }
    }

    /// Parses, validates and generates one site. Only cancellation is an
    /// error here; site problems are part of the returned output.
    fn run_site(&self, universe: &Universe, site: &BuildSite) -> Result<SiteOutput, CompilerError> {
        self.cancel.check()?;
        let result = match self.site_chunks(universe, site) {
            Ok(chunks) => Ok(chunks?),
            Err(errors) => {
                debug!(site = %site.span, errors = errors.len(), "build site failed");
                Err(errors)
            }
        };
        Ok(SiteOutput {
            span: site.span.clone(),
            pkg_path: site.pkg_path.clone(),
            base_dir: site.dir.clone(),
            result,
        })
    }

    /// The outer error is the site's failure, the inner one cancellation.
    fn site_chunks(
        &self,
        universe: &Universe,
        site: &BuildSite,
    ) -> Result<Result<Vec<Chunk>, CompilerError>, Vec<CompilerError>> {
        let one = |e: CompilerError| vec![e];
        let root = OptionParser::new(universe, site.file).parse_site(site).map_err(one)?;
        let registration = self.registry.lookup(&root.name).ok_or_else(|| {
            one(CompilerError::UnknownOption {
                name: root.name.clone(),
                span: root.span.clone(),
            })
        })?;
        let spec = (registration.validate)(universe, self.site_info(universe, site), &root)?;
        let processor = (registration.processor)();
        let generators = processor.generators(&spec).map_err(one)?;
        debug!(site = %site.span, root = %root.name, generators = generators.len(), "processing build site");
        Ok(self.run_generators(universe, site, generators))
    }

    fn run_generators<'s>(
        &self,
        universe: &Universe,
        site: &BuildSite,
        generators: Vec<Box<dyn Generator + 's>>,
    ) -> Result<Vec<Chunk>, CompilerError> {
        let mut buffers: IndexMap<PathBuf, FileBuffer<'_>> = IndexMap::new();
        for mut generator in generators {
            self.cancel.check()?;
            let path = generator.output_dir().join(generator.filename());
            debug!(generator = generator.name(), file = %path.display(), "running generator");
            let buffer = buffers.entry(path).or_insert_with(|| FileBuffer {
                importer: Importer::new(universe, site.pkg_path.clone()),
                writer: GoWriter::new(),
                errs: Vec::new(),
            });
            if let Err(e) = generator.prepare(&self.config) {
                buffer.errs.push(e);
                continue;
            }
            let mut ctx = GenContext {
                universe,
                importer: &mut buffer.importer,
                out: &mut buffer.writer,
                config: &self.config,
            };
            if let Err(e) = generator.process(&mut ctx) {
                buffer.errs.push(e);
            }
        }

        Ok(buffers
            .into_iter()
            .filter(|(_, b)| !b.writer.is_empty() || !b.errs.is_empty())
            .map(|(path, b)| Chunk {
                path,
                pkg_name: site.pkg_name.clone(),
                pkg_path: site.pkg_path.clone(),
                imports: b.importer.sorted_imports(),
                body: b.writer.into_string(),
                errs: b.errs,
            })
            .collect())
    }

    fn frame(&self, chunk: Chunk) -> FileResult {
        let Chunk {
            path,
            pkg_name,
            pkg_path,
            imports,
            body,
            mut errs,
        } = chunk;
        let Framed { content, error } = match FileKind::of(&path) {
            FileKind::Go => frame::frame_go(&path, &pkg_name, &imports, &body, &self.config),
            FileKind::Js => frame::frame_js(&path, &body, &self.config),
            kind => frame::frame_text(&path, kind, &body, &self.config),
        };
        if let Some(error) = error {
            warn!(file = %path.display(), error = %error, "formatting failed");
            errs.push(error);
        }
        FileResult {
            pkg_path,
            output_path: path,
            content,
            errs,
        }
    }

    /// Removes `*_gen.*` files from every directory the run touches.
    fn sweep(&self, dirs: &BTreeSet<PathBuf>) -> Result<(), CompilerError> {
        let _span = info_span!("sweep").entered();
        for dir in dirs {
            let pattern = format!("{}/*_gen.*", glob::Pattern::escape(&dir.to_string_lossy()));
            let entries = glob::glob(&pattern).map_err(|e| CompilerError::io(dir, e.to_string()))?;
            for entry in entries {
                let path = entry.map_err(|e| CompilerError::io(e.path(), e.error().to_string()))?;
                if !path.is_file() {
                    continue;
                }
                std::fs::remove_file(&path).map_err(|e| CompilerError::io(&path, e.to_string()))?;
                debug!(file = %path.display(), "removed stale file");
            }
        }
        Ok(())
    }

    fn write(&self, results: &mut [FileResult]) -> Result<(), CompilerError> {
        let _span = info_span!("write").entered();
        for result in results {
            self.cancel.check()?;
            match write_atomic(&result.output_path, &result.content) {
                Ok(()) => info!(file = %result.output_path.display(), "wrote file"),
                Err(message) => {
                    warn!(file = %result.output_path.display(), error = %message, "write failed");
                    result.errs.push(CompilerError::WriteFailed {
                        path: result.output_path.clone(),
                        message,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Writes through a temporary file in the same directory, then renames.
fn write_atomic(path: &Path, content: &str) -> Result<(), String> {
    let dir = path.parent().ok_or_else(|| "no parent directory".to_string())?;
    std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{name}.tmp"));
    std::fs::write(&tmp, content).map_err(|e| e.to_string())?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        e.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::testing::{swipe_file, SERVICE};
    use crate::types::testing;

    fn orchestrator(write: bool) -> Orchestrator {
        Orchestrator::new(CompilerConfig {
            js_formatter: None,
            write,
            ..CompilerConfig::default()
        })
    }

    #[test]
    fn test_dry_run_results_are_sorted() {
        let u = testing::load(&[
            ("app/service.go", SERVICE),
            (
                "app/swipe.go",
                &swipe_file("Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n\t\t\tswipe.HTTPServer(),\n\t\t)"),
            ),
        ]);
        let output = orchestrator(false).generate(&u).unwrap();
        assert!(output.failures.is_empty(), "{:?}", output.failures);
        let paths: Vec<PathBuf> = output.results.iter().map(|r| r.output_path.clone()).collect();
        assert_eq!(
            paths,
            [
                PathBuf::from("/m/app/endpoint_gen.go"),
                PathBuf::from("/m/app/http_gen.go"),
                PathBuf::from("/m/app/server_gen.go"),
            ]
        );
        assert!(output.results.iter().all(|r| r.pkg_path == "example.com/m/app"));
        assert!(output.results[0].content.contains("package app\n"));
    }

    #[test]
    fn test_failed_site_does_not_stop_others() {
        let u = testing::load(&[
            ("app/service.go", SERVICE),
            (
                "app/swipe.go",
                &swipe_file("Service(\n\t\t\tswipe.Interface((*AppI)(nil), \"\"),\n\t\t)"),
            ),
            (
                "bad/swipe.go",
                "//go:build swipe\n\npackage bad\n\nimport \"github.com/swipe-io/swipe/v2\"\n\nfunc Swipe() {\n\tswipe.Build(swipe.Gateway())\n}\n",
            ),
        ]);
        let output = orchestrator(false).generate(&u).unwrap();
        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.failures[0].pkg_path, "example.com/m/bad");
        assert!(output.results.iter().any(|r| r.output_path == Path::new("/m/app/endpoint_gen.go")));
        assert!(!output.is_success());
    }

    #[test]
    fn test_output_clash_between_sites() {
        let config = |func: &str| {
            format!(
                "//go:build swipe\n\npackage app\n\nimport \"github.com/swipe-io/swipe/v2\"\n\nfunc {func}() {{\n\tswipe.Build(swipe.ConfigEnv(&Config{{}}))\n}}\n"
            )
        };
        let u = testing::load(&[
            ("app/config.go", "package app\n\ntype Config struct {\n\tName string\n}\n"),
            ("app/swipe_a.go", &config("SwipeA")),
            ("app/swipe_b.go", &config("SwipeB")),
        ]);
        let output = orchestrator(false).generate(&u).unwrap();
        assert_eq!(output.results.len(), 1);
        assert_eq!(output.failures.len(), 1);
        assert!(output.failures[0].file.ends_with("swipe_b.go"));
        assert!(output.failures[0].errors[0].to_string().contains("is already generated by the build at"));
    }

    #[test]
    fn test_cancelled_run() {
        let u = testing::load(&[("app/service.go", SERVICE)]);
        let orchestrator = orchestrator(false);
        orchestrator.cancellation_token().cancel();
        assert!(matches!(orchestrator.generate(&u), Err(CompilerError::Cancelled)));
    }

    #[test]
    fn test_write_atomic_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs/api/openapi_gen.json");
        write_atomic(&path, "{}\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}\n");
        assert!(!dir.path().join("docs/api/.openapi_gen.json.tmp").exists());
    }
}

//! Go frontend: package discovery and parsing.

pub mod ast;
pub mod parser;
pub mod printer;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::CompilerConfig;
use crate::diagnostic::{CompilerError, Span};
use super::{Frontend, SourceSet};
use ast::ParsedFile;
pub use parser::{unquote, GoParser};

/// The Go module the run is rooted at.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub root: PathBuf,
    /// Module path from the `module` directive of go.mod.
    pub path: String,
}

impl ModuleInfo {
    /// Reads go.mod in `dir`.
    pub fn read(dir: &Path) -> Result<Self, CompilerError> {
        let gomod = dir.join("go.mod");
        let source = std::fs::read_to_string(&gomod).map_err(|_| CompilerError::ModuleNotFound {
            dir: dir.to_path_buf(),
        })?;
        let path = source
            .lines()
            .find_map(|line| line.trim().strip_prefix("module "))
            .map(|m| m.trim().trim_matches('"').to_string())
            .ok_or_else(|| CompilerError::SyntaxError {
                message: "go.mod has no module directive".to_string(),
                span: Span::new(gomod.clone(), 1, 1, 1, 1),
            })?;
        Ok(Self {
            root: dir.to_path_buf(),
            path,
        })
    }

    /// Import path of a directory inside the module.
    pub fn import_path(&self, dir: &Path) -> String {
        match pathdiff::diff_paths(dir, &self.root) {
            Some(rel) if rel.as_os_str().is_empty() || rel == Path::new(".") => self.path.clone(),
            Some(rel) => {
                let rel = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                format!("{}/{}", self.path, rel)
            }
            None => self.path.clone(),
        }
    }
}

/// One Go package: all files of a directory that pass the build constraints.
#[derive(Debug, Clone)]
pub struct GoPackage {
    pub name: String,
    pub path: String,
    pub dir: PathBuf,
    pub files: Vec<ParsedFile>,
}

/// Go frontend implementation.
pub struct GoFrontend;

impl Frontend for GoFrontend {
    fn language(&self) -> &str {
        "go"
    }

    fn extensions(&self) -> &[&str] {
        &["go"]
    }

    fn load(&self, config: &CompilerConfig) -> Result<SourceSet, CompilerError> {
        let module = ModuleInfo::read(&config.work_dir)?;
        let dirs = discover_dirs(&config.work_dir, &config.patterns)?;
        let tags = [config.build_tag.as_str()];

        let files: Vec<PathBuf> = dirs
            .iter()
            .flat_map(|dir| go_files(dir))
            .collect();

        let parsed: Vec<Result<Option<ParsedFile>, CompilerError>> = files
            .par_iter()
            .map_init(GoParser::new, |parser, path| -> Result<Option<ParsedFile>, CompilerError> {
                let parser = parser.as_mut().map_err(|e| e.clone())?;
                let source = std::fs::read_to_string(path)
                    .map_err(|e| CompilerError::io(path, e.to_string()))?;
                let file = parser.parse(&source, path)?;
                let keep = file
                    .build_constraint
                    .as_deref()
                    .map_or(true, |c| eval_constraint(c, &tags));
                Ok(keep.then_some(file))
            })
            .collect();

        let mut errors = Vec::new();
        let mut by_dir: BTreeMap<PathBuf, Vec<ParsedFile>> = BTreeMap::new();
        for result in parsed {
            match result {
                Ok(Some(file)) => {
                    let dir = file.path.parent().map(Path::to_path_buf).unwrap_or_default();
                    by_dir.entry(dir).or_default().push(file);
                }
                Ok(None) => {}
                Err(e) => errors.push(e),
            }
        }

        let mut packages = Vec::new();
        for (dir, mut files) in by_dir {
            files.sort_by(|a, b| a.path.cmp(&b.path));
            let name = files[0].package.name.clone();
            if let Some(other) = files.iter().find(|f| f.package.name != name) {
                errors.push(CompilerError::type_error(
                    &other.package.span,
                    format!("found packages {} and {} in {}", name, other.package.name, dir.display()),
                ));
                continue;
            }
            let path = module.import_path(&dir);
            debug!(package = %path, files = files.len(), "loaded package");
            packages.push(GoPackage { name, path, dir, files });
        }

        if !errors.is_empty() {
            errors.sort_by(|a, b| a.span().cmp(&b.span()));
            return Err(CompilerError::LoadFailed { errors });
        }
        if packages.is_empty() {
            return Err(CompilerError::NoPackages {
                patterns: config.patterns.clone(),
            });
        }

        Ok(SourceSet { module, packages })
    }
}

fn skip_dir(name: &str) -> bool {
    name == "vendor" || name == "testdata" || name.starts_with('.') || name.starts_with('_')
}

/// Resolves package patterns to directories. `./...` matches recursively.
pub fn discover_dirs(work_dir: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, CompilerError> {
    let mut dirs = Vec::new();
    for pattern in patterns {
        let (base, recursive) = match pattern.strip_suffix("...") {
            Some(base) => (base.trim_end_matches('/'), true),
            None => (pattern.as_str(), false),
        };
        let base = base.trim_start_matches("./").trim_end_matches('/');
        let root = if base.is_empty() || base == "." {
            work_dir.to_path_buf()
        } else {
            work_dir.join(base)
        };
        if !root.is_dir() {
            return Err(CompilerError::io(root, "no such directory"));
        }
        if !recursive {
            dirs.push(root);
            continue;
        }
        for entry in WalkDir::new(&root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !(e.file_type().is_dir() && skip_dir(&e.file_name().to_string_lossy()))
            })
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_dir() {
                dirs.push(entry.into_path());
            }
        }
    }
    dirs.sort();
    dirs.dedup();
    Ok(dirs)
}

fn go_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            p.is_file() && name.ends_with(".go") && !name.ends_with("_test.go") && !name.starts_with('.')
        })
        .collect();
    files.sort();
    files
}

/// Evaluates a `//go:build` expression or a `// +build` line against the
/// active tags. Release tags (`go1.N`) and the common platform tags are
/// always satisfied.
pub fn eval_constraint(expr: &str, tags: &[&str]) -> bool {
    let is_set = |tag: &str| {
        tags.contains(&tag)
            || tag.starts_with("go1.")
            || matches!(tag, "gc" | "unix" | "linux" | "amd64")
    };
    if expr.contains("&&") || expr.contains("||") || expr.contains('(') {
        let tokens = tokenize(expr);
        let mut pos = 0;
        return parse_or(&tokens, &mut pos, &is_set);
    }
    // Legacy form: space separated alternatives of comma separated terms.
    expr.split_whitespace().any(|alt| {
        alt.split(',').all(|term| match term.strip_prefix('!') {
            Some(tag) => !is_set(tag),
            None => is_set(term),
        })
    })
}

fn tokenize(expr: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' => {}
            '(' | ')' | '!' => tokens.push(c.to_string()),
            '&' | '|' => {
                chars.next();
                tokens.push(format!("{c}{c}"));
            }
            _ => {
                let mut word = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_alphanumeric() || n == '_' || n == '.' {
                        word.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(word);
            }
        }
    }
    tokens
}

fn parse_or(tokens: &[String], pos: &mut usize, is_set: &dyn Fn(&str) -> bool) -> bool {
    let mut value = parse_and(tokens, pos, is_set);
    while tokens.get(*pos).map(String::as_str) == Some("||") {
        *pos += 1;
        let rhs = parse_and(tokens, pos, is_set);
        value = value || rhs;
    }
    value
}

fn parse_and(tokens: &[String], pos: &mut usize, is_set: &dyn Fn(&str) -> bool) -> bool {
    let mut value = parse_unary(tokens, pos, is_set);
    while tokens.get(*pos).map(String::as_str) == Some("&&") {
        *pos += 1;
        let rhs = parse_unary(tokens, pos, is_set);
        value = value && rhs;
    }
    value
}

fn parse_unary(tokens: &[String], pos: &mut usize, is_set: &dyn Fn(&str) -> bool) -> bool {
    let Some(token) = tokens.get(*pos) else {
        return false;
    };
    *pos += 1;
    match token.as_str() {
        "!" => !parse_unary(tokens, pos, is_set),
        "(" => {
            let value = parse_or(tokens, pos, is_set);
            if tokens.get(*pos).map(String::as_str) == Some(")") {
                *pos += 1;
            }
            value
        }
        tag => is_set(tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_eval_constraint() {
        assert!(eval_constraint("swipe", &["swipe"]));
        assert!(!eval_constraint("!swipe", &["swipe"]));
        assert!(eval_constraint("!swipe", &[]));
        assert!(eval_constraint("swipe && (linux || darwin)", &["swipe"]));
        assert!(!eval_constraint("swipe && windows", &["swipe"]));
        assert!(eval_constraint("windows swipe", &["swipe"]));
        assert!(!eval_constraint("swipe,!linux", &["swipe"]));
    }

    #[test]
    fn test_import_path() {
        let module = ModuleInfo {
            root: PathBuf::from("/src/app"),
            path: "example.com/app".to_string(),
        };
        assert_eq!(module.import_path(Path::new("/src/app")), "example.com/app");
        assert_eq!(module.import_path(Path::new("/src/app/pkg/api")), "example.com/app/pkg/api");
    }

    #[test]
    fn test_load_skips_constrained_and_test_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(root.join("go.mod"), "module example.com/demo\n\ngo 1.21\n").unwrap();
        std::fs::create_dir_all(root.join("app")).unwrap();
        std::fs::create_dir_all(root.join("vendor/x")).unwrap();
        std::fs::write(root.join("app/service.go"), "package app\n\ntype A struct{}\n").unwrap();
        std::fs::write(root.join("app/service_test.go"), "package app_test\n").unwrap();
        std::fs::write(root.join("app/gen.go"), "//go:build !swipe\n\npackage app\n").unwrap();
        std::fs::write(root.join("vendor/x/x.go"), "package x\n").unwrap();

        let set = GoFrontend.load(&CompilerConfig::new(root)).unwrap();
        assert_eq!(set.module.path, "example.com/demo");
        assert_eq!(set.packages.len(), 1);
        assert_eq!(set.packages[0].path, "example.com/demo/app");
        assert_eq!(set.packages[0].files.len(), 1);
    }

    #[test]
    fn test_missing_go_mod() {
        let dir = TempDir::new().unwrap();
        let err = GoFrontend.load(&CompilerConfig::new(dir.path())).unwrap_err();
        assert!(matches!(err, CompilerError::ModuleNotFound { .. }));
    }
}

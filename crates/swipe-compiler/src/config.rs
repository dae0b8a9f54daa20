//! Compiler configuration.

use std::path::PathBuf;

/// Configuration for a generation run.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Root of the Go module (the directory containing go.mod).
    pub work_dir: PathBuf,

    /// Package patterns relative to `work_dir` (`./...`, `./app`).
    pub patterns: Vec<String>,

    /// Extra environment passed to formatter subprocesses.
    pub env: Vec<(String, String)>,

    /// Build tag that marks generator-only source files.
    pub build_tag: String,

    /// Tool version written into the "do not edit" banner.
    pub version: String,

    /// Command line of the JS formatter. Reads stdin, writes stdout.
    pub js_formatter: Option<Vec<String>>,

    /// Command line of an external Go formatter (`gofmt`) run after the
    /// built-in layout pass. Reads stdin, writes stdout. When it fails the
    /// built-in layout is kept.
    pub go_formatter: Option<Vec<String>>,

    /// Worker threads for parsing and generation (0: one per core).
    pub jobs: usize,

    /// Write results to disk and sweep stale files. Disabled for dry runs.
    pub write: bool,
}

impl CompilerConfig {
    /// Configuration rooted at `work_dir` with default settings.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            patterns: vec!["./...".to_string()],
            env: Vec::new(),
            build_tag: "swipe".to_string(),
            version: format!("v{}", env!("CARGO_PKG_VERSION")),
            js_formatter: Some(vec![
                "prettier".to_string(),
                "--parser".to_string(),
                "babel".to_string(),
            ]),
            go_formatter: None,
            jobs: 0,
            write: true,
        }
    }
}

//! Framing of generated files: banner, package clause, imports and the
//! formatter pass.
//!
//! Framing never loses output. When formatting fails the unformatted text
//! is returned together with the error so it can be inspected.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::config::CompilerConfig;
use crate::diagnostic::CompilerError;
use crate::writer::format_go;

/// Output language, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Go,
    Js,
    Markdown,
    Json,
    Text,
}

impl FileKind {
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("go") => Self::Go,
            Some("js") => Self::Js,
            Some("md") => Self::Markdown,
            Some("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// A framed file. `error` is set when the formatter rejected the content.
#[derive(Debug, Clone)]
pub struct Framed {
    pub content: String,
    pub error: Option<CompilerError>,
}

/// Go source files: build guard, banner, package clause, import block.
pub fn frame_go(path: &Path, pkg_name: &str, imports: &[String], body: &str, config: &CompilerConfig) -> Framed {
    let tag = &config.build_tag;
    let mut src = String::with_capacity(body.len() + 256);
    src.push_str(&format!("//go:build !{tag}\n// +build !{tag}\n\n"));
    src.push_str(&banner_line("//", config));
    src.push_str(&format!("package {pkg_name}\n\n"));
    if !imports.is_empty() {
        src.push_str("import (\n");
        for import in imports {
            src.push_str(import);
        }
        src.push_str(")\n\n");
    }
    src.push_str(body);

    let content = match format_go(&src) {
        Ok(content) => content,
        Err(message) => {
            return Framed {
                content: src,
                error: Some(CompilerError::FormatFailed {
                    path: path.to_path_buf(),
                    message,
                }),
            }
        }
    };
    let Some(command) = config.go_formatter.as_deref().filter(|c| !c.is_empty()) else {
        return Framed { content, error: None };
    };
    match run_formatter(command, &content, config) {
        Ok(formatted) => Framed {
            content: formatted,
            error: None,
        },
        Err(message) => Framed {
            content,
            error: Some(CompilerError::FormatFailed {
                path: path.to_path_buf(),
                message,
            }),
        },
    }
}

/// JavaScript files go through the configured formatter subprocess.
pub fn frame_js(path: &Path, body: &str, config: &CompilerConfig) -> Framed {
    let src = format!("{}{body}", banner_line("//", config));
    let Some(command) = config.js_formatter.as_deref().filter(|c| !c.is_empty()) else {
        return Framed { content: src, error: None };
    };
    match run_formatter(command, &src, config) {
        Ok(content) => Framed { content, error: None },
        Err(message) => Framed {
            content: src,
            error: Some(CompilerError::FormatFailed {
                path: path.to_path_buf(),
                message,
            }),
        },
    }
}

/// Markdown and JSON. Generated markdown gets an HTML comment banner, JSON
/// has no comment syntax and other files are user facing.
pub fn frame_text(path: &Path, kind: FileKind, body: &str, config: &CompilerConfig) -> Framed {
    let generated = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains("_gen."));
    let content = if kind == FileKind::Markdown && generated {
        format!(
            "<!-- Code generated by Swipe {}. DO NOT EDIT. -->\n\n{body}",
            config.version
        )
    } else {
        body.to_string()
    };
    Framed { content, error: None }
}

fn banner_line(comment: &str, config: &CompilerConfig) -> String {
    format!("{comment} Code generated by Swipe {}. DO NOT EDIT.\n\n", config.version)
}

fn run_formatter(command: &[String], src: &str, config: &CompilerConfig) -> Result<String, String> {
    let (program, args) = command.split_first().ok_or_else(|| "empty formatter command".to_string())?;
    debug!(formatter = %program, "running formatter");
    let mut child = Command::new(program)
        .args(args)
        .envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .current_dir(&config.work_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("{program}: {e}"))?;

    // stdin is fed from another thread while stdout is drained.
    let mut stdin = child.stdin.take().ok_or_else(|| format!("{program}: stdin unavailable"))?;
    let input = src.to_string();
    let writer = std::thread::spawn(move || stdin.write_all(input.as_bytes()));

    let output = child.wait_with_output().map_err(|e| format!("{program}: {e}"))?;
    writer
        .join()
        .map_err(|_| format!("{program}: stdin writer panicked"))?
        .map_err(|e| format!("{program}: {e}"))?;

    if !output.status.success() {
        return Err(format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    String::from_utf8(output.stdout).map_err(|e| format!("{program}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn config() -> CompilerConfig {
        CompilerConfig {
            version: "v2.0.0".to_string(),
            js_formatter: None,
            ..CompilerConfig::default()
        }
    }

    #[test]
    fn test_frame_go() {
        let imports = vec!["\t\"context\"\n".to_string(), "\tkithttp \"github.com/go-kit/kit/transport/http\"\n".to_string()];
        let framed = frame_go(
            Path::new("/m/app/endpoint_gen.go"),
            "app",
            &imports,
            "func f() {\nreturn\n}\n",
            &config(),
        );
        assert!(framed.error.is_none());
        assert_eq!(
            framed.content,
            concat!(
                "//go:build !swipe\n// +build !swipe\n\n",
                "// Code generated by Swipe v2.0.0. DO NOT EDIT.\n\n",
                "package app\n\n",
                "import (\n\t\"context\"\n\tkithttp \"github.com/go-kit/kit/transport/http\"\n)\n\n",
                "func f() {\n\treturn\n}\n",
            )
        );
    }

    #[test]
    fn test_frame_go_keeps_unformatted_on_error() {
        let framed = frame_go(Path::new("/m/a_gen.go"), "app", &[], "func f() {\n", &config());
        assert!(framed.content.ends_with("func f() {\n"));
        assert!(matches!(framed.error, Some(CompilerError::FormatFailed { .. })));
    }

    #[test]
    fn test_frame_go_external_formatter_failure_keeps_layout() {
        let config = CompilerConfig {
            go_formatter: Some(vec!["swipe-no-such-gofmt".to_string()]),
            work_dir: PathBuf::from("."),
            ..config()
        };
        let framed = frame_go(Path::new("/m/a_gen.go"), "app", &[], "func f() {\nreturn\n}\n", &config);
        assert!(framed.content.ends_with("func f() {\n\treturn\n}\n"), "{}", framed.content);
        assert!(matches!(framed.error, Some(CompilerError::FormatFailed { .. })));
    }

    #[test]
    fn test_frame_js_without_formatter() {
        let framed = frame_js(Path::new("/m/client_jsonrpc_gen.js"), "export default 1;\n", &config());
        assert_eq!(framed.content, "// Code generated by Swipe v2.0.0. DO NOT EDIT.\n\nexport default 1;\n");
    }

    #[test]
    fn test_frame_js_formatter_failure_keeps_source() {
        let config = CompilerConfig {
            js_formatter: Some(vec!["swipe-no-such-formatter".to_string()]),
            work_dir: PathBuf::from("."),
            ..config()
        };
        let framed = frame_js(Path::new("/m/c_gen.js"), "let a = 1;\n", &config);
        assert!(framed.content.ends_with("let a = 1;\n"));
        assert!(framed.error.is_some());
    }

    #[test]
    fn test_frame_markdown_banner_only_for_generated() {
        let doc = frame_text(Path::new("/m/docs/jsonrpc_doc_gen.md"), FileKind::Markdown, "# A\n", &config());
        assert!(doc.content.starts_with("<!-- Code generated by Swipe v2.0.0. DO NOT EDIT. -->"));
        let readme = frame_text(Path::new("/m/README.md"), FileKind::Markdown, "# A\n", &config());
        assert_eq!(readme.content, "# A\n");
        assert_eq!(FileKind::of(Path::new("x/openapi_gen.json")), FileKind::Json);
    }
}

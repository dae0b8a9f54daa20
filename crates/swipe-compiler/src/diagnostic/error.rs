//! Compiler error types.
#![allow(unused_assignments)]

use std::path::PathBuf;
use miette::Diagnostic;
use thiserror::Error;

use super::Span;

/// Errors that can occur while generating code.
#[allow(unused_assignments)]
#[derive(Error, Diagnostic, Debug, Clone)]
pub enum CompilerError {
    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("Failed to read file '{path}': {message}")]
    #[diagnostic(code(swipe::io::read_error))]
    IoError {
        path: PathBuf,
        message: String,
    },

    #[error("Failed to write file '{path}': {message}")]
    #[diagnostic(code(swipe::io::write_error))]
    WriteFailed {
        path: PathBuf,
        message: String,
    },

    // =========================================================================
    // Load Errors
    // =========================================================================
    #[error("Failed to initialize parser")]
    #[diagnostic(code(swipe::load::init_failed))]
    ParserInitFailed,

    #[error("Failed to parse file: {}", path.display())]
    #[diagnostic(code(swipe::load::parse_failed))]
    ParseFailed {
        path: PathBuf,
    },

    #[error("{span}: syntax error: {message}")]
    #[diagnostic(code(swipe::load::syntax_error))]
    SyntaxError {
        message: String,
        span: Span,
    },

    #[error("{span}: {message}")]
    #[diagnostic(code(swipe::load::type_error))]
    TypeError {
        message: String,
        span: Span,
    },

    #[error("go.mod not found in '{}'", dir.display())]
    #[diagnostic(
        code(swipe::load::module_not_found),
        help("Run swipe from the root of a Go module (the directory containing go.mod)")
    )]
    ModuleNotFound {
        dir: PathBuf,
    },

    #[error("No packages matched patterns: {}", patterns.join(", "))]
    #[diagnostic(code(swipe::load::no_packages))]
    NoPackages {
        patterns: Vec<String>,
    },

    #[error("Failed to load packages ({} error(s))", errors.len())]
    #[diagnostic(code(swipe::load::failed))]
    LoadFailed {
        #[related]
        errors: Vec<CompilerError>,
    },

    // =========================================================================
    // Option Errors
    // =========================================================================
    #[error("{span}: {message}")]
    #[diagnostic(code(swipe::option::shape))]
    OptionShape {
        message: String,
        span: Span,
    },

    #[error("{span}: {message}")]
    #[diagnostic(code(swipe::option::semantic))]
    OptionSemantic {
        message: String,
        span: Span,
    },

    #[error("{span}: unknown option: {name}")]
    #[diagnostic(
        code(swipe::option::unknown),
        help("Root options are: Service, ConfigEnv, Gateway")
    )]
    UnknownOption {
        name: String,
        span: Span,
    },

    #[error("option not suitable for processor: {processor} (got {spec})")]
    #[diagnostic(code(swipe::option::processor_mismatch))]
    ProcessorMismatch {
        processor: String,
        spec: String,
    },

    // =========================================================================
    // Generation Errors
    // =========================================================================
    #[error("generator {generator}: {message}")]
    #[diagnostic(code(swipe::codegen::generation_failed))]
    Generator {
        generator: String,
        message: String,
    },

    #[error("Failed to format '{}': {message}", path.display())]
    #[diagnostic(
        code(swipe::codegen::format_failed),
        help("The unformatted output was kept so the problem can be inspected")
    )]
    FormatFailed {
        path: PathBuf,
        message: String,
    },

    #[error("Generation cancelled")]
    #[diagnostic(code(swipe::orchestrator::cancelled))]
    Cancelled,
}

impl CompilerError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::IoError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn shape(span: &Span, message: impl Into<String>) -> Self {
        Self::OptionShape {
            message: message.into(),
            span: span.clone(),
        }
    }

    pub fn semantic(span: &Span, message: impl Into<String>) -> Self {
        Self::OptionSemantic {
            message: message.into(),
            span: span.clone(),
        }
    }

    pub fn type_error(span: &Span, message: impl Into<String>) -> Self {
        Self::TypeError {
            message: message.into(),
            span: span.clone(),
        }
    }

    pub fn generator(generator: &str, message: impl Into<String>) -> Self {
        Self::Generator {
            generator: generator.to_string(),
            message: message.into(),
        }
    }

    /// Source position of the error, if it has one.
    pub fn span(&self) -> Option<&Span> {
        match self {
            Self::SyntaxError { span, .. }
            | Self::TypeError { span, .. }
            | Self::OptionShape { span, .. }
            | Self::OptionSemantic { span, .. }
            | Self::UnknownOption { span, .. } => Some(span),
            _ => None,
        }
    }
}

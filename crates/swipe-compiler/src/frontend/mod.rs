//! Language frontends for loading source packages.
//!
//! A frontend is responsible for:
//! 1. Discovering the packages matched by the configured patterns
//! 2. Parsing their files into an owned AST
//!
//! Type checking happens afterwards, in [`crate::types`].

pub mod go;

use crate::config::CompilerConfig;
use crate::diagnostic::CompilerError;
use go::{GoPackage, ModuleInfo};

/// Parsed packages of one module.
#[derive(Debug, Clone)]
pub struct SourceSet {
    pub module: ModuleInfo,
    pub packages: Vec<GoPackage>,
}

/// Trait for language frontends.
pub trait Frontend {
    /// Returns the language name.
    fn language(&self) -> &str;

    /// Returns file extensions this frontend handles.
    fn extensions(&self) -> &[&str];

    /// Loads every package matched by the configured patterns.
    fn load(&self, config: &CompilerConfig) -> Result<SourceSet, CompilerError>;
}

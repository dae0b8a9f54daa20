//! # Swipe Compiler
//!
//! This crate generates go-kit transport code, clients, documentation and
//! config loaders from option expressions written in Go. A build
//! configuration file holds an exported function whose body is a single
//! `swipe.Build(...)` call; its argument describes what to generate.
//!
//! ## Architecture
//!
//! ```text
//! Go module
//!        │
//!        ▼
//! ┌──────────────┐
//! │   Frontend   │  tree-sitter-go → owned AST
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │    Types     │  Universe: named types, method sets, enums, comments
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │    Option    │  Build(...) call → OptionNode tree
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │    Schema    │  OptionNode → Spec (Service, ConfigEnv, Gateway)
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │   Codegen    │  Spec → generators → framed files
//! └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use swipe_compiler::{CompilerConfig, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(CompilerConfig::new("."));
//! let output = orchestrator.run()?;
//! for result in &output.results {
//!     println!("{}", result.output_path.display());
//! }
//! ```

pub mod codegen;
pub mod config;
pub mod diagnostic;
pub mod frame;
pub mod frontend;
pub mod importer;
pub mod naming;
pub mod option;
pub mod orchestrator;
pub mod registry;
pub mod schema;
pub mod types;
pub mod writer;

pub use config::CompilerConfig;
pub use diagnostic::CompilerError;
pub use orchestrator::{CancellationToken, FileResult, Orchestrator, Output, SiteFailure};

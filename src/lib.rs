//! Technique – compile and run concurrent procedures
//!
//! This crate implements the Technique procedure language with:
//! - A parser for procedure files and a syntax tree with byte offsets
//! - A single-pass translator into an executable step representation
//! - Caret-anchored diagnostics with stable exit codes
//! - A tokio evaluator where every binding runs as its own task
//! - A builtin registry for host-provided operations and combinators

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Compilation into executable steps
pub mod compiler;
/// Concrete syntax and parsing
pub mod language;
/// Diagnostics for compile-time failures
pub mod problem;
/// Evaluation of compiled procedures
pub mod runtime;

// Re-export key types for convenience
pub use compiler::{Subroutine, compile};
pub use problem::{CompilationError, FailureReason, Source};
pub use runtime::{Evaluator, Registry, RuntimeConfig, RuntimeFailure, Value};

/// Current version of the Technique crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Lowering from concrete syntax to executable steps.
//!
//! The translator walks a procedure's statements in a single pass, resolving
//! every identifier to a collision-free [`Name`] and every application to a
//! declared procedure or a registered builtin. The first failure aborts the
//! whole translation.

/// Internal representation produced by translation.
pub mod ir;
/// Scope handling and the lowering pass.
pub mod translate;

pub use ir::{Callee, Known, Library, Name, Sequence, Step, Subroutine};
pub use translate::{Environment, compile, translate, translate_technique};

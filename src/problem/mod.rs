//! Diagnostics for parse and compile failures.
//!
//! Every reportable failure is a [`CompilationError`]: a [`Source`] anchor
//! paired with a [`FailureReason`]. [`render`] turns one into the
//! caret-marked text shown to users, and [`from_parse_errors`] folds a parser
//! failure into the same shape.

/// Failure taxonomy and the compilation error type.
pub mod failure;
/// Caret rendering and parse error adaptation.
pub mod render;
/// Source position anchors.
pub mod source;

pub use failure::{CompilationError, FailureReason, describe_item};
pub use render::{from_parse_errors, render};
pub use source::Source;

impl CompilationError {
    /// Render this error for display. See [`render`].
    pub fn render(&self) -> String {
        render::render(self)
    }
}

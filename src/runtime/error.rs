//! Error types for procedure evaluation

use thiserror::Error;

use super::value::Value;
use crate::language::Identifier;

/// Failure raised while evaluating a procedure.
///
/// Failures are cloned to every task that depended on the failing one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeFailure {
    /// A builtin reported an error.
    #[error("{builtin}: {message}")]
    Builtin {
        /// Builtin that failed
        builtin: Identifier,
        /// Description from the builtin
        message: String,
    },

    /// A value could not be split across the names bound to it.
    #[error("cannot bind {expected} names to {found} values")]
    Destructure {
        /// Number of names being bound
        expected: usize,
        /// Number of values available
        found: usize,
    },

    /// The task producing a value was cancelled before finishing.
    #[error("task was cancelled before completing")]
    Cancelled,
}

impl RuntimeFailure {
    /// Failure reported by the named builtin.
    pub fn builtin(builtin: &str, message: impl Into<String>) -> Self {
        RuntimeFailure::Builtin {
            builtin: Identifier::new(builtin),
            message: message.into(),
        }
    }
}

/// Result of evaluating a step
pub type Outcome = std::result::Result<Value, RuntimeFailure>;

//! Evaluation of compiled procedures
//!
//! The [`Evaluator`] runs a [`Subroutine`](crate::compiler::Subroutine) on
//! tokio, resolving external steps through a builtin [`Registry`]. Results
//! are [`Value`]s and failures are [`RuntimeFailure`]s.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod registry;
pub mod value;

pub use config::{RuntimeConfig, load_config, load_or_init_config, write_config};
pub use error::{Outcome, RuntimeFailure};
pub use evaluator::Evaluator;
pub use registry::{Builtin, Registry, combinator_name, merge};
pub use value::Value;

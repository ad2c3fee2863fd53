//! Concrete syntax for Technique procedures.
//!
//! A Technique file is a sequence of procedure declarations. Each procedure
//! holds a block of statements: assignments binding names to expressions,
//! expressions executed for effect, nested procedure declarations, and
//! comments. Expressions include literals, procedure application, role
//! restrictions, and the `|` / `&` / `+` combinators.

/// Syntax tree definitions.
pub mod ast;
/// Parser for the surface syntax.
pub mod parser;

pub use ast::{
    Attribute, Binding, Block, Expression, Identifier, Label, Operator, Procedure, Quantity,
    Statement, Tablet, Technique,
};
pub use parser::{ErrorItem, ParseError, ParseErrorBundle, parse_technique};

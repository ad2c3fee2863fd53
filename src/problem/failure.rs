use std::collections::BTreeSet;

use thiserror::Error;

use super::source::Source;
use crate::language::{ErrorItem, Identifier};

/// Why a compilation failed. Variant order is the exit code order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// Placeholder for a translation that was never set up.
    #[error("Invalid setup! How did we get here?")]
    InvalidSetup,

    /// The parser rejected the input.
    #[error("{}", describe_parse_failure(.0, .1))]
    ParsingFailed(BTreeSet<ErrorItem>, BTreeSet<ErrorItem>),

    /// An identifier was bound twice in one scope.
    #[error("Variable by the name of '{0}' already defined.")]
    VariableAlreadyInUse(Identifier),

    /// A procedure name was declared twice in one scope.
    #[error("Procedure by the name of '{0}' already declared.")]
    ProcedureAlreadyDeclared(Identifier),

    /// Application of a name that is neither declared nor builtin.
    #[error("Call to unknown procedure '{0}'.")]
    CallToUnknownProcedure(Identifier),

    /// Reference to a variable that is not bound in scope.
    #[error("Variable '{0}' not in scope.")]
    UseOfUnknownIdentifier(Identifier),

    /// A hole (`undefined`) where a value was required.
    #[error("Found an undefined symbol. Did you mean to leave this here?")]
    EncounteredUndefined,
}

impl FailureReason {
    /// Process exit code: the variant's position, starting at 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            FailureReason::InvalidSetup => 1,
            FailureReason::ParsingFailed(..) => 2,
            FailureReason::VariableAlreadyInUse(_) => 3,
            FailureReason::ProcedureAlreadyDeclared(_) => 4,
            FailureReason::CallToUnknownProcedure(_) => 5,
            FailureReason::UseOfUnknownIdentifier(_) => 6,
            FailureReason::EncounteredUndefined => 7,
        }
    }

    /// Number of carets drawn under the failure position.
    pub fn carets(&self) -> usize {
        match self {
            FailureReason::InvalidSetup | FailureReason::EncounteredUndefined => 1,
            FailureReason::ParsingFailed(unexpected, _) => match unexpected.iter().next() {
                Some(ErrorItem::Tokens(text)) | Some(ErrorItem::Label(text)) => {
                    text.chars().count().max(1)
                }
                Some(ErrorItem::EndOfInput) | None => 1,
            },
            FailureReason::VariableAlreadyInUse(ident)
            | FailureReason::ProcedureAlreadyDeclared(ident)
            | FailureReason::CallToUnknownProcedure(ident)
            | FailureReason::UseOfUnknownIdentifier(ident) => ident.width().max(1),
        }
    }
}

/// A compile-time failure anchored to a source position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct CompilationError {
    /// Where the failure happened.
    pub location: Source,
    /// What went wrong.
    pub reason: FailureReason,
}

impl CompilationError {
    /// Pair a position with a reason.
    pub fn new(location: Source, reason: FailureReason) -> Self {
        Self { location, reason }
    }

    /// Exit code derived from the reason.
    pub fn exit_code(&self) -> i32 {
        self.reason.exit_code()
    }
}

/// Render an unexpected/expected item the way it reads in messages.
pub fn describe_item(item: &ErrorItem) -> String {
    match item {
        ErrorItem::EndOfInput => "end of input".to_string(),
        ErrorItem::Label(label) => label.clone(),
        ErrorItem::Tokens(text) if text == "\n" => "newline".to_string(),
        ErrorItem::Tokens(text) if text.chars().count() == 1 => format!("'{}'", text),
        ErrorItem::Tokens(text) => format!("\"{}\"", text),
    }
}

fn describe_parse_failure(
    unexpected: &BTreeSet<ErrorItem>,
    expected: &BTreeSet<ErrorItem>,
) -> String {
    let mut lines = Vec::new();
    if !unexpected.is_empty() {
        lines.push(format!("unexpected {}", join_items(unexpected)));
    }
    if !expected.is_empty() {
        lines.push(format!("expecting {}", join_items(expected)));
    }
    if lines.is_empty() {
        lines.push("unknown parse error".to_string());
    }
    lines.join("\n")
}

fn join_items(items: &BTreeSet<ErrorItem>) -> String {
    let rendered: Vec<String> = items.iter().map(describe_item).collect();
    match rendered.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{}, or {}", init.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[ErrorItem]) -> BTreeSet<ErrorItem> {
        items.iter().cloned().collect()
    }

    #[test]
    fn exit_codes_follow_variant_order() {
        let reasons = [
            FailureReason::InvalidSetup,
            FailureReason::ParsingFailed(BTreeSet::new(), BTreeSet::new()),
            FailureReason::VariableAlreadyInUse(Identifier::new("a")),
            FailureReason::ProcedureAlreadyDeclared(Identifier::new("a")),
            FailureReason::CallToUnknownProcedure(Identifier::new("a")),
            FailureReason::UseOfUnknownIdentifier(Identifier::new("a")),
            FailureReason::EncounteredUndefined,
        ];
        let codes: Vec<i32> = reasons.iter().map(FailureReason::exit_code).collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn describes_items() {
        assert_eq!(describe_item(&ErrorItem::EndOfInput), "end of input");
        assert_eq!(describe_item(&ErrorItem::Tokens("\n".into())), "newline");
        assert_eq!(describe_item(&ErrorItem::Tokens("}".into())), "'}'");
        assert_eq!(describe_item(&ErrorItem::Tokens("->".into())), "\"->\"");
        assert_eq!(describe_item(&ErrorItem::Label("expression".into())), "expression");
    }

    #[test]
    fn parse_failure_message_lists_expectations() {
        let reason = FailureReason::ParsingFailed(
            set(&[ErrorItem::Tokens(")".into())]),
            set(&[
                ErrorItem::Tokens("}".into()),
                ErrorItem::Label("expression".into()),
                ErrorItem::EndOfInput,
            ]),
        );
        assert_eq!(
            reason.to_string(),
            "unexpected ')'\nexpecting '}', expression, or end of input"
        );
    }

    #[test]
    fn caret_widths() {
        assert_eq!(FailureReason::EncounteredUndefined.carets(), 1);
        assert_eq!(
            FailureReason::UseOfUnknownIdentifier(Identifier::new("kettle")).carets(),
            6
        );
        let at_end = FailureReason::ParsingFailed(set(&[ErrorItem::EndOfInput]), BTreeSet::new());
        assert_eq!(at_end.carets(), 1);
        let empty = FailureReason::ParsingFailed(BTreeSet::new(), BTreeSet::new());
        assert_eq!(empty.carets(), 1);
    }
}

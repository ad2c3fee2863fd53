use super::failure::{CompilationError, FailureReason};
use super::source::Source;
use crate::language::ParseErrorBundle;

/// Lines longer than this are cut off with an ellipsis.
const MAXIMUM_WIDTH: usize = 77;

/// Render a compilation error as `file:line:column`, the offending line,
/// a caret marker, and the reason's message.
pub fn render(error: &CompilationError) -> String {
    let location = &error.location;
    let (line, column, code) = locate(location.contents(), location.offset());

    let width = code.chars().count();
    let code = if width > MAXIMUM_WIDTH && column <= MAXIMUM_WIDTH {
        let mut cut: String = code.chars().take(MAXIMUM_WIDTH).collect();
        cut.push('…');
        cut
    } else {
        code
    };

    let padding = " ".repeat(column - 1);
    let carets = "^".repeat(error.reason.carets());

    format!(
        "{}:{}:{}\n\n{}\n{}{}\n\n{}",
        location.filename().display(),
        line,
        column,
        code,
        padding,
        carets,
        error.reason
    )
}

/// 1-origin line and column of `offset`, plus the text of that line.
fn locate(contents: &str, offset: usize) -> (usize, usize, String) {
    let mut offset = offset.min(contents.len());
    while !contents.is_char_boundary(offset) {
        offset -= 1;
    }

    let (before, after) = contents.split_at(offset);
    let line = before.matches('\n').count() + 1;
    let prefix = match before.rfind('\n') {
        Some(newline) => &before[newline + 1..],
        None => before,
    };
    let column = prefix.chars().count() + 1;
    let rest = after.lines().next().unwrap_or("");

    let mut code = String::with_capacity(prefix.len() + rest.len());
    code.push_str(prefix.trim_end_matches('\r'));
    code.push_str(rest.trim_end_matches('\r'));
    (line, column, code)
}

/// Convert the first failure in a parse error bundle into a compilation error.
///
/// A bundle without any failure cannot come from the parser and is treated
/// as a bug.
pub fn from_parse_errors(source: &Source, bundle: &ParseErrorBundle) -> CompilationError {
    let Some(first) = bundle.errors.first() else {
        panic!("parse error bundle for {} holds no errors", source.filename().display());
    };

    CompilationError::new(
        source.at(first.offset),
        FailureReason::ParsingFailed(first.unexpected.clone(), first.expected.clone()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{ErrorItem, Identifier, ParseError};
    use std::collections::BTreeSet;

    #[test]
    fn single_caret_under_undefined() {
        let source = Source::new("foo = undefined", "demo.tq");
        let error = CompilationError::new(source.at(6), FailureReason::EncounteredUndefined);
        assert_eq!(
            render(&error),
            "demo.tq:1:7\n\nfoo = undefined\n      ^\n\n\
             Found an undefined symbol. Did you mean to leave this here?"
        );
    }

    #[test]
    fn carets_span_identifier() {
        let source = Source::new("main {\n    x = 1\n    x = 2\n}", "twice.tq");
        let error = CompilationError::new(
            source.at(21),
            FailureReason::VariableAlreadyInUse(Identifier::new("x")),
        );
        let rendered = render(&error);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "twice.tq:3:5");
        assert_eq!(lines[2], "    x = 2");
        assert_eq!(lines[3], "    ^");
    }

    #[test]
    fn long_lines_are_truncated() {
        let long = "a".repeat(100);
        let source = Source::new(long.as_str(), "long.tq");
        let error = CompilationError::new(source.at(3), FailureReason::EncounteredUndefined);
        let rendered = render(&error);
        let code = rendered.lines().nth(2).unwrap();
        assert_eq!(code.chars().count(), 78);
        assert!(code.ends_with('…'));
    }

    #[test]
    fn long_lines_keep_full_text_past_the_cut() {
        let long = "b".repeat(100);
        let source = Source::new(long.as_str(), "long.tq");
        let error = CompilationError::new(source.at(90), FailureReason::EncounteredUndefined);
        let rendered = render(&error);
        assert_eq!(rendered.lines().nth(2).unwrap(), long);
    }

    #[test]
    fn empty_file_renders_empty_line() {
        let error = CompilationError::new(Source::new("", "empty.tq"), FailureReason::InvalidSetup);
        let rendered = render(&error);
        assert!(rendered.starts_with("empty.tq:1:1\n\n\n^\n\n"));
    }

    #[test]
    fn adapts_first_parse_error() {
        let source = Source::new("main {\n", "eof.tq");
        let bundle = ParseErrorBundle {
            errors: vec![ParseError {
                offset: 7,
                unexpected: BTreeSet::from([ErrorItem::EndOfInput]),
                expected: BTreeSet::from([ErrorItem::Tokens("}".into())]),
            }],
        };
        let error = from_parse_errors(&source, &bundle);
        assert_eq!(error.location.offset(), 7);
        assert_eq!(error.exit_code(), 2);
        assert!(render(&error).ends_with("unexpected end of input\nexpecting '}'"));
    }

    #[test]
    #[should_panic(expected = "holds no errors")]
    fn empty_bundle_is_fatal() {
        let bundle = ParseErrorBundle { errors: Vec::new() };
        from_parse_errors(&Source::empty(), &bundle);
    }
}

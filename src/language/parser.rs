use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::ast::{
    Attribute, Binding, Block, Expression, Identifier, Label, Operator, Procedure, Quantity,
    Statement, Tablet, Technique,
};

/// One item of an unexpected/expected set in a parse error.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorItem {
    /// Literal input tokens.
    Tokens(String),
    /// A named grammar construct, such as `expression`.
    Label(String),
    /// The end of the input.
    EndOfInput,
}

/// A single parse failure at a byte offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseError {
    /// Byte offset where parsing failed.
    pub offset: usize,
    /// What was found instead.
    pub unexpected: BTreeSet<ErrorItem>,
    /// What the parser would have accepted.
    pub expected: BTreeSet<ErrorItem>,
}

/// Parse failures reported by [`parse_technique`], first failure first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseErrorBundle {
    /// Recorded failures.
    pub errors: Vec<ParseError>,
}

type ParseResult<T> = std::result::Result<T, ParseErrorBundle>;

/// Parse source text into a [`Technique`].
pub fn parse_technique(source: &str) -> ParseResult<Technique> {
    let mut parser = Parser::new(source);
    let mut procedures = Vec::new();
    loop {
        parser.skip_trivia();
        if parser.eof() {
            break;
        }
        procedures.push(parser.declaration()?);
    }

    if procedures.is_empty() {
        return Err(parser.unexpected(&[label("procedure declaration")]));
    }

    Ok(Technique { procedures })
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    index: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            index: 0,
        }
    }

    fn eof(&self) -> bool {
        self.index >= self.bytes.len()
    }

    fn current(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn peek_char(&self) -> Option<u8> {
        self.bytes.get(self.index + 1).copied()
    }

    fn advance(&mut self) {
        if self.index < self.bytes.len() {
            self.index += 1;
        }
    }

    fn at_comment(&self) -> bool {
        self.current() == Some(b'-') && self.peek_char() == Some(b'-')
    }

    /// Skip spaces and tabs, stopping at newlines.
    fn skip_spaces(&mut self) {
        while let Some(b' ' | b'\t' | b'\r') = self.current() {
            self.advance();
        }
    }

    /// Skip all whitespace, including newlines.
    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_ascii_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Skip whitespace and `--` comments between top-level declarations.
    fn skip_trivia(&mut self) {
        loop {
            self.skip_whitespace();
            if self.at_comment() {
                while let Some(ch) = self.current() {
                    self.advance();
                    if ch == b'\n' {
                        break;
                    }
                }
                continue;
            }
            break;
        }
    }

    fn expect(&mut self, token: u8) -> ParseResult<()> {
        if self.current() == Some(token) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&[tokens(token)]))
        }
    }

    fn declaration(&mut self) -> ParseResult<Procedure> {
        let offset = self.index;
        let name = self.identifier("procedure name")?;

        let mut parameters = Vec::new();
        loop {
            self.skip_spaces();
            if self.current().is_some_and(is_identifier_start) {
                parameters.push(self.identifier("parameter")?);
            } else {
                break;
            }
        }

        let mut signature = None;
        if self.current() == Some(b':') {
            self.advance();
            let start = self.index;
            while let Some(ch) = self.current() {
                if ch == b'{' || ch == b'\n' {
                    break;
                }
                self.advance();
            }
            let text = self.src[start..self.index].trim();
            if !text.is_empty() {
                signature = Some(text.to_string());
            }
        }

        self.skip_whitespace();
        let block = self.braced_block()?;

        Ok(Procedure {
            offset,
            name,
            parameters,
            signature,
            block,
        })
    }

    fn braced_block(&mut self) -> ParseResult<Block> {
        self.expect(b'{')?;
        self.skip_spaces();
        if self.current() == Some(b'\n') {
            self.advance();
        }
        let block = self.block()?;
        self.expect(b'}')?;
        Ok(block)
    }

    fn block(&mut self) -> ParseResult<Block> {
        let mut statements = Vec::new();
        loop {
            self.skip_spaces();
            match self.current() {
                None => return Err(self.unexpected(&[tokens(b'}'), label("statement")])),
                Some(b'}') => break,
                Some(b'\n') => {
                    statements.push(Statement::Blank(self.index));
                    self.advance();
                }
                Some(_) => {
                    let statement = self.statement()?;
                    let ends_line = matches!(statement, Statement::Comment(..));
                    statements.push(statement);
                    if !ends_line {
                        self.statement_end(&mut statements)?;
                    }
                }
            }
        }
        Ok(Block(statements))
    }

    fn statement_end(&mut self, statements: &mut Vec<Statement>) -> ParseResult<()> {
        self.skip_spaces();
        match self.current() {
            Some(b'\n') => self.advance(),
            Some(b';') => {
                statements.push(Statement::Series(self.index));
                self.advance();
                self.skip_spaces();
                if self.current() == Some(b'\n') {
                    self.advance();
                }
            }
            Some(b'}') => {}
            Some(b'-') if self.at_comment() => statements.push(self.comment()),
            _ => {
                return Err(self.unexpected(&[
                    tokens(b'\n'),
                    tokens(b';'),
                    tokens(b'}'),
                    label("operator"),
                ]));
            }
        }
        Ok(())
    }

    fn comment(&mut self) -> Statement {
        let offset = self.index;
        // consume "--"
        self.advance();
        self.advance();
        let start = self.index;
        while let Some(ch) = self.current() {
            if ch == b'\n' {
                break;
            }
            self.advance();
        }
        let text = self.src[start..self.index].trim().to_string();
        if self.current() == Some(b'\n') {
            self.advance();
        }
        Statement::Comment(offset, text)
    }

    fn statement(&mut self) -> ParseResult<Statement> {
        let offset = self.index;
        if self.at_comment() {
            return Ok(self.comment());
        }

        if self.current().is_some_and(is_identifier_start) {
            if let Some(variables) = self.assignment_targets() {
                self.skip_spaces();
                let expression = self.expression()?;
                return Ok(Statement::Assignment(offset, variables, expression));
            }
            if self.looks_like_declaration() {
                return Ok(Statement::Declaration(offset, self.declaration()?));
            }
        }

        Ok(Statement::Execute(offset, self.expression()?))
    }

    /// Consume `a, b =` if present, otherwise leave the position untouched.
    fn assignment_targets(&mut self) -> Option<Vec<Identifier>> {
        let start = self.index;
        let mut variables = Vec::new();
        loop {
            self.skip_spaces();
            match self.identifier("variable") {
                Ok(ident) => variables.push(ident),
                Err(_) => break,
            }
            self.skip_spaces();
            if self.current() == Some(b',') {
                self.advance();
            } else {
                break;
            }
        }

        self.skip_spaces();
        if !variables.is_empty() && self.current() == Some(b'=') {
            self.advance();
            Some(variables)
        } else {
            self.index = start;
            None
        }
    }

    fn looks_like_declaration(&mut self) -> bool {
        let start = self.index;
        while self.current().is_some_and(is_identifier_start) {
            if self.identifier("procedure name").is_err() {
                break;
            }
            self.skip_spaces();
        }
        let found = matches!(self.current(), Some(b':') | Some(b'{'));
        self.index = start;
        found
    }

    fn expression(&mut self) -> ParseResult<Expression> {
        let offset = self.index;
        let mut lhs = self.term()?;
        loop {
            self.skip_spaces();
            let operator = match self.current() {
                Some(b'|') => Operator::WaitEither,
                Some(b'&') => Operator::WaitBoth,
                Some(b'+') => Operator::Combine,
                _ => break,
            };
            self.advance();
            self.skip_spaces();
            let rhs = self.term()?;
            lhs = Expression::Operation(offset, operator, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> ParseResult<Expression> {
        self.skip_spaces();
        let offset = self.index;
        match self.current() {
            Some(b'(') => {
                self.advance();
                self.skip_spaces();
                if self.current() == Some(b')') {
                    self.advance();
                    return Ok(Expression::None(offset));
                }
                let inner = self.expression()?;
                self.skip_spaces();
                self.expect(b')')?;
                Ok(Expression::Grouping(offset, Box::new(inner)))
            }
            Some(b'"') => Ok(Expression::Text(offset, self.string()?)),
            Some(b'0'..=b'9') => self.amount(),
            Some(b'[') => self.tablet(),
            Some(b'?') => {
                self.advance();
                Ok(Expression::Undefined(offset))
            }
            Some(b'@') => {
                self.advance();
                let attribute = if self.current() == Some(b'*') {
                    self.advance();
                    Attribute::Inherit
                } else {
                    Attribute::Role(self.identifier("role")?)
                };
                self.restriction(offset, attribute)
            }
            Some(b'^') => {
                self.advance();
                let attribute = Attribute::Place(self.identifier("place")?);
                self.restriction(offset, attribute)
            }
            Some(ch) if is_identifier_start(ch) => self.named(offset),
            _ => Err(self.unexpected(&[label("expression")])),
        }
    }

    fn named(&mut self, offset: usize) -> ParseResult<Expression> {
        let first = self.identifier("identifier")?;
        if first.as_str() == "undefined" {
            return Ok(Expression::Undefined(offset));
        }

        self.skip_spaces();
        match self.current() {
            Some(b',') => {
                let mut identifiers = vec![first];
                while self.current() == Some(b',') {
                    // a comma not followed by a name belongs to the enclosing tablet
                    let comma = self.index;
                    self.advance();
                    self.skip_spaces();
                    if !self.current().is_some_and(is_identifier_start) {
                        self.index = comma;
                        break;
                    }
                    identifiers.push(self.identifier("variable")?);
                    self.skip_spaces();
                }
                Ok(Expression::Variable(offset, identifiers))
            }
            Some(ch) if starts_term(ch) => {
                let argument = self.term()?;
                Ok(Expression::Application(offset, first, Box::new(argument)))
            }
            _ => Ok(Expression::Variable(offset, vec![first])),
        }
    }

    fn restriction(&mut self, offset: usize, attribute: Attribute) -> ParseResult<Expression> {
        self.skip_whitespace();
        let block = self.braced_block()?;
        Ok(Expression::Restriction(offset, attribute, block))
    }

    fn tablet(&mut self) -> ParseResult<Expression> {
        let offset = self.index;
        // consume '['
        self.advance();
        let mut bindings = Vec::new();
        loop {
            self.skip_whitespace();
            if self.current() == Some(b']') {
                self.advance();
                break;
            }
            if self.current() != Some(b'"') {
                return Err(self.unexpected(&[label("label"), tokens(b']')]));
            }
            let name = self.string()?;
            self.skip_whitespace();
            self.expect(b'=')?;
            self.skip_whitespace();
            let value = self.expression()?;
            bindings.push(Binding(Label(name), value));
            self.skip_whitespace();
            match self.current() {
                Some(b',') => self.advance(),
                Some(b']') => {}
                _ => return Err(self.unexpected(&[tokens(b','), tokens(b']')])),
            }
        }
        Ok(Expression::Object(offset, Tablet(bindings)))
    }

    fn amount(&mut self) -> ParseResult<Expression> {
        let offset = self.index;
        while self.current().is_some_and(|ch| ch.is_ascii_digit()) {
            self.advance();
        }
        let magnitude = match self.src[offset..self.index].parse::<i64>() {
            Ok(value) => value,
            Err(_) => {
                self.index = offset;
                return Err(self.unexpected(&[label("number")]));
            }
        };

        let unit_start = self.index;
        while self.current().is_some_and(|ch| ch.is_ascii_alphabetic()) {
            self.advance();
        }
        let quantity = if unit_start == self.index {
            Quantity::Number(magnitude)
        } else {
            Quantity::Measure {
                magnitude,
                unit: self.src[unit_start..self.index].to_string(),
            }
        };
        Ok(Expression::Amount(offset, quantity))
    }

    fn string(&mut self) -> ParseResult<String> {
        // consume opening quote
        self.advance();
        let mut buf = String::new();
        loop {
            let start = self.index;
            while let Some(ch) = self.current() {
                if ch == b'"' || ch == b'\\' || ch == b'\n' {
                    break;
                }
                self.advance();
            }
            buf.push_str(&self.src[start..self.index]);

            match self.current() {
                Some(b'"') => {
                    self.advance();
                    return Ok(buf);
                }
                Some(b'\\') => {
                    self.advance();
                    let value = match self.current() {
                        Some(b'"') => '"',
                        Some(b'\\') => '\\',
                        Some(b'n') => '\n',
                        Some(b't') => '\t',
                        _ => return Err(self.unexpected(&[label("escape sequence")])),
                    };
                    self.advance();
                    buf.push(value);
                }
                _ => return Err(self.unexpected(&[tokens(b'"')])),
            }
        }
    }

    fn identifier(&mut self, what: &str) -> ParseResult<Identifier> {
        let start = self.index;
        if !self.current().is_some_and(is_identifier_start) {
            return Err(self.unexpected(&[label(what)]));
        }
        while self.current().is_some_and(is_identifier_char) {
            self.advance();
        }
        Ok(Identifier::new(&self.src[start..self.index]))
    }

    fn unexpected(&self, expected: &[ErrorItem]) -> ParseErrorBundle {
        let found = match self.src[self.index.min(self.src.len())..].chars().next() {
            None => ErrorItem::EndOfInput,
            Some(ch) => ErrorItem::Tokens(ch.to_string()),
        };
        ParseErrorBundle {
            errors: vec![ParseError {
                offset: self.index,
                unexpected: BTreeSet::from([found]),
                expected: expected.iter().cloned().collect(),
            }],
        }
    }
}

fn tokens(token: u8) -> ErrorItem {
    ErrorItem::Tokens((token as char).to_string())
}

fn label(text: &str) -> ErrorItem {
    ErrorItem::Label(text.to_string())
}

fn is_identifier_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_identifier_char(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}

fn starts_term(ch: u8) -> bool {
    matches!(ch, b'(' | b'"' | b'[' | b'?' | b'@' | b'^') || ch.is_ascii_digit() || is_identifier_start(ch)
}

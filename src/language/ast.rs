use serde::{Deserialize, Serialize};
use std::fmt;

/// A name as written in source text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identifier(pub String);

impl Identifier {
    /// Construct an identifier from its source spelling.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Source spelling of the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters the identifier occupies on screen.
    pub fn width(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field label inside a tablet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label(pub String);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

/// Execution context a run of steps is performed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Attribute {
    /// Whatever the enclosing scope uses.
    #[default]
    Inherit,
    /// `@role`: the responsible party.
    Role(Identifier),
    /// `^place`: the location or resource class.
    Place(Identifier),
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Inherit => f.write_str("@*"),
            Attribute::Role(role) => write!(f, "@{}", role),
            Attribute::Place(place) => write!(f, "^{}", place),
        }
    }
}

/// Numeric literal, optionally carrying a unit of measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantity {
    /// Dimensionless integer.
    Number(i64),
    /// Integer magnitude with a unit symbol such as `ms` or `kg`.
    Measure {
        /// Numeric part.
        magnitude: i64,
        /// Unit symbol as written.
        unit: String,
    },
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Number(n) => write!(f, "{}", n),
            Quantity::Measure { magnitude, unit } => write!(f, "{} {}", magnitude, unit),
        }
    }
}

/// Infix combinators joining two concurrently evaluated operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `|`: resolve with whichever operand finishes first.
    WaitEither,
    /// `&`: resolve once both operands finish, pairing the results.
    WaitBoth,
    /// `+`: resolve once both operands finish, merging the results.
    Combine,
}

/// Labelled fields of an object literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tablet(pub Vec<Binding>);

/// One `label = expression` entry of a tablet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding(pub Label, pub Expression);

/// A named unit of concrete syntax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    /// Byte offset of the procedure's name.
    pub offset: usize,
    /// Procedure name.
    pub name: Identifier,
    /// Parameter names, in order.
    pub parameters: Vec<Identifier>,
    /// Free-form signature text following the `:`, if any.
    pub signature: Option<String>,
    /// Body statements.
    pub block: Block,
}

/// Ordered statements forming a procedure body or restriction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block(pub Vec<Statement>);

impl Block {
    /// Statements in source order.
    pub fn statements(&self) -> &[Statement] {
        &self.0
    }
}

/// Statements allowed within a block. Every variant carries its byte offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// `a, b = expression`
    Assignment(usize, Vec<Identifier>, Expression),
    /// An expression evaluated for effect.
    Execute(usize, Expression),
    /// A nested procedure declaration.
    Declaration(usize, Procedure),
    /// `-- text`
    Comment(usize, String),
    /// An empty line.
    Blank(usize),
    /// `;` separator.
    Series(usize),
}

/// Expressions. Every variant carries its byte offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// `name argument`
    Application(usize, Identifier, Box<Expression>),
    /// `()`
    None(usize),
    /// `"text"`
    Text(usize, String),
    /// `42`, `250ms`
    Amount(usize, Quantity),
    /// `undefined` or `?`: a hole left in the procedure.
    Undefined(usize),
    /// `[ label = expression, ... ]`
    Object(usize, Tablet),
    /// `a` or `a, b`
    Variable(usize, Vec<Identifier>),
    /// `lhs op rhs`
    Operation(usize, Operator, Box<Expression>, Box<Expression>),
    /// `( expression )`
    Grouping(usize, Box<Expression>),
    /// `@role { block }`
    Restriction(usize, Attribute, Block),
}

/// A parsed source file. The first procedure is the entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technique {
    /// Top-level procedure declarations in source order.
    pub procedures: Vec<Procedure>,
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::language::{Attribute, Identifier, Label, Procedure, Quantity};

/// Scope-resolved variable name. Unique within one compilation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Name {
    /// Position in the order names were created.
    pub index: usize,
    /// Identifier the name was bound from.
    pub identifier: Identifier,
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.identifier, self.index)
    }
}

/// Index of a declared procedure inside a [`Library`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Callee(pub usize);

/// Values known at translation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Known {
    /// `()`
    Unit,
    /// Text literal.
    Text(String),
    /// Number or measurement.
    Quantity(Quantity),
    /// Tablet whose fields are evaluated when the step runs.
    Tablet(Vec<(Label, Step)>),
}

/// Executable unit of a compiled procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    /// A literal.
    Known(Known),
    /// Evaluate the inner step as a separate task and bind its result.
    Asynchronous(Vec<Name>, Box<Step>),
    /// Call a declared procedure with the argument's value.
    Invocation(Callee, Box<Step>),
    /// Call a builtin with the argument's value.
    External(Identifier, Box<Step>),
    /// Steps evaluated together, yielding their results in order.
    Tuple(Vec<Step>),
    /// The result of a previously bound name.
    Depends(Name),
}

/// Role-tagged steps in execution order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sequence(Vec<(Attribute, Step)>);

impl Sequence {
    /// Empty sequence.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Sequence holding a single step.
    pub fn single(attribute: Attribute, step: Step) -> Self {
        Self(vec![(attribute, step)])
    }

    /// Append a step.
    pub fn push(&mut self, attribute: Attribute, step: Step) {
        self.0.push((attribute, step));
    }

    /// Append every step of another sequence.
    pub fn extend(&mut self, other: Sequence) {
        self.0.extend(other.0);
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sequence holds no steps.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Steps with their attributes, in order.
    pub fn iter(&self) -> impl Iterator<Item = &(Attribute, Step)> {
        self.0.iter()
    }

    /// Collapse to one step: the only step itself, or a tuple of all of them.
    pub fn into_step(mut self) -> Step {
        if self.0.len() == 1 {
            self.0.remove(0).1
        } else {
            Step::Tuple(self.0.into_iter().map(|(_, step)| step).collect())
        }
    }
}

/// Compiled procedures reachable from a subroutine, by callee index.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Library(pub BTreeMap<Callee, Subroutine>);

impl Library {
    /// Compiled form of a declared procedure.
    pub fn get(&self, callee: Callee) -> Option<&Subroutine> {
        self.0.get(&callee)
    }

    /// Number of compiled procedures.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no procedures were compiled.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A compiled procedure.
///
/// The subroutine returned by translation owns the [`Library`] of every
/// procedure declared beneath it; library members carry an empty library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subroutine {
    /// Source form, kept for diagnostics and formatting.
    pub procedure: Procedure,
    /// Names the invocation argument is bound to.
    pub parameters: Vec<Name>,
    /// Lowered body.
    pub sequence: Sequence,
    /// Declared procedures callable from this subroutine.
    pub library: Library,
}

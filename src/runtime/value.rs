use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::RuntimeFailure;
use crate::language::{Label, Quantity};

/// Result of evaluating a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// `()`
    Unit,
    /// Text literal.
    Text(String),
    /// Number or measurement.
    Quantity(Quantity),
    /// Labelled fields, in declaration order.
    Tablet(Vec<(Label, Value)>),
    /// Ordered results of a group of steps evaluated together.
    Parallel(Vec<Value>),
}

impl Value {
    /// Collect tuple results. One result stands for itself and none is `()`.
    pub fn parallel(mut values: Vec<Value>) -> Value {
        match values.len() {
            0 => Value::Unit,
            1 => values.remove(0),
            _ => Value::Parallel(values),
        }
    }

    /// Split a value across `count` names.
    pub fn destructure(self, count: usize) -> Result<Vec<Value>, RuntimeFailure> {
        if count == 1 {
            return Ok(vec![self]);
        }
        match self {
            Value::Parallel(values) if values.len() == count => Ok(values),
            Value::Parallel(values) => Err(RuntimeFailure::Destructure {
                expected: count,
                found: values.len(),
            }),
            Value::Unit if count == 0 => Ok(Vec::new()),
            _ => Err(RuntimeFailure::Destructure {
                expected: count,
                found: 1,
            }),
        }
    }

    /// Dimensionless number.
    pub fn number(n: i64) -> Value {
        Value::Quantity(Quantity::Number(n))
    }

    /// Short description of the value's shape, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Text(_) => "text",
            Value::Quantity(_) => "quantity",
            Value::Tablet(_) => "tablet",
            Value::Parallel(_) => "parallel",
        }
    }
}

impl From<Quantity> for Value {
    fn from(quantity: Quantity) -> Self {
        Value::Quantity(quantity)
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Value::Quantity(Quantity::Number(number))
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Text(text) => write!(f, "\"{}\"", text),
            Value::Quantity(quantity) => write!(f, "{}", quantity),
            Value::Tablet(fields) => {
                f.write_str("[")?;
                for (index, (label, value)) in fields.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, " {} = {}", label, value)?;
                }
                f.write_str(" ]")
            }
            Value::Parallel(values) => {
                f.write_str("(")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_collapses_singletons() {
        assert_eq!(Value::parallel(vec![]), Value::Unit);
        assert_eq!(Value::parallel(vec![Value::number(1)]), Value::number(1));
        assert_eq!(
            Value::parallel(vec![Value::number(1), Value::number(2)]),
            Value::Parallel(vec![Value::number(1), Value::number(2)])
        );
    }

    #[test]
    fn destructure_checks_arity() {
        let pair = Value::Parallel(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(pair.clone().destructure(2).unwrap().len(), 2);
        assert_eq!(pair.clone().destructure(1).unwrap(), vec![pair.clone()]);
        assert_eq!(
            pair.destructure(3),
            Err(RuntimeFailure::Destructure {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(
            Value::number(5).destructure(2),
            Err(RuntimeFailure::Destructure {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn displays_nested_values() {
        let value = Value::Parallel(vec![
            Value::number(1),
            Value::Tablet(vec![(Label("time".into()), Value::from("4 min"))]),
        ]);
        assert_eq!(value.to_string(), "(1, [ \"time\" = \"4 min\" ])");
    }
}

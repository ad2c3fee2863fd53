//! Builtin registry
//!
//! Maps identifiers to primitive operations implemented by the host. The
//! translator only asks whether a name is registered; the evaluator invokes
//! the registered action with the evaluated argument. The three combinators
//! reachable through `|`, `&`, and `+` are always present.

use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::error::{Outcome, RuntimeFailure};
use super::value::Value;
use crate::language::{Identifier, Operator, Quantity};

/// Name the wait-either combinator is registered under.
pub const WAIT_EITHER: &str = "wait_either";
/// Name the wait-both combinator is registered under.
pub const WAIT_BOTH: &str = "wait_both";
/// Name the combine combinator is registered under.
pub const COMBINE: &str = "combine";

/// Action invoked with the evaluated argument of an external step.
pub type BuiltinAction = Arc<dyn Fn(Value) -> BoxFuture<'static, Outcome> + Send + Sync>;

/// Descriptor for a registered builtin.
#[derive(Clone)]
pub struct Builtin {
    name: Identifier,
    combinator: Option<Operator>,
    action: BuiltinAction,
}

impl Builtin {
    /// Identifier the builtin is registered under.
    pub fn name(&self) -> &Identifier {
        &self.name
    }

    /// The operator this builtin implements, for the three combinators.
    pub fn combinator(&self) -> Option<Operator> {
        self.combinator
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("combinator", &self.combinator)
            .finish_non_exhaustive()
    }
}

/// Identifier of the builtin implementing `operator`.
pub fn combinator_name(operator: Operator) -> Identifier {
    Identifier::new(match operator {
        Operator::WaitEither => WAIT_EITHER,
        Operator::WaitBoth => WAIT_BOTH,
        Operator::Combine => COMBINE,
    })
}

/// Lookup table of builtins.
pub struct Registry {
    builtins: RwLock<HashMap<Identifier, Builtin>>,
}

impl Registry {
    /// Registry holding only the three combinators.
    pub fn new() -> Self {
        let registry = Self {
            builtins: RwLock::new(HashMap::new()),
        };
        registry.insert_combinator(Operator::WaitEither, |value| async move {
            Ok(match value {
                Value::Parallel(mut values) if !values.is_empty() => values.remove(0),
                other => other,
            })
        });
        registry.insert_combinator(Operator::WaitBoth, |value| async move { Ok(value) });
        registry.insert_combinator(Operator::Combine, |value| async move {
            match value {
                Value::Parallel(values) => values.into_iter().try_fold(Value::Unit, merge),
                other => Ok(other),
            }
        });
        registry
    }

    /// Registry holding the combinators plus `task`, `write`, `fail`, and `sleep`.
    pub fn standard() -> Self {
        let registry = Self::new();
        registry.register("task", |value: Value| async move {
            tracing::info!(task = %value, "task");
            Ok(value)
        });
        registry.register("write", |value: Value| async move {
            tracing::info!(target: "technique::write", "{}", value);
            Ok(Value::Unit)
        });
        registry.register("fail", |value: Value| async move {
            let message = match value {
                Value::Text(text) => text,
                other => other.to_string(),
            };
            Err(RuntimeFailure::builtin("fail", message))
        });
        registry.register("sleep", |value: Value| async move {
            let duration = duration_of(&value)?;
            tokio::time::sleep(duration).await;
            Ok(Value::Unit)
        });
        registry
    }

    /// Register a builtin, replacing any previous entry with the same name.
    pub fn register<F, Fut>(&self, name: &str, action: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        self.insert(Identifier::new(name), None, action);
    }

    fn insert_combinator<F, Fut>(&self, operator: Operator, action: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        self.insert(combinator_name(operator), Some(operator), action);
    }

    fn insert<F, Fut>(&self, name: Identifier, combinator: Option<Operator>, action: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let action: BuiltinAction = Arc::new(move |value| action(value).boxed());
        let mut builtins = self.builtins.write();
        builtins.insert(
            name.clone(),
            Builtin {
                name,
                combinator,
                action,
            },
        );
    }

    /// Find the builtin registered under `name`.
    pub fn lookup(&self, name: &Identifier) -> Option<Builtin> {
        self.builtins.read().get(name).cloned()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &Identifier) -> bool {
        self.builtins.read().contains_key(name)
    }

    /// Run a builtin against an evaluated argument.
    pub fn invoke(&self, builtin: &Builtin, argument: Value) -> BoxFuture<'static, Outcome> {
        (builtin.action)(argument)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<Identifier> {
        let mut names: Vec<Identifier> = self.builtins.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge rule used by `combine`.
pub fn merge(left: Value, right: Value) -> Outcome {
    match (left, right) {
        (Value::Unit, other) | (other, Value::Unit) => Ok(other),
        (Value::Text(mut a), Value::Text(b)) => {
            a.push_str(&b);
            Ok(Value::Text(a))
        }
        (Value::Quantity(a), Value::Quantity(b)) => add(a, b).map(Value::Quantity),
        (Value::Tablet(mut a), Value::Tablet(b)) => {
            a.extend(b);
            Ok(Value::Tablet(a))
        }
        (Value::Parallel(mut a), Value::Parallel(b)) => {
            a.extend(b);
            Ok(Value::Parallel(a))
        }
        (a, b) => Err(RuntimeFailure::builtin(
            COMBINE,
            format!("cannot combine {} with {}", a.kind(), b.kind()),
        )),
    }
}

fn add(left: Quantity, right: Quantity) -> Result<Quantity, RuntimeFailure> {
    let overflow = || RuntimeFailure::builtin(COMBINE, "quantity overflow");
    match (left, right) {
        (Quantity::Number(a), Quantity::Number(b)) => {
            a.checked_add(b).map(Quantity::Number).ok_or_else(overflow)
        }
        (
            Quantity::Measure {
                magnitude: a,
                unit: first,
            },
            Quantity::Measure {
                magnitude: b,
                unit: second,
            },
        ) if first == second => a
            .checked_add(b)
            .map(|magnitude| Quantity::Measure {
                magnitude,
                unit: first,
            })
            .ok_or_else(overflow),
        (a, b) => Err(RuntimeFailure::builtin(
            COMBINE,
            format!("cannot combine {} with {}", a, b),
        )),
    }
}

fn duration_of(value: &Value) -> Result<Duration, RuntimeFailure> {
    let invalid = || RuntimeFailure::builtin("sleep", format!("expected a duration, found {}", value));
    let (magnitude, unit) = match value {
        Value::Quantity(Quantity::Number(n)) => (*n, "ms"),
        Value::Quantity(Quantity::Measure { magnitude, unit }) => (*magnitude, unit.as_str()),
        _ => return Err(invalid()),
    };
    let magnitude = u64::try_from(magnitude).map_err(|_| invalid())?;
    match unit {
        "ms" => Ok(Duration::from_millis(magnitude)),
        "s" => Ok(Duration::from_secs(magnitude)),
        _ => Err(invalid()),
    }
}

//! Concurrent evaluation of compiled procedures
//!
//! Every `Asynchronous` binding becomes a tokio task whose result is shared
//! through a promise in the frame's name table. `Depends` steps await those
//! promises, so data dependencies are the only ordering between bindings.
//! Steps that are not bindings run in sequence order.
//!
//! Bindings are registered synchronously while the enclosing step is being
//! set up, before any of its futures are polled. A dependency is therefore
//! always registered before anything tries to await it.

use futures::future::{self, BoxFuture, Either, FutureExt, Shared, TryFutureExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{Instrument, Span, debug, debug_span, info_span};

use super::config::RuntimeConfig;
use super::error::{Outcome, RuntimeFailure};
use super::registry::Registry;
use super::value::Value;
use crate::compiler::{Callee, Known, Library, Name, Sequence, Step, Subroutine};
use crate::language::{Attribute, Identifier, Operator};

/// Handle on the eventual result of a binding
type Promise = Shared<BoxFuture<'static, Outcome>>;

/// Runs compiled procedures against a builtin registry
#[derive(Clone)]
pub struct Evaluator {
    registry: Arc<Registry>,
}

impl Evaluator {
    /// Create an evaluator that resolves builtins through `registry`
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Evaluate a subroutine to completion, binding each parameter to `()`
    ///
    /// Must be called from within a tokio runtime.
    pub async fn evaluate(&self, subroutine: &Subroutine) -> Outcome {
        let argument = Value::parallel(vec![Value::Unit; subroutine.parameters.len()]);
        self.evaluate_with(subroutine, argument).await
    }

    /// Evaluate a subroutine with an explicit argument for its parameters
    pub async fn evaluate_with(&self, subroutine: &Subroutine, argument: Value) -> Outcome {
        let machine = Arc::new(Machine {
            registry: Arc::clone(&self.registry),
            library: subroutine.library.clone(),
        });
        machine.enter(subroutine, argument).await
    }

    /// Evaluate on a fresh runtime built from `config`
    pub fn evaluate_blocking(
        &self,
        subroutine: &Subroutine,
        config: &RuntimeConfig,
    ) -> anyhow::Result<Outcome> {
        let runtime = config.build_runtime()?;
        Ok(runtime.block_on(self.evaluate(subroutine)))
    }
}

/// State shared by every frame of one evaluation
struct Machine {
    registry: Arc<Registry>,
    library: Library,
}

impl Machine {
    async fn enter(self: &Arc<Self>, subroutine: &Subroutine, argument: Value) -> Outcome {
        let span = info_span!("procedure", name = %subroutine.procedure.name);
        async {
            let frame = Frame::new(Arc::clone(self));
            frame.bind_parameters(&subroutine.parameters, argument)?;
            let outcome = frame.run(&subroutine.sequence).await;
            debug!(ok = outcome.is_ok(), "procedure finished");
            outcome
        }
        .instrument(span)
        .await
    }

    fn call(self: Arc<Self>, callee: Callee, argument: Value) -> BoxFuture<'static, Outcome> {
        async move {
            let Some(subroutine) = self.library.get(callee) else {
                panic!("no compiled procedure for {:?}", callee);
            };
            self.enter(subroutine, argument).await
        }
        .boxed()
    }
}

/// One bound group of names and the promise producing their values
struct Binding {
    names: Vec<Name>,
    promise: Promise,
    observed: bool,
}

#[derive(Default)]
struct Table {
    bindings: Vec<Binding>,
    /// Name to (binding index, position within the binding)
    names: HashMap<Name, (usize, usize)>,
}

/// Name table for one invocation of a subroutine
struct Frame {
    machine: Arc<Machine>,
    table: RwLock<Table>,
}

impl Frame {
    fn new(machine: Arc<Machine>) -> Self {
        Self {
            machine,
            table: RwLock::new(Table::default()),
        }
    }

    fn bind_parameters(&self, parameters: &[Name], argument: Value) -> Result<(), RuntimeFailure> {
        if parameters.is_empty() {
            return Ok(());
        }
        let values = argument.destructure(parameters.len())?;
        for (name, value) in parameters.iter().zip(values) {
            let promise = future::ready(Ok(value)).boxed().shared();
            self.register(vec![name.clone()], promise, true);
        }
        Ok(())
    }

    /// Run every entry of a sequence, then settle bindings nothing depended on.
    async fn run(&self, sequence: &Sequence) -> Outcome {
        let last = sequence.len().saturating_sub(1);
        let mut result = Value::Unit;

        for (index, (attribute, step)) in sequence.iter().enumerate() {
            debug!(%attribute, step = index, "starting step");
            match step {
                Step::Asynchronous(names, inner) => {
                    let binding = self.bind(attribute, names, inner);
                    if index == last {
                        result = self.observe(binding).await?;
                    }
                }
                other => result = self.eval(attribute, other).await?,
            }
        }

        for (promise, arity) in self.unobserved() {
            promise.await?.destructure(arity)?;
        }
        Ok(result)
    }

    fn register(&self, names: Vec<Name>, promise: Promise, observed: bool) -> usize {
        let mut table = self.table.write();
        let index = table.bindings.len();
        for (position, name) in names.iter().enumerate() {
            table.names.insert(name.clone(), (index, position));
        }
        table.bindings.push(Binding {
            names,
            promise,
            observed,
        });
        index
    }

    /// Start a binding as its own task.
    fn bind(&self, attribute: &Attribute, names: &[Name], step: &Step) -> usize {
        let listed = names
            .iter()
            .map(Name::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let span = debug_span!("binding", names = %listed, %attribute);
        let future = self.eval(attribute, step);
        let task = async move {
            let outcome = future.await;
            debug!(ok = outcome.is_ok(), "binding complete");
            outcome
        };
        let promise = spawn(task.boxed(), span).shared();
        self.register(names.to_vec(), promise, false)
    }

    fn observe(&self, binding: usize) -> Promise {
        let mut table = self.table.write();
        let binding = &mut table.bindings[binding];
        binding.observed = true;
        binding.promise.clone()
    }

    fn unobserved(&self) -> Vec<(Promise, usize)> {
        self.table
            .read()
            .bindings
            .iter()
            .filter(|binding| !binding.observed)
            .map(|binding| (binding.promise.clone(), binding.names.len()))
            .collect()
    }

    /// Set up a step. Bindings inside it are registered before this returns.
    fn eval(&self, attribute: &Attribute, step: &Step) -> BoxFuture<'static, Outcome> {
        match step {
            Step::Known(known) => self.known(attribute, known),
            Step::Asynchronous(names, inner) => {
                let binding = self.bind(attribute, names, inner);
                self.observe(binding).boxed()
            }
            Step::Invocation(callee, argument) => {
                let argument = self.eval(attribute, argument);
                let machine = Arc::clone(&self.machine);
                let callee = *callee;
                async move {
                    let value = argument.await?;
                    machine.call(callee, value).await
                }
                .boxed()
            }
            Step::External(name, argument) => self.external(attribute, name, argument),
            Step::Tuple(steps) => {
                let members: Vec<_> = steps.iter().map(|step| self.eval(attribute, step)).collect();
                future::try_join_all(members).map_ok(Value::parallel).boxed()
            }
            Step::Depends(name) => self.depend(name),
        }
    }

    fn known(&self, attribute: &Attribute, known: &Known) -> BoxFuture<'static, Outcome> {
        let value = match known {
            Known::Unit => Value::Unit,
            Known::Text(text) => Value::Text(text.clone()),
            Known::Quantity(quantity) => Value::Quantity(quantity.clone()),
            Known::Tablet(fields) => {
                let labels: Vec<_> = fields.iter().map(|(label, _)| label.clone()).collect();
                let values: Vec<_> = fields
                    .iter()
                    .map(|(_, step)| self.eval(attribute, step))
                    .collect();
                return future::try_join_all(values)
                    .map_ok(move |values| Value::Tablet(labels.into_iter().zip(values).collect()))
                    .boxed();
            }
        };
        future::ready(Ok(value)).boxed()
    }

    fn depend(&self, name: &Name) -> BoxFuture<'static, Outcome> {
        let (promise, arity, position) = {
            let mut table = self.table.write();
            let Some(&(index, position)) = table.names.get(name) else {
                panic!("{} was never bound in this frame", name);
            };
            let binding = &mut table.bindings[index];
            binding.observed = true;
            (binding.promise.clone(), binding.names.len(), position)
        };
        async move {
            let mut values = promise.await?.destructure(arity)?;
            Ok(values.swap_remove(position))
        }
        .boxed()
    }

    fn external(
        &self,
        attribute: &Attribute,
        name: &Identifier,
        argument: &Step,
    ) -> BoxFuture<'static, Outcome> {
        let registry = Arc::clone(&self.machine.registry);
        let Some(builtin) = registry.lookup(name) else {
            panic!("builtin {} is not registered", name);
        };

        match (builtin.combinator(), argument) {
            (Some(operator), Step::Tuple(operands)) if operands.len() == 2 => {
                let lhs = spawn(self.eval(attribute, &operands[0]), Span::current());
                let rhs = spawn(self.eval(attribute, &operands[1]), Span::current());
                match operator {
                    Operator::WaitEither => async move {
                        let winner = either(lhs, rhs).await?;
                        registry.invoke(&builtin, Value::Parallel(vec![winner])).await
                    }
                    .boxed(),
                    Operator::WaitBoth | Operator::Combine => async move {
                        let (left, right) = future::try_join(lhs, rhs).await?;
                        registry
                            .invoke(&builtin, Value::Parallel(vec![left, right]))
                            .await
                    }
                    .boxed(),
                }
            }
            _ => {
                let argument = self.eval(attribute, argument);
                async move {
                    let value = argument.await?;
                    debug!(builtin = %builtin.name(), "invoking builtin");
                    registry.invoke(&builtin, value).await
                }
                .boxed()
            }
        }
    }
}

/// Outcome of whichever operand finishes first. The other task is detached.
async fn either(lhs: BoxFuture<'static, Outcome>, rhs: BoxFuture<'static, Outcome>) -> Outcome {
    match future::select(lhs, rhs).await {
        Either::Left((outcome, _)) | Either::Right((outcome, _)) => outcome,
    }
}

/// Run a future as its own task. Dropping the returned future detaches the task.
fn spawn(future: BoxFuture<'static, Outcome>, span: Span) -> BoxFuture<'static, Outcome> {
    let handle = tokio::spawn(future.instrument(span));
    async move {
        match handle.await {
            Ok(outcome) => outcome,
            Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
            Err(_) => Err(RuntimeFailure::Cancelled),
        }
    }
    .boxed()
}

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::ir::{Callee, Known, Library, Name, Sequence, Step, Subroutine};
use crate::language::{
    Attribute, Binding, Block, Expression, Identifier, Procedure, Statement, Tablet, Technique,
    parse_technique,
};
use crate::problem::{CompilationError, FailureReason, Source, from_parse_errors};
use crate::runtime::registry::{Registry, combinator_name};

/// Result type for translation
pub type Result<T> = std::result::Result<T, CompilationError>;

/// An entry of a scope table, remembering the scope depth it was bound at.
#[derive(Debug, Clone)]
struct Scoped<T> {
    item: T,
    depth: usize,
}

/// Translation scope.
///
/// Holds the file being compiled, the builtin registry, the variables and
/// procedures visible at this point, and the attribute new steps are tagged
/// with. Child scopes copy the tables, so nothing bound in a child is visible
/// to its parent once the child is dropped.
#[derive(Clone)]
pub struct Environment {
    source: Source,
    registry: Arc<Registry>,
    variables: HashMap<Identifier, Scoped<Name>>,
    functions: HashMap<Identifier, Scoped<Callee>>,
    attribute: Attribute,
    depth: usize,
}

impl Environment {
    /// Root scope for a file.
    pub fn new(source: Source, registry: Arc<Registry>) -> Self {
        Self {
            source,
            registry,
            variables: HashMap::new(),
            functions: HashMap::new(),
            attribute: Attribute::Inherit,
            depth: 0,
        }
    }

    /// Scope for a restriction block. `@*` keeps the current attribute.
    fn restrict(&self, attribute: &Attribute) -> Self {
        let mut child = self.clone();
        child.depth += 1;
        if *attribute != Attribute::Inherit {
            child.attribute = attribute.clone();
        }
        child
    }

    /// Scope for a procedure body: the procedures visible here, no variables.
    fn procedure_scope(&self) -> Self {
        Self {
            source: self.source.clone(),
            registry: Arc::clone(&self.registry),
            variables: HashMap::new(),
            functions: self.functions.clone(),
            attribute: Attribute::Inherit,
            depth: self.depth + 1,
        }
    }

    fn bound_locally(&self, identifier: &Identifier) -> bool {
        self.variables
            .get(identifier)
            .is_some_and(|scoped| scoped.depth == self.depth)
    }

    fn bind(&mut self, identifier: Identifier, name: Name) {
        let depth = self.depth;
        self.variables.insert(identifier, Scoped { item: name, depth });
    }

    fn declare(&mut self, procedure: &Procedure, callee: Callee) -> Result<()> {
        let taken = self
            .functions
            .get(&procedure.name)
            .is_some_and(|scoped| scoped.depth == self.depth);
        if taken {
            return Err(self.fail(
                procedure.offset,
                FailureReason::ProcedureAlreadyDeclared(procedure.name.clone()),
            ));
        }
        let depth = self.depth;
        self.functions.insert(
            procedure.name.clone(),
            Scoped {
                item: callee,
                depth,
            },
        );
        Ok(())
    }

    fn variable(&self, offset: usize, identifier: &Identifier) -> Result<Name> {
        match self.variables.get(identifier) {
            Some(scoped) => Ok(scoped.item.clone()),
            None => Err(self.fail(
                offset,
                FailureReason::UseOfUnknownIdentifier(identifier.clone()),
            )),
        }
    }

    /// Resolve an applied name: declared procedures first, then builtins.
    fn target(&self, offset: usize, identifier: &Identifier) -> Result<Target> {
        if let Some(scoped) = self.functions.get(identifier) {
            return Ok(Target::Procedure(scoped.item));
        }
        if self.registry.contains(identifier) {
            return Ok(Target::Builtin(identifier.clone()));
        }
        Err(self.fail(
            offset,
            FailureReason::CallToUnknownProcedure(identifier.clone()),
        ))
    }

    /// Offset of `identifier` at or after `from`, for carets under one name
    /// in a list. Falls back to `from` when the text is not available.
    fn locate(&self, from: usize, identifier: &Identifier) -> usize {
        self.source
            .contents()
            .get(from..)
            .and_then(|rest| rest.find(identifier.as_str()))
            .map_or(from, |found| from + found)
    }

    fn fail(&self, offset: usize, reason: FailureReason) -> CompilationError {
        CompilationError::new(self.source.at(offset), reason)
    }
}

/// What an application resolves to.
#[derive(Debug, Clone)]
enum Target {
    Procedure(Callee),
    Builtin(Identifier),
}

impl Target {
    fn apply(self, argument: Step) -> Step {
        match self {
            Target::Procedure(callee) => Step::Invocation(callee, Box::new(argument)),
            Target::Builtin(name) => Step::External(name, Box::new(argument)),
        }
    }
}

/// State shared across every scope of one compilation.
#[derive(Default)]
struct Translator {
    names: usize,
    callees: usize,
    library: BTreeMap<Callee, Subroutine>,
}

impl Translator {
    fn fresh(&mut self, identifier: &Identifier) -> Name {
        let name = Name {
            index: self.names,
            identifier: identifier.clone(),
        };
        self.names += 1;
        name
    }

    fn callee(&mut self) -> Callee {
        let callee = Callee(self.callees);
        self.callees += 1;
        callee
    }

    fn subroutine(&mut self, outer: &Environment, procedure: &Procedure) -> Result<Subroutine> {
        let mut environment = outer.procedure_scope();

        let mut parameters = Vec::with_capacity(procedure.parameters.len());
        let mut cursor = procedure.offset + procedure.name.as_str().len();
        for parameter in &procedure.parameters {
            let offset = environment.locate(cursor, parameter);
            cursor = offset + parameter.as_str().len();
            if environment.bound_locally(parameter) {
                return Err(environment.fail(
                    offset,
                    FailureReason::VariableAlreadyInUse(parameter.clone()),
                ));
            }
            let name = self.fresh(parameter);
            environment.bind(parameter.clone(), name.clone());
            parameters.push(name);
        }

        let sequence = self.block(&mut environment, &procedure.block)?;
        Ok(Subroutine {
            procedure: procedure.clone(),
            parameters,
            sequence,
            library: Library::default(),
        })
    }

    /// Lower the statements of one scope. Every procedure declared in the
    /// scope is visible from its first statement, and is compiled once the
    /// scope closes, against its complete procedure table.
    fn block(&mut self, environment: &mut Environment, block: &Block) -> Result<Sequence> {
        let mut sequence = Sequence::new();
        let mut declared = Vec::new();

        for statement in block.statements() {
            if let Statement::Declaration(_, procedure) = statement {
                let callee = self.callee();
                environment.declare(procedure, callee)?;
                declared.push((callee, procedure));
            }
        }

        for statement in block.statements() {
            match statement {
                Statement::Assignment(offset, variables, expression) => {
                    let (names, step) =
                        self.assignment(environment, *offset, variables, expression)?;
                    sequence.push(
                        environment.attribute.clone(),
                        Step::Asynchronous(names, Box::new(step)),
                    );
                }
                Statement::Execute(_, expression) => {
                    sequence.extend(self.expression(environment, expression)?);
                }
                Statement::Declaration(..)
                | Statement::Comment(..)
                | Statement::Blank(_)
                | Statement::Series(_) => {}
            }
        }

        self.close(environment, declared)?;
        Ok(sequence)
    }

    fn close(&mut self, environment: &Environment, declared: Vec<(Callee, &Procedure)>) -> Result<()> {
        for (callee, procedure) in declared {
            let subroutine = self.subroutine(environment, procedure)?;
            self.library.insert(callee, subroutine);
        }
        Ok(())
    }

    /// Check the targets, lower the right-hand side in the scope as it was
    /// before the assignment, then bind fresh names.
    fn assignment(
        &mut self,
        environment: &mut Environment,
        offset: usize,
        variables: &[Identifier],
        expression: &Expression,
    ) -> Result<(Vec<Name>, Step)> {
        let mut cursor = offset;
        for (index, variable) in variables.iter().enumerate() {
            let at = environment.locate(cursor, variable);
            cursor = at + variable.as_str().len();
            if environment.bound_locally(variable) || variables[..index].contains(variable) {
                return Err(environment.fail(
                    at,
                    FailureReason::VariableAlreadyInUse(variable.clone()),
                ));
            }
        }

        let step = self.expression(environment, expression)?.into_step();

        let names = variables
            .iter()
            .map(|variable| {
                let name = self.fresh(variable);
                environment.bind(variable.clone(), name.clone());
                name
            })
            .collect();
        Ok((names, step))
    }

    fn expression(&mut self, environment: &Environment, expression: &Expression) -> Result<Sequence> {
        let attribute = environment.attribute.clone();
        let step = match expression {
            Expression::Application(offset, name, argument) => {
                let target = environment.target(*offset, name)?;
                let argument = self.expression(environment, argument)?.into_step();
                target.apply(argument)
            }
            Expression::None(_) => Step::Known(Known::Unit),
            Expression::Text(_, text) => Step::Known(Known::Text(text.clone())),
            Expression::Amount(_, quantity) => Step::Known(Known::Quantity(quantity.clone())),
            Expression::Undefined(offset) => {
                return Err(environment.fail(*offset, FailureReason::EncounteredUndefined));
            }
            Expression::Object(_, Tablet(bindings)) => {
                let mut fields = Vec::with_capacity(bindings.len());
                for Binding(label, value) in bindings {
                    let step = self.expression(environment, value)?.into_step();
                    fields.push((label.clone(), step));
                }
                Step::Known(Known::Tablet(fields))
            }
            Expression::Variable(offset, identifiers) => {
                let mut cursor = *offset;
                let mut depends = Vec::with_capacity(identifiers.len());
                for identifier in identifiers {
                    let at = environment.locate(cursor, identifier);
                    cursor = at + identifier.as_str().len();
                    depends.push(Step::Depends(environment.variable(at, identifier)?));
                }
                Step::Tuple(depends)
            }
            Expression::Operation(_, operator, lhs, rhs) => {
                let lhs = self.expression(environment, lhs)?.into_step();
                let rhs = self.expression(environment, rhs)?.into_step();
                Step::External(
                    combinator_name(*operator),
                    Box::new(Step::Tuple(vec![lhs, rhs])),
                )
            }
            Expression::Grouping(_, inner) => return self.expression(environment, inner),
            Expression::Restriction(_, restriction, block) => {
                let mut child = environment.restrict(restriction);
                return self.block(&mut child, block);
            }
        };
        Ok(Sequence::single(attribute, step))
    }
}

/// Lower a procedure into a [`Subroutine`].
///
/// Translation stops at the first failure. Procedures declared anywhere in
/// the body are compiled into the returned subroutine's library.
pub fn translate(environment: &Environment, procedure: &Procedure) -> Result<Subroutine> {
    let mut translator = Translator::default();
    let mut subroutine = translator.subroutine(environment, procedure)?;
    subroutine.library = Library(translator.library);
    Ok(subroutine)
}

/// Lower a whole file. The first procedure is the entry point; every
/// top-level procedure is declared in the root scope so they can call one
/// another.
pub fn translate_technique(environment: Environment, technique: &Technique) -> Result<Subroutine> {
    let mut environment = environment;
    let mut translator = Translator::default();

    let mut declared = Vec::with_capacity(technique.procedures.len());
    for procedure in &technique.procedures {
        let callee = translator.callee();
        environment.declare(procedure, callee)?;
        declared.push((callee, procedure));
    }

    let Some(&(entry, _)) = declared.first() else {
        return Err(environment.fail(0, FailureReason::InvalidSetup));
    };

    translator.close(&environment, declared)?;
    let Some(mut subroutine) = translator.library.get(&entry).cloned() else {
        return Err(environment.fail(0, FailureReason::InvalidSetup));
    };
    subroutine.library = Library(translator.library);
    Ok(subroutine)
}

/// Parse and translate a source file.
pub fn compile(source: &Source, registry: Arc<Registry>) -> Result<Subroutine> {
    let technique =
        parse_technique(source.contents()).map_err(|bundle| from_parse_errors(source, &bundle))?;
    tracing::debug!(
        file = %source.filename().display(),
        procedures = technique.procedures.len(),
        "parsed"
    );
    translate_technique(Environment::new(source.clone(), registry), &technique)
}

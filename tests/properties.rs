use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use technique::compiler::{Known, Step};
use technique::language::{Identifier, Quantity};
use technique::problem::{FailureReason, Source};
use technique::{Evaluator, Registry, RuntimeFailure, Subroutine, Value, compile};

/// Names the parser or the standard registry already gives a meaning to.
const RESERVED: &[&str] = &[
    "undefined",
    "main",
    "task",
    "write",
    "fail",
    "sleep",
    "combine",
    "wait_both",
    "wait_either",
];

fn ident() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,10}".prop_filter("must not be reserved", |id| {
        !RESERVED.contains(&id.as_str())
    })
}

#[derive(Debug, Clone)]
enum Literal {
    Unit,
    Text(u16),
    Number(u16),
    Millis(u16),
}

impl Literal {
    fn source(&self) -> String {
        match self {
            Literal::Unit => "()".to_string(),
            Literal::Text(n) => format!("\"t{}\"", n),
            Literal::Number(n) => n.to_string(),
            Literal::Millis(n) => format!("{}ms", n),
        }
    }

    fn step(&self) -> Step {
        Step::Known(match self {
            Literal::Unit => Known::Unit,
            Literal::Text(n) => Known::Text(format!("t{}", n)),
            Literal::Number(n) => Known::Quantity(Quantity::Number(i64::from(*n))),
            Literal::Millis(n) => Known::Quantity(Quantity::Measure {
                magnitude: i64::from(*n),
                unit: "ms".into(),
            }),
        })
    }
}

fn literal() -> impl Strategy<Value = Literal> {
    prop_oneof![
        Just(Literal::Unit),
        any::<u16>().prop_map(Literal::Text),
        any::<u16>().prop_map(Literal::Number),
        any::<u16>().prop_map(Literal::Millis),
    ]
}

fn lower(text: &str) -> Result<Subroutine, technique::CompilationError> {
    compile(&Source::new(text, "prop.tq"), Arc::new(Registry::standard()))
}

fn timed_registry() -> Arc<Registry> {
    let registry = Registry::standard();
    registry.register("delay", |value: Value| async move {
        if let Value::Quantity(Quantity::Number(ms)) = &value {
            tokio::time::sleep(Duration::from_millis(*ms as u64)).await;
        }
        Ok(value)
    });
    registry.register("fail_after", |value: Value| async move {
        if let Value::Quantity(Quantity::Number(ms)) = &value {
            tokio::time::sleep(Duration::from_millis(*ms as u64)).await;
        }
        Err(RuntimeFailure::builtin("fail_after", value.to_string()))
    });
    Arc::new(registry)
}

fn evaluate(text: &str) -> Result<Value, RuntimeFailure> {
    let registry = timed_registry();
    let subroutine = compile(&Source::new(text, "prop.tq"), Arc::clone(&registry))
        .unwrap_or_else(|error| panic!("{}", error.render()));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(Evaluator::new(registry).evaluate(&subroutine))
}

proptest! {
    #[test]
    fn rebinding_in_one_scope_fails(name in ident()) {
        let text = format!("main {{\n    {name} = 1\n    {name} = 2\n}}");
        let error = lower(&text).unwrap_err();
        prop_assert_eq!(
            error.reason.clone(),
            FailureReason::VariableAlreadyInUse(Identifier::new(name.clone()))
        );

        let rendered = error.render();
        let carets = rendered.lines().nth(3).unwrap();
        prop_assert_eq!(carets, format!("    {}", "^".repeat(name.len())));
    }

    #[test]
    fn unbound_variables_are_unknown(name in ident()) {
        let text = format!("main {{\n    result = {name}\n}}");
        prop_assert_eq!(
            lower(&text).unwrap_err().reason,
            FailureReason::UseOfUnknownIdentifier(Identifier::new(name))
        );
    }

    #[test]
    fn unknown_applications_fail(name in ident()) {
        let text = format!("main {{\n    {name} ()\n}}");
        prop_assert_eq!(
            lower(&text).unwrap_err().reason,
            FailureReason::CallToUnknownProcedure(Identifier::new(name))
        );
    }

    #[test]
    fn restrictions_do_not_leak_names(name in ident(), role in ident()) {
        let text = format!("main {{\n    @{role} {{\n        {name} = 1\n    }}\n    {name}\n}}");
        prop_assert_eq!(
            lower(&text).unwrap_err().reason,
            FailureReason::UseOfUnknownIdentifier(Identifier::new(name))
        );
    }

    #[test]
    fn literal_statements_lower_in_order(
        literals in prop::collection::vec(literal(), 0..12),
        comments in prop::collection::vec(any::<bool>(), 12),
    ) {
        let mut text = String::from("main {\n");
        for (literal, comment) in literals.iter().zip(&comments) {
            if *comment {
                text.push_str("    -- note\n\n");
            }
            text.push_str(&format!("    {}\n", literal.source()));
        }
        text.push('}');

        let subroutine = lower(&text).unwrap();
        let steps: Vec<Step> = subroutine.sequence.iter().map(|(_, step)| step.clone()).collect();
        let expected: Vec<Step> = literals.iter().map(Literal::step).collect();
        prop_assert_eq!(steps, expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn wait_both_waits_for_both_operands(left in 0u16..20, right in 0u16..20) {
        let text = format!("main {{\n    delay {left} & delay {right}\n}}");
        prop_assert_eq!(
            evaluate(&text),
            Ok(Value::Parallel(vec![
                Value::number(i64::from(left)),
                Value::number(i64::from(right)),
            ]))
        );
    }

    #[test]
    fn combine_waits_for_both_operands(left in 0u16..20, right in 0u16..20) {
        let text = format!("main {{\n    a = delay {left}\n    b = delay {right}\n    a + b\n}}");
        prop_assert_eq!(evaluate(&text), Ok(Value::number(i64::from(left) + i64::from(right))));
    }

    #[test]
    fn wait_either_surfaces_an_earlier_failure(fast in 0u16..20, flip in any::<bool>()) {
        let slow = fast + 150;
        let text = if flip {
            format!("main {{\n    delay {slow} | fail_after {fast}\n}}")
        } else {
            format!("main {{\n    fail_after {fast} | delay {slow}\n}}")
        };
        prop_assert_eq!(
            evaluate(&text),
            Err(RuntimeFailure::builtin("fail_after", fast.to_string()))
        );
    }

    #[test]
    fn wait_either_ignores_a_later_failure(fast in 0u16..20, flip in any::<bool>()) {
        let slow = fast + 150;
        let text = if flip {
            format!("main {{\n    fail_after {slow} | delay {fast}\n}}")
        } else {
            format!("main {{\n    delay {fast} | fail_after {slow}\n}}")
        };
        prop_assert_eq!(evaluate(&text), Ok(Value::number(i64::from(fast))));
    }

    #[test]
    fn wait_either_yields_one_operand(left in 0u16..20, right in 0u16..20) {
        let text = format!("main {{\n    delay {left} | delay {right}\n}}");
        let value = evaluate(&text).unwrap();
        prop_assert!(
            value == Value::number(i64::from(left)) || value == Value::number(i64::from(right))
        );
    }
}

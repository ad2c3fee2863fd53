use std::sync::Arc;

use technique::language::{Identifier, Label, Quantity};
use technique::problem::FailureReason;
use technique::runtime::{RuntimeConfig, write_config};
use technique::{Evaluator, Registry, RuntimeFailure, Source, Subroutine, Value, compile};
use tempfile::TempDir;

const TEA: &str = r#"make_tea {
    -- boil and gather leaves at the same time
    water = @kettle { boil 500mL }
    leaves = task "measure leaves"

    cup = steep (water & leaves)
    [ "cup" = cup, "time" = 4min ]
}

boil amount {
    task amount
}

steep inputs {
    sleep 1ms
    inputs
}
"#;

fn build(text: &str, registry: &Arc<Registry>) -> Subroutine {
    compile(&Source::new(text, "main.tq"), Arc::clone(registry))
        .unwrap_or_else(|error| panic!("{}", error.render()))
}

fn measure(magnitude: i64, unit: &str) -> Value {
    Value::Quantity(Quantity::Measure {
        magnitude,
        unit: unit.to_string(),
    })
}

#[tokio::test]
async fn paired_bindings_evaluate_to_both_values() {
    let registry = Arc::new(Registry::standard());
    let subroutine = build("main {\n    a = 1\n    b = 2\n    c = a & b\n}", &registry);

    let outcome = Evaluator::new(registry).evaluate(&subroutine).await;
    assert_eq!(
        outcome,
        Ok(Value::Parallel(vec![Value::number(1), Value::number(2)]))
    );
}

#[test]
fn redeclared_variable_fails_with_its_exit_code() {
    let registry = Arc::new(Registry::standard());
    let error = compile(
        &Source::new("main {\n    a = 1\n    a = 1\n}", "main.tq"),
        registry,
    )
    .unwrap_err();

    assert_eq!(
        error.reason,
        FailureReason::VariableAlreadyInUse(Identifier::new("a"))
    );
    assert_eq!(error.exit_code(), 3);
    assert_eq!(
        error.render(),
        "main.tq:3:5\n\n    a = 1\n    ^\n\nVariable by the name of 'a' already defined."
    );
}

#[tokio::test]
async fn recipe_runs_across_procedures_and_roles() {
    let registry = Arc::new(Registry::standard());
    let subroutine = build(TEA, &registry);
    assert_eq!(subroutine.library.len(), 3);

    let outcome = Evaluator::new(registry).evaluate(&subroutine).await;
    assert_eq!(
        outcome,
        Ok(Value::Tablet(vec![
            (
                Label("cup".into()),
                Value::Parallel(vec![measure(500, "mL"), Value::from("measure leaves")])
            ),
            (Label("time".into()), measure(4, "min")),
        ]))
    );
}

#[tokio::test]
async fn host_builtins_extend_the_language() {
    let registry = Registry::standard();
    registry.register("grind", |value: Value| async move {
        match value {
            Value::Quantity(Quantity::Measure { magnitude, unit }) if unit == "g" => {
                Ok(Value::Text(format!("{} g ground", magnitude)))
            }
            other => Err(RuntimeFailure::builtin(
                "grind",
                format!("cannot grind {}", other.kind()),
            )),
        }
    });
    let registry = Arc::new(registry);

    let ok = build("main {\n    grind 18g\n}", &registry);
    let evaluator = Evaluator::new(Arc::clone(&registry));
    assert_eq!(evaluator.evaluate(&ok).await, Ok(Value::from("18 g ground")));

    let bad = build("main {\n    grind \"beans\"\n}", &registry);
    assert_eq!(
        evaluator.evaluate(&bad).await,
        Err(RuntimeFailure::builtin("grind", "cannot grind text"))
    );
}

#[test]
fn unregistered_builtins_are_unknown_procedures() {
    let error = compile(
        &Source::new("main {\n    grind 18g\n}", "main.tq"),
        Arc::new(Registry::standard()),
    )
    .unwrap_err();
    assert_eq!(error.exit_code(), 5);
}

#[tokio::test]
async fn compiled_procedures_survive_serialization() {
    let registry = Arc::new(Registry::standard());
    let subroutine = build(TEA, &registry);

    let json = serde_json::to_string(&subroutine).unwrap();
    let restored: Subroutine = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, subroutine);

    let evaluator = Evaluator::new(registry);
    assert_eq!(
        evaluator.evaluate(&restored).await,
        evaluator.evaluate(&subroutine).await
    );
}

#[test]
fn blocking_evaluation_uses_stored_config() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("technique.json");
    write_config(
        &path,
        &RuntimeConfig {
            worker_threads: 2,
            debug: false,
        },
    )
    .unwrap();
    let config = technique::runtime::load_config(&path).unwrap();

    let registry = Arc::new(Registry::standard());
    let subroutine = build("main {\n    a = 2\n    b = 40\n    a + b\n}", &registry);
    let outcome = Evaluator::new(registry)
        .evaluate_blocking(&subroutine, &config)
        .unwrap();
    assert_eq!(outcome, Ok(Value::number(42)));
}

#[tokio::test]
async fn entry_parameters_receive_arguments() {
    let registry = Arc::new(Registry::standard());
    let subroutine = build("main order {\n    task order\n}", &registry);
    let evaluator = Evaluator::new(registry);

    assert_eq!(evaluator.evaluate(&subroutine).await, Ok(Value::Unit));
    assert_eq!(
        evaluator
            .evaluate_with(&subroutine, Value::from("flat white"))
            .await,
        Ok(Value::from("flat white"))
    );
}

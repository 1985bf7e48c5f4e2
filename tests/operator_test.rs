use std::collections::HashMap;

use demoswork::dsl::{Condition, OutputRef, Term};
use demoswork::runtime::evaluator::{EvalMode, evaluate};
use serde_json::{Value, json};

fn outputs() -> HashMap<String, Value> {
    HashMap::from([(
        "step_pay".to_string(),
        json!({ "result": "success", "hash": "0xabc", "amount": 5, "tags": ["a", "b"], "empty": null }),
    )])
}

fn field(key: &str) -> OutputRef {
    OutputRef::new("step_pay", &format!("output.{key}"))
}

fn condition(operator: &str, a: impl Into<Term>, b: impl Into<Term>) -> Condition {
    Condition::new(
        "cond_test".to_string(),
        operator.parse().expect("known operator"),
        a.into(),
        Some(b.into()),
    )
    .expect("valid arity")
}

fn check(operator: &str, a: impl Into<Term>, b: impl Into<Term>) -> bool {
    evaluate(&condition(operator, a, b), &outputs(), EvalMode::Evaluate).expect("evaluates")
}

fn check_not(a: impl Into<Term>) -> bool {
    let condition = Condition::new("cond_not".to_string(), "not".parse().expect("known operator"), a.into(), None)
        .expect("valid arity");
    evaluate(&condition, &outputs(), EvalMode::Evaluate).expect("evaluates")
}

#[test]
fn test_loose_equality() {
    assert!(check("==", field("result"), "success"));
    assert!(check("==", field("amount"), "5"));
    assert!(check("==", field("missing"), Value::Null));
    assert!(!check("==", field("result"), "error"));
    assert!(!check("==", 0_i64, Value::Null));
}

#[test]
fn test_loose_inequality() {
    assert!(check("!=", field("result"), "error"));
    assert!(!check("!=", field("amount"), "5"));
}

#[test]
fn test_strict_equality() {
    assert!(check("===", field("hash"), "0xabc"));
    assert!(check("===", field("amount"), 5.0));
    assert!(!check("===", field("amount"), "5"));
    assert!(!check("===", field("empty"), field("missing")));
}

#[test]
fn test_strict_inequality() {
    assert!(check("!==", field("amount"), "5"));
    assert!(!check("!==", field("amount"), 5_i64));
}

#[test]
fn test_ordering() {
    assert!(check(">", field("amount"), 2_i64));
    assert!(!check(">", "10", "9"));
    assert!(check(">=", field("amount"), "5"));
    assert!(!check(">=", 1_i64, 2_i64));
    assert!(check("<", 1_i64, 2_i64));
    assert!(!check("<", field("amount"), 5_i64));
    assert!(check("<=", "a", "b"));
    assert!(!check("<=", 3_i64, 2_i64));
}

#[test]
fn test_ordering_with_undefined_is_false() {
    assert!(!check("<", field("missing"), 1_i64));
    assert!(!check(">=", field("missing"), 1_i64));
    assert!(!check("<=", field("missing"), field("missing")));
}

#[test]
fn test_membership() {
    assert!(check("in", "b", field("tags")));
    assert!(!check("in", "z", field("tags")));
    assert!(check("in", "0xa", field("hash")));
    assert!(check("in", "result", json!({ "result": 1 })));
    assert!(!check("in", field("missing"), field("tags")));
}

#[test]
fn test_non_membership() {
    assert!(check("not in", "z", field("tags")));
    assert!(!check("not in", "a", field("tags")));
}

#[test]
fn test_boolean_and_or() {
    assert!(check("&&", true, field("result")));
    assert!(!check("&&", true, 0_i64));
    assert!(check("||", false, 1_i64));
    assert!(!check("||", false, ""));
    assert!(!check("||", field("missing"), field("empty")));
}

#[test]
fn test_not() {
    assert!(check_not(false));
    assert!(check_not(field("missing")));
    assert!(!check_not(field("result")));
}

#[test]
fn test_nested_conditions_evaluate_to_booleans() {
    let paid = condition("==", field("result"), "success");
    let large = condition(">", field("amount"), 100_i64);

    assert!(check("||", paid.clone(), large.clone()));
    assert!(!check("&&", paid, large));
}

#[test]
fn test_missing_record_soft_fails() {
    let unknown = OutputRef::new("step_never_ran", "output.result");
    assert!(check("==", unknown.clone(), Value::Null));
    assert!(!check("===", unknown, Value::Null));
}

#[test]
fn test_validate_only_skips_comparison() {
    let never = condition("==", field("result"), "error");
    assert!(!evaluate(&never, &outputs(), EvalMode::Evaluate).expect("evaluates"));
    assert!(evaluate(&never, &HashMap::<String, Value>::new(), EvalMode::ValidateOnly).expect("well formed"));
}

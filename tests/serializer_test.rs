mod common;

use common::Mocks;
use demoswork::dsl::uid::SequentialUid;
use demoswork::dsl::{Operand, Operation, Script, Web2Request};
use demoswork::{DemosWork, WorkError};
use serde_json::{Value, json};

/// Pay, notify on success with a nested check, refund otherwise.
fn build_script() -> Script {
    let mut work = DemosWork::with_generator(SequentialUid::new());
    let pay = work.xm_step(json!({ "to": "0xrecipient", "amount": 10 }));
    work.describe(&pay, "Pay recipient");
    let notify = work.web2_step(
        Web2Request::post("https://api.example.com/notify").data(json!({ "hash": pay.hash() })),
    );
    let refund = work.native_step(json!({ "refund": 10 }));

    let paid = work.condition("==", pay.result(), "success").expect("valid condition");
    let hashed = work.not(pay.output("missing")).expect("valid condition");
    let both = work.condition("&&", paid, hashed).expect("valid condition");

    let branch = work.conditional().if_cond(both).then(&notify).else_(&refund).build();
    let seq = work.base().add(&pay).add(&branch).build();
    work.push(&seq);
    work.build().expect("valid script")
}

#[test]
fn test_document_shape() {
    let script = build_script();
    let doc = serde_json::to_value(script.to_document().expect("encodes")).expect("serializes");

    assert_eq!(doc["rootOrder"], json!(["op_8"]));
    assert_eq!(
        doc["steps"]["step_1"],
        json!({
            "id": "step_1",
            "kind": "xm",
            "input": { "to": "0xrecipient", "amount": 10 },
            "description": "Pay recipient"
        })
    );
    assert_eq!(doc["steps"]["step_2"]["input"]["method"], json!("POST"));
    assert_eq!(doc["operations"]["op_8"], json!({ "id": "op_8", "operationType": "base", "order": ["step_1", "op_7"] }));

    let conditional = &doc["operations"]["op_7"];
    assert_eq!(conditional["operationType"], json!("conditional"));
    assert_eq!(conditional["order"], json!(["cond_6"]));
    assert_eq!(conditional["default"], json!({ "type": "step", "uid": "step_3" }));

    let condition = &conditional["conditions"]["cond_6"];
    assert_eq!(condition["stepUID"], json!("cond_6"));
    assert_eq!(condition["operator"], json!("&&"));
    assert_eq!(condition["do"], json!({ "type": "step", "uid": "step_2" }));
    assert_eq!(
        condition["value_a"],
        json!({
            "type": "condition",
            "condition": {
                "stepUID": "cond_4",
                "operator": "==",
                "value_a": { "type": "internal", "workUID": "step_1", "key": "output.result" },
                "value_b": { "type": "static", "value": "success" }
            }
        })
    );
    assert_eq!(condition["value_b"]["condition"]["operator"], json!("not"));
    assert!(condition["value_b"]["condition"].get("value_b").is_none());
}

#[test]
fn test_round_trip_preserves_script() {
    let script = build_script();
    let json = script.to_json().expect("encodes");

    let decoded = Script::from_json(&json).expect("decodes");
    assert_eq!(decoded, script);

    let Some(Operation::Conditional(conditional)) = decoded.operation("op_7") else {
        panic!("expected a conditional operation");
    };
    let condition = &conditional.conditions["cond_6"];
    assert_eq!(condition.work, vec!["step_1".to_string()]);
    assert!(matches!(&condition.value_a, Operand::Condition(inner) if inner.id == "cond_4"));
}

#[tokio::test]
async fn test_round_trip_executes_identically() {
    let script = build_script();
    let decoded = Script::from_json(&script.to_json().expect("encodes")).expect("decodes");

    let outputs = json!({ "result": "success", "hash": "0xabc" });
    let direct = Mocks::new().output("step_1", outputs.clone());
    let replayed = Mocks::new().output("step_1", outputs);

    let a = direct.executor().execute(&script).await.expect("execution");
    let b = replayed.executor().execute(&decoded).await.expect("execution");

    assert_eq!(a.results, b.results);
    assert_eq!(a.trace, b.trace);
    assert_eq!(direct.calls(), replayed.calls());
    assert_eq!(direct.calls(), vec!["step_1".to_string(), "step_2".to_string()]);
}

fn document(operations: Value, root_order: Value) -> String {
    json!({
        "steps": {
            "step_pay": { "id": "step_pay", "kind": "xm", "input": { "to": "0xrecipient" } },
            "step_notify": {
                "id": "step_notify",
                "kind": "web2",
                "input": { "method": "POST", "url": "https://api.example.com/notify" }
            }
        },
        "operations": operations,
        "rootOrder": root_order
    })
    .to_string()
}

fn conditional(condition: Value) -> Value {
    json!({
        "op_check": {
            "id": "op_check",
            "operationType": "conditional",
            "order": ["cond_ok"],
            "conditions": { "cond_ok": condition }
        }
    })
}

fn paid_condition(action: Value) -> Value {
    json!({
        "stepUID": "cond_ok",
        "operator": "==",
        "value_a": { "type": "internal", "workUID": "step_pay", "key": "output.result" },
        "value_b": { "type": "static", "value": "success" },
        "do": action
    })
}

#[test]
fn test_forward_references_resolve() {
    // "op_a" sorts first and references "op_check", declared after it.
    let mut operations = conditional(paid_condition(json!({ "type": "step", "uid": "step_notify" })));
    operations["op_a"] = json!({ "id": "op_a", "operationType": "base", "order": ["op_check"] });
    let json = document(operations, json!(["op_a"]));

    let script = Script::from_json(&json).expect("decodes");
    assert_eq!(script.root_order().len(), 1);
    assert_eq!(script.operations().len(), 2);
}

#[test]
fn test_dangling_action_names_missing_id() {
    let json = document(
        conditional(paid_condition(json!({ "type": "step", "uid": "step_gone" }))),
        json!(["op_check"]),
    );

    let err = Script::from_json(&json).unwrap_err();
    assert!(matches!(err, WorkError::DanglingReference { id, .. } if id == "step_gone"));
}

#[test]
fn test_dangling_root_item() {
    let json = document(json!({}), json!(["step_pay", "step_notify", "op_gone"]));

    let err = Script::from_json(&json).unwrap_err();
    assert!(matches!(err, WorkError::DanglingReference { id, .. } if id == "op_gone"));
}

#[test]
fn test_action_kind_must_match() {
    let json = document(
        conditional(paid_condition(json!({ "type": "operation", "uid": "step_notify" }))),
        json!(["op_check"]),
    );

    let err = Script::from_json(&json).unwrap_err();
    assert!(matches!(err, WorkError::KindMismatch { id, .. } if id == "step_notify"));
}

#[test]
fn test_unknown_operator_in_document() {
    let mut condition = paid_condition(json!({ "type": "step", "uid": "step_notify" }));
    condition["operator"] = json!("=~");
    let json = document(conditional(condition), json!(["op_check"]));

    let err = Script::from_json(&json).unwrap_err();
    assert!(matches!(err, WorkError::InvalidOperator(op) if op == "=~"));
}

#[test]
fn test_not_with_second_operand_in_document() {
    let mut condition = paid_condition(json!({ "type": "step", "uid": "step_notify" }));
    condition["operator"] = json!("not");
    let json = document(conditional(condition), json!(["op_check"]));

    let err = Script::from_json(&json).unwrap_err();
    assert!(matches!(err, WorkError::UnexpectedOperand { .. }));
}

#[test]
fn test_top_level_condition_needs_action() {
    let mut condition = paid_condition(Value::Null);
    condition.as_object_mut().expect("object").remove("do");
    let json = document(conditional(condition), json!(["op_check", "step_notify"]));

    let err = Script::from_json(&json).unwrap_err();
    assert!(matches!(err, WorkError::IncompleteCondition(id) if id == "cond_ok"));
}

#[test]
fn test_unused_step_in_document() {
    let json = document(json!({}), json!(["step_pay"]));

    let err = Script::from_json(&json).unwrap_err();
    assert!(matches!(err, WorkError::UnusedStep(id) if id == "step_notify"));
}

#[test]
fn test_mismatched_key_and_id() {
    let json = document(
        json!({ "op_x": { "id": "op_y", "operationType": "base", "order": ["step_pay", "step_notify"] } }),
        json!(["op_x"]),
    );

    let err = Script::from_json(&json).unwrap_err();
    assert!(matches!(err, WorkError::IdMismatch { key, id } if key == "op_x" && id == "op_y"));
}

#[test]
fn test_circular_operations() {
    let json = document(
        json!({
            "op_a": { "id": "op_a", "operationType": "base", "order": ["step_pay", "op_b"] },
            "op_b": { "id": "op_b", "operationType": "base", "order": ["step_notify", "op_a"] }
        }),
        json!(["op_a"]),
    );

    let err = Script::from_json(&json).unwrap_err();
    assert!(matches!(err, WorkError::CircularReference(_)));
}

#[test]
fn test_malformed_document() {
    let err = Script::from_json("{ \"steps\": 3 }").unwrap_err();
    assert!(matches!(err, WorkError::Json(_)));
}

#[tokio::test]
async fn test_operation_outcome_as_operand() {
    let json = document(
        json!({
            "op_pay": { "id": "op_pay", "operationType": "base", "order": ["step_pay"] },
            "op_check": {
                "id": "op_check",
                "operationType": "conditional",
                "order": ["cond_done"],
                "conditions": {
                    "cond_done": {
                        "stepUID": "cond_done",
                        "operator": "===",
                        "value_a": { "type": "internal", "workUID": "op_pay", "key": "output.success" },
                        "value_b": { "type": "static", "value": true },
                        "do": { "type": "step", "uid": "step_notify" }
                    }
                }
            }
        }),
        json!(["op_pay", "op_check"]),
    );
    let script = Script::from_json(&json).expect("decodes");

    let mocks = Mocks::new();
    let report = mocks.executor().execute(&script).await.expect("execution");

    assert_eq!(mocks.calls(), vec!["step_pay".to_string(), "step_notify".to_string()]);
    assert!(report.contains("cond_done"));
}

#[test]
fn test_condition_id_must_not_shadow_step() {
    let mut condition = paid_condition(json!({ "type": "step", "uid": "step_notify" }));
    condition["stepUID"] = json!("step_pay");
    let mut operations = conditional(Value::Null);
    operations["op_check"]["order"] = json!(["step_pay"]);
    operations["op_check"]["conditions"] = json!({ "step_pay": condition });
    let json = document(operations, json!(["op_check"]));

    let err = Script::from_json(&json).unwrap_err();
    assert!(matches!(err, WorkError::DuplicateId(id) if id == "step_pay"));
}

#[test]
fn test_condition_ids_are_unique_across_operations() {
    let condition = paid_condition(json!({ "type": "step", "uid": "step_notify" }));
    let mut operations = conditional(condition.clone());
    operations["op_again"] = conditional(condition)["op_check"].clone();
    operations["op_again"]["id"] = json!("op_again");
    let json = document(operations, json!(["op_check", "op_again"]));

    let err = Script::from_json(&json).unwrap_err();
    assert!(matches!(err, WorkError::DuplicateId(id) if id == "cond_ok"));
}

#[test]
fn test_nested_condition_id_must_be_unique() {
    let mut condition = paid_condition(json!({ "type": "step", "uid": "step_notify" }));
    condition["operator"] = json!("&&");
    condition["value_b"] = json!({ "type": "condition", "condition": paid_condition(Value::Null) });
    condition["value_b"]["condition"]
        .as_object_mut()
        .expect("object")
        .remove("do");
    let json = document(conditional(condition), json!(["op_check"]));

    let err = Script::from_json(&json).unwrap_err();
    assert!(matches!(err, WorkError::DuplicateId(id) if id == "cond_ok"));
}

#[test]
fn test_condition_outside_order_does_not_count_as_use() {
    let mut operations = conditional(paid_condition(json!({ "type": "step", "uid": "step_notify" })));
    operations["op_check"]["conditions"]["cond_stray"] = json!({
        "stepUID": "cond_stray",
        "operator": "==",
        "value_a": { "type": "internal", "workUID": "step_audit", "key": "output.result" },
        "value_b": { "type": "static", "value": "success" },
        "do": { "type": "step", "uid": "step_notify" }
    });
    let mut doc: Value = serde_json::from_str(&document(operations, json!(["op_check"]))).expect("valid json");
    doc["steps"]["step_audit"] = json!({ "id": "step_audit", "kind": "native", "input": {} });

    let err = Script::from_json(&doc.to_string()).unwrap_err();
    assert!(matches!(err, WorkError::UnusedStep(id) if id == "step_audit"));
}

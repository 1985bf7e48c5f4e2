use std::collections::HashMap;

use serde_json::{Value, json};

use crate::dsl::{Condition, Operand};
use crate::error::WorkError;
use crate::runtime::compare::{compare, get_value};

/// Materialized outputs that `internal` operands resolve against.
pub trait OutputSource {
    /// Output of an executed step or operation, if any.
    fn output_of(&self, work_uid: &str) -> Option<Value>;

    /// Resolves `key` (e.g. `output.hash`) against the record of
    /// `work_uid`. Missing records and paths yield `None`.
    fn lookup(&self, work_uid: &str, key: &str) -> Option<Value> {
        let record = json!({ "output": self.output_of(work_uid)? });
        get_value(&record, key).cloned()
    }
}

/// Plain id -> output map.
impl OutputSource for HashMap<String, Value> {
    fn output_of(&self, work_uid: &str) -> Option<Value> {
        self.get(work_uid).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    Evaluate,
    /// Structural check only: operators and arity, no data access.
    /// Always yields `true` for a well-formed condition.
    ValidateOnly,
}

/// Evaluates a condition against produced outputs.
pub fn evaluate(condition: &Condition, source: &dyn OutputSource, mode: EvalMode) -> Result<bool, WorkError> {
    condition.operator.check_arity(condition.value_b.is_some())?;

    if mode == EvalMode::ValidateOnly {
        for operand in condition.operands() {
            if let Operand::Condition(nested) = operand {
                evaluate(nested, source, mode)?;
            }
        }
        return Ok(true);
    }

    let a = resolve(&condition.value_a, source)?;
    let b = condition
        .value_b
        .as_ref()
        .map(|operand| resolve(operand, source))
        .transpose()?
        .flatten();

    Ok(compare(condition.operator, a.as_ref(), b.as_ref()))
}

/// Resolves an operand to a value; `None` is undefined.
fn resolve(operand: &Operand, source: &dyn OutputSource) -> Result<Option<Value>, WorkError> {
    Ok(match operand {
        Operand::Static { value } => Some(value.clone()),
        Operand::Internal { work_uid, key } => source.lookup(work_uid, key),
        Operand::Condition(nested) => Some(Value::Bool(evaluate(nested, source, EvalMode::Evaluate)?)),
    })
}

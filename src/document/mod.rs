//! Portable, id-referencing form of a [`Script`](crate::dsl::Script).
//!
//! Steps appear once in `steps`; operations and conditions only ever refer
//! to them by id. This is the shape a remote executor accepts.

pub mod codec;
pub mod loader;
pub mod validator;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dsl::{StepKind, WorkRef};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptDocument {
    #[serde(default)]
    pub steps: BTreeMap<String, StepDocument>,
    #[serde(default)]
    pub operations: BTreeMap<String, OperationDocument>,
    #[serde(rename = "rootOrder", default)]
    pub root_order: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDocument {
    pub id: String,
    pub kind: StepKind,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operationType", rename_all = "lowercase")]
pub enum OperationDocument {
    Base {
        id: String,
        order: Vec<String>,
    },
    Conditional {
        id: String,
        order: Vec<String>,
        conditions: BTreeMap<String, ConditionDocument>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<WorkRef>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDocument {
    /// Id of the condition itself.
    #[serde(rename = "stepUID")]
    pub step_uid: String,
    pub operator: String,
    pub value_a: OperandDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_b: Option<OperandDocument>,
    #[serde(rename = "do", default, skip_serializing_if = "Option::is_none")]
    pub action: Option<WorkRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OperandDocument {
    Static {
        #[serde(default)]
        value: Value,
    },
    Internal {
        #[serde(rename = "workUID")]
        work_uid: String,
        key: String,
    },
    Condition {
        condition: Box<ConditionDocument>,
    },
}

pub mod builder;
pub mod condition;
pub mod uid;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorkError;

pub use condition::{Condition, OutputRef, Term};

pub type StepId = String;

/// Execution context of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Cross-chain transaction
    Xm,
    /// HTTP call
    Web2,
    /// Native chain payload
    Native,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Xm => write!(f, "xm"),
            StepKind::Web2 => write!(f, "web2"),
            StepKind::Native => write!(f, "native"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// Request performed by a web2 step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Web2Request {
    #[serde(default)]
    pub method: HttpMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// JSON body. May embed step output references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Web2Request {
    pub fn new(method: HttpMethod, url: &str) -> Self {
        Self {
            method,
            url: url.to_string(),
            headers: BTreeMap::new(),
            data: None,
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: &str) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Payload of a step, one variant per step kind.
#[derive(Debug, Clone, PartialEq)]
pub enum StepInput {
    Xm(Value),
    Web2(Web2Request),
    Native(Value),
}

impl StepInput {
    pub fn kind(&self) -> StepKind {
        match self {
            StepInput::Xm(_) => StepKind::Xm,
            StepInput::Web2(_) => StepKind::Web2,
            StepInput::Native(_) => StepKind::Native,
        }
    }

    /// Opaque payload as JSON.
    pub fn to_value(&self) -> Result<Value, WorkError> {
        Ok(match self {
            StepInput::Xm(payload) | StepInput::Native(payload) => payload.clone(),
            StepInput::Web2(request) => serde_json::to_value(request)?,
        })
    }

    pub fn from_value(kind: StepKind, input: Value) -> Result<Self, WorkError> {
        Ok(match kind {
            StepKind::Xm => StepInput::Xm(input),
            StepKind::Native => StepInput::Native(input),
            StepKind::Web2 => StepInput::Web2(serde_json::from_value(input)?),
        })
    }

    /// Ids of the steps whose outputs are embedded in this input, in
    /// first-seen order.
    pub fn references(&self) -> Vec<StepId> {
        let mut found = Vec::new();
        match self {
            StepInput::Xm(payload) | StepInput::Native(payload) => collect_references(payload, &mut found),
            StepInput::Web2(request) => {
                if let Some(data) = &request.data {
                    collect_references(data, &mut found);
                }
            }
        }
        found
    }
}

fn collect_references(value: &Value, found: &mut Vec<StepId>) {
    if let Some(output) = OutputRef::from_value(value) {
        if !found.contains(&output.uid) {
            found.push(output.uid);
        }
        return;
    }
    match value {
        Value::Array(items) => items.iter().for_each(|v| collect_references(v, found)),
        Value::Object(map) => map.values().for_each(|v| collect_references(v, found)),
        _ => {}
    }
}

/// Atomic unit of execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub id: StepId,
    pub input: StepInput,
    pub description: Option<String>,
}

impl Step {
    pub fn kind(&self) -> StepKind {
        self.input.kind()
    }

    /// Description if set, otherwise the id.
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkKind {
    Step,
    Operation,
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkKind::Step => write!(f, "step"),
            WorkKind::Operation => write!(f, "operation"),
        }
    }
}

/// Reference to a step or operation held by the script arena.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkRef {
    #[serde(rename = "type")]
    pub kind: WorkKind,
    pub uid: String,
}

impl WorkRef {
    pub fn step(uid: &str) -> Self {
        Self { kind: WorkKind::Step, uid: uid.to_string() }
    }

    pub fn operation(uid: &str) -> Self {
        Self { kind: WorkKind::Operation, uid: uid.to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    LooseEq,
    StrictEq,
    Gt,
    Gte,
    Lt,
    Lte,
    LooseNe,
    StrictNe,
    In,
    NotIn,
    And,
    Or,
    Not,
}

impl Operator {
    pub const ALL: [Operator; 13] = [
        Operator::LooseEq,
        Operator::StrictEq,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::LooseNe,
        Operator::StrictNe,
        Operator::In,
        Operator::NotIn,
        Operator::And,
        Operator::Or,
        Operator::Not,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::LooseEq => "==",
            Operator::StrictEq => "===",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::LooseNe => "!=",
            Operator::StrictNe => "!==",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Not => "not",
        }
    }

    pub fn is_unary(&self) -> bool {
        matches!(self, Operator::Not)
    }

    /// Checks operand arity without evaluating anything.
    pub fn check_arity(&self, has_value_b: bool) -> Result<(), WorkError> {
        match (self.is_unary(), has_value_b) {
            (true, true) => Err(WorkError::UnexpectedOperand { operator: self.to_string() }),
            (false, false) => Err(WorkError::MissingOperand { operator: self.to_string() }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = WorkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| WorkError::InvalidOperator(s.to_string()))
    }
}

/// Stored form of a condition operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Static { value: Value },
    Internal { work_uid: String, key: String },
    Condition(Box<Condition>),
}

/// Plain ordered sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseOperation {
    pub id: String,
    pub order: Vec<WorkRef>,
}

/// if / elif / else chain, first match wins.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalOperation {
    pub id: String,
    pub conditions: BTreeMap<String, Condition>,
    pub order: Vec<String>,
    pub default: Option<WorkRef>,
}

impl ConditionalOperation {
    /// Conditions in evaluation order.
    pub fn ordered(&self) -> impl Iterator<Item = Result<&Condition, WorkError>> {
        self.order.iter().map(|cid| {
            self.conditions.get(cid).ok_or_else(|| WorkError::DanglingReference {
                id: cid.clone(),
                referenced_by: self.id.clone(),
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Base(BaseOperation),
    Conditional(ConditionalOperation),
}

impl Operation {
    pub fn id(&self) -> &str {
        match self {
            Operation::Base(op) => &op.id,
            Operation::Conditional(op) => &op.id,
        }
    }
}

/// Root container. Sole owner of every step and operation; all
/// cross-references are ids resolved through it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub(crate) steps: BTreeMap<StepId, Step>,
    pub(crate) operations: BTreeMap<String, Operation>,
    pub(crate) root_order: Vec<WorkRef>,
}

impl Script {
    pub fn steps(&self) -> &BTreeMap<StepId, Step> {
        &self.steps
    }

    pub fn operations(&self) -> &BTreeMap<String, Operation> {
        &self.operations
    }

    pub fn root_order(&self) -> &[WorkRef] {
        &self.root_order
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.get(id)
    }

    pub fn operation(&self, id: &str) -> Option<&Operation> {
        self.operations.get(id)
    }

    /// Which arena an id lives in, if any.
    pub fn kind_of(&self, id: &str) -> Option<WorkKind> {
        if self.steps.contains_key(id) {
            Some(WorkKind::Step)
        } else if self.operations.contains_key(id) {
            Some(WorkKind::Operation)
        } else {
            None
        }
    }

    /// Structural checks: references, arity, unused steps, cycles.
    pub fn validate(&self) -> Result<(), WorkError> {
        crate::document::validator::validate(self)
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::dsl::WorkRef;
use crate::runtime::evaluator::OutputSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Error,
}

/// One entry of the results map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkResult {
    /// Output as returned by the step handler, or an error outcome.
    Step { status: StepStatus, output: Value },
    /// A condition that matched, and how its action went.
    Condition { action: WorkRef, success: bool },
    Operation { success: bool },
}

impl WorkResult {
    /// What `output.<key>` paths resolve against.
    pub fn output_view(&self) -> Value {
        match self {
            WorkResult::Step { output, .. } => output.clone(),
            WorkResult::Condition { success, .. } => json!({ "result": true, "success": success }),
            WorkResult::Operation { success } => json!({ "success": success }),
        }
    }
}

/// How a unit of work ended, as seen by its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// A step failed and no base has stopped on it yet.
    Failed,
    /// A base stopped early on a failed item. Parents keep going.
    Aborted,
    /// Conditional with no match and no default.
    Skipped,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Success | Outcome::Skipped)
    }
}

/// State owned by a single execution pass: the results map, which doubles
/// as the executed-step memo.
pub struct RunContext {
    pub run_id: Uuid,
    results: HashMap<String, WorkResult>,
    trace: Vec<String>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            results: HashMap::new(),
            trace: Vec::new(),
        }
    }

    /// Outcome of a step already executed in this pass.
    pub fn step_outcome(&self, id: &str) -> Option<Outcome> {
        match self.results.get(id)? {
            WorkResult::Step { status: StepStatus::Success, .. } => Some(Outcome::Success),
            WorkResult::Step { status: StepStatus::Error, .. } => Some(Outcome::Failed),
            _ => None,
        }
    }

    pub fn record(&mut self, id: &str, result: WorkResult) {
        if self.results.insert(id.to_string(), result).is_none() {
            self.trace.push(id.to_string());
        }
    }

    pub fn get(&self, id: &str) -> Option<&WorkResult> {
        self.results.get(id)
    }

    pub fn into_report(self) -> ExecutionReport {
        ExecutionReport {
            run_id: self.run_id,
            results: self.results,
            trace: self.trace,
        }
    }
}

impl OutputSource for RunContext {
    fn output_of(&self, work_uid: &str) -> Option<Value> {
        self.results.get(work_uid).map(WorkResult::output_view)
    }
}

/// Everything a run produced. Partial when something failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub run_id: Uuid,
    pub results: HashMap<String, WorkResult>,
    /// Ids in the order their results were first recorded.
    pub trace: Vec<String>,
}

impl ExecutionReport {
    pub fn get(&self, id: &str) -> Option<&WorkResult> {
        self.results.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.results.contains_key(id)
    }

    /// Output of an executed step.
    pub fn step_output(&self, id: &str) -> Option<&Value> {
        match self.results.get(id)? {
            WorkResult::Step { output, .. } => Some(output),
            _ => None,
        }
    }
}

use serde::{Serialize, Serializer};
use serde_json::{Value, json};

use crate::dsl::{Operand, Operator, StepId, WorkKind, WorkRef};
use crate::error::WorkError;

/// Accessor for a field of a step or operation output, e.g.
/// `send.output("hash")` or `seq.success()`.
///
/// Used as a condition operand it makes a step a dependency of the
/// condition. Embedded in another step's input it serializes as an
/// `internal` reference and is substituted at execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRef {
    pub kind: WorkKind,
    pub uid: String,
    /// Dot path into the record, e.g. `output.result`.
    pub key: String,
}

impl OutputRef {
    /// Field of a step output.
    pub fn new(step: &str, key: &str) -> Self {
        Self { kind: WorkKind::Step, uid: step.to_string(), key: key.to_string() }
    }

    /// Field of an operation output (`output.success`).
    pub fn operation(uid: &str, key: &str) -> Self {
        Self { kind: WorkKind::Operation, uid: uid.to_string(), key: key.to_string() }
    }

    pub fn to_value(&self) -> Value {
        json!({ "type": "internal", "workUID": self.uid, "key": self.key })
    }

    /// Recognizes the `{type: "internal", workUID, key}` shape embedded in a
    /// step input. Inputs only ever reference steps.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        if map.len() != 3 || map.get("type")?.as_str()? != "internal" {
            return None;
        }
        Some(Self::new(map.get("workUID")?.as_str()?, map.get("key")?.as_str()?))
    }
}

impl Serialize for OutputRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl From<OutputRef> for Value {
    fn from(output: OutputRef) -> Self {
        output.to_value()
    }
}

/// Builder-time operand before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Condition(Condition),
    Work(OutputRef),
    Static(Value),
}

impl From<Condition> for Term {
    fn from(condition: Condition) -> Self {
        Term::Condition(condition)
    }
}

impl From<OutputRef> for Term {
    fn from(output: OutputRef) -> Self {
        Term::Work(output)
    }
}

impl From<&OutputRef> for Term {
    fn from(output: &OutputRef) -> Self {
        Term::Work(output.clone())
    }
}

macro_rules! static_term {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Term {
            fn from(value: $ty) -> Self {
                Term::Static(Value::from(value))
            }
        })*
    };
}

static_term!(Value, &str, String, bool, i32, i64, u32, u64, f64, Vec<Value>);

/// Classifies a term, registering step dependencies into `work`.
///
/// Nested conditions are kept structurally and their dependencies merged;
/// output accessors become `internal` operands; anything else is a literal.
fn resolve_term(term: Term, work: &mut Vec<StepId>) -> Operand {
    match term {
        Term::Condition(nested) => {
            for step in &nested.work {
                push_unique(work, step);
            }
            Operand::Condition(Box::new(nested))
        }
        Term::Work(output) => {
            if output.kind == WorkKind::Step {
                push_unique(work, &output.uid);
            }
            Operand::Internal { work_uid: output.uid, key: output.key }
        }
        Term::Static(value) => Operand::Static { value },
    }
}

fn push_unique(work: &mut Vec<StepId>, step: &str) {
    if !work.iter().any(|s| s == step) {
        work.push(step.to_string());
    }
}

fn collect_work(operand: &Operand, is_step: &dyn Fn(&str) -> bool, work: &mut Vec<StepId>) {
    match operand {
        Operand::Static { .. } => {}
        Operand::Internal { work_uid, .. } => {
            if is_step(work_uid) {
                push_unique(work, work_uid);
            }
        }
        Operand::Condition(nested) => {
            for step in &nested.work {
                push_unique(work, step);
            }
        }
    }
}

/// Predicate over two resolved operands, with the action to run when it
/// holds and the steps it depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub id: String,
    pub operator: Operator,
    pub value_a: Operand,
    pub value_b: Option<Operand>,
    pub action: Option<WorkRef>,
    /// Steps that must have run before evaluation, in insertion order.
    pub work: Vec<StepId>,
}

impl Condition {
    /// Builds a condition from builder-time terms. `not` takes no `value_b`;
    /// every other operator requires one.
    pub fn new(id: String, operator: Operator, value_a: Term, value_b: Option<Term>) -> Result<Self, WorkError> {
        operator.check_arity(value_b.is_some())?;

        let mut work = Vec::new();
        let value_a = resolve_term(value_a, &mut work);
        let value_b = value_b.map(|term| resolve_term(term, &mut work));

        Ok(Self { id, operator, value_a, value_b, action: None, work })
    }

    /// Rebuilds a condition from stored operands, recomputing its
    /// dependency set in the same order the builder would have.
    pub fn from_parts(
        id: String,
        operator: Operator,
        value_a: Operand,
        value_b: Option<Operand>,
        action: Option<WorkRef>,
        is_step: &dyn Fn(&str) -> bool,
    ) -> Result<Self, WorkError> {
        operator.check_arity(value_b.is_some())?;

        let mut work = Vec::new();
        collect_work(&value_a, is_step, &mut work);
        if let Some(b) = &value_b {
            collect_work(b, is_step, &mut work);
        }

        Ok(Self { id, operator, value_a, value_b, action, work })
    }

    pub fn with_action(mut self, action: impl Into<WorkRef>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.value_a).chain(self.value_b.as_ref())
    }
}

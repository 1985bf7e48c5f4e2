use std::collections::BTreeMap;

use serde_json::Value;

use crate::dsl::uid::{UidGenerator, UuidGenerator};
use crate::dsl::{
    BaseOperation, Condition, ConditionalOperation, Operation, Operator, OutputRef, Script, Step, StepId, StepInput,
    Term, Web2Request, WorkRef,
};
use crate::error::WorkError;

/// Handle to a step registered in a [`DemosWork`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRef {
    id: StepId,
}

impl StepRef {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Accessor for `output.<field>` of this step.
    pub fn output(&self, field: &str) -> OutputRef {
        OutputRef::new(&self.id, &format!("output.{field}"))
    }

    pub fn result(&self) -> OutputRef {
        self.output("result")
    }

    pub fn hash(&self) -> OutputRef {
        self.output("hash")
    }

    pub fn status_code(&self) -> OutputRef {
        self.output("statusCode")
    }

    pub fn payload(&self) -> OutputRef {
        self.output("payload")
    }
}

/// Handle to an operation registered in a [`DemosWork`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRef {
    id: String,
}

impl OperationRef {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the operation completed, as `output.success`.
    pub fn success(&self) -> OutputRef {
        OutputRef::operation(&self.id, "output.success")
    }
}

impl From<&StepRef> for WorkRef {
    fn from(step: &StepRef) -> Self {
        WorkRef::step(&step.id)
    }
}

impl From<StepRef> for WorkRef {
    fn from(step: StepRef) -> Self {
        WorkRef::step(&step.id)
    }
}

impl From<&OperationRef> for WorkRef {
    fn from(op: &OperationRef) -> Self {
        WorkRef::operation(&op.id)
    }
}

impl From<OperationRef> for WorkRef {
    fn from(op: OperationRef) -> Self {
        WorkRef::operation(&op.id)
    }
}

/// Builds a [`Script`]: steps first, then conditions and operations wired
/// to them, then the root execution order.
pub struct DemosWork {
    uids: Box<dyn UidGenerator>,
    script: Script,
    duplicate: Option<String>,
}

impl Default for DemosWork {
    fn default() -> Self {
        Self::new()
    }
}

impl DemosWork {
    pub fn new() -> Self {
        Self::with_generator(UuidGenerator)
    }

    pub fn with_generator(uids: impl UidGenerator + 'static) -> Self {
        Self {
            uids: Box::new(uids),
            script: Script::default(),
            duplicate: None,
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        format!("{prefix}_{}", self.uids.next_uid())
    }

    fn note_duplicate(&mut self, id: &str) {
        if self.duplicate.is_none() {
            self.duplicate = Some(id.to_string());
        }
    }

    pub fn step(&mut self, input: StepInput) -> StepRef {
        let id = self.next_id("step");
        if self.script.kind_of(&id).is_some() {
            self.note_duplicate(&id);
        }
        self.script.steps.insert(
            id.clone(),
            Step {
                id: id.clone(),
                input,
                description: None,
            },
        );
        StepRef { id }
    }

    pub fn xm_step(&mut self, payload: Value) -> StepRef {
        self.step(StepInput::Xm(payload))
    }

    pub fn web2_step(&mut self, request: Web2Request) -> StepRef {
        self.step(StepInput::Web2(request))
    }

    pub fn native_step(&mut self, payload: Value) -> StepRef {
        self.step(StepInput::Native(payload))
    }

    pub fn describe(&mut self, step: &StepRef, description: &str) {
        if let Some(s) = self.script.steps.get_mut(&step.id) {
            s.description = Some(description.to_string());
        }
    }

    /// Condition without an action. Unknown operators and wrong arity fail here.
    pub fn condition_with(&mut self, operator: &str, value_a: Term, value_b: Option<Term>) -> Result<Condition, WorkError> {
        let operator: Operator = operator.parse()?;
        let id = self.next_id("cond");
        Condition::new(id, operator, value_a, value_b)
    }

    /// Binary condition.
    pub fn condition(
        &mut self,
        operator: &str,
        value_a: impl Into<Term>,
        value_b: impl Into<Term>,
    ) -> Result<Condition, WorkError> {
        self.condition_with(operator, value_a.into(), Some(value_b.into()))
    }

    /// Unary negation.
    pub fn not(&mut self, value_a: impl Into<Term>) -> Result<Condition, WorkError> {
        self.condition_with("not", value_a.into(), None)
    }

    pub fn base(&mut self) -> BaseBuilder<'_> {
        let id = self.next_id("op");
        BaseBuilder {
            work: self,
            id,
            order: Vec::new(),
        }
    }

    pub fn conditional(&mut self) -> ConditionalBuilder<'_> {
        let id = self.next_id("op");
        ConditionalBuilder {
            work: self,
            id,
            conditions: BTreeMap::new(),
            order: Vec::new(),
            default: None,
        }
    }

    /// Conditional operation from fully formed conditions (each with an action).
    pub fn conditional_from(&mut self, conditions: Vec<Condition>) -> Result<OperationRef, WorkError> {
        let mut builder = self.conditional();
        for condition in conditions {
            builder = builder.when(condition)?;
        }
        Ok(builder.build())
    }

    /// Appends to the root execution order.
    pub fn push(&mut self, work: impl Into<WorkRef>) {
        self.script.root_order.push(work.into());
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    fn insert_operation(&mut self, operation: Operation) {
        let id = operation.id().to_string();
        if self.script.kind_of(&id).is_some() {
            self.note_duplicate(&id);
        }
        self.script.operations.insert(id, operation);
    }

    /// Validates and returns the finished script.
    pub fn build(self) -> Result<Script, WorkError> {
        if let Some(id) = self.duplicate {
            return Err(WorkError::DuplicateId(id));
        }
        self.script.validate()?;
        Ok(self.script)
    }
}

pub struct BaseBuilder<'a> {
    work: &'a mut DemosWork,
    id: String,
    order: Vec<WorkRef>,
}

impl BaseBuilder<'_> {
    pub fn add(mut self, item: impl Into<WorkRef>) -> Self {
        self.order.push(item.into());
        self
    }

    pub fn build(self) -> OperationRef {
        let id = self.id;
        self.work.insert_operation(Operation::Base(BaseOperation {
            id: id.clone(),
            order: self.order,
        }));
        OperationRef { id }
    }
}

pub struct ConditionalBuilder<'a> {
    work: &'a mut DemosWork,
    id: String,
    conditions: BTreeMap<String, Condition>,
    order: Vec<String>,
    default: Option<WorkRef>,
}

impl<'a> ConditionalBuilder<'a> {
    /// Opens a branch: `if value_a <operator> value_b`.
    pub fn if_(
        self,
        value_a: impl Into<Term>,
        operator: &str,
        value_b: impl Into<Term>,
    ) -> Result<Branch<'a>, WorkError> {
        let condition = self.work.condition(operator, value_a, value_b)?;
        Ok(self.if_cond(condition))
    }

    pub fn elif(
        self,
        value_a: impl Into<Term>,
        operator: &str,
        value_b: impl Into<Term>,
    ) -> Result<Branch<'a>, WorkError> {
        self.if_(value_a, operator, value_b)
    }

    /// Opens a branch guarded by a prebuilt condition (unary or nested).
    pub fn if_cond(self, condition: Condition) -> Branch<'a> {
        Branch { builder: self, condition }
    }

    pub fn elif_cond(self, condition: Condition) -> Branch<'a> {
        self.if_cond(condition)
    }

    /// Appends a condition that already carries its action.
    pub fn when(mut self, condition: Condition) -> Result<Self, WorkError> {
        if condition.action.is_none() {
            return Err(WorkError::IncompleteCondition(condition.id));
        }
        self.order.push(condition.id.clone());
        self.conditions.insert(condition.id.clone(), condition);
        Ok(self)
    }

    /// Default action when no condition matches.
    pub fn else_(mut self, action: impl Into<WorkRef>) -> Self {
        self.default = Some(action.into());
        self
    }

    pub fn build(self) -> OperationRef {
        let id = self.id;
        self.work.insert_operation(Operation::Conditional(ConditionalOperation {
            id: id.clone(),
            conditions: self.conditions,
            order: self.order,
            default: self.default,
        }));
        OperationRef { id }
    }
}

/// A branch waiting for its action.
pub struct Branch<'a> {
    builder: ConditionalBuilder<'a>,
    condition: Condition,
}

impl<'a> Branch<'a> {
    pub fn then(self, action: impl Into<WorkRef>) -> ConditionalBuilder<'a> {
        let mut builder = self.builder;
        let condition = self.condition.with_action(action);
        builder.order.push(condition.id.clone());
        builder.conditions.insert(condition.id.clone(), condition);
        builder
    }
}

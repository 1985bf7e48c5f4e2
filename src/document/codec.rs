use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::document::{ConditionDocument, OperandDocument, OperationDocument, ScriptDocument, StepDocument};
use crate::dsl::{
    BaseOperation, Condition, ConditionalOperation, Operand, Operation, Operator, Script, Step, StepInput, WorkKind,
    WorkRef,
};
use crate::error::WorkError;

impl Script {
    /// Flattens the live graph into its portable document.
    pub fn to_document(&self) -> Result<ScriptDocument, WorkError> {
        let mut steps = BTreeMap::new();
        for (id, step) in &self.steps {
            steps.insert(
                id.clone(),
                StepDocument {
                    id: step.id.clone(),
                    kind: step.kind(),
                    input: step.input.to_value()?,
                    description: step.description.clone(),
                },
            );
        }

        let operations = self
            .operations
            .iter()
            .map(|(id, op)| (id.clone(), encode_operation(op)))
            .collect();

        Ok(ScriptDocument {
            steps,
            operations,
            root_order: self.root_order.iter().map(|w| w.uid.clone()).collect(),
        })
    }

    pub fn to_json(&self) -> Result<String, WorkError> {
        Ok(serde_json::to_string_pretty(&self.to_document()?)?)
    }

    /// Rebuilds a live script from a document and validates it.
    pub fn from_document(document: ScriptDocument) -> Result<Script, WorkError> {
        Decoder::new().decode(document)
    }

    pub fn from_json(json: &str) -> Result<Script, WorkError> {
        Self::from_document(serde_json::from_str(json)?)
    }
}

fn encode_operation(operation: &Operation) -> OperationDocument {
    match operation {
        Operation::Base(op) => OperationDocument::Base {
            id: op.id.clone(),
            order: op.order.iter().map(|w| w.uid.clone()).collect(),
        },
        Operation::Conditional(op) => OperationDocument::Conditional {
            id: op.id.clone(),
            order: op.order.clone(),
            conditions: op
                .conditions
                .iter()
                .map(|(id, c)| (id.clone(), encode_condition(c)))
                .collect(),
            default: op.default.clone(),
        },
    }
}

fn encode_condition(condition: &Condition) -> ConditionDocument {
    ConditionDocument {
        step_uid: condition.id.clone(),
        operator: condition.operator.to_string(),
        value_a: encode_operand(&condition.value_a),
        value_b: condition.value_b.as_ref().map(encode_operand),
        action: condition.action.clone(),
    }
}

fn encode_operand(operand: &Operand) -> OperandDocument {
    match operand {
        Operand::Static { value } => OperandDocument::Static { value: value.clone() },
        Operand::Internal { work_uid, key } => OperandDocument::Internal {
            work_uid: work_uid.clone(),
            key: key.clone(),
        },
        Operand::Condition(nested) => OperandDocument::Condition {
            condition: Box::new(encode_condition(nested)),
        },
    }
}

/// Two-pass reconstruction: index every id first so forward references
/// resolve, then populate operations against that index.
struct Decoder {
    shells: HashMap<String, WorkKind>,
    /// Condition ids seen so far. They share the results map with steps
    /// and operations, so they must be unique across all three.
    conditions: HashSet<String>,
}

impl Decoder {
    fn new() -> Self {
        Self {
            shells: HashMap::new(),
            conditions: HashSet::new(),
        }
    }

    fn decode(mut self, document: ScriptDocument) -> Result<Script, WorkError> {
        // Pass 1: shells
        for (key, step) in &document.steps {
            self.index(key, &step.id, WorkKind::Step)?;
        }
        for (key, op) in &document.operations {
            let id = match op {
                OperationDocument::Base { id, .. } | OperationDocument::Conditional { id, .. } => id,
            };
            self.index(key, id, WorkKind::Operation)?;
        }

        // Pass 2: populate
        let mut steps = BTreeMap::new();
        for (key, step) in document.steps {
            let input = StepInput::from_value(step.kind, step.input).map_err(|e| WorkError::InvalidStep {
                id: key.clone(),
                reason: e.to_string(),
            })?;
            steps.insert(
                key,
                Step {
                    id: step.id,
                    input,
                    description: step.description,
                },
            );
        }

        let mut operations = BTreeMap::new();
        for (key, op) in document.operations {
            operations.insert(key, self.transform_operation(op)?);
        }

        let root_order = document
            .root_order
            .iter()
            .map(|id| self.resolve(id, "rootOrder"))
            .collect::<Result<Vec<_>, _>>()?;

        let script = Script {
            steps,
            operations,
            root_order,
        };
        script.validate()?;
        debug!(
            steps = script.steps.len(),
            operations = script.operations.len(),
            "Script document decoded"
        );
        Ok(script)
    }

    fn index(&mut self, key: &str, id: &str, kind: WorkKind) -> Result<(), WorkError> {
        if key != id {
            return Err(WorkError::IdMismatch {
                key: key.to_string(),
                id: id.to_string(),
            });
        }
        if self.shells.insert(id.to_string(), kind).is_some() {
            return Err(WorkError::DuplicateId(id.to_string()));
        }
        Ok(())
    }

    fn resolve(&self, id: &str, referenced_by: &str) -> Result<WorkRef, WorkError> {
        let kind = self.shells.get(id).ok_or_else(|| WorkError::DanglingReference {
            id: id.to_string(),
            referenced_by: referenced_by.to_string(),
        })?;
        Ok(WorkRef {
            kind: *kind,
            uid: id.to_string(),
        })
    }

    /// Resolves a typed reference and checks the declared type matches.
    fn resolve_typed(&self, work: &WorkRef, referenced_by: &str) -> Result<WorkRef, WorkError> {
        let resolved = self.resolve(&work.uid, referenced_by)?;
        if resolved.kind != work.kind {
            return Err(WorkError::KindMismatch {
                id: work.uid.clone(),
                expected: work.kind.to_string(),
            });
        }
        Ok(resolved)
    }

    fn transform_operation(&mut self, op: OperationDocument) -> Result<Operation, WorkError> {
        match op {
            OperationDocument::Base { id, order } => {
                let order = order
                    .iter()
                    .map(|item| self.resolve(item, &id))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Operation::Base(BaseOperation { id, order }))
            }
            OperationDocument::Conditional {
                id,
                order,
                conditions,
                default,
            } => {
                let mut decoded = BTreeMap::new();
                for (key, doc) in conditions {
                    if key != doc.step_uid {
                        return Err(WorkError::IdMismatch { key, id: doc.step_uid });
                    }
                    decoded.insert(key, self.transform_condition(doc, &id)?);
                }
                for cid in &order {
                    if !decoded.contains_key(cid) {
                        return Err(WorkError::DanglingReference {
                            id: cid.clone(),
                            referenced_by: id.clone(),
                        });
                    }
                }
                let default = default.map(|d| self.resolve_typed(&d, &id)).transpose()?;
                Ok(Operation::Conditional(ConditionalOperation {
                    id,
                    conditions: decoded,
                    order,
                    default,
                }))
            }
        }
    }

    fn transform_condition(&mut self, doc: ConditionDocument, referenced_by: &str) -> Result<Condition, WorkError> {
        if self.shells.contains_key(&doc.step_uid) || !self.conditions.insert(doc.step_uid.clone()) {
            return Err(WorkError::DuplicateId(doc.step_uid));
        }
        let operator: Operator = doc.operator.parse()?;
        let value_a = self.transform_operand(doc.value_a, &doc.step_uid)?;
        let value_b = doc
            .value_b
            .map(|b| self.transform_operand(b, &doc.step_uid))
            .transpose()?;
        let action = doc
            .action
            .map(|a| self.resolve_typed(&a, referenced_by))
            .transpose()?;

        let is_step = |id: &str| self.shells.get(id) == Some(&WorkKind::Step);
        Condition::from_parts(doc.step_uid, operator, value_a, value_b, action, &is_step)
    }

    fn transform_operand(&mut self, doc: OperandDocument, referenced_by: &str) -> Result<Operand, WorkError> {
        Ok(match doc {
            OperandDocument::Static { value } => Operand::Static { value },
            OperandDocument::Internal { work_uid, key } => {
                self.resolve(&work_uid, referenced_by)?;
                Operand::Internal { work_uid, key }
            }
            OperandDocument::Condition { condition } => {
                Operand::Condition(Box::new(self.transform_condition(*condition, referenced_by)?))
            }
        })
    }
}

use std::collections::{HashMap, HashSet};

use crate::dsl::{Condition, Operand, Operation, Script, WorkRef};
use crate::error::WorkError;

/// Sanity checks run before a script is accepted or executed.
pub fn validate(script: &Script) -> Result<(), WorkError> {
    check_references(script)?;
    no_unused_steps(script)?;
    no_cycles(script)
}

fn expect(script: &Script, work: &WorkRef, referenced_by: &str) -> Result<(), WorkError> {
    match script.kind_of(&work.uid) {
        None => Err(WorkError::DanglingReference {
            id: work.uid.clone(),
            referenced_by: referenced_by.to_string(),
        }),
        Some(kind) if kind != work.kind => Err(WorkError::KindMismatch {
            id: work.uid.clone(),
            expected: work.kind.to_string(),
        }),
        Some(_) => Ok(()),
    }
}

fn expect_step(script: &Script, id: &str, referenced_by: &str) -> Result<(), WorkError> {
    expect(script, &WorkRef::step(id), referenced_by)
}

fn check_references(script: &Script) -> Result<(), WorkError> {
    for item in &script.root_order {
        expect(script, item, "rootOrder")?;
    }

    for step in script.steps.values() {
        for dep in step.input.references() {
            expect_step(script, &dep, &step.id)?;
        }
    }

    for operation in script.operations.values() {
        match operation {
            Operation::Base(op) => {
                for item in &op.order {
                    expect(script, item, &op.id)?;
                }
            }
            Operation::Conditional(op) => {
                for condition in op.ordered() {
                    let condition = condition?;
                    if condition.action.is_none() {
                        return Err(WorkError::IncompleteCondition(condition.id.clone()));
                    }
                    check_condition(script, condition, &op.id)?;
                }
                if let Some(default) = &op.default {
                    expect(script, default, &op.id)?;
                }
            }
        }
    }
    Ok(())
}

fn check_condition(script: &Script, condition: &Condition, referenced_by: &str) -> Result<(), WorkError> {
    condition.operator.check_arity(condition.value_b.is_some())?;

    if let Some(action) = &condition.action {
        expect(script, action, referenced_by)?;
    }
    for step in &condition.work {
        expect_step(script, step, &condition.id)?;
    }
    for operand in condition.operands() {
        match operand {
            Operand::Static { .. } => {}
            Operand::Internal { work_uid, .. } => {
                if script.kind_of(work_uid).is_none() {
                    return Err(WorkError::DanglingReference {
                        id: work_uid.clone(),
                        referenced_by: condition.id.clone(),
                    });
                }
            }
            Operand::Condition(nested) => check_condition(script, nested, referenced_by)?,
        }
    }
    Ok(())
}

fn mark_condition<'a>(condition: &'a Condition, used: &mut HashSet<&'a str>) {
    if let Some(action) = &condition.action {
        used.insert(&action.uid);
    }
    for step in &condition.work {
        used.insert(step);
    }
    for operand in condition.operands() {
        match operand {
            Operand::Internal { work_uid, .. } => {
                used.insert(work_uid);
            }
            Operand::Condition(nested) => mark_condition(nested, used),
            Operand::Static { .. } => {}
        }
    }
}

/// Every step must be reachable from some order, action, operand or
/// input reference.
fn no_unused_steps(script: &Script) -> Result<(), WorkError> {
    let mut used: HashSet<&str> = HashSet::new();
    let mut referenced_by_inputs = Vec::new();

    for item in &script.root_order {
        used.insert(&item.uid);
    }
    for step in script.steps.values() {
        referenced_by_inputs.extend(step.input.references());
    }
    for operation in script.operations.values() {
        match operation {
            Operation::Base(op) => {
                for item in &op.order {
                    used.insert(&item.uid);
                }
            }
            Operation::Conditional(op) => {
                // Only conditions in the evaluation order can ever run.
                for condition in op.ordered().flatten() {
                    mark_condition(condition, &mut used);
                }
                if let Some(default) = &op.default {
                    used.insert(&default.uid);
                }
            }
        }
    }

    for step in script.steps.values() {
        if !used.contains(step.id.as_str()) && !referenced_by_inputs.contains(&step.id) {
            return Err(WorkError::UnusedStep(step.label().to_string()));
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

/// Edges of the execution graph: what must run (or may run) when a node runs.
fn edges(script: &Script, id: &str) -> Vec<String> {
    if let Some(step) = script.step(id) {
        return step.input.references();
    }
    match script.operation(id) {
        Some(Operation::Base(op)) => op.order.iter().map(|w| w.uid.clone()).collect(),
        Some(Operation::Conditional(op)) => {
            let mut out = Vec::new();
            for condition in op.conditions.values() {
                out.extend(condition.work.iter().cloned());
                if let Some(action) = &condition.action {
                    out.push(action.uid.clone());
                }
            }
            if let Some(default) = &op.default {
                out.push(default.uid.clone());
            }
            out
        }
        None => Vec::new(),
    }
}

fn no_cycles(script: &Script) -> Result<(), WorkError> {
    let mut marks: HashMap<String, Mark> = HashMap::new();
    let nodes = script
        .steps
        .keys()
        .chain(script.operations.keys())
        .cloned()
        .collect::<Vec<_>>();

    for node in nodes {
        visit(script, &node, &mut marks)?;
    }
    Ok(())
}

fn visit(script: &Script, id: &str, marks: &mut HashMap<String, Mark>) -> Result<(), WorkError> {
    match marks.get(id) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => return Err(WorkError::CircularReference(id.to_string())),
        None => {}
    }
    marks.insert(id.to_string(), Mark::Visiting);
    for next in edges(script, id) {
        visit(script, &next, marks)?;
    }
    marks.insert(id.to_string(), Mark::Done);
    Ok(())
}

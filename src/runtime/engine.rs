use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::actions::StepHandler;
use crate::dsl::{
    BaseOperation, ConditionalOperation, Operation, OutputRef, Script, Step, StepInput, StepKind, WorkKind, WorkRef,
};
use crate::error::WorkError;
use crate::runtime::context::{ExecutionReport, Outcome, RunContext, StepStatus, WorkResult};
use crate::runtime::evaluator::{EvalMode, OutputSource, evaluate};

type WorkFuture<'a> = Pin<Box<dyn Future<Output = Result<Outcome, WorkError>> + Send + 'a>>;

/// Walks a script's root order, evaluating conditions and running actions.
///
/// Execution is sequential: every step is awaited before the next item
/// starts. Each step runs at most once per pass.
pub struct Executor {
    handlers: HashMap<StepKind, Arc<dyn StepHandler>>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers the handler for its step kind, replacing any previous one.
    pub fn register_handler(&mut self, handler: Arc<dyn StepHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    fn handler(&self, step: &Step) -> Result<&Arc<dyn StepHandler>, WorkError> {
        self.handlers.get(&step.kind()).ok_or_else(|| WorkError::MissingHandler {
            step: step.id.clone(),
            kind: step.kind(),
        })
    }

    /// Dry validation: structure, handlers, step inputs, and every
    /// condition in validate-only mode. Nothing is executed.
    pub fn check(&self, script: &Script) -> Result<(), WorkError> {
        script.validate()?;

        for step in script.steps().values() {
            self.handler(step)?.validate(step).map_err(|e| WorkError::InvalidStep {
                id: step.id.clone(),
                reason: e.to_string(),
            })?;
        }

        let nothing: HashMap<String, Value> = HashMap::new();
        for operation in script.operations().values() {
            if let Operation::Conditional(op) = operation {
                for condition in op.ordered() {
                    evaluate(condition?, &nothing, EvalMode::ValidateOnly)?;
                }
            }
        }
        Ok(())
    }

    /// Runs the script. Only structural problems are errors; step failures
    /// are recorded in the report.
    pub async fn execute(&self, script: &Script) -> Result<ExecutionReport, WorkError> {
        self.check(script)?;

        let mut ctx = RunContext::new();
        info!(run_id = %ctx.run_id, items = script.root_order().len(), "Executing script");

        for item in script.root_order() {
            if !self.run_work(script, &mut ctx, item).await?.is_ok() {
                warn!(run_id = %ctx.run_id, work = %item.uid, "Root item failed, continuing with the next one");
            }
        }

        let report = ctx.into_report();
        info!(run_id = %report.run_id, results = report.results.len(), "Script finished");
        Ok(report)
    }

    fn run_work<'a>(&'a self, script: &'a Script, ctx: &'a mut RunContext, work: &'a WorkRef) -> WorkFuture<'a> {
        Box::pin(async move {
            match work.kind {
                WorkKind::Step => self.run_step(script, ctx, &work.uid).await,
                WorkKind::Operation => {
                    let operation = script
                        .operation(&work.uid)
                        .ok_or_else(|| WorkError::DanglingReference {
                            id: work.uid.clone(),
                            referenced_by: "executor".to_string(),
                        })?;
                    match operation {
                        Operation::Base(op) => self.run_base(script, ctx, op).await,
                        Operation::Conditional(op) => self.run_conditional(script, ctx, op).await,
                    }
                }
            }
        })
    }

    fn run_step<'a>(&'a self, script: &'a Script, ctx: &'a mut RunContext, id: &'a str) -> WorkFuture<'a> {
        Box::pin(async move {
            if let Some(outcome) = ctx.step_outcome(id) {
                return Ok(outcome);
            }

            let step = script.step(id).ok_or_else(|| WorkError::DanglingReference {
                id: id.to_string(),
                referenced_by: "executor".to_string(),
            })?;

            // Steps whose outputs feed this input run first.
            for dep in step.input.references() {
                self.run_step(script, ctx, &dep).await?;
            }

            let resolved = Step {
                id: step.id.clone(),
                input: substitute(&step.input, &*ctx),
                description: step.description.clone(),
            };
            let handler = self.handler(step)?;

            debug!(run_id = %ctx.run_id, step = %id, kind = %step.kind(), "Executing step");
            let (outcome, result) = match handler.execute(&resolved).await {
                Ok(output) => (
                    Outcome::Success,
                    WorkResult::Step {
                        status: StepStatus::Success,
                        output,
                    },
                ),
                Err(e) => {
                    warn!(run_id = %ctx.run_id, step = %id, error = %e, "Step failed");
                    (
                        Outcome::Failed,
                        WorkResult::Step {
                            status: StepStatus::Error,
                            output: json!({ "result": "error", "error": e.to_string() }),
                        },
                    )
                }
            };
            ctx.record(id, result);
            Ok(outcome)
        })
    }

    /// A failed item stops this sequence only. The parent sees `Aborted`
    /// and carries on with its own items.
    fn run_base<'a>(&'a self, script: &'a Script, ctx: &'a mut RunContext, op: &'a BaseOperation) -> WorkFuture<'a> {
        Box::pin(async move {
            for item in &op.order {
                if self.run_work(script, ctx, item).await? == Outcome::Failed {
                    warn!(run_id = %ctx.run_id, operation = %op.id, failed = %item.uid, "Aborting base operation");
                    ctx.record(&op.id, WorkResult::Operation { success: false });
                    return Ok(Outcome::Aborted);
                }
            }
            ctx.record(&op.id, WorkResult::Operation { success: true });
            Ok(Outcome::Success)
        })
    }

    fn run_conditional<'a>(
        &'a self,
        script: &'a Script,
        ctx: &'a mut RunContext,
        op: &'a ConditionalOperation,
    ) -> WorkFuture<'a> {
        Box::pin(async move {
            for condition in op.ordered() {
                let condition = condition?;

                // Dependencies first. Their failures are data the condition can branch on.
                for step in &condition.work {
                    self.run_step(script, ctx, step).await?;
                }

                let matched = evaluate(condition, &*ctx, EvalMode::Evaluate)?;
                debug!(run_id = %ctx.run_id, condition = %condition.id, matched, "Condition evaluated");
                if !matched {
                    continue;
                }

                let action = condition
                    .action
                    .as_ref()
                    .ok_or_else(|| WorkError::IncompleteCondition(condition.id.clone()))?;
                let outcome = self.run_work(script, ctx, action).await?;
                ctx.record(
                    &condition.id,
                    WorkResult::Condition {
                        action: action.clone(),
                        success: outcome.is_ok(),
                    },
                );
                return Ok(finish(ctx, &op.id, outcome));
            }

            if let Some(default) = &op.default {
                debug!(run_id = %ctx.run_id, operation = %op.id, "No condition matched, running default");
                let outcome = self.run_work(script, ctx, default).await?;
                return Ok(finish(ctx, &op.id, outcome));
            }

            debug!(run_id = %ctx.run_id, operation = %op.id, "No condition matched");
            Ok(Outcome::Skipped)
        })
    }
}

/// Records a conditional's result. A failed step action still has to reach
/// the innermost base; an aborted base action does not.
fn finish(ctx: &mut RunContext, op_id: &str, action: Outcome) -> Outcome {
    ctx.record(op_id, WorkResult::Operation { success: action.is_ok() });
    match action {
        Outcome::Skipped => Outcome::Success,
        other => other,
    }
}

/// Replaces embedded output references with the referenced values.
/// Unresolvable references become `null`.
fn substitute(input: &StepInput, source: &dyn OutputSource) -> StepInput {
    match input {
        StepInput::Xm(payload) => StepInput::Xm(substitute_value(payload, source)),
        StepInput::Native(payload) => StepInput::Native(substitute_value(payload, source)),
        StepInput::Web2(request) => {
            let mut request = request.clone();
            request.data = request.data.map(|data| substitute_value(&data, source));
            StepInput::Web2(request)
        }
    }
}

fn substitute_value(value: &Value, source: &dyn OutputSource) -> Value {
    if let Some(output) = OutputRef::from_value(value) {
        return source.lookup(&output.uid, &output.key).unwrap_or(Value::Null);
    }
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_value(v, source)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, source)))
                .collect(),
        ),
        other => other.clone(),
    }
}

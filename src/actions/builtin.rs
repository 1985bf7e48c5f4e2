use std::collections::HashMap;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::actions::StepHandler;
use crate::dsl::{Step, StepKind};

/// Replays canned outputs keyed by step id. Used for dry runs.
#[derive(Debug, Clone)]
pub struct FixtureHandler {
    kind: StepKind,
    outputs: HashMap<String, Value>,
}

impl FixtureHandler {
    pub fn new(kind: StepKind, outputs: HashMap<String, Value>) -> Self {
        Self { kind, outputs }
    }
}

#[async_trait]
impl StepHandler for FixtureHandler {
    fn kind(&self) -> StepKind {
        self.kind
    }

    async fn execute(&self, step: &Step) -> Result<Value> {
        info!(step = %step.id, kind = %self.kind, "[FIXTURE] {}", step.label());
        self.outputs
            .get(&step.id)
            .cloned()
            .ok_or_else(|| anyhow!("No fixture output for step {}", step.id))
    }
}

use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::actions::StepHandler;
use crate::dsl::{Step, StepInput, StepKind};

/// Chain SDK boundary: signs and broadcasts a prepared payload, returning
/// the transaction hash.
#[async_trait]
pub trait ChainClient: Send + Sync + std::fmt::Debug {
    async fn submit(&self, payload: &Value) -> Result<String>;
}

/// Executes xm or native steps through a [`ChainClient`].
/// Output: `{ result: "success", hash }`.
#[derive(Debug, Clone)]
pub struct ChainHandler {
    kind: StepKind,
    client: Arc<dyn ChainClient>,
}

impl ChainHandler {
    pub fn xm(client: Arc<dyn ChainClient>) -> Self {
        Self { kind: StepKind::Xm, client }
    }

    pub fn native(client: Arc<dyn ChainClient>) -> Self {
        Self { kind: StepKind::Native, client }
    }
}

#[async_trait]
impl StepHandler for ChainHandler {
    fn kind(&self) -> StepKind {
        self.kind
    }

    async fn execute(&self, step: &Step) -> Result<Value> {
        let payload = match &step.input {
            StepInput::Xm(payload) | StepInput::Native(payload) => payload,
            StepInput::Web2(_) => return Err(anyhow!("Chain handler cannot execute web2 step {}", step.id)),
        };

        let hash = self.client.submit(payload).await?;
        debug!(step = %step.id, hash = %hash, "Payload broadcast");

        Ok(json!({
            "result": "success",
            "hash": hash
        }))
    }
}

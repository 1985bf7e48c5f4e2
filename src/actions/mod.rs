use std::fmt::Debug;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::dsl::{Step, StepKind};

pub mod builtin;
pub mod chain;
pub mod http;

/// Performs the external side effect of a step: a chain broadcast, an HTTP
/// call. The engine stores whatever comes back verbatim as the step output;
/// an `Err` becomes an error outcome, never a failed run.
#[async_trait]
pub trait StepHandler: Send + Sync + Debug {
    /// Which steps this handler executes.
    fn kind(&self) -> StepKind;

    /// Build-time check of a step's input.
    fn validate(&self, _step: &Step) -> Result<()> {
        Ok(())
    }

    /// Executes a step whose input references are already resolved.
    async fn execute(&self, step: &Step) -> Result<Value>;
}

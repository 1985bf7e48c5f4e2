#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use demoswork::Executor;
use demoswork::actions::StepHandler;
use demoswork::dsl::{Step, StepKind};
use serde_json::{Value, json};

/// Step handler that records every call and replays canned outputs.
/// Steps without a canned output succeed with `{ result: "success" }`.
#[derive(Debug)]
pub struct MockHandler {
    kind: StepKind,
    outputs: HashMap<String, Value>,
    failing: HashSet<String>,
    calls: Arc<Mutex<Vec<Step>>>,
}

#[async_trait]
impl StepHandler for MockHandler {
    fn kind(&self) -> StepKind {
        self.kind
    }

    async fn execute(&self, step: &Step) -> Result<Value> {
        println!("[MOCK] {} step {}", self.kind, step.id);
        self.calls.lock().unwrap().push(step.clone());
        if self.failing.contains(&step.id) {
            return Err(anyhow!("broadcast rejected for {}", step.id));
        }
        Ok(self
            .outputs
            .get(&step.id)
            .cloned()
            .unwrap_or_else(|| json!({ "result": "success" })))
    }
}

/// Shared call log across one mock handler per step kind.
#[derive(Debug, Default)]
pub struct Mocks {
    outputs: HashMap<String, Value>,
    failing: HashSet<String>,
    calls: Arc<Mutex<Vec<Step>>>,
}

impl Mocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(mut self, step: &str, output: Value) -> Self {
        self.outputs.insert(step.to_string(), output);
        self
    }

    pub fn fail(mut self, step: &str) -> Self {
        self.failing.insert(step.to_string());
        self
    }

    pub fn executor(&self) -> Executor {
        let mut executor = Executor::new();
        for kind in [StepKind::Xm, StepKind::Web2, StepKind::Native] {
            executor.register_handler(Arc::new(MockHandler {
                kind,
                outputs: self.outputs.clone(),
                failing: self.failing.clone(),
                calls: self.calls.clone(),
            }));
        }
        executor
    }

    /// Ids of executed steps, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|s| s.id.clone()).collect()
    }

    pub fn call_count(&self, step: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|s| s.id == step).count()
    }

    /// The resolved step as the handler received it.
    pub fn received(&self, step: &str) -> Option<Step> {
        self.calls.lock().unwrap().iter().find(|s| s.id == step).cloned()
    }
}

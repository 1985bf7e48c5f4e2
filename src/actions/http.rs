use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use tracing::debug;

use crate::actions::StepHandler;
use crate::dsl::{HttpMethod, Step, StepInput, StepKind, Web2Request};

/// Executes web2 steps over HTTP. Output: `{ statusCode, payload }`.
#[derive(Debug, Clone)]
pub struct Web2Handler {
    client: Client,
}

impl Default for Web2Handler {
    fn default() -> Self {
        Self::new()
    }
}

impl Web2Handler {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn request<'a>(&self, step: &'a Step) -> Result<&'a Web2Request> {
        match &step.input {
            StepInput::Web2(request) => Ok(request),
            other => Err(anyhow!("Expected a web2 input, got {}", other.kind())),
        }
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[async_trait]
impl StepHandler for Web2Handler {
    fn kind(&self) -> StepKind {
        StepKind::Web2
    }

    fn validate(&self, step: &Step) -> Result<()> {
        let request = self.request(step)?;
        reqwest::Url::parse(&request.url).map_err(|e| anyhow!("Invalid url '{}': {}", request.url, e))?;
        Ok(())
    }

    async fn execute(&self, step: &Step) -> Result<Value> {
        let request = self.request(step)?;
        debug!(step = %step.id, url = %request.url, "Sending web2 request");

        let mut builder = self.client.request(method(request.method), &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(data) = &request.data {
            builder = builder.json(data);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        // JSON if possible, else the raw text.
        let text = response.text().await?;
        let payload = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        Ok(json!({
            "statusCode": status,
            "payload": payload
        }))
    }
}

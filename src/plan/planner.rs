//! Plan generation client
//!
//! The model is a black box that turns text plus sensor readings into a JSON
//! plan. Its output is parsed strictly here; anything off-schema becomes a
//! `PlanError` that the worker turns into a fallback stop.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::prompt;
use super::schema::{ActionStep, SensorSnapshot};
use crate::config::PlannerConfig;

/// Failures at the planner boundary
#[derive(Debug, Error)]
pub enum PlanError {
    /// Transport-level failure talking to the model
    #[error("planner request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Model endpoint answered with a non-success status
    #[error("planner returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Model output is not JSON
    #[error("invalid JSON in model output: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// JSON without the top-level `plan` key
    #[error("missing top-level 'plan' key")]
    MissingPlan,

    /// Structure present but a step violates the schema
    #[error("schema violation: {0}")]
    Schema(String),
}

/// Produces raw plans from a normalized command
#[async_trait]
pub trait Planner: Send + Sync {
    /// Generate the raw steps for `command` given the current readings
    async fn plan(
        &self,
        command: &str,
        snapshot: &SensorSnapshot,
    ) -> Result<Vec<ActionStep>, PlanError>;

    /// Name for logs
    fn name(&self) -> &'static str;
}

/// Parse model output into schema-checked steps
///
/// # Errors
///
/// Returns error if the text is not JSON, lacks the `plan` array, or any
/// step is malformed
pub fn parse_model_output(text: &str) -> Result<Vec<ActionStep>, PlanError> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(text))?;

    let plan = value.get("plan").ok_or(PlanError::MissingPlan)?;
    let items = plan
        .as_array()
        .ok_or_else(|| PlanError::Schema("'plan' must be an array".to_string()))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let step: ActionStep = serde_json::from_value(item.clone())
                .map_err(|e| PlanError::Schema(format!("step {index}: {e}")))?;
            step.check_magnitudes()
                .map_err(|reason| PlanError::Schema(format!("step {index}: {reason}")))?;
            Ok(step)
        })
        .collect()
}

/// Remove a surrounding Markdown code fence some models emit despite JSON mode
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.strip_prefix("json").unwrap_or(rest);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Request body for an Ollama-style `/api/chat` endpoint
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    format: &'static str,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// Planner backed by a chat model in JSON mode
pub struct ChatPlanner {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    system_prompt: String,
}

impl ChatPlanner {
    /// Create a planner for the configured endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &PlannerConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        tracing::debug!(url = %config.url, model = %config.model, "chat planner initialized");

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            system_prompt: prompt::system_prompt(),
        })
    }
}

#[async_trait]
impl Planner for ChatPlanner {
    async fn plan(
        &self,
        command: &str,
        snapshot: &SensorSnapshot,
    ) -> Result<Vec<ActionStep>, PlanError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: self.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt::user_prompt(command, snapshot),
                },
            ],
            format: "json",
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "planner request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "planner API error");
            return Err(PlanError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result: ChatResponse = response.json().await?;
        tracing::debug!(raw = %result.message.content, "raw model output");

        parse_model_output(&result.message.content)
    }

    fn name(&self) -> &'static str {
        "chat"
    }
}

//! Shared test utilities

#![allow(dead_code)]

use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rover_gateway::api::ApiState;
use rover_gateway::pipeline::{PlanOutbox, StateSync};
use rover_gateway::plan::{ActionStep, PlanError, Planner, SensorSnapshot, parse_model_output};
use rover_gateway::voice::{Transcriber, Utterance};
use rover_gateway::{Error, Result};

/// Transcriber returning a fixed reply
pub struct ScriptedTranscriber {
    reply: std::result::Result<String, String>,
}

impl ScriptedTranscriber {
    pub fn text(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
        })
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _utterance: &Utterance) -> Result<String> {
        self.reply.clone().map_err(Error::Stt)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Planner parsing a fixed model output and recording its inputs
pub struct ScriptedPlanner {
    output: String,
    calls: Mutex<Vec<(String, SensorSnapshot)>>,
}

impl ScriptedPlanner {
    pub fn new(output: &str) -> Arc<Self> {
        Arc::new(Self {
            output: output.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Commands and snapshots seen so far
    pub fn calls(&self) -> Vec<(String, SensorSnapshot)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(
        &self,
        command: &str,
        snapshot: &SensorSnapshot,
    ) -> std::result::Result<Vec<ActionStep>, PlanError> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), snapshot.clone()));
        parse_model_output(&self.output)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// A short utterance; content is irrelevant to the scripted transcriber
pub fn test_utterance() -> Utterance {
    Utterance::new(vec![1000; 1600], 16_000)
}

/// API state with fresh pipeline components
pub fn test_api_state(outbox_capacity: usize) -> ApiState {
    ApiState::new(
        StateSync::new(),
        PlanOutbox::new(outbox_capacity),
        Arc::new(AtomicU64::new(0)),
    )
}

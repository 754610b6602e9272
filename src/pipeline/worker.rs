//! Single consumer turning utterances into published plans

use std::sync::Arc;
use std::time::Instant;

use super::outbox::PlanOutbox;
use super::queue::{CommandReceiver, PipelineJob};
use super::state::StateSync;
use crate::config::SafetyConfig;
use crate::plan::{self, ActionPlan, Planner};
use crate::voice::{BufferRecycler, Transcriber};

/// What happened to one job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// A validated plan was published
    Published,
    /// Transcription or planning failed; a fallback stop was published
    Fallback,
    /// Nothing was said; no plan published
    Discarded,
}

/// Normalize a transcript into a planner command
///
/// Trims whitespace, strips one trailing period and lowercases.
#[must_use]
pub fn normalize_command(text: &str) -> String {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    trimmed.trim_end().to_lowercase()
}

/// Transcribes, plans, validates and publishes, one job at a time
pub struct PlanningWorker {
    transcriber: Arc<dyn Transcriber>,
    planner: Arc<dyn Planner>,
    state: StateSync,
    outbox: PlanOutbox,
    safety: SafetyConfig,
    recycler: Option<BufferRecycler>,
}

impl PlanningWorker {
    #[must_use]
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        planner: Arc<dyn Planner>,
        state: StateSync,
        outbox: PlanOutbox,
        safety: SafetyConfig,
    ) -> Self {
        Self {
            transcriber,
            planner,
            state,
            outbox,
            safety,
            recycler: None,
        }
    }

    /// Return audio buffers to the capture side once transcribed
    #[must_use]
    pub fn with_recycler(mut self, recycler: BufferRecycler) -> Self {
        self.recycler = Some(recycler);
        self
    }

    /// Process jobs until every sender is dropped
    pub async fn run(self, mut rx: CommandReceiver) {
        tracing::info!(
            transcriber = self.transcriber.name(),
            planner = self.planner.name(),
            "planning worker started"
        );

        while let Some(job) = rx.recv().await {
            self.process(job).await;
        }

        tracing::info!("planning worker stopped");
    }

    /// Run one job to completion; failures become fallback plans
    pub async fn process(&self, job: PipelineJob) -> JobOutcome {
        let started = Instant::now();
        let id = job.id;

        let transcribed = self.transcriber.transcribe(&job.utterance).await;
        if let Some(recycler) = &self.recycler {
            recycler.recycle(job.utterance.into_samples());
        }

        let transcript = match transcribed {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "transcription failed");
                self.outbox.publish(ActionPlan::fallback(&e));
                return JobOutcome::Fallback;
            }
        };

        let command = normalize_command(&transcript);
        if command.is_empty() {
            tracing::info!(job_id = %id, "empty transcript, discarding");
            return JobOutcome::Discarded;
        }

        let snapshot = self.state.snapshot();
        tracing::info!(job_id = %id, command = %command, front = snapshot.front(), "planning");

        let (plan, outcome) = match self.planner.plan(&command, &snapshot).await {
            Ok(raw) => (
                plan::validate(raw, &snapshot, &self.safety),
                JobOutcome::Published,
            ),
            Err(e) => {
                tracing::error!(
                    job_id = %id,
                    error = %e,
                    "planning failed, publishing fallback stop"
                );
                (ActionPlan::fallback(&e), JobOutcome::Fallback)
            }
        };

        tracing::info!(
            job_id = %id,
            steps = plan.len(),
            elapsed = ?started.elapsed(),
            "plan published"
        );
        self.outbox.publish(plan);

        outcome
    }
}

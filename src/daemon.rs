//! Gateway daemon
//!
//! Wires microphone capture, the command queue, the planning worker and the
//! HTTP API together and runs them until interrupted.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::Result;
use crate::api::{ApiServer, ApiState};
use crate::config::Config;
use crate::pipeline::{CommandSender, PlanOutbox, PlanningWorker, StateSync, command_queue};
use crate::plan::ChatPlanner;
use crate::voice::{
    AudioCapture, CaptureMachine, RecorderSettings, SpeechToText, detector_from_config,
};

/// The rover daemon - orchestrates voice capture, planning and the robot API
pub struct Daemon {
    config: Config,
}

impl Daemon {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the planner client cannot be built or the API server
    /// fails
    #[allow(clippy::future_not_send)]
    pub async fn run(self) -> Result<()> {
        let config = &self.config;

        let state = StateSync::new();
        let outbox = PlanOutbox::new(config.pipeline.outbox_capacity);
        let (sender, receiver) = command_queue(config.pipeline.queue_capacity);

        let machine = if config.voice.enabled {
            match detector_from_config(&config.voice) {
                Ok(detector) => Some(CaptureMachine::new(
                    detector,
                    RecorderSettings::from_config(&config.voice),
                )),
                Err(e) => {
                    tracing::error!(error = %e, "wake word detector unavailable, serving API only");
                    None
                }
            }
        } else {
            tracing::info!("voice disabled, serving API only");
            None
        };

        let transcriber = Arc::new(SpeechToText::new(&config.voice));
        let planner = Arc::new(ChatPlanner::new(&config.planner)?);
        let mut worker = PlanningWorker::new(
            transcriber,
            planner,
            state.clone(),
            outbox.clone(),
            config.safety,
        );
        if let Some(machine) = &machine {
            worker = worker.with_recycler(machine.recycler());
        }
        let worker = tokio::spawn(worker.run(receiver));

        let api_state = ApiState::new(state, outbox, sender.drop_counter());
        let mut server = ApiServer::new(api_state, &config.api_server).spawn();

        // Set up shutdown signal
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        // cpal streams are not Send; capture stays on this task
        let mut capture = match machine {
            Some(machine) => match start_capture(config, machine, sender.clone()) {
                Ok(capture) => Some(capture),
                Err(e) => {
                    tracing::error!(error = %e, "voice capture unavailable, serving API only");
                    None
                }
            },
            None => None,
        };

        let outcome = tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("shutdown requested");
                Ok(())
            }
            result = &mut server => match result {
                Ok(result) => result,
                Err(e) => Err(crate::Error::Config(format!("API server task failed: {e}"))),
            },
        };

        if let Some(capture) = capture.as_mut() {
            capture.stop();
        }
        drop(capture);
        drop(sender);
        server.abort();
        worker.abort();

        outcome
    }
}

/// Open the microphone and feed frames through the capture state machine
fn start_capture(
    config: &Config,
    mut machine: CaptureMachine,
    sender: CommandSender,
) -> Result<AudioCapture> {
    let frame_length = machine.frame_length();

    let mut capture = AudioCapture::new(config.voice.sample_rate)?;
    capture.start(frame_length, move |frame| {
        if let Some(utterance) = machine.process_frame(frame) {
            tracing::info!(seconds = utterance.duration_secs(), "utterance captured");
            sender.try_send(utterance);
        }
    })?;

    tracing::info!(frame_length, "listening for wake word");
    Ok(capture)
}

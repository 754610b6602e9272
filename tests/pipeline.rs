//! Planning pipeline integration tests
//!
//! Drives the worker with scripted transcription and model output, so no
//! network or audio hardware is needed.

use std::sync::Arc;

use rover_gateway::config::{RetriggerPolicy, SafetyConfig};
use rover_gateway::pipeline::{
    JobOutcome, PipelineJob, PlanOutbox, PlanningWorker, StateSync, command_queue,
};
use rover_gateway::plan::{ActionKind, ActionStep, Planner, SensorSnapshot};
use rover_gateway::voice::{CaptureMachine, EnergyTrigger, RecorderSettings, Transcriber};

mod common;
use common::{ScriptedPlanner, ScriptedTranscriber, test_utterance};

fn worker(
    transcriber: Arc<dyn Transcriber>,
    planner: Arc<dyn Planner>,
    front: f64,
) -> (PlanningWorker, PlanOutbox) {
    let state = StateSync::new();
    state.replace([("front", front)].into_iter().collect::<SensorSnapshot>());
    let outbox = PlanOutbox::new(8);
    let worker = PlanningWorker::new(
        transcriber,
        planner,
        state,
        outbox.clone(),
        SafetyConfig::default(),
    );
    (worker, outbox)
}

fn plan_json(outbox: &PlanOutbox) -> serde_json::Value {
    serde_json::to_value(outbox.take().expect("a plan was published")).unwrap()
}

#[tokio::test]
async fn test_forward_gets_default_distance() {
    let planner = ScriptedPlanner::new(r#"{"plan": [{"action": "forward"}, {"action": "stop"}]}"#);
    let transcriber = ScriptedTranscriber::text(" Move forward. ");
    let (worker, outbox) = worker(transcriber, planner.clone(), 1.0);

    let outcome = worker.process(PipelineJob::new(test_utterance())).await;
    assert_eq!(outcome, JobOutcome::Published);

    assert_eq!(
        plan_json(&outbox),
        serde_json::json!([
            {"action": "forward", "distance": 0.5, "notes": "[DEFAULT INJECTED]"},
            {"action": "stop"}
        ])
    );

    let calls = planner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "move forward");
    assert_eq!(calls[0].1.get("front"), Some(1.0));
}

#[tokio::test]
async fn test_close_obstacle_overrides_plan() {
    let planner = ScriptedPlanner::new(
        r#"{"plan": [{"action": "forward", "distance": 2.0}, {"action": "stop"}]}"#,
    );
    let (worker, outbox) = worker(ScriptedTranscriber::text("move forward"), planner, 0.02);

    assert_eq!(
        worker.process(PipelineJob::new(test_utterance())).await,
        JobOutcome::Published
    );
    assert_eq!(
        plan_json(&outbox),
        serde_json::json!([{"action": "stop", "notes": "CRITICAL SAFETY OVERRIDE"}])
    );
}

#[tokio::test]
async fn test_malformed_model_output_falls_back() {
    let planner = ScriptedPlanner::new("sure! I'll move forward");
    let (worker, outbox) = worker(ScriptedTranscriber::text("move forward"), planner, 1.0);

    assert_eq!(
        worker.process(PipelineJob::new(test_utterance())).await,
        JobOutcome::Fallback
    );

    let plan = outbox.take().unwrap();
    assert_eq!(plan.len(), 1);
    assert!(plan.steps()[0].is_stop());
    let notes = plan.steps()[0].notes().unwrap();
    assert!(notes.starts_with("fallback: invalid JSON in model output"), "{notes}");
}

#[tokio::test]
async fn test_schema_violation_falls_back() {
    let planner = ScriptedPlanner::new(r#"{"plan": [{"action": "jump"}]}"#);
    let (worker, outbox) = worker(ScriptedTranscriber::text("jump"), planner, 1.0);

    assert_eq!(
        worker.process(PipelineJob::new(test_utterance())).await,
        JobOutcome::Fallback
    );
    let plan = outbox.take().unwrap();
    assert!(plan.steps()[0].notes().unwrap().starts_with("fallback: schema violation"));
}

#[tokio::test]
async fn test_transcription_failure_falls_back() {
    let planner = ScriptedPlanner::new(r#"{"plan": [{"action": "stop"}]}"#);
    let transcriber = ScriptedTranscriber::failing("connection refused");
    let (worker, outbox) = worker(transcriber, planner.clone(), 1.0);

    assert_eq!(
        worker.process(PipelineJob::new(test_utterance())).await,
        JobOutcome::Fallback
    );

    let plan = outbox.take().unwrap();
    assert_eq!(plan.len(), 1);
    let notes = plan.steps()[0].notes().unwrap();
    assert!(notes.starts_with("fallback: "), "{notes}");
    assert!(notes.contains("connection refused"), "{notes}");
    assert!(planner.calls().is_empty());
}

#[tokio::test]
async fn test_empty_transcript_is_discarded() {
    let planner = ScriptedPlanner::new(r#"{"plan": [{"action": "stop"}]}"#);
    let (worker, outbox) = worker(ScriptedTranscriber::text("  .  "), planner.clone(), 1.0);

    assert_eq!(
        worker.process(PipelineJob::new(test_utterance())).await,
        JobOutcome::Discarded
    );
    assert_eq!(outbox.pending(), 0);
    assert!(planner.calls().is_empty());
}

#[tokio::test]
async fn test_square_keeps_magnitudes_and_order() {
    let planner = ScriptedPlanner::new(
        r#"{"plan": [
            {"action": "forward", "distance": 1.0},
            {"action": "right", "duration": 1.5},
            {"action": "forward", "distance": 1.0},
            {"action": "right", "duration": 1.5}
        ]}"#,
    );
    let (worker, outbox) = worker(ScriptedTranscriber::text("Draw half a square."), planner, 3.0);

    worker.process(PipelineJob::new(test_utterance())).await;

    let plan = outbox.take().unwrap();
    let kinds: Vec<ActionKind> = plan.steps().iter().map(ActionStep::kind).collect();
    assert_eq!(
        kinds,
        [
            ActionKind::Forward,
            ActionKind::Right,
            ActionKind::Forward,
            ActionKind::Right,
            ActionKind::Stop
        ]
    );
    assert_eq!(plan.steps()[1].duration(), Some(1.5));
    assert!(plan.steps()[1].notes().is_none());
}

#[tokio::test]
async fn test_queue_overflow_drops_exactly_the_excess() {
    let planner = ScriptedPlanner::new(r#"{"plan": [{"action": "left"}]}"#);
    let (worker, outbox) = worker(ScriptedTranscriber::text("turn left"), planner.clone(), 1.0);

    let (sender, receiver) = command_queue(3);
    let accepted: Vec<bool> = (0..5).map(|_| sender.try_send(test_utterance())).collect();
    assert_eq!(accepted, [true, true, true, false, false]);
    assert_eq!(sender.dropped(), 2);

    drop(sender);
    worker.run(receiver).await;

    assert_eq!(planner.calls().len(), 3);
    assert_eq!(outbox.pending(), 3);
    for _ in 0..3 {
        let plan = outbox.take().unwrap();
        assert_eq!(plan.steps()[0].duration(), Some(1.0));
        assert!(plan.steps()[1].is_stop());
    }
}

#[tokio::test]
async fn test_worker_survives_failures() {
    let planner = ScriptedPlanner::new("{not json");
    let (worker, outbox) = worker(ScriptedTranscriber::text("go"), planner.clone(), 1.0);

    let (sender, receiver) = command_queue(4);
    sender.try_send(test_utterance());
    sender.try_send(test_utterance());
    let handle = tokio::spawn(worker.run(receiver));

    drop(sender);
    handle.await.unwrap();

    assert_eq!(planner.calls().len(), 2);
    assert_eq!(outbox.pending(), 2);
}

/// One loud frame followed by one silent frame
fn capture(machine: &mut CaptureMachine) -> rover_gateway::voice::Utterance {
    assert!(machine.process_frame(&[5000; 4]).is_none());
    machine
        .process_frame(&[0; 4])
        .expect("silence ends the recording")
}

#[tokio::test]
async fn test_transcribed_audio_returns_to_capture() {
    let settings = RecorderSettings {
        sample_rate: 4,
        silence_threshold: 800,
        silence_samples: 4,
        max_samples: 64,
        retrigger: RetriggerPolicy::Restart,
    };
    let mut machine = CaptureMachine::new(Box::new(EnergyTrigger::new(4, 1000, 1)), settings);

    let planner = ScriptedPlanner::new(r#"{"plan": [{"action": "stop"}]}"#);
    let (worker, _outbox) = worker(ScriptedTranscriber::text("stop"), planner, 1.0);
    let worker = worker.with_recycler(machine.recycler());

    let first = capture(&mut machine);
    let ptr = first.samples().as_ptr();
    worker.process(PipelineJob::new(first)).await;

    // The spare goes out next, then the returned buffer
    capture(&mut machine);
    let reused = capture(&mut machine);
    assert_eq!(reused.samples().as_ptr(), ptr);
    assert_eq!(reused.len(), 8);
}

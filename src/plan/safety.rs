//! Safety layer between the planner and the actuator
//!
//! Rules, in order: a too-close front obstacle replaces the whole plan with a
//! stop; movement steps with no magnitude get a default; the plan always ends
//! with `stop`.

use super::schema::{ActionPlan, ActionStep, SensorSnapshot};
use crate::config::SafetyConfig;

/// Note on the single step of an overridden plan
pub const SAFETY_OVERRIDE_NOTE: &str = "CRITICAL SAFETY OVERRIDE";

/// Marker appended to notes of steps that received a default magnitude
pub const DEFAULT_INJECTED_NOTE: &str = "[DEFAULT INJECTED]";

/// Turn a raw planner output into an executable plan
#[must_use]
pub fn validate(
    raw: Vec<ActionStep>,
    snapshot: &SensorSnapshot,
    config: &SafetyConfig,
) -> ActionPlan {
    let front = snapshot.front();
    if front < config.front_safe_threshold {
        tracing::warn!(
            front,
            threshold = config.front_safe_threshold,
            discarded_steps = raw.len(),
            "front obstacle too close, overriding plan"
        );
        return ActionPlan::halt(SAFETY_OVERRIDE_NOTE);
    }

    let mut steps: Vec<ActionStep> = raw
        .into_iter()
        .map(|step| inject_default(step, config))
        .collect();

    if !steps.last().is_some_and(ActionStep::is_stop) {
        tracing::debug!(steps = steps.len(), "plan missing terminal stop, appending one");
        steps.push(ActionStep::stop());
    }

    ActionPlan::from_validated(steps)
}

/// Give a magnitude to a movement step that has neither duration nor distance
fn inject_default(mut step: ActionStep, config: &SafetyConfig) -> ActionStep {
    let kind = step.kind();
    let Some(motion) = step.motion_mut() else {
        return step;
    };
    if motion.has_magnitude() {
        return step;
    }

    if kind.is_turn() {
        motion.duration = Some(config.default_turn_duration);
    } else {
        motion.distance = Some(config.default_distance);
    }

    motion.notes = Some(match motion.notes.take() {
        Some(notes) if !notes.trim().is_empty() => {
            format!("{} {DEFAULT_INJECTED_NOTE}", notes.trim_end())
        }
        _ => DEFAULT_INJECTED_NOTE.to_string(),
    });

    tracing::debug!(action = %kind, "injected default magnitude");
    step
}

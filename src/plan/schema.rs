//! Motion plan data model
//!
//! Steps travel as `{"action": "...", "duration"?, "distance"?, "notes"?}` with
//! absent fields omitted rather than sent as `null`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reading assumed for a sensor that has not reported (metres)
pub const NO_OBSTACLE_DISTANCE: f64 = 100.0;

/// Sensor the safety override watches
pub const FRONT_SENSOR: &str = "front";

/// Kind of motion a step performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
}

impl ActionKind {
    /// Wire name of the action
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Left => "left",
            Self::Right => "right",
            Self::Stop => "stop",
        }
    }

    /// Turns are measured in time rather than distance
    #[must_use]
    pub const fn is_turn(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }

    /// Anything other than `stop`
    #[must_use]
    pub const fn is_movement(self) -> bool {
        !matches!(self, Self::Stop)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Magnitude and annotation of a movement step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Metres
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Motion {
    /// Movement for a fixed distance
    #[must_use]
    pub const fn distance(meters: f64) -> Self {
        Self {
            duration: None,
            distance: Some(meters),
            notes: None,
        }
    }

    /// Movement for a fixed time
    #[must_use]
    pub const fn duration(seconds: f64) -> Self {
        Self {
            duration: Some(seconds),
            distance: None,
            notes: None,
        }
    }

    /// Whether either duration or distance is present
    #[must_use]
    pub const fn has_magnitude(&self) -> bool {
        self.duration.is_some() || self.distance.is_some()
    }
}

/// Payload of a `stop` step; it never carries a magnitude
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Halt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One step of a motion plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ActionStep {
    Forward(Motion),
    Backward(Motion),
    Left(Motion),
    Right(Motion),
    Stop(Halt),
}

impl ActionStep {
    /// Plain `stop` with no annotation
    #[must_use]
    pub const fn stop() -> Self {
        Self::Stop(Halt { notes: None })
    }

    /// `stop` carrying a note
    #[must_use]
    pub fn stop_with(notes: impl Into<String>) -> Self {
        Self::Stop(Halt {
            notes: Some(notes.into()),
        })
    }

    /// Build a movement step of the given kind
    ///
    /// `ActionKind::Stop` yields a stop step annotated with the motion's notes.
    #[must_use]
    pub fn movement(kind: ActionKind, motion: Motion) -> Self {
        match kind {
            ActionKind::Forward => Self::Forward(motion),
            ActionKind::Backward => Self::Backward(motion),
            ActionKind::Left => Self::Left(motion),
            ActionKind::Right => Self::Right(motion),
            ActionKind::Stop => Self::Stop(Halt {
                notes: motion.notes,
            }),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Forward(_) => ActionKind::Forward,
            Self::Backward(_) => ActionKind::Backward,
            Self::Left(_) => ActionKind::Left,
            Self::Right(_) => ActionKind::Right,
            Self::Stop(_) => ActionKind::Stop,
        }
    }

    /// Motion payload, `None` for `stop`
    #[must_use]
    pub const fn motion(&self) -> Option<&Motion> {
        match self {
            Self::Forward(m) | Self::Backward(m) | Self::Left(m) | Self::Right(m) => Some(m),
            Self::Stop(_) => None,
        }
    }

    /// Mutable motion payload, `None` for `stop`
    pub fn motion_mut(&mut self) -> Option<&mut Motion> {
        match self {
            Self::Forward(m) | Self::Backward(m) | Self::Left(m) | Self::Right(m) => Some(m),
            Self::Stop(_) => None,
        }
    }

    #[must_use]
    pub fn duration(&self) -> Option<f64> {
        self.motion().and_then(|m| m.duration)
    }

    #[must_use]
    pub fn distance(&self) -> Option<f64> {
        self.motion().and_then(|m| m.distance)
    }

    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        match self {
            Self::Forward(m) | Self::Backward(m) | Self::Left(m) | Self::Right(m) => {
                m.notes.as_deref()
            }
            Self::Stop(h) => h.notes.as_deref(),
        }
    }

    #[must_use]
    pub const fn is_stop(&self) -> bool {
        matches!(self, Self::Stop(_))
    }

    /// Check magnitudes are finite and strictly positive
    ///
    /// # Errors
    ///
    /// Returns a description of the offending field
    pub fn check_magnitudes(&self) -> std::result::Result<(), String> {
        let Some(motion) = self.motion() else {
            return Ok(());
        };

        for (field, value) in [("duration", motion.duration), ("distance", motion.distance)] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(format!(
                        "{} {field} must be a positive number, got {v}",
                        self.kind()
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Validated, stop-terminated sequence of steps
///
/// Only the safety validator and the halt constructors build plans, so every
/// instance is non-empty and ends with `stop`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ActionPlan(Vec<ActionStep>);

impl ActionPlan {
    pub(crate) fn from_validated(steps: Vec<ActionStep>) -> Self {
        debug_assert!(steps.last().is_some_and(ActionStep::is_stop));
        Self(steps)
    }

    /// Single-step plan that only stops
    #[must_use]
    pub fn halt(notes: impl Into<String>) -> Self {
        Self(vec![ActionStep::stop_with(notes)])
    }

    /// Plan published when transcription or planning failed
    #[must_use]
    pub fn fallback(error: &impl fmt::Display) -> Self {
        Self::halt(format!("fallback: {error}"))
    }

    #[must_use]
    pub fn steps(&self) -> &[ActionStep] {
        &self.0
    }

    #[must_use]
    pub fn into_steps(self) -> Vec<ActionStep> {
        self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Latest distance readings keyed by sensor name (metres)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorSnapshot(BTreeMap<String, f64>);

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self(BTreeMap::from([(
            FRONT_SENSOR.to_string(),
            NO_OBSTACLE_DISTANCE,
        )]))
    }
}

impl SensorSnapshot {
    #[must_use]
    pub const fn new(readings: BTreeMap<String, f64>) -> Self {
        Self(readings)
    }

    #[must_use]
    pub fn get(&self, sensor: &str) -> Option<f64> {
        self.0.get(sensor).copied()
    }

    /// Front distance, treating a missing reading as no obstacle
    #[must_use]
    pub fn front(&self) -> f64 {
        self.get(FRONT_SENSOR).unwrap_or(NO_OBSTACLE_DISTANCE)
    }

    #[must_use]
    pub const fn readings(&self) -> &BTreeMap<String, f64> {
        &self.0
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for SensorSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

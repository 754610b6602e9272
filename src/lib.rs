//! Rover Gateway - Voice-commanded motion planning for a serial-driven rover
//!
//! This library provides the core functionality for the rover gateway:
//! - Wake-word gated voice capture
//! - A single-consumer planning pipeline (transcribe, plan, validate)
//! - A safety layer over every generated plan
//! - The HTTP surface the robot polls, and the robot-side actuator loop
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  mic frames → CaptureMachine → CommandQueue           │
//! └────────────────────┬─────────────────────────────────┘
//!                      │
//! ┌────────────────────▼─────────────────────────────────┐
//! │  PlanningWorker: transcribe → normalize → plan        │
//! │                  → validate → PlanOutbox              │
//! └────────────────────┬─────────────────────────────────┘
//!                      │  HTTP poll (/submit_state, /get_command)
//! ┌────────────────────▼─────────────────────────────────┐
//! │  Actuator → serial motor controller                   │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod actuator;
pub mod api;
pub mod config;
pub mod daemon;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod voice;

pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use pipeline::{PlanOutbox, PlanningWorker, StateSync};
pub use plan::{ActionPlan, ActionStep, SensorSnapshot};

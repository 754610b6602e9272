//! Motion plans: data model, generation and the safety layer

mod planner;
mod prompt;
mod safety;
mod schema;

pub use planner::{ChatPlanner, PlanError, Planner, parse_model_output};
pub use prompt::{plan_schema, system_prompt, user_prompt};
pub use safety::{DEFAULT_INJECTED_NOTE, SAFETY_OVERRIDE_NOTE, validate};
pub use schema::{
    ActionKind, ActionPlan, ActionStep, FRONT_SENSOR, Halt, Motion, NO_OBSTACLE_DISTANCE,
    SensorSnapshot,
};

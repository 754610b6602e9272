//! Prompt construction for the plan generator

use serde_json::{Value, json};

use super::schema::SensorSnapshot;

/// JSON schema the model output must conform to
#[must_use]
pub fn plan_schema() -> Value {
    json!({
        "title": "ActionPlan",
        "type": "object",
        "required": ["plan"],
        "properties": {
            "plan": {
                "description": "A sequence of robot actions. The final action MUST be 'stop'.",
                "type": "array",
                "items": {
                    "title": "ActionDecision",
                    "type": "object",
                    "required": ["action"],
                    "properties": {
                        "action": {
                            "description": "The movement command. Use 'left' or 'right' for turns.",
                            "enum": ["forward", "backward", "left", "right", "stop"],
                            "type": "string"
                        },
                        "duration": {
                            "description": "Duration in seconds. Use for turns or time-based movements.",
                            "type": "number",
                            "exclusiveMinimum": 0
                        },
                        "distance": {
                            "description": "Distance in meters for forward/backward motions.",
                            "type": "number",
                            "exclusiveMinimum": 0
                        },
                        "notes": {
                            "description": "Brief description of the action.",
                            "type": "string"
                        }
                    }
                }
            }
        }
    })
}

/// System prompt describing the choreography rules and output schema
#[must_use]
pub fn system_prompt() -> String {
    let schema = serde_json::to_string_pretty(&plan_schema()).unwrap_or_default();

    format!(
        r#"You are an Autonomous Director of Robot Choreography. Your job is to translate ANY user command into a precise, logical sequence of robot actions.
Your final output MUST STRICTLY conform to the provided JSON schema.

EXECUTION RULES:
1. Output MUST be a JSON object with a top-level key "plan" (not just a list).
2. The "plan" array must include step-by-step robot actions.
3. The LAST action in the plan MUST always be 'stop'.
4. When drawing geometric shapes (square, triangle, etc.), use consistent turns (e.g., always 'right' for a clockwise square).
5. Use realistic numeric values: forward distances in meters, turns via 'duration' seconds for 90 degree angles.
6. For geometry (square, triangle, hexagon, etc.) avoid creativity or randomness and focus on consistent logic.
7. Use creativity for abstract commands like dance.

JSON SCHEMA:
{schema}
"#
    )
}

/// User prompt carrying the command and current sensor readings
#[must_use]
pub fn user_prompt(command: &str, snapshot: &SensorSnapshot) -> String {
    let readings = serde_json::to_string(snapshot).unwrap_or_else(|_| "{}".to_string());

    format!(
        "Command: \"{command}\"\nUltrasonic readings: {readings}\nGenerate the complete JSON response that contains the top-level 'plan' array now.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_embeds_schema() {
        let prompt = system_prompt();
        assert!(prompt.contains("\"plan\""));
        assert!(prompt.contains("\"enum\""));
        assert!(prompt.contains("MUST always be 'stop'"));
    }

    #[test]
    fn test_user_prompt_includes_readings() {
        let snapshot: SensorSnapshot = [("front", 0.52), ("left", 1.2)].into_iter().collect();
        let prompt = user_prompt("draw a square", &snapshot);
        assert!(prompt.contains("Command: \"draw a square\""));
        assert!(prompt.contains(r#""front":0.52"#));
        assert!(prompt.contains(r#""left":1.2"#));
    }
}

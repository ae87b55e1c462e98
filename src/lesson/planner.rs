use log::{ info, warn };
use serde_json::{ json, Map, Value as JsonValue };
use std::sync::Arc;
use std::time::Duration;

use super::strip_code_fence;
use crate::config::prompt::{ self, PromptConfig };
use crate::error::{ Result, TutorError };
use crate::llm::chat::{ complete_with_timeout, ChatClient, CompletionRequest, ResponseFormat };
use crate::models::lesson::{ LessonPlan, Segment };

const TIME_EPSILON: f64 = 1e-6;

/// JSON schema sent with the planning request.
pub fn lesson_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "explanation": { "type": "string" },
            "segments": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "start_time": { "type": "number" },
                        "end_time": { "type": "number" },
                        "text": { "type": "string" },
                        "visual_description": { "type": "string" }
                    },
                    "required": ["start_time", "end_time", "text", "visual_description"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["explanation", "segments"],
        "additionalProperties": false
    })
}

fn number_field(obj: &Map<String, JsonValue>, key: &str, at: &str, details: &mut Vec<String>) -> Option<f64> {
    match obj.get(key) {
        None => {
            details.push(format!("{}: missing required field `{}`", at, key));
            None
        }
        Some(v) =>
            match v.as_f64() {
                Some(n) if n.is_finite() => Some(n),
                _ => {
                    details.push(format!("{}.{} must be a number", at, key));
                    None
                }
            }
    }
}

fn string_field(obj: &Map<String, JsonValue>, key: &str, at: &str, details: &mut Vec<String>) -> Option<String> {
    match obj.get(key) {
        None => {
            details.push(format!("{}: missing required field `{}`", at, key));
            None
        }
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(_) => {
            details.push(format!("{}.{} must be a string", at, key));
            None
        }
    }
}

fn validate_segments(items: &[JsonValue], details: &mut Vec<String>) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(items.len());
    let mut previous_end: Option<f64> = None;

    for (i, item) in items.iter().enumerate() {
        let at = format!("segments[{}]", i);
        let Some(obj) = item.as_object() else {
            details.push(format!("{} must be an object", at));
            continue;
        };
        let start = number_field(obj, "start_time", &at, details);
        let end = number_field(obj, "end_time", &at, details);
        let text = string_field(obj, "text", &at, details);
        let visual = string_field(obj, "visual_description", &at, details);

        let (Some(start_time), Some(end_time), Some(text), Some(visual_description)) = (
            start,
            end,
            text,
            visual,
        ) else {
            continue;
        };

        if start_time < 0.0 {
            details.push(format!("{}.start_time must not be negative", at));
        }
        if end_time < start_time {
            details.push(format!("{}.end_time must not be before start_time", at));
        }
        if let Some(prev) = previous_end {
            if start_time + TIME_EPSILON < prev {
                details.push(format!("{} overlaps or precedes the previous segment", at));
            }
        }
        previous_end = Some(end_time);
        segments.push(Segment { start_time, end_time, text, visual_description });
    }
    segments
}

/// Structurally validates the model's answer. Every problem found is
/// reported, not just the first.
pub fn parse_lesson_plan(raw: &str) -> Result<LessonPlan> {
    let value: JsonValue = serde_json
        ::from_str(strip_code_fence(raw))
        .map_err(|e| TutorError::validation(vec![format!("response is not valid JSON: {}", e)]))?;
    let Some(obj) = value.as_object() else {
        return Err(TutorError::validation(vec!["response must be a JSON object".to_string()]));
    };

    let mut details = Vec::new();
    let explanation = match obj.get("explanation") {
        None => {
            details.push("missing required field `explanation`".to_string());
            None
        }
        Some(JsonValue::String(s)) if s.trim().is_empty() => {
            details.push("`explanation` must not be empty".to_string());
            None
        }
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(_) => {
            details.push("`explanation` must be a string".to_string());
            None
        }
    };

    let segments = match obj.get("segments") {
        None => {
            details.push("missing required field `segments`".to_string());
            Vec::new()
        }
        Some(JsonValue::Array(items)) if items.is_empty() => {
            details.push("`segments` must contain at least one segment".to_string());
            Vec::new()
        }
        Some(JsonValue::Array(items)) => validate_segments(items, &mut details),
        Some(_) => {
            details.push("`segments` must be an array".to_string());
            Vec::new()
        }
    };

    match explanation {
        Some(explanation) if details.is_empty() => Ok(LessonPlan { explanation, segments }),
        _ => Err(TutorError::validation(details)),
    }
}

pub struct LessonPlanner {
    client: Arc<dyn ChatClient>,
    prompts: Arc<PromptConfig>,
    timeout: Duration,
}

impl LessonPlanner {
    pub fn new(client: Arc<dyn ChatClient>, prompts: Arc<PromptConfig>, timeout: Duration) -> Self {
        Self { client, prompts, timeout }
    }

    pub async fn plan(&self, message: &str) -> Result<LessonPlan> {
        let request = CompletionRequest::text(prompt::get_lesson_prompt(&self.prompts, message)?)
            .with_system(self.prompts.system_prompt()?)
            .with_format(ResponseFormat::JsonSchema {
                name: "lesson_plan".to_string(),
                schema: lesson_schema(),
            });

        info!("Requesting lesson plan from {}", self.client.get_model());
        let response = complete_with_timeout(self.client.as_ref(), &request, self.timeout).await?;

        let plan = parse_lesson_plan(&response.response).map_err(|e| {
            warn!("Lesson plan rejected: {}", e);
            e
        })?;
        info!(
            "Lesson plan ready: {} segments, {:.1}s",
            plan.segments.len(),
            plan.target_duration()
        );
        Ok(plan)
    }
}

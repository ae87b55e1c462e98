use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use thiserror::Error;
use log::info;

use crate::models::lesson::Segment;

pub const SYSTEM_KEY: &str = "system";
pub const LESSON_PLAN_KEY: &str = "lesson_plan";
pub const ANIMATION_CODE_KEY: &str = "animation_code";

const REQUIRED_TEMPLATES: [&str; 3] = [SYSTEM_KEY, LESSON_PLAN_KEY, ANIMATION_CODE_KEY];

const DEFAULT_SYSTEM: &str =
    "You are a helpful math tutor that always answers with a single JSON object and nothing else.";

const DEFAULT_LESSON_PLAN: &str =
    r#"You are a helpful math tutor. Answer the user's question with a clear, concise text explanation
and a short narrated animation plan that illustrates it.

Respond with JSON containing exactly two keys:
- "explanation": the text explanation shown to the student.
- "segments": an ordered list of narration segments. Each segment has
  "start_time" (seconds, number), "end_time" (seconds, number, not before start_time),
  "text" (the narration spoken during the segment) and
  "visual_description" (what the animation shows during the segment).

Rules:
- Segments are sequential and never overlap; the first starts at 0.
- Keep the whole animation between 10 and 60 seconds.
- Visuals must be achievable with Manim Community v0.18 primitives.
- Do not include anything outside the JSON object.

User's question: "{message}""#;

const DEFAULT_ANIMATION_CODE: &str =
    r#"You are an expert Manim programmer. Write Python code that is guaranteed to run on
Manim Community v0.18 and animates the storyboard below in about {duration} seconds.

Storyboard:
{storyboard}

Rules:
- The code must start with `from manim import *`.
- Define exactly one class inheriting from Scene with a construct(self) method.
- Use only official classes and methods from Manim v0.18; do not invent functions or classes.
- Do not use deprecated APIs such as ShowCreation (use Create).
- Never call self.wait(0) or wait with a non-positive duration.
- Keep every mobject inside the visible frame.
- Coordinates are flat lists like [x, y, 0], never nested arrays.
- Do not read or write files, access the network, or import modules other than manim and math.
- Output only the Python code, no explanations and no markdown fences."#;

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Prompt template '{0}' not found")]
    TemplateNotFound(String),

    #[error("Prompt file IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Prompt JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[derive(Deserialize, Debug, Clone)]
pub struct PromptConfig {
    pub templates: HashMap<String, String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        let templates = [
            (SYSTEM_KEY, DEFAULT_SYSTEM),
            (LESSON_PLAN_KEY, DEFAULT_LESSON_PLAN),
            (ANIMATION_CODE_KEY, DEFAULT_ANIMATION_CODE),
        ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { templates }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        for key in REQUIRED_TEMPLATES {
            if !self.templates.contains_key(key) {
                return Err(PromptError::TemplateNotFound(format!("templates:{}", key)));
            }
        }
        Ok(())
    }

    fn template(&self, key: &str) -> Result<&str, PromptError> {
        self.templates
            .get(key)
            .map(|s| s.as_str())
            .ok_or_else(|| PromptError::TemplateNotFound(format!("templates:{}", key)))
    }

    pub fn system_prompt(&self) -> Result<&str, PromptError> {
        self.template(SYSTEM_KEY)
    }
}

pub fn load_prompts(path: &str) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(path)?;
    let config: PromptConfig = serde_json::from_str(&file_content)?;
    config.validate()?;
    info!("Loaded prompt templates from {}", path);
    Ok(Arc::new(config))
}

/// Uses the override file when one is configured, the built-in templates otherwise.
pub fn load_or_default(path: Option<&str>) -> Result<Arc<PromptConfig>, PromptError> {
    match path {
        Some(p) if !p.trim().is_empty() => load_prompts(p),
        _ => Ok(Arc::new(PromptConfig::default())),
    }
}

/// The user message is interpolated verbatim.
pub fn get_lesson_prompt(config: &PromptConfig, message: &str) -> Result<String, PromptError> {
    let template = config.template(LESSON_PLAN_KEY)?;
    Ok(template.replace("{message}", message))
}

pub fn build_storyboard(segments: &[Segment]) -> String {
    segments
        .iter()
        .enumerate()
        .map(|(i, seg)| {
            format!(
                "{}. [{:.1}s - {:.1}s] Show: {} | Narration: {}",
                i + 1,
                seg.start_time,
                seg.end_time,
                seg.visual_description.trim(),
                seg.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn get_animation_prompt(config: &PromptConfig, segments: &[Segment]) -> Result<String, PromptError> {
    let template = config.template(ANIMATION_CODE_KEY)?;
    let duration = segments.last().map(|s| s.end_time).unwrap_or(0.0);
    Ok(
        template
            .replace("{storyboard}", &build_storyboard(segments))
            .replace("{duration}", &format!("{:.0}", duration))
    )
}

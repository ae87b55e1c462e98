use serde::{ Deserialize, Serialize };
use std::path::PathBuf;

/// A timed narration/visual unit of a lesson.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub visual_description: String,
}

/// Structured answer of the lesson-planning call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LessonPlan {
    pub explanation: String,
    pub segments: Vec<Segment>,
}

impl LessonPlan {
    /// Target video length: the end of the last segment.
    pub fn target_duration(&self) -> f64 {
        self.segments.last().map(|s| s.end_time).unwrap_or(0.0)
    }
}

/// Everything one render subprocess invocation needs.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderJob {
    pub job_id: String,
    pub scene_name: String,
    pub source_path: PathBuf,
    pub output_base_name: String,
    pub media_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderResult {
    pub video_url: String,
    pub video_path: PathBuf,
}

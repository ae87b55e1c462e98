use thiserror::Error;

use crate::config::prompt::PromptError;
use crate::llm::chat::LlmError;
use crate::media::process::ProcessError;

/// Failure kinds of a single tutoring request.
///
/// Only `SchemaValidation` and `Upstream` coming out of lesson planning reach
/// the HTTP layer; everything raised while producing the video is absorbed by
/// the agent and turned into a text-only reply.
#[derive(Error, Debug)]
pub enum TutorError {
    #[error("Language model request failed: {0}")]
    Upstream(#[from] LlmError),

    #[error("Lesson plan failed validation: {}", .details.join("; "))]
    SchemaValidation { details: Vec<String> },

    #[error("No Scene subclass found in animation script")]
    NoSceneFound,

    #[error("Animation script rejected: {reason}")]
    ScriptRejected { reason: String },

    #[error("Render failed: {stderr}")]
    RenderFailed { stderr: String },

    #[error("Probe failed: {reason}")]
    Probe { reason: String },

    #[error("Subtitle muxing failed: {stderr}")]
    SubtitleMux { stderr: String },

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TutorError {
    pub fn is_schema_validation(&self) -> bool {
        matches!(self, TutorError::SchemaValidation { .. })
    }

    pub fn validation_details(&self) -> Option<&[String]> {
        match self {
            TutorError::SchemaValidation { details } => Some(details),
            _ => None,
        }
    }

    pub fn validation(details: Vec<String>) -> Self {
        TutorError::SchemaValidation { details }
    }

    pub(crate) fn render_from_process(err: ProcessError) -> Self {
        TutorError::RenderFailed { stderr: err.to_string() }
    }

    pub(crate) fn probe_from_process(err: ProcessError) -> Self {
        TutorError::Probe { reason: err.to_string() }
    }

    pub(crate) fn mux_from_process(err: ProcessError) -> Self {
        TutorError::SubtitleMux { stderr: err.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, TutorError>;

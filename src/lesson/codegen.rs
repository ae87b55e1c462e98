use log::info;
use std::sync::Arc;
use std::time::Duration;

use super::strip_code_fence;
use crate::config::prompt::{ self, PromptConfig };
use crate::error::Result;
use crate::llm::chat::{ complete_with_timeout, ChatClient, CompletionRequest, LlmError };
use crate::models::lesson::Segment;

/// Asks the code model for an animation script that follows the storyboard.
pub struct CodeGenerator {
    client: Arc<dyn ChatClient>,
    prompts: Arc<PromptConfig>,
    timeout: Duration,
}

impl CodeGenerator {
    pub fn new(client: Arc<dyn ChatClient>, prompts: Arc<PromptConfig>, timeout: Duration) -> Self {
        Self { client, prompts, timeout }
    }

    pub async fn generate(&self, segments: &[Segment]) -> Result<String> {
        let request = CompletionRequest::text(prompt::get_animation_prompt(&self.prompts, segments)?);

        info!("Requesting animation script from {}", self.client.get_model());
        let response = complete_with_timeout(self.client.as_ref(), &request, self.timeout).await?;

        let code = strip_code_fence(&response.response);
        if code.is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }
        info!("Animation script received ({} bytes)", code.len());
        Ok(code.to_string())
    }
}

use log::{ error, info, warn };
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig };
use crate::error::Result;
use crate::lesson::codegen::CodeGenerator;
use crate::lesson::planner::LessonPlanner;
use crate::llm::LlmConfig;
use crate::llm::chat::{ ChatClient, new_client as new_chat_client };
use crate::media::MediaConfig;
use crate::media::probe::DurationProber;
use crate::media::process::{ ProcessRunner, SystemRunner };
use crate::media::render::Renderer;
use crate::media::subtitle::{ fit_segments, SubtitleCompositor };
use crate::models::chat::ChatReply;
use crate::models::lesson::{ LessonPlan, RenderResult };

/// Appended to the explanation when no video could be produced.
pub const APOLOGY_SUFFIX: &str = "\n\n(Sorry, I was unable to generate the animation for this.)";

/// Everything the orchestrator needs, built once at startup and shared
/// read-only by all requests.
pub struct TutorAgent {
    planner: LessonPlanner,
    codegen: CodeGenerator,
    renderer: Renderer,
    prober: DurationProber,
    compositor: SubtitleCompositor,
    media: Arc<MediaConfig>,
    enable_subtitles: bool,
}

impl TutorAgent {
    fn initialize_llm_clients(
        args: &Args
    ) -> std::result::Result<(Arc<dyn ChatClient>, Arc<dyn ChatClient>), Box<dyn Error + Send + Sync>> {
        let timeout = Duration::from_secs(args.llm_timeout_secs);
        let plan_config = LlmConfig {
            api_key: Some(args.chat_api_key.clone()),
            completion_model: Some(args.chat_model.clone()),
            base_url: args.chat_base_url.clone(),
            timeout,
        };
        let plan_client = new_chat_client(&plan_config)?;
        info!(
            "Lesson plan client configured: Model={}, BaseURL={}",
            plan_client.get_model(),
            plan_client.get_base_url().as_deref().unwrap_or("adapter default")
        );

        let code_config = LlmConfig {
            completion_model: Some(args.code_model().to_string()),
            ..plan_config
        };
        let code_client = new_chat_client(&code_config)?;
        info!(
            "Animation code client configured: Model={}, BaseURL={}",
            code_client.get_model(),
            code_client.get_base_url().as_deref().unwrap_or("adapter default")
        );

        Ok((plan_client, code_client))
    }

    pub fn new(args: &Args) -> std::result::Result<Self, Box<dyn Error + Send + Sync>> {
        let (plan_client, code_client) = Self::initialize_llm_clients(args)?;
        let prompts = prompt::load_or_default(args.prompts_path.as_deref())?;
        let media = Arc::new(MediaConfig::from_args(args)?);
        info!(
            "Media toolchain: render={} probe={} mux={} quality={:?}, media dir {}",
            media.render_bin,
            media.probe_bin,
            media.mux_bin,
            media.quality,
            media.media_dir.display()
        );

        Ok(
            Self::from_parts(
                plan_client,
                code_client,
                prompts,
                Arc::new(SystemRunner),
                media,
                Duration::from_secs(args.llm_timeout_secs),
                args.enable_subtitles
            )
        )
    }

    /// Wires the components from already-built dependencies.
    pub fn from_parts(
        plan_client: Arc<dyn ChatClient>,
        code_client: Arc<dyn ChatClient>,
        prompts: Arc<PromptConfig>,
        runner: Arc<dyn ProcessRunner>,
        media: Arc<MediaConfig>,
        llm_timeout: Duration,
        enable_subtitles: bool
    ) -> Self {
        Self {
            planner: LessonPlanner::new(plan_client, Arc::clone(&prompts), llm_timeout),
            codegen: CodeGenerator::new(code_client, prompts, llm_timeout),
            renderer: Renderer::new(Arc::clone(&runner), Arc::clone(&media)),
            prober: DurationProber::new(Arc::clone(&runner), Arc::clone(&media)),
            compositor: SubtitleCompositor::new(runner, Arc::clone(&media)),
            media,
            enable_subtitles,
        }
    }

    /// Directory served under `/videos`.
    pub fn videos_dir(&self) -> PathBuf {
        self.media.videos_dir()
    }

    /// Runs one request. Only lesson planning can fail the request; a
    /// failure anywhere in video production degrades to a text-only reply.
    pub async fn process_message(&self, message: &str) -> Result<ChatReply> {
        info!("Received question ({} chars)", message.chars().count());
        let plan = self.planner.plan(message).await.map_err(|e| {
            error!("Lesson planning failed: {}", e);
            e
        })?;

        match self.produce_video(&plan).await {
            Ok(video) => {
                info!("✅ Responding with video {}", video.video_url);
                Ok(ChatReply {
                    reply: plan.explanation,
                    video_url: Some(video.video_url),
                })
            }
            Err(e) => {
                error!("Video generation failed, replying with text only: {}", e);
                Ok(ChatReply {
                    reply: format!("{}{}", plan.explanation, APOLOGY_SUFFIX),
                    video_url: None,
                })
            }
        }
    }

    async fn produce_video(&self, plan: &LessonPlan) -> Result<RenderResult> {
        let code = self.codegen.generate(&plan.segments).await?;
        let rendered = self.renderer.render(&code).await?;

        if !self.enable_subtitles {
            info!("Subtitles disabled, returning raw render");
            return Ok(rendered);
        }

        let duration = self.prober.probe(&rendered.video_path).await?;
        let fitted = fit_segments(&plan.segments, duration);
        if fitted.is_empty() {
            warn!(
                "No narration fits within the {:.2}s video, skipping subtitles",
                duration
            );
            return Ok(rendered);
        }
        if fitted.len() < plan.segments.len() {
            warn!(
                "Dropped {} segment(s) starting past the {:.2}s video",
                plan.segments.len() - fitted.len(),
                duration
            );
        }

        self.compositor.burn(&rendered, &fitted).await
    }
}


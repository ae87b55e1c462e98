use log::{ error, info, warn };
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use uuid::Uuid;

use super::process::{ Invocation, ProcessRunner };
use super::{ MediaConfig, VIDEOS_URL_PREFIX };
use crate::error::{ Result, TutorError };
use crate::models::lesson::{ RenderJob, RenderResult };

pub const SCRIPT_PREAMBLE: &str = "from manim import *";

static SCENE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"class\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(\s*(?:[A-Za-z_][A-Za-z0-9_]*\.)?[A-Za-z0-9_]*Scene\s*\)\s*:"
    ).unwrap()
});

/// Known-deprecated calls and their current replacements.
static CORRECTIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(?i)axes\.get_tangent_line\(\s*([a-zA-Z0-9_]+)\s*,.+?\)").unwrap(),
            "axes.get_derivative_graph(${1})",
        ),
        (Regex::new(r"Animate\((.*?)\)").unwrap(), "${1}.animate"),
        (Regex::new(r"ShowCreation").unwrap(), "Create")
    ]
});

/// Constructs that reach outside the animation sandbox.
static DENIED_CONSTRUCTS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(
                r"(?m)^\s*(?:import|from)\s+(?:os|sys|subprocess|socket|shutil|pathlib|requests|urllib|http|ctypes|multiprocessing)\b"
            ).unwrap(),
            "imports a system module",
        ),
        (Regex::new(r"__import__|\bimportlib\b").unwrap(), "uses dynamic imports"),
        (Regex::new(r"\b(?:eval|exec|compile)\s*\(").unwrap(), "evaluates dynamic code"),
        (Regex::new(r"\bopen\s*\(").unwrap(), "opens files")
    ]
});

/// First Scene subclass declared in the script.
pub fn find_scene_name(code: &str) -> Option<String> {
    SCENE_PATTERN.captures(code).map(|caps| caps[1].to_string())
}

pub fn check_script_policy(code: &str) -> Result<()> {
    for (pattern, reason) in DENIED_CONSTRUCTS.iter() {
        if let Some(found) = pattern.find(code) {
            return Err(TutorError::ScriptRejected {
                reason: format!("script {} (`{}`)", reason, found.as_str().trim()),
            });
        }
    }
    Ok(())
}

pub fn apply_corrections(code: &str) -> String {
    let mut corrected = code.to_string();
    for (pattern, replacement) in CORRECTIONS.iter() {
        corrected = pattern.replace_all(&corrected, *replacement).into_owned();
    }
    if !corrected.trim_start().starts_with(SCRIPT_PREAMBLE) {
        corrected = format!("{}\n\n{}", SCRIPT_PREAMBLE, corrected);
    }
    corrected
}

/// A script that passed scene detection, policy and auto-correction.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedScript {
    pub scene_name: String,
    pub source: String,
}

pub fn prepare_script(code: &str) -> Result<PreparedScript> {
    let scene_name = find_scene_name(code).ok_or(TutorError::NoSceneFound)?;
    check_script_policy(code)?;
    Ok(PreparedScript {
        scene_name,
        source: apply_corrections(code),
    })
}

pub struct Renderer {
    runner: Arc<dyn ProcessRunner>,
    config: Arc<MediaConfig>,
}

impl Renderer {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: Arc<MediaConfig>) -> Self {
        Self { runner, config }
    }

    pub fn plan_job(&self, scene_name: &str) -> RenderJob {
        let job_id = Uuid::new_v4().simple().to_string();
        RenderJob {
            source_path: self.config.scripts_dir.join(format!("{}.py", job_id)),
            output_base_name: format!("{}_{}", scene_name, job_id),
            scene_name: scene_name.to_string(),
            media_dir: self.config.media_dir.clone(),
            job_id,
        }
    }

    /// Where the renderer writes a job's video, relative to `<media_dir>/videos`.
    fn relative_output(&self, job: &RenderJob) -> String {
        format!(
            "{}/{}/{}.mp4",
            job.job_id,
            self.config.quality.tag(),
            job.output_base_name
        )
    }

    pub fn expected_result(&self, job: &RenderJob) -> RenderResult {
        let relative = self.relative_output(job);
        RenderResult {
            video_url: format!("{}/{}", VIDEOS_URL_PREFIX, relative),
            video_path: job.media_dir.join("videos").join(&relative),
        }
    }

    fn invocation(&self, job: &RenderJob) -> Invocation {
        Invocation::new(&self.config.render_bin, self.config.render_timeout)
            .arg(self.config.quality.flag())
            .arg(&job.source_path)
            .arg(&job.scene_name)
            .arg("--media_dir")
            .arg(&job.media_dir)
            .arg("-o")
            .arg(&job.output_base_name)
            .current_dir(&self.config.scripts_dir)
    }

    pub async fn render(&self, code: &str) -> Result<RenderResult> {
        let script = prepare_script(code)?;
        let job = self.plan_job(&script.scene_name);

        tokio::fs::create_dir_all(&self.config.scripts_dir).await?;
        // Removed when dropped, on every exit path below.
        let script_path = tempfile::Builder
            ::new()
            .prefix(&job.job_id)
            .suffix(".py")
            .rand_bytes(0)
            .tempfile_in(&self.config.scripts_dir)?
            .into_temp_path();
        tokio::fs::write(&script_path, script.source.as_bytes()).await?;

        info!(
            "Rendering scene {} (job {}) with {}",
            job.scene_name,
            job.job_id,
            self.config.render_bin
        );
        let output = self.runner
            .run(&self.invocation(&job)).await
            .map_err(TutorError::render_from_process)?;

        if let Err(e) = script_path.close() {
            warn!("Failed to remove render script for job {}: {}", job.job_id, e);
        }

        if !output.success() {
            error!("Render of job {} failed: {}", job.job_id, output.diagnostics());
            return Err(TutorError::RenderFailed { stderr: output.diagnostics() });
        }

        let result = self.expected_result(&job);
        info!("Render complete. Video URL: {}", result.video_url);
        Ok(result)
    }
}

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{ Request, StatusCode };
use axum::Router;
use math_tutor::agent::TutorAgent;
use math_tutor::config::prompt::PromptConfig;
use math_tutor::llm::chat::{ ChatClient, CompletionRequest, CompletionResponse, LlmError };
use math_tutor::media::process::{ Invocation, ProcessError, ProcessOutput, ProcessRunner };
use math_tutor::media::MediaConfig;
use math_tutor::server::api;
use serde_json::Value as JsonValue;
use std::path::{ Path, PathBuf };
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::{ Arc, Mutex };
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub const EXPLANATION: &str =
    "In a right triangle the square of the hypotenuse equals the sum of the squares of the other two sides.";

pub fn two_segment_plan() -> String {
    serde_json::json!({
        "explanation": EXPLANATION,
        "segments": [
            {
                "start_time": 0.0,
                "end_time": 5.0,
                "text": "Here is a right triangle with legs a and b.",
                "visual_description": "Draw a right triangle and label its sides"
            },
            {
                "start_time": 5.0,
                "end_time": 12.0,
                "text": "The squares on the legs add up to the square on the hypotenuse.",
                "visual_description": "Grow squares on each side"
            }
        ]
    }).to_string()
}

pub const SCENE_SCRIPT: &str =
    "from manim import *\n\nclass Pythagoras(Scene):\n    def construct(self):\n        self.play(ShowCreation(Polygon(ORIGIN, RIGHT, UP)))\n        self.wait(1)\n";

/// Answers every completion with the same canned text, or fails.
pub struct ScriptedClient {
    answer: Option<String>,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn answering(answer: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(answer.into()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        match &self.answer {
            Some(answer) => Ok(CompletionResponse { response: answer.clone() }),
            None =>
                Err(LlmError::Status {
                    status: 503,
                    body: "upstream unavailable".into(),
                }),
        }
    }

    fn get_model(&self) -> String {
        "scripted".into()
    }

    fn get_base_url(&self) -> Option<String> {
        None
    }
}

/// What one fake tool invocation saw.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub invocation: Invocation,
    /// Script text for renders, subtitle text for muxes.
    pub input_file: Option<String>,
}

/// Stands in for the render, probe and mux executables. Creates the files
/// the real tools would produce.
pub struct FakeToolchain {
    pub render_exit: i32,
    pub probe_stdout: String,
    pub mux_exit: i32,
    pub recorded: Mutex<Vec<Recorded>>,
}

impl FakeToolchain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            render_exit: 0,
            probe_stdout: "12.000000\n".into(),
            mux_exit: 0,
            recorded: Mutex::new(Vec::new()),
        })
    }

    pub fn with_render_exit(code: i32) -> Arc<Self> {
        Arc::new(Self {
            render_exit: code,
            probe_stdout: "12.000000\n".into(),
            mux_exit: 0,
            recorded: Mutex::new(Vec::new()),
        })
    }

    pub fn with_mux_exit(code: i32) -> Arc<Self> {
        Arc::new(Self {
            render_exit: 0,
            probe_stdout: "12.000000\n".into(),
            mux_exit: code,
            recorded: Mutex::new(Vec::new()),
        })
    }

    pub fn with_probe_stdout(stdout: &str) -> Arc<Self> {
        Arc::new(Self {
            render_exit: 0,
            probe_stdout: stdout.into(),
            mux_exit: 0,
            recorded: Mutex::new(Vec::new()),
        })
    }

    pub fn programs(&self) -> Vec<String> {
        self.recorded
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.invocation.program.clone())
            .collect()
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    fn exit(code: i32, stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            status_code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    fn render(&self, invocation: &Invocation) -> (ProcessOutput, Option<String>) {
        // [quality, script, scene, --media_dir, media, -o, base]
        let args = &invocation.args;
        let script = PathBuf::from(&args[1]);
        let source = std::fs::read_to_string(&script).ok();
        if self.render_exit != 0 {
            return (Self::exit(self.render_exit, "", "Traceback: NameError: Polygn"), source);
        }
        let job_id = script.file_stem().unwrap().to_string_lossy().into_owned();
        let base = args[6].to_string_lossy().into_owned();
        let video = Path::new(&args[4])
            .join("videos")
            .join(&job_id)
            .join("480p15")
            .join(format!("{}.mp4", base));
        std::fs::create_dir_all(video.parent().unwrap()).unwrap();
        std::fs::write(&video, b"rendered").unwrap();
        (Self::exit(0, "", "Rendering..."), source)
    }

    fn mux(&self, invocation: &Invocation) -> (ProcessOutput, Option<String>) {
        // [-y, -i, video, -vf, subtitles='...', -c:a, copy, output]
        let args = &invocation.args;
        let output = PathBuf::from(&args[7]);
        let srt = std::fs::read_dir(output.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .find(|p| p.extension().map_or(false, |x| x == "srt"))
            .and_then(|p| std::fs::read_to_string(p).ok());
        if self.mux_exit != 0 {
            return (Self::exit(self.mux_exit, "", "Invalid data found"), srt);
        }
        std::fs::write(&output, b"subtitled").unwrap();
        (Self::exit(0, "", ""), srt)
    }
}

#[async_trait]
impl ProcessRunner for FakeToolchain {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError> {
        let (output, input_file) = match invocation.program.as_str() {
            "manim" => self.render(invocation),
            "ffprobe" => (Self::exit(0, &self.probe_stdout, ""), None),
            "ffmpeg" => self.mux(invocation),
            other => {
                return Err(ProcessError::Spawn {
                    program: other.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
                });
            }
        };
        self.recorded.lock().unwrap().push(Recorded {
            invocation: invocation.clone(),
            input_file,
        });
        Ok(output)
    }
}

/// A router over a throwaway media tree.
pub struct Harness {
    pub app: Router,
    pub toolchain: Arc<FakeToolchain>,
    pub plan_client: Arc<ScriptedClient>,
    pub code_client: Arc<ScriptedClient>,
    pub media: Arc<MediaConfig>,
    _root: TempDir,
}

pub struct HarnessBuilder {
    plan_client: Arc<ScriptedClient>,
    code_client: Arc<ScriptedClient>,
    toolchain: Arc<FakeToolchain>,
    subtitles: bool,
    rate_limit: u32,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            plan_client: ScriptedClient::answering(two_segment_plan()),
            code_client: ScriptedClient::answering(SCENE_SCRIPT),
            toolchain: FakeToolchain::new(),
            subtitles: true,
            rate_limit: 0,
        }
    }

    pub fn plan(mut self, client: Arc<ScriptedClient>) -> Self {
        self.plan_client = client;
        self
    }

    pub fn code(mut self, client: Arc<ScriptedClient>) -> Self {
        self.code_client = client;
        self
    }

    pub fn toolchain(mut self, toolchain: Arc<FakeToolchain>) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn subtitles(mut self, enabled: bool) -> Self {
        self.subtitles = enabled;
        self
    }

    pub fn rate_limit(mut self, per_second: u32) -> Self {
        self.rate_limit = per_second;
        self
    }

    pub fn build(self) -> Harness {
        let root = tempfile::tempdir().unwrap();
        let media = Arc::new(
            MediaConfig::new(root.path().join("public"), root.path().join("scripts")).unwrap()
        );
        std::fs::create_dir_all(media.videos_dir()).unwrap();

        let agent = TutorAgent::from_parts(
            self.plan_client.clone(),
            self.code_client.clone(),
            Arc::new(PromptConfig::default()),
            self.toolchain.clone(),
            Arc::clone(&media),
            Duration::from_secs(5),
            self.subtitles
        );
        let videos_dir = agent.videos_dir();
        let app = api::router(Arc::new(agent), videos_dir, self.rate_limit);

        Harness {
            app,
            toolchain: self.toolchain,
            plan_client: self.plan_client,
            code_client: self.code_client,
            media,
            _root: root,
        }
    }
}

impl Harness {
    pub async fn post_chat(&self, body: JsonValue) -> (StatusCode, JsonValue) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    /// Subtitle files anywhere under the served videos tree.
    pub fn leftover_subtitles(&self) -> Vec<PathBuf> {
        fn walk(dir: &Path, found: &mut Vec<PathBuf>) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return;
            };
            for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
                if path.is_dir() {
                    walk(&path, found);
                } else if path.extension().map_or(false, |x| x == "srt") {
                    found.push(path);
                }
            }
        }
        let mut found = Vec::new();
        walk(&self.media.videos_dir(), &mut found);
        found
    }

    /// Files left in the scripts directory.
    pub fn leftover_scripts(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.media.scripts_dir) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

use clap::{ Parser, ValueEnum };

/// Output quality preset of the render executable.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderQuality {
    Low,
    Medium,
    High,
    Production,
    Fourk,
}

impl RenderQuality {
    pub fn flag(&self) -> &'static str {
        match self {
            RenderQuality::Low => "-ql",
            RenderQuality::Medium => "-qm",
            RenderQuality::High => "-qh",
            RenderQuality::Production => "-qp",
            RenderQuality::Fourk => "-qk",
        }
    }

    /// Directory name the renderer writes this quality into.
    pub fn tag(&self) -> &'static str {
        match self {
            RenderQuality::Low => "480p15",
            RenderQuality::Medium => "720p30",
            RenderQuality::High => "1080p60",
            RenderQuality::Production => "1440p60",
            RenderQuality::Fourk => "2160p60",
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Language Model Args ---
    /// API key for the OpenAI-compatible language model API.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub chat_api_key: String,

    /// Base URL of the language model API (e.g., https://api.openai.com)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, the client falls back to api.openai.com
    pub chat_base_url: Option<String>,

    /// Model used to produce the explanation and narration segments.
    #[arg(long, env = "CHAT_MODEL", default_value = "gpt-4o")]
    pub chat_model: String,

    /// Model used to write the animation script. Defaults to CHAT_MODEL if not set.
    #[arg(long, env = "CODE_MODEL")]
    pub code_model: Option<String>,

    /// Timeout in seconds for a single language model call.
    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value = "120")]
    pub llm_timeout_secs: u64,

    /// Optional JSON file overriding the built-in prompt templates.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    // --- Media Toolchain Args ---
    /// Directory the renderer writes into; its `videos/` subtree is served under /videos.
    #[arg(long, env = "MEDIA_DIR", default_value = "public")]
    pub media_dir: String,

    /// Directory for per-request animation scripts.
    #[arg(long, env = "SCRIPTS_DIR", default_value = "scripts")]
    pub scripts_dir: String,

    /// Animation render executable.
    #[arg(long, env = "MANIM_BIN", default_value = "manim")]
    pub render_bin: String,

    /// Media probe executable.
    #[arg(long, env = "FFPROBE_BIN", default_value = "ffprobe")]
    pub probe_bin: String,

    /// Media muxing executable.
    #[arg(long, env = "FFMPEG_BIN", default_value = "ffmpeg")]
    pub mux_bin: String,

    /// Render quality preset.
    #[arg(long, env = "RENDER_QUALITY", value_enum, default_value = "low")]
    pub render_quality: RenderQuality,

    #[arg(long, env = "RENDER_TIMEOUT_SECS", default_value = "300")]
    pub render_timeout_secs: u64,

    #[arg(long, env = "PROBE_TIMEOUT_SECS", default_value = "30")]
    pub probe_timeout_secs: u64,

    #[arg(long, env = "MUX_TIMEOUT_SECS", default_value = "300")]
    pub mux_timeout_secs: u64,

    /// Burn narration subtitles into rendered videos.
    #[arg(long, env = "ENABLE_SUBTITLES", default_value = "true", action = clap::ArgAction::Set)]
    pub enable_subtitles: bool,

    // --- Server Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3001")]
    pub server_addr: String,

    /// Accepted /api/chat requests per second across all clients.
    #[arg(long, env = "CHAT_RATE_LIMIT", default_value = "2")]
    pub chat_rate_limit: u32,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    pub fn code_model(&self) -> &str {
        match &self.code_model {
            Some(m) if !m.trim().is_empty() => m.as_str(),
            _ => &self.chat_model,
        }
    }
}

pub mod probe;
pub mod process;
pub mod render;
pub mod subtitle;

use std::path::{ Path, PathBuf };
use std::time::Duration;

use crate::cli::{ Args, RenderQuality };

/// URL prefix under which `<media_dir>/videos` is served.
pub const VIDEOS_URL_PREFIX: &str = "/videos";

/// Filesystem layout, executables and deadlines shared by the media steps.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub media_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub render_bin: String,
    pub probe_bin: String,
    pub mux_bin: String,
    pub quality: RenderQuality,
    pub render_timeout: Duration,
    pub probe_timeout: Duration,
    pub mux_timeout: Duration,
}

fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

impl MediaConfig {
    /// Directories are made absolute because the renderer runs with the
    /// scripts directory as its working directory.
    pub fn new(media_dir: impl AsRef<Path>, scripts_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self {
            media_dir: absolutize(media_dir.as_ref())?,
            scripts_dir: absolutize(scripts_dir.as_ref())?,
            render_bin: "manim".to_string(),
            probe_bin: "ffprobe".to_string(),
            mux_bin: "ffmpeg".to_string(),
            quality: RenderQuality::Low,
            render_timeout: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(30),
            mux_timeout: Duration::from_secs(300),
        })
    }

    pub fn from_args(args: &Args) -> std::io::Result<Self> {
        let mut config = Self::new(&args.media_dir, &args.scripts_dir)?;
        config.render_bin = args.render_bin.clone();
        config.probe_bin = args.probe_bin.clone();
        config.mux_bin = args.mux_bin.clone();
        config.quality = args.render_quality;
        config.render_timeout = Duration::from_secs(args.render_timeout_secs);
        config.probe_timeout = Duration::from_secs(args.probe_timeout_secs);
        config.mux_timeout = Duration::from_secs(args.mux_timeout_secs);
        Ok(config)
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.media_dir.join("videos")
    }
}

use log::{ error, info, warn };
use std::path::{ Path, PathBuf, MAIN_SEPARATOR };
use std::sync::Arc;
use thiserror::Error;

use super::process::{ Invocation, ProcessRunner };
use super::MediaConfig;
use crate::error::{ Result, TutorError };
use crate::models::lesson::{ RenderResult, Segment };

const SUBTITLED_SUFFIX: &str = "_subtitled";

#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEntry {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Error, Debug, PartialEq)]
pub enum SrtParseError {
    #[error("block {block}: invalid sequence number '{line}'")]
    BadIndex { block: usize, line: String },

    #[error("block {block}: invalid timing line '{line}'")]
    BadTiming { block: usize, line: String },

    #[error("block {block}: missing timing line")]
    MissingTiming { block: usize },
}

/// `HH:MM:SS,mmm`, rounded to the nearest millisecond.
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_sec = total_ms / 1000;
    let s = total_sec % 60;
    let total_min = total_sec / 60;
    let m = total_min % 60;
    let h = total_min / 60;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

pub fn parse_timestamp(stamp: &str) -> Option<f64> {
    let (hms, ms) = stamp.trim().split_once(',')?;
    let mut parts = hms.split(':');
    let h: u64 = parts.next()?.parse().ok()?;
    let m: u64 = parts.next()?.parse().ok()?;
    let s: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || ms.len() != 3 || m >= 60 || s >= 60 {
        return None;
    }
    let ms: u64 = ms.parse().ok()?;
    Some(((h * 3600 + m * 60 + s) * 1000 + ms) as f64 / 1000.0)
}

/// Blank lines would terminate an SRT block, so they are dropped.
fn caption_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn entries_from_segments(segments: &[Segment]) -> Vec<SubtitleEntry> {
    segments
        .iter()
        .enumerate()
        .map(|(i, seg)| SubtitleEntry {
            index: i + 1,
            start: seg.start_time,
            end: seg.end_time,
            text: caption_text(&seg.text),
        })
        .collect()
}

/// Serializes one block per segment. Caption lines are normalized on the
/// way out: each is trimmed and blank ones are dropped, so parsing the
/// result gives back the trimmed text rather than the raw narration.
pub fn to_srt(segments: &[Segment]) -> String {
    entries_from_segments(segments)
        .iter()
        .map(|entry| {
            format!(
                "{}\n{} --> {}\n{}\n\n",
                entry.index,
                format_timestamp(entry.start),
                format_timestamp(entry.end),
                entry.text
            )
        })
        .collect()
}

pub fn parse_srt(input: &str) -> std::result::Result<Vec<SubtitleEntry>, SrtParseError> {
    let normalized = input.replace("\r\n", "\n");
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in normalized.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
        .into_iter()
        .enumerate()
        .map(|(i, lines)| {
            let block = i + 1;
            let index = lines[0].trim().parse::<usize>().map_err(|_| SrtParseError::BadIndex {
                block,
                line: lines[0].to_string(),
            })?;
            let timing = lines.get(1).ok_or(SrtParseError::MissingTiming { block })?;
            let bad_timing = || SrtParseError::BadTiming { block, line: timing.to_string() };
            let (start, end) = timing.split_once("-->").ok_or_else(bad_timing)?;
            let start = parse_timestamp(start).ok_or_else(bad_timing)?;
            let end = parse_timestamp(end).ok_or_else(bad_timing)?;
            Ok(SubtitleEntry {
                index,
                start,
                end,
                text: lines[2..].join("\n"),
            })
        })
        .collect()
}

/// Fits narration to the probed video length: segments that start at or
/// past the end are dropped, the rest are clamped to it.
pub fn fit_segments(segments: &[Segment], duration: f64) -> Vec<Segment> {
    segments
        .iter()
        .filter(|seg| seg.start_time < duration)
        .map(|seg| Segment {
            end_time: seg.end_time.min(duration),
            ..seg.clone()
        })
        .collect()
}

fn escape_filter_path_with(raw: &str, separator: char) -> String {
    let normalized = if separator == '\\' { raw.replace('\\', "/") } else { raw.to_string() };
    normalized.replace('\\', "\\\\").replace(':', "\\:").replace('\'', "\\'")
}

/// Escapes a path for use inside an ffmpeg filter argument.
pub fn escape_filter_path(path: &Path) -> String {
    escape_filter_path_with(&path.to_string_lossy(), MAIN_SEPARATOR)
}

pub fn subtitled_path(video_path: &Path) -> PathBuf {
    let stem = video_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    video_path.with_file_name(format!("{}{}.mp4", stem, SUBTITLED_SUFFIX))
}

pub fn subtitled_url(video_url: &str) -> String {
    match video_url.strip_suffix(".mp4") {
        Some(base) => format!("{}{}.mp4", base, SUBTITLED_SUFFIX),
        None => format!("{}{}", video_url, SUBTITLED_SUFFIX),
    }
}

pub struct SubtitleCompositor {
    runner: Arc<dyn ProcessRunner>,
    config: Arc<MediaConfig>,
}

impl SubtitleCompositor {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: Arc<MediaConfig>) -> Self {
        Self { runner, config }
    }

    fn invocation(&self, video: &Path, subtitles: &Path, output: &Path) -> Invocation {
        Invocation::new(&self.config.mux_bin, self.config.mux_timeout)
            .arg("-y")
            .arg("-i")
            .arg(video)
            .arg("-vf")
            .arg(format!("subtitles='{}'", escape_filter_path(subtitles)))
            .arg("-c:a")
            .arg("copy")
            .arg(output)
    }

    /// Burns the segments into the rendered video and returns the new video.
    pub async fn burn(&self, rendered: &RenderResult, segments: &[Segment]) -> Result<RenderResult> {
        let dir = rendered.video_path.parent().unwrap_or(Path::new("."));
        // Removed on drop whether or not muxing succeeds.
        let srt_path = tempfile::Builder
            ::new()
            .prefix("subs_")
            .suffix(".srt")
            .tempfile_in(dir)?
            .into_temp_path();
        tokio::fs::write(&srt_path, to_srt(segments)).await?;

        let output_path = subtitled_path(&rendered.video_path);
        let result = self.runner.run(&self.invocation(&rendered.video_path, &srt_path, &output_path)).await;

        if let Err(e) = srt_path.close() {
            warn!("Failed to remove subtitle file: {}", e);
        }

        let output = result.map_err(TutorError::mux_from_process)?;
        if !output.success() {
            error!("Subtitle muxing failed for {}: {}", rendered.video_path.display(), output.diagnostics());
            return Err(TutorError::SubtitleMux { stderr: output.diagnostics() });
        }

        let subtitled = RenderResult {
            video_url: subtitled_url(&rendered.video_url),
            video_path: output_path,
        };
        info!("Subtitles burned. Video URL: {}", subtitled.video_url);
        Ok(subtitled)
    }
}

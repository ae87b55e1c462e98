use log::info;
use std::path::Path;
use std::sync::Arc;

use super::process::{ Invocation, ProcessRunner };
use super::MediaConfig;
use crate::error::{ Result, TutorError };

/// Parses the single duration value the probe prints.
pub fn parse_duration(stdout: &str) -> Result<f64> {
    let value = stdout.trim();
    let is_decimal =
        !value.is_empty() &&
        value.chars().all(|c| c.is_ascii_digit() || c == '.') &&
        value.chars().filter(|c| *c == '.').count() <= 1 &&
        value.chars().any(|c| c.is_ascii_digit());
    if !is_decimal {
        return Err(TutorError::Probe {
            reason: format!("probe output is not a decimal duration: '{}'", value),
        });
    }
    value.parse::<f64>().map_err(|e| TutorError::Probe {
        reason: format!("Unable to parse duration '{}': {}", value, e),
    })
}

pub struct DurationProber {
    runner: Arc<dyn ProcessRunner>,
    config: Arc<MediaConfig>,
}

impl DurationProber {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: Arc<MediaConfig>) -> Self {
        Self { runner, config }
    }

    fn invocation(&self, video_path: &Path) -> Invocation {
        Invocation::new(&self.config.probe_bin, self.config.probe_timeout)
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(video_path)
    }

    pub async fn probe(&self, video_path: &Path) -> Result<f64> {
        let output = self.runner
            .run(&self.invocation(video_path)).await
            .map_err(TutorError::probe_from_process)?;

        if !output.success() {
            return Err(TutorError::Probe {
                reason: format!(
                    "{} failed while probing {}: {}",
                    self.config.probe_bin,
                    video_path.display(),
                    output.diagnostics()
                ),
            });
        }

        let duration = parse_duration(&output.stdout)?;
        info!("Probed {}: {:.3}s", video_path.display(), duration);
        Ok(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_decimals() {
        assert_eq!(parse_duration("12.000000\n").unwrap(), 12.0);
        assert_eq!(parse_duration("7").unwrap(), 7.0);
        assert_eq!(parse_duration(" 0.5 ").unwrap(), 0.5);
    }

    #[test]
    fn rejects_non_numeric_output() {
        for bad in ["", "N/A", "-3.0", "1e3", "nan", "inf", "1.2.3", ".", "12s"] {
            assert!(
                matches!(parse_duration(bad), Err(TutorError::Probe { .. })),
                "accepted {:?}",
                bad
            );
        }
    }
}

use async_trait::async_trait;
use log::debug;
use std::ffi::{ OsStr, OsString };
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{ AsyncBufReadExt, AsyncReadExt, BufReader };
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {after:?}")]
    TimedOut { program: String, after: Duration },
}

/// A fully described external command, built before anything is spawned.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<OsString>,
    pub current_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    /// Exit status plus accumulated stderr, for error reporting.
    pub fn diagnostics(&self) -> String {
        let status = match self.status_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        format!("{}: {}", status, self.stderr.trim_end())
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError>;
}

/// Spawns real processes with tokio. The child is killed if the deadline
/// passes or the request future is dropped.
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError> {
        let program = invocation.program.clone();
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        debug!("Spawning {} {:?}", program, invocation.args);
        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let log_name = program.clone();

        let collect = async move {
            let read_stdout = async move {
                let mut buf = Vec::new();
                if let Some(mut out) = stdout {
                    out.read_to_end(&mut buf).await?;
                }
                Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf).into_owned())
            };
            let read_stderr = async move {
                let mut acc = String::new();
                if let Some(err) = stderr {
                    let mut reader = BufReader::new(err);
                    let mut line = Vec::new();
                    while reader.read_until(b'\n', &mut line).await? > 0 {
                        let text = String::from_utf8_lossy(&line);
                        debug!("{} stderr: {}", log_name, text.trim_end());
                        acc.push_str(&text);
                        line.clear();
                    }
                }
                Ok::<_, std::io::Error>(acc)
            };

            let (stdout, stderr) = tokio::try_join!(read_stdout, read_stderr)?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>(ProcessOutput {
                status_code: status.code(),
                stdout,
                stderr,
            })
        };

        match tokio::time::timeout(invocation.timeout, collect).await {
            Ok(result) => result.map_err(|source| ProcessError::Io { program, source }),
            Err(_) => Err(ProcessError::TimedOut { program, after: invocation.timeout }),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_exit_code_stdout_and_stderr() {
        let inv = Invocation::new("sh", Duration::from_secs(10))
            .arg("-c")
            .arg("echo 12.5; echo oops >&2; exit 3");
        let out = SystemRunner.run(&inv).await.unwrap();
        assert_eq!(out.status_code, Some(3));
        assert!(!out.success());
        assert_eq!(out.stdout.trim(), "12.5");
        assert_eq!(out.stderr.trim(), "oops");
        assert_eq!(out.diagnostics(), "exit code 3: oops");
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let inv = Invocation::new("definitely-not-a-real-binary-4f1c", Duration::from_secs(1));
        let err = SystemRunner.run(&inv).await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn deadline_kills_hung_process() {
        let inv = Invocation::new("sleep", Duration::from_millis(100)).arg("30");
        let started = std::time::Instant::now();
        let err = SystemRunner.run(&inv).await.unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn runs_in_requested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let inv = Invocation::new("pwd", Duration::from_secs(5)).current_dir(dir.path());
        let out = SystemRunner.run(&inv).await.unwrap();
        let reported = std::fs::canonicalize(out.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }
}

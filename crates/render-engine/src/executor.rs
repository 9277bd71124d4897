//! External renderer invocation with bounded retries.

use std::fmt;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::Serialize;
use shortreel_common::config::RendererConfig;
use shortreel_common::ShortreelError;

/// Pipeline stage a command belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Transform,
    Merge,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::Merge => "merge",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One renderer invocation: a program, its argument vector, and the file it
/// is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub stage: Stage,
    pub output: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, stage: Stage) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stage,
            output: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append the output path as the final argument and remember it.
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.args.push(path.to_string_lossy().into_owned());
        self.output = Some(path);
        self
    }

    /// Shell-ish rendering for logs. Not meant to be executed.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|part| {
                if part.contains(char::is_whitespace) || part.is_empty() {
                    format!("{part:?}")
                } else {
                    part.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Why a command did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    #[error("{tool} not found")]
    ToolNotFound { tool: String },

    #[error("failed to launch {tool}: {message}")]
    Launch { tool: String, message: String },

    #[error("{tool} {stage} failed after {attempts} attempt(s) ({status})")]
    Exhausted {
        tool: String,
        stage: Stage,
        attempts: u32,
        status: String,
        stderr_tail: String,
    },
}

impl ExecError {
    /// Whether retrying elsewhere would be pointless: the renderer itself is
    /// unusable rather than failing on one input.
    pub fn is_setup(&self) -> bool {
        matches!(self, ExecError::ToolNotFound { .. } | ExecError::Launch { .. })
    }
}

impl From<ExecError> for ShortreelError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::ToolNotFound { tool } => ShortreelError::ToolNotFound { tool },
            ExecError::Launch { tool, message } => ShortreelError::ToolLaunch { tool, message },
            ExecError::Exhausted {
                tool,
                stage,
                attempts,
                status,
                stderr_tail,
            } => ShortreelError::ToolFailed {
                tool,
                stage: stage.to_string(),
                attempts,
                status,
                stderr_tail,
            },
        }
    }
}

/// Runs renderer commands. The pipeline only talks to this seam, so tests
/// can substitute a scripted implementation.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, command: &ToolCommand) -> Result<(), ExecError>;
}

/// Attempt budget and pacing for [`ProcessExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub stderr_tail_chars: usize,
}

impl RetryPolicy {
    pub fn from_config(config: &RendererConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.retry_delay_ms),
            stderr_tail_chars: config.stderr_tail_chars,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RendererConfig::default())
    }
}

/// Runs commands as child processes.
///
/// A non-zero exit is retried after a fixed delay until the attempt budget
/// is spent. A program that cannot be started fails immediately: no amount
/// of waiting makes a missing binary appear.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    policy: RetryPolicy,
}

impl ProcessExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn from_config(config: &RendererConfig) -> Self {
        Self::new(RetryPolicy::from_config(config))
    }

    fn run_once(&self, command: &ToolCommand) -> Result<Attempt, ExecError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ExecError::ToolNotFound {
                        tool: command.program.clone(),
                    }
                } else {
                    ExecError::Launch {
                        tool: command.program.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        tracing::debug!(pid = child.id(), stage = %command.stage, "Renderer process started");

        // Drain stderr on its own thread so a chatty renderer never blocks on a full pipe.
        let stderr_task = child.stderr.take().map(|stderr| {
            std::thread::spawn(move || -> String {
                let mut reader = BufReader::new(stderr);
                let mut bytes = Vec::new();
                match reader.read_to_end(&mut bytes) {
                    Ok(_) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(err) => format!("<failed to read stderr: {err}>"),
                }
            })
        });

        let status = child.wait().map_err(|e| ExecError::Launch {
            tool: command.program.clone(),
            message: format!("failed waiting for process: {e}"),
        })?;

        let stderr = stderr_task
            .and_then(|task| task.join().ok())
            .unwrap_or_default();

        Ok(Attempt {
            success: status.success(),
            status: status.to_string(),
            stderr_tail: tail_chars(&stderr, self.policy.stderr_tail_chars),
        })
    }
}

struct Attempt {
    success: bool,
    status: String,
    stderr_tail: String,
}

impl CommandExecutor for ProcessExecutor {
    fn execute(&self, command: &ToolCommand) -> Result<(), ExecError> {
        tracing::debug!(command = %command.display(), "Running renderer");

        let max_attempts = self.policy.max_attempts.max(1);
        let mut last = None;

        for attempt in 1..=max_attempts {
            let outcome = self.run_once(command)?;
            if outcome.success {
                if attempt > 1 {
                    tracing::info!(stage = %command.stage, attempt, "Renderer succeeded after retry");
                }
                return Ok(());
            }

            tracing::warn!(
                stage = %command.stage,
                attempt,
                max_attempts,
                status = %outcome.status,
                stderr = %outcome.stderr_tail,
                "Renderer exited with failure"
            );
            last = Some(outcome);

            if attempt < max_attempts {
                std::thread::sleep(self.policy.delay);
            }
        }

        let (status, stderr_tail) = last
            .map(|a| (a.status, a.stderr_tail))
            .unwrap_or_default();
        Err(ExecError::Exhausted {
            tool: command.program.clone(),
            stage: command.stage,
            attempts: max_attempts,
            status,
            stderr_tail,
        })
    }
}

/// Whether `program` can be started at all.
pub fn command_exists(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Last `max` characters of `text`, on character boundaries.
pub fn tail_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(max)).collect()
}

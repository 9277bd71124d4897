//! Error types shared across Shortreel crates.

use std::path::PathBuf;

/// Top-level error type for Shortreel operations.
#[derive(Debug, thiserror::Error)]
pub enum ShortreelError {
    /// Malformed or missing strategy fields, or an unusable configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Source video or a referenced asset is absent.
    #[error("Missing input: {path}")]
    MissingInput { path: PathBuf },

    /// The renderer executable could not be found.
    #[error("Renderer not found: {tool} (is it installed and in PATH?)")]
    ToolNotFound { tool: String },

    /// The renderer exists but could not be started.
    #[error("Failed to launch {tool}: {message}")]
    ToolLaunch { tool: String, message: String },

    /// The renderer ran and kept exiting non-zero until retries ran out.
    #[error("{tool} {stage} failed after {attempts} attempt(s) ({status}): {stderr_tail}")]
    ToolFailed {
        tool: String,
        stage: String,
        attempts: u32,
        status: String,
        stderr_tail: String,
    },

    /// No clip in the batch rendered successfully.
    #[error("No clips were produced ({failed} failed)")]
    TotalBatchFailure { failed: usize },

    /// Concatenation of the rendered clips failed.
    #[error("Merge into {output} failed: {source}")]
    MergeFailed {
        output: PathBuf,
        #[source]
        source: Box<ShortreelError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ShortreelError.
pub type ShortreelResult<T> = Result<T, ShortreelError>;

impl ShortreelError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn missing_input(path: impl Into<PathBuf>) -> Self {
        Self::MissingInput { path: path.into() }
    }

    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Whether this error means the environment is not set up to render at all,
    /// as opposed to the renderer failing on a particular input.
    pub fn is_setup_error(&self) -> bool {
        matches!(self, Self::ToolNotFound { .. } | Self::ToolLaunch { .. })
    }
}

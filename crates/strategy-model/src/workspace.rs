//! Series workspace layout.
//!
//! A series keeps its files under one root:
//!
//! ```text
//! <root>/
//!   config/<Episode>-Strategy.json   strategy document
//!   downloads/<Episode>.mp4          source video (.mkv/.avi/.mov accepted)
//!   assets/avatar.png                optional avatar badge
//!   temp_clips/                      per-clip scratch files
//!   output/<Episode>-Clip.mp4        deliverable
//! ```
//!
//! Strategy files that live outside a `config/` directory are also accepted:
//! the directory holding the strategy becomes the root.

use std::path::{Path, PathBuf};

/// Suffix stripped from the strategy file stem to get the episode name.
pub const STRATEGY_SUFFIX: &str = "-Strategy";

/// Suffix appended to the episode name for the deliverable.
pub const DELIVERABLE_SUFFIX: &str = "-Clip";

/// Source video extensions, in lookup order.
pub const SOURCE_EXTENSIONS: [&str; 4] = ["mp4", "mkv", "avi", "mov"];

/// Avatar location relative to the series root.
pub const AVATAR_RELATIVE_PATH: &str = "assets/avatar.png";

/// Resolved directory layout for one strategy document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesWorkspace {
    /// Series root directory.
    pub root: PathBuf,

    /// Absolute path of the strategy document.
    pub strategy_path: PathBuf,

    /// Episode name (strategy file stem without `-Strategy`).
    pub episode: String,
}

impl SeriesWorkspace {
    /// Infer the workspace from a strategy document path.
    pub fn from_strategy_path(path: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let path = path.as_ref();
        let strategy_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| WorkspaceError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })?
                .join(path)
        };

        let stem = strategy_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| WorkspaceError::InvalidStrategyPath {
                path: strategy_path.clone(),
            })?;
        let episode = stem.strip_suffix(STRATEGY_SUFFIX).unwrap_or(stem).to_string();

        let config_dir = strategy_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| WorkspaceError::InvalidStrategyPath {
                path: strategy_path.clone(),
            })?;

        let root = infer_root(&config_dir);

        Ok(Self {
            root,
            strategy_path,
            episode,
        })
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join("downloads")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join("temp_clips")
    }

    pub fn avatar_path(&self) -> PathBuf {
        self.root.join(AVATAR_RELATIVE_PATH)
    }

    /// The avatar image, if the series has one.
    pub fn existing_avatar(&self) -> Option<PathBuf> {
        Some(self.avatar_path()).filter(|path| path.is_file())
    }

    pub fn deliverable_path(&self) -> PathBuf {
        self.output_dir()
            .join(format!("{}{DELIVERABLE_SUFFIX}.mp4", self.episode))
    }

    /// Find the source video, trying each known extension in order.
    pub fn resolve_source_video(&self) -> Result<PathBuf, WorkspaceError> {
        let downloads = self.downloads_dir();
        let tried: Vec<PathBuf> = SOURCE_EXTENSIONS
            .iter()
            .map(|ext| downloads.join(format!("{}.{ext}", self.episode)))
            .collect();

        if let Some(found) = tried.iter().find(|path| path.is_file()) {
            return Ok(found.clone());
        }

        Err(WorkspaceError::MissingSource {
            episode: self.episode.clone(),
            tried,
        })
    }
}

/// `<root>/config/x.json` when `<root>/downloads` exists; otherwise the parent
/// of a `config` directory, or the strategy's own directory.
fn infer_root(config_dir: &Path) -> PathBuf {
    let parent = config_dir.parent().map(Path::to_path_buf);

    if let Some(root) = &parent {
        if root.join("downloads").is_dir() {
            return root.clone();
        }
    }

    let named_config = config_dir.file_name().and_then(|n| n.to_str()) == Some("config");
    match parent {
        Some(root) if named_config => root,
        _ => config_dir.to_path_buf(),
    }
}

/// Errors resolving a series workspace.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Not a strategy file path: {path}")]
    InvalidStrategyPath { path: PathBuf },

    #[error("No source video for {episode:?} (tried {})", display_paths(.tried))]
    MissingSource { episode: String, tried: Vec<PathBuf> },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

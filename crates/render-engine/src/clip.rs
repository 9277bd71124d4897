//! Per-clip extraction and vertical rendering.
//!
//! Each clip moves through a small state machine:
//!
//! ```text
//! Pending ──(resumable output)──────────────────────────▶ Skipped
//!    │
//!    └──▶ Extracting ──ok──▶ Transforming ──ok──▶ Done
//!             │                    │
//!             └───────err──────────┴──────────────▶ Failed
//! ```
//!
//! A clip failing never stops the batch; the error is recorded on the
//! returned [`ProcessedClip`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shortreel_common::config::{AppConfig, ResumeConfig};
use shortreel_common::{ShortreelError, ShortreelResult};
use shortreel_layout::RenderPlan;
use shortreel_strategy::{ClipSpec, ClipStatus, ProcessedClip};

use crate::compositor::{compose_vertical, OUTPUT_PAD};
use crate::executor::{CommandExecutor, Stage, ToolCommand};

/// Suffix of the completion marker written next to a finished render.
pub const MARKER_SUFFIX: &str = "done";

/// Scratch files belonging to one clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipPaths {
    pub raw: PathBuf,
    pub vertical: PathBuf,
    pub marker: PathBuf,
}

impl ClipPaths {
    pub fn new(scratch_dir: &Path, clip: &ClipSpec) -> Self {
        let id = clip.id.as_str();
        let vertical = scratch_dir.join(format!("{id}_vertical.mp4"));
        Self {
            raw: scratch_dir.join(format!("{id}_raw.mp4")),
            marker: marker_path(&vertical),
            vertical,
        }
    }
}

/// `<output>.done`
pub fn marker_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".");
    name.push(MARKER_SUFFIX);
    PathBuf::from(name)
}

/// Contents of a completion marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMarker {
    pub clip_id: String,
    /// Size of the output when it was finished.
    pub bytes: u64,
    /// RFC 3339 timestamp.
    pub completed_at: String,
}

/// Result of checking for output from an earlier run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeDecision {
    Reuse { bytes: u64 },
    Render { reason: &'static str },
}

/// Decide whether an existing output can stand in for rendering again.
///
/// The output must exceed the size threshold. A marker, when present, must
/// record the same size; without one the size threshold alone decides unless
/// markers are required.
pub fn resume_decision(paths: &ClipPaths, rules: &ResumeConfig) -> ResumeDecision {
    let bytes = match std::fs::metadata(&paths.vertical) {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => {
            return ResumeDecision::Render {
                reason: "no previous output",
            }
        }
    };

    if bytes <= rules.min_output_bytes {
        return ResumeDecision::Render {
            reason: "previous output too small",
        };
    }

    match read_marker(&paths.marker) {
        Some(marker) if marker.bytes == bytes => ResumeDecision::Reuse { bytes },
        Some(_) => ResumeDecision::Render {
            reason: "previous output changed since it was finished",
        },
        None if rules.require_marker => ResumeDecision::Render {
            reason: "previous output has no completion marker",
        },
        None => ResumeDecision::Reuse { bytes },
    }
}

fn read_marker(path: &Path) -> Option<CompletionMarker> {
    let data = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&data) {
        Ok(marker) => Some(marker),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable completion marker");
            None
        }
    }
}

enum ClipState {
    Pending,
    Extracting,
    Transforming,
    Skipped,
    Done,
    Failed(String),
}

/// Runs the extract and transform stages for clips of one source video.
pub struct ClipProcessor<'a> {
    executor: &'a dyn CommandExecutor,
    config: &'a AppConfig,
    source_video: PathBuf,
    scratch_dir: PathBuf,
    avatar: Option<PathBuf>,
}

impl<'a> ClipProcessor<'a> {
    pub fn new(
        executor: &'a dyn CommandExecutor,
        config: &'a AppConfig,
        source_video: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
        avatar: Option<PathBuf>,
    ) -> Self {
        Self {
            executor,
            config,
            source_video: source_video.into(),
            scratch_dir: scratch_dir.into(),
            avatar,
        }
    }

    /// Process one clip to a terminal state. Never fails the caller.
    pub fn process(&self, index: usize, clip: &ClipSpec) -> ProcessedClip {
        let paths = ClipPaths::new(&self.scratch_dir, clip);
        let span = tracing::info_span!("clip", index, id = %clip.id);
        let _guard = span.enter();

        let mut state = ClipState::Pending;
        let status = loop {
            state = match state {
                ClipState::Pending => match resume_decision(&paths, &self.config.resume) {
                    ResumeDecision::Reuse { bytes } => {
                        tracing::info!(bytes, path = %paths.vertical.display(), "Reusing finished clip");
                        ClipState::Skipped
                    }
                    ResumeDecision::Render { reason } => {
                        tracing::debug!(reason, "Rendering clip");
                        ClipState::Extracting
                    }
                },
                ClipState::Extracting => match self.extract(clip, &paths) {
                    Ok(()) => ClipState::Transforming,
                    Err(e) => ClipState::Failed(format!("extract: {e}")),
                },
                ClipState::Transforming => match self.transform(clip, &paths) {
                    Ok(()) => ClipState::Done,
                    Err(e) => ClipState::Failed(format!("transform: {e}")),
                },
                ClipState::Skipped => break (ClipStatus::Skipped, None),
                ClipState::Done => break (ClipStatus::Done, None),
                ClipState::Failed(message) => break (ClipStatus::Failed, Some(message)),
            };
        };

        if let (ClipStatus::Failed, Some(message)) = &status {
            tracing::error!(error = %message, "Clip failed");
        }

        ProcessedClip {
            index,
            id: clip.id.clone(),
            path: paths.vertical,
            status: status.0,
            error: status.1,
        }
    }

    /// Frame-accurate cut of the clip's time range (re-encoded, not stream-copied).
    pub fn extract_command(&self, clip: &ClipSpec, paths: &ClipPaths) -> ToolCommand {
        let renderer = &self.config.renderer;
        ToolCommand::new(&renderer.program, Stage::Extract)
            .args(["-hide_banner", "-loglevel", "error"])
            .arg("-ss")
            .arg(clip.time_range.start.to_ffmpeg())
            .arg("-to")
            .arg(clip.time_range.end.to_ffmpeg())
            .arg("-i")
            .arg(self.source_video.to_string_lossy())
            .args(["-c:v", renderer.video_codec.as_str()])
            .args(["-c:a", renderer.audio_codec.as_str()])
            .arg("-y")
            .output(&paths.raw)
    }

    /// Vertical render of an extracted clip.
    pub fn transform_command(
        &self,
        clip: &ClipSpec,
        paths: &ClipPaths,
    ) -> ShortreelResult<ToolCommand> {
        let layout = &self.config.layout;
        let renderer = &self.config.renderer;
        let plan = RenderPlan::for_clip(clip, layout, self.avatar.is_some());
        let composition = compose_vertical(&plan, layout, self.avatar.as_deref())
            .map_err(|e| ShortreelError::config(format!("invalid filter graph: {e}")))?;
        let filter = composition
            .graph
            .render()
            .map_err(|e| ShortreelError::config(format!("invalid filter graph: {e}")))?;

        let mut command = ToolCommand::new(&renderer.program, Stage::Transform)
            .args(["-hide_banner", "-loglevel", "error"])
            .arg("-i")
            .arg(paths.raw.to_string_lossy());
        for input in &composition.extra_inputs {
            command = command.arg("-i").arg(input.to_string_lossy());
        }

        Ok(command
            .arg("-filter_complex")
            .arg(filter)
            .args(["-map".to_string(), format!("[{OUTPUT_PAD}]")])
            .args(["-map", "0:a?"])
            .args(["-c:v", renderer.video_codec.as_str()])
            .args(["-c:a", renderer.audio_codec.as_str()])
            .args(["-pix_fmt", "yuv420p"])
            .arg("-y")
            .output(&paths.vertical))
    }

    fn extract(&self, clip: &ClipSpec, paths: &ClipPaths) -> ShortreelResult<()> {
        // A stale marker must not vouch for whatever this run leaves behind.
        remove_if_present(&paths.marker)?;

        tracing::info!(
            start = %clip.time_range.start,
            end = %clip.time_range.end,
            "Extracting clip"
        );
        self.executor.execute(&self.extract_command(clip, paths))?;
        Ok(())
    }

    fn transform(&self, clip: &ClipSpec, paths: &ClipPaths) -> ShortreelResult<()> {
        tracing::info!(avatar = self.avatar.is_some(), "Rendering vertical clip");
        let command = self.transform_command(clip, paths)?;
        self.executor.execute(&command)?;

        let bytes = std::fs::metadata(&paths.vertical)
            .map(|meta| meta.len())
            .map_err(|_| ShortreelError::missing_input(&paths.vertical))?;

        let marker = CompletionMarker {
            clip_id: clip.id.to_string(),
            bytes,
            completed_at: chrono::Utc::now().to_rfc3339(),
        };
        std::fs::write(&paths.marker, serde_json::to_vec_pretty(&marker)?)?;
        tracing::info!(bytes, "Clip rendered");
        Ok(())
    }
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedExecutor;
    use shortreel_strategy::{ClipId, TimeRange, Timecode};

    fn clip(id: &str) -> ClipSpec {
        ClipSpec {
            id: ClipId::new(id),
            time_range: TimeRange {
                start: Timecode::from_millis(61_500),
                end: Timecode::from_millis(75_000),
            },
            title: "Title".to_string(),
            commentary_text: "Line".to_string(),
        }
    }

    #[test]
    fn test_paths_follow_clip_id() {
        let paths = ClipPaths::new(Path::new("/scratch"), &clip("c7"));
        assert_eq!(paths.raw, PathBuf::from("/scratch/c7_raw.mp4"));
        assert_eq!(paths.vertical, PathBuf::from("/scratch/c7_vertical.mp4"));
        assert_eq!(paths.marker, PathBuf::from("/scratch/c7_vertical.mp4.done"));
    }

    #[test]
    fn test_extract_command_is_frame_accurate() {
        let config = AppConfig::default();
        let executor = ScriptedExecutor::new();
        let processor = ClipProcessor::new(&executor, &config, "/src/ep.mp4", "/scratch", None);
        let c = clip("c1");
        let cmd = processor.extract_command(&c, &ClipPaths::new(Path::new("/scratch"), &c));

        let args = cmd.args.join(" ");
        assert!(args.contains("-ss 00:01:01.500 -to 00:01:15.000 -i /src/ep.mp4"));
        assert!(args.contains("-c:v libx264 -c:a aac"));
        assert!(!args.contains("copy"));
        assert_eq!(cmd.output, Some(PathBuf::from("/scratch/c1_raw.mp4")));
    }

    #[test]
    fn test_transform_command_maps_graph_output_and_optional_audio() {
        let config = AppConfig::default();
        let executor = ScriptedExecutor::new();
        let processor = ClipProcessor::new(
            &executor,
            &config,
            "/src/ep.mp4",
            "/scratch",
            Some(PathBuf::from("/series/assets/avatar.png")),
        );
        let c = clip("c1");
        let cmd = processor
            .transform_command(&c, &ClipPaths::new(Path::new("/scratch"), &c))
            .unwrap();

        let inputs: Vec<&String> = cmd
            .args
            .windows(2)
            .filter(|w| w[0] == "-i")
            .map(|w| &w[1])
            .collect();
        assert_eq!(inputs, vec!["/scratch/c1_raw.mp4", "/series/assets/avatar.png"]);
        let args = cmd.args.join(" ");
        assert!(args.contains("-map [outv] -map 0:a?"));
        assert_eq!(cmd.output, Some(PathBuf::from("/scratch/c1_vertical.mp4")));
    }

    #[test]
    fn test_successful_clip_writes_marker() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::default();
        let executor = ScriptedExecutor::new();
        let processor = ClipProcessor::new(&executor, &config, "/src/ep.mp4", dir.path(), None);

        let result = processor.process(0, &clip("c1"));
        assert_eq!(result.status, ClipStatus::Done);
        assert_eq!(executor.stages(), vec![Stage::Extract, Stage::Transform]);

        let marker: CompletionMarker =
            serde_json::from_slice(&std::fs::read(marker_path(&result.path)).unwrap()).unwrap();
        assert_eq!(marker.clip_id, "c1");
        assert_eq!(marker.bytes, std::fs::metadata(&result.path).unwrap().len());
    }

    #[test]
    fn test_extract_failure_skips_transform() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::default();
        let executor = ScriptedExecutor::new().fail("c1", Stage::Extract);
        let processor = ClipProcessor::new(&executor, &config, "/src/ep.mp4", dir.path(), None);

        let result = processor.process(0, &clip("c1"));
        assert_eq!(result.status, ClipStatus::Failed);
        assert!(result.error.unwrap().starts_with("extract:"));
        assert_eq!(executor.stages(), vec![Stage::Extract]);
    }

    #[test]
    fn test_rerun_reuses_finished_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::default();
        let executor = ScriptedExecutor::new();
        let processor = ClipProcessor::new(&executor, &config, "/src/ep.mp4", dir.path(), None);
        processor.process(0, &clip("c1"));

        let again = ScriptedExecutor::new();
        let processor = ClipProcessor::new(&again, &config, "/src/ep.mp4", dir.path(), None);
        let result = processor.process(0, &clip("c1"));
        assert_eq!(result.status, ClipStatus::Skipped);
        assert!(again.stages().is_empty());
    }

    #[test]
    fn test_resume_rules() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ClipPaths::new(dir.path(), &clip("c1"));
        let rules = ResumeConfig::default();

        assert!(matches!(
            resume_decision(&paths, &rules),
            ResumeDecision::Render { .. }
        ));

        std::fs::write(&paths.vertical, vec![0u8; 1000]).unwrap();
        assert_eq!(
            resume_decision(&paths, &rules),
            ResumeDecision::Render {
                reason: "previous output too small"
            }
        );

        std::fs::write(&paths.vertical, vec![0u8; 1001]).unwrap();
        assert_eq!(
            resume_decision(&paths, &rules),
            ResumeDecision::Reuse { bytes: 1001 }
        );

        let strict = ResumeConfig {
            require_marker: true,
            ..ResumeConfig::default()
        };
        assert!(matches!(
            resume_decision(&paths, &strict),
            ResumeDecision::Render { .. }
        ));

        let marker = CompletionMarker {
            clip_id: "c1".to_string(),
            bytes: 5000,
            completed_at: "2024-01-01T00:00:00+00:00".to_string(),
        };
        std::fs::write(&paths.marker, serde_json::to_vec(&marker).unwrap()).unwrap();
        assert!(matches!(
            resume_decision(&paths, &rules),
            ResumeDecision::Render { .. }
        ));

        std::fs::write(
            &paths.marker,
            serde_json::to_vec(&CompletionMarker {
                bytes: 1001,
                ..marker
            })
            .unwrap(),
        )
        .unwrap();
        assert_eq!(
            resume_decision(&paths, &strict),
            ResumeDecision::Reuse { bytes: 1001 }
        );
    }
}

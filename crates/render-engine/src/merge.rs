//! Concatenation of rendered clips into the deliverable.

use std::io::Write;
use std::path::{Path, PathBuf};

use shortreel_common::config::RendererConfig;
use shortreel_common::{ShortreelError, ShortreelResult};
use shortreel_strategy::MergeManifest;

use crate::executor::{CommandExecutor, Stage, ToolCommand};

/// File name of the concat list written to the scratch directory.
pub const MERGE_LIST_NAME: &str = "merge_list.txt";

/// One concat-demuxer line for `path`.
///
/// Paths are absolute so the list resolves regardless of the renderer's
/// working directory. A single quote inside the path closes the quoted
/// string, emits an escaped quote, and reopens it.
pub fn concat_entry(path: &Path) -> String {
    let absolute = absolute_path(path);
    let mut text = absolute.to_string_lossy().into_owned();
    if cfg!(windows) {
        text = text.replace('\\', "/");
    }
    format!("file '{}'", text.replace('\'', "'\\''"))
}

fn absolute_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Write the concat list for `manifest`, one entry per line, in manifest order.
pub fn write_concat_list(manifest: &MergeManifest, list_path: &Path) -> std::io::Result<()> {
    let mut file = std::fs::File::create(list_path)?;
    for entry in manifest.entries() {
        writeln!(file, "{}", concat_entry(entry))?;
    }
    file.flush()
}

/// Joins rendered clips without re-encoding.
pub struct Merger<'a> {
    executor: &'a dyn CommandExecutor,
    renderer: &'a RendererConfig,
}

impl<'a> Merger<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, renderer: &'a RendererConfig) -> Self {
        Self { executor, renderer }
    }

    pub fn merge_command(&self, list_path: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(&self.renderer.program, Stage::Merge)
            .args(["-hide_banner", "-loglevel", "error"])
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(list_path.to_string_lossy())
            .args(["-c", "copy", "-y"])
            .output(output)
    }

    /// Concatenate the manifest into `output`. Any failure here is fatal for
    /// the run and is reported as [`ShortreelError::MergeFailed`].
    pub fn merge(
        &self,
        manifest: &MergeManifest,
        scratch_dir: &Path,
        output: &Path,
    ) -> ShortreelResult<PathBuf> {
        let fail = |source: ShortreelError| ShortreelError::MergeFailed {
            output: output.to_path_buf(),
            source: Box::new(source),
        };

        if manifest.is_empty() {
            return Err(fail(ShortreelError::config("nothing to merge")));
        }

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| fail(e.into()))?;
        }

        let list_path = scratch_dir.join(MERGE_LIST_NAME);
        write_concat_list(manifest, &list_path).map_err(|e| fail(e.into()))?;

        tracing::info!(
            clips = manifest.len(),
            output = %output.display(),
            "Merging clips"
        );
        self.executor
            .execute(&self.merge_command(&list_path, output))
            .map_err(|e| fail(e.into()))?;

        tracing::info!(output = %output.display(), "Deliverable written");
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedExecutor;
    use shortreel_strategy::{ClipId, ClipStatus, ProcessedClip};

    fn manifest(paths: &[PathBuf]) -> MergeManifest {
        let processed: Vec<ProcessedClip> = paths
            .iter()
            .enumerate()
            .map(|(index, path)| ProcessedClip {
                index,
                id: ClipId::new(format!("c{index}")),
                path: path.clone(),
                status: ClipStatus::Done,
                error: None,
            })
            .collect();
        MergeManifest::from_processed(&processed)
    }

    #[test]
    fn test_concat_entry_escapes_quotes() {
        assert_eq!(
            concat_entry(Path::new("/tmp/it's/a.mp4")),
            "file '/tmp/it'\\''s/a.mp4'"
        );
    }

    #[test]
    fn test_concat_entry_is_absolute() {
        let entry = concat_entry(Path::new("relative/clip.mp4"));
        let inner = entry.trim_start_matches("file '").trim_end_matches('\'');
        assert!(Path::new(inner).is_absolute());
    }

    #[test]
    fn test_list_preserves_manifest_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("c1_vertical.mp4");
        let b = dir.path().join("c3_vertical.mp4");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        let list = dir.path().join(MERGE_LIST_NAME);
        write_concat_list(&manifest(&[a, b]), &list).unwrap();

        let text = std::fs::read_to_string(&list).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("c1_vertical.mp4'"));
        assert!(lines[1].ends_with("c3_vertical.mp4'"));
    }

    #[test]
    fn test_merge_runs_concat_with_stream_copy() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("c1_vertical.mp4");
        std::fs::write(&clip, b"a").unwrap();
        let output = dir.path().join("out").join("Ep-Clip.mp4");

        let executor = ScriptedExecutor::new();
        let renderer = RendererConfig::default();
        let merged = Merger::new(&executor, &renderer)
            .merge(&manifest(&[clip]), dir.path(), &output)
            .unwrap();

        assert_eq!(merged, output);
        assert!(output.exists());
        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        let args = calls[0].args.join(" ");
        assert!(args.contains("-f concat -safe 0 -i"));
        assert!(args.contains("-c copy"));
    }

    #[test]
    fn test_merge_failure_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("c1_vertical.mp4");
        std::fs::write(&clip, b"a").unwrap();

        let executor = ScriptedExecutor::new().fail_merge();
        let renderer = RendererConfig::default();
        let err = Merger::new(&executor, &renderer)
            .merge(&manifest(&[clip]), dir.path(), &dir.path().join("o.mp4"))
            .unwrap_err();
        assert!(matches!(err, ShortreelError::MergeFailed { .. }));
    }

    #[test]
    fn test_empty_manifest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ScriptedExecutor::new();
        let renderer = RendererConfig::default();
        let err = Merger::new(&executor, &renderer)
            .merge(&MergeManifest::default(), dir.path(), &dir.path().join("o.mp4"))
            .unwrap_err();
        assert!(matches!(err, ShortreelError::MergeFailed { .. }));
        assert!(executor.calls().is_empty());
    }
}

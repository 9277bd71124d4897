//! Batch orchestration: every clip of a strategy document, then the merge.

use std::path::{Path, PathBuf};

use serde::Serialize;
use shortreel_common::config::AppConfig;
use shortreel_common::{ShortreelError, ShortreelResult};
use shortreel_strategy::{
    BatchOutcome, BatchSummary, ClipId, MergeManifest, ProcessedClip, StrategyDocument,
};

use crate::clip::ClipProcessor;
use crate::executor::{command_exists, CommandExecutor, ProcessExecutor};
use crate::merge::Merger;

/// Everything one production run needs.
#[derive(Debug, Clone)]
pub struct ProductionJob {
    pub strategy: StrategyDocument,
    pub source_video: PathBuf,
    pub scratch_dir: PathBuf,
    pub output_path: PathBuf,
    /// Avatar image. Ignored when the file does not exist.
    pub avatar: Option<PathBuf>,
}

impl ProductionJob {
    /// `<deliverable>.report.json`
    pub fn report_path(&self) -> PathBuf {
        self.output_path.with_extension("report.json")
    }
}

/// Progress notifications emitted while a job runs.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    ClipStarted {
        index: usize,
        total: usize,
        id: ClipId,
        title: String,
    },
    ClipFinished {
        total: usize,
        clip: ProcessedClip,
    },
    Merging {
        clips: usize,
    },
}

/// Progress callback type.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// What a run did, written next to the deliverable.
#[derive(Debug, Clone, Serialize)]
pub struct ProductionReport {
    pub started_at: String,
    pub finished_at: String,
    pub source_video: PathBuf,
    pub deliverable: PathBuf,
    pub avatar: bool,
    pub outcome: BatchOutcome,
    pub summary: BatchSummary,
    pub clips: Vec<ProcessedClip>,
    /// Paths that were concatenated, in order.
    pub merged: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_error: Option<String>,
}

/// Run a job to completion with the given executor.
///
/// Clips are processed sequentially in document order; a failed clip is
/// recorded and the batch moves on. The merge runs only when at least one
/// clip is usable. Returns an error for a total batch failure or a failed
/// merge, after writing the report.
pub fn run_production(
    job: &ProductionJob,
    config: &AppConfig,
    executor: &dyn CommandExecutor,
    progress: Option<&ProgressCallback>,
) -> ShortreelResult<ProductionReport> {
    let started_at = chrono::Utc::now();
    let notify = |event: ProgressEvent| {
        if let Some(cb) = progress {
            cb(event);
        }
    };

    job.strategy
        .validate()
        .map_err(|e| ShortreelError::config(e.to_string()))?;
    if !job.source_video.is_file() {
        return Err(ShortreelError::missing_input(&job.source_video));
    }
    std::fs::create_dir_all(&job.scratch_dir)?;
    if let Some(parent) = job.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let avatar = job.avatar.clone().filter(|path| {
        let present = path.is_file();
        if !present {
            tracing::info!(path = %path.display(), "Avatar not found, rendering without badge");
        }
        present
    });

    let clips = &job.strategy.clips;
    let total = clips.len();
    tracing::info!(
        clips = total,
        source = %job.source_video.display(),
        avatar = avatar.is_some(),
        "Starting production"
    );

    let processor = ClipProcessor::new(
        executor,
        config,
        &job.source_video,
        &job.scratch_dir,
        avatar.clone(),
    );

    let mut processed = Vec::with_capacity(total);
    for (index, clip) in clips.iter().enumerate() {
        notify(ProgressEvent::ClipStarted {
            index,
            total,
            id: clip.id.clone(),
            title: clip.title.clone(),
        });
        let result = processor.process(index, clip);
        notify(ProgressEvent::ClipFinished {
            total,
            clip: result.clone(),
        });
        processed.push(result);
    }

    let summary = BatchSummary::from_processed(&processed);
    let outcome = summary.outcome();
    tracing::info!(
        succeeded = summary.succeeded,
        skipped = summary.skipped,
        failed = summary.failed,
        "Clip processing finished"
    );

    let mut report = ProductionReport {
        started_at: started_at.to_rfc3339(),
        finished_at: String::new(),
        source_video: job.source_video.clone(),
        deliverable: job.output_path.clone(),
        avatar: avatar.is_some(),
        outcome,
        summary,
        clips: processed,
        merged: Vec::new(),
        merge_error: None,
    };

    let result = if outcome == BatchOutcome::TotalFailure {
        tracing::error!(failed = summary.failed, "No usable clips, skipping merge");
        Err(ShortreelError::TotalBatchFailure {
            failed: summary.failed,
        })
    } else {
        let manifest = MergeManifest::from_processed(&report.clips);
        notify(ProgressEvent::Merging {
            clips: manifest.len(),
        });
        report.merged = manifest.entries().to_vec();
        Merger::new(executor, &config.renderer)
            .merge(&manifest, &job.scratch_dir, &job.output_path)
            .map(|_| ())
    };

    if let Err(e) = &result {
        if matches!(e, ShortreelError::MergeFailed { .. }) {
            report.merge_error = Some(e.to_string());
        }
    }
    report.finished_at = chrono::Utc::now().to_rfc3339();
    write_report(&report, &job.report_path());

    result.map(|()| report)
}

/// Run a job with the process executor on a blocking worker thread.
///
/// Fails fast with [`ShortreelError::ToolNotFound`] when the renderer cannot
/// be started at all, before touching any clip.
pub async fn produce(
    job: ProductionJob,
    config: AppConfig,
    progress: Option<ProgressCallback>,
) -> ShortreelResult<ProductionReport> {
    let program = config.renderer.program.clone();
    let available = tokio::task::spawn_blocking(move || command_exists(&program))
        .await
        .map_err(|e| ShortreelError::Other(e.into()))?;
    if !available {
        return Err(ShortreelError::tool_not_found(&config.renderer.program));
    }

    tokio::task::spawn_blocking(move || {
        let executor = ProcessExecutor::from_config(&config.renderer);
        run_production(&job, &config, &executor, progress.as_ref())
    })
    .await
    .map_err(|e| ShortreelError::Other(e.into()))?
}

fn write_report(report: &ProductionReport, path: &Path) {
    let written = serde_json::to_vec_pretty(report)
        .map_err(ShortreelError::from)
        .and_then(|json| std::fs::write(path, json).map_err(ShortreelError::from));
    match written {
        Ok(()) => tracing::debug!(path = %path.display(), "Run report written"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to write run report"),
    }
}

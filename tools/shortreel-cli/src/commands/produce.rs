//! Produce the vertical deliverable for a strategy document.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use shortreel_common::config::AppConfig;
use shortreel_common::{ShortreelError, ShortreelResult};
use shortreel_render::{produce, ProductionJob, ProgressCallback, ProgressEvent};
use shortreel_strategy::{BatchOutcome, ClipStatus, SeriesWorkspace, StrategyDocument};

/// Exit code for setup and configuration errors.
const EXIT_FAILURE: u8 = 1;
/// Exit code when no clip could be produced.
const EXIT_TOTAL_FAILURE: u8 = 2;
/// Exit code when clips rendered but could not be joined.
const EXIT_MERGE_FAILURE: u8 = 3;

/// Process exit status for a production run. Partial batches still count as success.
fn exit_code<T>(result: &ShortreelResult<T>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(ShortreelError::TotalBatchFailure { .. }) => EXIT_TOTAL_FAILURE,
        Err(ShortreelError::MergeFailed { .. }) => EXIT_MERGE_FAILURE,
        Err(_) => EXIT_FAILURE,
    }
}

/// Paths given on the command line; anything unset comes from the series workspace.
pub struct PathOverrides {
    pub source: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub avatar: Option<PathBuf>,
    pub no_avatar: bool,
}

pub async fn run(
    strategy_path: PathBuf,
    overrides: PathOverrides,
    config: AppConfig,
) -> anyhow::Result<ExitCode> {
    println!("Producing from strategy: {}", strategy_path.display());

    let strategy = StrategyDocument::load(&strategy_path)
        .map_err(|e| anyhow::anyhow!("Failed to load strategy: {e}"))?;
    let workspace = SeriesWorkspace::from_strategy_path(&strategy_path)?;

    let source_video = match overrides.source {
        Some(path) => path,
        None => workspace
            .resolve_source_video()
            .context("Pass --source to point at the episode video")?,
    };
    let output_path = overrides
        .output
        .unwrap_or_else(|| workspace.deliverable_path());
    let scratch_dir = overrides
        .scratch_dir
        .unwrap_or_else(|| workspace.scratch_dir());
    let avatar = if overrides.no_avatar {
        None
    } else {
        Some(overrides.avatar.unwrap_or_else(|| workspace.avatar_path()))
    };
    let avatar_present = avatar.as_ref().is_some_and(|p| p.is_file());

    println!("  Episode: {}", workspace.episode);
    println!("  Source: {}", source_video.display());
    println!("  Scratch: {}", scratch_dir.display());
    println!("  Output: {}", output_path.display());
    println!(
        "  Avatar: {}",
        match &avatar {
            Some(path) if avatar_present => path.display().to_string(),
            _ => "none".to_string(),
        }
    );
    println!("  Clips: {}", strategy.clips.len());
    println!();

    let job = ProductionJob {
        strategy,
        source_video,
        scratch_dir,
        output_path: output_path.clone(),
        avatar,
    };
    let report_path = job.report_path();

    let progress_cb: ProgressCallback = Box::new(|event| match event {
        ProgressEvent::ClipStarted {
            index,
            total,
            id,
            title,
        } => {
            println!("  [{}/{}] {id} {title}", index + 1, total);
        }
        ProgressEvent::ClipFinished { total, clip } => match clip.status {
            ClipStatus::Skipped => {
                println!("  [{}/{}] skipped (already rendered)", clip.index + 1, total)
            }
            ClipStatus::Done => println!("  [{}/{}] done", clip.index + 1, total),
            ClipStatus::Failed => println!(
                "  [{}/{}] FAILED: {}",
                clip.index + 1,
                total,
                clip.error.as_deref().unwrap_or("unknown error")
            ),
        },
        ProgressEvent::Merging { clips } => {
            println!("\n  Merging {clips} clip(s)...");
        }
    });

    let result = produce(job, config, Some(progress_cb)).await;
    let code = exit_code(&result);
    match result {
        Ok(report) => {
            println!(
                "\nSucceeded: {}  Skipped: {}  Failed: {}",
                report.summary.succeeded, report.summary.skipped, report.summary.failed
            );
            if report.outcome == BatchOutcome::Partial {
                println!(
                    "Warning: {} clip(s) left out of the deliverable.",
                    report.summary.failed
                );
            }
            println!("Deliverable: {}", output_path.display());
            println!("Report: {}", report_path.display());
        }
        Err(e) if code == EXIT_FAILURE => return Err(e.into()),
        Err(e) => {
            eprintln!("\nProduction failed: {e}");
            eprintln!("Report: {}", report_path.display());
        }
    }
    Ok(ExitCode::from(code))
}

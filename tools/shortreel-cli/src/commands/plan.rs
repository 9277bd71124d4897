//! Print the layout and renderer commands for each clip without running anything.

use std::path::PathBuf;
use std::process::ExitCode;

use shortreel_common::config::AppConfig;
use shortreel_layout::plan::HorizontalAlign;
use shortreel_layout::RenderPlan;
use shortreel_render::clip::{ClipPaths, ClipProcessor};
use shortreel_render::ProcessExecutor;
use shortreel_strategy::{SeriesWorkspace, StrategyDocument};

pub fn run(path: PathBuf, with_avatar: bool, config: &AppConfig) -> anyhow::Result<ExitCode> {
    let doc = StrategyDocument::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load strategy: {e}"))?;
    let workspace = SeriesWorkspace::from_strategy_path(&path)?;

    let source = workspace
        .resolve_source_video()
        .unwrap_or_else(|_| workspace.downloads_dir().join(format!("{}.mp4", workspace.episode)));
    let scratch_dir = workspace.scratch_dir();
    let avatar = with_avatar.then(|| workspace.avatar_path());

    // Only used to build command lines; nothing is executed.
    let executor = ProcessExecutor::from_config(&config.renderer);
    let processor = ClipProcessor::new(&executor, config, &source, &scratch_dir, avatar);

    for (index, clip) in doc.clips.iter().enumerate() {
        let plan = RenderPlan::for_clip(clip, &config.layout, with_avatar);
        let paths = ClipPaths::new(&scratch_dir, clip);

        println!(
            "Clip {} [{}] {} -> {}",
            index + 1,
            clip.id,
            clip.time_range.start,
            clip.time_range.end
        );
        println!("  Title (y={}): {}", plan.title.y, plan.title.text);
        for line in &plan.commentary {
            let x = match line.align {
                HorizontalAlign::Center => "center".to_string(),
                HorizontalAlign::Left(x) => format!("x={x}"),
            };
            println!("  Line ({x}, y={}): {}", line.y, line.text);
        }
        if let Some(badge) = plan.badge {
            println!(
                "  Bubble: {}x{} at ({}, {}); avatar {}px at ({}, {})",
                badge.bubble.w,
                badge.bubble.h,
                badge.bubble.x,
                badge.bubble.y,
                badge.avatar.w,
                badge.avatar.x,
                badge.avatar.y
            );
        }

        println!("  Extract:   {}", processor.extract_command(clip, &paths).display());
        println!(
            "  Transform: {}",
            processor.transform_command(clip, &paths)?.display()
        );
        println!();
    }

    Ok(ExitCode::SUCCESS)
}

//! Validate a strategy document.

use std::path::PathBuf;
use std::process::ExitCode;

use shortreel_strategy::{SeriesWorkspace, StrategyDocument};

pub fn run(path: PathBuf) -> anyhow::Result<ExitCode> {
    println!("Validating strategy at: {}", path.display());

    let doc = StrategyDocument::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load strategy: {e}"))?;

    println!("  Clips: {}", doc.clips.len());
    println!(
        "  Total duration: {:.1}s",
        doc.total_duration_millis() as f64 / 1000.0
    );
    println!();
    println!(
        "  {:<4} {:<12} {:<14} {:<14} {:>8}  Title",
        "#", "Id", "Start", "End", "Length"
    );
    for (index, clip) in doc.clips.iter().enumerate() {
        println!(
            "  {:<4} {:<12} {:<14} {:<14} {:>7.1}s  {}",
            index + 1,
            clip.id.as_str(),
            clip.time_range.start.to_string(),
            clip.time_range.end.to_string(),
            clip.time_range.duration_millis() as f64 / 1000.0,
            clip.title
        );
    }

    if !doc.publish_metadata.is_empty() {
        let keys: Vec<&str> = doc.publish_metadata.keys().map(String::as_str).collect();
        println!("\n  Publish metadata: {}", keys.join(", "));
    }

    // Check the series layout around the document
    let workspace = SeriesWorkspace::from_strategy_path(&path)?;
    println!();
    match workspace.resolve_source_video() {
        Ok(source) => println!("[OK] Source video: {}", source.display()),
        Err(e) => println!("[WARN] {e}"),
    }
    match workspace.existing_avatar() {
        Some(avatar) => println!("[OK] Avatar: {}", avatar.display()),
        None => println!("[INFO] No avatar at {}", workspace.avatar_path().display()),
    }

    println!("\nStrategy is valid.");
    Ok(ExitCode::SUCCESS)
}

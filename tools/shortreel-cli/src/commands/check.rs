//! Check that the renderer and font are available.

use std::process::ExitCode;

use shortreel_common::config::{config_file_path, AppConfig};
use shortreel_render::executor::command_exists;

pub fn run(config: &AppConfig) -> anyhow::Result<ExitCode> {
    println!("Shortreel System Check");
    println!("{}", "=".repeat(50));

    let program = &config.renderer.program;
    let renderer_ok = command_exists(program);
    if renderer_ok {
        println!("[OK] Renderer: {program}");
    } else {
        println!("[FAIL] Renderer not found: {program}");
        println!("       Install ffmpeg or set renderer.program in the config file.");
    }

    let font = &config.layout.font_file;
    if font.is_file() {
        println!("[OK] Font: {}", font.display());
    } else {
        println!("[WARN] Font not found: {}", font.display());
        println!("       Text overlays will fail until layout.font_file points at a CJK-capable font.");
    }

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[INFO] Config: defaults ({} not found)", config_path.display());
    }

    println!();
    if renderer_ok {
        println!("Shortreel is ready.");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("The renderer is missing. See above for fixes.");
        Ok(ExitCode::FAILURE)
    }
}

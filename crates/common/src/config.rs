//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ShortreelError, ShortreelResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// External renderer invocation and retry policy.
    pub renderer: RendererConfig,

    /// Vertical canvas layout: fonts, positions, wrap widths, avatar badge.
    pub layout: LayoutConfig,

    /// Rules for recognising clips finished by an earlier run.
    pub resume: ResumeConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Renderer executable and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Executable name or path (resolved through PATH when bare).
    pub program: String,

    /// Total attempts per command, including the first.
    pub max_attempts: u32,

    /// Blocking wait between attempts.
    pub retry_delay_ms: u64,

    /// How many trailing characters of stderr to keep when a command fails.
    pub stderr_tail_chars: usize,

    /// Video encoder for extraction and rendering.
    pub video_codec: String,

    /// Audio encoder for extraction and rendering.
    pub audio_codec: String,
}

/// Geometry and typography of the rendered vertical clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Output canvas size in pixels (9:16).
    pub canvas_width: u32,
    pub canvas_height: u32,

    /// Box blur applied to the background copy.
    pub blur: BlurStyle,

    /// Font file used by every text overlay.
    pub font_file: PathBuf,

    /// Title overlay.
    pub title: TitleStyle,

    /// Commentary overlay (wrapped, one drawtext per line).
    pub commentary: CommentaryStyle,

    /// Avatar badge and speech bubble, used only when an avatar image exists.
    pub avatar: AvatarStyle,
}

/// Box blur parameters (`boxblur=radius:power`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurStyle {
    pub radius: u32,
    pub power: u32,
}

/// Font size, fill and outline of a text overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub font_size: u32,
    pub color: String,
    pub border_width: u32,
    pub border_color: String,
    /// Drop shadow offset in pixels on both axes (0 disables the shadow).
    pub shadow_offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleStyle {
    pub text: TextStyle,
    /// Top of the title, in canvas pixels.
    pub y: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentaryStyle {
    pub text: TextStyle,
    /// Top of the first commentary line, in canvas pixels.
    pub base_y: u32,
    /// Vertical distance between consecutive lines (font size + spacing).
    pub line_height: u32,
    /// Wrap width when no avatar is drawn. Narrow glyphs count 0.5, wide glyphs 1.0.
    pub max_width_units: f64,
    /// Wrap width when the avatar takes up part of the row.
    pub max_width_units_with_avatar: f64,
}

/// Avatar badge and bubble geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarStyle {
    /// Side of the square the avatar is scaled to; the circle mask uses half of it.
    pub size: u32,
    /// Left edge and width of the bubble.
    pub bubble_x: u32,
    pub bubble_width: u32,
    /// Bubble height never drops below this.
    pub bubble_min_height: u32,
    /// Vertical padding added around the stacked lines.
    pub bubble_padding: u32,
    /// Fill colour, ffmpeg colour syntax (`black@0.5`).
    pub bubble_color: String,
    /// Horizontal space between the bubble edge and the avatar.
    pub inset: u32,
    /// Horizontal space between the avatar and the text column.
    pub text_gap: u32,
}

/// Rules for the resumability check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeConfig {
    /// Outputs at or below this size are never treated as complete.
    pub min_output_bytes: u64,

    /// Only trust outputs that carry a completion marker written by a previous run.
    pub require_marker: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "shortreel_render=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            max_attempts: 3,
            retry_delay_ms: 1000,
            stderr_tail_chars: 1000,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1080,
            canvas_height: 1920,
            blur: BlurStyle::default(),
            font_file: default_font_file(),
            title: TitleStyle::default(),
            commentary: CommentaryStyle::default(),
            avatar: AvatarStyle::default(),
        }
    }
}

impl Default for BlurStyle {
    fn default() -> Self {
        Self {
            radius: 20,
            power: 10,
        }
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 55,
            color: "yellow".to_string(),
            border_width: 3,
            border_color: "black".to_string(),
            shadow_offset: 3,
        }
    }
}

impl Default for TitleStyle {
    fn default() -> Self {
        Self {
            text: TextStyle {
                font_size: 80,
                border_width: 4,
                shadow_offset: 4,
                ..TextStyle::default()
            },
            y: 350,
        }
    }
}

impl Default for CommentaryStyle {
    fn default() -> Self {
        Self {
            text: TextStyle::default(),
            base_y: 1400,
            line_height: 80,
            max_width_units: 18.0,
            max_width_units_with_avatar: 16.0,
        }
    }
}

impl Default for AvatarStyle {
    fn default() -> Self {
        Self {
            size: 120,
            bubble_x: 20,
            bubble_width: 1040,
            bubble_min_height: 200,
            bubble_padding: 60,
            bubble_color: "black@0.5".to_string(),
            inset: 10,
            text_gap: 15,
        }
    }
}

impl Default for ResumeConfig {
    fn default() -> Self {
        Self {
            min_output_bytes: 1000,
            require_marker: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl CommentaryStyle {
    /// Wrap width for the given avatar state.
    pub fn wrap_width(&self, with_avatar: bool) -> f64 {
        if with_avatar {
            self.max_width_units_with_avatar
        } else {
            self.max_width_units
        }
    }
}

impl AvatarStyle {
    /// Left edge of commentary drawn beside the avatar.
    pub fn text_x(&self) -> u32 {
        self.bubble_x + self.inset + self.size + self.text_gap
    }
}

impl LayoutConfig {
    /// Right edge of the bubble once clamped to the canvas.
    pub fn bubble_right(&self) -> u32 {
        let style = &self.avatar;
        style.bubble_x
            + style
                .bubble_width
                .min(self.canvas_width.saturating_sub(style.bubble_x))
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Missing keys take their defaults.
    pub fn load_from(path: &Path) -> ShortreelResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ShortreelError::config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            ShortreelError::config(format!("Failed to parse config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Reject values that would make rendering meaningless.
    pub fn validate(&self) -> ShortreelResult<()> {
        if self.renderer.max_attempts == 0 {
            return Err(ShortreelError::config("renderer.max_attempts must be at least 1"));
        }
        if self.renderer.program.trim().is_empty() {
            return Err(ShortreelError::config("renderer.program must not be empty"));
        }
        let layout = &self.layout;
        if layout.canvas_width == 0 || layout.canvas_height == 0 {
            return Err(ShortreelError::config("layout canvas must be non-empty"));
        }
        let commentary = &layout.commentary;
        if commentary.max_width_units < 1.0 || commentary.max_width_units_with_avatar < 1.0 {
            return Err(ShortreelError::config(
                "commentary wrap widths must be at least one unit",
            ));
        }
        if layout.avatar.size == 0 {
            return Err(ShortreelError::config("layout.avatar.size must be non-zero"));
        }
        let text_right = layout.avatar.text_x() as f64
            + commentary.max_width_units_with_avatar * commentary.text.font_size as f64;
        if text_right > layout.bubble_right() as f64 {
            return Err(ShortreelError::config(format!(
                "commentary beside the avatar would end at x={text_right}, past the bubble edge at x={}",
                layout.bubble_right()
            )));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("shortreel").join("config.json")
}

/// A CJK-capable font in the platform's usual location.
fn default_font_file() -> PathBuf {
    if cfg!(target_os = "macos") {
        PathBuf::from("/System/Library/Fonts/STHeiti Medium.ttc")
    } else if cfg!(target_os = "windows") {
        PathBuf::from("C:/Windows/Fonts/msyh.ttc")
    } else {
        PathBuf::from("/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc")
    }
}

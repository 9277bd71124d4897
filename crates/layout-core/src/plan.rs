//! Per-clip render plan.
//!
//! A `RenderPlan` is everything the filter graph needs to know about one clip
//! that depends on its text: wrapped commentary, where each line sits, and
//! the bubble/avatar geometry when an avatar is drawn. It is a pure function
//! of the clip and the layout configuration and is never persisted.

use serde::Serialize;
use shortreel_common::config::LayoutConfig;
use shortreel_strategy::ClipSpec;

use crate::wrap::wrap;

/// Horizontal anchoring of a text overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "x")]
pub enum HorizontalAlign {
    /// Centered on the canvas.
    Center,
    /// Left edge at the given canvas x.
    Left(u32),
}

/// One line of text and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextPlacement {
    pub text: String,
    pub align: HorizontalAlign,
    /// Top of the line in canvas pixels.
    pub y: u32,
}

/// Axis-aligned rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Bubble behind the commentary plus the circular avatar sitting on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BadgePlan {
    pub bubble: Rect,
    /// Square the avatar is scaled into; the visible disc is inscribed in it.
    pub avatar: Rect,
}

/// Layout decisions for one clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderPlan {
    pub title: TextPlacement,
    pub commentary: Vec<TextPlacement>,
    pub badge: Option<BadgePlan>,
}

impl RenderPlan {
    /// Plan a clip. `with_avatar` reflects whether the avatar image exists.
    pub fn for_clip(clip: &ClipSpec, layout: &LayoutConfig, with_avatar: bool) -> Self {
        Self::build(&clip.title, &clip.commentary_text, layout, with_avatar)
    }

    pub fn build(title: &str, commentary: &str, layout: &LayoutConfig, with_avatar: bool) -> Self {
        let style = &layout.commentary;
        let lines = wrap(commentary, style.wrap_width(with_avatar));

        let badge = with_avatar.then(|| badge_geometry(lines.len(), layout));
        let align = match &badge {
            Some(_) => HorizontalAlign::Left(layout.avatar.text_x()),
            None => HorizontalAlign::Center,
        };

        let commentary = lines
            .into_iter()
            .enumerate()
            .map(|(i, text)| TextPlacement {
                text,
                align,
                y: style.base_y + i as u32 * style.line_height,
            })
            .collect::<Vec<_>>();

        tracing::trace!(
            lines = commentary.len(),
            with_avatar,
            "Render plan built"
        );

        Self {
            title: TextPlacement {
                text: title.to_string(),
                align: HorizontalAlign::Center,
                y: layout.title.y,
            },
            commentary,
            badge,
        }
    }

    pub fn has_avatar(&self) -> bool {
        self.badge.is_some()
    }
}

/// Bubble height for a number of stacked lines.
pub fn bubble_height(line_count: usize, layout: &LayoutConfig) -> u32 {
    let stacked = line_count as u32 * layout.commentary.line_height + layout.avatar.bubble_padding;
    stacked.max(layout.avatar.bubble_min_height)
}

fn badge_geometry(line_count: usize, layout: &LayoutConfig) -> BadgePlan {
    let style = &layout.avatar;
    let height = bubble_height(line_count, layout);
    let bubble = Rect {
        x: style.bubble_x,
        y: layout
            .commentary
            .base_y
            .saturating_sub(style.bubble_padding / 2),
        w: layout.bubble_right() - style.bubble_x,
        h: height,
    };
    let avatar = Rect {
        x: bubble.x + style.inset,
        y: bubble.y + height.saturating_sub(style.size) / 2,
        w: style.size,
        h: style.size,
    };
    BadgePlan { bubble, avatar }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_without_avatar_centers_lines() {
        let layout = LayoutConfig::default();
        let plan = RenderPlan::build("Title", "one\ntwo\nthree", &layout, false);

        assert!(!plan.has_avatar());
        assert_eq!(plan.title.y, 350);
        assert_eq!(plan.title.align, HorizontalAlign::Center);
        let ys: Vec<u32> = plan.commentary.iter().map(|l| l.y).collect();
        assert_eq!(ys, vec![1400, 1480, 1560]);
        assert!(plan
            .commentary
            .iter()
            .all(|l| l.align == HorizontalAlign::Center));
    }

    #[test]
    fn test_plan_with_avatar_left_aligns_after_badge() {
        let layout = LayoutConfig::default();
        let plan = RenderPlan::build("Title", "hello", &layout, true);

        let badge = plan.badge.unwrap();
        let expected_x = badge.avatar.x + badge.avatar.w + layout.avatar.text_gap;
        assert_eq!(plan.commentary[0].align, HorizontalAlign::Left(expected_x));
        assert_eq!(badge.avatar.w, layout.avatar.size);
        assert!(badge.avatar.y >= badge.bubble.y);
        assert!(badge.avatar.y + badge.avatar.h <= badge.bubble.y + badge.bubble.h);
    }

    #[test]
    fn test_avatar_narrows_wrap_width() {
        let layout = LayoutConfig::default();
        let text = "一二三四五六七八九十一二三四五六七";
        assert_eq!(RenderPlan::build("", text, &layout, false).commentary.len(), 1);
        assert_eq!(RenderPlan::build("", text, &layout, true).commentary.len(), 2);
    }

    #[test]
    fn test_full_avatar_line_fits_inside_bubble() {
        let layout = LayoutConfig::default();
        let text = "一二三四五六七八九十一二三四五六";
        let plan = RenderPlan::build("", text, &layout, true);
        let bubble = plan.badge.unwrap().bubble;

        assert_eq!(plan.commentary.len(), 1);
        let HorizontalAlign::Left(x) = plan.commentary[0].align else {
            panic!("expected left-aligned commentary");
        };
        let right_edge = x + 16 * layout.commentary.text.font_size;
        assert!(right_edge <= bubble.x + bubble.w);
        assert!(right_edge <= layout.canvas_width);
    }

    #[test]
    fn test_bubble_height_grows_with_lines_above_minimum() {
        let layout = LayoutConfig::default();
        assert_eq!(bubble_height(0, &layout), 200);
        assert_eq!(bubble_height(1, &layout), 200);
        assert_eq!(bubble_height(2, &layout), 220);
        assert_eq!(bubble_height(4, &layout), 380);
    }

    #[test]
    fn test_bubble_stays_on_canvas() {
        let mut layout = LayoutConfig::default();
        layout.avatar.bubble_width = 5000;
        let plan = RenderPlan::build("", "x", &layout, true);
        let bubble = plan.badge.unwrap().bubble;
        assert!(bubble.x + bubble.w <= layout.canvas_width);
    }

    #[test]
    fn test_plan_serializes_for_inspection() {
        let layout = LayoutConfig::default();
        let plan = RenderPlan::build("T", "a", &layout, true);
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["commentary"][0]["align"]["kind"], "left");
        assert_eq!(json["title"]["align"]["kind"], "center");
    }
}

//! Vertical composition.
//!
//! Turns a landscape source into a 9:16 frame: a blurred, cover-scaled copy
//! fills the canvas, the sharp source sits centered on top at full canvas
//! width, and the title and commentary are drawn over both. When an avatar
//! is available a translucent bubble and a circular avatar go behind the
//! commentary.

use std::path::{Path, PathBuf};

use shortreel_common::config::{LayoutConfig, TextStyle};
use shortreel_layout::plan::{HorizontalAlign, TextPlacement};
use shortreel_layout::RenderPlan;

use crate::filter_graph::{
    AlphaMask, DrawText, FilterChain, FilterGraph, FilterNode, GraphError, Pad, ScaleFit, TextX,
};

/// Label of the final video pad, mapped into the output file.
pub const OUTPUT_PAD: &str = "outv";

/// A filter graph plus the renderer inputs it reads, in stream order.
///
/// Input 0 is always the extracted clip; input 1, when present, is the
/// avatar image.
#[derive(Debug, Clone)]
pub struct Composition {
    pub graph: FilterGraph,
    pub extra_inputs: Vec<PathBuf>,
}

impl Composition {
    pub fn has_avatar(&self) -> bool {
        !self.extra_inputs.is_empty()
    }
}

/// Build the vertical composition for one clip.
///
/// The badge is drawn only when the plan reserved space for it and an avatar
/// path is given. Either alone produces the plain centered layout.
pub fn compose_vertical(
    plan: &RenderPlan,
    layout: &LayoutConfig,
    avatar: Option<&Path>,
) -> Result<Composition, GraphError> {
    let width = layout.canvas_width;
    let height = layout.canvas_height;
    let mut graph = FilterGraph::new();
    let mut extra_inputs = Vec::new();

    graph
        .push(FilterChain::new(
            vec![Pad::input_video(0)],
            vec![FilterNode::Split { outputs: 2 }],
            vec![Pad::named("bg"), Pad::named("main")],
        ))?
        .push(FilterChain::new(
            vec![Pad::named("bg")],
            vec![
                FilterNode::Scale {
                    width: width as i32,
                    height: height as i32,
                    fit: ScaleFit::Cover,
                },
                FilterNode::Crop { width, height },
                FilterNode::Blur {
                    radius: layout.blur.radius,
                    power: layout.blur.power,
                },
            ],
            vec![Pad::named("bg_blurred")],
        ))?
        .push(FilterChain::new(
            vec![Pad::named("main")],
            vec![FilterNode::Scale {
                width: width as i32,
                height: -2,
                fit: ScaleFit::Exact,
            }],
            vec![Pad::named("main_scaled")],
        ))?
        .push(FilterChain::new(
            vec![Pad::named("bg_blurred"), Pad::named("main_scaled")],
            vec![FilterNode::Overlay {
                x: "0".to_string(),
                y: "(H-h)/2".to_string(),
            }],
            vec![Pad::named("merged")],
        ))?;

    let mut base = Pad::named("merged");

    if let (Some(badge), Some(avatar_path)) = (plan.badge, avatar) {
        let avatar_index = 1 + extra_inputs.len();
        extra_inputs.push(avatar_path.to_path_buf());

        graph
            .push(FilterChain::new(
                vec![base],
                vec![FilterNode::DrawBox {
                    x: badge.bubble.x,
                    y: badge.bubble.y,
                    width: badge.bubble.w,
                    height: badge.bubble.h,
                    color: layout.avatar.bubble_color.clone(),
                }],
                vec![Pad::named("bubbled")],
            ))?
            .push(FilterChain::new(
                vec![Pad::input_video(avatar_index)],
                vec![
                    FilterNode::Scale {
                        width: badge.avatar.w as i32,
                        height: badge.avatar.h as i32,
                        fit: ScaleFit::Exact,
                    },
                    FilterNode::Format {
                        pixel_format: "rgba".to_string(),
                    },
                    FilterNode::AlphaMask(AlphaMask::Circle),
                ],
                vec![Pad::named("avatar")],
            ))?
            .push(FilterChain::new(
                vec![Pad::named("bubbled"), Pad::named("avatar")],
                vec![FilterNode::Overlay {
                    x: badge.avatar.x.to_string(),
                    y: badge.avatar.y.to_string(),
                }],
                vec![Pad::named("badged")],
            ))?;
        base = Pad::named("badged");
    }

    let mut texts = vec![draw_text(&plan.title, &layout.title.text, &layout.font_file)];
    texts.extend(
        plan.commentary
            .iter()
            .map(|line| draw_text(line, &layout.commentary.text, &layout.font_file)),
    );

    graph.push(FilterChain::new(
        vec![base],
        texts,
        vec![Pad::named(OUTPUT_PAD)],
    ))?;

    tracing::debug!(
        overlays = graph.text_overlay_count(),
        avatar = !extra_inputs.is_empty(),
        "Vertical composition built"
    );

    Ok(Composition {
        graph,
        extra_inputs,
    })
}

fn draw_text(placement: &TextPlacement, style: &TextStyle, font_file: &Path) -> FilterNode {
    FilterNode::DrawText(DrawText {
        font_file: font_file.to_path_buf(),
        text: placement.text.clone(),
        font_size: style.font_size,
        color: style.color.clone(),
        x: match placement.align {
            HorizontalAlign::Center => TextX::Center,
            HorizontalAlign::Left(x) => TextX::Left(x),
        },
        y: placement.y,
        border_width: style.border_width,
        border_color: style.border_color.clone(),
        shadow_offset: style.shadow_offset,
    })
}

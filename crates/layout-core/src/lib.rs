//! Shortreel Layout Core
//!
//! Decides where everything goes on the vertical canvas before any
//! rendering happens:
//! - **Wrap:** Width-aware line breaking for commentary text
//! - **Plan:** Title, commentary lines, and avatar bubble placement per clip
//!
//! This crate is pure computation: no I/O and no process spawning.
//! All inputs are data; all outputs are data.

pub mod plan;
pub mod wrap;

pub use plan::RenderPlan;
pub use wrap::wrap;

//! Shortreel Render Engine
//!
//! Cuts timed excerpts out of a landscape source, recomposes each one as a
//! captioned 9:16 clip, and joins the results into a single deliverable.
//!
//! # Pipeline Architecture
//!
//! ```text
//! strategy.json ──┐
//!                 ├── per clip: Extract (-ss/-to, re-encode)
//! source.mp4 ─────┘         │
//!                           ├── Transform (blur fill + centered source
//! avatar.png ───────────────┘    + title/commentary overlays)
//!                                        │
//!                                        ▼
//!                             Merge manifest (document order,
//!                                 failed clips left out)
//!                                        │
//!                                        ▼
//!                             Concat (stream copy) → <Episode>-Clip.mp4
//! ```

pub mod clip;
pub mod compositor;
pub mod executor;
pub mod filter_graph;
pub mod merge;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testing;

pub use executor::{CommandExecutor, ExecError, ProcessExecutor, RetryPolicy, Stage, ToolCommand};
pub use pipeline::*;

//! Shortreel Strategy Model
//!
//! Defines the data contracts exchanged between the clip pipeline and its
//! collaborators:
//! - **Strategy:** The input document listing timed excerpts, titles, and
//!   commentary, plus an opaque publish-metadata block
//! - **Timecode:** Millisecond-precision positions in the source video
//! - **Processed:** Per-clip results and the ordered merge manifest
//! - **Workspace:** Where a series keeps its sources, scratch files, and deliverables

pub mod processed;
pub mod strategy;
pub mod timecode;
pub mod workspace;

pub use processed::*;
pub use strategy::*;
pub use timecode::*;
pub use workspace::*;

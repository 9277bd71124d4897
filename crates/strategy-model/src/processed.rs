//! Per-clip results and the ordered merge manifest.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::strategy::ClipId;

/// Terminal state of one clip in a production run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipStatus {
    /// A previous run already produced the output; nothing was rendered.
    Skipped,
    /// Extracted and rendered in this run.
    Done,
    /// Extraction or rendering gave up; excluded from the merge.
    Failed,
}

impl ClipStatus {
    pub fn is_usable(self) -> bool {
        matches!(self, ClipStatus::Skipped | ClipStatus::Done)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClipStatus::Skipped => "skipped",
            ClipStatus::Done => "done",
            ClipStatus::Failed => "failed",
        }
    }
}

/// Outcome of processing one clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedClip {
    /// Position of the clip in the strategy document.
    pub index: usize,

    pub id: ClipId,

    /// Final vertical render (present on disk unless `status` is `Failed`).
    pub path: PathBuf,

    pub status: ClipStatus,

    /// Why the clip failed, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Rendered clips to concatenate, in strategy document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeManifest {
    entries: Vec<PathBuf>,
}

impl MergeManifest {
    /// Build the manifest from processed clips in any completion order.
    ///
    /// Failed clips are dropped; the rest are ordered by document index.
    pub fn from_processed(processed: &[ProcessedClip]) -> Self {
        let mut usable: Vec<&ProcessedClip> = processed
            .iter()
            .filter(|clip| clip.status.is_usable())
            .collect();
        usable.sort_by_key(|clip| clip.index);

        Self {
            entries: usable.into_iter().map(|clip| clip.path.clone()).collect(),
        }
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Rendered in this run.
    pub succeeded: usize,
    /// Reused from an earlier run.
    pub skipped: usize,
    pub failed: usize,
}

/// How a batch ended, before merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every clip is usable.
    Complete,
    /// Some clips failed; the deliverable holds only the usable ones.
    Partial,
    /// Nothing usable; merging is skipped.
    TotalFailure,
}

impl BatchSummary {
    pub fn from_processed(processed: &[ProcessedClip]) -> Self {
        let mut summary = Self::default();
        for clip in processed {
            match clip.status {
                ClipStatus::Done => summary.succeeded += 1,
                ClipStatus::Skipped => summary.skipped += 1,
                ClipStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    pub fn usable(&self) -> usize {
        self.succeeded + self.skipped
    }

    pub fn total(&self) -> usize {
        self.usable() + self.failed
    }

    pub fn outcome(&self) -> BatchOutcome {
        if self.usable() == 0 {
            BatchOutcome::TotalFailure
        } else if self.failed > 0 {
            BatchOutcome::Partial
        } else {
            BatchOutcome::Complete
        }
    }
}

//! Keep-interval computation.
//!
//! The keep intervals of a file are the complement of its cut list within
//! `[0, duration]`. Computation is two passes: collect the `n + 1` raw
//! boundaries between cuts, then turn each into a [`KeepInterval`] and drop
//! the empty ones. Each survivor remembers its boundary index so segment
//! numbering stays stable when neighbours are dropped.

use serde::{Deserialize, Serialize};

use crate::edl::CutInterval;

/// A time range that survives the cut.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeepInterval {
    /// Start, seconds from the beginning of the media.
    pub offset_secs: f64,

    /// Length in seconds. Negative when the cut list is inconsistent
    /// with the media duration.
    pub length_secs: f64,
}

impl KeepInterval {
    /// End of the interval in seconds.
    pub fn end_secs(&self) -> f64 {
        self.offset_secs + self.length_secs
    }

    /// Whether this interval would produce any output.
    pub fn is_empty(&self) -> bool {
        self.length_secs <= 0.0
    }
}

/// A non-empty keep interval tagged with its boundary index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeepSegment {
    /// Position among all `n + 1` boundaries, before empty ones were dropped.
    pub index: usize,

    pub interval: KeepInterval,
}

/// Raw boundaries between cuts, including empty ones.
///
/// Boundary 0 always starts at 0 and the last always ends at
/// `duration_secs`. With no cuts the single boundary spans the whole file.
pub fn candidate_boundaries(cuts: &[CutInterval], duration_secs: f64) -> Vec<KeepInterval> {
    let starts = std::iter::once(0.0).chain(cuts.iter().map(|cut| cut.stop_secs));
    let ends = cuts
        .iter()
        .map(|cut| cut.start_secs)
        .chain(std::iter::once(duration_secs));

    starts
        .zip(ends)
        .map(|(offset_secs, end_secs)| KeepInterval {
            offset_secs,
            length_secs: end_secs - offset_secs,
        })
        .collect()
}

/// Ordered keep segments for a cut list, with empty boundaries dropped.
pub fn keep_segments(cuts: &[CutInterval], duration_secs: f64) -> Vec<KeepSegment> {
    let segments: Vec<KeepSegment> = candidate_boundaries(cuts, duration_secs)
        .into_iter()
        .enumerate()
        .filter(|(_, interval)| !interval.is_empty())
        .map(|(index, interval)| KeepSegment { index, interval })
        .collect();

    tracing::debug!(
        cuts = cuts.len(),
        kept = segments.len(),
        dropped = cuts.len() + 1 - segments.len(),
        "Computed keep segments"
    );
    segments
}

/// Total seconds of output for a set of keep segments.
pub fn kept_duration_secs(segments: &[KeepSegment]) -> f64 {
    segments.iter().map(|s| s.interval.length_secs).sum()
}

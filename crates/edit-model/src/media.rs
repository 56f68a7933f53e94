//! Probed media metadata.

use serde::{Deserialize, Serialize};

/// What the run needs to know about its input file.
///
/// Obtained once per run; codec tags are opaque and used verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Total duration in seconds.
    pub duration_secs: f64,

    /// Codec name of the first video stream (e.g. "mpeg2video").
    pub video_codec: String,

    /// Codec name of the first audio stream (e.g. "ac3").
    pub audio_codec: String,
}

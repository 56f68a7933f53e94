//! Media probing through ffprobe.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use clutch_common::error::{ClutchError, ClutchResult};
use clutch_edit_model::media::MediaInfo;
use serde::Deserialize;

/// Source of duration and codec information for an input file.
pub trait MediaProbe {
    fn probe(&self, path: &Path) -> ClutchResult<MediaInfo>;
}

/// Probe backed by the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    program: PathBuf,
}

impl FfprobeProbe {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MediaProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> ClutchResult<MediaInfo> {
        if !path.exists() {
            return Err(ClutchError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        tracing::debug!(program = %self.program.display(), path = %path.display(), "Probing media");
        let output = Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                ClutchError::probe(
                    path,
                    format!("failed to start {}: {e}", self.program.display()),
                )
            })?;

        if !output.status.success() {
            return Err(ClutchError::probe(
                path,
                format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let info = parse_ffprobe_json(&output.stdout, path)?;
        tracing::info!(
            path = %path.display(),
            duration_secs = info.duration_secs,
            video_codec = %info.video_codec,
            audio_codec = %info.audio_codec,
            "Probed input"
        );
        Ok(info)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    duration: Option<String>,
}

/// Extract [`MediaInfo`] from `ffprobe -print_format json` output.
///
/// The container duration wins; the longest stream duration is the
/// fallback. The first video and first audio stream supply the codecs.
pub fn parse_ffprobe_json(raw: &[u8], path: &Path) -> ClutchResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(raw)
        .map_err(|e| ClutchError::probe(path, format!("unreadable ffprobe output: {e}")))?;

    let duration_secs = probe
        .format
        .as_ref()
        .and_then(|f| parse_secs(f.duration.as_deref()))
        .or_else(|| {
            probe
                .streams
                .iter()
                .filter_map(|s| parse_secs(s.duration.as_deref()))
                .reduce(f64::max)
        })
        .ok_or_else(|| ClutchError::probe(path, "no duration reported"))?;

    let codec_of = |kind: &str| {
        probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some(kind))
            .map(|s| s.codec_name.clone().unwrap_or_else(|| "unknown".to_string()))
            .ok_or_else(|| ClutchError::probe(path, format!("no {kind} stream found")))
    };

    Ok(MediaInfo {
        duration_secs,
        video_codec: codec_of("video")?,
        audio_codec: codec_of("audio")?,
    })
}

fn parse_secs(raw: Option<&str>) -> Option<f64> {
    let secs = raw?.trim().parse::<f64>().ok()?;
    (secs.is_finite() && secs > 0.0).then_some(secs)
}

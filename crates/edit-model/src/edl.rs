//! Edit-decision list parsing.
//!
//! One cut per line, three tab-separated fields:
//!
//! ```text
//! 600.00	660.00	0
//! 1800.00	1830.00	0
//! ```
//!
//! Start and stop are decimal seconds. The label (commonly the EDL action
//! code) is carried through untouched. Records are kept in file order;
//! ordering and overlap are reported by [`lint_cuts`] but never rejected.

use std::fmt;
use std::path::Path;

use clutch_common::error::{ClutchError, ClutchResult};
use serde::{Deserialize, Serialize};

/// A time range marked for removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutInterval {
    /// Cut start, seconds from the beginning of the media.
    pub start_secs: f64,

    /// Cut end, seconds from the beginning of the media.
    pub stop_secs: f64,

    /// Third EDL field, verbatim.
    pub label: String,
}

impl CutInterval {
    pub fn new(start_secs: f64, stop_secs: f64) -> Self {
        Self {
            start_secs,
            stop_secs,
            label: String::new(),
        }
    }

    /// Length of the removed range in seconds.
    pub fn length_secs(&self) -> f64 {
        self.stop_secs - self.start_secs
    }
}

/// Read and parse an EDL file.
pub fn load_edl(path: &Path) -> ClutchResult<Vec<CutInterval>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ClutchError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(ClutchError::UnreadableInput {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let cuts = parse_edl_str(&content, path)?;
    tracing::debug!(path = %path.display(), cuts = cuts.len(), "Loaded EDL");
    Ok(cuts)
}

/// Parse EDL text. `source` is only used in error messages.
///
/// Whitespace-only lines are skipped. Any other line must split into
/// exactly three tab-separated fields with non-negative finite decimals
/// in the first two.
pub fn parse_edl_str(content: &str, source: &Path) -> ClutchResult<Vec<CutInterval>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            parse_record(line).map_err(|msg| ClutchError::malformed(source, idx + 1, msg))
        })
        .collect()
}

fn parse_record(line: &str) -> Result<CutInterval, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [start, stop, label] = fields.as_slice() else {
        return Err(format!(
            "expected 3 tab-separated fields, found {}",
            fields.len()
        ));
    };

    Ok(CutInterval {
        start_secs: parse_seconds(start, "start")?,
        stop_secs: parse_seconds(stop, "stop")?,
        label: (*label).to_string(),
    })
}

fn parse_seconds(field: &str, name: &str) -> Result<f64, String> {
    let trimmed = field.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| format!("{name} {trimmed:?} is not a decimal number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{name} {trimmed:?} must be a non-negative number"));
    }
    Ok(value)
}

/// Advisory problem found in a cut list.
#[derive(Debug, Clone, PartialEq)]
pub enum CutWarning {
    /// `start >= stop`; the cut removes nothing useful.
    Empty { index: usize },
    /// The cut starts before the previous one ends.
    Overlap { index: usize },
    /// The cut stops past the end of the media.
    PastEnd { index: usize, duration_secs: f64 },
}

impl fmt::Display for CutWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { index } => write!(f, "cut {index} has start >= stop"),
            Self::Overlap { index } => {
                write!(f, "cut {index} starts before the previous cut ends")
            }
            Self::PastEnd {
                index,
                duration_secs,
            } => write!(f, "cut {index} stops past the media end ({duration_secs:.3}s)"),
        }
    }
}

/// Check a cut list for ordering problems without rejecting it.
pub fn lint_cuts(cuts: &[CutInterval], duration_secs: Option<f64>) -> Vec<CutWarning> {
    let mut warnings = Vec::new();
    for (index, cut) in cuts.iter().enumerate() {
        if cut.start_secs >= cut.stop_secs {
            warnings.push(CutWarning::Empty { index });
        }
        if index > 0 && cut.start_secs < cuts[index - 1].stop_secs {
            warnings.push(CutWarning::Overlap { index });
        }
        if let Some(duration_secs) = duration_secs {
            if cut.stop_secs > duration_secs {
                warnings.push(CutWarning::PastEnd {
                    index,
                    duration_secs,
                });
            }
        }
    }
    warnings
}

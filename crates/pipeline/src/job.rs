//! Run preparation: everything that can fail before a tool is invoked.

use std::path::PathBuf;

use clutch_common::error::{ClutchError, ClutchResult};
use clutch_edit_model::edl::{lint_cuts, load_edl, CutInterval, CutWarning};
use clutch_edit_model::media::MediaInfo;
use clutch_edit_model::segment::{keep_segments, kept_duration_secs, KeepSegment};

use crate::layout::RunLayout;
use crate::plan::{PipelinePlan, PlanBuilder};
use crate::probe::MediaProbe;

/// A request to cut one input file.
#[derive(Debug, Clone)]
pub struct CutJob {
    /// Recording to cut.
    pub input: PathBuf,

    /// Directory for transient files and output; `None` for the input's directory.
    pub temp_dir: Option<PathBuf>,

    /// Extension of the EDL next to the input.
    pub edl_extension: String,

    /// ffmpeg binary used in the plan.
    pub ffmpeg: PathBuf,
}

/// Inputs resolved and plan built, ready for the executor.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub layout: RunLayout,
    pub cuts: Vec<CutInterval>,
    pub warnings: Vec<CutWarning>,
    pub media: MediaInfo,
    pub segments: Vec<KeepSegment>,
    pub plan: PipelinePlan,
}

/// Resolve paths, parse the EDL, probe the input, and build the plan.
///
/// Malformed EDLs and probe failures surface here, before any step of the
/// plan has run.
pub fn prepare_run(job: &CutJob, probe: &dyn MediaProbe) -> ClutchResult<PreparedRun> {
    if !job.input.is_file() {
        return Err(ClutchError::FileNotFound {
            path: job.input.clone(),
        });
    }

    let layout = RunLayout::new(&job.input, job.temp_dir.as_deref(), &job.edl_extension)?;
    tracing::debug!(
        edl = %layout.edl.display(),
        temp_dir = %layout.temp_dir.display(),
        output = %layout.output.display(),
        "Resolved run layout"
    );

    let cuts = load_edl(&layout.edl)?;
    let media = probe.probe(&job.input)?;

    let warnings = lint_cuts(&cuts, Some(media.duration_secs));
    for warning in &warnings {
        tracing::warn!(edl = %layout.edl.display(), "{warning}");
    }

    let segments = keep_segments(&cuts, media.duration_secs);
    tracing::info!(
        cuts = cuts.len(),
        segments = segments.len(),
        input_secs = media.duration_secs,
        output_secs = kept_duration_secs(&segments),
        "Computed segments to keep"
    );

    let plan = PlanBuilder::new(&layout)
        .with_ffmpeg(job.ffmpeg.clone())
        .build(&segments, &media)?;

    Ok(PreparedRun {
        layout,
        cuts,
        warnings,
        media,
        segments,
        plan,
    })
}

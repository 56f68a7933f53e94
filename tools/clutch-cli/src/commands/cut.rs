//! Cut the EDL's segments out of a recording.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clutch_common::config::AppConfig;
use clutch_common::error::ClutchError;
use clutch_edit_model::segment::kept_duration_secs;
use clutch_pipeline::executor::{ExecutionMode, PipelineExecutor, StepNotice, StepStatus};
use clutch_pipeline::job::{prepare_run, CutJob};
use clutch_pipeline::probe::FfprobeProbe;
use clutch_pipeline::runner::ProcessRunner;

pub async fn run(input: PathBuf, dry_run: bool, config: AppConfig) -> anyhow::Result<()> {
    let job = CutJob {
        input,
        temp_dir: config.temp_dir.clone(),
        edl_extension: config.edl_extension.clone(),
        ffmpeg: config.tools.ffmpeg.clone(),
    };
    let probe = FfprobeProbe::new(config.tools.ffprobe.clone());
    let prepared = prepare_run(&job, &probe)?;

    println!("Cutting: {}", prepared.layout.input.display());
    println!("  EDL: {} ({} cuts)", prepared.layout.edl.display(), prepared.cuts.len());
    println!(
        "  Media: {:.3}s, video {}, audio {}",
        prepared.media.duration_secs, prepared.media.video_codec, prepared.media.audio_codec
    );
    println!(
        "  Keeping {} segment(s), {:.3}s",
        prepared.segments.len(),
        kept_duration_secs(&prepared.segments)
    );
    println!("  Output: {}", prepared.layout.output.display());
    for warning in &prepared.warnings {
        println!("  [WARN] {warning}");
    }
    println!();

    let mode = if dry_run {
        ExecutionMode::DryRun
    } else {
        ExecutionMode::Run
    };
    let executor = PipelineExecutor::new(ProcessRunner)
        .with_mode(mode)
        .with_failure_policy(config.failure_policy)
        .with_trim_jobs(config.effective_trim_jobs())
        .with_report(Box::new(|notice: StepNotice<'_>| {
            println!("{}", notice.invocation.command());
        }));

    let stop_flag = executor.stop_flag();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Stopping after the current step...");
            stop_flag.store(true, Ordering::SeqCst);
        }
    });

    let plan = prepared.plan;
    let outcome = tokio::task::spawn_blocking(move || executor.execute(&plan)).await;
    ctrl_c.abort();

    let report = outcome??;
    if dry_run {
        println!("\nDry run: {} step(s) planned", report.steps.len());
        return Ok(());
    }

    let failed: Vec<usize> = report
        .steps
        .iter()
        .enumerate()
        .filter(|(_, s)| matches!(s.status, StepStatus::Failed(_)))
        .map(|(idx, _)| idx + 1)
        .collect();

    match failed.first() {
        None => {
            println!("\nCut complete: {}", prepared.layout.output.display());
            Ok(())
        }
        Some(&first) => Err(ClutchError::tool(
            first,
            format!(
                "{} step(s) failed ({failed:?}); output may be incomplete",
                failed.len()
            ),
        )
        .into()),
    }
}

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use clutch_common::config::FailurePolicy;
use clutch_common::error::{ClutchError, ClutchResult};
use clutch_edit_model::media::MediaInfo;
use clutch_pipeline::executor::{ExecutionMode, PipelineExecutor, StepNotice, StepStatus};
use clutch_pipeline::job::{prepare_run, CutJob, PreparedRun};
use clutch_pipeline::plan::ToolCall;
use clutch_pipeline::probe::MediaProbe;
use clutch_pipeline::runner::ToolRunner;

struct FixedProbe {
    info: Option<MediaInfo>,
    calls: AtomicUsize,
}

impl FixedProbe {
    fn new(duration_secs: f64) -> Self {
        Self {
            info: Some(MediaInfo {
                duration_secs,
                video_codec: "mpeg2video".to_string(),
                audio_codec: "ac3".to_string(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            info: None,
            calls: AtomicUsize::new(0),
        }
    }
}

impl MediaProbe for FixedProbe {
    fn probe(&self, path: &Path) -> ClutchResult<MediaInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.info
            .clone()
            .ok_or_else(|| ClutchError::probe(path, "no duration reported"))
    }
}

/// Stands in for ffmpeg: records calls, writes the output argument, and
/// snapshots the concat list when asked to concatenate.
#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<String>>,
    concat_list: Mutex<Option<String>>,
    fail_when: Option<String>,
    fail_after_write: Option<String>,
    stop_after: Option<(String, Arc<AtomicBool>)>,
    interrupt_on: Option<(String, Arc<AtomicBool>)>,
}

impl RecordingRunner {
    fn failing_on(needle: &str) -> Self {
        Self {
            fail_when: Some(needle.to_string()),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ToolRunner for RecordingRunner {
    fn run(&self, call: &ToolCall) -> ClutchResult<()> {
        let rendered = call
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(rendered.clone());

        if let Some(needle) = &self.fail_when {
            if rendered.contains(needle.as_str()) {
                return Err(ClutchError::config("simulated ffmpeg failure"));
            }
        }

        if rendered.contains("-f concat") {
            let list_pos = call.args.iter().rposition(|a| a == "-i").unwrap() + 1;
            let list = std::fs::read_to_string(&call.args[list_pos]).ok();
            *self.concat_list.lock().unwrap() = list;
        }

        let output = PathBuf::from(call.args.last().unwrap());
        std::fs::write(output, b"media")?;

        if let Some(needle) = &self.fail_after_write {
            if rendered.contains(needle.as_str()) {
                return Err(ClutchError::config("simulated ffmpeg failure mid-write"));
            }
        }

        // Ctrl+C reaches the child too: the flag goes up and ffmpeg exits non-zero.
        if let Some((needle, flag)) = &self.interrupt_on {
            if rendered.contains(needle.as_str()) {
                flag.store(true, Ordering::SeqCst);
                return Err(ClutchError::config("ffmpeg exited with 255"));
            }
        }

        if let Some((needle, flag)) = &self.stop_after {
            if rendered.contains(needle.as_str()) {
                flag.store(true, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    run: PreparedRun,
}

impl Fixture {
    /// Two breaks in an hour-long recording: three segments, 13 steps.
    fn hour_with_two_breaks() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("show.mpg"), b"source").unwrap();
        std::fs::write(
            dir.path().join("show.edl"),
            "600.0\t660.0\t0\n1800.0\t1830.0\t0\n",
        )
        .unwrap();

        let job = CutJob {
            input: dir.path().join("show.mpg"),
            temp_dir: None,
            edl_extension: "edl".to_string(),
            ffmpeg: PathBuf::from("ffmpeg"),
        };
        let run = prepare_run(&job, &FixedProbe::new(3600.0)).unwrap();
        Self { dir, run }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

#[test]
fn dry_run_reports_every_step_and_touches_nothing() {
    let fixture = Fixture::hour_with_two_breaks();
    let announced = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&announced);

    let executor = PipelineExecutor::new(RecordingRunner::default())
        .with_mode(ExecutionMode::DryRun)
        .with_trim_jobs(4)
        .with_report(Box::new(move |notice: StepNotice<'_>| {
            sink.lock()
                .unwrap()
                .push((notice.step, notice.invocation.command().to_string()));
        }));

    let report = executor.execute(&fixture.run.plan).unwrap();

    assert!(executor.runner().calls().is_empty());
    assert!(!fixture.path("show.txt").exists());
    assert!(report.steps.iter().all(|s| s.status == StepStatus::Planned));

    let announced = announced.lock().unwrap();
    assert_eq!(
        announced.iter().map(|(step, _)| *step).collect::<Vec<_>>(),
        (1..=13).collect::<Vec<_>>()
    );
    let commands: Vec<&str> = fixture.run.plan.iter().map(|inv| inv.command()).collect();
    assert_eq!(
        announced.iter().map(|(_, cmd)| cmd.as_str()).collect::<Vec<_>>(),
        commands
    );
}

#[test]
fn full_run_concatenates_in_order_and_cleans_up() {
    let fixture = Fixture::hour_with_two_breaks();
    let executor = PipelineExecutor::new(RecordingRunner::default());

    let report = executor.execute(&fixture.run.plan).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.succeeded_count(), 13);
    assert_eq!(executor.runner().calls().len(), 5);
    assert_eq!(
        executor.runner().concat_list.lock().unwrap().as_deref(),
        Some("file 'show.part0.mpg'\nfile 'show.part1.mpg'\nfile 'show.part2.mpg'\n")
    );

    assert!(fixture.path("show.cut.mpg").exists());
    assert!(fixture.path("show.mpg").exists());
    for transient in [
        "show.fix.mpg",
        "show.txt",
        "show.part0.mpg",
        "show.part1.mpg",
        "show.part2.mpg",
    ] {
        assert!(!fixture.path(transient).exists(), "{transient} left behind");
    }
}

#[test]
fn parallel_trims_keep_list_order() {
    let fixture = Fixture::hour_with_two_breaks();
    let announced = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&announced);

    let executor = PipelineExecutor::new(RecordingRunner::default())
        .with_trim_jobs(3)
        .with_report(Box::new(move |notice: StepNotice<'_>| {
            sink.lock().unwrap().push(notice.step)
        }));

    let report = executor.execute(&fixture.run.plan).unwrap();

    assert!(report.is_clean());
    assert_eq!(*announced.lock().unwrap(), (1..=13).collect::<Vec<_>>());
    assert_eq!(
        executor.runner().concat_list.lock().unwrap().as_deref(),
        Some("file 'show.part0.mpg'\nfile 'show.part1.mpg'\nfile 'show.part2.mpg'\n")
    );
    assert!(!fixture.path("show.part1.mpg").exists());
}

#[test]
fn abort_policy_stops_and_removes_partial_files() {
    let fixture = Fixture::hour_with_two_breaks();
    let executor = PipelineExecutor::new(RecordingRunner::failing_on("show.part1.mpg"))
        .with_failure_policy(FailurePolicy::Abort);

    let err = executor.execute(&fixture.run.plan).unwrap_err();

    assert!(matches!(err, ClutchError::ExternalToolFailure { step: 3, .. }));
    assert_eq!(executor.runner().calls().len(), 3);
    assert!(!fixture.path("show.fix.mpg").exists());
    assert!(!fixture.path("show.part0.mpg").exists());
    assert!(!fixture.path("show.txt").exists());
    assert!(!fixture.path("show.cut.mpg").exists());
    assert!(fixture.path("show.mpg").exists());
}

#[test]
fn continue_policy_runs_remaining_steps() {
    let fixture = Fixture::hour_with_two_breaks();
    let executor = PipelineExecutor::new(RecordingRunner::failing_on("show.part1.mpg"))
        .with_failure_policy(FailurePolicy::Continue);

    let report = executor.execute(&fixture.run.plan).unwrap();

    assert_eq!(report.failure_count(), 1);
    assert!(matches!(report.steps[2].status, StepStatus::Failed(_)));
    assert_eq!(report.succeeded_count(), 12);
    assert_eq!(executor.runner().calls().len(), 5);
    assert!(fixture.path("show.cut.mpg").exists());
    assert!(!fixture.path("show.fix.mpg").exists());
}

#[test]
fn stop_flag_cancels_and_cleans_up_executed_steps() {
    let fixture = Fixture::hour_with_two_breaks();
    let flag = Arc::new(AtomicBool::new(false));
    let runner = RecordingRunner {
        stop_after: Some(("show.part0.mpg".to_string(), Arc::clone(&flag))),
        ..RecordingRunner::default()
    };
    let executor = PipelineExecutor::new(runner).with_stop_flag(flag);

    let err = executor.execute(&fixture.run.plan).unwrap_err();

    assert!(matches!(err, ClutchError::Cancelled));
    assert_eq!(err.exit_code(), clutch_common::error::EXIT_CANCELLED);
    assert_eq!(executor.runner().calls().len(), 2);
    assert!(!fixture.path("show.fix.mpg").exists());
    assert!(!fixture.path("show.part0.mpg").exists());
}

#[test]
fn interrupted_tool_ends_run_as_cancelled() {
    let fixture = Fixture::hour_with_two_breaks();
    let flag = Arc::new(AtomicBool::new(false));
    let runner = RecordingRunner {
        interrupt_on: Some(("show.part1.mpg".to_string(), Arc::clone(&flag))),
        ..RecordingRunner::default()
    };
    let executor = PipelineExecutor::new(runner)
        .with_failure_policy(FailurePolicy::Abort)
        .with_stop_flag(flag);

    let err = executor.execute(&fixture.run.plan).unwrap_err();

    assert!(matches!(err, ClutchError::Cancelled), "got {err:?}");
    assert_eq!(err.exit_code(), clutch_common::error::EXIT_CANCELLED);
    assert_eq!(executor.runner().calls().len(), 3);
    for transient in ["show.fix.mpg", "show.part0.mpg", "show.part1.mpg"] {
        assert!(!fixture.path(transient).exists(), "{transient} left behind");
    }
}

#[test]
fn interrupted_parallel_trims_end_run_as_cancelled() {
    let fixture = Fixture::hour_with_two_breaks();
    let flag = Arc::new(AtomicBool::new(false));
    let runner = RecordingRunner {
        interrupt_on: Some(("show.part1.mpg".to_string(), Arc::clone(&flag))),
        ..RecordingRunner::default()
    };
    let executor = PipelineExecutor::new(runner)
        .with_trim_jobs(3)
        .with_stop_flag(flag);

    let err = executor.execute(&fixture.run.plan).unwrap_err();

    assert!(matches!(err, ClutchError::Cancelled), "got {err:?}");
    assert!(!fixture.path("show.part1.mpg").exists());
    assert!(!fixture.path("show.txt").exists());
}

#[test]
fn failed_concat_leaves_no_partial_output() {
    let fixture = Fixture::hour_with_two_breaks();
    let runner = RecordingRunner {
        fail_after_write: Some("-f concat".to_string()),
        ..RecordingRunner::default()
    };
    let executor = PipelineExecutor::new(runner).with_failure_policy(FailurePolicy::Abort);

    let err = executor.execute(&fixture.run.plan).unwrap_err();

    assert!(matches!(err, ClutchError::ExternalToolFailure { step: 8, .. }));
    assert!(!fixture.path("show.cut.mpg").exists());
    for transient in ["show.fix.mpg", "show.txt", "show.part0.mpg", "show.part2.mpg"] {
        assert!(!fixture.path(transient).exists(), "{transient} left behind");
    }
    assert!(fixture.path("show.mpg").exists());
}

#[test]
fn failed_concat_under_continue_still_removes_partial_output() {
    let fixture = Fixture::hour_with_two_breaks();
    let runner = RecordingRunner {
        fail_after_write: Some("-f concat".to_string()),
        ..RecordingRunner::default()
    };
    let executor = PipelineExecutor::new(runner).with_failure_policy(FailurePolicy::Continue);

    let report = executor.execute(&fixture.run.plan).unwrap();

    assert_eq!(report.failure_count(), 1);
    assert!(matches!(report.steps[7].status, StepStatus::Failed(_)));
    assert!(!fixture.path("show.cut.mpg").exists());
    assert!(!fixture.path("show.fix.mpg").exists());
}

#[test]
fn malformed_edl_fails_before_probing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("show.mpg"), b"source").unwrap();
    std::fs::write(dir.path().join("show.edl"), "600.0 660.0 0\n").unwrap();

    let probe = FixedProbe::new(3600.0);
    let job = CutJob {
        input: dir.path().join("show.mpg"),
        temp_dir: None,
        edl_extension: "edl".to_string(),
        ffmpeg: PathBuf::from("ffmpeg"),
    };
    let err = prepare_run(&job, &probe).unwrap_err();

    assert!(matches!(err, ClutchError::MalformedRecord { line: 1, .. }));
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_edl_and_probe_failure_are_input_errors() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("show.mpg"), b"source").unwrap();
    let job = CutJob {
        input: dir.path().join("show.mpg"),
        temp_dir: None,
        edl_extension: "edl".to_string(),
        ffmpeg: PathBuf::from("ffmpeg"),
    };

    let err = prepare_run(&job, &FixedProbe::new(60.0)).unwrap_err();
    assert!(matches!(err, ClutchError::FileNotFound { .. }));

    std::fs::write(dir.path().join("show.edl"), "").unwrap();
    let err = prepare_run(&job, &FixedProbe::failing()).unwrap_err();
    assert!(matches!(err, ClutchError::ProbeFailure { .. }));
    assert_eq!(err.exit_code(), clutch_common::error::EXIT_INPUT_ERROR);
}

#[test]
fn separate_temp_dir_holds_transients_and_output() {
    let input_dir = tempfile::tempdir().unwrap();
    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::write(input_dir.path().join("show.ts"), b"source").unwrap();
    std::fs::write(input_dir.path().join("show.cuts"), "0\t30\t0\n").unwrap();

    let job = CutJob {
        input: input_dir.path().join("show.ts"),
        temp_dir: Some(temp_dir.path().to_path_buf()),
        edl_extension: "cuts".to_string(),
        ffmpeg: PathBuf::from("ffmpeg"),
    };
    let run = prepare_run(&job, &FixedProbe::new(1800.0)).unwrap();
    assert_eq!(run.segments.len(), 1);
    assert_eq!(run.layout.output, temp_dir.path().join("show.ts"));

    let executor = PipelineExecutor::new(RecordingRunner::default());
    executor.execute(&run.plan).unwrap();

    assert!(temp_dir.path().join("show.ts").exists());
    assert!(!temp_dir.path().join("show.part1.ts").exists());
    assert!(!temp_dir.path().join("show.fix.ts").exists());
}

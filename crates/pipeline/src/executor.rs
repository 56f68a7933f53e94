//! Plan execution.
//!
//! Steps run strictly in plan order. Every step is announced (log line and
//! report callback) before it runs, in dry runs too. The only concurrency is
//! an optional fan-out of consecutive trim steps, which all read the same
//! immutable intermediate file; their results are joined and recorded in
//! plan order before any list append runs.
//!
//! When a run stops early, because of a failure under
//! [`FailurePolicy::Abort`] or because the stop flag was raised, the plan's
//! delete steps still run for every file an executed step wrote. A failed
//! concat never leaves its partial output behind.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clutch_common::config::FailurePolicy;
use clutch_common::error::{ClutchError, ClutchResult};
use rayon::prelude::*;

use crate::plan::{concat_list_line, Action, Invocation, InvocationKind, PipelinePlan};
use crate::runner::ToolRunner;

/// Whether steps are carried out or only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    DryRun,
    Run,
}

/// Announcement of a step about to run.
#[derive(Debug, Clone, Copy)]
pub struct StepNotice<'a> {
    /// 1-based position in the plan.
    pub step: usize,
    pub total: usize,
    pub invocation: &'a Invocation,
}

/// Called once per step before it runs.
pub type ReportCallback = Box<dyn Fn(StepNotice<'_>) + Send + Sync>;

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// Dry run: reported, not executed.
    Planned,
    Succeeded,
    Failed(String),
    NotRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub kind: &'static str,
    pub command: String,
    pub status: StepStatus,
}

/// Per-step outcomes of a run, in plan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub mode: ExecutionMode,
    pub steps: Vec<StepOutcome>,
}

impl ExecutionReport {
    fn new(mode: ExecutionMode, invocations: &[Invocation]) -> Self {
        Self {
            mode,
            steps: invocations
                .iter()
                .map(|inv| StepOutcome {
                    kind: inv.kind.label(),
                    command: inv.command().to_string(),
                    status: StepStatus::NotRun,
                })
                .collect(),
        }
    }

    pub fn failure_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Failed(_)))
            .count()
    }

    pub fn succeeded_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Succeeded)
            .count()
    }

    /// Every step ran (or was planned) without failure.
    pub fn is_clean(&self) -> bool {
        self.steps
            .iter()
            .all(|s| matches!(s.status, StepStatus::Succeeded | StepStatus::Planned))
    }
}

/// Runs a [`PipelinePlan`] against a [`ToolRunner`].
pub struct PipelineExecutor<R: ToolRunner> {
    runner: R,
    mode: ExecutionMode,
    policy: FailurePolicy,
    trim_jobs: usize,
    stop_flag: Arc<AtomicBool>,
    report: Option<ReportCallback>,
}

impl<R: ToolRunner> PipelineExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            mode: ExecutionMode::Run,
            policy: FailurePolicy::default(),
            trim_jobs: 1,
            stop_flag: Arc::new(AtomicBool::new(false)),
            report: None,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Maximum concurrent trim steps. Values below 1 mean sequential.
    pub fn with_trim_jobs(mut self, jobs: usize) -> Self {
        self.trim_jobs = jobs.max(1);
        self
    }

    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = flag;
        self
    }

    pub fn with_report(mut self, callback: ReportCallback) -> Self {
        self.report = Some(callback);
        self
    }

    /// Flag that requests a cooperative stop when set.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_flag)
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Execute the plan.
    ///
    /// Under [`FailurePolicy::Continue`] failed steps are recorded in the
    /// report and the call still returns `Ok`. Under
    /// [`FailurePolicy::Abort`] the first failure ends the run with
    /// [`ClutchError::ExternalToolFailure`] after cleanup, or with
    /// [`ClutchError::Cancelled`] if a stop was already requested when the
    /// step failed (an interrupted tool exits non-zero).
    pub fn execute(&self, plan: &PipelinePlan) -> ClutchResult<ExecutionReport> {
        let invocations = plan.invocations();
        let total = invocations.len();
        let mut report = ExecutionReport::new(self.mode, invocations);
        let mut written: HashSet<PathBuf> = HashSet::new();
        let mut halt: Option<ClutchError> = None;

        tracing::info!(
            steps = total,
            mode = ?self.mode,
            policy = ?self.policy,
            trim_jobs = self.trim_jobs,
            runner = self.runner.name(),
            "Executing plan"
        );

        let mut next = 0;
        while next < total {
            if self.is_stopped() {
                tracing::warn!(step = next + 1, "Stop requested");
                halt = Some(ClutchError::Cancelled);
                break;
            }

            let batch = self.next_batch(invocations, next);
            for step in batch.clone() {
                self.announce(step, total, &invocations[step]);
            }

            if self.mode == ExecutionMode::DryRun {
                for step in batch.clone() {
                    report.steps[step].status = StepStatus::Planned;
                }
                next = batch.end;
                continue;
            }

            let results = if batch.len() > 1 {
                match self.perform_parallel(invocations, batch.clone()) {
                    Ok(results) => results,
                    Err(err) => {
                        halt = Some(err);
                        break;
                    }
                }
            } else {
                vec![(batch.start, self.perform(&invocations[batch.start]))]
            };

            for (step, result) in results {
                if let Some(path) = invocations[step].produces() {
                    written.insert(path.to_path_buf());
                }
                match result {
                    Ok(()) => report.steps[step].status = StepStatus::Succeeded,
                    Err(err) => {
                        let message = err.to_string();
                        tracing::error!(
                            step = step + 1,
                            kind = invocations[step].kind.label(),
                            error = %message,
                            "Step failed"
                        );
                        report.steps[step].status = StepStatus::Failed(message.clone());
                        if invocations[step].kind == InvocationKind::Concat {
                            self.discard_partial_output(&invocations[step]);
                        }
                        match self.policy {
                            FailurePolicy::Continue => {
                                tracing::warn!(step = step + 1, "Continuing after failure");
                            }
                            FailurePolicy::Abort => {
                                if halt.is_none() {
                                    halt = Some(if self.is_stopped() {
                                        ClutchError::Cancelled
                                    } else {
                                        ClutchError::tool(step + 1, message)
                                    });
                                }
                            }
                        }
                    }
                }
            }

            if halt.is_some() {
                break;
            }
            next = batch.end;
        }

        match halt {
            Some(err) => {
                self.cleanup(invocations, &written, &mut report);
                Err(err)
            }
            None => {
                tracing::info!(
                    succeeded = report.succeeded_count(),
                    failed = report.failure_count(),
                    "Plan finished"
                );
                Ok(report)
            }
        }
    }

    fn is_stopped(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }

    /// Steps to run together starting at `start`: a run of consecutive
    /// trims when fan-out is enabled, otherwise a single step.
    fn next_batch(&self, invocations: &[Invocation], start: usize) -> Range<usize> {
        if self.trim_jobs > 1 && invocations[start].is_trim() {
            let len = invocations[start..]
                .iter()
                .take_while(|inv| inv.is_trim())
                .count();
            start..start + len
        } else {
            start..start + 1
        }
    }

    fn announce(&self, step: usize, total: usize, invocation: &Invocation) {
        match self.mode {
            ExecutionMode::DryRun => tracing::info!(
                step = step + 1,
                total,
                kind = invocation.kind.label(),
                command = %invocation.command(),
                "Planned step"
            ),
            ExecutionMode::Run => tracing::info!(
                step = step + 1,
                total,
                kind = invocation.kind.label(),
                command = %invocation.command(),
                "Running step"
            ),
        }
        if let InvocationKind::Remux {
            video_codec,
            audio_codec,
        } = &invocation.kind
        {
            tracing::info!(%video_codec, %audio_codec, "Remuxing first video and audio streams");
        }
        if let Some(cb) = &self.report {
            cb(StepNotice {
                step: step + 1,
                total,
                invocation,
            });
        }
    }

    fn perform(&self, invocation: &Invocation) -> ClutchResult<()> {
        match &invocation.action {
            Action::Tool(call) => self.runner.run(call),
            Action::AppendToList {
                list,
                entry,
                truncate,
            } => append_list_entry(list, entry, *truncate),
            Action::Delete { path } => delete_file(path),
        }
    }

    /// Run a batch on a pool of at most `trim_jobs` workers. Results come
    /// back in step order. Steps not started before a stop request are
    /// absent from the result.
    fn perform_parallel(
        &self,
        invocations: &[Invocation],
        batch: Range<usize>,
    ) -> ClutchResult<Vec<(usize, ClutchResult<()>)>> {
        let workers = self.trim_jobs.min(batch.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("clutch-trim-{i}"))
            .build()
            .map_err(|e| {
                ClutchError::Other(anyhow::anyhow!("failed to start trim workers: {e}"))
            })?;

        tracing::debug!(steps = batch.len(), workers, "Fanning out trims");
        let results: Vec<Option<(usize, ClutchResult<()>)>> = pool.install(|| {
            batch
                .into_par_iter()
                .map(|step| {
                    if self.is_stopped() {
                        return None;
                    }
                    Some((step, self.perform(&invocations[step])))
                })
                .collect()
        });
        Ok(results.into_iter().flatten().collect())
    }

    /// Remove whatever a failed step managed to write to its output.
    fn discard_partial_output(&self, invocation: &Invocation) {
        let Some(path) = invocation.produces() else {
            return;
        };
        if let Err(err) = delete_file(path) {
            tracing::warn!(path = %path.display(), error = %err, "Could not remove partial output");
        } else {
            tracing::info!(path = %path.display(), "Removed partial output");
        }
    }

    /// Run the plan's pending delete steps for files that were written.
    fn cleanup(
        &self,
        invocations: &[Invocation],
        written: &HashSet<PathBuf>,
        report: &mut ExecutionReport,
    ) {
        let total = invocations.len();
        let pending: Vec<usize> = invocations
            .iter()
            .enumerate()
            .filter(|(step, inv)| {
                report.steps[*step].status == StepStatus::NotRun
                    && inv.deletes().is_some_and(|path| written.contains(path))
            })
            .map(|(step, _)| step)
            .collect();

        tracing::info!(steps = pending.len(), "Cleaning up after stopped run");
        for step in pending {
            let invocation = &invocations[step];
            self.announce(step, total, invocation);
            report.steps[step].status = match self.perform(invocation) {
                Ok(()) => StepStatus::Succeeded,
                Err(err) => {
                    tracing::warn!(step = step + 1, error = %err, "Cleanup step failed");
                    StepStatus::Failed(err.to_string())
                }
            };
        }
    }
}

/// Write one concat-list line, creating or truncating the list first if asked.
pub fn append_list_entry(list: &Path, entry: &Path, truncate: bool) -> ClutchResult<()> {
    let mut options = OpenOptions::new();
    options.create(true);
    if truncate {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    let mut file = options.open(list)?;
    writeln!(file, "{}", concat_list_line(entry))?;
    Ok(())
}

/// Remove a file. Already-missing files count as removed.
pub fn delete_file(path: &Path) -> ClutchResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Already removed");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

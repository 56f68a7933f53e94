//! Clutch Pipeline
//!
//! Turns a cut list into a finished recording with ffmpeg, without
//! re-encoding:
//!
//! ```text
//! show.mpg ──probe──► duration, codecs
//!     │                    │
//! show.edl ──parse──► cuts ┴─► keep segments
//!                                  │
//!                                  ▼
//!   remux ─► trim × N ─► append × N ─► concat ─► delete × (N + 2)
//!     │        │             │            │
//! show.fix  show.partI   show.txt    show.cut.mpg
//! ```
//!
//! The plan is an immutable value; the executor walks it in order and
//! announces each step before running it.

pub mod executor;
pub mod job;
pub mod layout;
pub mod plan;
pub mod probe;
pub mod runner;

pub use executor::{ExecutionMode, ExecutionReport, PipelineExecutor, StepNotice, StepStatus};
pub use job::{prepare_run, CutJob, PreparedRun};
pub use layout::RunLayout;
pub use plan::{Action, Invocation, InvocationKind, PipelinePlan, PlanBuilder, ToolCall};
pub use probe::{FfprobeProbe, MediaProbe};
pub use runner::{ProcessRunner, ToolRunner};

//! External tool execution.

use std::path::Path;
use std::process::{Command, Stdio};

use clutch_common::error::{ClutchError, ClutchResult};

use crate::plan::ToolCall;

/// Runs one external tool invocation to completion.
///
/// Implementations must be shareable across trim workers.
pub trait ToolRunner: Send + Sync {
    fn run(&self, call: &ToolCall) -> ClutchResult<()>;

    /// Runner name for logs.
    fn name(&self) -> &str;
}

/// Spawns the tool as a child process with an argument vector.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

/// Stderr kept in a failure message.
const STDERR_TAIL_LINES: usize = 20;

impl ToolRunner for ProcessRunner {
    fn run(&self, call: &ToolCall) -> ClutchResult<()> {
        let started = std::time::Instant::now();
        let output = Command::new(&call.program)
            .args(&call.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                ClutchError::Other(anyhow::anyhow!(
                    "failed to start {}: {e}",
                    call.program.display()
                ))
            })?;

        tracing::debug!(
            program = %call.program.display(),
            status = %output.status,
            elapsed_ms = started.elapsed().as_millis(),
            "Tool finished"
        );

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<&str> = stderr.trim().lines().collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
        Err(ClutchError::Other(anyhow::anyhow!(
            "{} exited with {}: {}",
            call.program.display(),
            output.status,
            tail
        )))
    }

    fn name(&self) -> &str {
        "process"
    }
}

/// Whether `program` can be started at all.
pub fn tool_available(program: &Path) -> bool {
    Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

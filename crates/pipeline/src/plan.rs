//! Invocation descriptors and the plan builder.
//!
//! A plan is a fixed sequence: one remux, a trim per keep segment, a list
//! append per keep segment, one concat, then deletes for every segment, the
//! list file and the intermediate. External tools are described as argument
//! vectors; the rendered command string is for display only and is never
//! handed to a shell.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

use clutch_common::error::{ClutchError, ClutchResult};
use clutch_edit_model::media::MediaInfo;
use clutch_edit_model::segment::KeepSegment;

use crate::layout::RunLayout;

/// What a step does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationKind {
    /// Copy the first video and audio stream into the intermediate file.
    Remux {
        video_codec: String,
        audio_codec: String,
    },
    /// Cut one keep segment out of the intermediate file.
    Trim { segment: usize },
    /// Add one segment file to the concat list.
    AppendToList { segment: usize },
    /// Join the listed segments into the output.
    Concat,
    /// Remove a transient file.
    Delete,
}

impl InvocationKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Remux { .. } => "remux",
            Self::Trim { .. } => "trim",
            Self::AppendToList { .. } => "append",
            Self::Concat => "concat",
            Self::Delete => "delete",
        }
    }
}

/// An external program with its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

/// How a step is carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Spawn an external tool.
    Tool(ToolCall),
    /// Write one concat-list line, creating the list when `truncate` is set.
    AppendToList {
        list: PathBuf,
        entry: PathBuf,
        truncate: bool,
    },
    /// Remove a file; a missing file is not an error.
    Delete { path: PathBuf },
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub kind: InvocationKind,
    pub action: Action,
    command: String,
}

impl Invocation {
    fn new(kind: InvocationKind, action: Action) -> Self {
        let command = render_action(&action);
        Self {
            kind,
            action,
            command,
        }
    }

    /// Human-readable command for reports.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// File this step creates or writes, if any.
    pub fn produces(&self) -> Option<&Path> {
        match (&self.kind, &self.action) {
            (InvocationKind::Delete, _) => None,
            (_, Action::AppendToList { list, .. }) => Some(list.as_path()),
            (_, Action::Tool(call)) => call.args.last().map(Path::new),
            (_, Action::Delete { .. }) => None,
        }
    }

    /// File this step removes, if it is a delete.
    pub fn deletes(&self) -> Option<&Path> {
        match &self.action {
            Action::Delete { path } => Some(path),
            _ => None,
        }
    }

    pub fn is_trim(&self) -> bool {
        matches!(self.kind, InvocationKind::Trim { .. })
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command)
    }
}

/// Ordered steps for one run. Built once, consumed by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelinePlan {
    invocations: Vec<Invocation>,
}

impl PipelinePlan {
    pub fn invocations(&self) -> &[Invocation] {
        &self.invocations
    }

    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Invocation> {
        self.invocations.iter()
    }

    /// Number of steps with the given kind label.
    pub fn count(&self, label: &str) -> usize {
        self.invocations
            .iter()
            .filter(|inv| inv.kind.label() == label)
            .count()
    }

    /// The rendered commands, one per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for inv in &self.invocations {
            out.push_str(inv.command());
            out.push('\n');
        }
        out
    }
}

impl<'a> IntoIterator for &'a PipelinePlan {
    type Item = &'a Invocation;
    type IntoIter = std::slice::Iter<'a, Invocation>;

    fn into_iter(self) -> Self::IntoIter {
        self.invocations.iter()
    }
}

/// Builds a [`PipelinePlan`] from keep segments and a run layout.
#[derive(Debug, Clone)]
pub struct PlanBuilder<'a> {
    layout: &'a RunLayout,
    ffmpeg: PathBuf,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(layout: &'a RunLayout) -> Self {
        Self {
            layout,
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }

    /// Use a specific ffmpeg binary.
    pub fn with_ffmpeg(mut self, program: impl Into<PathBuf>) -> Self {
        self.ffmpeg = program.into();
        self
    }

    /// Produce the plan. Fails when there is nothing left to keep.
    pub fn build(&self, segments: &[KeepSegment], media: &MediaInfo) -> ClutchResult<PipelinePlan> {
        if segments.is_empty() {
            return Err(ClutchError::config(
                "cut list removes the entire file; nothing to keep",
            ));
        }

        let layout = self.layout;
        let mut invocations = Vec::with_capacity(3 * segments.len() + 4);

        invocations.push(Invocation::new(
            InvocationKind::Remux {
                video_codec: media.video_codec.clone(),
                audio_codec: media.audio_codec.clone(),
            },
            Action::Tool(self.ffmpeg_call(vec![
                "-i".into(),
                layout.input.clone().into(),
                "-map".into(),
                "0:v:0".into(),
                "-map".into(),
                "0:a:0".into(),
                "-c:v".into(),
                "copy".into(),
                "-c:a".into(),
                "copy".into(),
                layout.intermediate.clone().into(),
            ])),
        ));

        for segment in segments {
            invocations.push(Invocation::new(
                InvocationKind::Trim {
                    segment: segment.index,
                },
                Action::Tool(self.ffmpeg_call(vec![
                    "-ss".into(),
                    format_secs(segment.interval.offset_secs).into(),
                    "-i".into(),
                    layout.intermediate.clone().into(),
                    "-t".into(),
                    format_secs(segment.interval.length_secs).into(),
                    "-map".into(),
                    "0".into(),
                    "-c".into(),
                    "copy".into(),
                    "-avoid_negative_ts".into(),
                    "make_zero".into(),
                    layout.segment_path(segment.index).into(),
                ])),
            ));
        }

        for (position, segment) in segments.iter().enumerate() {
            invocations.push(Invocation::new(
                InvocationKind::AppendToList {
                    segment: segment.index,
                },
                Action::AppendToList {
                    list: layout.list_file.clone(),
                    entry: layout.segment_path(segment.index),
                    truncate: position == 0,
                },
            ));
        }

        invocations.push(Invocation::new(
            InvocationKind::Concat,
            Action::Tool(self.ffmpeg_call(vec![
                "-f".into(),
                "concat".into(),
                "-safe".into(),
                "0".into(),
                "-i".into(),
                layout.list_file.clone().into(),
                "-map".into(),
                "0".into(),
                "-c".into(),
                "copy".into(),
                layout.output.clone().into(),
            ])),
        ));

        let cleanup = segments
            .iter()
            .map(|segment| layout.segment_path(segment.index))
            .chain([layout.list_file.clone(), layout.intermediate.clone()]);
        for path in cleanup {
            invocations.push(Invocation::new(
                InvocationKind::Delete,
                Action::Delete { path },
            ));
        }

        tracing::debug!(
            steps = invocations.len(),
            segments = segments.len(),
            output = %layout.output.display(),
            "Built pipeline plan"
        );
        Ok(PipelinePlan { invocations })
    }

    fn ffmpeg_call(&self, args: Vec<OsString>) -> ToolCall {
        let mut full: Vec<OsString> = vec!["-hide_banner".into(), "-nostdin".into(), "-y".into()];
        full.extend(args);
        ToolCall {
            program: self.ffmpeg.clone(),
            args: full,
        }
    }
}

/// Seconds as passed to ffmpeg. Shortest round-trip form, no rounding.
fn format_secs(secs: f64) -> String {
    format!("{secs}")
}

/// Line written to the concat list for a segment.
///
/// Entries are file names: the concat demuxer resolves them against the
/// list file's directory, which is where segments are written.
pub fn concat_list_line(entry: &Path) -> String {
    let name = entry
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_else(|| entry.to_string_lossy());
    format!("file '{}'", name.replace('\'', r"'\''"))
}

fn render_action(action: &Action) -> String {
    match action {
        Action::Tool(call) => std::iter::once(call.program.as_os_str())
            .chain(call.args.iter().map(OsString::as_os_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" "),
        Action::AppendToList {
            list,
            entry,
            truncate,
        } => format!(
            "echo {} {} {}",
            shell_quote(OsStr::new(&concat_list_line(entry))),
            if *truncate { ">" } else { ">>" },
            shell_quote(list.as_os_str())
        ),
        Action::Delete { path } => format!("rm -f {}", shell_quote(path.as_os_str())),
    }
}

/// POSIX single-quote a word for display, leaving plain words bare.
fn shell_quote(word: &OsStr) -> String {
    let word = word.to_string_lossy();
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if plain {
        word.into_owned()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

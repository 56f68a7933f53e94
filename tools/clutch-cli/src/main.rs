//! Clutch CLI — remove commercials from recordings using an EDL.
//!
//! Usage:
//!   clutch cut <INPUT>      Cut the segments listed in <INPUT>'s EDL
//!   clutch probe <INPUT>    Show duration and codecs of a recording
//!   clutch edl <EDL>        Parse and check a cut list
//!   clutch check            Check that ffmpeg and ffprobe are usable

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use clutch_common::config::{AppConfig, FailurePolicy};
use clutch_common::error::{ClutchError, EXIT_TOOL_FAILURE};

mod commands;

#[derive(Parser)]
#[command(
    name = "clutch",
    about = "Cut commercials out of recordings without re-encoding",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove the EDL's cuts from a recording
    Cut {
        /// Recording to cut; the EDL is expected next to it
        input: PathBuf,

        /// Print the steps without running anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Directory for intermediate files and the output
        #[arg(short, long)]
        tmp: Option<PathBuf>,

        /// EDL file extension
        #[arg(short, long)]
        edl_ext: Option<String>,

        /// Keep running the remaining steps after a step fails
        #[arg(long, conflicts_with = "failure_policy")]
        keep_going: bool,

        /// What to do when a step fails: abort or continue
        #[arg(long, value_name = "POLICY")]
        failure_policy: Option<FailurePolicy>,

        /// Concurrent trim jobs (0 = one per CPU)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Show duration and codecs of a recording
    Probe {
        /// Recording to inspect
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Parse an EDL and show what would be kept
    Edl {
        /// Path to the EDL
        path: PathBuf,

        /// Media duration in seconds, to compute keep segments
        #[arg(short, long)]
        duration: Option<f64>,
    },

    /// Check that the external tools are usable
    Check,
}

/// Failure policy requested on the command line, if any.
fn policy_override(keep_going: bool, explicit: Option<FailurePolicy>) -> Option<FailurePolicy> {
    if keep_going {
        Some(FailurePolicy::Continue)
    } else {
        explicit
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut config = AppConfig::load();

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    clutch_common::logging::init_logging(&config.logging);

    let result = match cli.command {
        Commands::Cut {
            input,
            dry_run,
            tmp,
            edl_ext,
            keep_going,
            failure_policy,
            jobs,
        } => {
            if let Some(tmp) = tmp {
                config.temp_dir = Some(tmp);
            }
            if let Some(ext) = edl_ext {
                config.edl_extension = ext;
            }
            if let Some(policy) = policy_override(keep_going, failure_policy) {
                config.failure_policy = policy;
            }
            if let Some(jobs) = jobs {
                config.trim_jobs = jobs;
            }
            commands::cut::run(input, dry_run, config).await
        }
        Commands::Probe { input, json } => commands::probe::run(input, json, &config),
        Commands::Edl { path, duration } => commands::edl::run(path, duration),
        Commands::Check => commands::check::run(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err
                .downcast_ref::<ClutchError>()
                .map_or(EXIT_TOOL_FAILURE, ClutchError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

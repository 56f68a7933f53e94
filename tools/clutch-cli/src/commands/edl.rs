//! Parse and check a cut list.

use std::path::PathBuf;

use clutch_edit_model::edl::{lint_cuts, load_edl};
use clutch_edit_model::segment::{keep_segments, kept_duration_secs};

pub fn run(path: PathBuf, duration: Option<f64>) -> anyhow::Result<()> {
    println!("Checking EDL at: {}", path.display());

    let cuts = load_edl(&path)?;
    println!("  Cuts: {}", cuts.len());
    for (idx, cut) in cuts.iter().enumerate() {
        println!(
            "    {idx}: {:.3} -> {:.3} ({:.3}s) {}",
            cut.start_secs,
            cut.stop_secs,
            cut.length_secs(),
            cut.label
        );
    }

    let warnings = lint_cuts(&cuts, duration);
    if warnings.is_empty() {
        println!("  No ordering problems found.");
    } else {
        println!("\n{} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  - {warning}");
        }
    }

    if let Some(duration) = duration {
        let segments = keep_segments(&cuts, duration);
        println!("\nKeep segments:");
        for segment in &segments {
            println!(
                "    part{}: {:.3} + {:.3}s",
                segment.index, segment.interval.offset_secs, segment.interval.length_secs
            );
        }
        println!(
            "  Output length: {:.3}s of {:.3}s",
            kept_duration_secs(&segments),
            duration
        );
    }

    Ok(())
}

//! Show what the probe reports for a recording.

use std::path::PathBuf;

use clutch_common::config::AppConfig;
use clutch_pipeline::probe::{FfprobeProbe, MediaProbe};

pub fn run(input: PathBuf, json: bool, config: &AppConfig) -> anyhow::Result<()> {
    let media = FfprobeProbe::new(config.tools.ffprobe.clone()).probe(&input)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&media)?);
        return Ok(());
    }

    println!("Recording: {}", input.display());
    println!("  Duration: {:.3}s", media.duration_secs);
    println!("  Video codec: {}", media.video_codec);
    println!("  Audio codec: {}", media.audio_codec);

    Ok(())
}

//! Check that the external tools are usable.

use clutch_common::config::{config_file_path, AppConfig};
use clutch_pipeline::runner::tool_available;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Clutch System Check");
    println!("{}", "=".repeat(50));

    let tools = [("ffmpeg", &config.tools.ffmpeg), ("ffprobe", &config.tools.ffprobe)];
    let mut all_ok = true;
    for (name, program) in tools {
        if tool_available(program) {
            println!("[OK] {name}: {}", program.display());
        } else {
            println!("[MISSING] {name}: {} could not be started", program.display());
            all_ok = false;
        }
    }

    println!("[OK] Config: {}", config_file_path().display());
    println!(
        "     edl extension: {}, failure policy: {:?}, trim jobs: {}",
        config.edl_extension,
        config.failure_policy,
        config.effective_trim_jobs()
    );

    println!();
    if all_ok {
        println!("All required tools are available. Clutch is ready.");
    } else {
        println!("Some required tools are missing. Install ffmpeg or set tools in the config.");
    }

    Ok(())
}

//! Pipeline demo: build a pipeline in code, save it, reload it, run it.
//!
//! Run with: cargo run -p strata-config --example pipeline_demo

use strata_config::{ComponentEntry, PipelineConfig, ThreadSpec};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // --- Build ---
    let pipeline = PipelineConfig::new()
        .with_component(
            ComponentEntry::new("src", "signal_source")
                .with_param("frames", 2_000_i64)
                .with_param("waveform", "sine")
                .with_param("frequency", 5.0)
                .with_param("period", 0.001),
        )
        .with_component(
            ComponentEntry::new("win", "framer")
                .with_param("length_sec", 0.1)
                .with_param("step_sec", 0.05)
                .with_reader("levels", "src")
                .with_thread(ThreadSpec::Group(1)),
        )
        .with_component(
            ComponentEntry::new("mon", "monitor")
                .with_param("every", 10_i64)
                .with_reader("levels", "win")
                .with_thread(ThreadSpec::Group(1)),
        );

    println!("=== Pipeline ===\n");
    println!("{}", pipeline.to_toml()?);

    // --- Save / load ---
    let path = std::env::temp_dir().join("strata_pipeline_demo.toml");
    pipeline.save(&path)?;
    let mut loaded = PipelineConfig::load(&path)?;
    loaded.scheduler.threads = 2;
    println!("Saved and reloaded {}", path.display());

    // --- Run ---
    let registry = strata_components::builtin_registry();
    let mut sched = loaded.build(&registry)?;
    sched.setup()?;
    let report = sched.run()?;

    println!("\n=== Report ===\n");
    println!("status: {}  rounds: {}", report.status.name(), report.ticks);
    for level in &report.levels {
        println!(
            "  {:<6} width {:>4}  written {:>5}  depth {:>4}",
            level.name, level.width, level.cur_w, level.depth
        );
    }

    std::fs::remove_file(&path)?;
    Ok(())
}

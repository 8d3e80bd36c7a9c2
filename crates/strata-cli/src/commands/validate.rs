//! Pipeline file checking.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::Args;

use super::load_pipeline;

#[derive(Args)]
pub struct ValidateArgs {
    /// Pipeline file (TOML)
    #[arg(value_name = "PIPELINE")]
    pub file: PathBuf,

    /// Also build the pipeline and run setup, without ticking anything
    #[arg(long)]
    pub setup: bool,
}

pub fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let (pipeline, registry) = load_pipeline(&args.file)?;
    pipeline.validate(&registry)?;

    let levels: BTreeSet<&str> = pipeline
        .components
        .iter()
        .filter(|c| {
            registry.get(&c.type_name).is_some_and(|d| {
                !matches!(d.category, strata_core::ComponentCategory::Sink)
            })
        })
        .map(|c| c.output_level())
        .collect();

    if args.setup {
        let mut sched = pipeline.build(&registry)?;
        sched.setup()?;
        for status in sched.store().status() {
            println!(
                "  {:16}  width {:>4}  depth {:>6}  readers {}",
                status.name, status.width, status.depth, status.readers
            );
        }
    }

    println!(
        "{}: OK ({} components, {} levels)",
        args.file.display(),
        pipeline.components.len(),
        levels.len()
    );
    Ok(())
}

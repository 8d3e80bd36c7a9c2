//! Run a pipeline file to completion.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};
use strata_core::{RunReport, RunStatus, TickResult};

use super::load_pipeline;

/// How the final report is printed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable tables
    #[default]
    Text,
    /// One JSON document on stdout
    Json,
}

#[derive(Args)]
pub struct RunArgs {
    /// Pipeline file (TOML)
    #[arg(value_name = "PIPELINE")]
    pub file: PathBuf,

    /// Override the worker thread count (0 = one thread per instance)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Stop after this many rounds
    #[arg(long)]
    pub max_ticks: Option<u64>,

    /// Measure tick durations
    #[arg(long)]
    pub profile: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub report: ReportFormat,
}

pub fn run(args: RunArgs) -> anyhow::Result<RunStatus> {
    let (mut pipeline, registry) = load_pipeline(&args.file)?;
    if let Some(threads) = args.threads {
        pipeline.scheduler.threads = threads;
    }
    if let Some(max_ticks) = args.max_ticks {
        pipeline.scheduler.max_ticks = Some(max_ticks);
    }
    if args.profile {
        pipeline.scheduler.profiling = true;
    }

    let mut sched = pipeline.build(&registry)?;
    sched.setup()?;

    let handle = sched.handle();
    ctrlc::set_handler(move || {
        eprintln!("\nStopping...");
        handle.request_abort();
    })
    .context("failed to install the Ctrl-C handler")?;

    let report = sched.run()?;

    if pipeline.scheduler.print_level_states {
        for level in &report.levels {
            tracing::info!(
                level = %level.name,
                cur_w = level.cur_w,
                cur_r = level.cur_r,
                n_avail = level.n_avail,
                n_free = level.n_free,
                "final level state"
            );
        }
    }

    match args.report {
        ReportFormat::Text => print_text(&report),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report_json(&report))?),
    }
    Ok(report.status)
}

fn print_text(report: &RunReport) {
    println!(
        "{} after {} rounds in {:.3}s (EOI entered {} time(s))",
        report.status.name(),
        report.ticks,
        report.elapsed.as_secs_f64(),
        report.eoi_count
    );

    println!();
    println!(
        "  {:16}  {:16}  {:>6}  {:>10}  {:>10}  {:>6}  {:>8}",
        "Level", "Writer", "Width", "Written", "Read", "Depth", "Dropped"
    );
    for level in &report.levels {
        println!(
            "  {:16}  {:16}  {:>6}  {:>10}  {:>10}  {:>6}  {:>8}",
            level.name,
            level.writer,
            level.width,
            level.cur_w,
            level.cur_r,
            level.depth,
            level.dropped
        );
    }

    println!();
    println!(
        "  {:16}  {:16}  {:>8}  {:>8}  {:>10}  {}",
        "Instance", "Type", "Ticks", "Success", "Mean (us)", "Last"
    );
    for p in &report.profiles {
        println!(
            "  {:16}  {:16}  {:>8}  {:>8}  {:>10.1}  {}",
            p.name,
            p.type_name,
            p.ticks,
            p.count(TickResult::Success),
            p.mean().as_secs_f64() * 1e6,
            p.last_result.name()
        );
    }
}

fn report_json(report: &RunReport) -> serde_json::Value {
    let levels: Vec<_> = report
        .levels
        .iter()
        .map(|l| {
            serde_json::json!({
                "name": l.name,
                "writer": l.writer,
                "readers": l.readers,
                "width": l.width,
                "depth": l.depth,
                "cur_w": l.cur_w,
                "cur_r": l.cur_r,
                "n_avail": l.n_avail,
                "n_free": l.n_free,
                "dropped": l.dropped,
            })
        })
        .collect();

    let profiles: Vec<_> = report
        .profiles
        .iter()
        .map(|p| {
            let counts: serde_json::Map<String, serde_json::Value> = TickResult::ALL
                .iter()
                .map(|r| (r.name().to_string(), p.count(*r).into()))
                .collect();
            serde_json::json!({
                "name": p.name,
                "type": p.type_name,
                "ticks": p.ticks,
                "total_us": p.total.as_secs_f64() * 1e6,
                "last_result": p.last_result.name(),
                "results": counts,
            })
        })
        .collect();

    serde_json::json!({
        "status": report.status.name(),
        "ticks": report.ticks,
        "eoi_count": report.eoi_count,
        "elapsed_secs": report.elapsed.as_secs_f64(),
        "levels": levels,
        "profiles": profiles,
    })
}

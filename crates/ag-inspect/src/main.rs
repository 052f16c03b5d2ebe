//! Agogic timeline inspector
//!
//! Usage:
//!   ag-inspect SCRIPT.json                      - Table over the whole script
//!   ag-inspect SCRIPT.json --from 0 --to 1920   - Table over a tick window
//!   ag-inspect SCRIPT.json --ranges             - Also list change spans
//!   ag-inspect SCRIPT.json --dump               - Log every timeline (debug)

mod script;

use std::env;
use std::path::PathBuf;

use ag_core::Tick;
use ag_timeline::TimelineConfig;
use anyhow::{Context, Result, bail};
use clap::Parser;
use log::LevelFilter;

use crate::script::{Script, Timelines, sample};

#[derive(Parser)]
#[command(name = "ag-inspect", about = "Apply a timeline edit script and print the result")]
struct Cli {
    /// JSON edit script
    script: PathBuf,

    /// Timeline config (division, default tempo and values)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// First tick of the table
    #[arg(long, default_value_t = 0)]
    from: i64,

    /// Last tick of the table (default: last event of the script)
    #[arg(long)]
    to: Option<i64>,

    /// Ticks between table rows (default: one quarter note)
    #[arg(long)]
    step: Option<i64>,

    /// List the change map spans over the window
    #[arg(long)]
    ranges: bool,

    /// Log the normalised timelines at debug level
    #[arg(long)]
    dump: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_builder = env_logger::builder();
    if env::var("RUST_LOG").is_err() {
        log_builder.filter_level(if cli.dump {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        });
    }
    log_builder.init();

    let config = match &cli.config {
        Some(path) => TimelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TimelineConfig::default(),
    };
    let script = Script::load(&cli.script)?;
    let mut timelines = Timelines::apply(&script, &config);

    let step = cli.step.unwrap_or(config.division);
    if step <= 0 {
        bail!("--step must be positive, got {step}");
    }
    let from = Tick(cli.from);
    let to = match cli.to {
        Some(to) => Tick(to),
        None => timelines.extent() + config.division,
    };
    if to < from {
        bail!("--to {to} lies before --from {from}");
    }

    if cli.dump {
        timelines.dump();
    }

    report_velocity_edits(&timelines);
    print_table(&mut timelines, from, to, step);
    if cli.ranges {
        print_ranges(&mut timelines, from, to);
    }
    Ok(())
}

fn report_velocity_edits(timelines: &Timelines) {
    for (index, outcome) in &timelines.outcomes {
        log::info!("velocity op #{index}: {outcome:?}");
    }
    for rejected in &timelines.rejected {
        println!(
            "⚠️  velocity op #{} rejected: {} ({:?})",
            rejected.index, rejected.reason, rejected.op
        );
    }
    if !timelines.rejected.is_empty() {
        println!();
    }
}

fn print_table(timelines: &mut Timelines, from: Tick, to: Tick, step: i64) {
    println!(
        "{:>8}  {:>6}  {:>8}  {:>10}  {:>8}",
        "tick", "value", "bpm", "seconds", "velocity"
    );
    for row in sample(timelines, from, to, step) {
        println!(
            "{:>8}  {:>6}  {:>8.2}  {:>10.4}  {:>8}",
            row.tick, row.value, row.bpm, row.seconds, row.velocity
        );
    }
}

fn print_ranges(timelines: &mut Timelines, from: Tick, to: Tick) {
    println!("\nchange spans in [{from}, {to}]:");
    for span in timelines.changes.changes_in_range(from, to) {
        if span.start == span.end {
            println!("  {:>8}", span.start);
        } else {
            println!("  {:>8} .. {}", span.start, span.end);
        }
    }
}

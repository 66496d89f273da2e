//! clog2slog2
//!
//! Converts a CLOG-2 event log into a SLOG-2 file.
//! The historical options `-nc`, `-ls`, `-tc`, `-tcc` and `-r` are accepted.

use anyhow::Context;
use clap::Parser;
use slog2::cli::{leaf_size, normalize_legacy_args};
use slog2::config::{generate_default_config, Config};
use slog2::convert::{clog_to_slog2, default_output_path, OrderCheck};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "clog2slog2")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Convert a CLOG-2 MPI event log into a SLOG-2 trace file")]
struct Cli {
    /// CLOG-2 input file
    #[arg(required_unless_present = "default_config")]
    input: Option<PathBuf>,

    /// Output file (default: input with .clog2 replaced by .slog2)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Children per tree node (-nc)
    #[arg(long)]
    fanout: Option<u32>,

    /// Leaf node size cap, e.g. 65536, 64k, 1M (-ls)
    #[arg(long, value_parser = leaf_size)]
    leaf_size: Option<u64>,

    /// End-time order check: off, strict (-tc) or lenient (-tcc)
    #[arg(long)]
    order_check: Option<OrderCheck>,

    /// Category indexes to leave out, comma separated (-r)
    #[arg(long, value_delimiter = ',')]
    remove: Vec<i32>,

    /// Bound on unmatched partial drawables per matcher list
    #[arg(long)]
    max_pending: Option<usize>,

    /// Convert even if the log version is unknown
    #[arg(long)]
    force: bool,

    /// Config file (default: search standard locations)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the conversion summary as JSON
    #[arg(long)]
    json: bool,

    /// Print a default config file and exit
    #[arg(long)]
    default_config: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse_from(normalize_legacy_args(std::env::args_os()));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.default_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let config = Config::resolve(cli.config.as_deref()).context("Failed to load config")?;
    slog2::logging::init(&config.logging, cli.verbose);

    let input = cli.input.context("No input file given")?;
    let output = cli.output.unwrap_or_else(|| default_output_path(&input));

    let mut options = config.to_convert_options();
    if let Some(fanout) = cli.fanout {
        options.tree.fanout = fanout;
    }
    if let Some(cap) = cli.leaf_size {
        options.tree.leaf_byte_cap = cap;
    }
    if let Some(check) = cli.order_check {
        options.order_check = check;
    }
    if let Some(max) = cli.max_pending {
        options.matcher.max_pending = Some(max);
    }
    options.tree.removed_categories.extend(cli.remove);
    options.force |= cli.force;

    tracing::info!(
        "Converting {} to {} (fanout {}, leaf cap {} bytes)",
        input.display(),
        output.display(),
        options.tree.fanout,
        options.tree.leaf_byte_cap
    );

    let summary = clog_to_slog2(&input, &output, &options)
        .with_context(|| format!("Failed to convert {}", input.display()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Wrote {}", summary.output.display());
    println!("{:<22} {}", "Records read", summary.records);
    println!("{:<22} {}", "Drawables", summary.drawables);
    println!("{:<22} {}", "Dropped (removed)", summary.dropped);
    println!("{:<22} {}", "Unmatched events", summary.stats.unmatched);
    println!("{:<22} {}", "Evicted partials", summary.stats.evicted);
    println!("{:<22} {}", "Nesting violations", summary.stats.nesting_violations);
    println!("{:<22} {}", "Order violations", summary.order_violations);
    println!("{:<22} {}", "Tree nodes", summary.nodes);
    println!("{:<22} {}", "Tree depth", summary.max_depth);
    println!("{:<22} {}", "File size (bytes)", summary.bytes);
    Ok(())
}

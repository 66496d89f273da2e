//! slog2filter
//!
//! Rewrites a SLOG-2 file into a new one: re-trees it with a different shape,
//! drops categories, cuts a time window or coalesces adjacent primitives.

use anyhow::Context;
use clap::Parser;
use slog2::cli::{leaf_size, normalize_legacy_args, window};
use slog2::config::Config;
use slog2::convert::{filter_slog2, FilterOptions};
use slog2::slog::{CompressionType, ReadOptions};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "slog2filter")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Re-tree, window or prune a SLOG-2 trace file")]
struct Cli {
    /// SLOG-2 input file
    input: PathBuf,

    /// SLOG-2 output file
    #[arg(short, long)]
    output: PathBuf,

    /// Children per tree node (-nc)
    #[arg(long)]
    fanout: Option<u32>,

    /// Leaf node size cap, e.g. 65536, 64k, 1M (-ls)
    #[arg(long, value_parser = leaf_size)]
    leaf_size: Option<u64>,

    /// Category indexes to leave out, comma separated (-r)
    #[arg(long, value_delimiter = ',')]
    remove: Vec<i32>,

    /// Leave out categories no remaining drawable uses
    #[arg(long)]
    prune: bool,

    /// Merge adjacent same-category primitives on a line into composites
    #[arg(long)]
    coalesce: bool,

    /// Keep drawables overlapping [start, end)
    #[arg(long)]
    start: Option<f64>,

    #[arg(long)]
    end: Option<f64>,

    /// Block compression (none, lz4)
    #[arg(long)]
    compression: Option<String>,

    /// Open files of unknown format versions
    #[arg(long)]
    force: bool,

    /// Config file (default: search standard locations)
    #[arg(long)]
    config: Option<PathBuf>,

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
    let config = Config::resolve(cli.config.as_deref()).context("Failed to load config")?;
    slog2::logging::init(&config.logging, cli.verbose);

    let mut tree = config.to_tree_config();
    if let Some(fanout) = cli.fanout {
        tree.fanout = fanout;
    }
    if let Some(cap) = cli.leaf_size {
        tree.leaf_byte_cap = cap;
    }
    if let Some(name) = cli.compression.as_deref() {
        tree.compression = match name.to_ascii_lowercase().as_str() {
            "none" => CompressionType::None,
            "lz4" => CompressionType::Lz4,
            other => anyhow::bail!("Unknown compression {:?}; use none or lz4", other),
        };
    }
    tree.removed_categories.extend(cli.remove);
    tree.prune_unused_categories |= cli.prune;

    let window = if cli.start.is_some() || cli.end.is_some() {
        Some(window(cli.start, cli.end).map_err(anyhow::Error::msg)?)
    } else {
        None
    };

    let options = FilterOptions {
        tree,
        coalesce: cli.coalesce,
        window,
        read: ReadOptions {
            allow_incompatible: cli.force,
            ..ReadOptions::default()
        },
    };

    let summary = filter_slog2(&cli.input, &cli.output, &options)
        .with_context(|| format!("Failed to filter {}", cli.input.display()))?;

    println!("Wrote {}", summary.path.display());
    println!("{:<20} {}", "Drawables", summary.drawables);
    println!("{:<20} {}", "Dropped (removed)", summary.dropped);
    println!("{:<20} {}", "Categories", summary.categories);
    println!("{:<20} {}", "Tree nodes", summary.nodes);
    println!("{:<20} {}", "Tree depth", summary.max_depth);
    println!("{:<20} {}", "File size (bytes)", summary.bytes);
    Ok(())
}

//! slog2print
//!
//! Dumps the contents of a SLOG-2 file: header, categories, line-id maps,
//! tree directory, shadows, and the drawables inside a time window.

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use slog2::cli::window;
use slog2::model::{Drawable, DrawableOrder};
use slog2::slog::{ReadOptions, Slog2Reader};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "slog2print")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Print the contents of a SLOG-2 trace file")]
struct Cli {
    /// SLOG-2 file
    file: PathBuf,

    /// Window start time
    #[arg(long)]
    start: Option<f64>,

    /// Window end time
    #[arg(long)]
    end: Option<f64>,

    /// Drawable order: forward, backward, increasing-end, decreasing-start
    #[arg(long, default_value = "forward")]
    order: DrawableOrder,

    /// Output format (table, json, csv)
    #[arg(short, long, default_value = "table")]
    format: String,

    /// Print the file header
    #[arg(long)]
    header: bool,

    /// Print the category table
    #[arg(long)]
    categories: bool,

    /// Print the line-id maps
    #[arg(long)]
    lines: bool,

    /// Print the tree directory
    #[arg(long)]
    tree: bool,

    /// Print per-category summaries at this depth instead of drawables
    #[arg(long)]
    shadows: Option<i16>,

    /// Open files of unknown format versions
    #[arg(long)]
    force: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// One drawable flattened for output
#[derive(Serialize)]
struct Row {
    category: i32,
    name: String,
    start_line: i64,
    start_time: f64,
    end_line: i64,
    end_time: f64,
    primitives: usize,
    infos: String,
}

impl Row {
    fn from_drawable(d: &Drawable) -> Self {
        let start = d.start_vertex();
        let end = d.final_vertex();
        let infos = match d {
            Drawable::Primitive(p) => p
                .infos()
                .iter()
                .map(|slot| slot.value().map(|v| v.to_string()).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(" "),
            Drawable::Composite(_) => String::new(),
        };
        Self {
            category: d.category_index(),
            name: d.category().map(|c| c.name.clone()).unwrap_or_default(),
            start_line: start.line_id,
            start_time: start.time,
            end_line: end.line_id,
            end_time: end.time,
            primitives: d.primitive_count(),
            infos,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    slog2::logging::init(&slog2::Config::load_default().logging, cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let options = ReadOptions {
        allow_incompatible: cli.force,
        ..ReadOptions::default()
    };
    let mut reader = Slog2Reader::open_with(&cli.file, options)
        .with_context(|| format!("Failed to open {}", cli.file.display()))?;
    let window = window(cli.start, cli.end).map_err(anyhow::Error::msg)?;

    if cli.header {
        print_header(&reader);
    }
    if cli.categories {
        print_categories(&reader);
    }
    if cli.lines {
        print_lines(&reader);
    }
    if cli.tree {
        print_tree(&reader);
    }
    if cli.header || cli.categories || cli.lines || cli.tree {
        return Ok(());
    }

    if let Some(depth) = cli.shadows {
        let weights = reader.shadows_at(depth, &window)?;
        println!("{:<8} {:<20} {:>10} {:>14} {:>14}", "Index", "Category", "Count", "Incl. time", "Excl. time");
        println!("{}", "-".repeat(70));
        for w in weights {
            let name = reader
                .category_map()
                .get(&w.category_index)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<8} {:<20} {:>10} {:>14.6} {:>14.6}",
                w.category_index, name, w.num_drawables, w.incl_time, w.excl_time
            );
        }
        return Ok(());
    }

    let mut rows = Vec::new();
    for drawable in reader.query_range(window, cli.order) {
        rows.push(Row::from_drawable(&drawable?));
    }

    match cli.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        "csv" => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            for row in &rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        _ => print_table(&rows),
    }
    Ok(())
}

fn print_table(rows: &[Row]) {
    if rows.is_empty() {
        println!("No drawables in the selected window");
        return;
    }

    println!(
        "{:<6} {:<16} {:>6} {:>14} {:>6} {:>14}  {}",
        "Cat", "Name", "Line", "Start", "Line", "End", "Info"
    );
    println!("{}", "-".repeat(80));
    for row in rows {
        println!(
            "{:<6} {:<16} {:>6} {:>14.6} {:>6} {:>14.6}  {}",
            row.category, row.name, row.start_line, row.start_time, row.end_line, row.end_time, row.infos
        );
    }
}

fn print_header(reader: &Slog2Reader) {
    let h = reader.header();
    println!("{:<18} {}", "File", reader.path().display());
    println!("{:<18} {}", "Version", h.version);
    println!("{:<18} {:?}", "Compression", h.compression);
    println!("{:<18} {}", "Leaf byte cap", h.leaf_byte_cap);
    println!("{:<18} {}", "Fanout", h.fanout);
    println!("{:<18} {}", "Max depth", h.max_depth);
    println!("{:<18} {}", "Nodes", h.node_count);
    println!("{:<18} {}", "Drawables", h.drawable_count);
    println!("{:<18} {}", "Time range", h.total_bbox);
    println!("{:<18} {}", "Tree root", h.tree_root);
}

fn print_categories(reader: &Slog2Reader) {
    println!("{:<6} {:<24} {:<8} {:<10} {}", "Index", "Name", "Kind", "Color", "Infos");
    println!("{}", "-".repeat(70));
    for category in reader.category_map().values() {
        let infos = category
            .info_schema
            .iter()
            .map(|d| format!("{}:{}", d.name, d.ty))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{:<6} {:<24} {:<8} #{:02x}{:02x}{:02x}    {}",
            category.index,
            category.name,
            category.topology,
            category.color.r,
            category.color.g,
            category.color.b,
            infos
        );
    }
}

fn print_lines(reader: &Slog2Reader) {
    for map in reader.line_id_maps() {
        println!("{} ({})", map.title, map.column_names.join(", "));
        for (line_id, labels) in &map.labels {
            println!("  {:>6}  {}", line_id, labels.join(" "));
        }
    }
}

fn print_tree(reader: &Slog2Reader) {
    println!("{:<14} {:<30} {:<20} {:>10}", "Node", "Box", "Block", "Drawables");
    println!("{}", "-".repeat(78));
    for (id, entry) in reader.tree_dir().iter() {
        println!(
            "{:<14} {:<30} {:<20} {:>10}",
            id.to_string(),
            entry.bbox.to_string(),
            entry.block_ptr.to_string(),
            entry.num_drawables
        );
    }
}

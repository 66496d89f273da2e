//! # slog2
//!
//! Hierarchical time-interval index for MPI trace logs.
//!
//! A CLOG-2 log is a flat, per-process stream of timestamped events. The
//! converter pairs start and final events into drawables (states, message
//! arrows, point events) and streams them into a SLOG-2 file: a bounded-fanout
//! tree whose nodes carry time bounding boxes and per-category summaries, so
//! a viewer can fetch any time window without reading the whole file.
//!
//! ## Modules
//!
//! - [`model`]: drawables, categories, info values and time boxes
//! - [`clog`]: CLOG-2 binary log reader and writer
//! - [`slog`]: SLOG-2 tree index and file format
//! - [`convert`]: event matching and CLOG-2 → SLOG-2 conversion
//! - [`config`]: TOML configuration for the tools
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slog2::convert::{clog_to_slog2, ConvertOptions};
//! use slog2::model::{DrawableOrder, TimeBounded, TimeBoundingBox};
//! use slog2::slog::Slog2Reader;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let summary = clog_to_slog2("run.clog2", "run.slog2", &ConvertOptions::default())?;
//!     println!("{} drawables, {} unmatched events", summary.drawables, summary.stats.unmatched);
//!
//!     let mut reader = Slog2Reader::open("run.slog2")?;
//!     for drawable in reader.query_range(TimeBoundingBox::new(1.0, 2.0), DrawableOrder::FORWARD) {
//!         let drawable = drawable?;
//!         println!("{} {}", drawable.category_index(), drawable.bbox());
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod clog;
pub mod config;
pub mod convert;
pub mod logging;
pub mod model;
pub mod slog;
pub mod version;

pub use clog::{ClogError, ClogReader, ClogResult, ClogWriter, Preamble, ReadMode, Record};

pub use config::{Config, ConfigError, LoggingConfig};

pub use convert::{
    clog_to_slog2, default_output_path, filter_slog2, ConvertError, ConvertOptions, ConvertResult,
    ConvertSummary, FilterOptions, MatchStats, MatcherConfig, OrderCheck,
};

pub use model::{
    Category, CategoryMap, Drawable, DrawableOrder, LineIdMap, ModelError, Primitive,
    TimeBounded, TimeBoundingBox, Topology,
};

pub use slog::{
    ReadOptions, Slog2Reader, Slog2Writer, SlogError, SlogResult, TreeConfig, TreeWindow,
    WriteSummary,
};

pub use version::VersionCheck;

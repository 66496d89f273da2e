//! SLOG-2 to SLOG-2 stream conversion
//!
//! Re-reads a finished file in end-time order and writes a new tree, with a
//! different leaf cap, fanout or compression, minus removed categories,
//! optionally restricted to a time window and with same-line runs coalesced
//! into composites.

use crate::convert::error::{ConvertError, ConvertResult};
use crate::convert::remove_partial;
use crate::model::{Composite, Drawable, DrawableOrder, TimeBounded, TimeBoundingBox};
use crate::slog::{ReadOptions, Slog2Reader, Slog2Writer, TreeConfig, WriteSummary};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub tree: TreeConfig,
    /// Merge adjacent same-category primitives on a line into composites
    pub coalesce: bool,
    /// Keep only drawables overlapping this window
    pub window: Option<TimeBoundingBox>,
    pub read: ReadOptions,
}

pub fn filter_slog2<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    options: &FilterOptions,
) -> ConvertResult<WriteSummary> {
    let input = input.as_ref();
    let output = output.as_ref();
    if input == output {
        return Err(ConvertError::InvalidOptions(
            "input and output must be different files".into(),
        ));
    }

    let result = run_filter(input, output, options);
    if result.is_err() {
        remove_partial(output);
    }
    result
}

fn run_filter(input: &Path, output: &Path, options: &FilterOptions) -> ConvertResult<WriteSummary> {
    let read = ReadOptions {
        resolve_categories: false,
        ..options.read.clone()
    };
    let mut reader = Slog2Reader::open_with(input, read)?;
    let mut writer = Slog2Writer::create(output, &options.tree)?;
    writer.set_categories(reader.category_map().clone());
    for map in reader.line_id_maps() {
        writer.add_line_id_map(map.clone());
    }

    let window = options.window.unwrap_or(TimeBoundingBox::ALL_TIME);
    let query = reader.query_range(window, DrawableOrder::IncreasingEnd);

    if options.coalesce {
        let mut primitives = Vec::new();
        for drawable in query {
            match drawable? {
                Drawable::Primitive(p) => primitives.push(p),
                Drawable::Composite(c) => primitives.extend(c.primitives().iter().cloned()),
            }
        }
        let before = primitives.len();
        let mut drawables = Composite::coalesce(primitives);
        drawables.sort_by(|a, b| a.bbox().latest.total_cmp(&b.bbox().latest));
        info!("Coalesced {} primitives into {} drawables", before, drawables.len());
        for drawable in drawables {
            writer.add_drawable(drawable)?;
        }
    } else {
        for drawable in query {
            writer.add_drawable(drawable?)?;
        }
    }

    let summary = writer.close()?;
    info!(
        "Filtered {} into {}: {} drawables kept, {} dropped",
        input.display(),
        output.display(),
        summary.drawables,
        summary.dropped
    );
    Ok(summary)
}

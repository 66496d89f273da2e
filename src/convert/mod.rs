//! CLOG-2 to SLOG-2 conversion
//!
//! - **objdef**: categories and event-type bindings from definition records
//! - **matcher**: pairs start/final events into primitives
//! - **ordering**: end-time release queue and order verification
//! - **filter**: SLOG-2 to SLOG-2 re-treeing
//!
//! ```text
//! ClogReader ──▶ Matcher ──▶ EndTimeQueue ──▶ OrderChecker ──▶ Slog2Writer
//!  (records)    (primitives)  (watermark)                       (tree)
//! ```

pub mod error;
pub mod filter;
pub mod matcher;
pub mod objdef;
pub mod ordering;

pub use error::{ConvertError, ConvertResult};
pub use filter::{filter_slog2, FilterOptions};
pub use matcher::{MatchStats, Matcher, MatcherConfig, TopologyMatcher, TwoEventMatch};
pub use objdef::{CargoFormat, ObjDefs, Role, MESSAGE_CATEGORY};
pub use ordering::{EndTimeQueue, OrderCheck, OrderChecker};

use crate::clog::{ClogReader, ReadMode};
use crate::model::LineIdMap;
use crate::slog::{Slog2Writer, TreeConfig, WriteSummary};
use crate::version::VersionCheck;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub tree: TreeConfig,
    pub matcher: MatcherConfig,
    pub order_check: OrderCheck,
    /// Convert input of an unknown CLOG version
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub records: u64,
    pub drawables: u64,
    /// Drawables of removed categories
    pub dropped: u64,
    pub order_violations: u64,
    pub nodes: usize,
    pub max_depth: i32,
    pub bytes: u64,
    pub stats: MatchStats,
}

/// Output path for an input: `.clog2` replaced by `.slog2`, otherwise appended
pub fn default_output_path(input: &Path) -> PathBuf {
    match input.extension().and_then(|e| e.to_str()) {
        Some("clog2") => input.with_extension("slog2"),
        _ => {
            let mut name = input.as_os_str().to_os_string();
            name.push(".slog2");
            PathBuf::from(name)
        }
    }
}

pub(crate) fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial output {}: {}", path.display(), e),
    }
}

/// Convert a CLOG-2 file into a SLOG-2 file
///
/// The output is deleted if the conversion fails part way.
pub fn clog_to_slog2<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    options: &ConvertOptions,
) -> ConvertResult<ConvertSummary> {
    let input = input.as_ref();
    let output = output.as_ref();

    let mut reader = ClogReader::open(input, ReadMode::Matching)?;
    match reader.preamble().version_check() {
        VersionCheck::Exact => {}
        VersionCheck::Compatible(found) => info!("Reading older CLOG version {}", found),
        VersionCheck::Incompatible(found) if options.force => {
            warn!("Unknown CLOG version {}; converting anyway", found)
        }
        VersionCheck::Incompatible(found) => {
            return Err(ConvertError::IncompatibleInput(format!(
                "{} has unknown version {:?}",
                input.display(),
                found
            )))
        }
    }

    let result = convert_records(&mut reader, input, output, options);
    if result.is_err() {
        remove_partial(output);
    }
    result
}

fn convert_records<R: std::io::Read>(
    reader: &mut ClogReader<R>,
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
) -> ConvertResult<ConvertSummary> {
    let preamble = reader.preamble().clone();
    let mut writer = Slog2Writer::create(output, &options.tree)?;
    let mut matcher = Matcher::new(options.matcher.clone(), &preamble);
    let mut queue = EndTimeQueue::new();
    let mut checker = OrderChecker::new(options.order_check);
    let mut lines: BTreeSet<(i32, i32)> = BTreeSet::new();
    let mut watermark = f64::NEG_INFINITY;

    for record in reader.by_ref() {
        let record = record?;
        let header = &record.header;
        lines.insert((header.icomm, header.rank));
        watermark = watermark.max(header.time);

        if let Some(primitive) = matcher.feed(&record)? {
            queue.push(primitive.into());
        }
        for drawable in queue.release(watermark) {
            checker.check(&drawable)?;
            writer.add_drawable(drawable)?;
        }
    }
    for drawable in queue.drain() {
        checker.check(&drawable)?;
        writer.add_drawable(drawable)?;
    }

    let stats = matcher.finish();
    writer.set_categories(matcher.category_map());

    let mut map = LineIdMap::new("CLOG lines", vec!["comm".into(), "rank".into()]);
    for (icomm, rank) in &lines {
        map.insert(
            preamble.line_id(*icomm, *rank),
            vec![icomm.to_string(), rank.to_string()],
        );
    }
    writer.add_line_id_map(map);

    let written = writer.close()?;
    let summary = summarize(input, reader.records_read(), written, stats, checker.violations());
    info!(
        "Converted {} records from {} into {} drawables",
        summary.records,
        input.display(),
        summary.drawables
    );
    Ok(summary)
}

fn summarize(
    input: &Path,
    records: u64,
    written: WriteSummary,
    stats: MatchStats,
    order_violations: u64,
) -> ConvertSummary {
    ConvertSummary {
        input: input.to_path_buf(),
        output: written.path,
        records,
        drawables: written.drawables,
        dropped: written.dropped,
        order_violations,
        nodes: written.nodes,
        max_depth: written.max_depth,
        bytes: written.bytes,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clog::{
        ClogWriter, EventDef, MsgEvt, Payload, Preamble, Record, StateDef, RECV_ETYPE, SEND_ETYPE,
    };
    use crate::model::{Drawable, DrawableOrder, InfoValue, TimeBounded, TimeBoundingBox, Topology};
    use crate::slog::{Slog2Reader, SlogResult};
    use tempfile::tempdir;

    const COMPUTE: i32 = 600;
    const MARK: i32 = 5000;

    fn defs() -> Vec<Record> {
        vec![
            Record::new(
                0.0,
                0,
                0,
                Payload::StateDef(StateDef {
                    stateid: 0,
                    start_etype: COMPUTE,
                    final_etype: COMPUTE + 1,
                    color: "green".into(),
                    name: "compute".into(),
                    format: String::new(),
                }),
            ),
            Record::new(
                0.0,
                0,
                0,
                Payload::EventDef(EventDef {
                    etype: MARK,
                    color: "red".into(),
                    name: "mark".into(),
                    format: String::new(),
                }),
            ),
        ]
    }

    fn bare(time: f64, rank: i32, etype: i32) -> Record {
        Record::new(time, 0, rank, Payload::BareEvt { etype })
    }

    fn msg(time: f64, rank: i32, etype: i32, partner: i32, size: i32) -> Record {
        Record::new(
            time,
            0,
            rank,
            Payload::MsgEvt(MsgEvt {
                etype,
                icomm: 0,
                rank: partner,
                tag: 1,
                size,
            }),
        )
    }

    fn write_clog(path: &Path, preamble: Preamble, records: &[Record]) {
        let mut writer = ClogWriter::create(path, preamble).unwrap();
        for record in records {
            writer.write(record).unwrap();
        }
        writer.finish().unwrap();
    }

    /// Two ranks, each running 20 compute states with a message between them
    fn workload() -> Vec<Record> {
        let mut records = defs();
        for i in 0..20 {
            let t = i as f64 * 10.0;
            records.push(bare(t, 0, COMPUTE));
            records.push(bare(t + 1.0, 1, COMPUTE));
            records.push(msg(t + 2.0, 0, SEND_ETYPE, 1, 100 + i));
            records.push(bare(t + 3.0, 0, COMPUTE + 1));
            records.push(msg(t + 4.0, 1, RECV_ETYPE, 0, 0));
            records.push(bare(t + 5.0, 1, COMPUTE + 1));
            if i % 4 == 0 {
                records.push(bare(t + 6.0, 0, MARK));
            }
        }
        // Left open
        records.push(bare(500.0, 1, COMPUTE));
        records
    }

    fn read_all(path: &Path) -> (Slog2Reader, Vec<Drawable>) {
        let mut reader = Slog2Reader::open(path).unwrap();
        let drawables = reader
            .query_range(TimeBoundingBox::ALL_TIME, DrawableOrder::FORWARD)
            .collect::<SlogResult<Vec<_>>>()
            .unwrap();
        (reader, drawables)
    }

    #[test]
    fn test_convert_end_to_end() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("run.clog2");
        let output = default_output_path(&input);
        write_clog(&input, Preamble::new(2).block_size(1024), &workload());

        let options = ConvertOptions {
            tree: TreeConfig::default().leaf_byte_cap(512),
            order_check: OrderCheck::Strict,
            ..ConvertOptions::default()
        };
        let summary = clog_to_slog2(&input, &output, &options).unwrap();
        assert_eq!(output, dir.path().join("run.slog2"));
        assert_eq!(summary.stats.matched, 20 * 3 + 5);
        assert_eq!(summary.stats.unmatched, 1);
        assert_eq!(summary.drawables, 65);
        assert_eq!(summary.order_violations, 0);

        let (reader, drawables) = read_all(&output);
        assert_eq!(drawables.len(), 65);
        assert_eq!(reader.category_map().len(), 3);
        assert_eq!(
            reader.category_map().get(&MESSAGE_CATEGORY).unwrap().topology,
            Topology::Arrow
        );

        let arrows: Vec<&Drawable> = drawables
            .iter()
            .filter(|d| d.category_index() == MESSAGE_CATEGORY)
            .collect();
        assert_eq!(arrows.len(), 20);
        let Drawable::Primitive(first) = arrows[0] else {
            panic!("arrow stored as composite");
        };
        assert_eq!(first.start_vertex().line_id, 0);
        assert_eq!(first.final_vertex().line_id, 1);
        assert_eq!(first.infos()[1].value(), Some(&InfoValue::I32(100)));

        // Box spans both vertex times
        for d in &drawables {
            let (s, f) = (d.start_vertex().time, d.final_vertex().time);
            assert_eq!(d.bbox().earliest, s.min(f));
            assert_eq!(d.bbox().latest, s.max(f));
        }

        let lines = &reader.line_id_maps()[0];
        assert_eq!(lines.column_names, vec!["comm".to_string(), "rank".to_string()]);
        assert_eq!(lines.label(1), Some(&["0".to_string(), "1".to_string()][..]));
    }

    #[test]
    fn test_removed_category_not_written() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("run.clog2");
        let output = dir.path().join("pruned.slog2");
        write_clog(&input, Preamble::new(2), &workload());

        let options = ConvertOptions {
            tree: TreeConfig::default().remove_categories([MESSAGE_CATEGORY]),
            ..ConvertOptions::default()
        };
        let summary = clog_to_slog2(&input, &output, &options).unwrap();
        assert_eq!(summary.dropped, 20);

        let (reader, drawables) = read_all(&output);
        assert!(!reader.category_map().contains_key(&MESSAGE_CATEGORY));
        assert!(drawables.iter().all(|d| d.category_index() != MESSAGE_CATEGORY));
        assert_eq!(drawables.len(), 45);
    }

    #[test]
    fn test_strict_order_violation_removes_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("bad.clog2");
        let output = dir.path().join("bad.slog2");
        let mut records = defs();
        records.push(bare(0.0, 0, COMPUTE));
        records.push(bare(2.0, 1, COMPUTE));
        records.push(bare(10.0, 0, COMPUTE + 1));
        // Out of time order: closes [2, 5] after [0, 10] went out
        records.push(bare(5.0, 1, COMPUTE + 1));
        write_clog(&input, Preamble::new(2), &records);

        let options = ConvertOptions {
            order_check: OrderCheck::Strict,
            ..ConvertOptions::default()
        };
        let err = clog_to_slog2(&input, &output, &options).unwrap_err();
        assert!(matches!(err, ConvertError::OrderViolation { index: 1, .. }));
        assert!(!output.exists());

        let lenient = ConvertOptions::default();
        let summary = clog_to_slog2(&input, &output, &lenient).unwrap();
        assert_eq!(summary.order_violations, 1);
        assert_eq!(summary.drawables, 2);
    }

    #[test]
    fn test_unknown_version_needs_force() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("old.clog2");
        let output = dir.path().join("old.slog2");
        let mut preamble = Preamble::new(1);
        preamble.version = "CLOG-02.10".into();
        write_clog(&input, preamble, &defs());

        let err = clog_to_slog2(&input, &output, &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, ConvertError::IncompatibleInput(_)));
        assert!(!output.exists());

        let forced = ConvertOptions {
            force: true,
            ..ConvertOptions::default()
        };
        let summary = clog_to_slog2(&input, &output, &forced).unwrap();
        assert_eq!(summary.drawables, 0);
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/tmp/a.clog2")),
            PathBuf::from("/tmp/a.slog2")
        );
        assert_eq!(
            default_output_path(Path::new("trace.log")),
            PathBuf::from("trace.log.slog2")
        );
    }
}

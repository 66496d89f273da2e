//! Lazy range queries
//!
//! The directory is walked top-down once, never entering a subtree whose box
//! misses the window. The overlapping leaves become a frontier ordered by the
//! smallest key any of their drawables can have. Drawables wait in a heap;
//! a leaf is only read from disk while its lower bound could still beat the
//! best drawable already waiting.

use crate::model::{CategoryMap, Drawable, DrawableOrder, OrderKey, TimeBounded, TimeBoundingBox};
use crate::slog::error::SlogResult;
use crate::slog::reader::Slog2Reader;
use crate::slog::treenode::TreeNodeID;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use tracing::{error, warn};

/// Heap entry; ties keep discovery order
struct Ranked<T> {
    key: OrderKey,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Ranked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.seq == other.seq
    }
}

impl<T> Eq for Ranked<T> {}

impl<T> PartialOrd for Ranked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ranked<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key).then_with(|| self.seq.cmp(&other.seq))
    }
}

pub struct RangeQuery<'a> {
    reader: &'a mut Slog2Reader,
    window: TimeBoundingBox,
    order: DrawableOrder,
    categories: Option<CategoryMap>,
    leaves: BinaryHeap<Reverse<Ranked<TreeNodeID>>>,
    ready: BinaryHeap<Reverse<Ranked<Drawable>>>,
    visited: Vec<TreeNodeID>,
    leaves_read: usize,
    seq: u64,
    done: bool,
}

impl<'a> RangeQuery<'a> {
    pub(crate) fn new(reader: &'a mut Slog2Reader, window: TimeBoundingBox, order: DrawableOrder) -> Self {
        let visited = reader.tree_dir().overlapping(&window);

        let mut leaves = BinaryHeap::new();
        for (seq, id) in visited.iter().filter(|id| id.is_leaf()).enumerate() {
            if let Some(entry) = reader.tree_dir().get(id) {
                leaves.push(Reverse(Ranked {
                    key: order.lower_bound(&entry.bbox),
                    seq: seq as u64,
                    item: *id,
                }));
            }
        }

        let categories = if reader.options().resolve_categories {
            Some(reader.category_map().clone())
        } else {
            None
        };

        Self {
            reader,
            window,
            order,
            categories,
            leaves,
            ready: BinaryHeap::new(),
            visited,
            leaves_read: 0,
            seq: 0,
            done: false,
        }
    }

    /// Every node whose box was found to overlap the window, in visit order
    pub fn visited(&self) -> &[TreeNodeID] {
        &self.visited
    }

    /// Leaves actually read from disk so far
    pub fn leaves_read(&self) -> usize {
        self.leaves_read
    }

    pub fn window(&self) -> &TimeBoundingBox {
        &self.window
    }

    /// Whether the next leaf could hold something ranked before the best ready drawable
    fn should_load(&self) -> bool {
        match (self.leaves.peek(), self.ready.peek()) {
            (Some(Reverse(leaf)), Some(Reverse(best))) => leaf.key <= best.key,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn load_next_leaf(&mut self) -> SlogResult<()> {
        let Some(Reverse(leaf)) = self.leaves.pop() else {
            return Ok(());
        };
        let node = self.reader.read_node(leaf.item)?;
        self.leaves_read += 1;

        for mut drawable in node.into_drawables() {
            if !drawable.overlaps(&self.window) {
                continue;
            }
            if let Some(categories) = &self.categories {
                if let Err(e) = drawable.resolve_category(categories) {
                    warn!("Leaving drawable unresolved: {}", e);
                }
            }
            let key = self.order.sort_key(drawable.bbox());
            self.ready.push(Reverse(Ranked {
                key,
                seq: self.seq,
                item: drawable,
            }));
            self.seq += 1;
        }
        Ok(())
    }
}

impl Iterator for RangeQuery<'_> {
    type Item = SlogResult<Drawable>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while self.should_load() {
            if let Err(e) = self.load_next_leaf() {
                error!("Range query aborted: {}", e);
                self.done = true;
                return Some(Err(e));
            }
        }

        match self.ready.pop() {
            Some(Reverse(ranked)) => Some(Ok(ranked.item)),
            None => {
                self.done = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Primitive, Topology, Vertex};
    use crate::slog::reader::ReadOptions;
    use crate::slog::writer::{Slog2Writer, TreeConfig};
    use std::path::Path;
    use tempfile::tempdir;

    /// Nested states on 4 lines: [i, i+3] and [i+1, i+1.5] for each i
    fn sample(count: usize) -> Vec<Drawable> {
        let mut out = Vec::new();
        for i in 0..count {
            let t = i as f64;
            let line = (i % 4) as i64;
            out.push(Primitive::new(1, Vertex::new(line, t), Vertex::new(line, t + 3.0)).into());
            out.push(Primitive::new(2, Vertex::new(line, t + 1.0), Vertex::new(line, t + 1.5)).into());
            if i % 5 == 0 {
                out.push(Primitive::event(3, line, t + 0.25).into());
            }
        }
        out
    }

    fn write(path: &Path, drawables: &[Drawable], config: &TreeConfig) {
        let mut writer = Slog2Writer::create(path, config).unwrap();
        writer.add_category(Category::new(1, "outer", Topology::State));
        writer.add_category(Category::new(2, "inner", Topology::State));
        writer.add_category(Category::new(3, "mark", Topology::Event));
        for d in drawables {
            writer.add_drawable(d.clone()).unwrap();
        }
        writer.close().unwrap();
    }

    fn open(path: &Path) -> Slog2Reader {
        let options = ReadOptions {
            resolve_categories: false,
            ..ReadOptions::default()
        };
        Slog2Reader::open_with(path, options).unwrap()
    }

    #[test]
    fn test_round_trip_all_orders() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rt.slog2");
        let drawables = sample(60);
        write(&path, &drawables, &TreeConfig::default().leaf_byte_cap(1024).fanout(3));

        for order in [
            DrawableOrder::IncreasingStartDecreasingEnd,
            DrawableOrder::IncreasingEnd,
            DrawableOrder::DecreasingStart,
            DrawableOrder::DecreasingEnd,
        ] {
            let mut reader = open(&path);
            let got: Vec<Drawable> = reader
                .query_range(TimeBoundingBox::ALL_TIME, order)
                .collect::<SlogResult<_>>()
                .unwrap();

            let mut expected = drawables.clone();
            expected.sort_by(|a, b| order.compare(a.bbox(), b.bbox()));

            assert_eq!(got.len(), expected.len());
            for pair in got.windows(2) {
                assert_ne!(order.compare(pair[0].bbox(), pair[1].bbox()), Ordering::Greater);
            }
            for d in &expected {
                assert!(got.contains(d));
            }
        }
    }

    #[test]
    fn test_window_query_is_exact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("win.slog2");
        let drawables = sample(80);
        write(&path, &drawables, &TreeConfig::default().leaf_byte_cap(512));

        let window = TimeBoundingBox::new(20.0, 30.0);
        let mut reader = open(&path);
        let got: Vec<Drawable> = reader
            .query_range(window, DrawableOrder::FORWARD)
            .collect::<SlogResult<_>>()
            .unwrap();

        let expected = drawables.iter().filter(|d| d.overlaps(&window)).count();
        assert_eq!(got.len(), expected);
        assert!(got.iter().all(|d| d.overlaps(&window)));
    }

    #[test]
    fn test_pruning_never_visits_disjoint_nodes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prune.slog2");
        write(&path, &sample(200), &TreeConfig::default().leaf_byte_cap(512));

        let window = TimeBoundingBox::new(100.0, 101.0);
        let mut reader = open(&path);
        let total_leaves = reader.tree_dir().at_depth(0).count();

        let dir_copy = reader.tree_dir().clone();
        let mut query = reader.query_range(window, DrawableOrder::FORWARD);
        while let Some(d) = query.next() {
            d.unwrap();
        }

        assert!(!query.visited().is_empty());
        for id in query.visited() {
            assert!(dir_copy.get(id).unwrap().bbox.overlaps(&window));
        }
        assert!(query.leaves_read() < total_leaves);
    }

    #[test]
    fn test_point_window_hits_events() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pt.slog2");
        write(&path, &sample(20), &TreeConfig::default());

        let mut reader = open(&path);
        let got: Vec<Drawable> = reader
            .query_range(TimeBoundingBox::point(10.25), DrawableOrder::FORWARD)
            .collect::<SlogResult<_>>()
            .unwrap();

        assert!(got.iter().any(|d| d.category_index() == 3));
        assert!(got.iter().all(|d| d.bbox().earliest <= 10.25 && 10.25 <= d.bbox().latest));
    }

    #[test]
    fn test_empty_window_yields_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("none.slog2");
        write(&path, &sample(10), &TreeConfig::default());

        let mut reader = open(&path);
        let mut query = reader.query_range(TimeBoundingBox::new(500.0, 600.0), DrawableOrder::BACKWARD);
        assert!(query.next().is_none());
        assert!(query.visited().is_empty());
    }
}

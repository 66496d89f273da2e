//! Navigable in-memory slice of the tree
//!
//! `TreeWindow` keeps the nodes overlapping a time window, from the root down
//! to a movable lowest depth, in an arena keyed by `TreeNodeID`. Parent and
//! child links are ids, resolved through the arena.

use crate::model::{Drawable, TimeBounded, TimeBoundingBox};
use crate::slog::error::SlogResult;
use crate::slog::reader::Slog2Reader;
use crate::slog::treenode::{TreeNode, TreeNodeID};
use std::collections::BTreeMap;
use tracing::debug;

pub struct TreeWindow {
    nodes: BTreeMap<TreeNodeID, TreeNode>,
    window: TimeBoundingBox,
    /// Deepest loaded level; equal to the root depth when only the root is loaded
    lowest_depth: Option<i16>,
    max_nodes: usize,
}

impl TreeWindow {
    pub fn new(max_nodes: usize) -> Self {
        Self {
            nodes: BTreeMap::new(),
            window: TimeBoundingBox::ALL_TIME,
            lowest_depth: None,
            max_nodes: max_nodes.max(1),
        }
    }

    pub fn window(&self) -> &TimeBoundingBox {
        &self.window
    }

    pub fn lowest_depth(&self) -> Option<i16> {
        self.lowest_depth
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &TreeNodeID) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    pub fn parent(&self, id: &TreeNodeID) -> Option<&TreeNode> {
        let parent = self.nodes.get(id)?.parent?;
        self.nodes.get(&parent)
    }

    /// Loaded children of a node, left to right
    pub fn children(&self, id: &TreeNodeID) -> Vec<&TreeNode> {
        match self.nodes.get(id) {
            Some(node) => node
                .children()
                .iter()
                .filter_map(|c| self.nodes.get(&c.id))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Loaded nodes at one depth, left to right
    pub fn nodes_at(&self, depth: i16) -> impl Iterator<Item = &TreeNode> {
        self.nodes.values().filter(move |n| n.id.depth == depth)
    }

    /// Drawables of the loaded leaves that overlap the window
    pub fn drawables(&self) -> impl Iterator<Item = &Drawable> {
        let window = self.window;
        self.nodes_at(0)
            .flat_map(|n| n.drawables().iter())
            .filter(move |d| d.overlaps(&window))
    }

    /// Move the window: evict nodes outside it and make sure the root is loaded
    pub fn set_time_window(&mut self, reader: &mut Slog2Reader, window: TimeBoundingBox) -> SlogResult<()> {
        self.window = window;
        self.nodes.retain(|_, n| n.bbox.overlaps(&window));

        let root = reader.tree_dir().root().map(|(id, e)| (*id, e.bbox));
        match root {
            Some((id, bbox)) if bbox.overlaps(&window) => {
                if !self.nodes.contains_key(&id) {
                    let node = reader.read_node(id)?;
                    self.nodes.insert(id, node);
                }
                let lowest = self.lowest_depth.unwrap_or(id.depth);
                // Refill levels the new window exposes
                self.lowest_depth = Some(id.depth);
                while self.lowest_depth.map_or(false, |d| d > lowest) {
                    if !self.grow_in_tree_window(reader)? {
                        break;
                    }
                }
                if let Some(reached) = self.lowest_depth {
                    self.nodes.retain(|id, _| id.depth >= reached);
                }
            }
            _ => {
                self.nodes.clear();
                self.lowest_depth = None;
            }
        }
        debug!(
            "Tree window {} holds {} nodes down to depth {:?}",
            self.window,
            self.nodes.len(),
            self.lowest_depth
        );
        Ok(())
    }

    /// Load the next level toward the leaves
    ///
    /// Returns false at leaf level or when the level would exceed `max_nodes`.
    pub fn grow_in_tree_window(&mut self, reader: &mut Slog2Reader) -> SlogResult<bool> {
        let Some(lowest) = self.lowest_depth else {
            return Ok(false);
        };
        if lowest == 0 {
            return Ok(false);
        }

        let wanted: Vec<TreeNodeID> = self
            .nodes_at(lowest)
            .flat_map(|n| n.children().iter())
            .filter(|c| c.bbox.overlaps(&self.window) && !self.nodes.contains_key(&c.id))
            .map(|c| c.id)
            .collect();
        if self.nodes.len() + wanted.len() > self.max_nodes {
            debug!(
                "Not growing to depth {}: {} more nodes would exceed {}",
                lowest - 1,
                wanted.len(),
                self.max_nodes
            );
            return Ok(false);
        }

        for id in wanted {
            let node = reader.read_node(id)?;
            self.nodes.insert(id, node);
        }
        self.lowest_depth = Some(lowest - 1);
        Ok(true)
    }

    /// Drop the lowest loaded level; returns false when only the root is left
    pub fn shrink_in_tree_window(&mut self) -> bool {
        let (Some(lowest), Some(root_depth)) = (self.lowest_depth, self.root_depth()) else {
            return false;
        };
        if lowest >= root_depth {
            return false;
        }
        self.nodes.retain(|id, _| id.depth != lowest);
        self.lowest_depth = Some(lowest + 1);
        true
    }

    fn root_depth(&self) -> Option<i16> {
        self.nodes.keys().next().map(|id| id.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Primitive, Topology, Vertex};
    use crate::slog::writer::{Slog2Writer, TreeConfig};
    use tempfile::tempdir;

    fn sample_reader(dir: &std::path::Path) -> Slog2Reader {
        let path = dir.join("w.slog2");
        let mut writer = Slog2Writer::create(&path, &TreeConfig::default().leaf_byte_cap(256)).unwrap();
        writer.add_category(Category::new(1, "s", Topology::State));
        for i in 0..64 {
            let t = i as f64;
            writer
                .add_drawable(Primitive::new(1, Vertex::new(0, t), Vertex::new(0, t + 0.5)).into())
                .unwrap();
        }
        writer.close().unwrap();
        Slog2Reader::open(&path).unwrap()
    }

    #[test]
    fn test_grow_to_leaves_and_shrink_back() {
        let dir = tempdir().unwrap();
        let mut reader = sample_reader(dir.path());
        let root_depth = reader.tree_dir().max_depth();

        let mut window = TreeWindow::new(10_000);
        window
            .set_time_window(&mut reader, TimeBoundingBox::new(10.0, 20.0))
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window.lowest_depth(), Some(root_depth));

        while window.grow_in_tree_window(&mut reader).unwrap() {}
        assert_eq!(window.lowest_depth(), Some(0));
        let count = window.drawables().count();
        assert_eq!(count, 10);

        for leaf in window.nodes_at(0) {
            let parent = window.parent(&leaf.id).unwrap();
            assert_eq!(parent.id.depth, 1);
            assert!(window.children(&parent.id).iter().any(|c| c.id == leaf.id));
        }

        assert!(window.shrink_in_tree_window());
        assert_eq!(window.lowest_depth(), Some(1));
        assert_eq!(window.nodes_at(0).count(), 0);
    }

    #[test]
    fn test_max_nodes_bounds_growth() {
        let dir = tempdir().unwrap();
        let mut reader = sample_reader(dir.path());

        let mut window = TreeWindow::new(3);
        window
            .set_time_window(&mut reader, TimeBoundingBox::ALL_TIME)
            .unwrap();
        while window.grow_in_tree_window(&mut reader).unwrap() {}
        assert!(window.len() <= 3);
        assert!(window.lowest_depth().unwrap() > 0);
    }

    #[test]
    fn test_moving_window_evicts() {
        let dir = tempdir().unwrap();
        let mut reader = sample_reader(dir.path());

        let mut window = TreeWindow::new(10_000);
        window
            .set_time_window(&mut reader, TimeBoundingBox::new(0.0, 8.0))
            .unwrap();
        while window.grow_in_tree_window(&mut reader).unwrap() {}

        window
            .set_time_window(&mut reader, TimeBoundingBox::new(40.0, 48.0))
            .unwrap();
        assert_eq!(window.lowest_depth(), Some(0));
        assert!(window.drawables().all(|d| d.bbox().earliest >= 39.5));
        assert_eq!(window.drawables().count(), 8);

        window
            .set_time_window(&mut reader, TimeBoundingBox::new(500.0, 600.0))
            .unwrap();
        assert!(window.is_empty());
    }
}

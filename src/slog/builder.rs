//! Streaming tree construction
//!
//! Drawables arrive in storage order and fill the current leaf. The leaf's
//! projected block size counts the node framing, one shadow per distinct
//! category and the checksum trailer. Before a drawable would push that past
//! the byte cap, the leaf is sealed, written and summarized into the level
//! above. Every `fanout` summaries at one level
//! seal a parent one level up. `finish` folds the partial levels into a
//! single root.
//!
//! ```text
//!   depth 2            (2,0)
//!                   /        \
//!   depth 1     (1,0)        (1,1)          partial levels: pending[d]
//!              /    \        /
//!   depth 0 (0,0) (0,1)  (0,2)  [leaf buffer]
//! ```

use crate::model::{Drawable, TimeBoundingBox};
use crate::slog::block::{encoded_size, BlockWriter, FileBlockPtr, CHECKSUM_SIZE};
use crate::slog::error::{SlogError, SlogResult};
use crate::slog::shadow::{leaf_shadows, merge_shadows, CategoryWeight};
use crate::slog::treedir::{TreeDir, TreeDirEntry};
use crate::slog::treenode::{ChildEntry, TreeNode, TreeNodeID, MAX_FANOUT};
use std::collections::BTreeSet;
use std::io::Write;
use tracing::debug;

/// Destination of sealed nodes
pub trait NodeSink {
    fn write_node(&mut self, node: &TreeNode) -> SlogResult<FileBlockPtr>;
}

impl<W: Write> NodeSink for BlockWriter<W> {
    fn write_node(&mut self, node: &TreeNode) -> SlogResult<FileBlockPtr> {
        self.write(node)
    }
}

/// Sealed node summary waiting for its parent
#[derive(Debug)]
struct Pending {
    entry: ChildEntry,
    shadows: Vec<CategoryWeight>,
    num_drawables: u64,
}

/// Result of a finished build
#[derive(Debug, Clone)]
pub struct BuiltTree {
    pub dir: TreeDir,
    pub root: TreeNodeID,
    pub root_ptr: FileBlockPtr,
    pub drawable_count: u64,
    pub total_bbox: TimeBoundingBox,
}

pub struct TreeBuilder {
    leaf_byte_cap: u64,
    fanout: u32,
    leaf: Vec<Drawable>,
    /// Projected encoded size of the leaf block
    leaf_bytes: u64,
    leaf_categories: BTreeSet<i32>,
    /// Block size of an empty leaf
    leaf_overhead: u64,
    shadow_size: u64,
    /// Sealed summaries per depth that have no parent yet
    pending: Vec<Vec<Pending>>,
    /// Nodes created per depth; doubles as the next xpos
    created: Vec<i32>,
    dir: TreeDir,
    drawable_count: u64,
}

impl TreeBuilder {
    pub fn new(leaf_byte_cap: u64, fanout: u32) -> SlogResult<Self> {
        if !(2..=MAX_FANOUT).contains(&fanout) {
            return Err(SlogError::Config(format!(
                "fanout must be between 2 and {}, got {}",
                MAX_FANOUT, fanout
            )));
        }
        if leaf_byte_cap == 0 {
            return Err(SlogError::Config("leaf byte cap must be positive".into()));
        }
        let leaf_overhead = leaf_overhead()?;
        Ok(Self {
            leaf_byte_cap,
            fanout,
            leaf: Vec::new(),
            leaf_bytes: leaf_overhead,
            leaf_categories: BTreeSet::new(),
            leaf_overhead,
            shadow_size: encoded_size(&CategoryWeight::new(0))?,
            pending: vec![Vec::new()],
            created: vec![0],
            dir: TreeDir::new(fanout),
            drawable_count: 0,
        })
    }

    pub fn drawable_count(&self) -> u64 {
        self.drawable_count
    }

    /// Nodes sealed so far
    pub fn node_count(&self) -> usize {
        self.dir.len()
    }

    /// Append a drawable, sealing the current leaf first if it would overflow
    pub fn add<S: NodeSink>(&mut self, drawable: Drawable, sink: &mut S) -> SlogResult<()> {
        let size = encoded_size(&drawable)?;
        let category = drawable.category_index();
        let projected = self.leaf_bytes + self.growth(size, category);
        if !self.leaf.is_empty() && projected > self.leaf_byte_cap {
            self.seal_leaf(sink)?;
            self.cascade(sink)?;
        }
        self.leaf_bytes += self.growth(size, category);
        self.leaf_categories.insert(category);
        self.leaf.push(drawable);
        self.drawable_count += 1;
        Ok(())
    }

    /// Bytes the leaf block grows by when a drawable of `size` joins it
    fn growth(&self, size: u64, category: i32) -> u64 {
        if self.leaf_categories.contains(&category) {
            size
        } else {
            size + self.shadow_size
        }
    }

    fn seal_leaf<S: NodeSink>(&mut self, sink: &mut S) -> SlogResult<()> {
        let drawables = std::mem::take(&mut self.leaf);
        self.leaf_bytes = self.leaf_overhead;
        self.leaf_categories.clear();

        let id = self.next_id(0);
        let shadows = leaf_shadows(&drawables);
        let num_drawables = drawables.len() as u64;
        let node = TreeNode::leaf(id, drawables, shadows);
        let block_ptr = sink.write_node(&node)?;
        debug!("Sealed leaf {} with {} drawables at {}", id, num_drawables, block_ptr);

        self.record(node, block_ptr, num_drawables, 0)
    }

    fn seal_internal<S: NodeSink>(&mut self, depth: usize, sink: &mut S) -> SlogResult<()> {
        let children = std::mem::take(&mut self.pending[depth - 1]);

        let id = self.next_id(depth);
        let mut shadows = Vec::new();
        let mut num_drawables = 0;
        for child in &children {
            merge_shadows(&mut shadows, &child.shadows);
            num_drawables += child.num_drawables;
            self.dir.set_parent(&child.entry.id, id);
        }
        let entries = children.into_iter().map(|c| c.entry).collect();
        let node = TreeNode::internal(id, entries, shadows);
        let block_ptr = sink.write_node(&node)?;
        debug!("Sealed node {} at {}", id, block_ptr);

        self.record(node, block_ptr, num_drawables, depth)
    }

    fn next_id(&mut self, depth: usize) -> TreeNodeID {
        while self.created.len() <= depth {
            self.created.push(0);
            self.pending.push(Vec::new());
        }
        let xpos = self.created[depth];
        self.created[depth] += 1;
        TreeNodeID::new(depth as i16, xpos)
    }

    /// Register a sealed node and push its summary one level up
    fn record(
        &mut self,
        node: TreeNode,
        block_ptr: FileBlockPtr,
        num_drawables: u64,
        depth: usize,
    ) -> SlogResult<()> {
        self.dir.insert(
            node.id,
            TreeDirEntry {
                bbox: node.bbox,
                block_ptr,
                parent: None,
                num_drawables,
            },
        );
        self.pending[depth].push(Pending {
            entry: ChildEntry {
                id: node.id,
                bbox: node.bbox,
                block_ptr,
            },
            shadows: node.shadows,
            num_drawables,
        });
        Ok(())
    }

    /// Seal full levels bottom-up
    fn cascade<S: NodeSink>(&mut self, sink: &mut S) -> SlogResult<()> {
        let mut depth = 0;
        while depth < self.pending.len() {
            if self.pending[depth].len() >= self.fanout as usize {
                self.seal_internal(depth + 1, sink)?;
            }
            depth += 1;
        }
        Ok(())
    }

    /// Seal what is left and fold partial levels into one root
    pub fn finish<S: NodeSink>(mut self, sink: &mut S) -> SlogResult<BuiltTree> {
        if !self.leaf.is_empty() || self.dir.is_empty() {
            self.seal_leaf(sink)?;
            self.cascade(sink)?;
        }

        let mut depth = 0;
        let (root, root_ptr) = loop {
            let above = self.created.get(depth + 1).copied().unwrap_or(0);
            let level = &self.pending[depth];
            if level.len() == 1 && above == 0 {
                let entry = &level[0].entry;
                break (entry.id, entry.block_ptr);
            }
            if !level.is_empty() {
                self.seal_internal(depth + 1, sink)?;
                self.cascade(sink)?;
            }
            depth += 1;
        };

        let total_bbox = self
            .dir
            .get(&root)
            .map(|e| e.bbox)
            .filter(|b| !b.is_empty())
            .unwrap_or(TimeBoundingBox::point(0.0));
        debug!(
            "Tree finished: root {}, {} nodes, {} drawables",
            root,
            self.dir.len(),
            self.drawable_count
        );

        Ok(BuiltTree {
            dir: self.dir,
            root,
            root_ptr,
            drawable_count: self.drawable_count,
            total_bbox,
        })
    }
}

/// Uncompressed block size of a leaf with no drawables and no shadows
fn leaf_overhead() -> SlogResult<u64> {
    let empty = TreeNode::leaf(TreeNodeID::new(0, 0), Vec::new(), Vec::new());
    Ok(encoded_size(&empty)? + CHECKSUM_SIZE as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Primitive, Vertex};
    use crate::slog::block::{encode_block, CompressionType};
    use std::collections::HashMap;

    /// Keeps nodes in memory and hands out fake sequential pointers
    #[derive(Default)]
    struct MemorySink {
        nodes: HashMap<TreeNodeID, TreeNode>,
        next: i64,
    }

    impl NodeSink for MemorySink {
        fn write_node(&mut self, node: &TreeNode) -> SlogResult<FileBlockPtr> {
            self.nodes.insert(node.id, node.clone());
            self.next += 1;
            Ok(FileBlockPtr::new(self.next, 1))
        }
    }

    fn state(i: usize) -> Drawable {
        let t = i as f64;
        Primitive::new(1, Vertex::new(0, t), Vertex::new(0, t + 0.5)).into()
    }

    fn build(count: usize, cap: u64, fanout: u32) -> (BuiltTree, MemorySink) {
        let mut sink = MemorySink::default();
        let mut builder = TreeBuilder::new(cap, fanout).unwrap();
        for i in 0..count {
            builder.add(state(i), &mut sink).unwrap();
        }
        (builder.finish(&mut sink).unwrap(), sink)
    }

    fn encoded_leaf_sizes(sink: &MemorySink) -> Vec<(usize, u64)> {
        sink.nodes
            .values()
            .filter(|n| n.is_leaf())
            .map(|n| {
                let block = encode_block(n, CompressionType::None).unwrap();
                (n.drawables().len(), block.len() as u64)
            })
            .collect()
    }

    #[test]
    fn test_leaf_cap_exceeded_by_at_most_one_drawable() {
        let one = encoded_size(&state(0)).unwrap();
        let shadow = encoded_size(&CategoryWeight::new(0)).unwrap();
        let cap = leaf_overhead().unwrap() + shadow + one * 3 + one / 2;
        let (tree, sink) = build(20, cap, 2);

        let leaves = encoded_leaf_sizes(&sink);
        assert_eq!(leaves.len(), 7);
        for (count, bytes) in leaves {
            assert!(count <= 3);
            assert!(bytes <= cap);
        }
        assert_eq!(tree.drawable_count, 20);
    }

    #[test]
    fn test_leaf_cap_counts_shadows_of_distinct_categories() {
        let one = encoded_size(&state(0)).unwrap();
        let cap = one * 10;
        let mut sink = MemorySink::default();
        let mut builder = TreeBuilder::new(cap, 2).unwrap();
        for i in 0..40 {
            let t = i as f64;
            let d = Primitive::new(i as i32, Vertex::new(0, t), Vertex::new(0, t + 0.5));
            builder.add(d.into(), &mut sink).unwrap();
        }
        builder.finish(&mut sink).unwrap();

        for (count, bytes) in encoded_leaf_sizes(&sink) {
            assert!(bytes <= cap + one, "leaf of {} drawables is {} bytes", count, bytes);
            if count > 1 {
                assert!(bytes <= cap);
            }
        }
    }

    #[test]
    fn test_children_follow_addressing() {
        let one = encoded_size(&state(0)).unwrap();
        let (tree, sink) = build(10, one, 3);

        // 10 leaves -> 4 at depth 1 -> 2 at depth 2 -> root at depth 3
        assert_eq!(tree.root, TreeNodeID::new(3, 0));
        assert_eq!(tree.dir.len(), 10 + 4 + 2 + 1);

        for node in sink.nodes.values() {
            for (i, child) in node.children().iter().enumerate() {
                assert_eq!(child.id.depth, node.id.depth - 1);
                assert_eq!(child.id.xpos, node.id.xpos * 3 + i as i32);
                assert!(node.bbox.covers(&child.bbox));
                assert_eq!(tree.dir.get(&child.id).unwrap().parent, Some(node.id));
            }
        }
    }

    #[test]
    fn test_root_shadow_counts_everything() {
        let (tree, sink) = build(37, 200, 2);
        let root = &sink.nodes[&tree.root];
        assert_eq!(root.num_drawables(), 37);
        assert_eq!(tree.dir.get(&tree.root).unwrap().num_drawables, 37);
        assert_eq!(tree.total_bbox, TimeBoundingBox::new(0.0, 36.5));
    }

    #[test]
    fn test_single_leaf_is_root() {
        let (tree, _) = build(3, 1 << 20, 2);
        assert_eq!(tree.root, TreeNodeID::new(0, 0));
        assert_eq!(tree.dir.len(), 1);
    }

    #[test]
    fn test_empty_tree_has_a_root() {
        let (tree, sink) = build(0, 1024, 2);
        assert_eq!(tree.root, TreeNodeID::new(0, 0));
        assert!(sink.nodes[&tree.root].drawables().is_empty());
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(TreeBuilder::new(1024, 1).is_err());
        assert!(TreeBuilder::new(1024, MAX_FANOUT + 1).is_err());
        assert!(TreeBuilder::new(0, 2).is_err());
    }
}

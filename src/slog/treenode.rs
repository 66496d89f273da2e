//! Tree nodes and their addressing
//!
//! Leaves sit at depth 0 and hold drawables; internal nodes hold summaries of
//! their children. The children of `(d, x)` are `(d-1, x*N .. x*N+N-1)` for
//! fanout `N`, so parents and children are found by arithmetic, never by
//! pointers between nodes.

use crate::model::{Drawable, TimeBounded, TimeBoundingBox};
use crate::slog::block::FileBlockPtr;
use crate::slog::shadow::CategoryWeight;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::Range;

/// Largest fanout whose child positions fit the `i32` xpos
pub const MAX_FANOUT: u32 = i32::MAX as u32;

fn fanout_xpos(fanout: u32) -> i32 {
    i32::try_from(fanout).unwrap_or(i32::MAX)
}

/// Position of a node in the tree
///
/// Ordering is depth descending, then xpos ascending: the root first, then
/// each level left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeNodeID {
    pub depth: i16,
    pub xpos: i32,
}

impl TreeNodeID {
    pub fn new(depth: i16, xpos: i32) -> Self {
        Self { depth, xpos }
    }

    pub fn is_leaf(&self) -> bool {
        self.depth == 0
    }

    pub fn parent(&self, fanout: u32) -> TreeNodeID {
        TreeNodeID::new(self.depth + 1, self.xpos / fanout_xpos(fanout))
    }

    /// First child, or None for a leaf or a position past the xpos range
    pub fn first_child(&self, fanout: u32) -> Option<TreeNodeID> {
        if self.is_leaf() {
            return None;
        }
        let xpos = self.xpos.checked_mul(fanout_xpos(fanout))?;
        Some(TreeNodeID::new(self.depth - 1, xpos))
    }

    /// xpos range the children may occupy; empty for a leaf
    pub fn child_xpos_range(&self, fanout: u32) -> Range<i32> {
        match self.first_child(fanout) {
            Some(first) => first.xpos..first.xpos.saturating_add(fanout_xpos(fanout)),
            None => 0..0,
        }
    }

    /// Depth descending, then xpos descending
    pub fn cmp_backward(&self, other: &Self) -> Ordering {
        other
            .depth
            .cmp(&self.depth)
            .then_with(|| other.xpos.cmp(&self.xpos))
    }
}

impl Ord for TreeNodeID {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .depth
            .cmp(&self.depth)
            .then_with(|| self.xpos.cmp(&other.xpos))
    }
}

impl PartialOrd for TreeNodeID {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for TreeNodeID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.depth, self.xpos)
    }
}

/// Summary of a child kept inside its parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildEntry {
    pub id: TreeNodeID,
    pub bbox: TimeBoundingBox,
    pub block_ptr: FileBlockPtr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeContent {
    Leaf(Vec<Drawable>),
    Internal(Vec<ChildEntry>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: TreeNodeID,
    pub bbox: TimeBoundingBox,
    pub content: NodeContent,
    /// Per-category summary of everything below this node
    pub shadows: Vec<CategoryWeight>,
    /// Filled in from the directory when the node is read back
    #[serde(skip)]
    pub parent: Option<TreeNodeID>,
    /// Where this node lives in the file; assigned on write
    #[serde(skip)]
    pub block_ptr: FileBlockPtr,
}

impl TreeNode {
    pub fn leaf(id: TreeNodeID, drawables: Vec<Drawable>, shadows: Vec<CategoryWeight>) -> Self {
        let mut bbox = TimeBoundingBox::empty();
        for d in &drawables {
            bbox.union(d.bbox());
        }
        Self {
            id,
            bbox,
            content: NodeContent::Leaf(drawables),
            shadows,
            parent: None,
            block_ptr: FileBlockPtr::NULL,
        }
    }

    pub fn internal(id: TreeNodeID, children: Vec<ChildEntry>, shadows: Vec<CategoryWeight>) -> Self {
        let mut bbox = TimeBoundingBox::empty();
        for c in &children {
            bbox.union(&c.bbox);
        }
        Self {
            id,
            bbox,
            content: NodeContent::Internal(children),
            shadows,
            parent: None,
            block_ptr: FileBlockPtr::NULL,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.content, NodeContent::Leaf(_))
    }

    /// Drawables of a leaf; empty for internal nodes
    pub fn drawables(&self) -> &[Drawable] {
        match &self.content {
            NodeContent::Leaf(d) => d,
            NodeContent::Internal(_) => &[],
        }
    }

    /// Child summaries of an internal node; empty for leaves
    pub fn children(&self) -> &[ChildEntry] {
        match &self.content {
            NodeContent::Leaf(_) => &[],
            NodeContent::Internal(c) => c,
        }
    }

    /// Number of drawables summarized by this node's shadows
    pub fn num_drawables(&self) -> u64 {
        self.shadows.iter().map(|s| s.num_drawables).sum()
    }

    pub fn into_drawables(self) -> Vec<Drawable> {
        match self.content {
            NodeContent::Leaf(d) => d,
            NodeContent::Internal(_) => Vec::new(),
        }
    }
}

impl TimeBounded for TreeNode {
    fn bbox(&self) -> &TimeBoundingBox {
        &self.bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Primitive, Vertex};

    #[test]
    fn test_addressing() {
        let node = TreeNodeID::new(2, 3);
        assert_eq!(node.first_child(4), Some(TreeNodeID::new(1, 12)));
        assert_eq!(node.child_xpos_range(4), 12..16);
        assert_eq!(TreeNodeID::new(1, 15).parent(4), node);
        assert_eq!(TreeNodeID::new(0, 7).first_child(2), None);
    }

    #[test]
    fn test_addressing_does_not_overflow() {
        let node = TreeNodeID::new(1, i32::MAX / 2);
        assert_eq!(node.first_child(4), None);
        assert!(node.child_xpos_range(4).is_empty());

        let wide = TreeNodeID::new(1, 1);
        assert_eq!(wide.child_xpos_range(MAX_FANOUT), i32::MAX..i32::MAX);
        assert_eq!(TreeNodeID::new(0, 5).parent(u32::MAX), TreeNodeID::new(1, 0));
    }

    #[test]
    fn test_forward_and_backward_order() {
        let mut ids = vec![
            TreeNodeID::new(0, 1),
            TreeNodeID::new(1, 0),
            TreeNodeID::new(0, 0),
            TreeNodeID::new(2, 0),
            TreeNodeID::new(1, 1),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                TreeNodeID::new(2, 0),
                TreeNodeID::new(1, 0),
                TreeNodeID::new(1, 1),
                TreeNodeID::new(0, 0),
                TreeNodeID::new(0, 1),
            ]
        );

        ids.sort_by(|a, b| a.cmp_backward(b));
        assert_eq!(ids[1], TreeNodeID::new(1, 1));
        assert_eq!(ids[4], TreeNodeID::new(0, 0));
    }

    #[test]
    fn test_leaf_box_covers_drawables() {
        let drawables = vec![
            Drawable::from(Primitive::new(1, Vertex::new(0, 2.0), Vertex::new(0, 3.0))),
            Drawable::from(Primitive::event(2, 1, 7.5)),
        ];
        let leaf = TreeNode::leaf(TreeNodeID::new(0, 0), drawables, Vec::new());

        assert!(leaf.is_leaf());
        assert_eq!(leaf.bbox, TimeBoundingBox::new(2.0, 7.5));
        assert_eq!(leaf.drawables().len(), 2);
        assert!(leaf.children().is_empty());
    }
}

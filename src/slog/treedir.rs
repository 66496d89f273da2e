//! In-memory directory of every tree node
//!
//! Written once after all nodes, read once on open. Range queries walk the
//! directory top-down and only touch the file for leaves they need.

use crate::model::TimeBoundingBox;
use crate::slog::block::FileBlockPtr;
use crate::slog::treenode::TreeNodeID;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeDirEntry {
    pub bbox: TimeBoundingBox,
    pub block_ptr: FileBlockPtr,
    pub parent: Option<TreeNodeID>,
    /// Drawables stored at or below this node
    pub num_drawables: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeDir {
    fanout: u32,
    entries: BTreeMap<TreeNodeID, TreeDirEntry>,
}

impl TreeDir {
    pub fn new(fanout: u32) -> Self {
        Self {
            fanout,
            entries: BTreeMap::new(),
        }
    }

    pub fn fanout(&self) -> u32 {
        self.fanout
    }

    pub fn insert(&mut self, id: TreeNodeID, entry: TreeDirEntry) {
        self.entries.insert(id, entry);
    }

    pub fn get(&self, id: &TreeNodeID) -> Option<&TreeDirEntry> {
        self.entries.get(id)
    }

    pub fn set_parent(&mut self, child: &TreeNodeID, parent: TreeNodeID) {
        if let Some(entry) = self.entries.get_mut(child) {
            entry.parent = Some(parent);
        }
    }

    /// The root sorts first: deepest level, leftmost node
    pub fn root(&self) -> Option<(&TreeNodeID, &TreeDirEntry)> {
        self.entries.first_key_value()
    }

    pub fn max_depth(&self) -> i16 {
        self.root().map(|(id, _)| id.depth).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in forward order
    pub fn iter(&self) -> impl Iterator<Item = (&TreeNodeID, &TreeDirEntry)> {
        self.entries.iter()
    }

    /// Nodes at one depth, left to right
    pub fn at_depth(&self, depth: i16) -> impl Iterator<Item = (&TreeNodeID, &TreeDirEntry)> {
        let start = TreeNodeID::new(depth, i32::MIN);
        let end = TreeNodeID::new(depth, i32::MAX);
        self.entries.range(start..=end)
    }

    /// Existing children of `id`, left to right
    pub fn children_of(&self, id: &TreeNodeID) -> impl Iterator<Item = (&TreeNodeID, &TreeDirEntry)> + '_ {
        let depth = id.depth - 1;
        id.child_xpos_range(self.fanout)
            .filter_map(move |x| self.entries.get_key_value(&TreeNodeID::new(depth, x)))
    }

    /// Ids whose box overlaps `window`, found by descending from the root
    /// without entering any subtree whose box misses the window
    pub fn overlapping(&self, window: &TimeBoundingBox) -> Vec<TreeNodeID> {
        let mut visited = Vec::new();
        let mut stack: Vec<TreeNodeID> = Vec::new();
        if let Some((root, entry)) = self.root() {
            if entry.bbox.overlaps(window) {
                stack.push(*root);
            }
        }

        while let Some(id) = stack.pop() {
            visited.push(id);
            let mut children: Vec<TreeNodeID> = self
                .children_of(&id)
                .filter(|(_, e)| e.bbox.overlaps(window))
                .map(|(c, _)| *c)
                .collect();
            // Pop leftmost first
            children.reverse();
            stack.extend(children);
        }
        visited
    }
}

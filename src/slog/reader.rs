//! SLOG-2 file reader
//!
//! Opening reads the header, the category list, the line-id maps and the tree
//! directory. Tree nodes are fetched on demand.

use crate::model::{category_map, Category, CategoryMap, DrawableOrder, LineIdMap, TimeBoundingBox};
use crate::slog::block::read_block;
use crate::slog::error::{SlogError, SlogResult};
use crate::slog::header::{Slog2Header, HEADER_SIZE};
use crate::slog::query::RangeQuery;
use crate::slog::shadow::{merge_in_window, CategoryWeight};
use crate::slog::treedir::TreeDir;
use crate::slog::treenode::{TreeNode, TreeNodeID};
use crate::version::VersionCheck;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Options for opening a file
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOptions {
    /// Open files written by unknown format versions
    pub allow_incompatible: bool,
    /// Attach categories to drawables yielded by queries
    pub resolve_categories: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            allow_incompatible: false,
            resolve_categories: true,
        }
    }
}

pub struct Slog2Reader {
    path: PathBuf,
    file: BufReader<File>,
    header: Slog2Header,
    options: ReadOptions,
    categories: CategoryMap,
    line_id_maps: Vec<LineIdMap>,
    dir: TreeDir,
    nodes_read: u64,
}

impl Slog2Reader {
    pub fn open<P: AsRef<Path>>(path: P) -> SlogResult<Self> {
        Self::open_with(path, ReadOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: ReadOptions) -> SlogResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = BufReader::new(File::open(&path)?);

        let mut raw = [0u8; HEADER_SIZE];
        file.read_exact(&mut raw)?;
        let header = Slog2Header::from_bytes(&raw, options.allow_incompatible)?;
        if let VersionCheck::Incompatible(found) = header.version_check() {
            warn!("{} has unknown version {:?}; reading anyway", path.display(), found);
        }
        if !header.is_complete() {
            return Err(SlogError::Corruption(format!(
                "{} was not closed properly (header pointers missing)",
                path.display()
            )));
        }

        let compression = header.compression;
        let categories: Vec<Category> = read_block(&mut file, header.categories, compression)?;
        let line_id_maps: Vec<LineIdMap> = if header.line_id_maps.is_null() {
            Vec::new()
        } else {
            read_block(&mut file, header.line_id_maps, compression)?
        };
        let dir: TreeDir = read_block(&mut file, header.tree_dir, compression)?;

        debug!(
            "Opened {}: {} nodes, {} categories, {} drawables",
            path.display(),
            dir.len(),
            categories.len(),
            header.drawable_count
        );

        Ok(Self {
            path,
            file,
            header,
            options,
            categories: category_map(categories),
            line_id_maps,
            dir,
            nodes_read: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &Slog2Header {
        &self.header
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    pub fn category_map(&self) -> &CategoryMap {
        &self.categories
    }

    pub fn line_id_maps(&self) -> &[LineIdMap] {
        &self.line_id_maps
    }

    pub fn tree_dir(&self) -> &TreeDir {
        &self.dir
    }

    /// Box covering every stored drawable
    pub fn total_bbox(&self) -> TimeBoundingBox {
        self.header.total_bbox
    }

    /// Nodes fetched from disk so far
    pub fn nodes_read(&self) -> u64 {
        self.nodes_read
    }

    /// Fetch one node, with its parent link and block pointer filled in
    pub fn read_node(&mut self, id: TreeNodeID) -> SlogResult<TreeNode> {
        let entry = self.dir.get(&id).ok_or(SlogError::NodeNotFound(id))?.clone();
        let mut node: TreeNode = read_block(&mut self.file, entry.block_ptr, self.header.compression)?;
        if node.id != id {
            return Err(SlogError::Corruption(format!(
                "block at {} holds node {} instead of {}",
                entry.block_ptr, node.id, id
            )));
        }
        node.parent = entry.parent;
        node.block_ptr = entry.block_ptr;
        self.nodes_read += 1;
        Ok(node)
    }

    /// Lazily iterate the drawables overlapping `window` in `order`
    pub fn query_range(&mut self, window: TimeBoundingBox, order: DrawableOrder) -> RangeQuery<'_> {
        RangeQuery::new(self, window, order)
    }

    /// Per-category weights of the nodes at `depth`, clipped to `window`
    pub fn shadows_at(&mut self, depth: i16, window: &TimeBoundingBox) -> SlogResult<Vec<CategoryWeight>> {
        let ids: Vec<TreeNodeID> = self
            .dir
            .at_depth(depth)
            .filter(|(_, e)| e.bbox.overlaps(window))
            .map(|(id, _)| *id)
            .collect();

        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            nodes.push(self.read_node(id)?);
        }
        Ok(merge_in_window(
            nodes.iter().map(|n| (&n.bbox, n.shadows.as_slice())),
            window,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Drawable, Primitive, Topology, Vertex};
    use crate::slog::writer::{Slog2Writer, TreeConfig};
    use tempfile::tempdir;

    fn write_sample(path: &Path, count: usize, config: &TreeConfig) {
        let mut writer = Slog2Writer::create(path, config).unwrap();
        writer.add_category(Category::new(1, "compute", Topology::State));
        let mut map = LineIdMap::new("process", vec!["comm".into(), "rank".into()]);
        map.insert(0, vec!["0".into(), "0".into()]);
        writer.add_line_id_map(map);

        for i in 0..count {
            let t = i as f64;
            let d = Primitive::new(1, Vertex::new(0, t), Vertex::new(0, t + 1.0));
            writer.add_drawable(d.into()).unwrap();
        }
        writer.close().unwrap();
    }

    #[test]
    fn test_round_trip_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.slog2");
        write_sample(&path, 50, &TreeConfig::default().leaf_byte_cap(512));

        let mut reader = Slog2Reader::open(&path).unwrap();
        assert_eq!(reader.header().drawable_count, 50);
        assert_eq!(reader.category_map()[&1].name, "compute");
        assert_eq!(reader.line_id_maps()[0].label(0), Some(&["0".to_string(), "0".to_string()][..]));
        assert_eq!(reader.total_bbox(), TimeBoundingBox::new(0.0, 50.0));

        let root_id = *reader.tree_dir().root().unwrap().0;
        let root = reader.read_node(root_id).unwrap();
        assert_eq!(root.num_drawables(), 50);
        assert!(root.parent.is_none());
    }

    #[test]
    fn test_read_missing_node() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("b.slog2");
        write_sample(&path, 3, &TreeConfig::default());

        let mut reader = Slog2Reader::open(&path).unwrap();
        assert!(matches!(
            reader.read_node(TreeNodeID::new(5, 5)),
            Err(SlogError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_shadows_at_leaf_level() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.slog2");
        write_sample(&path, 40, &TreeConfig::default().leaf_byte_cap(256));

        let mut reader = Slog2Reader::open(&path).unwrap();
        let all = reader.shadows_at(0, &TimeBoundingBox::ALL_TIME).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].num_drawables, 40);
        assert!((all[0].incl_time - 40.0).abs() < 1e-9);

        let root_depth = reader.tree_dir().max_depth();
        let top = reader.shadows_at(root_depth, &TimeBoundingBox::ALL_TIME).unwrap();
        assert_eq!(top, all);
    }

    #[test]
    fn test_unclosed_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d.slog2");
        let header = Slog2Header::new(Default::default(), 1024, 2);
        std::fs::write(&path, header.to_bytes()).unwrap();

        assert!(matches!(
            Slog2Reader::open(&path),
            Err(SlogError::Corruption(_))
        ));
    }

    #[test]
    fn test_query_resolves_categories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("e.slog2");
        write_sample(&path, 5, &TreeConfig::default());

        let mut reader = Slog2Reader::open(&path).unwrap();
        let found: Vec<Drawable> = reader
            .query_range(TimeBoundingBox::ALL_TIME, DrawableOrder::FORWARD)
            .collect::<SlogResult<_>>()
            .unwrap();
        assert_eq!(found.len(), 5);
        assert!(found.iter().all(|d| d.topology() == Some(Topology::State)));
    }
}

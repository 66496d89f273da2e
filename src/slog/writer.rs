//! SLOG-2 file writer
//!
//! Write protocol:
//! 1. a provisional header with null pointers
//! 2. tree nodes, each written as soon as it is sealed
//! 3. category list, line-id maps, tree directory
//! 4. the header again, now pointing at everything above

use crate::model::{Category, CategoryMap, Drawable, LineIdMap};
use crate::slog::block::{BlockWriter, CompressionType};
use crate::slog::builder::TreeBuilder;
use crate::slog::error::{SlogError, SlogResult};
use crate::slog::header::{Slog2Header, HEADER_SIZE};
use crate::slog::treenode::MAX_FANOUT;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Default leaf size: 64 KiB
pub const DEFAULT_LEAF_BYTE_CAP: u64 = 64 * 1024;

/// Default number of children per internal node
pub const DEFAULT_FANOUT: u32 = 2;

/// Tree shape and output options
#[derive(Debug, Clone, PartialEq)]
pub struct TreeConfig {
    pub leaf_byte_cap: u64,
    pub fanout: u32,
    pub compression: CompressionType,
    /// Drop categories no stored drawable refers to
    pub prune_unused_categories: bool,
    /// Categories whose drawables are silently dropped
    pub removed_categories: BTreeSet<i32>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            leaf_byte_cap: DEFAULT_LEAF_BYTE_CAP,
            fanout: DEFAULT_FANOUT,
            compression: CompressionType::Lz4,
            prune_unused_categories: false,
            removed_categories: BTreeSet::new(),
        }
    }
}

impl TreeConfig {
    pub fn leaf_byte_cap(mut self, cap: u64) -> Self {
        self.leaf_byte_cap = cap;
        self
    }

    pub fn fanout(mut self, fanout: u32) -> Self {
        self.fanout = fanout;
        self
    }

    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    pub fn prune_unused_categories(mut self, prune: bool) -> Self {
        self.prune_unused_categories = prune;
        self
    }

    pub fn remove_categories<I: IntoIterator<Item = i32>>(mut self, indexes: I) -> Self {
        self.removed_categories.extend(indexes);
        self
    }

    pub fn validate(&self) -> SlogResult<()> {
        if !(2..=MAX_FANOUT).contains(&self.fanout) {
            return Err(SlogError::Config(format!(
                "fanout must be between 2 and {}, got {}",
                MAX_FANOUT, self.fanout
            )));
        }
        if self.leaf_byte_cap == 0 || self.leaf_byte_cap > u32::MAX as u64 {
            return Err(SlogError::Config(format!(
                "leaf byte cap {} out of range",
                self.leaf_byte_cap
            )));
        }
        Ok(())
    }
}

/// What a closed writer produced
#[derive(Debug, Clone, PartialEq)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub drawables: u64,
    /// Drawables dropped because their category was removed
    pub dropped: u64,
    pub nodes: usize,
    pub max_depth: i32,
    pub categories: usize,
    pub bytes: u64,
}

pub struct Slog2Writer {
    path: PathBuf,
    config: TreeConfig,
    blocks: BlockWriter<BufWriter<File>>,
    builder: TreeBuilder,
    categories: CategoryMap,
    line_id_maps: Vec<LineIdMap>,
    used_categories: BTreeSet<i32>,
    dropped: u64,
}

impl Slog2Writer {
    /// Create the file and write a provisional header
    pub fn create<P: AsRef<Path>>(path: P, config: &TreeConfig) -> SlogResult<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        let mut out = BufWriter::new(File::create(&path)?);
        let provisional = Slog2Header::new(
            config.compression,
            config.leaf_byte_cap as u32,
            config.fanout,
        );
        out.write_all(&provisional.to_bytes())?;
        debug!("Created SLOG-2 file {}", path.display());

        Ok(Self {
            path,
            config: config.clone(),
            blocks: BlockWriter::new(out, HEADER_SIZE as u64, config.compression),
            builder: TreeBuilder::new(config.leaf_byte_cap, config.fanout)?,
            categories: CategoryMap::new(),
            line_id_maps: Vec::new(),
            used_categories: BTreeSet::new(),
            dropped: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add_category(&mut self, category: Category) {
        self.categories.insert(category.index, Arc::new(category));
    }

    pub fn set_categories(&mut self, categories: CategoryMap) {
        self.categories = categories;
    }

    pub fn add_line_id_map(&mut self, map: LineIdMap) {
        self.line_id_maps.push(map);
    }

    /// Store a drawable; returns false when its category is removed
    pub fn add_drawable(&mut self, mut drawable: Drawable) -> SlogResult<bool> {
        let index = drawable.category_index();
        if self.config.removed_categories.contains(&index) {
            self.dropped += 1;
            return Ok(false);
        }

        drawable.release_category();
        self.used_categories.insert(index);
        self.builder.add(drawable, &mut self.blocks)?;
        Ok(true)
    }

    pub fn drawable_count(&self) -> u64 {
        self.builder.drawable_count()
    }

    /// Finish the tree, write the trailing blocks and backpatch the header
    pub fn close(self) -> SlogResult<WriteSummary> {
        let Slog2Writer {
            path,
            config,
            mut blocks,
            builder,
            categories,
            line_id_maps,
            used_categories,
            dropped,
        } = self;

        let tree = builder.finish(&mut blocks)?;

        let kept: Vec<&Category> = categories
            .values()
            .filter(|c| !config.removed_categories.contains(&c.index))
            .filter(|c| !config.prune_unused_categories || used_categories.contains(&c.index))
            .map(|c| c.as_ref())
            .collect();

        let mut header = Slog2Header::new(
            config.compression,
            config.leaf_byte_cap as u32,
            config.fanout,
        );
        header.categories = blocks.write(&kept)?;
        header.line_id_maps = blocks.write(&line_id_maps)?;
        header.tree_dir = blocks.write(&tree.dir)?;
        header.tree_root = tree.root_ptr;
        header.max_depth = tree.root.depth as i32;
        header.node_count = tree.dir.len() as u32;
        header.drawable_count = tree.drawable_count;
        header.total_bbox = tree.total_bbox;

        let bytes = blocks.position();
        let mut out = blocks.into_inner();
        out.seek(SeekFrom::Start(0))?;
        out.write_all(&header.to_bytes())?;
        out.flush()?;
        out.get_ref().sync_all()?;

        info!(
            "Wrote {}: {} drawables in {} nodes (depth {}), {} categories",
            path.display(),
            tree.drawable_count,
            header.node_count,
            header.max_depth,
            kept.len()
        );

        Ok(WriteSummary {
            path,
            drawables: tree.drawable_count,
            dropped,
            nodes: tree.dir.len(),
            max_depth: header.max_depth,
            categories: kept.len(),
            bytes,
        })
    }
}

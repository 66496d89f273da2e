//! SLOG-2 tree index and file format
//!
//! - **header**: fixed 256-byte header with backpatched block pointers
//! - **block**: checksummed, optionally compressed variable blocks
//! - **treenode**: node ids, leaves and internal nodes
//! - **treedir**: directory of every node, kept in memory by readers
//! - **shadow**: per-category summaries of subtrees
//! - **builder**: streaming bottom-up tree construction
//! - **writer** / **reader**: file-level entry points
//! - **query**: lazy, ordered range queries
//! - **window**: navigable in-memory slice of the tree
//!
//! ```text
//! ┌────────┬──────────────────────────┬────────────┬──────────┬──────────┐
//! │ Header │ tree nodes (leaves first,│ categories │ line-id  │ tree dir │
//! │ 256 B  │ parents after children)  │            │ maps     │          │
//! └────────┴──────────────────────────┴────────────┴──────────┴──────────┘
//! ```

pub mod block;
pub mod builder;
pub mod error;
pub mod header;
pub mod query;
pub mod reader;
pub mod shadow;
pub mod treedir;
pub mod treenode;
pub mod window;
pub mod writer;

pub use block::{CompressionType, FileBlockPtr};
pub use builder::{NodeSink, TreeBuilder};
pub use error::{SlogError, SlogResult};
pub use header::{Slog2Header, SLOG_COMPATIBLE_VERSIONS, SLOG_VERSION};
pub use query::RangeQuery;
pub use reader::{ReadOptions, Slog2Reader};
pub use shadow::CategoryWeight;
pub use treedir::{TreeDir, TreeDirEntry};
pub use treenode::{ChildEntry, NodeContent, TreeNode, TreeNodeID, MAX_FANOUT};
pub use window::TreeWindow;
pub use writer::{Slog2Writer, TreeConfig, WriteSummary, DEFAULT_FANOUT, DEFAULT_LEAF_BYTE_CAP};

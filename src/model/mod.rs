//! Trace data model
//!
//! - **timebox**: `TimeBoundingBox`, the `TimeBounded` trait and traversal orders
//! - **info**: typed info values and slots
//! - **category**: `Category`, `Topology`, colors
//! - **drawable**: `Primitive`, `Composite`, `Drawable`
//! - **linemap**: row labelling maps
//! - **error**: error types
//!
//! ```text
//! Category (index) ◄──── Drawable ──── TimeBoundingBox
//!                           │
//!                start Vertex, final Vertex, [InfoSlot]
//! ```

pub mod category;
pub mod drawable;
pub mod error;
pub mod info;
pub mod linemap;
pub mod timebox;

pub use category::{category_map, Category, CategoryMap, Rgba, Topology};
pub use drawable::{Composite, Drawable, Primitive, Vertex};
pub use error::{ModelError, ModelResult};
pub use info::{InfoDescriptor, InfoSlot, InfoType, InfoValue};
pub use linemap::LineIdMap;
pub use timebox::{DrawableOrder, OrderKey, TimeBounded, TimeBoundingBox};

//! Filesystem layer
//!
//! Path normalization, item inspection and the mutation primitives the verb handlers compose.

pub mod item;
pub mod ops;
pub mod path;

pub use item::{inspect, list_children, ItemInfo};
pub use path::{LogicalPath, Root};

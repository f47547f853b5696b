//! # Hierarchy Snapshots
//!
//! - **Hierarchy**: the tree model handed to the display side
//! - **Scheduler**: cancellable, coalesced production of that tree

pub mod hierarchy;
pub mod scheduler;

pub use hierarchy::{Attribute, AttributesGroup, AttributesSection, DisplayItem, HierarchySnapshot};
pub use scheduler::{EncodedSnapshot, RootsProvider, SnapshotHandle, SnapshotScheduler};

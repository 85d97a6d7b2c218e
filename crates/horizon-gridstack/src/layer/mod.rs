//! The layer stack.
//!
//! A table axis is modeled as a stack of layers. The base [`DataLayer`]
//! assigns stable indexes; each transformation layer above it presents a
//! reshaped position space while delegating to the layer directly below:
//!
//! - [`HideShowLayer`] removes a set of indexes from view
//! - [`ReorderLayer`] permutes positions
//! - [`ViewportLayer`] windows a scrollable slice
//! - [`TreeLayer`] folds a hierarchy into collapse/expand over an owned
//!   hide/show layer
//!
//! # Coordinate spaces
//!
//! Every layer answers queries in two spaces: *indexes* (stable identity,
//! assigned at the bottom) and *positions* (0-based contiguous rank, local
//! to each layer). The [`Layer`] trait is the translation contract between
//! adjacent layers; [`IndexAddressable`] is the capability every layer
//! provides for resolving identity.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_gridstack::layer::{DataLayer, HideShowLayer, Layer, IndexAddressable};
//! use horizon_gridstack::Orientation;
//!
//! let data = Arc::new(DataLayer::new(Orientation::Rows, 7));
//! let hide_show = HideShowLayer::new(data);
//!
//! hide_show.hide_by_positions(&[2]).unwrap();
//! assert_eq!(hide_show.count(), 6);
//! assert_eq!(hide_show.index_at(2), Some(3));
//! ```

mod data;
mod hide_show;
mod reorder;
mod traits;
mod tree;
mod viewport;

pub use data::{DEFAULT_ITEM_SIZE, DataLayer};
pub use hide_show::HideShowLayer;
pub use reorder::ReorderLayer;
pub use traits::{IndexAddressable, Layer};
pub use tree::{StaticTreeSource, TreeLayer, TreeSource};
pub use viewport::ViewportLayer;

//! Horizon GridStack - a layered coordinate engine for grid and table
//! widgets.
//!
//! GridStack models one table axis (rows or columns) as a stack of
//! composable layers. Each layer presents a transformed view of item
//! identity and order to the layer above it while delegating to the layer
//! below; structural changes flow back up as events whose position ranges
//! are translated into each layer's own coordinate space.
//!
//! # Core Types
//!
//! - [`Range`]: half-open interval over positions or indexes
//! - [`layer::Layer`] / [`layer::IndexAddressable`]: the stack contract
//! - [`layer::DataLayer`]: the base, data-backed layer
//! - [`layer::HideShowLayer`]: visibility transformation
//! - [`layer::TreeLayer`]: collapse/expand over a hierarchy
//! - [`LayerCommand`]: typed commands dispatched down the stack
//! - [`StructuralChange`]: the event fired bottom-up after a mutation
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use horizon_gridstack::layer::{DataLayer, HideShowLayer, IndexAddressable, Layer};
//! use horizon_gridstack::{LayerCommand, Orientation};
//!
//! let data = Arc::new(DataLayer::new(Orientation::Rows, 7));
//! let hide_show = HideShowLayer::new(data);
//!
//! // Observe structural changes at the top of the stack.
//! hide_show.signals().structural_changed.connect(|change| {
//!     println!("{:?}: {:?}", change.kind, change.position_ranges);
//! });
//!
//! // Commands enter at the top and are claimed by the owning layer.
//! let handled = hide_show
//!     .handle_command(&LayerCommand::HideByPositions { positions: vec![2] })
//!     .unwrap();
//! assert!(handled);
//! assert_eq!(hide_show.count(), 6);
//! assert_eq!(hide_show.index_at(2), Some(3));
//! ```
//!
//! # Concurrency
//!
//! The engine is single-threaded, synchronous, and cooperative: commands
//! complete their mutation-then-notify sequence before returning, and event
//! slots run on the same call stack as the triggering command. A slot must
//! not issue structural-mutating commands; reentrancy is undefined behavior.

pub mod command;
pub mod error;
pub mod event;
pub mod layer;
pub mod prelude;
pub mod range;

pub use command::LayerCommand;
pub use error::{LayerError, Result};
pub use event::{LayerId, LayerSignals, Orientation, StructuralChange, StructuralChangeKind};
pub use range::Range;

pub use horizon_gridstack_core::{ConnectionGuard, ConnectionId, Signal};

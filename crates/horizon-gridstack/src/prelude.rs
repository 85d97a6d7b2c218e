//! Prelude module for Horizon GridStack.
//!
//! This module re-exports the most commonly used types for convenient
//! importing:
//!
//! ```
//! use horizon_gridstack::prelude::*;
//! ```

// ============================================================================
// Signal/Slot System
// ============================================================================

pub use horizon_gridstack_core::{ConnectionGuard, ConnectionId, Signal};

// ============================================================================
// Core Value Types
// ============================================================================

pub use crate::error::{LayerError, Result};
pub use crate::range::Range;

// ============================================================================
// Commands and Events
// ============================================================================

pub use crate::command::LayerCommand;
pub use crate::event::{
    LayerId, LayerSignals, Orientation, StructuralChange, StructuralChangeKind,
};

// ============================================================================
// Layers
// ============================================================================

pub use crate::layer::{
    DataLayer, HideShowLayer, IndexAddressable, Layer, ReorderLayer, StaticTreeSource, TreeLayer,
    TreeSource, ViewportLayer,
};

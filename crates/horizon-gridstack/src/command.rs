//! Typed commands for the layer stack.
//!
//! A command enters the stack at the top layer. Each layer either claims it
//! (executes against its own state and returns `Ok(true)`) or forwards it to
//! its underlying layer. A command no layer claims surfaces as `Ok(false)` —
//! "not handled" is reported to the issuer, never silently dropped.
//!
//! [`LayerCommand::ShowAll`] is a broadcast: a hide/show layer executes it
//! *and* keeps forwarding, so that every hide/show layer in a composite stack
//! (for example a header and a body sharing one axis) is cleared by a single
//! command.
//!
//! Arguments are `usize`, so negative values are unrepresentable. Positions
//! are validated against the owning layer's current count when the command is
//! claimed, before any state is mutated; an out-of-range argument aborts the
//! whole command with [`LayerError::PositionOutOfRange`].
//!
//! [`LayerError::PositionOutOfRange`]: crate::error::LayerError::PositionOutOfRange

/// A structural command routed through the layer stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerCommand {
    /// Hide the items currently at the given positions.
    ///
    /// Positions are resolved to indexes by the claiming hide/show layer
    /// before any mutation, because positions are meaningless once the
    /// visible set changes.
    HideByPositions { positions: Vec<usize> },

    /// Hide the given indexes, bypassing position resolution.
    ///
    /// Used by callers that already operate in index space, such as the tree
    /// layer.
    HideByIndices { indexes: Vec<usize> },

    /// Show the given indexes. Indexes that are not currently hidden are
    /// no-ops for event purposes.
    ShowIndices { indexes: Vec<usize> },

    /// Show everything. Broadcast: every hide/show layer in the stack clears
    /// its hidden set.
    ShowAll,

    /// Collapse a tree node, hiding all of its strict descendants.
    Collapse { parent: usize },

    /// Expand a previously collapsed tree node.
    Expand { parent: usize },

    /// Collapse every collapsible root node.
    CollapseAll,

    /// Expand every collapsed node.
    ExpandAll,

    /// Move the item at one position to another within a reorder layer.
    MovePosition { from: usize, to: usize },
}

impl LayerCommand {
    /// A short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::HideByPositions { .. } => "HideByPositions",
            Self::HideByIndices { .. } => "HideByIndices",
            Self::ShowIndices { .. } => "ShowIndices",
            Self::ShowAll => "ShowAll",
            Self::Collapse { .. } => "Collapse",
            Self::Expand { .. } => "Expand",
            Self::CollapseAll => "CollapseAll",
            Self::ExpandAll => "ExpandAll",
            Self::MovePosition { .. } => "MovePosition",
        }
    }
}

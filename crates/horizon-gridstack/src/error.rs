//! Error types for the layer engine.
//!
//! The engine distinguishes three outcome classes:
//!
//! - **Invalid argument** — an out-of-range position or unknown index passed
//!   to a command or mutating operation. Represented by [`LayerError`];
//!   the operation aborts before any state is mutated.
//! - **Not found** — a well-formed query for a value that does not currently
//!   resolve (a hidden index, a position past the visible range). This is an
//!   expected, common outcome and is represented as `Option::None` from the
//!   query methods, never as an error.
//! - **Unhandled command** — reported as `Ok(false)` from
//!   [`Layer::handle_command`](crate::layer::Layer::handle_command) so the
//!   issuer can decide whether to treat it as an error.

/// Result type alias for layer operations.
pub type Result<T> = std::result::Result<T, LayerError>;

/// Errors raised by layer commands and mutating operations.
///
/// Every variant is fatal only to the single operation that raised it; no
/// layer state is mutated when an error is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayerError {
    /// A position argument does not fall within the layer's current count.
    #[error("position {position} is out of range for a layer with {count} positions")]
    PositionOutOfRange { position: usize, count: usize },

    /// An index argument is not addressable in the underlying layer.
    #[error("index {index} is not addressable in the underlying layer")]
    UnknownIndex { index: usize },
}

impl LayerError {
    /// Create a position-out-of-range error.
    pub fn position_out_of_range(position: usize, count: usize) -> Self {
        Self::PositionOutOfRange { position, count }
    }

    /// Create an unknown-index error.
    pub fn unknown_index(index: usize) -> Self {
        Self::UnknownIndex { index }
    }
}

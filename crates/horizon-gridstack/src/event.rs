//! Structural change events and per-layer signals.
//!
//! Every layer owns a [`LayerSignals`] instance. When a layer mutates its own
//! state it fires a [`StructuralChange`] describing the net effect of the
//! operation; layers stacked above it receive the event through their
//! subscription, invalidate their own caches, translate the event's position
//! ranges into their own coordinate space, and re-emit it on their own
//! signals. Propagation is strictly bottom-up, synchronous, and depth-first.
//!
//! Events describe only completed mutations: an operation with no net effect
//! fires nothing, and a rejected operation surfaces an error to its caller
//! without emitting.
//!
//! # Reentrancy
//!
//! Slots execute on the same call stack as the triggering command. A slot
//! must not issue a structural-mutating command while handling an event;
//! reentrancy is undefined behavior and is not guarded against at runtime.

use std::sync::atomic::{AtomicU64, Ordering};

use horizon_gridstack_core::Signal;

use crate::range::Range;

/// Counter for generating unique layer IDs.
static LAYER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies the layer that originated a structural change.
///
/// IDs are allocated once per layer instance at construction and are unique
/// within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(u64);

impl LayerId {
    /// Allocates the next unique layer ID.
    pub(crate) fn next() -> Self {
        Self(LAYER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// The axis a layer stack transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// The stack transforms row positions.
    Rows,
    /// The stack transforms column positions.
    Columns,
}

/// What kind of structural mutation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructuralChangeKind {
    /// Indexes were removed from the visible sequence by a hide/show layer.
    Hidden,
    /// Previously hidden indexes became visible again.
    Shown,
    /// Positions were added at the base layer.
    Inserted,
    /// Positions were removed at the base layer.
    Removed,
    /// Positions changed order or the visible window moved.
    Moved,
    /// Item sizes changed; the set of visible positions is unchanged but
    /// cumulative offsets are stale.
    Resized,
}

/// Notification that the set, order, or geometry of visible positions changed.
///
/// The position ranges are expressed in the coordinate space of the layer
/// that emitted the event most recently: each layer an event passes through
/// translates the ranges into its own space before re-emitting. The index
/// list is in stable index space and is never rewritten during propagation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralChange {
    /// The axis this change applies to.
    pub orientation: Orientation,
    /// The kind of mutation that completed.
    pub kind: StructuralChangeKind,
    /// Affected local position ranges, ascending and merged.
    pub position_ranges: Vec<Range>,
    /// Affected indexes, ascending by their position at the time of firing.
    pub indexes: Vec<usize>,
    /// The layer whose state mutated.
    pub origin: LayerId,
}

impl StructuralChange {
    /// Creates an event describing a completed mutation.
    pub fn new(
        orientation: Orientation,
        kind: StructuralChangeKind,
        position_ranges: Vec<Range>,
        indexes: Vec<usize>,
        origin: LayerId,
    ) -> Self {
        Self {
            orientation,
            kind,
            position_ranges,
            indexes,
            origin,
        }
    }

    /// Returns a copy of this event with its position ranges replaced by
    /// their translation into a wrapping layer's coordinate space.
    ///
    /// Kind, orientation, indexes, and origin are preserved; only the
    /// position ranges are coordinate-space-relative.
    pub fn with_translated_ranges(&self, position_ranges: Vec<Range>) -> Self {
        Self {
            position_ranges,
            ..self.clone()
        }
    }
}

/// Collection of signals emitted by a layer.
///
/// Consumers connect to these signals to stay synchronized with the layer
/// stack. Wrapping layers subscribe to their underlying layer's
/// `structural_changed` at construction to drive cache invalidation and
/// upward propagation.
pub struct LayerSignals {
    /// Emitted just before a structural mutation is applied.
    pub structural_about_to_change: Signal<()>,

    /// Emitted after a structural mutation has completed, carrying the net
    /// effect of the operation.
    pub structural_changed: Signal<StructuralChange>,
}

impl Default for LayerSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerSignals {
    /// Creates a new set of layer signals.
    pub fn new() -> Self {
        Self {
            structural_about_to_change: Signal::new(),
            structural_changed: Signal::new(),
        }
    }

    /// Emits the about-to/after signal pair around a structural mutation.
    ///
    /// Calls `mutate` between the two signals; the change it returns is what
    /// `structural_changed` carries. The caller is responsible for only using
    /// this when the mutation has a net effect.
    pub fn emit_structural_change<F>(&self, mutate: F)
    where
        F: FnOnce() -> StructuralChange,
    {
        self.structural_about_to_change.emit(());
        let change = mutate();
        tracing::trace!(
            target: "horizon_gridstack::event",
            kind = ?change.kind,
            ranges = ?change.position_ranges,
            "structural change"
        );
        self.structural_changed.emit(change);
    }

    /// Re-emits an event arriving from the underlying layer.
    ///
    /// Used by wrapping layers after they have invalidated their caches and
    /// translated the ranges; the about-to signal is not repeated because the
    /// mutation already completed below.
    pub fn forward(&self, change: StructuralChange) {
        self.structural_changed.emit(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_layer_ids_are_unique() {
        let a = LayerId::next();
        let b = LayerId::next();
        assert_ne!(a, b);
        assert!(b.value() > a.value());
    }

    #[test]
    fn test_emit_structural_change_order() {
        let signals = LayerSignals::new();
        let events = Arc::new(Mutex::new(Vec::new()));

        let recv = events.clone();
        signals.structural_about_to_change.connect(move |_| {
            recv.lock().push("about".to_string());
        });

        let recv = events.clone();
        signals.structural_changed.connect(move |change| {
            recv.lock().push(format!("changed {:?}", change.kind));
        });

        let origin = LayerId::next();
        signals.emit_structural_change(|| {
            StructuralChange::new(
                Orientation::Rows,
                StructuralChangeKind::Hidden,
                vec![Range::new(2, 3)],
                vec![2],
                origin,
            )
        });

        assert_eq!(*events.lock(), vec!["about", "changed Hidden"]);
    }

    #[test]
    fn test_with_translated_ranges_preserves_identity() {
        let origin = LayerId::next();
        let change = StructuralChange::new(
            Orientation::Columns,
            StructuralChangeKind::Shown,
            vec![Range::new(4, 6)],
            vec![4, 5],
            origin,
        );

        let translated = change.with_translated_ranges(vec![Range::new(1, 3)]);
        assert_eq!(translated.kind, StructuralChangeKind::Shown);
        assert_eq!(translated.orientation, Orientation::Columns);
        assert_eq!(translated.indexes, vec![4, 5]);
        assert_eq!(translated.origin, origin);
        assert_eq!(translated.position_ranges, vec![Range::new(1, 3)]);
    }
}

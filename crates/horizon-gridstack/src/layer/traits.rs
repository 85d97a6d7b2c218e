//! Core traits for the layer stack.
//!
//! This module defines the contract every stack node must satisfy. A layer
//! converts between its own position space and the position space of the
//! layer directly below it (the "underlying layer"), and exposes index
//! lookups through the [`IndexAddressable`] capability trait.
//!
//! Two coordinate spaces are maintained simultaneously:
//!
//! - **Index**: stable identity of a row/column, assigned by the base data
//!   layer and never renumbered by transformation layers.
//! - **Position**: the 0-based contiguous rank of a visible row/column in one
//!   layer's output space. The same index maps to different positions at
//!   different levels of the stack.
//!
//! Every upper layer composes strictly through the layer immediately below
//! it; there is no reach-through to layers two or more levels down. A
//! translation is therefore always a two-step lookup: local position → index
//! via this layer's mapping, then index → position via the adjacent layer.
//! Each step is O(1) amortized given a valid cache, so a depth-N stack costs
//! O(N) per query in the worst case.

use crate::command::LayerCommand;
use crate::error::Result;
use crate::event::{LayerId, LayerSignals, Orientation};
use crate::range::Range;

/// Index-aware lookups every layer provides.
///
/// This is the capability interface wrapping layers rely on to resolve the
/// stable identity behind a position. It is a supertrait of [`Layer`], so it
/// is available statically at construction time — no downcasting is involved
/// anywhere in the stack.
pub trait IndexAddressable {
    /// The index of the item at a visible position.
    ///
    /// Returns `None` for `position >= count()`; a failed lookup never
    /// mutates anything.
    fn index_at(&self, position: usize) -> Option<usize>;

    /// The visible position of an index.
    ///
    /// Returns `None` if the index is not currently visible at this layer
    /// (hidden, or unknown to the stack).
    fn position_of(&self, index: usize) -> Option<usize>;
}

/// A node in a layer stack.
///
/// A layer exposes a contiguous position space `0..count()` over the items it
/// presents, translates positions to and from its underlying layer, answers
/// geometry queries against its own space, and participates in command
/// dispatch and event propagation.
pub trait Layer: IndexAddressable + Send + Sync {
    /// The unique ID of this layer instance, carried by events it originates.
    fn id(&self) -> LayerId;

    /// The axis this stack transforms.
    fn orientation(&self) -> Orientation;

    /// Number of visible positions this layer exposes.
    fn count(&self) -> usize;

    /// The signals this layer emits.
    fn signals(&self) -> &LayerSignals;

    /// Converts a local position into the underlying layer's position space.
    ///
    /// Composition rule: resolve the local position to an index via this
    /// layer's mapping, then ask the underlying layer for the position of
    /// that same index. Returns `None` for an out-of-range local position.
    fn underlying_position_of(&self, position: usize) -> Option<usize>;

    /// Converts an underlying-layer position into this layer's space.
    ///
    /// Returns `None` when the underlying position has no local counterpart
    /// (hidden at this layer, or outside this layer's window). The hide/show
    /// layer documents an intentional exception for hidden indexes; see
    /// [`HideShowLayer`](crate::layer::HideShowLayer).
    fn local_position_of(&self, underlying_position: usize) -> Option<usize>;

    /// Bulk translation of underlying-layer position ranges into this
    /// layer's space.
    ///
    /// Sub-ranges with no local representative are dropped entirely; the
    /// output contains only well-formed ranges, ascending and merged. The
    /// default implementation runs the scan in [`translate_range`] against
    /// [`local_position_of`](Self::local_position_of), which is correct for
    /// any layer whose translation preserves relative order.
    fn underlying_to_local_ranges(&self, ranges: &[Range]) -> Vec<Range> {
        let local: Vec<Range> = ranges
            .iter()
            .filter_map(|range| translate_range(range, |u| self.local_position_of(u)))
            .collect();
        Range::merge_ranges(local)
    }

    /// The size (height for rows, width for columns) of the item at a
    /// visible position. Returns `None` out of range.
    fn size_of(&self, position: usize) -> Option<u32>;

    /// The cumulative size of all positions before `position`.
    ///
    /// Returns `None` for `position >= count()`; in particular every query
    /// against an empty layer fails with the sentinel rather than an
    /// arithmetic error.
    fn offset_of(&self, position: usize) -> Option<u64>;

    /// Offers a command to this layer.
    ///
    /// Returns `Ok(true)` if this layer (or a layer below it) claimed and
    /// executed the command, `Ok(false)` if no layer handled it, and an
    /// error if the claiming layer rejected the arguments before mutating.
    fn handle_command(&self, command: &LayerCommand) -> Result<bool>;
}

/// Translates one underlying range into local space via a position lookup.
///
/// Implements the per-range scan: if the start position has no local
/// counterpart, scan forward until one is found or the range is exhausted —
/// in which case the range is fully hidden and dropped (`None`). The end
/// position scans backward, bounded by the already-verified start. The
/// emitted range is end-exclusive.
///
/// The lookup must be strict: it must fail for positions with no local
/// counterpart, and it must preserve relative order over the positions where
/// it succeeds.
pub(crate) fn translate_range<F>(range: &Range, lookup: F) -> Option<Range>
where
    F: Fn(usize) -> Option<usize>,
{
    if range.is_empty() {
        return None;
    }

    let mut forward = range.start();
    let local_start = loop {
        if forward >= range.end() {
            // Every position in the range is hidden at this layer.
            return None;
        }
        match lookup(forward) {
            Some(local) => break local,
            None => forward += 1,
        }
    };

    let mut backward = range.end() - 1;
    let local_end = loop {
        match lookup(backward) {
            Some(local) => break local,
            // Terminates: the lookup at `forward` succeeded and
            // `backward >= forward` here.
            None => backward -= 1,
        }
    };

    Some(Range::new(local_start, local_end + 1))
}

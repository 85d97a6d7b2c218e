//! The base data-backed layer.
//!
//! `DataLayer` sits at the bottom of every stack. It assigns the stable
//! indexes the rest of the stack translates: at this layer, index and
//! position are identical and contiguous (`0..count`). It also owns the item
//! sizes (a uniform default plus per-index overrides) and the cumulative
//! offset cache over them.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::command::LayerCommand;
use crate::error::{LayerError, Result};
use crate::event::{LayerId, LayerSignals, Orientation, StructuralChange, StructuralChangeKind};
use crate::layer::traits::{IndexAddressable, Layer};
use crate::range::Range;

/// Item size used when no explicit default is configured.
pub const DEFAULT_ITEM_SIZE: u32 = 20;

struct DataState {
    count: usize,
    default_size: u32,
    size_overrides: HashMap<usize, u32>,
}

/// The lowest, data-backed layer of a stack.
///
/// # Example
///
/// ```
/// use horizon_gridstack::layer::{DataLayer, Layer, IndexAddressable};
/// use horizon_gridstack::Orientation;
///
/// let data = DataLayer::new(Orientation::Rows, 5);
/// assert_eq!(data.count(), 5);
/// assert_eq!(data.index_at(3), Some(3));
/// assert_eq!(data.index_at(5), None);
/// ```
pub struct DataLayer {
    id: LayerId,
    orientation: Orientation,
    state: RwLock<DataState>,
    /// Cumulative size before each position; rebuilt wholesale after any
    /// mutation because a single size change shifts every subsequent value.
    offsets: RwLock<Option<Vec<u64>>>,
    signals: LayerSignals,
}

impl DataLayer {
    /// Creates a data layer exposing `count` items of [`DEFAULT_ITEM_SIZE`].
    pub fn new(orientation: Orientation, count: usize) -> Self {
        Self::with_default_size(orientation, count, DEFAULT_ITEM_SIZE)
    }

    /// Creates a data layer with an explicit uniform item size.
    pub fn with_default_size(orientation: Orientation, count: usize, default_size: u32) -> Self {
        Self {
            id: LayerId::next(),
            orientation,
            state: RwLock::new(DataState {
                count,
                default_size,
                size_overrides: HashMap::new(),
            }),
            offsets: RwLock::new(None),
            signals: LayerSignals::new(),
        }
    }

    /// Changes the number of items, firing `Inserted`/`Removed` for the
    /// affected tail range. Equal counts are a no-op.
    pub fn set_count(&self, count: usize) {
        let old = self.state.read().count;
        if count == old {
            return;
        }

        let (kind, range) = if count > old {
            (StructuralChangeKind::Inserted, Range::new(old, count))
        } else {
            (StructuralChangeKind::Removed, Range::new(count, old))
        };

        self.signals.emit_structural_change(|| {
            {
                let mut state = self.state.write();
                state.count = count;
                state.size_overrides.retain(|&index, _| index < count);
            }
            *self.offsets.write() = None;

            tracing::debug!(
                target: "horizon_gridstack::layer",
                old, new = count, "data layer count changed"
            );

            StructuralChange::new(
                self.orientation,
                kind,
                vec![range],
                range.iter().collect(),
                self.id,
            )
        });
    }

    /// Overrides the size of one item, firing `Resized` for its position.
    pub fn set_size(&self, index: usize, size: u32) -> Result<()> {
        let count = self.state.read().count;
        if index >= count {
            return Err(LayerError::unknown_index(index));
        }

        self.signals.emit_structural_change(|| {
            self.state.write().size_overrides.insert(index, size);
            *self.offsets.write() = None;

            StructuralChange::new(
                self.orientation,
                StructuralChangeKind::Resized,
                vec![Range::single(index)],
                vec![index],
                self.id,
            )
        });
        Ok(())
    }

    /// Drops all size overrides, firing one `Resized` over the full range.
    /// A no-op when nothing was overridden.
    pub fn reset_sizes(&self) {
        if self.state.read().size_overrides.is_empty() {
            return;
        }

        self.signals.emit_structural_change(|| {
            let count = {
                let mut state = self.state.write();
                state.size_overrides.clear();
                state.count
            };
            *self.offsets.write() = None;

            StructuralChange::new(
                self.orientation,
                StructuralChangeKind::Resized,
                vec![Range::new(0, count)],
                Vec::new(),
                self.id,
            )
        });
    }

    fn with_offsets<R>(&self, f: impl FnOnce(&[u64]) -> R) -> R {
        {
            let cached = self.offsets.read();
            if let Some(offsets) = cached.as_ref() {
                return f(offsets);
            }
        }

        let built = {
            let state = self.state.read();
            let mut offsets = Vec::with_capacity(state.count);
            let mut total = 0u64;
            for index in 0..state.count {
                offsets.push(total);
                let size = state
                    .size_overrides
                    .get(&index)
                    .copied()
                    .unwrap_or(state.default_size);
                total += u64::from(size);
            }
            offsets
        };

        let mut cached = self.offsets.write();
        let offsets = cached.get_or_insert(built);
        f(offsets)
    }
}

impl IndexAddressable for DataLayer {
    fn index_at(&self, position: usize) -> Option<usize> {
        (position < self.state.read().count).then_some(position)
    }

    fn position_of(&self, index: usize) -> Option<usize> {
        (index < self.state.read().count).then_some(index)
    }
}

impl Layer for DataLayer {
    fn id(&self) -> LayerId {
        self.id
    }

    fn orientation(&self) -> Orientation {
        self.orientation
    }

    fn count(&self) -> usize {
        self.state.read().count
    }

    fn signals(&self) -> &LayerSignals {
        &self.signals
    }

    // The base layer is its own underlying layer: both directions are the
    // identity over the valid position range.
    fn underlying_position_of(&self, position: usize) -> Option<usize> {
        (position < self.state.read().count).then_some(position)
    }

    fn local_position_of(&self, underlying_position: usize) -> Option<usize> {
        (underlying_position < self.state.read().count).then_some(underlying_position)
    }

    fn size_of(&self, position: usize) -> Option<u32> {
        let state = self.state.read();
        (position < state.count).then(|| {
            state
                .size_overrides
                .get(&position)
                .copied()
                .unwrap_or(state.default_size)
        })
    }

    fn offset_of(&self, position: usize) -> Option<u64> {
        if position >= self.state.read().count {
            return None;
        }
        self.with_offsets(|offsets| offsets.get(position).copied())
    }

    fn handle_command(&self, command: &LayerCommand) -> Result<bool> {
        tracing::trace!(
            target: "horizon_gridstack::command",
            command = command.name(),
            "command reached the base layer unhandled"
        );
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn capture_events(layer: &DataLayer) -> Arc<Mutex<Vec<StructuralChange>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let recv = events.clone();
        layer.signals.structural_changed.connect(move |change| {
            recv.lock().push(change.clone());
        });
        events
    }

    #[test]
    fn test_identity_mapping() {
        let layer = DataLayer::new(Orientation::Rows, 4);
        assert_eq!(layer.count(), 4);
        for position in 0..4 {
            assert_eq!(layer.index_at(position), Some(position));
            assert_eq!(layer.position_of(position), Some(position));
        }
        assert_eq!(layer.index_at(4), None);
        assert_eq!(layer.position_of(4), None);
    }

    #[test]
    fn test_set_count_grow_fires_inserted() {
        let layer = DataLayer::new(Orientation::Rows, 3);
        let events = capture_events(&layer);

        layer.set_count(5);

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, StructuralChangeKind::Inserted);
        assert_eq!(events[0].position_ranges, vec![Range::new(3, 5)]);
        assert_eq!(events[0].indexes, vec![3, 4]);
    }

    #[test]
    fn test_set_count_shrink_fires_removed() {
        let layer = DataLayer::new(Orientation::Columns, 5);
        let events = capture_events(&layer);

        layer.set_count(2);

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, StructuralChangeKind::Removed);
        assert_eq!(events[0].orientation, Orientation::Columns);
        assert_eq!(events[0].position_ranges, vec![Range::new(2, 5)]);
    }

    #[test]
    fn test_set_count_unchanged_is_silent() {
        let layer = DataLayer::new(Orientation::Rows, 3);
        let events = capture_events(&layer);
        layer.set_count(3);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_sizes_and_offsets() {
        let layer = DataLayer::with_default_size(Orientation::Rows, 4, 10);
        assert_eq!(layer.size_of(0), Some(10));
        assert_eq!(layer.offset_of(3), Some(30));

        layer.set_size(1, 25).unwrap();
        assert_eq!(layer.size_of(1), Some(25));
        // Offsets after the resized item shift in full.
        assert_eq!(layer.offset_of(1), Some(10));
        assert_eq!(layer.offset_of(2), Some(35));
        assert_eq!(layer.offset_of(3), Some(45));

        assert_eq!(layer.set_size(9, 5), Err(LayerError::unknown_index(9)));
    }

    #[test]
    fn test_geometry_sentinel_on_empty_layer() {
        let layer = DataLayer::new(Orientation::Rows, 0);
        assert_eq!(layer.count(), 0);
        assert_eq!(layer.size_of(0), None);
        assert_eq!(layer.offset_of(0), None);
    }

    #[test]
    fn test_reset_sizes() {
        let layer = DataLayer::with_default_size(Orientation::Rows, 3, 10);
        let events = capture_events(&layer);

        // Nothing overridden yet: silent.
        layer.reset_sizes();
        assert!(events.lock().is_empty());

        layer.set_size(2, 40).unwrap();
        layer.reset_sizes();
        assert_eq!(layer.size_of(2), Some(10));

        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, StructuralChangeKind::Resized);
        assert_eq!(events[1].position_ranges, vec![Range::new(0, 3)]);
    }

    #[test]
    fn test_shrink_drops_stale_size_overrides() {
        let layer = DataLayer::with_default_size(Orientation::Rows, 5, 10);
        layer.set_size(4, 99).unwrap();
        layer.set_count(3);
        layer.set_count(5);
        // The override for index 4 did not survive the shrink.
        assert_eq!(layer.size_of(4), Some(10));
    }

    #[test]
    fn test_commands_are_not_handled() {
        let layer = DataLayer::new(Orientation::Rows, 3);
        assert_eq!(layer.handle_command(&LayerCommand::ShowAll), Ok(false));
    }
}

//! The reorder layer.
//!
//! `ReorderLayer` permutes the positions of its underlying layer without
//! touching identity: the same indexes are visible, in a caller-chosen
//! order. The permutation maps local position → underlying position; the
//! inverse direction is a lazily rebuilt cache.
//!
//! When the underlying count changes (insert, remove, hide, show below this
//! layer), the permutation is reset to the identity over the new count.
//! Patching a permutation across renumbering is not attempted.

use std::sync::{Arc, Weak};

use horizon_gridstack_core::signal::ConnectionId;
use parking_lot::RwLock;

use crate::command::LayerCommand;
use crate::error::{LayerError, Result};
use crate::event::{LayerId, LayerSignals, Orientation, StructuralChange, StructuralChangeKind};
use crate::layer::traits::{IndexAddressable, Layer};
use crate::range::Range;

/// A transformation layer presenting the underlying positions in a
/// caller-chosen order.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use horizon_gridstack::layer::{DataLayer, ReorderLayer, Layer, IndexAddressable};
/// use horizon_gridstack::Orientation;
///
/// let data = Arc::new(DataLayer::new(Orientation::Columns, 4));
/// let reorder = ReorderLayer::new(data);
///
/// reorder.move_position(0, 2).unwrap();
/// let order: Vec<usize> = (0..4).filter_map(|p| reorder.index_at(p)).collect();
/// assert_eq!(order, vec![1, 2, 0, 3]);
/// ```
pub struct ReorderLayer<L: Layer> {
    id: LayerId,
    source: Arc<L>,
    /// Local position → underlying position. Always a permutation of
    /// `0..source.count()`.
    order: RwLock<Vec<usize>>,
    /// Underlying position → local position; `None` means stale.
    inverse: RwLock<Option<Vec<usize>>>,
    offsets: RwLock<Option<Vec<u64>>>,
    signals: LayerSignals,
    source_connection: ConnectionId,
}

impl<L: Layer + 'static> ReorderLayer<L> {
    /// Creates a reorder layer over `source` with the identity order.
    pub fn new(source: Arc<L>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let subscriber = weak.clone();
            let source_connection =
                source
                    .signals()
                    .structural_changed
                    .connect(move |change: &StructuralChange| {
                        if let Some(layer) = subscriber.upgrade() {
                            layer.on_underlying_change(change);
                        }
                    });

            let identity: Vec<usize> = (0..source.count()).collect();
            Self {
                id: LayerId::next(),
                source,
                order: RwLock::new(identity),
                inverse: RwLock::new(None),
                offsets: RwLock::new(None),
                signals: LayerSignals::new(),
                source_connection,
            }
        })
    }

    /// Returns a reference to the underlying layer.
    pub fn source(&self) -> &Arc<L> {
        &self.source
    }

    /// Moves the item at `from` so that it occupies `to`.
    ///
    /// Both positions are validated against the current count before any
    /// mutation. Fires one `Moved` event covering the positions between the
    /// two endpoints, whose index list is the single moved index.
    pub fn move_position(&self, from: usize, to: usize) -> Result<()> {
        let count = self.count();
        for position in [from, to] {
            if position >= count {
                return Err(LayerError::position_out_of_range(position, count));
            }
        }
        if from == to {
            return Ok(());
        }

        let moved_index = self.index_at(from).ok_or(LayerError::position_out_of_range(from, count))?;
        let span = Range::new(from.min(to), from.max(to) + 1);

        self.signals.emit_structural_change(|| {
            {
                let mut order = self.order.write();
                let underlying = order.remove(from);
                order.insert(to, underlying);
            }
            self.invalidate_caches();
            tracing::debug!(
                target: "horizon_gridstack::layer",
                from, to, "position moved"
            );
            StructuralChange::new(
                self.orientation(),
                StructuralChangeKind::Moved,
                vec![span],
                vec![moved_index],
                self.id,
            )
        });
        Ok(())
    }

    fn invalidate_caches(&self) {
        *self.inverse.write() = None;
        *self.offsets.write() = None;
    }

    fn on_underlying_change(&self, change: &StructuralChange) {
        {
            let mut order = self.order.write();
            let count = self.source.count();
            if order.len() != count {
                // Renumbering below: fall back to the identity order.
                *order = (0..count).collect();
            }
        }
        self.invalidate_caches();

        let ranges = self.underlying_to_local_ranges(&change.position_ranges);
        self.signals.forward(change.with_translated_ranges(ranges));
    }

    fn with_inverse<R>(&self, f: impl FnOnce(&[usize]) -> R) -> R {
        {
            let cached = self.inverse.read();
            if let Some(inverse) = cached.as_ref() {
                return f(inverse);
            }
        }

        let built = {
            let order = self.order.read();
            let mut inverse = vec![0usize; order.len()];
            for (local, &underlying) in order.iter().enumerate() {
                inverse[underlying] = local;
            }
            inverse
        };

        let mut cached = self.inverse.write();
        let inverse = cached.get_or_insert(built);
        f(inverse)
    }

    fn with_offsets<R>(&self, f: impl FnOnce(&[u64]) -> R) -> R {
        {
            let cached = self.offsets.read();
            if let Some(offsets) = cached.as_ref() {
                return f(offsets);
            }
        }

        let built = {
            let count = self.count();
            let mut offsets = Vec::with_capacity(count);
            let mut total = 0u64;
            for position in 0..count {
                offsets.push(total);
                total += u64::from(self.size_of(position).unwrap_or(0));
            }
            offsets
        };

        let mut cached = self.offsets.write();
        let offsets = cached.get_or_insert(built);
        f(offsets)
    }
}

impl<L: Layer> Drop for ReorderLayer<L> {
    fn drop(&mut self) {
        self.source
            .signals()
            .structural_changed
            .disconnect(self.source_connection);
    }
}

impl<L: Layer + 'static> IndexAddressable for ReorderLayer<L> {
    fn index_at(&self, position: usize) -> Option<usize> {
        let underlying = self.order.read().get(position).copied()?;
        self.source.index_at(underlying)
    }

    fn position_of(&self, index: usize) -> Option<usize> {
        let underlying = self.source.position_of(index)?;
        self.with_inverse(|inverse| inverse.get(underlying).copied())
    }
}

impl<L: Layer + 'static> Layer for ReorderLayer<L> {
    fn id(&self) -> LayerId {
        self.id
    }

    fn orientation(&self) -> Orientation {
        self.source.orientation()
    }

    fn count(&self) -> usize {
        self.order.read().len()
    }

    fn signals(&self) -> &LayerSignals {
        &self.signals
    }

    fn underlying_position_of(&self, position: usize) -> Option<usize> {
        self.order.read().get(position).copied()
    }

    fn local_position_of(&self, underlying_position: usize) -> Option<usize> {
        if underlying_position >= self.count() {
            return None;
        }
        self.with_inverse(|inverse| inverse.get(underlying_position).copied())
    }

    /// A permutation does not preserve relative order, so the scan-based
    /// default is replaced with a per-position mapping whose results are
    /// re-sorted and merged.
    fn underlying_to_local_ranges(&self, ranges: &[Range]) -> Vec<Range> {
        let mut locals: Vec<usize> = ranges
            .iter()
            .flat_map(|range| range.iter())
            .filter_map(|u| self.local_position_of(u))
            .collect();
        locals.sort_unstable();
        locals.dedup();
        Range::from_sorted_values(&locals)
    }

    fn size_of(&self, position: usize) -> Option<u32> {
        let underlying = self.underlying_position_of(position)?;
        self.source.size_of(underlying)
    }

    fn offset_of(&self, position: usize) -> Option<u64> {
        if position >= self.count() {
            return None;
        }
        self.with_offsets(|offsets| offsets.get(position).copied())
    }

    fn handle_command(&self, command: &LayerCommand) -> Result<bool> {
        match command {
            LayerCommand::MovePosition { from, to } => {
                self.move_position(*from, *to)?;
                Ok(true)
            }
            _ => self.source.handle_command(command),
        }
    }
}

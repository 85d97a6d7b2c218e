//! The visibility (hide/show) layer.
//!
//! `HideShowLayer` presents a position space that excludes a caller-chosen
//! set of indexes, while leaving the underlying layer and every index it
//! knows about unchanged. The position↔index mapping is a lazily rebuilt
//! cache: it is discarded wholesale (never patched) whenever the underlying
//! layer reports a structural change or the hidden set itself changes,
//! because a single hide or show shifts every subsequent position by one.
//!
//! # Net-effect events
//!
//! Every mutating operation fires at most one structural event, and that
//! event reports only the *net* effect: indexes that were already hidden are
//! not re-announced by a hide, indexes that were not hidden are not announced
//! by a show, and an operation with no net effect fires nothing at all.
//!
//! # The `local_position_of` dual behavior
//!
//! For this layer, [`Layer::local_position_of`] deliberately answers for
//! *hidden* indexes as well: the result comes from a reverse map recording
//! the position the item would occupy among visible and hidden siblings
//! (i.e. its underlying position at the time the mapping was built). This
//! lets layers above ask "where would this hidden row have been drawn" for
//! overlay and selection bookkeeping. It is a distinct answer from
//! [`IndexAddressable::position_of`], which fails with `None` for a hidden
//! index, and from the range translation, which only ever consults the
//! strict visible mapping. This asymmetry is intentional; do not "fix" it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use horizon_gridstack_core::signal::ConnectionId;
use parking_lot::RwLock;

use crate::command::LayerCommand;
use crate::error::{LayerError, Result};
use crate::event::{LayerId, LayerSignals, Orientation, StructuralChange, StructuralChangeKind};
use crate::layer::traits::{IndexAddressable, Layer, translate_range};
use crate::range::Range;

/// Derived position↔index mapping over the currently visible index set.
///
/// A bijection over the visible indexes, plus the reverse map for hidden
/// ones. Rebuilt from scratch in a single pass over the underlying layer.
struct VisibilityMapping {
    /// Local position → index.
    position_to_index: Vec<usize>,
    /// Index → local position (visible indexes only).
    index_to_position: HashMap<usize, usize>,
    /// Hidden index → the position it would occupy among visible + hidden
    /// siblings.
    hidden_would_be: HashMap<usize, usize>,
}

/// A transformation layer that removes a set of indexes from the visible
/// position sequence.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use horizon_gridstack::layer::{DataLayer, HideShowLayer, Layer, IndexAddressable};
/// use horizon_gridstack::Orientation;
///
/// let data = Arc::new(DataLayer::new(Orientation::Rows, 7));
/// let layer = HideShowLayer::new(data);
///
/// layer.hide_by_positions(&[2]).unwrap();
/// assert_eq!(layer.count(), 6);
/// assert_eq!(layer.index_at(2), Some(3));
///
/// layer.show_all();
/// assert_eq!(layer.count(), 7);
/// assert_eq!(layer.index_at(2), Some(2));
/// ```
pub struct HideShowLayer<L: Layer> {
    id: LayerId,
    source: Arc<L>,
    /// The indexes this layer removes from view. Identity-based; insertion
    /// order is irrelevant and uniqueness is enforced by the set.
    hidden: RwLock<HashSet<usize>>,
    /// Lazily rebuilt mapping; `None` means stale.
    mapping: RwLock<Option<VisibilityMapping>>,
    /// Cumulative size before each local position; invalidated with the
    /// mapping and never partially.
    offsets: RwLock<Option<Vec<u64>>>,
    signals: LayerSignals,
    source_connection: ConnectionId,
}

impl<L: Layer + 'static> HideShowLayer<L> {
    /// Creates a hide/show layer over `source` with nothing hidden.
    ///
    /// The new layer subscribes to the source's structural signal: on every
    /// change from below it invalidates its caches, translates the event's
    /// position ranges into its own space, and re-emits the event on its own
    /// signals.
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

            Self {
                id: LayerId::next(),
                source,
                hidden: RwLock::new(HashSet::new()),
                mapping: RwLock::new(None),
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

    /// Hides the items currently at the given positions.
    ///
    /// Positions are resolved to indexes *before* any mutation, because they
    /// are meaningless once the visible set changes. Every position is
    /// validated against the current count first; an out-of-range position
    /// rejects the whole operation with nothing mutated.
    ///
    /// Returns the newly hidden indexes, ascending by their former position.
    /// Fires one `Hidden` event carrying the former local position ranges,
    /// or nothing if the request was empty.
    pub fn hide_by_positions(&self, positions: &[usize]) -> Result<Vec<usize>> {
        let mut sorted = positions.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let count = self.count();
        if let Some(&last) = sorted.last()
            && last >= count
        {
            return Err(LayerError::position_out_of_range(last, count));
        }
        if sorted.is_empty() {
            return Ok(Vec::new());
        }

        // Positions only ever resolve to visible indexes, so the whole
        // resolved set is newly hidden.
        let indexes: Vec<usize> =
            self.with_mapping(|m| sorted.iter().map(|&p| m.position_to_index[p]).collect());
        let ranges = Range::from_sorted_values(&sorted);

        self.apply_hide(indexes.clone(), ranges, true);
        Ok(indexes)
    }

    /// Hides the given indexes, bypassing position resolution.
    ///
    /// The set difference against the already-hidden set is computed first:
    /// the fired event reports only the indexes that actually became hidden,
    /// not the full requested set, and no event fires when that difference
    /// is empty. Indexes unknown to the underlying layer reject the whole
    /// operation with nothing mutated.
    pub fn hide_by_indices(&self, indexes: &[usize]) -> Result<Vec<usize>> {
        self.hide_indexes_internal(indexes, true, false)
    }

    /// Shows the given indexes, removing them from the hidden set.
    ///
    /// An index that is not currently hidden is a no-op for that index. The
    /// fired `Shown` event carries only the indexes actually removed and
    /// their post-mutation position ranges; nothing fires when no index was
    /// hidden.
    pub fn show(&self, indexes: &[usize]) -> Vec<usize> {
        self.show_indexes_internal(indexes, true)
    }

    /// Clears the hidden set entirely.
    ///
    /// The fired event lists every index that had been hidden; an empty
    /// hidden set fires nothing. Calling this twice in a row fires exactly
    /// one event.
    pub fn show_all(&self) -> Vec<usize> {
        let all = self.hidden_indices();
        self.show_indexes_internal(&all, true)
    }

    /// Returns `true` if this layer currently hides `index`.
    pub fn is_hidden(&self, index: usize) -> bool {
        self.hidden.read().contains(&index)
    }

    /// The currently hidden indexes, sorted ascending.
    ///
    /// This is a copy; the backing set is never exposed.
    pub fn hidden_indices(&self) -> Vec<usize> {
        let mut indexes: Vec<usize> = self.hidden.read().iter().copied().collect();
        indexes.sort_unstable();
        indexes
    }

    /// Replaces the hidden set from persisted state.
    ///
    /// Replays as if via [`hide_by_indices`](Self::hide_by_indices), but as
    /// a batch: caches are rebuilt and at most one event fires. Persisted
    /// indexes that no longer resolve in the underlying layer are skipped.
    pub fn restore_hidden(&self, indexes: &[usize]) -> Vec<usize> {
        self.hidden.write().clear();
        self.invalidate_caches();
        // Lenient validation cannot fail.
        self.hide_indexes_internal(indexes, true, true)
            .unwrap_or_default()
    }

    pub(crate) fn hide_indexes_internal(
        &self,
        indexes: &[usize],
        fire: bool,
        lenient: bool,
    ) -> Result<Vec<usize>> {
        let mut requested = indexes.to_vec();
        requested.sort_unstable();
        requested.dedup();

        let mut newly: Vec<usize> = Vec::with_capacity(requested.len());
        {
            let hidden = self.hidden.read();
            for &index in &requested {
                if self.source.position_of(index).is_none() {
                    if lenient {
                        continue;
                    }
                    return Err(LayerError::unknown_index(index));
                }
                if hidden.contains(&index) {
                    // Already hidden: suppressed from the event.
                    continue;
                }
                newly.push(index);
            }
        }
        if newly.is_empty() {
            return Ok(Vec::new());
        }

        // Former local positions, resolved before the mutation.
        let mut pairs: Vec<(usize, usize)> = self.with_mapping(|m| {
            newly
                .iter()
                .map(|&index| (m.index_to_position[&index], index))
                .collect()
        });
        pairs.sort_unstable();

        let positions: Vec<usize> = pairs.iter().map(|&(position, _)| position).collect();
        let ordered: Vec<usize> = pairs.iter().map(|&(_, index)| index).collect();
        let ranges = Range::from_sorted_values(&positions);

        self.apply_hide(ordered.clone(), ranges, fire);
        Ok(ordered)
    }

    fn apply_hide(&self, indexes: Vec<usize>, ranges: Vec<Range>, fire: bool) {
        let orientation = self.orientation();
        let mutate = move || {
            self.hidden.write().extend(indexes.iter().copied());
            self.invalidate_caches();
            tracing::debug!(
                target: "horizon_gridstack::layer",
                hidden = indexes.len(),
                "hide applied"
            );
            StructuralChange::new(
                orientation,
                StructuralChangeKind::Hidden,
                ranges,
                indexes,
                self.id,
            )
        };
        if fire {
            self.signals.emit_structural_change(mutate);
        } else {
            let _ = mutate();
        }
    }

    pub(crate) fn show_indexes_internal(&self, indexes: &[usize], fire: bool) -> Vec<usize> {
        let mut requested = indexes.to_vec();
        requested.sort_unstable();
        requested.dedup();

        let newly: Vec<usize> = {
            let hidden = self.hidden.read();
            requested
                .iter()
                .copied()
                .filter(|index| hidden.contains(index))
                .collect()
        };
        if newly.is_empty() {
            return Vec::new();
        }

        let orientation = self.orientation();
        let mutate = || {
            {
                let mut hidden = self.hidden.write();
                for index in &newly {
                    hidden.remove(index);
                }
            }
            self.invalidate_caches();

            // Post-mutation positions. Indexes that stopped resolving below
            // (e.g. after a shrink) have no visible effect to report.
            let mut pairs: Vec<(usize, usize)> = self.with_mapping(|m| {
                newly
                    .iter()
                    .filter_map(|&index| {
                        m.index_to_position
                            .get(&index)
                            .map(|&position| (position, index))
                    })
                    .collect()
            });
            pairs.sort_unstable();

            let positions: Vec<usize> = pairs.iter().map(|&(position, _)| position).collect();
            let visible: Vec<usize> = pairs.iter().map(|&(_, index)| index).collect();
            tracing::debug!(
                target: "horizon_gridstack::layer",
                shown = visible.len(),
                "show applied"
            );
            StructuralChange::new(
                orientation,
                StructuralChangeKind::Shown,
                Range::from_sorted_values(&positions),
                visible,
                self.id,
            )
        };
        if fire {
            self.signals.emit_structural_change(mutate);
        } else {
            let _ = mutate();
        }
        newly
    }

    /// Discards the mapping and offset caches; they repopulate on the next
    /// query.
    fn invalidate_caches(&self) {
        *self.mapping.write() = None;
        *self.offsets.write() = None;
    }

    fn on_underlying_change(&self, change: &StructuralChange) {
        self.invalidate_caches();
        let ranges = self.visible_ranges_from_underlying(&change.position_ranges);
        tracing::trace!(
            target: "horizon_gridstack::event",
            kind = ?change.kind,
            "forwarding underlying change through hide/show layer"
        );
        self.signals.forward(change.with_translated_ranges(ranges));
    }

    /// Strict translation used for range conversion: hidden indexes fail,
    /// the would-be reverse map is never consulted here.
    fn visible_position_of_underlying(&self, underlying_position: usize) -> Option<usize> {
        let index = self.source.index_at(underlying_position)?;
        self.with_mapping(|m| m.index_to_position.get(&index).copied())
    }

    fn visible_ranges_from_underlying(&self, ranges: &[Range]) -> Vec<Range> {
        let local: Vec<Range> = ranges
            .iter()
            .filter_map(|range| {
                translate_range(range, |u| self.visible_position_of_underlying(u))
            })
            .collect();
        Range::merge_ranges(local)
    }

    fn with_mapping<R>(&self, f: impl FnOnce(&VisibilityMapping) -> R) -> R {
        {
            let cached = self.mapping.read();
            if let Some(mapping) = cached.as_ref() {
                return f(mapping);
            }
        }

        let built = self.rebuild_mapping();
        let mut cached = self.mapping.write();
        let mapping = cached.get_or_insert(built);
        f(mapping)
    }

    /// Single pass over the underlying layer's positions: visible indexes
    /// are assigned sequential local positions, hidden indexes record their
    /// would-be position in the reverse map.
    fn rebuild_mapping(&self) -> VisibilityMapping {
        let hidden = self.hidden.read();
        let count = self.source.count();
        let mut mapping = VisibilityMapping {
            position_to_index: Vec::with_capacity(count.saturating_sub(hidden.len())),
            index_to_position: HashMap::new(),
            hidden_would_be: HashMap::new(),
        };

        for underlying in 0..count {
            let Some(index) = self.source.index_at(underlying) else {
                continue;
            };
            if hidden.contains(&index) {
                mapping.hidden_would_be.insert(index, underlying);
            } else {
                let local = mapping.position_to_index.len();
                mapping.position_to_index.push(index);
                mapping.index_to_position.insert(index, local);
            }
        }

        tracing::trace!(
            target: "horizon_gridstack::layer",
            visible = mapping.position_to_index.len(),
            hidden = mapping.hidden_would_be.len(),
            "visibility mapping rebuilt"
        );
        mapping
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

impl<L: Layer> Drop for HideShowLayer<L> {
    fn drop(&mut self) {
        self.source
            .signals()
            .structural_changed
            .disconnect(self.source_connection);
    }
}

impl<L: Layer + 'static> IndexAddressable for HideShowLayer<L> {
    fn index_at(&self, position: usize) -> Option<usize> {
        self.with_mapping(|m| m.position_to_index.get(position).copied())
    }

    fn position_of(&self, index: usize) -> Option<usize> {
        self.with_mapping(|m| m.index_to_position.get(&index).copied())
    }
}

impl<L: Layer + 'static> Layer for HideShowLayer<L> {
    fn id(&self) -> LayerId {
        self.id
    }

    fn orientation(&self) -> Orientation {
        self.source.orientation()
    }

    fn count(&self) -> usize {
        self.with_mapping(|m| m.position_to_index.len())
    }

    fn signals(&self) -> &LayerSignals {
        &self.signals
    }

    fn underlying_position_of(&self, position: usize) -> Option<usize> {
        let index = self.index_at(position)?;
        self.source.position_of(index)
    }

    /// The documented dual behavior: a visible underlying position resolves
    /// to its local position, a position hidden *by this layer* resolves to
    /// the recorded would-be position instead of failing.
    fn local_position_of(&self, underlying_position: usize) -> Option<usize> {
        let index = self.source.index_at(underlying_position)?;
        self.with_mapping(|m| {
            m.index_to_position
                .get(&index)
                .or_else(|| m.hidden_would_be.get(&index))
                .copied()
        })
    }

    /// Overrides the default to scan the strict visible mapping, so a fully
    /// hidden input range is dropped rather than answered from the would-be
    /// reverse map.
    fn underlying_to_local_ranges(&self, ranges: &[Range]) -> Vec<Range> {
        self.visible_ranges_from_underlying(ranges)
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
            LayerCommand::HideByPositions { positions } => {
                self.hide_by_positions(positions)?;
                Ok(true)
            }
            LayerCommand::HideByIndices { indexes } => {
                self.hide_by_indices(indexes)?;
                Ok(true)
            }
            LayerCommand::ShowIndices { indexes } => {
                self.show(indexes);
                Ok(true)
            }
            LayerCommand::ShowAll => {
                self.show_all();
                // Broadcast: any hide/show layer further down clears too.
                self.source.handle_command(command)?;
                Ok(true)
            }
            _ => self.source.handle_command(command),
        }
    }
}

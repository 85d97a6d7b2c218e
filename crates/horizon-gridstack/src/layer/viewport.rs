//! The viewport layer.
//!
//! `ViewportLayer` exposes a sliding window over its underlying layer's
//! position space: an `origin` (the first visible underlying position) and
//! an `extent` (the maximum number of positions shown). Translation in both
//! directions is the origin offset; events passing through are clipped to
//! the window.
//!
//! The viewport keeps no caches of its own: geometry is answered from the
//! underlying layer's cumulative offsets relative to the origin.

use std::sync::{Arc, Weak};

use horizon_gridstack_core::signal::ConnectionId;
use parking_lot::RwLock;

use crate::command::LayerCommand;
use crate::error::Result;
use crate::event::{LayerId, LayerSignals, Orientation, StructuralChange, StructuralChangeKind};
use crate::layer::traits::{IndexAddressable, Layer};
use crate::range::Range;

/// A windowing layer showing at most `extent` consecutive underlying
/// positions starting at `origin`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use horizon_gridstack::layer::{DataLayer, ViewportLayer, Layer, IndexAddressable};
/// use horizon_gridstack::Orientation;
///
/// let data = Arc::new(DataLayer::new(Orientation::Rows, 100));
/// let viewport = ViewportLayer::new(data, 10);
///
/// viewport.set_origin(25);
/// assert_eq!(viewport.count(), 10);
/// assert_eq!(viewport.index_at(0), Some(25));
/// ```
pub struct ViewportLayer<L: Layer> {
    id: LayerId,
    source: Arc<L>,
    origin: RwLock<usize>,
    extent: RwLock<usize>,
    signals: LayerSignals,
    source_connection: ConnectionId,
}

impl<L: Layer + 'static> ViewportLayer<L> {
    /// Creates a viewport over `source` showing at most `extent` positions,
    /// starting at the top.
    pub fn new(source: Arc<L>, extent: usize) -> Arc<Self> {
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
                origin: RwLock::new(0),
                extent: RwLock::new(extent),
                signals: LayerSignals::new(),
                source_connection,
            }
        })
    }

    /// Returns a reference to the underlying layer.
    pub fn source(&self) -> &Arc<L> {
        &self.source
    }

    /// The first visible underlying position.
    pub fn origin(&self) -> usize {
        *self.origin.read()
    }

    /// Moves the window so it starts at `origin`, clamped to the underlying
    /// count. Fires one `Moved` event covering the new window; a no-op move
    /// fires nothing.
    pub fn set_origin(&self, origin: usize) {
        let clamped = origin.min(self.source.count());
        if clamped == *self.origin.read() {
            return;
        }

        self.signals.emit_structural_change(|| {
            *self.origin.write() = clamped;
            tracing::debug!(
                target: "horizon_gridstack::layer",
                origin = clamped, "viewport moved"
            );
            StructuralChange::new(
                self.orientation(),
                StructuralChangeKind::Moved,
                vec![Range::new(0, self.count())],
                Vec::new(),
                self.id,
            )
        });
    }

    /// Scrolls the window by a signed number of positions.
    pub fn scroll_by(&self, delta: isize) {
        let origin = *self.origin.read();
        let target = origin.saturating_add_signed(delta);
        self.set_origin(target);
    }

    /// Changes the maximum number of visible positions.
    pub fn set_extent(&self, extent: usize) {
        if extent == *self.extent.read() {
            return;
        }

        self.signals.emit_structural_change(|| {
            *self.extent.write() = extent;
            StructuralChange::new(
                self.orientation(),
                StructuralChangeKind::Moved,
                vec![Range::new(0, self.count())],
                Vec::new(),
                self.id,
            )
        });
    }

    fn on_underlying_change(&self, change: &StructuralChange) {
        {
            // Keep the window anchored inside the new underlying count.
            let mut origin = self.origin.write();
            *origin = (*origin).min(self.source.count());
        }

        let ranges = self.underlying_to_local_ranges(&change.position_ranges);
        self.signals.forward(change.with_translated_ranges(ranges));
    }
}

impl<L: Layer> Drop for ViewportLayer<L> {
    fn drop(&mut self) {
        self.source
            .signals()
            .structural_changed
            .disconnect(self.source_connection);
    }
}

impl<L: Layer + 'static> IndexAddressable for ViewportLayer<L> {
    fn index_at(&self, position: usize) -> Option<usize> {
        if position >= self.count() {
            return None;
        }
        self.source.index_at(self.origin() + position)
    }

    fn position_of(&self, index: usize) -> Option<usize> {
        let underlying = self.source.position_of(index)?;
        self.local_position_of(underlying)
    }
}

impl<L: Layer + 'static> Layer for ViewportLayer<L> {
    fn id(&self) -> LayerId {
        self.id
    }

    fn orientation(&self) -> Orientation {
        self.source.orientation()
    }

    fn count(&self) -> usize {
        let origin = self.origin();
        let available = self.source.count().saturating_sub(origin);
        available.min(*self.extent.read())
    }

    fn signals(&self) -> &LayerSignals {
        &self.signals
    }

    fn underlying_position_of(&self, position: usize) -> Option<usize> {
        (position < self.count()).then(|| self.origin() + position)
    }

    fn local_position_of(&self, underlying_position: usize) -> Option<usize> {
        let origin = self.origin();
        if underlying_position < origin {
            return None;
        }
        let local = underlying_position - origin;
        (local < self.count()).then_some(local)
    }

    fn size_of(&self, position: usize) -> Option<u32> {
        let underlying = self.underlying_position_of(position)?;
        self.source.size_of(underlying)
    }

    fn offset_of(&self, position: usize) -> Option<u64> {
        let underlying = self.underlying_position_of(position)?;
        let base = self.source.offset_of(self.origin())?;
        let absolute = self.source.offset_of(underlying)?;
        Some(absolute - base)
    }

    fn handle_command(&self, command: &LayerCommand) -> Result<bool> {
        self.source.handle_command(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{DataLayer, HideShowLayer};
    use parking_lot::Mutex;

    #[test]
    fn test_window_shows_extent_positions() {
        let data = Arc::new(DataLayer::new(Orientation::Rows, 100));
        let viewport = ViewportLayer::new(data, 10);

        assert_eq!(viewport.count(), 10);
        assert_eq!(viewport.index_at(0), Some(0));
        assert_eq!(viewport.index_at(9), Some(9));
        assert_eq!(viewport.index_at(10), None);
    }

    #[test]
    fn test_scrolling_offsets_translation() {
        let data = Arc::new(DataLayer::new(Orientation::Rows, 100));
        let viewport = ViewportLayer::new(data, 10);

        viewport.set_origin(25);
        assert_eq!(viewport.index_at(0), Some(25));
        assert_eq!(viewport.position_of(30), Some(5));
        assert_eq!(viewport.position_of(10), None);
        assert_eq!(viewport.underlying_position_of(3), Some(28));
        assert_eq!(viewport.local_position_of(24), None);

        viewport.scroll_by(-5);
        assert_eq!(viewport.index_at(0), Some(20));
    }

    #[test]
    fn test_window_clamps_at_the_end() {
        let data = Arc::new(DataLayer::new(Orientation::Rows, 12));
        let viewport = ViewportLayer::new(data.clone(), 10);

        viewport.set_origin(8);
        assert_eq!(viewport.count(), 4);

        viewport.set_origin(50);
        assert_eq!(viewport.origin(), 12);
        assert_eq!(viewport.count(), 0);
        assert_eq!(viewport.index_at(0), None);
        assert_eq!(viewport.offset_of(0), None);

        // Shrinking the source pulls the window back in.
        data.set_count(6);
        assert_eq!(viewport.origin(), 6);
    }

    #[test]
    fn test_offsets_are_relative_to_origin() {
        let data = Arc::new(DataLayer::with_default_size(Orientation::Rows, 20, 10));
        let viewport = ViewportLayer::new(data, 5);

        viewport.set_origin(4);
        assert_eq!(viewport.offset_of(0), Some(0));
        assert_eq!(viewport.offset_of(3), Some(30));
    }

    #[test]
    fn test_events_are_clipped_to_window() {
        let data = Arc::new(DataLayer::new(Orientation::Rows, 40));
        let hide_show = HideShowLayer::new(data);
        let viewport = ViewportLayer::new(hide_show.clone(), 10);
        viewport.set_origin(10);

        let events = Arc::new(Mutex::new(Vec::new()));
        let recv = events.clone();
        viewport.signals().structural_changed.connect(move |change| {
            recv.lock().push(change.clone());
        });

        // Position 12 below maps into the window at local 2.
        hide_show.hide_by_positions(&[12]).unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, StructuralChangeKind::Hidden);
        assert_eq!(events[0].indexes, vec![12]);
        assert_eq!(events[0].position_ranges, vec![Range::new(2, 3)]);
    }

    #[test]
    fn test_commands_pass_through() {
        let data = Arc::new(DataLayer::new(Orientation::Rows, 30));
        let hide_show = HideShowLayer::new(data);
        let viewport = ViewportLayer::new(hide_show.clone(), 10);

        assert_eq!(
            viewport.handle_command(&LayerCommand::HideByIndices { indexes: vec![0] }),
            Ok(true)
        );
        assert!(hide_show.is_hidden(0));
        assert_eq!(viewport.index_at(0), Some(1));
    }
}

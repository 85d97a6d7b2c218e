//! The tree composition layer.
//!
//! `TreeLayer` reinterprets a hierarchical parent/child relationship as
//! collapse/expand by delegating to an owned [`HideShowLayer`]: collapsing a
//! node hides every strict descendant of that node, expanding shows them
//! again. The hierarchy itself is supplied data — a [`TreeSource`]
//! collaborator — not something this layer computes.
//!
//! Per node the state machine is Expanded ⇄ Collapsed and nothing else; a
//! node without children is never collapsible, and collapse/expand requests
//! against it are no-ops, not errors.
//!
//! # Independent hides survive expand
//!
//! For each collapse the layer records the *net* set of indexes the owned
//! hide/show layer actually hid — the duplicate-suppressed return value of
//! [`HideShowLayer::hide_by_indices`]. Expand shows exactly that recorded
//! set, so a descendant hidden independently (before the collapse, for a
//! reason unrelated to the tree) is absent from the record and stays hidden
//! afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use horizon_gridstack_core::signal::ConnectionId;
use parking_lot::RwLock;

use crate::command::LayerCommand;
use crate::error::Result;
use crate::event::{LayerId, LayerSignals, Orientation, StructuralChange};
use crate::layer::hide_show::HideShowLayer;
use crate::layer::traits::{IndexAddressable, Layer};

/// Supplies the parent/child structure the tree layer interprets.
///
/// Indexes are the same stable indexes the layer stack translates; the
/// source only describes how they nest.
pub trait TreeSource: Send + Sync {
    /// The root indexes, in display order.
    fn roots(&self) -> Vec<usize>;

    /// The immediate children of `index`, in display order.
    fn children_of(&self, index: usize) -> Vec<usize>;

    /// The nesting depth of `index`; roots have depth 0.
    fn depth_of(&self, index: usize) -> usize;

    /// Returns `true` if `index` currently has children.
    fn has_children(&self, index: usize) -> bool {
        !self.children_of(index).is_empty()
    }
}

/// A fixed parent/child structure backed by hash maps.
///
/// Suitable for static trees and tests; build it with
/// [`add_root`](Self::add_root) and [`add_child`](Self::add_child).
#[derive(Default)]
pub struct StaticTreeSource {
    roots: Vec<usize>,
    children: HashMap<usize, Vec<usize>>,
    parents: HashMap<usize, usize>,
}

impl StaticTreeSource {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a root index.
    pub fn add_root(&mut self, index: usize) -> &mut Self {
        self.roots.push(index);
        self
    }

    /// Registers `index` as the next child of `parent`.
    pub fn add_child(&mut self, parent: usize, index: usize) -> &mut Self {
        self.children.entry(parent).or_default().push(index);
        self.parents.insert(index, parent);
        self
    }
}

impl TreeSource for StaticTreeSource {
    fn roots(&self) -> Vec<usize> {
        self.roots.clone()
    }

    fn children_of(&self, index: usize) -> Vec<usize> {
        self.children.get(&index).cloned().unwrap_or_default()
    }

    fn depth_of(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut current = index;
        while let Some(&parent) = self.parents.get(&current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    fn has_children(&self, index: usize) -> bool {
        self.children.get(&index).is_some_and(|c| !c.is_empty())
    }
}

/// A pass-through layer adding collapse/expand over an owned hide/show
/// layer.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use horizon_gridstack::layer::{
///     DataLayer, HideShowLayer, Layer, StaticTreeSource, TreeLayer,
/// };
/// use horizon_gridstack::Orientation;
///
/// // Index 0 is a parent with children 1 and 2.
/// let mut tree = StaticTreeSource::new();
/// tree.add_root(0).add_child(0, 1).add_child(0, 2);
///
/// let data = Arc::new(DataLayer::new(Orientation::Rows, 3));
/// let layer = TreeLayer::new(HideShowLayer::new(data), Arc::new(tree));
///
/// layer.collapse(0).unwrap();
/// assert_eq!(layer.count(), 1);
///
/// layer.expand(0);
/// assert_eq!(layer.count(), 3);
/// ```
pub struct TreeLayer<L: Layer + 'static> {
    id: LayerId,
    hide_show: Arc<HideShowLayer<L>>,
    tree: Arc<dyn TreeSource>,
    /// Collapsed parent → the indexes its collapse actually hid.
    collapsed: RwLock<HashMap<usize, Vec<usize>>>,
    signals: LayerSignals,
    source_connection: ConnectionId,
}

impl<L: Layer + 'static> TreeLayer<L> {
    /// Creates a tree layer over an owned hide/show layer.
    ///
    /// The tree layer's position space is identical to the hide/show
    /// layer's; events from below are re-emitted unmodified.
    pub fn new(hide_show: Arc<HideShowLayer<L>>, tree: Arc<dyn TreeSource>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let subscriber = weak.clone();
            let source_connection = hide_show.signals().structural_changed.connect(
                move |change: &StructuralChange| {
                    if let Some(layer) = subscriber.upgrade() {
                        layer.signals.forward(change.clone());
                    }
                },
            );

            Self {
                id: LayerId::next(),
                hide_show,
                tree,
                collapsed: RwLock::new(HashMap::new()),
                signals: LayerSignals::new(),
                source_connection,
            }
        })
    }

    /// Returns the owned hide/show layer.
    pub fn hide_show(&self) -> &Arc<HideShowLayer<L>> {
        &self.hide_show
    }

    /// The nesting depth of an index, from the tree source.
    pub fn depth_of(&self, index: usize) -> usize {
        self.tree.depth_of(index)
    }

    /// Returns `true` if `parent` is currently collapsed.
    pub fn is_collapsed(&self, parent: usize) -> bool {
        self.collapsed.read().contains_key(&parent)
    }

    /// The currently collapsed parents, sorted ascending.
    pub fn collapsed_parents(&self) -> Vec<usize> {
        let mut parents: Vec<usize> = self.collapsed.read().keys().copied().collect();
        parents.sort_unstable();
        parents
    }

    /// Collapses `parent`, hiding all of its strict descendants.
    ///
    /// A node with no children, or one that is already collapsed, is a
    /// no-op. Returns the indexes that actually became hidden; the callers
    /// observe the result as one `Hidden` event whose contiguous blocks of
    /// positions disappeared.
    pub fn collapse(&self, parent: usize) -> Result<Vec<usize>> {
        if self.is_collapsed(parent) || !self.tree.has_children(parent) {
            return Ok(Vec::new());
        }

        let descendants = self.descendants_of(parent);
        let newly = self.hide_show.hide_by_indices(&descendants)?;
        self.collapsed.write().insert(parent, newly.clone());

        tracing::debug!(
            target: "horizon_gridstack::layer",
            parent, hidden = newly.len(), "node collapsed"
        );
        Ok(newly)
    }

    /// Expands a previously collapsed `parent`.
    ///
    /// Shows exactly the set recorded at collapse time, so descendants
    /// hidden independently of the tree stay hidden. A parent that is not
    /// collapsed is a no-op.
    pub fn expand(&self, parent: usize) -> Vec<usize> {
        let recorded = self.collapsed.write().remove(&parent);
        match recorded {
            Some(indexes) => self.hide_show.show(&indexes),
            None => Vec::new(),
        }
    }

    /// Collapses every collapsible root, in ascending order, batched into a
    /// single `Hidden` event whose ranges are ascending and merged.
    pub fn collapse_all(&self) -> Result<Vec<usize>> {
        let mut roots = self.tree.roots();
        roots.sort_unstable();
        self.collapse_batch(&roots)
    }

    /// Expands every collapsed node, batched into a single `Shown` event.
    pub fn expand_all(&self) -> Vec<usize> {
        let mut recorded: Vec<usize> = {
            let mut collapsed = self.collapsed.write();
            collapsed.drain().flat_map(|(_, indexes)| indexes).collect()
        };
        recorded.sort_unstable();
        if recorded.is_empty() {
            return Vec::new();
        }
        self.hide_show.show(&recorded)
    }

    /// Replaces the collapsed state from persisted parents.
    ///
    /// Replays as a batch: prior tree hides are undone silently, the new
    /// collapses fire at most one event. Parents without children are
    /// skipped, like any other collapse of a leaf.
    ///
    /// When restoring a full snapshot, replay the collapsed parents first
    /// and the hide/show layer's hidden set second, so the per-parent
    /// records here line up with the restored hidden set.
    pub fn restore_collapsed(&self, parents: &[usize]) -> Result<Vec<usize>> {
        let prior: Vec<usize> = {
            let mut collapsed = self.collapsed.write();
            collapsed.drain().flat_map(|(_, indexes)| indexes).collect()
        };
        if !prior.is_empty() {
            self.hide_show.show_indexes_internal(&prior, false);
        }
        self.collapse_batch(parents)
    }

    /// Collapses a batch of parents with one hide call (one event).
    ///
    /// Nested parents are attributed deepest-first so an inner collapsed
    /// node keeps its own descendants claimed; expanding an outer parent
    /// then leaves the inner subtree hidden.
    fn collapse_batch(&self, parents: &[usize]) -> Result<Vec<usize>> {
        let mut pending: Vec<(usize, Vec<usize>)> = Vec::new();
        let mut all: Vec<usize> = Vec::new();
        for &parent in parents {
            if self.is_collapsed(parent) || !self.tree.has_children(parent) {
                continue;
            }
            let descendants = self.descendants_of(parent);
            all.extend(descendants.iter().copied());
            pending.push((parent, descendants));
        }
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let newly = self.hide_show.hide_by_indices(&all)?;
        let newly_set: HashSet<usize> = newly.iter().copied().collect();

        pending.sort_by_key(|(parent, _)| std::cmp::Reverse(self.tree.depth_of(*parent)));
        let mut claimed: HashSet<usize> = HashSet::new();
        let mut collapsed = self.collapsed.write();
        for (parent, descendants) in pending {
            let mine: Vec<usize> = descendants
                .into_iter()
                .filter(|index| newly_set.contains(index) && claimed.insert(*index))
                .collect();
            collapsed.insert(parent, mine);
        }
        Ok(newly)
    }

    /// All strict descendants of `parent`, depth-first preorder.
    fn descendants_of(&self, parent: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = self.tree.children_of(parent);
        stack.reverse();
        while let Some(index) = stack.pop() {
            out.push(index);
            let mut children = self.tree.children_of(index);
            children.reverse();
            stack.extend(children);
        }
        out
    }
}

impl<L: Layer + 'static> Drop for TreeLayer<L> {
    fn drop(&mut self) {
        self.hide_show
            .signals()
            .structural_changed
            .disconnect(self.source_connection);
    }
}

impl<L: Layer + 'static> IndexAddressable for TreeLayer<L> {
    fn index_at(&self, position: usize) -> Option<usize> {
        self.hide_show.index_at(position)
    }

    fn position_of(&self, index: usize) -> Option<usize> {
        self.hide_show.position_of(index)
    }
}

impl<L: Layer + 'static> Layer for TreeLayer<L> {
    fn id(&self) -> LayerId {
        self.id
    }

    fn orientation(&self) -> Orientation {
        self.hide_show.orientation()
    }

    fn count(&self) -> usize {
        self.hide_show.count()
    }

    fn signals(&self) -> &LayerSignals {
        &self.signals
    }

    // Same position space as the owned hide/show layer: both directions are
    // the identity over the valid range.
    fn underlying_position_of(&self, position: usize) -> Option<usize> {
        (position < self.count()).then_some(position)
    }

    fn local_position_of(&self, underlying_position: usize) -> Option<usize> {
        (underlying_position < self.count()).then_some(underlying_position)
    }

    fn size_of(&self, position: usize) -> Option<u32> {
        self.hide_show.size_of(position)
    }

    fn offset_of(&self, position: usize) -> Option<u64> {
        self.hide_show.offset_of(position)
    }

    fn handle_command(&self, command: &LayerCommand) -> Result<bool> {
        match command {
            LayerCommand::Collapse { parent } => {
                self.collapse(*parent)?;
                Ok(true)
            }
            LayerCommand::Expand { parent } => {
                self.expand(*parent);
                Ok(true)
            }
            LayerCommand::CollapseAll => {
                self.collapse_all()?;
                Ok(true)
            }
            LayerCommand::ExpandAll => {
                self.expand_all();
                Ok(true)
            }
            _ => self.hide_show.handle_command(command),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::StructuralChangeKind;
    use crate::layer::DataLayer;
    use crate::range::Range;
    use parking_lot::Mutex;

    /// 20 rows: parent 0 with children 1..=10, parent 11 with children
    /// 12..=19 (10 + 8 leaves).
    fn two_parent_stack() -> Arc<TreeLayer<DataLayer>> {
        let mut tree = StaticTreeSource::new();
        tree.add_root(0);
        for child in 1..=10 {
            tree.add_child(0, child);
        }
        tree.add_root(11);
        for child in 12..=19 {
            tree.add_child(11, child);
        }

        let data = Arc::new(DataLayer::new(Orientation::Rows, 20));
        TreeLayer::new(HideShowLayer::new(data), Arc::new(tree))
    }

    fn capture_events<L: Layer>(layer: &L) -> Arc<Mutex<Vec<StructuralChange>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let recv = events.clone();
        layer.signals().structural_changed.connect(move |change| {
            recv.lock().push(change.clone());
        });
        events
    }

    #[test]
    fn test_collapse_hides_descendant_block() {
        let layer = two_parent_stack();
        let events = capture_events(&*layer);

        let hidden = layer.collapse(0).unwrap();
        assert_eq!(hidden, (1..=10).collect::<Vec<usize>>());
        assert_eq!(layer.count(), 10);
        assert!(layer.is_collapsed(0));
        // Parent 11 moved up to position 1.
        assert_eq!(layer.index_at(1), Some(11));

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, StructuralChangeKind::Hidden);
        assert_eq!(events[0].position_ranges, vec![Range::new(1, 11)]);
    }

    #[test]
    fn test_collapse_is_recursive() {
        // 0 → 1 → 2, plus leaf 3 at the root.
        let mut tree = StaticTreeSource::new();
        tree.add_root(0).add_child(0, 1).add_child(1, 2).add_root(3);

        let data = Arc::new(DataLayer::new(Orientation::Rows, 4));
        let layer = TreeLayer::new(HideShowLayer::new(data), Arc::new(tree));

        let hidden = layer.collapse(0).unwrap();
        // Strict descendants, not just immediate children.
        assert_eq!(hidden, vec![1, 2]);
        assert_eq!(layer.count(), 2);
        assert_eq!(layer.index_at(1), Some(3));
        assert_eq!(layer.depth_of(2), 2);
    }

    #[test]
    fn test_collapse_leaf_and_recollapse_are_noops() {
        let layer = two_parent_stack();
        let events = capture_events(&*layer);

        // A node with no children is never collapsible.
        assert!(layer.collapse(5).unwrap().is_empty());
        assert!(!layer.is_collapsed(5));

        layer.collapse(0).unwrap();
        // Collapsing again is a no-op, not an error.
        assert!(layer.collapse(0).unwrap().is_empty());

        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn test_expand_restores() {
        let layer = two_parent_stack();

        layer.collapse(0).unwrap();
        let shown = layer.expand(0);
        assert_eq!(shown, (1..=10).collect::<Vec<usize>>());
        assert_eq!(layer.count(), 20);
        assert!(!layer.is_collapsed(0));

        // Expanding an expanded node is a no-op.
        assert!(layer.expand(0).is_empty());
    }

    #[test]
    fn test_independently_hidden_descendant_survives_expand() {
        let layer = two_parent_stack();

        // A user hide unrelated to the tree.
        layer.hide_show().hide_by_indices(&[3]).unwrap();

        layer.collapse(0).unwrap();
        let events = capture_events(&*layer);
        let shown = layer.expand(0);

        // Index 3 was not hidden by the collapse, so the expand does not
        // show it and the fired event excludes it.
        assert!(!shown.contains(&3));
        assert!(layer.hide_show().is_hidden(3));
        assert_eq!(layer.count(), 19);

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert!(!events[0].indexes.contains(&3));
    }

    #[test]
    fn test_collapse_all_fires_two_merged_ranges() {
        let layer = two_parent_stack();
        let events = capture_events(&*layer);

        layer.collapse_all().unwrap();
        assert_eq!(layer.count(), 2);
        assert_eq!(layer.index_at(0), Some(0));
        assert_eq!(layer.index_at(1), Some(11));

        let events = events.lock();
        // One batched event with exactly the two contiguous child blocks.
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].position_ranges,
            vec![Range::new(1, 11), Range::new(12, 20)]
        );
    }

    #[test]
    fn test_expand_all_restores_except_independent_hides() {
        let layer = two_parent_stack();
        layer.hide_show().hide_by_indices(&[15]).unwrap();

        layer.collapse_all().unwrap();
        assert_eq!(layer.count(), 2);

        let events = capture_events(&*layer);
        layer.expand_all();

        assert_eq!(layer.count(), 19);
        assert!(layer.hide_show().is_hidden(15));
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn test_restore_collapsed_fires_single_event() {
        let layer = two_parent_stack();
        layer.collapse(0).unwrap();

        let events = capture_events(&*layer);
        layer.restore_collapsed(&[11]).unwrap();

        assert_eq!(layer.collapsed_parents(), vec![11]);
        assert_eq!(layer.count(), 12);
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn test_nested_restore_attributes_deepest_first() {
        // 0 → 1 → {2, 3}; collapsing both 0 and 1.
        let mut tree = StaticTreeSource::new();
        tree.add_root(0).add_child(0, 1).add_child(1, 2).add_child(1, 3);

        let data = Arc::new(DataLayer::new(Orientation::Rows, 4));
        let layer = TreeLayer::new(HideShowLayer::new(data), Arc::new(tree));

        layer.restore_collapsed(&[0, 1]).unwrap();
        assert_eq!(layer.count(), 1);

        // Expanding the outer parent keeps the inner collapsed subtree
        // hidden: 1 reappears, 2 and 3 stay claimed by 1.
        layer.expand(0);
        assert_eq!(layer.count(), 2);
        assert!(layer.is_collapsed(1));

        layer.expand(1);
        assert_eq!(layer.count(), 4);
    }

    #[test]
    fn test_command_dispatch() {
        let layer = two_parent_stack();

        assert_eq!(
            layer.handle_command(&LayerCommand::Collapse { parent: 0 }),
            Ok(true)
        );
        assert_eq!(layer.count(), 10);

        assert_eq!(layer.handle_command(&LayerCommand::ExpandAll), Ok(true));
        assert_eq!(layer.count(), 20);

        // Hide/show commands fall through to the owned hide/show layer.
        assert_eq!(
            layer.handle_command(&LayerCommand::HideByPositions { positions: vec![0] }),
            Ok(true)
        );
        assert_eq!(layer.count(), 19);

        // Nothing below claims a move.
        assert_eq!(
            layer.handle_command(&LayerCommand::MovePosition { from: 0, to: 1 }),
            Ok(false)
        );
    }
}

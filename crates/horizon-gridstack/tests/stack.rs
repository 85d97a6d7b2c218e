//! Integration tests for full layer stacks.
//!
//! These exercise the engine the way a view would: commands entering at the
//! top of a multi-layer stack, events observed at the top after bottom-up
//! translation, and the documented invariants across layer boundaries.

use std::sync::Arc;

use parking_lot::Mutex;

use horizon_gridstack::prelude::*;

fn capture_events<L: Layer>(layer: &L) -> Arc<Mutex<Vec<StructuralChange>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let recv = events.clone();
    layer.signals().structural_changed.connect(move |change| {
        recv.lock().push(change.clone());
    });
    events
}

fn visible_indexes<L: Layer>(layer: &L) -> Vec<usize> {
    (0..layer.count())
        .filter_map(|position| layer.index_at(position))
        .collect()
}

#[test]
fn seven_row_round_trip_through_commands() {
    let data = Arc::new(DataLayer::new(Orientation::Rows, 7));
    let layer = HideShowLayer::new(data);
    let events = capture_events(&*layer);

    // Hide position 2 (index 2).
    let handled = layer
        .handle_command(&LayerCommand::HideByPositions { positions: vec![2] })
        .unwrap();
    assert!(handled);
    assert_eq!(layer.count(), 6);
    assert_eq!(visible_indexes(&*layer), vec![0, 1, 3, 4, 5, 6]);
    {
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].position_ranges, vec![Range::new(2, 3)]);
    }

    // Hide position 2 again: it now holds index 3.
    layer
        .handle_command(&LayerCommand::HideByPositions { positions: vec![2] })
        .unwrap();
    assert_eq!(visible_indexes(&*layer), vec![0, 1, 4, 5, 6]);

    // Show everything: original order restored exactly.
    layer.handle_command(&LayerCommand::ShowAll).unwrap();
    assert_eq!(layer.count(), 7);
    assert_eq!(layer.index_at(2), Some(2));
    assert_eq!(visible_indexes(&*layer), vec![0, 1, 2, 3, 4, 5, 6]);
}

#[test]
fn show_all_broadcast_clears_every_hide_layer() {
    // A composite arrangement with two hide/show layers on one axis.
    let data = Arc::new(DataLayer::new(Orientation::Rows, 10));
    let lower = HideShowLayer::new(data);
    let upper = HideShowLayer::new(lower.clone());

    lower.hide_by_indices(&[1, 2]).unwrap();
    upper.hide_by_indices(&[5]).unwrap();
    assert_eq!(upper.count(), 7);

    // One broadcast clears both layers: the handling layer executes and
    // keeps forwarding instead of swallowing the command.
    let handled = upper.handle_command(&LayerCommand::ShowAll).unwrap();
    assert!(handled);
    assert!(lower.hidden_indices().is_empty());
    assert!(upper.hidden_indices().is_empty());
    assert_eq!(upper.count(), 10);
}

#[test]
fn unhandled_command_is_reported_not_dropped() {
    let data = Arc::new(DataLayer::new(Orientation::Rows, 5));
    let layer = HideShowLayer::new(data);

    // No reorder layer in this stack: the command falls through and the
    // issuer is told so.
    let handled = layer
        .handle_command(&LayerCommand::MovePosition { from: 0, to: 1 })
        .unwrap();
    assert!(!handled);
}

#[test]
fn caller_distinguishes_rejection_noop_and_effect() {
    let data = Arc::new(DataLayer::new(Orientation::Rows, 5));
    let layer = HideShowLayer::new(data);
    let events = capture_events(&*layer);

    // Rejected: explicit error, nothing mutated, nothing fired.
    let err = layer
        .handle_command(&LayerCommand::HideByPositions { positions: vec![9] })
        .unwrap_err();
    assert_eq!(err, LayerError::position_out_of_range(9, 5));
    assert!(events.lock().is_empty());

    // No effect: legal no-op, handled, nothing fired.
    let handled = layer
        .handle_command(&LayerCommand::ShowIndices { indexes: vec![3] })
        .unwrap();
    assert!(handled);
    assert!(events.lock().is_empty());

    // Effect: handled and fired.
    layer
        .handle_command(&LayerCommand::HideByIndices { indexes: vec![3] })
        .unwrap();
    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].indexes, vec![3]);
}

#[test]
fn tree_scenario_with_eighteen_leaves() {
    // 18 leaf rows grouped under 2 parents (10 + 8 children).
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
    let layer = TreeLayer::new(HideShowLayer::new(data), Arc::new(tree));

    // An independent hide of one leaf, unrelated to the tree.
    layer.hide_show().hide_by_indices(&[7]).unwrap();

    let events = capture_events(&*layer);
    layer.handle_command(&LayerCommand::CollapseAll).unwrap();

    assert_eq!(layer.count(), 2);
    assert_eq!(visible_indexes(&*layer), vec![0, 11]);
    {
        let events = events.lock();
        assert_eq!(events.len(), 1);
        // Exactly two merged position ranges, one per parent's child block
        // (the pre-hidden leaf 7 just shortens the first block).
        assert_eq!(
            events[0].position_ranges,
            vec![Range::new(1, 10), Range::new(11, 19)]
        );
    }

    layer.handle_command(&LayerCommand::ExpandAll).unwrap();
    // Everything is back except the independently hidden leaf.
    assert_eq!(layer.count(), 19);
    assert!(layer.hide_show().is_hidden(7));
    assert!(!visible_indexes(&*layer).contains(&7));
}

#[test]
fn events_translate_through_a_deep_stack() {
    // data → hide/show → viewport, commands entering at the viewport.
    let data = Arc::new(DataLayer::new(Orientation::Rows, 50));
    let hide_show = HideShowLayer::new(data.clone());
    let viewport = ViewportLayer::new(hide_show.clone(), 10);
    viewport.set_origin(20);

    let top_events = capture_events(&*viewport);

    // Hide an index that sits inside the window: underlying position 25,
    // window-local 5.
    let handled = viewport
        .handle_command(&LayerCommand::HideByIndices { indexes: vec![25] })
        .unwrap();
    assert!(handled);

    {
        let events = top_events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, StructuralChangeKind::Hidden);
        assert_eq!(events[0].indexes, vec![25]);
        assert_eq!(events[0].position_ranges, vec![Range::new(5, 6)]);
        // The event still names the layer that owns the mutated state.
        assert_eq!(events[0].origin, hide_show.id());
    }

    // A change from the very bottom reaches the top as well.
    data.set_count(60);
    let events = top_events.lock();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].kind, StructuralChangeKind::Inserted);
    // [50, 60) below is outside the 10-wide window at origin 20.
    assert!(events[1].position_ranges.is_empty());
}

#[test]
fn bijection_holds_across_reorder_over_hide() {
    let data = Arc::new(DataLayer::new(Orientation::Columns, 8));
    let hide_show = HideShowLayer::new(data);
    let reorder = ReorderLayer::new(hide_show.clone());

    hide_show.hide_by_indices(&[0, 4]).unwrap();
    reorder.move_position(0, 5).unwrap();
    reorder.move_position(2, 1).unwrap();

    assert_eq!(reorder.count(), 6);
    for position in 0..reorder.count() {
        let index = reorder.index_at(position).unwrap();
        assert_eq!(reorder.position_of(index), Some(position));
        // Two-step composition agrees with the underlying layer.
        let underlying = reorder.underlying_position_of(position).unwrap();
        assert_eq!(hide_show.index_at(underlying), Some(index));
    }

    // Hidden indexes stay unreachable through the whole stack.
    assert_eq!(reorder.position_of(0), None);
    assert_eq!(reorder.position_of(4), None);
}

#[test]
fn geometry_follows_the_stack() {
    let data = Arc::new(DataLayer::with_default_size(Orientation::Rows, 6, 10));
    data.set_size(2, 30).unwrap();
    let hide_show = HideShowLayer::new(data.clone());

    // Offsets: [0, 10, 20, 50, 60, 70] at the base.
    assert_eq!(data.offset_of(3), Some(50));

    hide_show.hide_by_indices(&[1]).unwrap();
    // Local sizes are [10, 30, 10, 10, 10].
    assert_eq!(hide_show.size_of(1), Some(30));
    assert_eq!(hide_show.offset_of(3), Some(50));

    // A resize below invalidates the cumulative cache up the stack.
    data.set_size(0, 50).unwrap();
    assert_eq!(hide_show.offset_of(1), Some(50));
}

#[test]
fn persistence_round_trip_replays_without_event_storms() {
    let mut tree = StaticTreeSource::new();
    tree.add_root(0);
    tree.add_child(0, 1);
    tree.add_child(0, 2);
    tree.add_root(3);
    tree.add_child(3, 4);

    let data = Arc::new(DataLayer::new(Orientation::Rows, 5));
    let layer = TreeLayer::new(HideShowLayer::new(data.clone()), Arc::new(tree));

    layer.collapse(0).unwrap();
    let saved_hidden = layer.hide_show().hidden_indices();
    let saved_collapsed = layer.collapsed_parents();

    // A fresh stack restored from the snapshot.
    let mut tree2 = StaticTreeSource::new();
    tree2.add_root(0);
    tree2.add_child(0, 1);
    tree2.add_child(0, 2);
    tree2.add_root(3);
    tree2.add_child(3, 4);

    let data2 = Arc::new(DataLayer::new(Orientation::Rows, 5));
    let restored = TreeLayer::new(HideShowLayer::new(data2), Arc::new(tree2));
    let events = capture_events(&*restored);

    // Collapsed state replays first so the tree's per-parent records line
    // up with the hidden set that follows.
    restored.restore_collapsed(&saved_collapsed).unwrap();
    restored.hide_show().restore_hidden(&saved_hidden);

    assert_eq!(restored.count(), layer.count());
    assert_eq!(visible_indexes(&*restored), visible_indexes(&*layer));
    // At most one event per layer operation, not one per index.
    assert!(events.lock().len() <= 2);
}

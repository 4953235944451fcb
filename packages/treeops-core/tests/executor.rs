use treeops_core::{
    apply, apply_operations, apply_to_children, ApplyOptions, BoardState, Element, Operation,
    Properties, Value,
};

fn rect(id: &str) -> Element {
    Element::new(id, "rect")
}

fn row(ids: &[&str]) -> Vec<Element> {
    ids.iter().map(|id| rect(id)).collect()
}

fn ids(children: &[Element]) -> Vec<&str> {
    children.iter().map(|e| e.id.as_str()).collect()
}

fn props(pairs: &[(&str, Value)]) -> Properties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn move_to_front() {
    let children = row(&["A", "B", "C", "D"]);
    let out = apply(&children, &[Operation::move_node(vec![2], vec![0])]);
    assert_eq!(ids(&out), ["C", "A", "B", "D"]);
}

#[test]
fn empty_batch_is_a_copy() {
    let state = BoardState::new(row(&["A"])).with_viewport(props(&[("zoom", 1.into())]));
    let outcome = apply_operations(&state, &[], &ApplyOptions::default());
    assert_eq!(outcome.state, state);
    assert!(!outcome.metadata.has_changes);
    assert_eq!(apply(&state.children, &[]), state.children);
}

#[test]
fn unresolvable_operations_are_skipped() {
    let children = row(&["A"]);
    let ops = vec![
        Operation::set(vec![9], Properties::new(), props(&[("x", 1.into())])),
        Operation::insert(vec![0], rect("X")),
        Operation::remove(vec![4, 1], rect("nowhere")),
    ];
    let outcome = apply_operations(&BoardState::new(children), &ops, &ApplyOptions::default());
    assert_eq!(ids(&outcome.state.children), ["X", "A"]);
    assert!(outcome.metadata.has_changes);
    assert!(outcome.metadata.removed_elements.is_empty());
}

#[test]
fn input_state_is_never_mutated() {
    let state = BoardState::new(row(&["A", "B"]));
    let before = state.clone();
    let _ = apply_operations(
        &state,
        &[Operation::remove(vec![0], rect("A"))],
        &ApplyOptions::default(),
    );
    assert_eq!(state, before);
}

#[test]
fn metadata_reports_updated_subtrees_and_removals() {
    let children = vec![
        Element::new("f", "frame").with_children(vec![rect("a"), rect("b")]),
        rect("gone"),
    ];
    let ops = vec![
        Operation::set(
            vec![0],
            props(&[("name", Value::Null)]),
            props(&[("name", "hero".into())]),
        ),
        Operation::remove(vec![1], rect("gone")),
    ];
    let outcome = apply_operations(&BoardState::new(children), &ops, &ApplyOptions::default());
    let meta = &outcome.metadata;

    assert!(meta.has_changes);
    assert_eq!(ids(&meta.changed_elements), ["f", "a", "b"]);
    assert_eq!(
        meta.changed_elements[0].property("name"),
        Some(Value::from("hero"))
    );
    assert_eq!(ids(&meta.removed_elements), ["gone"]);
}

#[test]
fn null_deletes_an_attribute() {
    let children = vec![rect("a").with_attribute("fill", "red")];
    let op = Operation::set(
        vec![0],
        props(&[("fill", "red".into())]),
        props(&[("fill", Value::Null)]),
    );
    let out = apply(&children, &[op]);
    assert!(out[0].attributes.is_empty());
}

#[test]
fn children_cannot_be_replaced_through_set() {
    let children = vec![Element::new("f", "frame").with_children(row(&["a"]))];
    let op = Operation::set(
        vec![0],
        Properties::new(),
        props(&[("children", Value::Array(Vec::new()))]),
    );
    let out = apply(&children, &[op]);
    assert_eq!(ids(&out[0].children), ["a"]);
    assert!(out[0].attributes.is_empty());
}

fn board() -> BoardState {
    BoardState::new(row(&["A"]))
        .with_viewport(props(&[("zoom", 1.into())]))
        .with_selection(props(&[("ids", "A".into())]))
}

fn mixed_batch() -> Vec<Operation> {
    vec![
        Operation::insert(vec![1], rect("B")),
        Operation::set_viewport(
            Some(props(&[("zoom", 1.into())])),
            Some(props(&[("zoom", 2.into())])),
        ),
        Operation::set_selection(
            Some(props(&[("ids", "A".into())])),
            Some(props(&[("ids", "B".into())])),
        ),
    ]
}

#[test]
fn side_channels_merge() {
    let outcome = apply_operations(&board(), &mixed_batch(), &ApplyOptions::default());
    assert_eq!(ids(&outcome.state.children), ["A", "B"]);
    assert_eq!(outcome.state.viewport, Some(props(&[("zoom", 2.into())])));
    assert_eq!(outcome.state.selection, Some(props(&[("ids", "B".into())])));
}

#[test]
fn readonly_still_moves_the_viewport() {
    let outcome = apply_operations(&board(), &mixed_batch(), &ApplyOptions::readonly());
    assert_eq!(ids(&outcome.state.children), ["A"]);
    assert_eq!(outcome.state.viewport, Some(props(&[("zoom", 2.into())])));
    assert_eq!(outcome.state.selection, board().selection);
    assert!(outcome.metadata.has_changes);
}

#[test]
fn skip_flags_block_their_channel() {
    let options = ApplyOptions {
        skip_viewport_operations: true,
        skip_selection_operations: true,
        ..ApplyOptions::default()
    };
    let outcome = apply_operations(&board(), &mixed_batch(), &options);
    assert_eq!(ids(&outcome.state.children), ["A", "B"]);
    assert_eq!(outcome.state.viewport, board().viewport);
    assert_eq!(outcome.state.selection, board().selection);
}

#[test]
fn missing_channels_ignore_updates() {
    let state = BoardState::new(row(&["A"]));
    let ops = vec![Operation::set_viewport(None, Some(props(&[("zoom", 3.into())])))];
    let outcome = apply_operations(&state, &ops, &ApplyOptions::default());
    assert_eq!(outcome.state.viewport, None);
    assert!(!outcome.metadata.has_changes);
}

#[test]
fn tree_only_entry_point_ignores_side_channels() {
    let out = apply_to_children(&row(&["A"]), &mixed_batch(), &ApplyOptions::default());
    assert_eq!(ids(&out), ["A", "B"]);
}

#[test]
fn verbatim_execution_skips_rebasing() {
    let ops = vec![
        Operation::insert(vec![0], rect("X")),
        Operation::insert(vec![0], rect("Y")),
    ];
    let rebased = apply(&row(&["A"]), &ops);
    assert_eq!(ids(&rebased), ["X", "Y", "A"]);

    let verbatim = apply_to_children(&row(&["A"]), &ops, &ApplyOptions::verbatim());
    assert_eq!(ids(&verbatim), ["Y", "X", "A"]);
}

#[test]
fn skip_path_transform_keeps_sorted_paths() {
    let ops = vec![
        Operation::remove(vec![0], rect("A")),
        Operation::set(vec![2], Properties::new(), props(&[("x", 1.into())])),
    ];
    let options = ApplyOptions {
        skip_path_transform: true,
        ..ApplyOptions::default()
    };
    let out = apply_to_children(&row(&["A", "B", "C"]), &ops, &options);
    assert_eq!(ids(&out), ["B", "C"]);
    assert!(out.iter().all(|e| e.attributes.is_empty()));

    let rebased = apply(&row(&["A", "B", "C"]), &ops);
    assert_eq!(rebased[1].property("x"), Some(Value::from(1)));
}

#[test]
fn moves_carry_their_subtree() {
    let children = vec![
        Element::new("f", "frame").with_children(row(&["a", "b"])),
        rect("x"),
        rect("y"),
    ];
    let out = apply(&children, &[Operation::move_node(vec![0], vec![2])]);
    assert_eq!(ids(&out), ["x", "y", "f"]);
    assert_eq!(ids(&out[2].children), ["a", "b"]);
}

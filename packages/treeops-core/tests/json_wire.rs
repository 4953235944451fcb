#![cfg(feature = "serde")]

use serde_json::json;
use treeops_core::json::{
    elements_from_str, elements_to_string, operation_from_value, operations_from_str,
    operations_to_string,
};
use treeops_core::{ApplyOptions, Element, Error, Operation, Properties, Value};

#[test]
fn elements_use_the_flat_board_shape() {
    let parsed = elements_from_str(concat!(
        r#"[{"id":"f","type":"frame","name":"hero","#,
        r#""children":[{"id":"a","type":"rect","x":1.5}]}]"#,
    ))
    .unwrap();
    let expected = vec![Element::new("f", "frame")
        .with_attribute("name", "hero")
        .with_children(vec![Element::new("a", "rect").with_attribute("x", 1.5)])];
    assert_eq!(parsed, expected);

    let text = elements_to_string(&[Element::new("b", "rect").with_attribute("fill", "red")])
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value, json!([{ "id": "b", "type": "rect", "fill": "red" }]));
}

#[test]
fn decoded_null_attributes_equal_missing_ones() {
    let parsed = elements_from_str(r#"[{"id":"a","type":"rect","fill":null}]"#).unwrap();
    assert_eq!(parsed, vec![Element::new("a", "rect")]);
    assert_eq!(parsed[0].property("fill"), None);
}

#[test]
fn operations_are_tagged_and_camel_cased() {
    let ops = operations_from_str(
        r#"[
            {"type":"move_node","path":[2],"newPath":[0]},
            {"type":"set_node","path":[1],"properties":{"x":1},"newProperties":{"x":null}},
            {"type":"set_viewport","newProperties":{"zoom":2}}
        ]"#,
    )
    .unwrap();

    let mut before = Properties::new();
    before.insert("x".into(), Value::from(1));
    let mut after = Properties::new();
    after.insert("x".into(), Value::Null);
    let mut zoom = Properties::new();
    zoom.insert("zoom".into(), Value::from(2));
    assert_eq!(
        ops,
        vec![
            Operation::move_node(vec![2], vec![0]),
            Operation::set(vec![1], before, after),
            Operation::set_viewport(None, Some(zoom)),
        ]
    );

    let text = operations_to_string(&[Operation::insert(vec![0], Element::new("n", "text"))])
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        value,
        json!([{ "type": "insert_node", "path": [0], "node": { "id": "n", "type": "text" } }])
    );
}

#[test]
fn unknown_kinds_are_unsupported() {
    let err = operation_from_value(json!({ "type": "merge_node", "path": [0] })).unwrap_err();
    assert_eq!(err, Error::UnsupportedOperation("merge_node".into()));

    let err = operation_from_value(json!({ "path": [0] })).unwrap_err();
    assert!(matches!(err, Error::InvalidOperation(_)));

    let err = operation_from_value(json!({ "type": "remove_node", "path": "zero" })).unwrap_err();
    assert!(matches!(err, Error::Serialization(_)));
}

#[test]
fn apply_options_default_missing_fields() {
    let options: ApplyOptions = serde_json::from_value(json!({ "readonly": true })).unwrap();
    assert_eq!(options, ApplyOptions::readonly());
}

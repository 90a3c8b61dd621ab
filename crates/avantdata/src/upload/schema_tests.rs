//! Tests for mapping inference and diffing.

use super::*;
use serde_json::json;

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn keys(map: &Document) -> Vec<&str> {
    map.keys().map(String::as_str).collect()
}

// ==================== Override Tests ====================

#[test]
fn test_override_descriptors() {
    assert_eq!(FieldOverride::from("date").descriptor(), date_descriptor());
    assert_eq!(FieldOverride::from("int").descriptor(), json!({"type": "integer"}));
    assert_eq!(FieldOverride::from("keyword").descriptor(), json!({"type": "keyword"}));

    let raw = FieldOverride::Mapping(doc(json!({"type": "ip"})));
    assert_eq!(raw.descriptor(), json!({"type": "ip"}));
}

#[test]
fn test_override_deserializes_name_or_mapping() {
    let custom: Overrides = serde_json::from_value(json!({
        "dateAdded": "date",
        "geo": {"type": "geo_point"}
    }))
    .unwrap();

    assert_eq!(custom["dateAdded"], FieldOverride::Named("date".to_string()));
    assert!(matches!(custom["geo"], FieldOverride::Mapping(_)));
}

// ==================== Unify Tests ====================

#[test]
fn test_unify_unions_keys_in_first_seen_order() {
    // Arrange
    let sample = vec![doc(json!({"a": 1, "c": ""})), doc(json!({"b": 2, "c": "x"}))];

    // Act
    let unified = unify(&sample);

    // Assert
    assert_eq!(keys(&unified), vec!["a", "c", "b"]);
    assert_eq!(unified["c"], json!("x"));
}

#[test]
fn test_unify_first_non_empty_value_wins() {
    let sample = vec![
        doc(json!({"v": null})),
        doc(json!({"v": []})),
        doc(json!({"v": [1, 2]})),
        doc(json!({"v": "later"})),
    ];
    assert_eq!(unify(&sample)["v"], json!([1, 2]));
}

#[test]
fn test_unify_merges_nested_mappings() {
    // Arrange
    let sample = vec![
        doc(json!({"host": {"name": "srv01", "os": {"family": ""}}})),
        doc(json!({"host": {"ip": "10.0.0.1", "os": {"family": "linux", "version": "5"}}})),
    ];

    // Act
    let unified = unify(&sample);

    // Assert
    assert_eq!(
        unified["host"],
        json!({"name": "srv01", "os": {"family": "linux", "version": "5"}, "ip": "10.0.0.1"})
    );
}

#[test]
fn test_unify_drops_keys_empty_everywhere() {
    let sample = vec![doc(json!({"e": "", "f": 0})), doc(json!({"e": {}, "f": false}))];
    let unified = unify(&sample);

    assert!(!unified.contains_key("e"));
    assert!(!unified.contains_key("f"));
}

#[test]
fn test_unify_skips_zero_and_false_for_later_values() {
    let sample = vec![doc(json!({"n": 0, "b": false})), doc(json!({"n": 7, "b": true}))];
    let unified = unify(&sample);

    assert_eq!(unified["n"], json!(7));
    assert_eq!(unified["b"], json!(true));
}

// ==================== Inference Tests ====================

#[test]
fn test_infer_union_of_keys_plus_timestamp() {
    // Arrange
    let sample = vec![doc(json!({"a": 1})), doc(json!({"b": 2}))];

    // Act
    let properties = infer_properties(&sample, &Overrides::new());

    // Assert
    assert_eq!(keys(&properties), vec!["a", "b", TIMESTAMP_FIELD]);
    assert_eq!(properties["a"], text_descriptor());
    assert_eq!(properties[TIMESTAMP_FIELD], date_descriptor());
}

#[test]
fn test_infer_sequences() {
    let sample = vec![doc(json!({
        "events": [{"id": 1}, {"id": 2}],
        "tags": ["a", "b"],
        "mixed": [{"id": 1}, "x"],
        "none": []
    }))];
    let properties = infer_properties(&sample, &Overrides::new());

    assert_eq!(properties["events"], json!({"type": "object"}));
    assert_eq!(properties["tags"], text_descriptor());
    assert_eq!(properties["mixed"], text_descriptor());
    assert!(!properties.contains_key("none"));
}

#[test]
fn test_infer_skips_keys_without_values() {
    // Arrange
    let sample = vec![
        doc(json!({"a": "x", "n": 0, "z": null})),
        doc(json!({"a": "y", "n": 0, "z": ""})),
    ];

    // Act
    let properties = infer_properties(&sample, &Overrides::new());

    // Assert
    assert_eq!(keys(&properties), vec!["a", TIMESTAMP_FIELD]);
}

#[test]
fn test_infer_nested_object_without_timestamp() {
    let sample = vec![doc(json!({"host": {"name": "srv01"}}))];
    let properties = infer_properties(&sample, &Overrides::new());

    assert_eq!(
        properties["host"],
        json!({"properties": {"name": text_descriptor()}})
    );
}

#[test]
fn test_overrides_apply_at_every_level() {
    // Arrange
    let mut custom = Overrides::new();
    custom.insert("seen".to_string(), "date".into());
    custom.insert("port".to_string(), "int".into());
    let sample = vec![doc(json!({"seen": "2021/11/03 00:00:00", "net": {"port": "443"}}))];

    // Act
    let properties = infer_properties(&sample, &custom);

    // Assert
    assert_eq!(properties["seen"], date_descriptor());
    assert_eq!(properties["net"]["properties"]["port"], json!({"type": "integer"}));
}

#[test]
fn test_supplied_timestamp_is_kept() {
    let mut custom = Overrides::new();
    custom.insert(TIMESTAMP_FIELD.to_string(), "long".into());
    let sample = vec![doc(json!({"GenerateTime": 1}))];

    let properties = infer_properties(&sample, &custom);

    assert_eq!(properties[TIMESTAMP_FIELD], json!({"type": "long"}));
    assert_eq!(properties.len(), 1);
}

// ==================== Flatten Tests ====================

#[test]
fn test_flatten_properties_collapses_wrappers() {
    let properties = doc(json!({
        "a": text_descriptor(),
        "host": {"properties": {"ip": {"type": "ip"}, "os": {"properties": {"family": {"type": "keyword"}}}}},
        "events": {"type": "object"}
    }));

    let flat = flatten_properties(&properties);

    assert_eq!(flat["a"], "text");
    assert_eq!(flat["host.ip"], "ip");
    assert_eq!(flat["host.os.family"], "keyword");
    assert_eq!(flat["events"], "object");
    assert!(!flat.contains_key("host"));
}

// ==================== Diff Tests ====================

#[test]
fn test_diff_reports_only_new_fields_and_converges() {
    // Arrange
    let mut remote = doc(json!({"x": text_descriptor()}));
    let local = generate_properties(&doc(json!({"x": "1", "y": "2"})), &Overrides::new(), false);

    // Act
    let first = diff(&remote, &local);
    merge_fields(&mut remote, &first.additions);
    let second = diff(&remote, &local);

    // Assert
    assert_eq!(first.new_fields, vec!["y"]);
    assert!(first.conflicts.is_empty());
    assert!(second.is_empty());
    assert!(second.additions.is_empty());
}

#[test]
fn test_diff_recurses_into_objects() {
    // Arrange
    let mut remote = doc(json!({
        "host": {"properties": {"name": text_descriptor()}}
    }));
    let local = generate_properties(
        &doc(json!({"host": {"name": "a", "ip": "10.0.0.1"}})),
        &Overrides::new(),
        false,
    );

    // Act
    let result = diff(&remote, &local);
    merge_fields(&mut remote, &result.additions);

    // Assert
    assert_eq!(result.new_fields, vec!["host.ip"]);
    assert_eq!(
        remote["host"]["properties"],
        json!({"name": text_descriptor(), "ip": text_descriptor()})
    );
}

#[test]
fn test_diff_reports_type_conflicts_without_merging() {
    // Arrange
    let remote = doc(json!({"port": {"type": "integer"}, "events": {"type": "object"}}));
    let local = doc(json!({"port": text_descriptor(), "events": text_descriptor()}));

    // Act
    let result = diff(&remote, &local);

    // Assert
    assert!(result.is_empty());
    assert_eq!(
        result.conflicts,
        vec![TypeConflict {
            field: "port".to_string(),
            remote: "integer".to_string(),
            local: "text".to_string(),
        }]
    );
}

#[test]
fn test_merge_fields_preserves_existing() {
    let mut properties = doc(json!({"a": {"type": "keyword"}}));
    merge_fields(&mut properties, &doc(json!({"b": {"type": "long"}})));
    assert_eq!(properties["a"], json!({"type": "keyword"}));
    assert_eq!(properties["b"], json!({"type": "long"}));
}

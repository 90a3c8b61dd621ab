//! Tests for the recursive editor.

use super::*;
use proptest::prelude::*;
use serde_json::json;

fn uppercase() -> ValueRewrite {
    ValueRewrite::func(|v| match v {
        Value::String(s) => Value::String(s.to_uppercase()),
        other => other,
    })
}

// ==================== Basic rewriting ====================

#[test]
fn test_edit_without_rewrites_drops_nulls_only() {
    let input = json!({"a": 1, "b": null, "c": [1, null, {"d": null, "e": ""}]});
    let out = Editor::new().edit(input);
    assert_eq!(out, json!({"a": 1, "c": [1, {"e": ""}]}));
}

#[test]
fn test_edit_keys_regex() {
    let editor = Editor::new().key(KeyRewrite::regex([("-", "_"), ("^Old", "New")]).unwrap());
    let out = editor.edit(json!({"Old-name": 1, "nested": {"a-b": 2}}));
    assert_eq!(out, json!({"New_name": 1, "nested": {"a_b": 2}}));
}

#[test]
fn test_edit_values_function_applies_at_every_depth() {
    let out = Editor::new()
        .value(uppercase())
        .edit(json!({"a": "x", "b": ["y", {"c": "z"}], "n": 3}));
    assert_eq!(out, json!({"a": "X", "b": ["Y", {"c": "Z"}], "n": 3}));
}

#[test]
fn test_edit_value_regex_skips_non_strings_and_empty() {
    let editor = Editor::new().value(ValueRewrite::regex([(r"\s+", " ")]).unwrap());
    let out = editor.edit(json!({"a": "x   y", "b": 10, "c": "", "d": true}));
    assert_eq!(out, json!({"a": "x y", "b": 10, "c": "", "d": true}));
}

#[test]
fn test_edit_steps_run_in_order() {
    let editor = Editor::new()
        .value(ValueRewrite::regex([("a", "b")]).unwrap())
        .value(ValueRewrite::regex([("b", "c")]).unwrap());
    assert_eq!(editor.edit(json!(["a"])), json!(["c"]));
}

#[test]
fn test_edit_item_rewrite_uses_rewritten_key() {
    let editor = Editor::new()
        .key(KeyRewrite::rename([("date", "published")]))
        .item(
            "published",
            ValueRewrite::func(|v| match v.as_str().and_then(crate::transform::date_to_epoch_millis) {
                Some(ms) => json!(ms),
                None => v,
            }),
        );
    let out = editor.edit(json!({"date": "1970-01-02", "other": "1970-01-02"}));
    assert_eq!(out, json!({"published": 86_400_000, "other": "1970-01-02"}));
}

#[test]
fn test_edit_null_result_drops_entry() {
    let editor = Editor::new().value(ValueRewrite::func(crate::transform::remove_empty));
    let out = editor.edit(json!({"a": "", "b": "keep", "c": [0, 1, ""], "d": false}));
    assert_eq!(out, json!({"b": "keep", "c": [1], "d": false}));
}

#[test]
fn test_edit_null_rewritten_before_dropping() {
    let editor = Editor::new().value(ValueRewrite::func(|v| {
        if v.is_null() {
            json!("missing")
        } else {
            v
        }
    }));
    let out = editor.edit(json!({"a": null, "b": [null]}));
    assert_eq!(out, json!({"a": "missing", "b": ["missing"]}));
}

#[test]
fn test_rename_is_exact_match() {
    let editor = Editor::new().key(KeyRewrite::rename([("id", "kevID")]));
    let out = editor.edit(json!({"id": 1, "valid": 2, "inner": {"id": 3}}));
    assert_eq!(out, json!({"kevID": 1, "valid": 2, "inner": {"kevID": 3}}));
}

#[test]
fn test_edit_top_level_scalar() {
    assert_eq!(Editor::new().value(uppercase()).edit(json!("a")), json!("A"));
}

#[test]
fn test_invalid_regex_is_error() {
    assert!(ValueRewrite::regex([("(", "")]).is_err());
    assert!(KeyRewrite::regex([("[", "")]).is_err());
}

// ==================== Fan-out ====================

#[test]
fn test_edit_all_parallel_matches_sequential() {
    let editor = Editor::new().value(uppercase());
    let values: Vec<Value> = (0..257).map(|i| json!({"n": i, "s": format!("v{i}")})).collect();
    let sequential: Vec<Value> = values.iter().cloned().map(|v| editor.edit(v)).collect();
    let parallel = editor.edit_all(values, 4).unwrap();
    assert_eq!(parallel, sequential);
}

#[test]
fn test_edit_all_drops_null_top_level_items() {
    let out = Editor::new().edit_all(vec![json!(1), Value::Null, json!(2)], 2).unwrap();
    assert_eq!(out, vec![json!(1), json!(2)]);
}

#[test]
fn test_edit_documents_keeps_order() {
    let editor = Editor::new().key(KeyRewrite::rename([("type", "kevtype")]));
    let docs: Vec<Document> = (0..10)
        .map(|i| crate::document::as_document(json!({"type": i})).unwrap())
        .collect();
    let out = editor.edit_documents(docs, 3).unwrap();
    let ids: Vec<i64> = out.iter().map(|d| d["kevtype"].as_i64().unwrap()).collect();
    assert_eq!(ids, (0..10).collect::<Vec<_>>());
}

// ==================== Properties ====================

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-zA-Z ]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            proptest::collection::vec(("[a-zA-Z]{1,4}", inner), 0..6)
                .prop_map(|pairs| Value::Object(pairs.into_iter().collect())),
        ]
    })
}

fn same_shape(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_))
    ) || !(a.is_object() || a.is_array() || b.is_object() || b.is_array())
}

proptest! {
    #[test]
    fn prop_edit_idempotent_for_idempotent_rewrites(value in arb_json()) {
        let editor = Editor::new()
            .key(KeyRewrite::func(|k| k.to_lowercase()))
            .value(uppercase());
        let once = editor.edit(value);
        let twice = editor.edit(once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_edit_preserves_container_shape(value in arb_json()) {
        let out = Editor::new().edit(value.clone());
        if !value.is_null() {
            prop_assert!(same_shape(&value, &out));
        }
        if let (Value::Object(before), Value::Object(after)) = (&value, &out) {
            for (key, v) in before {
                if v.is_object() || v.is_array() {
                    prop_assert!(same_shape(v, &after[key]));
                }
            }
        }
    }
}

//! Tests for value helpers.

use super::*;
use proptest::prelude::*;
use serde_json::json;

// ==================== split_chunks / flatten ====================

#[test]
fn test_split_chunks_near_equal() {
    let chunks = split_chunks((0..10).collect(), 3);
    let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![4, 3, 3]);
    assert_eq!(chunks[0], vec![0, 1, 2, 3]);
    assert_eq!(chunks[2], vec![7, 8, 9]);
}

#[test]
fn test_split_chunks_more_parts_than_items() {
    let chunks = split_chunks(vec!["a", "b"], 8);
    assert_eq!(chunks, vec![vec!["a"], vec!["b"]]);
}

#[test]
fn test_split_chunks_empty() {
    let chunks: Vec<Vec<u8>> = split_chunks(Vec::new(), 4);
    assert!(chunks.is_empty());
}

#[test]
fn test_flatten_empty_lists() {
    let lists: Vec<Vec<u8>> = vec![vec![], vec![], vec![], vec![]];
    assert!(flatten(lists).is_empty());
    assert_eq!(flatten(vec![vec![1, 2], vec![], vec![3]]), vec![1, 2, 3]);
}

proptest! {
    #[test]
    fn prop_split_then_flatten_is_identity(items in proptest::collection::vec(any::<u16>(), 0..300), parts in 1usize..20) {
        let chunks = split_chunks(items.clone(), parts);
        prop_assert!(chunks.len() <= parts);
        if let (Some(max), Some(min)) = (chunks.iter().map(Vec::len).max(), chunks.iter().map(Vec::len).min()) {
            prop_assert!(max - min <= 1);
        }
        prop_assert_eq!(flatten(chunks), items);
    }
}

// ==================== remove_empty ====================

#[test]
fn test_remove_empty() {
    assert_eq!(remove_empty(json!("")), Value::Null);
    assert_eq!(remove_empty(json!(0)), Value::Null);
    assert_eq!(remove_empty(json!([])), Value::Null);
    assert_eq!(remove_empty(json!({})), Value::Null);
    assert_eq!(remove_empty(json!(false)), json!(false));
    assert_eq!(remove_empty(json!("x")), json!("x"));
    assert_eq!(remove_empty(json!(1.5)), json!(1.5));
}

// ==================== get_path ====================

#[test]
fn test_get_path() {
    let value = json!({"data": {"items": [1, 2]}});
    assert_eq!(get_path(&value, &["data", "items"]), Some(&json!([1, 2])));
    assert_eq!(get_path(&value, &["", "data"]), Some(&json!({"items": [1, 2]})));
    assert_eq!(get_path::<&str>(&value, &[]), Some(&value));
    assert_eq!(get_path(&value, &["missing"]), None);
}

// ==================== string helpers ====================

#[test]
fn test_title_case() {
    assert_eq!(title_case("testing_template"), "Testing_Template");
    assert_eq!(title_case("hELLO wORLD"), "Hello World");
    assert_eq!(title_case("a1b"), "A1B");
}

#[test]
fn test_camel_case() {
    assert_eq!(camel_case("hello_world-foo"), "helloWorldFoo");
    assert_eq!(camel_case("ABC__def"), "abcDef");
    assert_eq!(camel_case(""), "");
}

#[test]
fn test_human_size() {
    assert_eq!(human_size(0), "0 bytes");
    assert_eq!(human_size(1023), "1023 bytes");
    assert_eq!(human_size(706 * 1024 + 100), "706KB");
    assert_eq!(human_size(5 * 1024 * 1024), "5MB");
    assert_eq!(human_size(u64::MAX), "15EB");
}

#[test]
fn test_parse_scalar() {
    assert_eq!(parse_scalar("42"), json!(42));
    assert_eq!(parse_scalar("4.5"), json!(4.5));
    assert_eq!(parse_scalar("True"), json!(true));
    assert_eq!(parse_scalar("None"), Value::Null);
    assert_eq!(parse_scalar("[1, 2]"), json!([1, 2]));
    assert_eq!(parse_scalar("[not json"), json!("[not json"));
    assert_eq!(parse_scalar("plain text"), json!("plain text"));
}

#[test]
fn test_date_to_epoch_millis() {
    assert_eq!(date_to_epoch_millis("1970-01-02"), Some(86_400_000));
    assert_eq!(date_to_epoch_millis("2021/11/03 00:00:00"), Some(1_635_897_600_000));
    assert_eq!(
        date_to_epoch_millis("2021-11-03T00:00:00+00:00"),
        Some(1_635_897_600_000)
    );
    assert_eq!(date_to_epoch_millis("November 03, 2021"), Some(1_635_897_600_000));
    assert_eq!(date_to_epoch_millis("not a date"), None);
}

//! Repeater elements are tracked by their projected identity

use super::test_utils::{ErrorLog, TestPublisher};
use mirrorfs::{Content, FileType, JsonCodec, Modifiers, Repeater, Value};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    id: String,
    count: u32,
}

fn entries(ids: &[&str]) -> Vec<Content> {
    let items: Vec<Entry> = ids
        .iter()
        .map(|id| Entry {
            id: id.to_string(),
            count: 0,
        })
        .collect();
    vec![Repeater::new(
        items,
        |entry| entry.id.clone(),
        |entry| {
            Value::new(JsonCodec::<Entry>::new())
                .default_value(entry.clone())
                .into()
        },
    )
    .declared_type(FileType::JSON)
    .into()]
}

#[test]
fn test_reordering_and_appending_creates_only_new_elements() {
    let (mut test, fs_counts) = TestPublisher::counting();
    test.publisher.reflect("entries", || entries(&["x", "y"])).unwrap();
    assert!(test.path("x.json").exists());
    assert!(test.path("y.json").exists());

    fs::write(test.path("x.json"), r#"{ "id": "x", "count": 7 }"#).unwrap();

    fs_counts.reset();
    test.publisher
        .refresh("entries", || entries(&["y", "x", "z"]))
        .unwrap();

    let counts = fs_counts.counts();
    assert_eq!(counts.writes, 1);
    assert!(test.path("z.json").exists());
    assert!(fs::read_to_string(test.path("x.json")).unwrap().contains("7"));
    assert!(test.trash_files().is_empty());
}

#[test]
fn test_vanished_element_is_trashed() {
    let mut test = TestPublisher::new();
    test.publisher.reflect("entries", || entries(&["x", "y"])).unwrap();
    test.publisher.refresh("entries", || entries(&["y"])).unwrap();

    assert!(!test.path("x.json").exists());
    assert!(test.path("y.json").exists());
    let trashed = test.publisher.trash_store().list().unwrap();
    assert_eq!(trashed.len(), 1);
    assert!(trashed[0].original_path.ends_with("x.json"));
    assert!(trashed[0].trashed_path.exists());
}

#[test]
fn test_changed_identity_is_delete_and_create() {
    let mut test = TestPublisher::new();
    test.publisher.reflect("entries", || entries(&["old"])).unwrap();
    test.publisher.refresh("entries", || entries(&["new"])).unwrap();

    assert!(!test.path("old.json").exists());
    assert!(test.path("new.json").exists());
    assert_eq!(test.trash_files().len(), 1);
}

#[test]
fn test_duplicate_identity_keeps_first_element() {
    let mut test = TestPublisher::new();
    let log = ErrorLog::default();
    test.publisher.set_default_handler(log.handler());

    test.publisher
        .reflect("entries", || {
            vec![Repeater::new(
                vec![("same", 1u32), ("same", 2u32)],
                |(id, _)| id.to_string(),
                |(id, count)| {
                    Value::new(JsonCodec::<Entry>::new())
                        .default_value(Entry {
                            id: id.to_string(),
                            count: *count,
                        })
                        .into()
                },
            )
            .declared_type(FileType::JSON)
            .into()]
        })
        .unwrap();

    let stored: Entry =
        serde_json::from_str(&fs::read_to_string(test.path("same.json")).unwrap()).unwrap();
    assert_eq!(stored.count, 1);
    let messages = log.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("duplicate repeater identity"));
}

#[test]
fn test_deep_repeater_is_walked_iteratively() {
    let mut test = TestPublisher::new();
    let ids: Vec<String> = (0..2_000).map(|n| format!("item{}", n)).collect();
    test.publisher
        .reflect("many", move || {
            vec![Repeater::new(
                ids.clone(),
                |id| id.clone(),
                |id| {
                    Value::new(JsonCodec::<String>::new())
                        .default_value(id.clone())
                        .into()
                },
            )
            .declared_type(FileType::JSON)
            .into()]
        })
        .unwrap();

    assert_eq!(test.publisher.reflection_count(), 2_001);
    assert!(test.path("item1999.json").exists());
}

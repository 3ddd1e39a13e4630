//! Paths depend on identity, never on sibling order

use super::test_utils::{ErrorLog, TestPublisher};
use mirrorfs::{CacheKey, Content, FileType, Folder, Modifiers, Repeater, TextCodec, Value};
use std::collections::BTreeSet;
use std::path::PathBuf;

fn site(reversed: bool) -> Vec<Content> {
    let mut pages: Vec<Content> = vec![
        Value::named("index", TextCodec)
            .default_value("home".to_string())
            .declared_type(FileType::MARKDOWN)
            .into(),
        Folder::new("assets", || {
            vec![Value::named("style.css", TextCodec)
                .default_value(String::new())
                .into()]
        })
        .into(),
        Repeater::new(
            vec!["2024".to_string(), "2025".to_string()],
            |year| year.clone(),
            |year| {
                Folder::new(year.clone(), || {
                    vec![Value::named("summary.txt", TextCodec)
                        .default_value(String::new())
                        .into()]
                })
                .into()
            },
        )
        .into(),
    ];
    if reversed {
        pages.reverse();
    }
    vec![Folder::new("Site", move || pages.clone()).into()]
}

fn relative_paths(test: &TestPublisher) -> BTreeSet<PathBuf> {
    let root = test.root();
    test.publisher
        .cache()
        .reflections()
        .filter(|reflection| reflection.is_named())
        .map(|reflection| reflection.path().strip_prefix(&root).unwrap().to_path_buf())
        .collect()
}

#[test]
fn test_sibling_order_does_not_change_paths() {
    let mut forward = TestPublisher::new();
    forward.publisher.reflect("site", || site(false)).unwrap();
    let mut backward = TestPublisher::new();
    backward.publisher.reflect("site", || site(true)).unwrap();

    let paths = relative_paths(&forward);
    assert_eq!(paths, relative_paths(&backward));
    assert!(paths.contains(&PathBuf::from("Site/index.md")));
    assert!(paths.contains(&PathBuf::from("Site/assets/style.css")));
    assert!(paths.contains(&PathBuf::from("Site/2025/summary.txt")));
}

#[test]
fn test_reordering_keeps_entries_on_disk() {
    let mut test = TestPublisher::new();
    test.publisher.reflect("site", || site(false)).unwrap();
    let key = CacheKey::reflected("site");
    let index = vec!["Site".to_string(), "index".to_string()];
    let index_id = test.publisher.cache().lookup(&key, &index);
    let before = relative_paths(&test);

    test.publisher.refresh("site", || site(true)).unwrap();

    assert_eq!(relative_paths(&test), before);
    assert_eq!(test.publisher.cache().lookup(&key, &index), index_id);
    assert!(test.path("Site/2024/summary.txt").exists());
    assert!(test.path("Site/2025/summary.txt").exists());
    assert!(test.trash_files().is_empty());
}

#[test]
fn test_colliding_sibling_names_bind_once() {
    let mut test = TestPublisher::new();
    let log = ErrorLog::default();
    test.publisher.set_default_handler(log.handler());
    let twins = || {
        vec![
            Value::named("dup.txt", TextCodec)
                .default_value("first".to_string())
                .into(),
            Value::named("dup.txt", TextCodec)
                .default_value("second".to_string())
                .into(),
        ]
    };

    test.publisher.reflect("dup", twins).unwrap();
    for _ in 0..3 {
        test.publisher.refresh("dup", twins).unwrap();
    }

    assert_eq!(test.publisher.reflection_count(), 1);
    assert_eq!(std::fs::read_to_string(test.path("dup.txt")).unwrap(), "first");
    let messages = log.messages();
    assert_eq!(messages.len(), 4);
    assert!(messages.iter().all(|m| m.contains("duplicate identity")));

    assert_eq!(test.publisher.invalidate(&CacheKey::reflected("dup")).len(), 1);
    assert_eq!(test.publisher.reflection_count(), 0);
}

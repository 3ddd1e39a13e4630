//! Repeated materialization does no work

use super::test_utils::TestPublisher;
use mirrorfs::{
    Alias, CacheKey, Content, FileType, Folder, JsonCodec, Modifiers, PublicContent, Repeater,
    TextCodec, Value,
};
use std::sync::Arc;

#[derive(Default)]
struct Workspace {
    notes: Alias<TextCodec>,
}

impl PublicContent for Workspace {
    fn content(&self) -> Vec<Content> {
        let notes = self.notes.clone();
        vec![Folder::new("Workspace", move || {
            vec![
                Value::named("notes", TextCodec)
                    .default_value("todo".to_string())
                    .declared_type(FileType::PLAIN_TEXT)
                    .alias(&notes)
                    .into(),
                Folder::new("Projects", || {
                    vec![Repeater::new(
                        vec!["alpha".to_string(), "beta".to_string()],
                        |name| name.clone(),
                        |name| {
                            Value::new(JsonCodec::<String>::new())
                                .default_value(name.clone())
                                .into()
                        },
                    )
                    .declared_type(FileType::JSON)
                    .into()]
                })
                .into(),
            ]
        })
        .into()]
    }
}

#[test]
fn test_second_materialize_touches_nothing() {
    let (mut test, counting) = TestPublisher::counting();
    let first = test.publisher.materialize::<Workspace>("main").unwrap();
    assert!(counting.counts().total() > 0);
    assert!(test.path("Workspace/Projects/alpha.json").exists());

    counting.reset();
    let second = test.publisher.materialize::<Workspace>("main").unwrap();

    assert_eq!(counting.counts().total(), 0);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.notes.reflection(), second.notes.reflection());
}

#[test]
fn test_cache_hit_does_not_call_constructor() {
    let mut test = TestPublisher::new();
    test.publisher.materialize::<Workspace>("main").unwrap();

    let mut called = false;
    test.publisher
        .materialize_with("main", || {
            called = true;
            Workspace::default()
        })
        .unwrap();
    assert!(!called);
}

#[test]
fn test_keys_partition_the_cache() {
    let mut test = TestPublisher::new();
    let main = test.publisher.materialize::<Workspace>("main").unwrap();
    let other = test.publisher.materialize::<Workspace>("other").unwrap();

    assert!(!Arc::ptr_eq(&main, &other));
    assert_eq!(test.publisher.mirror_count(), 2);
    assert!(test.publisher.cache().contains(&CacheKey::of::<Workspace>("main")));
    assert!(test.publisher.cache().contains(&CacheKey::of::<Workspace>("other")));
}

#[test]
fn test_reflect_caches_builder_trees() {
    let (mut test, counting) = TestPublisher::counting();
    let mut builds = 0;
    let first = test
        .publisher
        .reflect("scratch", || {
            builds += 1;
            vec![Value::named("scratch.txt", TextCodec)
                .default_value(String::new())
                .into()]
        })
        .unwrap();

    counting.reset();
    let second = test
        .publisher
        .reflect("scratch", || {
            builds += 1;
            Vec::new()
        })
        .unwrap();

    assert_eq!(builds, 1);
    assert_eq!(counting.counts().total(), 0);
    assert_eq!(first.roots(), second.roots());
    assert_eq!(first.roots().len(), 1);
}

#[test]
fn test_refresh_without_changes_creates_nothing() {
    let mut test = TestPublisher::new();
    let build = || {
        vec![Folder::new("Stable", || {
            vec![Value::named("a.txt", TextCodec)
                .default_value("a".to_string())
                .into()]
        })
        .into()]
    };
    let first = test.publisher.reflect("stable", build).unwrap();
    let count = test.publisher.reflection_count();

    let second = test.publisher.refresh("stable", build).unwrap();
    assert_eq!(first.roots(), second.roots());
    assert_eq!(test.publisher.reflection_count(), count);
}

//! Conditional content builds only the selected branch

use super::test_utils::TestPublisher;
use mirrorfs::{CacheKey, Content, Folder, Modifiers, PublicContent, RemovalMethod, TextCodec, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Report {
    detailed: bool,
    detail_builds: Arc<AtomicUsize>,
}

impl Report {
    fn new(detailed: bool) -> Self {
        Self {
            detailed,
            detail_builds: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl PublicContent for Report {
    fn content(&self) -> Vec<Content> {
        let builds = self.detail_builds.clone();
        vec![
            Value::named("title.txt", TextCodec)
                .default_value("Report".to_string())
                .into(),
            Content::either(
                self.detailed,
                move || {
                    builds.fetch_add(1, Ordering::SeqCst);
                    Folder::new("Details", || {
                        vec![Value::named("body.txt", TextCodec)
                            .default_value("long form".to_string())
                            .into()]
                    })
                    .into()
                },
                || {
                    Value::named("summary.txt", TextCodec)
                        .default_value("short".to_string())
                        .into()
                },
            )
            .removal(RemovalMethod::Delete),
            Content::when(false, || {
                Value::named("never.txt", TextCodec)
                    .default_value(String::new())
                    .into()
            }),
        ]
    }
}

#[test]
fn test_unselected_branch_is_never_built() {
    let mut test = TestPublisher::new();
    let report = test
        .publisher
        .materialize_value("weekly", Report::new(false))
        .unwrap();

    assert_eq!(report.detail_builds.load(Ordering::SeqCst), 0);
    assert!(test.path("summary.txt").exists());
    assert!(!test.path("Details").exists());
    assert!(!test.path("never.txt").exists());
    assert_eq!(test.publisher.reflection_count(), 2);
}

#[test]
fn test_selected_branch_is_materialized() {
    let mut test = TestPublisher::new();
    let report = test
        .publisher
        .materialize_value("weekly", Report::new(true))
        .unwrap();

    assert_eq!(report.detail_builds.load(Ordering::SeqCst), 1);
    assert!(test.path("Details/body.txt").exists());
    assert!(!test.path("summary.txt").exists());
}

#[test]
fn test_conditional_modifiers_reach_chosen_branch() {
    let mut test = TestPublisher::new();
    test.publisher
        .materialize_value("weekly", Report::new(false))
        .unwrap();

    let key = CacheKey::of::<Report>("weekly");
    let summary = test
        .publisher
        .cache()
        .lookup(&key, &["summary.txt".to_string()])
        .unwrap();
    let reflection = test.publisher.reflection(summary).unwrap();
    assert_eq!(reflection.traits().removal_method(), RemovalMethod::Delete);

    let title = test
        .publisher
        .cache()
        .lookup(&key, &["title.txt".to_string()])
        .unwrap();
    assert_eq!(
        test.publisher.reflection(title).unwrap().traits().removal_method(),
        RemovalMethod::Trash
    );
}

#[test]
fn test_switching_branches_rebinds() {
    let mut test = TestPublisher::new();
    test.publisher
        .materialize_value("weekly", Report::new(false))
        .unwrap();
    let key = CacheKey::of::<Report>("weekly");

    test.publisher
        .refresh_value("weekly", Report::new(true))
        .unwrap();

    assert!(test.path("Details/body.txt").exists());
    let cache = test.publisher.cache();
    assert!(cache.lookup(&key, &["summary.txt".to_string()]).is_none());
    assert!(cache
        .lookup(&key, &["Details".to_string(), "body.txt".to_string()])
        .is_some());
    assert_eq!(test.publisher.reflection_count(), 3);
}

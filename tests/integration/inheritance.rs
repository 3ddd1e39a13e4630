//! Trait inheritance through nested folders

use super::test_utils::TestPublisher;
use mirrorfs::values::EntryKind;
use mirrorfs::{
    CacheKey, Content, FileType, Folder, Group, Modifiers, RemovalMethod, Reflection, TextCodec,
    Value,
};

fn leaf(name: &str) -> Content {
    Value::named(name, TextCodec)
        .default_value(name.to_string())
        .into()
}

fn nested(root_removal: Option<RemovalMethod>) -> Vec<Content> {
    tree(move |root| match root_removal {
        Some(method) => root.removal(method),
        None => root,
    })
}

/// Three nested folders with one leaf each; only the outermost folder is modified
fn tree<F: FnOnce(Folder) -> Folder>(modify: F) -> Vec<Content> {
    let root = Folder::new("Level1", || {
        vec![
            leaf("one.txt"),
            Folder::new("Level2", || {
                vec![
                    leaf("two.txt"),
                    Folder::new("Level3", || vec![leaf("three.txt")]).into(),
                ]
            })
            .into(),
        ]
    });
    vec![modify(root).into()]
}

const LEAVES: [&[&str]; 3] = [
    &["Level1", "one.txt"],
    &["Level1", "Level2", "two.txt"],
    &["Level1", "Level2", "Level3", "three.txt"],
];

const FOLDERS: [&[&str]; 2] = [&["Level1", "Level2"], &["Level1", "Level2", "Level3"]];

fn reflections<'a>(test: &'a TestPublisher, key: &str, identities: &[&[&str]]) -> Vec<&'a Reflection> {
    let key = CacheKey::reflected(key);
    identities
        .iter()
        .map(|identity| {
            let identity: Vec<String> = identity.iter().map(|s| s.to_string()).collect();
            let id = test.publisher.cache().lookup(&key, &identity).unwrap();
            test.publisher.reflection(id).unwrap()
        })
        .collect()
}

fn leaf_removal(test: &TestPublisher, key: &str) -> Vec<RemovalMethod> {
    reflections(test, key, &LEAVES)
        .into_iter()
        .map(removal_of)
        .collect()
}

fn removal_of(reflection: &Reflection) -> RemovalMethod {
    reflection.traits().removal_method()
}

#[test]
fn test_root_override_reaches_every_leaf() {
    let mut test = TestPublisher::new();
    test.publisher
        .reflect("tree", || nested(Some(RemovalMethod::Delete)))
        .unwrap();

    for method in leaf_removal(&test, "tree") {
        assert_eq!(method, RemovalMethod::Delete);
    }
    assert!(test.path("Level1/Level2/Level3/three.txt").exists());
}

#[test]
fn test_default_applies_without_override() {
    let mut test = TestPublisher::new();
    test.publisher.reflect("tree", || nested(None)).unwrap();

    for method in leaf_removal(&test, "tree") {
        assert_eq!(method, RemovalMethod::Trash);
    }
}

#[test]
fn test_resolved_traits_do_not_revert_on_refresh() {
    let mut test = TestPublisher::new();
    test.publisher
        .reflect("tree", || nested(Some(RemovalMethod::Delete)))
        .unwrap();
    test.publisher.refresh("tree", || nested(None)).unwrap();

    for method in leaf_removal(&test, "tree") {
        assert_eq!(method, RemovalMethod::Delete);
    }
}

#[test]
fn test_root_observation_override_reaches_every_descendant() {
    let mut test = TestPublisher::new();
    test.publisher
        .reflect("quiet", || tree(|root| root.observable(false).recursive(false)))
        .unwrap();

    for reflection in reflections(&test, "quiet", &LEAVES) {
        assert!(!reflection.traits().is_observable(), "{}", reflection.path().display());
        assert!(!reflection.traits().is_recursive(), "{}", reflection.path().display());
    }
    for reflection in reflections(&test, "quiet", &FOLDERS) {
        assert!(!reflection.traits().is_observable());
        assert!(!reflection.traits().is_recursive());
    }
}

#[test]
fn test_kind_defaults_stay_with_their_node() {
    let mut test = TestPublisher::new();
    test.publisher.reflect("plain", || nested(None)).unwrap();

    for reflection in reflections(&test, "plain", &LEAVES) {
        assert!(reflection.traits().is_observable());
        assert!(!reflection.traits().is_recursive());
        assert_eq!(reflection.traits().entry_kind(), EntryKind::File);
    }
    for reflection in reflections(&test, "plain", &FOLDERS) {
        assert!(!reflection.traits().is_observable());
        assert!(reflection.traits().is_recursive());
        assert_eq!(reflection.traits().entry_kind(), EntryKind::Folder);
    }
}

#[test]
fn test_local_override_wins_over_ancestor() {
    let mut test = TestPublisher::new();
    test.publisher
        .reflect("tree", || {
            vec![Folder::new("Docs", || {
                vec![
                    Value::named("kept.txt", TextCodec)
                        .default_value(String::new())
                        .removal(RemovalMethod::Trash)
                        .into(),
                    leaf("scratch.txt"),
                ]
            })
            .removal(RemovalMethod::Delete)
            .into()]
        })
        .unwrap();

    let key = CacheKey::reflected("tree");
    let method = |name: &str| {
        let identity = vec!["Docs".to_string(), name.to_string()];
        let id = test.publisher.cache().lookup(&key, &identity).unwrap();
        removal_of(test.publisher.reflection(id).unwrap())
    };
    assert_eq!(method("kept.txt"), RemovalMethod::Trash);
    assert_eq!(method("scratch.txt"), RemovalMethod::Delete);
}

#[test]
fn test_group_passes_declared_type_to_members() {
    let mut test = TestPublisher::new();
    test.publisher
        .reflect("typed", || {
            vec![Group::new(|| {
                vec![
                    Value::named("readme", TextCodec)
                        .default_value(String::new())
                        .into(),
                    Value::named("changelog", TextCodec)
                        .default_value(String::new())
                        .into(),
                ]
            })
            .declared_type(FileType::MARKDOWN)
            .into()]
        })
        .unwrap();

    assert!(test.path("readme.md").exists());
    assert!(test.path("changelog.md").exists());
}

//! Typed access through aliases

use super::test_utils::{ErrorLog, TestPublisher};
use mirrorfs::{
    Alias, Content, FileType, Folder, JsonCodec, Modifiers, PublicContent, RemovalMethod,
    Repeater, TextCodec, Value,
};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    title: String,
    pinned: bool,
}

impl Note {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            pinned: false,
        }
    }
}

struct Notebook {
    titles: Vec<String>,
    notes: Alias<JsonCodec<Note>>,
    index: Alias<TextCodec>,
    log: ErrorLog,
}

impl Notebook {
    fn new(titles: &[&str]) -> Self {
        Self {
            titles: titles.iter().map(|t| t.to_string()).collect(),
            notes: Alias::default(),
            index: Alias::default(),
            log: ErrorLog::default(),
        }
    }
}

impl PublicContent for Notebook {
    fn content(&self) -> Vec<Content> {
        let titles = self.titles.clone();
        let notes = self.notes.clone();
        let index = self.index.clone();
        let handler = self.log.handler();
        vec![Folder::new("Notebook", move || {
            vec![
                Value::named("index", TextCodec)
                    .default_value(String::new())
                    .declared_type(FileType::PLAIN_TEXT)
                    .alias(&index)
                    .into(),
                Folder::new("Notes", {
                    let titles = titles.clone();
                    let notes = notes.clone();
                    move || {
                        vec![Repeater::new(
                            titles.clone(),
                            |title| title.clone(),
                            |title| {
                                Value::new(JsonCodec::<Note>::new())
                                    .default_value(Note::new(title))
                                    .into()
                            },
                        )
                        .declared_type(FileType::JSON)
                        .alias(&notes)
                        .into()]
                    }
                })
                .into(),
            ]
        })
        .on_error(handler)
        .into()]
    }
}

#[test]
fn test_get_and_set_leaf() {
    let mut test = TestPublisher::new();
    let book = test
        .publisher
        .materialize_value("book", Notebook::new(&[]))
        .unwrap();

    assert_eq!(test.publisher.get(&book.index), Some(String::new()));
    assert!(test.publisher.set(&book.index, Some("a\nb".to_string())));
    assert_eq!(test.publisher.get(&book.index), Some("a\nb".to_string()));
    assert_eq!(
        fs::read_to_string(test.path("Notebook/index.txt")).unwrap(),
        "a\nb"
    );
}

#[test]
fn test_missing_entry_reads_as_none() {
    let mut test = TestPublisher::new();
    let book = test
        .publisher
        .materialize_value("book", Notebook::new(&[]))
        .unwrap();

    fs::remove_file(test.path("Notebook/index.txt")).unwrap();
    assert_eq!(test.publisher.get(&book.index), None);
    assert!(book.log.messages().is_empty());
}

#[test]
fn test_identity_addressed_access() {
    let mut test = TestPublisher::new();
    let book = test
        .publisher
        .materialize_value("book", Notebook::new(&["groceries", "ideas"]))
        .unwrap();

    assert_eq!(
        test.publisher.get_id(&book.notes, "ideas"),
        Some(Note::new("ideas"))
    );
    assert_eq!(test.publisher.get_id(&book.notes, "unknown"), None);

    let pinned = Note {
        title: "travel".to_string(),
        pinned: true,
    };
    assert!(test
        .publisher
        .set_id(&book.notes, "travel", Some(pinned.clone())));
    assert!(test.path("Notebook/Notes/travel.json").exists());

    let all = test.publisher.get_all(&book.notes);
    let ids: Vec<&str> = all.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    for id in ["groceries", "ideas", "travel"] {
        assert!(ids.contains(&id));
    }
    assert!(all.contains(&("travel".to_string(), pinned)));
}

#[test]
fn test_remove_id_touches_only_that_sibling() {
    let mut test = TestPublisher::new();
    let book = test
        .publisher
        .materialize_value("book", Notebook::new(&["a", "b"]))
        .unwrap();

    let trashed = test.publisher.remove_id(&book.notes, "a").unwrap();
    assert_eq!(test.trash_files(), vec![trashed.clone()]);
    let note: Note = serde_json::from_slice(&fs::read(&trashed).unwrap()).unwrap();
    assert_eq!(note, Note::new("a"));
    assert!(!test.path("Notebook/Notes/a.json").exists());
    assert!(test.path("Notebook/Notes/b.json").exists());

    assert_eq!(test.publisher.remove_id(&book.notes, "a"), None);
}

#[test]
fn test_set_id_none_removes_sibling() {
    let mut test = TestPublisher::new();
    let book = test
        .publisher
        .materialize_value("book", Notebook::new(&["a"]))
        .unwrap();

    assert!(test.publisher.set_id(&book.notes, "a", None));
    assert!(!test.path("Notebook/Notes/a.json").exists());
}

#[test]
fn test_decode_failure_is_reported() {
    let mut test = TestPublisher::new();
    let book = test
        .publisher
        .materialize_value("book", Notebook::new(&["broken"]))
        .unwrap();

    fs::write(test.path("Notebook/Notes/broken.json"), "{ not json").unwrap();
    assert_eq!(test.publisher.get_id(&book.notes, "broken"), None);

    let messages = book.log.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Decoding failed"));
    assert!(messages[0].contains("broken.json"));
}

#[test]
fn test_explicit_delete_and_trash() {
    let mut test = TestPublisher::new();
    let book = test
        .publisher
        .materialize_value("book", Notebook::new(&[]))
        .unwrap();
    let index = test.path("Notebook/index.txt");

    assert!(test.publisher.delete(&book.index));
    assert!(!index.exists());
    assert!(test.trash_files().is_empty());
    assert!(!test.publisher.delete(&book.index));

    assert!(test.publisher.set(&book.index, Some("again".to_string())));
    assert!(test.publisher.trash(&book.index));
    assert!(!index.exists());
    assert_eq!(test.trash_files().len(), 1);
}

#[test]
fn test_sibling_removal_follows_removal_method() {
    let mut test = TestPublisher::new();
    let notes: Alias<JsonCodec<Note>> = Alias::default();
    let bound = notes.clone();
    test.publisher
        .reflect("deleting", move || {
            vec![Repeater::new(
                vec!["x".to_string()],
                |key| key.clone(),
                |key| {
                    Value::new(JsonCodec::<Note>::new())
                        .default_value(Note::new(key))
                        .into()
                },
            )
            .declared_type(FileType::JSON)
            .removal(RemovalMethod::Delete)
            .alias(&bound)
            .into()]
        })
        .unwrap();

    let removed = test.publisher.remove_id(&notes, "x").unwrap();
    assert_eq!(removed, test.path("x.json"));
    assert!(!removed.exists());
    assert!(test.trash_files().is_empty());
}

//! Removal through the trash or by deletion

use super::test_utils::{ErrorLog, TestPublisher};
use mirrorfs::{Alias, Content, Modifiers, PublicContent, RemovalMethod, TextCodec, Value};
use std::fs;

#[derive(Default)]
struct Drafts {
    kept: Alias<TextCodec>,
    scratch: Alias<TextCodec>,
}

impl PublicContent for Drafts {
    fn content(&self) -> Vec<Content> {
        vec![
            Value::named("kept.txt", TextCodec)
                .default_value("keep me".to_string())
                .alias(&self.kept)
                .into(),
            Value::named("scratch.txt", TextCodec)
                .default_value("throwaway".to_string())
                .removal(RemovalMethod::Delete)
                .alias(&self.scratch)
                .into(),
        ]
    }
}

#[test]
fn test_trashed_entry_is_recoverable() {
    let mut test = TestPublisher::new();
    let drafts = test.publisher.materialize::<Drafts>("drafts").unwrap();
    let kept = test.path("kept.txt");

    assert!(test.publisher.remove(&drafts.kept));
    assert!(!kept.exists());

    let trashed = test.publisher.recovery_path(&drafts.kept).unwrap();
    let entry = test.publisher.recovery(&drafts.kept).unwrap();
    assert_eq!(entry.trashed_path, trashed);
    assert_eq!(entry.original_path.file_name().unwrap(), "kept.txt");
    assert!(entry.deleted_at.is_some());
    assert_eq!(test.trash_files(), vec![trashed]);

    assert!(test.publisher.recover(&drafts.kept));
    assert_eq!(fs::read_to_string(&kept).unwrap(), "keep me");
    assert_eq!(test.publisher.recovery_path(&drafts.kept), None);
    assert!(test.trash_files().is_empty());
}

#[test]
fn test_trash_listing_is_scoped_to_content_root() {
    let mut first = TestPublisher::new();
    let mut second = TestPublisher::new();
    let a = first.publisher.materialize::<Drafts>("drafts").unwrap();
    let b = second.publisher.materialize::<Drafts>("drafts").unwrap();

    assert!(first.publisher.trash(&a.kept));
    assert_eq!(first.trash_files().len(), 1);
    assert!(second.trash_files().is_empty());

    assert!(second.publisher.trash(&b.kept));
    assert_eq!(first.publisher.trash_store().purge().unwrap(), 1);
    assert!(first.trash_files().is_empty());
    assert_eq!(second.trash_files().len(), 1);
}

#[test]
fn test_deleted_entry_has_no_recovery_handle() {
    let mut test = TestPublisher::new();
    let drafts = test.publisher.materialize::<Drafts>("drafts").unwrap();

    assert!(test.publisher.set(&drafts.scratch, None));
    assert!(!test.path("scratch.txt").exists());
    assert_eq!(test.publisher.recovery_path(&drafts.scratch), None);
    assert!(test.trash_files().is_empty());
    assert!(!test.publisher.recover(&drafts.scratch));
}

#[test]
fn test_removing_missing_entry_returns_false() {
    let mut test = TestPublisher::new();
    let drafts = test.publisher.materialize::<Drafts>("drafts").unwrap();

    fs::remove_file(test.path("kept.txt")).unwrap();
    assert!(!test.publisher.remove(&drafts.kept));
    assert!(test.trash_files().is_empty());
}

#[test]
fn test_same_name_trashed_twice_is_kept_apart() {
    let mut test = TestPublisher::new();
    let drafts = test.publisher.materialize::<Drafts>("drafts").unwrap();

    assert!(test.publisher.trash(&drafts.kept));
    let first = test.publisher.recovery_path(&drafts.kept).unwrap();
    assert!(test.publisher.set(&drafts.kept, Some("second".to_string())));
    assert!(test.publisher.trash(&drafts.kept));
    let second = test.publisher.recovery_path(&drafts.kept).unwrap();

    assert_ne!(first, second);
    assert_eq!(fs::read_to_string(&first).unwrap(), "keep me");
    assert_eq!(fs::read_to_string(&second).unwrap(), "second");
    assert_eq!(test.trash_files().len(), 2);
}

#[test]
fn test_recover_over_existing_entry_is_reported() {
    let mut test = TestPublisher::new();
    let log = ErrorLog::default();
    test.publisher.set_default_handler(log.handler());
    let drafts = test.publisher.materialize::<Drafts>("drafts").unwrap();

    assert!(test.publisher.trash(&drafts.kept));
    fs::write(test.path("kept.txt"), "replacement").unwrap();

    assert!(!test.publisher.recover(&drafts.kept));
    assert!(test.publisher.recovery_path(&drafts.kept).is_some());
    let messages = log.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("cannot recover over existing entry"));
}

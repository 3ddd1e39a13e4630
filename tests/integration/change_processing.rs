//! External changes detected through the observer

use super::test_utils::TestPublisher;
use mirrorfs::{
    Alias, CacheKey, ChangeKind, Content, FileType, Folder, Modifiers, PublicContent, TextCodec,
    Value,
};
use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind};
use notify::{Event, EventKind};
use std::fs;
use std::path::PathBuf;

#[derive(Default)]
struct Settings {
    settings: Alias<TextCodec>,
    quiet: Alias<TextCodec>,
}

impl PublicContent for Settings {
    fn content(&self) -> Vec<Content> {
        let settings = self.settings.clone();
        let quiet = self.quiet.clone();
        vec![Folder::new("Config", move || {
            vec![
                Value::named("settings", TextCodec)
                    .default_value("theme = dark".to_string())
                    .declared_type(FileType::TOML)
                    .alias(&settings)
                    .into(),
                Value::named("quiet", TextCodec)
                    .default_value(String::new())
                    .declared_type(FileType::PLAIN_TEXT)
                    .observable(false)
                    .alias(&quiet)
                    .into(),
            ]
        })
        .into()]
    }
}

fn event(kind: EventKind, path: PathBuf) -> notify::Result<Event> {
    Ok(Event::new(kind).add_path(path))
}

fn modified(path: PathBuf) -> notify::Result<Event> {
    event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), path)
}

#[test]
fn test_external_edit_is_reported() {
    let mut test = TestPublisher::new();
    let settings = test.publisher.materialize::<Settings>("app").unwrap();
    let receiver = test.publisher.subscribe();
    let path = test.path("Config/settings.toml");

    fs::write(&path, "theme = light").unwrap();
    test.publisher.event_sender().send(modified(path.clone())).unwrap();
    let notices = test.publisher.process_changes();

    assert_eq!(notices.len(), 1);
    let notice = &notices[0];
    assert_eq!(notice.kind, ChangeKind::Modified);
    assert_eq!(notice.path, path);
    assert_eq!(notice.key, CacheKey::of::<Settings>("app"));
    assert_eq!(Some(notice.reflection), settings.settings.reflection());
    assert_eq!(receiver.try_recv().unwrap(), *notice);
    assert_eq!(
        test.publisher.get(&settings.settings),
        Some("theme = light".to_string())
    );
}

#[test]
fn test_event_without_content_change_is_silent() {
    let mut test = TestPublisher::new();
    test.publisher.materialize::<Settings>("app").unwrap();
    let path = test.path("Config/settings.toml");

    test.publisher.event_sender().send(modified(path)).unwrap();
    assert!(test.publisher.process_changes().is_empty());
}

#[test]
fn test_removal_and_recreation() {
    let mut test = TestPublisher::new();
    test.publisher.materialize::<Settings>("app").unwrap();
    let path = test.path("Config/settings.toml");
    let sender = test.publisher.event_sender();

    fs::remove_file(&path).unwrap();
    sender
        .send(event(EventKind::Remove(RemoveKind::File), path.clone()))
        .unwrap();
    let removed = test.publisher.process_changes();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].kind, ChangeKind::Removed);

    fs::write(&path, "theme = dark").unwrap();
    sender
        .send(event(EventKind::Create(CreateKind::File), path))
        .unwrap();
    let created = test.publisher.process_changes();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].kind, ChangeKind::Created);
}

#[test]
fn test_set_notifies_subscribers() {
    let mut test = TestPublisher::new();
    let settings = test.publisher.materialize::<Settings>("app").unwrap();
    let receiver = test.publisher.subscribe();

    assert!(test
        .publisher
        .set(&settings.settings, Some("theme = solarized".to_string())));
    let notice = receiver.try_recv().unwrap();
    assert_eq!(notice.kind, ChangeKind::Modified);

    assert!(test.publisher.set(&settings.settings, None));
    assert_eq!(receiver.try_recv().unwrap().kind, ChangeKind::Removed);
    assert!(receiver.try_recv().is_err());
}

#[test]
fn test_unobserved_and_temporary_paths_are_ignored() {
    let mut test = TestPublisher::new();
    let settings = test.publisher.materialize::<Settings>("app").unwrap();
    let quiet = test.path("Config/quiet.txt");
    let temporary = test.path("Config/settings.toml.tmp");

    let quiet_id = settings.quiet.reflection().unwrap();
    assert!(!test.publisher.observer().is_observing(quiet_id));
    assert!(test
        .publisher
        .observer()
        .is_observing(settings.settings.reflection().unwrap()));

    fs::write(&temporary, "partial").unwrap();
    let sender = test.publisher.event_sender();
    sender
        .send(event(EventKind::Create(CreateKind::File), temporary))
        .unwrap();
    assert!(test.publisher.process_changes().is_empty());

    fs::write(&quiet, "edited").unwrap();
    sender.send(modified(quiet)).unwrap();
    assert!(test.publisher.process_changes().is_empty());
}

#[test]
fn test_dropped_subscribers_are_pruned() {
    let mut test = TestPublisher::new();
    let settings = test.publisher.materialize::<Settings>("app").unwrap();
    drop(test.publisher.subscribe());
    let receiver = test.publisher.subscribe();

    test.publisher
        .set(&settings.settings, Some("theme = light".to_string()));
    assert_eq!(receiver.try_recv().unwrap().kind, ChangeKind::Modified);
}

#[test]
fn test_invalidated_mirror_stops_observing() {
    let mut test = TestPublisher::new();
    let settings = test.publisher.materialize::<Settings>("app").unwrap();
    let id = settings.settings.reflection().unwrap();

    let released = test.publisher.invalidate(&CacheKey::of::<Settings>("app"));
    assert!(released.contains(&id));
    assert!(!test.publisher.observer().is_observing(id));
    assert!(test.publisher.observer().watched_directories().is_empty());

    let path = test.path("Config/settings.toml");
    fs::write(&path, "theme = light").unwrap();
    test.publisher.event_sender().send(modified(path)).unwrap();
    assert!(test.publisher.process_changes().is_empty());
}

//! Trash store
//!
//! Removals go to the platform trash through the `trash` crate. Each trashed entry is
//! matched back to its [`trash::TrashItem`], which becomes the recovery handle a reflection
//! keeps. A [`Trash`] is scoped to the content root: listing and purging only touch entries
//! whose original location was inside it.

use crate::error::MirrorError;
use crate::fs::FileSystem;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A trashed entry and the handle needed to restore it
#[derive(Debug, Clone)]
pub struct TrashedEntry {
    item: trash::TrashItem,
    pub trashed_path: PathBuf,
    pub original_path: PathBuf,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TrashedEntry {
    fn from_item(item: trash::TrashItem) -> Self {
        Self {
            trashed_path: location(&item),
            original_path: item.original_parent.join(&item.name),
            deleted_at: DateTime::from_timestamp(item.time_deleted, 0),
            item,
        }
    }

    /// Platform identifier of the trash record
    pub fn id(&self) -> &OsString {
        &self.item.id
    }
}

#[derive(Debug, Clone)]
pub struct Trash {
    scope: PathBuf,
}

impl Trash {
    pub fn new(scope: impl Into<PathBuf>) -> Self {
        Self {
            scope: scope.into(),
        }
    }

    /// Directory whose entries this store lists and purges
    pub fn scope(&self) -> &Path {
        &self.scope
    }

    /// Move `path` to the trash and return its handle
    ///
    /// Returns `None` when the entry was trashed but the platform can't enumerate the
    /// trash, so no recovery handle exists.
    pub fn put(&self, path: &Path) -> Result<Option<TrashedEntry>, MirrorError> {
        let (parent, name) = split(path)?;
        let before: HashSet<OsString> = matching(&parent, &name)?
            .into_iter()
            .map(|item| item.id)
            .collect();

        trash::delete(path).map_err(|e| MirrorError::trash(path, e))?;

        let handle = matching(&parent, &name)?
            .into_iter()
            .filter(|item| !before.contains(&item.id))
            .max_by_key(|item| item.time_deleted)
            .map(TrashedEntry::from_item);
        match &handle {
            Some(entry) => {
                debug!(from = %path.display(), to = %entry.trashed_path.display(), "Moved entry to trash")
            }
            None => warn!(path = %path.display(), "Trashed entry has no recovery handle"),
        }
        Ok(handle)
    }

    /// Move a trashed entry back to its original path
    pub fn restore(
        &self,
        fs: &dyn FileSystem,
        entry: &TrashedEntry,
    ) -> Result<PathBuf, MirrorError> {
        if fs.exists(&entry.original_path) {
            return Err(MirrorError::InvalidTransaction(format!(
                "cannot recover over existing entry {}",
                entry.original_path.display()
            )));
        }
        if let Some(parent) = entry.original_path.parent() {
            fs.create_dir_all(parent)
                .map_err(|e| MirrorError::io("recover", parent, e))?;
        }
        platform::restore(vec![entry.item.clone()])
            .map_err(|e| MirrorError::trash(&entry.original_path, e))?;
        debug!(to = %entry.original_path.display(), "Recovered entry from trash");
        Ok(entry.original_path.clone())
    }

    /// Every trashed entry that came from inside the scope, oldest first
    pub fn list(&self) -> Result<Vec<TrashedEntry>, MirrorError> {
        let scope = dunce::canonicalize(&self.scope).unwrap_or_else(|_| self.scope.clone());
        let mut entries: Vec<TrashedEntry> = platform::list()
            .map_err(|e| MirrorError::trash(&self.scope, e))?
            .into_iter()
            .filter(|item| item.original_parent.starts_with(&scope))
            .map(TrashedEntry::from_item)
            .collect();
        entries.sort_by_key(|entry| entry.deleted_at);
        Ok(entries)
    }

    /// Permanently remove every trashed entry that came from inside the scope
    pub fn purge(&self) -> Result<usize, MirrorError> {
        let items: Vec<trash::TrashItem> =
            self.list()?.into_iter().map(|entry| entry.item).collect();
        let count = items.len();
        if count > 0 {
            platform::purge(items).map_err(|e| MirrorError::trash(&self.scope, e))?;
        }
        Ok(count)
    }
}

/// Canonical parent directory and file name, as the trash records them
fn split(path: &Path) -> Result<(PathBuf, OsString), MirrorError> {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return Err(MirrorError::InvalidTransaction(format!(
            "{} cannot be trashed",
            path.display()
        )));
    };
    let parent = dunce::canonicalize(parent).map_err(|e| MirrorError::io("trash", parent, e))?;
    Ok((parent, name.to_os_string()))
}

fn matching(parent: &Path, name: &OsString) -> Result<Vec<trash::TrashItem>, MirrorError> {
    let items = platform::list().map_err(|e| MirrorError::trash(parent, e))?;
    Ok(items
        .into_iter()
        .filter(|item| item.original_parent.as_path() == parent && &item.name == name)
        .collect())
}

/// Where the trashed entry's contents live
#[cfg(all(unix, not(target_os = "macos"), not(target_os = "ios"), not(target_os = "android")))]
fn location(item: &trash::TrashItem) -> PathBuf {
    // The id is the `info/<name>.trashinfo` record; contents sit in the sibling `files/`.
    let info = Path::new(&item.id);
    match (info.parent().and_then(Path::parent), info.file_stem()) {
        (Some(root), Some(stem)) => root.join("files").join(stem),
        _ => info.to_path_buf(),
    }
}

#[cfg(not(all(unix, not(target_os = "macos"), not(target_os = "ios"), not(target_os = "android"))))]
fn location(item: &trash::TrashItem) -> PathBuf {
    PathBuf::from(&item.id)
}

#[cfg(any(
    target_os = "windows",
    all(unix, not(target_os = "macos"), not(target_os = "ios"), not(target_os = "android"))
))]
mod platform {
    pub fn list() -> Result<Vec<trash::TrashItem>, trash::Error> {
        trash::os_limited::list()
    }

    pub fn restore(items: Vec<trash::TrashItem>) -> Result<(), trash::Error> {
        trash::os_limited::restore_all(items)
    }

    pub fn purge(items: Vec<trash::TrashItem>) -> Result<(), trash::Error> {
        trash::os_limited::purge_all(items)
    }
}

#[cfg(not(any(
    target_os = "windows",
    all(unix, not(target_os = "macos"), not(target_os = "ios"), not(target_os = "android"))
)))]
mod platform {
    fn unsupported() -> trash::Error {
        trash::Error::Unknown {
            description: "the trash can't be enumerated on this platform".to_string(),
        }
    }

    pub fn list() -> Result<Vec<trash::TrashItem>, trash::Error> {
        Ok(Vec::new())
    }

    pub fn restore(_items: Vec<trash::TrashItem>) -> Result<(), trash::Error> {
        Err(unsupported())
    }

    pub fn purge(_items: Vec<trash::TrashItem>) -> Result<(), trash::Error> {
        Err(unsupported())
    }
}

#[cfg(all(
    test,
    any(
        target_os = "windows",
        all(unix, not(target_os = "macos"), not(target_os = "ios"), not(target_os = "android"))
    )
))]
mod tests {
    use super::*;
    use crate::fs::LocalFileSystem;
    use tempfile::TempDir;

    struct Scoped {
        dir: TempDir,
        trash: Trash,
    }

    impl Scoped {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let trash = Trash::new(dir.path());
            Self { dir, trash }
        }
    }

    impl Drop for Scoped {
        fn drop(&mut self) {
            let _ = self.trash.purge();
        }
    }

    #[test]
    fn test_put_and_restore() {
        let scoped = Scoped::new();
        let path = scoped.dir.path().join("README.md");
        std::fs::write(&path, "# Contents").unwrap();

        let entry = scoped.trash.put(&path).unwrap().unwrap();
        assert!(!path.exists());
        assert_eq!(std::fs::read_to_string(&entry.trashed_path).unwrap(), "# Contents");
        assert_eq!(entry.original_path.file_name().unwrap(), "README.md");
        assert!(entry.deleted_at.is_some());
        assert_eq!(scoped.trash.list().unwrap().len(), 1);

        let restored = scoped.trash.restore(&LocalFileSystem, &entry).unwrap();
        assert_eq!(std::fs::read_to_string(&restored).unwrap(), "# Contents");
        assert!(path.exists());
        assert!(scoped.trash.list().unwrap().is_empty());
    }

    #[test]
    fn test_same_name_gets_distinct_handles() {
        let scoped = Scoped::new();
        let path = scoped.dir.path().join("notes.txt");

        std::fs::write(&path, "one").unwrap();
        let first = scoped.trash.put(&path).unwrap().unwrap();
        std::fs::write(&path, "two").unwrap();
        let second = scoped.trash.put(&path).unwrap().unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(std::fs::read_to_string(&first.trashed_path).unwrap(), "one");
        assert_eq!(std::fs::read_to_string(&second.trashed_path).unwrap(), "two");
        assert_eq!(scoped.trash.list().unwrap().len(), 2);
    }

    #[test]
    fn test_restore_refuses_to_overwrite() {
        let scoped = Scoped::new();
        let path = scoped.dir.path().join("a.txt");
        std::fs::write(&path, "old").unwrap();
        let entry = scoped.trash.put(&path).unwrap().unwrap();
        std::fs::write(&path, "new").unwrap();

        let err = scoped.trash.restore(&LocalFileSystem, &entry).unwrap_err();
        assert!(matches!(err, MirrorError::InvalidTransaction(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_trash_directory() {
        let scoped = Scoped::new();
        let folder = scoped.dir.path().join("Static");
        std::fs::create_dir_all(folder.join("inner")).unwrap();
        std::fs::write(folder.join("inner/file.txt"), "x").unwrap();

        let entry = scoped.trash.put(&folder).unwrap().unwrap();
        assert!(!folder.exists());
        assert!(entry.trashed_path.join("inner/file.txt").exists());
    }

    #[test]
    fn test_list_is_scoped_and_purge_empties_it() {
        let scoped = Scoped::new();
        let other = Scoped::new();
        std::fs::write(scoped.dir.path().join("mine.txt"), "x").unwrap();
        std::fs::write(other.dir.path().join("theirs.txt"), "y").unwrap();
        scoped.trash.put(&scoped.dir.path().join("mine.txt")).unwrap();
        other.trash.put(&other.dir.path().join("theirs.txt")).unwrap();

        let listed = scoped.trash.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].original_path.ends_with("mine.txt"));

        assert_eq!(scoped.trash.purge().unwrap(), 1);
        assert!(scoped.trash.list().unwrap().is_empty());
        assert_eq!(other.trash.list().unwrap().len(), 1);
    }
}

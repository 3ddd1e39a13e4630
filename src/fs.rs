//! Filesystem access
//!
//! Every disk operation performed by the engine goes through [`FileSystem`], so the mirror
//! and reflections can be pointed at a wrapped or instrumented implementation.

use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use walkdir::WalkDir;

/// Extended attribute holding comma-separated tag names
pub const TAGS_XATTR: &str = "user.xdg.tags";

/// Suffix of in-flight atomic writes
pub const TEMP_SUFFIX: &str = ".tmp";

/// OS-reported facts about an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    pub is_dir: bool,
    pub len: u64,
    pub permissions: Option<u32>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub file_number: Option<u64>,
}

pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    /// Write through a temporary sibling and rename it into place
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
    /// Remove a file, or a directory and everything under it
    fn remove(&self, path: &Path) -> io::Result<()>;
    fn metadata(&self, path: &Path) -> io::Result<EntryMetadata>;
    fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()>;
    fn set_modified(&self, path: &Path, modified: DateTime<Utc>) -> io::Result<()>;
    /// Immediate children of a directory, sorted by file name
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
    fn tags(&self, path: &Path) -> io::Result<Option<Vec<String>>>;
}

/// The host filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let temp_path = temp_sibling(path);
        std::fs::write(&temp_path, bytes)?;
        if let Err(err) = std::fs::rename(&temp_path, path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(err);
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        }
    }

    fn metadata(&self, path: &Path) -> io::Result<EntryMetadata> {
        let metadata = std::fs::metadata(path)?;
        Ok(EntryMetadata {
            is_dir: metadata.is_dir(),
            len: metadata.len(),
            permissions: permissions_of(&metadata),
            created: metadata.created().ok().map(DateTime::<Utc>::from),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            file_number: file_number_of(&metadata),
        })
    }

    #[cfg(unix)]
    fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
    }

    #[cfg(not(unix))]
    fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut permissions = std::fs::metadata(path)?.permissions();
        permissions.set_readonly(mode & 0o200 == 0);
        std::fs::set_permissions(path, permissions)
    }

    fn set_modified(&self, path: &Path, modified: DateTime<Utc>) -> io::Result<()> {
        let time = filetime::FileTime::from_system_time(modified.into());
        filetime::set_file_mtime(path, time)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut children = Vec::new();
        for entry in WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(io::Error::other)?;
            children.push(entry.into_path());
        }
        Ok(children)
    }

    #[cfg(unix)]
    fn tags(&self, path: &Path) -> io::Result<Option<Vec<String>>> {
        let Some(raw) = xattr::get(path, TAGS_XATTR)? else {
            return Ok(None);
        };
        let tags = String::from_utf8_lossy(&raw)
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(String::from)
            .collect();
        Ok(Some(tags))
    }

    #[cfg(not(unix))]
    fn tags(&self, _path: &Path) -> io::Result<Option<Vec<String>>> {
        Ok(None)
    }
}

/// Path used for the in-flight half of an atomic write
pub fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

#[cfg(unix)]
fn permissions_of(metadata: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn permissions_of(_metadata: &std::fs::Metadata) -> Option<u32> {
    None
}

#[cfg(unix)]
fn file_number_of(metadata: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn file_number_of(_metadata: &std::fs::Metadata) -> Option<u64> {
    None
}

/// Operation counters kept by [`CountingFileSystem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationCounts {
    pub reads: usize,
    pub writes: usize,
    pub lookups: usize,
}

impl OperationCounts {
    pub fn total(&self) -> usize {
        self.reads + self.writes + self.lookups
    }
}

/// Wraps another filesystem and counts the calls made through it.
///
/// Reads cover file and directory reads, writes cover every mutation, and lookups cover
/// existence and metadata queries.
#[derive(Debug, Default)]
pub struct CountingFileSystem<F = LocalFileSystem> {
    inner: F,
    reads: AtomicUsize,
    writes: AtomicUsize,
    lookups: AtomicUsize,
}

impl<F: FileSystem> CountingFileSystem<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn counts(&self) -> OperationCounts {
        OperationCounts {
            reads: self.reads.load(Ordering::SeqCst),
            writes: self.writes.load(Ordering::SeqCst),
            lookups: self.lookups.load(Ordering::SeqCst),
        }
    }

    pub fn reset(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
        self.lookups.store(0, Ordering::SeqCst);
    }

    fn read_op(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn write_op(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn lookup_op(&self) {
        self.lookups.fetch_add(1, Ordering::SeqCst);
    }
}

impl<F: FileSystem> FileSystem for CountingFileSystem<F> {
    fn exists(&self, path: &Path) -> bool {
        self.lookup_op();
        self.inner.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.lookup_op();
        self.inner.is_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.write_op();
        self.inner.create_dir_all(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.read_op();
        self.inner.read(path)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        self.write_op();
        self.inner.write_atomic(path, bytes)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.write_op();
        self.inner.remove(path)
    }

    fn metadata(&self, path: &Path) -> io::Result<EntryMetadata> {
        self.lookup_op();
        self.inner.metadata(path)
    }

    fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.write_op();
        self.inner.set_permissions(path, mode)
    }

    fn set_modified(&self, path: &Path, modified: DateTime<Utc>) -> io::Result<()> {
        self.write_op();
        self.inner.set_modified(path, modified)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        self.read_op();
        self.inner.read_dir(path)
    }

    fn tags(&self, path: &Path) -> io::Result<Option<Vec<String>>> {
        self.lookup_op();
        self.inner.tags(path)
    }
}

impl<F: FileSystem + ?Sized> FileSystem for std::sync::Arc<F> {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        (**self).is_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        (**self).create_dir_all(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read(path)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        (**self).write_atomic(path, bytes)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        (**self).remove(path)
    }

    fn metadata(&self, path: &Path) -> io::Result<EntryMetadata> {
        (**self).metadata(path)
    }

    fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()> {
        (**self).set_permissions(path, mode)
    }

    fn set_modified(&self, path: &Path, modified: DateTime<Utc>) -> io::Result<()> {
        (**self).set_modified(path, modified)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        (**self).read_dir(path)
    }

    fn tags(&self, path: &Path) -> io::Result<Option<Vec<String>>> {
        (**self).tags(path)
    }
}

//! Reflection
//!
//! The live binding between one content node and a filesystem path. A reflection holds the
//! node's merged configuration bags, its resolved name and path, and the erased structure
//! used to write the node's default. All disk access goes through a [`Context`].
//!
//! Recoverable failures are routed to the reflection's error handler (or the publisher's
//! default handler) and the operation returns a safe default. Path resolution failures
//! panic.

pub mod family;
pub mod naming;

use crate::content::Structure;
use crate::error::{path_resolution, ErrorHandler, MirrorError};
use crate::fs::FileSystem;
use crate::trash::{Trash, TrashedEntry};
use crate::values::attributes::{DateModifiedKey, ExtensionKey, NameKey, PathKey};
use crate::values::{Attributes, CreateMethod, EntryKind, RemovalMethod, Resources, Traits};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// Generational arena address of a reflection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReflectionId {
    index: u32,
    generation: u32,
}

impl ReflectionId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ReflectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectionKind {
    Value,
    Folder,
    Group,
    Repeater,
}

impl ReflectionKind {
    /// Whether the reflection contributes a path segment
    pub fn has_path(&self) -> bool {
        matches!(self, ReflectionKind::Value | ReflectionKind::Folder)
    }
}

/// Observed state of an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    Unknown,
    Absent,
    /// Present, with a BLAKE3 fingerprint for files
    Present(Option<[u8; 32]>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// Collaborators a reflection needs for disk access
pub struct Context<'a> {
    pub fs: &'a dyn FileSystem,
    pub trash: &'a Trash,
    pub default_handler: &'a ErrorHandler,
}

pub struct Reflection {
    pub(crate) id: ReflectionId,
    pub(crate) kind: ReflectionKind,
    pub(crate) identity: Vec<String>,
    pub(crate) subject: &'static str,
    pub(crate) position: usize,
    pub(crate) parent: Option<ReflectionId>,
    pub(crate) directory: PathBuf,
    pub(crate) traits: Traits,
    pub(crate) attributes: Attributes,
    pub(crate) resources: Resources,
    /// Writable attributes applied to disk after creation
    pub(crate) requested: Attributes,
    pub(crate) structure: Option<Arc<dyn Structure>>,
    pub(crate) on_error: Option<ErrorHandler>,
    pub(crate) recovery: Option<TrashedEntry>,
    pub(crate) state: EntryState,
    /// Element of a repeater, removed when its identity vanishes on refresh
    pub(crate) repeated: bool,
    path: OnceLock<PathBuf>,
}

impl Reflection {
    pub(crate) fn new(
        id: ReflectionId,
        kind: ReflectionKind,
        identity: Vec<String>,
        directory: PathBuf,
    ) -> Self {
        Self {
            id,
            kind,
            identity,
            subject: "",
            position: 0,
            parent: None,
            directory,
            traits: Traits::new(),
            attributes: Attributes::new(),
            resources: Resources::new(),
            requested: Attributes::new(),
            structure: None,
            on_error: None,
            recovery: None,
            state: EntryState::Unknown,
            repeated: false,
            path: OnceLock::new(),
        }
    }

    pub fn id(&self) -> ReflectionId {
        self.id
    }

    pub fn kind(&self) -> ReflectionKind {
        self.kind
    }

    pub fn identity(&self) -> &[String] {
        &self.identity
    }

    /// Name of the value type bound to a leaf
    pub fn subject(&self) -> &'static str {
        self.subject
    }

    /// Position within the last build pass
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn parent(&self) -> Option<ReflectionId> {
        self.parent
    }

    pub fn traits(&self) -> &Traits {
        &self.traits
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Handle of the trashed entry after a trash removal
    pub fn recovery(&self) -> Option<&TrashedEntry> {
        self.recovery.as_ref()
    }

    /// Location of the entry inside the trash after a trash removal
    pub fn recovery_path(&self) -> Option<&Path> {
        self.recovery.as_ref().map(|entry| entry.trashed_path.as_path())
    }

    pub fn state(&self) -> &EntryState {
        &self.state
    }

    pub fn name(&self) -> Option<String> {
        self.attributes.name()
    }

    pub fn extension(&self) -> Option<String> {
        self.attributes.extension()
    }

    pub fn is_named(&self) -> bool {
        self.kind.has_path() && self.attributes.name().is_some()
    }

    /// Directory the entry lives in
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Directory children of this reflection live in
    pub fn container_directory(&self) -> PathBuf {
        match self.kind {
            ReflectionKind::Folder => self.path().to_path_buf(),
            _ => self.directory.clone(),
        }
    }

    /// Resolved path, computed on first access
    #[track_caller]
    pub fn path(&self) -> &Path {
        self.path.get_or_init(|| self.resolve_path())
    }

    #[track_caller]
    fn resolve_path(&self) -> PathBuf {
        if !self.kind.has_path() {
            return self.directory.clone();
        }
        let Some(name) = self.attributes.name() else {
            path_resolution(format!(
                "{:?} at {} has no name",
                self.kind,
                self.identity.join("/")
            ));
        };
        let file_name = naming::file_name(&name, self.attributes.extension().as_deref());
        if !naming::is_valid_segment(&file_name) {
            path_resolution(format!("{:?} is not a valid file name", file_name));
        }
        self.directory.join(file_name)
    }

    /// Set the name from a raw identity, splitting off any extension for files
    pub(crate) fn set_name(&mut self, raw: &str) {
        let (name, extension) = match self.kind {
            ReflectionKind::Value => naming::split(raw),
            _ => (naming::normalize(raw), None),
        };
        if self.attributes.name().as_deref() != Some(name.as_str())
            || self.attributes.extension() != extension
        {
            self.attributes.set::<NameKey>(Some(name));
            self.attributes.set::<ExtensionKey>(extension);
            self.invalidate_path();
        }
    }

    pub(crate) fn set_directory(&mut self, directory: PathBuf) {
        if self.directory != directory {
            self.directory = directory;
            self.invalidate_path();
        }
    }

    /// Resolve traits, then derive the extension from the declared type
    #[track_caller]
    pub(crate) fn resolve_traits(&mut self) {
        self.traits.resolve::<crate::values::traits::ObservableKey>();
        self.traits.resolve::<crate::values::traits::RemovalMethodKey>();
        self.traits.resolve::<crate::values::traits::CreateMethodKey>();

        let declared = self
            .traits
            .resolve::<crate::values::traits::DeclaredTypeKey>();
        let Some(file_type) = declared else {
            return;
        };
        let extension = match self.kind {
            ReflectionKind::Folder | ReflectionKind::Group => return,
            _ => match file_type.preferred_extension() {
                Some(ext) => ext.to_string(),
                None => path_resolution(format!("{} has no preferred extension", file_type)),
            },
        };
        if self.attributes.extension().as_deref() != Some(extension.as_str()) {
            self.attributes.set::<ExtensionKey>(Some(extension));
            self.invalidate_path();
        }
    }

    /// Record the resolved path as an attribute
    pub(crate) fn record_path(&mut self) {
        if self.is_named() {
            let path = self.path().to_path_buf();
            self.attributes.set::<PathKey>(Some(path));
        }
    }

    fn invalidate_path(&mut self) {
        self.path = OnceLock::new();
    }

    pub(crate) fn report(&self, ctx: &Context<'_>, error: MirrorError) {
        let handler = self.on_error.as_ref().unwrap_or(ctx.default_handler);
        handler(&error);
    }

    pub fn exists(&self, ctx: &Context<'_>) -> bool {
        self.is_named() && ctx.fs.exists(self.path())
    }

    /// Read the entry's bytes. A missing entry reads as `None` without an error.
    pub fn read(&self, ctx: &Context<'_>) -> Option<Vec<u8>> {
        read_path(self, ctx, self.path())
    }

    /// Write bytes atomically; `None` removes the entry
    pub fn write(&mut self, ctx: &Context<'_>, bytes: Option<Vec<u8>>) -> bool {
        let Some(bytes) = bytes else {
            return self.remove(ctx);
        };
        let path = self.path().to_path_buf();
        match ctx.fs.write_atomic(&path, &bytes) {
            Ok(()) => {
                trace!(path = %path.display(), bytes = bytes.len(), "Wrote entry");
                self.write_back(ctx);
                true
            }
            Err(err) => {
                self.report(ctx, MirrorError::io("write", &path, err));
                false
            }
        }
    }

    /// Write the default value when creation is automatic and the entry is missing
    pub fn create(&mut self, ctx: &Context<'_>) -> bool {
        match self.traits.create_method() {
            CreateMethod::Automatic => {}
        }
        let Some(structure) = self.structure.clone() else {
            return false;
        };
        if !self.is_named() || ctx.fs.exists(self.path()) {
            return false;
        }
        let Some(encoded) = structure.encode_default() else {
            return false;
        };
        let path = self.path().to_path_buf();
        match encoded {
            Ok(bytes) => {
                let created = self.write(ctx, Some(bytes));
                if created {
                    debug!(path = %path.display(), "Created entry from default");
                }
                created
            }
            Err(source) => {
                self.report(ctx, MirrorError::Encoding { path, source });
                false
            }
        }
    }

    /// Create the folder's directory if missing
    #[track_caller]
    pub fn create_directory(&mut self, ctx: &Context<'_>) -> bool {
        let path = self.path().to_path_buf();
        if ctx.fs.exists(&path) {
            if !ctx.fs.is_dir(&path) {
                path_resolution(format!(
                    "{} is a file where a directory must be",
                    path.display()
                ));
            }
            return false;
        }
        match ctx.fs.create_dir_all(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Created directory");
                self.write_back(ctx);
                true
            }
            Err(err) => {
                self.report(ctx, MirrorError::io("create directory", &path, err));
                false
            }
        }
    }

    /// Apply requested writable attributes to the entry
    pub(crate) fn write_back(&self, ctx: &Context<'_>) {
        let path = self.path();
        if let Some(mode) = self.requested.permissions() {
            if let Err(err) = ctx.fs.set_permissions(path, mode) {
                self.report(ctx, MirrorError::io("set permissions", path, err));
            }
        }
        if let Some(modified) = self.requested.get::<DateModifiedKey>() {
            if let Err(err) = ctx.fs.set_modified(path, modified) {
                self.report(ctx, MirrorError::io("set modification date", path, err));
            }
        }
    }

    /// Remove the entry using the configured removal method
    pub fn remove(&mut self, ctx: &Context<'_>) -> bool {
        match self.traits.removal_method() {
            RemovalMethod::Delete => self.delete(ctx),
            RemovalMethod::Trash => self.trash(ctx),
        }
    }

    pub fn delete(&mut self, ctx: &Context<'_>) -> bool {
        if !self.exists(ctx) {
            return false;
        }
        let path = self.path().to_path_buf();
        match ctx.fs.remove(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted entry");
                self.recovery = None;
                true
            }
            Err(err) => {
                self.report(ctx, MirrorError::io("delete", &path, err));
                false
            }
        }
    }

    pub fn trash(&mut self, ctx: &Context<'_>) -> bool {
        if !self.exists(ctx) {
            return false;
        }
        let path = self.path().to_path_buf();
        match ctx.trash.put(&path) {
            Ok(handle) => {
                self.recovery = handle;
                true
            }
            Err(err) => {
                self.report(ctx, err);
                false
            }
        }
    }

    /// Restore the entry from the trash
    pub fn recover(&mut self, ctx: &Context<'_>) -> bool {
        let Some(entry) = self.recovery.take() else {
            return false;
        };
        match ctx.trash.restore(ctx.fs, &entry) {
            Ok(_) => true,
            Err(err) => {
                self.recovery = Some(entry);
                self.report(ctx, err);
                false
            }
        }
    }

    /// Refresh attributes and resources from disk
    pub(crate) fn refresh_metadata(&mut self, ctx: &Context<'_>) {
        if !self.is_named() {
            return;
        }
        let path = self.path().to_path_buf();
        if let Ok(metadata) = ctx.fs.metadata(&path) {
            self.attributes.record_metadata(&metadata);
            self.resources.refresh(ctx.fs, &path);
        }
    }

    pub(crate) fn current_state(&self, ctx: &Context<'_>) -> EntryState {
        if !self.is_named() {
            return EntryState::Absent;
        }
        let path = self.path();
        if !ctx.fs.exists(path) {
            return EntryState::Absent;
        }
        if ctx.fs.is_dir(path) {
            return EntryState::Present(None);
        }
        match ctx.fs.read(path) {
            Ok(bytes) => EntryState::Present(Some(*blake3::hash(&bytes).as_bytes())),
            Err(_) => EntryState::Present(None),
        }
    }

    pub(crate) fn record_state(&mut self, ctx: &Context<'_>) {
        self.state = self.current_state(ctx);
    }

    /// Recompute the entry state and report a transition, if any
    pub fn update_if_existing(&mut self, ctx: &Context<'_>) -> Option<ChangeKind> {
        let current = self.current_state(ctx);
        let change = match (&self.state, &current) {
            (previous, now) if previous == now => None,
            (EntryState::Present(_), EntryState::Absent) => Some(ChangeKind::Removed),
            (EntryState::Present(_), EntryState::Present(_)) => Some(ChangeKind::Modified),
            (_, EntryState::Present(_)) => Some(ChangeKind::Created),
            (_, _) => None,
        };
        if let EntryState::Present(Some(fingerprint)) = &current {
            trace!(
                path = %self.path().display(),
                fingerprint = %hex::encode(&fingerprint[..8]),
                "Fingerprinted entry"
            );
        }
        self.state = current;
        if matches!(change, Some(ChangeKind::Created | ChangeKind::Modified)) {
            self.refresh_metadata(ctx);
        }
        change
    }

    pub fn should_observe(&self, ctx: &Context<'_>) -> bool {
        self.traits.is_observable()
            && self.traits.entry_kind() == EntryKind::File
            && self.exists(ctx)
    }
}

pub(crate) fn read_path(reflection: &Reflection, ctx: &Context<'_>, path: &Path) -> Option<Vec<u8>> {
    match ctx.fs.read(path) {
        Ok(bytes) => Some(bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => None,
        Err(err) => {
            reflection.report(ctx, MirrorError::io("read", path, err));
            None
        }
    }
}

impl fmt::Debug for Reflection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reflection")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("identity", &self.identity)
            .field("directory", &self.directory)
            .field("traits", &self.traits)
            .field("attributes", &self.attributes)
            .field("recovery", &self.recovery)
            .finish()
    }
}

impl fmt::Display for Reflection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {} {}", self.kind, self.id, self.identity.join("/"))?;
        if !self.subject.is_empty() {
            write!(f, " <{}>", self.subject)?;
        }
        if self.is_named() {
            write!(f, "\n  path: {}", self.path().display())?;
        }
        write!(f, "\n{}\n{}\n{}", self.traits, self.attributes, self.resources)
    }
}

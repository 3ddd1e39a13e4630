//! Publisher
//!
//! The root authority for one cache namespace. It resolves the content root, owns the
//! cache, the observer, and the trash, and exposes materialization, typed alias access,
//! and change notification. Every mutation takes `&mut Publisher`, so a publisher has a
//! single writer.

use crate::config::{paths, MirrorConfig};
use crate::content::{Alias, Codec, Content, PublicContent};
use crate::error::{path_resolution, ErrorHandler, MirrorError};
use crate::fs::{FileSystem, LocalFileSystem};
use crate::mirror::{BuildContext, BuildStats, Cache, CacheKey, Reflected};
use crate::observer::{EventSender, Observer};
use crate::reflection::{ChangeKind, Context, Reflection, ReflectionId};
use crate::trash::{Trash, TrashedEntry};
use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};

/// A state transition detected on a mirrored entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub key: CacheKey,
    pub reflection: ReflectionId,
    pub path: PathBuf,
    pub kind: ChangeKind,
}

pub struct Publisher {
    config: MirrorConfig,
    content_root: PathBuf,
    fs: Arc<dyn FileSystem>,
    cache: Cache,
    observer: Observer,
    trash: Trash,
    subscribers: Vec<Sender<ChangeNotice>>,
    default_handler: ErrorHandler,
}

impl Publisher {
    pub fn new(config: MirrorConfig) -> Result<Self, MirrorError> {
        Self::with_file_system(config, Arc::new(LocalFileSystem))
    }

    /// A publisher performing all disk access through `fs`
    pub fn with_file_system(
        config: MirrorConfig,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self, MirrorError> {
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            MirrorError::Config(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })?;

        let content_root = paths::resolve_content_root(&config.content)?;
        fs.create_dir_all(&content_root)
            .map_err(|e| MirrorError::io("create content root", &content_root, e))?;
        let trash = Trash::new(&content_root);
        let observer = Observer::new(&config.observer)?;

        let default_handler: ErrorHandler = Arc::new(|error: &MirrorError| {
            warn!(error = %error, "Mirror operation failed");
        });

        debug!(
            content_root = %content_root.display(),
                        observing = observer.is_enabled(),
            "Created publisher"
        );

        Ok(Self {
            config,
            content_root,
            fs,
            cache: Cache::new(),
            observer,
            trash,
            subscribers: Vec::new(),
            default_handler,
        })
    }

    /// Replace the handler used for reflections without their own error callback
    pub fn set_default_handler<F>(&mut self, handler: F)
    where
        F: Fn(&MirrorError) + Send + Sync + 'static,
    {
        self.default_handler = Arc::new(handler);
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    pub fn trash_store(&self) -> &Trash {
        &self.trash
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    /// Sender feeding the observer's event queue
    pub fn event_sender(&self) -> EventSender {
        self.observer.sender()
    }

    pub fn mirror_count(&self) -> usize {
        self.cache.mirror_count()
    }

    pub fn reflection_count(&self) -> usize {
        self.cache.reflection_count()
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn reflection(&self, id: ReflectionId) -> Option<&Reflection> {
        self.cache.reflection(id)
    }

    fn context(&self) -> Context<'_> {
        Context {
            fs: self.fs.as_ref(),
            trash: &self.trash,
            default_handler: &self.default_handler,
        }
    }

    fn parts(&mut self) -> (&mut Cache, BuildContext<'_>) {
        (
            &mut self.cache,
            BuildContext {
                ctx: Context {
                    fs: self.fs.as_ref(),
                    trash: &self.trash,
                    default_handler: &self.default_handler,
                },
                observer: &mut self.observer,
                content_root: &self.content_root,
            },
        )
    }

    // Materialization

    /// Materialize the default value of `R` under `key`
    pub fn materialize<R>(&mut self, key: &str) -> Result<Arc<R>, MirrorError>
    where
        R: PublicContent + Default,
    {
        self.materialize_with(key, R::default)
    }

    /// Materialize `root` under `key`. A cached root is returned as is.
    pub fn materialize_value<R: PublicContent>(
        &mut self,
        key: &str,
        root: R,
    ) -> Result<Arc<R>, MirrorError> {
        self.materialize_with(key, move || root)
    }

    /// Materialize the root produced by `make`, which is only called on a cache miss
    pub fn materialize_with<R, F>(&mut self, key: &str, make: F) -> Result<Arc<R>, MirrorError>
    where
        R: PublicContent,
        F: FnOnce() -> R,
    {
        let cache_key = CacheKey::of::<R>(key);
        if let Some(root) = self.cache.root::<R>(&cache_key) {
            trace!(key = %cache_key, "Mirror cache hit");
            return Ok(root);
        }
        let root = Arc::new(make());
        self.build_root(cache_key, root.clone())?;
        Ok(root)
    }

    /// Rebuild the mirror for `key` from a new root value
    pub fn refresh_value<R: PublicContent>(
        &mut self,
        key: &str,
        root: R,
    ) -> Result<Arc<R>, MirrorError> {
        let root = Arc::new(root);
        self.build_root(CacheKey::of::<R>(key), root.clone())?;
        Ok(root)
    }

    /// Materialize the tree produced by `builder` under `key`
    pub fn reflect<F>(&mut self, key: &str, builder: F) -> Result<Arc<Reflected>, MirrorError>
    where
        F: FnOnce() -> Vec<Content>,
    {
        let cache_key = CacheKey::reflected(key);
        if let Some(root) = self.cache.root::<Reflected>(&cache_key) {
            trace!(key = %cache_key, "Mirror cache hit");
            return Ok(root);
        }
        let (cache, mut env) = self.parts();
        cache.build_reflected(cache_key, builder(), &mut env)
    }

    /// Rebuild the tree for `key`, reusing reflections whose identity survived
    #[instrument(skip_all, fields(key = key))]
    pub fn refresh<F>(&mut self, key: &str, builder: F) -> Result<Arc<Reflected>, MirrorError>
    where
        F: FnOnce() -> Vec<Content>,
    {
        let (cache, mut env) = self.parts();
        cache.build_reflected(CacheKey::reflected(key), builder(), &mut env)
    }

    /// Drop a mirror and release its reflections. Aliases bound into it become stale.
    pub fn invalidate(&mut self, key: &CacheKey) -> Vec<ReflectionId> {
        self.cache.invalidate(key, &mut self.observer)
    }

    fn build_root<R: PublicContent>(
        &mut self,
        key: CacheKey,
        root: Arc<R>,
    ) -> Result<BuildStats, MirrorError> {
        let contents = root.content();
        let erased: Arc<dyn Any + Send + Sync> = root;
        let (cache, mut env) = self.parts();
        cache.build(key, erased, contents, &mut env)
    }

    // Alias access

    /// Reflection an alias is bound to. Unbound and stale aliases are programmer errors.
    #[track_caller]
    pub fn reflection_of<C: Codec>(&self, alias: &Alias<C>) -> &Reflection {
        let id = alias.target();
        match self.cache.reflection(id) {
            Some(reflection) => reflection,
            None => path_resolution(format!("alias refers to released reflection {}", id)),
        }
    }

    /// Reflection of a leaf or folder alias; other kinds have no single value
    #[track_caller]
    fn leaf<C: Codec>(&self, alias: &Alias<C>) -> &Reflection {
        let reflection = self.reflection_of(alias);
        if !reflection.kind().has_path() {
            path_resolution(format!(
                "{:?} {} has no single value",
                reflection.kind(),
                reflection.identity().join("/")
            ));
        }
        reflection
    }

    #[track_caller]
    pub fn path<C: Codec>(&self, alias: &Alias<C>) -> PathBuf {
        self.leaf(alias).path().to_path_buf()
    }

    /// Decoded value of a leaf. A missing entry reads as `None`.
    #[track_caller]
    pub fn get<C: Codec>(&self, alias: &Alias<C>) -> Option<C::Value> {
        let reflection = self.leaf(alias);
        let ctx = self.context();
        let bytes = reflection.read(&ctx)?;
        decode(reflection, &ctx, alias.codec(), reflection.path(), &bytes)
    }

    /// Encode and write a leaf's value; `None` removes the entry
    #[track_caller]
    pub fn set<C: Codec>(&mut self, alias: &Alias<C>, value: Option<C::Value>) -> bool {
        let id = self.leaf(alias).id();
        let written = {
            let (cache, env) = self.parts();
            let Some(reflection) = cache.reflection_mut(id) else {
                return false;
            };
            match value {
                None => reflection.write(&env.ctx, None),
                Some(value) => match alias.codec().encode(&value) {
                    Ok(bytes) => reflection.write(&env.ctx, Some(bytes)),
                    Err(source) => {
                        let path = reflection.path().to_path_buf();
                        reflection.report(&env.ctx, MirrorError::Encoding { path, source });
                        false
                    }
                },
            }
        };
        self.validate(id);
        written
    }

    /// Remove a leaf using its configured removal method
    #[track_caller]
    pub fn remove<C: Codec>(&mut self, alias: &Alias<C>) -> bool {
        self.with_leaf(alias, |reflection, ctx| reflection.remove(ctx))
    }

    /// Move a leaf to the trash regardless of its removal method
    #[track_caller]
    pub fn trash<C: Codec>(&mut self, alias: &Alias<C>) -> bool {
        self.with_leaf(alias, |reflection, ctx| reflection.trash(ctx))
    }

    /// Delete a leaf regardless of its removal method
    #[track_caller]
    pub fn delete<C: Codec>(&mut self, alias: &Alias<C>) -> bool {
        self.with_leaf(alias, |reflection, ctx| reflection.delete(ctx))
    }

    /// Restore a trashed leaf to its path
    #[track_caller]
    pub fn recover<C: Codec>(&mut self, alias: &Alias<C>) -> bool {
        self.with_leaf(alias, |reflection, ctx| reflection.recover(ctx))
    }

    /// Location of a trashed leaf inside the trash
    #[track_caller]
    pub fn recovery_path<C: Codec>(&self, alias: &Alias<C>) -> Option<PathBuf> {
        self.reflection_of(alias).recovery_path().map(Path::to_path_buf)
    }

    /// Recovery handle of a trashed leaf
    #[track_caller]
    pub fn recovery<C: Codec>(&self, alias: &Alias<C>) -> Option<TrashedEntry> {
        self.reflection_of(alias).recovery().cloned()
    }

    #[track_caller]
    fn with_leaf<C, F>(&mut self, alias: &Alias<C>, operation: F) -> bool
    where
        C: Codec,
        F: FnOnce(&mut Reflection, &Context<'_>) -> bool,
    {
        let id = self.leaf(alias).id();
        let done = {
            let (cache, env) = self.parts();
            match cache.reflection_mut(id) {
                Some(reflection) => operation(reflection, &env.ctx),
                None => false,
            }
        };
        self.validate(id);
        done
    }

    /// Decoded value of the sibling with identity `id`
    #[track_caller]
    pub fn get_id<C: Codec>(&self, alias: &Alias<C>, id: &str) -> Option<C::Value> {
        let reflection = self.reflection_of(alias);
        let ctx = self.context();
        let bytes = reflection.get_id(&ctx, id)?;
        decode(reflection, &ctx, alias.codec(), &reflection.sibling_path(id), &bytes)
    }

    /// Write the sibling with identity `id`; `None` removes only that sibling
    #[track_caller]
    pub fn set_id<C: Codec>(&mut self, alias: &Alias<C>, id: &str, value: Option<C::Value>) -> bool {
        let target = alias.target();
        let written = {
            let reflection = self.reflection_of(alias);
            let ctx = self.context();
            match value {
                None => reflection.set_id(&ctx, id, None),
                Some(value) => match alias.codec().encode(&value) {
                    Ok(bytes) => reflection.set_id(&ctx, id, Some(bytes)),
                    Err(source) => {
                        let path = reflection.sibling_path(id);
                        reflection.report(&ctx, MirrorError::Encoding { path, source });
                        false
                    }
                },
            }
        };
        self.validate_sibling(target, id);
        written
    }

    /// Remove the sibling with identity `id`, returning its trash location if trashed
    #[track_caller]
    pub fn remove_id<C: Codec>(&mut self, alias: &Alias<C>, id: &str) -> Option<PathBuf> {
        let target = alias.target();
        let removed = {
            let reflection = self.reflection_of(alias);
            reflection.remove_id(&self.context(), id)
        };
        self.validate_sibling(target, id);
        removed
    }

    /// Every sibling whose extension matches, decoded and keyed by identity
    #[track_caller]
    pub fn get_all<C: Codec>(&self, alias: &Alias<C>) -> Vec<(String, C::Value)> {
        let reflection = self.reflection_of(alias);
        let ctx = self.context();
        reflection
            .get_all(&ctx)
            .into_iter()
            .filter_map(|(id, bytes)| {
                let path = reflection.sibling_path(&id);
                let value = decode(reflection, &ctx, alias.codec(), &path, &bytes)?;
                Some((id, value))
            })
            .collect()
    }

    // Change notification

    /// Receive a [`ChangeNotice`] for every detected state transition
    pub fn subscribe(&mut self) -> Receiver<ChangeNotice> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.push(sender);
        receiver
    }

    /// Drain queued watch events and validate every reflection they concern
    pub fn process_changes(&mut self) -> Vec<ChangeNotice> {
        let affected = self.observer.drain();
        let notices: Vec<ChangeNotice> = affected
            .into_iter()
            .filter_map(|id| self.validate(id))
            .collect();
        if !notices.is_empty() {
            debug!(changes = notices.len(), "Processed filesystem changes");
        }
        notices
    }

    /// Recompute one reflection's entry state and notify on a transition
    fn validate(&mut self, id: ReflectionId) -> Option<ChangeNotice> {
        let notice = {
            let (cache, env) = self.parts();
            let key = cache.owner(id)?.clone();
            let reflection = cache.reflection_mut(id)?;
            let kind = reflection.update_if_existing(&env.ctx)?;
            if reflection.should_observe(&env.ctx) {
                if let Err(err) = env.observer.observe(id, reflection.directory()) {
                    reflection.report(&env.ctx, err);
                }
            }
            ChangeNotice {
                key,
                reflection: id,
                path: reflection.path().to_path_buf(),
                kind,
            }
        };
        self.notify(&notice);
        Some(notice)
    }

    /// Validate the reflection bound to a repeater element, if one exists
    fn validate_sibling(&mut self, family: ReflectionId, id: &str) {
        let Some(key) = self.cache.owner(family).cloned() else {
            return;
        };
        let Some(mut identity) = self
            .cache
            .reflection(family)
            .map(|reflection| reflection.identity().to_vec())
        else {
            return;
        };
        identity.push(id.to_string());
        if let Some(element) = self.cache.lookup(&key, &identity) {
            self.validate(element);
        }
    }

    fn notify(&mut self, notice: &ChangeNotice) {
        debug!(
            path = %notice.path.display(),
            kind = ?notice.kind,
            reflection = %notice.reflection,
            "Entry changed"
        );
        self.subscribers
            .retain(|subscriber| subscriber.send(notice.clone()).is_ok());
    }

    // Diagnostics

    /// Log the content root and cache sizes, and each reflection at debug level
    pub fn display(&self) {
        info!(
            path = %self.content_root.display(),
            mirrors = self.cache.mirror_count(),
            reflections = self.cache.reflection_count(),
            "Publisher"
        );
        for reflection in self.cache.reflections() {
            debug!("{}", reflection);
        }
    }
}

fn decode<C: Codec>(
    reflection: &Reflection,
    ctx: &Context<'_>,
    codec: &C,
    path: &Path,
    bytes: &[u8],
) -> Option<C::Value> {
    match codec.decode(bytes) {
        Ok(value) => Some(value),
        Err(source) => {
            reflection.report(
                ctx,
                MirrorError::Decoding {
                    path: path.to_path_buf(),
                    source,
                },
            );
            None
        }
    }
}

//! Mirror / Cache
//!
//! Builds the reflection graph for one root exactly once per [`CacheKey`] and serves it
//! from the cache afterwards. Reflections live in a generational arena; a mirror entry
//! remembers which reflection belongs to each identity path so a refresh can reuse them.

use crate::content::{Content, ContentKind};
use crate::error::MirrorError;
use crate::graph::{Backing, Cursor};
use crate::observer::Observer;
use crate::reflection::{Context, Reflection, ReflectionId, ReflectionKind};
use crate::values::{Attributes, Traits};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Cache namespace entry: the root type plus a caller-chosen key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    type_tag: &'static str,
    key: String,
}

impl CacheKey {
    /// Key for a root of type `R`
    pub fn of<R: 'static>(key: impl Into<String>) -> Self {
        Self {
            type_tag: std::any::type_name::<R>(),
            key: key.into(),
        }
    }

    /// Key for a tree produced by a builder function
    pub fn reflected(key: impl Into<String>) -> Self {
        Self::of::<Reflected>(key)
    }

    pub fn type_tag(&self) -> &'static str {
        self.type_tag
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_tag, self.key)
    }
}

/// Bound root of a tree produced by a builder function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reflected {
    key: CacheKey,
    roots: Vec<ReflectionId>,
}

impl Reflected {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Reflections of the top-level nodes
    pub fn roots(&self) -> &[ReflectionId] {
        &self.roots
    }
}

struct Slot {
    generation: u32,
    reflection: Option<Reflection>,
}

/// Generational storage for reflections
#[derive(Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl Arena {
    fn insert_with<F>(&mut self, make: F) -> ReflectionId
    where
        F: FnOnce(ReflectionId) -> Reflection,
    {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    reflection: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = ReflectionId::new(index, slot.generation);
        slot.reflection = Some(make(id));
        self.live += 1;
        id
    }

    fn get(&self, id: ReflectionId) -> Option<&Reflection> {
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.reflection.as_ref()
    }

    fn get_mut(&mut self, id: ReflectionId) -> Option<&mut Reflection> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.reflection.as_mut()
    }

    fn remove(&mut self, id: ReflectionId) -> Option<Reflection> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        let reflection = slot.reflection.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.live -= 1;
        Some(reflection)
    }

    fn iter(&self) -> impl Iterator<Item = &Reflection> {
        self.slots.iter().filter_map(|slot| slot.reflection.as_ref())
    }
}

/// One cached mirror
struct MirrorEntry {
    root: Arc<dyn Any + Send + Sync>,
    backing: Backing,
    identities: HashMap<Vec<String>, ReflectionId>,
    roots: Vec<ReflectionId>,
}

/// Collaborators used while building
pub struct BuildContext<'a> {
    pub ctx: Context<'a>,
    pub observer: &'a mut Observer,
    pub content_root: &'a Path,
}

/// Counters for one build pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub visited: usize,
    pub created: usize,
    pub reused: usize,
    pub released: usize,
}

/// Resolved configuration a child inherits from its parent reflection
struct Inherited {
    kind: ReflectionKind,
    traits: Traits,
    attributes: Attributes,
    requested: Attributes,
    directory: PathBuf,
    on_error: Option<crate::error::ErrorHandler>,
}

impl Inherited {
    fn of(parent: &Reflection) -> Self {
        Self {
            kind: parent.kind,
            traits: parent.traits.clone(),
            attributes: parent.attributes.clone(),
            requested: parent.requested.clone(),
            directory: parent.container_directory(),
            on_error: parent.on_error.clone(),
        }
    }

    /// Whether transparent keys flow from this parent
    fn is_transparent(&self) -> bool {
        matches!(self.kind, ReflectionKind::Group | ReflectionKind::Repeater)
    }
}

/// State carried through one build pass
struct Pass<'p> {
    arena: &'p mut Arena,
    owners: &'p mut HashMap<ReflectionId, CacheKey>,
    key: &'p CacheKey,
    previous: HashMap<Vec<String>, ReflectionId>,
    identities: HashMap<Vec<String>, ReflectionId>,
    stats: BuildStats,
}

/// The cache of mirrors and the reflections they own
#[derive(Default)]
pub struct Cache {
    arena: Arena,
    mirrors: HashMap<CacheKey, MirrorEntry>,
    owners: HashMap<ReflectionId, CacheKey>,
    building: HashSet<CacheKey>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.mirrors.contains_key(key)
    }

    /// Cached root for `key`, if it was built with root type `R`
    pub fn root<R: Send + Sync + 'static>(&self, key: &CacheKey) -> Option<Arc<R>> {
        let entry = self.mirrors.get(key)?;
        entry.root.clone().downcast::<R>().ok()
    }

    /// Reflections of the top-level nodes of a mirror
    pub fn roots(&self, key: &CacheKey) -> Option<&[ReflectionId]> {
        self.mirrors.get(key).map(|entry| entry.roots.as_slice())
    }

    /// Flattened sequence of the last build of a mirror
    pub fn backing(&self, key: &CacheKey) -> Option<&Backing> {
        self.mirrors.get(key).map(|entry| &entry.backing)
    }

    /// Reflection bound to `identity` in a mirror
    pub fn lookup(&self, key: &CacheKey, identity: &[String]) -> Option<ReflectionId> {
        self.mirrors.get(key)?.identities.get(identity).copied()
    }

    pub fn reflection(&self, id: ReflectionId) -> Option<&Reflection> {
        self.arena.get(id)
    }

    pub fn reflection_mut(&mut self, id: ReflectionId) -> Option<&mut Reflection> {
        self.arena.get_mut(id)
    }

    pub fn reflections(&self) -> impl Iterator<Item = &Reflection> {
        self.arena.iter()
    }

    /// Mirror that owns `id`
    pub fn owner(&self, id: ReflectionId) -> Option<&CacheKey> {
        self.owners.get(&id)
    }

    pub fn mirror_count(&self) -> usize {
        self.mirrors.len()
    }

    pub fn reflection_count(&self) -> usize {
        self.arena.live
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.mirrors.keys()
    }

    /// Build or rebuild the mirror for `key`.
    ///
    /// Reflections from an earlier build are reused by identity path. Repeater elements
    /// whose identity vanished are removed from disk; every other vanished reflection is
    /// only released.
    #[instrument(skip_all, fields(key = %key))]
    pub fn build(
        &mut self,
        key: CacheKey,
        root: Arc<dyn Any + Send + Sync>,
        contents: Vec<Content>,
        env: &mut BuildContext<'_>,
    ) -> Result<BuildStats, MirrorError> {
        if !self.building.insert(key.clone()) {
            return Err(MirrorError::InvalidTransaction(format!(
                "mirror {} is already being built",
                key
            )));
        }
        let stats = self.build_guarded(&key, root, contents, env);
        self.building.remove(&key);

        info!(
            key = %key,
            visited = stats.visited,
            created = stats.created,
            reused = stats.reused,
            released = stats.released,
            "Built mirror"
        );
        Ok(stats)
    }

    fn build_guarded(
        &mut self,
        key: &CacheKey,
        root: Arc<dyn Any + Send + Sync>,
        contents: Vec<Content>,
        env: &mut BuildContext<'_>,
    ) -> BuildStats {
        let previous = self
            .mirrors
            .remove(key)
            .map(|entry| entry.identities)
            .unwrap_or_default();

        let mut backing = Backing::new(contents);
        let mut pass = Pass {
            arena: &mut self.arena,
            owners: &mut self.owners,
            key,
            previous,
            identities: HashMap::new(),
            stats: BuildStats::default(),
        };

        Cursor::new(&mut backing).step(|cursor, position| pass.visit(cursor, position, env));

        let Pass {
            previous,
            identities,
            mut stats,
            ..
        } = pass;

        let claimed: HashSet<PathBuf> = identities
            .values()
            .filter_map(|id| self.arena.get(*id))
            .filter(|reflection| reflection.is_named())
            .map(|reflection| reflection.path().to_path_buf())
            .collect();
        for (identity, id) in previous {
            if identities.contains_key(&identity) {
                continue;
            }
            self.release(id, &claimed, env);
            stats.released += 1;
        }

        let roots = backing.roots().filter_map(|entry| entry.reflection).collect();
        self.mirrors.insert(
            key.clone(),
            MirrorEntry {
                root,
                backing,
                identities,
                roots,
            },
        );
        stats
    }

    /// Drop the mirror for `key`, cancel its watches, and free its reflections
    pub fn invalidate(&mut self, key: &CacheKey, observer: &mut Observer) -> Vec<ReflectionId> {
        let Some(entry) = self.mirrors.remove(key) else {
            return Vec::new();
        };
        let mut released: Vec<ReflectionId> = entry.identities.into_values().collect();
        released.sort();
        for id in &released {
            if let Err(err) = observer.stop_observing(*id) {
                warn!(reflection = %id, error = %err, "Failed to stop observing");
            }
            self.arena.remove(*id);
            self.owners.remove(id);
        }
        debug!(key = %key, released = released.len(), "Invalidated mirror");
        released
    }

    /// Free one reflection left behind by a refresh. Entries still claimed by a live
    /// reflection stay on disk.
    fn release(
        &mut self,
        id: ReflectionId,
        claimed: &HashSet<PathBuf>,
        env: &mut BuildContext<'_>,
    ) {
        if let Err(err) = env.observer.stop_observing(id) {
            warn!(reflection = %id, error = %err, "Failed to stop observing");
        }
        self.owners.remove(&id);
        let Some(mut reflection) = self.arena.remove(id) else {
            return;
        };
        if reflection.repeated && reflection.is_named() && !claimed.contains(reflection.path()) {
            debug!(path = %reflection.path().display(), "Removing vanished element");
            reflection.remove(&env.ctx);
        }
    }
}

impl Pass<'_> {
    fn visit(&mut self, cursor: &mut Cursor<'_>, position: usize, env: &mut BuildContext<'_>) {
        let entry = cursor.entry(position);
        if !entry.content.is_materializing() {
            return;
        }
        let content = entry.content.clone();
        let identity = entry.identity.clone();
        let parent_id = entry
            .start
            .and_then(|start| cursor.entry(start).reflection);
        let Some(kind) = reflection_kind(&content.kind) else {
            return;
        };
        let inherited = parent_id
            .and_then(|id| self.arena.get(id))
            .map(Inherited::of);
        if self.identities.contains_key(&identity) {
            let error = MirrorError::InvalidTransaction(format!(
                "duplicate identity {:?} in mirror {}",
                identity.join("/"),
                self.key
            ));
            let handler = content
                .config
                .on_error
                .as_ref()
                .or_else(|| inherited.as_ref().and_then(|p| p.on_error.as_ref()))
                .unwrap_or(env.ctx.default_handler);
            handler(&error);
            return;
        }
        self.stats.visited += 1;

        let id = self.bind(&identity, kind, env);
        let Some(reflection) = self.arena.get_mut(id) else {
            return;
        };

        configure(reflection, &content, position, parent_id, inherited.as_ref(), env);
        let children = materialize(reflection, &content, env);

        self.identities.insert(identity, id);
        self.owners.insert(id, self.key.clone());
        cursor.entry_mut(position).reflection = Some(id);
        if !children.is_empty() {
            cursor.rebase(children);
        }
    }

    /// Reuse the reflection bound to `identity` by an earlier build, or create one
    fn bind(
        &mut self,
        identity: &[String],
        kind: ReflectionKind,
        env: &mut BuildContext<'_>,
    ) -> ReflectionId {
        if let Some(id) = self.previous.remove(identity) {
            match self.arena.get(id) {
                Some(existing) if existing.kind == kind => {
                    self.stats.reused += 1;
                    return id;
                }
                Some(_) => {
                    if let Err(err) = env.observer.stop_observing(id) {
                        warn!(reflection = %id, error = %err, "Failed to stop observing");
                    }
                    self.arena.remove(id);
                    self.owners.remove(&id);
                    self.stats.released += 1;
                }
                None => {}
            }
        }
        self.stats.created += 1;
        let directory = env.content_root.to_path_buf();
        let identity = identity.to_vec();
        self.arena
            .insert_with(|id| Reflection::new(id, kind, identity, directory))
    }
}

fn reflection_kind(kind: &ContentKind) -> Option<ReflectionKind> {
    match kind {
        ContentKind::Value(_) => Some(ReflectionKind::Value),
        ContentKind::Folder { .. } => Some(ReflectionKind::Folder),
        ContentKind::Group(_) => Some(ReflectionKind::Group),
        ContentKind::Repeater(_) => Some(ReflectionKind::Repeater),
        ContentKind::Conditional(_) | ContentKind::Empty => None,
    }
}

/// Link a reflection to its parent and resolve its configuration: traits first, then the
/// name and extension they imply, then attributes
fn configure(
    reflection: &mut Reflection,
    content: &Content,
    position: usize,
    parent: Option<ReflectionId>,
    inherited: Option<&Inherited>,
    env: &BuildContext<'_>,
) {
    let config = &content.config;
    reflection.position = position;
    reflection.parent = parent;
    reflection.repeated = inherited.is_some_and(|p| p.kind == ReflectionKind::Repeater);
    reflection.set_directory(match inherited {
        Some(parent) => parent.directory.clone(),
        None => env.content_root.to_path_buf(),
    });
    reflection.on_error = config
        .on_error
        .clone()
        .or_else(|| inherited.and_then(|p| p.on_error.clone()));

    let transparent = inherited.is_some_and(Inherited::is_transparent);

    reflection.traits.apply(&config.traits);
    if let Some(parent) = inherited {
        reflection.traits.merge(&parent.traits, transparent);
    }
    reflection.traits.fill(&config.defaults);

    match &content.kind {
        ContentKind::Value(leaf) => {
            if let Some(name) = &leaf.name {
                reflection.set_name(name);
            }
            reflection.structure = Some(leaf.structure.clone());
            reflection.subject = leaf.structure.type_name();
        }
        ContentKind::Folder { name, .. } => reflection.set_name(name),
        _ => {}
    }
    reflection.resolve_traits();

    reflection.attributes.apply(&config.attributes);
    let mut requested = config.attributes.clone();
    if let Some(parent) = inherited {
        reflection.attributes.merge(&parent.attributes, transparent);
        requested.merge(&parent.requested, transparent);
    }
    reflection.requested = requested;
    reflection.record_path();
}

/// Perform the node's filesystem effects and produce its children
fn materialize(
    reflection: &mut Reflection,
    content: &Content,
    env: &mut BuildContext<'_>,
) -> Vec<Content> {
    let ctx = &env.ctx;
    let children = match &content.kind {
        ContentKind::Folder { children, .. } => {
            reflection.create_directory(ctx);
            children()
        }
        ContentKind::Group(children) => children(),
        ContentKind::Repeater(elements) => {
            let (children, duplicates) = elements.expand();
            for duplicate in duplicates {
                reflection.report(
                    ctx,
                    MirrorError::InvalidTransaction(format!(
                        "duplicate repeater identity {:?} in {}",
                        duplicate,
                        reflection.identity().join("/")
                    )),
                );
            }
            children
        }
        ContentKind::Value(_) => {
            if reflection.is_named() {
                reflection.create(ctx);
            }
            Vec::new()
        }
        ContentKind::Conditional(_) | ContentKind::Empty => Vec::new(),
    };

    reflection.refresh_metadata(ctx);
    reflection.record_state(ctx);

    let id = reflection.id();
    if reflection.should_observe(ctx) {
        if let Err(err) = env.observer.observe(id, reflection.directory()) {
            reflection.report(ctx, err);
        }
    } else if env.observer.is_observing(id) {
        if let Err(err) = env.observer.stop_observing(id) {
            reflection.report(ctx, err);
        }
    }

    let slot = match &content.kind {
        ContentKind::Value(leaf) => leaf.alias.as_ref(),
        ContentKind::Repeater(elements) => elements.alias.as_ref(),
        _ => None,
    };
    if let Some(slot) = slot {
        *slot.write() = Some(id);
    }

    debug!(reflection = %id, identity = %reflection.identity().join("/"), "Bound reflection");
    children
}

impl Cache {
    /// Build the mirror for a builder-produced tree, returning its bound root
    pub(crate) fn build_reflected(
        &mut self,
        key: CacheKey,
        contents: Vec<Content>,
        env: &mut BuildContext<'_>,
    ) -> Result<Arc<Reflected>, MirrorError> {
        let placeholder: Arc<dyn Any + Send + Sync> = Arc::new(());
        self.build(key.clone(), placeholder, contents, env)?;
        let roots = self.roots(&key).map(<[_]>::to_vec).unwrap_or_default();
        let reflected = Arc::new(Reflected {
            key: key.clone(),
            roots,
        });
        if let Some(entry) = self.mirrors.get_mut(&key) {
            entry.root = reflected.clone();
        }
        Ok(reflected)
    }
}

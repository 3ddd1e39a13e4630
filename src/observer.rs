//! Observer
//!
//! Owns the OS watches for materialized entries. One watch is held per distinct directory;
//! each registration records the reflections interested in that directory. Events arrive
//! on the watcher's thread and are only queued; the publisher drains them on its own
//! context and validates each affected reflection.

use crate::config::ObserverConfig;
use crate::error::MirrorError;
use crate::reflection::ReflectionId;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, error, warn};

/// Queue of raw watcher events
pub type EventSender = Sender<notify::Result<Event>>;

/// The OS watch primitive behind the observer
pub trait WatchBackend: Send {
    fn watch(&mut self, directory: &Path) -> Result<(), MirrorError>;
    fn unwatch(&mut self, directory: &Path) -> Result<(), MirrorError>;
}

/// `notify`'s recommended watcher, watching single directory levels
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
}

impl NotifyBackend {
    pub fn new(sender: EventSender) -> Result<Self, MirrorError> {
        let watcher = notify::recommended_watcher(move |res| {
            if let Err(e) = sender.send(res) {
                error!("Error queueing watch event: {}", e);
            }
        })
        .map_err(|e| MirrorError::Watch(format!("Failed to create watcher: {}", e)))?;
        Ok(Self { watcher })
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, directory: &Path) -> Result<(), MirrorError> {
        self.watcher
            .watch(directory, RecursiveMode::NonRecursive)
            .map_err(MirrorError::from)
    }

    fn unwatch(&mut self, directory: &Path) -> Result<(), MirrorError> {
        self.watcher.unwatch(directory).map_err(MirrorError::from)
    }
}

pub struct Observer {
    /// `None` when watching is disabled; registrations are still tracked
    backend: Option<Box<dyn WatchBackend>>,
    sender: EventSender,
    receiver: Receiver<notify::Result<Event>>,
    registrations: HashMap<PathBuf, BTreeSet<ReflectionId>>,
    watching: HashMap<ReflectionId, PathBuf>,
    ignore_suffixes: Vec<String>,
}

impl Observer {
    pub fn new(config: &ObserverConfig) -> Result<Self, MirrorError> {
        let (sender, receiver) = mpsc::channel();
        let backend: Option<Box<dyn WatchBackend>> = if config.enabled {
            Some(Box::new(NotifyBackend::new(sender.clone())?))
        } else {
            None
        };
        Ok(Self {
            backend,
            sender,
            receiver,
            registrations: HashMap::new(),
            watching: HashMap::new(),
            ignore_suffixes: config.ignore_suffixes.clone(),
        })
    }

    /// An observer driven by a caller-supplied backend
    pub fn with_backend(backend: Box<dyn WatchBackend>, ignore_suffixes: Vec<String>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            backend: Some(backend),
            sender,
            receiver,
            registrations: HashMap::new(),
            watching: HashMap::new(),
            ignore_suffixes,
        }
    }

    /// Sender feeding the event queue
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn is_observing(&self, id: ReflectionId) -> bool {
        self.watching.contains_key(&id)
    }

    /// Directories with an active registration
    pub fn watched_directories(&self) -> Vec<&Path> {
        let mut directories: Vec<&Path> = self.registrations.keys().map(PathBuf::as_path).collect();
        directories.sort();
        directories
    }

    /// Register `id` as interested in `directory`. An existing watch on the directory is
    /// cancelled and replaced.
    pub fn observe(&mut self, id: ReflectionId, directory: &Path) -> Result<(), MirrorError> {
        let key = watch_key(directory);
        let moved = self
            .watching
            .get(&id)
            .is_some_and(|previous| *previous != key);
        if moved {
            self.stop_observing(id)?;
        }

        if let Some(backend) = self.backend.as_mut() {
            if self.registrations.contains_key(&key) {
                backend.unwatch(&key)?;
            }
            backend.watch(&key)?;
        }

        self.registrations.entry(key.clone()).or_default().insert(id);
        debug!(reflection = %id, directory = %key.display(), "Observing directory");
        self.watching.insert(id, key);
        Ok(())
    }

    /// Withdraw `id`; the directory watch is cancelled once no reflection remains
    pub fn stop_observing(&mut self, id: ReflectionId) -> Result<(), MirrorError> {
        let Some(directory) = self.watching.remove(&id) else {
            return Ok(());
        };
        let Some(interested) = self.registrations.get_mut(&directory) else {
            return Ok(());
        };
        interested.remove(&id);
        if !interested.is_empty() {
            return Ok(());
        }
        self.registrations.remove(&directory);
        if let Some(backend) = self.backend.as_mut() {
            backend.unwatch(&directory)?;
        }
        debug!(directory = %directory.display(), "Stopped observing directory");
        Ok(())
    }

    /// Drain queued events into the reflections they concern, each listed once
    pub fn drain(&mut self) -> Vec<ReflectionId> {
        let mut affected = BTreeSet::new();
        let mut seen = BTreeSet::new();

        while let Ok(result) = self.receiver.try_recv() {
            let event = match result {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "Watch error");
                    continue;
                }
            };
            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }
            for path in event.paths {
                if self.is_ignored(&path) || !seen.insert(path.clone()) {
                    continue;
                }
                affected.extend(self.interested_in(&path));
            }
        }

        affected.into_iter().collect()
    }

    fn interested_in(&self, path: &Path) -> Vec<ReflectionId> {
        let mut ids = Vec::new();
        if let Some(parent) = path.parent() {
            if let Some(interested) = self.registrations.get(&watch_key(parent)) {
                ids.extend(interested.iter().copied());
            }
        }
        if let Some(interested) = self.registrations.get(&watch_key(path)) {
            ids.extend(interested.iter().copied());
        }
        ids
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let name = path.to_string_lossy();
        self.ignore_suffixes
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()))
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        for directory in self.registrations.keys() {
            if let Err(err) = backend.unwatch(directory) {
                debug!(directory = %directory.display(), error = %err, "Failed to cancel watch");
            }
        }
    }
}

/// Canonical form of a watched directory, or the path itself when it cannot be resolved
fn watch_key(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

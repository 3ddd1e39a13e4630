//! Identity-addressed access to the siblings of a leaf or the elements of a repeater.
//!
//! A sibling with identity `id` lives at `<directory>/<id>.<extension>`, where the extension
//! is the one derived for the reflection itself.

use super::{naming, read_path, Context, Reflection};
use crate::error::{path_resolution, MirrorError};
use crate::fs::TEMP_SUFFIX;
use crate::values::RemovalMethod;
use std::path::PathBuf;
use tracing::debug;

impl Reflection {
    /// Path of the sibling with identity `id`
    #[track_caller]
    pub fn sibling_path(&self, id: &str) -> PathBuf {
        let extension = self.attributes.extension();
        let file_name = naming::with_extension(id, extension.as_deref());
        if !naming::is_valid_segment(id) || !naming::is_valid_segment(&file_name) {
            path_resolution(format!("{:?} is not a valid identity", id));
        }
        self.directory.join(file_name)
    }

    pub fn get_id(&self, ctx: &Context<'_>, id: &str) -> Option<Vec<u8>> {
        read_path(self, ctx, &self.sibling_path(id))
    }

    /// Write one sibling; `None` removes only that sibling
    pub fn set_id(&self, ctx: &Context<'_>, id: &str, bytes: Option<Vec<u8>>) -> bool {
        let path = self.sibling_path(id);
        let Some(bytes) = bytes else {
            return self.remove_id(ctx, id).is_some();
        };
        if let Err(err) = ctx.fs.write_atomic(&path, &bytes) {
            self.report(ctx, MirrorError::io("write", &path, err));
            return false;
        }
        true
    }

    /// Remove one sibling per the removal method, returning its trash location if trashed
    pub fn remove_id(&self, ctx: &Context<'_>, id: &str) -> Option<PathBuf> {
        let path = self.sibling_path(id);
        if !ctx.fs.exists(&path) {
            return None;
        }
        match self.traits.removal_method() {
            RemovalMethod::Delete => {
                if let Err(err) = ctx.fs.remove(&path) {
                    self.report(ctx, MirrorError::io("delete", &path, err));
                    return None;
                }
                debug!(path = %path.display(), "Deleted sibling");
                Some(path)
            }
            RemovalMethod::Trash => match ctx.trash.put(&path) {
                Ok(handle) => Some(handle.map_or(path, |entry| entry.trashed_path)),
                Err(err) => {
                    self.report(ctx, err);
                    None
                }
            },
        }
    }

    /// Identities of every sibling whose extension matches, in file name order
    pub fn list_ids(&self, ctx: &Context<'_>) -> Vec<String> {
        let directory = &self.directory;
        if !ctx.fs.exists(directory) {
            return Vec::new();
        }
        let children = match ctx.fs.read_dir(directory) {
            Ok(children) => children,
            Err(err) => {
                self.report(ctx, MirrorError::io("list", directory, err));
                return Vec::new();
            }
        };

        let extension = self.attributes.extension();
        children
            .into_iter()
            .filter(|path| !ctx.fs.is_dir(path))
            .filter_map(|path| {
                let name = path.file_name()?.to_string_lossy().into_owned();
                if name.ends_with(TEMP_SUFFIX) {
                    return None;
                }
                let (stem, found) = naming::split(&name);
                match &extension {
                    Some(expected) if found.as_deref() == Some(expected.as_str()) => Some(stem),
                    Some(_) => None,
                    None => Some(name),
                }
            })
            .collect()
    }

    /// Bytes of every matching sibling, keyed by identity
    pub fn get_all(&self, ctx: &Context<'_>) -> Vec<(String, Vec<u8>)> {
        self.list_ids(ctx)
            .into_iter()
            .filter_map(|id| {
                let bytes = self.get_id(ctx, &id)?;
                Some((id, bytes))
            })
            .collect()
    }
}

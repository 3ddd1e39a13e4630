//! Graph Index
//!
//! Flattens a content tree into a single backing sequence that the mirror walks depth
//! first. Children are appended to the backing store when their parent is visited
//! (`rebase`), so a node's subtree is produced exactly once per build pass.
//!
//! The walk is iterative: the cursor keeps one pending sibling range per nesting level.

use crate::content::{flatten, Content};
use crate::reflection::ReflectionId;
use std::ops::Range;

/// One realized node in the backing sequence
#[derive(Debug, Clone)]
pub struct Entry {
    pub content: Content,
    /// Index within the backing sequence
    pub position: usize,
    /// Index among siblings
    pub offset: usize,
    /// The entry whose children include this one
    pub start: Option<usize>,
    pub previous: Option<usize>,
    pub next: Option<usize>,
    pub depth: usize,
    /// Identity path from the root, one segment per level
    pub identity: Vec<String>,
    pub reflection: Option<ReflectionId>,
}

/// The flattened sequence produced by one build pass
#[derive(Debug, Clone, Default)]
pub struct Backing {
    entries: Vec<Entry>,
    roots: usize,
}

impl Backing {
    pub fn new(roots: Vec<Content>) -> Self {
        let mut backing = Self::default();
        let range = backing.append(None, roots);
        backing.roots = range.len();
        backing
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Entry> {
        self.entries.get(position)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Top-level entries
    pub fn roots(&self) -> impl Iterator<Item = &Entry> {
        self.entries[..self.roots].iter()
    }

    /// Direct children of the entry at `position`
    pub fn children(&self, position: usize) -> impl Iterator<Item = &Entry> {
        self.entries
            .iter()
            .filter(move |entry| entry.start == Some(position))
    }

    fn append(&mut self, parent: Option<usize>, contents: Vec<Content>) -> Range<usize> {
        let begin = self.entries.len();
        let (depth, prefix) = match parent.and_then(|p| self.entries.get(p)) {
            Some(entry) => (entry.depth + 1, entry.identity.clone()),
            None => (0, Vec::new()),
        };

        let contents = flatten(contents);
        let count = contents.len();
        for (offset, content) in contents.into_iter().enumerate() {
            let position = begin + offset;
            let mut identity = prefix.clone();
            identity.push(content.identity_segment(offset));
            self.entries.push(Entry {
                content,
                position,
                offset,
                start: parent,
                previous: offset.checked_sub(1).map(|o| begin + o),
                next: (offset + 1 < count).then_some(position + 1),
                depth,
                identity,
                reflection: None,
            });
        }
        begin..self.entries.len()
    }
}

/// Depth-first traversal state over a [`Backing`]
pub struct Cursor<'a> {
    backing: &'a mut Backing,
    pending: Vec<Range<usize>>,
    current: Option<usize>,
}

impl<'a> Cursor<'a> {
    pub fn new(backing: &'a mut Backing) -> Self {
        let roots = 0..backing.roots;
        Self {
            backing,
            pending: vec![roots],
            current: None,
        }
    }

    /// Advance to the next entry in depth-first order
    pub fn advance(&mut self) -> Option<usize> {
        loop {
            let range = self.pending.last_mut()?;
            match range.next() {
                Some(position) => {
                    self.current = Some(position);
                    return Some(position);
                }
                None => {
                    self.pending.pop();
                }
            }
        }
    }

    /// Walk every entry, including entries appended by the visitor through `rebase`
    pub fn step<V>(&mut self, mut visitor: V)
    where
        V: FnMut(&mut Cursor<'a>, usize),
    {
        while let Some(position) = self.advance() {
            visitor(self, position);
        }
    }

    /// Append `children` of the current entry; they are walked before its later siblings
    pub fn rebase(&mut self, children: Vec<Content>) -> Range<usize> {
        let range = self.backing.append(self.current, children);
        if !range.is_empty() {
            self.pending.push(range.clone());
        }
        range
    }

    pub fn entry(&self, position: usize) -> &Entry {
        &self.backing.entries[position]
    }

    pub fn entry_mut(&mut self, position: usize) -> &mut Entry {
        &mut self.backing.entries[position]
    }

    /// Pending sibling ranges; bounded by nesting depth
    pub fn depth(&self) -> usize {
        self.pending.len()
    }
}

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::SongRecord;
use parking_lot::RwLock;

/// In-memory song catalog shared by the indexer and request handlers.
///
/// Songs keep the order they were inserted in. Cloning is cheap and every
/// clone sees the same entries.
#[derive(Clone, Default)]
pub struct Catalog {
    inner: Arc<RwLock<CatalogInner>>,
}

#[derive(Default)]
struct CatalogInner {
    entries: Vec<CatalogEntry>,
    by_id: HashMap<String, usize>,
}

struct CatalogEntry {
    song: SongRecord,
    root: PathBuf,
}

impl CatalogInner {
    fn reindex(&mut self) {
        self.by_id = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (entry.song.id.clone(), pos))
            .collect();
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_all(&self) -> Vec<SongRecord> {
        let guard = self.inner.read();
        guard.entries.iter().map(|entry| entry.song.clone()).collect()
    }

    pub fn get_by_id(&self, id: &str) -> Option<SongRecord> {
        let guard = self.inner.read();
        let pos = *guard.by_id.get(id)?;
        guard.entries.get(pos).map(|entry| entry.song.clone())
    }

    pub fn root_for(&self, id: &str) -> Option<PathBuf> {
        let guard = self.inner.read();
        let pos = *guard.by_id.get(id)?;
        guard.entries.get(pos).map(|entry| entry.root.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts `song` unless its id is already cataloged. Returns whether the
    /// song was added; the check and the insert happen under one lock.
    pub fn insert(&self, song: SongRecord, root: &Path) -> bool {
        let mut guard = self.inner.write();
        if guard.by_id.contains_key(&song.id) {
            return false;
        }
        let pos = guard.entries.len();
        guard.by_id.insert(song.id.clone(), pos);
        guard.entries.push(CatalogEntry {
            song,
            root: root.to_path_buf(),
        });
        true
    }

    /// Drops the given ids, returning how many were present.
    pub fn remove_ids(&self, ids: &[String]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut guard = self.inner.write();
        let before = guard.entries.len();
        guard
            .entries
            .retain(|entry| !ids.contains(entry.song.id.as_str()));
        let removed = before - guard.entries.len();
        if removed > 0 {
            guard.reindex();
        }
        removed
    }
}

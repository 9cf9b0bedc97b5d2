//! RefreshCache: incremental in-memory mirror of a NoteStore

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use ahash::RandomState;
use chrono::{DateTime, Utc};
use notestore::{Error, Note, NoteId, NoteStore, Result};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::stats::RefreshStats;

/// Cache-shaped view of the note corpus.
///
/// This is the whole surface offered to the API layer. Results are not
/// paginated, filtered or sorted.
pub trait NoteCache: Send + Sync {
    /// Every live note, in no particular order
    fn find_all(&self) -> Result<Vec<Note>>;

    /// One note; `NotFound` if absent after refreshing
    fn find_by_id(&self, id: &NoteId) -> Result<Note>;

    /// Insert (`id` is `None`) or update title and text; returns the stored note
    fn save(&self, note: &Note) -> Result<Note>;

    /// Soft-delete a note in the store and drop it from the cache
    fn delete(&self, id: &NoteId) -> Result<()>;
}

/// Configuration for a [`RefreshCache`]
#[derive(Clone)]
pub struct CacheConfig {
    /// Timestamp source for saves
    pub clock: Arc<dyn Clock>,
    /// Expected corpus size, used to presize the mirror
    pub initial_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock::new()),
            initial_capacity: 256,
        }
    }
}

impl CacheConfig {
    /// Create a cache config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different timestamp source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Read-through cache holding the full note corpus in memory.
///
/// A single sync gate serialises every sequence that talks to the store and
/// then touches the mirror (refresh, save write-back, delete). Lookups after
/// a refresh only take the mirror's read lock.
pub struct RefreshCache<S: NoteStore + ?Sized> {
    /// Backing store
    store: Arc<S>,

    /// id -> newest known state
    notes: RwLock<HashMap<NoteId, Note, RandomState>>,

    /// Held across store round-trips that feed the mirror
    sync: Mutex<()>,

    clock: Arc<dyn Clock>,

    stats: RefreshStats,
}

impl<S: NoteStore + ?Sized> RefreshCache<S> {
    /// Create an empty cache in front of `store`
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, CacheConfig::default())
    }

    /// Create an empty cache with explicit configuration
    pub fn with_config(store: Arc<S>, config: CacheConfig) -> Self {
        Self {
            store,
            notes: RwLock::new(HashMap::with_capacity_and_hasher(
                config.initial_capacity,
                RandomState::new(),
            )),
            sync: Mutex::new(()),
            clock: config.clock,
            stats: RefreshStats::new(),
        }
    }

    /// Get refresh statistics
    pub fn stats(&self) -> &RefreshStats {
        &self.stats
    }

    /// Notes currently mirrored (no refresh)
    pub fn len(&self) -> usize {
        self.notes.read().len()
    }

    /// Check if nothing is mirrored yet (no refresh)
    pub fn is_empty(&self) -> bool {
        self.notes.read().is_empty()
    }

    /// Newest `updated_at` in the mirror
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.notes.read().values().map(|n| n.updated_at).max()
    }

    /// Pull changes from the store. Caller holds the sync gate.
    fn refresh_locked(&self) -> Result<()> {
        let start = Instant::now();

        match self.last_seen() {
            None => {
                let pulled = self.store.scan_all()?;
                let count = pulled.len();
                self.upsert_all(pulled)?;
                self.stats.record_full(count);
                info!(
                    notes = count,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "full refresh"
                );
            }
            Some(last) => {
                let pulled = self.store.scan_updated_after(last)?;
                let count = pulled.len();
                self.upsert_all(pulled)?;
                self.stats.record_delta(count);
                debug!(
                    notes = count,
                    after = %last,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "delta refresh"
                );
            }
        }

        Ok(())
    }

    fn refresh(&self) -> Result<()> {
        let _gate = self.sync.lock();
        self.refresh_locked()
    }

    /// Fold store records into the mirror, keeping the newer state per id
    fn upsert_all(&self, pulled: Vec<Note>) -> Result<()> {
        let mut notes = self.notes.write();
        for note in pulled {
            let id = stored_id(&note)?;
            match notes.get(&id) {
                Some(cached) if cached.updated_at > note.updated_at => {}
                _ => {
                    notes.insert(id, note);
                }
            }
        }
        Ok(())
    }
}

impl<S: NoteStore + ?Sized> NoteCache for RefreshCache<S> {
    fn find_all(&self) -> Result<Vec<Note>> {
        self.refresh()?;
        Ok(self.notes.read().values().cloned().collect())
    }

    fn find_by_id(&self, id: &NoteId) -> Result<Note> {
        self.refresh()?;
        self.notes
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.clone()))
    }

    fn save(&self, note: &Note) -> Result<Note> {
        let _gate = self.sync.lock();
        // Catch up first so the write-back cannot advance the watermark
        // past changes still waiting in the store.
        self.refresh_locked()?;

        let now = self.clock.now();
        let saved = match &note.id {
            None => self
                .store
                .insert(&note.title, &note.text, &note.tags, now, now)?,
            Some(id) => self.store.update_fields(id, &note.title, &note.text, now)?,
        };
        self.stats.record_write();

        let id = stored_id(&saved)?;
        debug!(id = %id, "saved note");
        self.notes.write().insert(id, saved.clone());

        Ok(saved)
    }

    fn delete(&self, id: &NoteId) -> Result<()> {
        let _gate = self.sync.lock();

        self.store.mark_deleted(id)?;
        self.stats.record_delete();

        if self.notes.write().remove(id).is_none() {
            debug!(id = %id, "deleted note that was not cached");
        }
        Ok(())
    }
}

/// Id of a note that came back from the store
fn stored_id(note: &Note) -> Result<NoteId> {
    note.id
        .clone()
        .ok_or_else(|| Error::Malformed(format!("stored note '{}' has no id", note.title)))
}

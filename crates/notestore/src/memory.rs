//! In-process store backend

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::document::Documents;
use crate::error::Result;
use crate::note::{Note, NoteId};
use crate::store::NoteStore;

/// Store backed by a process-local document table.
///
/// Nothing survives the process; useful for tests and throwaway daemons.
#[derive(Debug, Default)]
pub struct MemoryNoteStore {
    docs: RwLock<Documents>,
}

impl MemoryNoteStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(Documents::new()),
        }
    }

    /// Number of live notes
    pub fn len(&self) -> usize {
        self.docs.read().live_count()
    }

    /// Check if the store holds no live notes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NoteStore for MemoryNoteStore {
    fn insert(
        &self,
        title: &str,
        text: &str,
        tags: &[String],
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Note> {
        let mut docs = self.docs.write();
        let doc = docs.inserted(title, text, tags, created_at, updated_at);
        let note = doc.to_note();
        docs.apply(doc);
        Ok(note)
    }

    fn update_fields(
        &self,
        id: &NoteId,
        title: &str,
        text: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Note> {
        let mut docs = self.docs.write();
        let doc = docs.updated(id, title, text, updated_at)?;
        let note = doc.to_note();
        docs.apply(doc);
        Ok(note)
    }

    fn mark_deleted(&self, id: &NoteId) -> Result<()> {
        let mut docs = self.docs.write();
        if let Some(tombstone) = docs.deleted(id)? {
            docs.apply(tombstone);
        }
        Ok(())
    }

    fn get_by_id(&self, id: &NoteId) -> Result<Note> {
        self.docs.read().live(id).map(|doc| doc.to_note())
    }

    fn scan_all(&self) -> Result<Vec<Note>> {
        Ok(self.docs.read().scan_all())
    }

    fn scan_updated_after(&self, after: DateTime<Utc>) -> Result<Vec<Note>> {
        Ok(self.docs.read().scan_updated_after(after))
    }
}

//! The store capability contract

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::note::{Note, NoteId};

/// Durable note storage.
///
/// Implementations soft-delete: a deleted record is kept but excluded from
/// `get_by_id` and both scans. Any note returned carries `Some(id)`.
pub trait NoteStore: Send + Sync {
    /// Insert a new note; the store assigns its id
    fn insert(
        &self,
        title: &str,
        text: &str,
        tags: &[String],
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Note>;

    /// Replace title and text of a live note and set `updated_at`.
    ///
    /// Returns the full refreshed record. `tags` and `created_at` are left
    /// untouched.
    fn update_fields(
        &self,
        id: &NoteId,
        title: &str,
        text: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Note>;

    /// Flag a note as deleted
    fn mark_deleted(&self, id: &NoteId) -> Result<()>;

    /// Point lookup; `NotFound` if absent or deleted
    fn get_by_id(&self, id: &NoteId) -> Result<Note>;

    /// Every live note
    fn scan_all(&self) -> Result<Vec<Note>>;

    /// Live notes with `updated_at` strictly after `after`, newest first
    fn scan_updated_after(&self, after: DateTime<Utc>) -> Result<Vec<Note>>;
}

//! The note entity

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque note identifier, assigned by the store on first insert
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A Markdown note.
///
/// `id` is `None` until the note has been persisted. `tags` and
/// `created_at` are fixed at creation; updates replace `title` and `text`
/// and bump `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Store-assigned identifier
    pub id: Option<NoteId>,
    /// Title line
    pub title: String,
    /// Markdown body
    pub text: String,
    /// Tags in insertion order
    pub tags: Vec<String>,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Last successful mutation
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Build a note stamped with the current time.
    ///
    /// Pass `None` for a note that has not been stored yet, or the id of an
    /// existing note to describe an update.
    pub fn new(
        id: Option<NoteId>,
        title: impl Into<String>,
        text: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            text: text.into(),
            tags,
            created_at: now,
            updated_at: now,
        }
    }
}

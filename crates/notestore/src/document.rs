//! Stored document table shared by the backends
//!
//! Every backend keeps the latest state of each document, tombstones
//! included, plus an ordered index of live documents by `updated_at`.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::note::{Note, NoteId};

/// Full stored state of one note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Document {
    pub id: NoteId,
    pub title: String,
    pub text: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted: bool,
}

impl Document {
    pub fn to_note(&self) -> Note {
        Note {
            id: Some(self.id.clone()),
            title: self.title.clone(),
            text: self.text.clone(),
            tags: self.tags.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Documents {
    docs: HashMap<NoteId, Document>,
    /// Live documents only
    by_updated: BTreeSet<(DateTime<Utc>, NoteId)>,
}

impl Documents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the document for a fresh insert without applying it
    pub fn inserted(
        &self,
        title: &str,
        text: &str,
        tags: &[String],
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Document {
        let mut id = NoteId::generate();
        while self.docs.contains_key(&id) {
            id = NoteId::generate();
        }
        Document {
            id,
            title: title.to_string(),
            text: text.to_string(),
            tags: tags.to_vec(),
            created_at,
            updated_at,
            deleted: false,
        }
    }

    /// Build the updated state of a live document without applying it.
    ///
    /// `updated_at` never lands before the document's `created_at`.
    pub fn updated(
        &self,
        id: &NoteId,
        title: &str,
        text: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Document> {
        let mut doc = self.live(id)?.clone();
        doc.title = title.to_string();
        doc.text = text.to_string();
        doc.updated_at = updated_at.max(doc.created_at);
        Ok(doc)
    }

    /// Build the tombstone for `id`.
    ///
    /// `Ok(None)` when the document is already deleted.
    pub fn deleted(&self, id: &NoteId) -> Result<Option<Document>> {
        match self.docs.get(id) {
            None => Err(Error::NotFound(id.clone())),
            Some(doc) if doc.deleted => Ok(None),
            Some(doc) => {
                let mut doc = doc.clone();
                doc.deleted = true;
                Ok(Some(doc))
            }
        }
    }

    /// Replace the stored state of a document, keeping the index in step
    pub fn apply(&mut self, doc: Document) {
        if let Some(old) = self.docs.get(&doc.id) {
            if !old.deleted {
                self.by_updated.remove(&(old.updated_at, old.id.clone()));
            }
        }
        if !doc.deleted {
            self.by_updated.insert((doc.updated_at, doc.id.clone()));
        }
        self.docs.insert(doc.id.clone(), doc);
    }

    pub fn live(&self, id: &NoteId) -> Result<&Document> {
        match self.docs.get(id) {
            Some(doc) if !doc.deleted => Ok(doc),
            _ => Err(Error::NotFound(id.clone())),
        }
    }

    pub fn scan_all(&self) -> Vec<Note> {
        self.docs
            .values()
            .filter(|doc| !doc.deleted)
            .map(Document::to_note)
            .collect()
    }

    pub fn scan_updated_after(&self, after: DateTime<Utc>) -> Vec<Note> {
        self.by_updated
            .iter()
            .rev()
            .take_while(|(updated_at, _)| *updated_at > after)
            .filter_map(|(_, id)| self.docs.get(id))
            .map(Document::to_note)
            .collect()
    }

    /// Number of live documents
    pub fn live_count(&self) -> usize {
        self.by_updated.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::UNIX_EPOCH + Duration::minutes(minutes)
    }

    fn insert(docs: &mut Documents, title: &str, minutes: i64) -> NoteId {
        let doc = docs.inserted(title, "", &[], at(minutes), at(minutes));
        let id = doc.id.clone();
        docs.apply(doc);
        id
    }

    #[test]
    fn test_scan_updated_after_is_strict_and_descending() {
        let mut docs = Documents::new();
        insert(&mut docs, "a", 1);
        insert(&mut docs, "b", 2);
        insert(&mut docs, "c", 3);

        let titles: Vec<_> = docs
            .scan_updated_after(at(1))
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, vec!["c", "b"]);
    }

    #[test]
    fn test_update_moves_index_entry() {
        let mut docs = Documents::new();
        let a = insert(&mut docs, "a", 1);
        insert(&mut docs, "b", 2);

        let doc = docs.updated(&a, "a2", "body", at(5)).unwrap();
        docs.apply(doc);

        assert_eq!(docs.live_count(), 2);
        let after = docs.scan_updated_after(at(2));
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].title, "a2");
        assert_eq!(after[0].created_at, at(1));
    }

    #[test]
    fn test_update_never_precedes_creation() {
        let mut docs = Documents::new();
        let a = insert(&mut docs, "a", 5);

        let doc = docs.updated(&a, "a2", "", at(3)).unwrap();
        assert_eq!(doc.updated_at, at(5));
        assert_eq!(doc.created_at, at(5));
    }

    #[test]
    fn test_tombstone_excluded_from_scans() {
        let mut docs = Documents::new();
        let a = insert(&mut docs, "a", 1);
        insert(&mut docs, "b", 2);

        let tombstone = docs.deleted(&a).unwrap().unwrap();
        docs.apply(tombstone);

        assert_eq!(docs.scan_all().len(), 1);
        assert!(docs.scan_updated_after(DateTime::UNIX_EPOCH).iter().all(|n| n.title == "b"));
        assert!(matches!(docs.live(&a), Err(Error::NotFound(_))));
        assert!(docs.deleted(&a).unwrap().is_none());
    }

    #[test]
    fn test_delete_unknown_is_not_found() {
        let docs = Documents::new();
        let result = docs.deleted(&NoteId::new("missing"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}

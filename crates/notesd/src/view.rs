//! JSON shape of a note on the wire

use chrono::{DateTime, SecondsFormat, Utc};
use notestore::{Error, Note};
use serde::Serialize;

/// A persisted note as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNote {
    pub id: String,
    pub title: String,
    pub text: String,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ApiNote {
    pub fn from_note(note: &Note) -> Result<Self, Error> {
        let id = note
            .id
            .as_ref()
            .ok_or_else(|| Error::Malformed(format!("note '{}' has no id", note.title)))?;
        Ok(Self {
            id: id.to_string(),
            title: note.title.clone(),
            text: note.text.clone(),
            tags: note.tags.clone(),
            created_at: format_timestamp(note.created_at),
            updated_at: format_timestamp(note.updated_at),
        })
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// `2021-09-01T10:00:00Z`
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

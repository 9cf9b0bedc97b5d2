//! Journal-file store backend
//!
//! File layout:
//! - `notes.db`: header followed by one JSON document per mutation
//!
//! Every insert, update and delete appends the note's full new state. On
//! open the journal is replayed and the last line for each id wins.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::warn;

use crate::document::{Document, Documents};
use crate::error::{Error, Result};
use crate::note::{Note, NoteId};
use crate::parser::{create_header, parse_header, parse_records, NOTEDB_MAGIC};
use crate::store::NoteStore;

/// Journal file name inside the store directory
const JOURNAL_FILE: &str = "notes.db";

/// Current journal format version
const FORMAT_VERSION: u32 = 1;

/// Maximum encoded record size (1 MB)
const MAX_RECORD_SIZE: usize = 1024 * 1024;

/// Durable store writing an append-only journal.
///
/// Lock order is `docs` then `journal`; every mutation holds the `docs`
/// write lock across its append so the journal and the table never diverge.
pub struct FileNoteStore {
    /// Journal file handle
    journal: Mutex<File>,

    /// Replayed document table
    docs: RwLock<Documents>,

    /// Records in the journal
    record_count: RwLock<u32>,

    /// Is the store closed?
    closed: RwLock<bool>,
}

impl FileNoteStore {
    /// Open or create a store at the given directory
    ///
    /// # Errors
    /// * `Unavailable` if the directory or journal cannot be accessed
    /// * `Malformed` if an existing journal fails to decode
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let journal_path = path.join(JOURNAL_FILE);
        let (journal, docs, record_count) = if journal_path.exists() {
            Self::open_existing(&journal_path)?
        } else {
            Self::create_new(&journal_path)?
        };

        Ok(FileNoteStore {
            journal: Mutex::new(journal),
            docs: RwLock::new(docs),
            record_count: RwLock::new(record_count),
            closed: RwLock::new(false),
        })
    }

    fn open_existing(journal_path: &Path) -> Result<(File, Documents, u32)> {
        let mut journal = OpenOptions::new()
            .read(true)
            .write(true)
            .open(journal_path)?;

        let mut buf = Vec::new();
        journal.read_to_end(&mut buf)?;

        let (body, header) = parse_header(&buf)?;
        if header.version != FORMAT_VERSION {
            return Err(Error::Malformed(format!(
                "unsupported journal version {}",
                header.version
            )));
        }

        let (records, used) = parse_records(body)?;
        let record_count = u32::try_from(records.len()).map_err(|_| {
            Error::Malformed(format!("{} records overflow the header", records.len()))
        })?;

        if used < body.len() {
            warn!(
                path = %journal_path.display(),
                bytes = body.len() - used,
                "dropping unterminated journal tail"
            );
            journal.set_len((buf.len() - body.len() + used) as u64)?;
        }

        let mut docs = Documents::new();
        for doc in records {
            docs.apply(doc);
        }

        journal.seek(SeekFrom::End(0))?;

        Ok((journal, docs, record_count))
    }

    fn create_new(journal_path: &Path) -> Result<(File, Documents, u32)> {
        let mut journal = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(journal_path)?;

        journal.write_all(&create_header(FORMAT_VERSION, 0))?;
        journal.sync_all()?;

        Ok((journal, Documents::new(), 0))
    }

    /// Number of live notes
    pub fn len(&self) -> usize {
        self.docs.read().live_count()
    }

    /// Check if the store holds no live notes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of journal records, tombstones and superseded states included
    pub fn record_count(&self) -> u32 {
        *self.record_count.read()
    }

    /// Close the store and fsync the journal
    pub fn close(&mut self) -> Result<()> {
        if *self.closed.read() {
            return Ok(());
        }

        let record_count = *self.record_count.read();
        let mut journal = self.journal.lock();
        journal.seek(SeekFrom::Start(NOTEDB_MAGIC.len() as u64 + 4))?;
        journal.write_all(&record_count.to_le_bytes())?;
        journal.sync_all()?;

        *self.closed.write() = true;

        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if *self.closed.read() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    /// Append one record. Caller holds the `docs` write lock.
    ///
    /// A failed write is cut back off the journal so the next append starts
    /// on a line boundary.
    fn append(&self, doc: &Document) -> Result<()> {
        let mut line = serde_json::to_vec(doc)?;
        if line.len() > MAX_RECORD_SIZE {
            return Err(Error::RecordTooLarge(line.len()));
        }
        line.push(b'\n');

        let mut record_count = self.record_count.write();
        let next = record_count
            .checked_add(1)
            .ok_or(Error::JournalFull(*record_count))?;

        let mut journal = self.journal.lock();
        let end = journal.seek(SeekFrom::End(0))?;
        if let Err(e) = journal.write_all(&line) {
            if let Err(trunc) = journal.set_len(end) {
                warn!("failed to truncate journal after short write: {}", trunc);
            }
            return Err(e.into());
        }

        *record_count = next;

        Ok(())
    }
}

impl NoteStore for FileNoteStore {
    fn insert(
        &self,
        title: &str,
        text: &str,
        tags: &[String],
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Note> {
        self.ensure_open()?;

        let mut docs = self.docs.write();
        let doc = docs.inserted(title, text, tags, created_at, updated_at);
        self.append(&doc)?;

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
        self.ensure_open()?;

        let mut docs = self.docs.write();
        let doc = docs.updated(id, title, text, updated_at)?;
        self.append(&doc)?;

        let note = doc.to_note();
        docs.apply(doc);
        Ok(note)
    }

    fn mark_deleted(&self, id: &NoteId) -> Result<()> {
        self.ensure_open()?;

        let mut docs = self.docs.write();
        if let Some(tombstone) = docs.deleted(id)? {
            self.append(&tombstone)?;
            docs.apply(tombstone);
        }
        Ok(())
    }

    fn get_by_id(&self, id: &NoteId) -> Result<Note> {
        self.ensure_open()?;
        self.docs.read().live(id).map(|doc| doc.to_note())
    }

    fn scan_all(&self) -> Result<Vec<Note>> {
        self.ensure_open()?;
        Ok(self.docs.read().scan_all())
    }

    fn scan_updated_after(&self, after: DateTime<Utc>) -> Result<Vec<Note>> {
        self.ensure_open()?;
        Ok(self.docs.read().scan_updated_after(after))
    }
}

impl Drop for FileNoteStore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

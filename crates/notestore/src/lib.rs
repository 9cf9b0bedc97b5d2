//! # notestore
//!
//! Document store for notes.
//!
//! ## Model
//! - Opaque string ids assigned on insert
//! - Field-level update of title/text with an `updatedAt` bump
//! - Soft delete: records are flagged, never removed, and excluded from scans
//! - Secondary index on `updatedAt` for "changed after T" scans
//!
//! ## Backends
//! - [`MemoryNoteStore`]: process-local table
//! - [`FileNoteStore`]: append-only journal file replayed on open

#![warn(missing_docs)]

mod document;
mod error;
mod journal;
mod memory;
mod note;
mod parser;
mod store;

pub use error::{Error, Result};
pub use journal::FileNoteStore;
pub use memory::MemoryNoteStore;
pub use note::{Note, NoteId};
pub use store::NoteStore;

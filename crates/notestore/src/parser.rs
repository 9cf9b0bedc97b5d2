//! Journal file format parser using nom
//!
//! File format:
//! ```text
//! NOTEDB1\n
//! [version: u32 LE]
//! [record_count: u32 LE]
//! ...one JSON document per line (\n-terminated)...
//! ```
//!
//! A record line holds the full state of one note after a mutation:
//! ```text
//! {"id":"..","title":"..","text":"..","tags":[..],"createdAt":"..","updatedAt":"..","deleted":false}
//! ```

use nom::{
    bytes::complete::{tag, take_until},
    character::complete::char,
    combinator::map,
    number::complete::le_u32,
    sequence::{preceded, terminated, tuple},
    IResult,
};

use crate::document::Document;
use crate::error::{Error, Result};

/// Magic header for journal files
pub const NOTEDB_MAGIC: &[u8] = b"NOTEDB1\n";

/// Total header size in bytes
pub const HEADER_LEN: usize = NOTEDB_MAGIC.len() + 8;

/// Journal file header
#[derive(Debug, Clone, PartialEq)]
pub struct JournalHeader {
    /// File format version
    pub version: u32,
    /// Number of records as of the last clean close
    pub record_count: u32,
}

/// Parse the journal header
pub fn parse_header(input: &[u8]) -> IResult<&[u8], JournalHeader> {
    map(
        preceded(tag(NOTEDB_MAGIC), tuple((le_u32, le_u32))),
        |(version, record_count)| JournalHeader {
            version,
            record_count,
        },
    )(input)
}

/// Create a journal header
pub fn create_header(version: u32, record_count: u32) -> Vec<u8> {
    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(NOTEDB_MAGIC);
    header.extend_from_slice(&version.to_le_bytes());
    header.extend_from_slice(&record_count.to_le_bytes());
    header
}

/// Split off one record line, without its trailing newline
pub fn parse_line(input: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(take_until("\n"), char('\n'))(input)
}

/// Decode every complete record after the header.
///
/// Also returns how many bytes those records span. Anything past that is an
/// unterminated line left by an interrupted append.
pub fn parse_records(mut input: &[u8]) -> Result<(Vec<Document>, usize)> {
    let total = input.len();
    let mut records = Vec::new();
    while let Ok((rest, line)) = parse_line(input) {
        let doc: Document = serde_json::from_slice(line).map_err(|e| {
            Error::Malformed(format!("record {}: {}", records.len() + 1, e))
        })?;
        records.push(doc);
        input = rest;
    }
    Ok((records, total - input.len()))
}

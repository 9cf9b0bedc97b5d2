//! # notecache
//!
//! Read-through incremental cache mirroring a [`notestore::NoteStore`].
//!
//! ## Architecture
//! - **Mirror**: AHash map holding the whole live corpus, no eviction
//! - **Refresh**: before every operation, pull notes changed after the
//!   newest `updated_at` already mirrored (full scan when empty)
//! - **Write-back**: saves land in the mirror as soon as the store accepts
//!   them, so a caller always reads its own writes
//!
//! Notes deleted in the store by another process stay visible until the
//! cache is rebuilt; the delta scan cannot observe tombstones.

#![warn(missing_docs)]

mod cache;
mod clock;
mod stats;

pub use cache::{CacheConfig, NoteCache, RefreshCache};
pub use clock::{Clock, SystemClock};
pub use stats::RefreshStats;

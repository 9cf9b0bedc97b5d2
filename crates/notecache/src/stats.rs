//! Refresh statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing how the cache has talked to its store
#[derive(Debug, Default)]
pub struct RefreshStats {
    full_refreshes: AtomicU64,
    delta_refreshes: AtomicU64,
    notes_pulled: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl RefreshStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a full scan that pulled `notes` notes
    pub fn record_full(&self, notes: usize) {
        self.full_refreshes.fetch_add(1, Ordering::Relaxed);
        self.notes_pulled.fetch_add(notes as u64, Ordering::Relaxed);
    }

    /// Record a delta scan that pulled `notes` notes
    pub fn record_delta(&self, notes: usize) {
        self.delta_refreshes.fetch_add(1, Ordering::Relaxed);
        self.notes_pulled.fetch_add(notes as u64, Ordering::Relaxed);
    }

    /// Record an insert or update forwarded to the store
    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a delete forwarded to the store
    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    /// Full scans performed
    pub fn full_refreshes(&self) -> u64 {
        self.full_refreshes.load(Ordering::Relaxed)
    }

    /// Delta scans performed
    pub fn delta_refreshes(&self) -> u64 {
        self.delta_refreshes.load(Ordering::Relaxed)
    }

    /// Notes received from all scans
    pub fn notes_pulled(&self) -> u64 {
        self.notes_pulled.load(Ordering::Relaxed)
    }

    /// Inserts and updates forwarded
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Deletes forwarded
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Average notes per scan (0.0 before the first scan)
    pub fn pulled_per_refresh(&self) -> f64 {
        let scans = self.full_refreshes() + self.delta_refreshes();
        if scans == 0 {
            0.0
        } else {
            self.notes_pulled() as f64 / scans as f64
        }
    }
}

// src/gps/store.rs
//! Double-buffered holder of the most recent fix
//!
//! The ingest task is the only writer. Any number of readers take copies
//! with [`FixStore::snapshot`]. Both sides go through one mutex, held only
//! for the copy and the role swap.

use super::data::Fix;
use crate::error::{GpsError, Result};
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};

struct Buffers {
    slots: [Fix; 2],
    front: usize,
    generation: u64,
    updated_at: Option<DateTime<Utc>>,
}

impl Buffers {
    fn back(&self) -> usize {
        1 - self.front
    }
}

pub struct FixStore {
    inner: Mutex<Buffers>,
}

impl FixStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Buffers {
                slots: [Fix::default(), Fix::default()],
                front: 0,
                generation: 0,
                updated_at: None,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Buffers>> {
        self.inner
            .lock()
            .map_err(|_| GpsError::LockPoisoned("fix store"))
    }

    /// Write `fix` into the back slot and make it the front one.
    /// The old front becomes the target of the next publish.
    pub fn publish(&self, fix: Fix) -> Result<()> {
        let now = Utc::now();
        let stale = {
            let mut buffers = self.lock()?;
            let back = buffers.back();
            let stale = std::mem::replace(&mut buffers.slots[back], fix);
            buffers.front = back;
            buffers.generation += 1;
            buffers.updated_at = Some(now);
            stale
        };
        // freed outside the critical section
        drop(stale);
        Ok(())
    }

    /// Copy the current front slot into caller-owned storage and return
    /// the generation it was published under (0 while empty)
    pub fn snapshot(&self, dest: &mut Fix) -> Result<u64> {
        let buffers = self.lock()?;
        dest.clone_from(&buffers.slots[buffers.front]);
        Ok(buffers.generation)
    }

    /// Get a clone of the current front slot
    pub fn latest(&self) -> Result<Fix> {
        let mut fix = Fix::default();
        self.snapshot(&mut fix)?;
        Ok(fix)
    }

    /// Number of publishes so far
    pub fn generation(&self) -> Result<u64> {
        Ok(self.lock()?.generation)
    }

    /// Seconds since the last publish, if any
    pub fn age_seconds(&self) -> Result<Option<i64>> {
        let updated_at = self.lock()?.updated_at;
        Ok(updated_at.map(|ts| Utc::now().signed_duration_since(ts).num_seconds()))
    }
}

impl Default for FixStore {
    fn default() -> Self {
        Self::new()
    }
}

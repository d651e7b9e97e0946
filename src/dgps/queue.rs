// src/dgps/queue.rs
//! Bounded FIFO with drop-oldest overflow
//!
//! `push` never waits for the consumer: with the ring full, the oldest item
//! is evicted and the new one appended under the same lock. `receive`
//! suspends the consumer until something is queued.

use crate::error::{GpsError, Result};
use log::warn;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

struct Ring<T> {
    items: VecDeque<T>,
    dropped: u64,
}

pub struct DeliveryQueue<T> {
    name: &'static str,
    capacity: usize,
    ring: Mutex<Ring<T>>,
    available: Notify,
}

impl<T> DeliveryQueue<T> {
    /// Create a queue holding at most `capacity` items (at least one)
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            capacity,
            ring: Mutex::new(Ring {
                items: VecDeque::with_capacity(capacity),
                dropped: 0,
            }),
            available: Notify::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ring<T>>> {
        self.ring
            .lock()
            .map_err(|_| GpsError::LockPoisoned(self.name))
    }

    /// Append `item`, evicting the oldest entry when full.
    /// Returns the evicted item, if any.
    pub fn push(&self, item: T) -> Result<Option<T>> {
        let (evicted, dropped) = {
            let mut ring = self.lock()?;
            let evicted = if ring.items.len() >= self.capacity {
                ring.dropped += 1;
                ring.items.pop_front()
            } else {
                None
            };
            ring.items.push_back(item);
            (evicted, ring.dropped)
        };

        if evicted.is_some() {
            warn!("{} queue full, dropped oldest item ({} dropped so far)", self.name, dropped);
        }
        self.available.notify_one();
        Ok(evicted)
    }

    /// Take the oldest item without waiting
    pub fn try_receive(&self) -> Result<Option<T>> {
        Ok(self.lock()?.items.pop_front())
    }

    /// Wait for and take the oldest item
    pub async fn receive(&self) -> Result<T> {
        loop {
            let notified = self.available.notified();
            if let Some(item) = self.try_receive()? {
                return Ok(item);
            }
            notified.await;
        }
    }

    /// Take everything currently queued, oldest first
    pub fn drain(&self) -> Result<Vec<T>> {
        Ok(self.lock()?.items.drain(..).collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.items.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.items.is_empty())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items evicted by overflow since creation
    pub fn dropped(&self) -> Result<u64> {
        Ok(self.lock()?.dropped)
    }
}

//! Snapshot-keyed cached accessor
//!
//! A cached value is only trusted while the pay-status snapshot it was fetched
//! under is still current. The stamp stored is the one taken *before* the
//! fetch, so a mutation that lands during the fetch makes the next `get`
//! refetch. No retry happens here: staleness corrects itself on next access.

use crate::error::Result;
use crate::types::PayStatusSnapshot;
use parking_lot::Mutex;
use std::future::Future;

#[derive(Debug, Clone)]
struct Stamped<T> {
    value: T,
    stamp: PayStatusSnapshot,
}

/// Lazily refreshed value keyed by the pay-status snapshot
#[derive(Debug)]
pub struct CachedValue<T> {
    slot: Mutex<Option<Stamped<T>>>,
}

impl<T: Clone> CachedValue<T> {
    /// Empty cache; the first `get` always fetches
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Last fetched value regardless of freshness
    pub fn peek(&self) -> Option<T> {
        self.slot.lock().as_ref().map(|s| s.value.clone())
    }

    /// Whether the cached value was fetched under `current`
    pub fn is_fresh(&self, current: &PayStatusSnapshot) -> bool {
        matches!(self.slot.lock().as_ref(), Some(s) if s.stamp == *current)
    }

    /// Return the cached value if fresh under `current`, otherwise fetch it
    ///
    /// `current` must be sampled by the caller right before this call; it is
    /// stored as the stamp of the fetched value.
    pub async fn get<F, Fut>(&self, current: PayStatusSnapshot, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.fresh_value(&current) {
            return Ok(value);
        }

        let value = fetch().await?;
        *self.slot.lock() = Some(Stamped {
            value: value.clone(),
            stamp: current,
        });
        Ok(value)
    }

    fn fresh_value(&self, current: &PayStatusSnapshot) -> Option<T> {
        match self.slot.lock().as_ref() {
            Some(s) if s.stamp == *current => Some(s.value.clone()),
            _ => None,
        }
    }
}

impl<T: Clone> Default for CachedValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

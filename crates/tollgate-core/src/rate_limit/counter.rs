//! Fixed-window request counters.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreResult;

/// Shared per-key request counters.
///
/// Increments must be atomic per key: concurrent callers on the same key
/// each observe a distinct count.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one request against `key` in the window starting at
    /// `window_start` (Unix seconds). Returns the count including this
    /// request. A newer window replaces an older one.
    async fn increment(&self, key: &str, window_start: i64, window: Duration) -> StoreResult<u64>;
}

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    start: i64,
    end: i64,
    count: u64,
}

/// Counters held in memory, one window per key.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    windows: DashMap<String, WindowCounter>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop counters whose window ended at or before `now` (Unix seconds).
    /// Returns the number removed.
    pub fn prune_expired(&self, now: i64) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, counter| counter.end > now);
        before - self.windows.len()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, window_start: i64, window: Duration) -> StoreResult<u64> {
        let end = window_start.saturating_add(window.as_secs() as i64);
        let mut counter = self
            .windows
            .entry(key.to_string())
            .or_insert(WindowCounter {
                start: window_start,
                end,
                count: 0,
            });

        if window_start > counter.start {
            *counter = WindowCounter {
                start: window_start,
                end,
                count: 0,
            };
        }
        counter.count += 1;
        Ok(counter.count)
    }
}

//! Bounded prefetch window ahead of the playback cursor
//!
//! Keeps at most `window` fetches in flight for the indices the cursor is
//! about to reach, cancels entries that fall outside the window after a
//! seek or stop, and never starts duplicate work for an index already in
//! flight.

use crate::error::Result;
use crate::frame_fetcher::{FrameFetcher, RawFrame};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// One in-flight (or completed, unconsumed) prefetch.
///
/// The `JoinHandle` doubles as the cancellation token: aborting it tears
/// the fetch down, and a late result from an aborted task is unreachable
/// because the entry has already left the list.
struct PrefetchEntry {
    index: usize,
    handle: JoinHandle<Result<RawFrame>>,
}

/// Sliding-window prefetch scheduler.
///
/// The entry list is a small ordered vector keyed by frame index; window
/// sizes are single digits, so linear scans beat any map.
pub struct PrefetchScheduler {
    entries: Vec<PrefetchEntry>,
    fetcher: Arc<FrameFetcher>,
    window: usize,
    looping: bool,
}

impl PrefetchScheduler {
    pub fn new(fetcher: Arc<FrameFetcher>, window: usize, looping: bool) -> Self {
        Self {
            entries: Vec::with_capacity(window),
            fetcher,
            window,
            looping,
        }
    }

    /// Number of outstanding entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The window target set for a cursor position, in fetch order.
    ///
    /// Non-looping: `current..current+window`, clipped at the sequence end.
    /// Looping: the next `window` indices with wrap-around.
    fn window_targets(&self, current: usize) -> Vec<usize> {
        let count = self.fetcher.frame_count();
        if count == 0 {
            return Vec::new();
        }
        if self.looping {
            (0..self.window.min(count))
                .map(|k| (current + k) % count)
                .collect()
        } else {
            (current..(current + self.window).min(count)).collect()
        }
    }

    /// Re-target the window at `current`: drop entries that fell outside,
    /// start fetches for targets not yet in flight.
    pub fn schedule(&mut self, current: usize) {
        let targets = self.window_targets(current);

        self.entries.retain(|entry| {
            if targets.contains(&entry.index) {
                true
            } else {
                log::debug!("cancelling prefetch for frame {} (left window)", entry.index);
                entry.handle.abort();
                false
            }
        });

        for &index in &targets {
            if self.entries.iter().any(|e| e.index == index) {
                continue;
            }
            let fetcher = self.fetcher.clone();
            let handle = tokio::spawn(async move { fetcher.fetch_frame(index).await });
            self.entries.push(PrefetchEntry { index, handle });
        }

        debug_assert!(self.entries.len() <= self.window);
    }

    /// Take the pending result for `index`, if prefetched.
    ///
    /// `None` tells the caller to fetch directly.
    pub fn consume(&mut self, index: usize) -> Option<JoinHandle<Result<RawFrame>>> {
        let position = self.entries.iter().position(|e| e.index == index)?;
        Some(self.entries.remove(position).handle)
    }

    /// Cancel every outstanding fetch and clear the window (stop / seek).
    pub fn cancel_all(&mut self) {
        if !self.entries.is_empty() {
            log::debug!("cancelling {} outstanding prefetches", self.entries.len());
        }
        for entry in self.entries.drain(..) {
            entry.handle.abort();
        }
    }

    /// Indices currently in flight, for diagnostics and tests.
    pub fn pending_indices(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.index).collect()
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

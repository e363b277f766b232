// src/mc/scheduler.rs
//! Dynamic chunk scheduling.
//!
//! Workers repeatedly claim the next unclaimed chunk of iteration indices
//! from one shared counter until the range is exhausted. Chunks always start
//! at a multiple of the chunk size; the last one may be short.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug)]
pub struct ChunkScheduler {
    next: AtomicUsize,
    total: usize,
    chunk: usize,
    aborted: AtomicBool,
}

impl ChunkScheduler {
    pub fn new(total: usize, chunk: usize) -> Self {
        debug_assert!(chunk > 0);
        ChunkScheduler {
            next: AtomicUsize::new(0),
            total,
            chunk,
            aborted: AtomicBool::new(false),
        }
    }

    /// Claim the next chunk, or `None` once the range is exhausted or the run
    /// was aborted.
    pub fn claim(&self) -> Option<Range<usize>> {
        if self.aborted.load(Ordering::Acquire) {
            return None;
        }
        let start = self.next.fetch_add(self.chunk, Ordering::Relaxed);
        if start >= self.total {
            return None;
        }
        Some(start..(start + self.chunk).min(self.total))
    }

    /// Stop handing out chunks; chunks already claimed still run to completion
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn chunk(&self) -> usize {
        self.chunk
    }
}

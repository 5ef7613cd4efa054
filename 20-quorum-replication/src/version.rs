//! Global version allocation for leader-originated mutations.

use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out strictly increasing versions, shared across every key.
///
/// A single counter gives the whole store a total order: comparing two
/// versions tells you which mutation the leader accepted later, even when
/// they touched different keys. The price is that unrelated writes contend
/// on one atomic.
#[derive(Debug, Default)]
pub struct VersionAllocator {
    last: AtomicU64,
}

impl VersionAllocator {
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Returns the next version. The first call returns 1.
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The most recently allocated version, or 0 if none has been handed out.
    pub fn current(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}

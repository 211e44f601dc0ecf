//! Per-frame lock word: optimistic reads, shared writes, exclusive faults.
//!
//! The whole lock state of a frame lives in a single `AtomicU64`:
//!
//! ```text
//!  63   62   61   60 ........ 48   47 ................................ 0
//! ┌────┬────┬────┬──────────────┬────────────────────────────────────┐
//! │EXCL│FLS │MOD │ write count  │             sequence               │
//! └────┴────┴────┴──────────────┴────────────────────────────────────┘
//! ```
//!
//! - An optimistic read lock is just the sequence sampled at acquire time
//!   (the stamp). Validation succeeds if the word, minus the flush bit and
//!   the write count, still equals the stamp: no exclusive holder, no active
//!   writer, and no completed write cycle since the stamp was taken.
//! - Releasing an exclusive or a write lock bumps the sequence.
//! - The flush lock excludes writers and exclusive holders, but not
//!   optimistic readers, since write-back never changes page bytes.
//!
//! # Memory Ordering
//! Page bytes are accessed with relaxed atomics. Lock acquisition issues a
//! release fence *after* setting its bits and *before* touching the bytes;
//! validation issues an acquire fence *after* the optimistic byte reads and
//! *before* reloading the word. A reader that saw any byte written under a
//! lock is therefore guaranteed to see that lock's bits (or a later
//! sequence) when it validates.

use std::fmt;
use std::sync::atomic::{fence, AtomicU64, Ordering};

const EXCL_MASK: u64 = 1 << 63;
const FLUSH_MASK: u64 = 1 << 62;
const MOD_MASK: u64 = 1 << 61;
const CNT_SHIFT: u32 = 48;
const CNT_UNIT: u64 = 1 << CNT_SHIFT;
const CNT_MASK: u64 = 0x1FFF << CNT_SHIFT;
const SEQ_MASK: u64 = CNT_UNIT - 1;
/// Bits an optimistic stamp is validated against.
const CHK_MASK: u64 = EXCL_MASK | MOD_MASK | SEQ_MASK;

/// Maximum number of concurrent write locks on one frame.
const MAX_WRITE_LOCKS: u64 = CNT_MASK >> CNT_SHIFT;

#[inline]
fn next_seq(state: u64) -> u64 {
    (state & !SEQ_MASK) | (state.wrapping_add(1) & SEQ_MASK)
}

/// The lock word of one frame.
pub struct PageLock {
    state: AtomicU64,
}

impl PageLock {
    /// An unlocked word with sequence zero.
    pub const fn new() -> Self {
        Self {
            state: AtomicU64::new(0),
        }
    }

    // ========================================================================
    // Optimistic read lock
    // ========================================================================

    /// Take an optimistic read stamp. Never blocks and never fails.
    ///
    /// If the frame is exclusively locked or write locked right now, the
    /// returned stamp simply won't validate.
    #[inline]
    pub fn try_optimistic_read_lock(&self) -> u64 {
        self.state.load(Ordering::Acquire) & SEQ_MASK
    }

    /// Whether no exclusive or write cycle overlapped the reads made since
    /// `stamp` was taken.
    #[inline]
    pub fn validate_read_lock(&self, stamp: u64) -> bool {
        fence(Ordering::Acquire);
        (self.state.load(Ordering::Relaxed) & CHK_MASK) == stamp
    }

    // ========================================================================
    // Exclusive lock (faults, eviction)
    // ========================================================================

    /// Try to take the exclusive lock. Fails if any writer, flusher, or
    /// other exclusive holder is active.
    pub fn try_exclusive_lock(&self) -> bool {
        let mut s = self.state.load(Ordering::Relaxed);
        loop {
            if s & (EXCL_MASK | FLUSH_MASK | CNT_MASK) != 0 {
                return false;
            }
            match self.state.compare_exchange_weak(
                s,
                s | EXCL_MASK,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    fence(Ordering::Release);
                    return true;
                }
                Err(actual) => s = actual,
            }
        }
    }

    /// Release the exclusive lock and return a fresh optimistic stamp.
    ///
    /// Only the exclusive holder may call this.
    pub fn unlock_exclusive(&self) -> u64 {
        let s = self.state.load(Ordering::Relaxed);
        debug_assert!(s & EXCL_MASK != 0, "unlock_exclusive without exclusive lock");
        let n = next_seq(s) & !EXCL_MASK;
        self.state.store(n, Ordering::Release);
        n & SEQ_MASK
    }

    /// Downgrade the exclusive lock straight into a write lock, with no
    /// window in which another exclusive holder could slip in.
    pub fn unlock_exclusive_and_take_write_lock(&self) {
        let s = self.state.load(Ordering::Relaxed);
        debug_assert!(s & EXCL_MASK != 0, "downgrade without exclusive lock");
        let n = ((next_seq(s) & !EXCL_MASK) + CNT_UNIT) | MOD_MASK;
        self.state.store(n, Ordering::Release);
        fence(Ordering::Release);
    }

    // ========================================================================
    // Write lock (write cursors; shared among writers)
    // ========================================================================

    /// Try to take a shared write lock. Fails while the frame is exclusively
    /// locked or flush locked, or if the writer count would overflow.
    pub fn try_write_lock(&self) -> bool {
        let mut s = self.state.load(Ordering::Relaxed);
        loop {
            let writers = (s & CNT_MASK) >> CNT_SHIFT;
            if s & (EXCL_MASK | FLUSH_MASK) != 0 || writers == MAX_WRITE_LOCKS {
                return false;
            }
            let n = (s + CNT_UNIT) | MOD_MASK;
            match self
                .state
                .compare_exchange_weak(s, n, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => {
                    fence(Ordering::Release);
                    return true;
                }
                Err(actual) => s = actual,
            }
        }
    }

    /// Release one write lock, completing a write cycle.
    pub fn unlock_write(&self) {
        let mut s = self.state.load(Ordering::Relaxed);
        loop {
            debug_assert!(s & CNT_MASK != 0, "unlock_write without write lock");
            let mut n = s - CNT_UNIT;
            if n & CNT_MASK == 0 {
                n &= !MOD_MASK;
            }
            n = next_seq(n);
            match self
                .state
                .compare_exchange_weak(s, n, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => s = actual,
            }
        }
    }

    // ========================================================================
    // Flush lock (write-back)
    // ========================================================================

    /// Try to take the flush lock. Excludes writers and exclusive holders.
    pub fn try_flush_lock(&self) -> bool {
        let mut s = self.state.load(Ordering::Relaxed);
        loop {
            if s & (EXCL_MASK | FLUSH_MASK | CNT_MASK) != 0 {
                return false;
            }
            match self.state.compare_exchange_weak(
                s,
                s | FLUSH_MASK,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => s = actual,
            }
        }
    }

    /// Release the flush lock. The sequence is left alone.
    pub fn unlock_flush(&self) {
        self.state.fetch_and(!FLUSH_MASK, Ordering::Release);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[inline]
    pub fn is_exclusively_locked(&self) -> bool {
        self.state.load(Ordering::Acquire) & EXCL_MASK != 0
    }

    #[inline]
    pub fn is_flush_locked(&self) -> bool {
        self.state.load(Ordering::Acquire) & FLUSH_MASK != 0
    }

    /// Number of write locks currently held.
    #[inline]
    pub fn write_lock_count(&self) -> u64 {
        (self.state.load(Ordering::Acquire) & CNT_MASK) >> CNT_SHIFT
    }

    /// Completed exclusive and write cycles, modulo 2^48.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.state.load(Ordering::Relaxed) & SEQ_MASK
    }
}

impl Default for PageLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PageLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state.load(Ordering::Relaxed);
        f.debug_struct("PageLock")
            .field("exclusive", &(s & EXCL_MASK != 0))
            .field("flush", &(s & FLUSH_MASK != 0))
            .field("writers", &((s & CNT_MASK) >> CNT_SHIFT))
            .field("sequence", &self.sequence())
            .finish()
    }
}

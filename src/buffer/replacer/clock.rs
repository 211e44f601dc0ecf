//! CLOCK (second chance) victim selection over frame usage counters.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::buffer::frame::Frame;
use crate::common::config::MAX_USAGE_COUNT;
use crate::common::FrameId;

/// Sweeps the frame array looking for a victim.
///
/// Frames are never pinned by optimistic readers, so "evictable" is decided
/// by two things only: the usage counter has drained to zero, and the frame
/// lock can be taken exclusively (no writer, flusher, or other fault holds
/// it). Every frame passed over has its usage counter decremented, which is
/// the second chance.
pub struct ClockReplacer {
    hand: AtomicUsize,
}

impl ClockReplacer {
    pub fn new() -> Self {
        Self {
            hand: AtomicUsize::new(0),
        }
    }

    /// Find a frame and return it exclusively locked.
    ///
    /// Gives up with `None` after enough sweeps to drain every usage counter
    /// from its maximum and still find nothing lockable.
    pub fn evict(&self, frames: &[Frame]) -> Option<FrameId> {
        if frames.is_empty() {
            return None;
        }

        let max_steps = frames.len() * (usize::from(MAX_USAGE_COUNT) + 2);
        for _ in 0..max_steps {
            let index = self.hand.fetch_add(1, Ordering::Relaxed) % frames.len();
            let frame = &frames[index];

            if !frame.decrement_usage() {
                continue;
            }
            if frame.lock().try_exclusive_lock() {
                return Some(FrameId::new(index));
            }
        }
        None
    }
}

impl Default for ClockReplacer {
    fn default() -> Self {
        Self::new()
    }
}

//! Observability hooks around cursor pins and unpins.
//!
//! Tracers have no say in control flow. The only contract is ordering: a
//! [`PinEvent`] brackets every pin (begin on creation, end on drop) and a
//! cursor reports `unpin` for a page before it pins anything again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::common::{PageId, SwapperId};

/// Receives pin/unpin notifications from cursors.
///
/// Every method has an empty default so implementations pick what they need.
pub trait PageCursorTracer: Send + Sync {
    /// A cursor starts binding to `page_id`.
    fn begin_pin(&self, _write_lock: bool, _page_id: PageId, _swapper_id: SwapperId) {}

    /// The page was resident.
    fn hit(&self, _page_id: PageId, _swapper_id: SwapperId) {}

    /// The page had to be faulted in.
    fn fault(&self, _page_id: PageId, _swapper_id: SwapperId) {}

    /// The bind attempt finished (successfully or not).
    fn end_pin(&self, _page_id: PageId, _swapper_id: SwapperId) {}

    /// A cursor let go of `page_id`.
    fn unpin(&self, _page_id: PageId, _swapper_id: SwapperId) {}
}

/// Scope of one pin attempt. Reports `end_pin` when dropped.
pub struct PinEvent {
    tracer: Arc<dyn PageCursorTracer>,
    page_id: PageId,
    swapper_id: SwapperId,
}

impl PinEvent {
    /// Open the scope and report `begin_pin`.
    pub fn begin(
        tracer: &Arc<dyn PageCursorTracer>,
        write_lock: bool,
        page_id: PageId,
        swapper_id: SwapperId,
    ) -> Self {
        tracer.begin_pin(write_lock, page_id, swapper_id);
        Self {
            tracer: Arc::clone(tracer),
            page_id,
            swapper_id,
        }
    }

    pub fn hit(&self) {
        self.tracer.hit(self.page_id, self.swapper_id);
    }

    pub fn fault(&self) {
        self.tracer.fault(self.page_id, self.swapper_id);
    }
}

impl Drop for PinEvent {
    fn drop(&mut self) {
        self.tracer.end_pin(self.page_id, self.swapper_id);
    }
}

/// Ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTracer;

impl PageCursorTracer for NullTracer {}

/// Forwards pin activity to `tracing` at TRACE level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTracer;

impl PageCursorTracer for LoggingTracer {
    fn begin_pin(&self, write_lock: bool, page_id: PageId, swapper_id: SwapperId) {
        trace!(
            target: "cursorcache::pin",
            event = "pin_begin",
            page_id = page_id.0,
            swapper_id = swapper_id.0,
            write_lock
        );
    }

    fn fault(&self, page_id: PageId, swapper_id: SwapperId) {
        trace!(
            target: "cursorcache::pin",
            event = "pin_fault",
            page_id = page_id.0,
            swapper_id = swapper_id.0
        );
    }

    fn unpin(&self, page_id: PageId, swapper_id: SwapperId) {
        trace!(
            target: "cursorcache::pin",
            event = "unpin",
            page_id = page_id.0,
            swapper_id = swapper_id.0
        );
    }
}

/// Counts pin activity across every cursor that reports to it.
#[derive(Debug, Default)]
pub struct CountingTracer {
    pins: AtomicU64,
    hits: AtomicU64,
    faults: AtomicU64,
    unpins: AtomicU64,
}

/// A point-in-time copy of a [`CountingTracer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PinCounts {
    pub pins: u64,
    pub hits: u64,
    pub faults: u64,
    pub unpins: u64,
}

impl CountingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> PinCounts {
        PinCounts {
            pins: self.pins.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            unpins: self.unpins.load(Ordering::Relaxed),
        }
    }
}

impl PageCursorTracer for CountingTracer {
    fn begin_pin(&self, _write_lock: bool, _page_id: PageId, _swapper_id: SwapperId) {
        self.pins.fetch_add(1, Ordering::Relaxed);
    }

    fn hit(&self, _page_id: PageId, _swapper_id: SwapperId) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn fault(&self, _page_id: PageId, _swapper_id: SwapperId) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    fn unpin(&self, _page_id: PageId, _swapper_id: SwapperId) {
        self.unpins.fetch_add(1, Ordering::Relaxed);
    }
}

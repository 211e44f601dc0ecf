//! Frame and swapper identifier types.

use std::fmt;

/// Identifies a frame in the page cache.
///
/// Cursors hold a `FrameId` instead of a reference so they never borrow the
/// pool; the frame is reached through the cache with `frames[frame_id.0]`.
///
/// # Example
/// ```
/// use cursorcache::FrameId;
///
/// let frame_id = FrameId::new(5);
/// assert_eq!(frame_id.0, 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Create a new FrameId.
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

/// Identifies the swapper (and so the paged file) a frame is bound to.
///
/// Ids are handed out by the cache when a file is mapped and never reused
/// while the cache lives. Zero means "unbound".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SwapperId(pub u32);

impl SwapperId {
    /// Marker stored in frames that hold no page.
    pub const UNBOUND: SwapperId = SwapperId(0);

    /// Whether this id names a real swapper.
    #[inline]
    pub fn is_bound(&self) -> bool {
        *self != Self::UNBOUND
    }
}

impl fmt::Display for SwapperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Swapper({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_new() {
        let fid = FrameId::new(10);
        assert_eq!(fid.0, 10);
    }

    #[test]
    fn test_frame_id_equality() {
        assert_eq!(FrameId::new(5), FrameId::new(5));
        assert_ne!(FrameId::new(5), FrameId::new(6));
    }

    #[test]
    fn test_frame_id_display() {
        assert_eq!(format!("{}", FrameId::new(42)), "Frame(42)");
    }

    #[test]
    fn test_swapper_id_unbound() {
        assert!(!SwapperId::UNBOUND.is_bound());
        assert!(SwapperId(3).is_bound());
        assert_eq!(format!("{}", SwapperId(3)), "Swapper(3)");
    }
}

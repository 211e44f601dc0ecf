//! Eviction policy implementations (replacers).
//!
//! Currently implements:
//! - [`ClockReplacer`] - CLOCK sweep over frame usage counters

mod clock;

pub use clock::ClockReplacer;

//! # Synthetic Tasks
//!
//! Data generators consumed by training glue. Generators are seeded and
//! deterministic; they produce batch-major `[trials, time, channels]` arrays
//! and own no model state.

pub mod flipflop;

pub use flipflop::{FlipFlopBatch, FlipFlopData};

//! # RNN Layer
//!
//! Sequence-level wrapper around the single-timestep cell in
//! [`crate::cells`]. The layer owns the timestep loop, threads synaptic
//! state across steps, and exposes the full voltage trajectory for
//! downstream analysis.

mod conductance;

pub use conductance::CbRnn;

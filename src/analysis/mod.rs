//! # Analysis of Trained Dynamics
//!
//! Offline tooling applied to a trained network: fixed-point identification
//! of the frozen update map and aggregate statistics over exported
//! parameters. Nothing in this module mutates the network.

pub mod efficacy;
pub mod fixed_points;

pub use efficacy::postsynaptic_efficacy;
pub use fixed_points::{
    CandidateStatus, FinderOptions, FixedPoint, FixedPointFinder, FixedPointSet, StateMap,
};

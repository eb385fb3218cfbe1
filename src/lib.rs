//! # CBRNN - Conductance-Based Recurrent Networks (Rust)
//!
//! Biologically constrained recurrent cells built on the Burn framework,
//! with short-term synaptic plasticity and fixed-point analysis of trained
//! dynamics.
//!
//! ## Features
//!
//! - **ConductanceCell**: discrete-time gated recurrence over a membrane
//!   voltage with Dale-constrained weights (excitatory rows non-negative,
//!   inhibitory rows non-positive, enforced for every raw parameter value)
//! - **Short-Term Plasticity**: depression/facilitation efficacies per
//!   presynaptic unit or per synapse, clamped to their biological range
//! - **CbRnn**: sequence layer that threads synaptic state over trials and
//!   exposes the full voltage trajectory
//! - **FixedPointFinder**: per-candidate gradient descent on the step
//!   residual with deduplication, robust outlier pruning, and Jacobians for
//!   stability classification
//! - **FlipFlop Task**: seeded generator for the windowed memory task
//! - **Named-Tensor Bundles**: serde-friendly parameter export for offline
//!   analysis
//!
//! ## Quick Start
//!
//! ```rust
//! use cbrnn::prelude::*;
//!
//! // The hidden population splits into excitatory and inhibitory halves
//! let partition = DalePartition::new(32).unwrap();
//!
//! assert_eq!(partition.excitatory(), 16);
//! assert_eq!(partition.type_of_unit(0), "excitatory");
//! assert_eq!(partition.type_of_unit(31), "inhibitory");
//! ```
//!
//! ## Cell-level Usage
//!
//! For direct cell access (single timestep processing):
//!
//! ```ignore
//! use cbrnn::prelude::*;
//!
//! let partition = DalePartition::new(64)?;
//! let cell = ConductanceCell::<Backend>::new(12, partition, &device)?
//!     .with_plasticity(PlasticityMode::Shared, &device);
//!
//! let synapses = cell.init_synapses(batch, &device);
//! let (output, state, synapses) = cell.forward(input, state, synapses);
//! ```

pub mod activation;
pub mod analysis;
pub mod cells;
pub mod error;
pub mod partition;
pub mod record;
pub mod rnn;
pub mod tasks;

pub mod prelude {
    pub use crate::activation::LogCosh;
    pub use crate::analysis::{
        CandidateStatus, FinderOptions, FixedPoint, FixedPointFinder, FixedPointSet, StateMap,
    };
    pub use crate::cells::{ConductanceCell, PlasticityMode, SynapticState};
    pub use crate::error::{CbrnnError, CbrnnResult};
    pub use crate::partition::DalePartition;
    pub use crate::record::TensorBundle;
    pub use crate::rnn::CbRnn;
    pub use crate::tasks::{FlipFlopBatch, FlipFlopData};
}

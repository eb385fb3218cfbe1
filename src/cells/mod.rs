//! # Recurrent Cell Implementation
//!
//! Single-timestep cells. A cell processes one timestep at a time and is
//! wrapped by the sequence layer in [`crate::rnn`] for whole trials.
//!
//! ## Variants
//!
//! The cell comes in three plasticity variants, fixed at construction via
//! [`PlasticityMode`]:
//!
//! | Variant | Synaptic state | Description |
//! |---------|----------------|-------------|
//! | `Static` | none | Pure conductance recurrence |
//! | `Shared` | `[batch, H]` | One depression/facilitation pair per presynaptic unit |
//! | `PerSynapse` | `[batch, H, H]` | One pair per synapse |
//!
//! ## Tensor Shapes
//!
//! Everything is batch-major:
//!
//! | Tensor | Shape | Description |
//! |--------|-------|-------------|
//! | `input` | `[batch, input_size]` | Input features |
//! | `state` | `[batch, hidden_size]` | Previous voltage state |
//! | `output` | `[batch, hidden_size]` | Firing rate with inhibitory units zeroed |
//! | `new_state` | `[batch, hidden_size]` | Updated voltage state |
//!
//! ## Example: Using the cell directly
//!
//! ```ignore
//! use cbrnn::cells::{ConductanceCell, PlasticityMode};
//! use cbrnn::partition::DalePartition;
//!
//! let device = Default::default();
//! let partition = DalePartition::new(32)?;
//! let cell = ConductanceCell::<Backend>::new(16, partition, &device)?
//!     .with_plasticity(PlasticityMode::Shared, &device);
//!
//! let synapses = cell.init_synapses(batch, &device);
//! let (output, state, synapses) = cell.forward(input, state, synapses);
//! ```

pub mod conductance_cell;
pub mod plasticity;

pub use conductance_cell::ConductanceCell;
pub use plasticity::{PlasticityMode, StpParams, SynapticState};

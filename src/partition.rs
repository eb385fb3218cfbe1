//! Excitatory/inhibitory population partition
//!
//! Dale's principle fixes the sign of every outgoing synapse of a neuron by
//! that neuron's population. The partition used here is the fixed half/half
//! split of the hidden units: the first `H/2` units are excitatory, the last
//! `H/2` are inhibitory.

use crate::error::{CbrnnError, CbrnnResult};
use burn::module::Module;
use burn::tensor::{backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

/// Fixed half/half excitatory/inhibitory split of a hidden population.
///
/// The partition is validated once at construction: an odd (or zero) hidden
/// size cannot be split and is rejected outright rather than silently
/// mis-partitioned.
#[derive(Module, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DalePartition {
    units: usize,
}

impl DalePartition {
    /// Creates a partition over `units` hidden units.
    ///
    /// Fails if `units` is zero or odd.
    pub fn new(units: usize) -> CbrnnResult<Self> {
        if units == 0 || units % 2 != 0 {
            return Err(CbrnnError::InvalidPartition(format!(
                "hidden size must be even and non-zero to split into \
                 excitatory/inhibitory halves, got {}",
                units
            )));
        }
        Ok(Self { units })
    }

    /// Total number of hidden units.
    pub fn units(&self) -> usize {
        self.units
    }

    /// Number of excitatory units (the first half).
    pub fn excitatory(&self) -> usize {
        self.units / 2
    }

    /// Whether `unit` belongs to the excitatory half.
    pub fn is_excitatory(&self, unit: usize) -> bool {
        unit < self.units / 2
    }

    /// Get the population of a unit ("excitatory" or "inhibitory")
    pub fn type_of_unit(&self, unit: usize) -> &'static str {
        if self.is_excitatory(unit) {
            "excitatory"
        } else {
            "inhibitory"
        }
    }

    /// Column of outgoing-weight signs, shape `[units, 1]`.
    ///
    /// Row `i` carries `+1` for excitatory units and `-1` for inhibitory
    /// units; multiplied against a non-negative magnitude matrix laid out
    /// `[pre, post]` it fixes the sign of every outgoing synapse.
    pub fn sign_column<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        let half = self.units / 2;
        let mut signs = vec![1.0f32; self.units];
        for sign in signs.iter_mut().skip(half) {
            *sign = -1.0;
        }
        Tensor::<B, 1>::from_floats(signs.as_slice(), device).reshape([self.units, 1])
    }

    /// Row mask, shape `[1, units]`, that zeroes inhibitory units.
    ///
    /// Applied to the firing rate when producing the externally visible
    /// output; the full state is retained internally.
    pub fn output_mask<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        let half = self.units / 2;
        let mut mask = vec![1.0f32; self.units];
        for value in mask.iter_mut().skip(half) {
            *value = 0.0;
        }
        Tensor::<B, 1>::from_floats(mask.as_slice(), device).reshape([1, self.units])
    }
}

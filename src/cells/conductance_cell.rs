//! Conductance-based gated recurrent cell
//!
//! A discrete-time recurrence over a membrane-voltage state vector with a
//! conductance-derived update gate and Dale-constrained recurrent weights,
//! optionally modulated by short-term synaptic plasticity.
//!
//! Tensor layout is batch-major throughout: states and inputs are
//! `[batch, features]`, the recurrent weight is `[pre, post]`. The layout is
//! fixed for the whole crate and validated at the cell boundary.

use crate::activation::LogCosh;
use crate::cells::plasticity::{PlasticityMode, StpParams, SynapticState};
use crate::error::{CbrnnError, CbrnnResult};
use crate::partition::DalePartition;
use burn::module::{Module, Param};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Tensor};

/// Sharpness of the log-cosh weight constraint (`β = 10 / w_scale`).
const WEIGHT_SHARPNESS: f32 = 10.0 / 0.192;
/// Per-step retention rate; fixed, not trainable.
const DEFAULT_DT: f32 = 0.1;
/// Scale of the per-population gate gain `A = 10 * σ(a)`.
const GAIN_SCALE: f32 = 10.0;

/// A conductance-based gated recurrent cell under Dale's principle.
///
/// This is an RNN cell that processes single time-steps. To run whole
/// sequences, see [`crate::rnn::CbRnn`].
///
/// The raw recurrent weight is unconstrained; the effective weight applied in
/// the recurrence fixes the sign of each row by population (excitatory rows
/// non-negative, inhibitory rows non-positive) through a smooth log-cosh
/// magnitude. Firing rates are always derived from the voltage state via a
/// logistic sigmoid and never stored.
///
/// # Type Parameters
/// * `B` - The backend type
#[derive(Module, Debug)]
pub struct ConductanceCell<B: Backend> {
    /// Raw recurrent weight, shape `[hidden, hidden]` laid out `[pre, post]`
    pub w: Param<Tensor<B, 2>>,
    /// Input projection, shape `[input, hidden]`
    pub w_in: Param<Tensor<B, 2>>,
    /// Recurrent bias, shape `[1, hidden]`
    pub bias: Param<Tensor<B, 2>>,
    /// Update-gate bias, shape `[1, hidden]`
    pub gate_bias: Param<Tensor<B, 2>>,
    /// Raw gate gain of the excitatory population (scalar)
    pub gain_exc: Param<Tensor<B, 1>>,
    /// Raw gate gain of the inhibitory population (scalar)
    pub gain_inh: Param<Tensor<B, 1>>,
    /// Short-term plasticity parameters (absent in the static variant)
    pub stp: Option<StpParams<B>>,
    #[module(skip)]
    input_size: usize,
    #[module(skip)]
    partition: DalePartition,
    /// Mode: 0=Static, 1=Shared, 2=PerSynapse
    #[module(skip)]
    mode: u8,
    #[module(skip)]
    dt: f32,
}

impl<B: Backend> ConductanceCell<B> {
    /// Creates a new cell without short-term plasticity.
    ///
    /// Fails fast on a zero input dimension; the excitatory/inhibitory split
    /// itself is validated by [`DalePartition::new`].
    pub fn new(
        input_size: usize,
        partition: DalePartition,
        device: &B::Device,
    ) -> CbrnnResult<Self> {
        if input_size == 0 {
            return Err(CbrnnError::InvalidConfig(
                "input dimension must be non-zero".to_string(),
            ));
        }
        let hidden_size = partition.units();
        let bound = 1.0 / (hidden_size as f64).sqrt();

        Ok(Self {
            w: Self::init_param([hidden_size, hidden_size], bound, device),
            w_in: Self::init_param([input_size, hidden_size], bound, device),
            bias: Self::init_param([1, hidden_size], bound, device),
            gate_bias: Self::init_param([1, hidden_size], bound, device),
            gain_exc: Self::init_param([1], bound, device),
            gain_inh: Self::init_param([1], bound, device),
            stp: None,
            input_size,
            partition,
            mode: 0, // PlasticityMode::Static
            dt: DEFAULT_DT,
        })
    }

    fn init_param<const D: usize>(
        shape: [usize; D],
        bound: f64,
        device: &B::Device,
    ) -> Param<Tensor<B, D>> {
        Param::from_tensor(Tensor::random(
            shape,
            Distribution::Uniform(-bound, bound),
            device,
        ))
    }

    /// Selects the plasticity variant and allocates its parameters.
    pub fn with_plasticity(mut self, mode: PlasticityMode, device: &B::Device) -> Self {
        self.mode = mode as u8;
        self.stp = match mode {
            PlasticityMode::Static => None,
            PlasticityMode::Shared => {
                Some(StpParams::new(self.partition.units(), false, device))
            }
            PlasticityMode::PerSynapse => {
                Some(StpParams::new(self.partition.units(), true, device))
            }
        };
        self
    }

    /// Overrides the per-step retention rate (must lie in `(0, 1]`).
    pub fn with_retention_rate(mut self, dt: f32) -> Self {
        if !(dt > 0.0 && dt <= 1.0) {
            panic!("retention rate must lie in (0, 1], got {}", dt);
        }
        self.dt = dt;
        self
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.partition.units()
    }

    pub fn partition(&self) -> DalePartition {
        self.partition
    }

    /// Get the current plasticity variant
    pub fn plasticity(&self) -> PlasticityMode {
        match self.mode {
            1 => PlasticityMode::Shared,
            2 => PlasticityMode::PerSynapse,
            _ => PlasticityMode::Static,
        }
    }

    pub fn retention_rate(&self) -> f32 {
        self.dt
    }

    /// Dale-constrained effective recurrent weight.
    ///
    /// Pure function of the raw parameter: a log-cosh magnitude with the sign
    /// of each row fixed by the presynaptic population, so excitatory rows are
    /// element-wise non-negative and inhibitory rows non-positive for every
    /// real-valued raw weight.
    pub fn effective_weight(&self) -> Tensor<B, 2> {
        let raw = self.w.val();
        let device = raw.device();
        let magnitude = LogCosh::forward(raw, WEIGHT_SHARPNESS);
        let signs = self.partition.sign_column::<B>(&device);
        magnitude.mul(signs)
    }

    /// Resting synaptic state for a batch (`None` in the static variant).
    pub fn init_synapses(&self, batch: usize, device: &B::Device) -> Option<SynapticState<B>> {
        self.stp.as_ref().map(|stp| stp.rest_state(batch, device))
    }

    /// Per-population gate gain row `[1, hidden]`: `10·σ(a_exc)` over the
    /// excitatory half, `10·σ(a_inh)` over the inhibitory half.
    fn gain_row(&self) -> Tensor<B, 2> {
        let half = self.partition.excitatory();
        let exc = activation::sigmoid(self.gain_exc.val())
            .mul_scalar(GAIN_SCALE)
            .unsqueeze::<2>()
            .expand([1, half]);
        let inh = activation::sigmoid(self.gain_inh.val())
            .mul_scalar(GAIN_SCALE)
            .unsqueeze::<2>()
            .expand([1, half]);
        Tensor::cat(vec![exc, inh], 1)
    }

    /// Conductance-derived update gate `g = dt · σ((A ⊙ r)|W| + x|P| + b_g)`.
    fn gate(&self, rate: &Tensor<B, 2>, input: &Tensor<B, 2>, w_eff: &Tensor<B, 2>) -> Tensor<B, 2> {
        let conductance = rate
            .clone()
            .mul(self.gain_row())
            .matmul(w_eff.clone().abs())
            .add(input.clone().matmul(self.w_in.val().abs()))
            .add(self.gate_bias.val());
        activation::sigmoid(conductance).mul_scalar(self.dt)
    }

    /// Convex blend of the retained state and the candidate update.
    fn blend(
        &self,
        state: Tensor<B, 2>,
        input: &Tensor<B, 2>,
        gate: Tensor<B, 2>,
        drive: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let candidate = drive
            .add(input.clone().matmul(self.w_in.val()))
            .add(self.bias.val());
        let retained = gate.clone().neg().add_scalar(1.0).mul(state);
        retained.add(gate.mul(candidate))
    }

    fn check_shapes(&self, input: &Tensor<B, 2>, state: &Tensor<B, 2>) {
        let [input_batch, input_dim] = input.dims();
        let [state_batch, state_dim] = state.dims();
        if input_dim != self.input_size
            || state_dim != self.partition.units()
            || input_batch != state_batch
        {
            panic!(
                "batch-major shape mismatch: input [{}, {}], state [{}, {}], \
                 cell expects input dim {} and hidden dim {}",
                input_batch,
                input_dim,
                state_batch,
                state_dim,
                self.input_size,
                self.partition.units()
            );
        }
    }

    /// Advances the cell by one timestep.
    ///
    /// Passing `None` for `synapses` in a plastic variant starts from the
    /// resting synaptic state. The visible output is the firing rate of the
    /// new state with inhibitory units zeroed; the full state is returned
    /// alongside it.
    ///
    /// # Arguments
    /// * `input` - Input features `[batch, input_size]`
    /// * `state` - Previous voltage state `[batch, hidden_size]`
    /// * `synapses` - Previous synaptic efficacies, if the variant carries them
    ///
    /// # Returns
    /// Tuple of (visible_output, new_state, new_synapses)
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
        state: Tensor<B, 2>,
        synapses: Option<SynapticState<B>>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>, Option<SynapticState<B>>) {
        self.check_shapes(&input, &state);
        let [batch, _] = state.dims();
        let device = input.device();

        let w_eff = self.effective_weight();
        let rate = activation::sigmoid(state.clone());

        // Synaptic efficacies advance on the presynaptic rate first; the
        // voltage update below sees the post-update efficacies.
        let synapses = match &self.stp {
            Some(stp) => {
                let previous =
                    synapses.unwrap_or_else(|| stp.rest_state(batch, &device));
                Some(stp.update(previous, rate.clone()))
            }
            None => None,
        };

        let drive: Tensor<B, 2> = match &synapses {
            None => rate.clone().matmul(w_eff.clone()),
            Some(SynapticState::Shared {
                depression,
                facilitation,
            }) => rate
                .clone()
                .mul(depression.clone())
                .mul(facilitation.clone())
                .matmul(w_eff.clone()),
            Some(SynapticState::PerSynapse {
                depression,
                facilitation,
            }) => {
                let scaled = depression
                    .clone()
                    .mul(facilitation.clone())
                    .mul(w_eff.clone().unsqueeze::<3>());
                rate.clone()
                    .unsqueeze_dim::<3>(1)
                    .matmul(scaled)
                    .squeeze(1)
            }
        };

        let gate = self.gate(&rate, &input, &w_eff);
        let new_state = self.blend(state, &input, gate, drive);

        let output = activation::sigmoid(new_state.clone())
            .mul(self.partition.output_mask::<B>(&device));

        (output, new_state, synapses)
    }

    /// One step of the frozen recurrence with synaptic efficacies pinned at
    /// rest (full vesicle availability, facilitation at its floor).
    ///
    /// This is the update map analyzed by the fixed-point solver: a pure
    /// function of `(state, input)` with no hidden synaptic dynamics.
    pub fn autonomous_step(&self, state: Tensor<B, 2>, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.check_shapes(&input, &state);
        let w_eff = self.effective_weight();
        let rate = activation::sigmoid(state.clone());

        let drive = match &self.stp {
            None => rate.clone().matmul(w_eff.clone()),
            Some(stp) if !stp.per_synapse() => rate
                .clone()
                .mul(stp.facilitation_floor())
                .matmul(w_eff.clone()),
            Some(stp) => rate
                .clone()
                .matmul(w_eff.clone().mul(stp.facilitation_floor())),
        };

        let gate = self.gate(&rate, &input, &w_eff);
        self.blend(state, &input, gate, drive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type Backend = NdArray<f32>;

    fn create_test_cell(hidden: usize) -> ConductanceCell<Backend> {
        let device = Default::default();
        let partition = DalePartition::new(hidden).unwrap();
        ConductanceCell::new(4, partition, &device).unwrap()
    }

    #[test]
    fn test_cell_creation() {
        let cell = create_test_cell(10);
        assert_eq!(cell.input_size(), 4);
        assert_eq!(cell.hidden_size(), 10);
        assert_eq!(cell.plasticity(), PlasticityMode::Static);
    }

    #[test]
    fn test_cell_rejects_zero_input_dim() {
        let device = Default::default();
        let partition = DalePartition::new(4).unwrap();
        assert!(ConductanceCell::<Backend>::new(0, partition, &device).is_err());
    }

    #[test]
    fn test_effective_weight_block_signs() {
        let device = Default::default();
        let mut cell = create_test_cell(6);

        // Arbitrary raw weights, including extreme magnitudes
        let raw = Tensor::<Backend, 2>::from_floats(
            [
                [-3.0, 0.0, 1.0e6, -1.0e6, 0.5, -0.5],
                [2.0, -2.0, 0.01, -0.01, 7.0, -7.0],
                [1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
                [-1.0, -1.0, -1.0, -1.0, -1.0, -1.0],
                [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                [1.0e6, -1.0e6, 3.0, -3.0, 0.1, -0.1],
            ],
            &device,
        );
        cell.w = Param::from_tensor(raw);

        let effective = cell.effective_weight();
        let values: Vec<f32> = effective.into_data().to_vec().unwrap();
        for row in 0..6 {
            for col in 0..6 {
                let value = values[row * 6 + col];
                assert!(value.is_finite());
                if row < 3 {
                    assert!(value >= 0.0, "excitatory row {} has {}", row, value);
                } else {
                    assert!(value <= 0.0, "inhibitory row {} has {}", row, value);
                }
            }
        }
    }

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let cell = create_test_cell(8);

        let batch = 3;
        let input = Tensor::<Backend, 2>::zeros([batch, 4], &device);
        let state = Tensor::<Backend, 2>::zeros([batch, 8], &device);

        let (output, new_state, synapses) = cell.forward(input, state, None);
        assert_eq!(output.dims(), [batch, 8]);
        assert_eq!(new_state.dims(), [batch, 8]);
        assert!(synapses.is_none());
    }

    #[test]
    fn test_forward_with_plasticity_threads_state() {
        let device = Default::default();
        let cell = create_test_cell(6).with_plasticity(PlasticityMode::Shared, &device);

        let input = Tensor::<Backend, 2>::ones([2, 4], &device);
        let state = Tensor::<Backend, 2>::zeros([2, 6], &device);

        let synapses = cell.init_synapses(2, &device);
        let (_, state, synapses) = cell.forward(input.clone(), state, synapses);
        let (_, _, synapses) = cell.forward(input, state, synapses);
        assert!(matches!(synapses, Some(SynapticState::Shared { .. })));
    }

    #[test]
    fn test_state_change() {
        let device = Default::default();
        let cell = create_test_cell(8);

        let input =
            Tensor::<Backend, 2>::random([2, 4], Distribution::Uniform(-1.0, 1.0), &device);
        let state = Tensor::<Backend, 2>::zeros([2, 8], &device);

        let (_, new_state, _) = cell.forward(input, state.clone(), None);
        let diff = (new_state - state).abs().mean().into_scalar();
        assert!(diff > 0.0, "State should change after forward pass");
    }

    #[test]
    fn test_inhibitory_output_masked() {
        let device = Default::default();
        let cell = create_test_cell(8);

        let input =
            Tensor::<Backend, 2>::random([2, 4], Distribution::Uniform(-1.0, 1.0), &device);
        let state =
            Tensor::<Backend, 2>::random([2, 8], Distribution::Uniform(-1.0, 1.0), &device);

        let (output, _, _) = cell.forward(input, state, None);
        let values: Vec<f32> = output.into_data().to_vec().unwrap();
        for row in 0..2 {
            for unit in 4..8 {
                assert_eq!(values[row * 8 + unit], 0.0);
            }
            for unit in 0..4 {
                assert!(values[row * 8 + unit] > 0.0);
            }
        }
    }

    #[test]
    fn test_idempotence_at_analytic_fixed_point() {
        // With zero weights the candidate term collapses to the bias, so the
        // voltage fixed point is exactly the bias row regardless of the gate.
        let device = Default::default();
        let mut cell = create_test_cell(4);
        cell.w = Param::from_tensor(Tensor::zeros([4, 4], &device));
        cell.w_in = Param::from_tensor(Tensor::zeros([4, 4], &device));
        let bias = Tensor::<Backend, 2>::from_floats([[0.3, -0.2, 0.1, 0.4]], &device);
        cell.bias = Param::from_tensor(bias.clone());

        let input = Tensor::<Backend, 2>::zeros([1, 4], &device);
        let mut state = bias;
        for _ in 0..3 {
            state = cell.autonomous_step(state.clone(), input.clone());
        }
        let residual = (state
            - Tensor::<Backend, 2>::from_floats([[0.3, -0.2, 0.1, 0.4]], &device))
        .abs()
        .mean()
        .into_scalar();
        assert!(residual < 1e-6, "fixed point drifted by {}", residual);
    }

    #[test]
    #[should_panic]
    fn test_forward_rejects_mismatched_shapes() {
        let device = Default::default();
        let cell = create_test_cell(8);

        let input = Tensor::<Backend, 2>::zeros([2, 5], &device);
        let state = Tensor::<Backend, 2>::zeros([2, 8], &device);
        cell.forward(input, state, None);
    }

    #[test]
    fn test_autonomous_step_matches_static_forward() {
        let device = Default::default();
        let cell = create_test_cell(6);

        let input =
            Tensor::<Backend, 2>::random([3, 4], Distribution::Uniform(-1.0, 1.0), &device);
        let state =
            Tensor::<Backend, 2>::random([3, 6], Distribution::Uniform(-1.0, 1.0), &device);

        let (_, stepped, _) = cell.forward(input.clone(), state.clone(), None);
        let autonomous = cell.autonomous_step(state, input);
        let diff = (stepped - autonomous).abs().mean().into_scalar();
        assert!(diff < 1e-6);
    }
}

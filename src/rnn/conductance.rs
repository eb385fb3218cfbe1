//! Conductance-based RNN layer
//!
//! Full RNN layer that handles sequence processing and synaptic-state
//! threading for the conductance cell. Input is always batch-major
//! `[batch, time, features]`; besides the per-step visible outputs the layer
//! returns the full voltage trajectory, which downstream fixed-point analysis
//! samples for candidate initial states.

use crate::cells::{ConductanceCell, PlasticityMode};
use crate::error::CbrnnResult;
use crate::partition::DalePartition;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Sequence layer over [`ConductanceCell`].
///
/// Synaptic efficacies are reset to rest at the start of every call and
/// threaded across timesteps internally; callers only manage the voltage
/// state.
///
/// # Type Parameters
/// * `B` - The backend type
#[derive(Module, Debug)]
pub struct CbRnn<B: Backend> {
    /// The cell processing individual timesteps
    cell: ConductanceCell<B>,
    /// Optional linear readout applied to the visible output
    readout: Option<Linear<B>>,
}

impl<B: Backend> CbRnn<B> {
    /// Creates a new sequence layer without plasticity or readout.
    pub fn new(
        input_size: usize,
        partition: DalePartition,
        device: &B::Device,
    ) -> CbrnnResult<Self> {
        Ok(Self {
            cell: ConductanceCell::new(input_size, partition, device)?,
            readout: None,
        })
    }

    /// Selects the cell's plasticity variant.
    pub fn with_plasticity(mut self, mode: PlasticityMode, device: &B::Device) -> Self {
        self.cell = self.cell.with_plasticity(mode, device);
        self
    }

    /// Adds a linear readout mapping the visible output to `classes` values.
    pub fn with_readout(mut self, classes: usize, device: &B::Device) -> Self {
        self.readout = Some(
            LinearConfig::new(self.cell.hidden_size(), classes)
                .with_bias(true)
                .init(device),
        );
        self
    }

    pub fn input_size(&self) -> usize {
        self.cell.input_size()
    }

    pub fn hidden_size(&self) -> usize {
        self.cell.hidden_size()
    }

    /// Output feature count after the optional readout.
    pub fn output_size(&self) -> usize {
        // Linear stores its weight as [d_input, d_output]
        self.readout
            .as_ref()
            .map(|linear| linear.weight.dims()[1])
            .unwrap_or_else(|| self.cell.hidden_size())
    }

    /// Borrow the underlying cell, e.g. for fixed-point analysis.
    pub fn cell(&self) -> &ConductanceCell<B> {
        &self.cell
    }

    /// Forward pass over a batch of trials.
    ///
    /// # Arguments
    /// * `input` - Input tensor `[batch, time, features]`
    /// * `state` - Optional initial voltage state `[batch, hidden_size]`
    ///
    /// # Returns
    /// Tuple of (outputs, trajectory) where:
    /// - outputs: `[batch, time, output_size]` per-step visible outputs
    /// - trajectory: `[batch, time, hidden_size]` full voltage states
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        state: Option<Tensor<B, 2>>,
    ) -> (Tensor<B, 3>, Tensor<B, 3>) {
        let [batch, seq_len, _] = input.dims();
        let device = input.device();

        let mut state = state
            .unwrap_or_else(|| Tensor::zeros([batch, self.cell.hidden_size()], &device));
        let mut synapses = self.cell.init_synapses(batch, &device);

        let mut outputs: Vec<Tensor<B, 2>> = Vec::with_capacity(seq_len);
        let mut trajectory: Vec<Tensor<B, 2>> = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            let step_input: Tensor<B, 2> = input.clone().narrow(1, t, 1).squeeze(1);

            let (mut output, new_state, new_synapses) =
                self.cell.forward(step_input, state, synapses);
            state = new_state;
            synapses = new_synapses;

            if let Some(ref readout) = self.readout {
                output = readout.forward(output);
            }

            outputs.push(output);
            trajectory.push(state.clone());
        }

        let outputs: Tensor<B, 3> = Tensor::stack(outputs, 1);
        let trajectory: Tensor<B, 3> = Tensor::stack(trajectory, 1);
        (outputs, trajectory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type Backend = NdArray<f32>;

    fn create_test_rnn() -> CbRnn<Backend> {
        let device = Default::default();
        let partition = DalePartition::new(12).unwrap();
        CbRnn::new(3, partition, &device).unwrap()
    }

    #[test]
    fn test_rnn_creation() {
        let rnn = create_test_rnn();
        assert_eq!(rnn.input_size(), 3);
        assert_eq!(rnn.hidden_size(), 12);
        assert_eq!(rnn.output_size(), 12);
    }

    #[test]
    fn test_rnn_forward_shapes() {
        let device = Default::default();
        let rnn = create_test_rnn();

        let input = Tensor::<Backend, 3>::zeros([4, 10, 3], &device);
        let (outputs, trajectory) = rnn.forward(input, None);

        assert_eq!(outputs.dims(), [4, 10, 12]);
        assert_eq!(trajectory.dims(), [4, 10, 12]);
    }

    #[test]
    fn test_rnn_with_readout() {
        let device = Default::default();
        let rnn = create_test_rnn().with_readout(2, &device);

        assert_eq!(rnn.output_size(), 2);

        let input = Tensor::<Backend, 3>::zeros([4, 10, 3], &device);
        let (outputs, trajectory) = rnn.forward(input, None);

        assert_eq!(outputs.dims(), [4, 10, 2]);
        assert_eq!(trajectory.dims(), [4, 10, 12]);
    }

    #[test]
    fn test_rnn_with_plasticity_runs() {
        let device = Default::default();
        let partition = DalePartition::new(8).unwrap();
        let rnn = CbRnn::<Backend>::new(3, partition, &device)
            .unwrap()
            .with_plasticity(PlasticityMode::PerSynapse, &device);

        let input =
            Tensor::<Backend, 3>::random([2, 6, 3], Distribution::Uniform(-1.0, 1.0), &device);
        let (outputs, _) = rnn.forward(input, None);
        assert_eq!(outputs.dims(), [2, 6, 8]);
    }

    #[test]
    fn test_rnn_with_initial_state() {
        let device = Default::default();
        let rnn = create_test_rnn();

        let input = Tensor::<Backend, 3>::zeros([2, 5, 3], &device);
        let initial = Tensor::<Backend, 2>::ones([2, 12], &device);

        let (_, trajectory_warm) = rnn.forward(input.clone(), Some(initial));
        let (_, trajectory_cold) = rnn.forward(input, None);

        let diff = (trajectory_warm - trajectory_cold)
            .abs()
            .mean()
            .into_scalar();
        assert!(diff > 0.0, "initial state should influence the trajectory");
    }
}

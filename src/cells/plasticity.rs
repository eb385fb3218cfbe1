//! Short-term synaptic plasticity (depression and facilitation)
//!
//! Tsodyks-Markram style dynamics: each synapse (or each presynaptic unit,
//! in the shared variant) carries a depression factor `X` tracking vesicle
//! availability and a facilitation factor `U` tracking release probability.
//! Both relax toward rest at learned per-unit rates and are consumed/boosted
//! by the presynaptic firing rate.

use burn::module::{Module, Param};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Tensor};

/// Lower bound of the plasticity decay gates.
const Z_MIN: f32 = 0.001;
/// Upper bound of the plasticity decay gates.
const Z_MAX: f32 = 0.1;
/// Scale of the facilitation ceiling: `u_cap = 0.9 * σ(c)`.
const CAP_SCALE: f32 = 0.9;

/// Plasticity variants of the conductance cell.
///
/// The variant is chosen once at construction; there is no per-call
/// dispatch on configuration strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PlasticityMode {
    /// No synaptic state; the recurrence uses the constrained weight as-is
    Static = 0,
    /// One depression/facilitation pair per presynaptic unit
    Shared = 1,
    /// One depression/facilitation pair per synapse
    PerSynapse = 2,
}

/// Synaptic efficacy state threaded through the recurrence.
///
/// Every element of `depression` lives in `[0, 1]`; every element of
/// `facilitation` is clamped into `[u_cap, 1]` after each update, where
/// `u_cap` is the per-unit facilitation floor derived from the parameters.
#[derive(Debug, Clone)]
pub enum SynapticState<B: Backend> {
    /// Per-presynaptic-unit efficacies, shape `[batch, hidden]`
    Shared {
        depression: Tensor<B, 2>,
        facilitation: Tensor<B, 2>,
    },
    /// Per-synapse efficacies, shape `[batch, hidden, hidden]` laid out `[batch, pre, post]`
    PerSynapse {
        depression: Tensor<B, 3>,
        facilitation: Tensor<B, 3>,
    },
}

/// Trainable parameters of the short-term plasticity dynamics.
///
/// Raw parameters are unconstrained; the effective decay gates and the
/// facilitation ceiling are bounded sigmoid transforms recomputed each step.
#[derive(Module, Debug)]
pub struct StpParams<B: Backend> {
    /// Raw depression-recovery parameter (`c_x`)
    pub depression_rate: Param<Tensor<B, 2>>,
    /// Raw facilitation-decay parameter (`c_u`)
    pub facilitation_rate: Param<Tensor<B, 2>>,
    /// Raw facilitation-ceiling parameter (`c_U`)
    pub facilitation_cap: Param<Tensor<B, 2>>,
    /// Whether efficacies are tracked per synapse or per presynaptic unit
    #[module(skip)]
    per_synapse: bool,
    #[module(skip)]
    hidden_size: usize,
}

impl<B: Backend> StpParams<B> {
    /// Creates plasticity parameters for a hidden population.
    ///
    /// Parameter shape is `[hidden, hidden]` in the per-synapse variant and
    /// `[1, hidden]` in the shared variant; initialization is uniform in
    /// `±1/sqrt(hidden)` like every other cell parameter.
    pub fn new(hidden_size: usize, per_synapse: bool, device: &B::Device) -> Self {
        let shape = if per_synapse {
            [hidden_size, hidden_size]
        } else {
            [1, hidden_size]
        };
        let bound = 1.0 / (hidden_size as f64).sqrt();
        let init = || {
            Param::from_tensor(Tensor::random(
                shape,
                Distribution::Uniform(-bound, bound),
                device,
            ))
        };

        Self {
            depression_rate: init(),
            facilitation_rate: init(),
            facilitation_cap: init(),
            per_synapse,
            hidden_size,
        }
    }

    pub fn per_synapse(&self) -> bool {
        self.per_synapse
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Bounded decay gate `z = z_min + (z_max - z_min) * σ(raw)`.
    fn decay_gate(raw: Tensor<B, 2>) -> Tensor<B, 2> {
        activation::sigmoid(raw)
            .mul_scalar(Z_MAX - Z_MIN)
            .add_scalar(Z_MIN)
    }

    /// Effective depression-recovery gate.
    pub fn depression_gate(&self) -> Tensor<B, 2> {
        Self::decay_gate(self.depression_rate.val())
    }

    /// Effective facilitation-decay gate.
    pub fn facilitation_gate(&self) -> Tensor<B, 2> {
        Self::decay_gate(self.facilitation_rate.val())
    }

    /// Facilitation ceiling and floor `u_cap = 0.9 * σ(c_U)`.
    ///
    /// Acts as the resting value of the facilitation state and as the lower
    /// clamp applied after every update.
    pub fn facilitation_floor(&self) -> Tensor<B, 2> {
        activation::sigmoid(self.facilitation_cap.val()).mul_scalar(CAP_SCALE)
    }

    /// Resting synaptic state: full vesicle availability, facilitation at its floor.
    pub fn rest_state(&self, batch: usize, device: &B::Device) -> SynapticState<B> {
        let hidden = self.hidden_size;
        if self.per_synapse {
            let floor3 = self.facilitation_floor().unsqueeze::<3>();
            SynapticState::PerSynapse {
                depression: Tensor::ones([batch, hidden, hidden], device),
                facilitation: floor3.expand([batch, hidden, hidden]),
            }
        } else {
            SynapticState::Shared {
                depression: Tensor::ones([batch, hidden], device),
                facilitation: self.facilitation_floor().expand([batch, hidden]),
            }
        }
    }

    /// Advances the synaptic state by one timestep driven by the presynaptic
    /// firing rate (`[batch, hidden]`, values in `[0, 1]`).
    ///
    /// Depression: `X' = z_x + (1 - z_x)·X - U·X·r`.
    /// Facilitation: `U' = u_cap·z_u + (1 - z_u)·U + u_cap·(1 - U)·r`,
    /// clamped element-wise into `[u_cap, 1]`.
    pub fn update(&self, state: SynapticState<B>, rate: Tensor<B, 2>) -> SynapticState<B> {
        let [batch, hidden] = rate.dims();
        match state {
            SynapticState::Shared {
                depression,
                facilitation,
            } => {
                let z_x = self.depression_gate();
                let z_u = self.facilitation_gate();
                let floor = self.facilitation_floor();

                let keep_x = z_x.clone().neg().add_scalar(1.0);
                let consumed = facilitation
                    .clone()
                    .mul(depression.clone())
                    .mul(rate.clone());
                let new_depression = keep_x.mul(depression).add(z_x).sub(consumed);

                let keep_u = z_u.clone().neg().add_scalar(1.0);
                let headroom = facilitation.clone().neg().add_scalar(1.0);
                let boosted = floor.clone().mul(headroom).mul(rate);
                let new_facilitation = keep_u
                    .mul(facilitation)
                    .add(floor.clone().mul(z_u))
                    .add(boosted)
                    .max_pair(floor.expand([batch, hidden]))
                    .clamp_max(1.0);

                SynapticState::Shared {
                    depression: new_depression,
                    facilitation: new_facilitation,
                }
            }
            SynapticState::PerSynapse {
                depression,
                facilitation,
            } => {
                // Consumption and boost are driven by the presynaptic rate,
                // broadcast along the postsynaptic axis.
                let rate_pre = rate.unsqueeze_dim::<3>(2);
                let z_x = self.depression_gate().unsqueeze::<3>();
                let z_u = self.facilitation_gate().unsqueeze::<3>();
                let floor = self.facilitation_floor().unsqueeze::<3>();

                let keep_x = z_x.clone().neg().add_scalar(1.0);
                let consumed = facilitation
                    .clone()
                    .mul(depression.clone())
                    .mul(rate_pre.clone());
                let new_depression = keep_x.mul(depression).add(z_x).sub(consumed);

                let keep_u = z_u.clone().neg().add_scalar(1.0);
                let headroom = facilitation.clone().neg().add_scalar(1.0);
                let boosted = floor.clone().mul(headroom).mul(rate_pre);
                let new_facilitation = keep_u
                    .mul(facilitation)
                    .add(floor.clone().mul(z_u))
                    .add(boosted)
                    .max_pair(floor.expand([batch, hidden, hidden]))
                    .clamp_max(1.0);

                SynapticState::PerSynapse {
                    depression: new_depression,
                    facilitation: new_facilitation,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type Backend = NdArray<f32>;

    #[test]
    fn test_gates_stay_bounded() {
        let device = Default::default();
        let stp = StpParams::<Backend>::new(8, false, &device);

        for value in stp.depression_gate().into_data().to_vec::<f32>().unwrap() {
            assert!(value >= Z_MIN && value <= Z_MAX);
        }
        for value in stp.facilitation_floor().into_data().to_vec::<f32>().unwrap() {
            assert!(value > 0.0 && value < CAP_SCALE);
        }
    }

    #[test]
    fn test_rest_state_shapes() {
        let device = Default::default();
        let shared = StpParams::<Backend>::new(6, false, &device);
        match shared.rest_state(3, &device) {
            SynapticState::Shared {
                depression,
                facilitation,
            } => {
                assert_eq!(depression.dims(), [3, 6]);
                assert_eq!(facilitation.dims(), [3, 6]);
            }
            _ => panic!("expected shared state"),
        }

        let dense = StpParams::<Backend>::new(6, true, &device);
        match dense.rest_state(2, &device) {
            SynapticState::PerSynapse {
                depression,
                facilitation,
            } => {
                assert_eq!(depression.dims(), [2, 6, 6]);
                assert_eq!(facilitation.dims(), [2, 6, 6]);
            }
            _ => panic!("expected per-synapse state"),
        }
    }

    #[test]
    fn test_facilitation_clamped_between_floor_and_one() {
        let device = Default::default();
        let stp = StpParams::<Backend>::new(4, false, &device);
        let floor: Vec<f32> = stp
            .facilitation_floor()
            .into_data()
            .to_vec()
            .unwrap();

        // Arbitrary prior state and a saturated firing rate
        let state = SynapticState::Shared {
            depression: Tensor::<Backend, 2>::from_floats([[0.2, 0.9, 0.5, 1.0]], &device),
            facilitation: Tensor::<Backend, 2>::from_floats([[0.0, 1.0, 0.3, 0.7]], &device),
        };
        let rate = Tensor::<Backend, 2>::from_floats([[1.0, 1.0, 0.5, 0.0]], &device);

        match stp.update(state, rate) {
            SynapticState::Shared { facilitation, .. } => {
                let values: Vec<f32> = facilitation.into_data().to_vec().unwrap();
                for (value, lo) in values.iter().zip(floor.iter()) {
                    assert!(
                        *value >= *lo - 1e-6 && *value <= 1.0 + 1e-6,
                        "facilitation {} escaped [{}, 1]",
                        value,
                        lo
                    );
                }
            }
            _ => panic!("expected shared state"),
        }
    }

    #[test]
    fn test_silent_units_relax_toward_rest() {
        let device = Default::default();
        let stp = StpParams::<Backend>::new(2, false, &device);

        // With zero firing, depression recovers toward 1
        let mut depression = Tensor::<Backend, 2>::from_floats([[0.1, 0.4]], &device);
        let rate = Tensor::<Backend, 2>::zeros([1, 2], &device);
        let mut facilitation = stp.facilitation_floor();

        for _ in 0..500 {
            let next = stp.update(
                SynapticState::Shared {
                    depression: depression.clone(),
                    facilitation: facilitation.clone(),
                },
                rate.clone(),
            );
            match next {
                SynapticState::Shared {
                    depression: x,
                    facilitation: u,
                } => {
                    depression = x;
                    facilitation = u;
                }
                _ => unreachable!(),
            }
        }

        for value in depression.into_data().to_vec::<f32>().unwrap() {
            assert!(value > 0.95, "depression did not recover: {}", value);
        }
    }
}

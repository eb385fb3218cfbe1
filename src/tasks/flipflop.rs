//! Windowed flip-flop memory task
//!
//! A synthetic working-memory task: each channel receives sparse ±1 input
//! pulses; the network must raise a persistent output only when two pulses of
//! the same sign arrive close together, hold it, and let it relax back to
//! zero when no reinforcing pair arrives for a while.

use ndarray::Array3;
use rand::prelude::*;

/// One generated batch of trials, batch-major `[trials, time, bits]`.
#[derive(Clone, Debug)]
pub struct FlipFlopBatch {
    pub inputs: Array3<f32>,
    pub targets: Array3<f32>,
}

/// Seeded generator for the windowed flip-flop memory task.
///
/// Target policy: when a pulse lands within `t_window - 1` steps of an
/// earlier same-sign pulse on the same channel, the target takes the sign of
/// the second pulse from that timestep onward and the hold counter restarts.
/// The counter advances on every step with a non-zero target; once it
/// exceeds `t_relax` the target is cleared from the current step onward.
///
/// # Example
///
/// ```rust
/// use cbrnn::tasks::FlipFlopData;
///
/// let mut generator = FlipFlopData::new(2, 42).with_trial_length(50);
/// let batch = generator.generate(8);
/// assert_eq!(batch.inputs.dim(), (8, 50, 2));
/// assert_eq!(batch.targets.dim(), (8, 50, 2));
/// ```
#[derive(Clone, Debug)]
pub struct FlipFlopData {
    n_bits: usize,
    n_time: usize,
    pulse_prob: f64,
    t_window: usize,
    t_relax: usize,
    rng: StdRng,
}

impl FlipFlopData {
    /// Creates a generator with the reference defaults: 100 timesteps,
    /// pulse probability 0.5, pairing window 5, relax time 100.
    pub fn new(n_bits: usize, seed: u64) -> Self {
        Self {
            n_bits,
            n_time: 100,
            pulse_prob: 0.5,
            t_window: 5,
            t_relax: 100,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn with_trial_length(mut self, n_time: usize) -> Self {
        self.n_time = n_time;
        self
    }

    pub fn with_pulse_prob(mut self, pulse_prob: f64) -> Self {
        self.pulse_prob = pulse_prob;
        self
    }

    pub fn with_window(mut self, t_window: usize) -> Self {
        self.t_window = t_window;
        self
    }

    pub fn with_relax(mut self, t_relax: usize) -> Self {
        self.t_relax = t_relax;
        self
    }

    pub fn n_bits(&self) -> usize {
        self.n_bits
    }

    pub fn n_time(&self) -> usize {
        self.n_time
    }

    /// Generates a batch of trials with matching targets.
    pub fn generate(&mut self, n_trials: usize) -> FlipFlopBatch {
        let mut inputs = Array3::<f32>::zeros((n_trials, self.n_time, self.n_bits));
        for trial in 0..n_trials {
            for t in 0..self.n_time {
                for bit in 0..self.n_bits {
                    // Every trial opens with a pulse on every channel
                    if t == 0 || self.rng.gen_bool(self.pulse_prob) {
                        let sign = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                        inputs[[trial, t, bit]] = sign;
                    }
                }
            }
        }
        let targets = self.compute_targets(&inputs);
        FlipFlopBatch { inputs, targets }
    }

    /// Computes targets for arbitrary pulse sequences.
    ///
    /// Exposed separately so the pairing/relax policy is testable on
    /// hand-built inputs; a function that solves the task maps
    /// `inputs[i]` to `compute_targets(inputs)[i]` for every trial.
    pub fn compute_targets(&self, inputs: &Array3<f32>) -> Array3<f32> {
        let (n_trials, n_time, n_bits) = inputs.dim();
        let mut targets = Array3::<f32>::zeros((n_trials, n_time, n_bits));

        for trial in 0..n_trials {
            for bit in 0..n_bits {
                let mut level = 0.0f32;
                let mut held = 0usize;

                for t in 0..n_time {
                    let pulse = inputs[[trial, t, bit]];
                    if pulse != 0.0 {
                        let window_start = t.saturating_sub(self.t_window.saturating_sub(1));
                        let reinforced = (window_start..t)
                            .any(|u| inputs[[trial, u, bit]] * pulse > 0.0);
                        if reinforced {
                            level = pulse.signum();
                            held = 0;
                        }
                    }

                    if level != 0.0 {
                        held += 1;
                        if held > self.t_relax {
                            level = 0.0;
                            held = 0;
                        }
                    }

                    targets[[trial, t, bit]] = level;
                }
            }
        }

        targets
    }
}

//! Fixed-point identification for trained recurrent dynamics
//!
//! Given a frozen single-step update map and a set of candidate initial
//! states, each candidate independently descends the squared residual
//! `‖F(s, x) - s‖²` under a fixed input `x`. Converged candidates are
//! deduplicated by a minimum separation distance and pruned of distance
//! outliers; each surviving fixed point carries a finite-difference Jacobian
//! of the map for downstream stability classification.
//!
//! Candidates never interact during optimization, so the batched evaluation
//! used here is purely a performance choice. Per-candidate failure
//! (divergence, exhausted iteration budget) is a status in the returned
//! collection, never an error.

use crate::cells::ConductanceCell;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{Distribution, Tensor};
use ndarray::{Array1, Array2};
use rand::prelude::*;

/// Perturbation used for finite-difference Jacobians.
const JACOBIAN_EPS: f32 = 1e-4;

/// A single-step state map with frozen parameters.
///
/// Implementors must be pure in `(states, inputs)`: repeated application to
/// the same arguments yields the same result, and concurrent evaluation of
/// independent state copies is safe.
pub trait StateMap<B: Backend>: Send {
    /// Dimension of the state vectors the map operates on.
    fn state_size(&self) -> usize;

    /// Applies one update step to a batch of states under a batch of inputs,
    /// both batch-major.
    fn apply(&self, states: Tensor<B, 2>, inputs: Tensor<B, 2>) -> Tensor<B, 2>;
}

impl<B: Backend> StateMap<B> for ConductanceCell<B> {
    fn state_size(&self) -> usize {
        self.hidden_size()
    }

    fn apply(&self, states: Tensor<B, 2>, inputs: Tensor<B, 2>) -> Tensor<B, 2> {
        self.autonomous_step(states, inputs)
    }
}

/// Terminal status of one candidate optimization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateStatus {
    /// Converged and survived deduplication and outlier pruning
    Accepted,
    /// Converged within the separation distance of an accepted point
    Duplicate,
    /// Converged but rejected as a distance outlier
    Outlier,
    /// Iteration budget reached without meeting the tolerance
    Exhausted,
    /// Residual left the finite range; the last finite state is reported
    Diverged,
}

/// An approximate fixed point produced by the solver.
#[derive(Clone, Debug)]
pub struct FixedPoint {
    /// Final state of the candidate optimization
    pub state: Array1<f32>,
    /// Euclidean residual `‖F(s, x) - s‖` at the final state
    pub residual: f32,
    /// Gradient-descent iterations spent on this candidate
    pub iterations: usize,
    pub status: CandidateStatus,
    /// Jacobian `∂F/∂s` at the fixed point; computed for accepted points only
    pub jacobian: Option<Array2<f32>>,
}

/// Solver output: the accepted fixed points plus every candidate with its
/// terminal status. Candidates are never silently dropped.
#[derive(Clone, Debug)]
pub struct FixedPointSet {
    pub accepted: Vec<FixedPoint>,
    pub candidates: Vec<FixedPoint>,
}

/// Hyperparameters of the fixed-point search.
#[derive(Clone, Debug)]
pub struct FinderOptions {
    /// Iteration budget per candidate
    pub max_iters: usize,
    /// Initial gradient-descent step size
    pub lr_init: f32,
    /// Multiplicative step-size decay applied when the residual plateaus
    pub lr_decay: f32,
    /// Convergence threshold on the Euclidean residual
    pub tolerance: f32,
    /// Minimum pairwise separation between distinct fixed points
    pub min_separation: f32,
    /// Scale of the robust distance-outlier threshold
    pub outlier_distance_scale: f32,
    /// Print periodic progress
    pub verbose: bool,
}

impl Default for FinderOptions {
    fn default() -> Self {
        Self {
            max_iters: 5000,
            lr_init: 1.0,
            lr_decay: 0.5,
            tolerance: 1e-6,
            min_separation: 1e-3,
            outlier_distance_scale: 10.0,
            verbose: false,
        }
    }
}

/// Internal optimization phase of one candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Active,
    Converged,
    Exhausted,
    Diverged,
}

/// Fixed-point finder over any [`StateMap`].
///
/// # Type Parameters
/// * `B` - An autodiff backend; gradients of the residual with respect to the
///   candidate states come from the backward pass.
pub struct FixedPointFinder<B: AutodiffBackend> {
    options: FinderOptions,
    device: B::Device,
}

impl<B: AutodiffBackend> FixedPointFinder<B> {
    pub fn new(device: &B::Device) -> Self {
        Self {
            options: FinderOptions::default(),
            device: device.clone(),
        }
    }

    pub fn with_options(mut self, options: FinderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &FinderOptions {
        &self.options
    }

    /// Draws noise-corrupted samples of visited states to seed the search.
    ///
    /// # Arguments
    /// * `trajectories` - Voltage trajectories `[batch, time, hidden]` as
    ///   returned by the sequence layer
    /// * `n_inits` - Number of candidate initial states to draw
    /// * `noise_scale` - Standard deviation of the Gaussian perturbation
    /// * `seed` - Seed for the trial/timestep selection
    pub fn sample_states(
        &self,
        trajectories: Tensor<B::InnerBackend, 3>,
        n_inits: usize,
        noise_scale: f32,
        seed: u64,
    ) -> Tensor<B::InnerBackend, 2> {
        let [batch, time, hidden] = trajectories.dims();
        let mut rng = StdRng::seed_from_u64(seed);

        let mut rows: Vec<Tensor<B::InnerBackend, 2>> = Vec::with_capacity(n_inits);
        for _ in 0..n_inits {
            let trial = rng.gen_range(0..batch);
            let step = rng.gen_range(0..time);
            rows.push(
                trajectories
                    .clone()
                    .narrow(0, trial, 1)
                    .narrow(1, step, 1)
                    .reshape([1, hidden]),
            );
        }
        let states = Tensor::cat(rows, 0);

        if noise_scale > 0.0 {
            let noise = Tensor::random(
                [n_inits, hidden],
                Distribution::Normal(0.0, noise_scale as f64),
                &self.device,
            );
            states.add(noise)
        } else {
            states
        }
    }

    /// Runs the fixed-point search.
    ///
    /// # Arguments
    /// * `map` - The frozen update map
    /// * `initial_states` - Candidate initial states `[n, hidden]`
    /// * `fixed_input` - One input vector applied at every iteration
    pub fn find_fixed_points<M: StateMap<B>>(
        &self,
        map: &M,
        initial_states: Tensor<B::InnerBackend, 2>,
        fixed_input: Tensor<B::InnerBackend, 1>,
    ) -> FixedPointSet {
        let [n, hidden] = initial_states.dims();
        if hidden != map.state_size() {
            panic!(
                "initial states have dimension {}, map expects {}",
                hidden,
                map.state_size()
            );
        }
        let input_dim = fixed_input.dims()[0];
        let inputs: Tensor<B, 2> = Tensor::from_inner(
            fixed_input
                .clone()
                .unsqueeze::<2>()
                .expand([n, input_dim]),
        );

        // Candidate states live on the host; each iteration rebuilds the
        // batch tensor, reads back residuals and gradients, and applies the
        // per-candidate step. Only finite updates are committed, so a
        // diverging candidate retains its last finite state.
        let mut states: Vec<f32> = initial_states
            .into_data()
            .to_vec()
            .expect("contiguous f32 state buffer");
        let mut step = vec![self.options.lr_init; n];
        let mut prev_q = vec![f32::INFINITY; n];
        let mut phase = vec![Phase::Active; n];
        let mut iterations = vec![0usize; n];

        for iter in 0..self.options.max_iters {
            if phase.iter().all(|p| *p != Phase::Active) {
                break;
            }

            let (q_host, grad_host) = self.residual_and_grad(map, &states, n, hidden, &inputs);

            for i in 0..n {
                if phase[i] != Phase::Active {
                    continue;
                }
                let q = q_host[i];
                if !q.is_finite() {
                    phase[i] = Phase::Diverged;
                    continue;
                }
                if q.sqrt() <= self.options.tolerance {
                    phase[i] = Phase::Converged;
                    continue;
                }
                if q >= prev_q[i] {
                    step[i] *= self.options.lr_decay;
                }
                prev_q[i] = q;

                let row = &mut states[i * hidden..(i + 1) * hidden];
                let finite = row
                    .iter()
                    .zip(&grad_host[i * hidden..(i + 1) * hidden])
                    .all(|(value, grad)| (value - step[i] * grad).is_finite());
                if finite {
                    for (value, grad) in row
                        .iter_mut()
                        .zip(&grad_host[i * hidden..(i + 1) * hidden])
                    {
                        *value -= step[i] * grad;
                    }
                    iterations[i] += 1;
                } else {
                    phase[i] = Phase::Diverged;
                }
            }

            if self.options.verbose && iter % 100 == 0 {
                let active = phase.iter().filter(|p| **p == Phase::Active).count();
                let best = q_host
                    .iter()
                    .copied()
                    .filter(|q| q.is_finite())
                    .fold(f32::INFINITY, f32::min);
                println!(
                    "fixed-point iter {}: {} active, best squared residual {:.3e}",
                    iter, active, best
                );
            }
        }

        for p in phase.iter_mut() {
            if *p == Phase::Active {
                *p = Phase::Exhausted;
            }
        }

        // Final residual pass; candidates that landed within tolerance on
        // their last allowed update still count as converged.
        let residuals = self.final_residuals(map, &states, n, hidden, &inputs);
        for i in 0..n {
            if phase[i] == Phase::Exhausted && residuals[i] <= self.options.tolerance {
                phase[i] = Phase::Converged;
            }
        }

        let status = self.classify(&states, &residuals, &phase, n, hidden);

        let mut candidates = Vec::with_capacity(n);
        for i in 0..n {
            candidates.push(FixedPoint {
                state: Array1::from_iter(states[i * hidden..(i + 1) * hidden].iter().copied()),
                residual: residuals[i],
                iterations: iterations[i],
                status: status[i],
                jacobian: None,
            });
        }

        let mut accepted = Vec::new();
        for candidate in &mut candidates {
            if candidate.status == CandidateStatus::Accepted {
                let jacobian =
                    self.jacobian_at(map, candidate.state.as_slice().unwrap(), &fixed_input);
                candidate.jacobian = Some(jacobian);
                accepted.push(candidate.clone());
            }
        }

        if self.options.verbose {
            println!(
                "fixed-point search: {} accepted of {} candidates",
                accepted.len(),
                n
            );
        }

        FixedPointSet {
            accepted,
            candidates,
        }
    }

    /// One batched forward/backward pass: per-candidate squared residuals and
    /// their gradients with respect to the states.
    fn residual_and_grad<M: StateMap<B>>(
        &self,
        map: &M,
        states: &[f32],
        n: usize,
        hidden: usize,
        inputs: &Tensor<B, 2>,
    ) -> (Vec<f32>, Vec<f32>) {
        let s_inner =
            Tensor::<B::InnerBackend, 1>::from_floats(states, &self.device).reshape([n, hidden]);
        let s = Tensor::<B, 2>::from_inner(s_inner).require_grad();

        let image = map.apply(s.clone(), inputs.clone());
        let diff = image.sub(s.clone());
        let q: Tensor<B, 2> = diff.clone().mul(diff).sum_dim(1);
        let loss: Tensor<B, 1> = q.clone().sum();

        let grads = loss.backward();
        let grad = s
            .grad(&grads)
            .expect("candidate states participate in the residual graph");

        let q_host = q
            .inner()
            .into_data()
            .to_vec()
            .expect("contiguous residual buffer");
        let grad_host = grad
            .into_data()
            .to_vec()
            .expect("contiguous gradient buffer");
        (q_host, grad_host)
    }

    /// Euclidean residuals of the final states, no gradients involved.
    fn final_residuals<M: StateMap<B>>(
        &self,
        map: &M,
        states: &[f32],
        n: usize,
        hidden: usize,
        inputs: &Tensor<B, 2>,
    ) -> Vec<f32> {
        let s_inner =
            Tensor::<B::InnerBackend, 1>::from_floats(states, &self.device).reshape([n, hidden]);
        let image = map
            .apply(Tensor::from_inner(s_inner.clone()), inputs.clone())
            .inner();
        let diff = image.sub(s_inner);
        let q: Tensor<B::InnerBackend, 2> = diff.clone().mul(diff).sum_dim(1);
        q.into_data()
            .to_vec::<f32>()
            .expect("contiguous residual buffer")
            .into_iter()
            .map(f32::sqrt)
            .collect()
    }

    /// Deduplication and outlier pruning over converged candidates.
    fn classify(
        &self,
        states: &[f32],
        residuals: &[f32],
        phase: &[Phase],
        n: usize,
        hidden: usize,
    ) -> Vec<CandidateStatus> {
        let mut status = vec![CandidateStatus::Exhausted; n];
        for i in 0..n {
            status[i] = match phase[i] {
                Phase::Diverged => CandidateStatus::Diverged,
                Phase::Exhausted => CandidateStatus::Exhausted,
                // Refined below
                Phase::Converged => CandidateStatus::Accepted,
                Phase::Active => unreachable!("active candidates were exhausted above"),
            };
        }

        // Deduplicate: greedy by ascending residual, a candidate within the
        // separation distance of an accepted representative is a duplicate.
        let mut order: Vec<usize> = (0..n).filter(|&i| phase[i] == Phase::Converged).collect();
        order.sort_by(|&a, &b| residuals[a].total_cmp(&residuals[b]));

        let row = |i: usize| &states[i * hidden..(i + 1) * hidden];
        let mut representatives: Vec<usize> = Vec::new();
        for &i in &order {
            let duplicate = representatives
                .iter()
                .any(|&r| euclidean(row(i), row(r)) <= self.options.min_separation);
            if duplicate {
                status[i] = CandidateStatus::Duplicate;
            } else {
                representatives.push(i);
            }
        }

        // Outlier pruning: distances from each representative to their
        // centroid; the robust threshold is median + scale * MAD. Skipped
        // when there are too few representatives to define a bulk.
        if representatives.len() >= 3 {
            let mut centroid = vec![0.0f32; hidden];
            for &r in &representatives {
                for (c, value) in centroid.iter_mut().zip(row(r)) {
                    *c += value / representatives.len() as f32;
                }
            }
            let distances: Vec<f32> = representatives
                .iter()
                .map(|&r| euclidean(row(r), &centroid))
                .collect();
            let med = median(distances.clone());
            let mad = median(distances.iter().map(|d| (d - med).abs()).collect());
            let threshold = med + self.options.outlier_distance_scale * mad;

            for (&r, &distance) in representatives.iter().zip(&distances) {
                if distance > threshold {
                    status[r] = CandidateStatus::Outlier;
                }
            }
        }

        status
    }

    /// Finite-difference Jacobian `∂F/∂s` of the map at `state`.
    ///
    /// All `2·hidden` central-difference perturbations are evaluated as one
    /// batch through the map.
    fn jacobian_at<M: StateMap<B>>(
        &self,
        map: &M,
        state: &[f32],
        fixed_input: &Tensor<B::InnerBackend, 1>,
    ) -> Array2<f32> {
        let hidden = state.len();
        let input_dim = fixed_input.dims()[0];

        let mut batch = vec![0.0f32; 2 * hidden * hidden];
        for j in 0..hidden {
            for k in 0..hidden {
                let eps = if k == j { JACOBIAN_EPS } else { 0.0 };
                batch[(2 * j) * hidden + k] = state[k] + eps;
                batch[(2 * j + 1) * hidden + k] = state[k] - eps;
            }
        }

        let s_inner = Tensor::<B::InnerBackend, 1>::from_floats(batch.as_slice(), &self.device)
            .reshape([2 * hidden, hidden]);
        let inputs: Tensor<B, 2> = Tensor::from_inner(
            fixed_input
                .clone()
                .unsqueeze::<2>()
                .expand([2 * hidden, input_dim]),
        );
        let image: Vec<f32> = map
            .apply(Tensor::from_inner(s_inner), inputs)
            .inner()
            .into_data()
            .to_vec()
            .expect("contiguous image buffer");

        let mut jacobian = Array2::zeros((hidden, hidden));
        for j in 0..hidden {
            for i in 0..hidden {
                jacobian[[i, j]] = (image[(2 * j) * hidden + i] - image[(2 * j + 1) * hidden + i])
                    / (2.0 * JACOBIAN_EPS);
            }
        }
        jacobian
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn median(mut values: Vec<f32>) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        0.5 * (values[mid - 1] + values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(vec![4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(Vec::new()), 0.0);
    }

    #[test]
    fn test_euclidean_distance() {
        assert!((euclidean(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
        assert_eq!(euclidean(&[1.0, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_default_options_match_reference_hyperparameters() {
        let options = FinderOptions::default();
        assert_eq!(options.lr_init, 1.0);
        assert_eq!(options.outlier_distance_scale, 10.0);
        assert!(options.tolerance > 0.0);
    }
}

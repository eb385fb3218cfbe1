//! Fixed-Point Analysis Demo
//!
//! Runs a network over flip-flop trials, seeds the fixed-point search with
//! noise-corrupted visited states, and studies the dynamics in the absence
//! of input pulses (all inputs zero).

use burn::backend::{Autodiff, NdArray};
use burn::tensor::Tensor;
use cbrnn::prelude::*;

type Backend = Autodiff<NdArray<f32>>;
type Inner = NdArray<f32>;

fn main() {
    println!("=== Fixed-Point Analysis Example ===\n");

    let device = Default::default();
    let n_bits = 2;

    let model = CbRnn::<Backend>::new(n_bits, DalePartition::new(24).unwrap(), &device).unwrap();

    // Collect state trajectories over a batch of trials
    let mut generator = FlipFlopData::new(n_bits, 7).with_trial_length(80);
    let batch = generator.generate(8);
    let flat: Vec<f32> = batch.inputs.iter().copied().collect();
    let inputs = Tensor::<Backend, 1>::from_floats(flat.as_slice(), &device)
        .reshape([8, 80, n_bits]);

    let (_, trajectory) = model.forward(inputs, None);
    println!("Trajectory shape: {:?}", trajectory.dims());

    // Noise-corrupted samples of visited states seed the optimizations
    let finder = FixedPointFinder::<Backend>::new(&device).with_options(FinderOptions {
        max_iters: 2000,
        tolerance: 1e-5,
        verbose: true,
        ..FinderOptions::default()
    });
    let seeds = finder.sample_states(trajectory.inner(), 12, 0.5, 1234);
    println!("Seeds: {:?}\n", seeds.dims());

    let fixed_input = Tensor::<Inner, 1>::zeros([n_bits], &device);
    let result = finder.find_fixed_points(model.cell(), seeds, fixed_input);

    println!("\nCandidates:");
    for (index, candidate) in result.candidates.iter().enumerate() {
        println!(
            "  {:2}  {:?}  residual {:.3e}  iterations {}",
            index, candidate.status, candidate.residual, candidate.iterations
        );
    }

    println!("\nAccepted fixed points: {}", result.accepted.len());
    for (index, point) in result.accepted.iter().enumerate() {
        let jacobian = point.jacobian.as_ref().unwrap();
        // Gershgorin-style bound on the local linearization
        let max_row_sum = (0..jacobian.nrows())
            .map(|i| jacobian.row(i).iter().map(|v| v.abs()).sum::<f32>())
            .fold(0.0f32, f32::max);
        println!(
            "  fp {}: residual {:.3e}, max |J| row sum {:.3} ({})",
            index,
            point.residual,
            max_row_sum,
            if max_row_sum < 1.0 {
                "certainly stable"
            } else {
                "stability needs eigenvalues"
            }
        );
    }

    println!("\n=== Fixed-point example completed! ===");
}

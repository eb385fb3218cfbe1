//! Training Demo - Flip-Flop Memory Task
//!
//! Trains a conductance-based RNN on the windowed flip-flop task with Adam.
//! The model only exposes its parameters; batching, the loss, and the
//! optimizer live out here in the glue.

use burn::backend::{Autodiff, NdArray};
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::Tensor;
use cbrnn::prelude::*;
use ndarray::Array3;

type Backend = Autodiff<NdArray<f32>>;

fn to_tensor(array: &Array3<f32>, device: &<Backend as burn::tensor::backend::Backend>::Device) -> Tensor<Backend, 3> {
    let (trials, time, channels) = array.dim();
    let flat: Vec<f32> = array.iter().copied().collect();
    Tensor::<Backend, 1>::from_floats(flat.as_slice(), device).reshape([trials, time, channels])
}

fn main() {
    println!("=== Flip-Flop Training Example ===\n");

    let device = Default::default();
    let n_bits = 2;
    let n_trials = 16;
    let epochs = 30;
    let learning_rate = 1e-2;

    let mut generator = FlipFlopData::new(n_bits, 42)
        .with_trial_length(60)
        .with_window(5)
        .with_relax(30);

    let mut model = CbRnn::<Backend>::new(n_bits, DalePartition::new(32).unwrap(), &device)
        .unwrap()
        .with_plasticity(PlasticityMode::Shared, &device)
        .with_readout(n_bits, &device);

    println!("Model: {} inputs, {} hidden, {} outputs", n_bits, 32, n_bits);
    println!("Task:  {} trials of 60 steps per epoch\n", n_trials);

    let mut optim = AdamConfig::new().init();

    for epoch in 0..epochs {
        let batch = generator.generate(n_trials);
        let inputs = to_tensor(&batch.inputs, &device);
        let targets = to_tensor(&batch.targets, &device);

        let (predictions, _) = model.forward(inputs, None);
        let loss = MseLoss::new().forward(predictions, targets, Reduction::Mean);
        let loss_value = loss.clone().into_scalar();

        // A non-finite loss is terminal; the model never clamps its own
        // dynamics to hide divergence.
        if !loss_value.is_finite() {
            println!("Training diverged at epoch {} (loss {})", epoch, loss_value);
            return;
        }

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optim.step(learning_rate, model, grads);

        if epoch % 5 == 0 {
            println!("epoch {:3}: mse {:.5}", epoch, loss_value);
        }
    }

    println!("\n=== Training example completed! ===");
    println!("\nNext steps:");
    println!("  - Export parameters with cell().to_bundle() for offline analysis");
    println!("  - Run the fixed-point finder on the trained dynamics");
}

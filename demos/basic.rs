//! Basic Usage - Conductance Cell and Sequence Layer
//!
//! Builds a conductance-based cell under Dale's principle, steps it over a
//! short random sequence, and shows the externally visible output with
//! inhibitory units zeroed.

use burn::backend::NdArray;
use burn::tensor::{Distribution, Tensor};
use cbrnn::prelude::*;

fn main() {
    println!("=== CBRNN Basic Example ===\n");

    type Backend = NdArray<f32>;
    let device = Default::default();

    let partition = DalePartition::new(16).unwrap();
    println!("Partition:");
    println!("  Units: {}", partition.units());
    println!("  Excitatory: {}", partition.excitatory());
    println!("  Unit 0 is {}", partition.type_of_unit(0));
    println!("  Unit 15 is {}", partition.type_of_unit(15));
    println!();

    // Single-timestep cell with per-unit short-term plasticity
    let cell = ConductanceCell::<Backend>::new(4, partition, &device)
        .unwrap()
        .with_plasticity(PlasticityMode::Shared, &device);

    println!("Cell:");
    println!("  Input size:  {}", cell.input_size());
    println!("  Hidden size: {}", cell.hidden_size());
    println!("  Plasticity:  {:?}", cell.plasticity());
    println!();

    let batch = 2;
    let input =
        Tensor::<Backend, 2>::random([batch, 4], Distribution::Uniform(-1.0, 1.0), &device);
    let state = Tensor::<Backend, 2>::zeros([batch, 16], &device);
    let synapses = cell.init_synapses(batch, &device);

    let (output, new_state, _) = cell.forward(input, state, synapses);
    println!("Single step:");
    println!("  Output shape: {:?}", output.dims());
    println!("  State shape:  {:?}", new_state.dims());
    println!("  (the last {} output units are zeroed: inhibitory)", 8);
    println!();

    // Sequence layer over whole trials
    let rnn = CbRnn::<Backend>::new(4, DalePartition::new(16).unwrap(), &device)
        .unwrap()
        .with_readout(2, &device);

    let trials =
        Tensor::<Backend, 3>::random([batch, 25, 4], Distribution::Uniform(-1.0, 1.0), &device);
    let (outputs, trajectory) = rnn.forward(trials, None);

    println!("Sequence layer:");
    println!("  Readout outputs: {:?}", outputs.dims());
    println!("  Trajectory:      {:?}", trajectory.dims());
    println!();

    println!("=== Basic example completed! ===");
}

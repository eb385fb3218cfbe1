//! Save and Load Example
//!
//! Exports a cell's parameters as a named-tensor bundle, round-trips it
//! through JSON, and restores an identical cell.

use burn::backend::NdArray;
use cbrnn::prelude::*;

fn main() {
    println!("=== Named-Tensor Save/Load Example ===\n");

    type Backend = NdArray<f32>;
    let device = Default::default();

    let partition = DalePartition::new(12).unwrap();
    let cell = ConductanceCell::<Backend>::new(4, partition, &device)
        .unwrap()
        .with_plasticity(PlasticityMode::PerSynapse, &device);

    // Export
    let bundle = cell.to_bundle();
    println!("Exported tensors:");
    for name in bundle.names() {
        println!("  {}", name);
    }

    let encoded = serde_json::to_string(&bundle).unwrap();
    println!("\nJSON size: {} bytes", encoded.len());

    // Restore; structural configuration travels separately from the tensors
    let decoded: TensorBundle = serde_json::from_str(&encoded).unwrap();
    let restored = ConductanceCell::<Backend>::from_bundle(
        &decoded,
        4,
        DalePartition::new(12).unwrap(),
        PlasticityMode::PerSynapse,
        &device,
    )
    .unwrap();

    let drift = (cell.effective_weight() - restored.effective_weight())
        .abs()
        .sum()
        .into_scalar();
    println!("Effective-weight drift after round trip: {:.3e}", drift);

    // The same matrices feed the offline efficacy analysis
    let weight = cell.effective_weight();
    let (pre, post) = {
        let dims = weight.dims();
        (dims[0], dims[1])
    };
    let weight_host =
        ndarray::Array2::from_shape_vec((pre, post), weight.into_data().to_vec().unwrap())
            .unwrap();
    let floor_host = ndarray::Array1::from_vec(
        cell.stp
            .as_ref()
            .unwrap()
            .facilitation_floor()
            .into_data()
            .to_vec()
            .unwrap(),
    );
    // Per-synapse parameters aggregate row-wise first; take the first row as
    // a per-unit illustration
    let per_unit = floor_host.slice(ndarray::s![..post]).to_owned();
    let aggregate = cbrnn::analysis::postsynaptic_efficacy(&weight_host, &per_unit).unwrap();
    println!(
        "Post-synaptic facilitation floor of unit 0: {:.3}",
        aggregate[0]
    );

    println!("\n=== Save/Load example completed! ===");
}

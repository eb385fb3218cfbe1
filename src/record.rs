//! Named-tensor persistence
//!
//! Trained parameters travel between processes as a flat mapping from
//! parameter name to a dense array with an explicit shape. The bundle is a
//! plain serde-serializable struct so callers pick the wire format (JSON,
//! bincode, ...) themselves; the offline analysis tooling consumes the same
//! names the cell exports.

use crate::cells::{ConductanceCell, PlasticityMode};
use crate::error::{CbrnnError, CbrnnResult};
use crate::partition::DalePartition;
use burn::module::Param;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A dense array with its shape, detached from any backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl NamedTensor {
    fn from_tensor<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Self {
        Self {
            shape: tensor.dims().to_vec(),
            data: tensor
                .into_data()
                .to_vec()
                .expect("contiguous f32 tensor"),
        }
    }

    fn to_tensor2<B: Backend>(
        &self,
        name: &str,
        expected: [usize; 2],
        device: &B::Device,
    ) -> CbrnnResult<Tensor<B, 2>> {
        if self.shape != expected || self.data.len() != expected[0] * expected[1] {
            return Err(CbrnnError::ShapeMismatch(format!(
                "tensor '{}' has shape {:?}, expected {:?}",
                name, self.shape, expected
            )));
        }
        Ok(Tensor::<B, 1>::from_floats(self.data.as_slice(), device).reshape(expected))
    }

    fn to_tensor1<B: Backend>(
        &self,
        name: &str,
        expected: usize,
        device: &B::Device,
    ) -> CbrnnResult<Tensor<B, 1>> {
        if self.shape != [expected] || self.data.len() != expected {
            return Err(CbrnnError::ShapeMismatch(format!(
                "tensor '{}' has shape {:?}, expected [{}]",
                name, self.shape, expected
            )));
        }
        Ok(Tensor::<B, 1>::from_floats(self.data.as_slice(), device))
    }
}

/// A mapping from parameter name to dense array.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TensorBundle {
    tensors: BTreeMap<String, NamedTensor>,
}

impl TensorBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: NamedTensor) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> CbrnnResult<&NamedTensor> {
        self.tensors
            .get(name)
            .ok_or_else(|| CbrnnError::MissingTensor(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

impl<B: Backend> ConductanceCell<B> {
    /// Exports every trainable parameter into a named-tensor bundle.
    pub fn to_bundle(&self) -> TensorBundle {
        let mut bundle = TensorBundle::new();
        bundle.insert("w", NamedTensor::from_tensor(self.w.val()));
        bundle.insert("w_in", NamedTensor::from_tensor(self.w_in.val()));
        bundle.insert("bias", NamedTensor::from_tensor(self.bias.val()));
        bundle.insert("gate_bias", NamedTensor::from_tensor(self.gate_bias.val()));
        bundle.insert("gain_exc", NamedTensor::from_tensor(self.gain_exc.val()));
        bundle.insert("gain_inh", NamedTensor::from_tensor(self.gain_inh.val()));
        if let Some(stp) = &self.stp {
            bundle.insert(
                "stp.depression_rate",
                NamedTensor::from_tensor(stp.depression_rate.val()),
            );
            bundle.insert(
                "stp.facilitation_rate",
                NamedTensor::from_tensor(stp.facilitation_rate.val()),
            );
            bundle.insert(
                "stp.facilitation_cap",
                NamedTensor::from_tensor(stp.facilitation_cap.val()),
            );
        }
        bundle
    }

    /// Reconstructs a cell from a bundle produced by [`Self::to_bundle`].
    ///
    /// The structural configuration (input size, partition, plasticity
    /// variant) is not part of the bundle and must be supplied; every tensor
    /// is validated against the shapes that configuration implies.
    pub fn from_bundle(
        bundle: &TensorBundle,
        input_size: usize,
        partition: DalePartition,
        mode: PlasticityMode,
        device: &B::Device,
    ) -> CbrnnResult<Self> {
        let hidden = partition.units();
        let mut cell =
            Self::new(input_size, partition, device)?.with_plasticity(mode, device);

        cell.w = Param::from_tensor(bundle.get("w")?.to_tensor2("w", [hidden, hidden], device)?);
        cell.w_in = Param::from_tensor(bundle.get("w_in")?.to_tensor2(
            "w_in",
            [input_size, hidden],
            device,
        )?);
        cell.bias =
            Param::from_tensor(bundle.get("bias")?.to_tensor2("bias", [1, hidden], device)?);
        cell.gate_bias = Param::from_tensor(bundle.get("gate_bias")?.to_tensor2(
            "gate_bias",
            [1, hidden],
            device,
        )?);
        cell.gain_exc =
            Param::from_tensor(bundle.get("gain_exc")?.to_tensor1("gain_exc", 1, device)?);
        cell.gain_inh =
            Param::from_tensor(bundle.get("gain_inh")?.to_tensor1("gain_inh", 1, device)?);

        if let Some(stp) = cell.stp.take() {
            let shape = if stp.per_synapse() {
                [hidden, hidden]
            } else {
                [1, hidden]
            };
            let mut stp = stp;
            stp.depression_rate = Param::from_tensor(
                bundle
                    .get("stp.depression_rate")?
                    .to_tensor2("stp.depression_rate", shape, device)?,
            );
            stp.facilitation_rate = Param::from_tensor(
                bundle
                    .get("stp.facilitation_rate")?
                    .to_tensor2("stp.facilitation_rate", shape, device)?,
            );
            stp.facilitation_cap = Param::from_tensor(
                bundle
                    .get("stp.facilitation_cap")?
                    .to_tensor2("stp.facilitation_cap", shape, device)?,
            );
            cell.stp = Some(stp);
        }

        Ok(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type Backend = NdArray<f32>;

    fn create_test_cell(mode: PlasticityMode) -> ConductanceCell<Backend> {
        let device = Default::default();
        let partition = DalePartition::new(6).unwrap();
        ConductanceCell::new(3, partition, &device)
            .unwrap()
            .with_plasticity(mode, &device)
    }

    #[test]
    fn test_bundle_names() {
        let cell = create_test_cell(PlasticityMode::Shared);
        let bundle = cell.to_bundle();

        assert_eq!(bundle.len(), 9);
        assert!(bundle.get("w").is_ok());
        assert!(bundle.get("stp.facilitation_cap").is_ok());
        assert!(matches!(
            bundle.get("nonexistent"),
            Err(CbrnnError::MissingTensor(_))
        ));
    }

    #[test]
    fn test_static_bundle_omits_plasticity() {
        let cell = create_test_cell(PlasticityMode::Static);
        let bundle = cell.to_bundle();
        assert_eq!(bundle.len(), 6);
    }

    #[test]
    fn test_round_trip_preserves_parameters() {
        let device = Default::default();
        let cell = create_test_cell(PlasticityMode::PerSynapse);
        let bundle = cell.to_bundle();

        let restored = ConductanceCell::<Backend>::from_bundle(
            &bundle,
            3,
            DalePartition::new(6).unwrap(),
            PlasticityMode::PerSynapse,
            &device,
        )
        .unwrap();

        let diff = (cell.w.val() - restored.w.val()).abs().sum().into_scalar();
        assert!(diff < 1e-7);
        let diff = (cell.effective_weight() - restored.effective_weight())
            .abs()
            .sum()
            .into_scalar();
        assert!(diff < 1e-7);
    }

    #[test]
    fn test_round_trip_through_json() {
        let device = Default::default();
        let cell = create_test_cell(PlasticityMode::Shared);
        let encoded = serde_json::to_string(&cell.to_bundle()).unwrap();
        let decoded: TensorBundle = serde_json::from_str(&encoded).unwrap();

        let restored = ConductanceCell::<Backend>::from_bundle(
            &decoded,
            3,
            DalePartition::new(6).unwrap(),
            PlasticityMode::Shared,
            &device,
        )
        .unwrap();
        let diff = (cell.bias.val() - restored.bias.val())
            .abs()
            .sum()
            .into_scalar();
        assert!(diff < 1e-7);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let device = Default::default();
        let cell = create_test_cell(PlasticityMode::Static);
        let bundle = cell.to_bundle();

        // Same bundle, wrong structural configuration
        let result = ConductanceCell::<Backend>::from_bundle(
            &bundle,
            5,
            DalePartition::new(6).unwrap(),
            PlasticityMode::Static,
            &device,
        );
        assert!(matches!(result, Err(CbrnnError::ShapeMismatch(_))));
    }
}

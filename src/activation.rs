//! Custom activation functions for conductance-based cells
//!
//! This module provides activation functions not available in Burn's standard library.

use burn::tensor::{backend::Backend, Tensor};

/// Scaled log-cosh magnitude.
///
/// This function is defined as:
/// `f(x) = (1/β) * ln(cosh(β * x))`
///
/// It is a smooth, even, non-negative function of its input that behaves like
/// `|x| - ln(2)/β` away from the origin. Applied to a raw weight parameter it
/// yields a sign-free synaptic magnitude, which is then given a fixed sign per
/// neuron population to enforce Dale's principle.
///
/// The naive formula overflows for large `|β * x|`, so it is evaluated as
/// `|x| + (ln(1 + exp(-2β|x|)) - ln 2)/β`, which is exact and finite for every
/// representable input, including ±1e6.
///
/// # Example
///
/// ```rust
/// use burn::backend::NdArray;
/// use burn::tensor::Tensor;
/// use cbrnn::activation::LogCosh;
///
/// type Backend = NdArray<f32>;
/// let device = Default::default();
///
/// let x = Tensor::<Backend, 1>::from_floats([0.0, 1.0, -1.0], &device);
/// let y = LogCosh::forward(x, 50.0);
/// ```
pub struct LogCosh;

impl LogCosh {
    /// Applies the scaled log-cosh magnitude element-wise.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of any dimension
    /// * `sharpness` - The scale β; larger values sharpen the kink at zero
    ///
    /// # Returns
    ///
    /// Tensor with the non-negative magnitude applied element-wise
    pub fn forward<B: Backend, const D: usize>(x: Tensor<B, D>, sharpness: f32) -> Tensor<B, D> {
        let magnitude = x.abs();
        let correction = magnitude
            .clone()
            .mul_scalar(-2.0 * sharpness)
            .exp()
            .add_scalar(1.0)
            .log()
            .sub_scalar(std::f32::consts::LN_2)
            .div_scalar(sharpness);
        magnitude.add(correction)
    }
}

use ndarray::{Array, Dimension};
use serde::{Deserialize, Serialize};

const PARALLEL_THRESHOLD: usize = 1 << 14;

/// Activation functions used by the actor and critic networks.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum Activation {
    #[default]
    Relu,
    Linear,
    Sigmoid,
}

impl Activation {
    /// Apply the activation function to an array of any rank in-place.
    ///
    /// Large arrays (convolution feature maps) are processed on the rayon pool.
    pub fn apply<D: Dimension>(&self, input: &mut Array<f32, D>) {
        let parallel = input.len() >= PARALLEL_THRESHOLD;
        match self {
            Activation::Relu if parallel => input.par_mapv_inplace(|v| v.max(0.0)),
            Activation::Relu => input.mapv_inplace(|v| v.max(0.0)),
            Activation::Linear => {}
            Activation::Sigmoid if parallel => input.par_mapv_inplace(sigmoid),
            Activation::Sigmoid => input.mapv_inplace(sigmoid),
        }
    }

    /// Derivative of the activation evaluated at the pre-activation values.
    pub fn derivative<D: Dimension>(&self, pre_activation: &Array<f32, D>) -> Array<f32, D> {
        match self {
            Activation::Relu => pre_activation.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Linear => Array::ones(pre_activation.raw_dim()),
            Activation::Sigmoid => pre_activation.mapv(|v| {
                let s = sigmoid(v);
                s * (1.0 - s)
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Relu => "relu",
            Activation::Linear => "linear",
            Activation::Sigmoid => "sigmoid",
        }
    }
}

#[inline]
fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

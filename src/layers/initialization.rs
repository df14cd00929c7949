use ndarray::{Array, Dimension, ShapeBuilder};
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::Rng;

use crate::activations::Activation;
use crate::error::{DdpgError, Result};

/// Weight initialization strategies
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightInit {
    /// Xavier/Glorot normal initialization
    XavierNormal,

    /// He/Kaiming normal initialization (for ReLU)
    HeNormal,

    /// Uniform distribution with custom range
    Uniform { min: f32, max: f32 },

    /// All zeros
    Zeros,
}

impl WeightInit {
    /// Draw a parameter tensor of the given shape.
    ///
    /// `fan_in`/`fan_out` are the number of inputs feeding one output unit and the
    /// number of outputs fed by one input unit; for convolutions both include the
    /// kernel area.
    pub fn initialize<Sh, D, R>(
        &self,
        shape: Sh,
        fan_in: usize,
        fan_out: usize,
        rng: &mut R,
    ) -> Result<Array<f32, D>>
    where
        Sh: ShapeBuilder<Dim = D>,
        D: Dimension,
        R: Rng + ?Sized,
    {
        match *self {
            WeightInit::XavierNormal => {
                let std = (2.0 / (fan_in + fan_out).max(1) as f32).sqrt();
                Ok(Array::random_using(shape, normal(0.0, std)?, rng))
            }

            WeightInit::HeNormal => {
                let std = (2.0 / fan_in.max(1) as f32).sqrt();
                Ok(Array::random_using(shape, normal(0.0, std)?, rng))
            }

            WeightInit::Uniform { min, max } => {
                if !(min < max) {
                    return Err(DdpgError::invalid_parameter(
                        "weight_init",
                        "uniform range must satisfy min < max",
                    ));
                }
                Ok(Array::random_using(shape, Uniform::new(min, max), rng))
            }

            WeightInit::Zeros => Ok(Array::zeros(shape)),
        }
    }

    /// Get the recommended initialization for an activation function
    pub fn for_activation(activation: &Activation) -> Self {
        match activation {
            Activation::Relu => WeightInit::HeNormal,
            Activation::Sigmoid | Activation::Linear => WeightInit::XavierNormal,
        }
    }
}

fn normal(mean: f32, std: f32) -> Result<Normal<f32>> {
    Normal::new(mean, std).map_err(|e| DdpgError::NumericalError(e.to_string()))
}

use ndarray::{Array1, Array2, ArrayView2, ArrayViewD, ArrayViewMutD, Axis};
use rand::Rng;

use super::initialization::WeightInit;
use super::traits::Parameterized;
use crate::activations::Activation;
use crate::error::{DdpgError, Result};

/// A fully connected (dense) layer
#[derive(Clone, Debug)]
pub struct DenseLayer {
    /// Weights stored as `[input_size, output_size]`
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
    pre_activation_output: Option<Array2<f32>>,
    inputs: Option<Array2<f32>>,
}

/// Gradients produced by [`DenseLayer::backward_batch`]
#[derive(Debug, Clone)]
pub struct DenseGradients {
    pub input: Array2<f32>,
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
}

impl DenseLayer {
    /// Create a dense layer initialized for its activation; biases start at zero.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        Self::with_init(input_size, output_size, activation, WeightInit::for_activation(&activation), rng)
    }

    pub fn with_init<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        init: WeightInit,
        rng: &mut R,
    ) -> Result<Self> {
        if input_size == 0 || output_size == 0 {
            return Err(DdpgError::invalid_parameter(
                "dense layer size",
                "input and output sizes must be positive",
            ));
        }
        let weights = init.initialize((input_size, output_size), input_size, output_size, rng)?;
        Ok(DenseLayer {
            weights,
            biases: Array1::zeros(output_size),
            activation,
            pre_activation_output: None,
            inputs: None,
        })
    }

    pub fn input_size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.ncols()
    }

    /// Forward pass for a batch `[batch, input_size]`; caches what backward needs.
    pub fn forward_batch(&mut self, inputs: ArrayView2<f32>) -> Result<Array2<f32>> {
        if inputs.ncols() != self.input_size() {
            return Err(DdpgError::dimension_mismatch(
                format!("[batch, {}]", self.input_size()),
                format!("{:?}", inputs.shape()),
            ));
        }
        self.inputs = Some(inputs.to_owned());
        let mut outputs = inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0));
        self.pre_activation_output = Some(outputs.clone());
        self.activation.apply(&mut outputs);
        Ok(outputs)
    }

    /// Backpropagate `dL/doutput` through the most recent forward pass.
    pub fn backward_batch(&self, output_gradient: ArrayView2<f32>) -> Result<DenseGradients> {
        let (inputs, pre_activation) = match (&self.inputs, &self.pre_activation_output) {
            (Some(i), Some(p)) => (i, p),
            _ => {
                return Err(DdpgError::invalid_parameter(
                    "backward_batch",
                    "forward_batch must be called before backward_batch",
                ))
            }
        };
        if output_gradient.shape() != pre_activation.shape() {
            return Err(DdpgError::dimension_mismatch(
                format!("{:?}", pre_activation.shape()),
                format!("{:?}", output_gradient.shape()),
            ));
        }

        let adjusted = &output_gradient * &self.activation.derivative(pre_activation);
        Ok(DenseGradients {
            input: adjusted.dot(&self.weights.t()),
            weights: inputs.t().dot(&adjusted),
            biases: adjusted.sum_axis(Axis(0)),
        })
    }
}

impl Parameterized for DenseLayer {
    fn parameters(&self) -> Vec<ArrayViewD<'_, f32>> {
        vec![self.weights.view().into_dyn(), self.biases.view().into_dyn()]
    }

    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        vec![self.weights.view_mut().into_dyn(), self.biases.view_mut().into_dyn()]
    }
}

use ndarray::{concatenate, s, Array2, ArrayD, ArrayView2, ArrayView4, ArrayViewD, ArrayViewMutD, Axis};
use rand::Rng;

use super::{ConvStem, StateShape};
use crate::activations::Activation;
use crate::error::{DdpgError, Result};
use crate::layers::{DenseLayer, Parameterized};

/// Action-value function: (observation, action) to an unbounded scalar Q estimate
#[derive(Clone, Debug)]
pub struct CriticNetwork {
    stem: ConvStem,
    hidden1: DenseLayer,
    hidden2: DenseLayer,
    output: DenseLayer,
    action_dim: usize,
}

/// Gradients produced by [`CriticNetwork::backward`]
#[derive(Debug, Clone)]
pub struct CriticGradients {
    /// `dL/dθ` in [`Parameterized`] order
    pub parameters: Vec<ArrayD<f32>>,
    /// `dL/daction`, `[batch, action_dim]`
    pub actions: Array2<f32>,
}

impl CriticNetwork {
    pub fn new<R: Rng + ?Sized>(state_shape: StateShape, action_dim: usize, rng: &mut R) -> Result<Self> {
        if action_dim == 0 {
            return Err(DdpgError::invalid_parameter("action_dim", "critic needs at least one action input"));
        }
        let stem = ConvStem::new(state_shape, rng)?;
        let hidden1 = DenseLayer::new(stem.output_size() + action_dim, 64, Activation::Relu, rng)?;
        let hidden2 = DenseLayer::new(64, 32, Activation::Relu, rng)?;
        let output = DenseLayer::new(32, 1, Activation::Linear, rng)?;
        Ok(CriticNetwork { stem, hidden1, hidden2, output, action_dim })
    }

    pub fn state_shape(&self) -> StateShape {
        self.stem.state_shape()
    }

    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    /// Q-values `[batch, 1]` for aligned batches of observations and actions
    pub fn forward(&mut self, states: ArrayView4<f32>, actions: ArrayView2<f32>) -> Result<Array2<f32>> {
        if actions.ncols() != self.action_dim || actions.nrows() != states.shape()[0] {
            return Err(DdpgError::dimension_mismatch(
                format!("[{}, {}] actions", states.shape()[0], self.action_dim),
                format!("{:?}", actions.shape()),
            ));
        }
        let features = self.stem.forward(states)?;
        let joined = concatenate(Axis(1), &[features.view(), actions.view()])?;
        let x = self.hidden1.forward_batch(joined.view())?;
        let x = self.hidden2.forward_batch(x.view())?;
        self.output.forward_batch(x.view())
    }

    /// Backpropagate `dL/dQ` (`[batch, 1]`) through the last forward pass.
    pub fn backward(&self, q_gradient: ArrayView2<f32>) -> Result<CriticGradients> {
        let out = self.output.backward_batch(q_gradient)?;
        let h2 = self.hidden2.backward_batch(out.input.view())?;
        let h1 = self.hidden1.backward_batch(h2.input.view())?;

        let feature_dim = self.stem.output_size();
        let actions = h1.input.slice(s![.., feature_dim..]).to_owned();
        let mut parameters = self.stem.backward(h1.input.slice(s![.., ..feature_dim]))?;
        for g in [h1, h2, out] {
            parameters.push(g.weights.into_dyn());
            parameters.push(g.biases.into_dyn());
        }
        Ok(CriticGradients { parameters, actions })
    }

    /// `dL/daction` alone for the last forward pass.
    ///
    /// Stops at the concatenation, so the conv stem is never walked backward and no
    /// parameter gradients are built.
    pub fn action_gradient(&self, q_gradient: ArrayView2<f32>) -> Result<Array2<f32>> {
        let out = self.output.backward_batch(q_gradient)?;
        let h2 = self.hidden2.backward_batch(out.input.view())?;
        let h1 = self.hidden1.backward_batch(h2.input.view())?;
        Ok(h1.input.slice(s![.., self.stem.output_size()..]).to_owned())
    }

    /// Layer-by-layer description with parameter counts
    pub fn summary(&self, name: &str) -> String {
        let mut lines = vec![format!("Model: \"{}\"", name)];
        self.stem.summary_lines(&mut lines);
        lines.push(format!(
            "  concatenate    {} + {} action -> {}",
            self.stem.output_size(),
            self.action_dim,
            self.hidden1.input_size()
        ));
        for (label, layer) in [("dense_1", &self.hidden1), ("dense_2", &self.hidden2), ("dense_3", &self.output)] {
            lines.push(format!(
                "  {:<14} {} -> {} {} ({} params)",
                label,
                layer.input_size(),
                layer.output_size(),
                layer.activation.name(),
                layer.num_parameters()
            ));
        }
        lines.push(format!("Total params: {}", self.num_parameters()));
        lines.join("\n")
    }
}

impl Parameterized for CriticNetwork {
    fn parameters(&self) -> Vec<ArrayViewD<'_, f32>> {
        let mut params = self.stem.parameters();
        params.extend(self.hidden1.parameters());
        params.extend(self.hidden2.parameters());
        params.extend(self.output.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        let mut params = self.stem.parameters_mut();
        params.extend(self.hidden1.parameters_mut());
        params.extend(self.hidden2.parameters_mut());
        params.extend(self.output.parameters_mut());
        params
    }
}

use ndarray::{Array2, ArrayD, ArrayView2, ArrayView4, ArrayViewD, ArrayViewMutD};
use rand::Rng;

use super::{ConvStem, StateShape};
use crate::activations::Activation;
use crate::error::{DdpgError, Result};
use crate::layers::{DenseLayer, Parameterized, WeightInit};

/// Half-width of the uniform range the output layer is drawn from. Keeps the initial
/// policy near the sigmoid's linear region.
pub const OUTPUT_INIT_RANGE: f32 = 0.005;

/// Deterministic policy: observation to raw action in `(0, 1)^k`
#[derive(Clone, Debug)]
pub struct ActorNetwork {
    stem: ConvStem,
    hidden: DenseLayer,
    output: DenseLayer,
}

impl ActorNetwork {
    pub fn new<R: Rng + ?Sized>(state_shape: StateShape, action_dim: usize, rng: &mut R) -> Result<Self> {
        if action_dim == 0 {
            return Err(DdpgError::invalid_parameter("action_dim", "actor needs at least one output"));
        }
        let stem = ConvStem::new(state_shape, rng)?;
        let hidden = DenseLayer::new(stem.output_size(), 64, Activation::Relu, rng)?;
        let output = DenseLayer::with_init(
            64,
            action_dim,
            Activation::Sigmoid,
            WeightInit::Uniform { min: -OUTPUT_INIT_RANGE, max: OUTPUT_INIT_RANGE },
            rng,
        )?;
        Ok(ActorNetwork { stem, hidden, output })
    }

    pub fn state_shape(&self) -> StateShape {
        self.stem.state_shape()
    }

    pub fn action_dim(&self) -> usize {
        self.output.output_size()
    }

    /// `[batch, H, W, C]` observations to `[batch, action_dim]` raw actions
    pub fn forward(&mut self, states: ArrayView4<f32>) -> Result<Array2<f32>> {
        let features = self.stem.forward(states)?;
        let hidden = self.hidden.forward_batch(features.view())?;
        self.output.forward_batch(hidden.view())
    }

    /// Parameter gradients for `dL/daction` of the last forward pass, in [`Parameterized`] order.
    pub fn backward(&self, action_gradient: ArrayView2<f32>) -> Result<Vec<ArrayD<f32>>> {
        let out = self.output.backward_batch(action_gradient)?;
        let hidden = self.hidden.backward_batch(out.input.view())?;
        let mut gradients = self.stem.backward(hidden.input.view())?;
        gradients.push(hidden.weights.into_dyn());
        gradients.push(hidden.biases.into_dyn());
        gradients.push(out.weights.into_dyn());
        gradients.push(out.biases.into_dyn());
        Ok(gradients)
    }

    /// Layer-by-layer description with parameter counts
    pub fn summary(&self, name: &str) -> String {
        let mut lines = vec![format!("Model: \"{}\"", name)];
        self.stem.summary_lines(&mut lines);
        lines.push(format!(
            "  dense_1        {} -> {} relu ({} params)",
            self.hidden.input_size(),
            self.hidden.output_size(),
            self.hidden.num_parameters()
        ));
        lines.push(format!(
            "  dense_2        {} -> {} sigmoid ({} params)",
            self.output.input_size(),
            self.output.output_size(),
            self.output.num_parameters()
        ));
        lines.push(format!("Total params: {}", self.num_parameters()));
        lines.join("\n")
    }
}

impl Parameterized for ActorNetwork {
    fn parameters(&self) -> Vec<ArrayViewD<'_, f32>> {
        let mut params = self.stem.parameters();
        params.extend(self.hidden.parameters());
        params.extend(self.output.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        let mut params = self.stem.parameters_mut();
        params.extend(self.hidden.parameters_mut());
        params.extend(self.output.parameters_mut());
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn actor() -> ActorNetwork {
        ActorNetwork::new((32, 32, 1), 3, &mut StdRng::seed_from_u64(5)).unwrap()
    }

    #[test]
    fn test_outputs_in_unit_interval() {
        let mut actor = actor();
        let states = Array4::from_shape_fn((2, 32, 32, 1), |(b, i, j, _)| ((b + i * j) % 7) as f32 / 3.0 - 1.0);
        let out = actor.forward(states.view()).unwrap();
        assert_eq!(out.dim(), (2, 3));
        assert!(out.iter().all(|&a| a > 0.0 && a < 1.0));
    }

    #[test]
    fn test_initial_policy_is_near_half() {
        let mut actor = actor();
        let out = actor.forward(Array4::zeros((1, 32, 32, 1)).view()).unwrap();
        assert!(out.iter().all(|&a| (a - 0.5).abs() < 0.05));
    }

    #[test]
    fn test_gradients_align_with_parameters() {
        let mut actor = actor();
        let states = Array4::from_elem((2, 32, 32, 1), 0.5);
        actor.forward(states.view()).unwrap();
        let grads = actor.backward(Array2::ones((2, 3)).view()).unwrap();

        let params = actor.parameters();
        assert_eq!(grads.len(), params.len());
        for (g, p) in grads.iter().zip(params.iter()) {
            assert_eq!(g.shape(), p.shape());
        }
    }

    #[test]
    fn test_set_weights_roundtrip() {
        let source = actor();
        let mut other = ActorNetwork::new((32, 32, 1), 3, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_ne!(source.get_weights(), other.get_weights());
        other.set_weights(&source.get_weights()).unwrap();
        assert_eq!(source.get_weights(), other.get_weights());
    }

    #[test]
    fn test_summary_mentions_every_layer() {
        let summary = actor().summary("Actor");
        assert!(summary.contains("conv2d_3"));
        assert!(summary.contains("sigmoid"));
        assert!(summary.contains("Total params"));
    }
}

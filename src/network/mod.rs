//! Actor and critic networks for image observations.
//!
//! Both networks share the same convolutional stem architecture (weights are not shared):
//!
//! ```text
//! [H, W, C] -> conv 32@3x3 -> maxpool 2x2 -> conv 64@3x3 -> maxpool 2x2
//!           -> conv 64@3x3 stride 2 -> avgpool 2x2 -> flatten
//! ```
//!
//! Convolutions are bias-free with ReLU. The first two stages max-pool to keep sharp
//! early detail, the last one average-pools to smooth the final features.
//!
//! Observations enter as `[batch, height, width, channels]` and are transposed to the
//! channel-first layout the layers work in.

pub mod actor;
pub mod critic;

use ndarray::{Array2, Array4, ArrayD, ArrayView2, ArrayView4, ArrayViewD, ArrayViewMutD};
use rand::Rng;

use crate::activations::Activation;
use crate::error::{DdpgError, Result};
use crate::layers::{AvgPool2DLayer, Conv2DLayer, ConvGradients, MaxPool2DLayer, Parameterized};

pub use actor::ActorNetwork;
pub use critic::{CriticGradients, CriticNetwork};

/// Smallest square input the stem can reduce to a non-empty feature map
pub const MIN_INPUT_SIZE: usize = 26;

/// Shape of one preprocessed observation, `(height, width, channels)`
pub type StateShape = (usize, usize, usize);

/// The convolutional feature extractor shared by the actor and critic architectures
#[derive(Clone, Debug)]
pub struct ConvStem {
    conv1: Conv2DLayer,
    pool1: MaxPool2DLayer,
    conv2: Conv2DLayer,
    pool2: MaxPool2DLayer,
    conv3: Conv2DLayer,
    pool3: AvgPool2DLayer,
    state_shape: StateShape,
    feature_map: (usize, usize, usize),
    cached_batch: Option<usize>,
}

impl ConvStem {
    pub fn new<R: Rng + ?Sized>(state_shape: StateShape, rng: &mut R) -> Result<Self> {
        let (height, width, channels) = state_shape;
        let conv1 = Conv2DLayer::new(channels, 32, (3, 3), (1, 1), false, Activation::Relu, rng)?;
        let pool1 = MaxPool2DLayer::new((2, 2), None);
        let conv2 = Conv2DLayer::new(32, 64, (3, 3), (1, 1), false, Activation::Relu, rng)?;
        let pool2 = MaxPool2DLayer::new((2, 2), None);
        let conv3 = Conv2DLayer::new(64, 64, (3, 3), (2, 2), false, Activation::Relu, rng)?;
        let pool3 = AvgPool2DLayer::new((2, 2), None);

        let too_small = || {
            DdpgError::invalid_parameter(
                "state_shape".to_string(),
                format!(
                    "{}x{} observations are too small for the convolutional stem (minimum {}x{})",
                    height, width, MIN_INPUT_SIZE, MIN_INPUT_SIZE
                ),
            )
        };
        let hw = conv1.output_hw(height, width).ok_or_else(too_small)?;
        let hw = pool1.output_hw(hw.0, hw.1).map_err(|_| too_small())?;
        let hw = conv2.output_hw(hw.0, hw.1).ok_or_else(too_small)?;
        let hw = pool2.output_hw(hw.0, hw.1).map_err(|_| too_small())?;
        let hw = conv3.output_hw(hw.0, hw.1).ok_or_else(too_small)?;
        let hw = pool3.output_hw(hw.0, hw.1).map_err(|_| too_small())?;

        Ok(ConvStem {
            feature_map: (conv3.out_channels, hw.0, hw.1),
            conv1,
            pool1,
            conv2,
            pool2,
            conv3,
            pool3,
            state_shape,
            cached_batch: None,
        })
    }

    pub fn state_shape(&self) -> StateShape {
        self.state_shape
    }

    /// Length of the flattened feature vector per observation
    pub fn output_size(&self) -> usize {
        let (c, h, w) = self.feature_map;
        c * h * w
    }

    /// `[batch, H, W, C]` observations to `[batch, features]`
    pub fn forward(&mut self, states: ArrayView4<f32>) -> Result<Array2<f32>> {
        check_state_batch(states, self.state_shape)?;
        let batch = states.shape()[0];
        let x = states.permuted_axes([0, 3, 1, 2]).as_standard_layout().into_owned();

        let x = self.conv1.forward_batch(x.view())?;
        let x = self.pool1.forward_batch(x.view())?;
        let x = self.conv2.forward_batch(x.view())?;
        let x = self.pool2.forward_batch(x.view())?;
        let x = self.conv3.forward_batch(x.view())?;
        let x = self.pool3.forward_batch(x.view())?;

        self.cached_batch = Some(batch);
        Ok(x.into_shape((batch, self.output_size()))?)
    }

    /// Parameter gradients for `dL/dfeatures`, in [`Parameterized`] order.
    pub fn backward(&self, feature_gradient: ArrayView2<f32>) -> Result<Vec<ArrayD<f32>>> {
        let batch = self.cached_batch.ok_or_else(|| {
            DdpgError::invalid_parameter("backward", "forward must be called before backward")
        })?;
        let (c, h, w) = self.feature_map;
        let grad: Array4<f32> = feature_gradient
            .as_standard_layout()
            .into_owned()
            .into_shape((batch, c, h, w))?;

        let grad = self.pool3.backward_batch(grad.view())?;
        let g3 = self.conv3.backward_batch(grad.view())?;
        let grad = self.pool2.backward_batch(g3.input.view())?;
        let g2 = self.conv2.backward_batch(grad.view())?;
        let grad = self.pool1.backward_batch(g2.input.view())?;
        let g1 = self.conv1.backward_batch(grad.view())?;

        let mut gradients = Vec::new();
        for g in [g1, g2, g3] {
            push_conv_gradients(g, &mut gradients);
        }
        Ok(gradients)
    }

    fn summary_lines(&self, lines: &mut Vec<String>) {
        let (h, w, c) = self.state_shape;
        lines.push(format!("  input          [{}, {}, {}]", h, w, c));
        for (name, conv) in [("conv2d_1", &self.conv1), ("conv2d_2", &self.conv2), ("conv2d_3", &self.conv3)] {
            lines.push(format!(
                "  {:<14} {} -> {} @ {}x{} stride {:?} ({} params)",
                name,
                conv.in_channels,
                conv.out_channels,
                conv.kernel_size.0,
                conv.kernel_size.1,
                conv.stride,
                conv.num_parameters()
            ));
        }
        let (fc, fh, fw) = self.feature_map;
        lines.push(format!("  flatten        [{}, {}, {}] -> {}", fc, fh, fw, self.output_size()));
    }
}

impl Parameterized for ConvStem {
    fn parameters(&self) -> Vec<ArrayViewD<'_, f32>> {
        let mut params = self.conv1.parameters();
        params.extend(self.conv2.parameters());
        params.extend(self.conv3.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        let mut params = self.conv1.parameters_mut();
        params.extend(self.conv2.parameters_mut());
        params.extend(self.conv3.parameters_mut());
        params
    }
}

fn push_conv_gradients(g: ConvGradients, out: &mut Vec<ArrayD<f32>>) {
    out.push(g.kernels.into_dyn());
    if let Some(b) = g.biases {
        out.push(b.into_dyn());
    }
}

/// Reject a batch whose per-observation shape differs from the one the network was built for.
pub(crate) fn check_state_batch(states: ArrayView4<f32>, expected: StateShape) -> Result<()> {
    let (h, w, c) = expected;
    let shape = states.shape();
    if shape[1..] != [h, w, c] || shape[0] == 0 {
        return Err(DdpgError::dimension_mismatch(
            format!("[batch >= 1, {}, {}, {}]", h, w, c),
            format!("{:?}", shape),
        ));
    }
    Ok(())
}

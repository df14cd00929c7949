//! 2D convolution over `[batch, channels, height, width]` feature maps.
//!
//! Only "valid" convolutions (no padding) are supported. The forward pass lowers the
//! input to a patch matrix (im2col) so that the heavy lifting is a single matrix
//! product; the backward pass reuses the cached patch matrix for the kernel gradient
//! and scatters the patch gradient back into image space (col2im).

use ndarray::{s, Array1, Array2, Array4, ArrayView4, ArrayViewD, ArrayViewMutD, Axis};
use rand::Rng;

use super::initialization::WeightInit;
use super::traits::Parameterized;
use crate::activations::Activation;
use crate::error::{DdpgError, Result};

/// 2D Convolutional Layer
#[derive(Clone, Debug)]
pub struct Conv2DLayer {
    /// Convolution kernels `[out_channels, in_channels, kernel_height, kernel_width]`
    pub kernels: Array4<f32>,

    /// One bias per output channel, absent for bias-free convolutions
    pub biases: Option<Array1<f32>>,

    pub activation: Activation,

    pub stride: (usize, usize),

    pub in_channels: usize,

    pub out_channels: usize,

    pub kernel_size: (usize, usize),

    cache: Option<ConvCache>,
}

#[derive(Clone, Debug)]
struct ConvCache {
    input_dim: (usize, usize, usize, usize),
    output_hw: (usize, usize),
    columns: Array2<f32>,
    pre_activation: Array4<f32>,
}

/// Gradients produced by [`Conv2DLayer::backward_batch`]
#[derive(Debug, Clone)]
pub struct ConvGradients {
    pub input: Array4<f32>,
    pub kernels: Array4<f32>,
    pub biases: Option<Array1<f32>>,
}

impl Conv2DLayer {
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        stride: (usize, usize),
        use_bias: bool,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        if in_channels == 0 || out_channels == 0 {
            return Err(DdpgError::invalid_parameter("channels", "channel counts must be positive"));
        }
        if kernel_size.0 == 0 || kernel_size.1 == 0 || stride.0 == 0 || stride.1 == 0 {
            return Err(DdpgError::invalid_parameter(
                "kernel_size/stride",
                "kernel size and stride must be positive",
            ));
        }

        let area = kernel_size.0 * kernel_size.1;
        let kernels = WeightInit::for_activation(&activation).initialize(
            (out_channels, in_channels, kernel_size.0, kernel_size.1),
            in_channels * area,
            out_channels * area,
            rng,
        )?;

        Ok(Conv2DLayer {
            kernels,
            biases: if use_bias { Some(Array1::zeros(out_channels)) } else { None },
            activation,
            stride,
            in_channels,
            out_channels,
            kernel_size,
            cache: None,
        })
    }

    /// Spatial size produced for a given input size, `None` if the kernel does not fit.
    pub fn output_hw(&self, height: usize, width: usize) -> Option<(usize, usize)> {
        if height < self.kernel_size.0 || width < self.kernel_size.1 {
            return None;
        }
        Some((
            (height - self.kernel_size.0) / self.stride.0 + 1,
            (width - self.kernel_size.1) / self.stride.1 + 1,
        ))
    }

    fn patch_len(&self) -> usize {
        self.in_channels * self.kernel_size.0 * self.kernel_size.1
    }

    fn kernel_matrix(&self) -> Result<Array2<f32>> {
        let (oc, len) = (self.out_channels, self.patch_len());
        Ok(self.kernels.as_standard_layout().into_owned().into_shape((oc, len))?)
    }

    /// Forward pass for a batch of images `[batch, channels, height, width]`
    pub fn forward_batch(&mut self, input: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (batch, channels, height, width) = input.dim();
        if channels != self.in_channels {
            return Err(DdpgError::dimension_mismatch(
                format!("{} input channels", self.in_channels),
                format!("{} input channels", channels),
            ));
        }
        let (out_h, out_w) = self.output_hw(height, width).ok_or_else(|| {
            DdpgError::dimension_mismatch(
                format!("spatial size of at least {:?}", self.kernel_size),
                format!("{}x{}", height, width),
            )
        })?;

        let (kh, kw) = self.kernel_size;
        let mut columns = Array2::<f32>::zeros((batch * out_h * out_w, self.patch_len()));
        for b in 0..batch {
            for oh in 0..out_h {
                for ow in 0..out_w {
                    let h0 = oh * self.stride.0;
                    let w0 = ow * self.stride.1;
                    let patch = input.slice(s![b, .., h0..h0 + kh, w0..w0 + kw]);
                    let row = (b * out_h + oh) * out_w + ow;
                    columns
                        .row_mut(row)
                        .iter_mut()
                        .zip(patch.iter())
                        .for_each(|(c, &p)| *c = p);
                }
            }
        }

        let mut flat = columns.dot(&self.kernel_matrix()?.t());
        if let Some(biases) = &self.biases {
            flat += &biases.view().insert_axis(Axis(0));
        }

        let pre_activation = flat
            .into_shape((batch, out_h, out_w, self.out_channels))?
            .permuted_axes([0, 3, 1, 2])
            .as_standard_layout()
            .into_owned();

        let mut output = pre_activation.clone();
        self.activation.apply(&mut output);

        self.cache = Some(ConvCache {
            input_dim: (batch, channels, height, width),
            output_hw: (out_h, out_w),
            columns,
            pre_activation,
        });
        Ok(output)
    }

    /// Backpropagate `dL/doutput` through the most recent forward pass.
    pub fn backward_batch(&self, output_gradient: ArrayView4<f32>) -> Result<ConvGradients> {
        let cache = self.cache.as_ref().ok_or_else(|| {
            DdpgError::invalid_parameter("backward_batch", "forward_batch must be called before backward_batch")
        })?;
        if output_gradient.dim() != cache.pre_activation.dim() {
            return Err(DdpgError::dimension_mismatch(
                format!("{:?}", cache.pre_activation.shape()),
                format!("{:?}", output_gradient.shape()),
            ));
        }

        let (batch, channels, height, width) = cache.input_dim;
        let (out_h, out_w) = cache.output_hw;
        let (kh, kw) = self.kernel_size;

        let delta = &output_gradient * &self.activation.derivative(&cache.pre_activation);
        let delta = delta
            .permuted_axes([0, 2, 3, 1])
            .as_standard_layout()
            .into_owned()
            .into_shape((batch * out_h * out_w, self.out_channels))?;

        let kernels = delta.t().dot(&cache.columns).into_shape(self.kernels.raw_dim())?;
        let biases = self.biases.as_ref().map(|_| delta.sum_axis(Axis(0)));

        let column_grads = delta.dot(&self.kernel_matrix()?);
        let mut input = Array4::<f32>::zeros((batch, channels, height, width));
        for b in 0..batch {
            for oh in 0..out_h {
                for ow in 0..out_w {
                    let h0 = oh * self.stride.0;
                    let w0 = ow * self.stride.1;
                    let row = (b * out_h + oh) * out_w + ow;
                    let grad = column_grads.row(row).into_shape((channels, kh, kw))?;
                    input
                        .slice_mut(s![b, .., h0..h0 + kh, w0..w0 + kw])
                        .zip_mut_with(&grad, |d, &g| *d += g);
                }
            }
        }

        Ok(ConvGradients { input, kernels, biases })
    }
}

impl Parameterized for Conv2DLayer {
    fn parameters(&self) -> Vec<ArrayViewD<'_, f32>> {
        let mut params = vec![self.kernels.view().into_dyn()];
        if let Some(b) = &self.biases {
            params.push(b.view().into_dyn());
        }
        params
    }

    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>> {
        let mut params = vec![self.kernels.view_mut().into_dyn()];
        if let Some(b) = &mut self.biases {
            params.push(b.view_mut().into_dyn());
        }
        params
    }
}

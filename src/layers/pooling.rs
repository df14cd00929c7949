//! Pooling layers for downsampling spatial data
//!
//! Max pooling keeps the dominant response of each window, average pooling smooths it.
//! Both operate on `[batch, channels, height, width]` and drop trailing rows/columns
//! that do not fill a whole window.

use ndarray::{s, Array4, ArrayView4};

use crate::error::{DdpgError, Result};

fn pooled_size(
    input: (usize, usize),
    pool_size: (usize, usize),
    stride: (usize, usize),
) -> Result<(usize, usize)> {
    if input.0 < pool_size.0 || input.1 < pool_size.1 {
        return Err(DdpgError::dimension_mismatch(
            format!("spatial size of at least {:?}", pool_size),
            format!("{}x{}", input.0, input.1),
        ));
    }
    Ok((
        (input.0 - pool_size.0) / stride.0 + 1,
        (input.1 - pool_size.1) / stride.1 + 1,
    ))
}

fn not_run_yet() -> DdpgError {
    DdpgError::invalid_parameter("backward_batch", "forward_batch must be called before backward_batch")
}

/// 2D Max Pooling Layer
#[derive(Clone, Debug)]
pub struct MaxPool2DLayer {
    pub pool_size: (usize, usize),
    pub stride: (usize, usize),
    /// Location of the winning element of every output cell
    cached_indices: Option<Array4<(usize, usize)>>,
    cached_input_shape: Option<(usize, usize, usize, usize)>,
}

impl MaxPool2DLayer {
    /// Create a pooling layer; the stride defaults to the window size.
    pub fn new(pool_size: (usize, usize), stride: Option<(usize, usize)>) -> Self {
        MaxPool2DLayer {
            pool_size,
            stride: stride.unwrap_or(pool_size),
            cached_indices: None,
            cached_input_shape: None,
        }
    }

    pub fn output_hw(&self, height: usize, width: usize) -> Result<(usize, usize)> {
        pooled_size((height, width), self.pool_size, self.stride)
    }

    pub fn forward_batch(&mut self, input: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (batch_size, channels, in_height, in_width) = input.dim();
        let (out_height, out_width) = self.output_hw(in_height, in_width)?;

        let mut output = Array4::zeros((batch_size, channels, out_height, out_width));
        let mut indices = Array4::from_elem((batch_size, channels, out_height, out_width), (0, 0));

        for b in 0..batch_size {
            for c in 0..channels {
                for oh in 0..out_height {
                    for ow in 0..out_width {
                        let h_start = oh * self.stride.0;
                        let w_start = ow * self.stride.1;

                        let mut max_val = f32::NEG_INFINITY;
                        let mut arg = (h_start, w_start);
                        for h in h_start..h_start + self.pool_size.0 {
                            for w in w_start..w_start + self.pool_size.1 {
                                let val = input[[b, c, h, w]];
                                if val > max_val {
                                    max_val = val;
                                    arg = (h, w);
                                }
                            }
                        }

                        output[[b, c, oh, ow]] = max_val;
                        indices[[b, c, oh, ow]] = arg;
                    }
                }
            }
        }

        self.cached_input_shape = Some((batch_size, channels, in_height, in_width));
        self.cached_indices = Some(indices);
        Ok(output)
    }

    /// Route each output gradient to the element that won its window.
    pub fn backward_batch(&self, output_gradient: ArrayView4<f32>) -> Result<Array4<f32>> {
        let indices = self.cached_indices.as_ref().ok_or_else(not_run_yet)?;
        let input_shape = self.cached_input_shape.ok_or_else(not_run_yet)?;
        if output_gradient.dim() != indices.dim() {
            return Err(DdpgError::dimension_mismatch(
                format!("{:?}", indices.shape()),
                format!("{:?}", output_gradient.shape()),
            ));
        }

        let mut input_gradient = Array4::zeros(input_shape);
        for ((b, c, oh, ow), &(h, w)) in indices.indexed_iter() {
            input_gradient[[b, c, h, w]] += output_gradient[[b, c, oh, ow]];
        }
        Ok(input_gradient)
    }
}

/// 2D Average Pooling Layer
#[derive(Clone, Debug)]
pub struct AvgPool2DLayer {
    pub pool_size: (usize, usize),
    pub stride: (usize, usize),
    cached_input_shape: Option<(usize, usize, usize, usize)>,
}

impl AvgPool2DLayer {
    /// Create a pooling layer; the stride defaults to the window size.
    pub fn new(pool_size: (usize, usize), stride: Option<(usize, usize)>) -> Self {
        AvgPool2DLayer {
            pool_size,
            stride: stride.unwrap_or(pool_size),
            cached_input_shape: None,
        }
    }

    pub fn output_hw(&self, height: usize, width: usize) -> Result<(usize, usize)> {
        pooled_size((height, width), self.pool_size, self.stride)
    }

    pub fn forward_batch(&mut self, input: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (batch_size, channels, in_height, in_width) = input.dim();
        let (out_height, out_width) = self.output_hw(in_height, in_width)?;
        let pool_area = (self.pool_size.0 * self.pool_size.1) as f32;

        let output = Array4::from_shape_fn(
            (batch_size, channels, out_height, out_width),
            |(b, c, oh, ow)| {
                let h_start = oh * self.stride.0;
                let w_start = ow * self.stride.1;
                input
                    .slice(s![
                        b,
                        c,
                        h_start..h_start + self.pool_size.0,
                        w_start..w_start + self.pool_size.1
                    ])
                    .sum()
                    / pool_area
            },
        );

        self.cached_input_shape = Some((batch_size, channels, in_height, in_width));
        Ok(output)
    }

    /// Spread each output gradient evenly across its window.
    pub fn backward_batch(&self, output_gradient: ArrayView4<f32>) -> Result<Array4<f32>> {
        let input_shape = self.cached_input_shape.ok_or_else(not_run_yet)?;
        let (out_height, out_width) = self.output_hw(input_shape.2, input_shape.3)?;
        let expected = (input_shape.0, input_shape.1, out_height, out_width);
        if output_gradient.dim() != expected {
            return Err(DdpgError::dimension_mismatch(
                format!("{:?}", expected),
                format!("{:?}", output_gradient.dim()),
            ));
        }
        let pool_area = (self.pool_size.0 * self.pool_size.1) as f32;

        let mut input_gradient = Array4::zeros(input_shape);
        for ((b, c, oh, ow), &g) in output_gradient.indexed_iter() {
            let h_start = oh * self.stride.0;
            let w_start = ow * self.stride.1;
            input_gradient
                .slice_mut(s![
                    b,
                    c,
                    h_start..h_start + self.pool_size.0,
                    w_start..w_start + self.pool_size.1
                ])
                .mapv_inplace(|v| v + g / pool_area);
        }
        Ok(input_gradient)
    }
}

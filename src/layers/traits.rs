use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD};

use crate::error::{DdpgError, Result};

/// Anything that owns trainable parameters.
///
/// The order of [`parameters`](Parameterized::parameters) and
/// [`parameters_mut`](Parameterized::parameters_mut) must be identical and stable: it is
/// the order in which gradients are returned, optimizer state is kept and weights are
/// exchanged between a network and its target copy.
pub trait Parameterized {
    fn parameters(&self) -> Vec<ArrayViewD<'_, f32>>;

    fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f32>>;

    /// Total number of scalar parameters
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }

    /// Owned snapshot of every parameter tensor
    fn get_weights(&self) -> Vec<ArrayD<f32>> {
        self.parameters().into_iter().map(|p| p.to_owned()).collect()
    }

    /// Overwrite every parameter tensor. Count and shapes must match exactly.
    fn set_weights(&mut self, weights: &[ArrayD<f32>]) -> Result<()> {
        let mut params = self.parameters_mut();
        if params.len() != weights.len() {
            return Err(DdpgError::dimension_mismatch(
                format!("{} parameter tensors", params.len()),
                format!("{} parameter tensors", weights.len()),
            ));
        }
        for (i, (param, weight)) in params.iter_mut().zip(weights).enumerate() {
            if param.shape() != weight.shape() {
                return Err(DdpgError::dimension_mismatch(
                    format!("parameter {} with shape {:?}", i, param.shape()),
                    format!("shape {:?}", weight.shape()),
                ));
            }
            param.assign(weight);
        }
        Ok(())
    }

    /// Polyak averaging: `self ← tau * source + (1 - tau) * self`
    fn soft_update_from(&mut self, source: &Self, tau: f32) -> Result<()>
    where
        Self: Sized,
    {
        let src = source.parameters();
        let mut dst = self.parameters_mut();
        if src.len() != dst.len() {
            return Err(DdpgError::dimension_mismatch(
                format!("{} parameter tensors", dst.len()),
                format!("{} parameter tensors", src.len()),
            ));
        }
        for (target, source) in dst.iter_mut().zip(src.iter()) {
            if target.shape() != source.shape() {
                return Err(DdpgError::dimension_mismatch(
                    format!("{:?}", target.shape()),
                    format!("{:?}", source.shape()),
                ));
            }
            target.zip_mut_with(source, |t, &s| *t = tau * s + (1.0 - tau) * *t);
        }
        Ok(())
    }
}

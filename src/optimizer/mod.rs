//! First-order optimizers operating on a network's ordered parameter list.
//!
//! Parameters and gradients are exchanged as dynamic-rank arrays so that the same
//! optimizer drives convolution kernels, dense weights and bias vectors alike.

pub mod gradient_clipper;

use ndarray::{ArrayD, ArrayViewMutD};
use serde::{Deserialize, Serialize};

use crate::error::{DdpgError, Result};

pub use gradient_clipper::GradientClipper;

pub trait Optimizer {
    /// Apply one descent step. `params` and `gradients` must be in the same order.
    fn step(
        &mut self,
        params: Vec<ArrayViewMutD<'_, f32>>,
        gradients: &[ArrayD<f32>],
        learning_rate: f32,
    ) -> Result<()>;
}

/// Which optimizer to instantiate for each trained network
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Sgd,
    #[default]
    Adam,
}

#[derive(Clone, Debug)]
pub enum OptimizerWrapper {
    SGD(SGD),
    Adam(Adam),
}

impl OptimizerWrapper {
    pub fn from_kind(kind: OptimizerKind) -> Self {
        match kind {
            OptimizerKind::Sgd => OptimizerWrapper::SGD(SGD::new()),
            OptimizerKind::Adam => OptimizerWrapper::Adam(Adam::default()),
        }
    }
}

impl Optimizer for OptimizerWrapper {
    fn step(
        &mut self,
        params: Vec<ArrayViewMutD<'_, f32>>,
        gradients: &[ArrayD<f32>],
        learning_rate: f32,
    ) -> Result<()> {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.step(params, gradients, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.step(params, gradients, learning_rate),
        }
    }
}

fn check_alignment(params: &[ArrayViewMutD<'_, f32>], gradients: &[ArrayD<f32>]) -> Result<()> {
    if params.len() != gradients.len() {
        return Err(DdpgError::dimension_mismatch(
            format!("{} gradient tensors", params.len()),
            format!("{} gradient tensors", gradients.len()),
        ));
    }
    for (i, (p, g)) in params.iter().zip(gradients).enumerate() {
        if p.shape() != g.shape() {
            return Err(DdpgError::dimension_mismatch(
                format!("gradient {} with shape {:?}", i, p.shape()),
                format!("shape {:?}", g.shape()),
            ));
        }
    }
    Ok(())
}

#[derive(Clone, Debug, Default)]
pub struct SGD;

impl SGD {
    pub fn new() -> SGD {
        SGD
    }
}

impl Optimizer for SGD {
    fn step(
        &mut self,
        mut params: Vec<ArrayViewMutD<'_, f32>>,
        gradients: &[ArrayD<f32>],
        learning_rate: f32,
    ) -> Result<()> {
        check_alignment(&params, gradients)?;
        for (param, grad) in params.iter_mut().zip(gradients) {
            param.zip_mut_with(grad, |w, &g| *w -= learning_rate * g);
        }
        Ok(())
    }
}

/// Adam with one pair of moment estimates per parameter tensor.
///
/// Moments are allocated on the first step, so one instance can be created before the
/// network it will train has been built.
#[derive(Clone, Debug)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    m: Vec<ArrayD<f32>>,
    v: Vec<ArrayD<f32>>,
    pub t: i32,
}

impl Adam {
    pub fn new(beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            beta1,
            beta2,
            epsilon,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn step(
        &mut self,
        mut params: Vec<ArrayViewMutD<'_, f32>>,
        gradients: &[ArrayD<f32>],
        learning_rate: f32,
    ) -> Result<()> {
        check_alignment(&params, gradients)?;
        if self.m.is_empty() {
            self.m = gradients.iter().map(|g| ArrayD::zeros(g.raw_dim())).collect();
            self.v = gradients.iter().map(|g| ArrayD::zeros(g.raw_dim())).collect();
        } else if self.m.len() != gradients.len()
            || self.m.iter().zip(gradients).any(|(m, g)| m.shape() != g.shape())
        {
            return Err(DdpgError::dimension_mismatch(
                "the parameter layout seen on the first step",
                "a different parameter layout",
            ));
        }

        self.t += 1;
        let (beta1, beta2, eps) = (self.beta1, self.beta2, self.epsilon);
        let bias1 = 1.0 - beta1.powi(self.t);
        let bias2 = 1.0 - beta2.powi(self.t);

        for (((param, grad), m), v) in params
            .iter_mut()
            .zip(gradients)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
        {
            m.zip_mut_with(grad, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
            v.zip_mut_with(grad, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);
            ndarray::Zip::from(param)
                .and(&*m)
                .and(&*v)
                .for_each(|w, &m, &v| {
                    let m_hat = m / bias1;
                    let v_hat = v / bias2;
                    *w -= learning_rate * m_hat / (v_hat.sqrt() + eps);
                });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn test_sgd_step() {
        let mut w = array![1.0f32, 2.0].into_dyn();
        let g = vec![array![0.5f32, -1.0].into_dyn()];
        SGD::new().step(vec![w.view_mut()], &g, 0.1).unwrap();
        assert!((w[[0]] - 0.95).abs() < 1e-6);
        assert!((w[[1]] - 2.1).abs() < 1e-6);
    }

    #[test]
    fn test_adam_first_step_moves_by_learning_rate() {
        // bias-corrected first step has magnitude ~lr regardless of gradient scale
        let mut w = Array1::<f32>::zeros(3).into_dyn();
        let g = vec![array![10.0f32, -0.01, 3.0].into_dyn()];
        let mut adam = Adam::default();
        adam.step(vec![w.view_mut()], &g, 0.01).unwrap();
        for (&wi, &gi) in w.iter().zip(g[0].iter()) {
            assert!((wi + 0.01 * gi.signum()).abs() < 1e-4);
        }
        assert_eq!(adam.t, 1);
    }

    #[test]
    fn test_adam_rejects_layout_change() {
        let mut w = Array1::<f32>::zeros(2).into_dyn();
        let mut adam = Adam::default();
        adam.step(vec![w.view_mut()], &[Array1::ones(2).into_dyn()], 0.1).unwrap();

        let mut other = Array1::<f32>::zeros(3).into_dyn();
        assert!(adam
            .step(vec![other.view_mut()], &[Array1::ones(3).into_dyn()], 0.1)
            .is_err());
    }

    #[test]
    fn test_misaligned_gradients() {
        let mut w = Array1::<f32>::zeros(2).into_dyn();
        let result = SGD::new().step(vec![w.view_mut()], &[], 0.1);
        assert!(result.is_err());
    }
}

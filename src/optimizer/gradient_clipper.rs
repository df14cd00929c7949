use ndarray::ArrayD;

/// Gradient clipping applied before each optimizer step
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GradientClipper {
    /// Rescale all gradient tensors together when their joint norm exceeds `max_norm`
    ClipByGlobalNorm { max_norm: f32 },

    /// No clipping
    None,
}

impl GradientClipper {
    pub fn clip(&self, gradients: &mut [ArrayD<f32>]) {
        match *self {
            GradientClipper::ClipByGlobalNorm { max_norm } => {
                let global_norm = Self::global_norm(gradients);
                if global_norm > max_norm {
                    let scale = max_norm / global_norm;
                    for grad in gradients.iter_mut() {
                        grad.mapv_inplace(|g| g * scale);
                    }
                }
            }

            GradientClipper::None => {}
        }
    }

    /// L2 norm over every element of every tensor
    pub fn global_norm(gradients: &[ArrayD<f32>]) -> f32 {
        gradients
            .iter()
            .map(|g| g.iter().map(|&x| x * x).sum::<f32>())
            .sum::<f32>()
            .sqrt()
    }
}

impl From<Option<f32>> for GradientClipper {
    fn from(max_norm: Option<f32>) -> Self {
        match max_norm {
            Some(max_norm) => GradientClipper::ClipByGlobalNorm { max_norm },
            None => GradientClipper::None,
        }
    }
}

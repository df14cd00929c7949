//! Temporally correlated exploration noise.
//!
//! An Ornstein-Uhlenbeck process discretised with Euler-Maruyama:
//!
//! ```text
//! x <- x + theta * (mu - x) * dt + sigma * sqrt(dt) * N(0, 1)
//! ```
//!
//! Consecutive samples drift back toward `mu`, which gives smoother exploration for
//! inertial controls than independent Gaussian noise. Output is never clipped.

use ndarray::Array1;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{DdpgError, Result};

pub const DEFAULT_THETA: f32 = 0.15;
pub const DEFAULT_DT: f32 = 1e-2;

#[derive(Clone, Debug)]
pub struct NoiseGenerator {
    pub mu: Array1<f32>,
    pub sigma: Array1<f32>,
    pub theta: f32,
    pub dt: f32,
    x_prev: Array1<f32>,
}

impl NoiseGenerator {
    pub fn new(mu: Array1<f32>, sigma: Array1<f32>) -> Result<Self> {
        Self::with_params(mu, sigma, DEFAULT_THETA, DEFAULT_DT)
    }

    pub fn with_params(mu: Array1<f32>, sigma: Array1<f32>, theta: f32, dt: f32) -> Result<Self> {
        if mu.len() != sigma.len() {
            return Err(DdpgError::dimension_mismatch(
                format!("sigma of length {}", mu.len()),
                format!("length {}", sigma.len()),
            ));
        }
        if sigma.iter().any(|&s| !(s >= 0.0) || !s.is_finite()) {
            return Err(DdpgError::invalid_parameter("noise_sigma", "volatility must be finite and non-negative"));
        }
        if !(theta >= 0.0) || !(dt > 0.0) {
            return Err(DdpgError::invalid_parameter("noise_theta/noise_dt", "theta must be >= 0 and dt > 0"));
        }
        let x_prev = mu.clone();
        Ok(NoiseGenerator { mu, sigma, theta, dt, x_prev })
    }

    /// Same `mu`/`sigma` on every dimension
    pub fn uniform(dim: usize, mu: f32, sigma: f32, theta: f32, dt: f32) -> Result<Self> {
        Self::with_params(Array1::from_elem(dim, mu), Array1::from_elem(dim, sigma), theta, dt)
    }

    pub fn dim(&self) -> usize {
        self.mu.len()
    }

    /// Forget the trajectory so far; the next sample starts from `mu`.
    pub fn reset(&mut self) {
        self.x_prev.assign(&self.mu);
    }

    /// Current state of the process
    pub fn current(&self) -> &Array1<f32> {
        &self.x_prev
    }

    /// Advance the process one step and return the new value.
    pub fn generate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Array1<f32> {
        let sqrt_dt = self.dt.sqrt();
        for ((x, &mu), &sigma) in self.x_prev.iter_mut().zip(self.mu.iter()).zip(self.sigma.iter()) {
            let z: f32 = rng.sample(StandardNormal);
            *x += self.theta * (mu - *x) * self.dt + sigma * sqrt_dt * z;
        }
        self.x_prev.clone()
    }
}

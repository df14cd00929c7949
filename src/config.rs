use serde::{Deserialize, Serialize};

use crate::error::{DdpgError, Result};
use crate::optimizer::OptimizerKind;

/// Hyperparameters for [`DdpgAgent`](crate::agent::DdpgAgent).
///
/// Missing fields take their defaults when deserialising, so a JSON document only needs
/// to name what it changes.
///
/// ```
/// use vision_ddpg::config::AgentConfig;
///
/// let config = AgentConfig::from_json_str(r#"{ "batch_size": 32, "seed": 7 }"#).unwrap();
/// assert_eq!(config.batch_size, 32);
/// assert_eq!(config.gamma, 0.99);
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Discount factor
    pub gamma: f32,
    /// Soft update rate for the target networks
    pub tau: f32,
    pub buffer_capacity: usize,
    pub batch_size: usize,
    pub noise_mu: f32,
    pub noise_sigma: f32,
    pub noise_theta: f32,
    pub noise_dt: f32,
    pub actor_lr: f32,
    pub critic_lr: f32,
    pub optimizer: OptimizerKind,
    /// Zero the bootstrap term of the TD target on terminal transitions
    pub terminal_masking: bool,
    /// Average colour channels into one before normalising
    pub greyscale: bool,
    /// Global-norm gradient clipping for both networks
    pub max_grad_norm: Option<f32>,
    /// Seed for every random draw the agent makes; entropy when absent
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            gamma: 0.99,
            tau: 0.005,
            buffer_capacity: 40_000,
            batch_size: 64,
            noise_mu: 0.0,
            noise_sigma: 0.001,
            noise_theta: 0.15,
            noise_dt: 1e-2,
            actor_lr: 1e-4,
            critic_lr: 1e-3,
            optimizer: OptimizerKind::Adam,
            terminal_masking: false,
            greyscale: true,
            max_grad_norm: None,
            seed: None,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(DdpgError::invalid_parameter("gamma", "must be in [0, 1]"));
        }
        if !(self.tau > 0.0 && self.tau <= 1.0) {
            return Err(DdpgError::invalid_parameter("tau", "must be in (0, 1]"));
        }
        if self.buffer_capacity == 0 {
            return Err(DdpgError::invalid_parameter("buffer_capacity", "must be greater than 0"));
        }
        if self.batch_size == 0 || self.batch_size > self.buffer_capacity {
            return Err(DdpgError::invalid_parameter(
                "batch_size".to_string(),
                format!("must be between 1 and buffer_capacity ({})", self.buffer_capacity),
            ));
        }
        if !self.noise_mu.is_finite() {
            return Err(DdpgError::invalid_parameter("noise_mu", "must be finite"));
        }
        if !(self.noise_sigma >= 0.0 && self.noise_sigma.is_finite()) {
            return Err(DdpgError::invalid_parameter("noise_sigma", "must be finite and non-negative"));
        }
        if !(self.noise_theta >= 0.0) {
            return Err(DdpgError::invalid_parameter("noise_theta", "must be non-negative"));
        }
        if !(self.noise_dt > 0.0) {
            return Err(DdpgError::invalid_parameter("noise_dt", "must be positive"));
        }
        if !(self.actor_lr > 0.0) || !(self.critic_lr > 0.0) {
            return Err(DdpgError::invalid_parameter("learning_rate", "actor_lr and critic_lr must be positive"));
        }
        if let Some(norm) = self.max_grad_norm {
            if !(norm > 0.0) {
                return Err(DdpgError::invalid_parameter("max_grad_norm", "must be positive when set"));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AgentConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

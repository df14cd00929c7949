//! # vision_ddpg - Deep Deterministic Policy Gradient from pixels
//!
//! A base agent that maps raw image observations to continuous control actions with
//! DDPG. Problem-specific agents reuse it by choosing an [`ActionSpace`](types::ActionSpace)
//! and, when the policy's output differs from what the environment consumes, an
//! [`ActionDecoder`](types::ActionDecoder).
//!
//! ## Key Features
//!
//! - **Convolutional actor and critic** built lazily from the first observation
//! - **Target networks** kept as exact copies at creation and Polyak-averaged afterwards
//! - **Ornstein-Uhlenbeck exploration noise** with seeded, reproducible streams
//! - **Circular replay buffer** with uniform sampling
//! - **In-crate tensor backend** on `ndarray`: im2col convolution, pooling, dense layers,
//!   hand-written gradients, SGD and Adam
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ndarray::Array3;
//! use vision_ddpg::agent::DdpgAgent;
//! use vision_ddpg::config::AgentConfig;
//! use vision_ddpg::types::ActionSpace;
//!
//! let space = ActionSpace::from_vecs(vec![-1.0, 0.0], vec![1.0, 1.0]).unwrap();
//! let mut agent = DdpgAgent::new(space, AgentConfig::default()).unwrap();
//!
//! let observation = Array3::<f32>::from_elem((64, 64, 3), 200.0);
//! let action = agent.get_action(observation.view()).unwrap();
//! println!("steer {:?}", action.env_action);
//! ```
//!
//! ## Module Organization
//!
//! - [`activations`] - Activation functions (ReLU, Sigmoid, Linear)
//! - [`agent`] - The DDPG agent and its builder
//! - [`config`] - Agent hyperparameters
//! - [`error`] - Error types and result handling
//! - [`layers`] - Convolution, pooling and dense layers
//! - [`network`] - Actor and critic architectures
//! - [`noise`] - Ornstein-Uhlenbeck exploration noise
//! - [`optimizer`] - Optimization algorithms and gradient clipping
//! - [`preprocess`] - Observation normalisation
//! - [`replay_buffer`] - Experience replay
//! - [`types`] - Action spaces and decoders

pub mod activations;
pub mod agent;
pub mod config;
pub mod error;
pub mod layers;
pub mod network;
pub mod noise;
pub mod optimizer;
pub mod preprocess;
pub mod replay_buffer;
pub mod types;

pub use agent::{DdpgAgent, DdpgAgentBuilder, LearnStats};
pub use config::AgentConfig;
pub use error::{DdpgError, Result};

#[cfg(test)]
mod tests;

//! # Activation Functions Module
//!
//! The non-linearities used by the convolutional stem and the dense heads.
//!
//! ## Available Activations
//!
//! - **ReLU**: `max(0, x)` - every hidden layer
//! - **Sigmoid**: `1 / (1 + e^(-x))` - the actor's output layer, keeps raw actions in (0, 1)
//! - **Linear**: Identity function - the critic's Q-value head
//!
//! ## Usage Example
//!
//! ```rust
//! use vision_ddpg::activations::Activation;
//! use ndarray::array;
//!
//! let mut data = array![1.0, -0.5, 0.0, 2.0];
//! Activation::Relu.apply(&mut data);
//! assert_eq!(data, array![1.0, 0.0, 0.0, 2.0]);
//! ```
//!
//! Activations work on arrays of any rank, so the same enum drives both the 4D
//! feature maps of the convolutions and the 2D activations of the dense layers.

pub mod functions;

pub use functions::Activation;

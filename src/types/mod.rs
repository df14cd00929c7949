//! Action spaces and the strategies that turn raw policy outputs into environment actions.

use ndarray::{Array1, ArrayView1};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::{DdpgError, Result};

/// Box-shaped continuous action space.
///
/// Bounds are only reachable through [`ActionSpace::new`], deserialisation included, so
/// `low` and `high` always have the same non-zero length.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ActionBounds")]
pub struct ActionSpace {
    low: Array1<f32>,
    high: Array1<f32>,
}

/// Unchecked wire form of [`ActionSpace`]
#[derive(Deserialize)]
struct ActionBounds {
    low: Array1<f32>,
    high: Array1<f32>,
}

impl TryFrom<ActionBounds> for ActionSpace {
    type Error = DdpgError;

    fn try_from(bounds: ActionBounds) -> Result<Self> {
        ActionSpace::new(bounds.low, bounds.high)
    }
}

impl ActionSpace {
    pub fn new(low: Array1<f32>, high: Array1<f32>) -> Result<Self> {
        if low.len() != high.len() {
            return Err(DdpgError::dimension_mismatch(
                format!("high bound of length {}", low.len()),
                format!("length {}", high.len()),
            ));
        }
        if low.is_empty() {
            return Err(DdpgError::invalid_parameter("action_space", "needs at least one dimension"));
        }
        Ok(ActionSpace { low, high })
    }

    pub fn from_vecs(low: Vec<f32>, high: Vec<f32>) -> Result<Self> {
        Self::new(Array1::from_vec(low), Array1::from_vec(high))
    }

    /// Number of action dimensions the environment consumes
    pub fn shape(&self) -> usize {
        self.low.len()
    }

    pub fn low(&self) -> ArrayView1<'_, f32> {
        self.low.view()
    }

    pub fn high(&self) -> ArrayView1<'_, f32> {
        self.high.view()
    }

    /// Clamp every dimension into `[low_i, high_i]`.
    pub fn clip(&self, action: ArrayView1<f32>) -> Result<Array1<f32>> {
        if self.high.len() != self.low.len() {
            return Err(DdpgError::dimension_mismatch(
                format!("high bound of length {}", self.low.len()),
                format!("length {}", self.high.len()),
            ));
        }
        if action.len() != self.shape() {
            return Err(DdpgError::dimension_mismatch(
                format!("action of length {}", self.shape()),
                format!("length {}", action.len()),
            ));
        }
        let mut clipped = Array1::zeros(self.shape());
        for (i, ((&a, &lo), &hi)) in action.iter().zip(self.low.iter()).zip(self.high.iter()).enumerate() {
            if !(lo <= hi) {
                return Err(DdpgError::InvalidAction(format!(
                    "dimension {} has inverted bounds [{}, {}]",
                    i, lo, hi
                )));
            }
            if !a.is_finite() {
                return Err(DdpgError::InvalidAction(format!("dimension {} is {}", i, a)));
            }
            clipped[i] = a.max(lo).min(hi);
        }
        Ok(clipped)
    }

    pub fn contains(&self, action: ArrayView1<f32>) -> bool {
        action.len() == self.shape()
            && self.high.len() == self.shape()
            && action
                .iter()
                .zip(self.low.iter())
                .zip(self.high.iter())
                .all(|((&v, &l), &h)| v >= l && v <= h)
    }

    /// Uniform random action inside the bounds
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Array1<f32> {
        self.low
            .iter()
            .zip(self.high.iter())
            .map(|(&l, &h)| if l < h { rng.gen_range(l..h) } else { l })
            .collect()
    }
}

/// Maps a raw policy output (length `input_dim`) to an environment action (length `output_dim`).
///
/// Used when the policy's natural parametrisation differs from what the environment
/// consumes. The result is clipped to the action space afterwards, so decoders need not
/// respect bounds themselves.
pub trait ActionDecoder: Debug + Send {
    fn input_dim(&self) -> usize;

    fn output_dim(&self) -> usize;

    fn decode(&self, raw: ArrayView1<f32>) -> Result<Array1<f32>>;
}

/// Pass-through decoder for policies that already emit environment actions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdentityDecoder {
    pub dim: usize,
}

impl IdentityDecoder {
    pub fn new(dim: usize) -> Self {
        IdentityDecoder { dim }
    }
}

impl ActionDecoder for IdentityDecoder {
    fn input_dim(&self) -> usize {
        self.dim
    }

    fn output_dim(&self) -> usize {
        self.dim
    }

    fn decode(&self, raw: ArrayView1<f32>) -> Result<Array1<f32>> {
        check_decoder_input(self, raw)?;
        Ok(raw.to_owned())
    }
}

/// Driving controls from four sigmoid outputs: `[right, left, gas, brake]` becomes
/// `[steer, gas, brake]` with `steer = right - left`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PedalDecoder;

impl ActionDecoder for PedalDecoder {
    fn input_dim(&self) -> usize {
        4
    }

    fn output_dim(&self) -> usize {
        3
    }

    fn decode(&self, raw: ArrayView1<f32>) -> Result<Array1<f32>> {
        check_decoder_input(self, raw)?;
        Ok(Array1::from_vec(vec![raw[0] - raw[1], raw[2], raw[3]]))
    }
}

fn check_decoder_input<D: ActionDecoder + ?Sized>(decoder: &D, raw: ArrayView1<f32>) -> Result<()> {
    if raw.len() != decoder.input_dim() {
        return Err(DdpgError::dimension_mismatch(
            format!("raw action of length {}", decoder.input_dim()),
            format!("length {}", raw.len()),
        ));
    }
    Ok(())
}

/// What [`DdpgAgent::get_action`](crate::agent::DdpgAgent::get_action) hands back
#[derive(Clone, Debug, PartialEq)]
pub struct ActionOutput {
    /// Decoded and clipped action for the environment
    pub env_action: Array1<f32>,
    /// Noised actor output before decoding or clipping; this is what gets stored for learning
    pub raw_action: Array1<f32>,
}

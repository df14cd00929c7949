use ndarray::{stack, Array1, Array2, Array3, Array4, ArrayView1, ArrayView3, Axis};
use rand::Rng;

use crate::error::{DdpgError, Result};

pub const DEFAULT_CAPACITY: usize = 40_000;

/// One environment step as stored for learning
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// Preprocessed observation `[H, W, C]`
    pub state: Array3<f32>,
    /// Raw (pre-decoding, post-noise) actor output
    pub action: Array1<f32>,
    pub reward: f32,
    pub next_state: Array3<f32>,
    pub done: bool,
}

/// A sampled mini-batch, row `i` of every field belonging to the same transition
#[derive(Clone, Debug)]
pub struct TransitionBatch {
    pub states: Array4<f32>,
    pub actions: Array2<f32>,
    pub rewards: Array1<f32>,
    pub next_states: Array4<f32>,
    pub dones: Array1<f32>,
}

impl TransitionBatch {
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}

/// Fixed-capacity circular store of transitions.
///
/// Slots are filled in order until the buffer is full, after which each write replaces
/// the oldest transition.
#[derive(Clone, Debug)]
pub struct ReplayBuffer {
    slots: Vec<Transition>,
    capacity: usize,
    cursor: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(DdpgError::invalid_parameter("capacity", "Capacity must be greater than 0"));
        }
        Ok(ReplayBuffer {
            slots: Vec::with_capacity(capacity.min(1024)),
            capacity,
            cursor: 0,
        })
    }

    pub fn add(&mut self, transition: Transition) {
        if self.slots.len() < self.capacity {
            self.slots.push(transition);
        } else {
            self.slots[self.cursor] = transition;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    /// Store one step. Never fails.
    pub fn write(
        &mut self,
        state: ArrayView3<f32>,
        action: ArrayView1<f32>,
        reward: f32,
        next_state: ArrayView3<f32>,
        done: bool,
    ) {
        self.add(Transition {
            state: state.to_owned(),
            action: action.to_owned(),
            reward,
            next_state: next_state.to_owned(),
            done,
        });
    }

    /// Draw `batch_size` transitions uniformly at random, with replacement, from the
    /// valid entries.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<TransitionBatch> {
        if self.slots.is_empty() {
            return Err(DdpgError::EmptyBuffer(format!(
                "cannot sample a batch of {} from an empty replay buffer",
                batch_size
            )));
        }
        if batch_size == 0 {
            return Err(DdpgError::invalid_parameter("batch_size", "must be at least 1"));
        }
        if self.slots.len() < batch_size {
            return Err(DdpgError::InsufficientSamples { requested: batch_size, available: self.slots.len() });
        }

        let picked: Vec<&Transition> = (0..batch_size)
            .map(|_| &self.slots[rng.gen_range(0..self.slots.len())])
            .collect();

        let states: Vec<_> = picked.iter().map(|t| t.state.view()).collect();
        let next_states: Vec<_> = picked.iter().map(|t| t.next_state.view()).collect();
        let actions: Vec<_> = picked.iter().map(|t| t.action.view()).collect();

        Ok(TransitionBatch {
            states: stack(Axis(0), &states)?,
            actions: stack(Axis(0), &actions)?,
            rewards: picked.iter().map(|t| t.reward).collect(),
            next_states: stack(Axis(0), &next_states)?,
            dones: picked.iter().map(|t| if t.done { 1.0 } else { 0.0 }).collect(),
        })
    }

    /// Stored transitions in slot order (not insertion order once the buffer has wrapped)
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.cursor = 0;
    }
}

/// Builder for ReplayBuffer
pub struct ReplayBufferBuilder {
    capacity: Option<usize>,
}

impl ReplayBufferBuilder {
    pub fn new() -> Self {
        ReplayBufferBuilder { capacity: None }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Build the replay buffer, falling back to [`DEFAULT_CAPACITY`]
    pub fn build(self) -> Result<ReplayBuffer> {
        ReplayBuffer::new(self.capacity.unwrap_or(DEFAULT_CAPACITY))
    }
}

impl Default for ReplayBufferBuilder {
    fn default() -> Self {
        Self::new()
    }
}

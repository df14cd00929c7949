//! # DDPG Agent
//!
//! [`DdpgAgent`] learns a deterministic continuous-control policy from image observations.
//! It owns four networks: a live actor and critic that are trained, and target copies of
//! each that only ever move by Polyak averaging toward the live ones.
//!
//! ## Lifecycle
//!
//! The networks are sized from the first observation, so an agent starts out without
//! them. The first [`get_action`](DdpgAgent::get_action) or [`learn`](DdpgAgent::learn)
//! builds the actor and critic and copies them into the targets. Every later observation
//! must preprocess to the same shape.
//!
//! ## Interaction loop
//!
//! ```rust,no_run
//! use ndarray::Array3;
//! use vision_ddpg::agent::DdpgAgentBuilder;
//! use vision_ddpg::types::{ActionSpace, PedalDecoder};
//!
//! let space = ActionSpace::from_vecs(vec![-1.0, 0.0, 0.0], vec![1.0, 1.0, 1.0]).unwrap();
//! let mut agent = DdpgAgentBuilder::new()
//!     .action_space(space)
//!     .decoder(PedalDecoder)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//!
//! let mut state = Array3::<f32>::from_elem((96, 96, 3), 128.0);
//! agent.reset();
//! for _ in 0..1000 {
//!     let action = agent.get_action(state.view()).unwrap();
//!     // step the environment with action.env_action ...
//!     let (next_state, reward, done) = (state.clone(), 0.0, false);
//!     let _ = agent.learn(state.view(), action.raw_action.view(), reward, next_state.view(), done);
//!     state = next_state;
//! }
//! ```
//!
//! `learn` returns an error until the replay buffer holds at least `batch_size`
//! transitions; the transition is stored regardless.

mod ddpg;
pub use ddpg::{DdpgAgent, DdpgAgentBuilder, LearnStats, NetworkSet};

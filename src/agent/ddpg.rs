use log::{debug, trace, warn};
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::AgentConfig;
use crate::error::{DdpgError, Result};
use crate::layers::Parameterized;
use crate::network::{ActorNetwork, CriticNetwork, StateShape};
use crate::noise::NoiseGenerator;
use crate::optimizer::{GradientClipper, Optimizer, OptimizerKind, OptimizerWrapper};
use crate::preprocess::preprocess;
use crate::replay_buffer::{ReplayBuffer, TransitionBatch};
use crate::types::{ActionDecoder, ActionOutput, ActionSpace};

/// Losses and value estimate from one [`DdpgAgent::learn`] call
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LearnStats {
    /// Mean squared TD error before the critic step
    pub critic_loss: f32,
    /// `-mean Q(s, μ(s))` before the actor step
    pub actor_loss: f32,
    /// `mean Q(s, μ(s))` before the actor step
    pub mean_q: f32,
}

/// Live and target networks with the optimizer state that trains the live pair
#[derive(Clone, Debug)]
pub struct NetworkSet {
    pub actor: ActorNetwork,
    pub critic: CriticNetwork,
    pub target_actor: ActorNetwork,
    pub target_critic: CriticNetwork,
    actor_optimizer: OptimizerWrapper,
    critic_optimizer: OptimizerWrapper,
}

impl NetworkSet {
    fn build(
        state_shape: StateShape,
        action_dim: usize,
        optimizer: OptimizerKind,
        rng: &mut StdRng,
    ) -> Result<Self> {
        let actor = ActorNetwork::new(state_shape, action_dim, rng)?;
        let critic = CriticNetwork::new(state_shape, action_dim, rng)?;
        Ok(NetworkSet {
            target_actor: actor.clone(),
            target_critic: critic.clone(),
            actor,
            critic,
            actor_optimizer: OptimizerWrapper::from_kind(optimizer),
            critic_optimizer: OptimizerWrapper::from_kind(optimizer),
        })
    }

    fn train_step(
        &mut self,
        batch: &TransitionBatch,
        config: &AgentConfig,
        clipper: &GradientClipper,
    ) -> Result<LearnStats> {
        let n = batch.len() as f32;

        // y = r + gamma * Q'(s', mu'(s'))
        let next_actions = self.target_actor.forward(batch.next_states.view())?;
        let next_q = self.target_critic.forward(batch.next_states.view(), next_actions.view())?;
        let bootstrap = if config.terminal_masking {
            batch.dones.mapv(|d| 1.0 - d)
        } else {
            Array1::ones(batch.len())
        };
        let targets = (&batch.rewards + &(&next_q.column(0) * &bootstrap * config.gamma)).insert_axis(Axis(1));

        let q = self.critic.forward(batch.states.view(), batch.actions.view())?;
        let td_error = &q - &targets;
        let critic_loss = mean(&td_error.mapv(|d| d * d))?;
        let q_gradient = td_error.mapv(|d| 2.0 * d / n);
        let mut critic_grads = self.critic.backward(q_gradient.view())?.parameters;
        clipper.clip(&mut critic_grads);
        self.critic_optimizer
            .step(self.critic.parameters_mut(), &critic_grads, config.critic_lr)?;

        // Ascend mean Q(s, mu(s)) by descending its negation.
        let actions = self.actor.forward(batch.states.view())?;
        let q_pi = self.critic.forward(batch.states.view(), actions.view())?;
        let mean_q = mean(&q_pi)?;
        let action_grads = self
            .critic
            .action_gradient(Array2::from_elem((batch.len(), 1), -1.0 / n).view())?;
        let mut actor_grads = self.actor.backward(action_grads.view())?;
        clipper.clip(&mut actor_grads);
        self.actor_optimizer
            .step(self.actor.parameters_mut(), &actor_grads, config.actor_lr)?;

        self.update_targets(config.tau)?;

        Ok(LearnStats { critic_loss, actor_loss: -mean_q, mean_q })
    }

    /// `θ' ← τθ + (1 − τ)θ'` for both target networks
    pub fn update_targets(&mut self, tau: f32) -> Result<()> {
        self.target_actor.soft_update_from(&self.actor, tau)?;
        self.target_critic.soft_update_from(&self.critic, tau)
    }
}

fn mean(values: &Array2<f32>) -> Result<f32> {
    values
        .mean()
        .ok_or_else(|| DdpgError::NumericalError("mean of an empty batch".to_string()))
}

/// Networks are built on first use, once the observation shape is known
#[derive(Clone, Debug)]
enum NetworkState {
    Uninitialized,
    Ready(Box<NetworkSet>),
}

/// Deep Deterministic Policy Gradient agent for image observations.
///
/// ```
/// use ndarray::Array3;
/// use vision_ddpg::agent::DdpgAgent;
/// use vision_ddpg::config::AgentConfig;
/// use vision_ddpg::types::ActionSpace;
///
/// let space = ActionSpace::from_vecs(vec![-1.0, 0.0], vec![1.0, 1.0]).unwrap();
/// let config = AgentConfig { seed: Some(0), batch_size: 1, ..Default::default() };
/// let mut agent = DdpgAgent::new(space, config).unwrap();
///
/// let frame = Array3::from_shape_fn((32, 32, 3), |(i, j, c)| ((i + j + c) % 255) as f32);
/// let out = agent.get_action(frame.view()).unwrap();
/// assert_eq!(out.env_action.len(), 2);
///
/// let next = frame.mapv(|p| p + 1.0);
/// let stats = agent.learn(frame.view(), out.raw_action.view(), 1.0, next.view(), false).unwrap();
/// assert!(stats.critic_loss.is_finite());
/// ```
#[derive(Debug)]
pub struct DdpgAgent {
    config: AgentConfig,
    action_space: ActionSpace,
    decoder: Option<Box<dyn ActionDecoder>>,
    model_action_dim: usize,
    noise: NoiseGenerator,
    buffer: ReplayBuffer,
    clipper: GradientClipper,
    networks: NetworkState,
    rng: StdRng,
    train_steps: usize,
}

impl DdpgAgent {
    /// Agent whose policy emits environment actions directly
    pub fn new(action_space: ActionSpace, config: AgentConfig) -> Result<Self> {
        Self::build(action_space, None, config)
    }

    /// Agent whose policy output is mapped to environment actions by `decoder`
    pub fn with_decoder(
        action_space: ActionSpace,
        decoder: Box<dyn ActionDecoder>,
        config: AgentConfig,
    ) -> Result<Self> {
        Self::build(action_space, Some(decoder), config)
    }

    fn build(
        action_space: ActionSpace,
        decoder: Option<Box<dyn ActionDecoder>>,
        config: AgentConfig,
    ) -> Result<Self> {
        config.validate()?;
        let model_action_dim = match &decoder {
            Some(decoder) => {
                if decoder.output_dim() != action_space.shape() {
                    return Err(DdpgError::dimension_mismatch(
                        format!("decoder producing {} action values", action_space.shape()),
                        format!("{}", decoder.output_dim()),
                    ));
                }
                decoder.input_dim()
            }
            None => action_space.shape(),
        };

        let noise = NoiseGenerator::uniform(
            model_action_dim,
            config.noise_mu,
            config.noise_sigma,
            config.noise_theta,
            config.noise_dt,
        )?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(DdpgAgent {
            buffer: ReplayBuffer::new(config.buffer_capacity)?,
            clipper: GradientClipper::from(config.max_grad_norm),
            config,
            action_space,
            decoder,
            model_action_dim,
            noise,
            networks: NetworkState::Uninitialized,
            rng,
            train_steps: 0,
        })
    }

    /// Restart the exploration noise process, typically at the start of an episode
    pub fn reset(&mut self) {
        self.noise.reset();
    }

    pub fn preprocess(&self, image: ArrayView3<f32>) -> Result<Array3<f32>> {
        preprocess(image, self.config.greyscale)
    }

    /// Select an exploratory action for a raw `[H, W, C]` observation.
    pub fn get_action(&mut self, state: ArrayView3<f32>) -> Result<ActionOutput> {
        let state = self.preprocess(state)?;
        self.ensure_networks(state.dim())?;
        let networks = self.networks_mut()?;

        let raw = networks.actor.forward(state.insert_axis(Axis(0)).view())?;
        let raw_action = raw.row(0).to_owned() + self.noise.generate(&mut self.rng);

        let env_action = match &self.decoder {
            Some(decoder) => decoder.decode(raw_action.view())?,
            None => raw_action.clone(),
        };
        let env_action = self.action_space.clip(env_action.view())?;
        Ok(ActionOutput { env_action, raw_action })
    }

    /// Store one transition, sample a mini-batch and run one DDPG update.
    ///
    /// `train_action` is the raw (noised, undecoded) action returned by
    /// [`get_action`](Self::get_action). The transition is stored even when sampling
    /// then fails because the buffer holds fewer than `batch_size` entries.
    pub fn learn(
        &mut self,
        state: ArrayView3<f32>,
        train_action: ArrayView1<f32>,
        reward: f32,
        new_state: ArrayView3<f32>,
        done: bool,
    ) -> Result<LearnStats> {
        if train_action.len() != self.model_action_dim {
            return Err(DdpgError::dimension_mismatch(
                format!("train action of length {}", self.model_action_dim),
                format!("length {}", train_action.len()),
            ));
        }
        if let Some(a) = train_action.iter().find(|a| !a.is_finite()) {
            return Err(DdpgError::InvalidAction(format!("train action contains {}", a)));
        }
        if !reward.is_finite() {
            return Err(DdpgError::InvalidAction(format!("reward is {}", reward)));
        }
        let state = self.preprocess(state)?;
        let new_state = self.preprocess(new_state)?;
        if state.dim() != new_state.dim() {
            return Err(DdpgError::dimension_mismatch(
                format!("next state of shape {:?}", state.shape()),
                format!("{:?}", new_state.shape()),
            ));
        }
        self.ensure_networks(state.dim())?;

        self.buffer
            .write(state.view(), train_action, reward, new_state.view(), done);
        let batch = self.buffer.sample(self.config.batch_size, &mut self.rng)?;

        let networks = match &mut self.networks {
            NetworkState::Ready(networks) => networks,
            NetworkState::Uninitialized => return Err(not_ready()),
        };
        let stats = networks.train_step(&batch, &self.config, &self.clipper)?;
        self.train_steps += 1;

        if !stats.critic_loss.is_finite() || !stats.actor_loss.is_finite() {
            warn!(
                "non-finite loss at step {}: critic {} actor {}",
                self.train_steps, stats.critic_loss, stats.actor_loss
            );
        }
        trace!(
            "step {}: critic_loss={:.6} actor_loss={:.6} mean_q={:.6}",
            self.train_steps,
            stats.critic_loss,
            stats.actor_loss,
            stats.mean_q
        );
        Ok(stats)
    }

    /// Build the four networks for `state_shape` if this is the first observation,
    /// otherwise check the observation matches the shape they were built for.
    fn ensure_networks(&mut self, state_shape: StateShape) -> Result<()> {
        match &self.networks {
            NetworkState::Ready(networks) => {
                let expected = networks.actor.state_shape();
                if expected != state_shape {
                    return Err(DdpgError::dimension_mismatch(
                        format!("preprocessed state of shape {:?}", expected),
                        format!("{:?}", state_shape),
                    ));
                }
                Ok(())
            }
            NetworkState::Uninitialized => {
                let networks = NetworkSet::build(
                    state_shape,
                    self.model_action_dim,
                    self.config.optimizer,
                    &mut self.rng,
                )?;
                debug!(
                    "built networks for state shape {:?}\n{}\n{}",
                    state_shape,
                    networks.actor.summary("Actor"),
                    networks.critic.summary("Critic")
                );
                self.networks = NetworkState::Ready(Box::new(networks));
                Ok(())
            }
        }
    }

    fn networks_mut(&mut self) -> Result<&mut NetworkSet> {
        match &mut self.networks {
            NetworkState::Ready(networks) => Ok(&mut **networks),
            NetworkState::Uninitialized => Err(not_ready()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.networks, NetworkState::Ready(_))
    }

    pub fn networks(&self) -> Option<&NetworkSet> {
        match &self.networks {
            NetworkState::Ready(networks) => Some(&**networks),
            NetworkState::Uninitialized => None,
        }
    }

    pub fn actor(&self) -> Option<&ActorNetwork> {
        self.networks().map(|n| &n.actor)
    }

    pub fn critic(&self) -> Option<&CriticNetwork> {
        self.networks().map(|n| &n.critic)
    }

    pub fn target_actor(&self) -> Option<&ActorNetwork> {
        self.networks().map(|n| &n.target_actor)
    }

    pub fn target_critic(&self) -> Option<&CriticNetwork> {
        self.networks().map(|n| &n.target_critic)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn action_space(&self) -> &ActionSpace {
        &self.action_space
    }

    /// Length of the actor's output, before any decoding
    pub fn model_action_dim(&self) -> usize {
        self.model_action_dim
    }

    pub fn replay_buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    pub fn noise(&self) -> &NoiseGenerator {
        &self.noise
    }

    /// Number of completed learning updates
    pub fn train_steps(&self) -> usize {
        self.train_steps
    }
}

fn not_ready() -> DdpgError {
    DdpgError::invalid_parameter("networks", "networks have not been built yet")
}

/// Builder pattern for DdpgAgent
pub struct DdpgAgentBuilder {
    config: AgentConfig,
    action_space: Option<ActionSpace>,
    decoder: Option<Box<dyn ActionDecoder>>,
}

impl DdpgAgentBuilder {
    pub fn new() -> Self {
        DdpgAgentBuilder {
            config: AgentConfig::default(),
            action_space: None,
            decoder: None,
        }
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn action_space(mut self, action_space: ActionSpace) -> Self {
        self.action_space = Some(action_space);
        self
    }

    pub fn decoder<D: ActionDecoder + 'static>(mut self, decoder: D) -> Self {
        self.decoder = Some(Box::new(decoder));
        self
    }

    pub fn gamma(mut self, gamma: f32) -> Self {
        self.config.gamma = gamma;
        self
    }

    pub fn tau(mut self, tau: f32) -> Self {
        self.config.tau = tau;
        self
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn noise(mut self, mu: f32, sigma: f32) -> Self {
        self.config.noise_mu = mu;
        self.config.noise_sigma = sigma;
        self
    }

    pub fn learning_rates(mut self, actor_lr: f32, critic_lr: f32) -> Self {
        self.config.actor_lr = actor_lr;
        self.config.critic_lr = critic_lr;
        self
    }

    pub fn optimizer(mut self, kind: OptimizerKind) -> Self {
        self.config.optimizer = kind;
        self
    }

    pub fn terminal_masking(mut self, enabled: bool) -> Self {
        self.config.terminal_masking = enabled;
        self
    }

    pub fn greyscale(mut self, enabled: bool) -> Self {
        self.config.greyscale = enabled;
        self
    }

    pub fn max_grad_norm(mut self, max_norm: f32) -> Self {
        self.config.max_grad_norm = Some(max_norm);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<DdpgAgent> {
        let action_space = self.action_space.ok_or_else(|| {
            DdpgError::invalid_parameter("action_space", "Action space must be specified")
        })?;
        DdpgAgent::build(action_space, self.decoder, self.config)
    }
}

impl Default for DdpgAgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

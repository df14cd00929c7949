use ndarray::{Array1, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vision_ddpg::{
    agent::{DdpgAgent, DdpgAgentBuilder},
    config::AgentConfig,
    error::DdpgError,
    layers::Parameterized,
    types::{ActionSpace, PedalDecoder},
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_image(rng: &mut StdRng, size: usize) -> Array3<f32> {
    Array3::from_shape_fn((size, size, 3), |_| rng.gen_range(0.0..255.0))
}

fn two_dim_space() -> ActionSpace {
    ActionSpace::from_vecs(vec![-1.0, 0.0], vec![1.0, 1.0]).unwrap()
}

#[test]
fn test_end_to_end_action_selection() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(100);
    let state = random_image(&mut rng, 64);

    let mut agent = DdpgAgent::new(two_dim_space(), AgentConfig { seed: Some(1), ..Default::default() }).unwrap();
    let out = agent.get_action(state.view()).unwrap();

    assert_eq!(out.env_action.shape(), &[2]);
    assert!(out.env_action[0] >= -1.0 && out.env_action[0] <= 1.0);
    assert!(out.env_action[1] >= 0.0 && out.env_action[1] <= 1.0);
    assert_eq!(agent.actor().unwrap().state_shape(), (64, 64, 1));
}

#[test]
fn test_seeded_agents_agree() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(7);
    let states: Vec<Array3<f32>> = (0..3).map(|_| random_image(&mut rng, 64)).collect();

    let config = AgentConfig { seed: Some(2024), ..Default::default() };
    let mut a = DdpgAgent::new(two_dim_space(), config.clone()).unwrap();
    let mut b = DdpgAgent::new(two_dim_space(), config).unwrap();
    for state in &states {
        assert_eq!(a.get_action(state.view()).unwrap(), b.get_action(state.view()).unwrap());
    }
}

#[test]
fn test_targets_equal_live_after_first_action() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(3);
    let mut agent = DdpgAgent::new(two_dim_space(), AgentConfig { seed: Some(5), ..Default::default() }).unwrap();
    agent.get_action(random_image(&mut rng, 32).view()).unwrap();

    assert_eq!(agent.actor().unwrap().get_weights(), agent.target_actor().unwrap().get_weights());
    assert_eq!(agent.critic().unwrap().get_weights(), agent.target_critic().unwrap().get_weights());
}

#[test]
fn test_learn_with_too_few_samples_fails() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(4);
    let mut agent = DdpgAgentBuilder::new()
        .action_space(two_dim_space())
        .batch_size(8)
        .seed(6)
        .build()
        .unwrap();

    let state = random_image(&mut rng, 32);
    let next_state = random_image(&mut rng, 32);
    let out = agent.get_action(state.view()).unwrap();
    let err = agent
        .learn(state.view(), out.raw_action.view(), 1.0, next_state.view(), false)
        .unwrap_err();
    assert_eq!(err, DdpgError::InsufficientSamples { requested: 8, available: 1 });
    assert_eq!(agent.replay_buffer().len(), 1);
}

/// A synthetic driving task: the reward favours steering toward the brighter half of the frame.
#[test]
fn test_training_loop_with_decoder() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(12);
    let space = ActionSpace::from_vecs(vec![-1.0, 0.0, 0.0], vec![1.0, 1.0, 1.0]).unwrap();
    let mut agent = DdpgAgentBuilder::new()
        .action_space(space.clone())
        .decoder(PedalDecoder)
        .batch_size(4)
        .buffer_capacity(16)
        .noise(0.0, 0.1)
        .seed(99)
        .build()
        .unwrap();

    let mut state = random_image(&mut rng, 32);
    let mut completed = 0;
    agent.reset();
    for step in 0..12 {
        let out = agent.get_action(state.view()).unwrap();
        assert!(space.contains(out.env_action.view()));
        assert_eq!(out.raw_action.len(), 4);

        let right_brighter = state.slice(ndarray::s![.., 16.., ..]).sum() > state.slice(ndarray::s![.., ..16, ..]).sum();
        let reward = if (out.env_action[0] > 0.0) == right_brighter { 1.0 } else { -1.0 };
        let next_state = random_image(&mut rng, 32);
        let done = step % 5 == 4;

        match agent.learn(state.view(), out.raw_action.view(), reward, next_state.view(), done) {
            Ok(stats) => {
                assert!(stats.critic_loss.is_finite());
                assert!(stats.mean_q.is_finite());
                completed += 1;
            }
            Err(DdpgError::InsufficientSamples { .. }) => assert!(step < 3),
            Err(e) => panic!("unexpected error: {}", e),
        }
        if done {
            agent.reset();
        }
        state = next_state;
    }
    assert_eq!(completed, 9);
    assert_eq!(agent.train_steps(), 9);
    assert_eq!(agent.replay_buffer().len(), 12);
}

#[test]
fn test_state_shape_locked_after_build() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(1);
    let mut agent = DdpgAgent::new(two_dim_space(), AgentConfig { seed: Some(0), ..Default::default() }).unwrap();
    agent.get_action(random_image(&mut rng, 32).view()).unwrap();

    let err = agent.get_action(random_image(&mut rng, 40).view()).unwrap_err();
    assert!(matches!(err, DdpgError::DimensionMismatch { .. }));

    let small = DdpgAgent::new(two_dim_space(), AgentConfig::default())
        .unwrap()
        .get_action(random_image(&mut rng, 20).view());
    assert!(matches!(small, Err(DdpgError::InvalidParameter { .. })));
}

#[test]
fn test_config_from_json_drives_agent() {
    init_logging();
    let config = AgentConfig::from_json_str(r#"{ "batch_size": 1, "buffer_capacity": 4, "seed": 8, "optimizer": "sgd" }"#).unwrap();
    let mut agent = DdpgAgent::new(two_dim_space(), config).unwrap();
    let mut rng = StdRng::seed_from_u64(8);
    let state = random_image(&mut rng, 32);
    let stats = agent
        .learn(state.view(), Array1::from_elem(2, 0.5).view(), 0.0, state.view(), true)
        .unwrap();
    assert!(stats.critic_loss.is_finite());
}

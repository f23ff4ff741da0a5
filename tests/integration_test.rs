use rand::rngs::StdRng;
use rand::SeedableRng;
use signal_rl::{
    agent::{AlternatingPhases, GreedyPolicy},
    approximator::{QFunction, QNetwork},
    checkpoint::CheckpointStore,
    config::{EnvConfig, HyperparamRecord, TrainerConfig, REFERENCE_ROUTE_FREQUENCIES},
    environment::SignalEnvironment,
    evaluation::{evaluate, EvaluationConfig},
    registry::StrategyRegistry,
    reward::RewardKind,
    simulator::MockSimulator,
    trainer::{Trainer, CHECKPOINT_DIR, HYPERPARAMS_FILE},
};
use std::fs;
use tempfile::tempdir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn small_env() -> SignalEnvironment<MockSimulator> {
    let config = EnvConfig::builder()
        .without_route_file()
        .route_frequencies(REFERENCE_ROUTE_FREQUENCIES.to_vec())
        .max_steps(2_000)
        .reward(RewardKind::WaitDecrease)
        .seed(3)
        .build()
        .unwrap();
    SignalEnvironment::new(MockSimulator::new(), config).unwrap()
}

fn small_trainer_config() -> TrainerConfig {
    TrainerConfig::builder()
        .episodes(4)
        .max_steps(40)
        .min_buffer_len(16)
        .buffer_capacity(500)
        .train_frequency(2)
        .batch_size(8)
        .epsilon(1.0, 0.1, 0.3)
        .checkpoint_every(2)
        .hidden_layers(&[16, 8])
        .build()
        .unwrap()
}

#[test]
fn test_end_to_end_training() {
    init_logging();
    let run_dir = tempdir().unwrap();

    let mut env = small_env();
    let input = env.reset().unwrap().len();
    let config = small_trainer_config();
    let q = config.q_network(input, 4, &mut StdRng::seed_from_u64(0)).unwrap();

    let mut trainer = Trainer::new(env, q, config).unwrap().with_run_dir(run_dir.path());
    let report = trainer.run().unwrap();

    assert_eq!(report.episodes.len(), 4);
    assert!(!report.interrupted);
    assert_eq!(report.total_steps(), 160);
    assert!(report.total_updates() > 0);
    let epsilons: Vec<f32> = report.episodes.iter().map(|e| e.epsilon).collect();
    assert!(epsilons.windows(2).all(|w| w[1] <= w[0]));
    assert!((epsilons[3] - 0.1).abs() < 1e-6);

    // Hyperparameter record, rewritten with the training duration
    let record_path = run_dir.path().join(HYPERPARAMS_FILE);
    let raw = fs::read_to_string(&record_path).unwrap();
    assert!(raw.contains("learning_duration[s]"));
    let record = HyperparamRecord::load(&record_path, &StrategyRegistry::default()).unwrap();
    assert_eq!(record.reward, "wait_diff");
    assert_eq!(record.observation, "queue");
    assert_eq!(record.trainer.episodes, 4);

    let store = CheckpointStore::new(run_dir.path().join(CHECKPOINT_DIR));
    assert_eq!(store.episodes().unwrap(), vec![2, 4]);
    assert!(store.episode_path(2).ends_with("ep00002.bin"));
    assert!(store.final_path().is_file());
}

#[test]
fn test_resume_restores_latest_checkpoint() {
    init_logging();
    let run_dir = tempdir().unwrap();

    let mut env = small_env();
    let input = env.reset().unwrap().len();
    let config = small_trainer_config();
    let q = config.q_network(input, 4, &mut StdRng::seed_from_u64(0)).unwrap();
    let mut trainer = Trainer::new(env, q, config.clone()).unwrap().with_run_dir(run_dir.path());
    trainer.run().unwrap();
    let (_, agent) = trainer.into_parts();
    let trained = agent.into_q();

    let mut env = small_env();
    let probe = env.reset().unwrap();
    let fresh = config.q_network(input, 4, &mut StdRng::seed_from_u64(99)).unwrap();
    let mut resumed = Trainer::new(env, fresh, config).unwrap().with_run_dir(run_dir.path());
    let loaded = resumed.resume().unwrap().unwrap();
    assert!(loaded.ends_with("ep00004.bin"));

    let restored: &QNetwork = resumed.agent().q();
    assert_eq!(
        restored.predict_one(probe.view()).unwrap(),
        trained.predict_one(probe.view()).unwrap()
    );
}

#[test]
fn test_baseline_and_greedy_evaluation() {
    init_logging();
    let mut env = small_env();
    let input = env.reset().unwrap().len();
    let eval = EvaluationConfig {
        steps: 60,
        ..EvaluationConfig::default()
    };
    let mut rng = StdRng::seed_from_u64(5);

    let mut baseline = AlternatingPhases::new([7, 3, 7, 3]);
    let baseline_summary = evaluate(&mut env, &mut baseline, &eval, &mut rng).unwrap();
    assert_eq!(baseline_summary.steps, 60);
    assert_eq!(baseline_summary.metrics.len(), 4);
    for metric in &baseline_summary.metrics {
        assert!(metric.std >= 0.0);
    }

    let q = TrainerConfig::default()
        .q_network(input, 4, &mut StdRng::seed_from_u64(1))
        .unwrap();
    let mut greedy = GreedyPolicy::new(&q);
    let greedy_summary = evaluate(&mut env, &mut greedy, &eval, &mut rng).unwrap();
    assert_eq!(greedy_summary.policy, "Greedy");
    assert_eq!(greedy_summary.reward.count, 60);
}

#[test]
fn test_route_file_written_on_reset() {
    init_logging();
    let dir = tempdir().unwrap();
    let route_file = dir.path().join("my_net.rou.xml");
    let config = EnvConfig::builder()
        .route_file(&route_file)
        .max_steps(50)
        .route_frequencies(vec![1.0; 12])
        .build()
        .unwrap();
    let mut env = SignalEnvironment::new(MockSimulator::new(), config).unwrap();
    env.reset().unwrap();

    let doc = fs::read_to_string(&route_file).unwrap();
    assert!(doc.starts_with("<routes>"));
    assert_eq!(doc.matches("<route ").count(), 12);
    assert_eq!(doc.matches("<vehicle ").count(), 600);
    assert_eq!(env.demand().len(), 600);
}

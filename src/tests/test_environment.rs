use crate::config::EnvConfig;
use crate::environment::SignalEnvironment;
use crate::observation::ObservationKind;
use crate::phase::Phase;
use crate::reward::RewardKind;
use crate::simulator::MockSimulator;

fn quiet_env(yellow: usize, green: usize) -> SignalEnvironment<MockSimulator> {
    let config = EnvConfig::builder()
        .without_route_file()
        .route_frequencies(vec![0.0; 12])
        .yellow_duration(yellow)
        .green_duration(green)
        .max_steps(500)
        .build()
        .unwrap();
    SignalEnvironment::new(MockSimulator::new(), config).unwrap()
}

#[test]
fn test_first_step_skips_yellow() {
    let mut env = quiet_env(2, 4);
    env.reset().unwrap();
    let (_, _, _, info) = env.step(2).unwrap();

    assert_eq!(info.yellow, None);
    assert_eq!(info.green, Phase::EwGreen);
    assert_eq!(info.ticks, 4);
    assert_eq!(env.simulator().phase_trace(), &[Some(Phase::EwGreen); 4]);
    assert_eq!(env.simulator().phase_commands(), &[(0, Phase::EwGreen)]);
}

#[test]
fn test_changed_action_runs_yellow_then_green() {
    let mut env = quiet_env(2, 4);
    env.reset().unwrap();
    env.step(0).unwrap();
    let (_, _, _, info) = env.step(2).unwrap();

    assert_eq!(info.yellow, Some(Phase::NsYellow));
    assert_eq!(info.ticks, 6);
    assert_eq!(info.episode_ticks, 10);

    let trace = env.simulator().phase_trace();
    assert_eq!(&trace[4..6], &[Some(Phase::NsYellow); 2]);
    assert_eq!(&trace[6..10], &[Some(Phase::EwGreen); 4]);
    assert_eq!(
        env.simulator().phase_commands(),
        &[(0, Phase::NsGreen), (4, Phase::NsYellow), (6, Phase::EwGreen)]
    );
}

#[test]
fn test_repeated_action_holds_green() {
    let mut env = quiet_env(3, 5);
    env.reset().unwrap();
    env.step(1).unwrap();
    let (_, _, _, info) = env.step(1).unwrap();

    assert_eq!(info.yellow, None);
    assert_eq!(info.ticks, 5);
    assert!(env
        .simulator()
        .phase_trace()
        .iter()
        .all(|p| *p == Some(Phase::NslGreen)));
}

#[test]
fn test_zero_yellow_still_commands_yellow() {
    let mut env = quiet_env(0, 2);
    env.reset().unwrap();
    env.step(3).unwrap();
    env.step(0).unwrap();

    let commands = env.simulator().phase_commands();
    assert_eq!(commands.len(), 3);
    assert_eq!(commands[1], (2, Phase::EwlYellow));
    assert_eq!(commands[2], (2, Phase::NsGreen));
    assert_eq!(env.simulator().tick(), 4);
}

#[test]
fn test_observation_tracks_configured_kind() {
    let config = EnvConfig::builder()
        .without_route_file()
        .route_frequencies(vec![0.0; 12])
        .observation(ObservationKind::WaitingTime)
        .reward(RewardKind::WaitDecrease)
        .green_duration(3)
        .build()
        .unwrap();
    let mut env = SignalEnvironment::new(MockSimulator::new(), config).unwrap();
    env.reset().unwrap();
    assert_eq!(env.observation_dim(), Some(8));

    env.simulator_mut().place_vehicle("v", "2i_0", 0.0);
    // Left-turn east-west green does not serve 2i_0.
    let (obs, reward, done, _) = env.step(3).unwrap();
    assert_eq!(obs.sum(), 3.0);
    assert_eq!(reward, -3.0);
    assert!(!done);
}

#[test]
fn test_close_stops_simulator() {
    let mut env = quiet_env(1, 1);
    env.reset().unwrap();
    env.close().unwrap();
    assert!(env.simulator().is_closed());
    assert!(env.step(0).is_err());
}

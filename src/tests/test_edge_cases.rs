use ndarray::{array, Array1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use crate::agent::{epsilon_greedy, EpsilonSchedule};
use crate::approximator::{argmax, QFunction, QTable};
use crate::config::{EnvConfig, TrainerConfig};
use crate::demand::DemandGenerator;
use crate::error::SignalError;
use crate::phase::{normalize_action, SignalState, FALLBACK_ACTION};
use crate::replay_buffer::{Batch, ReplayBuffer, Transition};
use crate::reward::{RewardKind, RewardStrategy, WindowedDiffReward};
use crate::simulator::{LaneMetric, MockSimulator};

#[test]
fn test_zero_capacity_buffer_rejected() {
    assert!(matches!(
        ReplayBuffer::new(0),
        Err(SignalError::InvalidParameter { .. })
    ));
}

#[test]
fn test_batch_rejects_ragged_states() {
    let a = Transition::new(array![1.0, 2.0], 0, 0.0, array![1.0, 2.0], false);
    let b = Transition::new(array![1.0], 0, 0.0, array![1.0], false);
    assert!(matches!(
        Batch::from_transitions(&[&a, &b]),
        Err(SignalError::DimensionMismatch { .. })
    ));
    assert!(Batch::from_transitions(&[]).is_err());
}

#[test]
fn test_windowed_diff_second_call_is_zero() {
    let mut sim = MockSimulator::new();
    let lanes = vec!["1i_0".to_string()];
    let mut reward = WindowedDiffReward::with_baseline(RewardKind::QueueDecrease, LaneMetric::HaltingCount, lanes, 0.0);
    sim.place_vehicle("a", "1i_0", 0.0);
    sim.place_vehicle("b", "1i_0", 0.0);

    assert_eq!(reward.calculate(&mut sim).unwrap(), -2.0);
    assert_eq!(reward.calculate(&mut sim).unwrap(), 0.0);
    assert_eq!(reward.stored_value(), 2.0);
}

#[test]
fn test_out_of_range_actions() {
    assert_eq!(normalize_action(4), FALLBACK_ACTION);
    assert_eq!(normalize_action(usize::MAX), FALLBACK_ACTION);
    let state = SignalState {
        last_action: Some(0),
        ..SignalState::new()
    };
    // Fallback counts as a change from action 0.
    let (yellow, _) = state.plan(99);
    assert!(yellow.is_some());
}

#[test]
fn test_argmax_edge_cases() {
    assert_eq!(argmax(Array1::<f32>::zeros(0).view()), None);
    assert_eq!(argmax(array![f32::NEG_INFINITY].view()), Some(0));
    assert_eq!(argmax(array![1.0, 3.0, 3.0].view()), Some(1));
}

#[test]
fn test_epsilon_floor_when_decay_zero() {
    let schedule = EpsilonSchedule::new(0.5, 0.1, 0.0).unwrap();
    assert_eq!(schedule.value(0), 0.5);
    assert_eq!(schedule.value(10_000), 0.5);

    let mut rng = StdRng::seed_from_u64(0);
    for _ in 0..20 {
        assert_eq!(epsilon_greedy(array![0.0, 1.0].view(), 0.0, &mut rng).unwrap(), 1);
    }
}

#[test]
fn test_demand_rejects_bad_frequencies() {
    assert!(DemandGenerator::new(10, Some(vec![0.2; 11])).is_err());
    assert!(DemandGenerator::new(10, Some(vec![1.5; 12])).is_err());
    assert!(EnvConfig::builder().route_frequencies(vec![-0.1; 12]).build().is_err());
}

#[test]
fn test_trainer_config_validation() {
    assert!(TrainerConfig::builder().batch_size(0).build().is_err());
    assert!(TrainerConfig::builder().train_frequency(0).build().is_err());
    assert!(TrainerConfig::builder().epsilon(0.1, 0.5, 0.01).build().is_err());
    assert!(TrainerConfig::builder().gamma(1.2).build().is_err());
    assert!(TrainerConfig::builder().build().is_ok());
}

#[test]
fn test_qtable_rejects_mismatched_batch() {
    let mut table = QTable::new(2, 0.5).unwrap();
    let result = table.update(array![[0.0], [1.0]].view(), &[0], array![1.0, 2.0].view());
    assert!(result.is_err());
    assert!(QTable::new(0, 0.5).is_err());
    assert!(QTable::new(2, 0.0).is_err());
}

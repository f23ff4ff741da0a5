//! # Reward Strategies
//!
//! Rewards come in three flavours:
//!
//! - **Instantaneous** ([`InstantReward`]): stateless, recomputed from the
//!   simulator on every call.
//! - **Windowed difference** ([`WindowedDiffReward`]): remembers the previous
//!   reading of a total and returns `stored - current`, then stores `current`.
//! - **Throughput** ([`ThroughputReward`]): counts vehicles that left the
//!   incoming lanes since the previous call.
//!
//! Each [`RewardKind`] documents its own sign. The difference kinds all report a
//! *decrease*, so a shrinking queue gives a positive reward:
//!
//! | kind            | id           | value                                      |
//! |-----------------|--------------|--------------------------------------------|
//! | `NegativeQueue` | `neg_queue`  | `-sum(halting)` over incoming lanes        |
//! | `NegativeWait`  | `neg_wait`   | `-sum(waiting time)` over incoming lanes   |
//! | `TotalSpeed`    | `speed`      | `sum(mean speed)` over **all** lanes       |
//! | `QueueDecrease` | `queue_diff` | `prev_halting - halting`                   |
//! | `WaitDecrease`  | `wait_diff`  | `prev_wait - wait`                         |
//! | `CountDecrease` | `count_diff` | `prev_count - count`                       |
//! | `Throughput`    | `throughput` | vehicles gone from incoming lanes          |

use crate::error::{Result, SignalError};
use crate::simulator::{incoming_lanes, LaneMetric, TrafficSimulator};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub trait RewardStrategy {
    /// Reward for the interval since the previous call (or since construction).
    fn calculate(&mut self, sim: &mut dyn TrafficSimulator) -> Result<f32>;

    fn kind(&self) -> RewardKind;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RewardKind {
    NegativeQueue,
    NegativeWait,
    TotalSpeed,
    QueueDecrease,
    WaitDecrease,
    CountDecrease,
    Throughput,
}

impl RewardKind {
    pub const ALL: [RewardKind; 7] = [
        RewardKind::NegativeQueue,
        RewardKind::NegativeWait,
        RewardKind::TotalSpeed,
        RewardKind::QueueDecrease,
        RewardKind::WaitDecrease,
        RewardKind::CountDecrease,
        RewardKind::Throughput,
    ];

    pub fn id(self) -> &'static str {
        match self {
            RewardKind::NegativeQueue => "neg_queue",
            RewardKind::NegativeWait => "neg_wait",
            RewardKind::TotalSpeed => "speed",
            RewardKind::QueueDecrease => "queue_diff",
            RewardKind::WaitDecrease => "wait_diff",
            RewardKind::CountDecrease => "count_diff",
            RewardKind::Throughput => "throughput",
        }
    }

    pub fn from_id(id: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.id() == id)
            .ok_or_else(|| SignalError::UnknownStrategy {
                kind: "reward",
                id: id.to_string(),
            })
    }

    pub fn description(self) -> &'static str {
        match self {
            RewardKind::NegativeQueue => "Negation of total queue",
            RewardKind::NegativeWait => "Negation of total waiting time",
            RewardKind::TotalSpeed => "Sum of speeds",
            RewardKind::QueueDecrease => "Total queue decrease",
            RewardKind::WaitDecrease => "Total waiting time decrease",
            RewardKind::CountDecrease => "Number of cars decrease",
            RewardKind::Throughput => "Vehicles through the junction",
        }
    }

    /// Stateful kinds carry a baseline between calls.
    pub fn is_stateful(self) -> bool {
        !matches!(
            self,
            RewardKind::NegativeQueue | RewardKind::NegativeWait | RewardKind::TotalSpeed
        )
    }

    /// Builds the strategy against the lanes currently known to `sim`.
    /// Stateful kinds take their first baseline from the simulator right away.
    pub fn build(self, sim: &mut dyn TrafficSimulator, incoming_marker: &str) -> Result<Box<dyn RewardStrategy>> {
        let incoming = incoming_lanes(sim, incoming_marker)?;
        let strategy: Box<dyn RewardStrategy> = match self {
            RewardKind::NegativeQueue => Box::new(InstantReward::new(self, LaneMetric::HaltingCount, incoming, -1.0)),
            RewardKind::NegativeWait => Box::new(InstantReward::new(self, LaneMetric::WaitingTime, incoming, -1.0)),
            RewardKind::TotalSpeed => {
                let all_lanes = sim.lane_ids()?;
                Box::new(InstantReward::new(self, LaneMetric::MeanSpeed, all_lanes, 1.0))
            }
            RewardKind::QueueDecrease => Box::new(WindowedDiffReward::from_current(
                self,
                LaneMetric::HaltingCount,
                incoming,
                sim,
            )?),
            RewardKind::WaitDecrease => Box::new(WindowedDiffReward::from_current(
                self,
                LaneMetric::WaitingTime,
                incoming,
                sim,
            )?),
            RewardKind::CountDecrease => Box::new(WindowedDiffReward::from_current(
                self,
                LaneMetric::VehicleCount,
                incoming,
                sim,
            )?),
            RewardKind::Throughput => Box::new(ThroughputReward::new(incoming, sim)?),
        };
        Ok(strategy)
    }
}

impl fmt::Display for RewardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// `sign * sum(metric)` over a fixed lane set.
#[derive(Clone, Debug)]
pub struct InstantReward {
    kind: RewardKind,
    metric: LaneMetric,
    lanes: Vec<String>,
    sign: f32,
}

impl InstantReward {
    pub fn new(kind: RewardKind, metric: LaneMetric, lanes: Vec<String>, sign: f32) -> Self {
        InstantReward { kind, metric, lanes, sign }
    }
}

impl RewardStrategy for InstantReward {
    fn calculate(&mut self, sim: &mut dyn TrafficSimulator) -> Result<f32> {
        Ok(self.sign * self.metric.total(sim, &self.lanes)?)
    }

    fn kind(&self) -> RewardKind {
        self.kind
    }
}

/// Change of a lane total between consecutive calls.
///
/// `calculate` reads the current total, computes `stored - current`, and only
/// then replaces `stored` with `current`. Two calls without a simulator advance
/// in between therefore return 0 the second time.
#[derive(Clone, Debug)]
pub struct WindowedDiffReward {
    kind: RewardKind,
    metric: LaneMetric,
    lanes: Vec<String>,
    stored: f32,
}

impl WindowedDiffReward {
    pub fn with_baseline(kind: RewardKind, metric: LaneMetric, lanes: Vec<String>, baseline: f32) -> Self {
        WindowedDiffReward {
            kind,
            metric,
            lanes,
            stored: baseline,
        }
    }

    /// Baseline taken from the simulator's current reading.
    pub fn from_current(
        kind: RewardKind,
        metric: LaneMetric,
        lanes: Vec<String>,
        sim: &mut dyn TrafficSimulator,
    ) -> Result<Self> {
        let baseline = metric.total(sim, &lanes)?;
        Ok(Self::with_baseline(kind, metric, lanes, baseline))
    }

    pub fn stored_value(&self) -> f32 {
        self.stored
    }
}

impl RewardStrategy for WindowedDiffReward {
    fn calculate(&mut self, sim: &mut dyn TrafficSimulator) -> Result<f32> {
        let current = self.metric.total(sim, &self.lanes)?;
        let reward = self.stored - current;
        self.stored = current;
        Ok(reward)
    }

    fn kind(&self) -> RewardKind {
        self.kind
    }
}

/// Number of vehicles seen on the incoming lanes at the previous call that are
/// no longer there.
///
/// Only snapshots are compared, so a vehicle that enters and leaves between two
/// calls is never counted.
#[derive(Clone, Debug)]
pub struct ThroughputReward {
    lanes: Vec<String>,
    snapshot: HashSet<String>,
}

impl ThroughputReward {
    pub fn new(lanes: Vec<String>, sim: &mut dyn TrafficSimulator) -> Result<Self> {
        let snapshot = Self::vehicles_on(&lanes, sim)?;
        Ok(ThroughputReward { lanes, snapshot })
    }

    fn vehicles_on(lanes: &[String], sim: &mut dyn TrafficSimulator) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();
        for lane in lanes {
            ids.extend(sim.lane_vehicle_ids(lane)?);
        }
        Ok(ids)
    }
}

impl RewardStrategy for ThroughputReward {
    fn calculate(&mut self, sim: &mut dyn TrafficSimulator) -> Result<f32> {
        let current = Self::vehicles_on(&self.lanes, sim)?;
        let departed = self.snapshot.difference(&current).count();
        self.snapshot = current;
        Ok(departed as f32)
    }

    fn kind(&self) -> RewardKind {
        RewardKind::Throughput
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::DemandSchedule;
    use crate::phase::Phase;
    use crate::simulator::{MockSimulator, SimulatorConfig};

    fn running() -> MockSimulator {
        let mut sim = MockSimulator::new();
        sim.start(&SimulatorConfig::default()).unwrap();
        sim.load(&SimulatorConfig::default(), &DemandSchedule::default()).unwrap();
        sim
    }

    #[test]
    fn test_ids_round_trip() {
        for kind in RewardKind::ALL {
            assert_eq!(RewardKind::from_id(kind.id()).unwrap(), kind);
        }
        assert!(matches!(
            RewardKind::from_id("happiness"),
            Err(SignalError::UnknownStrategy { kind: "reward", .. })
        ));
    }

    #[test]
    fn test_negative_queue() {
        let mut sim = MockSimulator::new();
        let mut reward = RewardKind::NegativeQueue.build(&mut sim, "i").unwrap();
        sim.place_vehicle("a", "1i_0", 0.0);
        sim.place_vehicle("b", "3i_1", 0.0);
        sim.place_vehicle("c", "2o_0", 0.0);
        assert_eq!(reward.calculate(&mut sim).unwrap(), -2.0);
        assert_eq!(reward.calculate(&mut sim).unwrap(), -2.0);
    }

    #[test]
    fn test_total_speed_covers_outgoing_lanes() {
        let mut sim = MockSimulator::new();
        let mut reward = RewardKind::TotalSpeed.build(&mut sim, "i").unwrap();
        let all_free = reward.calculate(&mut sim).unwrap();
        assert!((all_free - 12.0 * crate::simulator::mock::FREE_SPEED).abs() < 1e-3);
    }

    #[test]
    fn test_windowed_difference_second_call_is_zero() {
        let mut sim = MockSimulator::new();
        sim.place_vehicle("a", "2i_0", 0.0);
        let mut reward = RewardKind::QueueDecrease.build(&mut sim, "i").unwrap();

        sim.place_vehicle("b", "2i_0", 0.0);
        sim.place_vehicle("c", "4i_1", 0.0);
        assert_eq!(reward.calculate(&mut sim).unwrap(), -2.0);
        assert_eq!(reward.calculate(&mut sim).unwrap(), 0.0);
    }

    #[test]
    fn test_windowed_difference_zero_baseline() {
        let mut sim = MockSimulator::new();
        sim.place_vehicle("a", "2i_0", 7.0);
        let lanes = incoming_lanes(&mut sim, "i").unwrap();
        let mut reward = WindowedDiffReward::with_baseline(RewardKind::WaitDecrease, LaneMetric::WaitingTime, lanes, 0.0);

        assert_eq!(reward.calculate(&mut sim).unwrap(), -7.0);
        assert_eq!(reward.stored_value(), 7.0);
        assert_eq!(reward.calculate(&mut sim).unwrap(), 0.0);
    }

    #[test]
    fn test_queue_decrease_is_positive_when_queue_drains() {
        let mut sim = running();
        sim.place_vehicle("a", "2i_0", 0.0);
        sim.place_vehicle("b", "4i_0", 0.0);
        let mut reward = RewardKind::QueueDecrease.build(&mut sim, "i").unwrap();

        sim.set_signal_phase("0", Phase::NsGreen.index()).unwrap();
        sim.advance_one_tick().unwrap();
        assert_eq!(reward.calculate(&mut sim).unwrap(), 2.0);
    }

    #[test]
    fn test_throughput_counts_departures() {
        let mut sim = running();
        sim.place_vehicle("a", "1i_0", 0.0);
        sim.place_vehicle("b", "1i_0", 0.0);
        sim.place_vehicle("c", "2i_0", 0.0);
        let mut reward = RewardKind::Throughput.build(&mut sim, "i").unwrap();

        sim.set_signal_phase("0", Phase::EwGreen.index()).unwrap();
        sim.advance_one_tick().unwrap();
        assert_eq!(reward.calculate(&mut sim).unwrap(), 1.0);
        assert_eq!(reward.calculate(&mut sim).unwrap(), 0.0);
    }

    #[test]
    fn test_throughput_misses_unsnapshotted_vehicles() {
        let mut sim = running();
        let mut reward = RewardKind::Throughput.build(&mut sim, "i").unwrap();

        sim.place_vehicle("flash", "1i_0", 0.0);
        sim.set_signal_phase("0", Phase::EwGreen.index()).unwrap();
        sim.advance_one_tick().unwrap();
        assert_eq!(reward.calculate(&mut sim).unwrap(), 0.0);
    }
}

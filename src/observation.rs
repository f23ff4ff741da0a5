//! # Observation Strategies
//!
//! An observation strategy is built once per episode against the current lane
//! set and then produces an observation vector on demand. Every variant shipped
//! here reads one telemetry value per incoming lane, so the observation has the
//! same length as the lane list captured at construction. Nothing is carried
//! between calls: each `get()` re-reads the simulator.
//!
//! | [`ObservationKind`]  | id        | per-lane value                        |
//! |----------------------|-----------|---------------------------------------|
//! | `QueueLength`        | `queue`   | halting vehicles                      |
//! | `VehicleCount`       | `count`   | vehicles on the lane                  |
//! | `WaitingTime`        | `wait`    | summed waiting time of its vehicles   |
//! | `MeanSpeed`          | `speed`   | mean speed during the last tick       |
//! | `FuelConsumption`    | `fuel`    | fuel used during the last tick        |

use crate::error::{Result, SignalError};
use crate::simulator::{incoming_lanes, LaneMetric, TrafficSimulator};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

pub trait ObservationStrategy {
    /// Current observation, one element per cached lane.
    fn get(&self, sim: &mut dyn TrafficSimulator) -> Result<Array1<f32>>;

    /// Lanes captured at construction.
    fn lanes(&self) -> &[String];

    fn dim(&self) -> usize {
        self.lanes().len()
    }

    fn kind(&self) -> ObservationKind;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObservationKind {
    QueueLength,
    VehicleCount,
    WaitingTime,
    MeanSpeed,
    FuelConsumption,
}

impl ObservationKind {
    pub const ALL: [ObservationKind; 5] = [
        ObservationKind::QueueLength,
        ObservationKind::VehicleCount,
        ObservationKind::WaitingTime,
        ObservationKind::MeanSpeed,
        ObservationKind::FuelConsumption,
    ];

    /// Stable identifier used in hyperparameter records.
    pub fn id(self) -> &'static str {
        match self {
            ObservationKind::QueueLength => "queue",
            ObservationKind::VehicleCount => "count",
            ObservationKind::WaitingTime => "wait",
            ObservationKind::MeanSpeed => "speed",
            ObservationKind::FuelConsumption => "fuel",
        }
    }

    pub fn from_id(id: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.id() == id)
            .ok_or_else(|| SignalError::UnknownStrategy {
                kind: "observation",
                id: id.to_string(),
            })
    }

    pub fn description(self) -> &'static str {
        match self {
            ObservationKind::QueueLength => "Queue lengths",
            ObservationKind::VehicleCount => "Number of cars",
            ObservationKind::WaitingTime => "Total waiting times",
            ObservationKind::MeanSpeed => "Mean speeds",
            ObservationKind::FuelConsumption => "Fuel consumption",
        }
    }

    fn metric(self) -> LaneMetric {
        match self {
            ObservationKind::QueueLength => LaneMetric::HaltingCount,
            ObservationKind::VehicleCount => LaneMetric::VehicleCount,
            ObservationKind::WaitingTime => LaneMetric::WaitingTime,
            ObservationKind::MeanSpeed => LaneMetric::MeanSpeed,
            ObservationKind::FuelConsumption => LaneMetric::FuelConsumption,
        }
    }

    /// Builds the strategy against the incoming lanes currently known to `sim`.
    pub fn build(self, sim: &mut dyn TrafficSimulator, incoming_marker: &str) -> Result<Box<dyn ObservationStrategy>> {
        let lanes = incoming_lanes(sim, incoming_marker)?;
        Ok(Box::new(LaneObservation::new(self, lanes)))
    }
}

impl fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// One telemetry reading per lane.
#[derive(Clone, Debug)]
pub struct LaneObservation {
    kind: ObservationKind,
    lanes: Vec<String>,
}

impl LaneObservation {
    pub fn new(kind: ObservationKind, lanes: Vec<String>) -> Self {
        LaneObservation { kind, lanes }
    }
}

impl ObservationStrategy for LaneObservation {
    fn get(&self, sim: &mut dyn TrafficSimulator) -> Result<Array1<f32>> {
        let metric = self.kind.metric();
        let mut values = Array1::zeros(self.lanes.len());
        for (value, lane) in values.iter_mut().zip(&self.lanes) {
            *value = metric.read(sim, lane)?;
        }
        Ok(values)
    }

    fn lanes(&self) -> &[String] {
        &self.lanes
    }

    fn kind(&self) -> ObservationKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::mock::FREE_SPEED;
    use crate::simulator::MockSimulator;

    #[test]
    fn test_ids_round_trip() {
        for kind in ObservationKind::ALL {
            assert_eq!(ObservationKind::from_id(kind.id()).unwrap(), kind);
        }
        assert!(ObservationKind::from_id("density").is_err());
    }

    #[test]
    fn test_one_value_per_incoming_lane() {
        let mut sim = MockSimulator::new();
        for kind in ObservationKind::ALL {
            let strategy = kind.build(&mut sim, "i").unwrap();
            assert_eq!(strategy.dim(), 8);
            assert_eq!(strategy.get(&mut sim).unwrap().len(), 8);
        }
    }

    #[test]
    fn test_queue_and_wait_readings() {
        let mut sim = MockSimulator::new();
        let queue = ObservationKind::QueueLength.build(&mut sim, "i").unwrap();
        let wait = ObservationKind::WaitingTime.build(&mut sim, "i").unwrap();
        let lane_idx = queue.lanes().iter().position(|l| l == "2i_1").unwrap();

        sim.place_vehicle("a", "2i_1", 3.0);
        sim.place_vehicle("b", "2i_1", 5.0);

        let q = queue.get(&mut sim).unwrap();
        assert_eq!(q[lane_idx], 2.0);
        assert_eq!(q.sum(), 2.0);
        assert_eq!(wait.get(&mut sim).unwrap()[lane_idx], 8.0);
    }

    #[test]
    fn test_recomputed_on_every_call() {
        let mut sim = MockSimulator::new();
        let count = ObservationKind::VehicleCount.build(&mut sim, "i").unwrap();
        assert_eq!(count.get(&mut sim).unwrap().sum(), 0.0);
        sim.place_vehicle("a", "4i_0", 0.0);
        assert_eq!(count.get(&mut sim).unwrap().sum(), 1.0);
        sim.remove_vehicle("a");
        assert_eq!(count.get(&mut sim).unwrap().sum(), 0.0);
    }

    #[test]
    fn test_speed_of_empty_lanes() {
        let mut sim = MockSimulator::new();
        let speed = ObservationKind::MeanSpeed.build(&mut sim, "i").unwrap();
        assert!(speed.get(&mut sim).unwrap().iter().all(|&s| s == FREE_SPEED));
    }
}

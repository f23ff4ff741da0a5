use super::{SimulatorConfig, TrafficSimulator};
use crate::demand::{DemandSchedule, Turn};
use crate::error::{Result, SignalError};
use crate::phase::Phase;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Speed of a vehicle that is not queued, and the reading of an empty lane.
pub const FREE_SPEED: f32 = 13.9;

const TICK_SECONDS: f32 = 1.0;
const IDLE_FUEL: f32 = 0.4;
const MOVING_FUEL: f32 = 1.2;
const NODES: [u8; 4] = [1, 2, 3, 4];

#[derive(Clone, Debug)]
struct MockVehicle {
    lane: String,
    exit_lane: String,
    waiting: f32,
    speed: f32,
}

/// In-process stand-in for the external traffic simulator.
///
/// Each of the four approaches has two incoming lanes (`{n}i_0` for right and
/// straight traffic, `{n}i_1` for left turns) and one outgoing lane `{n}o_0`.
/// Vehicles queue on their incoming lane; every tick the green phase lets the
/// head of each lane it serves cross onto its outgoing lane, where it stays for
/// one tick before leaving the network. Queued vehicles accumulate one second of
/// waiting time per tick.
///
/// Every commanded phase and the phase active during every advanced tick are
/// recorded so tests can check the signal timing.
#[derive(Clone, Debug)]
pub struct MockSimulator {
    lanes: Vec<String>,
    queues: HashMap<String, VecDeque<String>>,
    vehicles: BTreeMap<String, MockVehicle>,
    schedule: DemandSchedule,
    tick: usize,
    phase: Option<Phase>,
    phase_commands: Vec<(usize, Phase)>,
    phase_trace: Vec<Option<Phase>>,
    started: bool,
    closed: bool,
    fail_on_start: bool,
    load_count: usize,
}

impl MockSimulator {
    pub fn new() -> Self {
        let lanes: Vec<String> = NODES
            .iter()
            .flat_map(|n| vec![format!("{}i_0", n), format!("{}i_1", n), format!("{}o_0", n)])
            .collect();
        let queues = lanes.iter().map(|l| (l.clone(), VecDeque::new())).collect();

        MockSimulator {
            lanes,
            queues,
            vehicles: BTreeMap::new(),
            schedule: DemandSchedule::default(),
            tick: 0,
            phase: None,
            phase_commands: Vec::new(),
            phase_trace: Vec::new(),
            started: false,
            closed: false,
            fail_on_start: false,
            load_count: 0,
        }
    }

    /// A simulator whose `start` always fails, as when the binary is missing.
    pub fn failing_start() -> Self {
        MockSimulator {
            fail_on_start: true,
            ..Self::new()
        }
    }

    /// Puts a queued vehicle on `lane` with the given accumulated waiting time.
    /// Vehicles on outgoing lanes leave at the next tick.
    pub fn place_vehicle(&mut self, id: &str, lane: &str, waiting: f32) {
        let incoming = lane.contains('i');
        let vehicle = MockVehicle {
            lane: lane.to_string(),
            exit_lane: straight_exit(lane),
            waiting,
            speed: if incoming { 0.0 } else { FREE_SPEED },
        };
        self.remove_vehicle(id);
        self.queues.entry(lane.to_string()).or_default().push_back(id.to_string());
        self.vehicles.insert(id.to_string(), vehicle);
    }

    /// Takes a vehicle off the network.
    pub fn remove_vehicle(&mut self, id: &str) {
        if let Some(vehicle) = self.vehicles.remove(id) {
            if let Some(queue) = self.queues.get_mut(&vehicle.lane) {
                queue.retain(|v| v != id);
            }
        }
    }

    /// Ticks advanced since the last load.
    pub fn tick(&self) -> usize {
        self.tick
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.phase
    }

    /// `(tick, phase)` for every `set_signal_phase` call since the last load.
    pub fn phase_commands(&self) -> &[(usize, Phase)] {
        &self.phase_commands
    }

    /// Phase in force during each advanced tick since the last load.
    pub fn phase_trace(&self) -> &[Option<Phase>] {
        &self.phase_trace
    }

    pub fn load_count(&self) -> usize {
        self.load_count
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    fn serves(&self, lane: &str) -> bool {
        match (self.phase, serving_phase(lane)) {
            (Some(active), Some(required)) => active == required,
            _ => false,
        }
    }

    fn lane_queue(&self, lane: &str) -> Result<&VecDeque<String>> {
        self.queues
            .get(lane)
            .ok_or_else(|| SignalError::simulator(format!("unknown lane '{}'", lane)))
    }

    fn vehicle(&self, id: &str) -> Result<&MockVehicle> {
        self.vehicles
            .get(id)
            .ok_or_else(|| SignalError::simulator(format!("unknown vehicle '{}'", id)))
    }

    fn lane_vehicles(&self, lane: &str) -> Result<Vec<&MockVehicle>> {
        Ok(self
            .lane_queue(lane)?
            .iter()
            .filter_map(|id| self.vehicles.get(id))
            .collect())
    }

    fn ensure_running(&self) -> Result<()> {
        if !self.started || self.closed {
            return Err(SignalError::simulator("simulator is not running"));
        }
        Ok(())
    }
}

impl Default for MockSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficSimulator for MockSimulator {
    fn start(&mut self, _config: &SimulatorConfig) -> Result<()> {
        if self.fail_on_start {
            return Err(SignalError::simulator("failed to launch simulator binary"));
        }
        self.started = true;
        self.closed = false;
        Ok(())
    }

    fn load(&mut self, _config: &SimulatorConfig, demand: &DemandSchedule) -> Result<()> {
        self.ensure_running()?;
        self.vehicles.clear();
        self.queues.values_mut().for_each(VecDeque::clear);
        self.schedule = demand.clone();
        self.tick = 0;
        self.phase = None;
        self.phase_commands.clear();
        self.phase_trace.clear();
        self.load_count += 1;
        Ok(())
    }

    fn advance_one_tick(&mut self) -> Result<()> {
        self.ensure_running()?;

        // Vehicles that crossed during the previous tick leave the network.
        let departed: Vec<String> = self
            .vehicles
            .iter()
            .filter(|(_, v)| !v.lane.contains('i'))
            .map(|(id, _)| id.clone())
            .collect();
        for id in departed {
            self.remove_vehicle(&id);
        }

        let served: Vec<String> = self.lanes.iter().filter(|l| self.serves(l)).cloned().collect();
        for lane in served {
            let head = self.queues.get_mut(&lane).and_then(VecDeque::pop_front);
            if let Some(id) = head {
                if let Some(vehicle) = self.vehicles.get_mut(&id) {
                    vehicle.lane = vehicle.exit_lane.clone();
                    vehicle.speed = FREE_SPEED;
                    self.queues.entry(vehicle.lane.clone()).or_default().push_back(id);
                }
            }
        }

        for vehicle in self.vehicles.values_mut().filter(|v| v.lane.contains('i')) {
            vehicle.speed = 0.0;
            vehicle.waiting += TICK_SECONDS;
        }

        let arrivals: Vec<(String, String, String)> = self
            .schedule
            .departing_at(self.tick)
            .filter_map(|inj| {
                self.schedule.route_of(inj).map(|route| {
                    let lane_idx = if route.turn == Turn::Left { 1 } else { 0 };
                    (
                        inj.vehicle_id.clone(),
                        format!("{}_{}", route.spawn_edge(), lane_idx),
                        format!("{}_0", route.destination_edge()),
                    )
                })
            })
            .collect();
        for (id, lane, exit_lane) in arrivals {
            self.queues.entry(lane.clone()).or_default().push_back(id.clone());
            self.vehicles.insert(
                id,
                MockVehicle {
                    lane,
                    exit_lane,
                    waiting: 0.0,
                    speed: 0.0,
                },
            );
        }

        self.phase_trace.push(self.phase);
        self.tick += 1;
        Ok(())
    }

    fn set_signal_phase(&mut self, _junction_id: &str, phase_index: usize) -> Result<()> {
        self.ensure_running()?;
        let phase = Phase::from_index(phase_index)
            .ok_or_else(|| SignalError::simulator(format!("no phase with index {}", phase_index)))?;
        self.phase = Some(phase);
        self.phase_commands.push((self.tick, phase));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.started = false;
        Ok(())
    }

    fn lane_ids(&mut self) -> Result<Vec<String>> {
        Ok(self.lanes.clone())
    }

    fn vehicle_ids(&mut self) -> Result<Vec<String>> {
        Ok(self.vehicles.keys().cloned().collect())
    }

    fn lane_halting_count(&mut self, lane: &str) -> Result<usize> {
        Ok(self.lane_vehicles(lane)?.iter().filter(|v| v.speed < 0.1).count())
    }

    fn lane_vehicle_count(&mut self, lane: &str) -> Result<usize> {
        Ok(self.lane_queue(lane)?.len())
    }

    fn lane_waiting_time(&mut self, lane: &str) -> Result<f32> {
        Ok(self.lane_vehicles(lane)?.iter().map(|v| v.waiting).sum())
    }

    fn lane_mean_speed(&mut self, lane: &str) -> Result<f32> {
        let vehicles = self.lane_vehicles(lane)?;
        if vehicles.is_empty() {
            return Ok(FREE_SPEED);
        }
        Ok(vehicles.iter().map(|v| v.speed).sum::<f32>() / vehicles.len() as f32)
    }

    fn lane_fuel_consumption(&mut self, lane: &str) -> Result<f32> {
        Ok(self
            .lane_vehicles(lane)?
            .iter()
            .map(|v| if v.speed < 0.1 { IDLE_FUEL } else { MOVING_FUEL })
            .sum())
    }

    fn lane_vehicle_ids(&mut self, lane: &str) -> Result<Vec<String>> {
        Ok(self.lane_queue(lane)?.iter().cloned().collect())
    }

    fn vehicle_accumulated_waiting_time(&mut self, vehicle: &str) -> Result<f32> {
        Ok(self.vehicle(vehicle)?.waiting)
    }

    fn vehicle_road_id(&mut self, vehicle: &str) -> Result<String> {
        let lane = &self.vehicle(vehicle)?.lane;
        Ok(lane.split('_').next().unwrap_or(lane.as_str()).to_string())
    }

    fn vehicle_lane_id(&mut self, vehicle: &str) -> Result<String> {
        Ok(self.vehicle(vehicle)?.lane.clone())
    }
}

/// Green phase that lets traffic out of an incoming lane.
fn serving_phase(lane: &str) -> Option<Phase> {
    let (edge, index) = lane.split_once('_')?;
    let node: u8 = edge.strip_suffix('i')?.parse().ok()?;
    let north_south = node == 2 || node == 4;
    match (north_south, index) {
        (true, "0") => Some(Phase::NsGreen),
        (true, "1") => Some(Phase::NslGreen),
        (false, "0") => Some(Phase::EwGreen),
        (false, "1") => Some(Phase::EwlGreen),
        _ => None,
    }
}

fn straight_exit(lane: &str) -> String {
    const NODE_LUT: [u8; 8] = [0, 1, 2, 3, 4, 1, 2, 3];
    let node = lane
        .chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .filter(|d| (1..=4).contains(d))
        .unwrap_or(1) as usize;
    format!("{}o_0", NODE_LUT[node + 2])
}

//! Synthetic traffic demand for one episode.
//!
//! The intersection has four approaches (1=E, 2=N, 3=W, 4=S). Every approach
//! spawns vehicles on its incoming edge `{n}i` that turn right, go straight or
//! turn left onto an outgoing edge `{m}o`, which gives twelve routes. For each
//! tick of the episode and each route an independent Bernoulli draw with the
//! route's frequency decides whether a vehicle departs.

use crate::error::{Result, SignalError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Number of routes through the junction.
pub const NUM_ROUTES: usize = 12;

/// Injection probability per route and tick when none is configured.
pub const DEFAULT_ROUTE_FREQUENCY: f64 = 0.2;

const NODE_NAMES: [(u8, &str); 4] = [(1, "E"), (2, "N"), (3, "W"), (4, "S")];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Turn {
    Right,
    Straight,
    Left,
}

impl Turn {
    const ALL: [Turn; 3] = [Turn::Right, Turn::Straight, Turn::Left];

    fn offset(self) -> usize {
        match self {
            Turn::Right => 1,
            Turn::Straight => 2,
            Turn::Left => 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// `"{origin}_{destination}"`, e.g. `"E_N"`
    pub id: String,
    pub origin: u8,
    pub destination: u8,
    pub turn: Turn,
}

impl Route {
    fn new(origin: u8, turn: Turn) -> Self {
        const NODE_LUT: [u8; 8] = [0, 1, 2, 3, 4, 1, 2, 3];
        let destination = NODE_LUT[origin as usize + turn.offset()];
        Route {
            id: format!("{}_{}", node_name(origin), node_name(destination)),
            origin,
            destination,
            turn,
        }
    }

    pub fn spawn_edge(&self) -> String {
        format!("{}i", self.origin)
    }

    pub fn destination_edge(&self) -> String {
        format!("{}o", self.destination)
    }
}

fn node_name(node: u8) -> &'static str {
    NODE_NAMES
        .iter()
        .find(|(id, _)| *id == node)
        .map(|(_, name)| *name)
        .unwrap_or("?")
}

/// All twelve routes, grouped by origin in E, N, W, S order and by turn in
/// right, straight, left order.
pub fn all_routes() -> Vec<Route> {
    NODE_NAMES
        .iter()
        .flat_map(|(origin, _)| Turn::ALL.iter().map(move |&turn| Route::new(*origin, turn)))
        .collect()
}

/// A single scheduled departure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Injection {
    pub vehicle_id: String,
    /// Index into [`DemandSchedule::routes`]
    pub route: usize,
    pub depart_tick: usize,
}

/// Departures for one episode, ordered by departure tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DemandSchedule {
    pub routes: Vec<Route>,
    pub injections: Vec<Injection>,
}

impl DemandSchedule {
    pub fn len(&self) -> usize {
        self.injections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.injections.is_empty()
    }

    pub fn route_of(&self, injection: &Injection) -> Option<&Route> {
        self.routes.get(injection.route)
    }

    /// Departures scheduled for exactly `tick`.
    pub fn departing_at(&self, tick: usize) -> impl Iterator<Item = &Injection> {
        self.injections.iter().filter(move |inj| inj.depart_tick == tick)
    }

    /// Renders the schedule as a simulator route document.
    pub fn to_route_document(&self) -> String {
        let mut doc = String::new();
        doc.push_str("<routes>\n");
        doc.push_str(
            "<vType accel=\"1.0\" decel=\"4.5\" id=\"standard_car\" length=\"5.0\" minGap=\"2.5\" maxSpeed=\"25\" sigma=\"0.5\" />\n",
        );
        for route in &self.routes {
            doc.push_str(&format!(
                "<route id=\"{}\" edges=\"{} {}\"/>\n",
                route.id,
                route.spawn_edge(),
                route.destination_edge()
            ));
        }
        for injection in &self.injections {
            let route_id = self.routes.get(injection.route).map(|r| r.id.as_str()).unwrap_or("");
            doc.push_str(&format!(
                "<vehicle id=\"{}\" type=\"standard_car\" route=\"{}\" depart=\"{}\" departLane=\"random\" departSpeed=\"10\" />\n",
                injection.vehicle_id, route_id, injection.depart_tick
            ));
        }
        doc.push_str("</routes>\n");
        doc
    }
}

/// Produces a fresh [`DemandSchedule`] at every episode reset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DemandGenerator {
    max_steps: usize,
    routes: Vec<Route>,
    frequencies: Vec<f64>,
}

impl DemandGenerator {
    /// `frequencies` holds one injection probability per route in
    /// [`all_routes`] order; `None` uses [`DEFAULT_ROUTE_FREQUENCY`] everywhere.
    pub fn new(max_steps: usize, frequencies: Option<Vec<f64>>) -> Result<Self> {
        let frequencies = frequencies.unwrap_or_else(|| vec![DEFAULT_ROUTE_FREQUENCY; NUM_ROUTES]);
        if frequencies.len() != NUM_ROUTES {
            return Err(SignalError::invalid_parameter(
                "route_frequencies".to_string(),
                format!("expected {} values, got {}", NUM_ROUTES, frequencies.len()),
            ));
        }
        if let Some(bad) = frequencies.iter().find(|f| !(0.0..=1.0).contains(*f)) {
            return Err(SignalError::invalid_parameter(
                "route_frequencies".to_string(),
                format!("{} is not a probability", bad),
            ));
        }

        Ok(DemandGenerator {
            max_steps,
            routes: all_routes(),
            frequencies,
        })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> DemandSchedule {
        let mut injections = Vec::new();
        for tick in 0..self.max_steps {
            for (route_idx, (route, &freq)) in self.routes.iter().zip(&self.frequencies).enumerate() {
                if rng.gen::<f64>() < freq {
                    injections.push(Injection {
                        vehicle_id: format!("{}_{}", route.id, tick),
                        route: route_idx,
                        depart_tick: tick,
                    });
                }
            }
        }

        DemandSchedule {
            routes: self.routes.clone(),
            injections,
        }
    }

    /// Generates a schedule and writes it to `path` as a route document.
    pub fn generate_route_file<R: Rng + ?Sized>(&self, rng: &mut R, path: &Path) -> Result<DemandSchedule> {
        let schedule = self.generate(rng);
        fs::write(path, schedule.to_route_document())?;
        Ok(schedule)
    }
}

/// Physics simulation system
/// Owns the body collection and drives the per-step pipeline
use std::time::{Duration, Instant};

use glam::DVec3;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{
    RelsimError, RelsimResult,
    math::{Body, FieldSample, RenderBody, UnitSystem},
    scenario::{BodyRequest, Scenario},
};

/// Step used when no pair of bodies constrains the timestep
pub const DEFAULT_TIMESTEP: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Fallback timestep in internal time units
    pub default_timestep: f64,
    pub worker_threads: usize,
    /// Fan per-body passes out across the worker pool
    pub parallel: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            default_timestep: DEFAULT_TIMESTEP,
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            parallel: true,
        }
    }
}

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub timestep: f64,
    pub coordinate_time: f64,
    pub merged: usize,
    pub removed: usize,
    pub live_bodies: usize,
}

/// Values the display shell shows alongside the bodies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diagnostics {
    pub coordinate_time: f64,
    pub last_timestep: f64,
    pub step_count: u64,
    pub body_count: usize,
}

/// Picks the step from per-pair `(min, max)` bounds. The running minimum is
/// the largest pair minimum and the running maximum the smallest pair
/// maximum; as soon as they cross, the maximum wins.
pub fn select_timestep<I>(bounds: I, default_timestep: f64) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut global_min = 0.0_f64;
    let mut global_max = f64::INFINITY;

    for (min, max) in bounds {
        global_min = global_min.max(min);
        global_max = global_max.min(max);

        if global_max <= global_min {
            return global_max;
        }
    }

    if global_min > 0.0 {
        global_min
    } else {
        default_timestep
    }
}

/// The pool, if the live body count justifies fanning out
fn worker_pool(pool: &Option<ThreadPool>, live: usize) -> Option<&ThreadPool> {
    pool.as_ref()
        .filter(|pool| live >= 2 * pool.current_num_threads())
}

/// Contiguous range length handed to each worker
fn chunk_len(live: usize, pool: &ThreadPool) -> usize {
    live.div_ceil(pool.current_num_threads()).max(1)
}

/// Relativistic N-body simulation
pub struct Simulation {
    units: UnitSystem,
    config: SimulationConfig,
    bodies: Vec<Body>,
    pool: Option<ThreadPool>,
    coordinate_time: f64,
    last_timestep: f64,
    step_count: u64,
}

impl Simulation {
    pub fn new(units: UnitSystem, config: SimulationConfig) -> RelsimResult<Self> {
        let pool = if config.parallel && config.worker_threads > 1 {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(config.worker_threads)
                    .thread_name(|index| format!("relsim-worker-{index}"))
                    .build()?,
            )
        } else {
            None
        };

        log::info!(
            "Simulation created (precision {} digits, {} worker threads)",
            units.precision_digits(),
            pool.as_ref().map_or(1, |pool| pool.current_num_threads())
        );

        Ok(Self {
            units,
            last_timestep: config.default_timestep,
            config,
            bodies: Vec::new(),
            pool,
            coordinate_time: 0.0,
            step_count: 0,
        })
    }

    /// Builds the unit system and every body a scenario describes
    pub fn from_scenario(scenario: &Scenario, mut config: SimulationConfig) -> RelsimResult<Self> {
        if let Some(timestep) = scenario.default_timestep {
            config.default_timestep = timestep;
        }

        let mut simulation = Self::new(scenario.unit_system()?, config)?;

        log::info!("Loading scenario with {} bodies", scenario.bodies.len());
        for request in &scenario.bodies {
            simulation.add_body(request)?;
        }

        Ok(simulation)
    }

    /// Replace the unit system. Only allowed while no bodies exist, since
    /// bodies cache unit-dependent values.
    pub fn set_units(&mut self, units: UnitSystem) -> RelsimResult<()> {
        if !self.bodies.is_empty() {
            return Err(RelsimError::UnitsInUse);
        }

        self.units = units;
        Ok(())
    }

    /// Converts and adds a body, returning its index
    pub fn add_body(&mut self, request: &BodyRequest) -> RelsimResult<usize> {
        let body = request.to_body(&self.units)?;

        log::info!(
            "Adding body: {} (mass: {:.3e} {})",
            body.name,
            body.total_mass(),
            self.units.choice().mass
        );
        Ok(self.insert_body(body))
    }

    /// Adds a body already expressed in internal units
    pub fn insert_body(&mut self, body: Body) -> usize {
        self.bodies.push(body);
        self.bodies.len() - 1
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn body_by_name(&self, name: &str) -> Option<&Body> {
        self.bodies.iter().find(|body| body.name == name)
    }

    pub fn units(&self) -> &UnitSystem {
        &self.units
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn coordinate_time(&self) -> f64 {
        self.coordinate_time
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            coordinate_time: self.coordinate_time,
            last_timestep: self.last_timestep,
            step_count: self.step_count,
            body_count: self.bodies.len(),
        }
    }

    /// Reduced precision body data for the renderer
    pub fn snapshot(&self) -> Vec<RenderBody> {
        self.bodies.iter().map(RenderBody::from).collect()
    }

    /// Advance the whole system by one adaptive step
    pub fn step(&mut self) -> RelsimResult<StepReport> {
        // Phase 1 and 2: reset and accumulate pairwise fields
        self.accumulate_fields();

        // Phase 3: escape and infall frames
        self.calibrate_bodies();

        // Phase 4: accelerations, dropping bodies that cannot have one
        self.compute_accelerations();

        // Phase 5: tightest pairwise timestep
        let timestep = self.select_timestep();

        // Phase 6: integrate
        self.integrate(timestep)?;

        // Phase 7: merge colliding bodies
        let merged = self.resolve_collisions();

        // Phase 8: drop absorbed bodies
        let removed = self.compact();

        self.last_timestep = timestep;
        self.step_count += 1;

        let report = StepReport {
            timestep,
            coordinate_time: self.coordinate_time,
            merged,
            removed,
            live_bodies: self.bodies.len(),
        };
        log::debug!("Step {}: {:?}", self.step_count, report);

        Ok(report)
    }

    /// Run `count` steps, returning the last report
    pub fn run_steps(&mut self, count: usize) -> RelsimResult<Option<StepReport>> {
        let mut last = None;
        for _ in 0..count {
            last = Some(self.step()?);
        }
        Ok(last)
    }

    /// Run whole steps until `budget` of wall-clock time is spent. Always runs
    /// at least one step; a step is never cut short.
    pub fn run_for(&mut self, budget: Duration) -> RelsimResult<usize> {
        let start = Instant::now();
        let mut steps = 0;

        loop {
            self.step()?;
            steps += 1;

            if start.elapsed() >= budget {
                return Ok(steps);
            }
        }
    }

    fn accumulate_fields(&mut self) {
        let units = &self.units;
        let live = self.bodies.len();

        if let Some(pool) = worker_pool(&self.pool, live) {
            let chunk = chunk_len(live, pool);
            let bodies = &self.bodies;

            // Each worker sums everything acting on its own range, in index order
            let fields: Vec<FieldSample> = pool.install(|| {
                bodies
                    .par_iter()
                    .enumerate()
                    .with_min_len(chunk)
                    .map(|(i, body)| {
                        bodies
                            .iter()
                            .enumerate()
                            .filter(|(j, _)| *j != i)
                            .fold(FieldSample::default(), |acc, (_, other)| {
                                acc + body.interaction_from(other, units)
                            })
                    })
                    .collect()
            });

            for (body, sample) in self.bodies.iter_mut().zip(fields) {
                body.fields = sample;
            }
            return;
        }

        for body in self.bodies.iter_mut() {
            body.reset_fields();
        }

        for j in 1..live {
            let (head, tail) = self.bodies.split_at_mut(j);
            let second = &mut tail[0];

            for first in head.iter_mut() {
                first.accumulate_interaction_with(second, units);
                second.accumulate_interaction_with(first, units);
            }
        }
    }

    fn calibrate_bodies(&mut self) {
        let units = &self.units;

        match worker_pool(&self.pool, self.bodies.len()) {
            Some(pool) => {
                let chunk = chunk_len(self.bodies.len(), pool);
                let bodies = &mut self.bodies;
                pool.install(|| {
                    bodies
                        .par_iter_mut()
                        .with_min_len(chunk)
                        .for_each(|body| body.calibrate(units))
                });
            }
            None => {
                for body in self.bodies.iter_mut() {
                    body.calibrate(units);
                }
            }
        }
    }

    fn compute_accelerations(&mut self) {
        let accelerate = |body: &mut Body| {
            let result = body.calc_acceleration();
            if result.is_err() {
                body.marked_for_removal = true;
            }
            result.err()
        };

        let failures: Vec<RelsimError> = match worker_pool(&self.pool, self.bodies.len()) {
            Some(pool) => {
                let chunk = chunk_len(self.bodies.len(), pool);
                let bodies = &mut self.bodies;
                pool.install(|| {
                    bodies
                        .par_iter_mut()
                        .with_min_len(chunk)
                        .filter_map(accelerate)
                        .collect()
                })
            }
            None => self.bodies.iter_mut().filter_map(accelerate).collect(),
        };

        for error in failures {
            log::error!("{error}; removing body");
        }
    }

    fn select_timestep(&self) -> f64 {
        let units = &self.units;
        let default_timestep = self.config.default_timestep;
        let live: Vec<&Body> = self
            .bodies
            .iter()
            .filter(|body| !body.marked_for_removal)
            .collect();

        let pairs = (0..live.len()).flat_map(|i| (i + 1..live.len()).map(move |j| (i, j)));
        let bounds =
            pairs.map(|(i, j)| live[i].calc_timestep_bounds(live[j], units, default_timestep));

        select_timestep(bounds, default_timestep)
    }

    /// Nothing is committed unless every live body stays finite
    fn integrate(&mut self, timestep: f64) -> RelsimResult<()> {
        let units = &self.units;

        let mut motions = Vec::with_capacity(self.bodies.len());
        for body in self.bodies.iter().filter(|body| !body.marked_for_removal) {
            let motion = body.advanced_motion(timestep, units);
            if !motion.is_finite() {
                return Err(RelsimError::NonFiniteState {
                    body: body.name.clone(),
                });
            }
            motions.push(motion);
        }

        let live = self.bodies.iter_mut().filter(|body| !body.marked_for_removal);
        for (body, motion) in live.zip(motions) {
            body.commit_motion(motion, units);
        }

        self.coordinate_time += timestep;
        Ok(())
    }

    /// Absorbed bodies are only marked here; `compact` removes them
    fn resolve_collisions(&mut self) -> usize {
        let units = &self.units;
        let mut merged = 0;

        for j in 1..self.bodies.len() {
            let (head, tail) = self.bodies.split_at_mut(j);
            let second = &mut tail[0];

            for first in head.iter_mut() {
                if first.marked_for_removal || second.marked_for_removal {
                    continue;
                }
                if !first.is_colliding_with(second) {
                    continue;
                }

                // The heavier body survives; ties keep the earlier one
                if second.total_mass() > first.total_mass() {
                    second.absorb(first, units);
                } else {
                    first.absorb(second, units);
                }
                merged += 1;
            }
        }

        merged
    }

    fn compact(&mut self) -> usize {
        let before = self.bodies.len();
        self.bodies.retain(|body| !body.marked_for_removal);
        before - self.bodies.len()
    }

    /// Relativistic-mass weighted centre of the system
    pub fn center_of_mass(&self) -> DVec3 {
        let mut total_mass = 0.0;
        let mut weighted_position = DVec3::ZERO;

        for body in &self.bodies {
            let mass = body.relativistic_mass();
            total_mass += mass;
            weighted_position += body.position * mass;
        }

        if total_mass > 0.0 {
            weighted_position / total_mass
        } else {
            DVec3::ZERO
        }
    }

    /// Sum of coordinate-frame momenta `γ·m·v`
    pub fn total_momentum(&self) -> DVec3 {
        self.bodies
            .iter()
            .map(|body| {
                body.coord_velocity * (body.total_mass() / body.derived.coord_lorentz_reciprocal)
            })
            .sum()
    }
}

pub mod math;
pub mod physics;
pub mod scenario;

pub use math::{Body, Dimension, RenderBody, UnitSystem};
pub use physics::{Simulation, SimulationConfig, StepReport};
pub use scenario::{BodyRequest, Quantity, Scenario};

use anyhow::Result;

#[derive(thiserror::Error, Debug)]
pub enum RelsimError {
    #[error("Unknown {dimension} unit: {unit}")]
    UnknownUnit { dimension: Dimension, unit: String },
    #[error("Body '{body}' has invalid mass {mass}")]
    InvalidMass { body: String, mass: f64 },
    #[error("Body '{body}' has invalid radius {radius}")]
    InvalidRadius { body: String, radius: f64 },
    #[error("Body '{body}' reached a non-finite state")]
    NonFiniteState { body: String },
    #[error("Unit system cannot change while bodies exist")]
    UnitsInUse,
    #[error("Scenario parse error: {0}")]
    Scenario(#[from] ron::error::SpannedError),
    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RelsimResult<T> = Result<T, RelsimError>;

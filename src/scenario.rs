//! Body-creation requests and RON scenario files.
//!
//! Every physical quantity arrives with the name of the unit it is expressed
//! in and is converted into the active [`UnitSystem`] before a [`Body`] is
//! built.

use std::fs;
use std::path::Path;

use glam::DVec3;
use serde::Deserialize;

use crate::math::{Body, Dimension, UnitChoice, UnitSystem, DEFAULT_PRECISION_DIGITS};
use crate::RelsimResult;

/// A scalar amount in a named unit
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Quantity {
    pub amount: f64,
    pub unit: String,
}

impl Quantity {
    pub fn new(amount: f64, unit: &str) -> Self {
        Self {
            amount,
            unit: unit.to_string(),
        }
    }

    fn neutral() -> Self {
        Self::new(0.0, "C")
    }

    fn convert(&self, units: &UnitSystem, dimension: Dimension) -> RelsimResult<f64> {
        units.convert(self.amount, &self.unit, dimension)
    }
}

/// A position in a named length unit
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorQuantity {
    pub value: (f64, f64, f64),
    pub unit: String,
}

impl VectorQuantity {
    pub fn new(value: DVec3, unit: &str) -> Self {
        Self {
            value: (value.x, value.y, value.z),
            unit: unit.to_string(),
        }
    }

    fn vector(&self) -> DVec3 {
        DVec3::new(self.value.0, self.value.1, self.value.2)
    }
}

/// A velocity in named length-per-time units
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VelocityQuantity {
    pub value: (f64, f64, f64),
    pub space_unit: String,
    pub time_unit: String,
}

impl VelocityQuantity {
    pub fn new(value: DVec3, space_unit: &str, time_unit: &str) -> Self {
        Self {
            value: (value.x, value.y, value.z),
            space_unit: space_unit.to_string(),
            time_unit: time_unit.to_string(),
        }
    }

    pub fn at_rest() -> Self {
        Self::new(DVec3::ZERO, "m", "s")
    }

    fn vector(&self) -> DVec3 {
        DVec3::new(self.value.0, self.value.1, self.value.2)
    }
}

fn default_collidable() -> bool {
    true
}

fn default_precision() -> i32 {
    DEFAULT_PRECISION_DIGITS
}

/// Everything needed to create one body
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BodyRequest {
    pub name: String,
    pub mass: Quantity,
    #[serde(default = "Quantity::neutral")]
    pub charge: Quantity,
    pub radius: Quantity,
    pub position: VectorQuantity,
    #[serde(default = "VelocityQuantity::at_rest")]
    pub velocity: VelocityQuantity,
    #[serde(default)]
    pub color: Option<[f32; 4]>,
    #[serde(default = "default_collidable")]
    pub collidable: bool,
}

impl BodyRequest {
    /// A neutral, resting, collidable body
    pub fn new(name: &str, mass: Quantity, radius: Quantity, position: VectorQuantity) -> Self {
        Self {
            name: name.to_string(),
            mass,
            charge: Quantity::neutral(),
            radius,
            position,
            velocity: VelocityQuantity::at_rest(),
            color: None,
            collidable: true,
        }
    }

    pub fn with_charge(mut self, charge: Quantity) -> Self {
        self.charge = charge;
        self
    }

    pub fn with_velocity(mut self, velocity: VelocityQuantity) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_collidable(mut self, collidable: bool) -> Self {
        self.collidable = collidable;
        self
    }

    /// Convert every quantity into `units` and build the body
    pub fn to_body(&self, units: &UnitSystem) -> RelsimResult<Body> {
        let mass = self.mass.convert(units, Dimension::Mass)?;
        let charge = self.charge.convert(units, Dimension::Charge)?;
        let radius = self.radius.convert(units, Dimension::Space)?;
        let position =
            units.convert_vector(self.position.vector(), &self.position.unit, Dimension::Space)?;
        let velocity = units.convert_velocity(
            self.velocity.vector(),
            &self.velocity.space_unit,
            &self.velocity.time_unit,
        )?;

        let body = Body::new(&self.name, mass, charge, radius, position, velocity, units)?
            .with_collidable(self.collidable);

        Ok(match self.color {
            Some(color) => body.with_color(color),
            None => body,
        })
    }
}

/// Unit configuration plus the bodies to create
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_precision")]
    pub precision: i32,
    #[serde(default)]
    pub units: UnitChoice,
    #[serde(default)]
    pub default_timestep: Option<f64>,
    pub bodies: Vec<BodyRequest>,
}

impl Scenario {
    pub fn parse(content: &str) -> RelsimResult<Self> {
        Ok(ron::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> RelsimResult<Self> {
        let path = path.as_ref();
        log::info!("Loading scenario from {}", path.display());
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn unit_system(&self) -> RelsimResult<UnitSystem> {
        UnitSystem::new(self.precision).with_choice(self.units.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{AU_TO_METERS, SOLAR_MASS};
    use crate::RelsimError;

    const BINARY: &str = r#"(
    precision: 10,
    units: (space: "AU", time: "day", mass: "solar_mass", charge: "C"),
    default_timestep: Some(0.5),
    bodies: [
        (
            name: "Primary",
            mass: (amount: 1.0, unit: "solar_mass"),
            radius: (amount: 695700.0, unit: "km"),
            position: (value: (0.0, 0.0, 0.0), unit: "AU"),
            color: Some((1.0, 0.8, 0.2, 1.0)),
        ),
        (
            name: "Companion",
            mass: (amount: 1047.6, unit: "jupiter_mass"),
            charge: (amount: 2.0, unit: "uC"),
            radius: (amount: 1.0, unit: "solar_radius"),
            position: (value: (1.0, 0.0, 0.0), unit: "AU"),
            velocity: (value: (0.0, 29.78, 0.0), space_unit: "km", time_unit: "s"),
            collidable: false,
        ),
    ],
)"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::parse(BINARY).unwrap();

        assert_eq!(scenario.precision, 10);
        assert_eq!(scenario.units.space, "AU");
        assert_eq!(scenario.default_timestep, Some(0.5));
        assert_eq!(scenario.bodies.len(), 2);

        let primary = &scenario.bodies[0];
        assert_eq!(primary.name, "Primary");
        assert_eq!(primary.charge, Quantity::neutral());
        assert!(primary.collidable);
        assert_eq!(primary.velocity, VelocityQuantity::at_rest());

        let companion = &scenario.bodies[1];
        assert!(!companion.collidable);
        assert_eq!(companion.charge, Quantity::new(2.0, "uC"));
    }

    #[test]
    fn test_request_conversion() {
        let scenario = Scenario::parse(BINARY).unwrap();
        let units = scenario.unit_system().unwrap();

        let primary = scenario.bodies[0].to_body(&units).unwrap();
        assert!((primary.mass - 1.0).abs() < 1e-12);
        assert!((primary.rest_radius - 695_700_000.0 / AU_TO_METERS).abs() < 1e-15);
        assert_eq!(primary.color, [1.0, 0.8, 0.2, 1.0]);

        let companion = scenario.bodies[1].to_body(&units).unwrap();
        assert!((companion.mass - 1047.6 * 1.898e27 / SOLAR_MASS).abs() < 1e-9);
        assert!((companion.position.x - 1.0).abs() < 1e-12);
        let expected_speed = 29_780.0 * 86_400.0 / AU_TO_METERS;
        assert!((companion.coord_velocity.y - expected_speed).abs() < 1e-12);
        assert!((companion.charge - 2e-6).abs() < 1e-18);
        assert!(!companion.is_collidable);
    }

    #[test]
    fn test_unknown_unit_in_request() {
        let units = UnitSystem::default();
        let request = BodyRequest::new(
            "rock",
            Quantity::new(1.0, "stone"),
            Quantity::new(1.0, "m"),
            VectorQuantity::new(DVec3::ZERO, "m"),
        );

        assert!(matches!(
            request.to_body(&units),
            Err(RelsimError::UnknownUnit {
                dimension: Dimension::Mass,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_scenario() {
        assert!(matches!(
            Scenario::parse("(bodies: [ (name: 3) ])"),
            Err(RelsimError::Scenario(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let scenario = Scenario::parse("(bodies: [])").unwrap();
        assert_eq!(scenario.precision, DEFAULT_PRECISION_DIGITS);
        assert_eq!(scenario.units, UnitChoice::default());
        assert_eq!(scenario.default_timestep, None);
    }
}

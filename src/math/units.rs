/// Physical constants, named unit tables and the scaled constant set
/// the simulation runs in.
///
/// A [`UnitSystem`] is built once and never mutated in place: changing the
/// precision or the chosen units produces a new system whose constants and
/// bounds are all recomputed together.
use std::collections::BTreeMap;
use std::fmt;

use glam::DVec3;
use serde::Deserialize;

use crate::{RelsimError, RelsimResult};

/// Gravitational constant in SI units (m³ kg⁻¹ s⁻²)
pub const GRAVITATIONAL_CONSTANT: f64 = 6.67408e-11;

/// Coulomb constant in SI units (kg m³ s⁻² C⁻²)
pub const COULOMB_CONSTANT: f64 = 8.987_551_792_3e9;

/// Speed of light in m/s
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// One Astronomical Unit in meters
pub const AU_TO_METERS: f64 = 149_597_870_691.0;

/// One light year in meters
pub const LIGHT_YEAR_TO_METERS: f64 = 9_460_730_472_580_800.0;

/// One parsec in meters
pub const PARSEC_TO_METERS: f64 = 3.085_677_581_491_367e16;

/// Solar mass in kilograms
pub const SOLAR_MASS: f64 = 1.989e30;

/// Earth mass in kilograms
pub const EARTH_MASS: f64 = 5.972e24;

/// Jupiter mass in kilograms
pub const JUPITER_MASS: f64 = 1.898e27;

/// Solar radius in meters
pub const SOLAR_RADIUS: f64 = 6.96e8;

/// Earth radius in meters
pub const EARTH_RADIUS: f64 = 6.371e6;

/// Seconds per day
pub const SECONDS_PER_DAY: f64 = 86400.0;

/// Seconds per year (Julian)
pub const SECONDS_PER_YEAR: f64 = 31_557_600.0;

/// Elementary charge in coulombs
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;

/// Largest supported number of significant decimal digits
pub const MAX_PRECISION_DIGITS: i32 = 15;

pub const DEFAULT_PRECISION_DIGITS: i32 = 8;

/// The four physical dimensions that carry named units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    Space,
    Time,
    Mass,
    Charge,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Space,
        Dimension::Time,
        Dimension::Mass,
        Dimension::Charge,
    ];

    fn index(self) -> usize {
        match self {
            Dimension::Space => 0,
            Dimension::Time => 1,
            Dimension::Mass => 2,
            Dimension::Charge => 3,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Space => "space",
            Dimension::Time => "time",
            Dimension::Mass => "mass",
            Dimension::Charge => "charge",
        };
        f.write_str(name)
    }
}

/// The unit name chosen for each dimension
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UnitChoice {
    pub space: String,
    pub time: String,
    pub mass: String,
    pub charge: String,
}

impl UnitChoice {
    pub fn new(space: &str, time: &str, mass: &str, charge: &str) -> Self {
        Self {
            space: space.to_string(),
            time: time.to_string(),
            mass: mass.to_string(),
            charge: charge.to_string(),
        }
    }

    pub fn get(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Space => &self.space,
            Dimension::Time => &self.time,
            Dimension::Mass => &self.mass,
            Dimension::Charge => &self.charge,
        }
    }
}

impl Default for UnitChoice {
    fn default() -> Self {
        Self::new("m", "s", "kg", "C")
    }
}

type UnitTable = BTreeMap<String, f64>;

fn default_tables() -> [UnitTable; 4] {
    let table = |entries: &[(&str, f64)]| -> UnitTable {
        entries
            .iter()
            .map(|(name, scale)| (name.to_string(), *scale))
            .collect()
    };

    [
        table(&[
            ("mm", 1e-3),
            ("cm", 1e-2),
            ("m", 1.0),
            ("km", 1e3),
            ("earth_radius", EARTH_RADIUS),
            ("solar_radius", SOLAR_RADIUS),
            ("AU", AU_TO_METERS),
            ("ly", LIGHT_YEAR_TO_METERS),
            ("pc", PARSEC_TO_METERS),
        ]),
        table(&[
            ("ms", 1e-3),
            ("s", 1.0),
            ("min", 60.0),
            ("h", 3600.0),
            ("day", SECONDS_PER_DAY),
            ("year", SECONDS_PER_YEAR),
        ]),
        table(&[
            ("g", 1e-3),
            ("kg", 1.0),
            ("earth_mass", EARTH_MASS),
            ("jupiter_mass", JUPITER_MASS),
            ("solar_mass", SOLAR_MASS),
        ]),
        table(&[("e", ELEMENTARY_CHARGE), ("uC", 1e-6), ("C", 1.0)]),
    ]
}

/// Named unit tables, the chosen unit per dimension, and every constant and
/// bound derived from them.
#[derive(Debug, Clone)]
pub struct UnitSystem {
    tables: [UnitTable; 4],
    choice: UnitChoice,
    /// SI amount represented by one chosen unit, per dimension
    scales: [f64; 4],
    precision_digits: i32,
    g: f64,
    coulomb_const: f64,
    c: f64,
    max_speed: f64,
    max_space_error: f64,
    max_sim_distance: f64,
}

impl UnitSystem {
    /// SI units with the default unit tables at the given precision
    pub fn new(precision_digits: i32) -> Self {
        let tables = default_tables();
        let scales = [1.0; 4];
        Self::derive(tables, UnitChoice::default(), scales, precision_digits)
    }

    /// Same units, different precision. Out-of-range digits are clamped.
    pub fn with_precision(&self, precision_digits: i32) -> Self {
        Self::derive(
            self.tables.clone(),
            self.choice.clone(),
            self.scales,
            precision_digits,
        )
    }

    /// Same precision, different chosen units
    pub fn with_scales(
        &self,
        space: &str,
        time: &str,
        mass: &str,
        charge: &str,
    ) -> RelsimResult<Self> {
        self.with_choice(UnitChoice::new(space, time, mass, charge))
    }

    pub fn with_choice(&self, choice: UnitChoice) -> RelsimResult<Self> {
        let mut scales = [0.0; 4];
        for dimension in Dimension::ALL {
            scales[dimension.index()] =
                Self::lookup(&self.tables, choice.get(dimension), dimension)?;
        }

        log::info!(
            "Unit system set to space={} time={} mass={} charge={}",
            choice.space,
            choice.time,
            choice.mass,
            choice.charge
        );

        Ok(Self::derive(
            self.tables.clone(),
            choice,
            scales,
            self.precision_digits,
        ))
    }

    /// Registers an extra named unit. Re-registering the chosen unit rescales
    /// every derived constant.
    pub fn with_unit(&self, dimension: Dimension, name: &str, si_scale: f64) -> Self {
        let mut tables = self.tables.clone();
        tables[dimension.index()].insert(name.to_string(), si_scale);

        let mut scales = self.scales;
        if self.choice.get(dimension) == name {
            scales[dimension.index()] = si_scale;
        }

        Self::derive(tables, self.choice.clone(), scales, self.precision_digits)
    }

    fn derive(
        tables: [UnitTable; 4],
        choice: UnitChoice,
        scales: [f64; 4],
        precision_digits: i32,
    ) -> Self {
        let clamped = precision_digits.clamp(0, MAX_PRECISION_DIGITS);
        if clamped != precision_digits {
            log::warn!("Precision {precision_digits} out of range, clamped to {clamped}");
        }

        let [space, time, mass, charge] = scales;

        let g = GRAVITATIONAL_CONSTANT * space.powi(-3) * mass * time.powi(2);
        let coulomb_const =
            COULOMB_CONSTANT * mass.powi(-1) * space.powi(-3) * charge.powi(2) * time.powi(2);
        let c = SPEED_OF_LIGHT * time / space;

        let max_space_error = 10f64.powi(-clamped);
        let max_sim_distance = 10f64.powi(MAX_PRECISION_DIGITS - clamped);
        let max_speed = (1.0 - max_space_error) * c;

        Self {
            tables,
            choice,
            scales,
            precision_digits: clamped,
            g,
            coulomb_const,
            c,
            max_speed,
            max_space_error,
            max_sim_distance,
        }
    }

    fn lookup(tables: &[UnitTable; 4], unit: &str, dimension: Dimension) -> RelsimResult<f64> {
        tables[dimension.index()]
            .get(unit)
            .copied()
            .ok_or_else(|| RelsimError::UnknownUnit {
                dimension,
                unit: unit.to_string(),
            })
    }

    /// SI amount represented by one `unit`
    pub fn si_scale(&self, unit: &str, dimension: Dimension) -> RelsimResult<f64> {
        Self::lookup(&self.tables, unit, dimension)
    }

    /// Converts `amount` expressed in `from_unit` into the active unit for `dimension`
    pub fn convert(
        &self,
        amount: f64,
        from_unit: &str,
        dimension: Dimension,
    ) -> RelsimResult<f64> {
        let from = self.si_scale(from_unit, dimension)?;
        Ok(amount * from / self.scales[dimension.index()])
    }

    /// Converts an internal `amount` out to `to_unit`
    pub fn convert_to(
        &self,
        amount: f64,
        to_unit: &str,
        dimension: Dimension,
    ) -> RelsimResult<f64> {
        let to = self.si_scale(to_unit, dimension)?;
        Ok(amount * self.scales[dimension.index()] / to)
    }

    pub fn convert_vector(
        &self,
        vector: DVec3,
        from_unit: &str,
        dimension: Dimension,
    ) -> RelsimResult<DVec3> {
        Ok(vector * self.convert(1.0, from_unit, dimension)?)
    }

    /// Converts a velocity expressed in `space_unit` per `time_unit`
    pub fn convert_velocity(
        &self,
        velocity: DVec3,
        space_unit: &str,
        time_unit: &str,
    ) -> RelsimResult<DVec3> {
        let space = self.convert(1.0, space_unit, Dimension::Space)?;
        let time = self.convert(1.0, time_unit, Dimension::Time)?;
        Ok(velocity * (space / time))
    }

    pub fn available_units(&self, dimension: Dimension) -> impl Iterator<Item = &str> {
        self.tables[dimension.index()].keys().map(String::as_str)
    }

    pub fn choice(&self) -> &UnitChoice {
        &self.choice
    }

    pub fn precision_digits(&self) -> i32 {
        self.precision_digits
    }

    pub fn g(&self) -> f64 {
        self.g
    }

    pub fn coulomb_const(&self) -> f64 {
        self.coulomb_const
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    /// Speed cap strictly below `c`
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// Smallest resolvable relative distance
    pub fn max_space_error(&self) -> f64 {
        self.max_space_error
    }

    pub fn max_sim_distance(&self) -> f64 {
        self.max_sim_distance
    }

    /// Largest coordinate magnitude on a single axis
    pub fn max_axis_distance(&self) -> f64 {
        self.max_sim_distance / 3f64.sqrt()
    }
}

impl Default for UnitSystem {
    fn default() -> Self {
        Self::new(DEFAULT_PRECISION_DIGITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relative_eq(a: f64, b: f64, tolerance: f64) -> bool {
        ((a - b) / b).abs() < tolerance
    }

    #[test]
    fn test_si_defaults() {
        let units = UnitSystem::default();

        assert_eq!(units.g(), GRAVITATIONAL_CONSTANT);
        assert_eq!(units.coulomb_const(), COULOMB_CONSTANT);
        assert_eq!(units.c(), SPEED_OF_LIGHT);
        assert!(relative_eq(units.max_space_error(), 1e-8, 1e-15));
        assert_eq!(units.max_sim_distance(), 1e7);
        assert!(units.max_speed() < units.c());
        assert!(relative_eq(units.max_speed(), SPEED_OF_LIGHT * (1.0 - 1e-8), 1e-15));
    }

    #[test]
    fn test_precision_clamps() {
        let units = UnitSystem::default();

        let high = units.with_precision(40);
        assert_eq!(high.precision_digits(), MAX_PRECISION_DIGITS);
        assert_eq!(high.max_sim_distance(), 1.0);

        let low = units.with_precision(-3);
        assert_eq!(low.precision_digits(), 0);
        assert_eq!(low.max_space_error(), 1.0);
        assert_eq!(low.max_speed(), 0.0);
    }

    #[test]
    fn test_astronomical_scales() {
        let units = UnitSystem::default()
            .with_scales("AU", "day", "solar_mass", "C")
            .unwrap();

        // Gaussian gravitational constant squared
        let gm_sun = units.g();
        assert!(relative_eq(gm_sun, 2.959_122e-4, 1e-3));

        assert!(relative_eq(units.c(), 173.144_6, 1e-5));
        assert!(relative_eq(
            units.max_speed(),
            units.c() * (1.0 - units.max_space_error()),
            1e-15
        ));
    }

    #[test]
    fn test_coulomb_scaling() {
        let units = UnitSystem::default()
            .with_scales("km", "ms", "g", "uC")
            .unwrap();

        let expected = COULOMB_CONSTANT / 1e-3 / 1e9 * 1e-12 * 1e-6;
        assert!(relative_eq(units.coulomb_const(), expected, 1e-12));
    }

    #[test]
    fn test_unknown_unit() {
        let units = UnitSystem::default();

        let result = units.with_scales("furlong", "s", "kg", "C");
        assert!(matches!(
            result,
            Err(RelsimError::UnknownUnit {
                dimension: Dimension::Space,
                ..
            })
        ));

        // The original system is untouched
        assert_eq!(units.choice().space, "m");
        assert!(units.convert(1.0, "fortnight", Dimension::Time).is_err());
    }

    #[test]
    fn test_round_trip_all_units() {
        let base = UnitSystem::default();

        for dimension in Dimension::ALL {
            let names: Vec<String> = base.available_units(dimension).map(str::to_string).collect();

            for chosen in &names {
                let mut choice = UnitChoice::default();
                match dimension {
                    Dimension::Space => choice.space = chosen.clone(),
                    Dimension::Time => choice.time = chosen.clone(),
                    Dimension::Mass => choice.mass = chosen.clone(),
                    Dimension::Charge => choice.charge = chosen.clone(),
                }
                let units = base.with_choice(choice).unwrap();

                for name in &names {
                    let amount = 123.456;
                    let internal = units.convert(amount, name, dimension).unwrap();
                    let back = units.convert_to(internal, name, dimension).unwrap();
                    assert!(
                        relative_eq(back, amount, 1e-12),
                        "{dimension} {name} via {chosen}: {back}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_velocity_conversion() {
        let units = UnitSystem::default();
        let v = units
            .convert_velocity(DVec3::new(1.0, 0.0, -2.0), "km", "h")
            .unwrap();

        assert!((v.x - 1000.0 / 3600.0).abs() < 1e-12);
        assert!((v.z + 2000.0 / 3600.0).abs() < 1e-12);
    }

    #[test]
    fn test_custom_unit_rescales_chosen() {
        let units = UnitSystem::default()
            .with_scales("km", "s", "kg", "C")
            .unwrap();
        let rescaled = units.with_unit(Dimension::Space, "km", 2000.0);

        assert!(relative_eq(rescaled.c(), SPEED_OF_LIGHT / 2000.0, 1e-15));
        assert!(relative_eq(rescaled.g(), units.g() / 8.0, 1e-12));
    }
}

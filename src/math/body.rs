/// Physics body representation for the relativistic N-body kernel
use bytemuck::{Pod, Zeroable};
use glam::DVec3;
use std::ops::{Add, AddAssign};

use super::relativity::{cap_speed, lorentz_reciprocal, relativistic_velocity_add};
use super::units::UnitSystem;
use super::MathUtils;
use crate::{RelsimError, RelsimResult};

/// A body within this multiple of its horizon radius collapses into a black hole
pub const BLACK_HOLE_RADIUS_FACTOR: f64 = 1.5;

/// Ratio between the largest and smallest distance a body may cover per step
pub const TIMESTEP_RANGE_FACTOR: f64 = 10.0;

/// Field, potential and force one or more sources exert at a body
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FieldSample {
    pub gravity_field: DVec3,
    pub potential: f64,
    pub em_force: DVec3,
}

impl Add for FieldSample {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            gravity_field: self.gravity_field + rhs.gravity_field,
            potential: self.potential + rhs.potential,
            em_force: self.em_force + rhs.em_force,
        }
    }
}

impl AddAssign for FieldSample {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Kinematic state produced by one integration step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub position: DVec3,
    pub coord_velocity: DVec3,
    pub proper_time: f64,
}

impl Motion {
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.coord_velocity.is_finite() && self.proper_time.is_finite()
    }
}

/// Values derived from a body's velocity and its accumulated fields.
/// Rebuilt as a whole, never patched field by field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedState {
    /// `1/γ` of the coordinate velocity
    pub coord_lorentz_reciprocal: f64,
    /// Per-axis render scale for length contraction
    pub length_contraction: DVec3,
    /// Gravitational field used for integration; zero once the horizon cap is hit
    pub gravity_field: DVec3,
    pub escape_velocity: DVec3,
    pub escape_lorentz_reciprocal: f64,
    pub infall_velocity: DVec3,
    pub infall_lorentz_reciprocal: f64,
    pub horizon_capped: bool,
}

impl Default for DerivedState {
    fn default() -> Self {
        Self {
            coord_lorentz_reciprocal: 1.0,
            length_contraction: DVec3::ONE,
            gravity_field: DVec3::ZERO,
            escape_velocity: DVec3::ZERO,
            escape_lorentz_reciprocal: 1.0,
            infall_velocity: DVec3::ZERO,
            infall_lorentz_reciprocal: 1.0,
            horizon_capped: false,
        }
    }
}

/// A massive, charged, finite-radius body
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub name: String,

    /// Rest mass, excluding electromagnetic self-energy
    pub mass: f64,

    pub charge: f64,

    /// Proper radius
    pub rest_radius: f64,

    /// Position in the coordinate frame
    pub position: DVec3,

    /// Velocity in the coordinate frame, always below `max_speed`
    pub coord_velocity: DVec3,

    pub proper_time: f64,

    pub is_black_hole: bool,

    /// Non-collidable bodies only collide with black holes
    pub is_collidable: bool,

    /// Set once absorbed by another body; removed at the end of the step
    pub marked_for_removal: bool,

    /// Display color (RGBA)
    pub color: [f32; 4],

    /// Fields accumulated during the current step
    pub fields: FieldSample,

    /// Electromagnetic acceleration for the current step
    pub acceleration: DVec3,

    pub derived: DerivedState,

    em_field_mass: f64,
}

impl Body {
    /// Create a body from quantities already in internal units
    pub fn new(
        name: impl Into<String>,
        mass: f64,
        charge: f64,
        rest_radius: f64,
        position: DVec3,
        velocity: DVec3,
        units: &UnitSystem,
    ) -> RelsimResult<Self> {
        let name = name.into();

        if !mass.is_finite() || mass < 0.0 {
            return Err(RelsimError::InvalidMass { body: name, mass });
        }
        if !rest_radius.is_finite() || rest_radius < 0.0 {
            return Err(RelsimError::InvalidRadius {
                body: name,
                radius: rest_radius,
            });
        }
        if !charge.is_finite() || !position.is_finite() || !velocity.is_finite() {
            return Err(RelsimError::NonFiniteState { body: name });
        }

        let mut body = Self {
            name,
            mass,
            charge,
            rest_radius,
            position,
            coord_velocity: cap_speed(velocity, units),
            proper_time: 0.0,
            is_black_hole: false,
            is_collidable: true,
            marked_for_removal: false,
            color: [1.0, 1.0, 1.0, 1.0],
            fields: FieldSample::default(),
            acceleration: DVec3::ZERO,
            derived: DerivedState::default(),
            em_field_mass: 0.0,
        };

        body.em_field_mass = em_self_energy_mass(charge, rest_radius, units);
        if body.total_mass() <= 0.0 {
            return Err(RelsimError::InvalidMass {
                mass: body.total_mass(),
                body: body.name,
            });
        }

        body.apply_black_hole_rule(units);
        body.refresh_kinematics(units);
        Ok(body)
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }

    /// Black holes stay collidable regardless
    pub fn with_collidable(mut self, collidable: bool) -> Self {
        self.is_collidable = collidable || self.is_black_hole;
        self
    }

    pub fn em_field_mass(&self) -> f64 {
        self.em_field_mass
    }

    /// Rest mass plus electromagnetic self-energy mass
    pub fn total_mass(&self) -> f64 {
        self.mass + self.em_field_mass
    }

    /// Mass as seen by an observer falling in at the local escape velocity
    pub fn relativistic_mass(&self) -> f64 {
        self.total_mass() / self.derived.infall_lorentz_reciprocal
    }

    /// Outer horizon radius for this body's mass and charge
    pub fn schwarzschild_radius(&self, units: &UnitSystem) -> f64 {
        horizon_radius(self.total_mass(), self.charge, units)
    }

    /// Collapses the body into a black hole when it sits within
    /// `BLACK_HOLE_RADIUS_FACTOR` horizon radii
    pub fn apply_black_hole_rule(&mut self, units: &UnitSystem) {
        let horizon = self.schwarzschild_radius(units);

        if self.is_black_hole || self.rest_radius <= BLACK_HOLE_RADIUS_FACTOR * horizon {
            if !self.is_black_hole {
                log::info!(
                    "Body '{}' collapsed into a black hole (radius {:.6e})",
                    self.name,
                    horizon
                );
            }
            self.rest_radius = horizon;
            self.is_black_hole = true;
            self.is_collidable = true;
        }
    }

    /// Recompute the values that depend only on the coordinate velocity
    pub fn refresh_kinematics(&mut self, units: &UnitSystem) {
        let recip = lorentz_reciprocal(self.coord_velocity, units);
        let direction = self.coord_velocity.normalize_or_zero();

        self.derived.coord_lorentz_reciprocal = recip;
        self.derived.length_contraction = DVec3::ONE - direction * direction * (1.0 - recip);
    }

    /// Apparent radius along the direction to `point`
    pub fn radius_towards(&self, point: DVec3) -> f64 {
        let Some(velocity_direction) = self.coord_velocity.try_normalize() else {
            return self.rest_radius;
        };
        let Some(direction) = (point - self.position).try_normalize() else {
            return self.rest_radius;
        };

        let recip = self.derived.coord_lorentz_reciprocal;
        let cos_squared = MathUtils::sq(direction.dot(velocity_direction));
        let sin_squared = (1.0 - cos_squared).max(0.0);

        self.rest_radius * recip / (cos_squared + recip * recip * sin_squared).sqrt()
    }

    /// Field and potential of a uniform sphere with `strength` (`G·M` or
    /// `-k·q`), as seen from `point`. The field points from `point` towards
    /// this body for positive strength.
    fn radial_field(&self, point: DVec3, strength: f64) -> (DVec3, f64) {
        let toward = self.position - point;
        let distance = toward.length();
        let radius = self.radius_towards(point);

        if distance > radius {
            let field = toward * (strength / MathUtils::cb(distance));
            (field, -strength / distance)
        } else if radius > 0.0 {
            // Interior potential meets -strength/radius at the surface
            let field = toward * (strength / MathUtils::cb(radius));
            let potential = -strength * (3.0 * MathUtils::sq(radius) - MathUtils::sq(distance))
                / (2.0 * MathUtils::cb(radius));
            (field, potential)
        } else {
            (DVec3::ZERO, 0.0)
        }
    }

    /// Orthogonal components shrink by this body's `1/γ`
    fn contract_transverse(&self, field: DVec3) -> DVec3 {
        let speed_squared = self.coord_velocity.length_squared();
        if speed_squared == 0.0 {
            return field;
        }

        let parallel = self.coord_velocity * (field.dot(self.coord_velocity) / speed_squared);
        parallel + (field - parallel) * self.derived.coord_lorentz_reciprocal
    }

    /// Gravitational field and potential this body induces at `point`
    pub fn field_and_potential_at(&self, point: DVec3, units: &UnitSystem) -> (DVec3, f64) {
        let (field, potential) = self.radial_field(point, units.g() * self.total_mass());
        (self.contract_transverse(field), potential)
    }

    /// Electric field this body induces at `point`
    pub fn electromagnetic_field_at(&self, point: DVec3, units: &UnitSystem) -> DVec3 {
        if MathUtils::approx_zero(self.charge) {
            return DVec3::ZERO;
        }

        let (field, _) = self.radial_field(point, -units.coulomb_const() * self.charge);
        self.contract_transverse(field)
    }

    /// What `other` exerts on this body
    pub fn interaction_from(&self, other: &Body, units: &UnitSystem) -> FieldSample {
        let (gravity_field, potential) = other.field_and_potential_at(self.position, units);

        let em_force = if MathUtils::approx_zero(self.charge) {
            DVec3::ZERO
        } else {
            other.electromagnetic_field_at(self.position, units) * self.charge
        };

        FieldSample {
            gravity_field,
            potential,
            em_force,
        }
    }

    pub fn accumulate_interaction_with(&mut self, other: &Body, units: &UnitSystem) {
        self.fields += self.interaction_from(other, units);
    }

    pub fn reset_fields(&mut self) {
        self.fields = FieldSample::default();
    }

    /// Derive escape and infall frames from `fields`. Pure: the caller decides
    /// when to store the result.
    pub fn recalibrate(&self, fields: &FieldSample, units: &UnitSystem) -> DerivedState {
        let direction = (-fields.gravity_field)
            .try_normalize()
            .or_else(|| self.coord_velocity.try_normalize())
            .unwrap_or(DVec3::X);

        let escape_speed = (2.0 * fields.potential.abs()).sqrt();
        let horizon_capped = escape_speed >= units.max_speed();

        let (escape_speed, gravity_field) = if horizon_capped {
            (units.max_speed(), DVec3::ZERO)
        } else {
            (escape_speed, fields.gravity_field)
        };

        let escape_velocity = direction * escape_speed;
        let infall_velocity =
            relativistic_velocity_add(-escape_velocity, self.coord_velocity, units);

        DerivedState {
            gravity_field,
            escape_velocity,
            escape_lorentz_reciprocal: lorentz_reciprocal(escape_velocity, units),
            infall_velocity,
            infall_lorentz_reciprocal: lorentz_reciprocal(infall_velocity, units),
            horizon_capped,
            ..self.derived
        }
    }

    /// Recalibrate against the fields accumulated this step
    pub fn calibrate(&mut self, units: &UnitSystem) {
        self.derived = self.recalibrate(&self.fields, units);

        if self.derived.horizon_capped {
            log::debug!("Body '{}' is at the horizon cap", self.name);
        }
    }

    /// `acceleration = em_force / total_mass`
    pub fn calc_acceleration(&mut self) -> RelsimResult<()> {
        let total_mass = self.total_mass();
        if total_mass.is_nan() || total_mass <= 0.0 {
            return Err(RelsimError::InvalidMass {
                body: self.name.clone(),
                mass: total_mass,
            });
        }

        self.acceleration = self.fields.em_force / total_mass;
        Ok(())
    }

    /// Electromagnetic plus gravitational acceleration
    pub fn total_acceleration(&self) -> DVec3 {
        self.acceleration + self.derived.gravity_field
    }

    /// Speed and acceleration magnitude used for timestep bounds
    fn motion_magnitudes(&self, units: &UnitSystem) -> (f64, f64) {
        let acceleration = self.total_acceleration().length();
        if acceleration.is_finite() {
            (self.coord_velocity.length(), acceleration)
        } else {
            (units.max_speed(), 0.0)
        }
    }

    /// `(min, max)` step such that neither body of the pair covers more than
    /// `TIMESTEP_RANGE_FACTOR` times the resolvable distance floor, and the
    /// faster one covers at least the floor
    pub fn calc_timestep_bounds(
        &self,
        other: &Body,
        units: &UnitSystem,
        default_timestep: f64,
    ) -> (f64, f64) {
        let separation = (self.position - other.position).length();
        let (speed_a, accel_a) = self.motion_magnitudes(units);
        let (speed_b, accel_b) = other.motion_magnitudes(units);

        let at_rest = speed_a == 0.0 && accel_a == 0.0 && speed_b == 0.0 && accel_b == 0.0;
        if separation == 0.0 || at_rest {
            return (default_timestep, default_timestep);
        }

        let floor = (units.max_space_error() * separation).max(units.max_space_error());
        let ceiling = floor * TIMESTEP_RANGE_FACTOR;

        let min = time_to_travel(floor, speed_a, accel_a)
            .min(time_to_travel(floor, speed_b, accel_b));
        let max = time_to_travel(ceiling, speed_a, accel_a)
            .min(time_to_travel(ceiling, speed_b, accel_b));

        if !(min.is_finite() && max.is_finite() && min > 0.0) {
            return (default_timestep, default_timestep);
        }

        (min, max)
    }

    /// Integrate position, velocity and proper time over `timestep`
    pub fn advance(&mut self, timestep: f64, units: &UnitSystem) {
        let motion = self.advanced_motion(timestep, units);
        self.commit_motion(motion, units);
    }

    /// The motion `advance` would produce, without touching the body
    pub fn advanced_motion(&self, timestep: f64, units: &UnitSystem) -> Motion {
        let local_timestep = timestep * self.derived.escape_lorentz_reciprocal;

        let position = self.position + self.coord_velocity * local_timestep;

        let velocity = if self.acceleration.is_finite() {
            relativistic_velocity_add(
                self.coord_velocity,
                self.acceleration * local_timestep,
                units,
            )
        } else {
            self.fields
                .em_force
                .try_normalize()
                .or_else(|| self.coord_velocity.try_normalize())
                .unwrap_or(DVec3::ZERO)
                * units.max_speed()
        };

        Motion {
            position,
            coord_velocity: relativistic_velocity_add(
                velocity,
                self.derived.gravity_field * timestep,
                units,
            ),
            proper_time: self.proper_time + timestep * self.derived.infall_lorentz_reciprocal,
        }
    }

    pub fn commit_motion(&mut self, motion: Motion, units: &UnitSystem) {
        self.position = motion.position;
        self.coord_velocity = motion.coord_velocity;
        self.proper_time = motion.proper_time;

        self.refresh_kinematics(units);
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.coord_velocity.is_finite() && self.proper_time.is_finite()
    }

    pub fn is_colliding_with(&self, other: &Body) -> bool {
        let either_black_hole = self.is_black_hole || other.is_black_hole;
        let both_collidable = self.is_collidable && other.is_collidable;
        if !either_black_hole && !both_collidable {
            return false;
        }

        let distance = (self.position - other.position).length();
        distance <= self.radius_towards(other.position) + other.radius_towards(self.position)
    }

    /// Merge `other` into this body and mark it for removal
    pub fn absorb(&mut self, other: &mut Body, units: &UnitSystem) {
        let self_weight = self.relativistic_mass();
        let other_weight = other.relativistic_mass();
        let weight = self_weight + other_weight;

        self.position = if weight > 0.0 {
            (self.position * self_weight + other.position * other_weight) / weight
        } else {
            (self.position + other.position) * 0.5
        };

        // Coordinate energies weight the centre-of-momentum velocity
        let self_energy = self.total_mass() / self.derived.coord_lorentz_reciprocal;
        let other_energy = other.total_mass() / other.derived.coord_lorentz_reciprocal;
        let momentum = self.coord_velocity * self_energy + other.coord_velocity * other_energy;
        let energy = self_energy + other_energy;
        if energy > 0.0 {
            self.coord_velocity = cap_speed(momentum / energy, units);
        }

        let horizon_sum = self.schwarzschild_radius(units) + other.schwarzschild_radius(units);
        let merged_radius =
            (MathUtils::cb(self.rest_radius) + MathUtils::cb(other.rest_radius)).cbrt();

        self.mass += other.mass;
        self.charge += other.charge;

        if self.is_black_hole || other.is_black_hole || merged_radius < horizon_sum {
            self.rest_radius = horizon_sum;
            self.is_black_hole = true;
        } else {
            self.rest_radius = merged_radius;
        }
        self.is_collidable = self.is_collidable || other.is_collidable || self.is_black_hole;

        self.em_field_mass = em_self_energy_mass(self.charge, self.rest_radius, units);
        self.apply_black_hole_rule(units);
        self.refresh_kinematics(units);

        other.marked_for_removal = true;

        log::info!(
            "Body '{}' absorbed '{}' (mass {:.6e}, radius {:.6e})",
            self.name,
            other.name,
            self.mass,
            self.rest_radius
        );
    }
}

/// Positive root of `d = v·t + ½a·t²`, in a form that stays stable as `a → 0`
fn time_to_travel(distance: f64, speed: f64, acceleration: f64) -> f64 {
    let denominator = speed + (speed * speed + 2.0 * acceleration * distance).sqrt();
    if denominator > 0.0 {
        2.0 * distance / denominator
    } else {
        f64::INFINITY
    }
}

/// Outer (Reissner–Nordström) horizon radius. Over-extremal charge is
/// treated as extremal.
pub fn horizon_radius(total_mass: f64, charge: f64, units: &UnitSystem) -> f64 {
    let c_squared = units.c() * units.c();
    let gravitational = units.g() * total_mass / c_squared;
    let electric = units.g() * units.coulomb_const() * charge * charge / (c_squared * c_squared);

    gravitational + (gravitational * gravitational - electric).max(0.0).sqrt()
}

/// Mass equivalent of a uniformly charged sphere's field energy
pub fn em_self_energy_mass(charge: f64, radius: f64, units: &UnitSystem) -> f64 {
    if radius <= 0.0 || MathUtils::approx_zero(charge) {
        return 0.0;
    }

    0.6 * units.coulomb_const() * charge * charge / (radius * units.c() * units.c())
}

/// Reduced precision body data for rendering
/// Uses f32 for GPU compatibility and smaller memory footprint
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RenderBody {
    pub position: [f32; 3],
    pub radius: f32,
    /// Per-axis length-contraction factors
    pub scale: [f32; 3],
    pub _padding1: f32,
    pub color: [f32; 4],
    pub is_black_hole: u32,
    pub _padding2: [u32; 3],
}

impl From<&Body> for RenderBody {
    fn from(body: &Body) -> Self {
        let color = if body.is_black_hole {
            [0.0, 0.0, 0.0, 1.0]
        } else {
            body.color
        };

        Self {
            position: body.position.as_vec3().to_array(),
            radius: body.rest_radius as f32,
            scale: body.derived.length_contraction.as_vec3().to_array(),
            _padding1: 0.0,
            color,
            is_black_hole: body.is_black_hole as u32,
            _padding2: [0; 3],
        }
    }
}

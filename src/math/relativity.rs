//! Special-relativistic kinematics shared by bodies and the orchestrator.
//!
//! Every speed entering these functions is capped at [`UnitSystem::max_speed`]
//! first, so none of them can produce a domain error from numerical overshoot.

use glam::DVec3;

use super::units::UnitSystem;

/// Scales `velocity` down to strictly below `max_speed` if it reaches it
pub fn cap_speed(velocity: DVec3, units: &UnitSystem) -> DVec3 {
    let limit = units.max_speed();
    let speed = velocity.length();
    if speed < limit || speed == 0.0 {
        return velocity;
    }

    // Rescaling can round the length back onto the limit
    let mut capped = velocity * (limit / speed);
    while capped.length() >= limit && capped != DVec3::ZERO {
        capped *= 1.0 - 4.0 * f64::EPSILON;
    }
    capped
}

/// `sqrt(1 - (v/c)²)` for a scalar speed
pub fn lorentz_reciprocal_speed(speed: f64, units: &UnitSystem) -> f64 {
    let beta = speed.abs().min(units.max_speed()) / units.c();
    (1.0 - beta * beta).sqrt()
}

/// `1/γ` for `velocity`, in (0, 1]
pub fn lorentz_reciprocal(velocity: DVec3, units: &UnitSystem) -> f64 {
    lorentz_reciprocal_speed(velocity.length(), units)
}

/// `γ` for `velocity`, in [1, ∞)
pub fn lorentz_factor(velocity: DVec3, units: &UnitSystem) -> f64 {
    1.0 / lorentz_reciprocal(velocity, units)
}

/// Composes `relative`, measured in a frame moving at `frame`, back into the
/// base frame. The order matters: `frame` defines the boosted frame.
pub fn relativistic_velocity_add(frame: DVec3, relative: DVec3, units: &UnitSystem) -> DVec3 {
    let frame = cap_speed(frame, units);
    let relative = cap_speed(relative, units);

    let frame_length_squared = frame.length_squared();
    if frame_length_squared == 0.0 {
        return relative;
    }

    let alignment = relative.dot(frame);
    let parallel = frame * (alignment / frame_length_squared);
    let orthogonal = relative - parallel;

    let numerator = parallel + frame + orthogonal * lorentz_reciprocal(frame, units);
    let denominator = 1.0 + alignment / (units.c() * units.c());

    cap_speed(numerator / denominator, units)
}

/// Spatial part of the boost of event `(position, time)` into a frame moving
/// at `frame_velocity`
pub fn lorentz_transform_space(
    position: DVec3,
    time: f64,
    frame_velocity: DVec3,
    units: &UnitSystem,
) -> DVec3 {
    let velocity = cap_speed(frame_velocity, units);
    let speed_squared = velocity.length_squared();
    if speed_squared == 0.0 {
        return position;
    }

    let gamma = lorentz_factor(velocity, units);
    let parallel = velocity * (position.dot(velocity) / speed_squared);

    position + parallel * (gamma - 1.0) - velocity * (gamma * time)
}

/// Time part of the boost of event `(position, time)` into a frame moving at
/// `frame_velocity`
pub fn lorentz_transform_time(
    position: DVec3,
    time: f64,
    frame_velocity: DVec3,
    units: &UnitSystem,
) -> f64 {
    let velocity = cap_speed(frame_velocity, units);
    let gamma = lorentz_factor(velocity, units);

    gamma * (time - position.dot(velocity) / (units.c() * units.c()))
}

/// Wraps any axis beyond `±max_axis_distance` in from the opposite boundary.
/// Gives free-roaming observers a toroidal space; bodies never use this.
pub fn wrap_around_pos(position: DVec3, units: &UnitSystem) -> DVec3 {
    let limit = units.max_axis_distance();
    let span = 2.0 * limit;

    let wrap = |x: f64| {
        if x > limit || x < -limit {
            (x + limit).rem_euclid(span) - limit
        } else {
            x
        }
    };

    DVec3::new(wrap(position.x), wrap(position.y), wrap(position.z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::units::{Dimension, SPEED_OF_LIGHT};

    fn units() -> UnitSystem {
        // c = 1 keeps the numbers readable
        UnitSystem::default()
            .with_unit(Dimension::Space, "ls", SPEED_OF_LIGHT)
            .with_scales("ls", "s", "kg", "C")
            .unwrap()
    }

    #[test]
    fn test_lorentz_reciprocal_range() {
        let units = units();
        assert!((units.c() - 1.0).abs() < 1e-12);

        assert_eq!(lorentz_reciprocal(DVec3::ZERO, &units), 1.0);
        assert_eq!(lorentz_factor(DVec3::ZERO, &units), 1.0);

        let mut previous = 1.0;
        for step in 1..100 {
            let speed = units.max_speed() * step as f64 / 100.0;
            let recip = lorentz_reciprocal(DVec3::new(0.0, speed, 0.0), &units);
            assert!(recip > 0.0 && recip <= 1.0);
            assert!(recip < previous);
            previous = recip;
        }

        let at_cap = lorentz_reciprocal(DVec3::X * units.max_speed(), &units);
        assert!(at_cap > 0.0 && at_cap < 1e-3);

        // Overshoot is clamped rather than producing NaN
        let beyond = lorentz_reciprocal(DVec3::X * 5.0, &units);
        assert_eq!(beyond, at_cap);
    }

    #[test]
    fn test_known_gamma() {
        let units = units();
        let gamma = lorentz_factor(DVec3::new(0.6, 0.0, 0.0), &units);
        assert!((gamma - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_collinear_velocity_addition() {
        let units = units();
        let sum = relativistic_velocity_add(DVec3::X * 0.5, DVec3::X * 0.5, &units);
        assert!((sum.x - 0.8).abs() < 1e-9);
        assert_eq!(sum.y, 0.0);
    }

    #[test]
    fn test_orthogonal_velocity_addition() {
        let units = units();
        let sum = relativistic_velocity_add(DVec3::X * 0.6, DVec3::Y * 0.5, &units);

        // Transverse component is divided by gamma(frame) = 1.25
        assert!((sum.x - 0.6).abs() < 1e-9);
        assert!((sum.y - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_addition_order_matters() {
        let units = units();
        let a = relativistic_velocity_add(DVec3::X * 0.6, DVec3::Y * 0.5, &units);
        let b = relativistic_velocity_add(DVec3::Y * 0.5, DVec3::X * 0.6, &units);

        assert!((a.length() - b.length()).abs() < 1e-9);
        assert!((a - b).length() > 1e-3);
    }

    #[test]
    fn test_velocity_addition_stays_below_cap() {
        let units = units();
        let near = units.max_speed() * 0.999_999;
        let directions = [
            DVec3::X,
            DVec3::NEG_X,
            DVec3::Y,
            DVec3::new(1.0, 1.0, 0.0).normalize(),
            DVec3::new(-0.3, 0.2, 0.9).normalize(),
        ];

        for a in directions {
            for b in directions {
                let sum = relativistic_velocity_add(a * near, b * near, &units);
                assert!(sum.is_finite());
                assert!(sum.length() < units.max_speed());
            }
        }
    }

    #[test]
    fn test_cap_speed_lands_below_limit() {
        let units = units();
        let max = units.max_speed();

        let slow = DVec3::new(0.1, -0.2, 0.3);
        assert_eq!(cap_speed(slow, &units), slow);
        assert_eq!(cap_speed(DVec3::ZERO, &units), DVec3::ZERO);

        let directions = [
            DVec3::X,
            DVec3::new(1.0, 1.0, 0.0).normalize(),
            DVec3::new(-0.3, 0.2, 0.9).normalize(),
            DVec3::new(0.577, -0.577, 0.577).normalize(),
        ];
        for direction in directions {
            for speed in [max, max * 1.5, 3.0] {
                let capped = cap_speed(direction * speed, &units);
                assert!(capped.length() < max);
                assert!(capped.length() > max * (1.0 - 1e-12));
                assert!((capped.normalize() - direction).length() < 1e-12);
            }
        }
    }

    #[test]
    fn test_boost_matches_textbook_form() {
        let units = units();
        let position = DVec3::new(5.0, 2.0, -1.0);
        let time = 3.0;
        let velocity = DVec3::X * 0.6;
        let gamma = 1.25;

        let space = lorentz_transform_space(position, time, velocity, &units);
        let t = lorentz_transform_time(position, time, velocity, &units);

        assert!((space.x - gamma * (5.0 - 0.6 * 3.0)).abs() < 1e-9);
        assert!((space.y - 2.0).abs() < 1e-12);
        assert!((space.z + 1.0).abs() < 1e-12);
        assert!((t - gamma * (3.0 - 0.6 * 5.0)).abs() < 1e-9);
    }

    #[test]
    fn test_boost_preserves_interval() {
        let units = units();
        let position = DVec3::new(1.0, -2.0, 0.5);
        let time = 4.0;
        let velocity = DVec3::new(0.3, 0.4, -0.2);

        let space = lorentz_transform_space(position, time, velocity, &units);
        let t = lorentz_transform_time(position, time, velocity, &units);

        let before = time * time - position.length_squared();
        let after = t * t - space.length_squared();
        assert!((before - after).abs() < 1e-9);
    }

    #[test]
    fn test_wrap_around_pos() {
        let units = UnitSystem::default();
        let limit = units.max_axis_distance();

        let inside = DVec3::new(limit * 0.5, -limit * 0.5, 0.0);
        assert_eq!(wrap_around_pos(inside, &units), inside);

        let wrapped = wrap_around_pos(DVec3::new(limit + 10.0, 0.0, -limit - 20.0), &units);
        assert!((wrapped.x - (-limit + 10.0)).abs() < 1e-6);
        assert!((wrapped.z - (limit - 20.0)).abs() < 1e-6);
        assert_eq!(wrapped.y, 0.0);
    }
}

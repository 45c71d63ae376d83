pub mod body;
pub mod relativity;
pub mod units;

pub use body::*;
pub use relativity::*;
pub use units::*;

/// Small numeric helpers shared by the physics code
pub struct MathUtils;

impl MathUtils {
    /// Square function for common physics calculations
    #[inline]
    pub fn sq(x: f64) -> f64 {
        x * x
    }

    /// Cube function for common physics calculations
    #[inline]
    pub fn cb(x: f64) -> f64 {
        x * x * x
    }

    /// True for zero and subnormal magnitudes, which carry no usable signal
    #[inline]
    pub fn approx_zero(x: f64) -> bool {
        x.abs() < f64::MIN_POSITIVE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_utils() {
        assert_eq!(MathUtils::sq(3.0), 9.0);
        assert_eq!(MathUtils::cb(2.0), 8.0);
        assert_eq!(MathUtils::cb(-2.0), -8.0);
    }

    #[test]
    fn test_approx_zero() {
        assert!(MathUtils::approx_zero(0.0));
        assert!(MathUtils::approx_zero(-0.0));
        assert!(MathUtils::approx_zero(f64::MIN_POSITIVE / 2.0));
        assert!(!MathUtils::approx_zero(ELEMENTARY_CHARGE));
        assert!(!MathUtils::approx_zero(-1e-300));
    }
}

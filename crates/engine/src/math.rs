use std::ops::{Add, Mul, Neg, Sub};

/// Inset used when sampling the closing edge of a half-open interval.
///
/// Scaled by the magnitude of the sampled coordinate so that `end - inset`
/// stays strictly below `end` for any world coordinate a map can produce.
pub const SAMPLE_EPSILON: f32 = 100.0 * f32::EPSILON;

/// ULPs of tolerance for snapping integrated positions back onto integers.
pub const SNAP_ULPS: f32 = 4.0;

pub const SQRT_1_2: f32 = std::f32::consts::FRAC_1_SQRT_2;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn is_zero(self) -> bool {
        feq(self.x, 0.0) && feq(self.y, 0.0)
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

pub fn feq(a: f32, b: f32) -> bool {
    (a - b).abs() < f32::EPSILON
}

pub fn flt(a: f32, b: f32) -> bool {
    a < b && !feq(a, b)
}

pub fn flte(a: f32, b: f32) -> bool {
    a < b || feq(a, b)
}

pub fn fgt(a: f32, b: f32) -> bool {
    a > b && !feq(a, b)
}

pub fn fgte(a: f32, b: f32) -> bool {
    a > b || feq(a, b)
}

/// Pulls a closing boundary back inside its half-open interval.
pub fn inset(end: f32) -> f32 {
    end - SAMPLE_EPSILON * end.abs().max(1.0)
}

/// Zeroes values that are indistinguishable from zero at sampling precision.
pub fn snap_zero(value: f32) -> f32 {
    if value.abs() < SAMPLE_EPSILON {
        0.0
    } else {
        value
    }
}

/// Snaps values within sampling precision of an integer onto that integer.
pub fn snap_integer(value: f32) -> f32 {
    let rounded = value.round();
    if (value - rounded).abs() < SNAP_ULPS * f32::EPSILON * value.abs().max(1.0) {
        rounded
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerant_comparisons_treat_ulp_noise_as_equal() {
        let a = 0.1_f32 + 0.2_f32;
        assert!(feq(a, 0.3));
        assert!(!flt(a, 0.3));
        assert!(flte(a, 0.3));
        assert!(!fgt(a, 0.3));
        assert!(fgte(a, 0.3));
    }

    #[test]
    fn strict_comparisons_hold_for_separated_values() {
        assert!(flt(1.0, 2.0));
        assert!(fgt(2.0, 1.0));
        assert!(!flt(2.0, 1.0));
        assert!(!fgte(1.0, 2.0));
    }

    #[test]
    fn inset_stays_below_end_at_large_coordinates() {
        for end in [16.0_f32, 32.0, 1600.0, 65_536.0] {
            let pulled = inset(end);
            assert!(pulled < end, "inset({end}) = {pulled}");
            assert_eq!((pulled / 16.0).floor(), (end / 16.0).floor() - 1.0);
        }
    }

    #[test]
    fn snap_integer_removes_drift_only() {
        assert_eq!(snap_integer(32.000_001), 32.0);
        assert_eq!(snap_integer(31.999_998), 32.0);
        assert_eq!(snap_integer(31.5), 31.5);
        assert_eq!(snap_integer(300.003), 300.003);
        assert_eq!(snap_zero(1.0e-7), 0.0);
        assert_eq!(snap_zero(0.25), 0.25);
    }
}

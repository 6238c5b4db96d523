//! Angle wrapping helpers shared by every filter.

use std::f64::consts::{PI, TAU};

/// Wrap an angle in radians into (-π, π].
///
/// Closed form, so huge inputs cost the same as small ones. Values that are
/// already in range come back untouched, which makes the function exactly
/// idempotent.
pub fn normalize_angle(angle: f64) -> f64 {
    if angle > -PI && angle <= PI {
        return angle;
    }
    let shifted = (angle + PI).rem_euclid(TAU);
    if shifted == 0.0 {
        PI
    } else {
        shifted - PI
    }
}

/// Wrap an angle in degrees into (-180, 180].
pub fn normalize_degrees(angle_deg: f64) -> f64 {
    if angle_deg > -180.0 && angle_deg <= 180.0 {
        return angle_deg;
    }
    let shifted = (angle_deg + 180.0).rem_euclid(360.0);
    if shifted == 0.0 {
        180.0
    } else {
        shifted - 180.0
    }
}

/// Wrap an angle in degrees into [0, 360).
pub fn wrap_degrees_360(angle_deg: f64) -> f64 {
    let wrapped = angle_deg.rem_euclid(360.0);
    // rem_euclid can round up to the modulus for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Shortest signed difference `a - b` in radians.
pub fn angle_difference(a: f64, b: f64) -> f64 {
    normalize_angle(a - b)
}

//! Quaternion / Euler conversions (ZYX intrinsic: yaw, then pitch, then roll).
//!
//! Every Euler triple here is in degrees; quaternions are `(w, x, y, z)`.

use serde::{Deserialize, Serialize};

use crate::types::{EulerAngles, RotationMat4};

const MIN_NORM: f64 = 1e-12;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit-length copy, or `None` when the norm is zero or not finite.
    pub fn normalized(&self) -> Option<Self> {
        let norm = self.norm();
        if !norm.is_finite() || norm < MIN_NORM {
            return None;
        }
        Some(Self {
            w: self.w / norm,
            x: self.x / norm,
            y: self.y / norm,
            z: self.z / norm,
        })
    }

    pub fn to_euler(&self) -> EulerAngles {
        quaternion_to_euler(self)
    }

    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.w, self.x, self.y, self.z)
    }
}

/// Euler angles (degrees) to quaternion using the half-angle product formula.
pub fn euler_to_quaternion(roll_deg: f64, pitch_deg: f64, yaw_deg: f64) -> Quaternion {
    let (sr, cr) = (roll_deg.to_radians() * 0.5).sin_cos();
    let (sp, cp) = (pitch_deg.to_radians() * 0.5).sin_cos();
    let (sy, cy) = (yaw_deg.to_radians() * 0.5).sin_cos();

    Quaternion {
        w: cr * cp * cy + sr * sp * sy,
        x: sr * cp * cy - cr * sp * sy,
        y: cr * sp * cy + sr * cp * sy,
        z: cr * cp * sy - sr * sp * cy,
    }
}

/// Quaternion to Euler angles (degrees).
///
/// At the gimbal singularity the pitch argument is clamped to [-1, 1], so
/// pitch saturates at ±90° instead of producing NaN.
pub fn quaternion_to_euler(q: &Quaternion) -> EulerAngles {
    let Quaternion { w, x, y, z } = *q;

    let sinr_cosp = 2.0 * (w * x + y * z);
    let cosr_cosp = 1.0 - 2.0 * (x * x + y * y);
    let roll = sinr_cosp.atan2(cosr_cosp);

    let sinp = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0);
    let pitch = sinp.asin();

    let siny_cosp = 2.0 * (w * z + x * y);
    let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);
    let yaw = siny_cosp.atan2(cosy_cosp);

    EulerAngles::new(roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees())
}

/// Homogeneous 4x4 rotation matrix. nalgebra stores it column-major, which is
/// the layout GL-style renderers expect.
pub fn quaternion_to_rotation_matrix(q: &Quaternion) -> RotationMat4 {
    let Quaternion { w, x, y, z } = *q;

    let ww = w * w;
    let xx = x * x;
    let yy = y * y;
    let zz = z * z;
    let wx = w * x;
    let wy = w * y;
    let wz = w * z;
    let xy = x * y;
    let xz = x * z;
    let yz = y * z;

    // Matrix4::new takes its arguments row by row
    RotationMat4::new(
        ww + xx - yy - zz, 2.0 * (xy - wz), 2.0 * (xz + wy), 0.0,
        2.0 * (xy + wz), ww - xx + yy - zz, 2.0 * (yz - wx), 0.0,
        2.0 * (xz - wy), 2.0 * (yz + wx), ww - xx - yy + zz, 0.0,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Column-major `f32` array ready for a uniform upload.
pub fn rotation_matrix_gl(q: &Quaternion) -> [f32; 16] {
    let m = quaternion_to_rotation_matrix(q);
    let mut out = [0.0f32; 16];
    for (slot, value) in out.iter_mut().zip(m.as_slice().iter()) {
        *slot = *value as f32;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{UnitQuaternion, Vector3};

    #[test]
    fn test_identity() {
        let q = euler_to_quaternion(0.0, 0.0, 0.0);
        assert_eq!(q, Quaternion::IDENTITY);
        let e = quaternion_to_euler(&q);
        assert_eq!(e, EulerAngles::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_round_trip_away_from_gimbal() {
        let mut count = 0;
        for roll in (-170..=170).step_by(34) {
            for pitch in (-80..=80).step_by(20) {
                for yaw in (-175..=175).step_by(35) {
                    let (r, p, y) = (roll as f64, pitch as f64, yaw as f64);
                    let q = euler_to_quaternion(r, p, y);
                    assert_abs_diff_eq!(q.norm(), 1.0, epsilon = 1e-12);
                    let e = quaternion_to_euler(&q);
                    assert_abs_diff_eq!(e.roll, r, epsilon = 1e-9);
                    assert_abs_diff_eq!(e.pitch, p, epsilon = 1e-9);
                    assert_abs_diff_eq!(e.yaw, y, epsilon = 1e-9);
                    count += 1;
                }
            }
        }
        assert!(count > 500);
    }

    #[test]
    fn test_matches_nalgebra_convention() {
        let (r, p, y) = (30.0_f64, 45.0_f64, 60.0_f64);
        let ours = euler_to_quaternion(r, p, y);
        let reference =
            UnitQuaternion::from_euler_angles(r.to_radians(), p.to_radians(), y.to_radians());
        assert_abs_diff_eq!(ours.w, reference.w, epsilon = 1e-12);
        assert_abs_diff_eq!(ours.x, reference.i, epsilon = 1e-12);
        assert_abs_diff_eq!(ours.y, reference.j, epsilon = 1e-12);
        assert_abs_diff_eq!(ours.z, reference.k, epsilon = 1e-12);
    }

    #[test]
    fn test_gimbal_pitch_saturates() {
        let q = euler_to_quaternion(0.0, 90.0, 0.0);
        let e = quaternion_to_euler(&q);
        assert!(e.is_finite());
        assert_abs_diff_eq!(e.pitch, 90.0, epsilon = 1e-6);

        // Slightly over-length quaternion pushes the asin argument past 1
        let q = Quaternion::new(0.7072, 0.0, 0.7072, 0.0);
        let e = quaternion_to_euler(&q);
        assert!(e.is_finite());
        assert_eq!(e.pitch, 90.0);
    }

    #[test]
    fn test_rotation_matrix_matches_nalgebra() {
        let q = euler_to_quaternion(10.0, -20.0, 130.0);
        let m = quaternion_to_rotation_matrix(&q);
        let reference = UnitQuaternion::from_euler_angles(
            10.0_f64.to_radians(),
            -20.0_f64.to_radians(),
            130.0_f64.to_radians(),
        );
        let v = Vector3::new(0.3, -1.2, 2.0);
        let expected = reference * v;
        let rotated = m.fixed_view::<3, 3>(0, 0) * v;
        assert_abs_diff_eq!((rotated - expected).norm(), 0.0, epsilon = 1e-12);

        assert_eq!(m[(3, 3)], 1.0);
        for i in 0..3 {
            assert_eq!(m[(3, i)], 0.0);
            assert_eq!(m[(i, 3)], 0.0);
        }
    }

    #[test]
    fn test_gl_layout_is_column_major() {
        let q = euler_to_quaternion(0.0, 0.0, 90.0);
        let m = quaternion_to_rotation_matrix(&q);
        let gl = rotation_matrix_gl(&q);
        // element (row 1, col 0) sits at index 1 in column-major order
        assert_abs_diff_eq!(gl[1] as f64, m[(1, 0)], epsilon = 1e-6);
        assert_abs_diff_eq!(gl[4] as f64, m[(0, 1)], epsilon = 1e-6);
        assert_eq!(gl[15], 1.0);
    }

    #[test]
    fn test_normalized_rejects_zero() {
        assert!(Quaternion::new(0.0, 0.0, 0.0, 0.0).normalized().is_none());
        assert!(Quaternion::new(f64::NAN, 0.0, 0.0, 0.0).normalized().is_none());
        let q = Quaternion::new(2.0, 0.0, 0.0, 0.0).normalized().unwrap();
        assert_eq!(q, Quaternion::IDENTITY);
    }
}

// simkin_core/src/convert.rs

//! Conversions between the simulator's native types (nalgebra) and the
//! solver's plain-array representation.
//!
//! Every function here is total and stateless. Angle triples are always
//! interpreted as a **body-fixed X-Y-Z** sequence: rotate about X, then about
//! the new Y, then about the twice-rotated Z, i.e. `R = Rx(a) * Ry(b) * Rz(c)`.

use nalgebra::{Matrix3, Quaternion, Rotation3, Translation3, UnitQuaternion, Vector3};
use std::f64::consts::FRAC_PI_2;

use crate::element::Element;
use crate::types::Pose;

/// Past this |sin(b)| the X and Z axes are treated as aligned.
const GIMBAL_LOCK_THRESHOLD: f64 = 1.0 - 1e-10;

// =========================================================================
// == Solver-Side Types ==
// =========================================================================

/// A 3-vector as the solver stores it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolverVec3(pub [f64; 3]);

/// A quaternion as the solver stores it: scalar first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverQuaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A rigid transform as the solver stores it: a rotation matrix plus a
/// translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverTransform {
    pub rotation: Rotation3<f64>,
    pub translation: SolverVec3,
}

impl Default for SolverTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl SolverTransform {
    pub fn identity() -> Self {
        Self {
            rotation: Rotation3::identity(),
            translation: SolverVec3::default(),
        }
    }

    /// `self * other`: `other` expressed in `self`'s frame.
    pub fn compose(&self, other: &SolverTransform) -> SolverTransform {
        SolverTransform {
            rotation: self.rotation * other.rotation,
            translation: self.transform_point(&other.translation),
        }
    }

    pub fn inverse(&self) -> SolverTransform {
        let rotation = self.rotation.inverse();
        SolverTransform {
            rotation,
            translation: vec3_to_solver(&-(rotation * vec3_from_solver(&self.translation))),
        }
    }

    pub fn transform_point(&self, p: &SolverVec3) -> SolverVec3 {
        vec3_to_solver(&(self.rotation * vec3_from_solver(p) + vec3_from_solver(&self.translation)))
    }
}

// =========================================================================
// == Quaternion / Vector Repacking ==
// =========================================================================

pub fn quat_to_solver(q: &UnitQuaternion<f64>) -> SolverQuaternion {
    SolverQuaternion {
        w: q.w,
        x: q.i,
        y: q.j,
        z: q.k,
    }
}

pub fn quat_from_solver(q: &SolverQuaternion) -> UnitQuaternion<f64> {
    // Solver quaternions are unit by construction; this is a pure repack.
    UnitQuaternion::new_unchecked(Quaternion::new(q.w, q.x, q.y, q.z))
}

pub fn vec3_to_solver(v: &Vector3<f64>) -> SolverVec3 {
    SolverVec3([v.x, v.y, v.z])
}

pub fn vec3_from_solver(v: &SolverVec3) -> Vector3<f64> {
    Vector3::new(v.0[0], v.0[1], v.0[2])
}

// =========================================================================
// == Body-Fixed X-Y-Z Angle Sequence ==
// =========================================================================

/// Builds `Rx(a) * Ry(b) * Rz(c)` from `angles = (a, b, c)`.
pub fn rotation_from_body_xyz(angles: &Vector3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), angles.x)
        * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angles.y)
        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angles.z)
}

/// Extracts body-fixed X-Y-Z angles, the inverse of [`rotation_from_body_xyz`].
///
/// At gimbal lock (b = +/-90 deg) only `a + c` (or `a - c`) is observable;
/// the whole of it is assigned to `a` and `c` is zero.
pub fn body_xyz_from_rotation(rotation: &UnitQuaternion<f64>) -> Vector3<f64> {
    let m: Matrix3<f64> = rotation.to_rotation_matrix().into_inner();
    let sin_b = m[(0, 2)].clamp(-1.0, 1.0);

    if sin_b.abs() < GIMBAL_LOCK_THRESHOLD {
        let a = (-m[(1, 2)]).atan2(m[(2, 2)]);
        let b = sin_b.asin();
        let c = (-m[(0, 1)]).atan2(m[(0, 0)]);
        Vector3::new(a, b, c)
    } else if sin_b > 0.0 {
        Vector3::new(m[(1, 0)].atan2(m[(1, 1)]), FRAC_PI_2, 0.0)
    } else {
        Vector3::new((-m[(1, 0)]).atan2(m[(1, 1)]), -FRAC_PI_2, 0.0)
    }
}

// =========================================================================
// == Pose <-> Solver Transform ==
// =========================================================================

/// Converts a native pose to a solver transform.
pub fn pose_to_transform(pose: &Pose) -> SolverTransform {
    SolverTransform {
        rotation: pose.rotation.to_rotation_matrix(),
        translation: vec3_to_solver(&pose.translation.vector),
    }
}

/// Converts a solver transform back to a native pose.
pub fn transform_to_pose(xform: &SolverTransform) -> Pose {
    Pose::from_parts(
        Translation3::from(vec3_from_solver(&xform.translation)),
        UnitQuaternion::from_rotation_matrix(&xform.rotation),
    )
}

/// Builds a native pose from `[x, y, z, a, b, c]`, body-fixed X-Y-Z angles.
pub fn pose_from_components(c: &[f64; 6]) -> Pose {
    Pose::from_parts(
        Translation3::new(c[0], c[1], c[2]),
        rotation_from_body_xyz(&Vector3::new(c[3], c[4], c[5])),
    )
}

/// Inverse of [`pose_from_components`].
pub fn pose_components(pose: &Pose) -> [f64; 6] {
    let t = pose.translation.vector;
    let a = body_xyz_from_rotation(&pose.rotation);
    [t.x, t.y, t.z, a.x, a.y, a.z]
}

/// Builds a solver transform straight from `[x, y, z, a, b, c]`.
pub fn transform_from_components(c: &[f64; 6]) -> SolverTransform {
    pose_to_transform(&pose_from_components(c))
}

/// Reads a solver transform back out as `[x, y, z, a, b, c]`.
pub fn transform_components(xform: &SolverTransform) -> [f64; 6] {
    pose_components(&transform_to_pose(xform))
}

/// Parses `x y z a b c`. Returns `None` unless exactly six numbers are present.
pub fn parse_components(text: &str) -> Option<[f64; 6]> {
    let values: Vec<f64> = text
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<Result<_, _>>()
        .ok()?;
    values.try_into().ok()
}

/// The native pose of `element`'s first `<pose>` child, or identity when it
/// is absent or unreadable.
pub fn element_pose_native(element: &Element) -> Pose {
    element
        .first_child("pose")
        .and_then(|p| parse_components(&p.text))
        .map(|c| pose_from_components(&c))
        .unwrap_or_else(Pose::identity)
}

/// The solver transform of `element`'s first `<pose>` child, or identity.
/// Later `<pose>` children are ignored.
pub fn element_pose(element: &Element) -> SolverTransform {
    pose_to_transform(&element_pose_native(element))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    const EPS: f64 = 1e-9;

    fn assert_rotation_eq(a: &UnitQuaternion<f64>, b: &UnitQuaternion<f64>) {
        let angle = a.angle_to(b);
        assert!(angle < 1e-7, "rotations differ by {angle} rad: {a:?} vs {b:?}");
    }

    fn assert_transform_eq(a: &SolverTransform, b: &SolverTransform) {
        for i in 0..3 {
            assert_abs_diff_eq!(a.translation.0[i], b.translation.0[i], epsilon = EPS);
            for j in 0..3 {
                assert_abs_diff_eq!(a.rotation[(i, j)], b.rotation[(i, j)], epsilon = EPS);
            }
        }
    }

    #[test]
    fn quaternion_repacking_keeps_fields() {
        let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.7);
        let s = quat_to_solver(&q);
        assert_eq!(s.w, q.w);
        assert_eq!(s.x, q.i);
        assert_eq!(s.y, q.j);
        assert_eq!(s.z, q.k);
        assert_eq!(quat_from_solver(&s), q);
    }

    #[test]
    fn vector_repacking_keeps_fields() {
        let v = Vector3::new(1.5, -2.0, 3.25);
        assert_eq!(vec3_to_solver(&v), SolverVec3([1.5, -2.0, 3.25]));
        assert_eq!(vec3_from_solver(&vec3_to_solver(&v)), v);
    }

    #[test]
    fn identity_pose_maps_to_identity_transform_and_back() {
        let xform = pose_to_transform(&Pose::identity());
        assert_transform_eq(&xform, &SolverTransform::identity());
        let back = transform_to_pose(&xform);
        assert_rotation_eq(&back.rotation, &UnitQuaternion::identity());
        assert_abs_diff_eq!(back.translation.vector, Vector3::zeros(), epsilon = EPS);
    }

    #[test]
    fn body_fixed_sequence_rotates_about_the_new_axes() {
        // 90 deg about X, then 90 deg about the *new* Y.
        let angles = Vector3::new(FRAC_PI_2, FRAC_PI_2, 0.0);
        let xform = transform_from_components(&[0.0, 0.0, 0.0, angles.x, angles.y, angles.z]);

        // Body Z ends up along world +X. A space-fixed X-then-Y would leave it along -Y.
        let body_z = xform.transform_point(&SolverVec3([0.0, 0.0, 1.0]));
        assert_abs_diff_eq!(body_z.0[0], 1.0, epsilon = EPS);
        assert_abs_diff_eq!(body_z.0[1], 0.0, epsilon = EPS);
        assert_abs_diff_eq!(body_z.0[2], 0.0, epsilon = EPS);

        // Body X ends up along world +Y.
        let body_x = xform.transform_point(&SolverVec3([1.0, 0.0, 0.0]));
        assert_abs_diff_eq!(body_x.0[1], 1.0, epsilon = EPS);
    }

    #[test]
    fn composite_rotation_survives_the_round_trip() {
        let original = [0.5, -1.0, 2.0, FRAC_PI_2, FRAC_PI_2, 0.0];
        let xform = transform_from_components(&original);
        let components = transform_components(&xform);
        let again = transform_from_components(&components);
        assert_transform_eq(&xform, &again);

        let expected = rotation_from_body_xyz(&Vector3::new(FRAC_PI_2, FRAC_PI_2, 0.0));
        assert_rotation_eq(&transform_to_pose(&again).rotation, &expected);
    }

    #[test]
    fn body_xyz_angles_round_trip_away_from_gimbal_lock() {
        for angles in [
            Vector3::new(0.3, -0.2, 1.1),
            Vector3::new(-2.5, 1.2, -3.0),
            Vector3::new(PI - 0.01, 0.0, 0.4),
        ] {
            let q = rotation_from_body_xyz(&angles);
            assert_abs_diff_eq!(body_xyz_from_rotation(&q), angles, epsilon = 1e-9);
        }
    }

    #[test]
    fn gimbal_lock_negative_pitch_reconstructs() {
        let q = rotation_from_body_xyz(&Vector3::new(0.4, -FRAC_PI_2, 0.3));
        let back = rotation_from_body_xyz(&body_xyz_from_rotation(&q));
        assert_rotation_eq(&back, &q);
    }

    #[test]
    fn transform_compose_and_inverse_cancel() {
        let a = transform_from_components(&[1.0, 2.0, 3.0, 0.1, 0.2, 0.3]);
        let id = a.compose(&a.inverse());
        assert_transform_eq(&id, &SolverTransform::identity());
    }

    #[test]
    fn transform_algebra_agrees_with_native_poses() {
        let a = pose_from_components(&[1.0, -2.0, 0.5, 0.3, -0.7, 1.9]);
        let b = pose_from_components(&[-0.4, 3.0, 2.0, 2.1, 0.4, -0.2]);
        let (xa, xb) = (pose_to_transform(&a), pose_to_transform(&b));

        assert_transform_eq(&xa.compose(&xb), &pose_to_transform(&(a * b)));
        assert_transform_eq(&xa.inverse(), &pose_to_transform(&a.inverse()));

        let p = nalgebra::Point3::new(0.25, -1.5, 4.0);
        let moved = xa.transform_point(&SolverVec3([p.x, p.y, p.z]));
        assert_abs_diff_eq!(vec3_from_solver(&moved), (a * p).coords, epsilon = EPS);
    }

    #[test]
    fn element_without_pose_reads_as_identity() {
        let link = Element::new("link");
        assert_transform_eq(&element_pose(&link), &SolverTransform::identity());
    }

    #[test]
    fn element_uses_only_the_first_pose() {
        let link = Element::new("link")
            .with_child(Element::new("pose").with_text("1 2 3 0 0 0"))
            .with_child(Element::new("pose").with_text("9 9 9 0 0 0"));
        let xform = element_pose(&link);
        assert_eq!(xform.translation, SolverVec3([1.0, 2.0, 3.0]));
    }

    #[test]
    fn malformed_pose_text_is_lenient() {
        assert!(parse_components("1 2 3").is_none());
        assert!(parse_components("1 2 3 4 5 x").is_none());
        let link = Element::new("link").with_child(Element::new("pose").with_text("1 2"));
        assert_transform_eq(&element_pose(&link), &SolverTransform::identity());
    }
}

// simkin_core/src/pose_state.rs

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use std::ops::{Add, Sub};

use crate::convert::{body_xyz_from_rotation, rotation_from_body_xyz};

/// A six-component rigid state: a translation plus a rotation.
///
/// The same container carries a pose, a velocity, an acceleration or a wrench.
/// For the three rate-like roles the rotation slot holds the angular part
/// (angular rate, angular acceleration or torque) packed as body-fixed X-Y-Z
/// angles. Use [`PoseState::from_linear_angular`] / [`PoseState::angular`] to
/// pack and unpack it; the link snapshot exposes each role under its own
/// accessor so callers never have to remember which is which.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseState {
    /// Position, linear velocity, linear acceleration or force.
    pub translation: Vector3<f64>,
    /// Orientation, or the packed angular component for rate-like roles.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for PoseState {
    fn default() -> Self {
        Self::identity()
    }
}

impl PoseState {
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The additive identity: zero translation, identity rotation.
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        Self {
            translation: iso.translation.vector,
            rotation: iso.rotation,
        }
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.translation), self.rotation)
    }

    /// Packs a linear 3-vector and an angular 3-vector into one state.
    /// The angular part is stored as a body-fixed X-Y-Z rotation, so each
    /// component must stay inside (-pi, pi) with the Y component inside
    /// (-pi/2, pi/2) to unpack unchanged.
    pub fn from_linear_angular(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self {
            translation: linear,
            rotation: rotation_from_body_xyz(&angular),
        }
    }

    /// Builds a state from `[x, y, z, a, b, c]`, angles in body-fixed X-Y-Z order.
    pub fn from_components(c: [f64; 6]) -> Self {
        Self::from_linear_angular(Vector3::new(c[0], c[1], c[2]), Vector3::new(c[3], c[4], c[5]))
    }

    /// The translation slot.
    pub fn linear(&self) -> Vector3<f64> {
        self.translation
    }

    /// The rotation slot unpacked to body-fixed X-Y-Z angles.
    pub fn angular(&self) -> Vector3<f64> {
        body_xyz_from_rotation(&self.rotation)
    }

    /// `[x, y, z, a, b, c]`, the inverse of [`PoseState::from_components`].
    pub fn components(&self) -> [f64; 6] {
        let a = self.angular();
        [
            self.translation.x,
            self.translation.y,
            self.translation.z,
            a.x,
            a.y,
            a.z,
        ]
    }

    /// Exact comparison against the additive identity. No tolerance is applied.
    pub fn is_identity(&self) -> bool {
        self.translation == Vector3::zeros()
            && *self.rotation.quaternion() == Quaternion::identity()
    }
}

impl Add for PoseState {
    type Output = PoseState;

    /// Translations add; rotations compose as `self.rotation * rhs.rotation`.
    fn add(self, rhs: PoseState) -> PoseState {
        PoseState {
            translation: self.translation + rhs.translation,
            rotation: self.rotation * rhs.rotation,
        }
    }
}

impl Sub for PoseState {
    type Output = PoseState;

    /// Translations subtract; the rotation is the one taking `rhs` onto `self`,
    /// so that `(a - b) + b == a`.
    fn sub(self, rhs: PoseState) -> PoseState {
        PoseState {
            translation: self.translation - rhs.translation,
            rotation: self.rotation * rhs.rotation.inverse(),
        }
    }
}

// simkin_core/src/compat.rs

//! Flat-array accessors kept for callers written against the old state API.
//!
//! Everything here is a view over [`PoseState`]; nothing in the crate stores
//! a [`LegacyPose`].

use nalgebra::Vector3;

use crate::pose_state::PoseState;
use crate::state::LinkStateSnapshot;

/// Position plus body-fixed X-Y-Z angles as plain arrays.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LegacyPose {
    pub pos: [f64; 3],
    pub rot: [f64; 3],
}

impl From<PoseState> for LegacyPose {
    fn from(state: PoseState) -> Self {
        let c = state.components();
        Self {
            pos: [c[0], c[1], c[2]],
            rot: [c[3], c[4], c[5]],
        }
    }
}

impl From<LegacyPose> for PoseState {
    fn from(legacy: LegacyPose) -> Self {
        PoseState::from_linear_angular(Vector3::from(legacy.pos), Vector3::from(legacy.rot))
    }
}

/// Which of the four states a legacy accessor addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateRole {
    Pose,
    Velocity,
    Acceleration,
    Wrench,
}

impl LinkStateSnapshot {
    #[deprecated(note = "use `pose()`")]
    pub fn legacy_pose(&self) -> LegacyPose {
        (*self.pose()).into()
    }

    #[deprecated(note = "use `velocity()`")]
    pub fn legacy_velocity(&self) -> LegacyPose {
        (*self.velocity()).into()
    }

    #[deprecated(note = "use `acceleration()`")]
    pub fn legacy_acceleration(&self) -> LegacyPose {
        (*self.acceleration()).into()
    }

    #[deprecated(note = "use `wrench()`")]
    pub fn legacy_wrench(&self) -> LegacyPose {
        (*self.wrench()).into()
    }

    /// Overwrites one state in place.
    #[deprecated(note = "build a new snapshot or combine with `+` / `-`")]
    pub fn set_legacy(&mut self, role: StateRole, value: LegacyPose) {
        let [pose, velocity, acceleration, wrench] = self.fields_mut();
        let target = match role {
            StateRole::Pose => pose,
            StateRole::Velocity => velocity,
            StateRole::Acceleration => acceleration,
            StateRole::Wrench => wrench,
        };
        *target = value.into();
    }
}

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn legacy_views_match_the_canonical_state() {
        let s = LinkStateSnapshot::from_xml_str(
            "<link name='l'><pose>1 2 3 0.1 0.2 0.3</pose></link>",
        )
        .unwrap();
        let legacy = s.legacy_pose();
        assert_eq!(legacy.pos, [1.0, 2.0, 3.0]);
        for (got, want) in legacy.rot.iter().zip([0.1, 0.2, 0.3]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-12);
        }
        assert_eq!(s.legacy_velocity(), LegacyPose::default());
    }

    #[test]
    fn legacy_setter_touches_only_its_role() {
        let mut s = LinkStateSnapshot::new("l");
        s.set_legacy(
            StateRole::Wrench,
            LegacyPose {
                pos: [5.0, 0.0, 0.0],
                rot: [0.0, 0.0, 0.25],
            },
        );
        assert!(!s.is_zero());
        assert!(s.pose().is_identity());
        assert_eq!(s.wrench().linear(), Vector3::new(5.0, 0.0, 0.0));
        assert_abs_diff_eq!(s.legacy_wrench().rot[2], 0.25, epsilon = 1e-12);
        assert!(s.legacy_acceleration().pos.iter().all(|v| *v == 0.0));
    }
}

// simkin_core/src/state/collision_state.rs

use crate::convert::{parse_components, pose_components};
use crate::element::Element;
use crate::pose_state::PoseState;
use crate::types::Pose;

/// What a live collision must expose to be sampled.
pub trait LiveCollision {
    fn name(&self) -> &str;
    /// Pose relative to the owning link.
    fn relative_pose(&self) -> Pose;
}

/// The state of one collision geometry: its name and link-relative pose.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollisionStateSnapshot {
    name: String,
    pose: PoseState,
}

impl CollisionStateSnapshot {
    pub fn new(name: impl Into<String>, pose: PoseState) -> Self {
        Self {
            name: name.into(),
            pose,
        }
    }

    pub fn sample(collision: &dyn LiveCollision) -> Self {
        Self::new(
            collision.name(),
            PoseState::from_isometry(&collision.relative_pose()),
        )
    }

    /// Reads `<collision name='..'><pose>..</pose></collision>`; a missing or
    /// unreadable pose becomes identity.
    pub fn from_element(element: &Element) -> Self {
        let pose = element
            .child_text("pose")
            .and_then(parse_components)
            .map(PoseState::from_components)
            .unwrap_or_default();
        Self::new(element.attribute("name").unwrap_or_default(), pose)
    }

    pub fn to_element(&self) -> Element {
        Element::new("collision")
            .with_attribute("name", self.name.as_str())
            .with_child(Element::new("pose").with_text(format_fixed(
                &pose_components(&self.pose.to_isometry()),
                5,
            )))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pose(&self) -> &PoseState {
        &self.pose
    }
}

/// Space-separated values at a fixed number of decimals.
pub(crate) fn format_fixed(values: &[f64], decimals: usize) -> String {
    values
        .iter()
        // `+ 0.0` folds negative zero so identity prints as "0.00000".
        .map(|v| format!("{:.decimals$}", v + 0.0))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Translation3, UnitQuaternion, Vector3};

    struct Probe;

    impl LiveCollision for Probe {
        fn name(&self) -> &str {
            "bumper"
        }

        fn relative_pose(&self) -> Pose {
            Pose::from_parts(
                Translation3::new(0.5, 0.0, 0.1),
                UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3),
            )
        }
    }

    #[test]
    fn sample_reads_name_and_pose() {
        let s = CollisionStateSnapshot::sample(&Probe);
        assert_eq!(s.name(), "bumper");
        assert_eq!(s.pose().translation, Vector3::new(0.5, 0.0, 0.1));
    }

    #[test]
    fn element_without_pose_is_identity() {
        let e = Element::new("collision").with_attribute("name", "c0");
        let s = CollisionStateSnapshot::from_element(&e);
        assert_eq!(s.name(), "c0");
        assert!(s.pose().is_identity());
    }

    #[test]
    fn element_form_uses_five_decimals() {
        let s = CollisionStateSnapshot::new(
            "c1",
            PoseState::from_components([1.0, 2.0, 3.0, 0.0, 0.0, 0.0]),
        );
        let e = s.to_element();
        assert_eq!(e.child_text("pose"), Some("1.00000 2.00000 3.00000 0.00000 0.00000 0.00000"));
    }

    #[test]
    fn fixed_formatting_rounds() {
        assert_eq!(format_fixed(&[0.123456, -1.0], 4), "0.1235 -1.0000");
    }
}

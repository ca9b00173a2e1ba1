// simkin_core/src/state/link_state.rs

use nalgebra::Vector3;
use std::fmt;
use std::ops::{Add, Sub};

use super::collision_state::{format_fixed, CollisionStateSnapshot, LiveCollision};
use super::stamp::StateStamp;
use crate::convert::parse_components;
use crate::element::{Element, ElementError};
use crate::error::StateError;
use crate::pose_state::PoseState;
use crate::types::{Pose, Seconds};

/// Decimals written for the pose in the textual form.
pub const POSE_DECIMALS: usize = 5;
/// Decimals written for the velocity in the textual form.
pub const VELOCITY_DECIMALS: usize = 4;

/// What a live link must expose to be sampled. All quantities are expressed
/// relative to the owning model's frame.
pub trait LiveLink {
    /// `false` if the link has been removed or was never attached to a model.
    fn is_valid(&self) -> bool {
        true
    }
    fn name(&self) -> &str;
    fn relative_pose(&self) -> Pose;
    fn relative_linear_vel(&self) -> Vector3<f64>;
    fn relative_angular_vel(&self) -> Vector3<f64>;
    fn relative_linear_accel(&self) -> Vector3<f64>;
    fn relative_angular_accel(&self) -> Vector3<f64>;
    fn relative_force(&self) -> Vector3<f64>;
    fn relative_torque(&self) -> Vector3<f64>;
    /// Child collisions in declaration order.
    fn collisions(&self) -> Vec<&dyn LiveCollision>;
}

// =========================================================================
// == Link State Snapshot ==
// =========================================================================

/// The full kinematic state of one link at one instant.
///
/// Geometric fields are only changed by assignment and the `+` / `-`
/// operators; the timestamp fields can be re-tagged independently.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinkStateSnapshot {
    name: String,
    stamp: StateStamp,
    pose: PoseState,
    velocity: PoseState,
    acceleration: PoseState,
    wrench: PoseState,
    collisions: Vec<CollisionStateSnapshot>,
}

impl LinkStateSnapshot {
    /// A zero state for `name` with no collisions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Captures the current state of a live link.
    pub fn sample(
        link: &dyn LiveLink,
        real_time: Seconds,
        sim_time: Seconds,
        iterations: u64,
    ) -> Result<Self, StateError> {
        if !link.is_valid() {
            return Err(StateError::InvalidArgument(format!(
                "link '{}' is not live",
                link.name()
            )));
        }

        Ok(Self {
            name: link.name().to_string(),
            stamp: StateStamp::now(real_time, sim_time, iterations),
            pose: PoseState::from_isometry(&link.relative_pose()),
            velocity: PoseState::from_linear_angular(
                link.relative_linear_vel(),
                link.relative_angular_vel(),
            ),
            acceleration: PoseState::from_linear_angular(
                link.relative_linear_accel(),
                link.relative_angular_accel(),
            ),
            wrench: PoseState::from_linear_angular(link.relative_force(), link.relative_torque()),
            collisions: link
                .collisions()
                .into_iter()
                .map(CollisionStateSnapshot::sample)
                .collect(),
        })
    }

    /// Rebuilds a snapshot from its element form. Missing `<pose>`,
    /// `<velocity>`, `<acceleration>` or `<wrench>` children read as identity.
    pub fn from_element(element: &Element) -> Self {
        let field = |tag: &str| {
            element
                .child_text(tag)
                .and_then(parse_components)
                .map(PoseState::from_components)
                .unwrap_or_default()
        };

        Self {
            name: element.attribute("name").unwrap_or_default().to_string(),
            stamp: StateStamp::default(),
            pose: field("pose"),
            velocity: field("velocity"),
            acceleration: field("acceleration"),
            wrench: field("wrench"),
            collisions: element
                .children_named("collision")
                .map(CollisionStateSnapshot::from_element)
                .collect(),
        }
    }

    pub fn from_xml_str(xml: &str) -> Result<Self, ElementError> {
        Ok(Self::from_element(&Element::from_xml_str(xml)?))
    }

    /// The element form: name, pose (5 decimals), velocity (4 decimals) and
    /// collisions. Acceleration and wrench are not written.
    pub fn to_element(&self) -> Element {
        let mut element = Element::new("link")
            .with_attribute("name", self.name.as_str())
            .with_child(
                Element::new("pose")
                    .with_text(format_fixed(&self.pose.components(), POSE_DECIMALS)),
            )
            .with_child(
                Element::new("velocity")
                    .with_text(format_fixed(&self.velocity.components(), VELOCITY_DECIMALS)),
            );
        for collision in &self.collisions {
            element.children.push(collision.to_element());
        }
        element
    }

    /// Writes the textual form to `out`.
    pub fn write_to(&self, out: &mut impl fmt::Write) -> fmt::Result {
        write!(out, "{}", self.to_element())
    }

    // --- Accessors ---

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stamp(&self) -> &StateStamp {
        &self.stamp
    }

    pub fn wall_time(&self) -> Seconds {
        self.stamp.wall_time
    }

    pub fn real_time(&self) -> Seconds {
        self.stamp.real_time
    }

    pub fn sim_time(&self) -> Seconds {
        self.stamp.sim_time
    }

    pub fn iterations(&self) -> u64 {
        self.stamp.iterations
    }

    /// Pose relative to the owning model.
    pub fn pose(&self) -> &PoseState {
        &self.pose
    }

    /// Linear velocity in the translation slot, angular rate packed in the rotation slot.
    ///
    /// The angular part round-trips as body-fixed X-Y-Z angles, not raw rates:
    /// a rate with a component past pi (or pi/2 about Y) reads back, and prints
    /// as `wx wy wz`, as a different triple for the same rotation.
    pub fn velocity(&self) -> &PoseState {
        &self.velocity
    }

    pub fn acceleration(&self) -> &PoseState {
        &self.acceleration
    }

    /// Force in the translation slot, torque packed in the rotation slot.
    pub fn wrench(&self) -> &PoseState {
        &self.wrench
    }

    pub fn collision_state_count(&self) -> usize {
        self.collisions.len()
    }

    pub fn collision_state_by_index(
        &self,
        index: usize,
    ) -> Result<&CollisionStateSnapshot, StateError> {
        self.collisions.get(index).ok_or(StateError::InvalidIndex {
            index,
            count: self.collisions.len(),
        })
    }

    /// First collision with this name, in declaration order.
    pub fn collision_state_by_name(
        &self,
        name: &str,
    ) -> Result<&CollisionStateSnapshot, StateError> {
        self.collisions
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| StateError::NotFound(name.to_string()))
    }

    pub fn collision_states(&self) -> &[CollisionStateSnapshot] {
        &self.collisions
    }

    /// True iff pose, velocity, acceleration and wrench are all exactly identity.
    pub fn is_zero(&self) -> bool {
        self.pose.is_identity()
            && self.velocity.is_identity()
            && self.acceleration.is_identity()
            && self.wrench.is_identity()
    }

    // --- Re-tagging ---

    pub fn set_wall_time(&mut self, time: Seconds) {
        self.stamp.wall_time = time;
    }

    pub fn set_real_time(&mut self, time: Seconds) {
        self.stamp.real_time = time;
    }

    pub fn set_sim_time(&mut self, time: Seconds) {
        self.stamp.sim_time = time;
    }

    pub fn set_iterations(&mut self, iterations: u64) {
        self.stamp.iterations = iterations;
    }

    /// Pointwise writes, reserved for the legacy accessors in `compat`.
    pub(crate) fn fields_mut(&mut self) -> [&mut PoseState; 4] {
        [
            &mut self.pose,
            &mut self.velocity,
            &mut self.acceleration,
            &mut self.wrench,
        ]
    }

    /// Field-wise combination. The result keeps `self`'s name, stamp and
    /// collision list; nothing from `rhs` other than the four states is used.
    fn combine(&self, rhs: &LinkStateSnapshot, op: impl Fn(PoseState, PoseState) -> PoseState) -> Self {
        Self {
            name: self.name.clone(),
            stamp: self.stamp,
            pose: op(self.pose, rhs.pose),
            velocity: op(self.velocity, rhs.velocity),
            acceleration: op(self.acceleration, rhs.acceleration),
            wrench: op(self.wrench, rhs.wrench),
            collisions: self.collisions.clone(),
        }
    }
}

impl fmt::Display for LinkStateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_to(f)
    }
}

impl Add for &LinkStateSnapshot {
    type Output = LinkStateSnapshot;

    fn add(self, rhs: &LinkStateSnapshot) -> LinkStateSnapshot {
        self.combine(rhs, |a, b| a + b)
    }
}

impl Sub for &LinkStateSnapshot {
    type Output = LinkStateSnapshot;

    fn sub(self, rhs: &LinkStateSnapshot) -> LinkStateSnapshot {
        self.combine(rhs, |a, b| a - b)
    }
}

impl Add for LinkStateSnapshot {
    type Output = LinkStateSnapshot;

    fn add(self, rhs: LinkStateSnapshot) -> LinkStateSnapshot {
        &self + &rhs
    }
}

impl Sub for LinkStateSnapshot {
    type Output = LinkStateSnapshot;

    fn sub(self, rhs: LinkStateSnapshot) -> LinkStateSnapshot {
        &self - &rhs
    }
}

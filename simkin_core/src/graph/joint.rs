// simkin_core/src/graph/joint.rs

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::TopologyError;

/// The joint types a scene may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JointKind {
    Revolute,
    Revolute2,
    Prismatic,
    Ball,
    Universal,
    Screw,
    Fixed,
    Free,
    Gearbox,
}

/// How a loop-closing joint is enforced once it is cut out of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// All six relative coordinates locked.
    Weld,
    /// Coincident points, free relative rotation.
    Ball,
    /// Coincident axes, rotation about the axis only.
    Hinge,
    /// Aligned frames, translation along the axis only.
    Slider,
    /// Coincident points, rotation about two perpendicular axes.
    Universal,
}

impl JointKind {
    pub const ALL: [JointKind; 9] = [
        JointKind::Revolute,
        JointKind::Revolute2,
        JointKind::Prismatic,
        JointKind::Ball,
        JointKind::Universal,
        JointKind::Screw,
        JointKind::Fixed,
        JointKind::Free,
        JointKind::Gearbox,
    ];

    /// The name the scene description uses for this joint.
    pub fn type_string(self) -> &'static str {
        match self {
            JointKind::Revolute => "revolute",
            JointKind::Revolute2 => "revolute2",
            JointKind::Prismatic => "prismatic",
            JointKind::Ball => "ball",
            JointKind::Universal => "universal",
            JointKind::Screw => "screw",
            JointKind::Fixed => "fixed",
            JointKind::Free => "free",
            JointKind::Gearbox => "gearbox",
        }
    }

    /// The solver mobilizer that realises this joint inside the tree.
    pub fn mobilizer_name(self) -> &'static str {
        match self {
            JointKind::Revolute | JointKind::Gearbox => "Pin",
            JointKind::Revolute2 => "Gimbal2",
            JointKind::Prismatic => "Slider",
            JointKind::Ball => "Ball",
            JointKind::Universal => "Universal",
            JointKind::Screw => "Screw",
            JointKind::Fixed => "Weld",
            JointKind::Free => "Free",
        }
    }

    /// Mobilities the joint adds when it is a tree edge.
    pub fn dofs(self) -> usize {
        match self {
            JointKind::Fixed => 0,
            JointKind::Revolute | JointKind::Prismatic | JointKind::Screw | JointKind::Gearbox => 1,
            JointKind::Revolute2 | JointKind::Universal => 2,
            JointKind::Ball => 3,
            JointKind::Free => 6,
        }
    }

    /// The constraint that replaces this joint when it closes a loop, if any.
    pub fn loop_constraint(self) -> Option<ConstraintKind> {
        match self {
            JointKind::Fixed => Some(ConstraintKind::Weld),
            JointKind::Ball => Some(ConstraintKind::Ball),
            JointKind::Revolute => Some(ConstraintKind::Hinge),
            JointKind::Prismatic => Some(ConstraintKind::Slider),
            JointKind::Universal => Some(ConstraintKind::Universal),
            JointKind::Revolute2 | JointKind::Screw | JointKind::Free | JointKind::Gearbox => None,
        }
    }
}

impl FromStr for JointKind {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "weld" {
            return Ok(JointKind::Fixed);
        }
        JointKind::ALL
            .into_iter()
            .find(|k| k.type_string() == s)
            .ok_or(TopologyError::UnknownJointType(s))
    }
}

impl fmt::Display for JointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_string())
    }
}

// simkin_core/src/prelude.rs

// --- Core Data Structures ---
pub use crate::pose_state::PoseState;
pub use crate::state::{
    CollisionStateSnapshot, LinkStateSnapshot, LiveCollision, LiveLink, StateStamp,
};
pub use crate::types::{Pose, Seconds, WORLD_NAME};

// --- Scene & Topology ---
pub use crate::element::{Element, ElementError};
pub use crate::graph::{
    BodyRef, ConstraintKind, JointKind, ModelTopology, MultibodyGraph, MultibodyGraphBuilder,
};
pub use crate::scene::{
    CollisionDescription, Geometry, JointDescription, LinkDescription, ModelDescription,
};

// --- Conversions ---
pub use crate::convert::{SolverQuaternion, SolverTransform, SolverVec3};

// --- Errors ---
pub use crate::error::{StateError, TopologyError};

// --- Numerics ---
pub use crate::utils::integrators::{Integrator, IntegratorKind};

// simkin_sim/src/prelude.rs

// Re-export the entire simkin_core prelude so pure types like `PoseState`,
// `LinkStateSnapshot` and `MultibodyGraphBuilder` come along.
pub use simkin_core::prelude::*;

// Simulation-specific types.
pub use crate::config::{PhysicsConfig, RunConfig, ScenarioConfig};
pub use crate::engine::entities::{CollisionId, JointId, LinkId, ModelId, ShapeId};
pub use crate::engine::params::ParamValue;
pub use crate::engine::solver::{DiscreteForces, RigidTreeSolver, Solver};
pub use crate::engine::system::{BodyIndex, MultibodySystem};
pub use crate::engine::{EnginePhase, PhysicsEngine};
pub use crate::error::EngineError;
pub use crate::prng::SimulationRng;

// simkin_core/src/graph/mod.rs

pub mod builder;
pub mod joint;

pub use builder::{
    BodyRef, GroundWeld, LoopConstraint, Mobilizer, ModelTopology, MultibodyGraph,
    MultibodyGraphBuilder, StaticAttachment,
};
pub use joint::{ConstraintKind, JointKind};

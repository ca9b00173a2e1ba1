// simkin_core/src/error.rs

use thiserror::Error;

/// Errors raised while sampling or querying link / collision state records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The live entity handed to `sample` is not usable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A collision index past the end of the collision list.
    #[error("collision index {index} out of range (count {count})")]
    InvalidIndex { index: usize, count: usize },

    /// No collision with the requested name.
    #[error("collision '{0}' not found")]
    NotFound(String),
}

/// Errors raised when a model's joint graph cannot be reduced to a
/// spanning tree plus constraints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("joint '{joint}' references unknown link '{link}'")]
    UnknownLink { joint: String, link: String },

    #[error("joint '{0}' connects a link to itself")]
    SelfLoop(String),

    #[error("joint '{joint}' of type '{kind}' closes a loop but has no constraint equivalent")]
    UnsupportedLoopJoint { joint: String, kind: String },

    #[error("link '{0}' is not connected to ground and floating bases are disabled")]
    Disconnected(String),

    #[error("unknown joint type '{0}'")]
    UnknownJointType(String),

    #[error("link name '{0}' declared more than once")]
    DuplicateLink(String),
}

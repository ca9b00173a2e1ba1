// simkin_core/src/state/mod.rs

//! Immutable per-instant state records for links and their collisions.

pub mod collision_state;
pub mod link_state;
pub mod stamp;

pub use collision_state::{CollisionStateSnapshot, LiveCollision};
pub use link_state::{LinkStateSnapshot, LiveLink};
pub use stamp::StateStamp;

// simkin_core/src/types.rs

use nalgebra::{Isometry3, Vector3};

// --- Core Type Aliases ---
/// A rigid pose in the simulator's native representation.
pub type Pose = Isometry3<f64>;
/// Timestamps are carried as seconds.
pub type Seconds = f64;

/// The name the scene description uses for the world / ground frame.
pub const WORLD_NAME: &str = "world";

/// Standard gravity pointing down the world Z axis.
pub fn default_gravity() -> Vector3<f64> {
    Vector3::new(0.0, 0.0, -9.8)
}

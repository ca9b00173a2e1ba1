// simkin_sim/src/config/structs.rs

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use simkin_core::types::default_gravity;
use simkin_core::utils::integrators::IntegratorKind;
use std::path::PathBuf;

use super::serde_helpers::vec3_from_array;
use crate::error::EngineError;

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// # ScenarioConfig
/// The root of the data parsed from a `scenario.toml` file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)] // Fail if the TOML has fields not in our struct
pub struct ScenarioConfig {
    #[serde(default)] // Use default if the [physics] section is missing
    pub physics: PhysicsConfig,

    #[serde(default)]
    pub run: RunConfig,
}

// =========================================================================
// == Configuration Sub-Structs ==
// =========================================================================

/// Global engine parameters, applied by `PhysicsEngine::load`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct PhysicsConfig {
    /// Global gravity vector in m/s^2.
    #[serde(with = "vec3_from_array")]
    pub gravity: Vector3<f64>,
    /// Optional seed for the pseudo-random number generator for determinism.
    pub seed: Option<u64>,
    /// Fixed step taken by every `update_physics` call, in seconds.
    pub max_step_size: f64,
    /// Smallest step the integrator may take.
    pub min_step_size: f64,
    /// Integrator error tolerance.
    pub accuracy: f64,
    /// Velocity below which contacts are treated as resting.
    pub max_transient_velocity: f64,
    pub integrator: IntegratorKind,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: default_gravity(),
            seed: None,
            max_step_size: 1e-3,
            min_step_size: 1e-4,
            accuracy: 1e-3,
            max_transient_velocity: 0.01,
            integrator: IntegratorKind::default(),
        }
    }
}

impl PhysicsConfig {
    /// Checks the values the stepper divides by or integrates with.
    pub fn validate(&self) -> Result<(), EngineError> {
        let positive = [
            ("max_step_size", self.max_step_size),
            ("min_step_size", self.min_step_size),
            ("accuracy", self.accuracy),
        ];
        for (key, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EngineError::InvalidParam {
                    key,
                    requirement: "positive and finite",
                    value: value.to_string(),
                });
            }
        }
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(EngineError::InvalidParam {
                key: "gravity",
                requirement: "finite",
                value: format!("{:?}", self.gravity.as_slice()),
            });
        }
        Ok(())
    }
}

/// What the `simkin` binary runs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct RunConfig {
    /// A model file, or a directory scanned for `*.sdf` / `*.xml` files.
    pub models: PathBuf,
    /// Number of `update_physics` calls.
    pub steps: u64,
    /// Print link states every this many steps.
    pub record_interval: u64,
    /// Amplitude of the uniform noise added to floating-base velocities.
    pub velocity_jitter: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            models: "assets/models".into(),
            steps: 1000,
            record_interval: 250,
            velocity_jitter: 0.0,
        }
    }
}

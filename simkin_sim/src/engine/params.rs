// simkin_sim/src/engine/params.rs

//! String-keyed access to the engine parameters.

use nalgebra::Vector3;
use simkin_core::utils::integrators::IntegratorKind;
use std::fmt;

use crate::config::PhysicsConfig;

/// The keys `param` / `set_param` understand.
pub const PARAM_KEYS: [&str; 7] = [
    "gravity",
    "seed",
    "max_step_size",
    "min_step_size",
    "accuracy",
    "max_transient_velocity",
    "integrator",
];

/// A parameter value of whichever type its key expects.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Float(f64),
    Vector(Vector3<f64>),
    Unsigned(u64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Vector(v) => write!(f, "{} {} {}", v.x, v.y, v.z),
            ParamValue::Unsigned(v) => write!(f, "{v}"),
            ParamValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<Vector3<f64>> for ParamValue {
    fn from(v: Vector3<f64>) -> Self {
        ParamValue::Vector(v)
    }
}

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        ParamValue::Unsigned(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl PhysicsConfig {
    /// The current value for `key`, or `None` for an unknown key or an unset seed.
    pub fn param(&self, key: &str) -> Option<ParamValue> {
        Some(match key {
            "gravity" => self.gravity.into(),
            "seed" => self.seed?.into(),
            "max_step_size" => self.max_step_size.into(),
            "min_step_size" => self.min_step_size.into(),
            "accuracy" => self.accuracy.into(),
            "max_transient_velocity" => self.max_transient_velocity.into(),
            "integrator" => ParamValue::Text(
                match self.integrator {
                    IntegratorKind::Euler => "euler",
                    IntegratorKind::Rk2 => "rk2",
                    IntegratorKind::Rk4 => "rk4",
                }
                .to_string(),
            ),
            _ => return None,
        })
    }

    /// Writes `value` under `key`. Returns `false`, leaving the config
    /// unchanged, for an unknown key, a value of the wrong type or a value
    /// [`PhysicsConfig::validate`] rejects.
    pub fn set_param(&mut self, key: &str, value: &ParamValue) -> bool {
        let mut next = self.clone();
        match (key, value) {
            ("gravity", ParamValue::Vector(v)) => next.gravity = *v,
            ("seed", ParamValue::Unsigned(v)) => next.seed = Some(*v),
            ("max_step_size", ParamValue::Float(v)) => next.max_step_size = *v,
            ("min_step_size", ParamValue::Float(v)) => next.min_step_size = *v,
            ("accuracy", ParamValue::Float(v)) => next.accuracy = *v,
            ("max_transient_velocity", ParamValue::Float(v)) => next.max_transient_velocity = *v,
            ("integrator", ParamValue::Text(name)) => match name.parse() {
                Ok(kind) => next.integrator = kind,
                Err(_) => return false,
            },
            _ => return false,
        }
        if next.validate().is_err() {
            return false;
        }
        *self = next;
        true
    }
}

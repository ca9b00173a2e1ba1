// simkin_sim/src/error.rs

use simkin_core::element::ElementError;
use simkin_core::error::TopologyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// The model's joint graph could not be reduced; only this model is skipped.
    #[error("model '{model}' could not be built: {source}")]
    Topology {
        model: String,
        #[source]
        source: TopologyError,
    },

    #[error("no {kind} with id {id}")]
    UnknownEntity { kind: &'static str, id: usize },

    #[error("unknown shape type '{0}'")]
    UnknownShapeType(String),

    #[error("physics parameter '{key}' must be {requirement}, got {value}")]
    InvalidParam {
        key: &'static str,
        requirement: &'static str,
        value: String,
    },

    /// A moving link needs positive mass; only this model is skipped.
    #[error("link '{link}' of model '{model}' has non-positive mass {mass}")]
    InvalidMass {
        model: String,
        link: String,
        mass: f64,
    },

    #[error("scene file error: {0}")]
    Element(#[from] ElementError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for EngineError {
    fn from(e: figment::Error) -> Self {
        EngineError::Config(Box::new(e))
    }
}

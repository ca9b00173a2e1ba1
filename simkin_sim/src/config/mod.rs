// simkin_sim/src/config/mod.rs

//! Loading scenario configuration and locating model files on disk.

pub mod serde_helpers;
pub mod structs;

use figment::{
    providers::{Format, Toml},
    Figment,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::EngineError;
pub use structs::{PhysicsConfig, RunConfig, ScenarioConfig};

/// Loads a scenario file. A missing file yields the defaults.
pub fn load_scenario(path: &Path) -> Result<ScenarioConfig, EngineError> {
    if !path.exists() {
        warn!("Scenario file not found at {:?}; using defaults.", path);
    } else {
        info!("Loading scenario from: {:?}", path);
    }
    let scenario: ScenarioConfig = Figment::new().merge(Toml::file(path)).extract()?;
    scenario.physics.validate()?;
    Ok(scenario)
}

/// Parses scenario TOML held in memory.
pub fn scenario_from_str(toml: &str) -> Result<ScenarioConfig, EngineError> {
    let scenario: ScenarioConfig = Figment::new().merge(Toml::string(toml)).extract()?;
    scenario.physics.validate()?;
    Ok(scenario)
}

/// The model files at `path`: the file itself, or every `*.sdf` / `*.xml`
/// below a directory, sorted so load order is stable.
pub fn collect_model_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    if !path.exists() {
        warn!("Model path {:?} does not exist; no models will be loaded.", path);
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| {
            !e.file_type().is_dir()
                && e
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == "sdf" || ext == "xml")
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

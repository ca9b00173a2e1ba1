// simkin_sim/src/cli.rs

use clap::Parser;
use std::path::PathBuf;

/// Simkin: steps rigid multibody models and prints their link states.
///
/// Anything given here overrides the matching `[run]` value of the scenario.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the scenario TOML file to run.
    #[arg(short, long, default_value = "assets/scenarios/falling_boxes.toml")]
    pub scenario: PathBuf,

    /// A model file, or a directory of `*.sdf` / `*.xml` model files.
    #[arg(short, long)]
    pub models: Option<PathBuf>,

    /// Number of physics steps to run.
    #[arg(long)]
    pub steps: Option<u64>,

    /// Print link states every this many steps.
    #[arg(long)]
    pub record_interval: Option<u64>,

    /// Amplitude of the random kick given to floating-base velocities.
    #[arg(long)]
    pub jitter: Option<f64>,

    /// Print the resolved scenario as TOML and exit.
    #[arg(long, default_value_t = false)]
    pub print_config: bool,
}

impl Cli {
    /// Writes the command-line overrides into a loaded scenario.
    pub fn apply_overrides(&self, scenario: &mut crate::config::ScenarioConfig) {
        if let Some(models) = &self.models {
            scenario.run.models = models.clone();
        }
        if let Some(steps) = self.steps {
            scenario.run.steps = steps;
        }
        if let Some(interval) = self.record_interval {
            scenario.run.record_interval = interval;
        }
        if let Some(jitter) = self.jitter {
            scenario.run.velocity_jitter = jitter;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioConfig;

    #[test]
    fn flags_override_the_scenario() {
        let cli = Cli::parse_from(["simkin", "--steps", "20", "--jitter", "0.2"]);
        let mut scenario = ScenarioConfig::default();
        cli.apply_overrides(&mut scenario);

        assert_eq!(scenario.run.steps, 20);
        assert_eq!(scenario.run.velocity_jitter, 0.2);
        assert_eq!(
            scenario.run.record_interval,
            ScenarioConfig::default().run.record_interval
        );
        assert_eq!(cli.scenario, PathBuf::from("assets/scenarios/falling_boxes.toml"));
    }
}

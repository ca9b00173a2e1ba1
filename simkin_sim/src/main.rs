// simkin_sim/src/main.rs

use clap::Parser;
use simkin_core::element::Element;
use simkin_core::state::LinkStateSnapshot;
use simkin_sim::cli::Cli;
use simkin_sim::config::{collect_model_files, load_scenario};
use simkin_sim::engine::entities::LinkId;
use simkin_sim::engine::PhysicsEngine;
use simkin_sim::error::EngineError;
use std::collections::HashMap;
use std::fs;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Default to info, but show debug messages from our own crates.
    // RUST_LOG overrides this.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,simkin_sim=debug,simkin_core=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), EngineError> {
    // --- 1. Load Configuration ---
    let mut scenario = load_scenario(&cli.scenario)?;
    cli.apply_overrides(&mut scenario);
    if cli.print_config {
        match toml::to_string_pretty(&scenario) {
            Ok(text) => println!("{text}"),
            Err(e) => error!("Could not render scenario: {e}"),
        }
        return Ok(());
    }

    // --- 2. Build the scene ---
    let mut engine = PhysicsEngine::new();
    for path in collect_model_files(&scenario.run.models) {
        let text = fs::read_to_string(&path)?;
        match Element::from_xml_str(&text) {
            Ok(root) => {
                let models = engine.load_world(&root);
                info!("Loaded {} model(s) from {:?}.", models.len(), path);
            }
            Err(e) => warn!("Skipping {:?}: {e}", path),
        }
    }
    engine.load(scenario.physics.clone())?;
    engine.init();
    engine.apply_velocity_jitter(scenario.run.velocity_jitter);
    engine.debug_print();

    // --- 3. Step and record ---
    let links: Vec<LinkId> = (0..engine.entities().links.len()).map(LinkId).collect();
    let mut previous: HashMap<LinkId, LinkStateSnapshot> = HashMap::new();
    let interval = scenario.run.record_interval.max(1);

    record(&engine, &links, &mut previous);
    for step in 1..=scenario.run.steps {
        engine.update_physics();
        if step % interval == 0 {
            engine.update_collision();
            record(&engine, &links, &mut previous);
        }
    }

    engine.debug_print();
    engine.fini();
    Ok(())
}

/// Prints every link's snapshot, followed by its change since the last record.
fn record(
    engine: &PhysicsEngine,
    links: &[LinkId],
    previous: &mut HashMap<LinkId, LinkStateSnapshot>,
) {
    for &link in links {
        let Ok(snapshot) = engine.sample_link(link) else {
            continue;
        };
        println!("{snapshot}");
        if let Some(last) = previous.get(&link) {
            let delta = &snapshot - last;
            if !delta.is_zero() {
                println!("  delta {}: pose {:.5?}", delta.name(), delta.pose().components());
            }
        }
        previous.insert(link, snapshot);
    }
}

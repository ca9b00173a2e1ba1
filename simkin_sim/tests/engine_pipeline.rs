// simkin_sim/tests/engine_pipeline.rs

use approx::assert_abs_diff_eq;
use simkin_sim::config::scenario_from_str;
use simkin_sim::prelude::*;

const SCENE: &str = r#"
<sdf>
  <model name="pendulum">
    <pose>0 0 2 0 0 0</pose>
    <link name="arm"><pose>0 0 -0.5 0 0 0</pose></link>
    <link name="bob">
      <pose>0 0 -1 0 0 0</pose>
      <collision name="weight"><geometry><sphere><radius>0.1</radius></sphere></geometry></collision>
    </link>
    <joint name="pivot" type="revolute">
      <pose>0 0 0.5 0 0 0</pose>
      <parent>world</parent><child>arm</child>
    </joint>
    <joint name="rod" type="fixed"><parent>arm</parent><child>bob</child></joint>
  </model>
  <model name="ball">
    <pose>0 3 1 0 0 0</pose>
    <link name="ball">
      <collision name="skin"><geometry><sphere><radius>0.2</radius></sphere></geometry></collision>
    </link>
  </model>
</sdf>"#;

#[test]
fn scene_steps_and_snapshots_survive_serialization() {
    let scenario = scenario_from_str(
        "[physics]\nseed = 5\nmax_step_size = 0.01\n[run]\nsteps = 50\n",
    )
    .unwrap();

    let mut engine = PhysicsEngine::new();
    let models = engine.load_world(&Element::from_xml_str(SCENE).unwrap());
    assert_eq!(models.len(), 2);
    engine.load(scenario.physics.clone()).unwrap();
    engine.init();
    assert_eq!(engine.system().unwrap().dofs(), 1 + 6);

    for _ in 0..scenario.run.steps {
        engine.update_physics();
    }
    engine.update_collision();

    let pendulum = engine.sample_model(models[0]);
    assert_eq!(pendulum.len(), 2);
    assert_abs_diff_eq!(pendulum[1].pose().linear().z, -1.0, epsilon = 1e-12);
    assert_eq!(pendulum[1].collision_state_by_name("weight").unwrap().name(), "weight");

    let ball = engine.sample_model(models[1]).remove(0);
    assert_abs_diff_eq!(ball.sim_time(), 0.5, epsilon = 1e-9);
    assert_abs_diff_eq!(ball.pose().linear().z, -0.5 * 9.8 * 0.25, epsilon = 1e-9);
    assert_eq!(ball.iterations(), 50);

    let text = ball.to_string();
    let parsed = LinkStateSnapshot::from_xml_str(&text).unwrap();
    assert_eq!(parsed.name(), "ball");
    assert_abs_diff_eq!(parsed.pose().linear().z, ball.pose().linear().z, epsilon = 1e-5);
    assert_abs_diff_eq!(parsed.velocity().linear().z, -4.9, epsilon = 1e-4);
    assert_eq!(parsed.collision_state_count(), 1);

    let still = &parsed - &parsed;
    assert!(still.is_zero());
}

#[test]
fn reset_then_replay_is_deterministic() {
    let mut engine = PhysicsEngine::new();
    let models = engine.load_world(&Element::from_xml_str(SCENE).unwrap());
    let mut config = PhysicsConfig::default();
    config.seed = Some(9);
    engine.load(config).unwrap();
    engine.init();
    engine.apply_velocity_jitter(0.3);

    let run = |engine: &mut PhysicsEngine| {
        for _ in 0..200 {
            engine.update_physics();
        }
        engine.sample_model(models[1]).remove(0)
    };
    let first = run(&mut engine);
    engine.reset();
    let second = run(&mut engine);

    assert_eq!(first.pose(), second.pose());
    assert_eq!(first.velocity(), second.velocity());
}

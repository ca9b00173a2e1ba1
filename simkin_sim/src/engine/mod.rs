// simkin_sim/src/engine/mod.rs

//! The physics engine adapter: owns the multibody system, drives its
//! lifecycle and creates the simulator-side entities that populate it.
//!
//! Lifecycle: `Unloaded -> Loaded -> Initialized -> Stepping <-> Reset -> Finalized`.
//! Stepping before `init` and any call after `fini` are programming errors
//! and panic.

pub mod entities;
pub mod params;
pub mod solver;
pub mod system;

use nalgebra::Vector3;
use rand::Rng;
use simkin_core::element::Element;
use simkin_core::error::StateError;
use simkin_core::graph::{JointKind, MultibodyGraphBuilder};
use simkin_core::scene::{Geometry, ModelDescription};
use simkin_core::state::{LinkStateSnapshot, LiveCollision, LiveLink};
use simkin_core::types::{Pose, Seconds};
use simkin_core::utils::integrators::Integrator;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::PhysicsConfig;
use crate::error::EngineError;
use crate::prng::SimulationRng;
use entities::{
    default_geometry, CollisionEntity, CollisionId, EntityStore, JointEntity, JointId, LinkEntity,
    LinkId, ModelEntity, ModelId, ShapeEntity, ShapeId,
};
use params::ParamValue;
use solver::{DiscreteForces, RigidTreeSolver, Solver};
use system::{BodyIndex, MultibodySystem, SystemBody};

/// What `engine_type` reports.
pub const ENGINE_TYPE: &str = "simkin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Unloaded,
    Loaded,
    Initialized,
    Stepping,
    Reset,
    Finalized,
}

// =========================================================================
// == Physics Engine ==
// =========================================================================

pub struct PhysicsEngine {
    phase: EnginePhase,
    config: PhysicsConfig,
    rng: SimulationRng,
    entities: EntityStore,
    builder: MultibodyGraphBuilder,
    system: Option<MultibodySystem>,
    bodies_by_link: HashMap<LinkId, BodyIndex>,
    forces: DiscreteForces,
    integrator: Box<dyn Integrator<f64>>,
    solver: Box<dyn Solver>,
    collision_poses: HashMap<CollisionId, Pose>,
    sim_time: Seconds,
    iterations: u64,
    started: Instant,
    physics_initialized: bool,
    physics_stepped: bool,
}

impl Default for PhysicsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsEngine {
    pub fn new() -> Self {
        Self::with_solver(Box::new(RigidTreeSolver))
    }

    pub fn with_solver(solver: Box<dyn Solver>) -> Self {
        let config = PhysicsConfig::default();
        Self {
            phase: EnginePhase::Unloaded,
            integrator: config.integrator.build(),
            rng: SimulationRng::default(),
            config,
            entities: EntityStore::default(),
            builder: MultibodyGraphBuilder::new(),
            system: None,
            bodies_by_link: HashMap::new(),
            forces: DiscreteForces::default(),
            solver,
            collision_poses: HashMap::new(),
            sim_time: 0.0,
            iterations: 0,
            started: Instant::now(),
            physics_initialized: false,
            physics_stepped: false,
        }
    }

    /// Replaces the graph builder used for every later model insertion.
    pub fn set_graph_builder(&mut self, builder: MultibodyGraphBuilder) {
        self.builder = builder;
    }

    // --- Lifecycle ---

    /// Takes the global parameters. The system itself is built by `init`.
    /// A config that fails validation is rejected and the current one kept.
    pub fn load(&mut self, config: PhysicsConfig) -> Result<(), EngineError> {
        self.assert_not_finalized("load");
        config.validate()?;
        self.rng = SimulationRng::from_optional_seed(config.seed);
        self.integrator = config.integrator.build();
        if let Some(system) = self.system.as_mut() {
            system.set_gravity(config.gravity);
        }
        info!(
            "Loaded physics: gravity {:?}, step {} s, integrator {}.",
            config.gravity.as_slice(),
            config.max_step_size,
            self.integrator.name()
        );
        self.config = config;
        if self.phase == EnginePhase::Unloaded {
            self.phase = EnginePhase::Loaded;
        }
        Ok(())
    }

    /// Builds the system from every model created so far. A model whose
    /// topology cannot be built is logged and skipped. Calling it again is a
    /// no-op.
    pub fn init(&mut self) {
        self.assert_not_finalized("init");
        assert!(
            self.phase != EnginePhase::Unloaded,
            "PhysicsEngine::init called before load"
        );
        if self.physics_initialized {
            debug!("Physics already initialized; init is a no-op.");
            return;
        }

        self.system = Some(MultibodySystem::new(self.config.gravity));
        for index in 0..self.entities.models.len() {
            if let Err(e) = self.insert_model(ModelId(index)) {
                error!("{e}. Skipping model.");
            }
        }

        self.physics_initialized = true;
        self.phase = EnginePhase::Initialized;
        self.started = Instant::now();
        self.refresh_collision_poses();
        info!(
            "Physics initialized with {} bodies.",
            self.system.as_ref().map_or(0, |s| s.bodies().len())
        );
    }

    /// Inserts a model created after `init` without disturbing existing
    /// body indices. Already-inserted models are left alone.
    pub fn init_model(&mut self, model: ModelId) -> Result<(), EngineError> {
        self.assert_initialized("init_model");
        self.insert_model(model)
    }

    /// Advances the system by one `max_step_size` step.
    pub fn update_physics(&mut self) {
        self.assert_initialized("update_physics");
        let dt = self.config.max_step_size;
        if let Some(system) = self.system.as_mut() {
            self.solver.advance(
                system,
                self.integrator.as_ref(),
                &self.forces,
                self.sim_time,
                dt,
            );
        }
        self.forces.clear();
        self.sim_time += dt;
        self.iterations += 1;
        self.physics_stepped = true;
        self.phase = EnginePhase::Stepping;
    }

    /// Recomputes the world pose of every collision in the system.
    pub fn update_collision(&mut self) {
        self.assert_initialized("update_collision");
        self.refresh_collision_poses();
    }

    /// Restores every body to its initial state. Topology is kept.
    pub fn reset(&mut self) {
        self.assert_initialized("reset");
        if let Some(system) = self.system.as_mut() {
            system.reset();
        }
        self.forces.clear();
        self.sim_time = 0.0;
        self.iterations = 0;
        self.started = Instant::now();
        self.refresh_collision_poses();
        self.phase = EnginePhase::Reset;
        info!("Physics reset to initial conditions.");
    }

    /// Releases the system. Every later call except drop panics.
    pub fn fini(&mut self) {
        self.assert_not_finalized("fini");
        self.system = None;
        self.bodies_by_link.clear();
        self.collision_poses.clear();
        self.forces.clear();
        self.physics_initialized = false;
        self.phase = EnginePhase::Finalized;
        info!("Physics finalized.");
    }

    // --- Factories ---

    pub fn create_model(&mut self, name: impl Into<String>, pose: Pose) -> ModelId {
        self.assert_not_finalized("create_model");
        self.entities.models.push(ModelEntity {
            name: name.into(),
            pose,
            is_static: false,
            links: Vec::new(),
            joints: Vec::new(),
            inserted: false,
        });
        ModelId(self.entities.models.len() - 1)
    }

    /// Adds a link to `model`. Takes effect at the model's next insertion.
    pub fn create_link(
        &mut self,
        model: ModelId,
        name: impl Into<String>,
        pose: Pose,
    ) -> Result<LinkId, EngineError> {
        self.assert_not_finalized("create_link");
        let id = LinkId(self.entities.links.len());
        let owner = self.model_entry(model)?;
        warn_if_inserted(owner, "link");
        owner.links.push(id);
        self.entities.links.push(LinkEntity {
            model,
            name: name.into(),
            pose,
            mass: 1.0,
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            collisions: Vec::new(),
        });
        Ok(id)
    }

    /// Adds a collision with a default-sized shape of `shape_type`.
    pub fn create_collision(
        &mut self,
        shape_type: &str,
        link: LinkId,
        name: impl Into<String>,
        pose: Pose,
    ) -> Result<CollisionId, EngineError> {
        self.assert_not_finalized("create_collision");
        let geometry = default_geometry(shape_type)
            .ok_or_else(|| EngineError::UnknownShapeType(shape_type.to_string()))?;
        let id = self.push_collision(link, name.into(), pose)?;
        self.push_shape(id, geometry);
        Ok(id)
    }

    /// Gives `collision` a fresh default shape of `shape_type`, replacing any
    /// previous one.
    pub fn create_shape(
        &mut self,
        shape_type: &str,
        collision: CollisionId,
    ) -> Result<ShapeId, EngineError> {
        self.assert_not_finalized("create_shape");
        let geometry = default_geometry(shape_type)
            .ok_or_else(|| EngineError::UnknownShapeType(shape_type.to_string()))?;
        if self.entities.collision(collision).is_none() {
            return Err(EngineError::UnknownEntity {
                kind: "collision",
                id: collision.0,
            });
        }
        Ok(self.push_shape(collision, geometry))
    }

    /// Adds a joint between two links of `model`, named by link name
    /// (`world` for ground).
    pub fn create_joint(
        &mut self,
        joint_type: &str,
        model: ModelId,
        name: impl Into<String>,
        parent: impl Into<String>,
        child: impl Into<String>,
    ) -> Result<JointId, EngineError> {
        self.assert_not_finalized("create_joint");
        let id = JointId(self.entities.joints.len());
        let owner = self.model_entry(model)?;
        let kind: JointKind = joint_type.parse().map_err(|source| EngineError::Topology {
            model: owner.name.clone(),
            source,
        })?;
        warn_if_inserted(owner, "joint");
        owner.joints.push(id);
        self.entities.joints.push(JointEntity {
            model,
            name: name.into(),
            kind,
            parent: parent.into(),
            child: child.into(),
            pose: Pose::identity(),
            axis: Vector3::z(),
        });
        Ok(id)
    }

    /// Creates a model and all its entities from a parsed description.
    /// Nothing is created if any collision has an unknown shape.
    pub fn add_model(&mut self, description: &ModelDescription) -> Result<ModelId, EngineError> {
        let unknown_shape = description
            .links
            .iter()
            .flat_map(|l| &l.collisions)
            .find_map(|c| match &c.geometry {
                Some(Geometry::Other(name)) => Some(name.clone()),
                _ => None,
            });
        if let Some(name) = unknown_shape {
            return Err(EngineError::UnknownShapeType(name));
        }

        let model = self.create_model(description.name.clone(), description.pose);
        self.entities.models[model.0].is_static = description.is_static;

        for link in &description.links {
            let id = self.create_link(model, link.name.clone(), link.pose)?;
            let entity = &mut self.entities.links[id.0];
            entity.mass = link.mass;
            entity.linear_velocity = link.linear_velocity;
            entity.angular_velocity = link.angular_velocity;

            for collision in &link.collisions {
                let cid = self.push_collision(id, collision.name.clone(), collision.pose)?;
                if let Some(geometry) = &collision.geometry {
                    self.push_shape(cid, geometry.clone());
                }
            }
        }
        for joint in &description.joints {
            let id = self.create_joint(
                joint.kind.type_string(),
                model,
                joint.name.clone(),
                joint.parent.clone(),
                joint.child.clone(),
            )?;
            let entity = &mut self.entities.joints[id.0];
            entity.pose = joint.pose;
            entity.axis = joint.axis;
        }

        debug!(
            "Created model '{}' ({} links, {} joints).",
            description.name,
            description.links.len(),
            description.joints.len()
        );
        Ok(model)
    }

    /// Reads a `<model>` element and creates it.
    pub fn load_model(&mut self, element: &Element) -> Result<ModelId, EngineError> {
        let description =
            ModelDescription::from_element(element).map_err(|source| EngineError::Topology {
                model: element.attribute("name").unwrap_or_default().to_string(),
                source,
            })?;
        self.add_model(&description)
    }

    /// Creates every `<model>` in a document: the root itself, or models
    /// nested in `<world>` / `<sdf>` elements. Bad models are logged and skipped.
    pub fn load_world(&mut self, root: &Element) -> Vec<ModelId> {
        let mut created = Vec::new();
        let mut pending = vec![root];
        while let Some(element) = pending.pop() {
            if element.name == "model" {
                match self.load_model(element) {
                    Ok(id) => created.push(id),
                    Err(e) => error!("{e}. Skipping model."),
                }
            } else {
                pending.extend(element.children.iter().rev());
            }
        }
        created
    }

    // --- Parameters ---

    /// Updates gravity in the config and, once built, in the live system.
    pub fn set_gravity(&mut self, gravity: Vector3<f64>) {
        self.assert_not_finalized("set_gravity");
        self.config.gravity = gravity;
        if let Some(system) = self.system.as_mut() {
            system.set_gravity(gravity);
        }
    }

    /// Reseeds the engine RNG.
    pub fn set_seed(&mut self, seed: u64) {
        self.config.seed = Some(seed);
        self.rng = SimulationRng::seeded(seed);
    }

    pub fn param(&self, key: &str) -> Option<ParamValue> {
        self.config.param(key)
    }

    /// Sets a parameter and applies it to the live engine. Returns `false`
    /// for an unknown key or an unusable value.
    pub fn set_param(&mut self, key: &str, value: &ParamValue) -> bool {
        if !self.config.set_param(key, value) {
            warn!("Rejected physics parameter '{key}' = {value}.");
            return false;
        }
        match key {
            "gravity" => self.set_gravity(self.config.gravity),
            "seed" => {
                if let Some(seed) = self.config.seed {
                    self.rng = SimulationRng::seeded(seed);
                }
            }
            "integrator" => self.integrator = self.config.integrator.build(),
            _ => {}
        }
        true
    }

    /// Adds uniform noise in `[-amplitude, amplitude]` to the linear velocity
    /// of every floating tree, drawn from the engine RNG. The perturbed
    /// velocity becomes the initial condition `reset` returns to.
    pub fn apply_velocity_jitter(&mut self, amplitude: f64) {
        self.assert_initialized("apply_velocity_jitter");
        if amplitude <= 0.0 {
            return;
        }
        let Some(system) = self.system.as_mut() else {
            return;
        };
        let roots = system.tree_roots();
        let mut kicks: HashMap<usize, Vector3<f64>> = HashMap::new();
        for (i, body) in system.bodies().iter().enumerate() {
            if body.is_floating_base() {
                let rng = &mut self.rng.0;
                let mut draw = || rng.gen_range(-amplitude..=amplitude);
                kicks.insert(i, Vector3::new(draw(), draw(), draw()));
            }
        }
        for (body, root) in system.bodies_mut().iter_mut().zip(roots) {
            if let Some(kick) = kicks.get(&root) {
                body.state.linear_velocity += kick;
                body.initial.linear_velocity += kick;
            }
        }
    }

    /// Queues a world-frame force and torque on a link for the next step.
    pub fn apply_link_wrench(
        &mut self,
        link: LinkId,
        force: Vector3<f64>,
        torque: Vector3<f64>,
    ) -> Result<(), EngineError> {
        self.assert_initialized("apply_link_wrench");
        let body = self
            .body_of(link)
            .ok_or(EngineError::UnknownEntity { kind: "link", id: link.0 })?;
        self.forces.add_body_wrench(body, force, torque);
        Ok(())
    }

    // --- Queries ---

    pub fn engine_type(&self) -> &'static str {
        ENGINE_TYPE
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn link_mut(&mut self, link: LinkId) -> Option<&mut LinkEntity> {
        self.entities.links.get_mut(link.0)
    }

    pub fn joint_mut(&mut self, joint: JointId) -> Option<&mut JointEntity> {
        self.entities.joints.get_mut(joint.0)
    }

    pub fn shape_mut(&mut self, shape: ShapeId) -> Option<&mut ShapeEntity> {
        self.entities.shapes.get_mut(shape.0)
    }

    pub fn set_model_static(&mut self, model: ModelId, is_static: bool) -> Result<(), EngineError> {
        self.model_entry(model)?.is_static = is_static;
        Ok(())
    }

    /// The solver system, once `init` has built it.
    pub fn system(&self) -> Option<&MultibodySystem> {
        self.system.as_ref()
    }

    pub fn discrete_forces(&self) -> &DiscreteForces {
        &self.forces
    }

    pub fn integrator(&self) -> &dyn Integrator<f64> {
        self.integrator.as_ref()
    }

    pub fn solver(&self) -> &dyn Solver {
        self.solver.as_ref()
    }

    pub fn rng_mut(&mut self) -> &mut SimulationRng {
        &mut self.rng
    }

    pub fn physics_initialized(&self) -> bool {
        self.physics_initialized
    }

    /// True once `update_physics` has run at least once in this engine's life.
    pub fn physics_stepped(&self) -> bool {
        self.physics_stepped
    }

    pub fn sim_time(&self) -> Seconds {
        self.sim_time
    }

    pub fn real_time(&self) -> Seconds {
        self.started.elapsed().as_secs_f64()
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn body_of(&self, link: LinkId) -> Option<BodyIndex> {
        self.bodies_by_link.get(&link).copied()
    }

    /// World pose of a collision as of the last `update_collision`.
    pub fn collision_world_pose(&self, collision: CollisionId) -> Option<Pose> {
        self.collision_poses.get(&collision).copied()
    }

    /// A live view of a link for sampling.
    pub fn link_view(&self, link: LinkId) -> EngineLink<'_> {
        EngineLink { engine: self, link }
    }

    pub fn sample_link(&self, link: LinkId) -> Result<LinkStateSnapshot, StateError> {
        LinkStateSnapshot::sample(
            &self.link_view(link),
            self.real_time(),
            self.sim_time,
            self.iterations,
        )
    }

    /// Snapshots of every link of `model` that is in the system, in link order.
    pub fn sample_model(&self, model: ModelId) -> Vec<LinkStateSnapshot> {
        self.entities
            .model(model)
            .map(|m| m.links.iter().filter_map(|&l| self.sample_link(l).ok()).collect())
            .unwrap_or_default()
    }

    /// Logs the engine configuration and the system layout.
    pub fn debug_print(&self) {
        info!(
            "{} engine: phase {:?}, t = {:.4} s, {} iterations, solver {}, integrator {}.",
            ENGINE_TYPE,
            self.phase,
            self.sim_time,
            self.iterations,
            self.solver.name(),
            self.integrator.name()
        );
        match toml::to_string(&self.config) {
            Ok(text) => debug!("Physics config:\n{text}"),
            Err(e) => warn!("Could not render physics config: {e}"),
        }
        match &self.system {
            Some(system) => system.log_summary(),
            None => info!("No system built."),
        }
    }

    // --- Internals ---

    fn insert_model(&mut self, id: ModelId) -> Result<(), EngineError> {
        let entity = self
            .entities
            .model(id)
            .ok_or(EngineError::UnknownEntity { kind: "model", id: id.0 })?;
        if entity.inserted {
            return Ok(());
        }
        let links = entity.links.clone();
        let description = self
            .entities
            .describe(id)
            .ok_or(EngineError::UnknownEntity { kind: "model", id: id.0 })?;
        if !description.is_static {
            if let Some(link) = description
                .links
                .iter()
                .find(|l| !(l.mass.is_finite() && l.mass > 0.0))
            {
                return Err(EngineError::InvalidMass {
                    model: description.name.clone(),
                    link: link.name.clone(),
                    mass: link.mass,
                });
            }
        }
        let topology = self
            .builder
            .build(&description)
            .map_err(|source| EngineError::Topology {
                model: description.name.clone(),
                source,
            })?;

        let Some(system) = self.system.as_mut() else {
            return Ok(());
        };
        let bodies = system.add_model(id, &links, &description, &topology);
        for body in bodies {
            if let Some(b) = system.body(body) {
                self.bodies_by_link.insert(b.link, body);
            }
        }
        self.entities.models[id.0].inserted = true;
        info!(
            "Inserted {} model '{}'.",
            if topology.is_static() { "static" } else { "dynamic" },
            description.name
        );
        Ok(())
    }

    fn push_collision(
        &mut self,
        link: LinkId,
        name: String,
        pose: Pose,
    ) -> Result<CollisionId, EngineError> {
        let id = CollisionId(self.entities.collisions.len());
        let owner = self
            .entities
            .links
            .get_mut(link.0)
            .ok_or(EngineError::UnknownEntity { kind: "link", id: link.0 })?;
        owner.collisions.push(id);
        self.entities.collisions.push(CollisionEntity {
            link,
            name,
            pose,
            shape: None,
        });
        Ok(id)
    }

    fn push_shape(&mut self, collision: CollisionId, geometry: Geometry) -> ShapeId {
        let id = ShapeId(self.entities.shapes.len());
        self.entities.shapes.push(ShapeEntity {
            collision,
            geometry,
        });
        if let Some(c) = self.entities.collisions.get_mut(collision.0) {
            c.shape = Some(id);
        }
        id
    }

    fn model_entry(&mut self, model: ModelId) -> Result<&mut ModelEntity, EngineError> {
        self.entities
            .models
            .get_mut(model.0)
            .ok_or(EngineError::UnknownEntity { kind: "model", id: model.0 })
    }

    fn refresh_collision_poses(&mut self) {
        self.collision_poses.clear();
        let Some(system) = self.system.as_ref() else {
            return;
        };
        for (i, collision) in self.entities.collisions.iter().enumerate() {
            let Some(body) = self
                .bodies_by_link
                .get(&collision.link)
                .and_then(|&b| system.body(b))
            else {
                continue;
            };
            self.collision_poses
                .insert(CollisionId(i), body.state.pose * collision.pose);
        }
    }

    fn assert_not_finalized(&self, operation: &str) {
        assert!(
            self.phase != EnginePhase::Finalized,
            "PhysicsEngine::{operation} called after fini"
        );
    }

    fn assert_initialized(&self, operation: &str) {
        self.assert_not_finalized(operation);
        assert!(
            self.physics_initialized,
            "PhysicsEngine::{operation} called before init"
        );
    }
}

fn warn_if_inserted(model: &ModelEntity, what: &str) {
    if model.inserted {
        warn!(
            "Adding a {what} to model '{}' after insertion; it is not part of the running system.",
            model.name
        );
    }
}

// =========================================================================
// == Live Link View ==
// =========================================================================

/// A link as the engine currently sees it, expressed in its model's frame.
pub struct EngineLink<'a> {
    engine: &'a PhysicsEngine,
    link: LinkId,
}

impl EngineLink<'_> {
    fn entity(&self) -> Option<&LinkEntity> {
        self.engine.entities.link(self.link)
    }

    fn body(&self) -> Option<&SystemBody> {
        let index = self.engine.body_of(self.link)?;
        self.engine.system.as_ref()?.body(index)
    }

    /// The owning model's frame in the world.
    fn model_frame(&self) -> Pose {
        self.entity()
            .and_then(|l| self.engine.entities.model(l.model))
            .map_or_else(Pose::identity, |m| m.pose)
    }

    /// A world-frame vector of the body, rotated into the model frame.
    fn in_model_frame(&self, pick: impl Fn(&SystemBody) -> Vector3<f64>) -> Vector3<f64> {
        self.body().map_or_else(Vector3::zeros, |b| {
            self.model_frame().rotation.inverse() * pick(b)
        })
    }
}

impl LiveLink for EngineLink<'_> {
    fn is_valid(&self) -> bool {
        self.entity().is_some() && self.body().is_some()
    }

    fn name(&self) -> &str {
        self.entity().map_or("", |l| l.name.as_str())
    }

    fn relative_pose(&self) -> Pose {
        self.body().map_or_else(Pose::identity, |b| {
            self.model_frame().inverse() * b.state.pose
        })
    }

    fn relative_linear_vel(&self) -> Vector3<f64> {
        self.in_model_frame(|b| b.state.linear_velocity)
    }

    fn relative_angular_vel(&self) -> Vector3<f64> {
        self.in_model_frame(|b| b.state.angular_velocity)
    }

    fn relative_linear_accel(&self) -> Vector3<f64> {
        self.in_model_frame(|b| b.state.linear_acceleration)
    }

    fn relative_angular_accel(&self) -> Vector3<f64> {
        self.in_model_frame(|b| b.state.angular_acceleration)
    }

    fn relative_force(&self) -> Vector3<f64> {
        self.in_model_frame(|b| b.state.force)
    }

    fn relative_torque(&self) -> Vector3<f64> {
        self.in_model_frame(|b| b.state.torque)
    }

    fn collisions(&self) -> Vec<&dyn LiveCollision> {
        self.entity()
            .map(|l| {
                l.collisions
                    .iter()
                    .filter_map(|&c| self.engine.entities.collision(c))
                    .map(|c| c as &dyn LiveCollision)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const WORLD: &str = "\
        <sdf>\
          <world name='default'>\
            <model name='ground'>\
              <static>true</static>\
              <link name='plane'>\
                <collision name='floor'><geometry><plane><normal>0 0 1</normal></plane></geometry></collision>\
              </link>\
            </model>\
            <model name='crate'>\
              <pose>0 0 5 0 0 0</pose>\
              <link name='body'>\
                <velocity>1 0 0 0 0 0</velocity>\
                <collision name='hull'><pose>0 0 0.1 0 0 0</pose><geometry><box><size>1 1 1</size></box></geometry></collision>\
              </link>\
            </model>\
            <model name='broken'>\
              <link name='a'/>\
              <joint name='j' type='revolute'><parent>a</parent><child>ghost</child></joint>\
            </model>\
          </world>\
        </sdf>";

    fn loaded_engine() -> (PhysicsEngine, Vec<ModelId>) {
        let mut engine = PhysicsEngine::new();
        let root = Element::from_xml_str(WORLD).unwrap();
        let models = engine.load_world(&root);
        let mut config = PhysicsConfig::default();
        config.seed = Some(7);
        config.max_step_size = 0.01;
        engine.load(config).unwrap();
        (engine, models)
    }

    #[test]
    fn lifecycle_walks_through_its_phases() {
        let (mut engine, models) = loaded_engine();
        assert_eq!(models.len(), 3);
        assert_eq!(engine.phase(), EnginePhase::Loaded);
        assert!(!engine.physics_initialized());

        engine.init();
        assert_eq!(engine.phase(), EnginePhase::Initialized);
        assert!(engine.physics_initialized());
        assert!(!engine.physics_stepped());

        engine.update_physics();
        assert_eq!(engine.phase(), EnginePhase::Stepping);
        assert!(engine.physics_stepped());
        assert_eq!(engine.iterations(), 1);

        engine.reset();
        assert_eq!(engine.phase(), EnginePhase::Reset);
        assert_eq!(engine.iterations(), 0);
        assert!(engine.physics_stepped());

        engine.fini();
        assert_eq!(engine.phase(), EnginePhase::Finalized);
        assert!(engine.system().is_none());
        assert_eq!(engine.engine_type(), "simkin");
    }

    #[test]
    #[should_panic(expected = "before init")]
    fn stepping_before_init_panics() {
        let (mut engine, _) = loaded_engine();
        engine.update_physics();
    }

    #[test]
    #[should_panic(expected = "after fini")]
    fn stepping_after_fini_panics() {
        let (mut engine, _) = loaded_engine();
        engine.init();
        engine.fini();
        engine.update_physics();
    }

    #[test]
    fn a_bad_model_is_skipped_and_init_is_idempotent() {
        let (mut engine, models) = loaded_engine();
        engine.init();
        let bodies = engine.system().map(|s| s.bodies().len());
        assert_eq!(bodies, Some(2));
        assert!(!engine.entities().model(models[2]).unwrap().inserted);

        engine.init();
        assert_eq!(engine.system().map(|s| s.bodies().len()), Some(2));
        assert!(matches!(
            engine.init_model(models[2]),
            Err(EngineError::Topology { .. })
        ));
    }

    #[test]
    fn init_model_appends_without_moving_existing_bodies() {
        let (mut engine, models) = loaded_engine();
        engine.init();
        let crate_body = engine.entities().model(models[1]).unwrap().links[0];
        let before = engine.body_of(crate_body);

        let late = engine.create_model("late", Pose::translation(3.0, 0.0, 1.0));
        let link = engine.create_link(late, "ball", Pose::identity()).unwrap();
        engine.create_collision("sphere", link, "skin", Pose::identity()).unwrap();
        engine.init_model(late).unwrap();
        engine.init_model(late).unwrap();

        assert_eq!(engine.body_of(crate_body), before);
        assert_eq!(engine.body_of(link), Some(BodyIndex(2)));
        assert_eq!(engine.system().map(|s| s.bodies().len()), Some(3));
    }

    #[test]
    fn static_models_are_welded_and_stay_put() {
        let (mut engine, models) = loaded_engine();
        engine.init();
        let plane = engine.entities().model(models[0]).unwrap().links[0];
        let body = engine.body_of(plane).unwrap();
        assert!(engine.system().unwrap().body(body).unwrap().is_welded());

        for _ in 0..10 {
            engine.update_physics();
        }
        let snapshot = engine.sample_link(plane).unwrap();
        assert!(snapshot.pose().is_identity());
        assert!(snapshot.velocity().is_identity());
    }

    #[test]
    fn free_bodies_fall_and_reset_restores_them() {
        let (mut engine, models) = loaded_engine();
        engine.init();
        let link = engine.entities().model(models[1]).unwrap().links[0];

        for _ in 0..100 {
            engine.update_physics();
        }
        let snapshot = engine.sample_link(link).unwrap();
        assert_abs_diff_eq!(engine.sim_time(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(snapshot.pose().linear().z, -4.9, epsilon = 1e-6);
        assert_abs_diff_eq!(snapshot.pose().linear().x, 1.0, epsilon = 1e-6);
        assert_eq!(snapshot.sim_time(), engine.sim_time());
        assert_eq!(snapshot.collision_state_count(), 1);

        engine.reset();
        let snapshot = engine.sample_link(link).unwrap();
        assert!(snapshot.pose().is_identity());
        assert_abs_diff_eq!(snapshot.velocity().linear().x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn collision_poses_follow_their_link() {
        let (mut engine, models) = loaded_engine();
        engine.init();
        let link = engine.entities().model(models[1]).unwrap().links[0];
        let hull = engine.entities().link(link).unwrap().collisions[0];
        assert_abs_diff_eq!(
            engine.collision_world_pose(hull).unwrap().translation.vector.z,
            5.1,
            epsilon = 1e-12
        );

        engine.update_physics();
        engine.update_collision();
        assert!(engine.collision_world_pose(hull).unwrap().translation.vector.z < 5.1);
    }

    #[test]
    fn gravity_and_params_reach_the_live_system() {
        let (mut engine, _) = loaded_engine();
        engine.init();
        engine.set_gravity(Vector3::new(0.0, 0.0, -1.62));
        assert_eq!(engine.system().unwrap().gravity().z, -1.62);

        assert!(engine.set_param("gravity", &Vector3::new(0.0, 0.0, -3.7).into()));
        assert_eq!(engine.system().unwrap().gravity().z, -3.7);
        assert!(engine.set_param("integrator", &"euler".into()));
        assert_eq!(engine.integrator().name(), "euler");
        assert!(!engine.set_param("gravity", &1.0_f64.into()));
        assert_eq!(engine.param("seed"), Some(ParamValue::Unsigned(7)));
    }

    #[test]
    fn jitter_is_reproducible_from_the_seed() {
        let jittered = |seed: u64| {
            let (mut engine, models) = loaded_engine();
            engine.set_seed(seed);
            engine.init();
            engine.apply_velocity_jitter(0.5);
            let link = engine.entities().model(models[1]).unwrap().links[0];
            let body = engine.body_of(link).unwrap();
            engine.system().unwrap().body(body).unwrap().state.linear_velocity
        };
        assert_eq!(jittered(11), jittered(11));
        assert_ne!(jittered(11), jittered(12));
    }

    #[test]
    fn massless_moving_links_skip_only_their_model() {
        let (mut engine, models) = loaded_engine();
        let hollow = engine.create_model("hollow", Pose::translation(0.0, 0.0, 2.0));
        let link = engine.create_link(hollow, "shell", Pose::identity()).unwrap();
        engine.link_mut(link).unwrap().mass = 0.0;
        engine.init();

        assert!(engine.body_of(link).is_none());
        assert!(matches!(
            engine.init_model(hollow),
            Err(EngineError::InvalidMass { mass, .. }) if mass == 0.0
        ));

        engine.update_physics();
        let crate_link = engine.entities().model(models[1]).unwrap().links[0];
        let snapshot = engine.sample_link(crate_link).unwrap();
        assert!(snapshot.pose().components().iter().all(|c| c.is_finite()));
    }

    #[test]
    fn load_rejects_a_zero_step_and_keeps_the_previous_config() {
        let (mut engine, _) = loaded_engine();
        let mut bad = PhysicsConfig::default();
        bad.max_step_size = 0.0;
        assert!(matches!(
            engine.load(bad),
            Err(EngineError::InvalidParam { key: "max_step_size", .. })
        ));
        assert_eq!(engine.config().max_step_size, 0.01);

        engine.init();
        engine.update_physics();
        let accel = engine.system().unwrap().bodies()[1].state.linear_acceleration;
        assert!(accel.iter().all(|a| a.is_finite()));
        assert!(!engine.set_param("max_step_size", &0.0_f64.into()));
    }

    #[test]
    fn factories_reject_unknown_types_and_ids() {
        let mut engine = PhysicsEngine::new();
        let model = engine.create_model("m", Pose::identity());
        let link = engine.create_link(model, "l", Pose::identity()).unwrap();

        assert!(matches!(
            engine.create_collision("teapot", link, "c", Pose::identity()),
            Err(EngineError::UnknownShapeType(_))
        ));
        assert!(engine.entities().collisions.is_empty());
        assert!(matches!(
            engine.create_link(ModelId(9), "x", Pose::identity()),
            Err(EngineError::UnknownEntity { kind: "model", .. })
        ));
        assert!(matches!(
            engine.create_joint("hinge", model, "j", "world", "l"),
            Err(EngineError::Topology { .. })
        ));

        let collision = engine.create_collision("box", link, "c", Pose::identity()).unwrap();
        let shape = engine.create_shape("sphere", collision).unwrap();
        assert_eq!(engine.entities().collision(collision).unwrap().shape, Some(shape));
        assert_eq!(
            engine.entities().shape(shape).unwrap().geometry.type_string(),
            "sphere"
        );
    }

    #[test]
    fn queued_wrenches_are_consumed_by_one_step() {
        let (mut engine, models) = loaded_engine();
        engine.init();
        let link = engine.entities().model(models[1]).unwrap().links[0];
        engine
            .apply_link_wrench(link, Vector3::new(0.0, 0.0, 9.8), Vector3::zeros())
            .unwrap();
        assert!(!engine.discrete_forces().is_empty());

        engine.update_physics();
        assert!(engine.discrete_forces().is_empty());
        let snapshot = engine.sample_link(link).unwrap();
        assert_abs_diff_eq!(snapshot.wrench().linear().z, 9.8, epsilon = 1e-12);
    }
}

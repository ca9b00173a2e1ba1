// simkin_sim/src/engine/system.rs

//! The solver-facing multibody system: bodies, their mobilizers and the
//! loop constraints, plus the per-body state the solver integrates.

use nalgebra::{UnitQuaternion, Vector3};
use simkin_core::convert::{transform_to_pose, vec3_from_solver};
use simkin_core::graph::{
    BodyRef, ConstraintKind, JointKind, LoopConstraint, ModelTopology, MultibodyGraph,
    StaticAttachment,
};
use simkin_core::scene::ModelDescription;
use simkin_core::types::Pose;
use tracing::{debug, info};

use super::entities::{LinkId, ModelId};

/// Stable index of a body in the system. Never reused or shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyIndex(pub usize);

/// How a body is connected to the rest of the system.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyJoint {
    /// Rigidly attached to ground: a link of a static model.
    Welded,
    /// Moved by a mobilizer from `inboard` (`None` = ground).
    Mobilized {
        joint: Option<String>,
        kind: JointKind,
        inboard: Option<BodyIndex>,
        /// `F` on the inboard body.
        inboard_frame: Pose,
        /// `M` on this body.
        outboard_frame: Pose,
        axis: Vector3<f64>,
    },
}

/// World-frame kinematic state of one body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub pose: Pose,
    pub linear_velocity: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
    pub linear_acceleration: Vector3<f64>,
    pub angular_acceleration: Vector3<f64>,
    /// Force applied during the last step.
    pub force: Vector3<f64>,
    /// Torque applied during the last step.
    pub torque: Vector3<f64>,
}

impl BodyState {
    pub fn at_rest(pose: Pose) -> Self {
        Self {
            pose,
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            linear_acceleration: Vector3::zeros(),
            angular_acceleration: Vector3::zeros(),
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SystemBody {
    pub model: ModelId,
    pub link: LinkId,
    pub name: String,
    pub mass: f64,
    pub joint: BodyJoint,
    pub initial: BodyState,
    pub state: BodyState,
}

impl SystemBody {
    pub fn is_welded(&self) -> bool {
        matches!(self.joint, BodyJoint::Welded)
    }

    /// Inboard body, or `None` for ground.
    pub fn inboard(&self) -> Option<BodyIndex> {
        match &self.joint {
            BodyJoint::Welded => None,
            BodyJoint::Mobilized { inboard, .. } => *inboard,
        }
    }

    /// True for the base of a floating tree: a free mobilizer to ground.
    pub fn is_floating_base(&self) -> bool {
        matches!(
            self.joint,
            BodyJoint::Mobilized {
                kind: JointKind::Free,
                inboard: None,
                ..
            }
        )
    }
}

/// A loop-closing constraint between two system bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemConstraint {
    pub model: ModelId,
    pub joint: String,
    pub kind: ConstraintKind,
    /// `None` = ground.
    pub parent: Option<BodyIndex>,
    pub child: Option<BodyIndex>,
    pub parent_frame: Pose,
    pub child_frame: Pose,
}

/// The multibody system owned by the engine.
#[derive(Debug, Clone)]
pub struct MultibodySystem {
    gravity: Vector3<f64>,
    bodies: Vec<SystemBody>,
    constraints: Vec<SystemConstraint>,
}

impl MultibodySystem {
    pub fn new(gravity: Vector3<f64>) -> Self {
        Self {
            gravity,
            bodies: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn gravity(&self) -> Vector3<f64> {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vector3<f64>) {
        self.gravity = gravity;
    }

    pub fn bodies(&self) -> &[SystemBody] {
        &self.bodies
    }

    pub fn body(&self, index: BodyIndex) -> Option<&SystemBody> {
        self.bodies.get(index.0)
    }

    pub(crate) fn bodies_mut(&mut self) -> &mut [SystemBody] {
        &mut self.bodies
    }

    pub fn constraints(&self) -> &[SystemConstraint] {
        &self.constraints
    }

    /// Total mobilities.
    pub fn dofs(&self) -> usize {
        self.bodies
            .iter()
            .map(|b| match &b.joint {
                BodyJoint::Welded => 0,
                BodyJoint::Mobilized { kind, .. } => kind.dofs(),
            })
            .sum()
    }

    /// Appends a model's bodies. Existing indices are untouched; the
    /// returned indices follow the model's link order.
    pub fn add_model(
        &mut self,
        model: ModelId,
        links: &[LinkId],
        description: &ModelDescription,
        topology: &ModelTopology,
    ) -> Vec<BodyIndex> {
        let indices = match topology {
            ModelTopology::Static(attachment) => {
                self.add_static(model, links, description, attachment)
            }
            ModelTopology::Dynamic(graph) => self.add_dynamic(model, links, description, graph),
        };
        debug!(
            "Inserted model '{}' as bodies {:?}.",
            topology.model(),
            indices.iter().map(|b| b.0).collect::<Vec<_>>()
        );
        indices
    }

    fn add_static(
        &mut self,
        model: ModelId,
        links: &[LinkId],
        description: &ModelDescription,
        attachment: &StaticAttachment,
    ) -> Vec<BodyIndex> {
        attachment
            .welds
            .iter()
            .map(|weld| {
                let link = &description.links[weld.link];
                let state = BodyState::at_rest(transform_to_pose(&weld.frame));
                self.push(SystemBody {
                    model,
                    link: links[weld.link],
                    name: link.name.clone(),
                    mass: link.mass,
                    joint: BodyJoint::Welded,
                    initial: state,
                    state,
                })
            })
            .collect()
    }

    fn add_dynamic(
        &mut self,
        model: ModelId,
        links: &[LinkId],
        description: &ModelDescription,
        graph: &MultibodyGraph,
    ) -> Vec<BodyIndex> {
        let mut by_link: Vec<Option<BodyIndex>> = vec![None; description.links.len()];

        // Base to tip, so the inboard body is always placed first.
        for mobilizer in &graph.mobilizers {
            let inboard = match mobilizer.inboard {
                BodyRef::Ground => None,
                BodyRef::Link(i) => by_link[i],
            };
            let inboard_frame = transform_to_pose(&mobilizer.inboard_frame);
            let outboard_frame = transform_to_pose(&mobilizer.outboard_frame);
            let inboard_pose = inboard.map_or_else(Pose::identity, |b| self.bodies[b.0].state.pose);
            let pose = inboard_pose * inboard_frame * outboard_frame.inverse();

            let link = &description.links[mobilizer.outboard];
            let mut state = BodyState::at_rest(pose);
            match inboard {
                // Tree children start rigidly attached to their inboard body.
                Some(parent) => {
                    let p = &self.bodies[parent.0].state;
                    let lever = pose.translation.vector - p.pose.translation.vector;
                    state.angular_velocity = p.angular_velocity;
                    state.linear_velocity = p.linear_velocity + p.angular_velocity.cross(&lever);
                }
                None if mobilizer.kind == JointKind::Free => {
                    state.linear_velocity = description.pose.rotation * link.linear_velocity;
                    state.angular_velocity = description.pose.rotation * link.angular_velocity;
                }
                // Bases jointed to ground hold still.
                None => {}
            }

            let index = self.push(SystemBody {
                model,
                link: links[mobilizer.outboard],
                name: link.name.clone(),
                mass: link.mass,
                joint: BodyJoint::Mobilized {
                    joint: mobilizer.joint.clone(),
                    kind: mobilizer.kind,
                    inboard,
                    inboard_frame,
                    outboard_frame,
                    axis: vec3_from_solver(&mobilizer.axis),
                },
                initial: state,
                state,
            });
            by_link[mobilizer.outboard] = Some(index);
        }

        for constraint in &graph.constraints {
            self.constraints
                .push(Self::constraint(model, constraint, &by_link));
        }

        by_link.into_iter().flatten().collect()
    }

    fn constraint(
        model: ModelId,
        constraint: &LoopConstraint,
        by_link: &[Option<BodyIndex>],
    ) -> SystemConstraint {
        let body = |r: BodyRef| match r {
            BodyRef::Ground => None,
            BodyRef::Link(i) => by_link[i],
        };
        SystemConstraint {
            model,
            joint: constraint.joint.clone(),
            kind: constraint.kind,
            parent: body(constraint.parent),
            child: body(constraint.child),
            parent_frame: transform_to_pose(&constraint.parent_frame),
            child_frame: transform_to_pose(&constraint.child_frame),
        }
    }

    fn push(&mut self, body: SystemBody) -> BodyIndex {
        self.bodies.push(body);
        BodyIndex(self.bodies.len() - 1)
    }

    /// Index of the tree root for every body. Bodies are stored base to tip,
    /// so one forward pass suffices.
    pub fn tree_roots(&self) -> Vec<usize> {
        let mut roots: Vec<usize> = Vec::with_capacity(self.bodies.len());
        for (i, body) in self.bodies.iter().enumerate() {
            let root = body.inboard().map_or(i, |parent| roots[parent.0]);
            roots.push(root);
        }
        roots
    }

    /// Puts every body back to its initial state. Topology is unchanged.
    pub fn reset(&mut self) {
        for body in &mut self.bodies {
            body.state = body.initial;
        }
    }

    /// Largest position error over all loop constraints, in metres.
    pub fn constraint_error(&self) -> f64 {
        let world = |b: Option<BodyIndex>| {
            b.and_then(|b| self.body(b))
                .map_or_else(Pose::identity, |body| body.state.pose)
        };
        self.constraints
            .iter()
            .map(|c| {
                let p = world(c.parent) * c.parent_frame;
                let q = world(c.child) * c.child_frame;
                (p.translation.vector - q.translation.vector).norm()
            })
            .fold(0.0, f64::max)
    }

    /// Logs a one-line summary per body.
    pub fn log_summary(&self) {
        info!(
            "System: {} bodies, {} constraints, {} dof, gravity {:?}.",
            self.bodies.len(),
            self.constraints.len(),
            self.dofs(),
            self.gravity.as_slice()
        );
        for (i, body) in self.bodies.iter().enumerate() {
            let joint = match &body.joint {
                BodyJoint::Welded => "weld to ground".to_string(),
                BodyJoint::Mobilized { kind, inboard, .. } => match inboard {
                    Some(b) => format!("{} from body {}", kind.mobilizer_name(), b.0),
                    None => format!("{} from ground", kind.mobilizer_name()),
                },
            };
            info!(
                "  [{i}] {} (mass {}) {} at {:?}",
                body.name,
                body.mass,
                joint,
                body.state.pose.translation.vector.as_slice()
            );
        }
    }

    /// Applies a world-frame rotation to a pose's orientation, keeping its position.
    pub(crate) fn rotate_world(pose: &Pose, rotation: UnitQuaternion<f64>) -> Pose {
        Pose::from_parts(pose.translation, rotation * pose.rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use simkin_core::graph::MultibodyGraphBuilder;
    use simkin_core::scene::{JointDescription, LinkDescription};

    fn ids(n: usize) -> Vec<LinkId> {
        (0..n).map(LinkId).collect()
    }

    fn pendulum() -> ModelDescription {
        let mut model = ModelDescription::new("pendulum");
        model.pose = Pose::translation(0.0, 0.0, 2.0);
        model.links = vec![
            LinkDescription::new("arm", Pose::translation(0.0, 0.0, -0.5)),
            LinkDescription::new("bob", Pose::translation(0.0, 0.0, -1.0)),
        ];
        let mut pivot = JointDescription::new("pivot", JointKind::Revolute, "world", "arm");
        pivot.pose = Pose::translation(0.0, 0.0, 0.5);
        model.joints = vec![
            pivot,
            JointDescription::new("weld", JointKind::Fixed, "arm", "bob"),
        ];
        model
    }

    #[test]
    fn dynamic_model_bodies_start_at_their_declared_world_pose() {
        let description = pendulum();
        let topology = MultibodyGraphBuilder::new().build(&description).unwrap();
        let mut system = MultibodySystem::new(Vector3::new(0.0, 0.0, -9.8));
        let indices = system.add_model(ModelId(0), &ids(2), &description, &topology);

        assert_eq!(indices, [BodyIndex(0), BodyIndex(1)]);
        assert_abs_diff_eq!(
            system.bodies()[1].state.pose.translation.vector,
            Vector3::new(0.0, 0.0, 1.0),
            epsilon = 1e-12
        );
        assert_eq!(system.bodies()[1].inboard(), Some(BodyIndex(0)));
        assert_eq!(system.dofs(), 1);
    }

    #[test]
    fn later_models_do_not_shift_existing_indices() {
        let description = pendulum();
        let topology = MultibodyGraphBuilder::new().build(&description).unwrap();
        let mut system = MultibodySystem::new(Vector3::zeros());
        system.add_model(ModelId(0), &ids(2), &description, &topology);

        let mut ground = ModelDescription::new("ground");
        ground.is_static = true;
        ground.links = vec![LinkDescription::new("plane", Pose::identity())];
        let static_topology = MultibodyGraphBuilder::new().build(&ground).unwrap();
        let added = system.add_model(ModelId(1), &[LinkId(2)], &ground, &static_topology);

        assert_eq!(added, [BodyIndex(2)]);
        assert_eq!(system.bodies()[0].name, "arm");
        assert!(system.bodies()[2].is_welded());
    }

    #[test]
    fn loop_constraints_are_satisfied_at_rest() {
        let mut model = ModelDescription::new("triangle");
        model.links = vec![
            LinkDescription::new("a", Pose::translation(0.0, 0.0, 0.0)),
            LinkDescription::new("b", Pose::translation(1.0, 0.0, 0.0)),
            LinkDescription::new("c", Pose::translation(0.5, 1.0, 0.0)),
        ];
        model.joints = vec![
            JointDescription::new("ab", JointKind::Revolute, "a", "b"),
            JointDescription::new("bc", JointKind::Revolute, "b", "c"),
            JointDescription::new("ca", JointKind::Ball, "c", "a"),
        ];
        let topology = MultibodyGraphBuilder::new().build(&model).unwrap();
        let mut system = MultibodySystem::new(Vector3::zeros());
        system.add_model(ModelId(0), &ids(3), &model, &topology);

        assert_eq!(system.constraints().len(), 1);
        assert!(system.constraint_error() < 1e-12);
        assert!(system.bodies()[0].is_floating_base());
    }
}

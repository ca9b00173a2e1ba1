// simkin_sim/src/engine/entities.rs

//! Simulator-side records created by the engine's factory operations.
//!
//! These hold what the scene declared. Nothing here is solver state; the
//! solver only sees a model once `init` / `init_model` builds its topology.

use nalgebra::Vector3;
use simkin_core::graph::JointKind;
use simkin_core::scene::{
    CollisionDescription, Geometry, JointDescription, LinkDescription, ModelDescription,
};
use simkin_core::state::LiveCollision;
use simkin_core::types::Pose;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);
    };
}

entity_id!(
    /// Index of a model in creation order.
    ModelId
);
entity_id!(LinkId);
entity_id!(CollisionId);
entity_id!(JointId);
entity_id!(ShapeId);

#[derive(Debug, Clone)]
pub struct ModelEntity {
    pub name: String,
    /// Model frame in the world.
    pub pose: Pose,
    pub is_static: bool,
    pub links: Vec<LinkId>,
    pub joints: Vec<JointId>,
    /// Set once the model's topology is in the solver system.
    pub inserted: bool,
}

#[derive(Debug, Clone)]
pub struct LinkEntity {
    pub model: ModelId,
    pub name: String,
    /// Initial pose relative to the model.
    pub pose: Pose,
    pub mass: f64,
    pub linear_velocity: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
    pub collisions: Vec<CollisionId>,
}

#[derive(Debug, Clone)]
pub struct CollisionEntity {
    pub link: LinkId,
    pub name: String,
    /// Pose relative to the owning link.
    pub pose: Pose,
    pub shape: Option<ShapeId>,
}

// Collisions are rigid on their link, so the declared pose is the live one.
impl LiveCollision for CollisionEntity {
    fn name(&self) -> &str {
        &self.name
    }

    fn relative_pose(&self) -> Pose {
        self.pose
    }
}

#[derive(Debug, Clone)]
pub struct JointEntity {
    pub model: ModelId,
    pub name: String,
    pub kind: JointKind,
    pub parent: String,
    pub child: String,
    /// Joint frame relative to the child link.
    pub pose: Pose,
    pub axis: Vector3<f64>,
}

#[derive(Debug, Clone)]
pub struct ShapeEntity {
    pub collision: CollisionId,
    pub geometry: Geometry,
}

/// The shape types `create_shape` accepts, with unit-sized defaults.
pub fn default_geometry(shape_type: &str) -> Option<Geometry> {
    Some(match shape_type {
        "box" => Geometry::Box {
            size: Vector3::repeat(1.0),
        },
        "sphere" => Geometry::Sphere { radius: 0.5 },
        "cylinder" => Geometry::Cylinder {
            radius: 0.5,
            length: 1.0,
        },
        "plane" => Geometry::Plane {
            normal: Vector3::z(),
        },
        _ => return None,
    })
}

/// Every entity the engine has created, indexed by id.
#[derive(Debug, Default, Clone)]
pub struct EntityStore {
    pub models: Vec<ModelEntity>,
    pub links: Vec<LinkEntity>,
    pub collisions: Vec<CollisionEntity>,
    pub joints: Vec<JointEntity>,
    pub shapes: Vec<ShapeEntity>,
}

impl EntityStore {
    pub fn model(&self, id: ModelId) -> Option<&ModelEntity> {
        self.models.get(id.0)
    }

    pub fn link(&self, id: LinkId) -> Option<&LinkEntity> {
        self.links.get(id.0)
    }

    pub fn collision(&self, id: CollisionId) -> Option<&CollisionEntity> {
        self.collisions.get(id.0)
    }

    pub fn joint(&self, id: JointId) -> Option<&JointEntity> {
        self.joints.get(id.0)
    }

    pub fn shape(&self, id: ShapeId) -> Option<&ShapeEntity> {
        self.shapes.get(id.0)
    }

    /// Collects a model's entities into the form the graph builder consumes.
    /// Link order is creation order, so builder link indices map back through
    /// `ModelEntity::links`.
    pub fn describe(&self, id: ModelId) -> Option<ModelDescription> {
        let model = self.model(id)?;
        let links = model
            .links
            .iter()
            .filter_map(|&l| self.link(l))
            .map(|link| LinkDescription {
                name: link.name.clone(),
                pose: link.pose,
                mass: link.mass,
                linear_velocity: link.linear_velocity,
                angular_velocity: link.angular_velocity,
                collisions: link
                    .collisions
                    .iter()
                    .filter_map(|&c| self.collision(c))
                    .map(|c| CollisionDescription {
                        name: c.name.clone(),
                        pose: c.pose,
                        geometry: c
                            .shape
                            .and_then(|s| self.shape(s))
                            .map(|s| s.geometry.clone()),
                    })
                    .collect(),
            })
            .collect();
        let joints = model
            .joints
            .iter()
            .filter_map(|&j| self.joint(j))
            .map(|joint| JointDescription {
                name: joint.name.clone(),
                kind: joint.kind,
                parent: joint.parent.clone(),
                child: joint.child.clone(),
                pose: joint.pose,
                axis: joint.axis,
            })
            .collect();

        Some(ModelDescription {
            name: model.name.clone(),
            pose: model.pose,
            is_static: model.is_static,
            links,
            joints,
        })
    }
}

// simkin_core/src/scene.rs

//! The already-parsed scene: models made of links, collisions and joints,
//! read from `<model>` elements.

use nalgebra::Vector3;

use crate::convert::{element_pose_native, parse_components};
use crate::element::Element;
use crate::error::TopologyError;
use crate::graph::joint::JointKind;
use crate::types::Pose;

/// Collision geometry attached to a link.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Box { size: Vector3<f64> },
    Sphere { radius: f64 },
    Cylinder { radius: f64, length: f64 },
    Plane { normal: Vector3<f64> },
    /// A shape type this layer does not know; carried so the engine can reject it.
    Other(String),
}

impl Geometry {
    /// Reads the first child of a `<geometry>` element.
    pub fn from_element(geometry: &Element) -> Option<Self> {
        let shape = geometry.children.first()?;
        let number = |tag: &str, default: f64| {
            shape
                .child_text(tag)
                .and_then(|t| t.parse().ok())
                .unwrap_or(default)
        };
        let vector = |tag: &str, default: Vector3<f64>| {
            shape
                .child_text(tag)
                .and_then(parse_vec3)
                .unwrap_or(default)
        };

        Some(match shape.name.as_str() {
            "box" => Geometry::Box {
                size: vector("size", Vector3::repeat(1.0)),
            },
            "sphere" => Geometry::Sphere {
                radius: number("radius", 0.5),
            },
            "cylinder" => Geometry::Cylinder {
                radius: number("radius", 0.5),
                length: number("length", 1.0),
            },
            "plane" => Geometry::Plane {
                normal: vector("normal", Vector3::z()),
            },
            other => Geometry::Other(other.to_string()),
        })
    }

    pub fn type_string(&self) -> &str {
        match self {
            Geometry::Box { .. } => "box",
            Geometry::Sphere { .. } => "sphere",
            Geometry::Cylinder { .. } => "cylinder",
            Geometry::Plane { .. } => "plane",
            Geometry::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollisionDescription {
    pub name: String,
    /// Pose relative to the owning link.
    pub pose: Pose,
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkDescription {
    pub name: String,
    /// Pose relative to the owning model.
    pub pose: Pose,
    pub mass: f64,
    /// Initial linear velocity in the model frame.
    pub linear_velocity: Vector3<f64>,
    /// Initial angular velocity in the model frame.
    pub angular_velocity: Vector3<f64>,
    pub collisions: Vec<CollisionDescription>,
}

impl LinkDescription {
    pub fn new(name: impl Into<String>, pose: Pose) -> Self {
        Self {
            name: name.into(),
            pose,
            mass: 1.0,
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            collisions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JointDescription {
    pub name: String,
    pub kind: JointKind,
    /// Parent link name, or `world` for ground.
    pub parent: String,
    /// Child link name, or `world` for ground.
    pub child: String,
    /// Joint frame relative to the child link.
    pub pose: Pose,
    /// Joint axis in the joint frame.
    pub axis: Vector3<f64>,
}

impl JointDescription {
    pub fn new(
        name: impl Into<String>,
        kind: JointKind,
        parent: impl Into<String>,
        child: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: parent.into(),
            child: child.into(),
            pose: Pose::identity(),
            axis: Vector3::z(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescription {
    pub name: String,
    /// Model frame in the world.
    pub pose: Pose,
    /// Flagged immovable by the scene (`<static>true</static>`).
    pub is_static: bool,
    pub links: Vec<LinkDescription>,
    pub joints: Vec<JointDescription>,
}

impl ModelDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pose: Pose::identity(),
            is_static: false,
            links: Vec::new(),
            joints: Vec::new(),
        }
    }

    pub fn link(&self, name: &str) -> Option<&LinkDescription> {
        self.links.iter().find(|l| l.name == name)
    }

    /// Reads a `<model>` element. Missing poses and velocities read as
    /// identity; the only hard failure is an unknown joint type.
    pub fn from_element(model: &Element) -> Result<Self, TopologyError> {
        let links = model
            .children_named("link")
            .map(link_from_element)
            .collect();
        let joints = model
            .children_named("joint")
            .map(joint_from_element)
            .collect::<Result<_, _>>()?;

        Ok(Self {
            name: model.attribute("name").unwrap_or_default().to_string(),
            pose: element_pose_native(model),
            is_static: model.child_text("static").is_some_and(parse_bool),
            links,
            joints,
        })
    }
}

fn link_from_element(link: &Element) -> LinkDescription {
    let velocity = link
        .child_text("velocity")
        .and_then(parse_components)
        .unwrap_or_default();

    LinkDescription {
        name: link.attribute("name").unwrap_or_default().to_string(),
        pose: element_pose_native(link),
        mass: link
            .first_child("inertial")
            .and_then(|i| i.child_text("mass"))
            .and_then(|m| m.parse().ok())
            .unwrap_or(1.0),
        linear_velocity: Vector3::new(velocity[0], velocity[1], velocity[2]),
        angular_velocity: Vector3::new(velocity[3], velocity[4], velocity[5]),
        collisions: link
            .children_named("collision")
            .map(|c| CollisionDescription {
                name: c.attribute("name").unwrap_or_default().to_string(),
                pose: element_pose_native(c),
                geometry: c.first_child("geometry").and_then(Geometry::from_element),
            })
            .collect(),
    }
}

fn joint_from_element(joint: &Element) -> Result<JointDescription, TopologyError> {
    let kind = joint.attribute("type").unwrap_or("revolute").parse()?;
    let axis = joint
        .first_child("axis")
        .and_then(|a| a.child_text("xyz"))
        .and_then(parse_vec3)
        .unwrap_or_else(Vector3::z);

    Ok(JointDescription {
        name: joint.attribute("name").unwrap_or_default().to_string(),
        kind,
        parent: joint.child_text("parent").unwrap_or_default().to_string(),
        child: joint.child_text("child").unwrap_or_default().to_string(),
        pose: element_pose_native(joint),
        axis,
    })
}

fn parse_vec3(text: &str) -> Option<Vector3<f64>> {
    let v: Vec<f64> = text
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match v.as_slice() {
        [x, y, z] => Some(Vector3::new(*x, *y, *z)),
        _ => None,
    }
}

fn parse_bool(text: &str) -> bool {
    matches!(text.trim(), "true" | "1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const CART: &str = "\
        <model name='cart'>\
          <pose>0 0 0.5 0 0 0</pose>\
          <link name='chassis'>\
            <inertial><mass>20</mass></inertial>\
            <velocity>1 0 0 0 0 0.1</velocity>\
            <collision name='body'><geometry><box><size>2 1 0.5</size></box></geometry></collision>\
          </link>\
          <link name='wheel'><pose>0.8 0.6 0 0 0 0</pose>\
            <collision name='tyre'><geometry><cylinder><radius>0.3</radius><length>0.1</length></cylinder></geometry></collision>\
          </link>\
          <joint name='axle' type='revolute'>\
            <parent>chassis</parent><child>wheel</child>\
            <axis><xyz>0 1 0</xyz></axis>\
          </joint>\
        </model>";

    #[test]
    fn reads_links_joints_and_geometry() {
        let model = ModelDescription::from_element(&Element::from_xml_str(CART).unwrap()).unwrap();
        assert_eq!(model.name, "cart");
        assert!(!model.is_static);
        assert_abs_diff_eq!(model.pose.translation.vector.z, 0.5);

        let chassis = model.link("chassis").unwrap();
        assert_eq!(chassis.mass, 20.0);
        assert_eq!(chassis.linear_velocity, Vector3::new(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(chassis.angular_velocity.z, 0.1);
        assert_eq!(
            chassis.collisions[0].geometry,
            Some(Geometry::Box { size: Vector3::new(2.0, 1.0, 0.5) })
        );

        let wheel = model.link("wheel").unwrap();
        assert_eq!(wheel.mass, 1.0);
        assert_eq!(wheel.collisions[0].geometry.as_ref().map(Geometry::type_string), Some("cylinder"));

        assert_eq!(model.joints.len(), 1);
        assert_eq!(model.joints[0].kind, JointKind::Revolute);
        assert_eq!(model.joints[0].axis, Vector3::y());
        assert_eq!(model.joints[0].pose, Pose::identity());
    }

    #[test]
    fn unknown_joint_type_fails_the_model() {
        let xml = "<model name='m'><link name='a'/><joint name='j' type='hinge'>\
                   <parent>world</parent><child>a</child></joint></model>";
        let err = ModelDescription::from_element(&Element::from_xml_str(xml).unwrap()).unwrap_err();
        assert_eq!(err, TopologyError::UnknownJointType("hinge".into()));
    }

    #[test]
    fn static_flag_and_unknown_shapes() {
        let xml = "<model name='ground_plane'><static>true</static><link name='l'>\
                   <collision name='c'><geometry><heightmap/></geometry></collision></link></model>";
        let model = ModelDescription::from_element(&Element::from_xml_str(xml).unwrap()).unwrap();
        assert!(model.is_static);
        assert_eq!(
            model.links[0].collisions[0].geometry,
            Some(Geometry::Other("heightmap".into()))
        );
    }
}

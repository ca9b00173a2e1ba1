// simkin_core/src/graph/builder.rs

//! Reduces a model's link/joint graph to a spanning tree of mobilizers plus
//! loop-closing constraints.
//!
//! Frame conventions used throughout, for a joint with parent `P`, child `C`
//! and joint frame `J` given in the child's frame:
//!
//! * `X_PJ = X_MP^-1 * X_MC * X_CJ` (the joint frame seen from the parent),
//!   with `X_WM * X_MC * X_CJ` when the parent is ground;
//! * `X_CJ` is the joint frame seen from the child.
//!
//! A mobilizer carries an inboard frame `F` and an outboard frame `M` such
//! that, at zero joint coordinates, `X_W_out = X_W_in * F * M^-1`.

use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

use super::joint::{ConstraintKind, JointKind};
use crate::convert::{pose_to_transform, vec3_to_solver, SolverTransform, SolverVec3};
use crate::error::TopologyError;
use crate::scene::{JointDescription, ModelDescription};
use crate::types::{Pose, WORLD_NAME};

/// A node of the joint graph: ground or the link at this index in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyRef {
    Ground,
    Link(usize),
}

/// One tree edge, ready for the solver.
#[derive(Debug, Clone, PartialEq)]
pub struct Mobilizer {
    /// The source joint; `None` for the implicit free joint of a floating base.
    pub joint: Option<String>,
    pub kind: JointKind,
    pub inboard: BodyRef,
    /// Index of the link this mobilizer moves.
    pub outboard: usize,
    /// The traversal reached the joint's parent from its child.
    pub reversed: bool,
    /// `F`, fixed on the inboard body.
    pub inboard_frame: SolverTransform,
    /// `M`, fixed on the outboard body.
    pub outboard_frame: SolverTransform,
    /// Joint axis in the joint frame.
    pub axis: SolverVec3,
}

/// A joint cut out of the tree to break a loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConstraint {
    pub joint: String,
    pub joint_kind: JointKind,
    pub kind: ConstraintKind,
    pub parent: BodyRef,
    pub child: BodyRef,
    /// `X_PJ`.
    pub parent_frame: SolverTransform,
    /// `X_CJ`.
    pub child_frame: SolverTransform,
    pub axis: SolverVec3,
}

/// The mobilizer graph of a dynamic model.
///
/// Mobilizers are listed base to tip: every inboard link appears as the
/// outboard of an earlier mobilizer.
#[derive(Debug, Clone, PartialEq)]
pub struct MultibodyGraph {
    pub model: String,
    pub link_names: Vec<String>,
    pub mobilizers: Vec<Mobilizer>,
    pub constraints: Vec<LoopConstraint>,
}

impl MultibodyGraph {
    /// The mobilizer whose outboard body is `link`.
    pub fn mobilizer_of(&self, link: usize) -> Option<&Mobilizer> {
        self.mobilizers.iter().find(|m| m.outboard == link)
    }

    /// Mobilities of the whole tree.
    pub fn dofs(&self) -> usize {
        self.mobilizers.iter().map(|m| m.kind.dofs()).sum()
    }
}

/// A link welded to ground with a fixed world frame.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundWeld {
    pub link: usize,
    /// `X_WM * X_ML`.
    pub frame: SolverTransform,
}

/// An immovable model: every link welded to ground, no mobilizers.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticAttachment {
    pub model: String,
    pub link_names: Vec<String>,
    pub welds: Vec<GroundWeld>,
}

/// What a model becomes in the solver.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTopology {
    Static(StaticAttachment),
    Dynamic(MultibodyGraph),
}

impl ModelTopology {
    pub fn model(&self) -> &str {
        match self {
            ModelTopology::Static(s) => &s.model,
            ModelTopology::Dynamic(g) => &g.model,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, ModelTopology::Static(_))
    }
}

// =========================================================================
// == Builder ==
// =========================================================================

/// Turns one [`ModelDescription`] into a [`ModelTopology`].
#[derive(Debug, Clone)]
pub struct MultibodyGraphBuilder {
    preferred_root: Option<String>,
    allow_floating_bases: bool,
}

impl Default for MultibodyGraphBuilder {
    fn default() -> Self {
        Self {
            preferred_root: None,
            allow_floating_bases: true,
        }
    }
}

impl MultibodyGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The link to root a component at when it has no joint to ground.
    /// Ignored for components that do not contain it.
    pub fn with_root(mut self, link: impl Into<String>) -> Self {
        self.preferred_root = Some(link.into());
        self
    }

    /// When `false`, a component with no joint to ground is an error instead
    /// of getting an implicit free mobilizer.
    pub fn allow_floating_bases(mut self, allow: bool) -> Self {
        self.allow_floating_bases = allow;
        self
    }

    pub fn build(&self, model: &ModelDescription) -> Result<ModelTopology, TopologyError> {
        let link_index = index_links(model)?;

        if model.is_static {
            if !model.joints.is_empty() {
                warn!(
                    "Static model '{}' declares {} joint(s); they are ignored.",
                    model.name,
                    model.joints.len()
                );
            }
            return Ok(ModelTopology::Static(weld_to_ground(model)));
        }

        let edges = model
            .joints
            .iter()
            .map(|joint| Edge::resolve(joint, &link_index))
            .collect::<Result<Vec<_>, _>>()?;

        let mut traversal = Traversal::new(model, &edges);
        traversal.grow_from(BodyRef::Ground)?;
        for root in self.component_roots(model, &link_index) {
            if traversal.visited.contains(&BodyRef::Link(root)) {
                continue;
            }
            if !self.allow_floating_bases {
                return Err(TopologyError::Disconnected(model.links[root].name.clone()));
            }
            traversal.attach_floating_base(root);
            traversal.grow_from(BodyRef::Link(root))?;
        }

        let graph = MultibodyGraph {
            model: model.name.clone(),
            link_names: model.links.iter().map(|l| l.name.clone()).collect(),
            mobilizers: traversal.mobilizers,
            constraints: traversal.constraints,
        };
        debug!(
            "Model '{}': {} mobilizer(s), {} loop constraint(s), {} dof.",
            graph.model,
            graph.mobilizers.len(),
            graph.constraints.len(),
            graph.dofs()
        );
        Ok(ModelTopology::Dynamic(graph))
    }

    /// Candidate roots in priority order: the preferred root first, then
    /// every link in declaration order.
    fn component_roots(
        &self,
        model: &ModelDescription,
        link_index: &HashMap<&str, usize>,
    ) -> Vec<usize> {
        let preferred = self
            .preferred_root
            .as_deref()
            .and_then(|name| link_index.get(name).copied());
        preferred.into_iter().chain(0..model.links.len()).collect()
    }
}

fn index_links(model: &ModelDescription) -> Result<HashMap<&str, usize>, TopologyError> {
    let mut index = HashMap::with_capacity(model.links.len());
    for (i, link) in model.links.iter().enumerate() {
        if index.insert(link.name.as_str(), i).is_some() {
            return Err(TopologyError::DuplicateLink(link.name.clone()));
        }
    }
    Ok(index)
}

fn weld_to_ground(model: &ModelDescription) -> StaticAttachment {
    StaticAttachment {
        model: model.name.clone(),
        link_names: model.links.iter().map(|l| l.name.clone()).collect(),
        welds: model
            .links
            .iter()
            .enumerate()
            .map(|(i, link)| GroundWeld {
                link: i,
                frame: pose_to_transform(&(model.pose * link.pose)),
            })
            .collect(),
    }
}

// --- Graph Internals ---

struct Edge<'a> {
    joint: &'a JointDescription,
    parent: BodyRef,
    child: BodyRef,
}

impl<'a> Edge<'a> {
    fn resolve(
        joint: &'a JointDescription,
        link_index: &HashMap<&str, usize>,
    ) -> Result<Self, TopologyError> {
        let node = |name: &str| {
            if name == WORLD_NAME {
                Ok(BodyRef::Ground)
            } else {
                link_index
                    .get(name)
                    .map(|&i| BodyRef::Link(i))
                    .ok_or_else(|| TopologyError::UnknownLink {
                        joint: joint.name.clone(),
                        link: name.to_string(),
                    })
            }
        };
        let parent = node(&joint.parent)?;
        let child = node(&joint.child)?;
        if parent == child {
            return Err(TopologyError::SelfLoop(joint.name.clone()));
        }
        Ok(Self {
            joint,
            parent,
            child,
        })
    }

    fn other(&self, node: BodyRef) -> BodyRef {
        if node == self.parent {
            self.child
        } else {
            self.parent
        }
    }
}

/// Breadth-first spanning-tree extraction over an adjacency list.
struct Traversal<'m, 'e> {
    model: &'m ModelDescription,
    edges: &'e [Edge<'m>],
    adjacency: HashMap<BodyRef, Vec<usize>>,
    visited: HashSet<BodyRef>,
    edge_used: Vec<bool>,
    mobilizers: Vec<Mobilizer>,
    constraints: Vec<LoopConstraint>,
}

impl<'m, 'e> Traversal<'m, 'e> {
    fn new(model: &'m ModelDescription, edges: &'e [Edge<'m>]) -> Self {
        let mut adjacency: HashMap<BodyRef, Vec<usize>> = HashMap::new();
        for (i, edge) in edges.iter().enumerate() {
            adjacency.entry(edge.parent).or_default().push(i);
            adjacency.entry(edge.child).or_default().push(i);
        }
        let mut visited = HashSet::new();
        visited.insert(BodyRef::Ground);
        Self {
            model,
            edges,
            adjacency,
            visited,
            edge_used: vec![false; edges.len()],
            mobilizers: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Visits everything reachable from `start`. The first edge to reach a
    /// node becomes its mobilizer; every other edge closes a loop.
    fn grow_from(&mut self, start: BodyRef) -> Result<(), TopologyError> {
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            let incident = self.adjacency.get(&node).cloned().unwrap_or_default();
            for edge_idx in incident {
                if self.edge_used[edge_idx] {
                    continue;
                }
                self.edge_used[edge_idx] = true;

                let edge = &self.edges[edge_idx];
                let far = edge.other(node);
                if self.visited.insert(far) {
                    let mobilizer = self.tree_edge(edge, node, far);
                    self.mobilizers.push(mobilizer);
                    queue.push_back(far);
                } else {
                    let constraint = self.loop_edge(edge)?;
                    self.constraints.push(constraint);
                }
            }
        }
        Ok(())
    }

    /// Roots a floating component at `link` with an implicit free joint.
    fn attach_floating_base(&mut self, link: usize) {
        self.visited.insert(BodyRef::Link(link));
        let description = &self.model.links[link];
        debug!(
            "Model '{}': link '{}' has no path to ground; adding a free mobilizer.",
            self.model.name, description.name
        );
        self.mobilizers.push(Mobilizer {
            joint: None,
            kind: JointKind::Free,
            inboard: BodyRef::Ground,
            outboard: link,
            reversed: false,
            inboard_frame: pose_to_transform(&(self.model.pose * description.pose)),
            outboard_frame: SolverTransform::identity(),
            axis: vec3_to_solver(&nalgebra::Vector3::z()),
        });
    }

    fn tree_edge(&self, edge: &Edge, from: BodyRef, to: BodyRef) -> Mobilizer {
        let (parent_frame, child_frame) = self.joint_frames(edge);
        let reversed = from == edge.child;
        let (inboard_frame, outboard_frame) = if reversed {
            (child_frame, parent_frame)
        } else {
            (parent_frame, child_frame)
        };
        let outboard = match to {
            BodyRef::Link(i) => i,
            // Ground starts visited, so the far end of a tree edge is a link.
            BodyRef::Ground => unreachable!("ground is never an outboard body"),
        };
        Mobilizer {
            joint: Some(edge.joint.name.clone()),
            kind: edge.joint.kind,
            inboard: from,
            outboard,
            reversed,
            inboard_frame,
            outboard_frame,
            axis: vec3_to_solver(&edge.joint.axis),
        }
    }

    fn loop_edge(&self, edge: &Edge) -> Result<LoopConstraint, TopologyError> {
        let kind = edge.joint.kind.loop_constraint().ok_or_else(|| {
            TopologyError::UnsupportedLoopJoint {
                joint: edge.joint.name.clone(),
                kind: edge.joint.kind.to_string(),
            }
        })?;
        let (parent_frame, child_frame) = self.joint_frames(edge);
        Ok(LoopConstraint {
            joint: edge.joint.name.clone(),
            joint_kind: edge.joint.kind,
            kind,
            parent: edge.parent,
            child: edge.child,
            parent_frame,
            child_frame,
            axis: vec3_to_solver(&edge.joint.axis),
        })
    }

    /// `(X_PJ, X_CJ)` for an edge.
    fn joint_frames(&self, edge: &Edge) -> (SolverTransform, SolverTransform) {
        let x_cj = edge.joint.pose;
        // Joint frame in the model frame.
        let x_mj = self.model_pose_of(edge.child) * x_cj;
        let x_pj = match edge.parent {
            BodyRef::Ground => self.model.pose * x_mj,
            BodyRef::Link(i) => self.model.links[i].pose.inverse() * x_mj,
        };
        (pose_to_transform(&x_pj), pose_to_transform(&x_cj))
    }

    /// `X_MB`; ground maps back through the model frame.
    fn model_pose_of(&self, body: BodyRef) -> Pose {
        match body {
            BodyRef::Ground => self.model.pose.inverse(),
            BodyRef::Link(i) => self.model.links[i].pose,
        }
    }
}

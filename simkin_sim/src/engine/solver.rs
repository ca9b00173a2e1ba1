// simkin_sim/src/engine/solver.rs

//! The stepping solver behind `update_physics`, and the discrete force
//! accumulator it consumes.

use nalgebra::{DVector, UnitQuaternion, Vector3};
use simkin_core::types::Seconds;
use simkin_core::utils::integrators::Integrator;
use std::collections::HashMap;

use super::system::{BodyIndex, BodyState, MultibodySystem};

/// Rotational inertia of a link about its own origin, per unit mass.
/// Links are treated as unit cubes.
const UNIT_CUBE_INERTIA: f64 = 1.0 / 6.0;

// =========================================================================
// == Discrete Forces ==
// =========================================================================

/// World-frame force and torque per body, applied on the next step and
/// cleared by the engine afterwards.
#[derive(Debug, Default, Clone)]
pub struct DiscreteForces {
    wrenches: HashMap<BodyIndex, (Vector3<f64>, Vector3<f64>)>,
}

impl DiscreteForces {
    /// Adds to whatever is already queued for `body`.
    pub fn add_body_wrench(&mut self, body: BodyIndex, force: Vector3<f64>, torque: Vector3<f64>) {
        let entry = self
            .wrenches
            .entry(body)
            .or_insert((Vector3::zeros(), Vector3::zeros()));
        entry.0 += force;
        entry.1 += torque;
    }

    /// `(force, torque)` queued for `body`; zero when nothing is queued.
    pub fn body_wrench(&self, body: BodyIndex) -> (Vector3<f64>, Vector3<f64>) {
        self.wrenches
            .get(&body)
            .copied()
            .unwrap_or((Vector3::zeros(), Vector3::zeros()))
    }

    pub fn is_empty(&self) -> bool {
        self.wrenches.is_empty()
    }

    pub fn clear(&mut self) {
        self.wrenches.clear();
    }
}

// =========================================================================
// == Solver ==
// =========================================================================

/// Advances a [`MultibodySystem`] by one step.
pub trait Solver: Send + Sync {
    fn advance(
        &self,
        system: &mut MultibodySystem,
        integrator: &dyn Integrator<f64>,
        forces: &DiscreteForces,
        t0: Seconds,
        dt: Seconds,
    );

    fn name(&self) -> &'static str;
}

/// Reference solver with every mobility locked except floating bases.
///
/// Each floating tree moves as one rigid body: its centre of mass is
/// integrated under gravity and the queued forces, its angular velocity
/// under the queued torques. Trees jointed to ground and welded bodies stay
/// where they are. Loop constraints hold because no tree deforms.
#[derive(Debug, Default, Clone, Copy)]
pub struct RigidTreeSolver;

impl Solver for RigidTreeSolver {
    fn advance(
        &self,
        system: &mut MultibodySystem,
        integrator: &dyn Integrator<f64>,
        forces: &DiscreteForces,
        t0: Seconds,
        dt: Seconds,
    ) {
        let gravity = system.gravity();
        let roots = system.tree_roots();
        let bodies = system.bodies_mut();
        let mut next: Vec<BodyState> = bodies.iter().map(|b| b.state).collect();

        for (root, _) in roots.iter().enumerate().filter(|(i, r)| *i == **r) {
            if !bodies[root].is_floating_base() {
                continue;
            }
            let members: Vec<usize> = (0..bodies.len()).filter(|&i| roots[i] == root).collect();

            // --- Composite rigid body ---
            let mass: f64 = members.iter().map(|&i| bodies[i].mass).sum();
            let com = members
                .iter()
                .map(|&i| bodies[i].mass * bodies[i].state.pose.translation.vector)
                .sum::<Vector3<f64>>()
                / mass;
            let com_velocity = members
                .iter()
                .map(|&i| bodies[i].mass * bodies[i].state.linear_velocity)
                .sum::<Vector3<f64>>()
                / mass;
            let omega = bodies[root].state.angular_velocity;

            let mut force = gravity * mass;
            let mut torque = Vector3::zeros();
            let mut inertia = 0.0;
            for &i in &members {
                let (f, t) = forces.body_wrench(BodyIndex(i));
                let lever = bodies[i].state.pose.translation.vector - com;
                force += f;
                torque += t + lever.cross(&f);
                inertia += bodies[i].mass * (lever.norm_squared() + UNIT_CUBE_INERTIA);
            }
            let linear_accel = force / mass;
            let angular_accel = torque / inertia;

            // x = [com, com velocity, angular velocity]
            let x0 = DVector::from_iterator(
                9,
                com.iter()
                    .chain(com_velocity.iter())
                    .chain(omega.iter())
                    .copied(),
            );
            let derivative = |x: &DVector<f64>, _t: f64| {
                DVector::from_iterator(
                    9,
                    x.rows(3, 3)
                        .iter()
                        .chain(linear_accel.iter())
                        .chain(angular_accel.iter())
                        .copied(),
                )
            };
            let x1 = integrator.step(&derivative, &x0, t0, t0 + dt);
            let new_com = Vector3::new(x1[0], x1[1], x1[2]);
            let new_com_velocity = Vector3::new(x1[3], x1[4], x1[5]);
            let new_omega = Vector3::new(x1[6], x1[7], x1[8]);

            let spin = UnitQuaternion::from_scaled_axis((omega + new_omega) * (0.5 * dt));
            for &i in &members {
                let old = bodies[i].state;
                let lever = spin * (old.pose.translation.vector - com);
                let mut pose = MultibodySystem::rotate_world(&old.pose, spin);
                pose.translation.vector = new_com + lever;

                let linear_velocity = new_com_velocity + new_omega.cross(&lever);
                next[i] = BodyState {
                    pose,
                    linear_velocity,
                    angular_velocity: new_omega,
                    linear_acceleration: (linear_velocity - old.linear_velocity) / dt,
                    angular_acceleration: (new_omega - old.angular_velocity) / dt,
                    ..old
                };
            }
        }

        for (i, (body, state)) in bodies.iter_mut().zip(next).enumerate() {
            let (force, torque) = forces.body_wrench(BodyIndex(i));
            body.state = BodyState {
                force,
                torque,
                ..state
            };
        }
    }

    fn name(&self) -> &'static str {
        "rigid_tree"
    }
}

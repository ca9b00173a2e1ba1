// simkin_core/src/utils/integrators.rs

//! Explicit Runge-Kutta steppers over a flat state vector.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Advances `x0` from `t0` to `tf` under `dx/dt = func(x, t)`.
pub trait Integrator<T>: Send + Sync {
    fn step(
        &self,
        func: &dyn Fn(&DVector<T>, T) -> DVector<T>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> DVector<T>;

    /// Short name used in logs and the `integrator` config key.
    fn name(&self) -> &'static str;
}

/// The stepper selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegratorKind {
    Euler,
    Rk2,
    #[default]
    Rk4,
}

impl IntegratorKind {
    pub fn build(self) -> Box<dyn Integrator<f64>> {
        match self {
            IntegratorKind::Euler => Box::new(RK1),
            IntegratorKind::Rk2 => Box::new(RK2),
            IntegratorKind::Rk4 => Box::new(RK4),
        }
    }
}

impl std::str::FromStr for IntegratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euler" | "rk1" => Ok(IntegratorKind::Euler),
            "rk2" => Ok(IntegratorKind::Rk2),
            "rk4" => Ok(IntegratorKind::Rk4),
            other => Err(format!("unknown integrator '{other}'")),
        }
    }
}

// Runge-Kutta methods
#[derive(Debug, Default, Clone, Copy)]
pub struct RK1;

impl<T> Integrator<T> for RK1
where
    T: Copy + Send + Sync + num_traits::Float + std::ops::Mul<DVector<T>, Output = DVector<T>>,
    DVector<T>: std::ops::Add<Output = DVector<T>>,
{
    fn step(
        &self,
        func: &dyn Fn(&DVector<T>, T) -> DVector<T>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> DVector<T> {
        let dt = tf - t0;
        x0.clone() + dt * func(x0, t0) // Euler's method
    }

    fn name(&self) -> &'static str {
        "euler"
    }
}

/// Heun's method.
#[derive(Debug, Default, Clone, Copy)]
pub struct RK2;

impl<T> Integrator<T> for RK2
where
    T: Copy + Send + Sync + num_traits::Float + std::ops::Mul<DVector<T>, Output = DVector<T>>,
    DVector<T>: std::ops::Add<Output = DVector<T>>,
{
    fn step(
        &self,
        func: &dyn Fn(&DVector<T>, T) -> DVector<T>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> DVector<T> {
        let dt = tf - t0;
        let half = (T::one() + T::one()).recip();
        let k1 = func(x0, t0);
        let k2 = func(&(x0.clone() + dt * k1.clone()), tf);

        x0.clone() + half * dt * (k1 + k2)
    }

    fn name(&self) -> &'static str {
        "rk2"
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RK4;

impl<T> Integrator<T> for RK4
where
    T: Copy + Send + Sync + num_traits::Float + std::ops::Mul<DVector<T>, Output = DVector<T>>,
    DVector<T>: std::ops::Add<Output = DVector<T>>,
{
    fn step(
        &self,
        func: &dyn Fn(&DVector<T>, T) -> DVector<T>,
        x0: &DVector<T>,
        t0: T,
        tf: T,
    ) -> DVector<T> {
        let dt = tf - t0;
        let two = T::one() + T::one();
        let half = two.recip();
        let sixth = (two * two + two).recip();

        let k1 = func(x0, t0);
        let k2 = func(&(x0.clone() + half * dt * k1.clone()), t0 + half * dt);
        let k3 = func(&(x0.clone() + half * dt * k2.clone()), t0 + half * dt);
        let k4 = func(&(x0.clone() + dt * k3.clone()), tf);

        x0.clone() + dt * sixth * (k1 + two * k2 + two * k3 + k4)
    }

    fn name(&self) -> &'static str {
        "rk4"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    // x'' = -g: state [x, v].
    fn falling(x: &DVector<f64>, _t: f64) -> DVector<f64> {
        DVector::from_vec(vec![x[1], -9.8])
    }

    #[test]
    fn euler_matches_the_closed_form_first_order_step() {
        let x0 = DVector::from_vec(vec![10.0, 0.0]);
        let x1 = RK1.step(&falling, &x0, 0.0, 0.1);
        assert_abs_diff_eq!(x1[0], 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x1[1], -0.98, epsilon = 1e-12);
    }

    #[test]
    fn second_and_fourth_order_are_exact_for_constant_acceleration() {
        let x0 = DVector::from_vec(vec![10.0, 1.0]);
        let dt: f64 = 0.25;
        let expected = 10.0 + 1.0 * dt - 0.5 * 9.8 * dt * dt;
        for integrator in [IntegratorKind::Rk2.build(), IntegratorKind::Rk4.build()] {
            let x1 = integrator.step(&falling, &x0, 0.0, dt);
            assert_abs_diff_eq!(x1[0], expected, epsilon = 1e-12);
            assert_abs_diff_eq!(x1[1], 1.0 - 9.8 * dt, epsilon = 1e-12);
        }
    }

    #[test]
    fn rk4_tracks_exponential_decay() {
        let decay = |x: &DVector<f64>, _t: f64| -x.clone();
        let mut x = DVector::from_vec(vec![1.0]);
        for i in 0..10 {
            let t0 = i as f64 * 0.1;
            x = RK4.step(&decay, &x, t0, t0 + 0.1);
        }
        assert_abs_diff_eq!(x[0], (-1.0f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn kind_parses_config_names() {
        assert_eq!("Euler".parse::<IntegratorKind>(), Ok(IntegratorKind::Euler));
        assert_eq!("rk4".parse::<IntegratorKind>(), Ok(IntegratorKind::Rk4));
        assert!("verlet".parse::<IntegratorKind>().is_err());
        assert_eq!(IntegratorKind::Rk2.build().name(), "rk2");
    }
}

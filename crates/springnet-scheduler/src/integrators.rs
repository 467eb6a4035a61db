//! Overdamped integrators: explicit Euler, Euler-Heun predictor-corrector,
//! and an adaptive Euler-Heun with position-normalized local error control.

use springnet_core::Network;
use springnet_core::{Error, Result};

/// Overdamped friction coefficient shared by every integrator in this
/// module; `1/zeta` scales force into velocity.
#[derive(Clone, Copy, Debug)]
pub struct Overdamped {
    pub inv_zeta: f64,
}

impl Overdamped {
    #[must_use]
    pub fn new(zeta: f64) -> Self {
        Self { inv_zeta: 1.0 / zeta }
    }
}

/// Explicit overdamped Euler step: `x <- x + (F/zeta) * dt`.
pub fn overdamped_euler_step(net: &mut Network, od: Overdamped, dt: f64) {
    let forces = net.nodes().forces().to_vec();
    for (pos, force) in net.nodes_mut().positions_mut().iter_mut().zip(&forces) {
        *pos += *force * (od.inv_zeta * dt);
    }
}

/// Predictor-corrector overdamped Euler-Heun: predict with the pre-step
/// force, recompute, then average.
pub fn overdamped_euler_heun_step(net: &mut Network, od: Overdamped, dt: f64) -> Result<()> {
    let scale = dt * od.inv_zeta;
    let f_n = net.nodes().forces().to_vec();

    for (pos, force) in net.nodes_mut().positions_mut().iter_mut().zip(&f_n) {
        *pos += *force * scale;
    }
    net.compute_forces(false, true)?;

    let half_scale = 0.5 * scale;
    let f_new = net.nodes().forces().to_vec();
    for i in 0..net.nodes().len() {
        let corrected = f_new[i] - f_n[i];
        net.nodes_mut().positions_mut()[i] += corrected * half_scale;
        let avg = (f_new[i] + f_n[i]) * 0.5;
        net.nodes_mut().forces_mut()[i] = avg;
        net.nodes_mut().velocities_mut()[i] = avg * od.inv_zeta;
    }
    Ok(())
}

/// Tuning parameters for [`AdaptiveEulerHeun`].
#[derive(Clone, Copy, Debug)]
pub struct AdaptiveParams {
    pub max_inner_iter: usize,
    pub dt_min: f64,
    pub dt_max: f64,
    pub q_min: f64,
    pub q_max: f64,
    pub eps_rel: f64,
    pub eps_abs: f64,
}

impl Default for AdaptiveParams {
    fn default() -> Self {
        Self {
            max_inner_iter: 50,
            dt_min: 1e-8,
            dt_max: 1.0,
            q_min: 0.2,
            q_max: 2.0,
            eps_rel: 1e-4,
            eps_abs: 1e-8,
        }
    }
}

/// Adaptive, position-normalized-error overdamped Euler-Heun stepper. Each
/// call to [`Self::step`] advances the network by one accepted step and
/// remembers the next trial `dt`.
#[derive(Clone, Debug)]
pub struct AdaptiveEulerHeun {
    od: Overdamped,
    params: AdaptiveParams,
    next_dt: f64,
}

impl AdaptiveEulerHeun {
    #[must_use]
    pub fn new(od: Overdamped, params: AdaptiveParams, dt0: f64) -> Self {
        Self {
            od,
            params,
            next_dt: dt0,
        }
    }

    #[must_use]
    pub fn dt(&self) -> f64 {
        self.next_dt
    }

    /// Take one accepted step, trying candidate `dt`s until the local error
    /// estimate passes or the budget is exhausted.
    pub fn step(&mut self, net: &mut Network) -> Result<f64> {
        let n = net.nodes().len();
        let r_k = net.nodes().positions().to_vec();
        let f_k = net.nodes().forces().to_vec();

        let mut dt = self.next_dt;
        let mut q = self.params.q_min;
        let mut iter = 0usize;

        loop {
            if iter >= self.params.max_inner_iter {
                return Err(Error::NonConvergent(
                    "adaptive Euler-Heun exhausted its inner iteration budget".into(),
                ));
            }
            iter += 1;

            let scale = dt * self.od.inv_zeta;
            for i in 0..n {
                net.nodes_mut().positions_mut()[i] = r_k[i] + f_k[i] * scale;
            }
            net.compute_forces(false, true)?;

            let half_scale = 0.5 * scale;
            let mut estimated_error = f64::MIN;
            let f_new = net.nodes().forces().to_vec();
            for i in 0..n {
                let pos = r_k[i] + (f_k[i] + f_new[i]) * half_scale;
                net.nodes_mut().positions_mut()[i] = pos;

                let e = (f_new[i] - f_k[i]).norm() * half_scale;
                let tau =
                    self.params.eps_abs + self.params.eps_rel * (pos - r_k[i]).norm();
                estimated_error = estimated_error.max(e / tau);
            }

            let estimated_q = (0.5 / estimated_error).powi(2);
            q = estimated_q.clamp(self.params.q_min, self.params.q_max);

            let pinned_rejecting = dt == self.params.dt_min && q < 1.0;
            if q.is_nan() || pinned_rejecting {
                return Err(Error::NonConvergent(
                    "adaptive Euler-Heun error estimate diverged at dt_min".into(),
                ));
            }
            if q > 1.0 {
                break;
            }

            for i in 0..n {
                net.nodes_mut().positions_mut()[i] = r_k[i];
                net.nodes_mut().forces_mut()[i] = f_k[i];
            }
            dt *= q;
            dt = dt.max(self.params.dt_min);
        }

        for i in 0..n {
            net.nodes_mut().velocities_mut()[i] = net.nodes().forces()[i] * self.od.inv_zeta;
        }
        self.next_dt = (dt * q).clamp(self.params.dt_min, self.params.dt_max);
        Ok(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use springnet_core::{Box2, BreakLaw, ForceLaw, TagSet, Vec2};

    fn two_node_net(sep: f64) -> Network {
        let b = Box2::new(10.0, 10.0, 0.0).unwrap();
        let mut net = Network::with_capacity(b, 2, 1);
        net.nodes_mut().add_node(0, Vec2::new(0.0, 5.0), Vec2::ZERO, 1.0);
        net.nodes_mut().add_node(1, Vec2::new(sep, 5.0), Vec2::ZERO, 1.0);
        net.bonds_mut().add_bond(
            0,
            1,
            ForceLaw::harmonic(1.0, 2.0, false),
            BreakLaw::None,
            TagSet::EMPTY,
        );
        net
    }

    #[test]
    fn euler_step_moves_nodes_towards_rest_length() {
        let mut net = two_node_net(3.0);
        net.compute_forces(false, true).unwrap();
        let before = net.nodes().positions()[1].x;
        overdamped_euler_step(&mut net, Overdamped::new(1.0), 0.01);
        let after = net.nodes().positions()[1].x;
        assert!(after < before);
    }

    #[test]
    fn euler_heun_conserves_center_of_mass_shift_direction() {
        let mut net = two_node_net(3.0);
        net.compute_forces(false, true).unwrap();
        overdamped_euler_heun_step(&mut net, Overdamped::new(1.0), 0.01).unwrap();
        assert!(net.nodes().positions()[1].x < 3.0);
    }

    #[test]
    fn adaptive_stepper_reduces_extension_without_nan() {
        let mut net = two_node_net(3.0);
        net.compute_forces(false, true).unwrap();
        let mut stepper = AdaptiveEulerHeun::new(
            Overdamped::new(1.0),
            AdaptiveParams::default(),
            0.01,
        );
        for _ in 0..20 {
            stepper.step(&mut net).unwrap();
        }
        let sep = (net.nodes().positions()[1].x - net.nodes().positions()[0].x).abs();
        assert!((sep - 2.0).abs() < 1e-3);
    }
}

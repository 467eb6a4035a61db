//! Two-point quadratic-interpolation line search with backtracking, used by
//! the steepest-descent minimiser and as the hybrid-step fallback.

use springnet_core::{Network, Vec2};

const ESP: f64 = 1e-12;
const EMACH: f64 = 1e-14;
const BACKTRACK_SLOPE: f64 = 1e-4;
const ALPHA_REDUCE: f64 = 0.5;
const TOL: f64 = 1e-2;

/// Why a line search terminated without a usable step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineSearchFailure {
    DirectionNotDescent,
    ZeroForce,
    ZeroQuad,
    ZeroAlpha,
}

impl std::fmt::Display for LineSearchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            LineSearchFailure::DirectionNotDescent => "direction is not a descent direction",
            LineSearchFailure::ZeroForce => "zero force along search direction",
            LineSearchFailure::ZeroQuad => "zero quadratic coefficient",
            LineSearchFailure::ZeroAlpha => "zero step size",
        };
        f.write_str(msg)
    }
}

fn dot(a: &[Vec2], b: &[Vec2]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x.dot(*y)).sum()
}

fn max_component(h: &[Vec2]) -> f64 {
    h.iter().fold(0.0, |m, v| m.max(v.abs().max_component()))
}

/// Quadratic-interpolation line search along a fixed direction `h`.
#[derive(Clone, Debug)]
pub struct QuadLineSearch {
    alpha_max: f64,
}

impl QuadLineSearch {
    #[must_use]
    pub fn new(alpha_max: f64) -> Self {
        Self { alpha_max }
    }

    /// Search along `h` from the network's current state, leaving the
    /// network positioned at the accepted step (or restored to its starting
    /// state on failure).
    pub fn search(
        &self,
        h: &[Vec2],
        net: &mut Network,
    ) -> Result<f64, LineSearchFailure> {
        net.compute_forces(false, true).map_err(|_| LineSearchFailure::ZeroForce)?;
        let e_original = net.energy();

        let mut fdoth = dot(net.nodes().forces(), h);
        if fdoth <= 0.0 {
            return Err(LineSearchFailure::DirectionNotDescent);
        }
        if max_component(h) < 1e-14 {
            return Err(LineSearchFailure::ZeroForce);
        }

        let r_k = net.nodes().positions().to_vec();
        let f_k = net.nodes().forces().to_vec();

        let mut alpha = self.alpha_max;
        let mut alpha_prev = 0.0;
        let mut fdoth_prev = fdoth;
        let mut e_curr = e_original;
        let mut e_prev = e_curr;

        loop {
            e_curr = alpha_step(net, &r_k, h, alpha);
            fdoth = dot(net.nodes().forces(), h);
            let delfh = fdoth - fdoth_prev;

            if fdoth.abs() < ESP || delfh.abs() < ESP {
                restore(net, &r_k, &f_k);
                return Err(LineSearchFailure::ZeroQuad);
            }

            let relerr = (1.0
                - (0.5 * (alpha - alpha_prev) * (fdoth + fdoth_prev) + e_curr) / e_prev)
                .abs();
            let alpha0 = alpha - (alpha - alpha_prev) * fdoth / delfh;
            if relerr < TOL && alpha0 > 0.0 && alpha0 < self.alpha_max {
                e_curr = alpha_step(net, &r_k, h, alpha0);
                if e_curr - e_original < EMACH {
                    return Ok(alpha0);
                }
            }

            let d_e_ideal = -BACKTRACK_SLOPE * alpha * fdoth;
            let d_e = e_curr - e_prev;
            if d_e < d_e_ideal {
                return Ok(alpha);
            }

            fdoth_prev = fdoth;
            e_prev = e_curr;
            alpha_prev = alpha;
            alpha *= ALPHA_REDUCE;

            if alpha <= 0.0 || d_e_ideal >= -EMACH {
                restore(net, &r_k, &f_k);
                return Err(LineSearchFailure::ZeroAlpha);
            }
        }
    }
}

fn alpha_step(net: &mut Network, r_k: &[Vec2], h: &[Vec2], alpha: f64) -> f64 {
    for i in 0..net.nodes().len() {
        net.nodes_mut().positions_mut()[i] = r_k[i] + h[i] * alpha;
    }
    let _ = net.compute_forces(false, true);
    net.energy()
}

fn restore(net: &mut Network, r_k: &[Vec2], f_k: &[Vec2]) {
    for i in 0..net.nodes().len() {
        net.nodes_mut().positions_mut()[i] = r_k[i];
        net.nodes_mut().forces_mut()[i] = f_k[i];
    }
    let _ = net.compute_forces(false, true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use springnet_core::{Box2, BreakLaw, ForceLaw, TagSet};

    #[test]
    fn search_shortens_a_stretched_bond() {
        let b = Box2::new(10.0, 10.0, 0.0).unwrap();
        let mut net = Network::with_capacity(b, 2, 1);
        net.nodes_mut().add_node(0, Vec2::new(0.0, 5.0), Vec2::ZERO, 1.0);
        net.nodes_mut().add_node(1, Vec2::new(3.0, 5.0), Vec2::ZERO, 1.0);
        net.bonds_mut().add_bond(
            0,
            1,
            ForceLaw::harmonic(1.0, 2.0, false),
            BreakLaw::None,
            TagSet::EMPTY,
        );
        net.compute_forces(false, true).unwrap();
        let h = net.nodes().forces().to_vec();
        let search = QuadLineSearch::new(0.5);
        let e_before = net.energy();
        let result = search.search(&h, &mut net);
        assert!(result.is_ok());
        assert!(net.energy() <= e_before);
    }
}

//! The cascade-relaxation step: try an adaptive Euler-Heun step; if energy
//! rose, rewind and fall back to a line search along the current forces.

use crate::integrators::AdaptiveEulerHeun;
use crate::linesearch::{LineSearchFailure, QuadLineSearch};
use springnet_core::{Network, Result};

/// Outcome of one hybrid step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HybridOutcome {
    /// The adaptive step was accepted outright.
    AdaptiveAccepted,
    /// The adaptive step was rejected; the line-search fallback moved the
    /// network instead.
    LineSearchAccepted,
    /// Both the adaptive step and the line search failed in a way that
    /// signals the cascade has relaxed as far as it usefully can.
    Converged,
}

/// One hybrid step: try `stepper`, and on an energy increase fall back to a
/// line search along the (pre-step) force direction.
pub fn hybrid_step(
    net: &mut Network,
    stepper: &mut AdaptiveEulerHeun,
    line_search: &QuadLineSearch,
) -> Result<(HybridOutcome, f64)> {
    let r_k = net.nodes().positions().to_vec();
    let f_k = net.nodes().forces().to_vec();
    let e_before = net.energy();

    match stepper.step(net) {
        Ok(dt) => {
            if net.energy() <= e_before {
                return Ok((HybridOutcome::AdaptiveAccepted, dt));
            }
            tracing::debug!(
                e_before,
                e_after = net.energy(),
                "adaptive step rejected, energy rose"
            );
            for i in 0..net.nodes().len() {
                net.nodes_mut().positions_mut()[i] = r_k[i];
                net.nodes_mut().forces_mut()[i] = f_k[i];
            }
        }
        Err(ref e) => {
            tracing::debug!(error = %e, "adaptive step failed, falling back to line search");
            for i in 0..net.nodes().len() {
                net.nodes_mut().positions_mut()[i] = r_k[i];
                net.nodes_mut().forces_mut()[i] = f_k[i];
            }
        }
    }

    match line_search.search(&f_k, net) {
        Ok(alpha) => Ok((HybridOutcome::LineSearchAccepted, alpha)),
        Err(LineSearchFailure::ZeroAlpha | LineSearchFailure::ZeroQuad) => {
            tracing::debug!("line search stalled, cascade converged");
            Ok((HybridOutcome::Converged, 0.0))
        }
        Err(ref e) => {
            tracing::warn!(error = %e, "line search failed, treating step as converged");
            Ok((HybridOutcome::Converged, 0.0))
        }
    }
}

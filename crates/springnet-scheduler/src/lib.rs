//! Integrators, energy minimisers, the ITP root solver, and the
//! quasi-static strain protocol that drives a `springnet_core::Network`
//! forward in time.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod deform;
pub mod hybrid;
pub mod integrators;
pub mod linesearch;
pub mod minimize;
pub mod protocol;
pub mod roots;

pub use deform::{Axis, DeformAxis, ElongationAreaY, Shear};
pub use hybrid::{hybrid_step, HybridOutcome};
pub use integrators::{
    overdamped_euler_heun_step, overdamped_euler_step, AdaptiveEulerHeun, AdaptiveParams,
    Overdamped,
};
pub use linesearch::{LineSearchFailure, QuadLineSearch};
pub use minimize::{Fire2, Fire2Params, MinimizerParams, SteepestDescent};
pub use protocol::{QuasiStaticConfig, QuasiStaticProtocol, SavePointConfig, SavePointSchedule};
pub use roots::{Itp, ItpParams};

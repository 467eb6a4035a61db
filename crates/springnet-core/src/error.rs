//! Crate-wide error type shared by every `springnet-*` crate.

use thiserror::Error;

/// The result alias used throughout the `springnet` workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds surfaced by the core, the scheduler, and the trace crates.
///
/// Recovery is never attempted inside the core: every fallible call
/// surfaces the first error it hits and lets the caller decide.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad input: missing file, out-of-range index, a full tag table, or an
    /// unknown tag lookup.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A bond length collapsed below the round-error floor, or a box side
    /// was non-positive.
    #[error("degenerate geometry: {0}")]
    GeometryDegenerate(String),

    /// An adaptive stepper pinned at `dt_min` and kept rejecting, or a
    /// minimiser exhausted its iteration budget without meeting tolerance.
    #[error("solver did not converge: {0}")]
    NonConvergent(String),

    /// The ITP root solver was given `a >= b`, an unbracketed sign change,
    /// or exhausted its iteration budget.
    #[error("root solver error: {0}")]
    RootError(String),

    /// A failure specific to the quasi-static strain protocol's state
    /// machine.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O failure surfaced by a loader or a sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Protocol-specific failure kinds (spec §7, `ProtocolError`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// `find_next_break` found at least one bond already past its break
    /// threshold at the strain it was asked to start searching from.
    #[error("bond already broken at the lower strain bound")]
    BreakAtLowerBound,

    /// The cascade relaxation loop exhausted its iteration budget without
    /// reaching force/energy tolerance.
    #[error("relaxation did not converge within the iteration budget")]
    DidNotConverge,

    /// The ITP bracket converged but no bond crossed its threshold at the
    /// accepted strain.
    #[error("strain bracket converged with zero breaks")]
    ConvergedWithZeroBreaks,

    /// More than one bond crossed its threshold at the converged strain and
    /// `error_on_not_single` was set.
    #[error("strain bracket converged with more than one break")]
    ConvergedWithMoreThanOneBreak,

    /// The outer loop reached `max_strain` without anything left to break.
    /// The outer loop treats this as a clean termination, not a failure,
    /// but it is still representable as a terminal state.
    #[error("reached the configured maximum strain")]
    MaxStrainReached,
}

//! Periodic sheared-box geometry, structure-of-arrays node/bond storage,
//! sum-typed force and break laws, and per-tag stress bookkeeping for a
//! mechanical-rupture spring network.
//!
//! This crate has no notion of time or strain protocol; it only knows how
//! to hold a network's state and evaluate it. [`springnet-scheduler`] drives
//! it forward.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bonds;
pub mod boxgeom;
pub mod error;
pub mod network;
pub mod nodes;
pub mod sinks;
pub mod stress;
pub mod tags;
pub mod vec2;

pub use bonds::{BondInfo, BondKind, BondStore, BreakLaw, BreakRecord, ForceLaw};
pub use boxgeom::Box2;
pub use error::{Error, ProtocolError, Result};
pub use network::{Network, RestBox};
pub use nodes::{LocalIndex, NodeStore};
pub use sinks::{Column, NetworkDumpSink, TimeSeriesSink};
pub use stress::StressAccumulator;
pub use tags::{TagRegistry, TagSet, BROKEN_TAG_INDEX, NUM_TAGS};
pub use vec2::{Tensor2, Vec2};

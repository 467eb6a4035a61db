//! Loading and saving spring networks, CSV-backed output sinks, synthetic
//! lattice generation, and Morton-banded spatial partitioning.
//!
//! This crate has no opinion on *when* any of this happens — that is
//! [`springnet-scheduler`]'s job. It only reads, writes, and reshapes
//! [`springnet_core::Network`] state.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod binv2;
pub mod csvsink;
pub mod generator;
pub mod partition;

pub use csvsink::{BinV2DumpSink, CsvTimeSeriesSink};
pub use generator::generate_triangular_lattice;
pub use partition::{partition_network, Band, Partition};

//! Output sink traits. Neither sink affects simulation state; both surface
//! I/O failures as [`crate::error::Error::Io`] rather than recovering from
//! them inside the protocol.

use crate::error::Result;
use crate::network::Network;

/// One heterogeneous cell of a time-series or bond-event row.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    Str(String),
    Float(f64),
    Int(u64),
}

impl From<&str> for Column {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Column {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<f64> for Column {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<u64> for Column {
    fn from(v: u64) -> Self {
        Self::Int(v)
    }
}

impl From<usize> for Column {
    fn from(v: usize) -> Self {
        Self::Int(v as u64)
    }
}

/// A row-oriented time-series or bond-event sink. Headers are supplied once
/// at construction by the caller; `write` appends one row.
pub trait TimeSeriesSink {
    fn write(&mut self, columns: &[Column]) -> Result<()>;
}

/// A whole-network snapshot sink, written at named save points.
pub trait NetworkDumpSink {
    fn save(&mut self, net: &Network, step: u64, time: f64, tag: &str) -> Result<()>;
}

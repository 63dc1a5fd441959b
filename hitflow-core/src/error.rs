//! Error types for hitflow-core.

use thiserror::Error;

/// Result type alias for hitflow-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A direction vector was zero or not finite.
    #[error("invalid {what} vector: ({x}, {y}, {z})")]
    InvalidVector {
        what: &'static str,
        x: f64,
        y: f64,
        z: f64,
    },

    /// Readout plane height must be non-negative.
    #[error("readout plane height cannot be negative: {0}")]
    NegativeHeight(f64),

    /// The requested in-plane X axis is parallel to the plane normal.
    #[error("x-axis hint is parallel to the plane normal")]
    AxisParallelToNormal,

    /// Two hits with zero combined energy cannot be merged.
    #[error("cannot merge hits {first} and {second}: combined energy is zero")]
    DegenerateMerge { first: usize, second: usize },

    /// Invalid readout description.
    #[error("invalid readout description: {0}")]
    InvalidDescription(String),

    /// Invalid hit reduction parameters.
    #[error("invalid reduction parameters: {0}")]
    InvalidReduction(String),
}

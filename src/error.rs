//! Error types for the densification statistics update.

use thiserror::Error;

/// Errors reported before any accumulator is touched.
///
/// The update validates the whole shape contract up front, so an `Err` always
/// means the statistics are exactly as they were before the call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatsError {
    #[error("{name} has length {actual}, expected at least {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("viewspace gradient row stride must be at least 2, got {stride}")]
    GradStride { stride: usize },

    #[error("viewspace gradient buffer holds {actual} values, need at least {needed}")]
    GradTooShort { needed: usize, actual: usize },

    #[cfg(feature = "gpu")]
    #[error("GPU error: {0}")]
    Gpu(String),
}

pub type Result<T> = std::result::Result<T, StatsError>;

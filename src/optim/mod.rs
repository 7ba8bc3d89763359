//! Optimization-side bookkeeping.
//!
//! - `densify_stats`: per-point gradient statistics that drive adaptive
//!   density control (clone/split/prune decisions are made by the trainer)

pub mod densify_stats;

pub use densify_stats::{add_densification_stats, DensificationStats, FrameStats, ViewspaceGrads};

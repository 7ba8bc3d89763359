//! # splat-stats: densification statistics for Gaussian splatting
//!
//! Adaptive density control decides which Gaussians to clone, split or prune
//! from statistics gathered during training. This crate keeps those
//! statistics up to date after each backward pass, and provides the timing
//! scopes used to profile that step.
//!
//! ## Modules
//!
//! - `optim`: `DensificationStats` and the parallel CPU update
//! - `gpu`: the same update as a wgpu compute shader, plus GPU timers and
//!   debug ranges (feature-gated)
//! - `timing`: scoped wall-clock timer
//! - `config`: block size and timing switches
//! - `error`: `StatsError`

pub mod config;
pub mod error;
pub mod optim;
pub mod timing;

// GPU acceleration (optional)
#[cfg(feature = "gpu")]
pub mod gpu;

pub use config::StatsConfig;
pub use error::StatsError;
pub use optim::{add_densification_stats, DensificationStats, FrameStats, ViewspaceGrads};
pub use timing::ScopedTimer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

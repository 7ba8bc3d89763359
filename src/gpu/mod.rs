//! GPU acceleration (feature-gated).
//!
//! Only available when compiled with --features gpu
//!
//! - `context` - wgpu device/queue initialization
//! - `buffers` - GPU buffer upload/readback
//! - `shaders` - WGSL compute shaders
//! - `densify` - densification statistics update on the GPU
//! - `timer` - scoped timing of GPU work
//! - `profile` - named debug ranges for external profilers

mod buffers;
mod context;
mod densify;
mod profile;
mod shaders;
mod timer;
mod types;

pub use buffers::{create_buffer, create_buffer_init, read_buffer, read_buffer_blocking};
pub use context::GpuContext;
pub use densify::{plan_dispatch, DispatchPlan, GpuDensifyStats};
pub use profile::DebugRange;
pub use shaders::{dispatch_grid, DENSIFY_WORKGROUP_SIZE};
pub use timer::GpuTimer;
pub use types::DensifyParamsGPU;

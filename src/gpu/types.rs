//! GPU-friendly parameter blocks.
//!
//! Uploaded as-is, so layout must match the WGSL structs: `#[repr(C)]`,
//! 16-byte sized, bytemuck Pod + Zeroable.

/// Uniform block for the densification statistics shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DensifyParamsGPU {
    /// Number of points to process; invocations at or past this index return.
    pub num_points: u32,

    /// Row stride of the gradient buffer, in f32 values.
    pub grad_stride: u32,

    /// Invocations per row of the dispatch grid (workgroups_x * workgroup size).
    pub row_pitch: u32,

    pub pad: u32,
}

impl DensifyParamsGPU {
    pub fn new(num_points: u32, grad_stride: u32, row_pitch: u32) -> Self {
        Self {
            num_points,
            grad_stride,
            row_pitch,
            pad: 0,
        }
    }
}

//! WGSL shader modules.

use wgpu::{Device, ShaderModule};

/// Threads per workgroup for the densification statistics kernel.
pub const DENSIFY_WORKGROUP_SIZE: u32 = 256;

/// WGSL shader that folds one frame of viewspace gradients into the running
/// densification statistics.
///
/// One invocation per point. The new maximum and gradient norm are computed
/// unconditionally and only stored for points whose filter is set.
pub const DENSIFY_STATS_SHADER: &str = r#"
struct Params {
    num_points: u32,
    grad_stride: u32,
    row_pitch: u32,
    pad: u32,
}

@group(0) @binding(0) var<uniform> params: Params;

// Per-frame inputs
@group(0) @binding(1) var<storage, read> update_filter: array<u32>;
@group(0) @binding(2) var<storage, read> radii: array<f32>;
@group(0) @binding(3) var<storage, read> viewspace_grads: array<f32>;

// Running statistics
@group(0) @binding(4) var<storage, read_write> max_radii2d: array<f32>;
@group(0) @binding(5) var<storage, read_write> xyz_gradient_accum: array<f32>;
@group(0) @binding(6) var<storage, read_write> denom: array<f32>;

@compute @workgroup_size(256)
fn add_densification_stats(@builtin(global_invocation_id) global_id: vec3<u32>) {
    // Large clouds are dispatched as a 2D grid; flatten back to a point index.
    let idx = global_id.y * params.row_pitch + global_id.x;
    if (idx >= params.num_points) {
        return;
    }

    let new_max = max(max_radii2d[idx], radii[idx]);

    let row = idx * params.grad_stride;
    let gx = viewspace_grads[row];
    let gy = viewspace_grads[row + 1u];
    let grad_norm = sqrt(gx * gx + gy * gy);

    if (update_filter[idx] != 0u) {
        max_radii2d[idx] = new_max;
        xyz_gradient_accum[idx] = xyz_gradient_accum[idx] + grad_norm;
        denom[idx] = denom[idx] + 1.0;
    }
}
"#;

pub fn create_densify_stats_shader(device: &Device) -> ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Densify Stats Shader"),
        source: wgpu::ShaderSource::Wgsl(DENSIFY_STATS_SHADER.into()),
    })
}

/// Workgroup grid covering `num_points` invocations.
///
/// Returns `(x, y)` workgroup counts with `x <= max_groups_per_dim`; `y`
/// grows once a single row of workgroups is not enough. `None` when even
/// the 2D grid exceeds the limit.
pub fn dispatch_grid(num_points: u32, max_groups_per_dim: u32) -> Option<(u32, u32)> {
    let max_groups_per_dim = max_groups_per_dim.max(1);
    let groups = num_points.div_ceil(DENSIFY_WORKGROUP_SIZE);
    if groups <= max_groups_per_dim {
        return Some((groups, 1));
    }
    let rows = groups.div_ceil(max_groups_per_dim);
    (rows <= max_groups_per_dim).then_some((max_groups_per_dim, rows))
}

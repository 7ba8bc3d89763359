//! GPU densification statistics update.

use crate::error::{Result, StatsError};
use crate::gpu::{buffers, context::GpuContext, profile::DebugRange, shaders, types::DensifyParamsGPU};
use crate::optim::densify_stats::{check_shapes, DensificationStats, FrameStats, ViewspaceGrads};
use wgpu::{BindGroupLayout, BufferUsages, ComputePipeline, Limits};

/// Sizes and grid for one dispatch, checked against device limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchPlan {
    pub params: DensifyParamsGPU,

    /// Workgroup counts `(x, y)`.
    pub groups: (u32, u32),

    /// Gradient values uploaded (rows `0..n` at the caller's stride).
    pub grads_len: usize,
}

/// Plan a dispatch over `n` points with gradient rows of `stride` values.
///
/// Fails when any count does not fit the shader's `u32` index math, when a
/// buffer is larger than `limits` allow for one storage binding, or when the
/// workgroup grid exceeds the per-dimension limit.
pub fn plan_dispatch(n: usize, stride: usize, limits: &Limits) -> Result<DispatchPlan> {
    let too_large = |what: String| StatsError::Gpu(format!("{what} exceeds GPU limits"));

    let num_points = u32::try_from(n).map_err(|_| too_large(format!("point count {n}")))?;
    let grad_stride = u32::try_from(stride).map_err(|_| too_large(format!("gradient stride {stride}")))?;
    let grads_len = ViewspaceGrads::required_len(n, stride)
        .filter(|&len| u32::try_from(len).is_ok())
        .ok_or_else(|| too_large(format!("gradient buffer ({n} rows x {stride})")))?;

    let max_binding = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    // The gradient binding holds at least 2n values, so it is the largest one.
    let grads_bytes = grads_len as u64 * std::mem::size_of::<f32>() as u64;
    if grads_bytes > max_binding {
        return Err(StatsError::Gpu(format!(
            "viewspace gradient buffer needs {grads_bytes} bytes, GPU storage binding limit is {max_binding}"
        )));
    }

    let groups = shaders::dispatch_grid(num_points, limits.max_compute_workgroups_per_dimension)
        .ok_or_else(|| too_large(format!("dispatch grid for {n} points")))?;
    let row_pitch = groups
        .0
        .checked_mul(shaders::DENSIFY_WORKGROUP_SIZE)
        .ok_or_else(|| too_large("dispatch row pitch".to_string()))?;
    // Flattened index of the last invocation, `groups.1 * row_pitch - 1`, must fit in u32.
    if groups.1 as u64 * row_pitch as u64 > u32::MAX as u64 + 1 {
        return Err(too_large(format!("dispatch grid for {n} points")));
    }

    Ok(DispatchPlan {
        params: DensifyParamsGPU::new(num_points, grad_stride, row_pitch),
        groups,
        grads_len,
    })
}

pub struct GpuDensifyStats {
    ctx: GpuContext,
    pipeline: ComputePipeline,
    bind_group_layout: BindGroupLayout,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl GpuDensifyStats {
    /// Create a GPU context and the statistics pipeline.
    pub fn new() -> Result<Self> {
        Ok(Self::with_context(GpuContext::new_blocking()?))
    }

    pub fn with_context(ctx: GpuContext) -> Self {
        let shader = shaders::create_densify_stats_shader(&ctx.device);

        let bind_group_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Densify Stats Bind Group Layout"),
                    entries: &[
                        // Params uniform
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::COMPUTE,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                        // update_filter, radii, viewspace_grads
                        storage_entry(1, true),
                        storage_entry(2, true),
                        storage_entry(3, true),
                        // max_radii2d, xyz_gradient_accum, denom
                        storage_entry(4, false),
                        storage_entry(5, false),
                        storage_entry(6, false),
                    ],
                });

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Densify Stats Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let pipeline = ctx
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Densify Stats Pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: "add_densification_stats",
                compilation_options: Default::default(),
            });

        Self {
            ctx,
            pipeline,
            bind_group_layout,
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    /// Apply one frame to every point tracked by `stats`.
    pub fn update(&self, stats: &mut DensificationStats, frame: &FrameStats<'_>) -> Result<()> {
        let n = stats.len();
        self.add_densification_stats(
            n,
            frame,
            &mut stats.max_radii2d,
            &mut stats.xyz_gradient_accum,
            &mut stats.denom,
        )
    }

    /// GPU version of [`crate::optim::add_densification_stats`].
    ///
    /// Uploads points `0..n`, runs one invocation per point, and writes the
    /// three accumulators back. Indices `>= n` are neither uploaded nor
    /// written. On `Err` the accumulators are unchanged.
    pub fn add_densification_stats(
        &self,
        n: usize,
        frame: &FrameStats<'_>,
        max_radii2d: &mut [f32],
        xyz_gradient_accum: &mut [f32],
        denom: &mut [f32],
    ) -> Result<()> {
        check_shapes(
            n,
            frame,
            [max_radii2d.len(), xyz_gradient_accum.len(), denom.len()],
        )?;
        if n == 0 {
            return Ok(());
        }

        let device = &self.ctx.device;
        let plan = plan_dispatch(n, frame.grads.stride(), &device.limits())?;
        let grads = frame.grads.rows(n);
        let filter: Vec<u32> = frame.update_filter[..n].iter().map(|&f| f as u32).collect();

        // Anything wgpu rejects past this point is caught here instead of
        // reaching the uncaptured-error log.
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let params_buffer = buffers::create_buffer_init(
            device,
            "Densify Params Buffer",
            &[plan.params],
            BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        );
        let filter_buffer =
            buffers::create_buffer_init(device, "Update Filter Buffer", &filter, BufferUsages::STORAGE);
        let radii_buffer =
            buffers::create_buffer_init(device, "Radii Buffer", &frame.radii[..n], BufferUsages::STORAGE);
        let grads_buffer =
            buffers::create_buffer_init(device, "Viewspace Grads Buffer", grads, BufferUsages::STORAGE);

        let accum_usage = BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST;
        let max_radii_buffer =
            buffers::create_buffer_init(device, "Max Radii Buffer", &max_radii2d[..n], accum_usage);
        let grad_accum_buffer = buffers::create_buffer_init(
            device,
            "Gradient Accum Buffer",
            &xyz_gradient_accum[..n],
            accum_usage,
        );
        let denom_buffer = buffers::create_buffer_init(device, "Denom Buffer", &denom[..n], accum_usage);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Densify Stats Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: filter_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: radii_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: grads_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: max_radii_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: grad_accum_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: denom_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Densify Stats Encoder"),
        });
        {
            let mut range = DebugRange::push(&mut encoder, "add_densification_stats");
            let mut compute_pass = range.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Densify Stats Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(plan.groups.0, plan.groups.1, 1);
        }
        self.ctx.queue.submit(Some(encoder.finish()));

        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(e) = validation.or(out_of_memory) {
            return Err(StatsError::Gpu(format!("densify stats dispatch failed: {e}")));
        }

        // Read everything back before writing anything, so a failed readback
        // leaves the caller's arrays as they were.
        let queue = &self.ctx.queue;
        let new_max: Vec<f32> = buffers::read_buffer_blocking(device, queue, &max_radii_buffer, n)?;
        let new_accum: Vec<f32> = buffers::read_buffer_blocking(device, queue, &grad_accum_buffer, n)?;
        let new_denom: Vec<f32> = buffers::read_buffer_blocking(device, queue, &denom_buffer, n)?;

        max_radii2d[..n].copy_from_slice(&new_max);
        xyz_gradient_accum[..n].copy_from_slice(&new_accum);
        denom[..n].copy_from_slice(&new_denom);

        Ok(())
    }
}

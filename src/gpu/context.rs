//! GPU context management - wgpu device and queue initialization.

use crate::error::{Result, StatsError};
use wgpu::{Device, Features, Instance, Queue, RequestAdapterOptions};

pub struct GpuContext {
    pub device: Device,
    pub queue: Queue,

    /// Adapter supports timestamps written directly on command encoders.
    pub timestamps: bool,
}

impl GpuContext {
    /// Initialize GPU context asynchronously.
    ///
    /// Selects a high-performance adapter and creates a device with compute
    /// support. Timestamp queries are requested when the adapter offers them;
    /// `GpuTimer` falls back to wall-clock time otherwise.
    pub async fn new() -> Result<Self> {
        let instance = Instance::new(wgpu::InstanceDescriptor {
            backends: {
                #[cfg(target_os = "macos")]
                {
                    wgpu::Backends::METAL
                }
                #[cfg(not(target_os = "macos"))]
                {
                    wgpu::Backends::PRIMARY
                }
            },
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or_else(|| StatsError::Gpu("Failed to find GPU adapter".to_string()))?;

        let info = adapter.get_info();
        log::info!("GPU: {} ({:?})", info.name, info.backend);

        // Ask for everything the adapter offers; the densify dispatch checks
        // its buffers against these limits before uploading.
        let limits = adapter.limits();
        log::info!(
            "GPU max storage buffer binding size: {} MB",
            limits.max_storage_buffer_binding_size / (1024 * 1024)
        );

        let timestamp_features = Features::TIMESTAMP_QUERY | Features::TIMESTAMP_QUERY_INSIDE_ENCODERS;
        let timestamps = adapter.features().contains(timestamp_features);
        if !timestamps {
            log::warn!("GPU adapter has no encoder timestamp queries; timers use wall-clock time");
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Splat Stats Device"),
                    required_features: if timestamps {
                        timestamp_features
                    } else {
                        Features::empty()
                    },
                    required_limits: limits,
                },
                None,
            )
            .await
            .map_err(|e| StatsError::Gpu(format!("Failed to create device: {e}")))?;

        device.on_uncaptured_error(Box::new(|e| {
            log::error!("[wgpu] uncaptured error: {e}");
        }));

        Ok(Self {
            device,
            queue,
            timestamps,
        })
    }

    /// Blocking wrapper using pollster, for CLI tools and tests.
    pub fn new_blocking() -> Result<Self> {
        pollster::block_on(Self::new())
    }

    /// Block until all submitted work has finished.
    pub fn wait_idle(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }
}

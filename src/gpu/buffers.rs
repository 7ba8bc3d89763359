//! GPU buffer management and data upload.

use crate::error::{Result, StatsError};
use wgpu::{Buffer, BufferUsages, Device, Queue};

/// Upload data to a GPU buffer.
///
/// wgpu rejects zero-sized bindings, so an empty slice still gets one
/// zeroed element of storage.
pub fn create_buffer_init<T: bytemuck::Pod>(
    device: &Device,
    label: &str,
    data: &[T],
    usage: BufferUsages,
) -> Buffer {
    use wgpu::util::DeviceExt;

    let zero = [T::zeroed()];
    let data = if data.is_empty() { &zero[..] } else { data };

    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(data),
        usage,
    })
}

/// Create an empty buffer for output.
pub fn create_buffer(device: &Device, label: &str, size: u64, usage: BufferUsages) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage,
        mapped_at_creation: false,
    })
}

/// Read `len` elements back from a GPU buffer.
pub async fn read_buffer<T: bytemuck::Pod>(
    device: &Device,
    queue: &Queue,
    buffer: &Buffer,
    len: usize,
) -> Result<Vec<T>> {
    if len == 0 {
        return Ok(Vec::new());
    }
    let size = (len * std::mem::size_of::<T>()) as u64;

    let staging = create_buffer(
        device,
        "Staging Buffer",
        size,
        BufferUsages::MAP_READ | BufferUsages::COPY_DST,
    );

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
    queue.submit(Some(encoder.finish()));

    let (tx, rx) = futures::channel::oneshot::channel();
    staging.slice(..).map_async(wgpu::MapMode::Read, move |result| {
        tx.send(result).ok();
    });
    device.poll(wgpu::Maintain::Wait);

    rx.await
        .map_err(|_| StatsError::Gpu("Channel closed".to_string()))?
        .map_err(|e| StatsError::Gpu(format!("Buffer mapping failed: {e:?}")))?;

    let data = staging.slice(..).get_mapped_range();
    let result: Vec<T> = bytemuck::cast_slice(&data).to_vec();
    drop(data);
    staging.unmap();

    Ok(result)
}

/// Blocking wrapper for read_buffer.
pub fn read_buffer_blocking<T: bytemuck::Pod>(
    device: &Device,
    queue: &Queue,
    buffer: &Buffer,
    len: usize,
) -> Result<Vec<T>> {
    pollster::block_on(read_buffer(device, queue, buffer, len))
}

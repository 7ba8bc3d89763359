//! Scoped GPU timing.
//!
//! `GpuTimer::start` writes a start timestamp on the queue. `finish` (or drop)
//! writes the end timestamp, waits for the device, and logs the elapsed
//! milliseconds in the same format as `ScopedTimer`.
//!
//! Adapters without encoder timestamp queries fall back to draining the queue
//! and measuring wall-clock time, which includes submission overhead.

use crate::gpu::{buffers, context::GpuContext};
use crate::timing::format_elapsed;
use std::time::Instant;
use wgpu::{Buffer, BufferUsages, QuerySet};

enum TimerState {
    Timestamps { query_set: QuerySet, resolve: Buffer },
    WallClock(Instant),
}

pub struct GpuTimer<'a> {
    ctx: &'a GpuContext,
    name: Option<String>,
    state: Option<TimerState>,
}

impl<'a> GpuTimer<'a> {
    /// Start timing work submitted to `ctx.queue` from now on.
    ///
    /// A disabled timer touches neither the device nor the log.
    pub fn start(ctx: &'a GpuContext, name: Option<&str>, enabled: bool) -> Self {
        let state = if !enabled {
            None
        } else if ctx.timestamps {
            Some(Self::start_timestamps(ctx))
        } else {
            ctx.wait_idle();
            Some(TimerState::WallClock(Instant::now()))
        };

        Self {
            ctx,
            name: name.map(str::to_owned),
            state,
        }
    }

    fn start_timestamps(ctx: &GpuContext) -> TimerState {
        let query_set = ctx.device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("Timer Queries"),
            ty: wgpu::QueryType::Timestamp,
            count: 2,
        });
        let resolve = buffers::create_buffer(
            &ctx.device,
            "Timer Resolve Buffer",
            2 * wgpu::QUERY_SIZE as u64,
            BufferUsages::QUERY_RESOLVE | BufferUsages::COPY_SRC,
        );

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Timer Start Encoder"),
            });
        encoder.write_timestamp(&query_set, 0);
        ctx.queue.submit(Some(encoder.finish()));

        TimerState::Timestamps { query_set, resolve }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }

    /// Stop, wait for the GPU, log, and return the elapsed milliseconds.
    ///
    /// Returns `None` when disabled or when the timestamps could not be read.
    pub fn finish(mut self) -> Option<f64> {
        self.report()
    }

    fn report(&mut self) -> Option<f64> {
        let ms = match self.state.take()? {
            TimerState::Timestamps { query_set, resolve } => {
                self.elapsed_from_timestamps(&query_set, &resolve)?
            }
            TimerState::WallClock(start) => {
                self.ctx.wait_idle();
                start.elapsed().as_secs_f64() * 1000.0
            }
        };
        log::info!("{}", format_elapsed(self.name.as_deref(), ms));
        Some(ms)
    }

    fn elapsed_from_timestamps(&self, query_set: &QuerySet, resolve: &Buffer) -> Option<f64> {
        let ctx = self.ctx;
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Timer End Encoder"),
            });
        encoder.write_timestamp(query_set, 1);
        encoder.resolve_query_set(query_set, 0..2, resolve, 0);
        ctx.queue.submit(Some(encoder.finish()));

        let ticks: Vec<u64> = match buffers::read_buffer_blocking(&ctx.device, &ctx.queue, resolve, 2) {
            Ok(ticks) => ticks,
            Err(e) => {
                log::warn!("GPU timer readback failed: {e}");
                return None;
            }
        };

        let period_ns = ctx.queue.get_timestamp_period() as f64;
        Some(ticks[1].saturating_sub(ticks[0]) as f64 * period_ns / 1.0e6)
    }
}

impl Drop for GpuTimer<'_> {
    fn drop(&mut self) {
        self.report();
    }
}

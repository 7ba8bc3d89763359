//! Scoped wall-clock timing.
//!
//! `ScopedTimer` measures from construction until it is finished or dropped
//! and logs the elapsed milliseconds, tagged with an optional name. The GPU
//! timer in `gpu::timer` reports in the same format.

use std::time::Instant;

/// Format an elapsed time the way every timer in this crate reports it.
pub fn format_elapsed(name: Option<&str>, ms: f64) -> String {
    match name {
        Some(name) => format!("{name}: {ms:.2} ms"),
        None => format!("{ms:.2} ms"),
    }
}

pub struct ScopedTimer {
    name: Option<String>,
    start: Option<Instant>,
}

impl ScopedTimer {
    /// Start timing. A disabled timer records nothing and reports nothing.
    pub fn start(name: Option<&str>, enabled: bool) -> Self {
        Self {
            name: name.map(str::to_owned),
            start: enabled.then(Instant::now),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.start.is_some()
    }

    /// Stop, log, and return the elapsed milliseconds (`None` when disabled).
    pub fn finish(mut self) -> Option<f64> {
        self.report()
    }

    fn report(&mut self) -> Option<f64> {
        let start = self.start.take()?;
        let ms = start.elapsed().as_secs_f64() * 1000.0;
        log::info!("{}", format_elapsed(self.name.as_deref(), ms));
        Some(ms)
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        self.report();
    }
}

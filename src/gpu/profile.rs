//! Named debug ranges for external GPU profilers.
//!
//! A `DebugRange` pushes a debug group on a command encoder and pops it when
//! dropped. Tools such as RenderDoc, Xcode and Nsight show the group around the
//! commands recorded inside it. It has no effect on results.
//!
//! ```ignore
//! let mut range = DebugRange::push(&mut encoder, "densify stats");
//! {
//!     let mut pass = range.begin_compute_pass(&Default::default());
//!     // ...
//! }
//! drop(range); // pops the group
//! ```

use std::ops::{Deref, DerefMut};
use wgpu::CommandEncoder;

pub struct DebugRange<'a> {
    encoder: &'a mut CommandEncoder,
}

impl<'a> DebugRange<'a> {
    pub fn push(encoder: &'a mut CommandEncoder, name: &str) -> Self {
        encoder.push_debug_group(name);
        Self { encoder }
    }
}

impl Deref for DebugRange<'_> {
    type Target = CommandEncoder;

    fn deref(&self) -> &CommandEncoder {
        self.encoder
    }
}

impl DerefMut for DebugRange<'_> {
    fn deref_mut(&mut self) -> &mut CommandEncoder {
        self.encoder
    }
}

impl Drop for DebugRange<'_> {
    fn drop(&mut self) {
        self.encoder.pop_debug_group();
    }
}

//! Densification statistics (per-point gradient accumulation).
//!
//! After every backward pass the trainer folds the screen-space gradient of
//! each visible Gaussian into three running arrays:
//! - `max_radii2d`: largest projected radius seen so far
//! - `xyz_gradient_accum`: sum of |dL/d(mean_2d)|
//! - `denom`: how many steps contributed to the sum
//!
//! Density control later reads `xyz_gradient_accum / denom` to decide which
//! Gaussians to clone or split.
//!
//! Every point is independent, so the update is a plain parallel map over
//! fixed-size blocks of indices.

use crate::config::StatsConfig;
use crate::error::{Result, StatsError};
use crate::timing::ScopedTimer;
use nalgebra::Vector2;
use rayon::prelude::*;

/// Read-only view of per-point screen-space gradients.
///
/// Row `i` starts at `data[i * stride]` and holds `(gx, gy)` in its first two
/// values. Any extra values in a row (padding, depth gradient, ...) are ignored.
#[derive(Clone, Copy, Debug)]
pub struct ViewspaceGrads<'a> {
    data: &'a [f32],
    stride: usize,
}

impl<'a> ViewspaceGrads<'a> {
    /// Wrap a flat buffer with the given row stride (in `f32` values).
    pub fn new(data: &'a [f32], stride: usize) -> Self {
        Self { data, stride }
    }

    /// Tightly packed `[gx0, gy0, gx1, gy1, ...]`.
    pub fn contiguous(data: &'a [f32]) -> Self {
        Self::new(data, 2)
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    /// Number of values needed to hold `n` rows, `None` if that overflows.
    pub fn required_len(n: usize, stride: usize) -> Option<usize> {
        if n == 0 {
            return Some(0);
        }
        (n - 1).checked_mul(stride)?.checked_add(2)
    }

    /// Stride and length are only checked when there is at least one row.
    fn validate(&self, n: usize) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        if self.stride < 2 {
            return Err(StatsError::GradStride {
                stride: self.stride,
            });
        }
        let actual = self.data.len();
        match Self::required_len(n, self.stride) {
            Some(needed) if actual >= needed => Ok(()),
            needed => Err(StatsError::GradTooShort {
                needed: needed.unwrap_or(usize::MAX),
                actual,
            }),
        }
    }

    /// The values covering rows `0..n`. Only meaningful after `validate(n)`.
    pub(crate) fn rows(&self, n: usize) -> &'a [f32] {
        match Self::required_len(n, self.stride) {
            Some(len) if len <= self.data.len() => &self.data[..len],
            _ => self.data,
        }
    }

    /// Gradient of point `i`. Panics if the row is out of range.
    ///
    /// For `i < n` after a successful `validate(n)`, `i * stride + 1` cannot
    /// overflow.
    pub fn get(&self, i: usize) -> Vector2<f32> {
        let base = i * self.stride;
        Vector2::new(self.data[base], self.data[base + 1])
    }
}

/// Per-call inputs produced by the renderer for the current frame.
///
/// None of these are retained after the update.
#[derive(Clone, Copy, Debug)]
pub struct FrameStats<'a> {
    /// Points that took part in this step.
    pub update_filter: &'a [bool],

    /// Projected screen-space radius per point.
    pub radii: &'a [f32],

    /// Gradient of the loss w.r.t. each projected 2D mean.
    pub grads: ViewspaceGrads<'a>,
}

fn check_len(name: &'static str, expected: usize, actual: usize) -> Result<()> {
    if actual < expected {
        return Err(StatsError::LengthMismatch {
            name,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Check every input against `n` points. `accum_lens` are the lengths of
/// `max_radii2d`, `xyz_gradient_accum` and `denom`, in that order.
pub(crate) fn check_shapes(n: usize, frame: &FrameStats<'_>, accum_lens: [usize; 3]) -> Result<()> {
    check_len("update_filter", n, frame.update_filter.len())?;
    check_len("radii", n, frame.radii.len())?;
    check_len("max_radii2d", n, accum_lens[0])?;
    check_len("xyz_gradient_accum", n, accum_lens[1])?;
    check_len("denom", n, accum_lens[2])?;
    frame.grads.validate(n)
}

/// Fold one frame of gradients into the running statistics for points `0..n`.
///
/// For every `i < n` with `update_filter[i]` set:
/// - `max_radii2d[i] = max(max_radii2d[i], radii[i])`
/// - `xyz_gradient_accum[i] += |grads[i]|`
/// - `denom[i] += 1`
///
/// Points with the filter unset, and every index `>= n`, are left untouched.
/// All lengths are checked before anything is written, so on `Err` the
/// accumulators are unchanged.
///
/// The index space is split into blocks of `block_size` points processed in
/// parallel; the last block may be partial.
pub fn add_densification_stats(
    n: usize,
    frame: &FrameStats<'_>,
    max_radii2d: &mut [f32],
    xyz_gradient_accum: &mut [f32],
    denom: &mut [f32],
    block_size: usize,
) -> Result<()> {
    check_shapes(
        n,
        frame,
        [max_radii2d.len(), xyz_gradient_accum.len(), denom.len()],
    )?;

    if n == 0 {
        return Ok(());
    }

    let block_size = block_size.max(1);
    let filter = frame.update_filter;
    let radii = frame.radii;
    let grads = frame.grads;

    max_radii2d[..n]
        .par_chunks_mut(block_size)
        .zip(xyz_gradient_accum[..n].par_chunks_mut(block_size))
        .zip(denom[..n].par_chunks_mut(block_size))
        .enumerate()
        .for_each(|(block, ((max_r, accum), den))| {
            let base = block * block_size;
            for j in 0..max_r.len() {
                let i = base + j;
                if !filter[i] {
                    continue;
                }
                max_r[j] = max_r[j].max(radii[i]);
                accum[j] += grads.get(i).norm();
                den[j] += 1.0;
            }
        });

    Ok(())
}

/// Running densification statistics for a Gaussian cloud.
///
/// Lives as long as the cloud; `resize` keeps it in step when Gaussians are
/// added or pruned and `reset` clears it after a densify step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DensificationStats {
    pub max_radii2d: Vec<f32>,
    pub xyz_gradient_accum: Vec<f32>,
    pub denom: Vec<f32>,
}

impl DensificationStats {
    pub fn new(num_points: usize) -> Self {
        Self {
            max_radii2d: vec![0.0; num_points],
            xyz_gradient_accum: vec![0.0; num_points],
            denom: vec![0.0; num_points],
        }
    }

    pub fn len(&self) -> usize {
        self.denom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.denom.is_empty()
    }

    /// Apply one frame to every tracked point.
    pub fn update(&mut self, frame: &FrameStats<'_>, config: &StatsConfig) -> Result<()> {
        let n = self.len();
        let _timer = ScopedTimer::start(Some("densification stats"), config.enable_timing);
        add_densification_stats(
            n,
            frame,
            &mut self.max_radii2d,
            &mut self.xyz_gradient_accum,
            &mut self.denom,
            config.block_size,
        )
    }

    /// Mean gradient magnitude per point (0 for points never updated).
    ///
    /// Panics if `xyz_gradient_accum` and `denom` differ in length.
    pub fn average_grads(&self) -> Vec<f32> {
        assert_eq!(
            self.xyz_gradient_accum.len(),
            self.denom.len(),
            "xyz_gradient_accum and denom length mismatch"
        );
        self.xyz_gradient_accum
            .par_iter()
            .zip(self.denom.par_iter())
            .map(|(&sum, &count)| if count > 0.0 { sum / count } else { 0.0 })
            .collect()
    }

    pub fn reset(&mut self) {
        self.max_radii2d.fill(0.0);
        self.xyz_gradient_accum.fill(0.0);
        self.denom.fill(0.0);
    }

    /// Grow with zeroed entries or truncate to `num_points`.
    pub fn resize(&mut self, num_points: usize) {
        self.max_radii2d.resize(num_points, 0.0);
        self.xyz_gradient_accum.resize(num_points, 0.0);
        self.denom.resize(num_points, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn example_stats() -> DensificationStats {
        DensificationStats {
            max_radii2d: vec![3.0, 3.0, 3.0],
            xyz_gradient_accum: vec![0.0; 3],
            denom: vec![0.0; 3],
        }
    }

    #[test]
    fn test_three_point_example() {
        let mut stats = example_stats();
        let filter = [true, false, true];
        let radii = [5.0, 9.0, 2.0];
        let grads = [3.0, 4.0, 0.0, 0.0, 1.0, 0.0];
        let frame = FrameStats {
            update_filter: &filter,
            radii: &radii,
            grads: ViewspaceGrads::contiguous(&grads),
        };

        stats.update(&frame, &StatsConfig::default()).unwrap();

        assert_eq!(stats.max_radii2d, vec![5.0, 3.0, 3.0]);
        assert_relative_eq!(stats.xyz_gradient_accum[0], 5.0);
        assert_eq!(stats.xyz_gradient_accum[1], 0.0);
        assert_relative_eq!(stats.xyz_gradient_accum[2], 1.0);
        assert_eq!(stats.denom, vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_repeated_update_accumulates() {
        // Running sums, not idempotent: the second call adds the same delta again.
        let mut stats = example_stats();
        let filter = [true, true, true];
        let radii = [1.0, 1.0, 1.0];
        let grads = [3.0, 4.0, 0.0, 2.0, 1.0, 0.0];
        let frame = FrameStats {
            update_filter: &filter,
            radii: &radii,
            grads: ViewspaceGrads::contiguous(&grads),
        };
        let cfg = StatsConfig::default();

        stats.update(&frame, &cfg).unwrap();
        stats.update(&frame, &cfg).unwrap();

        assert_relative_eq!(stats.xyz_gradient_accum[0], 10.0);
        assert_relative_eq!(stats.xyz_gradient_accum[1], 4.0);
        assert_relative_eq!(stats.xyz_gradient_accum[2], 2.0);
        assert_eq!(stats.denom, vec![2.0, 2.0, 2.0]);
        assert_eq!(stats.max_radii2d, vec![3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_zero_points_is_noop() {
        let mut max_r: Vec<f32> = vec![7.0];
        let mut accum: Vec<f32> = vec![7.0];
        let mut denom: Vec<f32> = vec![7.0];
        let frame = FrameStats {
            update_filter: &[],
            radii: &[],
            grads: ViewspaceGrads::contiguous(&[]),
        };

        add_densification_stats(0, &frame, &mut max_r, &mut accum, &mut denom, 512).unwrap();

        assert_eq!(max_r, vec![7.0]);
        assert_eq!(accum, vec![7.0]);
        assert_eq!(denom, vec![7.0]);
    }

    #[test]
    fn test_strided_rows_ignore_padding() {
        let mut stats = DensificationStats::new(2);
        let filter = [true, true];
        let radii = [1.0, 2.0];
        // Rows of [gx, gy, pad, pad]; padding must not leak into the norm.
        let grads = [3.0, 4.0, 100.0, 100.0, 0.0, 1.0, -50.0, 9.0];
        let frame = FrameStats {
            update_filter: &filter,
            radii: &radii,
            grads: ViewspaceGrads::new(&grads, 4),
        };

        stats.update(&frame, &StatsConfig::default()).unwrap();

        assert_relative_eq!(stats.xyz_gradient_accum[0], 5.0);
        assert_relative_eq!(stats.xyz_gradient_accum[1], 1.0);
    }

    #[test]
    fn test_last_row_may_omit_padding() {
        // (n - 1) * stride + 2 values are enough.
        assert_eq!(ViewspaceGrads::required_len(3, 4), Some(10));
        assert_eq!(ViewspaceGrads::required_len(0, 4), Some(0));
        assert_eq!(ViewspaceGrads::required_len(3, usize::MAX), None);

        let grads = [0.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 3.0];
        let view = ViewspaceGrads::new(&grads, 4);
        assert!(view.validate(3).is_ok());
        assert_eq!(view.get(2), Vector2::new(0.0, 3.0));
    }

    #[test]
    fn test_bad_stride_rejected() {
        let mut stats = DensificationStats::new(1);
        let frame = FrameStats {
            update_filter: &[true],
            radii: &[1.0],
            grads: ViewspaceGrads::new(&[1.0, 1.0], 1),
        };

        let err = stats.update(&frame, &StatsConfig::default()).unwrap_err();
        assert_eq!(err, StatsError::GradStride { stride: 1 });
        assert_eq!(stats, DensificationStats::new(1));
    }

    #[test]
    fn test_overflowing_stride_rejected_before_any_write() {
        let mut stats = DensificationStats {
            max_radii2d: vec![0.0; 2],
            xyz_gradient_accum: vec![0.0; 2],
            denom: vec![0.0; 2],
        };
        let frame = FrameStats {
            update_filter: &[true, true],
            radii: &[1.0, 1.0],
            grads: ViewspaceGrads::new(&[3.0, 4.0], usize::MAX),
        };

        let err = stats.update(&frame, &StatsConfig::default()).unwrap_err();
        assert_eq!(
            err,
            StatsError::GradTooShort {
                needed: usize::MAX,
                actual: 2
            }
        );
        assert_eq!(stats, DensificationStats::new(2));
    }

    #[test]
    fn test_large_stride_single_row_is_valid() {
        // One row never multiplies by the stride.
        let mut stats = DensificationStats::new(1);
        let frame = FrameStats {
            update_filter: &[true],
            radii: &[1.0],
            grads: ViewspaceGrads::new(&[3.0, 4.0], usize::MAX),
        };

        stats.update(&frame, &StatsConfig::default()).unwrap();
        assert_relative_eq!(stats.xyz_gradient_accum[0], 5.0);
    }

    #[test]
    fn test_zero_points_ignores_stride() {
        let mut max_r: Vec<f32> = vec![];
        let mut accum: Vec<f32> = vec![];
        let mut denom: Vec<f32> = vec![];
        let frame = FrameStats {
            update_filter: &[],
            radii: &[],
            grads: ViewspaceGrads::new(&[], 0),
        };

        assert!(add_densification_stats(0, &frame, &mut max_r, &mut accum, &mut denom, 512).is_ok());
    }

    #[test]
    fn test_short_radii_rejected_before_any_write() {
        let mut stats = DensificationStats::new(3);
        let frame = FrameStats {
            update_filter: &[true, true, true],
            radii: &[1.0, 1.0],
            grads: ViewspaceGrads::contiguous(&[1.0; 6]),
        };

        let err = stats.update(&frame, &StatsConfig::default()).unwrap_err();
        assert_eq!(
            err,
            StatsError::LengthMismatch {
                name: "radii",
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(stats, DensificationStats::new(3));
    }

    #[test]
    fn test_average_grads() {
        let stats = DensificationStats {
            max_radii2d: vec![0.0; 3],
            xyz_gradient_accum: vec![6.0, 0.0, 1.5],
            denom: vec![3.0, 0.0, 1.0],
        };
        assert_eq!(stats.average_grads(), vec![2.0, 0.0, 1.5]);
    }

    #[test]
    #[should_panic(expected = "length mismatch")]
    fn test_average_grads_rejects_mismatched_lengths() {
        let stats = DensificationStats {
            max_radii2d: vec![0.0; 3],
            xyz_gradient_accum: vec![1.0, 2.0, 3.0],
            denom: vec![1.0, 1.0],
        };
        stats.average_grads();
    }

    #[test]
    fn test_reset_and_resize() {
        let mut stats = example_stats();
        stats.denom[1] = 4.0;

        stats.resize(5);
        assert_eq!(stats.len(), 5);
        assert_eq!(stats.max_radii2d, vec![3.0, 3.0, 3.0, 0.0, 0.0]);
        assert_eq!(stats.denom[1], 4.0);

        stats.reset();
        assert_eq!(stats, DensificationStats::new(5));

        stats.resize(0);
        assert!(stats.is_empty());
    }
}

// ============================================================================
// redacto-core/src/redaction.rs
// ============================================================================
//
// REDACTION: Obscuring Rectangular Regions of a Frame
//
// A redactor mutates a frame in place so that a rectangular region no longer
// carries identifying detail. The provided implementation applies a heavy
// Gaussian blur to the region only, treating it as a standalone image so
// that neighbouring pixels neither leak in nor change.
//
// KEY COMPONENTS:
// - RedactionRegion: in-bounds rectangle produced by clamping a detection
// - RegionRedactor: trait injected into the pipeline
// - GaussianRedactor: separable two-pass blur, rows processed with rayon

use crate::error::{CoreError, CoreResult};
use crate::frame::{CHANNELS, Frame};

use rayon::prelude::*;

/// Reference blur kernel size (pixels, square).
pub const DEFAULT_KERNEL_SIZE: u32 = 99;

/// Reference Gaussian standard deviation.
pub const DEFAULT_SIGMA: f64 = 30.0;

/// Largest accepted kernel size.
pub const MAX_KERNEL_SIZE: u32 = 2001;

/// Rectangle in frame pixel coordinates, `x`/`y` being the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedactionRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RedactionRegion {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Whether the pixel `(x, y)` lies inside the region.
    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x - self.x < self.width && y - self.y < self.height
    }

    /// The part of the region that lies inside a `width` x `height` frame.
    fn within(&self, width: u32, height: u32) -> Option<RedactionRegion> {
        let x2 = self.x.saturating_add(self.width).min(width);
        let y2 = self.y.saturating_add(self.height).min(height);
        if self.x >= x2 || self.y >= y2 {
            return None;
        }
        Some(RedactionRegion {
            x: self.x,
            y: self.y,
            width: x2 - self.x,
            height: y2 - self.y,
        })
    }
}

/// Obscures one rectangular region of a frame in place.
///
/// Implementations must leave every pixel outside `region` untouched and
/// must treat an empty region as a no-op.
pub trait RegionRedactor: Send + Sync {
    fn redact(&self, frame: &mut Frame, region: &RedactionRegion);
}

/// Heavy Gaussian blur confined to the region.
#[derive(Debug, Clone)]
pub struct GaussianRedactor {
    kernel: Vec<f32>,
    sigma: f64,
}

impl GaussianRedactor {
    /// Builds a redactor with a `kernel_size` x `kernel_size` kernel.
    ///
    /// Even sizes are bumped to the next odd size. Fails when the size is
    /// zero or above [`MAX_KERNEL_SIZE`], or `sigma` is not a positive
    /// finite number.
    pub fn new(kernel_size: u32, sigma: f64) -> CoreResult<Self> {
        if kernel_size == 0 || kernel_size > MAX_KERNEL_SIZE {
            return Err(CoreError::Config(format!(
                "blur kernel size must be between 1 and {MAX_KERNEL_SIZE}, got {kernel_size}"
            )));
        }
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(CoreError::Config(format!("blur sigma must be positive, got {sigma}")));
        }

        let size = normalize_kernel_size(kernel_size);
        if size != kernel_size {
            log::debug!("Blur kernel size {} is even, using {}", kernel_size, size);
        }

        Ok(Self {
            kernel: gaussian_kernel(size, sigma),
            sigma,
        })
    }

    #[must_use]
    pub fn kernel_size(&self) -> u32 {
        self.kernel.len() as u32
    }

    #[must_use]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl Default for GaussianRedactor {
    fn default() -> Self {
        Self {
            kernel: gaussian_kernel(DEFAULT_KERNEL_SIZE, DEFAULT_SIGMA),
            sigma: DEFAULT_SIGMA,
        }
    }
}

impl RegionRedactor for GaussianRedactor {
    fn redact(&self, frame: &mut Frame, region: &RedactionRegion) {
        let Some(region) = region.within(frame.width, frame.height) else {
            return;
        };

        let width = region.width as usize;
        let height = region.height as usize;
        let row_len = width * CHANNELS;
        let frame_stride = frame.stride();
        let x_offset = region.x as usize * CHANNELS;
        let y_offset = region.y as usize;

        let mut pixels = vec![0f32; row_len * height];
        for (row, out) in pixels.chunks_mut(row_len).enumerate() {
            let start = (y_offset + row) * frame_stride + x_offset;
            for (value, byte) in out.iter_mut().zip(&frame.data()[start..start + row_len]) {
                *value = f32::from(*byte);
            }
        }

        let mut scratch = vec![0f32; row_len * height];
        scratch
            .par_chunks_mut(row_len)
            .zip(pixels.par_chunks(row_len))
            .for_each(|(out, input)| self.blur_row(input, out, width));

        let radius = (self.kernel.len() / 2) as i64;
        pixels.par_chunks_mut(row_len).enumerate().for_each(|(row, out)| {
            out.fill(0.0);
            for (tap, weight) in self.kernel.iter().enumerate() {
                let source_row = reflect101(row as i64 + tap as i64 - radius, height);
                let source = &scratch[source_row * row_len..(source_row + 1) * row_len];
                for (value, sample) in out.iter_mut().zip(source) {
                    *value += weight * sample;
                }
            }
        });

        let data = frame.data_mut();
        for (row, blurred) in pixels.chunks(row_len).enumerate() {
            let start = (y_offset + row) * frame_stride + x_offset;
            for (byte, value) in data[start..start + row_len].iter_mut().zip(blurred) {
                *byte = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

impl GaussianRedactor {
    fn blur_row(&self, input: &[f32], out: &mut [f32], width: usize) {
        let radius = (self.kernel.len() / 2) as i64;
        for x in 0..width {
            let mut sum = [0f32; CHANNELS];
            for (tap, weight) in self.kernel.iter().enumerate() {
                let source = reflect101(x as i64 + tap as i64 - radius, width) * CHANNELS;
                for (channel, total) in sum.iter_mut().enumerate() {
                    *total += weight * input[source + channel];
                }
            }
            out[x * CHANNELS..(x + 1) * CHANNELS].copy_from_slice(&sum);
        }
    }
}

/// Rounds even kernel sizes up to the next odd size.
#[must_use]
pub fn normalize_kernel_size(size: u32) -> u32 {
    if size % 2 == 0 { size.saturating_add(1) } else { size }
}

/// Normalised 1-D Gaussian weights.
fn gaussian_kernel(size: u32, sigma: f64) -> Vec<f32> {
    let center = f64::from(size - 1) / 2.0;
    let scale = 2.0 * sigma * sigma;
    let weights: Vec<f64> = (0..size)
        .map(|i| {
            let d = f64::from(i) - center;
            (-(d * d) / scale).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / total) as f32).collect()
}

/// Maps an out-of-range index back into `0..len` by mirroring around the
/// edge pixels without repeating them (`2 1 | 0 1 2 3 | 2 1`).
fn reflect101(index: i64, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as i64 - 1);
    let mut folded = index.rem_euclid(period);
    if folded >= len as i64 {
        folded = period - folded;
    }
    folded as usize
}

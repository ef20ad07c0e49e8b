//! Decoded frame and stream geometry types.
//!
//! Frames travel through the pipeline as packed RGB24 buffers. The geometry
//! read from the input when it is opened is the contract every frame pushed
//! to the output must satisfy.

use crate::error::{CoreError, CoreResult};

use std::fmt;

/// Bytes per pixel of the packed RGB24 layout used for all frames.
pub const CHANNELS: usize = 3;

/// Rational frame rate as reported by the container (e.g. `30000/1001`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    #[must_use]
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Whole frames per second.
    #[must_use]
    pub fn from_fps(fps: u32) -> Self {
        Self { num: fps, den: 1 }
    }

    /// Parses the `num/den` form used by ffprobe. Plain numbers are accepted
    /// too. Returns `None` for zero or malformed rates (ffprobe reports `0/0`
    /// when the rate is unknown).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let (num, den) = match value.split_once('/') {
            Some((num, den)) => (num.trim().parse::<u32>().ok()?, den.trim().parse::<u32>().ok()?),
            None => (value.parse::<u32>().ok()?, 1),
        };
        if num == 0 || den == 0 {
            return None;
        }
        Some(Self { num, den })
    }

    #[must_use]
    pub fn as_f64(&self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Closest rate whose numerator is at most `max_num`.
    ///
    /// The numerator is the denominator of the encoded stream's time base,
    /// which some encoders bound (MPEG-4 Part 2 allows at most 65535).
    /// Rates already within the bound are only reduced to lowest terms.
    #[must_use]
    pub fn limit_numerator(&self, max_num: u32) -> Self {
        let divisor = gcd(self.num, self.den).max(1);
        let (num, den) = (self.num / divisor, self.den / divisor);
        if num <= max_num || max_num == 0 {
            return Self { num, den };
        }
        // Approximate the time base den/num, then invert it back.
        let (tb_num, tb_den) = closest_fraction(u64::from(den), u64::from(num), u64::from(max_num));
        match (u32::try_from(tb_den), u32::try_from(tb_num)) {
            (Ok(num), Ok(den)) if num > 0 && den > 0 => Self { num, den },
            _ => Self { num, den },
        }
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Best rational approximation of `num / den` with a denominator of at
/// most `max_den`, found by walking the continued fraction expansion.
fn closest_fraction(num: u64, den: u64, max_den: u64) -> (u64, u64) {
    let (mut p0, mut q0, mut p1, mut q1) = (0u64, 1u64, 1u64, 0u64);
    let (mut n, mut d) = (num, den);
    while d != 0 {
        let a = n / d;
        let q2 = q0 + a * q1;
        if q2 > max_den {
            break;
        }
        (p0, q0, p1, q1) = (p1, q1, p0 + a * p1, q2);
        (n, d) = (d, n - a * d);
    }
    if q1 == 0 {
        return (num, den);
    }
    let k = (max_den - q0) / q1;
    let lower = (p0 + k * p1, q0 + k * q1);
    let upper = (p1, q1);

    // |a/b - num/den| scaled by b * den, compared by cross multiplication.
    let error = |(a, b): (u64, u64)| (i128::from(a) * i128::from(den) - i128::from(num) * i128::from(b)).abs();
    let lower_distance = error(lower) * i128::from(upper.1);
    let upper_distance = error(upper) * i128::from(lower.1);
    if upper_distance <= lower_distance || lower.0 == 0 { upper } else { lower }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Spatial and temporal properties of a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoGeometry {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    /// Declared number of frames. Best effort: some containers report no
    /// count or an estimate that differs from what actually decodes.
    pub total_frames: Option<u64>,
    /// `total_frames` was derived from duration and rate rather than read
    /// from the container. Such a count only drives progress and never
    /// limits how many frames are processed.
    pub frame_count_estimated: bool,
}

impl VideoGeometry {
    /// Size in bytes of one RGB24 frame of this geometry.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * CHANNELS
    }

    /// Whether a frame has exactly this width and height.
    #[must_use]
    pub fn matches(&self, frame: &Frame) -> bool {
        frame.width == self.width && frame.height == self.height
    }
}

/// One decoded image of the video, in RGB24.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Zero-based position of the frame in decode order.
    pub index: u64,
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wraps a packed RGB24 buffer. Fails if the buffer length does not
    /// match `width * height * 3`.
    pub fn from_rgb(index: u64, width: u32, height: u32, data: Vec<u8>) -> CoreResult<Self> {
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(CoreError::Write {
                frame_index: index,
                reason: format!(
                    "buffer holds {} bytes, {}x{} RGB24 needs {}",
                    data.len(),
                    width,
                    height,
                    expected
                ),
            });
        }
        Ok(Self {
            index,
            width,
            height,
            data,
        })
    }

    /// A frame where every pixel has the same colour.
    #[must_use]
    pub fn filled(index: u64, width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();
        Self {
            index,
            width,
            height,
            data,
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Bytes per row.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.width as usize * CHANNELS
    }

    /// Returns the pixel at `(x, y)`, or `None` outside the frame.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride() + x as usize * CHANNELS;
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ])
    }

    /// Sets the pixel at `(x, y)`. Coordinates outside the frame are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = y as usize * self.stride() + x as usize * CHANNELS;
        self.data[offset..offset + CHANNELS].copy_from_slice(&rgb);
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

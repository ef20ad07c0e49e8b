// ============================================================================
// redacto-core/src/media/mod.rs
// ============================================================================
//
// MEDIA: Frame Sources, Frame Sinks and the Backend that Opens Them
//
// The pipeline never talks to ffmpeg directly. It asks a MediaBackend for a
// FrameSource over the input and a FrameSink over the output, so tests can
// swap in the in-memory backend from `crate::mocks`.
//
// KEY COMPONENTS:
// - FrameSource: forward-only, finite stream of decoded frames
// - FrameSink: geometry-checked frame consumer producing an encoded video
// - MediaBackend: factory for both, with associated types
// - FfmpegBackend: ffmpeg/ffprobe implementation

pub mod command;
pub mod decoder;
pub mod encoder;
pub mod probe;

pub use decoder::FfmpegFrameSource;
pub use encoder::FfmpegFrameSink;
pub use probe::{VideoProbe, probe_video};

use crate::config::OutputCodec;
use crate::error::{CoreError, CoreResult};
use crate::frame::{Frame, VideoGeometry};

use std::path::Path;

/// A decodable input video.
pub trait FrameSource {
    /// Geometry read when the source was opened. Trusted as the output
    /// contract.
    fn geometry(&self) -> &VideoGeometry;

    /// Next frame in decode order, or `Ok(None)` at end of stream. Keeps
    /// returning `Ok(None)` once the stream has ended.
    fn next_frame(&mut self) -> CoreResult<Option<Frame>>;

    /// Releases the underlying decoder. Safe to call more than once.
    fn close(&mut self);
}

/// A writable output video.
pub trait FrameSink {
    fn geometry(&self) -> &VideoGeometry;

    /// Appends a frame. Fails with a write error when the frame does not
    /// match [`FrameSink::geometry`] or the sink is closed.
    fn write_frame(&mut self, frame: &Frame) -> CoreResult<()>;

    /// Flushes and finalizes the container. Only the first call can fail.
    fn close(&mut self) -> CoreResult<()>;
}

/// Opens sources and sinks for the pipeline.
pub trait MediaBackend {
    type Source: FrameSource;
    type Sink: FrameSink;

    fn open_source(&self, path: &Path) -> CoreResult<Self::Source>;

    fn open_sink(&self, path: &Path, geometry: &VideoGeometry) -> CoreResult<Self::Sink>;
}

/// Checks that `frame` can be written to a sink of `geometry`.
pub fn check_frame_geometry(geometry: &VideoGeometry, frame: &Frame) -> CoreResult<()> {
    if !geometry.matches(frame) {
        return Err(CoreError::Write {
            frame_index: frame.index,
            reason: format!(
                "frame is {}x{}, output expects {}x{}",
                frame.width, frame.height, geometry.width, geometry.height
            ),
        });
    }
    if frame.data().len() != geometry.frame_len() {
        return Err(CoreError::Write {
            frame_index: frame.index,
            reason: format!(
                "frame holds {} bytes, output expects {}",
                frame.data().len(),
                geometry.frame_len()
            ),
        });
    }
    Ok(())
}

/// ffmpeg-backed media I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend {
    pub codec: OutputCodec,
}

impl FfmpegBackend {
    #[must_use]
    pub fn new(codec: OutputCodec) -> Self {
        Self { codec }
    }
}

impl MediaBackend for FfmpegBackend {
    type Source = FfmpegFrameSource;
    type Sink = FfmpegFrameSink;

    fn open_source(&self, path: &Path) -> CoreResult<Self::Source> {
        FfmpegFrameSource::open(path)
    }

    fn open_sink(&self, path: &Path, geometry: &VideoGeometry) -> CoreResult<Self::Sink> {
        FfmpegFrameSink::open(path, geometry, self.codec)
    }
}

//! Playback bridge traits and supporting media types.
//!
//! These abstractions let the playback engine drive a host decoder, a host
//! audio device and host display widgets without knowing anything about
//! container formats, audio APIs or GUI toolkits. Every call is synchronous:
//! the engine invokes them from dedicated actor threads, so implementations
//! may block for as long as the underlying device does.

use crate::{
    error::Result,
    platform::{PlatformSend, PlatformSendSync},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Media formats
// ============================================================================

/// Pixel layout of decoded video images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Geometry and layout of the video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl VideoFormat {
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            width,
            height,
            pixel_format,
        }
    }

    /// Size in bytes of one decoded image.
    pub fn image_size(&self) -> usize {
        self.width as usize * self.height as usize * self.pixel_format.bytes_per_pixel()
    }
}

/// Interleaved PCM format produced by the decoder and consumed by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in hertz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Bits per sample.
    pub bits_per_sample: u16,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Bytes per sample frame (one sample for every channel).
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize).div_ceil(8)
    }

    pub fn bytes_per_second(&self) -> usize {
        self.bytes_per_frame() * self.sample_rate as usize
    }
}

/// Immutable metadata of an opened media resource.
///
/// Fetched once when the decoder opens the file and cached for the life of
/// that media resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub video: Option<VideoFormat>,
    pub audio: Option<AudioFormat>,
    pub duration: Duration,
    /// Frames per second of the decode sequence.
    pub frame_rate: f64,
}

impl MediaInfo {
    /// Number of decodable frames, `ceil(duration * frame_rate)`.
    pub fn frame_count(&self) -> u64 {
        if self.frame_rate <= 0.0 {
            return 0;
        }
        let exact = self.duration.as_secs_f64() * self.frame_rate;
        // Guard against 249.99999 style rounding noise before taking the ceiling.
        let rounded = exact.round();
        if (exact - rounded).abs() < 1e-6 {
            rounded as u64
        } else {
            exact.ceil() as u64
        }
    }

    /// Real-time length of one frame period.
    pub fn frame_period(&self) -> Duration {
        if self.frame_rate <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(1.0 / self.frame_rate)
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }
}

// ============================================================================
// Decoded buffers
// ============================================================================

/// One decoded video image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Decoded PCM bytes covering one frame period.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioChunk {
    pub data: Vec<u8>,
}

impl AudioChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Payload classification of a [`FrameBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    Empty,
    Video,
    Audio,
    AudioVideo,
    EndOfMedia,
}

/// A single decoded unit: the video image and the audio span of one frame
/// period, or an end-of-media marker.
///
/// Buffers live in the frame pool for the whole session. Decoders fill them in
/// place through [`FrameBuffer::set_video`] and [`FrameBuffer::set_audio`],
/// which reuse the allocations left behind by [`FrameBuffer::reset`].
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pub video: Option<VideoImage>,
    pub audio: Option<AudioChunk>,
    /// Stream time of the frame as reported by the decoder.
    pub timestamp: Duration,
    pub end_of_media: bool,
    spare_pixels: Vec<u8>,
    spare_samples: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the payload while keeping its allocations for the next fill.
    pub fn reset(&mut self) {
        if let Some(image) = self.video.take() {
            self.spare_pixels = image.pixels;
            self.spare_pixels.clear();
        }
        if let Some(chunk) = self.audio.take() {
            self.spare_samples = chunk.data;
            self.spare_samples.clear();
        }
        self.timestamp = Duration::ZERO;
        self.end_of_media = false;
    }

    pub fn set_video(&mut self, width: u32, height: u32, pixels: &[u8]) {
        let mut storage = match self.video.take() {
            Some(image) => image.pixels,
            None => std::mem::take(&mut self.spare_pixels),
        };
        storage.clear();
        storage.extend_from_slice(pixels);
        self.video = Some(VideoImage {
            width,
            height,
            pixels: storage,
        });
    }

    pub fn set_audio(&mut self, samples: &[u8]) {
        let mut storage = match self.audio.take() {
            Some(chunk) => chunk.data,
            None => std::mem::take(&mut self.spare_samples),
        };
        storage.clear();
        storage.extend_from_slice(samples);
        self.audio = Some(AudioChunk { data: storage });
    }

    /// Turn the buffer into an end-of-media marker.
    pub fn mark_end_of_media(&mut self, timestamp: Duration) {
        self.reset();
        self.timestamp = timestamp;
        self.end_of_media = true;
    }

    pub fn kind(&self) -> FrameKind {
        if self.end_of_media {
            return FrameKind::EndOfMedia;
        }
        match (self.video.is_some(), self.audio.is_some()) {
            (true, true) => FrameKind::AudioVideo,
            (true, false) => FrameKind::Video,
            (false, true) => FrameKind::Audio,
            (false, false) => FrameKind::Empty,
        }
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Host decoder bound to one opened media resource.
///
/// The engine serialises every call on the frame fetcher thread.
pub trait MediaDecoder: PlatformSend {
    /// Formats, duration and frame rate of the opened resource.
    fn media_info(&self) -> MediaInfo;

    /// Position the decode cursor at or before `target`.
    ///
    /// Decoders that can only land on keyframes return the stream time they
    /// actually landed on, which may precede `target`.
    fn seek(&mut self, target: Duration) -> Result<Duration>;

    /// Decode the next frame period into `buffer`.
    ///
    /// At the end of the stream the buffer is marked end-of-media rather than
    /// an error being returned.
    fn read_next_frame(&mut self, buffer: &mut FrameBuffer) -> Result<()>;

    /// Release decoder resources.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens decoders for media paths.
pub trait DecoderFactory: PlatformSendSync {
    fn open(&self, path: &Path) -> Result<Box<dyn MediaDecoder>>;
}

// ============================================================================
// Audio sink
// ============================================================================

/// Asynchronous notifications emitted by an [`AudioSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SinkEvent {
    /// The device actually began consuming samples.
    Started,
    /// The device stopped consuming samples.
    Stopped,
}

/// Callback receiving [`SinkEvent`]s, possibly from a device thread.
pub type SinkEventHandler = Box<dyn Fn(SinkEvent) + Send + Sync>;

/// Host audio output line.
pub trait AudioSink: PlatformSend {
    fn open(&mut self, format: &AudioFormat) -> Result<()>;

    /// Install the handler for start/stop notifications.
    fn set_event_handler(&mut self, handler: SinkEventHandler);

    /// Bytes the device can accept without blocking.
    fn available_bytes(&self) -> usize;

    /// Write as much of `data` as the device accepts and return the count.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    /// Discard samples queued in the device but not yet played.
    fn flush(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Creates audio sinks. Absent on hosts without audio output.
pub trait AudioOutput: PlatformSendSync {
    fn create_sink(&self) -> Result<Box<dyn AudioSink>>;
}

// ============================================================================
// Display
// ============================================================================

/// Identifier of a host display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(Uuid);

impl SurfaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SurfaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of the most recently rendered image, pulled by surfaces on repaint.
pub trait FrameSource: PlatformSendSync {
    /// Run `f` against the current image without copying it.
    ///
    /// Returns `false` when nothing has been rendered yet.
    fn with_latest_image(&self, f: &mut dyn FnMut(&VideoImage)) -> bool;

    /// Copy of the current image.
    fn latest_image(&self) -> Option<VideoImage> {
        let mut latest = None;
        self.with_latest_image(&mut |image| latest = Some(image.clone()));
        latest
    }
}

/// Host widget that displays video.
pub trait DisplaySurface: PlatformSendSync {
    fn id(&self) -> SurfaceId;

    /// Make this the active surface, pulling images from `source`.
    fn activate(&self, source: Arc<dyn FrameSource>);

    fn deactivate(&self);

    /// Ask the widget to repaint; it pulls the latest image when it does.
    fn request_repaint(&self);
}

//! Synthetic collaborators shared by the integration tests.
//!
//! `SyntheticDecoder` produces frames whose pixels encode their sequence
//! number, `RecordingSink` accepts audio instantly and records every call,
//! and `ManualClock` only moves when a test advances it.

#![allow(dead_code)]

use bridge_traits::{
    AudioFormat, AudioOutput, AudioSink, BridgeError, Clock, DecoderFactory, DisplaySurface,
    FrameBuffer, FrameSource, MediaDecoder, MediaInfo, PixelFormat, SinkEvent, SinkEventHandler,
    SurfaceId, VideoFormat,
};
use core_playback::EngineConfig;
use core_runtime::CoreConfig;
use mockall::mock;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// Decoder
// ============================================================================

#[derive(Debug, Clone)]
pub struct MediaSpec {
    pub duration: Duration,
    pub fps: f64,
    pub video: bool,
    pub audio: bool,
    /// Keyframe interval in frames; seeks land on the keyframe at or before
    /// the target.
    pub gop: u64,
}

impl MediaSpec {
    pub fn new(seconds: u64, fps: f64) -> Self {
        Self {
            duration: Duration::from_secs(seconds),
            fps,
            video: true,
            audio: false,
            gop: 1,
        }
    }

    pub fn with_audio(mut self) -> Self {
        self.audio = true;
        self
    }

    pub fn audio_only(mut self) -> Self {
        self.video = false;
        self.audio = true;
        self
    }

    pub fn gop(mut self, gop: u64) -> Self {
        self.gop = gop.max(1);
        self
    }

    pub fn info(&self, path: &Path) -> MediaInfo {
        MediaInfo {
            path: path.to_path_buf(),
            video: self
                .video
                .then(|| VideoFormat::new(2, 1, PixelFormat::Rgba8)),
            audio: self.audio.then(audio_format),
            duration: self.duration,
            frame_rate: self.fps,
        }
    }
}

pub fn audio_format() -> AudioFormat {
    AudioFormat::new(8_000, 1, 16)
}

/// Decoded pixels of frame `seq`: its sequence number, little endian.
pub fn pixels_of(seq: u64) -> [u8; 8] {
    seq.to_le_bytes()
}

/// Sequence number encoded in a decoded image.
pub fn seq_of(pixels: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&pixels[..8]);
    u64::from_le_bytes(bytes)
}

/// Counters shared between a factory, its decoders and the test.
#[derive(Debug, Default)]
pub struct DecoderCounters {
    pub opens: AtomicU64,
    pub closes: AtomicU64,
    pub seeks: AtomicU64,
    pub reads: AtomicU64,
}

impl DecoderCounters {
    pub fn seeks(&self) -> u64 {
        self.seeks.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }
}

pub struct SyntheticDecoder {
    info: MediaInfo,
    gop: u64,
    cursor: u64,
    audio_bytes: usize,
    fail_at: Option<u64>,
    counters: Arc<DecoderCounters>,
}

impl SyntheticDecoder {
    fn frame_count(&self) -> u64 {
        self.info.frame_count()
    }
}

impl MediaDecoder for SyntheticDecoder {
    fn media_info(&self) -> MediaInfo {
        self.info.clone()
    }

    fn seek(&mut self, target: Duration) -> bridge_traits::error::Result<Duration> {
        self.counters.seeks.fetch_add(1, Ordering::SeqCst);
        let seq = (target.as_secs_f64() * self.info.frame_rate + 1e-4).floor() as u64;
        let keyframe = (seq / self.gop) * self.gop;
        self.cursor = keyframe.min(self.frame_count());
        Ok(Duration::from_secs_f64(self.cursor as f64 / self.info.frame_rate))
    }

    fn read_next_frame(&mut self, buffer: &mut FrameBuffer) -> bridge_traits::error::Result<()> {
        if self.fail_at == Some(self.cursor) {
            return Err(BridgeError::OperationFailed(format!(
                "corrupt packet at frame {}",
                self.cursor
            )));
        }
        if self.cursor >= self.frame_count() {
            return Err(BridgeError::EndOfStream);
        }
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        let seq = self.cursor;
        buffer.timestamp = Duration::from_secs_f64(seq as f64 / self.info.frame_rate);
        if self.info.has_video() {
            buffer.set_video(2, 1, &pixels_of(seq));
        }
        if self.info.has_audio() {
            let samples = vec![(seq % 251) as u8; self.audio_bytes];
            buffer.set_audio(&samples);
        }
        self.cursor += 1;
        Ok(())
    }

    fn close(&mut self) -> bridge_traits::error::Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Opens `SyntheticDecoder`s. Paths containing "missing" fail to open.
pub struct SyntheticFactory {
    spec: MediaSpec,
    fail_at: Option<u64>,
    pub counters: Arc<DecoderCounters>,
}

impl SyntheticFactory {
    pub fn new(spec: MediaSpec) -> Self {
        Self {
            spec,
            fail_at: None,
            counters: Arc::new(DecoderCounters::default()),
        }
    }

    /// Fail every read of frame `seq`.
    pub fn failing_at(mut self, seq: u64) -> Self {
        self.fail_at = Some(seq);
        self
    }
}

impl DecoderFactory for SyntheticFactory {
    fn open(&self, path: &Path) -> bridge_traits::error::Result<Box<dyn MediaDecoder>> {
        if path.to_string_lossy().contains("missing") {
            return Err(BridgeError::NotAvailable(format!(
                "no such file: {}",
                path.display()
            )));
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        let audio_bytes = audio_format().bytes_per_second() / self.spec.fps.max(1.0) as usize;
        Ok(Box::new(SyntheticDecoder {
            info: self.spec.info(path),
            gop: self.spec.gop,
            cursor: 0,
            audio_bytes,
            fail_at: self.fail_at,
            counters: Arc::clone(&self.counters),
        }))
    }
}

// ============================================================================
// Audio
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Open(AudioFormat),
    Write(usize),
    Start,
    Stop,
    Pause,
    Flush,
    Close,
}

#[derive(Default)]
pub struct SinkLog {
    pub calls: Mutex<Vec<SinkCall>>,
    /// First byte of every chunk written, in write order.
    pub chunk_heads: Mutex<Vec<u8>>,
    pub fail_start: AtomicBool,
    pub fail_open: AtomicBool,
    /// Swallow started/stopped notifications.
    pub silent: AtomicBool,
    pub capacity: AtomicU64,
}

impl SinkLog {
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &SinkCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn bytes_written(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .map(|call| match call {
                SinkCall::Write(n) => *n,
                _ => 0,
            })
            .sum()
    }
}

/// Sink that accepts everything instantly and reports start/stop at once.
pub struct RecordingSink {
    log: Arc<SinkLog>,
    handler: Option<SinkEventHandler>,
}

impl RecordingSink {
    fn notify(&self, event: SinkEvent) {
        if self.log.silent.load(Ordering::SeqCst) {
            return;
        }
        if let Some(handler) = &self.handler {
            handler(event);
        }
    }
}

impl AudioSink for RecordingSink {
    fn open(&mut self, format: &AudioFormat) -> bridge_traits::error::Result<()> {
        if self.log.fail_open.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAvailable("no audio device".to_string()));
        }
        self.log.calls.lock().push(SinkCall::Open(*format));
        Ok(())
    }

    fn set_event_handler(&mut self, handler: SinkEventHandler) {
        self.handler = Some(handler);
    }

    fn available_bytes(&self) -> usize {
        self.log.capacity.load(Ordering::SeqCst) as usize
    }

    fn write(&mut self, data: &[u8]) -> bridge_traits::error::Result<usize> {
        self.log.calls.lock().push(SinkCall::Write(data.len()));
        if let Some(head) = data.first() {
            self.log.chunk_heads.lock().push(*head);
        }
        Ok(data.len())
    }

    fn start(&mut self) -> bridge_traits::error::Result<()> {
        if self.log.fail_start.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("device lost".to_string()));
        }
        self.log.calls.lock().push(SinkCall::Start);
        self.notify(SinkEvent::Started);
        Ok(())
    }

    fn stop(&mut self) -> bridge_traits::error::Result<()> {
        self.log.calls.lock().push(SinkCall::Stop);
        self.notify(SinkEvent::Stopped);
        Ok(())
    }

    fn pause(&mut self) -> bridge_traits::error::Result<()> {
        self.log.calls.lock().push(SinkCall::Pause);
        Ok(())
    }

    fn flush(&mut self) -> bridge_traits::error::Result<()> {
        self.log.calls.lock().push(SinkCall::Flush);
        Ok(())
    }

    fn close(&mut self) -> bridge_traits::error::Result<()> {
        self.log.calls.lock().push(SinkCall::Close);
        Ok(())
    }
}

pub struct RecordingOutput {
    pub log: Arc<SinkLog>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        let log = SinkLog::default();
        log.capacity.store(1 << 20, Ordering::SeqCst);
        Self { log: Arc::new(log) }
    }
}

impl AudioOutput for RecordingOutput {
    fn create_sink(&self) -> bridge_traits::error::Result<Box<dyn AudioSink>> {
        Ok(Box::new(RecordingSink {
            log: Arc::clone(&self.log),
            handler: None,
        }))
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Clock that only moves when advanced.
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

// ============================================================================
// Display surface
// ============================================================================

mock! {
    pub Surface {}

    impl DisplaySurface for Surface {
        fn id(&self) -> SurfaceId;
        fn activate(&self, source: Arc<dyn FrameSource>);
        fn deactivate(&self);
        fn request_repaint(&self);
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn media_path(name: &str) -> PathBuf {
    PathBuf::from("/media/clips").join(name)
}

pub fn core_config(
    factory: Arc<SyntheticFactory>,
    output: Option<Arc<RecordingOutput>>,
    clock: Arc<ManualClock>,
) -> CoreConfig {
    let mut builder = CoreConfig::builder().decoder_factory(factory).clock(clock);
    if let Some(output) = output {
        builder = builder.audio_output(output);
    }
    builder.build().expect("valid core config")
}

/// Small pool and fast ticks; never aborts on fatal faults.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        pool_size: 32,
        block_size: 4,
        prefetch_blocks: 1,
        audio_prefetch_buffers: 2,
        audio_lookahead_frames: 6,
        tick_interval: Duration::from_millis(2),
        seek_animation: Duration::from_millis(100),
        audio_start_timeout: Duration::from_millis(500),
        request_timeout: Duration::from_secs(5),
        abort_on_invariant_violation: false,
        idle_wait: Duration::from_millis(5),
        ..EngineConfig::default()
    }
}

/// Poll `condition` until it holds or five seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("core_playback=debug")
        .try_init();
}

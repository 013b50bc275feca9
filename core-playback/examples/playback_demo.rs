//! # Playback Engine Example
//!
//! Plays a synthetic five second clip in a loop for a few seconds, printing
//! position and state changes, then dumps cache statistics.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioFormat, AudioOutput, AudioSink, BridgeError, ConsoleLogger, DecoderFactory, FrameBuffer,
    LogLevel, MediaDecoder, MediaInfo, PixelFormat, SinkEvent, SinkEventHandler, VideoFormat,
};
use core_playback::{EngineConfig, LoopBounds, OpenOptions, PlaybackEngine};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::CoreConfig;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 36;
const FPS: f64 = 30.0;

// ============================================================================
// Synthetic decoder
// ============================================================================

/// Decodes a moving gradient with a square-wave tone.
struct GradientDecoder {
    info: MediaInfo,
    next: u64,
    pixels: Vec<u8>,
}

impl MediaDecoder for GradientDecoder {
    fn media_info(&self) -> MediaInfo {
        self.info.clone()
    }

    fn seek(&mut self, target: Duration) -> BridgeResult<Duration> {
        // Keyframe every 15 frames.
        let seq = (target.as_secs_f64() * FPS).floor() as u64;
        self.next = seq - seq % 15;
        Ok(Duration::from_secs_f64(self.next as f64 / FPS))
    }

    fn read_next_frame(&mut self, buffer: &mut FrameBuffer) -> BridgeResult<()> {
        if self.next >= self.info.frame_count() {
            return Err(BridgeError::EndOfStream);
        }
        let shift = (self.next % 256) as u8;
        for (i, pixel) in self.pixels.chunks_exact_mut(4).enumerate() {
            let x = (i as u32 % WIDTH) as u8;
            pixel.copy_from_slice(&[x.wrapping_mul(4).wrapping_add(shift), shift, 128, 255]);
        }
        buffer.set_video(WIDTH, HEIGHT, &self.pixels);

        let format = AudioFormat::new(48_000, 2, 16);
        let bytes = format.bytes_per_second() / FPS as usize;
        let tone: Vec<u8> = (0..bytes)
            .map(|i| if (i / 64) % 2 == 0 { 0x20 } else { 0xE0 })
            .collect();
        buffer.set_audio(&tone);
        buffer.timestamp = Duration::from_secs_f64(self.next as f64 / FPS);
        self.next += 1;
        Ok(())
    }
}

struct GradientFactory;

impl DecoderFactory for GradientFactory {
    fn open(&self, path: &Path) -> BridgeResult<Box<dyn MediaDecoder>> {
        let video = VideoFormat::new(WIDTH, HEIGHT, PixelFormat::Rgba8);
        Ok(Box::new(GradientDecoder {
            info: MediaInfo {
                path: path.to_path_buf(),
                video: Some(video),
                audio: Some(AudioFormat::new(48_000, 2, 16)),
                duration: Duration::from_secs(5),
                frame_rate: FPS,
            },
            next: 0,
            pixels: vec![0; video.image_size()],
        }))
    }
}

// ============================================================================
// Simulated audio device
// ============================================================================

/// Drains its buffer at the real-time byte rate of the opened format.
struct SimulatedSink {
    rate: usize,
    buffered: usize,
    capacity: usize,
    playing_since: Option<Instant>,
    handler: Option<SinkEventHandler>,
}

impl SimulatedSink {
    fn drain(&mut self) {
        if let Some(since) = self.playing_since {
            let played = (since.elapsed().as_secs_f64() * self.rate as f64) as usize;
            self.buffered = self.buffered.saturating_sub(played);
            self.playing_since = Some(Instant::now());
        }
    }
}

impl AudioSink for SimulatedSink {
    fn open(&mut self, format: &AudioFormat) -> BridgeResult<()> {
        self.rate = format.bytes_per_second();
        self.capacity = self.rate / 4;
        Ok(())
    }

    fn set_event_handler(&mut self, handler: SinkEventHandler) {
        self.handler = Some(handler);
    }

    fn available_bytes(&self) -> usize {
        let played = self
            .playing_since
            .map(|since| (since.elapsed().as_secs_f64() * self.rate as f64) as usize)
            .unwrap_or(0);
        self.capacity
            .saturating_sub(self.buffered.saturating_sub(played))
    }

    fn write(&mut self, data: &[u8]) -> BridgeResult<usize> {
        self.drain();
        let accepted = data.len().min(self.capacity.saturating_sub(self.buffered));
        self.buffered += accepted;
        Ok(accepted)
    }

    fn start(&mut self) -> BridgeResult<()> {
        self.playing_since = Some(Instant::now());
        if let Some(handler) = &self.handler {
            handler(SinkEvent::Started);
        }
        Ok(())
    }

    fn stop(&mut self) -> BridgeResult<()> {
        self.playing_since = None;
        if let Some(handler) = &self.handler {
            handler(SinkEvent::Stopped);
        }
        Ok(())
    }

    fn pause(&mut self) -> BridgeResult<()> {
        self.drain();
        self.playing_since = None;
        Ok(())
    }

    fn flush(&mut self) -> BridgeResult<()> {
        self.buffered = 0;
        Ok(())
    }

    fn close(&mut self) -> BridgeResult<()> {
        Ok(())
    }
}

struct SimulatedOutput;

impl AudioOutput for SimulatedOutput {
    fn create_sink(&self) -> BridgeResult<Box<dyn AudioSink>> {
        Ok(Box::new(SimulatedSink {
            rate: 0,
            buffered: 0,
            capacity: 0,
            playing_since: None,
            handler: None,
        }))
    }
}

// ============================================================================
// Demo
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Warnings and errors are mirrored to stderr with their actor span.
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_logger_sink(Arc::new(ConsoleLogger::new(LogLevel::Warn))),
    )?;

    let core = CoreConfig::builder()
        .decoder_factory(Arc::new(GradientFactory))
        .audio_output(Arc::new(SimulatedOutput))
        .fault_handler(|fault| eprintln!("fault: {fault}"))
        .build()?;
    let engine = PlaybackEngine::new(core, EngineConfig::default())?;

    engine.add_state_listener(|state| println!("state    -> {state}"))?;
    engine.add_position_listener({
        let mut last_second = None;
        move |update| {
            let second = update.position.as_secs();
            if last_second != Some(second) {
                last_second = Some(second);
                println!(
                    "position -> {:>5} ms (loop {}..{} ms)",
                    update.position.as_millis(),
                    update.min.as_millis(),
                    update.max.as_millis()
                );
            }
        }
    })?;

    let bounds = LoopBounds::from_millis(1_000, 3_000)?;
    let info = engine.open("demo/gradient.raw", OpenOptions::new().loop_bounds(bounds))?;
    println!(
        "opened {} frames at {} fps, audio: {}",
        info.frame_count(),
        info.frame_rate,
        info.has_audio()
    );

    engine.start()?;
    thread::sleep(Duration::from_secs(3));

    engine.set_position(Duration::from_millis(2_500), true)?;
    thread::sleep(Duration::from_secs(1));

    engine.set_speed(2.0)?;
    thread::sleep(Duration::from_secs(1));

    let status = engine.status()?;
    println!("status: {}", serde_json::to_string_pretty(&status)?);
    println!("cache:  {}", serde_json::to_string_pretty(&engine.cache_stats()?)?);

    engine.close();
    Ok(())
}

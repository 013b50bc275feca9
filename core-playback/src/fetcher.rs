//! Frame fetcher: the only component that talks to the decoder.
//!
//! One fetcher is bound to one open media file. It fills whole cache blocks:
//! seek to the block's base time, decode forward past whatever the decoder's
//! keyframe landing left before the base, then decode one frame per slot.

use crate::cache::pool::FetchOrder;
use crate::error::PlaybackError;
use crate::frame::CachedFrame;
use crate::timeline::FrameRate;
use bridge_traits::{BridgeError, DecoderFactory, FrameBuffer, MediaDecoder, MediaInfo};
use core_actor::{Actor, ActorError, Context, ReplyTo};
use core_runtime::logging::display_path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Fetcher mailbox protocol.
pub enum FetcherMsg {
    Fill(FillRequest),
    /// One-shot metadata query. Does not disturb the decode cursor.
    QueryInfo(ReplyTo<MediaInfo>),
}

/// Order to fill one block.
///
/// Always answered: completing it sends a [`FillReport`], and dropping it
/// unprocessed (fetcher stopped or never started) reports a failure, so the
/// block never stays `fetching` forever.
pub struct FillRequest {
    order: FetchOrder,
    reply: Option<ReplyTo<FillReport>>,
}

impl FillRequest {
    pub fn new(order: FetchOrder, reply: ReplyTo<FillReport>) -> Self {
        Self {
            order,
            reply: Some(reply),
        }
    }

    pub fn base_seq(&self) -> u64 {
        self.order.base_seq
    }

    pub fn frames(&self) -> &[Arc<CachedFrame>] {
        &self.order.frames
    }

    fn complete(mut self, outcome: Result<FillTelemetry, String>) {
        if let Some(reply) = self.reply.take() {
            reply.reply(self.report(outcome));
        }
    }

    fn report(&self, outcome: Result<FillTelemetry, String>) -> FillReport {
        FillReport {
            slot: self.order.slot,
            generation: self.order.generation,
            base_seq: self.order.base_seq,
            outcome,
        }
    }
}

impl Drop for FillRequest {
    fn drop(&mut self) {
        if let Some(reply) = self.reply.take() {
            reply.reply(self.report(Err("fill request dropped unprocessed".to_string())));
        }
    }
}

/// Result of one fill, sent back to the cache.
#[derive(Debug, Clone)]
pub struct FillReport {
    pub slot: usize,
    pub generation: u64,
    pub base_seq: u64,
    pub outcome: Result<FillTelemetry, String>,
}

/// Timing and decode counts of one fill.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillTelemetry {
    /// Stream time of the block's first frame.
    pub requested: Duration,
    /// Where the decoder actually landed. `None` when no seek was needed.
    pub landed: Option<Duration>,
    pub decoded: usize,
    /// Frames decoded between the landing point and the block base.
    pub skipped: usize,
    pub end_of_media: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct Totals {
    fills: u64,
    seeks: u64,
    decoded: u64,
    skipped: u64,
}

/// The frame fetcher actor.
pub struct FrameFetcher {
    path: PathBuf,
    factory: Arc<dyn DecoderFactory>,
    decoder: Option<Box<dyn MediaDecoder>>,
    info: Option<MediaInfo>,
    frame_rate: Option<FrameRate>,
    /// Sequence number the decoder produces next, when known.
    cursor: Option<u64>,
    scratch: FrameBuffer,
    totals: Totals,
}

impl FrameFetcher {
    pub fn new(path: impl Into<PathBuf>, factory: Arc<dyn DecoderFactory>) -> Self {
        Self {
            path: path.into(),
            factory,
            decoder: None,
            info: None,
            frame_rate: None,
            cursor: None,
            scratch: FrameBuffer::new(),
            totals: Totals::default(),
        }
    }

    fn fill(&mut self, request: &FillRequest) -> Result<FillTelemetry, PlaybackError> {
        let started = Instant::now();
        let (frame_count, rate) = match (&self.info, self.frame_rate) {
            (Some(info), Some(rate)) => (info.frame_count(), rate),
            _ => return Err(PlaybackError::NoMediaOpen),
        };
        let base = request.base_seq();
        let mut telemetry = FillTelemetry {
            requested: rate.time_of(base),
            ..Default::default()
        };

        // Past the last frame: answer without touching the decoder.
        if base >= frame_count {
            for (i, frame) in request.frames().iter().enumerate() {
                let seq = base + i as u64;
                let mut data = frame.write();
                data.seq = seq;
                data.buffer.mark_end_of_media(rate.time_of(seq));
            }
            telemetry.end_of_media = request.frames().len();
            telemetry.elapsed = started.elapsed();
            return Ok(telemetry);
        }

        let decoder = self.decoder.as_mut().ok_or(PlaybackError::NoMediaOpen)?;
        let continued = self.cursor.take() == Some(base);
        let mut ended = false;

        if !continued {
            let landed = decoder
                .seek(telemetry.requested)
                .map_err(|e| PlaybackError::Seek {
                    target: telemetry.requested,
                    reason: e.to_string(),
                })?;
            self.totals.seeks += 1;
            telemetry.landed = Some(landed);

            let mut next = rate.seq_at(landed);
            if next > base {
                warn!(
                    requested_ms = telemetry.requested.as_millis() as u64,
                    landed_ms = landed.as_millis() as u64,
                    "Decoder landed past the requested frame"
                );
                next = base;
            }
            while next < base {
                self.scratch.reset();
                match decoder.read_next_frame(&mut self.scratch) {
                    Ok(()) => {}
                    Err(BridgeError::EndOfStream) => self.scratch.end_of_media = true,
                    Err(e) => return Err(decode_error(next, e)),
                }
                if self.scratch.end_of_media {
                    ended = true;
                    break;
                }
                next += 1;
                telemetry.skipped += 1;
            }
        }

        for (i, frame) in request.frames().iter().enumerate() {
            let seq = base + i as u64;
            let mut data = frame.write();
            data.seq = seq;
            if ended || seq >= frame_count {
                data.buffer.mark_end_of_media(rate.time_of(seq));
                telemetry.end_of_media += 1;
                continue;
            }

            data.buffer.reset();
            match decoder.read_next_frame(&mut data.buffer) {
                Ok(()) => {}
                Err(BridgeError::EndOfStream) => data.buffer.mark_end_of_media(rate.time_of(seq)),
                Err(e) => return Err(decode_error(seq, e)),
            }
            if data.buffer.end_of_media {
                ended = true;
                telemetry.end_of_media += 1;
            } else {
                telemetry.decoded += 1;
            }
        }

        if !ended {
            self.cursor = Some(base + request.frames().len() as u64);
        }
        telemetry.elapsed = started.elapsed();
        Ok(telemetry)
    }
}

fn decode_error(seq: u64, err: BridgeError) -> PlaybackError {
    PlaybackError::Decode {
        seq,
        reason: err.to_string(),
    }
}

impl Actor for FrameFetcher {
    type Message = FetcherMsg;

    fn on_start(&mut self, _ctx: &Context<FetcherMsg>) -> Result<(), ActorError> {
        let file = display_path(&self.path);
        let mut decoder = self
            .factory
            .open(&self.path)
            .map_err(|e| PlaybackError::MediaOpen {
                file: file.clone(),
                reason: e.to_string(),
            })?;
        let info = decoder.media_info();
        let frame_rate = match FrameRate::new(info.frame_rate) {
            Ok(rate) => rate,
            Err(e) => {
                if let Err(close_err) = decoder.close() {
                    warn!(file = %file, error = %close_err, "Failed to close rejected decoder");
                }
                return Err(e.into());
            }
        };

        info!(
            file = %file,
            duration_ms = info.duration.as_millis() as u64,
            fps = info.frame_rate,
            frames = info.frame_count(),
            video = info.has_video(),
            audio = info.has_audio(),
            "Decoder opened"
        );
        self.decoder = Some(decoder);
        self.info = Some(info);
        self.frame_rate = Some(frame_rate);
        Ok(())
    }

    fn on_message(&mut self, message: FetcherMsg, _ctx: &Context<FetcherMsg>) -> Result<(), ActorError> {
        match message {
            FetcherMsg::Fill(request) => match self.fill(&request) {
                Ok(telemetry) => {
                    self.totals.fills += 1;
                    self.totals.decoded += telemetry.decoded as u64;
                    self.totals.skipped += telemetry.skipped as u64;
                    debug!(
                        base_seq = request.base_seq(),
                        requested_ms = telemetry.requested.as_millis() as u64,
                        landed_ms = telemetry.landed.map(|t| t.as_millis() as u64),
                        decoded = telemetry.decoded,
                        skipped = telemetry.skipped,
                        end_of_media = telemetry.end_of_media,
                        elapsed_ms = telemetry.elapsed.as_millis() as u64,
                        "Block filled"
                    );
                    request.complete(Ok(telemetry));
                }
                Err(e) => {
                    request.complete(Err(e.to_string()));
                    return Err(e.into());
                }
            },
            FetcherMsg::QueryInfo(reply) => {
                if let Some(info) = &self.info {
                    reply.reply(info.clone());
                }
            }
        }
        Ok(())
    }

    fn on_stop(&mut self, _ctx: &Context<FetcherMsg>) -> Result<(), ActorError> {
        if let Some(mut decoder) = self.decoder.take() {
            decoder.close().map_err(PlaybackError::from)?;
        }
        info!(
            fills = self.totals.fills,
            seeks = self.totals.seeks,
            decoded = self.totals.decoded,
            skipped = self.totals.skipped,
            "Frame fetcher stopped"
        );
        Ok(())
    }
}


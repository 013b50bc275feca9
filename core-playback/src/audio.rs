//! # Audio Renderer
//!
//! Feeds audio-bearing frames to the platform sink in sequence order.
//!
//! Leases may arrive in any order; they wait in a reorder map until every
//! earlier sequence number has been consumed. Writes are paced by the sink's
//! reported free space and continue from `on_idle` until each frame's samples
//! are exhausted, at which point the lease is dropped and the frame recycled.
//!
//! Sink playback starts once `Play` was requested *and* the prefetch
//! threshold of queued buffers is met, and it starts exactly once per
//! session. The sink's asynchronous started/stopped notifications are
//! forwarded to the controller as [`AudioUpdate`]; they, not the requests,
//! say whether audio is actually running.
//!
//! Sessions are numbered by the controller and opened with `Reset`. Every
//! `Reset`, `Stop` and `Flush` also bumps an internal generation. Each
//! `start()` on the sink remembers the generation it was issued in, and a
//! `Started` notification is forwarded only while that generation is still
//! current. A sink that reports late therefore cannot mark a newer session
//! as playing.

use crate::config::EngineConfig;
use crate::error::PlaybackError;
use crate::frame::FrameLease;
use bridge_traits::{AudioFormat, AudioOutput, AudioSink, BridgeError, SinkEvent};
use core_actor::{Actor, ActorError, ActorRef, Context};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// How often queued samples are offered to a full sink.
const WRITE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Renderer state as observed from the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioStatus {
    Playing,
    Stopped,
    /// The device failed; playback continues without audio.
    Unavailable,
}

/// A status change, tagged with the session it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioUpdate {
    pub session: u64,
    pub status: AudioStatus,
}

/// Receives every status change.
pub type AudioStatusCallback = Box<dyn Fn(AudioUpdate) + Send>;

/// Audio renderer mailbox protocol.
pub enum AudioMsg {
    /// Create and open a sink for a new media format.
    Open(AudioFormat),
    /// Start feed `session` whose first frame is `next_seq`.
    Reset { next_seq: u64, session: u64 },
    Enqueue(FrameLease),
    Play,
    Stop,
    Flush,
    Close,
    /// Notification from the sink's own thread.
    Sink(SinkEvent),
}

struct PendingBuffer {
    lease: FrameLease,
    written: usize,
}

/// The audio renderer actor.
pub struct AudioRenderer {
    output: Arc<dyn AudioOutput>,
    on_status: AudioStatusCallback,
    prefetch_threshold: usize,
    idle_wait: Duration,
    sink: Option<Box<dyn AudioSink>>,
    reorder: BTreeMap<u64, FrameLease>,
    queue: VecDeque<PendingBuffer>,
    next_seq: u64,
    /// A feed is open; set by `Reset`, cleared by `Stop`.
    accepting: bool,
    ended: bool,
    play_requested: bool,
    started: bool,
    /// Samples were written since the last flush.
    dirty: bool,
    bytes_written: u64,
    /// Session id from the last `Reset`.
    session: u64,
    generation: u64,
    /// Generation of every `start()` whose `Started` has not arrived yet.
    pending_starts: VecDeque<u64>,
}

impl AudioRenderer {
    pub fn new(
        output: Arc<dyn AudioOutput>,
        config: &EngineConfig,
        on_status: AudioStatusCallback,
    ) -> Self {
        Self {
            output,
            on_status,
            prefetch_threshold: config.audio_prefetch_buffers.max(1),
            idle_wait: config.idle_wait,
            sink: None,
            reorder: BTreeMap::new(),
            queue: VecDeque::new(),
            next_seq: 0,
            accepting: false,
            ended: false,
            play_requested: false,
            started: false,
            dirty: false,
            bytes_written: 0,
            session: 0,
            generation: 0,
            pending_starts: VecDeque::new(),
        }
    }

    fn handle(&mut self, message: AudioMsg, myself: &ActorRef<AudioMsg>) -> Result<(), PlaybackError> {
        match message {
            AudioMsg::Open(format) => self.open(format, myself),
            AudioMsg::Reset { next_seq, session } => {
                self.session = session;
                self.generation += 1;
                self.reorder.clear();
                self.queue.clear();
                self.next_seq = next_seq;
                self.accepting = self.sink.is_some();
                self.ended = false;
                Ok(())
            }
            AudioMsg::Enqueue(lease) => self.enqueue(lease),
            AudioMsg::Play => {
                self.play_requested = true;
                self.maybe_start()
            }
            AudioMsg::Stop => self.stop(),
            AudioMsg::Flush => {
                self.generation += 1;
                self.flush()
            }
            AudioMsg::Close => {
                let stopped = self.stop();
                self.close_sink();
                stopped
            }
            AudioMsg::Sink(event) => {
                self.sink_event(event);
                Ok(())
            }
        }
    }

    fn sink_event(&mut self, event: SinkEvent) {
        let status = match event {
            SinkEvent::Started => {
                let issued = self.pending_starts.pop_front();
                if issued != Some(self.generation) || !self.started {
                    debug!(
                        session = self.session,
                        ?issued,
                        current = self.generation,
                        "Ignoring stale audio sink start"
                    );
                    return;
                }
                AudioStatus::Playing
            }
            SinkEvent::Stopped => AudioStatus::Stopped,
        };
        debug!(session = self.session, ?status, "Audio sink reported");
        self.report(status);
    }

    fn report(&self, status: AudioStatus) {
        (self.on_status)(AudioUpdate {
            session: self.session,
            status,
        });
    }

    fn open(&mut self, format: AudioFormat, myself: &ActorRef<AudioMsg>) -> Result<(), PlaybackError> {
        self.stop()?;
        self.close_sink();
        self.pending_starts.clear();

        let mut sink = match self.output.create_sink() {
            Ok(sink) => sink,
            Err(e) => return Err(self.fail(device_error(e))),
        };
        if let Err(e) = sink.open(&format) {
            return Err(self.fail(device_error(e)));
        }
        let events = myself.clone();
        sink.set_event_handler(Box::new(move |event| events.send(AudioMsg::Sink(event))));

        info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            bits = format.bits_per_sample,
            "Audio sink opened"
        );
        self.sink = Some(sink);
        Ok(())
    }

    fn enqueue(&mut self, lease: FrameLease) -> Result<(), PlaybackError> {
        if !self.accepting || self.ended || lease.seq() < self.next_seq {
            trace!(seq = lease.seq(), "Dropping audio frame outside the current feed");
            return Ok(());
        }
        self.reorder.insert(lease.seq(), lease);

        while let Some(lease) = self.reorder.remove(&self.next_seq) {
            self.next_seq += 1;
            if lease.is_end_of_media() {
                debug!(seq = lease.seq(), "Audio feed reached end of media");
                self.ended = true;
                self.reorder.clear();
                break;
            }
            if lease.has_audio() {
                self.queue.push_back(PendingBuffer { lease, written: 0 });
            }
        }

        self.maybe_start()?;
        self.pump()
    }

    fn maybe_start(&mut self) -> Result<(), PlaybackError> {
        if !self.play_requested || self.started {
            return Ok(());
        }
        let ready = self.queue.len() >= self.prefetch_threshold || (self.ended && !self.queue.is_empty());
        if !ready {
            return Ok(());
        }
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        if let Err(e) = sink.start() {
            return Err(self.fail(device_error(e)));
        }
        self.started = true;
        self.pending_starts.push_back(self.generation);
        debug!(queued = self.queue.len(), "Audio sink start requested");
        self.pump()
    }

    fn pump(&mut self) -> Result<(), PlaybackError> {
        if !self.started {
            return Ok(());
        }
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        match write_pending(sink.as_mut(), &mut self.queue) {
            Ok(written) => {
                if written > 0 {
                    self.dirty = true;
                    self.bytes_written += written as u64;
                }
                Ok(())
            }
            Err(e) => Err(self.fail(device_error(e))),
        }
    }

    fn stop(&mut self) -> Result<(), PlaybackError> {
        self.generation += 1;
        self.play_requested = false;
        self.accepting = false;
        if self.started {
            self.started = false;
            if let Some(sink) = self.sink.as_mut() {
                if let Err(e) = sink.stop() {
                    return Err(self.fail(device_error(e)));
                }
            }
        }
        self.flush()
    }

    fn flush(&mut self) -> Result<(), PlaybackError> {
        self.queue.clear();
        self.reorder.clear();
        if !self.dirty {
            return Ok(());
        }
        self.dirty = false;
        match self.sink.as_mut().map(|sink| sink.flush()) {
            Some(Err(e)) => Err(self.fail(device_error(e))),
            _ => Ok(()),
        }
    }

    fn close_sink(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.close() {
                warn!(error = %e, "Failed to close audio sink");
            }
        }
        self.accepting = false;
        self.started = false;
        self.dirty = false;
    }

    /// Drop the sink after a device failure and go video-only.
    fn fail(&mut self, err: PlaybackError) -> PlaybackError {
        self.queue.clear();
        self.reorder.clear();
        self.play_requested = false;
        self.close_sink();
        self.report(AudioStatus::Unavailable);
        err
    }
}

fn device_error(err: BridgeError) -> PlaybackError {
    PlaybackError::AudioDevice(err.to_string())
}

/// Write queued samples while the sink reports free space.
fn write_pending(
    sink: &mut dyn AudioSink,
    queue: &mut VecDeque<PendingBuffer>,
) -> bridge_traits::error::Result<usize> {
    let mut total = 0;
    loop {
        let available = sink.available_bytes();
        if available == 0 {
            break;
        }
        let Some(front) = queue.front_mut() else {
            break;
        };

        let (accepted, finished) = {
            let buffer = front.lease.read();
            let data = buffer.audio.as_ref().map_or(&[][..], |chunk| chunk.data.as_slice());
            let remaining = data.get(front.written..).unwrap_or(&[]);
            let accepted = if remaining.is_empty() {
                0
            } else {
                sink.write(&remaining[..remaining.len().min(available)])?
            };
            (accepted, front.written + accepted >= data.len())
        };
        front.written += accepted;
        total += accepted;

        if finished {
            queue.pop_front();
        } else if accepted == 0 {
            break;
        }
    }
    Ok(total)
}

impl Actor for AudioRenderer {
    type Message = AudioMsg;

    fn on_message(&mut self, message: AudioMsg, ctx: &Context<AudioMsg>) -> Result<(), ActorError> {
        self.handle(message, ctx.myself())?;
        Ok(())
    }

    fn on_idle(&mut self, _ctx: &Context<AudioMsg>) -> Result<Duration, ActorError> {
        self.pump()?;
        if self.started && !self.queue.is_empty() {
            Ok(WRITE_POLL_INTERVAL)
        } else {
            Ok(self.idle_wait)
        }
    }

    fn on_stop(&mut self, _ctx: &Context<AudioMsg>) -> Result<(), ActorError> {
        let stopped = self.stop();
        self.close_sink();
        info!(bytes_written = self.bytes_written, "Audio renderer stopped");
        stopped?;
        Ok(())
    }
}

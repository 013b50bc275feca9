//! # Playback Controller
//!
//! Top-level state machine of the engine. Owns position, speed and loop
//! bounds; pulls frames from the cache at real-time cadence; feeds the audio
//! renderer; broadcasts position and state.
//!
//! ## States
//!
//! ```text
//!            Start                 audio Playing
//!  STOPPED ─────────> PREPARING ───────────────────> PLAYING
//!     ^                  │  (or no audio / timeout)     │
//!     └──── Stop ────────┴──────── Stop / bound ────────┘
//!
//!  any state ── Close ──> CLOSED
//! ```
//!
//! ## Epochs
//!
//! Every discontinuity (start, stop, seek, wrap, speed change) bumps the
//! epoch. Frame requests carry the epoch they were issued in; replies from an
//! older epoch are dropped on arrival, which recycles their leases.
//!
//! ## Ticks
//!
//! The controller has no timer thread. While playing, `on_idle` runs every
//! `tick_interval` and advances the position by the real time elapsed since
//! the previous tick, as measured by the injected [`Clock`].

pub mod listeners;
pub mod position;

pub use listeners::{Listener, Listeners, PositionUpdate};
pub use position::{Advance, PlaybackPosition};

use crate::audio::{AudioMsg, AudioStatus, AudioUpdate};
use crate::cache::{CacheMsg, FrameReply, FrameRequest};
use crate::config::EngineConfig;
use crate::fetcher::FetcherMsg;
use crate::frame::FrameLease;
use crate::timeline::{FrameRate, LoopBounds};
use crate::video::VideoOutput;
use bridge_traits::{Clock, DisplaySurface, MediaInfo, SurfaceId};
use core_actor::{Actor, ActorError, ActorRef, Change, Context, ReplyTo};
use core_runtime::logging::display_path;
use core_runtime::{EngineEvent, EventBus, PlaybackState};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Actors and metadata of one open media file.
pub struct MediaSession {
    pub info: MediaInfo,
    pub frame_rate: FrameRate,
    pub cache: ActorRef<CacheMsg>,
    pub fetcher: ActorRef<FetcherMsg>,
}

impl MediaSession {
    fn frame_count(&self) -> u64 {
        self.info.frame_count()
    }
}

/// Partial status update. Each field is left alone unless `Set`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub position: Change<Duration>,
    pub speed: Change<f64>,
    pub loop_bounds: Change<Option<LoopBounds>>,
}

impl StatusUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(mut self, position: Duration) -> Self {
        self.position = Change::Set(position);
        self
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = Change::Set(speed);
        self
    }

    /// `None` clears the loop bounds.
    pub fn loop_bounds(mut self, bounds: Option<LoopBounds>) -> Self {
        self.loop_bounds = Change::Set(bounds);
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.position.is_set() && !self.speed.is_set() && !self.loop_bounds.is_set()
    }
}

/// Snapshot returned by status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub position: Duration,
    pub loop_bounds: Option<LoopBounds>,
    pub speed: f64,
    pub media: Option<MediaInfo>,
    /// The sink confirmed it is playing this session's audio.
    pub audio_running: bool,
    /// Sequence number of the frame last presented.
    pub displayed_seq: Option<u64>,
}

/// Controller mailbox protocol.
pub enum ControllerMsg {
    NewVideo {
        session: MediaSession,
        start: Option<Duration>,
        loop_bounds: Option<LoopBounds>,
        reply: ReplyTo<()>,
    },
    Start,
    Stop,
    SetPosition {
        position: Duration,
        animated: bool,
    },
    SetSpeed(f64),
    SetLoopBounds(Option<LoopBounds>),
    Status {
        update: StatusUpdate,
        reply: ReplyTo<PlaybackStatus>,
    },
    Subscribe(Listener),
    SetSurface(Option<Arc<dyn DisplaySurface>>),
    /// Reply to a frame request issued in `epoch`.
    FrameArrived {
        epoch: u64,
        seq: u64,
        reply: FrameReply,
    },
    Audio(AudioUpdate),
    Close(ReplyTo<()>),
}

/// The controller actor.
pub struct Controller {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    events: EventBus,
    video: VideoOutput,
    audio: Option<ActorRef<AudioMsg>>,
    listeners: Listeners,
    surface: Option<Arc<dyn DisplaySurface>>,

    state: PlaybackState,
    media: Option<MediaSession>,
    position: PlaybackPosition,
    epoch: u64,

    audio_status: AudioStatus,
    /// Audio participates in the current play session.
    audio_in_play: bool,
    /// Id of the last audio session opened with `Reset`.
    audio_session: u64,

    /// Frames that arrived ahead of the position, keyed by sequence number.
    pending: BTreeMap<u64, FrameLease>,
    requested: HashSet<u64>,
    shown_seq: Option<u64>,
    last_prefetch_block: Option<u64>,

    last_tick: Option<Instant>,
    preparing_since: Option<Instant>,
    last_broadcast: Option<PositionUpdate>,
}

impl Controller {
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        events: EventBus,
        video: VideoOutput,
        audio: Option<ActorRef<AudioMsg>>,
    ) -> Self {
        Self {
            config,
            clock,
            events,
            video,
            audio,
            listeners: Listeners::new(),
            surface: None,
            state: PlaybackState::Stopped,
            media: None,
            position: PlaybackPosition::new(Duration::ZERO),
            epoch: 0,
            audio_status: AudioStatus::Stopped,
            audio_in_play: false,
            audio_session: 0,
            pending: BTreeMap::new(),
            requested: HashSet::new(),
            shown_seq: None,
            last_prefetch_block: None,
            last_tick: None,
            preparing_since: None,
            last_broadcast: None,
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    fn load(
        &mut self,
        session: MediaSession,
        start: Option<Duration>,
        loop_bounds: Option<LoopBounds>,
        myself: &ActorRef<ControllerMsg>,
    ) {
        self.stop();
        self.release_media();
        drop(self.video.clear());
        self.shown_seq = None;

        let info = &session.info;
        self.position = PlaybackPosition::new(info.duration);
        if let Err(e) = self.position.set_bounds(loop_bounds) {
            warn!(error = %e, "Ignoring loop bounds for new media");
        }
        let (min, _) = self.position.range();
        self.position.seek(start.unwrap_or(min));

        self.audio_status = AudioStatus::Stopped;
        if let Some(audio) = &self.audio {
            match info.audio {
                Some(format) => audio.send(AudioMsg::Open(format)),
                None => audio.send(AudioMsg::Close),
            }
        }

        info!(
            file = %display_path(&info.path),
            frames = info.frame_count(),
            fps = session.frame_rate.fps(),
            "Media loaded"
        );
        self.events
            .emit(EngineEvent::MediaOpened {
                file: display_path(&info.path),
                duration_ms: info.duration.as_millis() as u64,
                frame_rate: info.frame_rate,
                frame_count: info.frame_count(),
                has_video: info.has_video(),
                has_audio: info.has_audio(),
            })
            .ok();

        self.media = Some(session);
        self.new_epoch();
        self.show_current(myself);
        self.broadcast_position();
    }

    fn start(&mut self, myself: &ActorRef<ControllerMsg>) {
        if self.media.is_none() {
            warn!("Start ignored, no media open");
            return;
        }
        if self.state.is_active() {
            return;
        }

        let now = self.clock.now();
        self.new_epoch();
        self.audio_in_play = self.audio_eligible();
        self.set_state(PlaybackState::Preparing);
        self.preparing_since = Some(now);
        if self.audio_in_play {
            self.begin_audio();
        }
        self.show_current(myself);
        if !self.audio_in_play {
            self.enter_playing(now);
        }
    }

    fn stop(&mut self) {
        if !self.state.is_active() {
            return;
        }
        self.new_epoch();
        self.halt_audio();
        self.preparing_since = None;
        self.last_tick = None;
        self.set_state(PlaybackState::Stopped);
        self.broadcast_position();
    }

    fn seek(&mut self, target: Duration, animated: bool, myself: &ActorRef<ControllerMsg>) {
        if self.media.is_none() {
            warn!("Seek ignored, no media open");
            return;
        }
        let now = self.clock.now();

        if animated && !self.config.seek_animation.is_zero() {
            // Audio stays silent until the animation lands.
            self.new_epoch();
            if self.audio_in_play {
                self.send_audio(AudioMsg::Stop);
            }
            self.position.animate_to(target, now, self.config.seek_animation);
            debug!(target_ms = target.as_millis() as u64, "Animated seek started");
            return;
        }

        self.position.seek(target);
        debug!(position_ms = self.position.position().as_millis() as u64, "Seek");
        self.discontinuity(now);
        self.show_current(myself);
        self.broadcast_position();
    }

    fn set_speed(&mut self, speed: f64, myself: &ActorRef<ControllerMsg>) {
        if speed == self.position.speed() {
            return;
        }
        if let Err(e) = self.position.set_speed(speed) {
            warn!(error = %e, "Speed change ignored");
            return;
        }
        debug!(speed, "Speed changed");
        if self.state.is_active() {
            self.discontinuity(self.clock.now());
            self.show_current(myself);
        }
    }

    fn set_loop_bounds(&mut self, bounds: Option<LoopBounds>, myself: &ActorRef<ControllerMsg>) {
        if self.media.is_none() {
            warn!("Loop bounds ignored, no media open");
            return;
        }
        match self.position.set_bounds(bounds) {
            Ok(true) => {
                self.discontinuity(self.clock.now());
                self.show_current(myself);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "Loop bounds rejected");
                return;
            }
        }
        self.broadcast_position();
    }

    fn apply_status(&mut self, update: StatusUpdate, myself: &ActorRef<ControllerMsg>) {
        if let Change::Set(bounds) = update.loop_bounds {
            self.set_loop_bounds(bounds, myself);
        }
        if let Change::Set(speed) = update.speed {
            self.set_speed(speed, myself);
        }
        if let Change::Set(position) = update.position {
            self.seek(position, false, myself);
        }
    }

    fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            position: self.position.position(),
            loop_bounds: self.position.bounds(),
            speed: self.position.speed(),
            media: self.media.as_ref().map(|media| media.info.clone()),
            audio_running: self.audio_in_play && self.audio_status == AudioStatus::Playing,
            displayed_seq: self.shown_seq,
        }
    }

    fn set_surface(&mut self, surface: Option<Arc<dyn DisplaySurface>>) {
        if let Some(previous) = self.surface.take() {
            previous.deactivate();
        }
        let id: Option<SurfaceId> = surface.as_ref().map(|s| s.id());
        if let Some(surface) = &surface {
            surface.activate(self.video.source());
            surface.request_repaint();
            self.events
                .emit(EngineEvent::SurfaceChanged {
                    surface_id: surface.id().as_uuid(),
                })
                .ok();
        }
        debug!(surface = ?id, "Active surface changed");
        self.surface = surface;
        self.listeners.notify_surface(id);
    }

    fn close(&mut self) {
        if self.state == PlaybackState::Closed {
            return;
        }
        self.stop();
        self.new_epoch();
        drop(self.video.clear());
        if let Some(surface) = self.surface.take() {
            surface.deactivate();
            self.listeners.notify_surface(None);
        }
        if let Some(audio) = &self.audio {
            audio.stop();
        }
        self.release_media();
        self.set_state(PlaybackState::Closed);
        self.events.emit(EngineEvent::Closed).ok();
    }

    // ------------------------------------------------------------------
    // Ticks
    // ------------------------------------------------------------------

    fn tick(&mut self, now: Instant, myself: &ActorRef<ControllerMsg>) {
        if let Some(done) = self.position.step_animation(now) {
            if done {
                self.discontinuity(now);
            }
            self.show_current(myself);
            self.broadcast_position();
            return;
        }

        match self.state {
            PlaybackState::Preparing => {
                self.show_current(myself);
                let waited = self
                    .preparing_since
                    .map(|since| now.saturating_duration_since(since))
                    .unwrap_or_default();
                if self.audio_in_play && waited >= self.config.audio_start_timeout {
                    warn!(
                        waited_ms = waited.as_millis() as u64,
                        "Audio did not start in time, continuing video-only"
                    );
                    self.halt_audio();
                    self.enter_playing(now);
                }
            }
            PlaybackState::Playing => {
                let elapsed = self
                    .last_tick
                    .map(|last| now.saturating_duration_since(last))
                    .unwrap_or_default();
                self.last_tick = Some(now);
                let before = self.current_seq();

                match self.position.advance(elapsed, self.config.loop_policy) {
                    Advance::Moved => {
                        let jumped = self.current_seq().abs_diff(before);
                        if self.audio_in_play && jumped > self.config.audio_lookahead_frames as u64 {
                            // Fell too far behind for the audio feed to stay contiguous.
                            debug!(jumped, "Position jumped past the lookahead window");
                            self.discontinuity(now);
                        }
                    }
                    Advance::Wrapped => {
                        debug!(
                            position_ms = self.position.position().as_millis() as u64,
                            "Wrapped at loop bound"
                        );
                        self.discontinuity(now);
                    }
                    Advance::Clamped => {
                        info!(
                            position_ms = self.position.position().as_millis() as u64,
                            "Reached playback bound"
                        );
                        self.stop();
                        self.show_current(myself);
                        return;
                    }
                }
                self.show_current(myself);
                self.broadcast_position();
            }
            PlaybackState::Stopped | PlaybackState::Closed => {}
        }
    }

    fn enter_playing(&mut self, now: Instant) {
        self.preparing_since = None;
        self.last_tick = Some(now);
        self.set_state(PlaybackState::Playing);
    }

    /// Drop everything tied to the old position and restart pulling.
    ///
    /// While active, audio is flushed and re-primed from the new position
    /// (re-entering PREPARING), or switched off when no longer eligible.
    fn discontinuity(&mut self, now: Instant) {
        self.new_epoch();
        if !self.state.is_active() {
            return;
        }
        self.halt_audio();
        self.audio_in_play = self.audio_eligible();
        if self.audio_in_play {
            self.begin_audio();
            self.set_state(PlaybackState::Preparing);
            self.preparing_since = Some(now);
            self.last_tick = None;
        } else if self.state == PlaybackState::Preparing {
            self.enter_playing(now);
        } else {
            self.last_tick = Some(now);
        }
    }

    fn new_epoch(&mut self) {
        self.epoch += 1;
        self.pending.clear();
        self.requested.clear();
        self.last_prefetch_block = None;
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    fn current_seq(&self) -> u64 {
        match &self.media {
            Some(media) => media
                .frame_rate
                .seq_at(self.position.position())
                .min(media.frame_count().saturating_sub(1)),
            None => 0,
        }
    }

    /// Display the frame for the current position, requesting what is missing.
    fn show_current(&mut self, myself: &ActorRef<ControllerMsg>) {
        if self.media.is_none() {
            return;
        }
        let seq = self.current_seq();
        let forward = self.position.is_forward();
        self.pending
            .retain(|&pending, _| if forward { pending >= seq } else { pending <= seq });

        if self.shown_seq != Some(seq) {
            if let Some(lease) = self.pending.remove(&seq) {
                self.present(lease);
            } else if !self.requested.contains(&seq) {
                self.request(seq, myself);
            }
        }

        if self.state.is_active() {
            self.request_lookahead(seq, myself);
            self.prefetch_ahead(seq);
        }
    }

    fn present(&mut self, lease: FrameLease) {
        self.shown_seq = Some(lease.seq());
        if !lease.has_video() {
            return;
        }
        trace!(seq = lease.seq(), "Presenting frame");
        drop(self.video.present(lease));
        if let Some(surface) = &self.surface {
            surface.request_repaint();
        }
    }

    fn request(&mut self, seq: u64, myself: &ActorRef<ControllerMsg>) {
        let Some(media) = &self.media else {
            return;
        };
        let epoch = self.epoch;
        let usage_count = if self.audio_in_play { 2 } else { 1 };
        media.cache.send(CacheMsg::Acquire(FrameRequest {
            seq,
            usage_count,
            only_if_free: false,
            reply: ReplyTo::actor(myself.clone(), move |reply| ControllerMsg::FrameArrived {
                epoch,
                seq,
                reply,
            }),
        }));
        self.requested.insert(seq);
    }

    fn request_lookahead(&mut self, seq: u64, myself: &ActorRef<ControllerMsg>) {
        let frame_count = self.media.as_ref().map_or(0, MediaSession::frame_count);
        let step = self.stride();
        let forward = self.position.is_forward();

        for k in 1..=self.config.audio_lookahead_frames as u64 {
            let next = if forward {
                seq + k * step
            } else {
                match seq.checked_sub(k * step) {
                    Some(next) => next,
                    None => break,
                }
            };
            if next >= frame_count {
                break;
            }
            if !self.requested.contains(&next) && !self.pending.contains_key(&next) {
                self.request(next, myself);
            }
        }
    }

    /// Warm the blocks just beyond the lookahead window.
    fn prefetch_ahead(&mut self, seq: u64) {
        let Some(media) = &self.media else {
            return;
        };
        if !self.position.is_forward() {
            return;
        }
        let block_size = self.config.block_size as u64;
        let horizon = seq + self.config.audio_lookahead_frames as u64 * self.stride();
        let first_block = horizon / block_size + 1;
        if self.last_prefetch_block == Some(first_block) {
            return;
        }
        self.last_prefetch_block = Some(first_block);

        let frame_count = media.frame_count();
        for block in first_block..first_block + self.config.prefetch_blocks as u64 {
            let base_seq = block * block_size;
            if base_seq >= frame_count {
                break;
            }
            media.cache.send(CacheMsg::Prefetch { base_seq });
        }
    }

    /// Frames advanced per displayed frame at the current speed.
    fn stride(&self) -> u64 {
        self.position.speed().abs().round().max(1.0) as u64
    }

    fn frame_arrived(
        &mut self,
        epoch: u64,
        seq: u64,
        reply: FrameReply,
        myself: &ActorRef<ControllerMsg>,
    ) {
        if epoch != self.epoch {
            trace!(seq, epoch, current = self.epoch, "Discarding stale frame");
            return;
        }
        self.requested.remove(&seq);

        let mut leases = match reply {
            FrameReply::Ready(leases) => leases,
            FrameReply::NoFreeResources => return,
        };
        let Some(lease) = leases.pop() else {
            return;
        };
        if self.audio_in_play {
            for audio_lease in leases {
                self.send_audio(AudioMsg::Enqueue(audio_lease));
            }
        }

        let current = self.current_seq();
        let ahead = if self.position.is_forward() {
            seq > current
        } else {
            seq < current
        };
        if seq == current {
            self.present(lease);
        } else if ahead {
            self.pending.insert(seq, lease);
        } else if self.shown_seq.is_none() {
            // Nothing on screen yet; better late than blank.
            self.present(lease);
            self.show_current(myself);
        }
    }

    // ------------------------------------------------------------------
    // Audio
    // ------------------------------------------------------------------

    fn audio_eligible(&self) -> bool {
        self.audio.is_some()
            && self.audio_status != AudioStatus::Unavailable
            && self.media.as_ref().is_some_and(|media| media.info.has_audio())
            && self.position.speed() == 1.0
    }

    fn begin_audio(&mut self) {
        self.audio_session += 1;
        self.send_audio(AudioMsg::Reset {
            next_seq: self.current_seq(),
            session: self.audio_session,
        });
        self.send_audio(AudioMsg::Play);
    }

    fn halt_audio(&mut self) {
        if self.audio_in_play {
            self.send_audio(AudioMsg::Stop);
            self.audio_in_play = false;
        }
    }

    fn send_audio(&self, message: AudioMsg) {
        if let Some(audio) = &self.audio {
            audio.send(message);
        }
    }

    fn audio_status_changed(&mut self, update: AudioUpdate) {
        let AudioUpdate { session, status } = update;
        if status == AudioStatus::Playing && session != self.audio_session {
            debug!(
                session,
                current = self.audio_session,
                "Ignoring audio start from an older session"
            );
            return;
        }
        self.audio_status = status;
        match status {
            AudioStatus::Playing => {
                if self.state == PlaybackState::Preparing && self.audio_in_play {
                    self.enter_playing(self.clock.now());
                }
            }
            AudioStatus::Unavailable => {
                if self.audio_in_play {
                    warn!("Audio unavailable, continuing video-only");
                    self.audio_in_play = false;
                    if self.state == PlaybackState::Preparing {
                        self.enter_playing(self.clock.now());
                    }
                }
            }
            AudioStatus::Stopped => {}
        }
    }

    // ------------------------------------------------------------------
    // Broadcasting
    // ------------------------------------------------------------------

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        info!(from = %self.state, to = %state, "Playback state changed");
        self.state = state;
        self.listeners.notify_state(state);
        self.events.emit(EngineEvent::StateChanged { state }).ok();
    }

    fn broadcast_position(&mut self) {
        let update = self.position.update();
        if self.last_broadcast == Some(update) {
            return;
        }
        self.last_broadcast = Some(update);
        self.listeners.notify_position(update);

        let bounds = self.position.bounds();
        self.events
            .emit(EngineEvent::PositionChanged {
                position_ms: update.position.as_millis() as u64,
                loop_min_ms: bounds.map(|b| b.min().as_millis() as u64),
                loop_max_ms: bounds.map(|b| b.max().as_millis() as u64),
            })
            .ok();
    }

    /// Stop the cache and fetcher of the current media.
    fn release_media(&mut self) {
        self.pending.clear();
        self.requested.clear();
        if let Some(media) = self.media.take() {
            media.cache.stop();
            media.fetcher.stop();
        }
    }
}

impl Actor for Controller {
    type Message = ControllerMsg;

    fn on_message(
        &mut self,
        message: ControllerMsg,
        ctx: &Context<ControllerMsg>,
    ) -> Result<(), ActorError> {
        let myself = ctx.myself();
        match message {
            ControllerMsg::NewVideo {
                session,
                start,
                loop_bounds,
                reply,
            } => {
                self.load(session, start, loop_bounds, myself);
                reply.reply(());
            }
            ControllerMsg::Start => self.start(myself),
            ControllerMsg::Stop => {
                self.stop();
                self.show_current(myself);
            }
            ControllerMsg::SetPosition { position, animated } => {
                self.seek(position, animated, myself)
            }
            ControllerMsg::SetSpeed(speed) => self.set_speed(speed, myself),
            ControllerMsg::SetLoopBounds(bounds) => self.set_loop_bounds(bounds, myself),
            ControllerMsg::Status { update, reply } => {
                self.apply_status(update, myself);
                reply.reply(self.status());
            }
            ControllerMsg::Subscribe(listener) => self.listeners.add(listener),
            ControllerMsg::SetSurface(surface) => self.set_surface(surface),
            ControllerMsg::FrameArrived { epoch, seq, reply } => {
                self.frame_arrived(epoch, seq, reply, myself)
            }
            ControllerMsg::Audio(update) => self.audio_status_changed(update),
            ControllerMsg::Close(reply) => {
                self.close();
                ctx.stop();
                reply.reply(());
            }
        }
        Ok(())
    }

    fn on_idle(&mut self, ctx: &Context<ControllerMsg>) -> Result<Duration, ActorError> {
        if self.state == PlaybackState::Closed {
            return Ok(self.config.idle_wait);
        }
        let now = self.clock.now();
        self.tick(now, ctx.myself());
        if self.state.is_active() || self.position.is_animating() {
            Ok(self.config.tick_interval)
        } else {
            Ok(self.config.idle_wait)
        }
    }

    fn on_stop(&mut self, _ctx: &Context<ControllerMsg>) -> Result<(), ActorError> {
        self.close();
        Ok(())
    }
}

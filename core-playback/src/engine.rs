//! # Playback Engine
//!
//! Facade that wires the actors together and exposes a blocking command API
//! to the host application.
//!
//! ```text
//!                      ┌───────────────┐  faults   ┌───────────────┐
//!   host ─commands───> │  Controller   │ ────────> │ ErrorReporter │
//!                      └───────────────┘           └───────────────┘
//!                        │     ▲      │                   ▲
//!                Acquire │     │ leases│ Enqueue          │
//!                        ▼     │      ▼                   │
//!  ┌──────────────┐  Fill  ┌──────────┐   ┌───────────────┐
//!  │ FrameFetcher │ <───── │FrameCache│   │ AudioRenderer │
//!  └──────────────┘ ─────> └──────────┘   └───────────────┘
//!                  Filled
//! ```
//!
//! The error reporter, controller and audio renderer live as long as the
//! engine. Each [`PlaybackEngine::open`] spawns a fresh cache and fetcher
//! pair for the new file and retires the previous pair.

use crate::audio::{AudioMsg, AudioRenderer};
use crate::cache::{CacheMsg, CacheStats, FrameCache, FrameReply, FrameRequest};
use crate::config::EngineConfig;
use crate::controller::{
    Controller, ControllerMsg, Listener, MediaSession, PlaybackStatus, PositionUpdate,
    StatusUpdate,
};
use crate::error::{PlaybackError, Result};
use crate::fetcher::{FetcherMsg, FrameFetcher};
use crate::frame::FrameLease;
use crate::timeline::{FrameRate, LoopBounds};
use crate::video::VideoOutput;
use bridge_traits::{DisplaySurface, MediaInfo, SurfaceId};
use core_actor::{
    ask_timeout, mailbox, spawn, ActorHandle, ErrorReporter, ErrorSink, Fault, FaultHandler,
    RendezvousError,
};
use core_runtime::logging::display_path;
use core_runtime::{CoreConfig, EngineEvent, EventBus, EventStream, PlaybackState};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Options for [`PlaybackEngine::open`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OpenOptions {
    /// Initial position; defaults to the start of the playback range.
    pub start: Option<Duration>,
    pub loop_bounds: Option<LoopBounds>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_at(mut self, start: Duration) -> Self {
        self.start = Some(start);
        self
    }

    pub fn loop_bounds(mut self, bounds: LoopBounds) -> Self {
        self.loop_bounds = Some(bounds);
        self
    }
}

struct MediaActors {
    info: MediaInfo,
    cache: ActorHandle<CacheMsg>,
    fetcher: ActorHandle<FetcherMsg>,
}

impl MediaActors {
    fn shutdown(mut self) {
        self.cache.stop_and_join();
        self.fetcher.stop_and_join();
    }
}

struct Actors {
    controller: ActorHandle<ControllerMsg>,
    audio: Option<ActorHandle<AudioMsg>>,
    reporter: ActorHandle<Fault>,
}

/// Media playback engine.
///
/// All methods are callable from any thread. Commands are asynchronous
/// unless documented otherwise; queries block until the owning actor
/// answers.
pub struct PlaybackEngine {
    core: CoreConfig,
    config: EngineConfig,
    events: EventBus,
    video: VideoOutput,
    actors: Mutex<Option<Actors>>,
    media: Mutex<Option<MediaActors>>,
    closed: AtomicBool,
}

impl PlaybackEngine {
    /// Validate both configurations and spawn the long-lived actors.
    pub fn new(core: CoreConfig, config: EngineConfig) -> Result<Self> {
        core.validate()?;
        config.validate().map_err(PlaybackError::InvalidConfig)?;

        let events = EventBus::new(core.event_buffer);
        let video = VideoOutput::new();

        let reporter = ErrorReporter::spawn(
            "error-reporter",
            fault_handler(&core, &config, events.clone()),
        )?;
        let errors = ErrorSink::Actor(reporter.actor_ref().clone());

        let (controller_ref, controller_mailbox) = mailbox::<ControllerMsg>("playback-controller");

        let audio = match &core.audio_output {
            Some(output) => {
                let (_, audio_mailbox) = mailbox::<AudioMsg>("audio-renderer");
                let status_target = controller_ref.clone();
                let renderer = AudioRenderer::new(
                    Arc::clone(output),
                    &config,
                    Box::new(move |update| status_target.send(ControllerMsg::Audio(update))),
                );
                Some(spawn(audio_mailbox, renderer, errors.clone())?)
            }
            None => {
                info!("No audio output configured, engine is video-only");
                None
            }
        };

        let controller = Controller::new(
            config.clone(),
            Arc::clone(&core.clock),
            events.clone(),
            video.clone(),
            audio.as_ref().map(|handle| handle.actor_ref().clone()),
        );
        let controller = spawn(controller_mailbox, controller, errors)?;

        info!(
            pool_size = config.pool_size,
            block_size = config.block_size,
            audio = audio.is_some(),
            "Playback engine started"
        );

        Ok(Self {
            core,
            config,
            events,
            video,
            actors: Mutex::new(Some(Actors {
                controller,
                audio,
                reporter,
            })),
            media: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open a media file, replacing the current one. Blocks until the
    /// decoder has opened and the controller has switched over.
    pub fn open(&self, path: impl AsRef<Path>, options: OpenOptions) -> Result<MediaInfo> {
        let path = path.as_ref();
        let file = display_path(path);
        let (controller, errors) = self.with_actors(|actors| {
            (
                actors.controller.actor_ref().clone(),
                ErrorSink::Actor(actors.reporter.actor_ref().clone()),
            )
        })?;

        let (_, fetcher_mailbox) = mailbox::<FetcherMsg>("frame-fetcher");
        let fetcher_actor = FrameFetcher::new(path, Arc::clone(&self.core.decoder_factory));
        let mut fetcher = spawn(fetcher_mailbox, fetcher_actor, errors.clone())?;

        let info = match ask_timeout(fetcher.actor_ref(), self.config.request_timeout, |reply| {
            FetcherMsg::QueryInfo(reply)
        }) {
            Ok(info) => info,
            Err(e) => {
                fetcher.stop_and_join();
                let reason = match e {
                    RendezvousError::Disconnected { .. } => "decoder failed to open".to_string(),
                    other => other.to_string(),
                };
                return Err(PlaybackError::MediaOpen { file, reason });
            }
        };
        let frame_rate = match FrameRate::new(info.frame_rate) {
            Ok(rate) => rate,
            Err(e) => {
                fetcher.stop_and_join();
                return Err(e);
            }
        };

        let (_, cache_mailbox) = mailbox::<CacheMsg>("frame-cache");
        let cache_actor = FrameCache::new(
            self.config.pool_size,
            self.config.block_size,
            fetcher.actor_ref().clone(),
        );
        let mut cache = match spawn(cache_mailbox, cache_actor, errors) {
            Ok(cache) => cache,
            Err(e) => {
                fetcher.stop_and_join();
                return Err(e.into());
            }
        };

        let session = MediaSession {
            info: info.clone(),
            frame_rate,
            cache: cache.actor_ref().clone(),
            fetcher: fetcher.actor_ref().clone(),
        };
        let loaded = ask_timeout(&controller, self.config.request_timeout, |reply| {
            ControllerMsg::NewVideo {
                session,
                start: options.start,
                loop_bounds: options.loop_bounds,
                reply,
            }
        });
        if let Err(e) = loaded {
            cache.stop_and_join();
            fetcher.stop_and_join();
            return Err(self.request_failed(controller.name(), e));
        }

        let previous = self.media.lock().replace(MediaActors {
            info: info.clone(),
            cache,
            fetcher,
        });
        if let Some(previous) = previous {
            debug!(file = %display_path(&previous.info.path), "Retiring previous media");
            previous.shutdown();
        }

        info!(file = %file, frames = info.frame_count(), "Media opened");
        Ok(info)
    }

    pub fn start(&self) -> Result<()> {
        self.send(ControllerMsg::Start)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(ControllerMsg::Stop)
    }

    /// Seek. With `animated`, the position glides to `position` over the
    /// configured animation length.
    pub fn set_position(&self, position: Duration, animated: bool) -> Result<()> {
        self.send(ControllerMsg::SetPosition { position, animated })
    }

    /// Set the playback speed multiplier. Negative plays in reverse.
    pub fn set_speed(&self, speed: f64) -> Result<()> {
        if !speed.is_finite() || speed == 0.0 {
            return Err(PlaybackError::InvalidArgument(format!(
                "speed must be finite and non-zero, got {speed}"
            )));
        }
        self.send(ControllerMsg::SetSpeed(speed))
    }

    pub fn set_loop_bounds(&self, bounds: Option<LoopBounds>) -> Result<()> {
        self.send(ControllerMsg::SetLoopBounds(bounds))
    }

    /// Apply a partial update and return the resulting status.
    pub fn update_status(&self, update: StatusUpdate) -> Result<PlaybackStatus> {
        let controller = self.with_actors(|actors| actors.controller.actor_ref().clone())?;
        ask_timeout(&controller, self.config.request_timeout, |reply| {
            ControllerMsg::Status { update, reply }
        })
        .map_err(|e| self.request_failed(controller.name(), e))
    }

    pub fn status(&self) -> Result<PlaybackStatus> {
        self.update_status(StatusUpdate::new())
    }

    /// Fetch one decoded frame outside the playback flow, for example to
    /// export a thumbnail. Fails with `NoFreeResources` instead of evicting
    /// frames playback is about to use.
    pub fn capture_frame(&self, seq: u64) -> Result<FrameLease> {
        let cache = self.media_cache()?;
        let reply = ask_timeout(&cache, self.config.request_timeout, |reply| {
            CacheMsg::Acquire(FrameRequest {
                seq,
                usage_count: 1,
                only_if_free: true,
                reply,
            })
        })
        .map_err(|e| self.request_failed(cache.name(), e))?;
        match reply {
            FrameReply::Ready(mut leases) => leases.pop().ok_or_else(|| {
                PlaybackError::Internal(format!("frame {seq} granted without a lease"))
            }),
            FrameReply::NoFreeResources => Err(PlaybackError::NoFreeResources),
        }
    }

    pub fn cache_stats(&self) -> Result<CacheStats> {
        let cache = self.media_cache()?;
        ask_timeout(&cache, self.config.request_timeout, CacheMsg::Stats)
            .map_err(|e| self.request_failed(cache.name(), e))
    }

    /// Listener callbacks run on the controller thread and must not block.
    pub fn add_position_listener(
        &self,
        listener: impl FnMut(PositionUpdate) + Send + 'static,
    ) -> Result<()> {
        self.send(ControllerMsg::Subscribe(Listener::Position(Box::new(listener))))
    }

    pub fn add_state_listener(
        &self,
        listener: impl FnMut(PlaybackState) + Send + 'static,
    ) -> Result<()> {
        self.send(ControllerMsg::Subscribe(Listener::State(Box::new(listener))))
    }

    pub fn add_surface_listener(
        &self,
        listener: impl FnMut(Option<SurfaceId>) + Send + 'static,
    ) -> Result<()> {
        self.send(ControllerMsg::Subscribe(Listener::Surface(Box::new(listener))))
    }

    /// Make `surface` the active display surface, or detach with `None`.
    pub fn set_surface(&self, surface: Option<Arc<dyn DisplaySurface>>) -> Result<()> {
        self.send(ControllerMsg::SetSurface(surface))
    }

    pub fn events(&self) -> EventStream {
        self.events.subscribe()
    }

    pub fn video_output(&self) -> VideoOutput {
        self.video.clone()
    }

    pub fn media_info(&self) -> Option<MediaInfo> {
        self.media.lock().as_ref().map(|media| media.info.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Shut down every actor and join its thread. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(mut actors) = self.actors.lock().take() else {
            return;
        };
        info!("Closing playback engine");

        let closed = ask_timeout(
            actors.controller.actor_ref(),
            self.config.request_timeout,
            ControllerMsg::Close,
        );
        if let Err(e) = closed {
            warn!(error = %e, "Controller did not acknowledge close");
        }
        actors.controller.stop_and_join();

        if let Some(media) = self.media.lock().take() {
            media.shutdown();
        }
        if let Some(mut audio) = actors.audio.take() {
            audio.stop_and_join();
        }
        actors.reporter.stop_and_join();
        info!("Playback engine closed");
    }

    fn send(&self, message: ControllerMsg) -> Result<()> {
        let controller = self.with_actors(|actors| actors.controller.actor_ref().clone())?;
        controller.send(message);
        Ok(())
    }

    fn with_actors<T>(&self, f: impl FnOnce(&Actors) -> T) -> Result<T> {
        if self.is_closed() {
            return Err(PlaybackError::EngineClosed);
        }
        self.actors
            .lock()
            .as_ref()
            .map(f)
            .ok_or(PlaybackError::EngineClosed)
    }

    fn media_cache(&self) -> Result<core_actor::ActorRef<CacheMsg>> {
        if self.is_closed() {
            return Err(PlaybackError::EngineClosed);
        }
        self.media
            .lock()
            .as_ref()
            .map(|media| media.cache.actor_ref().clone())
            .ok_or(PlaybackError::NoMediaOpen)
    }

    /// Classify a failed round-trip with `actor`. A dropped reply target
    /// means the actor went away mid-request.
    fn request_failed(&self, actor: &str, error: RendezvousError) -> PlaybackError {
        if self.is_closed() {
            return PlaybackError::EngineClosed;
        }
        match error {
            RendezvousError::Disconnected { .. } => {
                PlaybackError::Unavailable(format!("{actor} dropped the request"))
            }
            timeout => timeout.into(),
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.close();
    }
}

/// Publish faults on the event bus, call the host hook and abort on fatal
/// faults when configured to.
fn fault_handler(core: &CoreConfig, config: &EngineConfig, events: EventBus) -> FaultHandler {
    let hook = core.fault_handler.clone();
    let abort_on_fatal = config.abort_on_invariant_violation;
    Box::new(move |fault: &Fault| {
        events
            .emit(EngineEvent::Fault {
                actor: fault.actor.clone(),
                phase: fault.phase.to_string(),
                message: fault.error.to_string(),
                fatal: fault.is_fatal(),
            })
            .ok();
        if let Some(hook) = &hook {
            hook(fault);
        }
        if fault.is_fatal() && abort_on_fatal {
            error!(actor = %fault.actor, "Fatal fault, aborting process");
            std::process::abort();
        }
    })
}

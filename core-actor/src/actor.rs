//! # Mailbox Actors
//!
//! Every actor owns an unbounded FIFO mailbox and runs on its own named OS
//! thread. Hooks run strictly one at a time on that thread:
//!
//! 1. [`Actor::on_start`] once, before any message. A failure escalates and
//!    terminates the actor.
//! 2. [`Actor::on_message`] for every dequeued message, in send order.
//! 3. [`Actor::on_idle`] whenever the mailbox is momentarily empty. The
//!    returned duration bounds how long the loop blocks waiting for the next
//!    message before idling again.
//! 4. [`Actor::on_stop`] once, best effort, after the loop exits.
//!
//! Errors and panics in any hook become a [`Fault`] delivered to the actor's
//! [`ErrorSink`]; the loop then carries on with the next message.
//!
//! ## Usage
//!
//! ```ignore
//! let (actor_ref, mailbox) = mailbox::<CounterMsg>("counter");
//! let handle = spawn(mailbox, Counter::default(), ErrorSink::Log)?;
//! actor_ref.send(CounterMsg::Add(2));
//! handle.stop();
//! ```

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info_span, trace, warn};

use crate::error::ActorError;
use crate::fault::{ErrorSink, Fault, Phase};

/// Idle wait used by [`Actor::on_idle`] unless an actor overrides it.
pub const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(50);

// ============================================================================
// Actor trait
// ============================================================================

/// Message-driven unit of execution.
///
/// `Message` is normally a per-actor enum matched exhaustively in
/// [`Actor::on_message`].
pub trait Actor: Send + 'static {
    type Message: Send + 'static;

    fn on_start(&mut self, _ctx: &Context<Self::Message>) -> Result<(), ActorError> {
        Ok(())
    }

    fn on_message(
        &mut self,
        message: Self::Message,
        ctx: &Context<Self::Message>,
    ) -> Result<(), ActorError>;

    fn on_idle(&mut self, _ctx: &Context<Self::Message>) -> Result<Duration, ActorError> {
        Ok(DEFAULT_IDLE_WAIT)
    }

    fn on_stop(&mut self, _ctx: &Context<Self::Message>) -> Result<(), ActorError> {
        Ok(())
    }
}

/// Handle passed to every hook.
pub struct Context<M> {
    myself: ActorRef<M>,
}

impl<M: Send + 'static> Context<M> {
    /// Reference to the running actor's own mailbox.
    pub fn myself(&self) -> &ActorRef<M> {
        &self.myself
    }

    pub fn name(&self) -> &str {
        self.myself.name()
    }

    /// Stop after the current hook returns.
    pub fn stop(&self) {
        self.myself.stop();
    }

    pub fn is_stopping(&self) -> bool {
        self.myself.is_stopped()
    }
}

// ============================================================================
// Mailbox
// ============================================================================

enum Envelope<M> {
    Message(M),
    Stop,
}

struct Shared {
    name: String,
    stopped: AtomicBool,
}

/// Sending side of an actor's mailbox.
///
/// Cheap to clone. Sending never blocks and never fails: messages sent after
/// [`ActorRef::stop`] are dropped.
pub struct ActorRef<M> {
    tx: Sender<Envelope<M>>,
    shared: Arc<Shared>,
}

impl<M> Clone for ActorRef<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M> fmt::Debug for ActorRef<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("name", &self.shared.name)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl<M: Send + 'static> ActorRef<M> {
    /// Enqueue a message.
    pub fn send(&self, message: M) {
        if self.is_stopped() {
            trace!(actor = %self.shared.name, "Dropping message sent to stopped actor");
            return;
        }
        if self.tx.send(Envelope::Message(message)).is_err() {
            trace!(actor = %self.shared.name, "Dropping message sent to terminated actor");
        }
    }

    /// Request graceful termination after the in-flight message completes.
    ///
    /// Idempotent. Messages still queued are dropped unprocessed.
    pub fn stop(&self) {
        if !self.shared.stopped.swap(true, Ordering::SeqCst) {
            debug!(actor = %self.shared.name, "Stop requested");
            // Wakes an actor blocked waiting for its next message.
            let _ = self.tx.send(Envelope::Stop);
        }
    }
}

impl<M> ActorRef<M> {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }
}

/// Receiving side of an actor's mailbox, consumed by [`spawn`].
pub struct Mailbox<M> {
    rx: Receiver<Envelope<M>>,
    actor_ref: ActorRef<M>,
}

impl<M> Mailbox<M> {
    pub fn actor_ref(&self) -> &ActorRef<M> {
        &self.actor_ref
    }

    /// Take one message without running an actor.
    ///
    /// Lets a test stand in for an actor and observe what is sent to it.
    /// Returns `None` on timeout or once the mailbox has been stopped.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<M> {
        match self.rx.recv_timeout(timeout) {
            Ok(Envelope::Message(message)) => Some(message),
            _ => None,
        }
    }
}

/// Create a mailbox before its actor exists.
///
/// Actors that reference each other are wired by creating every mailbox
/// first, then spawning each actor with clones of the others' refs.
pub fn mailbox<M>(name: impl Into<String>) -> (ActorRef<M>, Mailbox<M>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let actor_ref = ActorRef {
        tx,
        shared: Arc::new(Shared {
            name: name.into(),
            stopped: AtomicBool::new(false),
        }),
    };
    (
        actor_ref.clone(),
        Mailbox {
            rx,
            actor_ref,
        },
    )
}

// ============================================================================
// Spawning
// ============================================================================

/// Owner handle of a running actor thread.
pub struct ActorHandle<M> {
    actor_ref: ActorRef<M>,
    thread: Option<JoinHandle<()>>,
}

impl<M: Send + 'static> ActorHandle<M> {
    pub fn actor_ref(&self) -> &ActorRef<M> {
        &self.actor_ref
    }

    pub fn name(&self) -> &str {
        self.actor_ref.name()
    }

    pub fn stop(&self) {
        self.actor_ref.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Wait for the actor thread to exit. Joining twice is a no-op.
    pub fn join(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        if thread.thread().id() == thread::current().id() {
            // An actor cannot wait for itself; the thread exits on its own.
            return;
        }
        if thread.join().is_err() {
            warn!(actor = %self.actor_ref.name(), "Actor thread terminated abnormally");
        }
    }

    pub fn stop_and_join(&mut self) {
        self.stop();
        self.join();
    }
}

/// Run `actor` on a dedicated thread named after its mailbox.
pub fn spawn<A: Actor>(
    mailbox: Mailbox<A::Message>,
    actor: A,
    errors: ErrorSink,
) -> Result<ActorHandle<A::Message>, ActorError> {
    let actor_ref = mailbox.actor_ref.clone();
    let thread = thread::Builder::new()
        .name(actor_ref.name().to_string())
        .spawn(move || run(actor, mailbox, errors))?;

    Ok(ActorHandle {
        actor_ref,
        thread: Some(thread),
    })
}

fn run<A: Actor>(mut actor: A, mailbox: Mailbox<A::Message>, errors: ErrorSink) {
    let Mailbox { rx, actor_ref } = mailbox;
    let ctx = Context { myself: actor_ref };
    let span = info_span!("actor", name = %ctx.name());
    let _entered = span.enter();

    debug!("Actor starting");
    if let Err(error) = guard(|| actor.on_start(&ctx)) {
        errors.report(Fault::new(ctx.name(), Phase::Start, error));
        ctx.stop();
    } else {
        message_loop(&mut actor, &ctx, &rx, &errors);
    }

    // Drop queued messages now so pending reply targets disconnect.
    let dropped = rx.try_iter().count();
    if dropped > 0 {
        debug!(dropped, "Discarded queued messages");
    }
    drop(rx);

    if let Err(error) = guard(|| actor.on_stop(&ctx)) {
        errors.report(Fault::new(ctx.name(), Phase::Stop, error));
    }
    debug!("Actor stopped");
}

fn message_loop<A: Actor>(
    actor: &mut A,
    ctx: &Context<A::Message>,
    rx: &Receiver<Envelope<A::Message>>,
    errors: &ErrorSink,
) {
    loop {
        if ctx.is_stopping() {
            break;
        }

        let envelope = match rx.try_recv() {
            Ok(envelope) => envelope,
            Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {
                let wait = match guard(|| actor.on_idle(ctx)) {
                    Ok(wait) => wait,
                    Err(error) => {
                        errors.report(Fault::new(ctx.name(), Phase::Idle, error));
                        DEFAULT_IDLE_WAIT
                    }
                };
                if ctx.is_stopping() {
                    break;
                }
                match rx.recv_timeout(wait) {
                    Ok(envelope) => envelope,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        };

        match envelope {
            Envelope::Stop => break,
            Envelope::Message(message) => {
                if let Err(error) = guard(|| actor.on_message(message, ctx)) {
                    errors.report(Fault::new(ctx.name(), Phase::Message, error));
                }
            }
        }
    }
}

/// Run a hook, turning a panic into [`ActorError::Panicked`].
fn guard<T>(hook: impl FnOnce() -> Result<T, ActorError>) -> Result<T, ActorError> {
    match panic::catch_unwind(AssertUnwindSafe(hook)) {
        Ok(result) => result,
        Err(payload) => Err(ActorError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Text of a panic payload caught with `catch_unwind`.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

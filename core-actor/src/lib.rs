//! # Core Actor Runtime
//!
//! Thread-per-actor mailbox runtime and the message-protocol primitives the
//! playback engine is built from.
//!
//! ## Overview
//!
//! - [`actor`] - the [`Actor`] trait, mailboxes, [`spawn`] and handles
//! - [`fault`] - fault escalation and the [`ErrorReporter`] actor
//! - [`protocol`] - [`ReplyTo`], [`Rendezvous`], [`ask`] and [`Change`]
//!
//! Actors run on dedicated OS threads rather than async tasks: decoder and
//! audio device calls block, and each actor owns exactly one of them.

pub mod actor;
pub mod error;
pub mod fault;
pub mod protocol;

pub use actor::{
    mailbox, panic_message, spawn, Actor, ActorHandle, ActorRef, Context, Mailbox,
    DEFAULT_IDLE_WAIT,
};
pub use error::{ActorError, RendezvousError};
pub use fault::{ErrorReporter, ErrorSink, Fault, FaultHandler, Phase};
pub use protocol::{ask, ask_timeout, Change, Rendezvous, ReplyTo};

//! Marker traits keeping collaborator bounds aligned with the threading model.
//!
//! Every actor runs on its own OS thread, so collaborators handed to an actor
//! must be `Send`, and collaborators shared between the engine facade and its
//! actors must be `Send + Sync`.

/// Marker trait for collaborators shared across threads.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}

/// Marker trait for collaborators moved onto a single actor thread.
pub trait PlatformSend: Send {}

impl<T> PlatformSend for T where T: Send {}

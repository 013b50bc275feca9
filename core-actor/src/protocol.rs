//! Request/response plumbing shared by every actor.
//!
//! Fire-and-forget notifications are plain mailbox sends. Requests carry a
//! [`ReplyTo`] that accepts exactly one reply. Non-actor threads that need an
//! answer block on a [`Rendezvous`] (or the [`ask`] shorthand).

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::trace;

use crate::actor::ActorRef;
use crate::error::RendezvousError;

// ============================================================================
// Reply targets
// ============================================================================

enum Target<T> {
    Channel(Sender<T>),
    Callback(Box<dyn FnOnce(T) + Send>),
    Discard,
}

/// Single-use reply target.
///
/// Replying consumes the target. Dropping it unanswered is observed by a
/// waiting [`Rendezvous`] as disconnection.
pub struct ReplyTo<T> {
    target: Target<T>,
}

impl<T: Send + 'static> ReplyTo<T> {
    /// Reply into a channel. Never blocks: a full or closed channel drops the
    /// reply.
    pub fn channel(tx: Sender<T>) -> Self {
        Self {
            target: Target::Channel(tx),
        }
    }

    /// Reply by sending `wrap(reply)` to an actor mailbox.
    pub fn actor<M, F>(actor: ActorRef<M>, wrap: F) -> Self
    where
        M: Send + 'static,
        F: FnOnce(T) -> M + Send + 'static,
    {
        Self::from_fn(move |reply| actor.send(wrap(reply)))
    }

    pub fn from_fn(f: impl FnOnce(T) + Send + 'static) -> Self {
        Self {
            target: Target::Callback(Box::new(f)),
        }
    }

    /// Target that accepts and drops the reply.
    pub fn discard() -> Self {
        Self {
            target: Target::Discard,
        }
    }

    pub fn is_discard(&self) -> bool {
        matches!(self.target, Target::Discard)
    }

    pub fn reply(self, value: T) {
        match self.target {
            Target::Channel(tx) => {
                if tx.try_send(value).is_err() {
                    trace!("Reply dropped: receiver gone or full");
                }
            }
            Target::Callback(f) => f(value),
            Target::Discard => {}
        }
    }
}

impl<T> fmt::Debug for ReplyTo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.target {
            Target::Channel(_) => "channel",
            Target::Callback(_) => "callback",
            Target::Discard => "discard",
        };
        f.debug_tuple("ReplyTo").field(&kind).finish()
    }
}

// ============================================================================
// Rendezvous
// ============================================================================

/// Bounded receiver that blocks until exactly `n` replies arrived.
///
/// # Example
///
/// ```ignore
/// let rendezvous = Rendezvous::new(2);
/// cache.send(CacheMsg::Stats(rendezvous.reply_to()));
/// fetcher.send(FetcherMsg::QueryInfo(rendezvous.reply_to()));
/// let replies = rendezvous.wait()?; // arrival order
/// ```
pub struct Rendezvous<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    expected: usize,
}

impl<T: Send + 'static> Rendezvous<T> {
    pub fn new(expected: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(expected.max(1));
        Self { tx, rx, expected }
    }

    /// A reply target feeding this rendezvous.
    pub fn reply_to(&self) -> ReplyTo<T> {
        ReplyTo::channel(self.tx.clone())
    }

    /// Block until every expected reply arrived; replies are returned in
    /// arrival order.
    pub fn wait(self) -> Result<Vec<T>, RendezvousError> {
        let Self { tx, rx, expected } = self;
        drop(tx);

        let mut replies = Vec::with_capacity(expected);
        while replies.len() < expected {
            match rx.recv() {
                Ok(reply) => replies.push(reply),
                Err(_) => {
                    return Err(RendezvousError::Disconnected {
                        received: replies.len(),
                        expected,
                    })
                }
            }
        }
        Ok(replies)
    }

    /// Like [`Rendezvous::wait`] but gives up after `timeout`.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Vec<T>, RendezvousError> {
        let Self { tx, rx, expected } = self;
        drop(tx);

        let deadline = Instant::now() + timeout;
        let mut replies = Vec::with_capacity(expected);
        while replies.len() < expected {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(reply) => replies.push(reply),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(RendezvousError::Timeout {
                        received: replies.len(),
                        expected,
                        timeout,
                    })
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(RendezvousError::Disconnected {
                        received: replies.len(),
                        expected,
                    })
                }
            }
        }
        Ok(replies)
    }
}

/// Send one request and block for its reply.
pub fn ask<M, T>(
    actor: &ActorRef<M>,
    request: impl FnOnce(ReplyTo<T>) -> M,
) -> Result<T, RendezvousError>
where
    M: Send + 'static,
    T: Send + 'static,
{
    let rendezvous = Rendezvous::new(1);
    actor.send(request(rendezvous.reply_to()));
    single(rendezvous.wait()?)
}

/// [`ask`] with an upper bound on the wait.
pub fn ask_timeout<M, T>(
    actor: &ActorRef<M>,
    timeout: Duration,
    request: impl FnOnce(ReplyTo<T>) -> M,
) -> Result<T, RendezvousError>
where
    M: Send + 'static,
    T: Send + 'static,
{
    let rendezvous = Rendezvous::new(1);
    actor.send(request(rendezvous.reply_to()));
    single(rendezvous.wait_timeout(timeout)?)
}

fn single<T>(replies: Vec<T>) -> Result<T, RendezvousError> {
    replies
        .into_iter()
        .next()
        .ok_or(RendezvousError::Disconnected {
            received: 0,
            expected: 1,
        })
}

// ============================================================================
// Partial updates
// ============================================================================

/// Explicit present/absent marker for one field of a partial update.
///
/// `Keep` leaves the field alone. `Set(value)` overwrites it, so for an
/// optional field `Set(None)` clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change<T> {
    Keep,
    Set(T),
}

impl<T> Default for Change<T> {
    fn default() -> Self {
        Change::Keep
    }
}

impl<T> Change<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Change::Set(_))
    }

    /// Write the new value into `target`. Returns whether anything changed hands.
    pub fn apply(self, target: &mut T) -> bool {
        match self {
            Change::Keep => false,
            Change::Set(value) => {
                *target = value;
                true
            }
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Change::Keep => None,
            Change::Set(value) => Some(value),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Change<U> {
        match self {
            Change::Keep => Change::Keep,
            Change::Set(value) => Change::Set(f(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_rendezvous_collects_in_arrival_order() {
        let rendezvous = Rendezvous::new(3);
        let targets: Vec<_> = (0..3).map(|_| rendezvous.reply_to()).collect();
        for (i, target) in targets.into_iter().enumerate().rev() {
            target.reply(i);
        }
        assert_eq!(rendezvous.wait().unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn test_rendezvous_across_threads() {
        let rendezvous = Rendezvous::new(2);
        let a = rendezvous.reply_to();
        let b = rendezvous.reply_to();
        let worker = thread::spawn(move || {
            a.reply("a");
            b.reply("b");
        });
        assert_eq!(rendezvous.wait().unwrap(), vec!["a", "b"]);
        worker.join().unwrap();
    }

    #[test]
    fn test_dropped_target_disconnects() {
        let rendezvous: Rendezvous<u8> = Rendezvous::new(2);
        let a = rendezvous.reply_to();
        let b = rendezvous.reply_to();
        a.reply(1);
        drop(b);
        assert_eq!(
            rendezvous.wait(),
            Err(RendezvousError::Disconnected {
                received: 1,
                expected: 2
            })
        );
    }

    #[test]
    fn test_wait_timeout() {
        let rendezvous: Rendezvous<u8> = Rendezvous::new(1);
        let _pending = rendezvous.reply_to();
        let err = rendezvous
            .wait_timeout(Duration::from_millis(20))
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_surplus_reply_does_not_block() {
        let rendezvous = Rendezvous::new(1);
        rendezvous.reply_to().reply(1);
        rendezvous.reply_to().reply(2);
        assert_eq!(rendezvous.wait().unwrap(), vec![1]);
    }

    #[test]
    fn test_discard_and_callback_targets() {
        ReplyTo::<u8>::discard().reply(5);
        assert!(ReplyTo::<u8>::discard().is_discard());

        let (tx, rx) = crossbeam_channel::unbounded();
        ReplyTo::from_fn(move |v: u8| tx.send(v * 2).unwrap()).reply(21);
        assert_eq!(rx.recv().unwrap(), 42);
    }

    #[test]
    fn test_change_semantics() {
        let mut speed = 1.0;
        assert!(!Change::Keep.apply(&mut speed));
        assert_eq!(speed, 1.0);
        assert!(Change::Set(2.0).apply(&mut speed));
        assert_eq!(speed, 2.0);

        let mut bounds = Some(5u64);
        assert!(Change::Set(None).apply(&mut bounds));
        assert_eq!(bounds, None);

        assert_eq!(Change::Set(3).map(|v| v + 1), Change::Set(4));
        assert_eq!(Change::<u8>::default(), Change::Keep);
        assert_eq!(Change::Set(1).into_option(), Some(1));
    }
}

//! Fault escalation.
//!
//! Hook failures never crash an actor thread. They are wrapped in a [`Fault`]
//! and funnelled to one error-handling actor, the [`ErrorReporter`], which is
//! the single place where the application decides what a failure means.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, warn};

use crate::actor::{mailbox, spawn, Actor, ActorHandle, ActorRef, Context};
use crate::error::ActorError;

/// Hook in which a fault was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Start,
    Message,
    Idle,
    Stop,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Start => "start",
            Phase::Message => "message",
            Phase::Idle => "idle",
            Phase::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// An escalated hook failure.
#[derive(Debug)]
pub struct Fault {
    pub actor: String,
    pub phase: Phase,
    pub error: ActorError,
}

impl Fault {
    pub fn new(actor: impl Into<String>, phase: Phase, error: ActorError) -> Self {
        Self {
            actor: actor.into(),
            phase,
            error,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.error.is_fatal()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed in {}: {}", self.actor, self.phase, self.error)
    }
}

/// Where an actor escalates its faults.
#[derive(Debug, Clone)]
pub enum ErrorSink {
    /// Forward to the error-handling actor.
    Actor(ActorRef<Fault>),
    /// Log and swallow. Used by the error-handling actor itself.
    Log,
}

impl ErrorSink {
    pub fn report(&self, fault: Fault) {
        match self {
            ErrorSink::Actor(reporter) if !reporter.is_stopped() => reporter.send(fault),
            _ => log_fault(&fault),
        }
    }
}

fn log_fault(fault: &Fault) {
    if fault.is_fatal() {
        error!(actor = %fault.actor, phase = %fault.phase, fatal = true, "{}", fault.error);
    } else {
        warn!(actor = %fault.actor, phase = %fault.phase, "{}", fault.error);
    }
}

/// Application callback invoked for every escalated fault.
pub type FaultHandler = Box<dyn FnMut(&Fault) + Send>;

/// The error-handling actor.
///
/// Logs every fault and hands it to the configured handler. A panicking
/// handler is caught by the actor loop and logged, so one bad fault never
/// stops delivery of the next.
pub struct ErrorReporter {
    handler: FaultHandler,
}

impl ErrorReporter {
    pub fn new(handler: FaultHandler) -> Self {
        Self { handler }
    }

    /// Spawn a reporter on its own thread, escalating its own faults to the log.
    pub fn spawn(
        name: impl Into<String>,
        handler: FaultHandler,
    ) -> Result<ActorHandle<Fault>, ActorError> {
        let (_, reporter_mailbox) = mailbox(name);
        spawn(reporter_mailbox, ErrorReporter::new(handler), ErrorSink::Log)
    }
}

impl Actor for ErrorReporter {
    type Message = Fault;

    fn on_message(&mut self, fault: Fault, _ctx: &Context<Fault>) -> Result<(), ActorError> {
        log_fault(&fault);
        (self.handler)(&fault);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fault_display() {
        let fault = Fault::new("frame-fetcher", Phase::Start, ActorError::failed("no such file"));
        assert_eq!(fault.to_string(), "frame-fetcher failed in start: no such file");
        assert!(!fault.is_fatal());
    }

    #[test]
    fn test_reporter_survives_panicking_handler() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut calls = 0;
        let handler: FaultHandler = Box::new(move |fault: &Fault| {
            calls += 1;
            if calls == 1 {
                panic!("handler bug");
            }
            let _ = tx.send(fault.actor.clone());
        });

        let mut reporter = ErrorReporter::spawn("errors", handler).unwrap();
        let sink = ErrorSink::Actor(reporter.actor_ref().clone());
        sink.report(Fault::new("a", Phase::Message, ActorError::failed("first")));
        sink.report(Fault::new("b", Phase::Message, ActorError::failed("second")));

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "b");
        reporter.stop_and_join();
    }

    #[test]
    fn test_report_to_stopped_reporter_falls_back_to_log() {
        let (reporter_ref, _mailbox) = mailbox::<Fault>("errors");
        reporter_ref.stop();
        let sink = ErrorSink::Actor(reporter_ref);
        // Must not panic or block.
        sink.report(Fault::new("a", Phase::Idle, ActorError::fatal("corrupt")));
    }
}

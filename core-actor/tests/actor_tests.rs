//! Integration tests for the actor runtime: lifecycle hooks, escalation and
//! request/response round-trips.

use core_actor::{
    ask, ask_timeout, mailbox, spawn, Actor, ActorError, Context, ErrorReporter, ErrorSink, Fault,
    FaultHandler, Phase, Rendezvous, RendezvousError, ReplyTo,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Hooks {
    started: AtomicUsize,
    idled: AtomicUsize,
    stopped: AtomicUsize,
}

enum CounterMsg {
    Add(u64),
    Get(ReplyTo<u64>),
    Sleep(Duration),
}

struct Counter {
    total: u64,
    hooks: Arc<Hooks>,
    fail_start: bool,
    idle_wait: Duration,
}

impl Counter {
    fn new(hooks: Arc<Hooks>) -> Self {
        Self {
            total: 0,
            hooks,
            fail_start: false,
            idle_wait: Duration::from_millis(5),
        }
    }
}

impl Actor for Counter {
    type Message = CounterMsg;

    fn on_start(&mut self, _ctx: &Context<CounterMsg>) -> Result<(), ActorError> {
        self.hooks.started.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(ActorError::failed("device busy"));
        }
        Ok(())
    }

    fn on_message(&mut self, message: CounterMsg, _ctx: &Context<CounterMsg>) -> Result<(), ActorError> {
        match message {
            CounterMsg::Add(n) => self.total += n,
            CounterMsg::Get(reply) => reply.reply(self.total),
            CounterMsg::Sleep(d) => std::thread::sleep(d),
        }
        Ok(())
    }

    fn on_idle(&mut self, _ctx: &Context<CounterMsg>) -> Result<Duration, ActorError> {
        self.hooks.idled.fetch_add(1, Ordering::SeqCst);
        Ok(self.idle_wait)
    }

    fn on_stop(&mut self, _ctx: &Context<CounterMsg>) -> Result<(), ActorError> {
        self.hooks.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn collecting_reporter() -> (core_actor::ActorHandle<Fault>, Arc<Mutex<Vec<(String, Phase)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler: FaultHandler = Box::new(move |fault: &Fault| {
        sink.lock().push((fault.actor.clone(), fault.phase));
    });
    (ErrorReporter::spawn("errors", handler).unwrap(), seen)
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn test_ask_round_trip() {
    let hooks = Arc::new(Hooks::default());
    let (counter, counter_mailbox) = mailbox("counter");
    let mut handle = spawn(counter_mailbox, Counter::new(hooks), ErrorSink::Log).unwrap();

    counter.send(CounterMsg::Add(40));
    counter.send(CounterMsg::Add(2));
    assert_eq!(ask(&counter, CounterMsg::Get).unwrap(), 42);

    handle.stop_and_join();
}

#[test]
fn test_idle_hook_runs_while_mailbox_empty() {
    let hooks = Arc::new(Hooks::default());
    let (_counter, counter_mailbox) = mailbox("counter");
    let mut handle = spawn(counter_mailbox, Counter::new(Arc::clone(&hooks)), ErrorSink::Log).unwrap();

    assert!(wait_until(|| hooks.idled.load(Ordering::SeqCst) >= 3));
    handle.stop_and_join();
}

#[test]
fn test_stop_is_idempotent_and_runs_on_stop_once() {
    let hooks = Arc::new(Hooks::default());
    let (counter, counter_mailbox) = mailbox("counter");
    let mut handle = spawn(counter_mailbox, Counter::new(Arc::clone(&hooks)), ErrorSink::Log).unwrap();

    counter.stop();
    counter.stop();
    handle.stop();
    handle.join();
    handle.join();

    assert_eq!(hooks.started.load(Ordering::SeqCst), 1);
    assert_eq!(hooks.stopped.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stop_wakes_actor_blocked_on_long_idle() {
    let hooks = Arc::new(Hooks::default());
    let mut actor = Counter::new(Arc::clone(&hooks));
    actor.idle_wait = Duration::from_secs(60);
    let (_counter, counter_mailbox) = mailbox("counter");
    let mut handle = spawn(counter_mailbox, actor, ErrorSink::Log).unwrap();

    assert!(wait_until(|| hooks.idled.load(Ordering::SeqCst) >= 1));
    let started = Instant::now();
    handle.stop_and_join();
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_stop_takes_effect_after_in_flight_message() {
    let hooks = Arc::new(Hooks::default());
    let (counter, counter_mailbox) = mailbox("counter");
    let mut handle = spawn(counter_mailbox, Counter::new(hooks), ErrorSink::Log).unwrap();

    counter.send(CounterMsg::Sleep(Duration::from_millis(50)));
    std::thread::sleep(Duration::from_millis(10));
    counter.send(CounterMsg::Add(1));
    let rendezvous = Rendezvous::new(1);
    counter.send(CounterMsg::Get(rendezvous.reply_to()));
    counter.stop();

    // Queued messages are dropped, so the reply target is dropped unanswered.
    assert_eq!(
        rendezvous.wait(),
        Err(RendezvousError::Disconnected {
            received: 0,
            expected: 1
        })
    );
    handle.join();
}

#[test]
fn test_failing_start_escalates_and_terminates() {
    let (mut reporter, seen) = collecting_reporter();
    let hooks = Arc::new(Hooks::default());
    let mut actor = Counter::new(Arc::clone(&hooks));
    actor.fail_start = true;

    let (counter, counter_mailbox) = mailbox("frame-fetcher");
    let mut handle = spawn(
        counter_mailbox,
        actor,
        ErrorSink::Actor(reporter.actor_ref().clone()),
    )
    .unwrap();

    handle.join();
    assert!(counter.is_stopped());
    assert_eq!(hooks.stopped.load(Ordering::SeqCst), 1);
    assert!(wait_until(|| !seen.lock().is_empty()));
    assert_eq!(seen.lock()[0], ("frame-fetcher".to_string(), Phase::Start));

    let result = ask_timeout(&counter, Duration::from_millis(100), CounterMsg::Get);
    assert!(matches!(result, Err(RendezvousError::Disconnected { .. })));

    reporter.stop_and_join();
}

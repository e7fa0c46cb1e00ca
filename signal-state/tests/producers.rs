//! Integration Tests for Producer Bindings
//!
//! These tests drive `connect_producers` and `trigger` on a current-thread
//! Tokio runtime, resolving each producer invocation by hand.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::stream;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use signal_state::{
    field, BoxError, Field, Fields, ProducerConnections, Record, SignalState, StateError,
};

#[derive(Debug, Clone, PartialEq)]
struct Profile {
    user: String,
    visits: u32,
}

impl Profile {
    const USER: Field<Self, String> = field!(Profile, user: String);
    const VISITS: Field<Self, u32> = field!(Profile, visits: u32);
}

impl Record for Profile {
    fn fields() -> Fields<Self> {
        Fields::new().with(Self::USER).with(Self::VISITS)
    }
}

fn profile() -> SignalState<Profile> {
    let state = SignalState::new();
    state
        .initialize(Profile {
            user: String::new(),
            visits: 0,
        })
        .unwrap();
    state
}

/// Let spawned producer tasks run to their next suspension point.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// A producer whose invocations are resolved one by one from the test.
#[derive(Clone, Default)]
struct Scripted {
    pending: Arc<Mutex<VecDeque<oneshot::Receiver<u32>>>>,
    calls: Arc<AtomicUsize>,
}

impl Scripted {
    /// Queue the response channel for the next invocation.
    fn expect(&self) -> oneshot::Sender<u32> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().push_back(rx);
        tx
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn producer(&self) -> impl Fn() -> stream::Once<futures_util::future::BoxFuture<'static, Result<u32, BoxError>>> + Send + Sync + 'static {
        let script = self.clone();
        move || {
            script.calls.fetch_add(1, Ordering::SeqCst);
            let rx = script.pending.lock().pop_front();
            let response: futures_util::future::BoxFuture<'static, Result<u32, BoxError>> =
                Box::pin(async move {
                    match rx {
                        Some(rx) => rx.await.map_err(BoxError::from),
                        None => Err(BoxError::from("no response queued")),
                    }
                });
            stream::once(response)
        }
    }
}

/// Registration invokes the producer once and writes its first value.
#[tokio::test]
async fn registration_invokes_producer_immediately() {
    let state = profile();
    let script = Scripted::default();
    let first = script.expect();

    state
        .connect_producers(ProducerConnections::new().bind(Profile::VISITS, script.producer()))
        .unwrap();
    assert_eq!(script.calls(), 1);
    assert_eq!(state.trigger_count(Profile::VISITS), Some(0));

    first.send(7).unwrap();
    settle().await;

    assert_eq!(state.select(Profile::VISITS).unwrap().get(), 7);
}

/// trigger re-invokes the producer, and a newer trigger supersedes an
/// older pending invocation.
#[tokio::test]
async fn last_trigger_wins() {
    let state = profile();
    let script = Scripted::default();
    let first = script.expect();
    let second = script.expect();
    let third = script.expect();

    state
        .connect_producers(ProducerConnections::new().bind(Profile::VISITS, script.producer()))
        .unwrap();
    first.send(1).unwrap();
    settle().await;
    assert_eq!(state.snapshot().unwrap().visits, 1);

    state.trigger(Profile::VISITS).unwrap();
    assert_eq!(script.calls(), 2);

    // Fire again before the second invocation resolves
    state.trigger(Profile::VISITS).unwrap();
    assert_eq!(script.calls(), 3);
    assert_eq!(state.trigger_count(Profile::VISITS), Some(2));

    // The superseded invocation may already be aborted
    let _ = second.send(2);
    settle().await;
    assert_eq!(state.snapshot().unwrap().visits, 1);

    third.send(3).unwrap();
    settle().await;
    assert_eq!(state.snapshot().unwrap().visits, 3);
}

/// Only the first emission of a multi-valued producer is used.
#[tokio::test]
async fn only_first_emission_is_written() {
    let state = profile();
    let producer = || stream::iter(vec![Ok::<_, io::Error>(10u32), Ok(20), Ok(30)]);

    state
        .connect_producers(ProducerConnections::new().bind(Profile::VISITS, producer))
        .unwrap();
    settle().await;

    assert_eq!(state.snapshot().unwrap().visits, 10);
}

/// Producer failures surface on the error channel and trigger retries.
#[tokio::test]
async fn failures_are_published_and_retriable() {
    let state = profile();
    let mut errors = state.errors();
    let attempts = Arc::new(AtomicUsize::new(0));

    let counter = attempts.clone();
    let producer = move || {
        let attempt = counter.fetch_add(1, Ordering::SeqCst);
        let result = if attempt == 0 {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "offline"))
        } else {
            Ok(format!("user-{attempt}"))
        };
        stream::once(async move { result })
    };

    state
        .connect_producers(ProducerConnections::new().bind(Profile::USER, producer))
        .unwrap();
    settle().await;

    let failure = errors.try_recv().unwrap();
    assert_eq!(failure.field, "user");
    assert_eq!(failure.source.to_string(), "offline");
    assert_eq!(failure.to_string(), "producer for field `user` failed: offline");
    assert_eq!(state.snapshot().unwrap().user, "");

    state.trigger(Profile::USER).unwrap();
    settle().await;

    assert_eq!(state.snapshot().unwrap().user, "user-1");
    assert!(errors.try_recv().is_err());
}

/// Registering the same field twice shares one trigger.
#[tokio::test]
async fn repeated_registration_shares_trigger() {
    let state = profile();
    let calls = Arc::new(AtomicUsize::new(0));

    let make = |calls: Arc<AtomicUsize>| {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            stream::once(async { Ok::<_, io::Error>(1u32) })
        }
    };

    state
        .connect_producers(ProducerConnections::new().bind(Profile::VISITS, make(calls.clone())))
        .unwrap();
    state
        .connect_producers(ProducerConnections::new().bind(Profile::VISITS, make(calls.clone())))
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    state.trigger(Profile::VISITS).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(state.trigger_count(Profile::VISITS), Some(1));
}

/// Triggering a field without a producer is an error.
#[tokio::test]
async fn trigger_requires_registration() {
    let state = profile();
    let script = Scripted::default();
    state
        .connect_producers(ProducerConnections::new().bind(Profile::VISITS, script.producer()))
        .unwrap();

    assert_eq!(
        state.trigger(Profile::USER),
        Err(StateError::NoTriggerRegistered { field: "user" })
    );
    assert_eq!(state.trigger_count(Profile::USER), None);
}

/// Disposal drops pending results and stops future invocations.
#[tokio::test]
async fn dispose_cancels_pending_invocations() {
    let state = profile();
    let script = Scripted::default();
    let first = script.expect();

    state
        .connect_producers(ProducerConnections::new().bind(Profile::VISITS, script.producer()))
        .unwrap();
    state.dispose();

    let _ = first.send(5);
    settle().await;
    assert_eq!(state.snapshot().unwrap().visits, 0);

    state.trigger(Profile::VISITS).unwrap();
    assert_eq!(script.calls(), 1);
}

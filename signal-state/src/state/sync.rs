//! Sync engine: one-way bindings from external sources into fields.
//!
//! Two kinds of source are supported:
//!
//! - reactive values ([`Readable`]), bound with [`SignalState::connect`]; the
//!   field follows the source for as long as the container lives.
//! - asynchronous producers ([`Producer`]), bound with
//!   [`SignalState::connect_producers`]; the producer is invoked once on
//!   registration and again on every [`SignalState::trigger`], and the first
//!   value of each invocation is written to the field.
//!
//! Producer invocations follow last-trigger-wins: every firing takes a new
//! ticket from a per-binding sequence, and a result is written only if its
//! ticket is still the latest when it arrives. Superseded tasks are also
//! aborted, but correctness does not depend on the abort landing in time.

use std::cell::RefCell;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use parking_lot::ReentrantMutex;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use super::error::StateError;
use super::record::{Field, FieldKey, Record, Value};
use super::registry::CellRegistry;
use super::{Inner, SignalState};
use crate::reactive::{untracked, Effect, Readable, Signal};

/// Error type produced by [`Producer`] streams.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// An asynchronous, possibly multi-valued source of field values.
///
/// Every call to `produce` starts a fresh invocation. Only the first item of
/// each invocation is used.
///
/// Implemented for any `Fn() -> impl Stream<Item = Result<V, E>>`; see
/// [`from_future`] for single-shot futures.
pub trait Producer<V>: Send + Sync + 'static {
    fn produce(&self) -> BoxStream<'static, Result<V, BoxError>>;
}

impl<V, E, F, S> Producer<V> for F
where
    V: Send + 'static,
    E: Into<BoxError> + 'static,
    F: Fn() -> S + Send + Sync + 'static,
    S: Stream<Item = Result<V, E>> + Send + 'static,
{
    fn produce(&self) -> BoxStream<'static, Result<V, BoxError>> {
        (self)().map(|item| item.map_err(Into::into)).boxed()
    }
}

/// Adapt a future factory into a [`Producer`] emitting one value.
///
/// ```rust,ignore
/// let user = from_future(move || client.fetch_user(id));
/// ```
pub fn from_future<V, E, F, Fut>(factory: F) -> impl Fn() -> stream::Once<Fut> + Send + Sync + 'static
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    move || stream::once(factory())
}

/// A producer failure, as published on [`SignalState::errors`].
#[derive(Debug, Clone, Error)]
#[error("producer for field `{field}` failed: {source}")]
pub struct SyncError {
    pub field: &'static str,
    #[source]
    pub source: Arc<dyn StdError + Send + Sync>,
}

impl SyncError {
    fn new(field: &'static str, source: BoxError) -> Self {
        Self {
            field,
            source: Arc::from(source),
        }
    }
}

// ----------------------------------------------------------------------------
// Reactive-value bindings
// ----------------------------------------------------------------------------

trait SourceBinding<R>: Send {
    fn field(&self) -> &'static str;

    fn validate(&self, registry: &CellRegistry<R>) -> Result<(), StateError>;

    fn attach(self: Box<Self>, state: &SignalState<R>) -> Effect;
}

struct ReadableBinding<R, V, S> {
    field: Field<R, V>,
    source: S,
}

impl<R, V, S> SourceBinding<R> for ReadableBinding<R, V, S>
where
    R: Record,
    V: Value,
    S: Readable<V>,
{
    fn field(&self) -> &'static str {
        self.field.name()
    }

    fn validate(&self, registry: &CellRegistry<R>) -> Result<(), StateError> {
        registry.cell(self.field).map(|_| ())
    }

    fn attach(self: Box<Self>, state: &SignalState<R>) -> Effect {
        let Self { field, source } = *self;
        let weak = state.downgrade();

        Effect::with_writes(move || {
            let value = source.get();
            let Some(state) = SignalState::upgrade(&weak) else {
                return;
            };
            if let Err(err) = state.sync_write(field, value) {
                warn!(
                    state = %state.inner.options.name,
                    field = field.name(),
                    error = %err,
                    "failed to forward source value"
                );
            }
        })
    }
}

/// Reactive sources to bind, built with [`Connections::bind`].
pub struct Connections<R> {
    bindings: Vec<Box<dyn SourceBinding<R>>>,
}

impl<R: Record> Connections<R> {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Keep `field` equal to `source`.
    pub fn bind<V, S>(mut self, field: Field<R, V>, source: S) -> Self
    where
        V: Value,
        S: Readable<V>,
    {
        self.bindings.push(Box::new(ReadableBinding { field, source }));
        self
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl<R: Record> Default for Connections<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> fmt::Debug for Connections<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<_> = self.bindings.iter().map(|b| b.field()).collect();
        f.debug_struct("Connections").field("fields", &fields).finish()
    }
}

// ----------------------------------------------------------------------------
// Producer bindings
// ----------------------------------------------------------------------------

trait ProducerSource<R>: Send {
    fn field(&self) -> &'static str;

    fn validate(&self, registry: &CellRegistry<R>) -> Result<(), StateError>;

    fn attach(self: Box<Self>, state: &SignalState<R>, trigger: Signal<u64>, runtime: Handle);
}

struct ProducerEntry<R, V, P> {
    field: Field<R, V>,
    producer: P,
}

impl<R, V, P> ProducerSource<R> for ProducerEntry<R, V, P>
where
    R: Record,
    V: Value,
    P: Producer<V>,
{
    fn field(&self) -> &'static str {
        self.field.name()
    }

    fn validate(&self, registry: &CellRegistry<R>) -> Result<(), StateError> {
        registry.cell(self.field).map(|_| ())
    }

    fn attach(self: Box<Self>, state: &SignalState<R>, trigger: Signal<u64>, runtime: Handle) {
        let binding = Arc::new(ProducerBinding::new(self.field, self.producer, state, runtime));

        let firing = Arc::clone(&binding);
        let effect = Effect::new(move || {
            trigger.get();
            firing.fire();
        });

        let owner = &state.inner.owner;
        owner.adopt(effect);
        owner.on_dispose(move || binding.cancel());
    }
}

#[derive(Default)]
struct InFlight {
    /// Ticket of the latest firing.
    sequence: u64,
    task: Option<AbortHandle>,
}

struct ProducerBinding<R, V, P> {
    field: Field<R, V>,
    producer: P,
    state: Weak<Inner<R>>,
    runtime: Handle,
    // Reentrant: a completed write may synchronously fire this binding again.
    inflight: ReentrantMutex<RefCell<InFlight>>,
}

impl<R, V, P> ProducerBinding<R, V, P>
where
    R: Record,
    V: Value,
    P: Producer<V>,
{
    fn new(field: Field<R, V>, producer: P, state: &SignalState<R>, runtime: Handle) -> Self {
        Self {
            field,
            producer,
            state: state.downgrade(),
            runtime,
            inflight: ReentrantMutex::new(RefCell::new(InFlight::default())),
        }
    }

    /// Start a fresh invocation, superseding any pending one.
    fn fire(self: &Arc<Self>) {
        let mut stream = untracked(|| self.producer.produce());

        let guard = self.inflight.lock();
        let mut inflight = guard.borrow_mut();
        inflight.sequence += 1;
        let ticket = inflight.sequence;

        if let Some(previous) = inflight.task.take() {
            previous.abort();
            debug!(field = self.field.name(), ticket, "superseding pending invocation");
        }

        let binding = Arc::clone(self);
        let task = self.runtime.spawn(async move {
            let first = stream.next().await;
            binding.complete(ticket, first);
        });
        inflight.task = Some(task.abort_handle());
    }

    fn complete(&self, ticket: u64, first: Option<Result<V, BoxError>>) {
        let field = self.field.name();
        // Held through the write so a newer firing cannot slip in between
        // the ticket check and the write.
        let guard = self.inflight.lock();
        {
            let mut inflight = guard.borrow_mut();
            if inflight.sequence != ticket {
                debug!(field, ticket, latest = inflight.sequence, "discarding superseded result");
                return;
            }
            inflight.task = None;
        }

        let Some(state) = SignalState::upgrade(&self.state) else {
            return;
        };
        if state.is_disposed() {
            return;
        }

        match first {
            Some(Ok(value)) => {
                if let Err(err) = state.sync_write(self.field, value) {
                    warn!(
                        state = %state.inner.options.name,
                        field,
                        error = %err,
                        "failed to write producer value"
                    );
                }
            }
            Some(Err(err)) => state.report(SyncError::new(field, err)),
            None => debug!(state = %state.inner.options.name, field, "producer completed without a value"),
        }
    }

    fn cancel(&self) {
        let guard = self.inflight.lock();
        let mut inflight = guard.borrow_mut();
        inflight.sequence += 1;
        if let Some(task) = inflight.task.take() {
            task.abort();
        }
    }
}

/// Producers to bind, built with [`ProducerConnections::bind`].
pub struct ProducerConnections<R> {
    sources: Vec<Box<dyn ProducerSource<R>>>,
}

impl<R: Record> ProducerConnections<R> {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Fill `field` from `producer`.
    pub fn bind<V, P>(mut self, field: Field<R, V>, producer: P) -> Self
    where
        V: Value,
        P: Producer<V>,
    {
        self.sources.push(Box::new(ProducerEntry { field, producer }));
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl<R: Record> Default for ProducerConnections<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> fmt::Debug for ProducerConnections<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<_> = self.sources.iter().map(|s| s.field()).collect();
        f.debug_struct("ProducerConnections")
            .field("fields", &fields)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Container operations
// ----------------------------------------------------------------------------

impl<R: Record> SignalState<R> {
    /// Bind fields to reactive sources.
    ///
    /// Each field takes the source's current value at once and follows it
    /// afterwards, until the container is disposed or dropped. Every field is
    /// checked before anything is bound.
    pub fn connect(&self, connections: Connections<R>) -> Result<(), StateError> {
        let registry = self.registry()?;
        for binding in &connections.bindings {
            binding.validate(registry)?;
        }

        for binding in connections.bindings {
            let field = binding.field();
            let effect = binding.attach(self);
            self.inner.owner.adopt(effect);
            debug!(state = %self.inner.options.name, field, "connected reactive source");
        }
        Ok(())
    }

    /// Bind fields to asynchronous producers.
    ///
    /// Each producer is invoked once now and again on every
    /// [`trigger`](Self::trigger) of its field. Results are delivered on the
    /// Tokio runtime current at this call; calling it outside one fails
    /// with [`StateError::NoAsyncRuntime`].
    pub fn connect_producers(&self, connections: ProducerConnections<R>) -> Result<(), StateError> {
        let registry = self.registry()?;
        for source in &connections.sources {
            source.validate(registry)?;
        }
        let runtime = Handle::try_current().map_err(|_| StateError::NoAsyncRuntime)?;

        for source in connections.sources {
            let field = source.field();
            let trigger = self
                .inner
                .triggers
                .entry(field)
                .or_insert_with(|| Signal::new(0))
                .clone();
            source.attach(self, trigger, runtime.clone());
            debug!(state = %self.inner.options.name, field, "connected producer");
        }
        Ok(())
    }

    /// Re-invoke the producer bound to `key`, superseding any invocation
    /// still pending.
    pub fn trigger(&self, key: impl Into<FieldKey<R>>) -> Result<(), StateError> {
        let field = key.into().name();
        self.registry()?;

        let trigger = self
            .inner
            .triggers
            .get(field)
            .map(|entry| entry.value().clone())
            .ok_or(StateError::NoTriggerRegistered { field })?;
        trigger.try_update(|count| count + 1)?;

        debug!(state = %self.inner.options.name, field, "triggered");
        Ok(())
    }

    /// How many times `key` has been triggered, or `None` if it has no
    /// producer.
    pub fn trigger_count(&self, key: impl Into<FieldKey<R>>) -> Option<u64> {
        self.inner
            .triggers
            .get(key.into().name())
            .map(|entry| entry.value().get_untracked())
    }

    /// Subscribe to producer failures.
    ///
    /// Only failures reported after this call are received.
    pub fn errors(&self) -> broadcast::Receiver<SyncError> {
        self.inner.errors.subscribe()
    }

    fn report(&self, err: SyncError) {
        warn!(
            state = %self.inner.options.name,
            field = err.field,
            error = %err.source,
            "producer failed"
        );
        // No receivers is fine; the failure is still logged.
        let _ = self.inner.errors.send(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field;
    use crate::state::Fields;

    #[derive(Debug, Clone, PartialEq)]
    struct Login {
        email: String,
        password: String,
    }

    impl Login {
        const EMAIL: Field<Self, String> = field!(Login, email: String);
        const PASSWORD: Field<Self, String> = field!(Login, password: String);
    }

    impl Record for Login {
        fn fields() -> Fields<Self> {
            Fields::new().with(Self::EMAIL).with(Self::PASSWORD)
        }
    }

    fn login() -> SignalState<Login> {
        let state = SignalState::new();
        state
            .initialize(Login {
                email: String::new(),
                password: String::new(),
            })
            .unwrap();
        state
    }

    #[test]
    fn connect_copies_and_follows_source() {
        let state = login();
        let source = Signal::new("first".to_string());

        state
            .connect(Connections::new().bind(Login::EMAIL, source.clone()))
            .unwrap();
        assert_eq!(state.snapshot().unwrap().email, "first");

        source.set("a@b.com".to_string());
        assert_eq!(state.select(Login::EMAIL).unwrap().get(), "a@b.com");
        assert_eq!(state.snapshot().unwrap().password, "");
    }

    #[test]
    fn connect_accepts_derived_sources() {
        let state = login();
        let raw = Signal::new("  padded  ".to_string());
        let reader = raw.clone();
        let trimmed = crate::reactive::Memo::new(move || reader.get().trim().to_string());

        state
            .connect(Connections::new().bind(Login::PASSWORD, trimmed))
            .unwrap();
        assert_eq!(state.snapshot().unwrap().password, "padded");

        raw.set(" next ".to_string());
        assert_eq!(state.snapshot().unwrap().password, "next");
    }

    #[test]
    fn dispose_stops_reactive_bindings() {
        let state = login();
        let source = Signal::new("kept".to_string());
        state
            .connect(Connections::new().bind(Login::EMAIL, source.clone()))
            .unwrap();

        state.dispose();
        source.set("ignored".to_string());
        assert_eq!(state.snapshot().unwrap().email, "kept");
    }

    #[test]
    fn connect_before_initialize_fails() {
        let state = SignalState::<Login>::new();
        let result = state.connect(Connections::new().bind(Login::EMAIL, Signal::new(String::new())));
        assert_eq!(result, Err(StateError::NotInitialized));
    }

    #[test]
    fn producers_need_a_tokio_runtime() {
        let state = login();
        let producer = || stream::once(async { Ok::<_, BoxError>("x".to_string()) });

        let result = state.connect_producers(ProducerConnections::new().bind(Login::EMAIL, producer));
        assert_eq!(result, Err(StateError::NoAsyncRuntime));
        assert_eq!(state.trigger_count(Login::EMAIL), None);
    }

    #[test]
    fn trigger_without_producer_fails() {
        let state = login();
        assert_eq!(
            state.trigger(Login::PASSWORD),
            Err(StateError::NoTriggerRegistered { field: "password" })
        );
    }

    #[tokio::test]
    async fn superseded_result_is_never_written() {
        let state = login();
        let pending = || stream::pending::<Result<String, BoxError>>();
        let binding = Arc::new(ProducerBinding::new(Login::EMAIL, pending, &state, Handle::current()));

        binding.fire();
        binding.fire();

        // First firing resolves after the second one started
        binding.complete(1, Some(Ok("stale".to_string())));
        assert_eq!(state.snapshot().unwrap().email, "");

        binding.complete(2, Some(Ok("fresh".to_string())));
        assert_eq!(state.snapshot().unwrap().email, "fresh");
    }

    #[tokio::test]
    async fn cancelled_result_is_never_written() {
        let state = login();
        let pending = || stream::pending::<Result<String, BoxError>>();
        let binding = Arc::new(ProducerBinding::new(Login::EMAIL, pending, &state, Handle::current()));

        binding.fire();
        binding.cancel();

        // The container is still live, so only the ticket check holds this back
        binding.complete(1, Some(Ok("late".to_string())));
        assert!(!state.is_disposed());
        assert_eq!(state.snapshot().unwrap().email, "");
    }

    #[tokio::test]
    async fn from_future_emits_once() {
        let state = login();
        let producer = from_future(|| async { Ok::<_, std::io::Error>("loaded".to_string()) });

        state
            .connect_producers(ProducerConnections::new().bind(Login::EMAIL, producer))
            .unwrap();
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }

        assert_eq!(state.snapshot().unwrap().email, "loaded");
        assert_eq!(state.trigger_count(Login::EMAIL), Some(0));
    }

    #[tokio::test]
    async fn empty_stream_leaves_field_untouched() {
        let state = login();
        let producer = || stream::empty::<Result<String, BoxError>>();

        state
            .connect_producers(ProducerConnections::new().bind(Login::EMAIL, producer))
            .unwrap();
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }

        assert_eq!(state.snapshot().unwrap().email, "");
    }
}

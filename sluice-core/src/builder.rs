//! Type-checked assembly of command handlers.
//!
//! A [`HandlerBuilder`] collects, for one command type:
//!
//! - the [`ExpectedState`] of the target stream;
//! - how to derive the [`StreamName`] from the command;
//! - the decision function turning state, history and command into events;
//! - optionally, which reader and writer to use per command.
//!
//! [`HandlerBuilder::build`] validates the configuration and produces a
//! [`RegisteredHandler`]. Mistakes surface there, at startup, rather than on
//! the first matching command.
//!
//! Synchronous resolvers and decisions are adapted onto the same boxed-future
//! signature as their `_async` counterparts.
//!
//! ```ignore
//! let handler = HandlerBuilder::<Booking, BookRoom>::new()
//!     .expected_state(ExpectedState::New)
//!     .stream(|cmd| StreamName::new(cmd.booking_id.clone()))
//!     .act_new(|cmd| Ok(vec![BookingEvent::RoomBooked(RoomBooked::from(cmd))]))?
//!     .store(move |_| Arc::clone(&store))
//!     .build()?;
//! ```

use std::{any::type_name, sync::Arc};

use futures::{
    TryFutureExt,
    future::{self, BoxFuture, FutureExt},
};

use crate::{
    aggregate::Aggregate,
    error::{BoxError, ConfigError},
    handler::{DecideFn, DecideResult, ReaderFn, RegisteredHandler, StreamFn, WriterFn},
    store::{EventReader, EventWriter},
    stream::{ExpectedState, StreamName},
};

/// Decision function plus whether it ignores prior state.
struct Decision<A: Aggregate, C> {
    run: DecideFn<A, C>,
    stateless: bool,
}

impl<A: Aggregate, C> Clone for Decision<A, C> {
    fn clone(&self) -> Self {
        Self {
            run: Arc::clone(&self.run),
            stateless: self.stateless,
        }
    }
}

/// Builder for a [`RegisteredHandler`] handling commands of type `C` against
/// aggregate `A`.
pub struct HandlerBuilder<A: Aggregate, C> {
    expected_state: ExpectedState,
    resolve_stream: Option<StreamFn<C>>,
    decision: Option<Decision<A, C>>,
    resolve_reader: Option<ReaderFn<A, C>>,
    resolve_writer: Option<WriterFn<A, C>>,
    default_reader: Option<Arc<dyn EventReader<A::Event>>>,
    default_writer: Option<Arc<dyn EventWriter<A::Event>>>,
}

impl<A: Aggregate, C> Clone for HandlerBuilder<A, C> {
    fn clone(&self) -> Self {
        Self {
            expected_state: self.expected_state,
            resolve_stream: self.resolve_stream.clone(),
            decision: self.decision.clone(),
            resolve_reader: self.resolve_reader.clone(),
            resolve_writer: self.resolve_writer.clone(),
            default_reader: self.default_reader.clone(),
            default_writer: self.default_writer.clone(),
        }
    }
}

impl<A, C> Default for HandlerBuilder<A, C>
where
    A: Aggregate,
    C: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, C> HandlerBuilder<A, C>
where
    A: Aggregate,
    C: Send + Sync + 'static,
{
    /// A builder with no shared reader or writer.
    ///
    /// Every handler built from it must set its own resolvers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_stores(None, None)
    }

    /// A builder that falls back to `reader` / `writer` for any role left
    /// unresolved.
    #[must_use]
    pub fn with_default_stores(
        reader: Option<Arc<dyn EventReader<A::Event>>>,
        writer: Option<Arc<dyn EventWriter<A::Event>>>,
    ) -> Self {
        Self {
            expected_state: ExpectedState::Any,
            resolve_stream: None,
            decision: None,
            resolve_reader: None,
            resolve_writer: None,
            default_reader: reader,
            default_writer: writer,
        }
    }

    /// Set the stream precondition. Defaults to [`ExpectedState::Any`].
    #[must_use]
    pub const fn expected_state(mut self, state: ExpectedState) -> Self {
        self.expected_state = state;
        self
    }

    /// Derive the target stream from the command.
    #[must_use]
    pub fn stream<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&C) -> StreamName + Send + Sync + 'static,
    {
        self.resolve_stream = Some(stream_fn(move |command| {
            future::ready(Ok(resolve(command))).boxed()
        }));
        self
    }

    /// Derive the target stream asynchronously, e.g. through a lookup.
    ///
    /// Failures surface as
    /// [`HandleError::StreamResolution`](crate::error::HandleError::StreamResolution).
    #[must_use]
    pub fn stream_async<F, E>(mut self, resolve: F) -> Self
    where
        F: for<'a> Fn(&'a C) -> BoxFuture<'a, Result<StreamName, E>> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        self.resolve_stream = Some(stream_fn(move |command| {
            resolve(command)
                .map_err(|error| -> BoxError { error.into() })
                .boxed()
        }));
        self
    }

    /// Decide new events from the folded state, the prior events and the
    /// command.
    #[must_use]
    pub fn act<F>(mut self, decide: F) -> Self
    where
        F: Fn(&A, &[A::Event], &C) -> DecideResult<A> + Send + Sync + 'static,
    {
        let run = decide_fn(move |state, history, command| {
            future::ready(decide(state, history, command)).boxed()
        });
        self.decision = Some(Decision {
            run,
            stateless: false,
        });
        self
    }

    /// Asynchronous form of [`act`](Self::act).
    #[must_use]
    pub fn act_async<F>(mut self, decide: F) -> Self
    where
        F: for<'a> Fn(&'a A, &'a [A::Event], &'a C) -> BoxFuture<'a, DecideResult<A>>
            + Send
            + Sync
            + 'static,
    {
        self.decision = Some(Decision {
            run: Arc::new(decide),
            stateless: false,
        });
        self
    }

    /// Decide new events from the command alone.
    ///
    /// Only valid for handlers expecting a new stream: there is no prior
    /// state to ignore.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::StatelessDecision`] unless the expected state
    /// is already [`ExpectedState::New`].
    pub fn act_new<F>(self, decide: F) -> Result<Self, ConfigError>
    where
        F: Fn(&C) -> DecideResult<A> + Send + Sync + 'static,
    {
        self.stateless(decide_fn(move |_, _, command| {
            future::ready(decide(command)).boxed()
        }))
    }

    /// Asynchronous form of [`act_new`](Self::act_new).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::StatelessDecision`] unless the expected state
    /// is already [`ExpectedState::New`].
    pub fn act_new_async<F>(self, decide: F) -> Result<Self, ConfigError>
    where
        F: for<'a> Fn(&'a C) -> BoxFuture<'a, DecideResult<A>> + Send + Sync + 'static,
    {
        self.stateless(decide_fn(move |_, _, command| decide(command)))
    }

    fn stateless(mut self, run: DecideFn<A, C>) -> Result<Self, ConfigError> {
        if self.expected_state != ExpectedState::New {
            return Err(ConfigError::StatelessDecision {
                command: type_name::<C>(),
                expected: self.expected_state,
            });
        }
        self.decision = Some(Decision {
            run,
            stateless: true,
        });
        Ok(self)
    }

    /// Pick the reader per command, overriding the shared default.
    #[must_use]
    pub fn reader<F, R>(mut self, resolve: F) -> Self
    where
        F: Fn(&C) -> Arc<R> + Send + Sync + 'static,
        R: EventReader<A::Event> + 'static,
    {
        self.resolve_reader = Some(reader_fn::<A, C, _>(
            move |command| -> Arc<dyn EventReader<A::Event>> { resolve(command) },
        ));
        self
    }

    /// Pick the writer per command, overriding the shared default.
    #[must_use]
    pub fn writer<F, W>(mut self, resolve: F) -> Self
    where
        F: Fn(&C) -> Arc<W> + Send + Sync + 'static,
        W: EventWriter<A::Event> + 'static,
    {
        self.resolve_writer = Some(writer_fn::<A, C, _>(
            move |command| -> Arc<dyn EventWriter<A::Event>> { resolve(command) },
        ));
        self
    }

    /// Pick one backend for both roles.
    ///
    /// Only fills roles that are still unset: an earlier
    /// [`reader`](Self::reader) or [`writer`](Self::writer) call wins.
    #[must_use]
    pub fn store<F, S>(mut self, resolve: F) -> Self
    where
        F: Fn(&C) -> Arc<S> + Send + Sync + 'static,
        S: EventReader<A::Event> + EventWriter<A::Event> + 'static,
    {
        let resolve = Arc::new(resolve);
        if self.resolve_reader.is_none() {
            let resolve = Arc::clone(&resolve);
            self.resolve_reader = Some(reader_fn::<A, C, _>(
                move |command| -> Arc<dyn EventReader<A::Event>> { (*resolve)(command) },
            ));
        }
        if self.resolve_writer.is_none() {
            self.resolve_writer = Some(writer_fn::<A, C, _>(
                move |command| -> Arc<dyn EventWriter<A::Event>> { (*resolve)(command) },
            ));
        }
        self
    }

    /// Validate the configuration and produce the handler.
    ///
    /// Takes `&self`: building twice yields two equivalent handlers.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingStreamResolver`] / [`ConfigError::MissingDecision`]
    ///   if either piece was never set.
    /// - [`ConfigError::StatelessDecision`] if a stateless decision was set
    ///   and the expected state was later changed away from `New`.
    /// - [`ConfigError::MissingReader`] / [`ConfigError::MissingWriter`] if a
    ///   role has neither a resolver nor a shared default.
    pub fn build(&self) -> Result<RegisteredHandler<A, C>, ConfigError> {
        let command = type_name::<C>();

        let resolve_stream = self
            .resolve_stream
            .clone()
            .ok_or(ConfigError::MissingStreamResolver { command })?;

        let decision = self
            .decision
            .as_ref()
            .ok_or(ConfigError::MissingDecision { command })?;
        if decision.stateless && self.expected_state != ExpectedState::New {
            return Err(ConfigError::StatelessDecision {
                command,
                expected: self.expected_state,
            });
        }

        let resolve_reader = match (&self.resolve_reader, &self.default_reader) {
            (Some(resolve), _) => Arc::clone(resolve),
            (None, Some(reader)) => {
                let reader = Arc::clone(reader);
                reader_fn::<A, C, _>(move |_| Arc::clone(&reader))
            }
            (None, None) => return Err(ConfigError::MissingReader { command }),
        };

        let resolve_writer = match (&self.resolve_writer, &self.default_writer) {
            (Some(resolve), _) => Arc::clone(resolve),
            (None, Some(writer)) => {
                let writer = Arc::clone(writer);
                writer_fn::<A, C, _>(move |_| Arc::clone(&writer))
            }
            (None, None) => return Err(ConfigError::MissingWriter { command }),
        };

        tracing::trace!(
            aggregate = A::KIND,
            command,
            expected_state = %self.expected_state,
            "handler built"
        );
        Ok(RegisteredHandler {
            expected_state: self.expected_state,
            resolve_stream,
            decide: Arc::clone(&decision.run),
            resolve_reader,
            resolve_writer,
        })
    }
}

// Closures passed through these helpers get their higher-ranked signatures
// from the bounds.

fn stream_fn<C, F>(resolve: F) -> StreamFn<C>
where
    F: for<'a> Fn(&'a C) -> BoxFuture<'a, Result<StreamName, BoxError>> + Send + Sync + 'static,
{
    Arc::new(resolve)
}

fn decide_fn<A, C, F>(decide: F) -> DecideFn<A, C>
where
    A: Aggregate,
    F: for<'a> Fn(&'a A, &'a [A::Event], &'a C) -> BoxFuture<'a, DecideResult<A>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(decide)
}

fn reader_fn<A, C, F>(resolve: F) -> ReaderFn<A, C>
where
    A: Aggregate,
    F: Fn(&C) -> Arc<dyn EventReader<A::Event>> + Send + Sync + 'static,
{
    Arc::new(resolve)
}

fn writer_fn<A, C, F>(resolve: F) -> WriterFn<A, C>
where
    A: Aggregate,
    F: Fn(&C) -> Arc<dyn EventWriter<A::Event>> + Send + Sync + 'static,
{
    Arc::new(resolve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::inmemory;

    #[derive(Debug, Default)]
    struct Room {
        booked: bool,
    }

    impl Aggregate for Room {
        const KIND: &'static str = "room";
        type Error = String;
        type Event = &'static str;

        fn apply(&mut self, _: &Self::Event) {
            self.booked = true;
        }
    }

    struct Book;

    fn builder() -> HandlerBuilder<Room, Book> {
        let store: Arc<inmemory::Store<&'static str>> = Arc::new(inmemory::Store::new());
        HandlerBuilder::with_default_stores(Some(store.clone()), Some(store))
    }

    fn stream(_: &Book) -> StreamName {
        StreamName::new("room-1")
    }

    fn decide(_: &Room, _: &[&'static str], _: &Book) -> DecideResult<Room> {
        Ok(vec!["booked"])
    }

    #[test]
    fn build_requires_stream_resolver() {
        let error = builder().act(decide).build().unwrap_err();
        assert!(matches!(error, ConfigError::MissingStreamResolver { .. }));
        assert!(error.to_string().contains("Book"));
    }

    #[test]
    fn build_requires_decision() {
        let error = builder().stream(stream).build().unwrap_err();
        assert!(matches!(error, ConfigError::MissingDecision { .. }));
    }

    #[test]
    fn act_new_rejects_non_new_state_immediately() {
        for state in [ExpectedState::Any, ExpectedState::Existing] {
            let result = builder()
                .expected_state(state)
                .act_new(|_: &Book| Ok(vec!["booked"]));
            let Err(error) = result else {
                panic!("stateless decision accepted for {state}");
            };
            assert_eq!(
                error,
                ConfigError::StatelessDecision {
                    command: type_name::<Book>(),
                    expected: state,
                }
            );
        }
    }

    #[test]
    fn act_new_async_rejects_non_new_state_immediately() {
        let result = builder().act_new_async(|_: &Book| future::ready(Ok(vec!["booked"])).boxed());
        assert!(matches!(
            result.err(),
            Some(ConfigError::StatelessDecision {
                expected: ExpectedState::Any,
                ..
            })
        ));
    }

    #[test]
    fn build_rechecks_stateless_decision_against_final_state() {
        let error = builder()
            .expected_state(ExpectedState::New)
            .stream(stream)
            .act_new(|_: &Book| Ok(vec!["booked"]))
            .unwrap()
            .expected_state(ExpectedState::Existing)
            .build()
            .unwrap_err();
        assert!(matches!(error, ConfigError::StatelessDecision { .. }));
    }

    #[test]
    fn build_without_any_store_fails() {
        let error = HandlerBuilder::<Room, Book>::new()
            .stream(stream)
            .act(decide)
            .build()
            .unwrap_err();
        assert!(matches!(error, ConfigError::MissingReader { .. }));

        let store: Arc<inmemory::Store<&'static str>> = Arc::new(inmemory::Store::new());
        let error = HandlerBuilder::<Room, Book>::new()
            .stream(stream)
            .act(decide)
            .reader(move |_: &Book| Arc::clone(&store))
            .build()
            .unwrap_err();
        assert!(matches!(error, ConfigError::MissingWriter { .. }));
    }

    #[test]
    fn store_does_not_override_explicit_reader() {
        let replica: Arc<inmemory::Store<&'static str>> = Arc::new(inmemory::Store::new());
        let primary: Arc<inmemory::Store<&'static str>> = Arc::new(inmemory::Store::new());

        let builder = HandlerBuilder::<Room, Book>::new()
            .reader({
                let replica = Arc::clone(&replica);
                move |_: &Book| Arc::clone(&replica)
            })
            .store({
                let primary = Arc::clone(&primary);
                move |_: &Book| Arc::clone(&primary)
            });

        let reader = (builder.resolve_reader.as_ref().unwrap())(&Book);
        let writer = (builder.resolve_writer.as_ref().unwrap())(&Book);
        assert!(std::ptr::addr_eq(Arc::as_ptr(&reader), Arc::as_ptr(&replica)));
        assert!(std::ptr::addr_eq(Arc::as_ptr(&writer), Arc::as_ptr(&primary)));
    }

    #[test]
    fn explicit_resolver_wins_over_default() {
        let default: Arc<inmemory::Store<&'static str>> = Arc::new(inmemory::Store::new());
        let explicit: Arc<inmemory::Store<&'static str>> = Arc::new(inmemory::Store::new());

        let handler = HandlerBuilder::<Room, Book>::with_default_stores(
            Some(default.clone()),
            Some(default.clone()),
        )
        .stream(stream)
        .act(decide)
        .writer({
            let explicit = Arc::clone(&explicit);
            move |_: &Book| Arc::clone(&explicit)
        })
        .build()
        .unwrap();

        let reader = (handler.resolve_reader)(&Book);
        let writer = (handler.resolve_writer)(&Book);
        assert!(std::ptr::addr_eq(Arc::as_ptr(&reader), Arc::as_ptr(&default)));
        assert!(std::ptr::addr_eq(Arc::as_ptr(&writer), Arc::as_ptr(&explicit)));
    }

    #[test]
    fn build_is_repeatable() {
        let builder = builder()
            .expected_state(ExpectedState::New)
            .stream(stream)
            .act(decide);
        let first = builder.build().unwrap();
        let second = builder.build().unwrap();
        assert_eq!(first.expected_state(), second.expected_state());
        assert!(Arc::ptr_eq(&first.decide, &second.decide));
    }
}

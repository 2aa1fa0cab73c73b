//! Registered handlers and the command execution pipeline.
//!
//! A [`RegisteredHandler`] is the immutable product of a
//! [`HandlerBuilder`](crate::builder::HandlerBuilder). Handling a command walks
//! through:
//!
//! 1. resolve the target stream from the command;
//! 2. read the stream and check its existence against the expected state;
//! 3. fold the history into the aggregate and run the decision function;
//! 4. append the new events, guarded by an expected version derived from the
//!    read.
//!
//! Any failure ends the invocation before step 4 writes anything. Conflicts
//! are returned to the caller as-is; nothing is retried here.

use std::{any::type_name, fmt, sync::Arc};

use futures::future::BoxFuture;
use nonempty::NonEmpty;

use crate::{
    aggregate::{self, Aggregate},
    concurrency::StreamStateConflict,
    error::{BoxError, HandleError},
    store::{AppendError, EventReader, EventWriter, StreamEvents},
    stream::{ExpectedState, ExpectedVersion, StreamName, StreamVersion},
};

pub(crate) type StreamFn<C> = Arc<
    dyn for<'a> Fn(&'a C) -> BoxFuture<'a, Result<StreamName, BoxError>> + Send + Sync,
>;

pub(crate) type DecideFn<A, C> = Arc<
    dyn for<'a> Fn(
            &'a A,
            &'a [<A as Aggregate>::Event],
            &'a C,
        ) -> BoxFuture<'a, DecideResult<A>>
        + Send
        + Sync,
>;

pub(crate) type ReaderFn<A, C> =
    Arc<dyn Fn(&C) -> Arc<dyn EventReader<<A as Aggregate>::Event>> + Send + Sync>;

pub(crate) type WriterFn<A, C> =
    Arc<dyn Fn(&C) -> Arc<dyn EventWriter<<A as Aggregate>::Event>> + Send + Sync>;

/// Output of a decision function.
pub type DecideResult<A> = Result<Vec<<A as Aggregate>::Event>, <A as Aggregate>::Error>;

/// Result alias for handling a command against aggregate `A`.
pub type HandleResult<A> = Result<Handled<A>, HandleError<<A as Aggregate>::Error>>;

/// Successful outcome of handling a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Handled<A: Aggregate> {
    /// Stream the command was handled against.
    pub stream: StreamName,
    /// Stream version after the append, or the version that was read if the
    /// decision produced no events.
    pub version: StreamVersion,
    /// Events appended by this invocation, in order.
    pub changes: Vec<A::Event>,
    /// Aggregate state with `changes` applied.
    pub state: A,
}

impl<A: Aggregate> Handled<A> {
    /// Whether anything was appended.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Compiled handler for command type `C` on aggregate `A`.
///
/// Immutable once built. Cloning shares the underlying functions, so one
/// handler can serve any number of concurrent invocations.
pub struct RegisteredHandler<A: Aggregate, C> {
    pub(crate) expected_state: ExpectedState,
    pub(crate) resolve_stream: StreamFn<C>,
    pub(crate) decide: DecideFn<A, C>,
    pub(crate) resolve_reader: ReaderFn<A, C>,
    pub(crate) resolve_writer: WriterFn<A, C>,
}

impl<A: Aggregate, C> Clone for RegisteredHandler<A, C> {
    fn clone(&self) -> Self {
        Self {
            expected_state: self.expected_state,
            resolve_stream: Arc::clone(&self.resolve_stream),
            decide: Arc::clone(&self.decide),
            resolve_reader: Arc::clone(&self.resolve_reader),
            resolve_writer: Arc::clone(&self.resolve_writer),
        }
    }
}

impl<A: Aggregate, C> fmt::Debug for RegisteredHandler<A, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredHandler")
            .field("aggregate", &A::KIND)
            .field("command", &type_name::<C>())
            .field("expected_state", &self.expected_state)
            .finish_non_exhaustive()
    }
}

impl<A, C> RegisteredHandler<A, C>
where
    A: Aggregate,
    C: Sync,
{
    #[must_use]
    pub const fn expected_state(&self) -> ExpectedState {
        self.expected_state
    }

    /// Handle `command`: read, decide, append.
    ///
    /// Dropping the returned future cancels the invocation at its current
    /// suspension point. Before the append starts the stream is untouched;
    /// during the append the writer guarantees all-or-nothing.
    ///
    /// # Errors
    ///
    /// - [`HandleError::StreamResolution`] if the stream resolver fails.
    /// - [`HandleError::Read`] / [`HandleError::Write`] for store failures.
    /// - [`HandleError::StreamState`] if the stream's existence contradicts
    ///   the expected state.
    /// - [`HandleError::Decision`] if the decision function rejects the
    ///   command.
    /// - [`HandleError::Concurrency`] if the stream moved between read and
    ///   append.
    #[tracing::instrument(
        skip_all,
        fields(
            aggregate = A::KIND,
            command = type_name::<C>(),
            expected_state = %self.expected_state,
            stream = tracing::field::Empty,
        )
    )]
    pub async fn handle(&self, command: &C) -> HandleResult<A> {
        let stream = (self.resolve_stream)(command)
            .await
            .map_err(HandleError::StreamResolution)?;
        tracing::Span::current().record("stream", tracing::field::display(&stream));

        let reader = (self.resolve_reader)(command);
        let loaded = reader
            .read_stream(&stream)
            .await
            .map_err(HandleError::Read)?;
        let (history, read_version) = self.check_stream_state(&stream, loaded)?;

        let state: A = aggregate::fold(&history);
        let new_events = (self.decide)(&state, history.as_slice(), command)
            .await
            .map_err(HandleError::Decision)?;

        let Some(changes) = NonEmpty::from_vec(new_events) else {
            tracing::debug!("decision produced no events, skipping append");
            return Ok(Handled {
                stream,
                version: read_version.unwrap_or_default(),
                changes: Vec::new(),
                state,
            });
        };

        let expected = ExpectedVersion::after_read(self.expected_state, read_version);
        let writer = (self.resolve_writer)(command);
        let appended = match writer.append_to_stream(&stream, expected, &changes).await {
            Ok(appended) => appended,
            Err(AppendError::Conflict(conflict)) => {
                tracing::debug!(%conflict, "append rejected");
                return Err(HandleError::Concurrency(conflict));
            }
            Err(AppendError::Store(error)) => return Err(HandleError::Write(error)),
        };

        let mut state = state;
        for event in changes.iter() {
            state.apply(event);
        }

        tracing::debug!(
            version = %appended.next_version,
            event_count = changes.len(),
            "command handled"
        );
        Ok(Handled {
            stream,
            version: appended.next_version,
            changes: changes.into(),
            state,
        })
    }

    /// Enforce the expected state against a read result.
    ///
    /// Returns the history to fold and the version to guard the append with
    /// (`None` when the stream does not exist).
    fn check_stream_state(
        &self,
        stream: &StreamName,
        loaded: Option<StreamEvents<A::Event>>,
    ) -> Result<(Vec<A::Event>, Option<StreamVersion>), StreamStateConflict> {
        // A stream without events does not exist.
        let loaded = loaded.filter(|existing| !existing.events.is_empty());
        match (self.expected_state, loaded) {
            (ExpectedState::New, Some(existing)) => {
                tracing::debug!(version = %existing.version, "stream already exists");
                Err(StreamStateConflict::AlreadyExists {
                    stream: stream.clone(),
                    version: existing.version,
                })
            }
            (ExpectedState::Existing, None) => {
                tracing::debug!("stream not found");
                Err(StreamStateConflict::NotFound {
                    stream: stream.clone(),
                })
            }
            (_, Some(existing)) => Ok((existing.events, Some(existing.version))),
            (_, None) => Ok((Vec::new(), None)),
        }
    }
}

//! Storage collaborator contracts.
//!
//! The engine never owns durable storage. It reads history through an
//! [`EventReader`] and appends through an [`EventWriter`]; a single backend
//! can implement both (see [`EventStore`]), or the roles can be split, for
//! example reading from a replica and writing to a primary.
//!
//! Both traits are object safe so a handler can pick a backend per command
//! at runtime: their futures are boxed ([`BoxFuture`]).
//!
//! [`inmemory`] holds a reference implementation.

use futures::future::BoxFuture;
pub use nonempty::NonEmpty;
use thiserror::Error;

use crate::{
    concurrency::ConcurrencyConflict,
    error::BoxError,
    stream::{ExpectedVersion, StreamName, StreamVersion},
};

pub mod inmemory;

/// History of one stream as returned by [`EventReader::read_stream`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamEvents<E> {
    /// Events in append order.
    pub events: Vec<E>,
    /// Version of the stream as of this read.
    pub version: StreamVersion,
}

/// Opaque failure from a storage backend.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StoreError(#[source] BoxError);

impl StoreError {
    pub fn new(error: impl Into<BoxError>) -> Self {
        Self(error.into())
    }

    #[must_use]
    pub fn into_inner(self) -> BoxError {
        self.0
    }
}

/// Error from append operations.
#[derive(Debug, Error)]
pub enum AppendError {
    /// Another writer moved the stream past the expected version.
    #[error(transparent)]
    Conflict(#[from] ConcurrencyConflict),
    /// Underlying store error.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl AppendError {
    /// Create a store error variant.
    pub fn store(error: impl Into<BoxError>) -> Self {
        Self::Store(StoreError::new(error))
    }
}

/// Result of a successful append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppendResult {
    /// Version of the stream after the append.
    pub next_version: StreamVersion,
}

/// Source of stream history.
pub trait EventReader<E>: Send + Sync {
    /// Read every event of `stream` in append order.
    ///
    /// Returns `Ok(None)` when the stream does not exist. A stream with an
    /// empty history is treated the same way.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    fn read_stream<'a>(
        &'a self,
        stream: &'a StreamName,
    ) -> BoxFuture<'a, Result<Option<StreamEvents<E>>, StoreError>>;
}

/// Append target for new events.
pub trait EventWriter<E>: Send + Sync {
    /// Append `events` to `stream` if its current version satisfies
    /// `expected`.
    ///
    /// The batch is applied atomically: either every event is appended or
    /// none is, including when the returned future is dropped mid-flight.
    ///
    /// # Errors
    ///
    /// Returns [`AppendError::Conflict`] if the version check fails, or
    /// [`AppendError::Store`] if persistence fails.
    fn append_to_stream<'a>(
        &'a self,
        stream: &'a StreamName,
        expected: ExpectedVersion,
        events: &'a NonEmpty<E>,
    ) -> BoxFuture<'a, Result<AppendResult, AppendError>>;
}

/// A backend serving both roles.
///
/// Implemented automatically for every type that is both an [`EventReader`]
/// and an [`EventWriter`].
pub trait EventStore<E>: EventReader<E> + EventWriter<E> {}

impl<E, T> EventStore<E> for T where T: EventReader<E> + EventWriter<E> {}

//! In-memory event store implementation for testing.
//!
//! This module provides [`Store`], a thread-safe in-memory implementation of
//! [`EventReader`] and [`EventWriter`] suitable for unit tests and examples.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use sluice_core::store::inmemory;
//!
//! let store: Arc<inmemory::Store<String>> = Arc::new(inmemory::Store::new());
//! ```

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use futures::future::{self, BoxFuture, FutureExt};
use nonempty::NonEmpty;

use crate::{
    concurrency::ConcurrencyConflict,
    store::{AppendError, AppendResult, EventReader, EventWriter, StoreError, StreamEvents},
    stream::{ExpectedVersion, StreamName, StreamVersion},
};

/// In-memory event store that keeps streams in a hash map.
///
/// Cloning is cheap and every clone shares the same streams. The version
/// check and the append happen under one write lock, so a batch is either
/// fully appended or not at all.
#[derive(Clone)]
pub struct Store<E> {
    inner: Arc<RwLock<HashMap<StreamName, Vec<E>>>>,
}

impl<E> Store<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Current version of `stream`, or `None` if it does not exist.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn stream_version(&self, stream: &StreamName) -> Option<StreamVersion> {
        let inner = self.inner.read().expect("in-memory store lock poisoned");
        inner
            .get(stream)
            .map(|events| StreamVersion::INITIAL.advance(events.len()))
    }

    /// Number of streams holding at least one event.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.inner
            .read()
            .expect("in-memory store lock poisoned")
            .len()
    }
}

impl<E> Default for Store<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone> Store<E> {
    fn load(&self, stream: &StreamName) -> Option<StreamEvents<E>> {
        let inner = self.inner.read().expect("in-memory store lock poisoned");
        inner.get(stream).map(|events| StreamEvents {
            events: events.clone(),
            version: StreamVersion::INITIAL.advance(events.len()),
        })
    }

    fn commit(
        &self,
        stream: &StreamName,
        expected: ExpectedVersion,
        events: &NonEmpty<E>,
    ) -> Result<AppendResult, AppendError> {
        let mut inner = self.inner.write().expect("in-memory store lock poisoned");
        let current = inner
            .get(stream)
            .map(|existing| StreamVersion::INITIAL.advance(existing.len()));

        if !expected.matches(current) {
            tracing::debug!(%expected, ?current, "version mismatch, rejecting append");
            return Err(ConcurrencyConflict {
                stream: stream.clone(),
                expected,
                actual: current,
            }
            .into());
        }

        let existing = inner.entry(stream.clone()).or_default();
        existing.extend(events.iter().cloned());
        let next_version = StreamVersion::INITIAL.advance(existing.len());
        drop(inner);

        tracing::debug!(
            events_appended = events.len(),
            %next_version,
            "events appended to stream"
        );
        Ok(AppendResult { next_version })
    }
}

impl<E> EventReader<E> for Store<E>
where
    E: Clone + Send + Sync,
{
    #[tracing::instrument(skip_all, fields(%stream))]
    fn read_stream<'a>(
        &'a self,
        stream: &'a StreamName,
    ) -> BoxFuture<'a, Result<Option<StreamEvents<E>>, StoreError>> {
        let loaded = self.load(stream);
        tracing::trace!(
            version = ?loaded.as_ref().map(|s| s.version),
            "read stream"
        );
        future::ready(Ok(loaded)).boxed()
    }
}

impl<E> EventWriter<E> for Store<E>
where
    E: Clone + Send + Sync,
{
    #[tracing::instrument(skip_all, fields(%stream, %expected, event_count = events.len()))]
    fn append_to_stream<'a>(
        &'a self,
        stream: &'a StreamName,
        expected: ExpectedVersion,
        events: &'a NonEmpty<E>,
    ) -> BoxFuture<'a, Result<AppendResult, AppendError>> {
        future::ready(self.commit(stream, expected, events)).boxed()
    }
}

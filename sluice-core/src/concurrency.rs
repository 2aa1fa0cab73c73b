//! Conflicts detected around a stream's existence and version.
//!
//! Two different checks guard an append:
//!
//! - [`StreamStateConflict`] is raised by the pipeline at read time, when the
//!   stream's existence contradicts the handler's
//!   [`ExpectedState`](crate::stream::ExpectedState).
//! - [`ConcurrencyConflict`] is raised by the writer at append time, when
//!   another writer moved the stream after it was read.
//!
//! Neither is retried here. Callers that want retries re-issue the command,
//! which re-reads the stream.

use thiserror::Error;

use crate::stream::{ExpectedVersion, StreamName, StreamVersion};

/// Error indicating the stream moved between read and append.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", format_conflict(&self.stream, self.expected, self.actual))]
pub struct ConcurrencyConflict {
    pub stream: StreamName,
    /// The version token the append was made with.
    pub expected: ExpectedVersion,
    /// The stream's version at append time. `None` means it did not exist.
    pub actual: Option<StreamVersion>,
}

/// Build a human-readable message for a [`ConcurrencyConflict`], including an
/// actionable hint for the caller.
fn format_conflict(
    stream: &StreamName,
    expected: ExpectedVersion,
    actual: Option<StreamVersion>,
) -> String {
    match (expected, actual) {
        (ExpectedVersion::NoStream, Some(actual)) => format!(
            "concurrency conflict on `{stream}`: expected new stream, found version {actual} \
             (hint: another process created this stream; reload and retry)"
        ),
        (expected, Some(actual)) => format!(
            "concurrency conflict on `{stream}`: expected {expected}, found version {actual} \
             (hint: stream was modified; reload and retry)"
        ),
        (expected, None) => format!(
            "concurrency conflict on `{stream}`: expected {expected}, found no stream (hint: \
             stream was removed; reload and retry)"
        ),
    }
}

/// Error indicating a stream's existence contradicts the handler's expected
/// state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamStateConflict {
    /// Registered as `New`, but the stream already has events.
    #[error("stream `{stream}` already exists at version {version}")]
    AlreadyExists {
        stream: StreamName,
        version: StreamVersion,
    },
    /// Registered as `Existing`, but the stream has no events.
    #[error("stream `{stream}` not found")]
    NotFound { stream: StreamName },
}

impl StreamStateConflict {
    #[must_use]
    pub const fn stream(&self) -> &StreamName {
        match self {
            Self::AlreadyExists { stream, .. } | Self::NotFound { stream } => stream,
        }
    }
}

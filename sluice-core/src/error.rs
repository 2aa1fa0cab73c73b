//! Error types for registration and command handling.

use thiserror::Error;

use crate::{
    concurrency::{ConcurrencyConflict, StreamStateConflict},
    store::StoreError,
    stream::ExpectedState,
};

/// Type-erased error used at collaborator boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Registration-time error.
///
/// Raised while building or registering a handler, before any command is
/// handled. `command` is the command's type name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no stream resolver configured for command `{command}`")]
    MissingStreamResolver { command: &'static str },
    #[error("no decision function configured for command `{command}`")]
    MissingDecision { command: &'static str },
    /// A decision that ignores prior state was used on a handler whose
    /// expected state is not `New`.
    #[error(
        "command `{command}` uses a stateless decision but expects a {expected} stream; \
         stateless decisions require `ExpectedState::New`"
    )]
    StatelessDecision {
        command: &'static str,
        expected: ExpectedState,
    },
    #[error("no reader resolver or default reader available for command `{command}`")]
    MissingReader { command: &'static str },
    #[error("no writer resolver or default writer available for command `{command}`")]
    MissingWriter { command: &'static str },
    #[error("a handler for command `{command}` is already registered")]
    DuplicateHandler { command: &'static str },
}

/// Error returned when handling a command.
///
/// Every variant aborts the invocation before anything is appended, except
/// [`HandleError::Write`], whose outcome is defined by the writer (the batch
/// is either fully applied or not at all).
#[derive(Debug, Error)]
pub enum HandleError<E> {
    #[error("no handler registered for command `{command}`")]
    UnknownCommand { command: &'static str },
    #[error("failed to resolve stream: {0}")]
    StreamResolution(#[source] BoxError),
    #[error(transparent)]
    StreamState(#[from] StreamStateConflict),
    #[error("aggregate rejected command: {0}")]
    Decision(E),
    #[error(transparent)]
    Concurrency(ConcurrencyConflict),
    #[error("failed to read stream: {0}")]
    Read(#[source] StoreError),
    #[error("failed to persist events: {0}")]
    Write(#[source] StoreError),
}

impl<E> HandleError<E> {
    /// Whether re-reading the stream and handling the command again could
    /// succeed.
    #[must_use]
    pub const fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::Concurrency(_))
    }

    /// The domain error, if the decision function rejected the command.
    #[must_use]
    pub const fn as_decision(&self) -> Option<&E> {
        match self {
            Self::Decision(error) => Some(error),
            _ => None,
        }
    }
}

//! Stream identity and version primitives.
//!
//! A stream is the ordered, append-only sequence of events behind one
//! aggregate instance. [`StreamName`] identifies it, [`StreamVersion`] counts
//! how many events it holds, and [`ExpectedState`] / [`ExpectedVersion`]
//! express what a command requires of it before and during an append.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

/// Opaque identifier of an event stream.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamName(String);

impl StreamName {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Conventional stream name for an aggregate instance: `"{KIND}-{id}"`.
    ///
    /// ```
    /// # use sluice_core::{aggregate::Aggregate, stream::StreamName};
    /// # #[derive(Default)]
    /// # struct Booking;
    /// # impl Aggregate for Booking {
    /// #     const KIND: &'static str = "booking";
    /// #     type Event = ();
    /// #     type Error = String;
    /// #     fn apply(&mut self, _: &()) {}
    /// # }
    /// assert_eq!(StreamName::for_id::<Booking>("B1").as_str(), "booking-B1");
    /// ```
    #[must_use]
    pub fn for_id<A: Aggregate>(id: impl fmt::Display) -> Self {
        Self(format!("{}-{id}", A::KIND))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for StreamName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for StreamName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Number of events a stream holds.
///
/// A stream that does not exist is at [`StreamVersion::INITIAL`]; appending
/// `n` events moves it forward by `n`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StreamVersion(u64);

impl StreamVersion {
    pub const INITIAL: Self = Self(0);

    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Version after appending `count` more events.
    #[must_use]
    pub const fn advance(self, count: usize) -> Self {
        Self(self.0 + count as u64)
    }
}

impl fmt::Display for StreamVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Precondition a command places on the existence of its target stream.
///
/// It drives both the read step (whether an absent stream is an error) and
/// the version token handed to the writer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpectedState {
    /// Existence is irrelevant; a missing stream folds to the default state.
    #[default]
    Any,
    /// The stream must not exist yet.
    New,
    /// The stream must already hold at least one event.
    Existing,
}

impl fmt::Display for ExpectedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Any => "any",
            Self::New => "new",
            Self::Existing => "existing",
        })
    }
}

/// Version token checked by a writer at append time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExpectedVersion {
    /// Append unconditionally.
    Any,
    /// The stream must not exist.
    NoStream,
    /// The stream must be exactly at this version.
    Exact(StreamVersion),
}

impl ExpectedVersion {
    /// Token for an append following a read under `state`.
    ///
    /// `read` is the version observed when the history was loaded, or `None`
    /// when the stream did not exist.
    #[must_use]
    pub const fn after_read(state: ExpectedState, read: Option<StreamVersion>) -> Self {
        match (state, read) {
            (ExpectedState::New, _) | (_, None) => Self::NoStream,
            (_, Some(version)) => Self::Exact(version),
        }
    }

    /// Whether a stream currently at `current` satisfies this token.
    ///
    /// `None` means the stream does not exist.
    #[must_use]
    pub fn matches(self, current: Option<StreamVersion>) -> bool {
        match self {
            Self::Any => true,
            Self::NoStream => current.is_none(),
            Self::Exact(expected) => current == Some(expected),
        }
    }
}

impl fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any version"),
            Self::NoStream => f.write_str("no stream"),
            Self::Exact(version) => write!(f, "version {version}"),
        }
    }
}

#![doc = include_str!("../README.md")]

#[cfg(feature = "test-util")]
pub use sluice_core::test;
pub use sluice_core::{
    aggregate,
    aggregate::{Aggregate, Apply},
    builder,
    builder::HandlerBuilder,
    concurrency,
    concurrency::{ConcurrencyConflict, StreamStateConflict},
    error,
    error::{BoxError, ConfigError, HandleError},
    handler,
    handler::{DecideResult, HandleResult, Handled, RegisteredHandler},
    service,
    service::CommandService,
    stream,
    stream::{ExpectedState, ExpectedVersion, StreamName, StreamVersion},
};

pub mod store {

    pub use sluice_core::store::{
        AppendError, AppendResult, EventReader, EventStore, EventWriter, NonEmpty, StoreError,
        StreamEvents,
    };

    pub use sluice_core::store::inmemory;
}

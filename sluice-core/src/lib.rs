//! Core traits and types for the Sluice command-handling engine.
//!
//! This crate turns commands into appended events for event-sourced
//! aggregates:
//!
//! - [`aggregate`] - Folded state (`Aggregate`, `Apply`, `fold`)
//! - [`stream`] - Stream identity and version expectations (`StreamName`, `ExpectedState`)
//! - [`builder`] - Type-checked handler configuration (`HandlerBuilder`)
//! - [`handler`] - The read-decide-append pipeline (`RegisteredHandler`, `Handled`)
//! - [`service`] - Per-aggregate command dispatch (`CommandService`)
//! - [`store`] - Storage collaborator contracts (`EventReader`, `EventWriter`)
//! - [`concurrency`] - Conflict values (`ConcurrencyConflict`, `StreamStateConflict`)
//! - [`error`] - Registration and handling errors (`ConfigError`, `HandleError`)
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use sluice_core::{aggregate::Aggregate, service::CommandService, store::inmemory};
//!
//! #[derive(Default)]
//! struct Counter(u64);
//!
//! impl Aggregate for Counter {
//!     const KIND: &'static str = "counter";
//!     type Error = String;
//!     type Event = u64;
//!
//!     fn apply(&mut self, event: &u64) {
//!         self.0 += event;
//!     }
//! }
//!
//! let store: Arc<inmemory::Store<u64>> = Arc::new(inmemory::Store::new());
//! let service = CommandService::<Counter>::new(store);
//! assert_eq!(service.handler_count(), 0);
//! ```
//!
//! Most users should depend on the [`sluice`](https://docs.rs/sluice) crate,
//! which re-exports these types.

pub mod aggregate;
pub mod builder;
pub mod concurrency;
pub mod error;
pub mod handler;
pub mod service;
pub mod store;
pub mod stream;

//! Command dispatch for one aggregate type.
//!
//! [`CommandService`] owns the registered handlers of an aggregate, keyed by
//! command type, plus the reader and writer that new handlers fall back to.
//! Handlers are registered up front; [`CommandService::handle`] then routes
//! each command to its handler.
//!
//! ```ignore
//! let store = Arc::new(inmemory::Store::new());
//! let mut service = CommandService::<Booking>::new(store);
//!
//! let handler = service
//!     .register::<BookRoom>()
//!     .expected_state(ExpectedState::New)
//!     .stream(|cmd| StreamName::new(cmd.booking_id.clone()))
//!     .act_new(|cmd| Ok(vec![RoomBooked::from(cmd).into()]))?
//!     .build()?;
//! service.add_handler(handler)?;
//!
//! let handled = service.handle(&book_room).await?;
//! ```

use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    fmt,
    sync::Arc,
};

use crate::{
    aggregate::Aggregate,
    builder::HandlerBuilder,
    error::{ConfigError, HandleError},
    handler::{HandleResult, RegisteredHandler},
    store::{EventReader, EventStore, EventWriter},
};

/// Registry and dispatcher of command handlers for aggregate `A`.
///
/// Each command type has at most one handler. Handlers are stored type-erased
/// and recovered by downcasting on the command's [`TypeId`].
pub struct CommandService<A: Aggregate> {
    handlers: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    default_reader: Option<Arc<dyn EventReader<A::Event>>>,
    default_writer: Option<Arc<dyn EventWriter<A::Event>>>,
}

impl<A: Aggregate> CommandService<A> {
    /// Use `store` as the shared reader and writer.
    #[must_use]
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: EventStore<A::Event> + 'static,
    {
        let reader: Arc<dyn EventReader<A::Event>> = store.clone();
        let writer: Arc<dyn EventWriter<A::Event>> = store;
        Self::with_stores(Some(reader), Some(writer))
    }

    /// Use separate shared backends for reads and appends.
    ///
    /// A `None` role must be resolved by every handler that needs it.
    #[must_use]
    pub fn with_stores(
        reader: Option<Arc<dyn EventReader<A::Event>>>,
        writer: Option<Arc<dyn EventWriter<A::Event>>>,
    ) -> Self {
        Self {
            handlers: HashMap::new(),
            default_reader: reader,
            default_writer: writer,
        }
    }

    /// A service without shared backends.
    #[must_use]
    pub fn without_defaults() -> Self {
        Self::with_stores(None, None)
    }

    /// Start configuring the handler for command type `C`.
    ///
    /// The builder falls back to this service's shared reader and writer.
    /// Pass the built handler to [`add_handler`](Self::add_handler).
    #[must_use]
    pub fn register<C>(&self) -> HandlerBuilder<A, C>
    where
        C: Send + Sync + 'static,
    {
        HandlerBuilder::with_default_stores(
            self.default_reader.clone(),
            self.default_writer.clone(),
        )
    }

    /// Install the handler for command type `C`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateHandler`] if `C` already has one. The
    /// existing handler is kept.
    pub fn add_handler<C>(&mut self, handler: RegisteredHandler<A, C>) -> Result<(), ConfigError>
    where
        C: Send + Sync + 'static,
    {
        let command = type_name::<C>();
        if self.handlers.contains_key(&TypeId::of::<C>()) {
            return Err(ConfigError::DuplicateHandler { command });
        }
        tracing::debug!(
            aggregate = A::KIND,
            command,
            expected_state = %handler.expected_state(),
            "registered command handler"
        );
        self.handlers.insert(TypeId::of::<C>(), Box::new(handler));
        Ok(())
    }

    /// Whether a handler for `C` has been added.
    #[must_use]
    pub fn has_handler<C: 'static>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<C>())
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Route `command` to its handler and run it.
    ///
    /// See [`RegisteredHandler::handle`] for the pipeline and its failure
    /// modes.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::UnknownCommand`] if no handler was added for
    /// `C`, otherwise whatever the handler returns.
    pub async fn handle<C>(&self, command: &C) -> HandleResult<A>
    where
        C: Send + Sync + 'static,
    {
        let Some(handler) = self.handler::<C>() else {
            tracing::debug!(
                aggregate = A::KIND,
                command = type_name::<C>(),
                "no handler registered for command"
            );
            return Err(HandleError::UnknownCommand {
                command: type_name::<C>(),
            });
        };
        handler.handle(command).await
    }

    fn handler<C: Send + Sync + 'static>(&self) -> Option<&RegisteredHandler<A, C>> {
        self.handlers
            .get(&TypeId::of::<C>())
            .and_then(|handler| handler.downcast_ref::<RegisteredHandler<A, C>>())
    }
}

impl<A: Aggregate> fmt::Debug for CommandService<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandService")
            .field("aggregate", &A::KIND)
            .field("handlers", &self.handlers.len())
            .field("default_reader", &self.default_reader.is_some())
            .field("default_writer", &self.default_writer.is_some())
            .finish()
    }
}

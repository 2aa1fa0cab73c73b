//! Folded aggregate state.
//!
//! An [`Aggregate`] is rebuilt from scratch for every command by replaying
//! its stream through [`Aggregate::apply`]. Decision functions registered on a
//! [`HandlerBuilder`](crate::builder::HandlerBuilder) receive the result.

/// State reconstructed by folding a stream's events.
///
/// The folded value is owned by the pipeline for the duration of a single
/// command and never cached between commands.
pub trait Aggregate: Default + Send + Sync + Sized + 'static {
    /// Aggregate type identifier.
    ///
    /// Used by [`StreamName::for_id`](crate::stream::StreamName::for_id) to
    /// build conventional stream names. Use lowercase, kebab-case:
    /// `"booking"`, `"user-account"`.
    const KIND: &'static str;

    /// Events stored on this aggregate's streams.
    type Event: Send + Sync + 'static;

    /// Error returned by decision functions when a command violates a domain
    /// rule.
    type Error: Send + 'static;

    /// Apply an event to update aggregate state.
    fn apply(&mut self, event: &Self::Event);
}

/// Mutate an aggregate with one concrete event type.
///
/// Useful when [`Aggregate::Event`] is an enum of per-event structs: the
/// aggregate's `apply` matches on the variant and delegates here.
///
/// ```ignore
/// impl Apply<RoomBooked> for Booking {
///     fn apply(&mut self, event: &RoomBooked) {
///         self.price = event.price;
///     }
/// }
/// ```
pub trait Apply<E> {
    fn apply(&mut self, event: &E);
}

/// Fold `events` left-to-right starting from [`Default::default`].
#[must_use]
pub fn fold<'a, A, I>(events: I) -> A
where
    A: Aggregate,
    I: IntoIterator<Item = &'a A::Event>,
{
    let mut state = A::default();
    for event in events {
        state.apply(event);
    }
    state
}

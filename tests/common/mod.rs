//! Hotel booking domain shared by the integration tests.
#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use futures::future::BoxFuture;
use sluice::{
    Aggregate, Apply, ConfigError, DecideResult, ExpectedState, ExpectedVersion, HandlerBuilder,
    StreamName,
    store::{
        AppendError, AppendResult, EventReader, EventWriter, NonEmpty, StoreError, StreamEvents,
        inmemory,
    },
};
use thiserror::Error;

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomBooked {
    pub booking_id: String,
    pub room_id: String,
    pub check_in: String,
    pub check_out: String,
    pub price: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecorded {
    pub booking_id: String,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingEvent {
    RoomBooked(RoomBooked),
    PaymentRecorded(PaymentRecorded),
}

impl From<RoomBooked> for BookingEvent {
    fn from(event: RoomBooked) -> Self {
        Self::RoomBooked(event)
    }
}

impl From<PaymentRecorded> for BookingEvent {
    fn from(event: PaymentRecorded) -> Self {
        Self::PaymentRecorded(event)
    }
}

// ============================================================================
// Aggregate
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BookingError {
    #[error("payment of {amount} exceeds outstanding balance of {outstanding}")]
    Overpayment { amount: u64, outstanding: u64 },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Booking {
    pub room_id: Option<String>,
    pub price: u64,
    pub paid: u64,
}

impl Booking {
    pub const fn outstanding(&self) -> u64 {
        self.price.saturating_sub(self.paid)
    }

    pub fn record_payment(&self, cmd: &RecordPayment) -> DecideResult<Self> {
        if cmd.amount > self.outstanding() {
            return Err(BookingError::Overpayment {
                amount: cmd.amount,
                outstanding: self.outstanding(),
            });
        }
        Ok(vec![
            PaymentRecorded {
                booking_id: cmd.booking_id.clone(),
                amount: cmd.amount,
            }
            .into(),
        ])
    }
}

impl Apply<RoomBooked> for Booking {
    fn apply(&mut self, event: &RoomBooked) {
        self.room_id = Some(event.room_id.clone());
        self.price = event.price;
    }
}

impl Apply<PaymentRecorded> for Booking {
    fn apply(&mut self, event: &PaymentRecorded) {
        self.paid += event.amount;
    }
}

impl Aggregate for Booking {
    const KIND: &'static str = "booking";
    type Error = BookingError;
    type Event = BookingEvent;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BookingEvent::RoomBooked(e) => <Self as Apply<RoomBooked>>::apply(self, e),
            BookingEvent::PaymentRecorded(e) => <Self as Apply<PaymentRecorded>>::apply(self, e),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Clone)]
pub struct BookRoom {
    pub booking_id: String,
    pub room_id: String,
    pub check_in: String,
    pub check_out: String,
    pub price: u64,
}

impl BookRoom {
    pub fn new(booking_id: &str, room_id: &str, price: u64) -> Self {
        Self {
            booking_id: booking_id.into(),
            room_id: room_id.into(),
            check_in: "2026-03-01".into(),
            check_out: "2026-03-04".into(),
            price,
        }
    }

    pub fn booked(&self) -> BookingEvent {
        RoomBooked {
            booking_id: self.booking_id.clone(),
            room_id: self.room_id.clone(),
            check_in: self.check_in.clone(),
            check_out: self.check_out.clone(),
            price: self.price,
        }
        .into()
    }
}

#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub booking_id: String,
    pub amount: u64,
}

// ============================================================================
// Handler configuration
// ============================================================================

/// `BookRoom` creates the booking stream named after the booking id.
pub fn book_room(
    builder: HandlerBuilder<Booking, BookRoom>,
) -> Result<HandlerBuilder<Booking, BookRoom>, ConfigError> {
    builder
        .expected_state(ExpectedState::New)
        .stream(|cmd: &BookRoom| StreamName::new(cmd.booking_id.clone()))
        .act_new(|cmd: &BookRoom| Ok(vec![cmd.booked()]))
}

/// `RecordPayment` requires the booking to exist.
pub fn record_payment(
    builder: HandlerBuilder<Booking, RecordPayment>,
) -> HandlerBuilder<Booking, RecordPayment> {
    builder
        .expected_state(ExpectedState::Existing)
        .stream(|cmd: &RecordPayment| StreamName::new(cmd.booking_id.clone()))
        .act(|state: &Booking, _: &[BookingEvent], cmd: &RecordPayment| {
            state.record_payment(cmd)
        })
}

// ============================================================================
// Store wrappers
// ============================================================================

/// In-memory store that counts calls per role.
#[derive(Default)]
pub struct CountingStore {
    pub inner: inmemory::Store<BookingEvent>,
    pub reads: AtomicUsize,
    pub appends: AtomicUsize,
}

impl CountingStore {
    pub fn wrap(inner: &inmemory::Store<BookingEvent>) -> Arc<Self> {
        Arc::new(Self {
            inner: inner.clone(),
            ..Self::default()
        })
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn appends(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }
}

impl EventReader<BookingEvent> for CountingStore {
    fn read_stream<'a>(
        &'a self,
        stream: &'a StreamName,
    ) -> BoxFuture<'a, Result<Option<StreamEvents<BookingEvent>>, StoreError>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_stream(stream)
    }
}

impl EventWriter<BookingEvent> for CountingStore {
    fn append_to_stream<'a>(
        &'a self,
        stream: &'a StreamName,
        expected: ExpectedVersion,
        events: &'a NonEmpty<BookingEvent>,
    ) -> BoxFuture<'a, Result<AppendResult, AppendError>> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.inner.append_to_stream(stream, expected, events)
    }
}

//! The abstract event surface between the engine and any transport.
//!
//! The engine never talks to a socket directly; it calls `emit` on
//! whatever [`EventSink`] it was built with. The WebSocket transport and
//! [`RecordingSink`] (used by tests) are the two implementors in this
//! crate.

use crate::card::Card;
use crate::chamber::HandId;

/// Who an event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every seat at the table.
    All,
    /// Only the named seat.
    Seat(u8),
}

/// Every outbound event the core can produce, matching the wire vocabulary
/// of §6 one-for-one.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    AssignCards { cards: Vec<Card> },
    SelectCard { card: Card },
    DeselectCard { card: Card },
    AddCard { card: Card },
    RemoveCard { card: Card },
    StoreHand { hand: HandId, cards: Vec<Card> },
    RemoveHand { hand: HandId },
    SelectHand { hand: HandId },
    DeselectHand { hand: HandId },
    HandInPlay { cards: Vec<Card> },
    ClearHandInPlay,
    ClearCurrentHand,
    Alert { message: String },
    Message { text: String },
    Finished,
}

/// Receives every event the engine emits, each tagged with its scope.
pub trait EventSink {
    fn emit(&mut self, event: Event, scope: Scope);
}

/// A sink that does nothing; useful when a caller genuinely does not care
/// about the event stream (e.g. bulk setup in tests).
#[derive(Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: Event, _scope: Scope) {}
}

/// Records every emitted event in order, for assertions in tests that
/// don't want to stand up a socket.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<(Event, Scope)>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: Event, scope: Scope) {
        self.events.push((event, scope));
    }
}

impl RecordingSink {
    pub fn scoped_to(&self, seat: u8) -> impl Iterator<Item = &Event> {
        self.events.iter().filter_map(move |(e, s)| match s {
            Scope::Seat(seen) if *seen == seat => Some(e),
            Scope::All => Some(e),
            _ => None,
        })
    }
}

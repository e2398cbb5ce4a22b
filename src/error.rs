//! Error types for every seam in the engine: hand classification, the
//! chamber's cross-index, intent handling, and room/seat admission.

use thiserror::Error;

use crate::card::Card;

/// Raised by [`crate::hand::Hand`] mutation methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandError {
    #[error("hand already has 5 cards")]
    Full,
    #[error("card {0:?} is already in this hand")]
    Duplicate(Card),
    #[error("card {0:?} is not in this hand")]
    NotPresent(Card),
    #[error("cannot remove from an empty hand")]
    Empty,
}

/// Raised by [`crate::chamber::Chamber`] operations. Any occurrence of
/// these indicates the caller violated a precondition (e.g. registering a
/// hand over a card the chamber does not hold) rather than a user mistake;
/// callers one layer up translate the user-facing subset into
/// [`IntentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChamberError {
    #[error("card {0:?} is not held by this chamber")]
    CardNotHeld(Card),
    #[error("hand is not valid (kind {0:?}) and cannot be stored")]
    InvalidHand(crate::hand::HandKind),
    #[error("a single card cannot be stored as a hand")]
    SingleNotStorable,
    #[error("this hand is already stored")]
    DuplicateHand,
    #[error("no stored hand matches the given cards")]
    HandNotFound,
}

/// User-correctable mistakes surfaced to the offending seat as an `alert`
/// event. None of these change engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IntentError {
    #[error("it is not your turn")]
    OutOfTurn,
    #[error("the first hand of the match must contain the 3 of clubs")]
    MustLeadWithThreeOfClubs,
    #[error("that is not a valid hand")]
    InvalidHand,
    #[error("that hand cannot beat the hand in play")]
    TooWeak,
    #[error("those two hands cannot be compared")]
    Incomparable,
    #[error("you cannot pass right now")]
    CannotPass,
    #[error("a hand must have at least two cards to be stored")]
    HandTooSmallToStore,
    #[error("that hand is already stored")]
    DuplicateStoredHand,
    #[error("your current selection already has 5 cards")]
    SelectionFull,
    #[error(transparent)]
    Chamber(#[from] ChamberError),
}

/// Room/seat admission failures, surfaced by the room registry rather than
/// the match engine itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("room {0} is full")]
    Full(String),
    #[error("room {0} already has a match in progress")]
    AlreadyStarted(String),
    #[error("seat {0} is already taken")]
    SeatTaken(u8),
    #[error("room {0} does not exist")]
    NotFound(String),
    #[error("need four seated players to start")]
    NotEnoughPlayers,
}

/// Transport/wire-level failures, kept distinct from game-rule errors so
/// the connection handler can log and drop a connection without touching
/// match state.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown message type {0:?}")]
    UnknownType(String),
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Intent(#[from] IntentError),
}

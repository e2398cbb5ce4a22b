//! The room/lobby registry: ambient bookkeeping that maps an externally
//! visible room id to a seated-player roster and, once four players are
//! ready, a running [`Match`]. This carries no card-game rules of its own
//! — it exists so the transport layer has somewhere to route an inbound
//! connection without a single process-wide table of match state.
//!
//! Each room is independently lockable: the `Lobby` only guards its own
//! registry (the room-id → handle map and the client routing table), both
//! cheap in-memory lookups. The `Match` inside a `Room` is guarded by that
//! room's own `tokio::sync::Mutex`, held only for the duration of one
//! intent, so two rooms' matches never contend with each other.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::engine::{Intent, Match};
use crate::error::RoomError;
use crate::event::EventSink;

pub type ClientId = String;

#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub seat_count: u8,
}

impl Default for RoomConfig {
    fn default() -> Self {
        RoomConfig { seat_count: 4 }
    }
}

pub struct Room {
    pub id: String,
    pub config: RoomConfig,
    seats: Vec<Option<ClientId>>,
    names: Vec<Option<String>>,
    pub game: Option<Match>,
}

/// A room behind its own lock, shared between the transport layer's
/// connection tasks and cloned out of the `Lobby` registry rather than
/// borrowed from it.
pub type RoomHandle = Arc<Mutex<Room>>;

impl Room {
    fn new(id: String, config: RoomConfig) -> Self {
        let n = config.seat_count as usize;
        Room {
            id,
            config,
            seats: vec![None; n],
            names: vec![None; n],
            game: None,
        }
    }

    pub fn client_at(&self, seat: u8) -> Option<&str> {
        self.seats.get(seat as usize).and_then(|s| s.as_deref())
    }

    pub fn seat_clients(&self) -> Vec<Option<ClientId>> {
        self.seats.clone()
    }

    pub fn seat_count(&self) -> u8 {
        self.seats.len() as u8
    }

    pub fn seat_of(&self, client: &str) -> Option<u8> {
        self.seats
            .iter()
            .position(|s| s.as_deref() == Some(client))
            .map(|i| i as u8)
    }

    pub fn name_of(&self, seat: u8) -> Option<&str> {
        self.names.get(seat as usize).and_then(|n| n.as_deref())
    }

    fn seat_by_name(&self, name: &str) -> Option<u8> {
        self.names.iter().position(|n| n.as_deref() == Some(name)).map(|i| i as u8)
    }

    pub fn is_full(&self) -> bool {
        self.seats.iter().all(|s| s.is_some())
    }

    /// Before the match starts, joining claims the next free seat. Once a
    /// match is running a vacant seat only accepts the name that originally
    /// held it — this is how a dropped connection reconnects into its own
    /// seat instead of a stranger claiming it mid-game.
    pub fn join(&mut self, client: ClientId, name: String) -> Result<u8, RoomError> {
        if let Some(seat) = self.seat_of(&client) {
            return Err(RoomError::SeatTaken(seat));
        }
        if self.game.is_some() {
            if let Some(seat) = self.seat_by_name(&name) {
                if self.seats[seat as usize].is_none() {
                    self.seats[seat as usize] = Some(client);
                    return Ok(seat);
                }
            }
            return Err(RoomError::AlreadyStarted(self.id.clone()));
        }
        let seat = self
            .seats
            .iter()
            .position(|s| s.is_none())
            .ok_or_else(|| RoomError::Full(self.id.clone()))? as u8;
        self.seats[seat as usize] = Some(client);
        self.names[seat as usize] = Some(name);
        Ok(seat)
    }

    /// Frees the seat's client slot. Its name is kept once a match has
    /// started, so a later `join` with the same name reconnects to the
    /// same seat rather than leaving it permanently empty.
    pub fn leave(&mut self, client: &str) {
        if let Some(seat) = self.seat_of(client) {
            self.seats[seat as usize] = None;
            if self.game.is_none() {
                self.names[seat as usize] = None;
            }
        }
    }

    pub fn start(&mut self) -> Result<(), RoomError> {
        if self.game.is_some() {
            return Err(RoomError::AlreadyStarted(self.id.clone()));
        }
        if !self.is_full() {
            return Err(RoomError::NotEnoughPlayers);
        }
        self.game = Some(Match::deal());
        Ok(())
    }

    /// Routes an intent into this room's running match, translating any
    /// rule violation into an `alert` event for the offending seat rather
    /// than propagating it as a hard failure.
    pub fn apply_intent(&mut self, seat: u8, intent: Intent, sink: &mut dyn EventSink) -> Result<(), RoomError> {
        let game = self.game.as_mut().ok_or(RoomError::NotEnoughPlayers)?;
        if let Err(e) = game.apply(seat, intent, sink) {
            sink.emit(
                crate::event::Event::Alert {
                    message: e.to_string(),
                },
                crate::event::Scope::Seat(seat),
            );
        }
        Ok(())
    }
}

/// Holds every live room (behind its own lock) plus a routing index from
/// client id to `(room id, seat)`, so the transport layer can dispatch an
/// inbound message in O(1) without scanning rooms. Both maps are cheap,
/// in-memory lookups — the `Lobby`'s own lock is only ever held for the
/// span of one such lookup, never across a room's game mutation.
#[derive(Default)]
pub struct Lobby {
    rooms: HashMap<String, RoomHandle>,
    routing: HashMap<ClientId, (String, u8)>,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_room(&mut self, id: impl Into<String>, config: RoomConfig) -> RoomHandle {
        let id = id.into();
        self.rooms
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Room::new(id, config))))
            .clone()
    }

    pub fn room_handle(&self, id: &str) -> Result<RoomHandle, RoomError> {
        self.rooms.get(id).cloned().ok_or_else(|| RoomError::NotFound(id.to_string()))
    }

    pub fn record_routing(&mut self, client: ClientId, room_id: String, seat: u8) {
        info!(room = %room_id, seat, "player joined room");
        self.routing.insert(client, (room_id, seat));
    }

    pub fn forget_routing(&mut self, client: &str) -> Option<(String, u8)> {
        self.routing.remove(client)
    }

    pub fn locate(&self, client: &str) -> Option<(String, u8)> {
        self.routing.get(client).cloned()
    }
}

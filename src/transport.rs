//! WebSocket binding for the event bus: deserializes inbound JSON intents,
//! drives them through a [`Lobby`], and serializes the resulting events
//! back out to the affected seat(s). Adapted from this codebase's existing
//! WebSocket server; the connection bookkeeping (client registry,
//! per-client outgoing task) is unchanged in shape, only the message
//! vocabulary and the thing being driven (a `Lobby` of Presidents matches
//! instead of a single poker table) are different.
//!
//! The `Lobby` registry lock is only ever held for a room lookup or
//! creation — a plain `HashMap` operation. Every message handler clones the
//! room's own [`RoomHandle`] out of the registry, drops the lobby lock, and
//! only then locks that one room's `Mutex` for the span of its own mutation.
//! Two rooms' matches never contend with each other's lock.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::card::Card;
use crate::chamber::HandId;
use crate::engine::{Intent, TurnState};
use crate::error::{RoomError, TransportError};
use crate::event::{Event, EventSink, Scope};
use crate::room::{ClientId, Lobby, Room, RoomConfig};

pub type ClientSender = tokio::sync::mpsc::UnboundedSender<Message>;

#[derive(Debug, Serialize, Deserialize)]
struct InboundEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Serialize)]
struct OutboundEnvelope {
    #[serde(rename = "type")]
    kind: String,
    data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinedPayload {
    room_id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CardClickPayload {
    card: u8,
}

#[derive(Debug, Deserialize)]
struct HandClickPayload {
    cards: Vec<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextPayload {
    msg: String,
}

/// Everything the transport layer needs to know about a connection to
/// route its messages: which room it joined and, once seated, which seat.
#[derive(Default, Clone)]
struct ClientContext {
    room_id: Option<String>,
}

pub struct WebSocketServer {
    clients: Arc<RwLock<HashMap<ClientId, ClientSender>>>,
    contexts: Arc<RwLock<HashMap<ClientId, ClientContext>>>,
    lobby: Arc<RwLock<Lobby>>,
    room_config: RoomConfig,
}

impl WebSocketServer {
    pub fn new(room_config: RoomConfig) -> Self {
        WebSocketServer {
            clients: Arc::new(RwLock::new(HashMap::new())),
            contexts: Arc::new(RwLock::new(HashMap::new())),
            lobby: Arc::new(RwLock::new(Lobby::new())),
            room_config,
        }
    }

    pub async fn start(&self, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "Presidents WebSocket server listening");

        while let Ok((stream, peer_addr)) = listener.accept().await {
            let clients = self.clients.clone();
            let contexts = self.contexts.clone();
            let lobby = self.lobby.clone();
            let room_config = self.room_config.clone();

            tokio::spawn(async move {
                if let Err(e) =
                    handle_connection(stream, peer_addr, clients, contexts, lobby, room_config).await
                {
                    error!(%peer_addr, error = %e, "connection handler exited with an error");
                }
            });
        }

        Ok(())
    }
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    clients: Arc<RwLock<HashMap<ClientId, ClientSender>>>,
    contexts: Arc<RwLock<HashMap<ClientId, ClientContext>>>,
    lobby: Arc<RwLock<Lobby>>,
    room_config: RoomConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let client_id = Uuid::new_v4().to_string();
    info!(%peer_addr, client_id = %client_id, "new connection");

    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    clients.write().await.insert(client_id.clone(), tx);
    contexts.write().await.insert(client_id.clone(), ClientContext::default());

    let client_id_for_outgoing = client_id.clone();
    let clients_for_outgoing = clients.clone();
    let outgoing_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if ws_sender.send(message).await.is_err() {
                break;
            }
        }
        clients_for_outgoing.write().await.remove(&client_id_for_outgoing);
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(e) = handle_message(&text, &client_id, &clients, &contexts, &lobby, &room_config).await {
                    warn!(client_id = %client_id, error = %e, "rejected inbound message");
                }
            }
            Ok(Message::Close(_)) => {
                info!(client_id = %client_id, "client sent close");
                break;
            }
            Err(e) => {
                error!(client_id = %client_id, error = %e, "websocket error");
                break;
            }
            _ => {}
        }
    }

    leave_room(&lobby, &client_id).await;
    contexts.write().await.remove(&client_id);
    outgoing_task.abort();
    Ok(())
}

/// Looks the client's room up in the registry (briefly locking `Lobby`),
/// then locks only that one room to clear the client's seat.
async fn leave_room(lobby: &Arc<RwLock<Lobby>>, client_id: &str) {
    let room_id = {
        let mut lobby = lobby.write().await;
        lobby.forget_routing(client_id).map(|(room_id, _)| room_id)
    };
    let Some(room_id) = room_id else { return };
    let handle = {
        let lobby = lobby.read().await;
        lobby.room_handle(&room_id).ok()
    };
    if let Some(handle) = handle {
        handle.lock().await.leave(client_id);
    }
}

async fn handle_message(
    text: &str,
    client_id: &str,
    clients: &Arc<RwLock<HashMap<ClientId, ClientSender>>>,
    contexts: &Arc<RwLock<HashMap<ClientId, ClientContext>>>,
    lobby: &Arc<RwLock<Lobby>>,
    room_config: &RoomConfig,
) -> Result<(), TransportError> {
    let envelope: InboundEnvelope = serde_json::from_str(text)?;
    info!(client_id = %client_id, kind = %envelope.kind, "inbound message");

    match envelope.kind.as_str() {
        "joined" => {
            let payload: JoinedPayload = serde_json::from_value(envelope.data)?;
            let handle = {
                let mut lobby = lobby.write().await;
                lobby.create_room(payload.room_id.clone(), room_config.clone())
            };

            let (seat, reconnecting, just_filled) = {
                let mut room = handle.lock().await;
                let reconnecting = room.game.is_some();
                let seat = room.join(client_id.to_string(), payload.name)?;
                let just_filled = !reconnecting && room.is_full();
                (seat, reconnecting, just_filled)
            };

            {
                let mut lobby = lobby.write().await;
                lobby.record_routing(client_id.to_string(), payload.room_id.clone(), seat);
            }
            contexts.write().await.insert(
                client_id.to_string(),
                ClientContext {
                    room_id: Some(payload.room_id.clone()),
                },
            );

            if reconnecting {
                let senders = clients.read().await;
                let room = handle.lock().await;
                send_reconnect_snapshot(&room, seat, client_id, &senders);
            } else if just_filled {
                handle.lock().await.start()?;
                let senders = clients.read().await;
                let room = handle.lock().await;
                broadcast_deal(&room, &senders);
            }
        }
        "left" => {
            leave_room(lobby, client_id).await;
        }
        "text" => {
            let payload: TextPayload = serde_json::from_value(envelope.data)?;
            let ctx = contexts.read().await.get(client_id).cloned().unwrap_or_default();
            if let Some(room_id) = ctx.room_id {
                let handle = {
                    let lobby = lobby.read().await;
                    lobby.room_handle(&room_id).ok()
                };
                if let Some(handle) = handle {
                    let room = handle.lock().await;
                    let senders = clients.read().await;
                    let payload = serde_json::to_value(serde_json::json!({ "msg": payload.msg })).unwrap();
                    broadcast_to_room(&room, &senders, "message", payload);
                }
            }
        }
        other => {
            let (room_id, intent) = parse_intent(other, envelope.data, client_id, contexts).await?;
            let handle = {
                let lobby = lobby.read().await;
                lobby.room_handle(&room_id)?
            };
            let mut room = handle.lock().await;
            let seat = resolve_seat(&room, client_id)?;
            let room_clients = room.seat_clients();
            let senders = clients.read().await.clone();
            let mut sink = WsSink {
                room_clients: &room_clients,
                senders: &senders,
            };
            room.apply_intent(seat, intent, &mut sink)?;
        }
    }

    Ok(())
}

async fn parse_intent(
    kind: &str,
    data: Value,
    client_id: &str,
    contexts: &Arc<RwLock<HashMap<ClientId, ClientContext>>>,
) -> Result<(String, Intent), TransportError> {
    let ctx = contexts.read().await.get(client_id).cloned().unwrap_or_default();
    let room_id = ctx.room_id.ok_or_else(|| TransportError::Room(RoomError::NotFound(String::new())))?;

    let intent = match kind {
        "card-click" => {
            let p: CardClickPayload = serde_json::from_value(data)?;
            Intent::CardClick(Card(p.card))
        }
        "hand-click" => {
            let p: HandClickPayload = serde_json::from_value(data)?;
            Intent::HandClick(p.cards.into_iter().map(Card).collect())
        }
        "clear-current-hand" => Intent::ClearCurrentHand,
        "store" => Intent::Store,
        "clear-stored-hands" => Intent::ClearStoredHands,
        "play-current-hand" => Intent::PlayCurrentHand,
        "pass-current-hand" => Intent::PassCurrentHand,
        other => return Err(TransportError::UnknownType(other.to_string())),
    };

    Ok((room_id, intent))
}

/// Seats are resolved fresh from the room at dispatch time (never cached
/// on the connection), so a reconnect under the same room never races a
/// stale seat number.
fn resolve_seat(room: &Room, client_id: &str) -> Result<u8, TransportError> {
    room.seat_of(client_id)
        .ok_or_else(|| TransportError::Room(RoomError::NotFound(room.id.clone())))
}

struct WsSink<'a> {
    room_clients: &'a [Option<ClientId>],
    senders: &'a HashMap<ClientId, ClientSender>,
}

impl<'a> WsSink<'a> {
    fn send_to(&self, client: &str, kind: &str, data: Value) {
        if let Some(sender) = self.senders.get(client) {
            let envelope = OutboundEnvelope {
                kind: kind.to_string(),
                data,
            };
            if let Ok(text) = serde_json::to_string(&envelope) {
                let _ = sender.send(Message::Text(text));
            }
        }
    }

    fn send_scope(&self, scope: Scope, kind: &str, data: Value) {
        match scope {
            Scope::Seat(seat) => {
                if let Some(Some(client)) = self.room_clients.get(seat as usize) {
                    self.send_to(client, kind, data);
                }
            }
            Scope::All => {
                for client in self.room_clients.iter().flatten() {
                    self.send_to(client, kind, data.clone());
                }
            }
        }
    }
}

impl<'a> EventSink for WsSink<'a> {
    fn emit(&mut self, event: Event, scope: Scope) {
        let (kind, data) = wire_event(event);
        self.send_scope(scope, kind, data);
    }
}

fn cards_json(cards: &[Card]) -> Value {
    serde_json::json!(cards.iter().map(|c| c.0).collect::<Vec<u8>>())
}

fn hand_json(hand: HandId, cards: &[Card]) -> Value {
    serde_json::json!({ "hand": hand, "cards": cards.iter().map(|c| c.0).collect::<Vec<u8>>() })
}

fn wire_event(event: Event) -> (&'static str, Value) {
    match event {
        Event::AssignCards { cards } => ("assign-cards", serde_json::json!({ "cards": cards_json(&cards) })),
        Event::SelectCard { card } => ("select-card", serde_json::json!({ "card": card.0 })),
        Event::DeselectCard { card } => ("deselect-card", serde_json::json!({ "card": card.0 })),
        Event::AddCard { card } => ("add-card", serde_json::json!({ "card": card.0 })),
        Event::RemoveCard { card } => ("remove-card", serde_json::json!({ "card": card.0 })),
        Event::StoreHand { hand, cards } => ("store-hand", hand_json(hand, &cards)),
        Event::RemoveHand { hand } => ("remove-hand", serde_json::json!({ "hand": hand })),
        Event::SelectHand { hand } => ("select-hand", serde_json::json!({ "hand": hand })),
        Event::DeselectHand { hand } => ("deselect-hand", serde_json::json!({ "hand": hand })),
        Event::HandInPlay { cards } => ("hand-in-play", serde_json::json!({ "cards": cards_json(&cards) })),
        Event::ClearHandInPlay => ("clear-hand-in-play", Value::Null),
        Event::ClearCurrentHand => ("clear-current-hand", Value::Null),
        Event::Alert { message } => ("alert", serde_json::json!({ "alert": message })),
        Event::Message { text } => ("message", serde_json::json!({ "msg": text })),
        Event::Finished => ("finished", Value::Null),
    }
}

fn broadcast_to_room(room: &Room, senders: &HashMap<ClientId, ClientSender>, kind: &str, data: Value) {
    for seat in 0..room.seat_count() {
        if let Some(client) = room.client_at(seat) {
            if let Some(sender) = senders.get(client) {
                send_envelope(sender, kind, data.clone());
            }
        }
    }
}

fn send_envelope(sender: &ClientSender, kind: &str, data: Value) {
    let envelope = OutboundEnvelope {
        kind: kind.to_string(),
        data,
    };
    if let Ok(text) = serde_json::to_string(&envelope) {
        let _ = sender.send(Message::Text(text));
    }
}

/// Replays a seat's current state to a reconnecting client: its held
/// cards, every hand it still has stored, and whatever hand is in play
/// (or the lack of one). Scoped to the one seat, never broadcast.
fn send_reconnect_snapshot(room: &Room, seat: u8, client_id: &str, senders: &HashMap<ClientId, ClientSender>) {
    let Some(sender) = senders.get(client_id) else {
        return;
    };
    let Some(game) = room.game.as_ref() else {
        return;
    };
    let seated = &game.seats[seat as usize];

    let cards: Vec<u8> = seated.chamber.iter_cards().map(|c| c.0).collect();
    send_envelope(sender, "assign-cards", serde_json::json!({ "cards": cards }));

    for (id, hand) in seated.chamber.stored_hands() {
        let cards: Vec<u8> = hand.cards().map(|c| c.0).collect();
        send_envelope(sender, "store-hand", serde_json::json!({ "hand": id, "cards": cards }));
    }

    match &game.state {
        TurnState::Follow { hand_in_play } => {
            let cards: Vec<u8> = hand_in_play.cards().map(|c| c.0).collect();
            send_envelope(sender, "hand-in-play", serde_json::json!({ "cards": cards }));
        }
        TurnState::Lead | TurnState::Free => send_envelope(sender, "clear-hand-in-play", Value::Null),
    }
}

fn broadcast_deal(room: &Room, senders: &HashMap<ClientId, ClientSender>) {
    let Some(game) = room.game.as_ref() else {
        return;
    };
    for seat in 0..room.seat_count() {
        if let Some(client) = room.client_at(seat) {
            if let Some(sender) = senders.get(client) {
                let cards: Vec<u8> = game.seats[seat as usize].chamber.iter_cards().map(|c| c.0).collect();
                send_envelope(sender, "assign-cards", serde_json::json!({ "cards": cards }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_event_names_match_the_documented_vocabulary() {
        assert_eq!(wire_event(Event::Finished).0, "finished");
        assert_eq!(wire_event(Event::ClearHandInPlay).0, "clear-hand-in-play");
    }
}

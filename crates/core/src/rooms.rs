//! In-process publish/subscribe over named rooms.
//!
//! Every live connection owns an unbounded outbox. Rooms are sets of connections;
//! publishing to a room pushes the event into each member's outbox.
//!
//! # Ordering
//!
//! All hub mutations and deliveries happen under one lock, and each room carries a sequence
//! counter that is bumped inside that lock. Two publishes to the same room are therefore
//! delivered to every member in the same order, the order in which the hub accepted them.
//! Nothing is promised across rooms.
//!
//! # Failure policy
//!
//! An outbox whose receiver is gone is skipped. There is no retry: durable notifications are
//! the catch-up path for clients that were not connected.

use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, Mutex};

use crate::events::{RoomKey, ServerEvent};
use crate::model::{ConnectionId, UserId};
use crate::{ClinicError, ClinicResult};

/// Receiving half of a connection's outbox.
pub type Outbox = mpsc::UnboundedReceiver<ServerEvent>;

/// Result of a room publish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Position of this event in the room's stream (1-based). Zero if the room had no members.
    pub seq: u64,
    /// Number of outboxes the event was pushed into.
    pub delivered: usize,
}

#[derive(Debug)]
struct ConnectionEntry {
    user_id: UserId,
    outbox: mpsc::UnboundedSender<ServerEvent>,
    rooms: HashSet<RoomKey>,
}

#[derive(Debug, Default)]
struct Room {
    members: HashSet<ConnectionId>,
    seq: u64,
}

#[derive(Debug, Default)]
struct HubState {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    rooms: HashMap<RoomKey, Room>,
}

impl HubState {
    fn deliver(&self, connection_id: &ConnectionId, event: &ServerEvent) -> bool {
        match self.connections.get(connection_id) {
            Some(entry) => match entry.outbox.send(event.clone()) {
                Ok(()) => true,
                Err(_) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        event = event.name(),
                        "outbox closed, skipping delivery"
                    );
                    false
                }
            },
            None => false,
        }
    }
}

/// Room registry and router for real-time events.
#[derive(Debug, Default)]
pub struct RoomHub {
    state: Mutex<HubState>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and returns its outbox.
    ///
    /// Connecting an id that is already registered replaces the previous outbox and drops
    /// its room memberships.
    pub async fn connect(&self, connection_id: ConnectionId, user_id: UserId) -> Outbox {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().await;
        if let Some(previous) = state.connections.remove(&connection_id) {
            remove_from_rooms(&mut state.rooms, &connection_id, &previous.rooms);
        }
        state.connections.insert(
            connection_id,
            ConnectionEntry {
                user_id,
                outbox: tx,
                rooms: HashSet::new(),
            },
        );
        rx
    }

    /// Removes a connection from the hub and from every room it joined.
    ///
    /// Returns `false` if the connection was not registered.
    pub async fn disconnect(&self, connection_id: &ConnectionId) -> bool {
        let mut state = self.state.lock().await;
        match state.connections.remove(connection_id) {
            Some(entry) => {
                remove_from_rooms(&mut state.rooms, connection_id, &entry.rooms);
                true
            }
            None => false,
        }
    }

    /// Adds a connection to a room. Returns `true` if it was not already a member.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::NotFound`] if the connection is not registered.
    pub async fn subscribe(&self, connection_id: &ConnectionId, room: RoomKey) -> ClinicResult<bool> {
        let mut state = self.state.lock().await;
        let entry = state
            .connections
            .get_mut(connection_id)
            .ok_or_else(|| ClinicError::not_found(format!("connection {connection_id}")))?;
        let added = entry.rooms.insert(room);
        state.rooms.entry(room).or_default().members.insert(*connection_id);
        Ok(added)
    }

    /// Removes a connection from a room. Returns `true` if it was a member.
    pub async fn unsubscribe(&self, connection_id: &ConnectionId, room: &RoomKey) -> bool {
        let mut state = self.state.lock().await;
        let was_member = match state.connections.get_mut(connection_id) {
            Some(entry) => entry.rooms.remove(room),
            None => false,
        };
        if was_member {
            remove_from_rooms(&mut state.rooms, connection_id, std::slice::from_ref(room));
        }
        was_member
    }

    /// Publishes an event to every connection in `room`, except `except`.
    pub async fn publish(
        &self,
        room: &RoomKey,
        event: ServerEvent,
        except: Option<&ConnectionId>,
    ) -> PublishReceipt {
        let mut state = self.state.lock().await;
        let members: Vec<ConnectionId> = match state.rooms.get_mut(room) {
            Some(r) => {
                r.seq += 1;
                r.members.iter().copied().collect()
            }
            None => return PublishReceipt { seq: 0, delivered: 0 },
        };
        let seq = state.rooms.get(room).map(|r| r.seq).unwrap_or_default();

        let delivered = members
            .iter()
            .filter(|id| Some(*id) != except)
            .filter(|id| state.deliver(id, &event))
            .count();

        tracing::trace!(room = %room, seq, delivered, event = event.name(), "published");
        PublishReceipt { seq, delivered }
    }

    /// Sends an event to every registered connection, except `except`.
    pub async fn broadcast(&self, event: ServerEvent, except: Option<&ConnectionId>) -> usize {
        let state = self.state.lock().await;
        state
            .connections
            .keys()
            .filter(|id| Some(*id) != except)
            .filter(|id| state.deliver(id, &event))
            .count()
    }

    /// Sends an event to a single connection.
    pub async fn send_to(&self, connection_id: &ConnectionId, event: ServerEvent) -> bool {
        self.state.lock().await.deliver(connection_id, &event)
    }

    pub async fn is_subscribed(&self, connection_id: &ConnectionId, room: &RoomKey) -> bool {
        self.state
            .lock()
            .await
            .connections
            .get(connection_id)
            .is_some_and(|entry| entry.rooms.contains(room))
    }

    pub async fn members(&self, room: &RoomKey) -> Vec<ConnectionId> {
        self.state
            .lock()
            .await
            .rooms
            .get(room)
            .map(|r| r.members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Removes every connection owned by `user_id` from `room`. Returns how many were removed.
    pub async fn unsubscribe_user(&self, user_id: &UserId, room: &RoomKey) -> usize {
        let mut state = self.state.lock().await;
        let owned: Vec<ConnectionId> = state
            .connections
            .iter_mut()
            .filter(|(_, entry)| &entry.user_id == user_id)
            .filter_map(|(id, entry)| entry.rooms.remove(room).then_some(*id))
            .collect();
        for id in &owned {
            remove_from_rooms(&mut state.rooms, id, std::slice::from_ref(room));
        }
        owned.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }

    /// Drops every connection and room. Outboxes close once their senders are gone.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.connections.clear();
        state.rooms.clear();
    }
}

fn remove_from_rooms<'a>(
    rooms: &mut HashMap<RoomKey, Room>,
    connection_id: &ConnectionId,
    keys: impl IntoIterator<Item = &'a RoomKey>,
) {
    for key in keys {
        let now_empty = match rooms.get_mut(key) {
            Some(room) => {
                room.members.remove(connection_id);
                room.members.is_empty()
            }
            None => false,
        };
        if now_empty {
            rooms.remove(key);
        }
    }
}

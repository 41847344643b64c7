//! Presence tracking for real-time connections.
//!
//! A user is online while at least one of their connections is registered. Transitions are
//! persisted to the [`UserStore`] and announced to every other connection through the
//! [`RoomHub`].
//!
//! # Transitions
//!
//! Each user has a transition lock, held only while a transition is in flight. Whoever holds
//! it compares the live state with the last announced state, persists the live state
//! (bounded by the configured timeout), then re-checks the live state. If it still matches,
//! the change is announced. If the user flapped during the write, the loop runs again with
//! the new state, so a join and leave that race each other never produce an out-of-order or
//! duplicate announcement.
//!
//! Store failures and timeouts are logged and never fail the connection.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::events::ServerEvent;
use crate::locks::KeyedLocks;
use crate::model::{ConnectionId, UserId};
use crate::rooms::RoomHub;
use crate::store::UserStore;

/// Outcome of a `join` or `leave` call, from the caller's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenceChange {
    CameOnline,
    AlreadyOnline,
    WentOffline,
    /// The connection was removed but the user has others.
    StillOnline,
    /// `leave` for a connection that was never registered or was already removed.
    UnknownConnection,
}

#[derive(Debug, Default)]
struct PresenceState {
    /// Live connections per user, most recent last.
    connections: HashMap<UserId, Vec<ConnectionId>>,
    /// Last state announced per user. Absent means offline.
    announced: HashMap<UserId, bool>,
}

impl PresenceState {
    fn is_online(&self, user_id: &UserId) -> bool {
        self.connections.contains_key(user_id)
    }

    fn announced(&self, user_id: &UserId) -> bool {
        self.announced.get(user_id).copied().unwrap_or(false)
    }
}

/// Process-wide registry of who is connected.
pub struct PresenceRegistry {
    state: Mutex<PresenceState>,
    transitions: KeyedLocks<UserId>,
    users: Arc<dyn UserStore>,
    hub: Arc<RoomHub>,
    write_timeout: Duration,
}

impl PresenceRegistry {
    pub fn new(users: Arc<dyn UserStore>, hub: Arc<RoomHub>, write_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(PresenceState::default()),
            transitions: KeyedLocks::new(),
            users,
            hub,
            write_timeout,
        }
    }

    /// Registers `connection_id` for `user_id` and makes it the user's most recent connection.
    ///
    /// Joining twice with the same connection is idempotent.
    pub async fn join(&self, user_id: UserId, connection_id: ConnectionId) -> PresenceChange {
        let became_online = {
            let mut state = self.state.lock().await;
            let connections = state.connections.entry(user_id).or_default();
            let became_online = connections.is_empty();
            connections.retain(|c| c != &connection_id);
            connections.push(connection_id);
            became_online
        };

        if !became_online {
            return PresenceChange::AlreadyOnline;
        }
        tracing::info!(user_id = %user_id, connection_id = %connection_id, "user connected");
        self.settle(user_id, Some(connection_id)).await;
        PresenceChange::CameOnline
    }

    /// Removes `connection_id` from `user_id`. Unknown connections are a no-op.
    pub async fn leave(&self, user_id: UserId, connection_id: ConnectionId) -> PresenceChange {
        let change = {
            let mut state = self.state.lock().await;
            let Some(connections) = state.connections.get_mut(&user_id) else {
                return PresenceChange::UnknownConnection;
            };
            let before = connections.len();
            connections.retain(|c| c != &connection_id);
            if connections.len() == before {
                PresenceChange::UnknownConnection
            } else if connections.is_empty() {
                state.connections.remove(&user_id);
                PresenceChange::WentOffline
            } else {
                PresenceChange::StillOnline
            }
        };

        if change == PresenceChange::WentOffline {
            tracing::info!(user_id = %user_id, connection_id = %connection_id, "user disconnected");
            self.settle(user_id, None).await;
        }
        change
    }

    pub async fn is_online(&self, user_id: &UserId) -> bool {
        self.state.lock().await.is_online(user_id)
    }

    /// The user's most recently joined live connection.
    pub async fn connection_for(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.state
            .lock()
            .await
            .connections
            .get(user_id)
            .and_then(|c| c.last().copied())
    }

    pub async fn online_users(&self) -> Vec<UserId> {
        self.state.lock().await.connections.keys().copied().collect()
    }

    /// Forgets every connection at shutdown, persisting users offline without announcing it.
    pub async fn clear(&self) {
        let online: Vec<UserId> = {
            let mut state = self.state.lock().await;
            state.announced.clear();
            state.connections.drain().map(|(user, _)| user).collect()
        };
        self.transitions.clear();
        for user_id in online {
            self.persist(user_id, false).await;
        }
    }

    /// Persists and announces the user's live state until it stops changing underneath us.
    async fn settle(&self, user_id: UserId, origin: Option<ConnectionId>) {
        let _transition = self.transitions.lock(user_id).await;

        loop {
            let target = {
                let state = self.state.lock().await;
                let live = state.is_online(&user_id);
                if live == state.announced(&user_id) {
                    return;
                }
                live
            };

            self.persist(user_id, target).await;

            let confirmed = {
                let mut state = self.state.lock().await;
                let confirmed = state.is_online(&user_id) == target;
                if confirmed {
                    if target {
                        state.announced.insert(user_id, true);
                    } else {
                        state.announced.remove(&user_id);
                    }
                }
                confirmed
            };

            if confirmed {
                let (event, except) = if target {
                    (ServerEvent::user_online(user_id), origin)
                } else {
                    (ServerEvent::user_offline(user_id), None)
                };
                let sent = self.hub.broadcast(event, except.as_ref()).await;
                tracing::debug!(user_id = %user_id, online = target, sent, "presence announced");
                return;
            }
            tracing::debug!(user_id = %user_id, "presence changed during write, settling again");
        }
    }

    async fn persist(&self, user_id: UserId, online: bool) {
        let write = self.users.update_presence(&user_id, online, Utc::now());
        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(user_id = %user_id, online, error = %err, "failed to persist presence");
            }
            Err(_) => {
                tracing::warn!(
                    user_id = %user_id,
                    online,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "presence write timed out"
                );
            }
        }
    }
}

//! Handling of client events for one authenticated connection.

use clinic_core::model::ConnectionId;
use clinic_core::{
    Actor, ClinicContext, ClinicError, ClinicResult, Permission, RoomKey, ServerEvent,
};

use crate::protocol::{parse_id, ClientEvent};

/// Applies client events against the shared [`ClinicContext`].
///
/// Every join re-checks authorization at the moment of joining; rejected events produce an
/// `error` event on the offending connection and leave it open.
#[derive(Clone)]
pub struct RealtimeService {
    ctx: ClinicContext,
}

impl RealtimeService {
    pub fn new(ctx: ClinicContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ClinicContext {
        &self.ctx
    }

    /// Opens a connection for `actor`: registers it with the hub, subscribes it to the actor's
    /// own room, then records presence.
    pub async fn open(&self, actor: &Actor, connection_id: ConnectionId) -> clinic_core::rooms::Outbox {
        let outbox = self.ctx.hub.connect(connection_id, actor.user_id).await;
        if let Err(err) = self
            .ctx
            .hub
            .subscribe(&connection_id, RoomKey::User(actor.user_id))
            .await
        {
            tracing::warn!(connection_id = %connection_id, error = %err, "could not join own room");
        }
        self.ctx.presence.join(actor.user_id, connection_id).await;
        outbox
    }

    /// Tears a connection down. Safe to call more than once.
    pub async fn close(&self, actor: &Actor, connection_id: ConnectionId) {
        self.ctx.hub.disconnect(&connection_id).await;
        self.ctx.presence.leave(actor.user_id, connection_id).await;
    }

    /// Parses and applies one text frame, replying with an `error` event on failure.
    pub async fn handle_frame(&self, actor: &Actor, connection_id: ConnectionId, frame: &str) {
        let result = match ClientEvent::parse(frame) {
            Ok(event) => self.handle_event(actor, connection_id, event).await,
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            self.reply_error(connection_id, &err).await;
        }
    }

    /// Applies one client event.
    ///
    /// # Errors
    ///
    /// * `BadRequest` - a malformed id or scope, or invalid message content.
    /// * `Forbidden` - joining another user's room, a patient room without view access, or a
    ///   group the actor is not a member of.
    /// * `NotFound` - the group does not exist.
    pub async fn handle_event(
        &self,
        actor: &Actor,
        connection_id: ConnectionId,
        event: ClientEvent,
    ) -> ClinicResult<()> {
        tracing::debug!(
            user_id = %actor.user_id,
            connection_id = %connection_id,
            event = event.name(),
            "client event"
        );

        match event {
            ClientEvent::JoinUserRoom(data) => {
                let user_id = parse_id(&data.user_id)?;
                if user_id != actor.user_id {
                    return Err(ClinicError::forbidden("cannot join another user's room"));
                }
                self.join(connection_id, RoomKey::User(user_id)).await
            }
            ClientEvent::JoinPatientRoom(data) => {
                let patient_id = parse_id(&data.patient_id)?;
                self.ctx
                    .access
                    .authorize_id(actor, &patient_id, Permission::View)
                    .await?;
                let room = RoomKey::Patient(patient_id);
                self.join(connection_id, room).await?;
                // A revoke between the check and the join evicted nothing; check again.
                match self.ctx.access.can_view(actor, &patient_id).await {
                    Ok(true) => Ok(()),
                    Ok(false) => {
                        self.ctx.hub.unsubscribe(&connection_id, &room).await;
                        Err(ClinicError::forbidden("access to this patient was revoked"))
                    }
                    Err(err) => {
                        self.ctx.hub.unsubscribe(&connection_id, &room).await;
                        Err(err)
                    }
                }
            }
            ClientEvent::JoinGroupRoom(data) => {
                let group_id = parse_id(&data.group_id)?;
                self.ctx.messaging.group_for_member(actor, &group_id).await?;
                self.join(connection_id, RoomKey::Group(group_id)).await
            }
            ClientEvent::LeaveGroupRoom(data) => {
                let group_id = parse_id(&data.group_id)?;
                self.ctx
                    .hub
                    .unsubscribe(&connection_id, &RoomKey::Group(group_id))
                    .await;
                Ok(())
            }
            ClientEvent::SendMessage(data) => {
                let scope = data.scope.scope()?;
                self.ctx
                    .messaging
                    .send_message(actor, scope, &data.content, Some(connection_id))
                    .await?;
                Ok(())
            }
            ClientEvent::TypingStart(data) => {
                let scope = data.scope()?;
                self.ctx
                    .messaging
                    .typing(actor, scope, true, &connection_id)
                    .await
            }
            ClientEvent::TypingStop(data) => {
                let scope = data.scope()?;
                self.ctx
                    .messaging
                    .typing(actor, scope, false, &connection_id)
                    .await
            }
        }
    }

    async fn join(&self, connection_id: ConnectionId, room: RoomKey) -> ClinicResult<()> {
        if self.ctx.hub.subscribe(&connection_id, room).await? {
            tracing::debug!(connection_id = %connection_id, room = %room, "joined room");
        }
        Ok(())
    }

    /// Sends an `error` event to one connection. Internal details are logged, not sent.
    pub async fn reply_error(&self, connection_id: ConnectionId, err: &ClinicError) {
        let message = if err.is_internal() {
            tracing::error!(connection_id = %connection_id, error = ?err, "event failed");
            "internal error".to_string()
        } else {
            tracing::debug!(connection_id = %connection_id, error = %err, "event rejected");
            err.to_string()
        };
        self.ctx
            .hub
            .send_to(&connection_id, ServerEvent::error(err.code(), message))
            .await;
    }
}

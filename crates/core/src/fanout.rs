//! Notification fan-out.
//!
//! After a mutation commits, [`NotificationFanout::dispatch`] does two independent things:
//!
//! 1. Publishes the real-time event to the room of the event's scope, reaching whoever is
//!    subscribed right now.
//! 2. Resolves the intended recipients by membership, not connectivity, writes one
//!    [`Notification`] per recipient and pushes it to the recipient's private room.
//!
//! Neither step can undo the mutation. Failures are logged and the remaining recipients are
//! still processed.

use std::collections::HashSet;
use std::sync::Arc;

use crate::events::{
    DomainEvent, MessagePayload, NotificationPayload, RoomKey, ServerEvent, SessionStatusPayload,
    TypingPayload,
};
use crate::model::{ConnectionId, MessageScope, Notification, NotificationKind, PatientId, UserId};
use crate::rooms::RoomHub;
use crate::store::{GrantStore, GroupStore, NotificationStore, StoreResult};

const PREVIEW_CHARS: usize = 80;

/// What a dispatch achieved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Connections that received the scope-room event.
    pub room_deliveries: usize,
    /// Recipients whose notification was persisted.
    pub notified: Vec<UserId>,
}

/// Routes committed domain events to rooms and to the durable notification log.
#[derive(Clone)]
pub struct NotificationFanout {
    hub: Arc<RoomHub>,
    grants: Arc<dyn GrantStore>,
    groups: Arc<dyn GroupStore>,
    notifications: Arc<dyn NotificationStore>,
}

impl NotificationFanout {
    pub fn new(
        hub: Arc<RoomHub>,
        grants: Arc<dyn GrantStore>,
        groups: Arc<dyn GroupStore>,
        notifications: Arc<dyn NotificationStore>,
    ) -> Self {
        Self {
            hub,
            grants,
            groups,
            notifications,
        }
    }

    /// Fans a committed domain event out to rooms and recipients.
    ///
    /// `origin` is the connection that caused the event, if it came over the socket. It is
    /// not excluded from the room event: senders see their own messages echoed back.
    pub async fn dispatch(&self, event: DomainEvent, origin: Option<ConnectionId>) -> FanoutReport {
        let actor = event.actor();
        let mut report = FanoutReport::default();

        if let Some((room, live)) = room_event(&event) {
            report.room_deliveries = self.hub.publish(&room, live, None).await.delivered;
        }

        let recipients = match self.recipients(&event).await {
            Ok(recipients) => recipients,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    origin = ?origin,
                    "could not resolve notification recipients"
                );
                return report;
            }
        };

        let (title, message, kind) = describe(&event);
        for recipient in recipients.into_iter().filter(|r| r != &actor) {
            let notification = Notification::new(recipient, title, message.clone(), kind);
            match self.notifications.insert_notification(notification).await {
                Ok(stored) => {
                    self.hub
                        .publish(
                            &RoomKey::User(recipient),
                            ServerEvent::Notification(NotificationPayload::from(&stored)),
                            None,
                        )
                        .await;
                    report.notified.push(recipient);
                }
                Err(err) => {
                    tracing::warn!(
                        recipient = %recipient,
                        error = %err,
                        "failed to persist notification"
                    );
                }
            }
        }

        report
    }

    /// Relays a typing indicator to the scope room, excluding the typing connection.
    pub async fn typing(
        &self,
        scope: MessageScope,
        user_id: UserId,
        typing: bool,
        origin: &ConnectionId,
    ) -> usize {
        let (group_id, patient_id) = match scope {
            MessageScope::Group(id) => (Some(id), None),
            MessageScope::Patient(id) => (None, Some(id)),
        };
        let event = ServerEvent::UserTyping(TypingPayload {
            user_id,
            typing,
            group_id,
            patient_id,
        });
        self.hub
            .publish(&RoomKey::from(scope), event, Some(origin))
            .await
            .delivered
    }

    /// Everyone entitled to hear about activity in a scope.
    ///
    /// Patient scope: the patient and every operator with a view grant. Group scope: the
    /// members. An unknown group has no audience.
    pub async fn audience(&self, scope: &MessageScope) -> StoreResult<Vec<UserId>> {
        match scope {
            MessageScope::Patient(patient_id) => self.patient_audience(patient_id).await,
            MessageScope::Group(group_id) => Ok(self
                .groups
                .get_group(group_id)
                .await?
                .map(|g| g.member_ids)
                .unwrap_or_default()),
        }
    }

    async fn patient_audience(&self, patient_id: &PatientId) -> StoreResult<Vec<UserId>> {
        let mut audience = vec![*patient_id];
        audience.extend(
            self.grants
                .grants_for_patient(patient_id)
                .await?
                .into_iter()
                .filter(|g| g.can_view)
                .map(|g| g.operator_id),
        );
        Ok(audience)
    }

    async fn recipients(&self, event: &DomainEvent) -> StoreResult<Vec<UserId>> {
        let recipients = match event {
            DomainEvent::MessageSent(message) => self.audience(&message.scope).await?,
            DomainEvent::SessionStatusChanged { session, .. } => {
                let mut audience = self.patient_audience(&session.patient_id).await?;
                audience.push(session.operator_id);
                audience
            }
            DomainEvent::AccessGranted(grant) => vec![grant.operator_id, grant.patient_id],
            DomainEvent::AccessRevoked {
                patient_id,
                operator_id,
                ..
            } => vec![*operator_id, *patient_id],
        };

        let mut seen = HashSet::new();
        Ok(recipients.into_iter().filter(|r| seen.insert(*r)).collect())
    }
}

fn room_event(event: &DomainEvent) -> Option<(RoomKey, ServerEvent)> {
    match event {
        DomainEvent::MessageSent(message) => Some((
            RoomKey::from(message.scope),
            ServerEvent::NewMessage(MessagePayload::from(message)),
        )),
        DomainEvent::SessionStatusChanged { session, .. } => Some((
            RoomKey::Patient(session.patient_id),
            ServerEvent::SessionStatus(SessionStatusPayload {
                session_id: session.id,
                patient_id: session.patient_id,
                status: session.status,
            }),
        )),
        DomainEvent::AccessGranted(_) | DomainEvent::AccessRevoked { .. } => None,
    }
}

fn describe(event: &DomainEvent) -> (&'static str, String, NotificationKind) {
    match event {
        DomainEvent::MessageSent(message) => {
            let content = message.content.as_str();
            let mut preview: String = content.chars().take(PREVIEW_CHARS).collect();
            if content.chars().count() > PREVIEW_CHARS {
                preview.push_str("...");
            }
            ("New message", preview, NotificationKind::Message)
        }
        DomainEvent::SessionStatusChanged { session, .. } => (
            "Session updated",
            format!(
                "Session scheduled for {} is now {}",
                session.scheduled_for.format("%Y-%m-%d %H:%M UTC"),
                session.status.as_str()
            ),
            NotificationKind::SessionStatus,
        ),
        DomainEvent::AccessGranted(grant) => (
            "Access granted",
            format!(
                "Operator {} was granted {} access to patient {}",
                grant.operator_id,
                if grant.can_edit { "edit" } else { "view" },
                grant.patient_id
            ),
            NotificationKind::AccessGranted,
        ),
        DomainEvent::AccessRevoked {
            patient_id,
            operator_id,
            ..
        } => (
            "Access revoked",
            format!("Operator {operator_id} no longer has access to patient {patient_id}"),
            NotificationKind::AccessRevoked,
        ),
    }
}

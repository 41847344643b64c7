//! Real-time events and the rooms they are scoped to.
//!
//! [`ServerEvent`] is what connected clients receive. It serialises as
//! `{ "event": "<kebab-case-name>", "data": { ...camelCase payload... } }`.
//!
//! [`DomainEvent`] is what services hand to the fan-out after a committed mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{
    ChatMessage, GroupId, MessageScope, Notification, NotificationKind, PatientAccess, PatientId,
    SessionStatus, TreatmentSession, UserId,
};

/// A named real-time channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoomKey {
    /// Private room of one user; receives notifications addressed to them.
    User(UserId),
    /// Direct conversation between a patient and their operators.
    Patient(PatientId),
    Group(GroupId),
}

impl From<MessageScope> for RoomKey {
    fn from(scope: MessageScope) -> Self {
        match scope {
            MessageScope::Patient(id) => RoomKey::Patient(id),
            MessageScope::Group(id) => RoomKey::Group(id),
        }
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomKey::User(id) => write!(f, "user:{id}"),
            RoomKey::Patient(id) => write!(f, "patient:{id}"),
            RoomKey::Group(id) => write!(f, "group:{id}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub user_id: UserId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<PatientId>,
    pub sender_id: UserId,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl From<&ChatMessage> for MessagePayload {
    fn from(message: &ChatMessage) -> Self {
        let (group_id, patient_id) = match message.scope {
            MessageScope::Group(id) => (Some(id), None),
            MessageScope::Patient(id) => (None, Some(id)),
        };
        Self {
            id: message.id.to_string(),
            group_id,
            patient_id,
            sender_id: message.sender_id,
            content: message.content.as_str().to_string(),
            sent_at: message.sent_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub user_id: UserId,
    pub typing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<PatientId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusPayload {
    pub session_id: crate::model::SessionId,
    pub patient_id: PatientId,
    pub status: SessionStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub id: crate::model::NotificationId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationPayload {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            title: n.title.clone(),
            message: n.message.clone(),
            kind: n.kind,
            created_at: n.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// Event delivered to connected clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    UserOnline(PresencePayload),
    UserOffline(PresencePayload),
    NewMessage(MessagePayload),
    UserTyping(TypingPayload),
    SessionStatus(SessionStatusPayload),
    Notification(NotificationPayload),
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn user_online(user_id: UserId) -> Self {
        ServerEvent::UserOnline(PresencePayload { user_id })
    }

    pub fn user_offline(user_id: UserId) -> Self {
        ServerEvent::UserOffline(PresencePayload { user_id })
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload {
            code: code.into(),
            message: message.into(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::UserOnline(_) => "user-online",
            ServerEvent::UserOffline(_) => "user-offline",
            ServerEvent::NewMessage(_) => "new-message",
            ServerEvent::UserTyping(_) => "user-typing",
            ServerEvent::SessionStatus(_) => "session-status",
            ServerEvent::Notification(_) => "notification",
            ServerEvent::Error(_) => "error",
        }
    }
}

/// A committed domain change that interested users should hear about.
#[derive(Clone, Debug)]
pub enum DomainEvent {
    MessageSent(ChatMessage),
    SessionStatusChanged {
        session: TreatmentSession,
        changed_by: UserId,
    },
    AccessGranted(PatientAccess),
    AccessRevoked {
        patient_id: PatientId,
        operator_id: UserId,
        revoked_by: UserId,
    },
}

impl DomainEvent {
    /// The user whose action produced the event; never notified about it.
    pub fn actor(&self) -> UserId {
        match self {
            DomainEvent::MessageSent(message) => message.sender_id,
            DomainEvent::SessionStatusChanged { changed_by, .. } => *changed_by,
            DomainEvent::AccessGranted(grant) => grant.granted_by,
            DomainEvent::AccessRevoked { revoked_by, .. } => *revoked_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_uuid::ClinicUuid;

    #[test]
    fn test_server_event_wire_shape() {
        let user_id = ClinicUuid::parse("550e8400e29b41d4a716446655440000").unwrap();
        let json = serde_json::to_value(ServerEvent::user_online(user_id)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "event": "user-online",
                "data": { "userId": "550e8400e29b41d4a716446655440000" }
            })
        );
    }

    #[test]
    fn test_typing_payload_omits_absent_scope() {
        let user_id = ClinicUuid::new();
        let group_id = ClinicUuid::new();
        let event = ServerEvent::UserTyping(TypingPayload {
            user_id,
            typing: true,
            group_id: Some(group_id),
            patient_id: None,
        });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "user-typing");
        assert_eq!(json["data"]["typing"], true);
        assert!(json["data"].get("patientId").is_none());
        assert_eq!(event.name(), "user-typing");
    }

    #[test]
    fn test_room_key_names() {
        let id = ClinicUuid::parse("550e8400e29b41d4a716446655440000").unwrap();
        assert_eq!(
            RoomKey::Group(id).to_string(),
            "group:550e8400e29b41d4a716446655440000"
        );
        assert_eq!(
            RoomKey::from(MessageScope::Patient(id)),
            RoomKey::Patient(id)
        );
    }
}

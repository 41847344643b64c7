//! Client-to-server event protocol.
//!
//! Frames are JSON text of the form `{ "event": "<kebab-case-name>", "data": { ... } }` with
//! camelCase payload fields, mirroring [`clinic_core::ServerEvent`] in the other direction.

use clinic_core::model::MessageScope;
use clinic_core::{ClinicError, ClinicResult, ClinicUuid};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRoomData {
    pub user_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRoomData {
    pub patient_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRoomData {
    pub group_id: String,
}

/// Names one conversation: exactly one of the two keys must be present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
}

impl ScopeData {
    pub fn scope(&self) -> ClinicResult<MessageScope> {
        MessageScope::from_keys(self.group_id.as_deref(), self.patient_id.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageData {
    #[serde(flatten)]
    pub scope: ScopeData,
    pub content: String,
}

/// Event sent by a connected client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinUserRoom(UserRoomData),
    JoinPatientRoom(PatientRoomData),
    JoinGroupRoom(GroupRoomData),
    LeaveGroupRoom(GroupRoomData),
    SendMessage(SendMessageData),
    TypingStart(ScopeData),
    TypingStop(ScopeData),
}

impl ClientEvent {
    /// Parses one text frame.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for malformed JSON or an unknown event name.
    pub fn parse(frame: &str) -> ClinicResult<Self> {
        serde_json::from_str(frame)
            .map_err(|e| ClinicError::bad_request(format!("malformed event: {e}")))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinUserRoom(_) => "join-user-room",
            ClientEvent::JoinPatientRoom(_) => "join-patient-room",
            ClientEvent::JoinGroupRoom(_) => "join-group-room",
            ClientEvent::LeaveGroupRoom(_) => "leave-group-room",
            ClientEvent::SendMessage(_) => "send-message",
            ClientEvent::TypingStart(_) => "typing-start",
            ClientEvent::TypingStop(_) => "typing-stop",
        }
    }
}

pub(crate) fn parse_id(raw: &str) -> ClinicResult<ClinicUuid> {
    Ok(ClinicUuid::parse(raw.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_join_events() {
        let event = ClientEvent::parse(
            &json!({ "event": "join-group-room", "data": { "groupId": "abc" } }).to_string(),
        )
        .expect("parse should succeed");
        assert_eq!(
            event,
            ClientEvent::JoinGroupRoom(GroupRoomData {
                group_id: "abc".into()
            })
        );
        assert_eq!(event.name(), "join-group-room");
    }

    #[test]
    fn test_send_message_carries_scope_and_content() {
        let event = ClientEvent::parse(
            &json!({
                "event": "send-message",
                "data": { "patientId": "p1", "content": "hello" }
            })
            .to_string(),
        )
        .expect("parse should succeed");

        let ClientEvent::SendMessage(data) = event else {
            panic!("expected send-message, got {event:?}");
        };
        assert_eq!(data.scope.patient_id.as_deref(), Some("p1"));
        assert_eq!(data.scope.group_id, None);
        assert_eq!(data.content, "hello");
    }

    #[test]
    fn test_typing_scope_requires_exactly_one_key() {
        let both = ScopeData {
            group_id: Some(ClinicUuid::new().to_string()),
            patient_id: Some(ClinicUuid::new().to_string()),
        };
        assert!(matches!(both.scope(), Err(ClinicError::BadRequest(_))));
        assert!(ScopeData::default().scope().is_err());

        let group = ClinicUuid::new();
        let one = ScopeData {
            group_id: Some(group.to_string()),
            patient_id: None,
        };
        assert_eq!(one.scope().expect("scope should succeed"), MessageScope::Group(group));
    }

    #[test]
    fn test_rejects_unknown_event_and_bad_json() {
        let unknown = ClientEvent::parse(r#"{"event":"delete-everything","data":{}}"#);
        assert!(matches!(unknown, Err(ClinicError::BadRequest(_))));
        assert!(ClientEvent::parse("not json").is_err());
    }
}

//! JSON request and response bodies shared by the transports.
//!
//! Identifiers travel as canonical 32-character hex strings and enums as their snake_case
//! names. Request bodies are converted into core inputs here so both transports reject
//! malformed input the same way.

use chrono::{DateTime, NaiveDate, Utc};
use clinic_core::model::{
    ChatGroup, ChatMessage, MedicalProfile, MessageScope, Notification, PatientAccess,
    SessionStatus, TreatmentSession, User,
};
use clinic_core::repositories::patients::{NewSession, ProfileUpdate};
use clinic_core::repositories::users::NewUser;
use clinic_core::{ClinicError, ClinicResult, ClinicUuid, Role, UserType};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
    pub version: String,
}

/// Error body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub code: String,
    pub message: String,
}

// ============================================================================
// AUTH & USERS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRes {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserRes,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRes {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub user_type: String,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserRes {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.to_string(),
            display_name: user.display_name.to_string(),
            role: user.role.as_str().into(),
            user_type: user.user_type.as_str().into(),
            is_online: user.is_online,
            last_seen: user.last_seen,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateUserReq {
    pub email: String,
    pub display_name: String,
    pub password: String,
    /// `admin`, `support` or `basic`.
    pub role: String,
    /// `operator` or `patient`.
    pub user_type: String,
}

impl TryFrom<CreateUserReq> for NewUser {
    type Error = ClinicError;

    fn try_from(req: CreateUserReq) -> ClinicResult<Self> {
        Ok(NewUser {
            role: req.role.parse::<Role>()?,
            user_type: req.user_type.parse::<UserType>()?,
            email: req.email,
            display_name: req.display_name,
            password: req.password,
        })
    }
}

// ============================================================================
// PATIENT RECORDS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileRes {
    pub patient_id: String,
    pub date_of_birth: Option<NaiveDate>,
    pub blood_type: Option<String>,
    pub allergies: Vec<String>,
    pub conditions: Vec<String>,
    pub notes: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<MedicalProfile> for ProfileRes {
    fn from(p: MedicalProfile) -> Self {
        Self {
            patient_id: p.patient_id.to_string(),
            date_of_birth: p.date_of_birth,
            blood_type: p.blood_type,
            allergies: p.allergies,
            conditions: p.conditions,
            notes: p.notes,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileReq {
    pub date_of_birth: Option<NaiveDate>,
    pub blood_type: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    pub notes: Option<String>,
}

impl From<UpdateProfileReq> for ProfileUpdate {
    fn from(req: UpdateProfileReq) -> Self {
        ProfileUpdate {
            date_of_birth: req.date_of_birth,
            blood_type: req.blood_type,
            allergies: req.allergies,
            conditions: req.conditions,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GrantReq {
    pub operator_id: String,
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_edit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GrantRes {
    pub patient_id: String,
    pub operator_id: String,
    pub can_view: bool,
    pub can_edit: bool,
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
}

impl From<&PatientAccess> for GrantRes {
    fn from(g: &PatientAccess) -> Self {
        Self {
            patient_id: g.patient_id.to_string(),
            operator_id: g.operator_id.to_string(),
            can_view: g.can_view,
            can_edit: g.can_edit,
            granted_by: g.granted_by.to_string(),
            granted_at: g.granted_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionRes {
    pub id: String,
    pub patient_id: String,
    pub operator_id: String,
    pub scheduled_for: DateTime<Utc>,
    /// `scheduled`, `in_progress`, `completed` or `cancelled`.
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&TreatmentSession> for SessionRes {
    fn from(s: &TreatmentSession) -> Self {
        Self {
            id: s.id.to_string(),
            patient_id: s.patient_id.to_string(),
            operator_id: s.operator_id.to_string(),
            scheduled_for: s.scheduled_for,
            status: s.status.as_str().into(),
            notes: s.notes.clone(),
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateSessionReq {
    pub operator_id: String,
    pub scheduled_for: DateTime<Utc>,
    pub notes: Option<String>,
}

impl TryFrom<CreateSessionReq> for NewSession {
    type Error = ClinicError;

    fn try_from(req: CreateSessionReq) -> ClinicResult<Self> {
        Ok(NewSession {
            operator_id: ClinicUuid::parse(&req.operator_id)?,
            scheduled_for: req.scheduled_for,
            notes: req.notes,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateSessionStatusReq {
    pub status: String,
}

impl UpdateSessionStatusReq {
    pub fn status(&self) -> ClinicResult<SessionStatus> {
        self.status.parse()
    }
}

// ============================================================================
// MESSAGING
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendMessageReq {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageRes {
    pub id: String,
    pub group_id: Option<String>,
    pub patient_id: Option<String>,
    pub sender_id: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl From<&ChatMessage> for MessageRes {
    fn from(m: &ChatMessage) -> Self {
        let (group_id, patient_id) = match m.scope {
            MessageScope::Group(id) => (Some(id.to_string()), None),
            MessageScope::Patient(id) => (None, Some(id.to_string())),
        };
        Self {
            id: m.id.to_string(),
            group_id,
            patient_id,
            sender_id: m.sender_id.to_string(),
            content: m.content.to_string(),
            sent_at: m.sent_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateGroupReq {
    pub name: String,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

impl CreateGroupReq {
    pub fn member_ids(&self) -> ClinicResult<Vec<ClinicUuid>> {
        self.member_ids
            .iter()
            .map(|id| ClinicUuid::parse(id).map_err(ClinicError::from))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupRes {
    pub id: String,
    pub name: String,
    pub member_ids: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ChatGroup> for GroupRes {
    fn from(g: &ChatGroup) -> Self {
        Self {
            id: g.id.to_string(),
            name: g.name.to_string(),
            member_ids: g.member_ids.iter().map(ToString::to_string).collect(),
            created_by: g.created_by.to_string(),
            created_at: g.created_at,
        }
    }
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationRes {
    pub id: String,
    pub title: String,
    pub message: String,
    /// `message`, `session_status`, `access_granted` or `access_revoked`.
    pub kind: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl From<&Notification> for NotificationRes {
    fn from(n: &Notification) -> Self {
        let kind = serde_json::to_value(n.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        Self {
            id: n.id.to_string(),
            title: n.title.clone(),
            message: n.message.clone(),
            kind,
            read: n.read,
            created_at: n.created_at,
            read_at: n.read_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationsQuery {
    /// Only return notifications that have not been read.
    #[serde(default)]
    pub unread_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_core::model::NotificationKind;

    #[test]
    fn test_create_user_req_parses_enums() {
        let user: NewUser = CreateUserReq {
            email: "a@clinic.test".into(),
            display_name: "A".into(),
            password: "a-good-password".into(),
            role: "Support".into(),
            user_type: "operator".into(),
        }
        .try_into()
        .expect("conversion should succeed");
        assert_eq!(user.role, Role::Support);

        let bad: ClinicResult<NewUser> = CreateUserReq {
            email: "a@clinic.test".into(),
            display_name: "A".into(),
            password: "a-good-password".into(),
            role: "superuser".into(),
            user_type: "operator".into(),
        }
        .try_into();
        assert!(matches!(bad, Err(ClinicError::BadRequest(_))));
    }

    #[test]
    fn test_notification_kind_is_snake_case() {
        let n = Notification::new(
            ClinicUuid::new(),
            "t",
            "m",
            NotificationKind::SessionStatus,
        );
        assert_eq!(NotificationRes::from(&n).kind, "session_status");
    }

    #[test]
    fn test_session_request_rejects_bad_operator_id() {
        let req = CreateSessionReq {
            operator_id: "not-an-id".into(),
            scheduled_for: Utc::now(),
            notes: None,
        };
        let result: ClinicResult<NewSession> = req.try_into();
        assert_eq!(result.unwrap_err().code(), "bad_request");
    }
}

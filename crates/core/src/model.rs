//! Domain records held by the clinic stores.
//!
//! These are plain data containers. Invariants that span records (a profile needs a
//! patient-type user, a grant needs an operator) are enforced by the services in
//! [`crate::repositories`], not here.

use chrono::{DateTime, NaiveDate, Utc};
use clinic_types::{EmailAddress, NonEmptyText};
use clinic_uuid::{ClinicUuid, TimestampId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ClinicError, ClinicResult};

pub type UserId = ClinicUuid;
pub type PatientId = ClinicUuid;
pub type GroupId = ClinicUuid;
pub type SessionId = ClinicUuid;
pub type NotificationId = ClinicUuid;
pub type ConnectionId = ClinicUuid;

// ============================================================================
// USERS
// ============================================================================

/// Administrative role of a user.
///
/// `Admin` is the top administrative role: it may view any patient record but never edit
/// clinical data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Support,
    Basic,
}

/// Whether a user is clinic staff or a patient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Operator,
    Patient,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Support => "support",
            Role::Basic => "basic",
        }
    }
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Operator => "operator",
            UserType::Patient => "patient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "support" => Ok(Role::Support),
            "basic" => Ok(Role::Basic),
            other => Err(ClinicError::bad_request(format!("unknown role '{other}'"))),
        }
    }
}

impl FromStr for UserType {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "operator" => Ok(UserType::Operator),
            "patient" => Ok(UserType::Patient),
            other => Err(ClinicError::bad_request(format!(
                "unknown user type '{other}'"
            ))),
        }
    }
}

/// A registered user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: EmailAddress,
    pub display_name: NonEmptyText,
    pub role: Role,
    pub user_type: UserType,
    /// PHC-formatted Argon2 hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The authenticated identity performing a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub user_type: UserType,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role, user_type: UserType) -> Self {
        Self {
            user_id,
            role,
            user_type,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// True when the actor is the patient identified by `patient_id`.
    pub fn is_patient(&self, patient_id: &PatientId) -> bool {
        self.user_type == UserType::Patient && self.user_id == *patient_id
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Actor::new(user.id, user.role, user.user_type)
    }
}

// ============================================================================
// PATIENT RECORDS
// ============================================================================

/// A patient-access grant: authorises one operator on one patient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientAccess {
    pub patient_id: PatientId,
    pub operator_id: UserId,
    pub can_view: bool,
    pub can_edit: bool,
    pub granted_by: UserId,
    pub granted_at: DateTime<Utc>,
}

impl PatientAccess {
    /// Builds a grant, applying the rule that edit rights imply view rights.
    pub fn new(
        patient_id: PatientId,
        operator_id: UserId,
        can_view: bool,
        can_edit: bool,
        granted_by: UserId,
    ) -> Self {
        Self {
            patient_id,
            operator_id,
            can_view: can_view || can_edit,
            can_edit,
            granted_by,
            granted_at: Utc::now(),
        }
    }
}

/// Medical profile of a patient. Shares its id with the patient-type user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalProfile {
    pub patient_id: PatientId,
    pub date_of_birth: Option<NaiveDate>,
    pub blood_type: Option<String>,
    pub allergies: Vec<String>,
    pub conditions: Vec<String>,
    pub notes: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Lifecycle of a treatment session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl SessionStatus {
    /// Completed and cancelled sessions accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "scheduled" => Ok(SessionStatus::Scheduled),
            "in_progress" => Ok(SessionStatus::InProgress),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            other => Err(ClinicError::bad_request(format!(
                "unknown session status '{other}'"
            ))),
        }
    }
}

/// A treatment session between a patient and an operator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentSession {
    pub id: SessionId,
    pub patient_id: PatientId,
    pub operator_id: UserId,
    pub scheduled_for: DateTime<Utc>,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// MESSAGING
// ============================================================================

/// Scope of a conversation: a patient's direct channel or a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MessageScope {
    Patient(PatientId),
    Group(GroupId),
}

impl MessageScope {
    /// Builds a scope from the two optional keys a payload may carry.
    ///
    /// # Errors
    ///
    /// Returns [`ClinicError::BadRequest`] unless exactly one key is present.
    pub fn from_keys(
        group_id: Option<&str>,
        patient_id: Option<&str>,
    ) -> ClinicResult<MessageScope> {
        let group_id = group_id.map(str::trim).filter(|s| !s.is_empty());
        let patient_id = patient_id.map(str::trim).filter(|s| !s.is_empty());

        match (group_id, patient_id) {
            (Some(group), None) => Ok(MessageScope::Group(ClinicUuid::parse(group)?)),
            (None, Some(patient)) => Ok(MessageScope::Patient(ClinicUuid::parse(patient)?)),
            (Some(_), Some(_)) => Err(ClinicError::bad_request(
                "payload must carry either groupId or patientId, not both",
            )),
            (None, None) => Err(ClinicError::bad_request(
                "payload must carry groupId or patientId",
            )),
        }
    }
}

/// A named chat group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatGroup {
    pub id: GroupId,
    pub name: NonEmptyText,
    pub member_ids: Vec<UserId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl ChatGroup {
    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.member_ids.contains(user_id)
    }
}

/// A chat message. The id orders messages by acceptance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: TimestampId,
    pub scope: MessageScope,
    pub sender_id: UserId,
    pub content: NonEmptyText,
    pub sent_at: DateTime<Utc>,
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Message,
    SessionStatus,
    AccessGranted,
    AccessRevoked,
}

/// Durable per-user notification record, independent of delivery channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn new(
        recipient_id: UserId,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationKind,
    ) -> Self {
        Self {
            id: ClinicUuid::new(),
            recipient_id,
            title: title.into(),
            message: message.into(),
            kind,
            read: false,
            created_at: Utc::now(),
            read_at: None,
        }
    }
}

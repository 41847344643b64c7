//! Durable storage seams.
//!
//! Each aggregate has its own async trait so services depend only on what they touch.
//! [`memory::MemoryStore`] implements all of them in-process; a relational backend can
//! implement the same traits without changes to the services.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clinic_types::EmailAddress;

use crate::access::GrantLookup;
use crate::model::{
    ChatGroup, ChatMessage, GroupId, MedicalProfile, MessageScope, Notification, NotificationId,
    PatientAccess, PatientId, SessionId, SessionStatus, TreatmentSession, User, UserId,
};

pub use crate::error::{StoreError, StoreResult};

pub mod memory;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new user. Fails with [`StoreError::Conflict`] if the email is taken.
    async fn insert_user(&self, user: User) -> StoreResult<User>;
    async fn get_user(&self, id: &UserId) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &EmailAddress) -> StoreResult<Option<User>>;
    /// Records the online flag and last-seen time. Fails with `NotFound` for unknown users.
    async fn update_presence(
        &self,
        id: &UserId,
        online: bool,
        last_seen: DateTime<Utc>,
    ) -> StoreResult<()>;
}

/// Write side of patient-access grants. Reads go through [`GrantLookup`].
#[async_trait]
pub trait GrantStore: GrantLookup {
    /// Inserts or replaces the grant for its `(patient, operator)` pair.
    async fn upsert_grant(&self, grant: PatientAccess) -> StoreResult<PatientAccess>;
    /// Removes a grant. Returns `false` if none existed.
    async fn revoke_grant(&self, patient_id: &PatientId, operator_id: &UserId)
    -> StoreResult<bool>;
    async fn grants_for_patient(&self, patient_id: &PatientId) -> StoreResult<Vec<PatientAccess>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, patient_id: &PatientId) -> StoreResult<Option<MedicalProfile>>;
    async fn put_profile(&self, profile: MedicalProfile) -> StoreResult<MedicalProfile>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: TreatmentSession) -> StoreResult<TreatmentSession>;
    async fn get_session(&self, id: &SessionId) -> StoreResult<Option<TreatmentSession>>;
    /// Replaces an existing session if its stored status is still `expected`.
    ///
    /// Fails with `NotFound` if it does not exist and `Conflict` if the status moved.
    async fn update_session_if(
        &self,
        session: TreatmentSession,
        expected: SessionStatus,
    ) -> StoreResult<TreatmentSession>;
    /// Sessions of a patient ordered by `scheduled_for`.
    async fn sessions_for_patient(&self, patient_id: &PatientId)
    -> StoreResult<Vec<TreatmentSession>>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append_message(&self, message: ChatMessage) -> StoreResult<ChatMessage>;
    /// The most recent `limit` messages of a scope, oldest first.
    async fn messages_for_scope(
        &self,
        scope: &MessageScope,
        limit: usize,
    ) -> StoreResult<Vec<ChatMessage>>;
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn insert_group(&self, group: ChatGroup) -> StoreResult<ChatGroup>;
    async fn get_group(&self, id: &GroupId) -> StoreResult<Option<ChatGroup>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: Notification) -> StoreResult<Notification>;
    async fn get_notification(&self, id: &NotificationId) -> StoreResult<Option<Notification>>;
    /// Notifications of a recipient, newest first.
    async fn notifications_for(
        &self,
        recipient_id: &UserId,
        unread_only: bool,
    ) -> StoreResult<Vec<Notification>>;
    /// Marks a notification read. Already-read notifications keep their original `read_at`.
    async fn mark_read(&self, id: &NotificationId, at: DateTime<Utc>) -> StoreResult<Notification>;
}

//! In-memory implementation of every store trait.
//!
//! State lives in `HashMap`s guarded by `tokio::sync::RwLock`: reads run concurrently,
//! writes are serialised per map. Nothing survives a restart. Locks are released before
//! returning, never held across another await.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clinic_types::EmailAddress;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{
    GrantStore, GroupStore, MessageStore, NotificationStore, ProfileStore, SessionStore,
    StoreError, StoreResult, UserStore,
};
use crate::access::GrantLookup;
use crate::model::{
    ChatGroup, ChatMessage, GroupId, MedicalProfile, MessageScope, Notification, NotificationId,
    PatientAccess, PatientId, SessionId, SessionStatus, TreatmentSession, User, UserId,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<UserId, User>>,
    grants: RwLock<HashMap<(PatientId, UserId), PatientAccess>>,
    profiles: RwLock<HashMap<PatientId, MedicalProfile>>,
    sessions: RwLock<HashMap<SessionId, TreatmentSession>>,
    messages: RwLock<HashMap<MessageScope, Vec<ChatMessage>>>,
    groups: RwLock<HashMap<GroupId, ChatGroup>>,
    notifications: RwLock<HashMap<NotificationId, Notification>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        if users.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} already exists", user.id)));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: &UserId) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &EmailAddress) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| &u.email == email)
            .cloned())
    }

    async fn update_presence(
        &self,
        id: &UserId,
        online: bool,
        last_seen: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        user.is_online = online;
        user.last_seen = Some(last_seen);
        Ok(())
    }
}

#[async_trait]
impl GrantLookup for MemoryStore {
    async fn find_grant(
        &self,
        patient_id: &PatientId,
        operator_id: &UserId,
    ) -> StoreResult<Option<PatientAccess>> {
        Ok(self
            .grants
            .read()
            .await
            .get(&(*patient_id, *operator_id))
            .cloned())
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn upsert_grant(&self, grant: PatientAccess) -> StoreResult<PatientAccess> {
        self.grants
            .write()
            .await
            .insert((grant.patient_id, grant.operator_id), grant.clone());
        Ok(grant)
    }

    async fn revoke_grant(
        &self,
        patient_id: &PatientId,
        operator_id: &UserId,
    ) -> StoreResult<bool> {
        Ok(self
            .grants
            .write()
            .await
            .remove(&(*patient_id, *operator_id))
            .is_some())
    }

    async fn grants_for_patient(&self, patient_id: &PatientId) -> StoreResult<Vec<PatientAccess>> {
        let mut grants: Vec<PatientAccess> = self
            .grants
            .read()
            .await
            .values()
            .filter(|g| &g.patient_id == patient_id)
            .cloned()
            .collect();
        grants.sort_by_key(|g| g.granted_at);
        Ok(grants)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, patient_id: &PatientId) -> StoreResult<Option<MedicalProfile>> {
        Ok(self.profiles.read().await.get(patient_id).cloned())
    }

    async fn put_profile(&self, profile: MedicalProfile) -> StoreResult<MedicalProfile> {
        self.profiles
            .write()
            .await
            .insert(profile.patient_id, profile.clone());
        Ok(profile)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, session: TreatmentSession) -> StoreResult<TreatmentSession> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(StoreError::Conflict(format!(
                "session {} already exists",
                session.id
            )));
        }
        sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: &SessionId) -> StoreResult<Option<TreatmentSession>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn update_session_if(
        &self,
        session: TreatmentSession,
        expected: SessionStatus,
    ) -> StoreResult<TreatmentSession> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.id) {
            Some(existing) if existing.status == expected => {
                *existing = session.clone();
                Ok(session)
            }
            Some(existing) => Err(StoreError::Conflict(format!(
                "session {} is now {}",
                session.id,
                existing.status.as_str()
            ))),
            None => Err(StoreError::NotFound(format!("session {}", session.id))),
        }
    }

    async fn sessions_for_patient(
        &self,
        patient_id: &PatientId,
    ) -> StoreResult<Vec<TreatmentSession>> {
        let mut sessions: Vec<TreatmentSession> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| &s.patient_id == patient_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.scheduled_for);
        Ok(sessions)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append_message(&self, message: ChatMessage) -> StoreResult<ChatMessage> {
        let mut messages = self.messages.write().await;
        let log = messages.entry(message.scope).or_default();
        // Keep the log sorted by id even if messages arrive out of order.
        let at = log.partition_point(|m| m.id < message.id);
        log.insert(at, message.clone());
        Ok(message)
    }

    async fn messages_for_scope(
        &self,
        scope: &MessageScope,
        limit: usize,
    ) -> StoreResult<Vec<ChatMessage>> {
        let messages = self.messages.read().await;
        Ok(match messages.get(scope) {
            Some(log) => log[log.len().saturating_sub(limit)..].to_vec(),
            None => Vec::new(),
        })
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn insert_group(&self, group: ChatGroup) -> StoreResult<ChatGroup> {
        let mut groups = self.groups.write().await;
        if groups.contains_key(&group.id) {
            return Err(StoreError::Conflict(format!("group {} already exists", group.id)));
        }
        groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn get_group(&self, id: &GroupId) -> StoreResult<Option<ChatGroup>> {
        Ok(self.groups.read().await.get(id).cloned())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(&self, notification: Notification) -> StoreResult<Notification> {
        self.notifications
            .write()
            .await
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn get_notification(&self, id: &NotificationId) -> StoreResult<Option<Notification>> {
        Ok(self.notifications.read().await.get(id).cloned())
    }

    async fn notifications_for(
        &self,
        recipient_id: &UserId,
        unread_only: bool,
    ) -> StoreResult<Vec<Notification>> {
        let mut found: Vec<Notification> = self
            .notifications
            .read()
            .await
            .values()
            .filter(|n| &n.recipient_id == recipient_id && !(unread_only && n.read))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn mark_read(&self, id: &NotificationId, at: DateTime<Utc>) -> StoreResult<Notification> {
        let mut notifications = self.notifications.write().await;
        let n = notifications
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("notification {id}")))?;
        if !n.read {
            n.read = true;
            n.read_at = Some(at);
        }
        Ok(n.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NotificationKind, Role, UserType};
    use clinic_types::NonEmptyText;
    use clinic_uuid::{ClinicUuid, TimestampIdGenerator};

    fn user(email: &str) -> User {
        User {
            id: ClinicUuid::new(),
            email: EmailAddress::parse(email).unwrap(),
            display_name: NonEmptyText::new("Test User").unwrap(),
            role: Role::Basic,
            user_type: UserType::Operator,
            password_hash: String::new(),
            is_online: false,
            last_seen: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = MemoryStore::new();
        store
            .insert_user(user("nurse@clinic.test"))
            .await
            .expect("first insert should succeed");

        let err = store
            .insert_user(user("NURSE@clinic.test"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_presence_unknown_user() {
        let store = MemoryStore::new();
        let err = store
            .update_presence(&ClinicUuid::new(), true, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_grant_upsert_replaces_pair() {
        let store = MemoryStore::new();
        let (patient, operator, admin) = (ClinicUuid::new(), ClinicUuid::new(), ClinicUuid::new());

        store
            .upsert_grant(PatientAccess::new(patient, operator, true, false, admin))
            .await
            .unwrap();
        store
            .upsert_grant(PatientAccess::new(patient, operator, true, true, admin))
            .await
            .unwrap();

        let grants = store.grants_for_patient(&patient).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert!(grants[0].can_edit);

        assert!(store.revoke_grant(&patient, &operator).await.unwrap());
        assert!(!store.revoke_grant(&patient, &operator).await.unwrap());
        assert!(store.find_grant(&patient, &operator).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_messages_keep_acceptance_order_and_limit() {
        let store = MemoryStore::new();
        let ids = TimestampIdGenerator::new();
        let scope = MessageScope::Group(ClinicUuid::new());
        let sender = ClinicUuid::new();

        for i in 0..5 {
            store
                .append_message(ChatMessage {
                    id: ids.next_id(),
                    scope,
                    sender_id: sender,
                    content: NonEmptyText::new(format!("m{i}")).unwrap(),
                    sent_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let last_three = store.messages_for_scope(&scope, 3).await.unwrap();
        let contents: Vec<&str> = last_three.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_unread_filter_and_mark_read() {
        let store = MemoryStore::new();
        let recipient = ClinicUuid::new();
        let first = store
            .insert_notification(Notification::new(recipient, "a", "b", NotificationKind::Message))
            .await
            .unwrap();
        store
            .insert_notification(Notification::new(recipient, "c", "d", NotificationKind::Message))
            .await
            .unwrap();

        let read = store.mark_read(&first.id, Utc::now()).await.unwrap();
        assert!(read.read);
        let read_at = read.read_at;
        let again = store.mark_read(&first.id, Utc::now()).await.unwrap();
        assert_eq!(again.read_at, read_at, "second mark keeps the first timestamp");

        assert_eq!(store.notifications_for(&recipient, false).await.unwrap().len(), 2);
        assert_eq!(store.notifications_for(&recipient, true).await.unwrap().len(), 1);
    }
}

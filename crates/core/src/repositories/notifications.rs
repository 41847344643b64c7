//! Reading and acknowledging a user's own notifications.

use chrono::Utc;
use std::sync::Arc;

use crate::model::{Actor, Notification, NotificationId};
use crate::store::NotificationStore;
use crate::{ClinicError, ClinicResult};

#[derive(Clone)]
pub struct NotificationService {
    notifications: Arc<dyn NotificationStore>,
}

impl NotificationService {
    pub fn new(notifications: Arc<dyn NotificationStore>) -> Self {
        Self { notifications }
    }

    /// The actor's notifications, newest first.
    pub async fn list(&self, actor: &Actor, unread_only: bool) -> ClinicResult<Vec<Notification>> {
        Ok(self
            .notifications
            .notifications_for(&actor.user_id, unread_only)
            .await?)
    }

    /// Marks one of the actor's notifications as read.
    ///
    /// Another user's notification is reported as `NotFound`, so ids cannot be probed.
    pub async fn mark_read(&self, actor: &Actor, id: &NotificationId) -> ClinicResult<Notification> {
        let not_found = || ClinicError::not_found(format!("notification {id}"));
        let existing = self
            .notifications
            .get_notification(id)
            .await?
            .ok_or_else(not_found)?;
        if existing.recipient_id != actor.user_id {
            return Err(not_found());
        }
        Ok(self.notifications.mark_read(id, Utc::now()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NotificationKind, Role, UserType};
    use crate::store::memory::MemoryStore;
    use clinic_uuid::ClinicUuid;

    #[tokio::test]
    async fn test_mark_read_is_owner_only() {
        let store = Arc::new(MemoryStore::new());
        let service = NotificationService::new(store.clone());
        let owner = Actor::new(ClinicUuid::new(), Role::Basic, UserType::Patient);
        let other = Actor::new(ClinicUuid::new(), Role::Admin, UserType::Operator);

        let n = store
            .insert_notification(Notification::new(
                owner.user_id,
                "New message",
                "hi",
                NotificationKind::Message,
            ))
            .await
            .unwrap();

        assert!(matches!(
            service.mark_read(&other, &n.id).await,
            Err(ClinicError::NotFound(_))
        ));
        assert_eq!(service.list(&owner, true).await.unwrap().len(), 1);

        let read = service
            .mark_read(&owner, &n.id)
            .await
            .expect("owner should mark read");
        assert!(read.read);
        assert!(service.list(&owner, true).await.unwrap().is_empty());
        assert_eq!(service.list(&owner, false).await.unwrap().len(), 1);
    }
}

//! Process-wide service graph.
//!
//! [`ClinicContext`] is built once at startup and shared by the REST and real-time servers,
//! so both observe the same rooms, presence and stores.

use std::sync::Arc;

use crate::access::AccessControl;
use crate::config::CoreConfig;
use crate::fanout::NotificationFanout;
use crate::presence::PresenceRegistry;
use crate::repositories::grants::GrantService;
use crate::repositories::messaging::MessagingService;
use crate::repositories::notifications::NotificationService;
use crate::repositories::patients::PatientService;
use crate::repositories::users::UserService;
use crate::rooms::RoomHub;
use crate::store::memory::MemoryStore;
use crate::store::{
    GrantStore, GroupStore, MessageStore, NotificationStore, ProfileStore, SessionStore,
    UserStore,
};
use crate::ClinicResult;

#[derive(Clone)]
pub struct ClinicContext {
    pub config: Arc<CoreConfig>,
    pub hub: Arc<RoomHub>,
    pub presence: Arc<PresenceRegistry>,
    pub access: AccessControl,
    pub fanout: NotificationFanout,
    pub users: UserService,
    pub grants: GrantService,
    pub patients: PatientService,
    pub messaging: MessagingService,
    pub notifications: NotificationService,
}

impl ClinicContext {
    /// Builds a context backed by a fresh [`MemoryStore`].
    pub fn in_memory(config: CoreConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Builds a context over any backend that implements every store trait.
    pub fn with_store<S>(config: CoreConfig, store: Arc<S>) -> Self
    where
        S: UserStore
            + GrantStore
            + ProfileStore
            + SessionStore
            + MessageStore
            + GroupStore
            + NotificationStore
            + 'static,
    {
        let config = Arc::new(config);
        let hub = Arc::new(RoomHub::new());
        let presence = Arc::new(PresenceRegistry::new(
            store.clone(),
            hub.clone(),
            config.presence_write_timeout(),
        ));
        let access = AccessControl::new(store.clone());
        let fanout = NotificationFanout::new(hub.clone(), store.clone(), store.clone(), store.clone());
        let users = UserService::new(store.clone(), store.clone());

        Self {
            grants: GrantService::new(users.clone(), store.clone(), hub.clone(), fanout.clone()),
            patients: PatientService::new(
                users.clone(),
                store.clone(),
                store.clone(),
                access.clone(),
                fanout.clone(),
            ),
            messaging: MessagingService::new(
                users.clone(),
                store.clone(),
                store.clone(),
                access.clone(),
                fanout.clone(),
                config.message_history_limit(),
            ),
            notifications: NotificationService::new(store),
            config,
            hub,
            presence,
            access,
            fanout,
            users,
        }
    }

    /// Runs one-off startup work, currently seeding the bootstrap administrator.
    pub async fn bootstrap(&self) -> ClinicResult<()> {
        if let Some(admin) = self.config.bootstrap_admin() {
            self.users.ensure_bootstrap_admin(admin).await?;
        }
        Ok(())
    }

    /// Releases process-wide real-time state at shutdown.
    pub async fn shutdown(&self) {
        self.presence.clear().await;
        self.hub.clear().await;
        tracing::info!("clinic context shut down");
    }
}

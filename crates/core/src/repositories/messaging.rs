//! Chat groups and messages.
//!
//! A patient conversation is readable and writable by anyone who may view the patient.
//! A group conversation is open to its members only.

use chrono::Utc;
use clinic_types::NonEmptyText;
use clinic_uuid::{ClinicUuid, TimestampIdGenerator};
use std::sync::Arc;

use crate::access::{AccessControl, Permission};
use crate::constants::{MAX_GROUP_NAME_CHARS, MAX_MESSAGE_CHARS};
use crate::events::DomainEvent;
use crate::fanout::NotificationFanout;
use crate::locks::KeyedLocks;
use crate::model::{Actor, ChatGroup, ChatMessage, ConnectionId, GroupId, MessageScope, UserId};
use crate::repositories::users::UserService;
use crate::store::{GroupStore, MessageStore};
use crate::{ClinicError, ClinicResult};

#[derive(Clone)]
pub struct MessagingService {
    users: UserService,
    groups: Arc<dyn GroupStore>,
    messages: Arc<dyn MessageStore>,
    access: AccessControl,
    fanout: NotificationFanout,
    ids: Arc<TimestampIdGenerator>,
    ordering: Arc<KeyedLocks<MessageScope>>,
    history_limit: usize,
}

impl MessagingService {
    pub fn new(
        users: UserService,
        groups: Arc<dyn GroupStore>,
        messages: Arc<dyn MessageStore>,
        access: AccessControl,
        fanout: NotificationFanout,
        history_limit: usize,
    ) -> Self {
        Self {
            users,
            groups,
            messages,
            access,
            fanout,
            ids: Arc::new(TimestampIdGenerator::new()),
            ordering: Arc::new(KeyedLocks::new()),
            history_limit,
        }
    }

    /// Checks that `actor` may take part in the conversation of `scope`.
    ///
    /// # Errors
    ///
    /// * `NotFound` - the group does not exist.
    /// * `Forbidden` - the actor is not a group member, or may not view the patient.
    pub async fn authorize_scope(&self, actor: &Actor, scope: &MessageScope) -> ClinicResult<()> {
        match scope {
            MessageScope::Patient(patient_id) => {
                self.access
                    .authorize_id(actor, patient_id, Permission::View)
                    .await?;
            }
            MessageScope::Group(group_id) => {
                self.group_for_member(actor, group_id).await?;
            }
        }
        Ok(())
    }

    /// Stores a message and fans it out to the scope room and the audience.
    ///
    /// `origin` is the sending connection when the message came over the socket.
    pub async fn send_message(
        &self,
        actor: &Actor,
        scope: MessageScope,
        content: &str,
        origin: Option<ConnectionId>,
    ) -> ClinicResult<ChatMessage> {
        let content = NonEmptyText::bounded(content, MAX_MESSAGE_CHARS)?;
        self.authorize_scope(actor, &scope).await?;

        // Id, append and fan-out happen as one step per scope, so live order matches history.
        let _ordering = self.ordering.lock(scope).await;
        let message = ChatMessage {
            id: self.ids.next_id(),
            scope,
            sender_id: actor.user_id,
            content,
            sent_at: Utc::now(),
        };
        let message = self.messages.append_message(message).await?;
        tracing::debug!(message_id = %message.id, sender = %actor.user_id, "message accepted");

        self.fanout
            .dispatch(DomainEvent::MessageSent(message.clone()), origin)
            .await;
        Ok(message)
    }

    /// Recent messages of a conversation, oldest first.
    pub async fn history(&self, actor: &Actor, scope: &MessageScope) -> ClinicResult<Vec<ChatMessage>> {
        self.authorize_scope(actor, scope).await?;
        Ok(self
            .messages
            .messages_for_scope(scope, self.history_limit)
            .await?)
    }

    /// Relays a typing indicator after checking the actor may see the conversation.
    pub async fn typing(
        &self,
        actor: &Actor,
        scope: MessageScope,
        typing: bool,
        origin: &ConnectionId,
    ) -> ClinicResult<()> {
        self.authorize_scope(actor, &scope).await?;
        self.fanout
            .typing(scope, actor.user_id, typing, origin)
            .await;
        Ok(())
    }

    /// Creates a group. The creator is always a member.
    ///
    /// # Errors
    ///
    /// `BadRequest` for a blank or overlong name; `NotFound` if a member does not exist.
    pub async fn create_group(
        &self,
        actor: &Actor,
        name: &str,
        member_ids: Vec<UserId>,
    ) -> ClinicResult<ChatGroup> {
        let name = NonEmptyText::bounded(name, MAX_GROUP_NAME_CHARS)?;

        let mut members = vec![actor.user_id];
        for member in member_ids {
            if !members.contains(&member) {
                self.users.get(&member).await?;
                members.push(member);
            }
        }

        let group = self
            .groups
            .insert_group(ChatGroup {
                id: ClinicUuid::new(),
                name,
                member_ids: members,
                created_by: actor.user_id,
                created_at: Utc::now(),
            })
            .await?;
        tracing::info!(
            group_id = %group.id,
            created_by = %actor.user_id,
            members = group.member_ids.len(),
            "group created"
        );
        Ok(group)
    }

    pub async fn group_for_member(&self, actor: &Actor, group_id: &GroupId) -> ClinicResult<ChatGroup> {
        let group = self
            .groups
            .get_group(group_id)
            .await?
            .ok_or_else(|| ClinicError::not_found(format!("group {group_id}")))?;
        if !group.is_member(&actor.user_id) {
            return Err(ClinicError::forbidden("not a member of this group"));
        }
        Ok(group)
    }
}

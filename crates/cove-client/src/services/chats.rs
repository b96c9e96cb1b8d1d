//! Conversation lookup and membership. A direct chat between two users is
//! resolved by intersecting their memberships; nothing here assumes a
//! dedicated pair table exists server-side.

use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use cove_backend::Backend;
use cove_types::rows::chat_from_value;
use cove_types::{Chat, ChatEvent, MemberRole, UserProfile};

use crate::error::{ClientError, Result};

pub struct ChatService {
    backend: Backend,
}

impl ChatService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Every chat the user is a member of.
    pub async fn chats_for_user(&self, user_id: Uuid) -> Result<Vec<Chat>> {
        let memberships = self
            .backend
            .table("chat_members")
            .select("chat_id")
            .eq("user_id", user_id)
            .fetch()
            .await?;
        let chat_ids = membership_chat_ids(&memberships);
        if chat_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .backend
            .table("chats")
            .select("*")
            .in_("id", chat_ids)
            .fetch()
            .await?;
        rows.into_iter()
            .map(|row| Ok(chat_from_value(row)?))
            .collect()
    }

    /// The chat itself, gated on `user_id` being a member.
    pub async fn chat_by_id(&self, chat_id: Uuid, user_id: Uuid) -> Result<Chat> {
        let row = self
            .backend
            .table("chats")
            .select("*")
            .eq("id", chat_id)
            .fetch_maybe()
            .await?
            .ok_or(ClientError::NotFound("chat"))?;

        self.backend
            .table("chat_members")
            .select("user_id")
            .eq("chat_id", chat_id)
            .eq("user_id", user_id)
            .fetch_maybe()
            .await?
            .ok_or(ClientError::NotFound("chat membership"))?;

        Ok(chat_from_value(row)?)
    }

    /// The conversation both users already share, if any.
    pub async fn chat_between(&self, user_a: Uuid, user_b: Uuid) -> Result<Option<Chat>> {
        let memberships = self
            .backend
            .table("chat_members")
            .select("chat_id")
            .eq("user_id", user_a)
            .fetch()
            .await?;
        let chat_ids = membership_chat_ids(&memberships);
        if chat_ids.is_empty() {
            return Ok(None);
        }

        let common = self
            .backend
            .table("chat_members")
            .select("chat_id")
            .in_("chat_id", chat_ids)
            .eq("user_id", user_b)
            .fetch_maybe()
            .await?;
        let Some(common) = common.as_ref().and_then(|row| row_chat_id(row)) else {
            return Ok(None);
        };

        let row = self
            .backend
            .table("chats")
            .select("*")
            .eq("id", common)
            .fetch_maybe()
            .await?;
        row.map(|r| Ok(chat_from_value(r)?)).transpose()
    }

    /// Create a direct conversation and register both memberships.
    pub async fn create_direct_chat(&self, a: &UserProfile, b: &UserProfile) -> Result<Chat> {
        let mut rows = self
            .backend
            .table("chats")
            .insert(json!([{
                "name": format!("{} & {}", a.username, b.username),
                "is_group": false,
                "created_at": Utc::now(),
            }]))
            .await?;
        if rows.is_empty() {
            return Err(ClientError::NotFound("created chat"));
        }
        let chat = chat_from_value(rows.remove(0))?;

        self.backend
            .table("chat_members")
            .insert(json!([
                { "chat_id": chat.id, "user_id": a.id },
                { "chat_id": chat.id, "user_id": b.id },
            ]))
            .await?;

        info!(chat_id = %chat.id, "direct chat created");
        Ok(chat)
    }

    /// The existing direct chat between the two users, or a fresh one.
    pub async fn open_direct_chat(&self, a: &UserProfile, b: &UserProfile) -> Result<Chat> {
        match self.chat_between(a.id, b.id).await? {
            Some(chat) => Ok(chat),
            None => self.create_direct_chat(a, b).await,
        }
    }

    pub async fn add_member(&self, chat_id: Uuid, user_id: Uuid, role: MemberRole) -> Result<()> {
        self.backend
            .table("chat_members")
            .insert(json!([{
                "chat_id": chat_id,
                "user_id": user_id,
                "role": role,
            }]))
            .await?;
        Ok(())
    }

    pub async fn remove_member(&self, chat_id: Uuid, user_id: Uuid) -> Result<()> {
        self.backend
            .table("chat_members")
            .eq("chat_id", chat_id)
            .eq("user_id", user_id)
            .delete()
            .await?;
        Ok(())
    }

    /// Append an auditable event (message deleted, member joined, ...) to
    /// the chat's event log.
    pub async fn record_event(&self, event: &ChatEvent) -> Result<()> {
        self.backend
            .table("chat_events")
            .insert(json!([{
                "chat_id": event.chat_id,
                "event_type": event.event_type,
                "message_id": event.message_id,
                "created_by": event.created_by,
            }]))
            .await?;
        Ok(())
    }
}

fn membership_chat_ids(rows: &[Value]) -> Vec<Uuid> {
    rows.iter().filter_map(row_chat_id).collect()
}

fn row_chat_id(row: &Value) -> Option<Uuid> {
    row["chat_id"].as_str()?.parse().ok()
}

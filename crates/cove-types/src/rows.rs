//! Boundary mapping from the platform's loosely-typed rows into the typed
//! entities of [`crate::models`].
//!
//! The data store returns `serde_json::Value` rows whose shape depends on
//! the requested projection; embedded relations may arrive as an object or
//! as a one-element array. Everything row-shaped is normalized here so the
//! rest of the client never branches on that ambiguity.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    Chat, ChatMember, Contact, ContactStatus, MemberRole, Message, MessageId, UserProfile,
};

#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error("malformed row: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct MessageRow {
    id: Uuid,
    chat_id: Uuid,
    sender_id: Uuid,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, alias = "media_url")]
    media_path: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    read: bool,
}

/// Decode a confirmed `messages` row. The id is always a server id here;
/// optimistic entries never round-trip through the store.
pub fn message_from_value(value: Value) -> Result<Message, RowError> {
    let row: MessageRow = serde_json::from_value(value)?;
    Ok(Message {
        id: MessageId::Server(row.id),
        chat_id: row.chat_id,
        sender_id: row.sender_id,
        content: row.content,
        media_path: row.media_path,
        created_at: row.created_at,
        updated_at: row.updated_at,
        read: row.read,
    })
}

#[derive(Debug, Deserialize)]
struct ChatRow {
    id: Uuid,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    is_group: bool,
    created_at: DateTime<Utc>,
}

pub fn chat_from_value(value: Value) -> Result<Chat, RowError> {
    let row: ChatRow = serde_json::from_value(value)?;
    Ok(Chat {
        id: row.id,
        name: row.name,
        is_group: row.is_group,
        created_at: row.created_at,
    })
}

pub fn profile_from_value(value: Value) -> Result<UserProfile, RowError> {
    Ok(serde_json::from_value(value)?)
}

#[derive(Debug, Deserialize)]
struct MemberRow {
    chat_id: Uuid,
    user_id: Uuid,
    #[serde(default = "default_role")]
    role: MemberRole,
}

fn default_role() -> MemberRole {
    MemberRole::Member
}

pub fn member_from_value(value: Value) -> Result<ChatMember, RowError> {
    let row: MemberRow = serde_json::from_value(value)?;
    Ok(ChatMember {
        chat_id: row.chat_id,
        user_id: row.user_id,
        role: row.role,
    })
}

#[derive(Debug, Deserialize)]
struct ContactRow {
    id: Uuid,
    user_id: Uuid,
    contact_id: Uuid,
    status: ContactStatus,
    #[serde(default)]
    user: Value,
    #[serde(default)]
    contact: Value,
}

/// Unwrap an embedded relation that may be an object or a one-element array.
pub fn embedded_object(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(_) => Some(value),
        Value::Array(items) => items.first(),
        _ => None,
    }
}

/// Decode a `contacts` row joined with both sides' profiles, keeping only
/// the counterpart profile as seen by `viewer`.
pub fn contact_from_value(value: Value, viewer: Uuid) -> Result<Contact, RowError> {
    let row: ContactRow = serde_json::from_value(value)?;
    let embed = if row.user_id == viewer {
        &row.contact
    } else {
        &row.user
    };
    let profile = embedded_object(embed)
        .map(|v| serde_json::from_value::<UserProfile>(v.clone()))
        .transpose()?;
    Ok(Contact {
        id: row.id,
        user_id: row.user_id,
        contact_id: row.contact_id,
        status: row.status,
        profile,
    })
}

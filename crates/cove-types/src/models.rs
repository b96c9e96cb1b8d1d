use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    Pending,
    Accepted,
    Blocked,
}

/// A relationship between two accounts. `profile` carries the counterpart's
/// denormalized profile; which side that is depends on the viewing user,
/// so it is filled in at the boundary, not by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub contact_id: Uuid,
    pub status: ContactStatus,
    pub profile: Option<UserProfile>,
}

impl Contact {
    /// The account on the other side of the relationship from `viewer`.
    pub fn counterpart_of(&self, viewer: Uuid) -> Uuid {
        if self.user_id == viewer {
            self.contact_id
        } else {
            self.user_id
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub name: Option<String>,
    pub is_group: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Member,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMember {
    pub chat_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
}

/// Identifier of a message in the local timeline.
///
/// A `Local` id is minted client-side for an optimistic entry and never
/// leaves the process. A `Server` id is the stable backend identifier a
/// message carries once it has been confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageId {
    Local(Uuid),
    Server(Uuid),
}

impl MessageId {
    pub fn fresh_local() -> Self {
        Self::Local(Uuid::new_v4())
    }

    pub fn server_id(&self) -> Option<Uuid> {
        match self {
            Self::Server(id) => Some(*id),
            Self::Local(_) => None,
        }
    }
}

/// One chat message. Text and attachment are each optional but a message
/// carries at least one of them, enforced before anything hits the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub content: Option<String>,
    /// Raw storage path of the attached object. Resolved to a signed URL at
    /// render time, never persisted as a public URL.
    pub media_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub read: bool,
}

impl Message {
    /// True while the entry is optimistic: shown locally, not yet confirmed.
    pub fn is_pending(&self) -> bool {
        matches!(self.id, MessageId::Local(_))
    }

    /// The server stamps `updated_at` only on edits.
    pub fn is_edited(&self) -> bool {
        self.updated_at.is_some_and(|t| t != self.created_at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    pub chat_id: Uuid,
    pub event_type: String,
    pub message_id: Option<Uuid>,
    pub created_by: Uuid,
}

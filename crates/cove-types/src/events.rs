use uuid::Uuid;

use crate::models::Message;

/// A row-level change to a conversation's messages, after boundary mapping.
///
/// Delivery is at-least-once and possibly duplicated; consumers must treat
/// every variant as idempotent.
#[derive(Debug, Clone)]
pub enum MessageChange {
    Inserted(Message),
    Updated(Message),
    Deleted(Uuid),
}

impl MessageChange {
    /// Returns the owning chat when the change carries a full row.
    /// Deletes only carry the row id.
    pub fn chat_id(&self) -> Option<Uuid> {
        match self {
            Self::Inserted(m) | Self::Updated(m) => Some(m.chat_id),
            Self::Deleted(_) => None,
        }
    }
}

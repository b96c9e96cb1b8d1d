//! Message reads and writes for one conversation. Permission rules follow
//! the server's: a message is edited or deleted by its sender or by a chat
//! admin. The optimistic timeline lives in [`crate::chat`]; this service
//! only talks to the store.

use chrono::Utc;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use cove_backend::Backend;
use cove_types::Message;
use cove_types::rows::message_from_value;

use crate::error::{ClientError, Result};

const UPLOADS_BUCKET: &str = "uploads";

pub struct MessageService {
    backend: Backend,
}

impl MessageService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// One page of a conversation, oldest first.
    pub async fn fetch_page(&self, chat_id: Uuid, limit: u32, offset: u32) -> Result<Vec<Message>> {
        let rows = self
            .backend
            .table("messages")
            .select("*")
            .eq("chat_id", chat_id)
            .order("created_at", true)
            .range(offset, limit)
            .fetch()
            .await?;
        rows.into_iter()
            .map(|row| Ok(message_from_value(row)?))
            .collect()
    }

    /// Store a new message. A message carries trimmed text, an attachment
    /// path, or both; anything else is rejected before the network.
    pub async fn send(
        &self,
        chat_id: Uuid,
        sender_id: Uuid,
        content: Option<&str>,
        media_path: Option<&str>,
    ) -> Result<Message> {
        let content = normalize_content(content);
        if content.is_none() && media_path.is_none() {
            return Err(ClientError::Validation(
                "a message needs text or an attachment",
            ));
        }

        let mut rows = self
            .backend
            .table("messages")
            .insert(json!([{
                "sender_id": sender_id,
                "chat_id": chat_id,
                "content": content,
                "media_url": media_path,
                "created_at": Utc::now(),
                "updated_at": null,
                "read": false,
            }]))
            .await?;
        if rows.is_empty() {
            return Err(ClientError::NotFound("stored message"));
        }
        Ok(message_from_value(rows.remove(0))?)
    }

    /// Replace a message's text. Stamps `updated_at`, which is what marks
    /// the message as edited for every viewer.
    pub async fn edit(
        &self,
        chat_id: Uuid,
        message_id: Uuid,
        new_content: &str,
        user_id: Uuid,
    ) -> Result<Message> {
        let Some(content) = normalize_content(Some(new_content)) else {
            return Err(ClientError::Validation("edited text must not be empty"));
        };

        self.check_author_or_admin(chat_id, message_id, user_id)
            .await?;

        let mut rows = self
            .backend
            .table("messages")
            .eq("id", message_id)
            .eq("chat_id", chat_id)
            .update(json!({
                "content": content,
                "updated_at": Utc::now(),
            }))
            .await?;
        if rows.is_empty() {
            return Err(ClientError::NotFound("message"));
        }
        Ok(message_from_value(rows.remove(0))?)
    }

    /// Remove a message, and its stored attachment first when it has one.
    /// A failed object removal is logged and does not block the row
    /// deletion; the row is the source of truth.
    pub async fn delete(&self, chat_id: Uuid, message_id: Uuid, user_id: Uuid) -> Result<()> {
        let row = self
            .backend
            .table("messages")
            .select("sender_id, chat_id, media_url")
            .eq("id", message_id)
            .fetch_maybe()
            .await?
            .ok_or(ClientError::NotFound("message"))?;

        self.check_author_or_admin(chat_id, message_id, user_id)
            .await?;

        if let Some(media) = row["media_url"].as_str() {
            let path = object_path(media);
            if let Err(e) = self.backend.remove(UPLOADS_BUCKET, &[path]).await {
                warn!(error = %e, path, "attachment removal failed, deleting row anyway");
            }
        }

        self.backend
            .table("messages")
            .eq("id", message_id)
            .eq("chat_id", chat_id)
            .delete()
            .await?;
        Ok(())
    }

    /// Upload an attachment and record its metadata row. Returns the raw
    /// storage path; the store never sees a public URL.
    pub async fn upload_attachment(
        &self,
        user_id: Uuid,
        chat_id: Uuid,
        filename: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let path = format!("{}-{}-{}", user_id, Utc::now().timestamp_millis(), filename);

        self.backend
            .upload(UPLOADS_BUCKET, &path, bytes, content_type)
            .await?;

        self.backend
            .table("uploads")
            .insert(json!([{
                "user_id": user_id,
                "chat_id": chat_id,
                "file_url": path,
                "file_type": content_type,
            }]))
            .await?;

        Ok(path)
    }

    async fn check_author_or_admin(
        &self,
        chat_id: Uuid,
        message_id: Uuid,
        user_id: Uuid,
    ) -> Result<()> {
        let row = self
            .backend
            .table("messages")
            .select("sender_id")
            .eq("id", message_id)
            .fetch_maybe()
            .await?
            .ok_or(ClientError::NotFound("message"))?;

        let sender: Option<Uuid> = row["sender_id"].as_str().and_then(|s| s.parse().ok());
        if sender == Some(user_id) {
            return Ok(());
        }

        let membership = self
            .backend
            .table("chat_members")
            .select("role")
            .eq("chat_id", chat_id)
            .eq("user_id", user_id)
            .fetch_maybe()
            .await?;
        let is_admin = membership
            .as_ref()
            .and_then(|m| m["role"].as_str())
            .is_some_and(|role| role == "admin");
        if is_admin {
            Ok(())
        } else {
            Err(ClientError::Forbidden(
                "only the sender or a chat admin may do this",
            ))
        }
    }
}

/// Trimmed message text, `None` when nothing printable is left.
pub(crate) fn normalize_content(content: Option<&str>) -> Option<String> {
    let trimmed = content?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Storage path of an attachment reference. Tolerates full URLs from older
/// rows that stored the bucket-qualified form.
fn object_path(reference: &str) -> &str {
    match reference.split_once("/uploads/") {
        Some((_, rest)) => rest.split('?').next().unwrap_or(rest),
        None => reference,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_trimmed_or_rejected() {
        assert_eq!(normalize_content(Some("  hola  ")).as_deref(), Some("hola"));
        assert_eq!(normalize_content(Some("   ")), None);
        assert_eq!(normalize_content(None), None);
    }

    #[test]
    fn object_path_strips_bucket_prefix_and_query() {
        assert_eq!(object_path("u1-17-photo.png"), "u1-17-photo.png");
        assert_eq!(
            object_path("https://x.co/storage/v1/object/uploads/u1-17-photo.png?token=abc"),
            "u1-17-photo.png"
        );
    }
}

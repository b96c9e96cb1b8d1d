//! Lifecycle of one open conversation: the initial fetch, the optimistic
//! timeline, and the feed subscription keeping it current.
//!
//! The subscription handle lives inside the session: acquired when the
//! view opens, released when it closes or drops. Nothing here is global:
//! switching conversations drops one session and opens another, and the
//! old feed can no longer touch a list nobody displays.

use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use cove_backend::{ChangeKind, ChangeRecord, Subscription};
use cove_types::rows::message_from_value;
use cove_types::{Message, MessageChange};

use crate::chat::reconciler::{Draft, Reconciler};
use crate::error::{ClientError, Result};
use crate::services::MessageService;
use crate::services::messages::normalize_content;

const INITIAL_PAGE: u32 = 50;

/// Source of feed events for one conversation. Implemented by live
/// subscriptions and by plain channels in tests.
pub trait ChangeFeed: Send {
    fn next_change(&mut self) -> impl Future<Output = Option<ChangeRecord>> + Send;
}

impl ChangeFeed for Subscription {
    async fn next_change(&mut self) -> Option<ChangeRecord> {
        Subscription::next_change(self).await
    }
}

impl ChangeFeed for mpsc::Receiver<ChangeRecord> {
    async fn next_change(&mut self) -> Option<ChangeRecord> {
        self.recv().await
    }
}

pub struct ChatSession<F = Subscription> {
    chat_id: Uuid,
    viewer: Uuid,
    reconciler: Reconciler,
    feed: F,
}

impl ChatSession<Subscription> {
    /// Open a conversation: fetch the first page, seed the timeline,
    /// subscribe to the chat's change feed.
    pub async fn open(messages: &MessageService, chat_id: Uuid, viewer: Uuid) -> Result<Self> {
        let page = messages.fetch_page(chat_id, INITIAL_PAGE, 0).await?;
        let feed = messages
            .backend()
            .subscribe("messages", Some(&format!("chat_id=eq.{chat_id}")))
            .await?;
        let mut session = Self::attach(feed, chat_id, viewer);
        session.seed(page);
        Ok(session)
    }
}

impl<F: ChangeFeed> ChatSession<F> {
    /// Wire a session onto an already-established feed. The feed handle is
    /// owned by the session from here on.
    pub fn attach(feed: F, chat_id: Uuid, viewer: Uuid) -> Self {
        Self {
            chat_id,
            viewer,
            reconciler: Reconciler::new(),
            feed,
        }
    }

    pub fn chat_id(&self) -> Uuid {
        self.chat_id
    }

    /// The current list, oldest first, pending entries at the tail.
    pub fn messages(&self) -> &[Message] {
        self.reconciler.messages()
    }

    pub fn seed(&mut self, page: Vec<Message>) {
        self.reconciler.seed(page);
    }

    /// Await the next feed event and apply it, in delivery order. Returns
    /// false once the feed has ended. Malformed rows and events for other
    /// chats are absorbed, never raised.
    pub async fn pump(&mut self) -> bool {
        match self.feed.next_change().await {
            Some(record) => {
                self.apply_record(record);
                true
            }
            None => false,
        }
    }

    fn apply_record(&mut self, record: ChangeRecord) {
        let Some(change) = map_change(record) else {
            return;
        };
        if change.chat_id().is_some_and(|id| id != self.chat_id) {
            debug!(chat_id = %self.chat_id, "ignoring event for another chat");
            return;
        }
        self.reconciler.apply(change);
    }

    /// Optimistically append, then store. On a failed store the
    /// placeholder rolls back and the error surfaces to the caller;
    /// there is no automatic retry.
    pub async fn send(
        &mut self,
        messages: &MessageService,
        content: Option<&str>,
        media_path: Option<&str>,
    ) -> Result<Message> {
        let normalized = normalize_content(content);
        if normalized.is_none() && media_path.is_none() {
            return Err(ClientError::Validation(
                "a message needs text or an attachment",
            ));
        }

        let placeholder = self.reconciler.append_optimistic(Draft {
            chat_id: self.chat_id,
            sender_id: self.viewer,
            content: normalized,
            media_path: media_path.map(Into::into),
        });

        match messages
            .send(self.chat_id, self.viewer, content, media_path)
            .await
        {
            Ok(stored) => {
                // The store's returned row and the feed's insert carry the
                // same id; whichever arrives first settles the placeholder
                // and the other is absorbed as a duplicate.
                self.reconciler
                    .apply(MessageChange::Inserted(stored.clone()));
                Ok(stored)
            }
            Err(e) => {
                self.reconciler.cancel_optimistic(placeholder);
                Err(e)
            }
        }
    }

    /// Append a placeholder without writing to the store yet: the start
    /// of a send whose attachment is still uploading. Settle it through
    /// the feed or roll it back with [`ChatSession::cancel`].
    pub fn append_optimistic(&mut self, draft: Draft) -> cove_types::MessageId {
        self.reconciler.append_optimistic(draft)
    }

    /// Roll back a pending entry whose upload or send failed out-of-band.
    pub fn cancel(&mut self, id: cove_types::MessageId) -> bool {
        self.reconciler.cancel_optimistic(id)
    }

    /// Tear down the feed. Dropping the session does the same; after
    /// either, no further event mutates this list.
    pub fn close(self) {}
}

/// Map a wire record onto the typed timeline change. `None` absorbs
/// malformed rows: logged, never thrown.
fn map_change(record: ChangeRecord) -> Option<MessageChange> {
    match record.kind {
        ChangeKind::Insert | ChangeKind::Update => match message_from_value(record.record) {
            Ok(message) => Some(match record.kind {
                ChangeKind::Insert => MessageChange::Inserted(message),
                _ => MessageChange::Updated(message),
            }),
            Err(e) => {
                warn!(error = %e, "malformed feed row");
                None
            }
        },
        ChangeKind::Delete => match record.old_record["id"].as_str().and_then(|s| s.parse().ok()) {
            Some(id) => Some(MessageChange::Deleted(id)),
            None => {
                warn!("delete event without a row id");
                None
            }
        },
    }
}

//! The authoritative in-memory view of one conversation's messages.
//!
//! Three inputs feed the timeline: the initial page fetch, locally
//! originated optimistic entries awaiting confirmation, and the live
//! change feed. The reconciler merges them into a single deduplicated
//! list ordered by `created_at`, with optimistic entries held at the tail
//! until their confirmed row arrives.
//!
//! Every operation is a no-op on "entry not found": the feed is
//! at-least-once and unordered across sources, so missing and duplicated
//! references are normal, not errors.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use cove_types::{Message, MessageChange, MessageId};

/// A locally originated message before server confirmation.
#[derive(Debug, Clone)]
pub struct Draft {
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub content: Option<String>,
    pub media_path: Option<String>,
}

#[derive(Debug, Default)]
pub struct Reconciler {
    timeline: Vec<Message>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current list, oldest first, pending entries at the tail.
    pub fn messages(&self) -> &[Message] {
        &self.timeline
    }

    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    /// Replace the settled portion of the timeline with a fetched page,
    /// ordered by `created_at` and deduplicated by server id. Pending
    /// entries survive: a view remount must not drop an in-flight send.
    /// Seeding the same page twice leaves the list unchanged.
    pub fn seed(&mut self, mut page: Vec<Message>) {
        page.retain(|m| !m.is_pending());
        page.sort_by_key(|m| m.created_at);

        let mut seen = HashSet::new();
        page.retain(|m| match m.id.server_id() {
            Some(id) => seen.insert(id),
            None => false,
        });

        let pending: Vec<Message> = self
            .timeline
            .drain(..)
            .filter(Message::is_pending)
            .collect();
        self.timeline = page;
        self.timeline.extend(pending);
    }

    /// Append an optimistic entry and return its local id, used later to
    /// roll the entry back if the send fails. The entry is visible
    /// immediately; the backend write may take unbounded time.
    pub fn append_optimistic(&mut self, draft: Draft) -> MessageId {
        let id = MessageId::fresh_local();
        self.timeline.push(Message {
            id,
            chat_id: draft.chat_id,
            sender_id: draft.sender_id,
            content: draft.content,
            media_path: draft.media_path,
            created_at: Utc::now(),
            updated_at: None,
            read: false,
        });
        id
    }

    /// Remove a pending entry whose send failed. False when the id is
    /// unknown or already settled.
    pub fn cancel_optimistic(&mut self, id: MessageId) -> bool {
        if id.server_id().is_some() {
            return false;
        }
        match self.timeline.iter().position(|m| m.id == id) {
            Some(pos) => {
                self.timeline.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Apply one feed change. Changes must arrive in delivery order; each
    /// variant is idempotent.
    pub fn apply(&mut self, change: MessageChange) {
        match change {
            MessageChange::Inserted(row) => self.insert_settled(row),
            MessageChange::Updated(row) => self.update_settled(row),
            MessageChange::Deleted(id) => self.remove_settled(id),
        }
    }

    fn insert_settled(&mut self, row: Message) {
        let Some(server_id) = row.id.server_id() else {
            return;
        };
        if self.position_of(server_id).is_some() {
            debug!(%server_id, "duplicate insert ignored");
            return;
        }

        // Settle the most recent unmatched optimistic entry from the same
        // sender. Matching is by sender identity only (no correlation id
        // reaches the server), so rapid sends from one sender can settle
        // against the wrong placeholder; the confirmed row wins either way.
        if let Some(pos) = self
            .timeline
            .iter()
            .rposition(|m| m.is_pending() && m.sender_id == row.sender_id)
        {
            self.timeline.remove(pos);
        }

        let pos = self.settled_insert_pos(row.created_at);
        self.timeline.insert(pos, row);
    }

    fn update_settled(&mut self, row: Message) {
        let Some(server_id) = row.id.server_id() else {
            return;
        };
        match self.position_of(server_id) {
            Some(pos) => {
                let entry = &mut self.timeline[pos];
                entry.content = row.content;
                entry.media_path = row.media_path;
                entry.updated_at = row.updated_at;
                entry.read = row.read;
            }
            None => debug!(%server_id, "update for absent message ignored"),
        }
    }

    fn remove_settled(&mut self, id: Uuid) {
        match self.position_of(id) {
            Some(pos) => {
                self.timeline.remove(pos);
            }
            None => debug!(%id, "delete for absent message ignored"),
        }
    }

    fn position_of(&self, server_id: Uuid) -> Option<usize> {
        self.timeline
            .iter()
            .position(|m| m.id == MessageId::Server(server_id))
    }

    /// Insertion point for a settled row: after the last settled entry
    /// with an earlier-or-equal timestamp, and always before the pending
    /// tail. Settled entries never reorder relative to each other.
    fn settled_insert_pos(&self, at: DateTime<Utc>) -> usize {
        let mut pos = self.timeline.len();
        while pos > 0 {
            let prev = &self.timeline[pos - 1];
            if prev.is_pending() || prev.created_at > at {
                pos -= 1;
            } else {
                break;
            }
        }
        pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn uuid(n: u8) -> Uuid {
        Uuid::from_u128(n as u128)
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap()
    }

    fn settled(id: u8, sender: u8, content: &str, minute: u32) -> Message {
        Message {
            id: MessageId::Server(uuid(id)),
            chat_id: uuid(99),
            sender_id: uuid(sender),
            content: Some(content.into()),
            media_path: None,
            created_at: at(minute),
            updated_at: None,
            read: false,
        }
    }

    fn draft(sender: u8, content: &str) -> Draft {
        Draft {
            chat_id: uuid(99),
            sender_id: uuid(sender),
            content: Some(content.into()),
            media_path: None,
        }
    }

    fn contents(r: &Reconciler) -> Vec<&str> {
        r.messages()
            .iter()
            .map(|m| m.content.as_deref().unwrap_or(""))
            .collect()
    }

    #[test]
    fn seeding_twice_is_idempotent() {
        let page = vec![settled(1, 1, "a", 1), settled(2, 2, "b", 2)];
        let mut r = Reconciler::new();
        r.seed(page.clone());
        r.seed(page);
        assert_eq!(r.len(), 2);
        assert_eq!(contents(&r), ["a", "b"]);
    }

    #[test]
    fn seed_sorts_and_dedupes() {
        let mut r = Reconciler::new();
        r.seed(vec![
            settled(2, 2, "b", 2),
            settled(1, 1, "a", 1),
            settled(2, 2, "b", 2),
        ]);
        assert_eq!(contents(&r), ["a", "b"]);
    }

    #[test]
    fn reseeding_keeps_pending_entries() {
        let mut r = Reconciler::new();
        r.seed(vec![settled(1, 1, "a", 1)]);
        r.append_optimistic(draft(1, "hi"));

        r.seed(vec![settled(1, 1, "a", 1), settled(2, 2, "b", 2)]);
        assert_eq!(contents(&r), ["a", "b", "hi"]);
        assert!(r.messages()[2].is_pending());
    }

    #[test]
    fn optimistic_and_confirmed_coalesce_to_one_entry() {
        let mut r = Reconciler::new();
        r.seed(vec![settled(1, 1, "a", 1), settled(2, 2, "b", 2)]);
        r.append_optimistic(draft(1, "hi"));
        assert_eq!(contents(&r), ["a", "b", "hi"]);

        r.apply(MessageChange::Inserted(settled(3, 1, "hi", 3)));
        assert_eq!(r.len(), 3);
        assert_eq!(contents(&r), ["a", "b", "hi"]);
        assert!(!r.messages()[2].is_pending());
        assert_eq!(r.messages()[2].id, MessageId::Server(uuid(3)));
    }

    #[test]
    fn insert_from_another_sender_keeps_the_pending_entry() {
        let mut r = Reconciler::new();
        r.append_optimistic(draft(1, "mine"));
        r.apply(MessageChange::Inserted(settled(5, 2, "theirs", 1)));

        assert_eq!(r.len(), 2);
        assert_eq!(contents(&r), ["theirs", "mine"]);
        assert!(r.messages()[1].is_pending());
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut r = Reconciler::new();
        r.apply(MessageChange::Inserted(settled(1, 1, "a", 1)));
        r.apply(MessageChange::Inserted(settled(1, 1, "a", 1)));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn duplicate_insert_settles_at_most_one_pending() {
        let mut r = Reconciler::new();
        r.append_optimistic(draft(1, "one"));
        r.append_optimistic(draft(1, "two"));

        r.apply(MessageChange::Inserted(settled(1, 1, "two", 1)));
        r.apply(MessageChange::Inserted(settled(1, 1, "two", 1)));

        // One placeholder settled, the other still in flight.
        assert_eq!(r.len(), 2);
        assert_eq!(r.messages().iter().filter(|m| m.is_pending()).count(), 1);
    }

    #[test]
    fn rapid_sends_settle_one_placeholder_per_event() {
        let mut r = Reconciler::new();
        r.append_optimistic(draft(1, "one"));
        r.append_optimistic(draft(1, "two"));

        r.apply(MessageChange::Inserted(settled(1, 1, "one", 1)));
        r.apply(MessageChange::Inserted(settled(2, 1, "two", 2)));

        assert_eq!(r.len(), 2);
        assert!(r.messages().iter().all(|m| !m.is_pending()));
    }

    #[test]
    fn update_edits_only_the_matching_entry() {
        let mut r = Reconciler::new();
        r.seed(vec![settled(1, 1, "a", 1), settled(2, 2, "b", 2)]);

        let mut edited = settled(2, 2, "edited", 2);
        edited.updated_at = Some(at(5));
        r.apply(MessageChange::Updated(edited));

        assert_eq!(contents(&r), ["a", "edited"]);
        assert!(r.messages()[1].is_edited());
        assert!(!r.messages()[0].is_edited());
    }

    #[test]
    fn update_for_absent_id_is_a_noop() {
        let mut r = Reconciler::new();
        r.seed(vec![settled(1, 1, "a", 1)]);
        r.apply(MessageChange::Updated(settled(9, 1, "ghost", 1)));
        assert_eq!(contents(&r), ["a"]);
    }

    #[test]
    fn delete_is_idempotent() {
        let mut r = Reconciler::new();
        r.seed(vec![settled(1, 1, "a", 1), settled(2, 2, "b", 2)]);

        r.apply(MessageChange::Deleted(uuid(2)));
        assert_eq!(r.len(), 1);
        r.apply(MessageChange::Deleted(uuid(2)));
        assert_eq!(r.len(), 1);

        r.apply(MessageChange::Deleted(uuid(42)));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn out_of_order_insert_lands_between_settled_entries() {
        let mut r = Reconciler::new();
        r.seed(vec![settled(1, 1, "a", 1), settled(3, 1, "c", 3)]);
        r.append_optimistic(draft(2, "tail"));

        r.apply(MessageChange::Inserted(settled(2, 2, "b", 2)));
        assert_eq!(contents(&r), ["a", "b", "c", "tail"]);
    }

    #[test]
    fn cancel_removes_only_pending_entries() {
        let mut r = Reconciler::new();
        r.seed(vec![settled(1, 1, "a", 1)]);
        let temp = r.append_optimistic(draft(1, "hi"));

        assert!(r.cancel_optimistic(temp));
        assert_eq!(contents(&r), ["a"]);

        assert!(!r.cancel_optimistic(temp));
        assert!(!r.cancel_optimistic(MessageId::Server(uuid(1))));
        assert_eq!(r.len(), 1);
    }
}

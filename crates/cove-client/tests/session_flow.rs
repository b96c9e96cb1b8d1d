//! Integration test: drive a conversation session end-to-end over an
//! in-memory feed (seed, optimistic send, confirmation, edit, delete)
//! and verify the visible list after every step.

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use uuid::Uuid;

use cove_backend::{Backend, BackendConfig, ChangeKind, ChangeRecord};
use cove_client::chat::reconciler::Draft;
use cove_client::{ChatSession, MessageService};
use cove_types::rows::message_from_value;
use cove_types::{Message, MessageId};

const CHAT: Uuid = Uuid::from_u128(0xC0);
const ALICE: Uuid = Uuid::from_u128(0xA1);
const BOB: Uuid = Uuid::from_u128(0xB0);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cove=debug".into()),
        )
        .try_init();
}

fn row(id: Uuid, sender: Uuid, content: &str, minute: u32) -> Value {
    json!({
        "id": id,
        "chat_id": CHAT,
        "sender_id": sender,
        "content": content,
        "created_at": Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap(),
        "updated_at": null,
        "read": false,
    })
}

fn page(rows: &[Value]) -> Vec<Message> {
    rows.iter()
        .map(|r| message_from_value(r.clone()).unwrap())
        .collect()
}

fn insert(record: Value) -> ChangeRecord {
    ChangeRecord {
        kind: ChangeKind::Insert,
        record,
        old_record: Value::Null,
    }
}

fn contents(session: &ChatSession<mpsc::Receiver<ChangeRecord>>) -> Vec<String> {
    session
        .messages()
        .iter()
        .map(|m| m.content.clone().unwrap_or_default())
        .collect()
}

#[tokio::test]
async fn conversation_lifecycle() {
    init_tracing();

    let (tx, rx) = mpsc::channel(32);
    let mut session = ChatSession::attach(rx, CHAT, ALICE);

    // Initial page, twice; a remount must not duplicate anything.
    let m1 = Uuid::from_u128(1);
    let m2 = Uuid::from_u128(2);
    let initial = [row(m1, BOB, "hey", 1), row(m2, ALICE, "hi bob", 2)];
    session.seed(page(&initial));
    session.seed(page(&initial));
    assert_eq!(contents(&session), ["hey", "hi bob"]);

    // Optimistic entry shows up immediately at the tail.
    let placeholder = append_draft(&mut session, "are you around?");
    assert_eq!(session.messages().len(), 3);
    assert!(session.messages().last().unwrap().is_pending());

    // The feed confirms it: placeholder settles, count unchanged.
    let m3 = Uuid::from_u128(3);
    tx.send(insert(row(m3, ALICE, "are you around?", 3)))
        .await
        .unwrap();
    assert!(session.pump().await);
    assert_eq!(contents(&session), ["hey", "hi bob", "are you around?"]);
    assert!(session.messages().iter().all(|m| !m.is_pending()));

    // Duplicate delivery of the same insert is absorbed.
    tx.send(insert(row(m3, ALICE, "are you around?", 3)))
        .await
        .unwrap();
    assert!(session.pump().await);
    assert_eq!(session.messages().len(), 3);

    // The settled placeholder can no longer be cancelled.
    assert!(!session.cancel(placeholder));

    // An edit from the other side updates exactly one entry.
    let mut edited = row(m1, BOB, "hey!", 1);
    edited["updated_at"] = json!(Utc.with_ymd_and_hms(2026, 3, 1, 10, 9, 0).unwrap());
    tx.send(ChangeRecord {
        kind: ChangeKind::Update,
        record: edited,
        old_record: Value::Null,
    })
    .await
    .unwrap();
    assert!(session.pump().await);
    assert_eq!(contents(&session), ["hey!", "hi bob", "are you around?"]);
    assert!(session.messages()[0].is_edited());
    assert!(!session.messages()[1].is_edited());

    // Deletes are idempotent; an unknown id is a no-op.
    for _ in 0..2 {
        tx.send(ChangeRecord {
            kind: ChangeKind::Delete,
            record: Value::Null,
            old_record: json!({ "id": m2 }),
        })
        .await
        .unwrap();
        assert!(session.pump().await);
    }
    assert_eq!(contents(&session), ["hey!", "are you around?"]);

    // Feed torn down: pump reports the end, the list stays as-is.
    drop(tx);
    assert!(!session.pump().await);
    assert_eq!(session.messages().len(), 2);
}

#[tokio::test]
async fn failed_send_rolls_the_placeholder_back() {
    init_tracing();

    // Nothing listens on this port; the store write fails immediately.
    let backend = Backend::new(BackendConfig::new("http://127.0.0.1:9", "test-key").unwrap());
    let messages = MessageService::new(backend);

    let (_tx, rx) = mpsc::channel(8);
    let mut session = ChatSession::attach(rx, CHAT, ALICE);
    session.seed(page(&[row(Uuid::from_u128(1), BOB, "hey", 1)]));

    let result = session.send(&messages, Some("will not arrive"), None).await;
    assert!(result.is_err());
    assert_eq!(session.messages().len(), 1);
    assert!(session.messages().iter().all(|m| !m.is_pending()));
}

#[tokio::test]
async fn empty_send_is_rejected_before_any_append() {
    let backend = Backend::new(BackendConfig::new("http://127.0.0.1:9", "test-key").unwrap());
    let messages = MessageService::new(backend);

    let (_tx, rx) = mpsc::channel(8);
    let mut session = ChatSession::attach(rx, CHAT, ALICE);

    let result = session.send(&messages, Some("   "), None).await;
    assert!(result.is_err());
    assert!(session.messages().is_empty());
}

/// Start an optimistic entry the way `send` does, without the store write.
fn append_draft(
    session: &mut ChatSession<mpsc::Receiver<ChangeRecord>>,
    content: &str,
) -> MessageId {
    session.append_optimistic(Draft {
        chat_id: CHAT,
        sender_id: ALICE,
        content: Some(content.into()),
        media_path: None,
    })
}

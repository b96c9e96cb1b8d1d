//! Realtime change-feed subscriptions.
//!
//! One subscription covers one relation (optionally filtered) and delivers
//! row-level insert/update/delete records in arrival order. Delivery is
//! at-least-once: duplicates are possible and consumers must absorb them.
//! The [`Subscription`] handle owns the socket task; dropping it tears the
//! feed down so no event can outlive the view that asked for it.

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, warn};

use crate::Backend;
use crate::error::Result;

const HEARTBEAT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(25);
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level change, still untyped. `record` is the new row for
/// inserts and updates; deletes only carry the identifying columns in
/// `old_record`.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub record: Value,
    pub old_record: Value,
}

/// Live handle to one subscription.
///
/// Events arrive in delivery order through [`Subscription::next_change`].
/// Dropping the handle aborts the socket task, which closes the connection
/// and ends delivery. The handle is meant to be owned by the view that
/// opened it, acquired on open and released on close.
pub struct Subscription {
    events: mpsc::Receiver<ChangeRecord>,
    task: tokio::task::JoinHandle<()>,
}

impl Subscription {
    /// The next change, in delivery order. `None` once the feed is closed
    /// or the socket is lost.
    pub async fn next_change(&mut self) -> Option<ChangeRecord> {
        self.events.recv().await
    }

    pub fn close(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Backend {
    /// Subscribe to row changes on `relation`, optionally narrowed by a
    /// filter expression such as `"chat_id=eq.<uuid>"`.
    pub async fn subscribe(&self, relation: &str, filter: Option<&str>) -> Result<Subscription> {
        let (socket, _) = tokio_tungstenite::connect_async(self.config().realtime_url()).await?;
        let (mut ws_tx, ws_rx) = socket.split();

        let topic = match filter {
            Some(f) => format!("realtime:public:{relation}:{f}"),
            None => format!("realtime:public:{relation}"),
        };
        let join = json!({
            "topic": topic,
            "event": "phx_join",
            "payload": {
                "config": {
                    "postgres_changes": [{
                        "event": "*",
                        "schema": "public",
                        "table": relation,
                        "filter": filter,
                    }],
                },
            },
            "ref": "1",
        });
        ws_tx.send(WsMessage::Text(join.to_string())).await?;
        debug!(%topic, "joined realtime topic");

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let task = tokio::spawn(run_feed(ws_tx, ws_rx, topic, event_tx));

        Ok(Subscription {
            events: event_rx,
            task,
        })
    }
}

/// Pump the socket: answer heartbeats, decode change events, forward them
/// in order. Ends when either side of the socket or the consumer goes away.
async fn run_feed<S, R>(
    mut ws_tx: S,
    mut ws_rx: R,
    topic: String,
    events: mpsc::Sender<ChangeRecord>,
) where
    S: Sink<WsMessage, Error = WsError> + Unpin,
    R: Stream<Item = std::result::Result<WsMessage, WsError>> + Unpin,
{
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut heartbeat_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let beat = json!({
                    "topic": "phoenix",
                    "event": "heartbeat",
                    "payload": {},
                    "ref": heartbeat_ref.to_string(),
                });
                heartbeat_ref += 1;
                if let Err(e) = ws_tx.send(WsMessage::Text(beat.to_string())).await {
                    warn!(error = %e, %topic, "heartbeat failed, closing feed");
                    break;
                }
            }
            incoming = ws_rx.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Some(change) = decode_change(&text, &topic) {
                        if events.send(change).await.is_err() {
                            // Consumer dropped the subscription handle.
                            break;
                        }
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, %topic, "feed socket failed");
                    break;
                }
                None => {
                    debug!(%topic, "feed socket closed");
                    break;
                }
            }
        }
    }
}

/// Decode one socket frame into a change record. Control frames
/// (`phx_reply`, heartbeat acks) and frames for other topics yield `None`.
fn decode_change(text: &str, topic: &str) -> Option<ChangeRecord> {
    let frame: Value = serde_json::from_str(text).ok()?;
    if frame["topic"].as_str() != Some(topic) {
        return None;
    }
    if frame["event"].as_str() != Some("postgres_changes") {
        return None;
    }

    let data = &frame["payload"]["data"];
    let kind = match data["type"].as_str()? {
        "INSERT" => ChangeKind::Insert,
        "UPDATE" => ChangeKind::Update,
        "DELETE" => ChangeKind::Delete,
        other => {
            debug!(other, "unrecognized change type");
            return None;
        }
    };

    Some(ChangeRecord {
        kind,
        record: data["record"].clone(),
        old_record: data["old_record"].clone(),
    })
}

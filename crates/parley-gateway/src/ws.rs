// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler: handshake, room membership, message ingress, event
//! egress.
//!
//! Connection query: `role` (`customer` | `agent`), `token`, `displayName`,
//! optional `conversationId`, optional `fingerprint` (customer), optional
//! `scope=queue` (agent).
//!
//! Client -> Server (JSON):
//! ```json
//! {"event": "chat:message", "ack": "1", "data": {"conversationId": "...", "content": "hi", "type": "TEXT"}}
//! ```
//!
//! Server -> Client (JSON):
//! ```json
//! {"event": "system:event", "data": {"participant": {...}, "conversation": {...}}}
//! {"event": "chat:message", "data": {...message...}}
//! {"event": "queue:snapshot", "data": [ ...entries... ]}
//! {"event": "system:error", "data": {"message": "..."}}
//! {"event": "ack", "ack": "1", "data": {...message or error...}}
//! ```

use std::str::FromStr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use parley_core::types::{Conversation, MessageType, Participant};
use parley_core::ChatError;

use crate::rooms::RoomMessage;
use crate::server::GatewayState;

/// WebSocket event names.
pub mod events {
    pub const MESSAGE: &str = "chat:message";
    pub const SYSTEM: &str = "system:event";
    pub const ERROR: &str = "system:error";
    pub const QUEUE_SNAPSHOT: &str = "queue:snapshot";
    pub const ACK: &str = "ack";
}

/// Handshake query parameters.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub role: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// A frame from the client.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    event: String,
    #[serde(default)]
    ack: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

/// Payload of an inbound `chat:message`. The sender is NOT part of the
/// payload: identity is bound at handshake and read from session state.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePayload {
    conversation_id: String,
    content: String,
    #[serde(default)]
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HandshakePayload<'a> {
    participant: &'a Participant,
    conversation: &'a Conversation,
}

pub(crate) fn frame(event: &str, data: impl Serialize) -> String {
    serde_json::json!({ "event": event, "data": data }).to_string()
}

fn ack_frame(ack: &str, data: impl Serialize) -> String {
    serde_json::json!({ "event": events::ACK, "ack": ack, "data": data }).to_string()
}

fn error_frame(message: &str) -> String {
    frame(events::ERROR, serde_json::json!({ "message": message }))
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<GatewayState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

enum Established {
    /// An agent watching the shared queue.
    Queue { participant: Participant },
    /// A participant joined to one conversation's room.
    Room {
        participant: Participant,
        conversation: Box<Conversation>,
    },
}

async fn handle_socket(socket: WebSocket, state: GatewayState, params: ConnectParams) {
    let (mut ws_tx, ws_rx) = socket.split();

    match establish(&state, &params).await {
        Ok(Established::Queue { participant }) => {
            queue_session(&state, ws_tx, ws_rx, participant).await;
        }
        Ok(Established::Room {
            participant,
            conversation,
        }) => {
            room_session(&state, ws_tx, ws_rx, participant, *conversation).await;
        }
        Err(e) => {
            warn!(error = %e, "handshake rejected");
            let _ = ws_tx.send(Message::Text(error_frame(&e.to_string()).into())).await;
            let _ = ws_tx.close().await;
        }
    }
}

/// Resolve identity and the session's target from the handshake query.
async fn establish(
    state: &GatewayState,
    params: &ConnectParams,
) -> Result<Established, ChatError> {
    let is_agent = params.role.eq_ignore_ascii_case("agent");
    if !is_agent && !params.role.eq_ignore_ascii_case("customer") {
        return Err(ChatError::InvalidArgument(format!(
            "unknown role {:?}",
            params.role
        )));
    }

    let participant = if is_agent {
        state
            .identity
            .resolve_agent(params.token.as_deref(), params.display_name.as_deref())?
    } else {
        state.identity.resolve_customer(
            params.token.as_deref(),
            params.fingerprint.as_deref(),
            params.display_name.as_deref(),
        )?
    };

    let wants_queue = params.scope.as_deref() == Some("queue");
    if is_agent && wants_queue && params.conversation_id.is_none() {
        return Ok(Established::Queue { participant });
    }

    let conversation = match &params.conversation_id {
        Some(conversation_id) => {
            let conversation = state
                .coordinator
                .conversation(conversation_id)
                .await?
                .ok_or_else(|| ChatError::NotFound(conversation_id.clone()))?;
            if conversation.is_closed() {
                return Err(ChatError::AlreadyClosed(conversation_id.clone()));
            }
            conversation
        }
        None if is_agent => {
            return Err(ChatError::InvalidArgument(
                "agents must join with a conversationId".into(),
            ))
        }
        None => {
            state
                .coordinator
                .start(participant.clone(), Default::default())
                .await?
        }
    };

    Ok(Established::Room {
        participant,
        conversation: Box::new(conversation),
    })
}

/// Session loop for an agent-queue watcher: replay a snapshot on connect,
/// then forward every broadcast until disconnect.
async fn queue_session(
    state: &GatewayState,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut ws_rx: futures::stream::SplitStream<WebSocket>,
    participant: Participant,
) {
    let _ = state.coordinator.presence().mark_present(&participant.id).await;

    let max_entries = state.coordinator.config().queue.broadcast_max_entries;
    match state.coordinator.queue_snapshot(max_entries).await {
        Ok(entries) => {
            if ws_tx
                .send(Message::Text(frame(events::QUEUE_SNAPSHOT, &entries).into()))
                .await
                .is_err()
            {
                return;
            }
        }
        Err(e) => warn!(error = %e, "initial queue snapshot failed"),
    }

    let mut snapshots = state.rooms.queue_subscribe();
    info!(agent_id = %participant.id, "agent queue session connected");

    loop {
        tokio::select! {
            snapshot = snapshots.recv() => match snapshot {
                Ok(payload) => {
                    if ws_tx.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    debug!(dropped = n, "queue watcher lagged; next snapshot supersedes");
                }
                Err(_) => break,
            },
            inbound = ws_rx.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // queue sessions are egress-only
                Some(Err(_)) => break,
            },
        }
    }

    let _ = state.coordinator.presence().mark_absent(&participant.id).await;
    info!(agent_id = %participant.id, "agent queue session disconnected");
}

/// Session loop for a conversation room member.
async fn room_session(
    state: &GatewayState,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut ws_rx: futures::stream::SplitStream<WebSocket>,
    participant: Participant,
    conversation: Conversation,
) {
    let session_id = uuid::Uuid::new_v4().to_string();
    let conversation_id = conversation.id.clone();

    state
        .sessions
        .participants
        .insert(session_id.clone(), participant.clone());
    state
        .sessions
        .conversations
        .insert(session_id.clone(), conversation_id.clone());
    let _ = state.coordinator.presence().mark_present(&participant.id).await;

    let mut room_rx = state.rooms.join(&conversation_id);

    let handshake = frame(
        events::SYSTEM,
        HandshakePayload {
            participant: &participant,
            conversation: &conversation,
        },
    );
    if ws_tx.send(Message::Text(handshake.into())).await.is_err() {
        teardown(state, &session_id, &participant, &conversation_id).await;
        return;
    }

    // Outbound channel for acks; room frames and acks funnel through one
    // sender task so per-session delivery order is preserved.
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(64);

    let sender_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                room = room_rx.recv() => match room {
                    Ok(RoomMessage::Frame(payload)) => {
                        if ws_tx.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(RoomMessage::Close) => {
                        let _ = ws_tx.close().await;
                        break;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(dropped = n, "room member lagged, frames dropped");
                    }
                    Err(_) => break,
                },
                ack = outbound_rx.recv() => match ack {
                    Some(payload) => {
                        if ws_tx.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    info!(
        session_id = %session_id,
        participant_id = %participant.id,
        conversation_id = %conversation_id,
        "client joined room"
    );

    while let Some(Ok(message)) = ws_rx.next().await {
        match message {
            Message::Text(text) => {
                let text_str: &str = &text;
                let inbound: InboundFrame = match serde_json::from_str(text_str) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, "invalid websocket frame");
                        continue;
                    }
                };
                if inbound.event != events::MESSAGE {
                    debug!(event = %inbound.event, "ignoring unknown inbound event");
                    continue;
                }
                handle_chat_message(state, &session_id, inbound, &outbound_tx).await;
            }
            Message::Close(_) => break,
            _ => {} // Ignore binary, ping (handled by the protocol layer)
        }
    }

    sender_task.abort();
    teardown(state, &session_id, &participant, &conversation_id).await;
    info!(session_id = %session_id, "client disconnected");
}

/// Run one inbound `chat:message` through the coordinator and ack the result.
async fn handle_chat_message(
    state: &GatewayState,
    session_id: &str,
    inbound: InboundFrame,
    outbound_tx: &mpsc::Sender<String>,
) {
    // Identity comes from the session binding, never the payload.
    let Some(sender) = state
        .sessions
        .participants
        .get(session_id)
        .map(|p| p.value().clone())
    else {
        return;
    };

    let result = async {
        let payload: MessagePayload = serde_json::from_value(inbound.data)
            .map_err(|e| ChatError::InvalidArgument(format!("malformed message payload: {e}")))?;
        let kind = match payload.kind.as_deref() {
            None => MessageType::Text,
            Some(raw) => MessageType::from_str(&raw.to_uppercase())
                .map_err(|_| ChatError::InvalidArgument(format!("unknown message type {raw:?}")))?,
        };
        state
            .coordinator
            .send_message(&payload.conversation_id, sender, &payload.content, kind)
            .await
    }
    .await;

    let Some(ack_id) = inbound.ack else {
        if let Err(e) = result {
            warn!(error = %e, "unacked message send failed");
        }
        return;
    };

    let payload = match result {
        Ok(message) => ack_frame(&ack_id, &message),
        Err(e) => ack_frame(&ack_id, serde_json::json!({ "error": e.to_string() })),
    };
    let _ = outbound_tx.send(payload).await;
}

/// Remove all traces of a session. Idempotent.
async fn teardown(
    state: &GatewayState,
    session_id: &str,
    participant: &Participant,
    conversation_id: &str,
) {
    state.sessions.participants.remove(session_id);
    state.sessions.conversations.remove(session_id);
    let _ = state.coordinator.presence().mark_absent(&participant.id).await;
    state.rooms.prune(conversation_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_params_deserialize_from_query_names() {
        let params: ConnectParams = serde_json::from_str(
            r#"{
                "role": "customer",
                "token": "cust-7",
                "displayName": "Casey",
                "fingerprint": "fp-1"
            }"#,
        )
        .unwrap();
        assert_eq!(params.role, "customer");
        assert_eq!(params.token.as_deref(), Some("cust-7"));
        assert_eq!(params.display_name.as_deref(), Some("Casey"));
        assert!(params.conversation_id.is_none());
        assert!(params.scope.is_none());
    }

    #[test]
    fn inbound_frame_parses_with_and_without_ack() {
        let with_ack: InboundFrame = serde_json::from_str(
            r#"{"event":"chat:message","ack":"7","data":{"conversationId":"c-1","content":"hi"}}"#,
        )
        .unwrap();
        assert_eq!(with_ack.event, "chat:message");
        assert_eq!(with_ack.ack.as_deref(), Some("7"));

        let without: InboundFrame =
            serde_json::from_str(r#"{"event":"chat:message","data":{}}"#).unwrap();
        assert!(without.ack.is_none());
    }

    #[test]
    fn message_payload_defaults_type() {
        let payload: MessagePayload =
            serde_json::from_str(r#"{"conversationId":"c-1","content":"hi"}"#).unwrap();
        assert_eq!(payload.conversation_id, "c-1");
        assert!(payload.kind.is_none());

        let typed: MessagePayload = serde_json::from_str(
            r#"{"conversationId":"c-1","content":"hi","type":"TEXT"}"#,
        )
        .unwrap();
        assert_eq!(typed.kind.as_deref(), Some("TEXT"));
    }

    #[test]
    fn frames_have_the_wire_shape() {
        let f = frame(events::SYSTEM, serde_json::json!({"ok": true}));
        let value: serde_json::Value = serde_json::from_str(&f).unwrap();
        assert_eq!(value["event"], "system:event");
        assert_eq!(value["data"]["ok"], true);

        let a = ack_frame("3", serde_json::json!({"error": "closed"}));
        let value: serde_json::Value = serde_json::from_str(&a).unwrap();
        assert_eq!(value["event"], "ack");
        assert_eq!(value["ack"], "3");

        let e = error_frame("boom");
        let value: serde_json::Value = serde_json::from_str(&e).unwrap();
        assert_eq!(value["event"], "system:error");
        assert_eq!(value["data"]["message"], "boom");
    }
}

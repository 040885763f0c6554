// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customer-facing REST handlers.
//!
//! The websocket is the primary surface; these endpoints cover conversation
//! bootstrap, history tails, and a REST fallback send for clients that
//! cannot hold a socket open.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use parley_core::types::{
    ChatMessage, Conversation, MessageType, Participant, ParticipantType,
};
use parley_core::ChatError;

use crate::error::ApiError;
use crate::server::GatewayState;

const PARTICIPANT_ID_HEADER: &str = "x-participant-id";
const PARTICIPANT_NAME_HEADER: &str = "x-participant-name";

/// Request body for POST /api/conversations.
#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// Response body for POST /api/conversations/{id}/queue.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub conversation_id: String,
    pub status: parley_core::types::ConversationStatus,
    pub position: i64,
}

/// Request body for POST /api/conversations/{id}/queue.
#[derive(Debug, Deserialize)]
pub struct QueueRequest {
    pub channel: String,
}

/// Query for GET messages.
#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Request body for the REST fallback send.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub sender_id: String,
    #[serde(default)]
    pub sender_display_name: Option<String>,
    pub sender_type: String,
    pub content: String,
    #[serde(default)]
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// POST /api/conversations
///
/// Starts a conversation for the participant named by the
/// `X-Participant-Id` / `X-Participant-Name` headers.
pub async fn start_conversation(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Option<Json<StartRequest>>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let customer = customer_from_headers(&state, &headers)?;
    let attributes = body.map(|Json(b)| b.attributes).unwrap_or_default();
    let conversation = state.coordinator.start(customer, attributes).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

/// POST /api/conversations/{id}/queue
pub async fn queue_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<QueueRequest>,
) -> Result<Json<QueueStatus>, ApiError> {
    let conversation = state.coordinator.queue_for_agent(&id, &body.channel).await?;
    let position = state.coordinator.queue_engine().position(&id).await?;
    Ok(Json(QueueStatus {
        conversation_id: conversation.id,
        status: conversation.status,
        position,
    }))
}

/// GET /api/conversations/{id}/messages?limit=N
pub async fn get_messages(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let messages = state.coordinator.recent_messages(&id, query.limit).await?;
    Ok(Json(messages))
}

/// POST /api/conversations/{id}/messages
///
/// REST fallback send. The sender is described in the body; SYSTEM is
/// rejected at this boundary.
pub async fn post_message(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<SendRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    let sender_type = ParticipantType::from_str(&body.sender_type.to_uppercase())
        .map_err(|_| ChatError::InvalidArgument(format!("unknown sender type {:?}", body.sender_type)))?;
    if sender_type == ParticipantType::System {
        return Err(ChatError::InvalidArgument(
            "system messages are authored by the coordinator only".into(),
        )
        .into());
    }

    let kind = match body.kind.as_deref() {
        None => MessageType::Text,
        Some(raw) => MessageType::from_str(&raw.to_uppercase())
            .map_err(|_| ChatError::InvalidArgument(format!("unknown message type {raw:?}")))?,
    };

    let sender = Participant {
        id: body.sender_id.clone(),
        kind: sender_type,
        display_name: body
            .sender_display_name
            .clone()
            .unwrap_or_else(|| body.sender_id.clone()),
        attributes: HashMap::new(),
    };

    let message = state
        .coordinator
        .send_message(&id, sender, &body.content, kind)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// DELETE /api/conversations/{id}
///
/// Close by customer.
pub async fn close_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Conversation>, ApiError> {
    let customer = customer_from_headers(&state, &headers)?;
    let conversation = state.coordinator.close(&id, Some(&customer)).await?;
    Ok(Json(conversation))
}

fn customer_from_headers(
    state: &GatewayState,
    headers: &HeaderMap,
) -> Result<Participant, ApiError> {
    let id = headers
        .get(PARTICIPANT_ID_HEADER)
        .and_then(|v| v.to_str().ok());
    let name = headers
        .get(PARTICIPANT_NAME_HEADER)
        .and_then(|v| v.to_str().ok());
    Ok(state.identity.resolve_customer(id, None, name)?)
}

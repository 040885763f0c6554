// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent console REST handlers.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use parley_core::types::{ChatMessage, Conversation, ConversationStatus, QueueEntry};
use parley_core::ChatError;

use crate::error::ApiError;
use crate::server::GatewayState;

/// Query for GET /api/agent/queue.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub size: usize,
}

fn default_page_size() -> usize {
    20
}

/// Query for GET /api/agent/conversations.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationsQuery {
    pub agent_id: String,
    /// Comma-separated status filter, e.g. `ASSIGNED,CLOSED`.
    #[serde(default)]
    pub status: Option<String>,
}

/// Query carrying the acting agent for per-conversation reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentQuery {
    pub agent_id: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Request body for accept and close.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub agent_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// GET /api/agent/queue?page&size
pub async fn queue_snapshot(
    State(state): State<GatewayState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<QueueEntry>>, ApiError> {
    if query.size == 0 {
        return Ok(Json(Vec::new()));
    }
    let upto = state
        .coordinator
        .queue_snapshot(query.size.saturating_mul(query.page + 1))
        .await?;
    let page = upto
        .into_iter()
        .skip(query.page * query.size)
        .take(query.size)
        .collect();
    Ok(Json(page))
}

/// GET /api/agent/conversations?agentId&status
pub async fn list_conversations(
    State(state): State<GatewayState>,
    Query(query): Query<ConversationsQuery>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let statuses = parse_statuses(query.status.as_deref())?;
    let conversations = state
        .coordinator
        .conversations_for_agent(&query.agent_id, &statuses)
        .await?;
    Ok(Json(conversations))
}

/// POST /api/agent/conversations/{id}/accept
pub async fn accept_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<AgentRequest>,
) -> Result<Json<Conversation>, ApiError> {
    let agent = state
        .identity
        .resolve_agent(Some(&body.agent_id), body.display_name.as_deref())?;
    let conversation = state.coordinator.accept(agent, &id).await?;
    Ok(Json(conversation))
}

/// GET /api/agent/conversations/{id}/messages?agentId&limit
///
/// The tail is only readable by the owning agent.
pub async fn get_messages(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Query(query): Query<AgentQuery>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let conversation = state
        .coordinator
        .conversation(&id)
        .await?
        .ok_or_else(|| ChatError::NotFound(id.clone()))?;
    if !conversation.owned_by(&query.agent_id) {
        return Err(ApiError::forbidden(
            "conversation is not assigned to this agent",
        ));
    }

    let messages = state.coordinator.recent_messages(&id, query.limit).await?;
    Ok(Json(messages))
}

/// POST /api/agent/conversations/{id}/close
pub async fn close_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<AgentRequest>,
) -> Result<Json<Conversation>, ApiError> {
    let agent = state
        .identity
        .resolve_agent(Some(&body.agent_id), body.display_name.as_deref())?;
    let conversation = state.coordinator.close(&id, Some(&agent)).await?;
    Ok(Json(conversation))
}

fn parse_statuses(raw: Option<&str>) -> Result<Vec<ConversationStatus>, ApiError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            ConversationStatus::from_str(&s.to_uppercase()).map_err(|_| {
                ApiError::from(ChatError::InvalidArgument(format!("unknown status {s:?}")))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_defaults() {
        let query: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.page, 0);
        assert_eq!(query.size, 20);
    }

    #[test]
    fn statuses_parse_case_insensitively() {
        let statuses = parse_statuses(Some("assigned, CLOSED")).unwrap();
        assert_eq!(
            statuses,
            vec![ConversationStatus::Assigned, ConversationStatus::Closed]
        );
        assert!(parse_statuses(None).unwrap().is_empty());
        assert!(parse_statuses(Some("")).unwrap().is_empty());
        assert!(parse_statuses(Some("bogus")).is_err());
    }

    #[test]
    fn agent_request_deserializes() {
        let req: AgentRequest =
            serde_json::from_str(r#"{"agentId":"ag-1","displayName":"Avery"}"#).unwrap();
        assert_eq!(req.agent_id, "ag-1");
        assert_eq!(req.display_name.as_deref(), Some("Avery"));
    }
}

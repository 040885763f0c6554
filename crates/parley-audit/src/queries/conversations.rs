// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation snapshot upserts and reads.

use std::str::FromStr;

use rusqlite::params;

use parley_core::types::{Conversation, ConversationStatus};
use parley_core::ChatError;

use crate::database::Database;
use crate::queries::{fmt_ts, parse_json, parse_ts};

/// Upsert the current snapshot of a conversation.
pub async fn upsert_conversation(
    db: &Database,
    conversation: &Conversation,
) -> Result<(), ChatError> {
    let c = conversation.clone();
    db.connection()
        .call(move |conn| {
            let customer = serde_json::to_string(&c.customer)
                .map_err(|e| tokio_rusqlite::Error::Other(e.to_string().into()))?;
            let agent = c
                .agent
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| tokio_rusqlite::Error::Other(e.to_string().into()))?;
            let attributes = serde_json::to_string(&c.attributes)
                .map_err(|e| tokio_rusqlite::Error::Other(e.to_string().into()))?;
            conn.execute(
                "INSERT INTO conversations
                     (id, customer, agent, status, attributes,
                      created_at, accepted_at, closed_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                     agent = excluded.agent,
                     status = excluded.status,
                     attributes = excluded.attributes,
                     accepted_at = excluded.accepted_at,
                     closed_at = excluded.closed_at,
                     updated_at = excluded.updated_at",
                params![
                    c.id,
                    customer,
                    agent,
                    c.status.to_string(),
                    attributes,
                    fmt_ts(&c.created_at),
                    c.accepted_at.as_ref().map(fmt_ts),
                    c.closed_at.as_ref().map(fmt_ts),
                    fmt_ts(&c.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Read back one conversation snapshot.
pub async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, ChatError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, customer, agent, status, attributes,
                        created_at, accepted_at, closed_at, updated_at
                 FROM conversations WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![id])?;
            let Some(row) = rows.next()? else {
                return Ok(None);
            };

            let customer_raw: String = row.get(1)?;
            let agent_raw: Option<String> = row.get(2)?;
            let status_raw: String = row.get(3)?;
            let attributes_raw: String = row.get(4)?;
            let created_raw: String = row.get(5)?;
            let accepted_raw: Option<String> = row.get(6)?;
            let closed_raw: Option<String> = row.get(7)?;
            let updated_raw: String = row.get(8)?;

            let conversation = Conversation {
                id: row.get(0)?,
                customer: parse_json(&customer_raw)?,
                agent: agent_raw.as_deref().map(parse_json).transpose()?,
                status: ConversationStatus::from_str(&status_raw).map_err(|e| {
                    tokio_rusqlite::Error::Other(format!("bad status {status_raw:?}: {e}").into())
                })?,
                attributes: parse_json(&attributes_raw)?,
                created_at: parse_ts(&created_raw)?,
                accepted_at: accepted_raw.as_deref().map(parse_ts).transpose()?,
                closed_at: closed_raw.as_deref().map(parse_ts).transpose()?,
                updated_at: parse_ts(&updated_raw)?,
            };
            Ok(Some(conversation))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

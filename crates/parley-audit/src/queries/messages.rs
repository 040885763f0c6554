// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only message rows.

use std::str::FromStr;

use rusqlite::params;

use parley_core::types::{ChatMessage, MessageType};
use parley_core::ChatError;

use crate::database::Database;
use crate::queries::{fmt_ts, parse_json, parse_ts};

/// Append one message row.
pub async fn insert_message(db: &Database, message: &ChatMessage) -> Result<(), ChatError> {
    let m = message.clone();
    db.connection()
        .call(move |conn| {
            let sender = serde_json::to_string(&m.sender)
                .map_err(|e| tokio_rusqlite::Error::Other(e.to_string().into()))?;
            conn.execute(
                "INSERT INTO messages (id, conversation_id, sender, kind, content, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    m.id,
                    m.conversation_id,
                    sender,
                    m.kind.to_string(),
                    m.content,
                    fmt_ts(&m.timestamp),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Messages of a conversation in timestamp order.
pub async fn get_messages(
    db: &Database,
    conversation_id: &str,
    limit: Option<i64>,
) -> Result<Vec<ChatMessage>, ChatError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = match limit {
                Some(_) => {
                    "SELECT id, conversation_id, sender, kind, content, timestamp
                     FROM messages WHERE conversation_id = ?1
                     ORDER BY timestamp ASC, id ASC LIMIT ?2"
                }
                None => {
                    "SELECT id, conversation_id, sender, kind, content, timestamp
                     FROM messages WHERE conversation_id = ?1
                     ORDER BY timestamp ASC, id ASC"
                }
            };
            let mut stmt = conn.prepare(sql)?;
            let mut rows = match limit {
                Some(lim) => stmt.query(params![conversation_id, lim])?,
                None => stmt.query(params![conversation_id])?,
            };

            let mut messages = Vec::new();
            while let Some(row) = rows.next()? {
                let sender_raw: String = row.get(2)?;
                let kind_raw: String = row.get(3)?;
                let ts_raw: String = row.get(5)?;
                messages.push(ChatMessage {
                    id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    sender: parse_json(&sender_raw)?,
                    kind: MessageType::from_str(&kind_raw).map_err(|e| {
                        tokio_rusqlite::Error::Other(format!("bad kind {kind_raw:?}: {e}").into())
                    })?,
                    content: row.get(4)?,
                    timestamp: parse_ts(&ts_raw)?,
                });
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules for the audit schema.

pub mod conversations;
pub mod messages;

use chrono::{DateTime, SecondsFormat, Utc};

/// Render a timestamp in the fixed RFC 3339 microsecond form the schema
/// stores; lexicographic order equals chronological order.
pub(crate) fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp back.
pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>, tokio_rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| tokio_rusqlite::Error::Other(format!("bad timestamp {raw:?}: {e}").into()))
}

/// Decode a JSON column.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    raw: &str,
) -> Result<T, tokio_rusqlite::Error> {
    serde_json::from_str(raw)
        .map_err(|e| tokio_rusqlite::Error::Other(format!("bad json column: {e}").into()))
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley chat coordinator.

use thiserror::Error;

/// The primary error type used across all coordinator operations and seams.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The referenced conversation does not exist.
    #[error("conversation not found: {0}")]
    NotFound(String),

    /// A mutation was attempted on a CLOSED conversation.
    #[error("conversation already closed: {0}")]
    AlreadyClosed(String),

    /// Another agent holds the assignment for this conversation.
    #[error("conversation already assigned to another agent")]
    ConflictOwner,

    /// The queue entry vanished under the claimant (purged or never queued).
    #[error("conversation is no longer available to accept")]
    NoLongerAvailable,

    /// The agent is at its concurrent-conversation limit.
    #[error("agent reached maximum concurrent conversations")]
    AgentCapacityExceeded,

    /// Invalid caller input (empty content, oversize payload, bad enum, missing identity).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The per-conversation lock could not be acquired within the deadline.
    #[error("could not acquire lock {name} within {waited_ms}ms")]
    Contention { name: String, waited_ms: u64 },

    /// Identity resolution refused the presented credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Ephemeral store, audit store, or event bus failure.
    #[error("backend unavailable: {source}")]
    Backend {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },
}

impl ChatError {
    /// Wrap an arbitrary backend failure.
    pub fn backend<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ChatError::Backend {
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_variants_construct_and_display() {
        let errors: Vec<ChatError> = vec![
            ChatError::NotFound("c-1".into()),
            ChatError::AlreadyClosed("c-1".into()),
            ChatError::ConflictOwner,
            ChatError::NoLongerAvailable,
            ChatError::AgentCapacityExceeded,
            ChatError::InvalidArgument("empty content".into()),
            ChatError::Contention {
                name: "lock:conversation:c-1".into(),
                waited_ms: 5000,
            },
            ChatError::Unauthorized("missing token".into()),
            ChatError::backend(std::io::Error::other("connection reset")),
            ChatError::Config("bad toml".into()),
            ChatError::Timeout {
                duration: std::time::Duration::from_secs(5),
            },
        ];
        for err in &errors {
            assert!(!err.to_string().is_empty());
        }
    }

    #[test]
    fn contention_carries_lock_name() {
        let err = ChatError::Contention {
            name: "lock:queue".into(),
            waited_ms: 250,
        };
        assert!(err.to_string().contains("lock:queue"));
        assert!(err.to_string().contains("250"));
    }
}

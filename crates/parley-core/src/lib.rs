// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley chat coordinator.
//!
//! This crate provides the domain types, error taxonomy, lifecycle events,
//! key naming, and the seam traits for the ephemeral store and audit store.
//! All other workspace crates build on definitions here.

pub mod error;
pub mod event;
pub mod keys;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ChatError;
pub use event::{ChatEvent, ChatEventType, MessageEvent};
pub use keys::KeySpace;
pub use traits::{AuditStore, ClaimOutcome, EphemeralStore, LockGuard};
pub use types::{
    ChatMessage, Conversation, ConversationStatus, MessageType, Participant, ParticipantType,
    QueueEntry,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reexports_are_usable() {
        let keys = KeySpace::default();
        assert_eq!(keys.prefix(), "parley");
        let _err = ChatError::NoLongerAvailable;
        let _status = ConversationStatus::Open;
        let _outcome = ClaimOutcome::Missing;
    }
}

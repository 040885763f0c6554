// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Participant identity resolution at the boundary.
//!
//! Customers present a token and/or a device fingerprint; agents present an
//! opaque agent id. SYSTEM can never be minted here — it exists only for
//! coordinator-authored closure notices.

use std::collections::HashMap;

use parley_core::types::{Participant, ParticipantType};
use parley_core::ChatError;

const DEFAULT_CUSTOMER_NAME: &str = "Guest";

/// Resolves boundary credentials into participants.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver;

impl IdentityResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a customer from `token` and/or `fingerprint`.
    ///
    /// A token becomes the stable id; without one, a fingerprint-derived id
    /// keeps the same device on the same conversation across reconnects.
    pub fn resolve_customer(
        &self,
        token: Option<&str>,
        fingerprint: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<Participant, ChatError> {
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        let fingerprint = fingerprint.map(str::trim).filter(|f| !f.is_empty());

        let id = match (token, fingerprint) {
            (Some(token), _) => token.to_string(),
            (None, Some(fingerprint)) => format!("visitor-{fingerprint}"),
            (None, None) => {
                return Err(ChatError::Unauthorized(
                    "customer identity requires a token or device fingerprint".into(),
                ))
            }
        };

        let mut attributes = HashMap::new();
        if let Some(fingerprint) = fingerprint {
            attributes.insert("fingerprint".to_string(), fingerprint.to_string());
        }

        Ok(Participant {
            id,
            kind: ParticipantType::Customer,
            display_name: display_name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(DEFAULT_CUSTOMER_NAME)
                .to_string(),
            attributes,
        })
    }

    /// Resolve an agent from its opaque id.
    pub fn resolve_agent(
        &self,
        agent_id: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<Participant, ChatError> {
        let agent_id = agent_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ChatError::Unauthorized("agent identity requires a token".into()))?;

        Ok(Participant {
            id: agent_id.to_string(),
            kind: ParticipantType::Agent,
            display_name: display_name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(agent_id)
                .to_string(),
            attributes: HashMap::new(),
        })
    }
}

// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation lifecycle state machine.
//!
//! Every mutating transition runs under `lock:conversation:{id}` with a
//! bounded acquire timeout, keeping transitions of one conversation totally
//! ordered across gateway instances. The atomic claim in the queue engine is
//! the single point where ownership is decided. Audit writes happen inside
//! the transition, before any events are published, so a failed persist
//! aborts the transition cleanly.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use parley_bus::EventBus;
use parley_config::ParleyConfig;
use parley_core::event::{ChatEvent, ChatEventType, MessageEvent};
use parley_core::traits::store::LockGuard;
use parley_core::types::{
    ChatMessage, Conversation, ConversationStatus, MessageType, Participant, ParticipantType,
    QueueEntry,
};
use parley_core::{AuditStore, ChatError, EphemeralStore, KeySpace};

use crate::assignment::AssignmentRegistry;
use crate::presence::PresenceTracker;
use crate::queue::{ClaimStatus, QueueEngine};
use crate::repository::ConversationRepository;

/// Attribute key remembering the channel a conversation was last queued on,
/// so lease-expiry recovery can re-queue it on the same channel.
const CHANNEL_ATTRIBUTE: &str = "channel";

const DEFAULT_CHANNEL: &str = "web";

/// Composes the queue engine, assignment registry, repository, presence,
/// and event bus into the conversation lifecycle operations.
pub struct Coordinator {
    store: Arc<dyn EphemeralStore>,
    audit: Arc<dyn AuditStore>,
    bus: EventBus,
    keys: KeySpace,
    repository: ConversationRepository,
    queue: QueueEngine,
    registry: AssignmentRegistry,
    presence: PresenceTracker,
    config: ParleyConfig,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn EphemeralStore>,
        audit: Arc<dyn AuditStore>,
        bus: EventBus,
        config: ParleyConfig,
    ) -> Self {
        let keys = KeySpace::new(config.store.key_prefix.clone());
        Self {
            repository: ConversationRepository::new(
                store.clone(),
                keys.clone(),
                config.message.retention(),
            ),
            queue: QueueEngine::new(store.clone(), keys.clone()),
            registry: AssignmentRegistry::new(config.queue.per_agent_concurrency),
            presence: PresenceTracker::new(store.clone(), keys.clone(), config.presence.ttl()),
            store,
            audit,
            bus,
            keys,
            config,
        }
    }

    pub fn queue_engine(&self) -> &QueueEngine {
        &self.queue
    }

    pub fn registry(&self) -> &AssignmentRegistry {
        &self.registry
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    /// Create a new OPEN conversation for `customer`.
    pub async fn start(
        &self,
        customer: Participant,
        attributes: HashMap<String, String>,
    ) -> Result<Conversation, ChatError> {
        let conversation = Conversation::open(customer, attributes);
        let _guard = self.lock_conversation(&conversation.id).await?;

        self.repository.save(&conversation).await?;
        self.audit.record_conversation(&conversation).await?;
        self.presence.mark_present(&conversation.customer.id).await?;

        self.bus
            .publish_lifecycle(&ChatEvent::new(
                conversation.id.clone(),
                ChatEventType::ConversationStarted,
                serde_json::json!({ "customerId": conversation.customer.id }),
            ))
            .await;

        info!(
            conversation_id = %conversation.id,
            customer_id = %conversation.customer.id,
            "conversation started"
        );
        Ok(conversation)
    }

    /// Move a conversation into the shared agent queue.
    ///
    /// A still-live assignment is released first and the ex-owner is told via
    /// a reassignment event, so its console leaves the active view.
    pub async fn queue_for_agent(
        &self,
        conversation_id: &str,
        channel: &str,
    ) -> Result<Conversation, ChatError> {
        let _guard = self.lock_conversation(conversation_id).await?;
        let mut conversation = self.load(conversation_id).await?;

        if conversation.is_closed() {
            return Err(ChatError::AlreadyClosed(conversation_id.to_string()));
        }

        let previous_owner = self.release_assignment(conversation_id).await?;
        if let Some(previous_agent_id) = previous_owner {
            self.registry.remove(&previous_agent_id, conversation_id);
            self.bus
                .publish_lifecycle(&ChatEvent::new(
                    conversation_id.to_string(),
                    ChatEventType::ConversationReassigned,
                    serde_json::json!({ "previousAgentId": previous_agent_id }),
                ))
                .await;
            warn!(
                conversation_id,
                previous_agent_id = %previous_agent_id,
                "re-queued a conversation with a live assignment"
            );
        }

        let now = Utc::now();
        conversation.status = ConversationStatus::Queued;
        conversation.agent = None;
        conversation.updated_at = now;
        conversation
            .attributes
            .insert(CHANNEL_ATTRIBUTE.to_string(), channel.to_string());
        self.repository.save(&conversation).await?;
        self.audit.record_conversation(&conversation).await?;

        self.queue
            .enqueue(&QueueEntry {
                conversation_id: conversation.id.clone(),
                customer_id: conversation.customer.id.clone(),
                channel: channel.to_string(),
                enqueued_at: now,
            })
            .await?;

        let position = self.queue.position(conversation_id).await?;
        self.bus
            .publish_lifecycle(&ChatEvent::new(
                conversation_id.to_string(),
                ChatEventType::ConversationQueued,
                serde_json::json!({ "queuePosition": position }),
            ))
            .await;

        info!(conversation_id, channel, position, "conversation queued");
        Ok(conversation)
    }

    /// Claim a queued conversation for `agent`.
    ///
    /// Exactly one of a set of racing agents sees the assignment; the rest
    /// fail with [`ChatError::ConflictOwner`] or
    /// [`ChatError::NoLongerAvailable`]. Re-accepting an owned conversation
    /// is a lease-refreshing no-op.
    pub async fn accept(
        &self,
        agent: Participant,
        conversation_id: &str,
    ) -> Result<Conversation, ChatError> {
        if agent.kind != ParticipantType::Agent {
            return Err(ChatError::InvalidArgument(
                "only agents may accept conversations".into(),
            ));
        }

        let _guard = self.lock_conversation(conversation_id).await?;
        let mut conversation = self.load(conversation_id).await?;

        if conversation.is_closed() {
            return Err(ChatError::AlreadyClosed(conversation_id.to_string()));
        }
        if conversation.agent.is_some() && !conversation.owned_by(&agent.id) {
            return Err(ChatError::ConflictOwner);
        }

        let already_mine = conversation.owned_by(&agent.id);
        if already_mine && conversation.status == ConversationStatus::Assigned {
            // Idempotent re-accept: refresh the lease, make sure no stray
            // queue entry lingers, and keep the registry in sync.
            self.queue.remove(conversation_id).await?;
            self.extend_assignment(conversation_id).await?;
            self.registry.register(&agent.id, conversation_id);
            return Ok(conversation);
        }

        if !already_mine && !self.registry.can_assign(&agent.id) {
            return Err(ChatError::AgentCapacityExceeded);
        }

        if conversation.status != ConversationStatus::Queued {
            self.release_assignment(conversation_id).await?;
            return Err(ChatError::NoLongerAvailable);
        }

        let claim = self
            .queue
            .claim_for_agent(
                conversation_id,
                &agent.id,
                self.config.assignment.lease_ttl(),
            )
            .await?;

        match claim.status {
            ClaimStatus::Busy => Err(ChatError::ConflictOwner),
            ClaimStatus::Missing => {
                self.release_assignment(conversation_id).await?;
                Err(ChatError::NoLongerAvailable)
            }
            ClaimStatus::Owned => {
                self.extend_assignment(conversation_id).await?;
                self.registry.register(&agent.id, conversation_id);
                if conversation.agent.is_none() {
                    conversation.agent = Some(agent);
                }
                if conversation.status != ConversationStatus::Assigned {
                    let now = Utc::now();
                    conversation.status = ConversationStatus::Assigned;
                    conversation.updated_at = now;
                    if conversation.accepted_at.is_none() {
                        conversation.accepted_at = Some(now);
                    }
                    self.repository.save(&conversation).await?;
                    self.audit.record_conversation(&conversation).await?;
                }
                Ok(conversation)
            }
            ClaimStatus::Claimed => {
                let now = Utc::now();
                conversation.agent = Some(agent.clone());
                conversation.status = ConversationStatus::Assigned;
                conversation.accepted_at = Some(now);
                conversation.updated_at = now;

                self.repository.save(&conversation).await?;
                self.audit.record_conversation(&conversation).await?;
                self.registry.register(&agent.id, conversation_id);

                self.bus
                    .publish_lifecycle(&ChatEvent::new(
                        conversation_id.to_string(),
                        ChatEventType::ConversationAccepted,
                        serde_json::json!({ "agentId": agent.id }),
                    ))
                    .await;

                info!(conversation_id, agent_id = %agent.id, "conversation accepted");
                Ok(conversation)
            }
        }
    }

    /// Append a message from `sender`.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        sender: Participant,
        content: &str,
        kind: MessageType,
    ) -> Result<ChatMessage, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::InvalidArgument(
                "message content must not be empty".into(),
            ));
        }
        let max_bytes = self.config.message.max_bytes;
        if content.len() > max_bytes {
            return Err(ChatError::InvalidArgument(format!(
                "message content exceeds {max_bytes} bytes"
            )));
        }
        if kind == MessageType::System && sender.kind != ParticipantType::System {
            return Err(ChatError::InvalidArgument(
                "system messages are authored by the coordinator only".into(),
            ));
        }

        let _guard = self.lock_conversation(conversation_id).await?;
        let mut conversation = self.load(conversation_id).await?;
        if conversation.is_closed() {
            return Err(ChatError::AlreadyClosed(conversation_id.to_string()));
        }

        let message = ChatMessage::new(conversation_id, sender, kind, content);
        conversation.updated_at = message.timestamp;

        self.repository.append_message(&message).await?;
        self.repository.save(&conversation).await?;
        self.audit.record_message(&message).await?;
        self.audit.record_conversation(&conversation).await?;

        self.presence.mark_present(&message.sender.id).await?;
        if conversation.status == ConversationStatus::Assigned {
            self.extend_assignment(conversation_id).await?;
        }

        self.bus.publish_message(&MessageEvent::new(message.clone())).await;
        self.bus
            .publish_lifecycle(&ChatEvent::new(
                conversation_id.to_string(),
                ChatEventType::MessageReceived,
                serde_json::json!({ "senderId": message.sender.id }),
            ))
            .await;

        debug!(
            conversation_id,
            message_id = %message.id,
            sender_id = %message.sender.id,
            "message appended"
        );
        Ok(message)
    }

    /// Close a conversation. Closing an already-CLOSED conversation returns
    /// the current state without appending a second notice.
    pub async fn close(
        &self,
        conversation_id: &str,
        closed_by: Option<&Participant>,
    ) -> Result<Conversation, ChatError> {
        let _guard = self.lock_conversation(conversation_id).await?;
        let mut conversation = self.load(conversation_id).await?;

        if conversation.is_closed() {
            return Ok(conversation);
        }

        let now = Utc::now();
        let notice = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender: Participant::system(),
            kind: MessageType::System,
            content: resolve_closing_message(&conversation, closed_by),
            timestamp: now,
        };
        self.repository.append_message(&notice).await?;
        self.audit.record_message(&notice).await?;

        conversation.status = ConversationStatus::Closed;
        conversation.closed_at = Some(now);
        conversation.updated_at = now;
        self.repository.save(&conversation).await?;
        self.audit.record_conversation(&conversation).await?;

        self.queue.remove(conversation_id).await?;
        self.store
            .delete(&self.keys.assignment(conversation_id))
            .await?;
        if let Some(agent) = &conversation.agent {
            self.registry.remove(&agent.id, conversation_id);
        }

        self.bus.publish_message(&MessageEvent::new(notice)).await;
        self.bus
            .publish_lifecycle(&ChatEvent::new(
                conversation_id.to_string(),
                ChatEventType::ConversationClosed,
                serde_json::json!({
                    "closedBy": closed_by.map(|p| p.id.clone()).unwrap_or_else(|| "system".into()),
                    "status": conversation.status,
                }),
            ))
            .await;

        info!(
            conversation_id,
            closed_by = closed_by.map(|p| p.id.as_str()).unwrap_or("system"),
            "conversation closed"
        );
        Ok(conversation)
    }

    /// Fetch one conversation, falling back to the audit snapshot when the
    /// live record has aged out of the ephemeral store.
    pub async fn conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, ChatError> {
        if let Some(conversation) = self.repository.get(conversation_id).await? {
            return Ok(Some(conversation));
        }
        match self.audit.conversation(conversation_id).await? {
            Some(conversation) => {
                self.repository.save(&conversation).await?;
                Ok(Some(conversation))
            }
            None => Ok(None),
        }
    }

    /// The most recent `limit` messages of a conversation, in send order.
    pub async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        self.load(conversation_id).await?;
        self.repository.recent_messages(conversation_id, limit).await
    }

    /// An agent's conversations, newest-updated first, optionally filtered
    /// by status.
    pub async fn conversations_for_agent(
        &self,
        agent_id: &str,
        statuses: &[ConversationStatus],
    ) -> Result<Vec<Conversation>, ChatError> {
        if agent_id.trim().is_empty() {
            return Err(ChatError::InvalidArgument(
                "agent identifier is required".into(),
            ));
        }

        let mut conversations: Vec<Conversation> = self
            .repository
            .find_all()
            .await?
            .into_iter()
            .filter(|c| c.owned_by(agent_id))
            .filter(|c| statuses.is_empty() || statuses.contains(&c.status))
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    /// FIFO snapshot of the waiting queue.
    pub async fn queue_snapshot(&self, limit: usize) -> Result<Vec<QueueEntry>, ChatError> {
        self.queue.list(limit).await
    }

    /// Purge queue entries older than the configured age and close their
    /// conversations with a system notice. Returns the closed conversations.
    pub async fn purge_stale_queue(&self) -> Result<Vec<Conversation>, ChatError> {
        let age = self.config.queue.purge_age();
        if age.is_zero() {
            return Ok(Vec::new());
        }

        // Bulk maintenance holds the queue lock; individual claims do not.
        let _queue_guard = self
            .store
            .lock(
                &self.keys.queue_lock(),
                self.config.lock.acquire_timeout(),
                self.config.lock.lease_ttl(),
            )
            .await?;

        let stale = self.queue.purge_older_than(age).await?;
        let mut closed = Vec::with_capacity(stale.len());
        for entry in stale {
            match self.close(&entry.conversation_id, None).await {
                Ok(conversation) => {
                    info!(
                        conversation_id = %entry.conversation_id,
                        "stale queue entry purged and conversation closed"
                    );
                    closed.push(conversation);
                }
                Err(e) => warn!(
                    conversation_id = %entry.conversation_id,
                    error = %e,
                    "failed to close purged conversation"
                ),
            }
        }
        Ok(closed)
    }

    /// Re-queue conversations whose assignment lease expired while still
    /// marked ASSIGNED, and drop the stale registry entries.
    pub async fn recover_expired_assignments(&self) -> Result<Vec<Conversation>, ChatError> {
        let mut recovered = Vec::new();
        for (agent_id, conversation_ids) in self.registry.all() {
            for conversation_id in conversation_ids {
                let lease = self
                    .store
                    .get(&self.keys.assignment(&conversation_id))
                    .await?;
                if lease.is_some() {
                    continue;
                }

                self.registry.remove(&agent_id, &conversation_id);
                let Some(conversation) = self.repository.get(&conversation_id).await? else {
                    continue;
                };
                if conversation.status != ConversationStatus::Assigned {
                    continue;
                }

                let channel = conversation
                    .attributes
                    .get(CHANNEL_ATTRIBUTE)
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_CHANNEL.to_string());
                match self.queue_for_agent(&conversation_id, &channel).await {
                    Ok(requeued) => {
                        warn!(
                            conversation_id = %conversation_id,
                            agent_id = %agent_id,
                            "assignment lease expired, conversation re-queued"
                        );
                        recovered.push(requeued);
                    }
                    Err(e) => warn!(
                        conversation_id = %conversation_id,
                        error = %e,
                        "failed to re-queue conversation after lease expiry"
                    ),
                }
            }
        }
        Ok(recovered)
    }

    async fn load(&self, conversation_id: &str) -> Result<Conversation, ChatError> {
        self.conversation(conversation_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(conversation_id.to_string()))
    }

    async fn lock_conversation(&self, conversation_id: &str) -> Result<LockGuard, ChatError> {
        self.store
            .lock(
                &self.keys.conversation_lock(conversation_id),
                self.config.lock.acquire_timeout(),
                self.config.lock.lease_ttl(),
            )
            .await
    }

    async fn extend_assignment(&self, conversation_id: &str) -> Result<(), ChatError> {
        self.store
            .expire(
                &self.keys.assignment(conversation_id),
                self.config.assignment.lease_ttl(),
            )
            .await?;
        Ok(())
    }

    /// Delete the assignment lease, returning the previous owner if any.
    async fn release_assignment(
        &self,
        conversation_id: &str,
    ) -> Result<Option<String>, ChatError> {
        let key = self.keys.assignment(conversation_id);
        let owner = self.store.get(&key).await?;
        if owner.is_some() {
            self.store.delete(&key).await?;
        }
        Ok(owner)
    }
}

/// The closure notice shown to the room, worded for whoever ended the chat.
fn resolve_closing_message(
    conversation: &Conversation,
    closed_by: Option<&Participant>,
) -> String {
    if closed_by.is_some_and(|p| p.kind == ParticipantType::Customer) {
        return "You ended the chat".to_string();
    }

    let mut display_name = conversation
        .agent
        .as_ref()
        .map(|a| a.display_name.as_str())
        .filter(|n| !n.trim().is_empty());
    if let Some(closer) = closed_by {
        if closer.kind == ParticipantType::Agent && !closer.display_name.trim().is_empty() {
            display_name = Some(closer.display_name.as_str());
        }
    }

    match display_name {
        Some(name) => format!(
            "{name} has closed this chat. Feel free to start a new conversation if you need any more help."
        ),
        None => "This conversation has been closed. You can start a new chat anytime you need assistance."
            .to_string(),
    }
}

// ABOUTME: Agent orchestration: catalog, two-character selection, and gated start/stop requests.
// ABOUTME: Each mutating action holds a per-channel Pending flag that a drop guard always clears.
use crate::error::ControlError;
use crate::metrics;
use anyhow::Result;
use quickchat_gateway::{Ack, AgentGateway, Character};
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Number of characters a conversation needs
pub const CONVERSATION_SIZE: usize = 2;

/// Mutating actions guarded by the Pending gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentAction {
    StartAgent,
    StopAgent,
    StartConversation,
}

impl AgentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartAgent => "start_agent",
            Self::StopAgent => "stop_agent",
            Self::StartConversation => "start_conversation",
        }
    }
}

impl std::fmt::Display for AgentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Idle,
    Pending,
}

// =============================================================================
// Pending gate
// =============================================================================

type PendingKey = (String, AgentAction);

/// Per (channel, action) Pending flags. Clones share the same flags.
#[derive(Debug, Clone, Default)]
pub struct PendingGate {
    pending: Arc<Mutex<HashSet<PendingKey>>>,
}

impl PendingGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the action Pending, or return None if it already is
    pub fn try_acquire(&self, channel_id: &str, action: AgentAction) -> Option<PendingGuard> {
        self.try_acquire_unless(channel_id, action, &[action])
    }

    /// Mark the action Pending unless any of `blockers` is Pending on the
    /// channel. The check and the insert happen under one lock.
    pub fn try_acquire_unless(
        &self,
        channel_id: &str,
        action: AgentAction,
        blockers: &[AgentAction],
    ) -> Option<PendingGuard> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let blocked = blockers
            .iter()
            .chain(std::iter::once(&action))
            .any(|b| pending.contains(&(channel_id.to_string(), *b)));
        if blocked {
            return None;
        }
        let key = (channel_id.to_string(), action);
        pending.insert(key.clone());
        Some(PendingGuard {
            gate: self.clone(),
            key: Some(key),
        })
    }

    pub fn state(&self, channel_id: &str, action: AgentAction) -> OperationState {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if pending.contains(&(channel_id.to_string(), action)) {
            OperationState::Pending
        } else {
            OperationState::Idle
        }
    }

    pub fn is_pending(&self, channel_id: &str, action: AgentAction) -> bool {
        self.state(channel_id, action) == OperationState::Pending
    }

    fn release(&self, key: &PendingKey) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.remove(key);
    }
}

/// Holds an action Pending until dropped
#[derive(Debug)]
pub struct PendingGuard {
    gate: PendingGate,
    key: Option<PendingKey>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.gate.release(&key);
        }
    }
}

// =============================================================================
// Selection
// =============================================================================

/// Ordered selection of at most two character ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentSelection {
    ids: Vec<String>,
}

impl AgentSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove if selected, append if there is room, otherwise do nothing.
    /// Returns whether the selection changed.
    pub fn toggle(&mut self, character_id: &str) -> bool {
        if let Some(pos) = self.ids.iter().position(|id| id == character_id) {
            self.ids.remove(pos);
            return true;
        }
        if self.ids.len() < CONVERSATION_SIZE {
            self.ids.push(character_id.to_string());
            return true;
        }
        false
    }

    pub fn contains(&self, character_id: &str) -> bool {
        self.ids.iter().any(|id| id == character_id)
    }

    /// Whether a checkbox for `character_id` should be enabled
    pub fn can_toggle(&self, character_id: &str) -> bool {
        self.contains(character_id) || self.ids.len() < CONVERSATION_SIZE
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.ids.len() == CONVERSATION_SIZE
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// Label of the add/remove agent button
pub fn agent_button_label(present: bool, pending: bool) -> &'static str {
    match (present, pending) {
        (true, true) => "Removing",
        (false, true) => "Adding",
        (true, false) => "Remove AI",
        (false, false) => "Add AI",
    }
}

// =============================================================================
// Controls
// =============================================================================

/// Start/stop/select operations for AI agents in channels
pub struct AgentControls {
    gateway: Arc<dyn AgentGateway>,
    catalog: Mutex<Vec<Character>>,
    selection: Mutex<AgentSelection>,
    pending: PendingGate,
    max_turns: Option<u32>,
}

impl AgentControls {
    pub fn new(gateway: Arc<dyn AgentGateway>) -> Self {
        Self {
            gateway,
            catalog: Mutex::new(Vec::new()),
            selection: Mutex::new(AgentSelection::new()),
            pending: PendingGate::new(),
            max_turns: None,
        }
    }

    /// Bound on AI-to-AI turns sent with conversation starts
    pub fn with_max_turns(mut self, max_turns: Option<u32>) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn pending(&self) -> &PendingGate {
        &self.pending
    }

    pub fn is_pending(&self, channel_id: &str, action: AgentAction) -> bool {
        self.pending.is_pending(channel_id, action)
    }

    /// Whether the add/remove agent button for this channel is busy
    pub fn is_agent_toggle_pending(&self, channel_id: &str) -> bool {
        self.is_pending(channel_id, AgentAction::StartAgent)
            || self.is_pending(channel_id, AgentAction::StopAgent)
    }

    // ---- catalog ----

    /// Fetch the catalog. On failure the cached catalog is emptied so stale
    /// entries are never shown.
    pub async fn list_characters(&self) -> Result<Vec<Character>, ControlError> {
        match self.gateway.list_characters().await {
            Ok(characters) => {
                tracing::info!(count = characters.len(), "Loaded AI characters");
                *self.catalog.lock().unwrap_or_else(|e| e.into_inner()) = characters.clone();
                Ok(characters)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load characters");
                self.catalog.lock().unwrap_or_else(|e| e.into_inner()).clear();
                Err(ControlError::Catalog(e))
            }
        }
    }

    /// Catalog from the last successful `list_characters`
    pub fn characters(&self) -> Vec<Character> {
        self.catalog.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    // ---- selection ----

    /// Toggle a character in the conversation selection; returns the new selection
    pub fn toggle_selection(&self, character_id: &str) -> AgentSelection {
        let mut selection = self.selection.lock().unwrap_or_else(|e| e.into_inner());
        if !selection.toggle(character_id) {
            tracing::debug!(character_id = %character_id, "Selection full, ignoring");
        }
        selection.clone()
    }

    pub fn selection(&self) -> AgentSelection {
        self.selection.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear_selection(&self) {
        self.selection.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Whether the checkbox for `character_id` is enabled
    pub fn can_select(&self, character_id: &str) -> bool {
        self.selection
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .can_toggle(character_id)
    }

    // ---- mutating actions ----

    async fn run_gated<F, Fut>(
        &self,
        channel_id: &str,
        action: AgentAction,
        blockers: &[AgentAction],
        call: F,
    ) -> Result<Ack, ControlError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Ack>>,
    {
        let _guard = match self.pending.try_acquire_unless(channel_id, action, blockers) {
            Some(guard) => guard,
            None => {
                tracing::debug!(channel_id = %channel_id, action = %action, "Action already pending");
                metrics::record_agent_request(action.as_str(), "busy");
                return Err(ControlError::Busy {
                    channel_id: channel_id.to_string(),
                    action,
                });
            }
        };

        let started = Instant::now();
        match call().await {
            Ok(ack) => {
                tracing::info!(
                    channel_id = %channel_id,
                    action = %action,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Agent request completed"
                );
                metrics::record_agent_request(action.as_str(), "ok");
                Ok(ack)
            }
            Err(e) => {
                tracing::error!(
                    channel_id = %channel_id,
                    action = %action,
                    error = %e,
                    "Agent request failed"
                );
                metrics::record_agent_request(action.as_str(), "error");
                Err(ControlError::Gateway {
                    channel_id: channel_id.to_string(),
                    action,
                    error: e,
                })
            }
        }
    }

    /// Ask the backend to add one AI participant
    pub async fn start_single_agent(
        &self,
        channel_id: &str,
        character_id: Option<&str>,
    ) -> Result<Ack, ControlError> {
        self.run_gated(channel_id, AgentAction::StartAgent, &[], || {
            self.gateway.start_agent(channel_id, character_id)
        })
        .await
    }

    /// Ask the backend to remove the AI participant
    pub async fn stop_agent(&self, channel_id: &str) -> Result<Ack, ControlError> {
        self.run_gated(channel_id, AgentAction::StopAgent, &[], || {
            self.gateway.stop_agent(channel_id)
        })
        .await
    }

    /// The add/remove button: stop when an agent is present, start otherwise.
    /// Busy while either direction is Pending on the channel.
    pub async fn toggle_agent(&self, channel_id: &str, present: bool) -> Result<Ack, ControlError> {
        const TOGGLE: [AgentAction; 2] = [AgentAction::StartAgent, AgentAction::StopAgent];
        if present {
            self.run_gated(channel_id, AgentAction::StopAgent, &TOGGLE, || {
                self.gateway.stop_agent(channel_id)
            })
            .await
        } else {
            self.run_gated(channel_id, AgentAction::StartAgent, &TOGGLE, || {
                self.gateway.start_agent(channel_id, None)
            })
            .await
        }
    }

    /// Start a conversation between the two selected characters, in selection order
    pub async fn start_conversation(&self, channel_id: &str) -> Result<Ack, ControlError> {
        let selection = self.selection();
        self.start_conversation_with(channel_id, &selection).await
    }

    /// Start a conversation for an explicit selection
    pub async fn start_conversation_with(
        &self,
        channel_id: &str,
        selection: &AgentSelection,
    ) -> Result<Ack, ControlError> {
        if !selection.is_complete() {
            tracing::debug!(selected = selection.len(), "Rejecting conversation start");
            return Err(ControlError::InvalidSelection {
                selected: selection.len(),
            });
        }

        let ids = selection.ids();
        let max_turns = self.max_turns;
        self.run_gated(channel_id, AgentAction::StartConversation, &[], || {
            self.gateway.start_conversation(channel_id, ids, max_turns)
        })
        .await
    }
}

// ABOUTME: Seams for the AI-control backend and the auth backend.
// ABOUTME: HTTP clients and mocks implement these so the core never sees reqwest.

use crate::types::{Ack, AuthResponse, Character};
use anyhow::Result;
use async_trait::async_trait;

/// Request/response contract of the AI-control backend.
///
/// Implementations do not retry; callers decide what a failure means.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    /// Fetch the character catalog
    async fn list_characters(&self) -> Result<Vec<Character>>;

    /// Ask the backend to add one AI participant to a channel
    async fn start_agent(&self, channel_id: &str, character_id: Option<&str>) -> Result<Ack>;

    /// Ask the backend to run a conversation between two characters
    async fn start_conversation(
        &self,
        channel_id: &str,
        character_ids: &[String],
        max_turns: Option<u32>,
    ) -> Result<Ack>;

    /// Ask the backend to remove the AI participant from a channel
    async fn stop_agent(&self, channel_id: &str) -> Result<Ack>;
}

/// Token issuance for the platform SDK
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, user_id: &str) -> Result<AuthResponse>;

    /// Register a new user; the display name defaults to the id
    async fn register(&self, user_id: &str, display_name: Option<&str>) -> Result<AuthResponse>;
}

// ABOUTME: Recording mock of AgentGateway with scripted failures and an optional hold gate.
// ABOUTME: Lets tests observe requests in flight and release them deterministically.
//!
//! # Example
//!
//! ```no_run
//! use quickchat_gateway::testing::{GatewayCall, MockGateway};
//! use quickchat_gateway::{AgentGateway, Character, Endpoint};
//!
//! # async fn example() {
//! let mock = MockGateway::new()
//!     .with_characters(vec![Character::new("a", "A", "")])
//!     .fail_on(Endpoint::StopAgent, "backend down");
//!
//! mock.start_agent("ai", Some("a")).await.unwrap();
//! assert!(mock.stop_agent("ai").await.is_err());
//! assert_eq!(mock.calls().len(), 2);
//! # }
//! ```

use crate::error::BackendError;
use crate::traits::{AgentGateway, AuthBackend};
use crate::types::{Ack, AuthResponse, Character, Endpoint};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// A request observed by the mock, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    ListCharacters,
    StartAgent {
        channel_id: String,
        character_id: Option<String>,
    },
    StartConversation {
        channel_id: String,
        character_ids: Vec<String>,
        max_turns: Option<u32>,
    },
    StopAgent {
        channel_id: String,
    },
}

impl GatewayCall {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::ListCharacters => Endpoint::ListCharacters,
            Self::StartAgent { .. } => Endpoint::StartAgent,
            Self::StartConversation { .. } => Endpoint::StartConversation,
            Self::StopAgent { .. } => Endpoint::StopAgent,
        }
    }
}

#[derive(Default)]
struct MockState {
    characters: Vec<Character>,
    failures: HashMap<Endpoint, String>,
    calls: Vec<GatewayCall>,
}

/// Mock AI-control backend. Clones share state.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog returned by `list_characters`
    pub fn with_characters(self, characters: Vec<Character>) -> Self {
        self.state.lock().unwrap().characters = characters;
        self
    }

    /// Make every call to `endpoint` fail with a 500 carrying `detail`
    pub fn fail_on(self, endpoint: Endpoint, detail: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(endpoint, detail.to_string());
        self
    }

    /// Hold every call after it is recorded until `release` hands out a permit
    pub fn held(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `n` held calls complete
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Stop failing calls to `endpoint`
    pub fn recover(&self, endpoint: Endpoint) {
        self.state.lock().unwrap().failures.remove(&endpoint);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, endpoint: Endpoint) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.endpoint() == endpoint)
            .count()
    }

    async fn record(&self, call: GatewayCall) -> Result<()> {
        let endpoint = call.endpoint();
        self.state.lock().unwrap().calls.push(call);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| anyhow::anyhow!("mock gate closed"))?
                .forget();
        }

        let failure = self.state.lock().unwrap().failures.get(&endpoint).cloned();
        match failure {
            Some(detail) => Err(BackendError {
                path: endpoint.path().to_string(),
                status: 500,
                detail,
            }
            .into()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AgentGateway for MockGateway {
    async fn list_characters(&self) -> Result<Vec<Character>> {
        self.record(GatewayCall::ListCharacters).await?;
        Ok(self.state.lock().unwrap().characters.clone())
    }

    async fn start_agent(&self, channel_id: &str, character_id: Option<&str>) -> Result<Ack> {
        self.record(GatewayCall::StartAgent {
            channel_id: channel_id.to_string(),
            character_id: character_id.map(str::to_string),
        })
        .await?;
        Ok(json!({"message": "AI agent started"}))
    }

    async fn start_conversation(
        &self,
        channel_id: &str,
        character_ids: &[String],
        max_turns: Option<u32>,
    ) -> Result<Ack> {
        self.record(GatewayCall::StartConversation {
            channel_id: channel_id.to_string(),
            character_ids: character_ids.to_vec(),
            max_turns,
        })
        .await?;
        Ok(json!({"message": "AI conversation started"}))
    }

    async fn stop_agent(&self, channel_id: &str) -> Result<Ack> {
        self.record(GatewayCall::StopAgent {
            channel_id: channel_id.to_string(),
        })
        .await?;
        Ok(json!({"message": "AI agent stopped"}))
    }
}

/// Mock auth backend: known users log in, unknown users must register first
#[derive(Clone, Default)]
pub struct MockAuth {
    users: Arc<Mutex<Vec<String>>>,
}

impl MockAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user_id: &str) -> Self {
        self.users.lock().unwrap().push(user_id.to_string());
        self
    }

    fn token_for(user_id: &str) -> AuthResponse {
        AuthResponse {
            stream_token: format!("token-{}", user_id),
            user_id: user_id.to_string(),
            message: None,
        }
    }
}

#[async_trait]
impl AuthBackend for MockAuth {
    async fn login(&self, user_id: &str) -> Result<AuthResponse> {
        if !self.users.lock().unwrap().iter().any(|u| u == user_id) {
            return Err(BackendError {
                path: "/auth/login".to_string(),
                status: 400,
                detail: format!("User '{}' not found", user_id),
            }
            .into());
        }
        Ok(Self::token_for(user_id))
    }

    async fn register(&self, user_id: &str, _display_name: Option<&str>) -> Result<AuthResponse> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u == user_id) {
            return Err(BackendError {
                path: "/auth/register".to_string(),
                status: 400,
                detail: "User already registered".to_string(),
            }
            .into());
        }
        users.push(user_id.to_string());
        Ok(Self::token_for(user_id))
    }
}

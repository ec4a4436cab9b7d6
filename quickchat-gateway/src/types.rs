// ABOUTME: Wire types for the AI-control and auth backends.
// ABOUTME: Request bodies, character catalog entries, and the endpoint table.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Acknowledgement returned by mutating backend calls. The shape is backend-defined,
/// so it is kept as raw JSON (`Null` for an empty body).
pub type Ack = Value;

/// An AI character offered by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub personality: String,
}

impl Character {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        personality: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            personality: personality.into(),
        }
    }
}

/// Response body of `GET /list-characters`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterList {
    #[serde(default)]
    pub characters: Vec<Character>,
}

/// Body of `POST /start-ai-agent`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAgentRequest {
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
}

/// Body of `POST /start-ai-conversation`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartConversationRequest {
    pub channel_id: String,
    pub character_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
}

/// Body of `POST /stop-ai-agent`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopAgentRequest {
    pub channel_id: String,
}

/// Body of `POST /auth/login` and `POST /auth/register`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AuthRequest<'a> {
    pub id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

/// Successful auth response; `stream_token` is the platform SDK token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthResponse {
    pub stream_token: String,
    pub user_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// AI-control backend endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ListCharacters,
    StartAgent,
    StartConversation,
    StopAgent,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::ListCharacters => "/list-characters",
            Self::StartAgent => "/start-ai-agent",
            Self::StartConversation => "/start-ai-conversation",
            Self::StopAgent => "/stop-ai-agent",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Parse a backend-defined acknowledgement body
pub(crate) fn parse_ack(body: &str) -> Ack {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

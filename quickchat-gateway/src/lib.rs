// ABOUTME: Clients for the external AI-control backend and the auth backend.
// ABOUTME: Provides the AgentGateway/AuthBackend traits, reqwest clients, and test doubles.

pub mod auth;
pub mod error;
pub mod http;
pub mod testing;
pub mod traits;
pub mod types;

pub use auth::HttpAuthClient;
pub use error::BackendError;
pub use http::HttpGateway;
pub use traits::{AgentGateway, AuthBackend};
pub use types::{
    Ack, AuthResponse, Character, CharacterList, Endpoint, StartAgentRequest,
    StartConversationRequest, StopAgentRequest,
};

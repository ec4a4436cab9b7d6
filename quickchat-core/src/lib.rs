// ABOUTME: Platform-agnostic core of the QuickChat client
// ABOUTME: Session lifecycle, AI presence tracking, and agent controls over SDK traits

pub mod config;
pub mod controls;
pub mod credentials;
pub mod error;
pub mod header;
pub mod metrics;
pub mod paths;
pub mod presence;
pub mod session;
pub mod testing;
pub mod traits;
pub mod view;

pub use controls::{
    agent_button_label, AgentAction, AgentControls, AgentSelection, OperationState, PendingGate,
    PendingGuard,
};
pub use credentials::{
    CredentialStore, Credentials, MemoryCredentialStore, SqliteCredentialStore,
};
pub use error::{error_channel, ControlError, ErrorSink, ErrorSource, ViewError};
pub use header::ChannelHeader;
pub use presence::{AgentMatcher, PresenceSet, PresenceTracker};
pub use session::{Session, SessionManager, SessionState};
pub use traits::{
    ChannelEvent, ChannelEventKind, ChannelMember, ChatChannel, ChatClient, ChatUser,
    EventStream, MemberFilter, Subscription, SubscriptionGuard,
};
pub use view::ChannelView;

// Re-export gateway types used across the core API
pub use quickchat_gateway::{Ack, AgentGateway, AuthBackend, Character};

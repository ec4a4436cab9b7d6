// ABOUTME: Traits for the hosted messaging platform SDK consumed by the core
// ABOUTME: Connection (ChatClient), channel membership queries, and scoped event subscriptions

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::{Stream, StreamExt};

// =============================================================================
// User Identity
// =============================================================================

/// Identity of a chat user as the platform sees it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: String,
    #[serde(default, rename = "name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl ChatUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }

    pub fn with_name(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: Some(name.into()),
        }
    }
}

/// A channel member returned by a membership query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMember {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl ChannelMember {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: None,
        }
    }
}

/// Filter passed to membership queries. The default matches every member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemberFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id_prefix: Option<String>,
}

impl MemberFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, user_id: &str) -> bool {
        self.user_id_prefix
            .as_deref()
            .map_or(true, |prefix| user_id.starts_with(prefix))
    }
}

// =============================================================================
// Channel Events
// =============================================================================

/// Event kinds the core cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEventKind {
    MemberAdded,
    MemberRemoved,
    WatchingStart,
    WatchingStop,
    Other,
}

impl ChannelEventKind {
    pub fn parse(event_type: &str) -> Self {
        match event_type {
            "member.added" => Self::MemberAdded,
            "member.removed" => Self::MemberRemoved,
            "user.watching.start" => Self::WatchingStart,
            "user.watching.stop" => Self::WatchingStop,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MemberAdded => "member.added",
            Self::MemberRemoved => "member.removed",
            Self::WatchingStart => "user.watching.start",
            Self::WatchingStop => "user.watching.stop",
            Self::Other => "other",
        }
    }
}

/// A channel event as delivered by the SDK: `{type, user: {id}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ChatUser>,
}

impl ChannelEvent {
    pub fn new(kind: ChannelEventKind, user_id: impl Into<String>) -> Self {
        Self {
            event_type: kind.as_str().to_string(),
            user: Some(ChatUser::new(user_id)),
        }
    }

    pub fn member_added(user_id: impl Into<String>) -> Self {
        Self::new(ChannelEventKind::MemberAdded, user_id)
    }

    pub fn member_removed(user_id: impl Into<String>) -> Self {
        Self::new(ChannelEventKind::MemberRemoved, user_id)
    }

    pub fn kind(&self) -> ChannelEventKind {
        ChannelEventKind::parse(&self.event_type)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }
}

// =============================================================================
// Subscriptions
// =============================================================================

/// Boxed stream of channel events
pub type EventStream = Pin<Box<dyn Stream<Item = ChannelEvent> + Send>>;

/// Releases a subscription's listener when dropped
pub struct SubscriptionGuard {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl SubscriptionGuard {
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A guard with nothing to release
    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// A live event subscription. The listener is released when this (or its guard
/// after `into_parts`) is dropped, so remounts never accumulate listeners.
pub struct Subscription {
    events: EventStream,
    guard: SubscriptionGuard,
}

impl Subscription {
    pub fn new(events: EventStream, guard: SubscriptionGuard) -> Self {
        Self { events, guard }
    }

    pub async fn next(&mut self) -> Option<ChannelEvent> {
        self.events.next().await
    }

    /// Explicitly release the listener
    pub fn unsubscribe(self) {}

    /// Split into the event stream and the guard that owns the release
    pub fn into_parts(self) -> (EventStream, SubscriptionGuard) {
        (self.events, self.guard)
    }
}

// =============================================================================
// Platform SDK
// =============================================================================

/// Connection surface of the platform SDK
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Open a transport session for `user` authenticated by `token`
    async fn connect(&self, user: &ChatUser, token: &str) -> Result<()>;

    /// Close the transport session
    async fn disconnect(&self) -> Result<()>;
}

/// A channel handle owned by the platform SDK. The core only reads from it.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Stable channel identifier
    fn id(&self) -> &str;

    /// Human-readable name of the channel, if available
    fn name(&self) -> Option<String> {
        None
    }

    /// Total member count (defaults to unknown)
    async fn member_count(&self) -> Result<usize> {
        Ok(0)
    }

    /// Full membership query
    async fn query_members(&self, filter: &MemberFilter) -> Result<Vec<ChannelMember>>;

    /// Subscribe to channel events for as long as the subscription lives
    fn subscribe(&self) -> Result<Subscription>;
}

// =============================================================================
// Tests
// =============================================================================

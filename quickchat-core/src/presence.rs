// ABOUTME: Per-channel AI presence tracking from a membership snapshot plus membership events.
// ABOUTME: Every relevant event triggers a full re-query; the last query to complete wins.
//!
//! The set is never patched from an event payload; events only signal that a
//! fresh query is due.

use crate::error::{report, ErrorSink, ErrorSource, ViewError};
use crate::metrics;
use crate::traits::{
    ChannelEvent, ChannelEventKind, ChannelMember, ChatChannel, MemberFilter, SubscriptionGuard,
};
use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// Naming convention that identifies AI participants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentMatcher {
    prefix: String,
}

impl AgentMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, user_id: &str) -> bool {
        user_id.starts_with(&self.prefix)
    }
}

impl Default for AgentMatcher {
    fn default() -> Self {
        Self::new("ai-bot")
    }
}

/// AI participants currently in a channel, in query order without duplicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceSet {
    agents: Vec<String>,
}

impl PresenceSet {
    pub fn from_members(members: &[ChannelMember], matcher: &AgentMatcher) -> Self {
        let mut agents: Vec<String> = Vec::new();
        for member in members {
            if matcher.matches(&member.user_id) && !agents.contains(&member.user_id) {
                agents.push(member.user_id.clone());
            }
        }
        Self { agents }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn is_agent_present(&self) -> bool {
        !self.agents.is_empty()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.agents.iter().any(|a| a == user_id)
    }

    pub fn agents(&self) -> &[String] {
        &self.agents
    }
}

/// Shared state behind a tracker's event loop and its query tasks
struct Reconciler {
    channel: Arc<dyn ChatChannel>,
    matcher: AgentMatcher,
    tx: watch::Sender<PresenceSet>,
    errors: ErrorSink,
    cancel: CancellationToken,
    issued: AtomicU64,
}

impl Reconciler {
    fn is_relevant(&self, event: &ChannelEvent) -> bool {
        match event.kind() {
            ChannelEventKind::MemberAdded | ChannelEventKind::MemberRemoved => true,
            ChannelEventKind::WatchingStart | ChannelEventKind::WatchingStop => event
                .user_id()
                .is_some_and(|id| self.matcher.matches(id)),
            ChannelEventKind::Other => false,
        }
    }

    /// Issue a full membership query in its own task
    fn spawn_reconcile(self: &Arc<Self>, reason: &'static str) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::spawn(async move { this.reconcile(seq, reason).await })
    }

    async fn reconcile(&self, seq: u64, reason: &'static str) {
        let channel_id = self.channel.id().to_string();
        tracing::debug!(channel_id = %channel_id, seq, reason, "Reconciling AI presence");
        let result = self.channel.query_members(&MemberFilter::all()).await;

        if self.cancel.is_cancelled() {
            tracing::debug!(channel_id = %channel_id, seq, "Discarding reconciliation after teardown");
            metrics::record_reconciliation("discarded");
            return;
        }

        match result {
            Ok(members) => {
                let set = PresenceSet::from_members(&members, &self.matcher);
                tracing::debug!(
                    channel_id = %channel_id,
                    seq,
                    agents = set.len(),
                    "Presence reconciled"
                );
                self.tx.send_replace(set);
                metrics::record_reconciliation("ok");
            }
            Err(e) => {
                tracing::error!(
                    channel_id = %channel_id,
                    seq,
                    error = %e,
                    "An error has occurred while querying members"
                );
                metrics::record_reconciliation("error");
                report(
                    &self.errors,
                    ViewError {
                        source: ErrorSource::Presence,
                        channel_id: Some(channel_id),
                        message: format!("{:#}", e),
                    },
                );
            }
        }
    }
}

/// Tracks AI presence for one mounted channel.
///
/// Dropping the tracker releases the event subscription immediately and
/// discards the results of any queries still in flight.
pub struct PresenceTracker {
    reconciler: Arc<Reconciler>,
    rx: watch::Receiver<PresenceSet>,
    event_loop: JoinHandle<()>,
    _subscription: SubscriptionGuard,
}

impl PresenceTracker {
    /// Subscribe to the channel and issue the initial reconciliation query.
    /// Must be called from within a tokio runtime.
    pub fn mount(
        channel: Arc<dyn ChatChannel>,
        matcher: AgentMatcher,
        errors: ErrorSink,
    ) -> Result<Self> {
        let (events, guard) = channel.subscribe()?.into_parts();
        let (tx, rx) = watch::channel(PresenceSet::default());
        let reconciler = Arc::new(Reconciler {
            channel,
            matcher,
            tx,
            errors,
            cancel: CancellationToken::new(),
            issued: AtomicU64::new(0),
        });

        tracing::debug!(channel_id = %reconciler.channel.id(), "Mounting presence tracker");
        reconciler.spawn_reconcile("mount");

        let event_loop = {
            let reconciler = Arc::clone(&reconciler);
            let mut events = events;
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = reconciler.cancel.cancelled() => break,
                        event = events.next() => match event {
                            Some(event) if reconciler.is_relevant(&event) => {
                                tracing::debug!(
                                    channel_id = %reconciler.channel.id(),
                                    event_type = %event.event_type,
                                    user_id = ?event.user_id(),
                                    "Membership changed"
                                );
                                reconciler.spawn_reconcile("event");
                            }
                            Some(_) => {}
                            None => {
                                tracing::debug!(
                                    channel_id = %reconciler.channel.id(),
                                    "Channel event stream ended"
                                );
                                break;
                            }
                        },
                    }
                }
            })
        };

        Ok(Self {
            reconciler,
            rx,
            event_loop,
            _subscription: guard,
        })
    }

    pub fn channel_id(&self) -> &str {
        self.reconciler.channel.id()
    }

    /// Latest reconciled set
    pub fn current(&self) -> PresenceSet {
        self.rx.borrow().clone()
    }

    pub fn is_agent_present(&self) -> bool {
        self.rx.borrow().is_agent_present()
    }

    pub fn agents(&self) -> Vec<String> {
        self.rx.borrow().agents().to_vec()
    }

    /// Receiver that observes every reconciled set
    pub fn watch(&self) -> watch::Receiver<PresenceSet> {
        self.rx.clone()
    }

    /// Number of reconciliation queries issued so far
    pub fn queries_issued(&self) -> u64 {
        self.reconciler.issued.load(Ordering::SeqCst)
    }

    /// Issue an explicit reconciliation
    pub fn refresh(&self) -> JoinHandle<()> {
        self.reconciler.spawn_reconcile("refresh")
    }

    /// Wait until the reconciled set satisfies `predicate`
    pub async fn wait_for(&self, predicate: impl FnMut(&PresenceSet) -> bool) -> PresenceSet {
        let mut rx = self.rx.clone();
        let reached = rx.wait_for(predicate).await.map(|set| set.clone());
        // The sender is owned by the reconciler we hold, so this cannot close
        reached.unwrap_or_else(|_| self.current())
    }
}

impl Drop for PresenceTracker {
    fn drop(&mut self) {
        tracing::debug!(channel_id = %self.channel_id(), "Unmounting presence tracker");
        self.reconciler.cancel.cancel();
        self.event_loop.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(ids: &[&str]) -> Vec<ChannelMember> {
        ids.iter().map(|id| ChannelMember::new(*id)).collect()
    }

    #[test]
    fn test_matcher_uses_prefix() {
        let matcher = AgentMatcher::default();
        assert!(matcher.matches("ai-bot-general-socrates"));
        assert!(matcher.matches("ai-bot-tesla"));
        assert!(!matcher.matches("alice"));
        assert!(!matcher.matches("my-ai-bot"));
    }

    #[test]
    fn test_presence_set_filters_and_dedups() {
        let set = PresenceSet::from_members(
            &members(&["alice", "ai-bot-a", "bob", "ai-bot-a", "ai-bot-b"]),
            &AgentMatcher::default(),
        );
        assert_eq!(set.agents(), &["ai-bot-a".to_string(), "ai-bot-b".to_string()]);
        assert_eq!(set.len(), 2);
        assert!(set.contains("ai-bot-b"));
        assert!(set.is_agent_present());
    }

    #[test]
    fn test_presence_set_empty_without_agents() {
        let set = PresenceSet::from_members(&members(&["alice", "bob"]), &AgentMatcher::default());
        assert!(set.is_empty());
        assert!(!set.is_agent_present());
    }

    #[test]
    fn test_custom_prefix() {
        let set = PresenceSet::from_members(
            &members(&["bot-x", "ai-bot-y"]),
            &AgentMatcher::new("bot-"),
        );
        assert_eq!(set.agents(), &["bot-x".to_string()]);
    }
}

// ABOUTME: Mock ChatChannel with scripted membership, event fan-out, and controllable queries.
// ABOUTME: Held queries wait until the test resolves them, in any order it chooses.

use crate::traits::{
    ChannelEvent, ChannelMember, ChatChannel, MemberFilter, Subscription, SubscriptionGuard,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio_stream::wrappers::UnboundedReceiverStream;

type QueryReply = oneshot::Sender<Result<Vec<ChannelMember>>>;

#[derive(Default)]
struct ChannelState {
    members: Vec<ChannelMember>,
    subscribers: HashMap<u64, mpsc::UnboundedSender<ChannelEvent>>,
    next_subscriber: u64,
    queries: u64,
    query_failure: Option<String>,
    hold_queries: bool,
    held: BTreeMap<u64, QueryReply>,
}

/// Mock platform channel. Clones share state.
#[derive(Clone)]
pub struct MockChannel {
    id: String,
    name: Option<String>,
    state: Arc<Mutex<ChannelState>>,
    changed: Arc<Notify>,
}

impl MockChannel {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            state: Arc::new(Mutex::new(ChannelState::default())),
            changed: Arc::new(Notify::new()),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_members(self, ids: &[&str]) -> Self {
        self.state.lock().unwrap().members = ids.iter().map(|id| ChannelMember::new(*id)).collect();
        self
    }

    /// Park every membership query until `resolve_query` or `fail_query`
    pub fn hold_queries(self) -> Self {
        self.state.lock().unwrap().hold_queries = true;
        self
    }

    /// Fail every unheld query with `message`; None restores normal answers
    pub fn set_query_failure(&self, message: Option<&str>) {
        self.state.lock().unwrap().query_failure = message.map(str::to_string);
    }

    pub fn member_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .members
            .iter()
            .map(|m| m.user_id.clone())
            .collect()
    }

    /// Add a member and deliver `member.added` to subscribers
    pub fn add_member(&self, user_id: &str) {
        self.state
            .lock()
            .unwrap()
            .members
            .push(ChannelMember::new(user_id));
        self.emit(ChannelEvent::member_added(user_id));
    }

    /// Remove a member and deliver `member.removed` to subscribers
    pub fn remove_member(&self, user_id: &str) {
        self.state
            .lock()
            .unwrap()
            .members
            .retain(|m| m.user_id != user_id);
        self.emit(ChannelEvent::member_removed(user_id));
    }

    /// Deliver an event to every live subscriber without touching membership
    pub fn emit(&self, event: ChannelEvent) {
        let state = self.state.lock().unwrap();
        for tx in state.subscribers.values() {
            let _ = tx.send(event.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().unwrap().subscribers.len()
    }

    /// Total membership queries received
    pub fn query_count(&self) -> u64 {
        self.state.lock().unwrap().queries
    }

    /// Sequence numbers (1-based, in arrival order) of parked queries
    pub fn pending_queries(&self) -> Vec<u64> {
        self.state.lock().unwrap().held.keys().copied().collect()
    }

    /// Wait until at least `n` queries are parked
    pub async fn wait_for_pending(&self, n: usize) {
        loop {
            let notified = self.changed.notified();
            if self.state.lock().unwrap().held.len() >= n {
                return;
            }
            notified.await;
        }
    }

    /// Wait until at least `n` queries have been received
    pub async fn wait_for_queries(&self, n: u64) {
        loop {
            let notified = self.changed.notified();
            if self.state.lock().unwrap().queries >= n {
                return;
            }
            notified.await;
        }
    }

    /// Answer parked query `seq` with members `ids`. Returns false if no such query.
    pub fn resolve_query(&self, seq: u64, ids: &[&str]) -> bool {
        let reply = self.state.lock().unwrap().held.remove(&seq);
        match reply {
            Some(reply) => reply
                .send(Ok(ids.iter().map(|id| ChannelMember::new(*id)).collect()))
                .is_ok(),
            None => false,
        }
    }

    /// Fail parked query `seq`
    pub fn fail_query(&self, seq: u64, message: &str) -> bool {
        let reply = self.state.lock().unwrap().held.remove(&seq);
        match reply {
            Some(reply) => reply.send(Err(anyhow::anyhow!(message.to_string()))).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl ChatChannel for MockChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    async fn member_count(&self) -> Result<usize> {
        Ok(self.state.lock().unwrap().members.len())
    }

    async fn query_members(&self, filter: &MemberFilter) -> Result<Vec<ChannelMember>> {
        let parked = {
            let mut state = self.state.lock().unwrap();
            state.queries += 1;
            let seq = state.queries;
            if state.hold_queries {
                let (tx, rx) = oneshot::channel();
                state.held.insert(seq, tx);
                Ok(rx)
            } else if let Some(message) = state.query_failure.clone() {
                Err(anyhow::anyhow!(message))
            } else {
                let members = state
                    .members
                    .iter()
                    .filter(|m| filter.matches(&m.user_id))
                    .cloned()
                    .collect::<Vec<_>>();
                drop(state);
                self.changed.notify_waiters();
                return Ok(members);
            }
        };
        self.changed.notify_waiters();

        match parked {
            Ok(rx) => rx
                .await
                .map_err(|_| anyhow::anyhow!("query dropped without an answer"))?,
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut state = self.state.lock().unwrap();
            state.next_subscriber += 1;
            let id = state.next_subscriber;
            state.subscribers.insert(id, tx);
            id
        };

        let state = Arc::clone(&self.state);
        let guard = SubscriptionGuard::new(move || {
            state.lock().unwrap().subscribers.remove(&id);
        });
        Ok(Subscription::new(
            Box::pin(UnboundedReceiverStream::new(rx)),
            guard,
        ))
    }
}

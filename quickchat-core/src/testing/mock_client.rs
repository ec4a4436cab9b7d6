// ABOUTME: Mock ChatClient that records every connect and disconnect.
// ABOUTME: Connects can be scripted to fail, held in bulk, or parked per user until released.

use crate::traits::{ChatClient, ChatUser};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, Semaphore};

#[derive(Default)]
struct ClientState {
    connects: usize,
    disconnects: usize,
    users: Vec<(ChatUser, String)>,
    connect_failure: Option<String>,
    disconnect_failure: Option<String>,
    park_each: bool,
    parked: Vec<(String, oneshot::Sender<()>)>,
    transport_up: bool,
}

/// Mock platform connection. Clones share state.
#[derive(Clone, Default)]
pub struct MockChatClient {
    state: Arc<Mutex<ClientState>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every connect with `message`
    pub fn fail_connect(self, message: &str) -> Self {
        self.state.lock().unwrap().connect_failure = Some(message.to_string());
        self
    }

    /// Make every disconnect return an error after it is counted
    pub fn fail_disconnect(self, message: &str) -> Self {
        self.state.lock().unwrap().disconnect_failure = Some(message.to_string());
        self
    }

    /// Hold connects after they are recorded until `release` is called
    pub fn held(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Park each connect until `release_user` names its user
    pub fn park_each(self) -> Self {
        self.state.lock().unwrap().park_each = true;
        self
    }

    /// Let the parked connect for `user_id` finish. Returns false if none is parked.
    pub fn release_user(&self, user_id: &str) -> bool {
        let reply = {
            let mut state = self.state.lock().unwrap();
            let index = state.parked.iter().position(|(id, _)| id == user_id);
            index.map(|i| state.parked.remove(i).1)
        };
        match reply {
            Some(reply) => reply.send(()).is_ok(),
            None => false,
        }
    }

    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().unwrap().disconnects
    }

    /// True between a successful connect and the next disconnect
    pub fn transport_up(&self) -> bool {
        self.state.lock().unwrap().transport_up
    }

    /// Users and tokens passed to connect, in order
    pub fn connected_users(&self) -> Vec<(ChatUser, String)> {
        self.state.lock().unwrap().users.clone()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn connect(&self, user: &ChatUser, token: &str) -> Result<()> {
        let parked = {
            let mut state = self.state.lock().unwrap();
            state.connects += 1;
            state.users.push((user.clone(), token.to_string()));
            if state.park_each {
                let (tx, rx) = oneshot::channel();
                state.parked.push((user.id.clone(), tx));
                Some(rx)
            } else {
                None
            }
        };

        if let Some(rx) = parked {
            rx.await.map_err(|_| anyhow::anyhow!("parked connect dropped"))?;
        }

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| anyhow::anyhow!("mock gate closed"))?
                .forget();
        }

        let mut state = self.state.lock().unwrap();
        match state.connect_failure.clone() {
            Some(message) => Err(anyhow::anyhow!(message)),
            None => {
                state.transport_up = true;
                Ok(())
            }
        }
    }

    async fn disconnect(&self) -> Result<()> {
        let failure = {
            let mut state = self.state.lock().unwrap();
            state.disconnects += 1;
            state.transport_up = false;
            state.disconnect_failure.clone()
        };
        match failure {
            Some(message) => Err(anyhow::anyhow!(message)),
            None => Ok(()),
        }
    }
}

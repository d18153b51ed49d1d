#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use futures::{
    StreamExt,
    channel::mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use murmur::{
    config::ChatConfig,
    db::{SqlChatStore, models::User},
    state::{AppState, AppStateBuilder},
};
use serde_json::Value;
use tokio::{task::JoinHandle, time::timeout};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);
const QUIET_PERIOD: Duration = Duration::from_millis(150);

pub struct Harness {
    pub store: SqlChatStore,
    pub state: Arc<AppState>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(ChatConfig::default()).await
    }

    pub async fn with_config(config: ChatConfig) -> Self {
        let store = SqlChatStore::in_memory().await.unwrap();
        let state = AppStateBuilder::new()
            .with_config(config)
            .with_store(store.clone())
            .build()
            .await
            .unwrap();

        Self {
            store,
            state: Arc::new(state),
        }
    }

    pub async fn user(&self, username: &str) -> User {
        self.store.register_user(username).await.unwrap()
    }

    /// Joins `user` to the chat with `peer`; the session is registered when
    /// this returns.
    pub async fn connect(&self, user: &User, peer: &str) -> Client {
        let manager = &self.state.connection_manager;
        let ctx = manager.resolve(Some(user.clone()), peer).await.unwrap();
        let session = manager.join(ctx).await.unwrap();

        let (to_server, server_reader) = mpsc::unbounded::<String>();
        let (server_writer, from_server) = mpsc::unbounded::<String>();
        let task = tokio::spawn(session.run(server_writer, server_reader));

        Client {
            outbound: to_server,
            inbound: from_server,
            task,
        }
    }
}

pub struct Client {
    outbound: UnboundedSender<String>,
    inbound: UnboundedReceiver<String>,
    task: JoinHandle<()>,
}

impl Client {
    pub fn send(&self, frame: Value) {
        self.send_raw(&frame.to_string());
    }

    pub fn send_raw(&self, text: &str) {
        self.outbound.unbounded_send(text.to_string()).unwrap();
    }

    pub async fn recv(&mut self) -> Value {
        let frame = timeout(RECV_TIMEOUT, self.inbound.next())
            .await
            .expect("timed out waiting for an event")
            .expect("session closed");
        serde_json::from_str(&frame).unwrap()
    }

    pub async fn assert_silent(&mut self) {
        if let Ok(frame) = timeout(QUIET_PERIOD, self.inbound.next()).await {
            panic!("expected no event, got {frame:?}");
        }
    }

    /// Closes the client side and waits for the session to finish leaving.
    pub async fn disconnect(self) {
        drop(self.outbound);
        self.task.await.unwrap();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Polls until `check` passes; leaving is asynchronous.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition never became true");
}

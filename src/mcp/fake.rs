//! In-process scripted capability client
//!
//! [`FakeCapabilityClient`] replays a queue of `tools/list` answers so the
//! poller, verification, and simulator can be driven without a server.
//! Once the script is exhausted the last entry repeats.
//!
//! ```
//! use oauth_flow_sim::mcp::client::CapabilityClient;
//! use oauth_flow_sim::mcp::fake::FakeCapabilityClient;
//! use oauth_flow_sim::mcp::types::CapabilitySnapshot;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let fake = FakeCapabilityClient::new()
//!     .then_snapshot(CapabilitySnapshot::from_names(["connect_to_pierre"]))
//!     .then_error("server restarting");
//!
//! assert_eq!(fake.list_capabilities().await.unwrap().len(), 1);
//! assert!(fake.list_capabilities().await.is_err());
//! assert!(fake.list_capabilities().await.is_err());
//! assert_eq!(fake.list_calls(), 3);
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as SyncMutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Result, SimError};
use crate::mcp::client::CapabilityClient;
use crate::mcp::types::CapabilitySnapshot;

#[derive(Debug, Clone)]
enum Scripted {
    Snapshot(CapabilitySnapshot),
    Error(String),
}

/// Scripted [`CapabilityClient`] for tests.
#[derive(Debug, Clone, Default)]
pub struct FakeCapabilityClient {
    // Never held across an await, so builders can lock synchronously.
    script: Arc<SyncMutex<VecDeque<Scripted>>>,
    last: Arc<SyncMutex<Option<Scripted>>>,
    list_delay: Option<Duration>,
    list_calls: Arc<AtomicUsize>,
    tool_calls: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
}

impl FakeCapabilityClient {
    /// An empty script. Listing answers an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a successful answer.
    pub fn then_snapshot(self, snapshot: CapabilitySnapshot) -> Self {
        self.push(Scripted::Snapshot(snapshot))
    }

    /// Appends `count` answers of the same snapshot.
    pub fn then_repeat(mut self, snapshot: CapabilitySnapshot, count: usize) -> Self {
        for _ in 0..count {
            self = self.push(Scripted::Snapshot(snapshot.clone()));
        }
        self
    }

    /// Appends a failing answer.
    pub fn then_error(self, message: impl Into<String>) -> Self {
        self.push(Scripted::Error(message.into()))
    }

    /// Delays every listing, to exercise timeouts.
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    /// How many times `list_capabilities` was invoked.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Every `call_tool` invocation so far.
    pub async fn tool_calls(&self) -> Vec<(String, serde_json::Value)> {
        self.tool_calls.lock().await.clone()
    }

    /// Number of scripted answers not yet replayed.
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }

    fn push(self, entry: Scripted) -> Self {
        lock(&self.script).push_back(entry);
        self
    }
}

fn lock<T>(mutex: &SyncMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl CapabilityClient for FakeCapabilityClient {
    async fn list_capabilities(&self) -> Result<CapabilitySnapshot> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }

        let next = lock(&self.script).pop_front();
        let entry = {
            let mut last = lock(&self.last);
            match next {
                Some(entry) => {
                    *last = Some(entry.clone());
                    Some(entry)
                }
                None => last.clone(),
            }
        };

        match entry {
            Some(Scripted::Snapshot(snapshot)) => Ok(snapshot),
            Some(Scripted::Error(message)) => Err(SimError::McpTransport(message).into()),
            None => Ok(CapabilitySnapshot::default()),
        }
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.tool_calls
            .lock()
            .await
            .push((name.to_string(), arguments));
        Ok(serde_json::json!({ "content": [] }))
    }
}

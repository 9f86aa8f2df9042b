//! Realtime Client
//!
//! Wires the snapshot loader, dispatch router and connection manager together:
//!
//! 1. the embedded snapshot is applied forced, before anything else;
//! 2. the live channel is opened when a server URL is configured;
//! 3. on open, every snapshot payload carrying a `url` is subscribed;
//! 4. inbound batches go through the router in arrival order. The first
//!    delivery of each key on a new connection is forced, later ones are
//!    throttled.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::RealtimeConfig;
use crate::connection::{ConnectionEvents, ConnectionHandle, ConnectionManager, ConnectionState};
use crate::dispatch::{DispatchRouter, HandlerRegistry};
use crate::snapshot::{subscription_urls, SnapshotLoader};
use crate::types::{Envelope, UpdateBatch, UpdateKey};

/// Live view of the dashboard data for one page
pub struct RealtimeClient {
    router: Arc<Mutex<DispatchRouter>>,
    manager: ConnectionManager,
    config: RealtimeConfig,
    subscriptions: Vec<(UpdateKey, String)>,
    connection: Option<ConnectionHandle>,
    pump_task: Option<JoinHandle<()>>,
}

impl RealtimeClient {
    /// Initialize with the default WebSocket transports
    pub fn init(
        registry: HandlerRegistry,
        snapshot: SnapshotLoader,
        config: RealtimeConfig,
    ) -> Self {
        Self::init_with(
            DispatchRouter::new(registry),
            snapshot,
            config,
            ConnectionManager::default(),
        )
    }

    /// Initialize over an explicit router and connection manager
    pub fn init_with(
        router: DispatchRouter,
        mut snapshot: SnapshotLoader,
        config: RealtimeConfig,
        manager: ConnectionManager,
    ) -> Self {
        router.set_reload_cooldown(config.reload_cooldown);
        let router = Arc::new(Mutex::new(router));

        let mut subscriptions = Vec::new();
        if let Some(batch) = snapshot.load_initial_batch() {
            subscriptions = subscription_urls(&batch);
            let applied = router.lock().apply_batch(&batch, true);
            tracing::debug!(applied, "Applied initial snapshot");
        }

        let mut client = Self {
            router,
            manager,
            config,
            subscriptions,
            connection: None,
            pump_task: None,
        };
        client.connect();
        client
    }

    /// Open a live channel if a server is configured.
    ///
    /// Returns whether a connection handle was created.
    fn connect(&mut self) -> bool {
        let Some(url) = self.config.server_url.clone() else {
            tracing::debug!("No realtime server configured");
            return false;
        };
        let Some((handle, pump)) = self.manager.open(&url) else {
            return false;
        };

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(error = %e, "No async runtime, staying on snapshot data");
                handle.close();
                return false;
            }
        };

        let mut sink = RouterSink::new(self.router.clone(), self.subscriptions.clone());
        self.pump_task = Some(runtime.spawn(async move {
            pump.run(&mut sink).await;
        }));
        self.connection = Some(handle);
        true
    }

    /// Drop the current connection and open a fresh one
    pub fn reconnect(&mut self) -> bool {
        self.close();
        self.connect()
    }

    /// Close the live channel; dispatch keeps working on local data
    pub fn close(&mut self) {
        if let Some(handle) = &self.connection {
            handle.close();
        }
    }

    /// Wait until the current connection's pump has delivered its close event
    pub async fn closed(&mut self) {
        if let Some(task) = self.pump_task.take() {
            let _ = task.await;
        }
    }

    /// Send `{"cmd": cmd, "data": data}` over the live channel
    pub fn send(&self, cmd: &str, data: Value) {
        match &self.connection {
            Some(handle) => handle.send(cmd, data),
            None => tracing::debug!(cmd, "No live channel, command dropped"),
        }
    }

    pub fn apply_batch(&self, batch: &UpdateBatch, forced: bool) -> usize {
        self.router.lock().apply_batch(batch, forced)
    }

    pub fn apply_single(&self, key: &str, payload: &Value, forced: bool) -> bool {
        self.router.lock().apply_single(key, payload, forced)
    }

    /// Set the cooldown window; zero disables throttling
    pub fn set_reload_cooldown(&self, window: Duration) {
        self.router.lock().set_reload_cooldown(window);
    }

    pub fn connection(&self) -> Option<&ConnectionHandle> {
        self.connection.as_ref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map_or(ConnectionState::Absent, ConnectionHandle::state)
    }

    /// URLs subscribed on every open, taken from the snapshot
    pub fn subscriptions(&self) -> &[(UpdateKey, String)] {
        &self.subscriptions
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Connection events flowing into the router
struct RouterSink {
    router: Arc<Mutex<DispatchRouter>>,
    subscriptions: Vec<(UpdateKey, String)>,
    /// Keys not yet delivered on this connection
    unsynced: HashSet<UpdateKey>,
}

impl RouterSink {
    fn new(router: Arc<Mutex<DispatchRouter>>, subscriptions: Vec<(UpdateKey, String)>) -> Self {
        let mut sink = Self {
            router,
            subscriptions,
            unsynced: HashSet::new(),
        };
        sink.reset_unsynced();
        sink
    }

    fn reset_unsynced(&mut self) {
        self.unsynced = self.router.lock().registry().keys().map(str::to_string).collect();
    }
}

impl ConnectionEvents for RouterSink {
    fn on_open(&mut self, handle: &ConnectionHandle) {
        self.reset_unsynced();
        for (key, url) in &self.subscriptions {
            handle.send_envelope(&Envelope::subscribe(key, url));
        }
    }

    fn on_message(&mut self, _handle: &ConnectionHandle, batch: UpdateBatch) {
        // Resync after (re)connecting: each key's first delivery skips the cooldown
        let unsynced = &mut self.unsynced;
        self.router
            .lock()
            .apply_batch_with(&batch, |key| unsynced.remove(key));
    }

    fn on_close(&mut self, handle: &ConnectionHandle, reason: Option<String>) {
        tracing::info!(id = handle.id(), ?reason, "Realtime channel closed");
    }
}

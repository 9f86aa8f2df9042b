//! Relay state: connected clients and the polled URL cache

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::types::{Envelope, UpdateKey, CMD_JSON_DATA};

/// Identifier of one WebSocket connection
pub type ClientId = u64;

/// One polled URL and who wants it
#[derive(Debug)]
pub struct CachedUrl {
    pub url: String,
    /// Last JSON fetched, if any
    pub cached_json: Option<Value>,
    /// Subscribers and the key each one wants the data under
    pub subscribers: Vec<(ClientId, UpdateKey)>,
    pub last_checked: Option<Instant>,
    pub error_count: u32,
}

impl CachedUrl {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            cached_json: None,
            subscribers: Vec::new(),
            last_checked: None,
            error_count: 0,
        }
    }

    /// Whether the URL is due for another poll at `now`
    pub fn poll_needed(&self, now: Instant, interval: std::time::Duration) -> bool {
        match self.last_checked {
            None => true,
            Some(last) => now.saturating_duration_since(last) > interval,
        }
    }
}

/// Shared state of the relay server
pub struct RelayState {
    config: RelayConfig,
    clients: RwLock<HashMap<ClientId, mpsc::UnboundedSender<String>>>,
    urls: RwLock<HashMap<String, CachedUrl>>,
    next_client_id: AtomicU64,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            clients: RwLock::new(HashMap::new()),
            urls: RwLock::new(HashMap::new()),
            next_client_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Register a connection; frames for it arrive on the returned receiver
    pub fn register(&self) -> (ClientId, mpsc::UnboundedReceiver<String>) {
        let id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.write().insert(id, tx);
        tracing::info!(client = id, "Registered client");
        (id, rx)
    }

    /// Forget a connection and every URL only it was watching
    pub fn unregister(&self, client: ClientId) {
        if self.clients.write().remove(&client).is_none() {
            return;
        }
        tracing::info!(client, "Unregistered client");

        let mut urls = self.urls.write();
        for cache in urls.values_mut() {
            cache.subscribers.retain(|(id, _)| *id != client);
        }
        urls.retain(|url, cache| {
            let keep = !cache.subscribers.is_empty();
            if !keep {
                tracing::info!(url = %url, "Removed stale cached URL");
            }
            keep
        });
    }

    /// Subscribe `client` to `url` under `key`.
    ///
    /// One client may watch a URL under several keys; repeating a
    /// `(client, key)` pair is a no-op. Sends the cached JSON right away when
    /// there is some.
    pub fn subscribe(&self, client: ClientId, key: &str, url: &str) {
        let cached = {
            let mut urls = self.urls.write();
            let cache = urls.entry(url.to_string()).or_insert_with(|| CachedUrl::new(url));
            if !cache.subscribers.iter().any(|(id, k)| *id == client && k == key) {
                cache.subscribers.push((client, key.to_string()));
            }
            cache.cached_json.clone()
        };
        tracing::debug!(client, key, url, "Subscribed");

        if let Some(json) = cached {
            tracing::debug!(client, url, "Sending cached JSON");
            self.send_to(client, &update_frame(key, json));
        }
    }

    /// Drop every key `client` watches `url` under
    pub fn unsubscribe(&self, client: ClientId, url: &str) {
        let mut urls = self.urls.write();
        let Some(cache) = urls.get_mut(url) else {
            return;
        };
        cache.subscribers.retain(|(id, _)| *id != client);
        if cache.subscribers.is_empty() {
            urls.remove(url);
        }
    }

    /// URLs whose last poll is older than the poll interval
    pub fn due_urls(&self, now: Instant) -> Vec<String> {
        self.urls
            .read()
            .values()
            .filter(|cache| cache.poll_needed(now, self.config.poll_interval))
            .map(|cache| cache.url.clone())
            .collect()
    }

    /// Apply a poll result. Returns how many clients were sent new data.
    pub fn record_poll(&self, url: &str, now: Instant, result: Result<Value, RelayError>) -> usize {
        let mut urls = self.urls.write();
        let Some(cache) = urls.get_mut(url) else {
            // Unsubscribed while the request was in flight
            return 0;
        };

        let json = match result {
            Ok(json) => json,
            Err(e) => {
                cache.error_count += 1;
                tracing::error!(url, error = %e, errors = cache.error_count, "Poll failed");
                if cache.error_count > self.config.max_errors {
                    tracing::info!(url, "Removing cached URL as it has too many errors");
                    urls.remove(url);
                }
                return 0;
            }
        };

        cache.last_checked = Some(now);
        if cache.cached_json.as_ref() == Some(&json) {
            return 0;
        }

        let frames: Vec<(ClientId, String)> = cache
            .subscribers
            .iter()
            .map(|(client, key)| (*client, update_frame(key, json.clone())))
            .collect();
        cache.cached_json = Some(json);
        drop(urls);

        tracing::info!(url, clients = frames.len(), "JSON changed, informing clients");
        for (client, frame) in &frames {
            self.send_to(*client, frame);
        }
        frames.len()
    }

    /// Queue a text frame for one client
    pub fn send_to(&self, client: ClientId, frame: &str) {
        if let Some(tx) = self.clients.read().get(&client) {
            // A closed receiver means the socket task is already gone
            let _ = tx.send(frame.to_string());
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    pub fn url_count(&self) -> usize {
        self.urls.read().len()
    }

    pub fn subscriber_count(&self, url: &str) -> usize {
        self.urls
            .read()
            .get(url)
            .map_or(0, |cache| cache.subscribers.len())
    }
}

/// `{"cmd":"krtJSONData","data":{key: json}}`
pub fn update_frame(key: &str, json: Value) -> String {
    let mut data = Map::new();
    data.insert(key.to_string(), json);
    Envelope::new(CMD_JSON_DATA, Value::Object(data)).to_json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    const URL: &str = "http://host/json/globalstatus";

    fn state() -> RelayState {
        RelayState::new(RelayConfig::default())
    }

    #[tokio::test]
    async fn test_change_is_pushed_once() {
        let state = state();
        let (client, mut rx) = state.register();
        state.subscribe(client, "global", URL);

        let now = Instant::now();
        assert_eq!(state.record_poll(URL, now, Ok(json!({"build_load": 13}))), 1);
        assert_eq!(
            rx.recv().await.unwrap(),
            r#"{"cmd":"krtJSONData","data":{"global":{"build_load":13}}}"#
        );

        // Same JSON again: nobody is notified
        assert_eq!(state.record_poll(URL, now, Ok(json!({"build_load": 13}))), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cached_json_sent_on_subscribe() {
        let state = state();
        let (first, _rx1) = state.register();
        state.subscribe(first, "global", URL);
        state.record_poll(URL, Instant::now(), Ok(json!({"slaves_count": 5})));

        let (second, mut rx2) = state.register();
        state.subscribe(second, "status", URL);
        assert_eq!(
            rx2.recv().await.unwrap(),
            r#"{"cmd":"krtJSONData","data":{"status":{"slaves_count":5}}}"#
        );
    }

    #[test]
    fn test_unregister_evicts_orphaned_urls() {
        let state = state();
        let (a, _rxa) = state.register();
        let (b, _rxb) = state.register();
        state.subscribe(a, "global", URL);
        state.subscribe(b, "global", URL);
        state.subscribe(a, "builders", "http://host/json/builders");

        state.unregister(a);
        assert_eq!(state.url_count(), 1);
        assert_eq!(state.subscriber_count(URL), 1);

        state.unregister(b);
        assert_eq!(state.url_count(), 0);
        assert_eq!(state.client_count(), 0);
    }

    #[tokio::test]
    async fn test_one_url_under_two_keys() {
        let state = state();
        let (client, mut rx) = state.register();
        state.subscribe(client, "global", URL);
        state.subscribe(client, "status", URL);
        state.subscribe(client, "global", URL);
        assert_eq!(state.subscriber_count(URL), 2);

        assert_eq!(state.record_poll(URL, Instant::now(), Ok(json!({"build_load": 1}))), 2);
        assert_eq!(
            rx.recv().await.unwrap(),
            r#"{"cmd":"krtJSONData","data":{"global":{"build_load":1}}}"#
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            r#"{"cmd":"krtJSONData","data":{"status":{"build_load":1}}}"#
        );

        state.unsubscribe(client, URL);
        assert_eq!(state.url_count(), 0);
    }

    #[test]
    fn test_evicted_after_too_many_errors() {
        let state = RelayState::new(RelayConfig {
            max_errors: 2,
            ..RelayConfig::default()
        });
        let (client, _rx) = state.register();
        state.subscribe(client, "global", URL);

        let now = Instant::now();
        for _ in 0..2 {
            state.record_poll(URL, now, Err(RelayError::Io(std::io::Error::other("down"))));
            assert_eq!(state.url_count(), 1);
        }
        state.record_poll(URL, now, Err(RelayError::Io(std::io::Error::other("down"))));
        assert_eq!(state.url_count(), 0);
    }

    #[test]
    fn test_due_urls_respect_interval() {
        let state = state();
        let (client, _rx) = state.register();
        state.subscribe(client, "global", URL);

        let now = Instant::now();
        assert_eq!(state.due_urls(now), vec![URL.to_string()]);

        state.record_poll(URL, now, Ok(json!({})));
        assert!(state.due_urls(now + Duration::from_secs(5)).is_empty());
        assert_eq!(state.due_urls(now + Duration::from_secs(6)).len(), 1);
    }
}

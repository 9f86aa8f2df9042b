//! URL poller feeding the relay
//!
//! Wakes up every tick, fetches every due URL concurrently and hands the
//! results to [`RelayState::record_poll`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::Value;
use tokio::time::{interval, MissedTickBehavior};

use super::websocket::RelayState;
use crate::error::RelayResult;

/// Periodically polls subscribed URLs
pub struct UrlPoller {
    state: Arc<RelayState>,
    http: reqwest::Client,
}

impl UrlPoller {
    pub fn new(state: Arc<RelayState>) -> Self {
        Self {
            state,
            http: reqwest::Client::new(),
        }
    }

    /// Poll every due URL once. Returns how many notifications went out.
    pub async fn poll_due(&self) -> usize {
        let due = self.state.due_urls(Instant::now());
        if due.is_empty() {
            return 0;
        }
        tracing::debug!(urls = due.len(), "Polling");

        let timeout = self.state.config().request_timeout();
        let results = join_all(due.into_iter().map(|url| async move {
            let result = fetch_json(&self.http, &url, timeout).await;
            (url, result)
        }))
        .await;

        let now = Instant::now();
        results
            .into_iter()
            .map(|(url, result)| self.state.record_poll(&url, now, result))
            .sum()
    }

    /// Run the poller as an async task
    pub async fn run(self) {
        let mut timer = interval(self.state.config().tick_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            self.poll_due().await;
        }
    }
}

async fn fetch_json(http: &reqwest::Client, url: &str, timeout: Duration) -> RelayResult<Value> {
    let json = http
        .get(url)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?
        .json::<Value>()
        .await?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;

    #[tokio::test]
    async fn test_nothing_due_means_no_requests() {
        let state = Arc::new(RelayState::new(RelayConfig::default()));
        let poller = UrlPoller::new(state);
        assert_eq!(poller.poll_due().await, 0);
    }

    #[tokio::test]
    async fn test_unreachable_url_counts_as_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let state = Arc::new(RelayState::new(RelayConfig {
            max_errors: 0,
            ..RelayConfig::default()
        }));
        let (client, _rx) = state.register();
        state.subscribe(client, "global", &format!("http://127.0.0.1:{}/json", port));

        let poller = UrlPoller::new(state.clone());
        assert_eq!(poller.poll_due().await, 0);
        assert_eq!(state.url_count(), 0);
    }
}

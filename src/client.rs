// src/client.rs
use crate::models::{Allocation, Document, Holding, Performance, Summary};
use log::{debug, error, warn};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

pub const LOAD_FAILED_MESSAGE: &str =
    "Failed to fetch data. Please ensure the backend is running and accessible.";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error! status: {0}")]
    Status(StatusCode),

    #[error("request cancelled")]
    Cancelled,

    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    /// Upper bound on a whole dashboard load, retries included.
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(1000),
            deadline: None,
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Signals teardown to in-flight loads. Dropping the handle cancels too.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once `cancel` is called or the handle is dropped.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Everything the dashboard renders, with store envelopes stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardData {
    pub holdings: Vec<Holding>,
    pub allocation: Allocation,
    pub performance: Performance,
    pub summary: Summary,
}

/// Outcome of a dashboard load: the data, or the message shown in its place.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Failed(String),
    Ready(Box<DashboardData>),
}

impl LoadState {
    pub fn from_result(result: Result<DashboardData, ClientError>) -> Self {
        match result {
            Ok(data) => LoadState::Ready(Box::new(data)),
            Err(e) => {
                error!("Error fetching dashboard data: {}", e);
                LoadState::Failed(LOAD_FAILED_MESSAGE.to_string())
            }
        }
    }
}

#[derive(Clone)]
pub struct PortfolioClient {
    http: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl PortfolioClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_policy(base_url, RetryPolicy::default())
    }

    pub fn with_policy(base_url: impl Into<String>, policy: RetryPolicy) -> Self {
        PortfolioClient {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GETs `base_url/path`, retrying transport errors, non-2xx statuses and
    /// undecodable bodies with exponential backoff.
    pub async fn fetch_with_retry<T: DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancelToken,
    ) -> Result<T, ClientError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 0;
        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                result = self.fetch_once::<T>(&url) => result,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!("Attempt {} for {} failed: {}; retrying in {:?}", attempt + 1, url, e, delay);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    error!("Attempt {} for {} failed: {}", attempt + 1, url, e);
                    return Err(e);
                }
            }
        }
    }

    async fn fetch_once<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        debug!("GET {}", url);
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(response.json::<T>().await?)
    }

    /// Fetches the four portfolio endpoints concurrently. The first failure
    /// (after its retries) fails the whole load.
    pub async fn load_dashboard(&self, cancel: &CancelToken) -> Result<DashboardData, ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let load = async {
            let (holdings, allocation, performance, summary) = tokio::try_join!(
                self.fetch_with_retry::<Vec<Document<Holding>>>("holdings", cancel),
                self.fetch_with_retry::<Document<Allocation>>("allocation", cancel),
                self.fetch_with_retry::<Document<Performance>>("performance", cancel),
                self.fetch_with_retry::<Document<Summary>>("summary", cancel),
            )?;
            Ok::<_, ClientError>(DashboardData {
                holdings: holdings.into_iter().map(Document::into_body).collect(),
                allocation: allocation.into_body(),
                performance: performance.into_body(),
                summary: summary.into_body(),
            })
        };

        match self.policy.deadline {
            Some(deadline) => tokio::time::timeout(deadline, load)
                .await
                .map_err(|_| ClientError::DeadlineExceeded(deadline))?,
            None => load.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api;
    use crate::db::MemoryStore;
    use crate::seed::sample_portfolio;
    use crate::service::PortfolioService;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use warp::Filter;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(10),
            deadline: None,
        }
    }

    async fn seeded_server() -> SocketAddr {
        let service = PortfolioService::new(Arc::new(MemoryStore::new()));
        service.seed_portfolio(sample_portfolio()).await.unwrap();
        let (addr, server) =
            warp::serve(api::routes(Arc::new(service))).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn loads_all_four_endpoints() {
        let addr = seeded_server().await;
        let client = PortfolioClient::with_policy(format!("http://{}/api/portfolio", addr), fast_policy());
        let (_handle, token) = cancel_pair();

        let data = client.load_dashboard(&token).await.unwrap();
        let seed = sample_portfolio();
        assert_eq!(data.holdings, seed.holdings);
        assert_eq!(data.allocation, seed.allocation);
        assert_eq!(data.performance, seed.performance);
        assert_eq!(data.summary, seed.summary);
    }

    #[tokio::test]
    async fn retries_until_attempts_are_exhausted() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let failing = warp::path!("api" / "portfolio" / "summary").map(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            warp::reply::with_status("down", warp::http::StatusCode::SERVICE_UNAVAILABLE)
        });
        let (addr, server) = warp::serve(failing).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let client = PortfolioClient::with_policy(format!("http://{}/api/portfolio", addr), fast_policy());
        let (_handle, token) = cancel_pair();
        let result = client.fetch_with_retry::<Document<Summary>>("summary", &token).await;

        assert!(matches!(result, Err(ClientError::Status(s)) if s == StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_after_a_transient_failure() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let flaky = warp::path!("api" / "portfolio" / "summary").map(move || {
            let status = if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                warp::http::StatusCode::INTERNAL_SERVER_ERROR
            } else {
                warp::http::StatusCode::OK
            };
            warp::reply::with_status(
                warp::reply::json(&Document::new(sample_portfolio().summary)),
                status,
            )
        });
        let (addr, server) = warp::serve(flaky).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let client = PortfolioClient::with_policy(format!("http://{}/api/portfolio", addr), fast_policy());
        let (_handle, token) = cancel_pair();
        let summary = client
            .fetch_with_retry::<Document<Summary>>("summary", &token)
            .await
            .unwrap();
        assert_eq!(summary.body.risk_level, "Moderate");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn one_missing_endpoint_fails_the_whole_load() {
        let service = PortfolioService::new(Arc::new(MemoryStore::new()));
        let (addr, server) =
            warp::serve(api::routes(Arc::new(service))).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let client = PortfolioClient::with_policy(format!("http://{}/api/portfolio", addr), fast_policy());
        let (_handle, token) = cancel_pair();
        let state = LoadState::from_result(client.load_dashboard(&token).await);
        assert_eq!(state, LoadState::Failed(LOAD_FAILED_MESSAGE.to_string()));
    }

    #[tokio::test]
    async fn dropping_the_handle_abandons_retries() {
        let slow = RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_secs(30),
            deadline: None,
        };
        // Nothing listens on port 9 of localhost in the test environment.
        let client = PortfolioClient::with_policy("http://127.0.0.1:9/api/portfolio", slow);
        let (handle, token) = cancel_pair();

        let task = tokio::spawn(async move { client.load_dashboard(&token).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(handle);

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(ClientError::Cancelled)));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let client = PortfolioClient::new("http://127.0.0.1:9/api/portfolio");
        let (handle, token) = cancel_pair();
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(client.load_dashboard(&token).await, Err(ClientError::Cancelled)));
    }

    #[tokio::test]
    async fn deadline_bounds_the_load() {
        let policy = RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_secs(30),
            deadline: Some(Duration::from_millis(100)),
        };
        let client = PortfolioClient::with_policy("http://127.0.0.1:9/api/portfolio", policy);
        let (_handle, token) = cancel_pair();
        assert!(matches!(
            client.load_dashboard(&token).await,
            Err(ClientError::DeadlineExceeded(_))
        ));
    }
}

//! # REST API Client
//!
//! JSON client for an external REST backend with:
//!
//! - a per-request timeout
//! - `max_retries` attempts with linear backoff (`retry_delay * attempt`)
//! - an offline queue for mutating requests
//!
//! Every failure is retried the same way, whether it is a timeout, a 500 or
//! a 400; the client does not classify errors as retryable or fatal.

use log::{debug, info, warn};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

use crate::backend::config::ApiConfig;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("server returned {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("invalid JSON response: {0}")]
    Decode(String),

    #[error("client is offline")]
    Offline,
}

/// Outcome of a mutating request
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Completed(Value),
    /// Stored for replay; `position` is its 1-based place in the queue
    Queued { position: usize },
}

/// A mutating request waiting for connectivity
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Result of replaying the offline queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub sent: usize,
    pub failed: usize,
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    online: AtomicBool,
    queue: Mutex<VecDeque<QueuedRequest>>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            http: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            online: AtomicBool::new(true),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Override timing (tests, fast local backends)
    pub fn with_timing(mut self, timeout: Duration, max_retries: u32, retry_delay: Duration) -> Self {
        self.timeout = timeout;
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn set_online(&self, online: bool) {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online != online {
            info!("API client is now {}", if online { "online" } else { "offline" });
        }
    }

    pub fn queued_requests(&self) -> Vec<QueuedRequest> {
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.iter().cloned().collect()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        if !self.is_online() {
            return Err(ApiError::Offline);
        }
        self.send_with_retry(&Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.mutate(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.mutate(Method::PUT, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.mutate(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.mutate(Method::DELETE, path, None).await
    }

    async fn mutate(&self, method: Method, path: &str, body: Option<Value>) -> Result<ApiResponse, ApiError> {
        if !self.is_online() {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            queue.push_back(QueuedRequest { method: method.clone(), path: path.to_string(), body });
            debug!("Queued {} {} while offline ({} waiting)", method, path, queue.len());
            return Ok(ApiResponse::Queued { position: queue.len() });
        }

        self.send_with_retry(&method, path, body.as_ref())
            .await
            .map(ApiResponse::Completed)
    }

    /// Replay queued requests in FIFO order; failures stay queued
    pub async fn flush_queue(&self) -> FlushReport {
        if !self.is_online() {
            return FlushReport::default();
        }

        let pending: Vec<QueuedRequest> = {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            queue.drain(..).collect()
        };
        if pending.is_empty() {
            return FlushReport::default();
        }
        info!("Replaying {} queued requests", pending.len());

        let mut report = FlushReport::default();
        let mut failed = Vec::new();
        for request in pending {
            match self
                .send_with_retry(&request.method, &request.path, request.body.as_ref())
                .await
            {
                Ok(_) => report.sent += 1,
                Err(e) => {
                    warn!("Queued {} {} failed again: {}", request.method, request.path, e);
                    report.failed += 1;
                    failed.push(request);
                }
            }
        }

        // Failed requests go back ahead of anything queued during the flush
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        for request in failed.into_iter().rev() {
            queue.push_front(request);
        }
        report
    }

    async fn send_with_retry(&self, method: &Method, path: &str, body: Option<&Value>) -> Result<Value, ApiError> {
        let mut attempt = 1;
        loop {
            match self.send_once(method, path, body).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_retries => return Err(e),
                Err(e) => {
                    let delay = self.retry_delay * attempt;
                    warn!(
                        "{} {} failed (attempt {}/{}): {}; retrying in {:?}",
                        method, path, attempt, self.max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn send_once(&self, method: &Method, path: &str, body: Option<&Value>) -> Result<Value, ApiError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self.http.request(method.clone(), &url).timeout(self.timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(self.timeout)
            } else {
                ApiError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| ApiError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(ApiError::Http { status, body: text });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

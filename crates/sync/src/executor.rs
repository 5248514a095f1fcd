//! Authenticated HTTP execution against the backend API.

use reqwest::{Client, Method};
use serde_json::Value;
use wareflow_core::WarehouseId;

use crate::error::SyncError;
use crate::retry::RetryPolicy;

/// Header carrying the acting warehouse on every request.
pub const WAREHOUSE_HEADER: &str = "X-Warehouse-ID";

/// Issues requests with bearer auth, the warehouse header, a per-attempt
/// timeout and bounded exponential retry. Every attempt is a fresh request;
/// the error surfaced after the final attempt is the last one observed.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    http: Client,
    base_url: String,
    api_key: String,
    warehouse_id: WarehouseId,
    retry: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        warehouse_id: WarehouseId,
        retry: RetryPolicy,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http: Client::new(),
            base_url,
            api_key: api_key.into(),
            warehouse_id,
            retry,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Execute and decode the response as JSON. An empty success body
    /// decodes to `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, SyncError> {
        let bytes = self.execute(method, path, body).await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| SyncError::Parse(e.to_string()))
    }

    /// Execute and return the raw response bytes (export blobs).
    pub async fn request_bytes(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Vec<u8>, SyncError> {
        self.execute(method, path, body).await
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Vec<u8>, SyncError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_err = SyncError::Network("request never attempted".into());

        for attempt in 1..=self.retry.max_attempts.max(1) {
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let mut req = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&self.api_key)
                .header(WAREHOUSE_HEADER, self.warehouse_id.to_string())
                .timeout(self.retry.request_timeout);
            if let Some(body) = body {
                req = req.json(body);
            }

            match req.send().await {
                Ok(resp) if resp.status().is_success() => {
                    if attempt > 1 {
                        tracing::debug!("{} {} succeeded on attempt {}", method, path, attempt);
                    }
                    let bytes = resp
                        .bytes()
                        .await
                        .map_err(|e| SyncError::from_reqwest(e, self.retry.request_timeout))?;
                    return Ok(bytes.to_vec());
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    last_err = SyncError::HttpStatus { status, body };
                }
                Err(e) => {
                    last_err = SyncError::from_reqwest(e, self.retry.request_timeout);
                }
            }

            if self.retry.should_retry(attempt) {
                tracing::warn!(
                    "{} {} failed on attempt {} of {}: {}",
                    method,
                    path,
                    attempt,
                    self.retry.max_attempts,
                    last_err
                );
            }
        }

        Err(last_err)
    }
}

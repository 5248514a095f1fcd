//! Signed webhook delivery.

use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use sha2::Sha256;

use crate::error::SyncError;
use crate::types::WebhookPayload;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `body` keyed by `secret`. The signature
/// covers the exact bytes sent on the wire.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Target and signing secret for outbound webhooks.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub secret: String,
}

/// What happened to a delivery attempt that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Delivered,
    /// No webhook URL configured; nothing was sent.
    Skipped,
}

/// Posts signed payloads to the configured URL. One attempt per payload,
/// no inline retry: a failed delivery is the caller's cue to queue the
/// payload for the next batch flush.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    http: Client,
    config: Option<WebhookConfig>,
    timeout: Duration,
}

impl WebhookDispatcher {
    pub fn new(config: Option<WebhookConfig>, timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            config,
            timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Serialize, sign and POST the payload.
    pub async fn deliver(&self, payload: &WebhookPayload) -> Result<WebhookOutcome, SyncError> {
        let Some(config) = &self.config else {
            return Ok(WebhookOutcome::Skipped);
        };

        let body = serde_json::to_vec(payload).map_err(|e| SyncError::Parse(e.to_string()))?;
        let signature = sign(config.secret.as_bytes(), &body);

        let resp = self
            .http
            .post(&config.url)
            .header(SIGNATURE_HEADER, signature)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(e, self.timeout))?;

        if !resp.status().is_success() {
            return Err(SyncError::HttpStatus {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        tracing::debug!("Webhook '{}' delivered", payload.event);
        Ok(WebhookOutcome::Delivered)
    }
}

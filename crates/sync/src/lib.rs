//! `wareflow-sync` — the integration sync client for the warehouse
//! dashboard.
//!
//! This crate provides:
//! - a bounded outbound queue with batch flush for offline writes
//! - one HTTP executor carrying auth headers and bounded exponential retry
//! - HMAC-signed webhook delivery for domain events
//! - validated external-system adapters with recurring pull timers
//! - a realtime websocket channel feeding typed events to subscribers
//!
//! [`client::SyncClient`] ties these together; each module is usable on
//! its own.

pub mod adapter;
pub mod client;
pub mod connectivity;
pub mod driver;
pub mod error;
pub mod executor;
pub mod queue;
pub mod realtime;
pub mod retry;
pub mod store;
pub mod types;
pub mod webhook;

pub use client::{ClientConfig, DEFAULT_BATCH_SIZE, SyncClient};
pub use driver::DEFAULT_FLUSH_INTERVAL;
pub use error::SyncError;
pub use queue::{DEFAULT_QUEUE_CAP, OutboundQueue};
pub use retry::RetryPolicy;
pub use types::{
    Alert, AlertSeverity, ClientStatus, ConnectivityState, ExportFormat, ExportRequest,
    ExternalSystemConfig, FieldMappings, HealthStatus, Item, ItemPatch, Movement,
    MovementCarrier, MovementStatus, SyncOperation, SyncResult, SystemType, Transaction,
    TransactionKind, Visibility, WebhookPayload, WebhookSource,
};
pub use webhook::{WebhookConfig, WebhookOutcome};

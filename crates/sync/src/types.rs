//! Wire types shared across the sync client.
//!
//! Everything here serializes to the camelCase JSON the backend speaks.
//! Enum wire casing varies per field and is pinned by serde attributes,
//! not by convention.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wareflow_core::{DomainError, DomainResult, ItemId, MovementId, TransactionId, WarehouseId};

/// Local item fields a field mapping may target. Wire names, camelCase.
pub const LOCAL_ITEM_FIELDS: &[&str] = &[
    "sku",
    "name",
    "quantity",
    "location",
    "category",
    "unitPrice",
    "reorderLevel",
    "updatedAt",
];

/// Operation kinds carried by [`SyncOperation::kind`].
pub mod op_kind {
    pub const ITEM_CREATE: &str = "item_create";
    pub const ITEM_UPDATE: &str = "item_update";
    pub const ITEM_DELETE: &str = "item_delete";
    pub const ITEM_BULK_UPDATE: &str = "item_bulk_update";
    pub const ITEM_SYNC: &str = "item_sync";
    pub const MOVEMENT_CREATE: &str = "movement_create";
    pub const MOVEMENT_STATUS: &str = "movement_status";
    pub const TRANSACTION_RECORD: &str = "transaction_record";
    pub const ALERT_SEND: &str = "alert_send";
    pub const WEBHOOK: &str = "webhook";
}

/// A deferred unit of outbound work, produced when an immediate request
/// fails or the client is offline. Flushed later as part of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    pub kind: String,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
}

impl SyncOperation {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            enqueued_at: Utc::now(),
        }
    }
}

/// Which subsystem produced a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookSource {
    Inventory,
    Movement,
    Transaction,
    Alert,
}

/// Body of an outbound webhook POST. Signed as exact bytes, so field
/// order and casing here are part of the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
    pub source: WebhookSource,
    pub warehouse_id: WarehouseId,
}

impl WebhookPayload {
    pub fn new(
        event: impl Into<String>,
        source: WebhookSource,
        data: Value,
        warehouse_id: WarehouseId,
    ) -> Self {
        Self {
            event: event.into(),
            timestamp: Utc::now(),
            data,
            source,
            warehouse_id,
        }
    }
}

/// Category of external system an adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemType {
    Erp,
    Wms,
    Crm,
    Accounting,
    Ecommerce,
}

impl SystemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemType::Erp => "ERP",
            SystemType::Wms => "WMS",
            SystemType::Crm => "CRM",
            SystemType::Accounting => "ACCOUNTING",
            SystemType::Ecommerce => "ECOMMERCE",
        }
    }
}

/// Local-field to remote-field pairs applied when pulling external data.
/// Keyed by local field, so each local field has at most one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMappings(BTreeMap<String, String>);

impl FieldMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, L, R>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (L, R)>,
        L: Into<String>,
        R: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(local, remote)| (local.into(), remote.into()))
                .collect(),
        )
    }

    pub fn insert(&mut self, local: impl Into<String>, remote: impl Into<String>) {
        self.0.insert(local.into(), remote.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(l, r)| (l.as_str(), r.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reject mappings onto fields the local item schema does not have,
    /// and blank remote field names.
    pub fn validate(&self, known_local_fields: &[&str]) -> DomainResult<()> {
        for (local, remote) in self.iter() {
            if !known_local_fields.contains(&local) {
                return Err(DomainError::validation(format!(
                    "unknown local field '{local}' in mapping"
                )));
            }
            if remote.trim().is_empty() {
                return Err(DomainError::validation(format!(
                    "empty remote field mapped to '{local}'"
                )));
            }
        }
        Ok(())
    }
}

/// Connection settings for one external system, persisted under the
/// `external_systems` storage key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSystemConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub system_type: SystemType,
    pub endpoint: String,
    pub api_key: String,
    pub mappings: FieldMappings,
    pub sync_interval_minutes: u64,
    pub enabled: bool,
}

impl ExternalSystemConfig {
    /// Config-time validation, run before any network traffic.
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("system name must not be empty"));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(DomainError::validation(format!(
                "endpoint '{}' must be an http(s) URL",
                self.endpoint
            )));
        }
        if self.sync_interval_minutes == 0 {
            return Err(DomainError::validation(
                "sync interval must be at least one minute",
            ));
        }
        self.mappings.validate(LOCAL_ITEM_FIELDS)
    }
}

/// Outcome summary of one sync pass, recomputed on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    pub synced_count: usize,
    pub failed_count: usize,
    pub errors: Vec<String>,
    pub last_sync_timestamp: DateTime<Utc>,
}

impl SyncResult {
    /// A flush that found nothing to do.
    pub fn noop() -> Self {
        Self {
            success: true,
            synced_count: 0,
            failed_count: 0,
            errors: Vec::new(),
            last_sync_timestamp: Utc::now(),
        }
    }
}

/// Server reply to a batch flush. Fields default to zero so older
/// backends replying with an empty body still parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchSyncResponse {
    #[serde(default)]
    pub synced: usize,
    #[serde(default)]
    pub failed: usize,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Reply from `GET /health`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Snapshot of client state for host dashboards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStatus {
    pub connectivity: ConnectivityState,
    pub visibility: Visibility,
    pub queued_operations: usize,
    pub external_systems: Vec<String>,
}

/// A catalog item as the backend stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorder_level: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

/// Partial item update, used by bulk updates. Absent fields stay as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub id: ItemId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorder_level: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementCarrier {
    Truck,
    Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementStatus {
    Pending,
    InTransit,
    Delivered,
    Cancelled,
}

impl MovementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementStatus::Pending => "pending",
            MovementStatus::InTransit => "in_transit",
            MovementStatus::Delivered => "delivered",
            MovementStatus::Cancelled => "cancelled",
        }
    }
}

/// An inbound or outbound movement of stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub id: MovementId,
    pub item_id: ItemId,
    pub quantity: i64,
    pub carrier: MovementCarrier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub status: MovementStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Inbound,
    Outbound,
    Adjustment,
}

/// A stock-level transaction against one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub item_id: ItemId,
    pub kind: TransactionKind,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// A dashboard alert pushed to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub severity: AlertSeverity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

/// Request body for `POST /export`. The reply is an opaque byte blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub filters: Value,
}

//! The sync client facade.
//!
//! One instance owns the outbound queue, the HTTP executor, the webhook
//! dispatcher, connectivity state, external system adapters and the
//! realtime channel. Hosts construct it once with [`SyncClient::start`]
//! and share it behind the returned [`Arc`].

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use reqwest::Method;
use serde_json::{Value, json};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use wareflow_core::{ItemId, MovementId, WarehouseId};
use wareflow_events::{EventDispatcher, RealtimeEventKind, Subscription};

use crate::adapter::AdapterRegistry;
use crate::connectivity::ConnectivityMonitor;
use crate::driver;
use crate::error::SyncError;
use crate::executor::RequestExecutor;
use crate::queue::{DEFAULT_QUEUE_CAP, OutboundQueue};
use crate::realtime;
use crate::retry::RetryPolicy;
use crate::store::ConfigStore;
use crate::types::{
    Alert, BatchSyncResponse, ClientStatus, ExportRequest, ExternalSystemConfig, HealthStatus,
    Item, ItemPatch, Movement, MovementStatus, SyncOperation, SyncResult, Transaction, Visibility,
    WebhookPayload, WebhookSource, op_kind,
};
use crate::webhook::{WebhookConfig, WebhookDispatcher, WebhookOutcome};

/// Operations drained per flush.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Everything needed to start a [`SyncClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend API base URL, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub api_key: String,
    /// Warehouse this client acts for.
    pub warehouse_id: WarehouseId,
    /// Outbound webhook target. None disables webhooks entirely.
    pub webhook: Option<WebhookConfig>,
    pub retry: RetryPolicy,
    /// Periodic flush interval.
    pub flush_interval: Duration,
    /// Operations drained per flush.
    pub batch_size: usize,
    /// Outbound queue capacity; oldest entries evict past it.
    pub queue_capacity: usize,
    /// Storage directory override. None uses the platform data dir.
    pub storage_root: Option<PathBuf>,
    /// Whether to open the realtime websocket channel.
    pub realtime: bool,
}

impl ClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        warehouse_id: WarehouseId,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            warehouse_id,
            webhook: None,
            retry: RetryPolicy::default(),
            flush_interval: driver::DEFAULT_FLUSH_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAP,
            storage_root: None,
            realtime: true,
        }
    }
}

/// The integration sync client. See the crate docs for the full picture.
///
/// Domain methods try the request immediately; on failure the operation is
/// queued for a later batch flush and the error is still returned, so the
/// caller can tell the user while the client retries in the background.
pub struct SyncClient {
    config: ClientConfig,
    executor: RequestExecutor,
    webhook: WebhookDispatcher,
    queue: Mutex<OutboundQueue>,
    flush_lock: tokio::sync::Mutex<()>,
    connectivity: ConnectivityMonitor,
    dispatcher: Arc<EventDispatcher>,
    adapters: Arc<AdapterRegistry>,
    driver_stop: Arc<Notify>,
    realtime_stop: Arc<Notify>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncClient {
    /// Build the client and start its background work: the periodic flush
    /// driver, pull timers for persisted enabled systems, and the realtime
    /// channel when enabled.
    pub async fn start(config: ClientConfig) -> Result<Arc<Self>, SyncError> {
        let store = match &config.storage_root {
            Some(root) => ConfigStore::open_at(root)?,
            None => ConfigStore::open_default()?,
        };
        let executor = RequestExecutor::new(
            &config.base_url,
            &config.api_key,
            config.warehouse_id,
            config.retry.clone(),
        );
        let webhook = WebhookDispatcher::new(config.webhook.clone(), config.retry.request_timeout);
        let adapters = Arc::new(AdapterRegistry::new(
            executor.clone(),
            store,
            config.retry.request_timeout,
        ));

        let client = Arc::new(Self {
            queue: Mutex::new(OutboundQueue::with_capacity(config.queue_capacity)),
            flush_lock: tokio::sync::Mutex::new(()),
            connectivity: ConnectivityMonitor::new(),
            dispatcher: Arc::new(EventDispatcher::new()),
            driver_stop: Arc::new(Notify::new()),
            realtime_stop: Arc::new(Notify::new()),
            tasks: Mutex::new(Vec::new()),
            executor,
            webhook,
            adapters,
            config,
        });

        client.adapters.resume_persisted()?;

        let driver_handle = driver::spawn_flush_driver(
            Arc::clone(&client),
            client.config.flush_interval,
            Arc::clone(&client.driver_stop),
        );
        client.lock_tasks().push(driver_handle);

        if client.config.realtime {
            let realtime_handle = realtime::spawn_realtime_channel(
                client.config.base_url.clone(),
                client.config.api_key.clone(),
                client.config.warehouse_id,
                Arc::clone(&client.dispatcher),
                Arc::clone(&client.realtime_stop),
            );
            client.lock_tasks().push(realtime_handle);
        }

        tracing::info!(
            "Sync client started for warehouse {}",
            client.config.warehouse_id
        );
        Ok(client)
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.config.warehouse_id
    }

    // ---- Items ----

    pub async fn create_item(&self, item: &Item) -> Result<Value, SyncError> {
        let payload = to_payload(item)?;
        self.submit(
            Method::POST,
            "/items",
            op_kind::ITEM_CREATE,
            payload,
            Some(("item.created", WebhookSource::Inventory)),
        )
        .await
    }

    pub async fn update_item(&self, item: &Item) -> Result<Value, SyncError> {
        let path = format!("/items/{}", item.id);
        let payload = to_payload(item)?;
        self.submit(
            Method::PUT,
            &path,
            op_kind::ITEM_UPDATE,
            payload,
            Some(("item.updated", WebhookSource::Inventory)),
        )
        .await
    }

    pub async fn delete_item(&self, id: ItemId) -> Result<Value, SyncError> {
        let path = format!("/items/{id}");
        self.submit_bodyless(
            Method::DELETE,
            &path,
            op_kind::ITEM_DELETE,
            json!({ "id": id }),
            Some(("item.deleted", WebhookSource::Inventory)),
        )
        .await
    }

    pub async fn bulk_update_items(&self, patches: &[ItemPatch]) -> Result<Value, SyncError> {
        let payload = json!({ "items": patches });
        self.submit(
            Method::POST,
            "/items/bulk-update",
            op_kind::ITEM_BULK_UPDATE,
            payload,
            Some(("items.bulk_updated", WebhookSource::Inventory)),
        )
        .await
    }

    /// Push a full item snapshot, replacing the backend's view of them.
    pub async fn sync_items(&self, items: &[Item]) -> Result<Value, SyncError> {
        let payload = json!({ "items": items });
        self.submit(Method::POST, "/items/sync", op_kind::ITEM_SYNC, payload, None)
            .await
    }

    // ---- Movements, transactions, alerts ----

    pub async fn create_movement(&self, movement: &Movement) -> Result<Value, SyncError> {
        let payload = to_payload(movement)?;
        self.submit(
            Method::POST,
            "/movements",
            op_kind::MOVEMENT_CREATE,
            payload,
            Some(("movement.created", WebhookSource::Movement)),
        )
        .await
    }

    pub async fn update_movement_status(
        &self,
        id: MovementId,
        status: MovementStatus,
    ) -> Result<Value, SyncError> {
        let path = format!("/movements/{id}/status");
        let payload = json!({ "id": id, "status": status });
        self.submit(
            Method::PUT,
            &path,
            op_kind::MOVEMENT_STATUS,
            payload,
            Some(("movement.status_changed", WebhookSource::Movement)),
        )
        .await
    }

    pub async fn record_transaction(&self, transaction: &Transaction) -> Result<Value, SyncError> {
        let payload = to_payload(transaction)?;
        self.submit(
            Method::POST,
            "/transactions",
            op_kind::TRANSACTION_RECORD,
            payload,
            Some(("transaction.recorded", WebhookSource::Transaction)),
        )
        .await
    }

    pub async fn send_alert(&self, alert: &Alert) -> Result<Value, SyncError> {
        let payload = to_payload(alert)?;
        self.submit(
            Method::POST,
            "/alerts",
            op_kind::ALERT_SEND,
            payload,
            Some(("alert.triggered", WebhookSource::Alert)),
        )
        .await
    }

    // ---- Reads ----

    pub async fn health(&self) -> Result<HealthStatus, SyncError> {
        let value = self.executor.request(Method::GET, "/health", None).await?;
        serde_json::from_value(value).map_err(|e| SyncError::Parse(e.to_string()))
    }

    /// Probe the backend and update connectivity to match. Restoring
    /// connectivity flushes, exactly like a host online signal.
    pub async fn check_connectivity(&self) -> bool {
        let online = self.health().await.is_ok();
        if online {
            self.set_online().await;
        } else {
            self.set_offline();
        }
        online
    }

    /// Request an export blob. Failures are returned, never queued: the
    /// result only makes sense at the moment the user asked for it.
    pub async fn export(&self, request: &ExportRequest) -> Result<Vec<u8>, SyncError> {
        let body = to_payload(request)?;
        self.executor
            .request_bytes(Method::POST, "/export", Some(&body))
            .await
    }

    // ---- Queue and flush ----

    /// Put an operation on the outbound queue for the next flush.
    pub fn enqueue_operation(&self, op: SyncOperation) {
        let mut queue = self.lock_queue();
        queue.enqueue(op);
        let pending = queue.len();
        drop(queue);
        tracing::debug!("Operation queued ({} pending)", pending);
    }

    pub fn queued_operations(&self) -> usize {
        self.lock_queue().len()
    }

    /// Drain one batch to `POST /sync/batch`. On success the batch is
    /// gone for good; on failure it returns to the head of the queue.
    /// The internal guard serializes concurrent flushes.
    pub async fn flush_now(&self) -> SyncResult {
        let _guard = self.flush_lock.lock().await;

        let batch = self.lock_queue().dequeue_batch(self.config.batch_size);
        if batch.is_empty() {
            return SyncResult::noop();
        }
        let batch_len = batch.len();

        match self
            .executor
            .request(Method::POST, "/sync/batch", Some(&json!({ "items": &batch })))
            .await
        {
            Ok(value) => {
                let response: BatchSyncResponse =
                    serde_json::from_value(value).unwrap_or_else(|_| BatchSyncResponse {
                        synced: batch_len,
                        failed: 0,
                        errors: Vec::new(),
                    });
                tracing::info!(
                    "Flushed {} operation(s): {} synced, {} failed",
                    batch_len,
                    response.synced,
                    response.failed
                );
                SyncResult {
                    success: true,
                    synced_count: response.synced,
                    failed_count: response.failed,
                    errors: response.errors,
                    last_sync_timestamp: Utc::now(),
                }
            }
            Err(err) => {
                tracing::warn!("Flush failed, requeueing {} operation(s): {}", batch_len, err);
                self.lock_queue().requeue_front(batch);
                SyncResult {
                    success: false,
                    synced_count: 0,
                    failed_count: batch_len,
                    errors: vec![err.to_string()],
                    last_sync_timestamp: Utc::now(),
                }
            }
        }
    }

    // ---- Connectivity ----

    /// Host signal: connectivity restored. Flushes exactly once per
    /// offline-to-online transition; re-asserting online does nothing.
    pub async fn set_online(&self) -> Option<SyncResult> {
        if self.connectivity.set_online() {
            tracing::info!("Connectivity restored, flushing outbound queue");
            Some(self.flush_now().await)
        } else {
            None
        }
    }

    /// Host signal: connectivity lost. Subsequent operations queue.
    pub fn set_offline(&self) {
        if self.connectivity.set_offline() {
            tracing::info!("Client is offline, operations will queue");
        }
    }

    /// Host signal: page visibility changed. Becoming visible while
    /// online flushes once.
    pub async fn set_visibility(&self, visibility: Visibility) -> Option<SyncResult> {
        if self.connectivity.set_visibility(visibility) {
            tracing::debug!("Page visible while online, flushing outbound queue");
            Some(self.flush_now().await)
        } else {
            None
        }
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    // ---- Webhooks ----

    /// Deliver a signed webhook. Fire-and-forget: a failed delivery is
    /// queued as a `webhook` operation for the next flush, and a missing
    /// webhook config makes this a no-op. Callers must not assume the
    /// receiver saw anything yet.
    pub async fn send_webhook(&self, payload: WebhookPayload) {
        if !self.webhook.is_configured() {
            return;
        }
        if !self.connectivity.is_online() {
            self.queue_webhook(&payload);
            return;
        }
        match self.webhook.deliver(&payload).await {
            Ok(WebhookOutcome::Delivered) | Ok(WebhookOutcome::Skipped) => {}
            Err(err) => {
                tracing::warn!(
                    "Webhook '{}' delivery failed, queueing for retry: {}",
                    payload.event,
                    err
                );
                self.queue_webhook(&payload);
            }
        }
    }

    fn queue_webhook(&self, payload: &WebhookPayload) {
        match serde_json::to_value(payload) {
            Ok(value) => self.enqueue_operation(SyncOperation::new(op_kind::WEBHOOK, value)),
            Err(e) => tracing::error!("Webhook payload not serializable: {}", e),
        }
    }

    // ---- External systems ----

    /// Register an external system behind its health gate. See
    /// [`AdapterRegistry::integrate`].
    pub async fn integrate_external_system(
        &self,
        config: ExternalSystemConfig,
    ) -> Result<bool, SyncError> {
        self.adapters.integrate(config).await
    }

    pub async fn enable_external_system(&self, name: &str) -> Result<(), SyncError> {
        self.adapters.enable(name).await
    }

    pub async fn disable_external_system(&self, name: &str) -> Result<(), SyncError> {
        self.adapters.disable(name).await
    }

    pub async fn remove_external_system(&self, name: &str) -> Result<(), SyncError> {
        self.adapters.remove(name).await
    }

    pub fn external_systems(&self) -> Result<Vec<ExternalSystemConfig>, SyncError> {
        self.adapters.list()
    }

    /// Run one pull-push cycle for a registered system right now, outside
    /// its timer.
    pub async fn sync_external_now(&self, name: &str) -> Result<SyncResult, SyncError> {
        self.adapters.sync_now(name).await
    }

    // ---- Events ----

    /// Subscribe to one kind of realtime event.
    pub fn subscribe(&self, kind: RealtimeEventKind) -> Subscription {
        self.dispatcher.subscribe(kind)
    }

    // ---- Introspection and shutdown ----

    pub fn status(&self) -> ClientStatus {
        let external_systems = match self.adapters.list() {
            Ok(systems) => systems.into_iter().map(|s| s.name).collect(),
            Err(e) => {
                tracing::warn!("Could not list external systems for status: {}", e);
                Vec::new()
            }
        };
        ClientStatus {
            connectivity: self.connectivity.connectivity(),
            visibility: self.connectivity.visibility(),
            queued_operations: self.queued_operations(),
            external_systems,
        }
    }

    /// Stop all background work: the flush driver, every pull timer and
    /// the realtime channel. Waits for the tasks to finish. Queued
    /// operations stay in memory and are lost with the process.
    pub async fn shutdown(&self) {
        tracing::info!("Sync client shutting down");
        self.driver_stop.notify_one();
        self.realtime_stop.notify_one();

        let mut handles = self.adapters.stop_all();
        handles.extend(self.lock_tasks().drain(..));
        for handle in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!("Background task ended abnormally: {}", e);
                }
            }
        }
    }

    // ---- Internals ----

    /// Immediate-or-queue with a JSON body: on success fire the webhook
    /// for the event, on failure queue the payload and surface the error.
    /// While offline no request is attempted at all.
    async fn submit(
        &self,
        method: Method,
        path: &str,
        kind: &'static str,
        payload: Value,
        event: Option<(&'static str, WebhookSource)>,
    ) -> Result<Value, SyncError> {
        if let Some(err) = self.queue_if_offline(kind, &payload) {
            return Err(err);
        }
        match self.executor.request(method, path, Some(&payload)).await {
            Ok(value) => {
                if let Some((event, source)) = event {
                    self.fire_webhook(event, source, payload).await;
                }
                Ok(value)
            }
            Err(err) => self.queue_failed(path, kind, payload, err),
        }
    }

    /// Same as [`submit`] for requests without a body (DELETE). The
    /// `queue_payload` is what a later flush replays.
    ///
    /// [`submit`]: SyncClient::submit
    async fn submit_bodyless(
        &self,
        method: Method,
        path: &str,
        kind: &'static str,
        queue_payload: Value,
        event: Option<(&'static str, WebhookSource)>,
    ) -> Result<Value, SyncError> {
        if let Some(err) = self.queue_if_offline(kind, &queue_payload) {
            return Err(err);
        }
        match self.executor.request(method, path, None).await {
            Ok(value) => {
                if let Some((event, source)) = event {
                    self.fire_webhook(event, source, queue_payload).await;
                }
                Ok(value)
            }
            Err(err) => self.queue_failed(path, kind, queue_payload, err),
        }
    }

    /// Queue instead of sending when offline. The returned error tells the
    /// caller delivery is deferred.
    fn queue_if_offline(&self, kind: &'static str, payload: &Value) -> Option<SyncError> {
        if self.connectivity.is_online() {
            return None;
        }
        tracing::debug!("Offline, queueing {}", kind);
        self.enqueue_operation(SyncOperation::new(kind, payload.clone()));
        Some(SyncError::Network("client is offline, operation queued".into()))
    }

    fn queue_failed(
        &self,
        path: &str,
        kind: &'static str,
        payload: Value,
        err: SyncError,
    ) -> Result<Value, SyncError> {
        tracing::warn!("Request to {} failed, queueing {}: {}", path, kind, err);
        self.enqueue_operation(SyncOperation::new(kind, payload));
        Err(err)
    }

    async fn fire_webhook(&self, event: &str, source: WebhookSource, data: Value) {
        if !self.webhook.is_configured() {
            return;
        }
        let payload = WebhookPayload::new(event, source, data, self.config.warehouse_id);
        self.send_webhook(payload).await;
    }

    fn lock_queue(&self) -> MutexGuard<'_, OutboundQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn to_payload<T: serde::Serialize>(value: &T) -> Result<Value, SyncError> {
    serde_json::to_value(value).map_err(|e| SyncError::Parse(e.to_string()))
}

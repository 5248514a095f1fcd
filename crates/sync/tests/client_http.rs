use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};

use wareflow_core::{ItemId, MovementId, TransactionId, WarehouseId};
use wareflow_sync::client::{ClientConfig, SyncClient};
use wareflow_sync::error::SyncError;
use wareflow_sync::retry::RetryPolicy;
use wareflow_sync::types::{
    Alert, AlertSeverity, ExportFormat, ExportRequest, ExternalSystemConfig, FieldMappings, Item,
    ItemPatch, Movement, MovementCarrier, MovementStatus, SystemType, Transaction,
    TransactionKind, Visibility, WebhookPayload, WebhookSource,
};
use wareflow_sync::webhook::{SIGNATURE_HEADER, WebhookConfig, sign};

/// Backend stub capturing what the client sends. Behavior toggles live in
/// atomics so tests can flip them mid-flight.
#[derive(Default)]
struct BackendState {
    item_writes: AtomicUsize,
    item_deletes: AtomicUsize,
    item_fail_first: AtomicUsize,
    item_delay_ms: AtomicU64,
    last_auth: Mutex<Option<(String, String)>>,
    batch_fail: AtomicBool,
    batch_bodies: Mutex<Vec<Value>>,
    external_sync_bodies: Mutex<Vec<Value>>,
    webhook_fail: AtomicBool,
    webhook_hits: Mutex<Vec<(String, Vec<u8>)>>,
    export_bodies: Mutex<Vec<Value>>,
}

impl BackendState {
    fn record_auth(&self, headers: &HeaderMap) {
        let bearer = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let warehouse = headers
            .get("x-warehouse-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        *self.last_auth.lock().unwrap() = Some((bearer, warehouse));
    }

    fn batch_post_count(&self) -> usize {
        self.batch_bodies.lock().unwrap().len()
    }
}

async fn items_handler(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.record_auth(&headers);
    let delay = state.item_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let hit = state.item_writes.fetch_add(1, Ordering::SeqCst) + 1;
    if hit <= state.item_fail_first.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "item store unavailable" })),
        );
    }
    (StatusCode::OK, Json(json!({ "ok": true, "echo": body })))
}

async fn delete_handler(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
) -> Json<Value> {
    state.record_auth(&headers);
    state.item_deletes.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "deleted": true }))
}

async fn ok_handler(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "ok": true, "echo": body }))
}

async fn batch_handler(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if state.batch_fail.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "batch rejected" })),
        );
    }
    let synced = body["items"].as_array().map(|a| a.len()).unwrap_or(0);
    state.batch_bodies.lock().unwrap().push(body);
    (
        StatusCode::OK,
        Json(json!({ "synced": synced, "failed": 0, "errors": [] })),
    )
}

async fn external_sync_handler(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.external_sync_bodies.lock().unwrap().push(body);
    (StatusCode::OK, Json(json!({ "accepted": true })))
}

async fn hook_handler(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state
        .webhook_hits
        .lock()
        .unwrap()
        .push((signature, body.to_vec()));
    if state.webhook_fail.load(Ordering::SeqCst) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

async fn health_handler() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "features": ["sync", "webhooks"] })),
    )
}

async fn export_handler(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Bytes) {
    state.export_bodies.lock().unwrap().push(body);
    (StatusCode::OK, Bytes::from_static(b"sku,name\nA-1,Rope\n"))
}

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(router: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { base_url, handle }
    }

    async fn backend(state: Arc<BackendState>) -> Self {
        let router = Router::new()
            .route("/items", post(items_handler))
            .route("/items/:id", put(items_handler).delete(delete_handler))
            .route("/items/bulk-update", post(ok_handler))
            .route("/items/sync", post(ok_handler))
            .route("/movements", post(ok_handler))
            .route("/movements/:id/status", put(ok_handler))
            .route("/transactions", post(ok_handler))
            .route("/alerts", post(ok_handler))
            .route("/sync/batch", post(batch_handler))
            .route("/external-sync", post(external_sync_handler))
            .route("/hook", post(hook_handler))
            .route("/health", get(health_handler))
            .route("/export", post(export_handler))
            .with_state(state);
        Self::spawn(router).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// External system stub with its own health toggle and canned records.
#[derive(Default)]
struct ExternalState {
    health_fail: AtomicBool,
    health_hits: AtomicUsize,
    records: Mutex<Vec<Value>>,
}

async fn external_health_handler(State(state): State<Arc<ExternalState>>) -> StatusCode {
    state.health_hits.fetch_add(1, Ordering::SeqCst);
    if state.health_fail.load(Ordering::SeqCst) {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

async fn external_data_handler(State(state): State<Arc<ExternalState>>) -> Json<Value> {
    Json(Value::Array(state.records.lock().unwrap().clone()))
}

async fn spawn_external(state: Arc<ExternalState>) -> TestServer {
    let router = Router::new()
        .route("/health", get(external_health_handler))
        .route("/data", get(external_data_handler))
        .with_state(state);
    TestServer::spawn(router).await
}

const API_KEY: &str = "test-api-key";

fn base_config(
    backend: &TestServer,
    store: &tempfile::TempDir,
    warehouse_id: WarehouseId,
) -> ClientConfig {
    wareflow_observability::tracing::init_with("warn");
    let mut config = ClientConfig::new(backend.base_url.clone(), API_KEY, warehouse_id);
    config.retry = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_secs(5));
    config.flush_interval = Duration::from_secs(3600);
    config.storage_root = Some(store.path().to_path_buf());
    config.realtime = false;
    config
}

fn sample_item(sku: &str) -> Item {
    Item {
        id: ItemId::new(),
        sku: sku.into(),
        name: "Rope".into(),
        quantity: 12,
        location: "A-03-2".into(),
        category: Some("rigging".into()),
        unit_price: Some(4.5),
        reorder_level: Some(3),
        updated_at: chrono::Utc::now(),
    }
}

fn external_config(external: &TestServer, name: &str, enabled: bool) -> ExternalSystemConfig {
    ExternalSystemConfig {
        name: name.into(),
        system_type: SystemType::Erp,
        endpoint: external.base_url.clone(),
        api_key: "erp-key".into(),
        mappings: FieldMappings::from_pairs([("name", "item_name"), ("quantity", "qty")]),
        sync_interval_minutes: 60,
        enabled,
    }
}

async fn wait_until(mut check: impl FnMut() -> bool, within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn requests_carry_bearer_and_warehouse_headers() {
    let state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&state)).await;
    let store = tempfile::tempdir().unwrap();
    let warehouse_id = WarehouseId::new();

    let client = SyncClient::start(base_config(&backend, &store, warehouse_id))
        .await
        .unwrap();
    client.create_item(&sample_item("SKU-1")).await.unwrap();

    let (bearer, warehouse) = state.last_auth.lock().unwrap().clone().unwrap();
    assert_eq!(bearer, format!("Bearer {API_KEY}"));
    assert_eq!(warehouse, warehouse_id.to_string());
}

#[tokio::test]
async fn failed_requests_retry_until_success() {
    let state = Arc::new(BackendState::default());
    state.item_fail_first.store(2, Ordering::SeqCst);
    let backend = TestServer::backend(Arc::clone(&state)).await;
    let store = tempfile::tempdir().unwrap();

    let client = SyncClient::start(base_config(&backend, &store, WarehouseId::new()))
        .await
        .unwrap();
    let result = client.create_item(&sample_item("SKU-1")).await;

    assert!(result.is_ok());
    assert_eq!(state.item_writes.load(Ordering::SeqCst), 3);
    assert_eq!(client.queued_operations(), 0);
}

#[tokio::test]
async fn exhausted_retries_surface_last_error_and_queue_the_operation() {
    let state = Arc::new(BackendState::default());
    state.item_fail_first.store(usize::MAX, Ordering::SeqCst);
    let backend = TestServer::backend(Arc::clone(&state)).await;
    let store = tempfile::tempdir().unwrap();

    let mut config = base_config(&backend, &store, WarehouseId::new());
    config.retry = RetryPolicy::new(2, Duration::from_millis(10), Duration::from_secs(5));
    let client = SyncClient::start(config).await.unwrap();

    let err = client.create_item(&sample_item("SKU-1")).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(state.item_writes.load(Ordering::SeqCst), 2);
    assert_eq!(client.queued_operations(), 1);
}

#[tokio::test]
async fn slow_responses_classify_as_timeouts() {
    let state = Arc::new(BackendState::default());
    state.item_delay_ms.store(500, Ordering::SeqCst);
    let backend = TestServer::backend(Arc::clone(&state)).await;
    let store = tempfile::tempdir().unwrap();

    let mut config = base_config(&backend, &store, WarehouseId::new());
    config.retry = RetryPolicy::new(1, Duration::from_millis(10), Duration::from_millis(50));
    let client = SyncClient::start(config).await.unwrap();

    let err = client.create_item(&sample_item("SKU-1")).await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn item_updates_and_deletes_use_their_own_routes() {
    let state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&state)).await;
    let store = tempfile::tempdir().unwrap();

    let client = SyncClient::start(base_config(&backend, &store, WarehouseId::new()))
        .await
        .unwrap();

    let item = sample_item("SKU-7");
    client.update_item(&item).await.unwrap();
    client.delete_item(item.id).await.unwrap();

    assert_eq!(state.item_writes.load(Ordering::SeqCst), 1);
    assert_eq!(state.item_deletes.load(Ordering::SeqCst), 1);
    assert_eq!(client.queued_operations(), 0);
}

#[tokio::test]
async fn bulk_and_snapshot_sync_wrap_items_in_one_body() {
    let state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&state)).await;
    let store = tempfile::tempdir().unwrap();

    let client = SyncClient::start(base_config(&backend, &store, WarehouseId::new()))
        .await
        .unwrap();

    let patches = vec![ItemPatch {
        id: ItemId::new(),
        quantity: Some(3),
        location: Some("B-01-4".into()),
        unit_price: None,
        reorder_level: None,
    }];
    let reply = client.bulk_update_items(&patches).await.unwrap();
    assert_eq!(reply["echo"]["items"][0]["quantity"], 3);

    let items = vec![sample_item("SKU-1"), sample_item("SKU-2")];
    let reply = client.sync_items(&items).await.unwrap();
    assert_eq!(reply["echo"]["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn offline_operations_queue_without_touching_the_network() {
    let state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&state)).await;
    let store = tempfile::tempdir().unwrap();

    let client = SyncClient::start(base_config(&backend, &store, WarehouseId::new()))
        .await
        .unwrap();
    client.set_offline();

    for i in 0..3 {
        let err = client
            .create_item(&sample_item(&format!("SKU-{i}")))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
    }

    assert_eq!(client.queued_operations(), 3);
    assert_eq!(state.item_writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_flush_requeues_batch_ahead_of_later_operations() {
    let state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&state)).await;
    let store = tempfile::tempdir().unwrap();

    let client = SyncClient::start(base_config(&backend, &store, WarehouseId::new()))
        .await
        .unwrap();

    client.set_offline();
    for i in 0..3 {
        let _ = client.create_item(&sample_item(&format!("SKU-{i}"))).await;
    }

    // First transition to online hits a failing batch endpoint.
    state.batch_fail.store(true, Ordering::SeqCst);
    let result = client.set_online().await.expect("transition flushes");
    assert!(!result.success);
    assert_eq!(client.queued_operations(), 3);

    // Queue one more behind the requeued batch, then let a flush through.
    client.set_offline();
    let _ = client.create_item(&sample_item("SKU-3")).await;
    state.batch_fail.store(false, Ordering::SeqCst);
    let result = client.set_online().await.expect("transition flushes");
    assert!(result.success);
    assert_eq!(result.synced_count, 4);

    let bodies = state.batch_bodies.lock().unwrap();
    let items = bodies[0]["items"].as_array().unwrap();
    let skus: Vec<&str> = items
        .iter()
        .map(|op| op["payload"]["sku"].as_str().unwrap())
        .collect();
    assert_eq!(skus, vec!["SKU-0", "SKU-1", "SKU-2", "SKU-3"]);
    assert_eq!(client.queued_operations(), 0);
}

#[tokio::test]
async fn offline_to_online_transition_flushes_exactly_once() {
    let state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&state)).await;
    let store = tempfile::tempdir().unwrap();

    let client = SyncClient::start(base_config(&backend, &store, WarehouseId::new()))
        .await
        .unwrap();

    client.set_offline();
    for i in 0..5 {
        let _ = client.create_item(&sample_item(&format!("SKU-{i}"))).await;
    }
    assert_eq!(client.queued_operations(), 5);

    let result = client.set_online().await.expect("first transition flushes");
    assert!(result.success);
    assert_eq!(result.synced_count, 5);
    assert_eq!(state.batch_post_count(), 1);

    // Re-asserting online is not a transition.
    assert!(client.set_online().await.is_none());
    assert_eq!(state.batch_post_count(), 1);
    assert_eq!(client.queued_operations(), 0);
}

#[tokio::test]
async fn becoming_visible_while_online_flushes() {
    let state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&state)).await;
    let store = tempfile::tempdir().unwrap();

    let client = SyncClient::start(base_config(&backend, &store, WarehouseId::new()))
        .await
        .unwrap();

    assert!(client.set_visibility(Visibility::Hidden).await.is_none());
    client.enqueue_operation(wareflow_sync::types::SyncOperation::new(
        "item_update",
        json!({ "sku": "SKU-9" }),
    ));

    let result = client
        .set_visibility(Visibility::Visible)
        .await
        .expect("visible while online flushes");
    assert!(result.success);
    assert_eq!(state.batch_post_count(), 1);
}

#[tokio::test]
async fn webhooks_are_signed_over_the_exact_body_bytes() {
    let state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&state)).await;
    let store = tempfile::tempdir().unwrap();
    let warehouse_id = WarehouseId::new();

    let mut config = base_config(&backend, &store, warehouse_id);
    config.webhook = Some(WebhookConfig {
        url: format!("{}/hook", backend.base_url),
        secret: "wh-s3cret".into(),
    });
    let client = SyncClient::start(config).await.unwrap();

    let item = sample_item("SKU-1");
    client.create_item(&item).await.unwrap();

    assert!(
        wait_until(
            || !state.webhook_hits.lock().unwrap().is_empty(),
            Duration::from_secs(5)
        )
        .await,
        "webhook never arrived"
    );

    let (signature, body) = state.webhook_hits.lock().unwrap()[0].clone();
    assert_eq!(signature, sign(b"wh-s3cret", &body));

    let payload: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload["event"], "item.created");
    assert_eq!(payload["source"], "inventory");
    assert_eq!(payload["warehouseId"], warehouse_id.to_string());
    assert_eq!(payload["data"]["sku"], "SKU-1");
}

#[tokio::test]
async fn movements_transactions_and_alerts_fire_named_webhooks() {
    let state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&state)).await;
    let store = tempfile::tempdir().unwrap();
    let warehouse_id = WarehouseId::new();

    let mut config = base_config(&backend, &store, warehouse_id);
    config.webhook = Some(WebhookConfig {
        url: format!("{}/hook", backend.base_url),
        secret: "wh-s3cret".into(),
    });
    let client = SyncClient::start(config).await.unwrap();

    let movement = Movement {
        id: MovementId::new(),
        item_id: ItemId::new(),
        quantity: 4,
        carrier: MovementCarrier::Truck,
        reference: Some("PO-1142".into()),
        status: MovementStatus::Pending,
        created_at: chrono::Utc::now(),
    };
    client.create_movement(&movement).await.unwrap();
    client
        .update_movement_status(movement.id, MovementStatus::InTransit)
        .await
        .unwrap();
    client
        .record_transaction(&Transaction {
            id: TransactionId::new(),
            item_id: movement.item_id,
            kind: TransactionKind::Inbound,
            quantity: 4,
            amount: Some(18.0),
            created_at: chrono::Utc::now(),
        })
        .await
        .unwrap();
    client
        .send_alert(&Alert {
            severity: AlertSeverity::Warning,
            message: "Stock below reorder level".into(),
            item_id: Some(movement.item_id),
            created_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

    let events: Vec<String> = state
        .webhook_hits
        .lock()
        .unwrap()
        .iter()
        .map(|(_, body)| {
            serde_json::from_slice::<Value>(body).unwrap()["event"]
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(
        events,
        vec![
            "movement.created",
            "movement.status_changed",
            "transaction.recorded",
            "alert.triggered",
        ]
    );
}

#[tokio::test]
async fn failed_webhook_is_queued_as_a_webhook_operation() {
    let state = Arc::new(BackendState::default());
    state.webhook_fail.store(true, Ordering::SeqCst);
    let backend = TestServer::backend(Arc::clone(&state)).await;
    let store = tempfile::tempdir().unwrap();
    let warehouse_id = WarehouseId::new();

    let mut config = base_config(&backend, &store, warehouse_id);
    config.webhook = Some(WebhookConfig {
        url: format!("{}/hook", backend.base_url),
        secret: "wh-s3cret".into(),
    });
    let client = SyncClient::start(config).await.unwrap();

    client
        .send_webhook(WebhookPayload::new(
            "alert.triggered",
            WebhookSource::Alert,
            json!({ "message": "low stock" }),
            warehouse_id,
        ))
        .await;

    assert_eq!(client.queued_operations(), 1);

    let result = client.flush_now().await;
    assert!(result.success);

    let bodies = state.batch_bodies.lock().unwrap();
    let op = &bodies[0]["items"][0];
    assert_eq!(op["kind"], "webhook");
    assert_eq!(op["payload"]["event"], "alert.triggered");
}

#[tokio::test]
async fn missing_webhook_config_sends_nothing() {
    let state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&state)).await;
    let store = tempfile::tempdir().unwrap();
    let warehouse_id = WarehouseId::new();

    let client = SyncClient::start(base_config(&backend, &store, warehouse_id))
        .await
        .unwrap();

    client.create_item(&sample_item("SKU-1")).await.unwrap();
    client
        .send_webhook(WebhookPayload::new(
            "item.created",
            WebhookSource::Inventory,
            json!({}),
            warehouse_id,
        ))
        .await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(state.webhook_hits.lock().unwrap().is_empty());
    assert_eq!(client.queued_operations(), 0);
}

#[tokio::test]
async fn integrate_gates_on_the_external_health_check() {
    let backend_state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&backend_state)).await;
    let external_state = Arc::new(ExternalState::default());
    let external = spawn_external(Arc::clone(&external_state)).await;
    let store = tempfile::tempdir().unwrap();

    let client = SyncClient::start(base_config(&backend, &store, WarehouseId::new()))
        .await
        .unwrap();

    let accepted = client
        .integrate_external_system(external_config(&external, "erp-main", false))
        .await
        .unwrap();
    assert!(accepted);
    assert_eq!(client.external_systems().unwrap().len(), 1);

    external_state.health_fail.store(true, Ordering::SeqCst);
    let accepted = client
        .integrate_external_system(external_config(&external, "erp-flaky", false))
        .await
        .unwrap();
    assert!(!accepted);

    let names: Vec<String> = client
        .external_systems()
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["erp-main"]);
}

#[tokio::test]
async fn integrate_rejects_bad_mappings_before_any_network_call() {
    let backend_state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&backend_state)).await;
    let external_state = Arc::new(ExternalState::default());
    let external = spawn_external(Arc::clone(&external_state)).await;
    let store = tempfile::tempdir().unwrap();

    let client = SyncClient::start(base_config(&backend, &store, WarehouseId::new()))
        .await
        .unwrap();

    let mut config = external_config(&external, "erp-main", false);
    config.mappings = FieldMappings::from_pairs([("warehouse", "wh")]);
    let err = client.integrate_external_system(config).await.unwrap_err();

    assert!(matches!(err, SyncError::Configuration(_)));
    assert_eq!(external_state.health_hits.load(Ordering::SeqCst), 0);
    assert!(client.external_systems().unwrap().is_empty());
}

#[tokio::test]
async fn external_pull_transforms_records_and_pushes_one_batch() {
    let backend_state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&backend_state)).await;
    let external_state = Arc::new(ExternalState::default());
    *external_state.records.lock().unwrap() = vec![
        json!({ "item_name": "Rope", "qty": 12, "internal": "x" }),
        json!({ "item_name": "Pallet", "qty": 3 }),
    ];
    let external = spawn_external(Arc::clone(&external_state)).await;
    let store = tempfile::tempdir().unwrap();

    let client = SyncClient::start(base_config(&backend, &store, WarehouseId::new()))
        .await
        .unwrap();

    client
        .integrate_external_system(external_config(&external, "erp-main", false))
        .await
        .unwrap();
    let result = client.sync_external_now("erp-main").await.unwrap();
    assert!(result.success);
    assert_eq!(result.synced_count, 2);

    let bodies = backend_state.external_sync_bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert_eq!(
        bodies[0],
        json!({
            "source": "erp-main",
            "type": "ERP",
            "data": [
                { "name": "Rope", "quantity": 12 },
                { "name": "Pallet", "quantity": 3 },
            ],
        })
    );
}

#[tokio::test]
async fn external_system_lifecycle_enable_disable_remove() {
    let backend_state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&backend_state)).await;
    let external_state = Arc::new(ExternalState::default());
    let external = spawn_external(Arc::clone(&external_state)).await;
    let store = tempfile::tempdir().unwrap();

    let client = SyncClient::start(base_config(&backend, &store, WarehouseId::new()))
        .await
        .unwrap();

    client
        .integrate_external_system(external_config(&external, "erp-main", false))
        .await
        .unwrap();
    assert!(!client.external_systems().unwrap()[0].enabled);

    client.enable_external_system("erp-main").await.unwrap();
    assert!(client.external_systems().unwrap()[0].enabled);

    client.disable_external_system("erp-main").await.unwrap();
    assert!(!client.external_systems().unwrap()[0].enabled);

    client.remove_external_system("erp-main").await.unwrap();
    assert!(client.external_systems().unwrap().is_empty());

    let err = client.remove_external_system("erp-main").await.unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));

    client.shutdown().await;
}

#[tokio::test]
async fn periodic_driver_flushes_on_its_interval() {
    let state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&state)).await;
    let store = tempfile::tempdir().unwrap();

    let mut config = base_config(&backend, &store, WarehouseId::new());
    config.flush_interval = Duration::from_millis(150);
    let client = SyncClient::start(config).await.unwrap();

    client.enqueue_operation(wareflow_sync::types::SyncOperation::new(
        "item_update",
        json!({ "sku": "SKU-1" }),
    ));
    client.enqueue_operation(wareflow_sync::types::SyncOperation::new(
        "item_update",
        json!({ "sku": "SKU-2" }),
    ));

    assert!(
        wait_until(|| state.batch_post_count() >= 1, Duration::from_secs(5)).await,
        "driver never flushed"
    );

    let first_batch_len = state.batch_bodies.lock().unwrap()[0]["items"]
        .as_array()
        .unwrap()
        .len();
    assert_eq!(first_batch_len, 2);
    assert_eq!(client.queued_operations(), 0);

    client.shutdown().await;
}

#[tokio::test]
async fn health_and_export_round_trip() {
    let state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&state)).await;
    let store = tempfile::tempdir().unwrap();

    let client = SyncClient::start(base_config(&backend, &store, WarehouseId::new()))
        .await
        .unwrap();

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert!(health.features.iter().any(|f| f == "sync"));

    let blob = client
        .export(&ExportRequest {
            format: ExportFormat::Csv,
            filters: json!({ "category": "rigging" }),
        })
        .await
        .unwrap();
    assert_eq!(blob, b"sku,name\nA-1,Rope\n");
    assert_eq!(
        state.export_bodies.lock().unwrap()[0]["format"],
        "csv"
    );
}

#[tokio::test]
async fn status_reflects_queue_and_systems() {
    let backend_state = Arc::new(BackendState::default());
    let backend = TestServer::backend(Arc::clone(&backend_state)).await;
    let external_state = Arc::new(ExternalState::default());
    let external = spawn_external(Arc::clone(&external_state)).await;
    let store = tempfile::tempdir().unwrap();

    let client = SyncClient::start(base_config(&backend, &store, WarehouseId::new()))
        .await
        .unwrap();
    client
        .integrate_external_system(external_config(&external, "erp-main", false))
        .await
        .unwrap();
    client.set_offline();
    let _ = client.create_item(&sample_item("SKU-1")).await;

    let status = client.status();
    assert_eq!(status.queued_operations, 1);
    assert_eq!(status.external_systems, vec!["erp-main"]);
    assert_eq!(
        serde_json::to_value(status.connectivity).unwrap(),
        "offline"
    );
}

//! External system adapters: health gating, field mapping, pull timers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Method};
use serde_json::{Map, Value, json};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use wareflow_core::DomainError;

use crate::error::SyncError;
use crate::executor::RequestExecutor;
use crate::store::ConfigStore;
use crate::types::{ExternalSystemConfig, FieldMappings, SyncResult};

/// Reshape remote records into local item shape by the field mappings.
///
/// Pure: same mappings and records always yield the same output. Fields
/// missing on a record are dropped for that record; a record that is not
/// a JSON object maps to an empty object.
pub fn transform_external_data(mappings: &FieldMappings, records: &[Value]) -> Vec<Value> {
    records
        .iter()
        .map(|record| {
            let mut local = Map::new();
            if let Some(obj) = record.as_object() {
                for (local_field, remote_field) in mappings.iter() {
                    if let Some(value) = obj.get(remote_field) {
                        local.insert(local_field.to_string(), value.clone());
                    }
                }
            }
            Value::Object(local)
        })
        .collect()
}

struct SystemTimer {
    stop: Arc<Notify>,
    handle: JoinHandle<()>,
}

/// Owns external system lifecycles: validated configs persisted under the
/// `external_systems` key, one recurring pull timer per enabled system.
///
/// Pulls go straight to the external endpoint with that system's own key;
/// the transformed batch is pushed to the backend through the executor,
/// which applies the usual auth and retry.
pub struct AdapterRegistry {
    executor: RequestExecutor,
    store: ConfigStore,
    http: Client,
    timeout: Duration,
    timers: Mutex<HashMap<String, SystemTimer>>,
}

impl AdapterRegistry {
    pub(crate) fn new(executor: RequestExecutor, store: ConfigStore, timeout: Duration) -> Self {
        Self {
            executor,
            store,
            http: Client::new(),
            timeout,
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Register an external system: validate the config, gate on the
    /// system's health endpoint, persist, and start its timer if enabled.
    ///
    /// Returns false when the health check fails; nothing is persisted in
    /// that case. Validation and storage failures are errors.
    pub async fn integrate(self: &Arc<Self>, config: ExternalSystemConfig) -> Result<bool, SyncError> {
        config.validate()?;

        if !self.health_check(&config).await {
            return Ok(false);
        }

        self.store.save_system(&config)?;
        tracing::info!("Integrated external system '{}'", config.name);

        if config.enabled {
            self.start_timer(config);
        }
        Ok(true)
    }

    /// Restart timers for every enabled persisted system. Called once when
    /// the client starts.
    pub(crate) fn resume_persisted(self: &Arc<Self>) -> Result<(), SyncError> {
        let systems = self.store.load_systems()?;
        let mut resumed = 0;
        for config in systems.into_values() {
            if config.enabled {
                self.start_timer(config);
                resumed += 1;
            }
        }
        if resumed > 0 {
            tracing::info!("Resumed {} external system timer(s)", resumed);
        }
        Ok(())
    }

    pub async fn enable(self: &Arc<Self>, name: &str) -> Result<(), SyncError> {
        let mut config = self.require(name)?;
        config.enabled = true;
        self.store.save_system(&config)?;
        self.start_timer(config);
        Ok(())
    }

    pub async fn disable(&self, name: &str) -> Result<(), SyncError> {
        let mut config = self.require(name)?;
        config.enabled = false;
        self.store.save_system(&config)?;
        if let Some(handle) = self.stop_timer(name) {
            let _ = handle.await;
        }
        tracing::info!("Disabled external system '{}'", name);
        Ok(())
    }

    pub async fn remove(&self, name: &str) -> Result<(), SyncError> {
        if let Some(handle) = self.stop_timer(name) {
            let _ = handle.await;
        }
        if !self.store.remove_system(name)? {
            return Err(DomainError::not_found(name).into());
        }
        tracing::info!("Removed external system '{}'", name);
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<ExternalSystemConfig>, SyncError> {
        Ok(self.store.load_systems()?.into_values().collect())
    }

    /// Run one pull-push cycle for a registered system by name.
    pub async fn sync_now(&self, name: &str) -> Result<SyncResult, SyncError> {
        let config = self.require(name)?;
        self.sync_system(&config).await
    }

    /// One pull-push cycle: fetch remote records, reshape them, push the
    /// batch to the backend ingestion endpoint.
    pub async fn sync_system(&self, config: &ExternalSystemConfig) -> Result<SyncResult, SyncError> {
        let url = format!("{}/data", config.endpoint.trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&config.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(e, self.timeout))?;

        if !resp.status().is_success() {
            return Err(SyncError::HttpStatus {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let records: Vec<Value> = resp
            .json()
            .await
            .map_err(|e| SyncError::Parse(e.to_string()))?;
        let data = transform_external_data(&config.mappings, &records);
        let count = data.len();

        self.executor
            .request(
                Method::POST,
                "/external-sync",
                Some(&json!({
                    "source": config.name,
                    "type": config.system_type,
                    "data": data,
                })),
            )
            .await?;

        tracing::info!("Pulled {} record(s) from '{}'", count, config.name);
        Ok(SyncResult {
            success: true,
            synced_count: count,
            failed_count: 0,
            errors: Vec::new(),
            last_sync_timestamp: Utc::now(),
        })
    }

    /// Stop every timer, returning the handles so the caller can await a
    /// clean exit.
    pub(crate) fn stop_all(&self) -> Vec<JoinHandle<()>> {
        let mut timers = self.lock_timers();
        timers
            .drain()
            .map(|(_, timer)| {
                timer.stop.notify_one();
                timer.handle
            })
            .collect()
    }

    async fn health_check(&self, config: &ExternalSystemConfig) -> bool {
        let url = format!("{}/health", config.endpoint.trim_end_matches('/'));
        match self
            .http
            .get(&url)
            .bearer_auth(&config.api_key)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::warn!(
                    "Health check for '{}' returned {}",
                    config.name,
                    resp.status()
                );
                false
            }
            Err(e) => {
                tracing::warn!("Health check for '{}' failed: {}", config.name, e);
                false
            }
        }
    }

    fn require(&self, name: &str) -> Result<ExternalSystemConfig, SyncError> {
        self.store
            .load_system(name)?
            .ok_or_else(|| DomainError::not_found(name).into())
    }

    /// Spawn the recurring pull task for one system, replacing any timer
    /// already running under that name. Tick errors are logged and do not
    /// stop the timer.
    fn start_timer(self: &Arc<Self>, config: ExternalSystemConfig) {
        let name = config.name.clone();
        if let Some(handle) = self.stop_timer(&name) {
            handle.abort();
        }

        let stop = Arc::new(Notify::new());
        let stop_task = Arc::clone(&stop);
        let registry = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(config.sync_interval_minutes * 60);
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(
                "Pull timer started for '{}' (every {} min)",
                config.name,
                config.sync_interval_minutes
            );

            loop {
                tokio::select! {
                    _ = stop_task.notified() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = registry.sync_system(&config).await {
                            tracing::warn!("Pull sync for '{}' failed: {}", config.name, e);
                        }
                    }
                }
            }
            tracing::info!("Pull timer stopped for '{}'", config.name);
        });

        self.lock_timers().insert(name, SystemTimer { stop, handle });
    }

    fn stop_timer(&self, name: &str) -> Option<JoinHandle<()>> {
        let timer = self.lock_timers().remove(name)?;
        timer.stop.notify_one();
        Some(timer.handle)
    }

    fn lock_timers(&self) -> MutexGuard<'_, HashMap<String, SystemTimer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

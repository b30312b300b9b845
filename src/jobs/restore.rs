use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::archive;
use crate::crypto::{CipherService, MasterPrivateKey};
use crate::destination::{BackupDestination, DestinationCursor};
use crate::error::ArkivError;
use crate::jobs::CancelHandle;
use crate::model::{EncryptedEnvelope, TenantId};
use crate::snapshot;
use crate::store::{DataStore, FileStore, TenantFiles, TenantRecords};

/// Lifecycle of a tenant's one-shot restore job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestoreStatus {
    NotStarted,
    InProgress,
    Finished,
}

/// Observable state of one tenant's restore job.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreJobInfo {
    pub tenant_id: TenantId,
    pub status: RestoreStatus,
    pub started_at: DateTime<Utc>,
    pub archives_applied: u64,
    pub archives_failed: u64,
}

struct RestoreJob {
    info: Arc<RwLock<RestoreJobInfo>>,
    cancel: Arc<CancelHandle>,
}

type JobRegistry = Arc<RwLock<HashMap<TenantId, RestoreJob>>>;

/// Owns the one-shot per-tenant restore jobs. At most one active restore
/// per tenant; a finished job removes itself from the registry.
pub struct TenantRestoreManager {
    jobs: JobRegistry,
    destination: Arc<dyn BackupDestination>,
    data_store: Arc<dyn DataStore>,
    file_store: Arc<dyn FileStore>,
}

impl TenantRestoreManager {
    pub fn new(
        destination: Arc<dyn BackupDestination>,
        data_store: Arc<dyn DataStore>,
        file_store: Arc<dyn FileStore>,
    ) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            destination,
            data_store,
            file_store,
        }
    }

    /// Start a restore for the tenant using the supplied master private key
    /// PEM. Returns `Ok(false)` when a restore is already running for the
    /// tenant, and a configuration error when the key material does not
    /// parse: a bad key fails the synchronous acknowledgement, not the
    /// background job.
    pub async fn start_tenant(
        &self,
        tenant: TenantId,
        key_material: &str,
    ) -> Result<bool, ArkivError> {
        let key = MasterPrivateKey::from_pem(key_material)?;

        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&tenant) {
            tracing::debug!(tenant = %tenant, "restore start refused, job already registered");
            return Ok(false);
        }

        let cancel = Arc::new(CancelHandle::new());
        let info = Arc::new(RwLock::new(RestoreJobInfo {
            tenant_id: tenant,
            status: RestoreStatus::NotStarted,
            started_at: Utc::now(),
            archives_applied: 0,
            archives_failed: 0,
        }));

        let worker = RestoreWorker {
            tenant,
            destination: self.destination.clone(),
            records: self.data_store.for_tenant(tenant),
            files: self.file_store.for_tenant(tenant),
            cipher: CipherService::for_restore(key),
            info: info.clone(),
            cancel: cancel.clone(),
            jobs: self.jobs.clone(),
        };
        tokio::spawn(worker.run());

        jobs.insert(tenant, RestoreJob { info, cancel });
        tracing::info!(tenant = %tenant, "restore job started");
        Ok(true)
    }

    /// Signal cancellation and drop the tenant's restore job. Returns
    /// `false` when no job existed.
    pub async fn stop_tenant(&self, tenant: TenantId) -> bool {
        let mut jobs = self.jobs.write().await;
        match jobs.remove(&tenant) {
            Some(job) => {
                job.cancel.cancel();
                tracing::info!(tenant = %tenant, "restore job stopped");
                true
            }
            None => false,
        }
    }

    /// Read-only lookup of the tenant's current restore state.
    pub async fn restore_information(&self, tenant: TenantId) -> Option<RestoreJobInfo> {
        let jobs = self.jobs.read().await;
        match jobs.get(&tenant) {
            Some(job) => Some(job.info.read().await.clone()),
            None => None,
        }
    }
}

struct RestoreWorker {
    tenant: TenantId,
    destination: Arc<dyn BackupDestination>,
    records: Arc<dyn TenantRecords>,
    files: Arc<dyn TenantFiles>,
    cipher: CipherService,
    info: Arc<RwLock<RestoreJobInfo>>,
    cancel: Arc<CancelHandle>,
    jobs: JobRegistry,
}

impl RestoreWorker {
    async fn run(self) {
        {
            self.info.write().await.status = RestoreStatus::InProgress;
        }

        match self.run_loop().await {
            Ok(()) => tracing::info!(tenant = %self.tenant, "restore finished"),
            Err(err) => {
                tracing::error!(tenant = %self.tenant, error = %err, "restore terminated")
            }
        }

        {
            self.info.write().await.status = RestoreStatus::Finished;
        }

        // Self-stop: drop the registry entry if it is still ours.
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get(&self.tenant) {
            if Arc::ptr_eq(&job.cancel, &self.cancel) {
                jobs.remove(&self.tenant);
            }
        }
    }

    async fn run_loop(&self) -> Result<(), ArkivError> {
        self.destination.connect().await?;

        let mut cursor = DestinationCursor::open(self.destination.clone(), self.tenant).await?;
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            let (name, body) = match cursor.next().await? {
                Some(pair) => pair,
                None => break,
            };
            // A failed archive (bad envelope, wrong key, corrupt zip,
            // codec error) is logged and skipped; the next one proceeds.
            match self.restore_archive(&name, &body).await {
                Ok(()) => self.info.write().await.archives_applied += 1,
                Err(err) => {
                    tracing::warn!(
                        tenant = %self.tenant,
                        archive = %name,
                        error = %err,
                        "archive skipped during restore"
                    );
                    self.info.write().await.archives_failed += 1;
                }
            }
        }
        Ok(())
    }

    async fn restore_archive(&self, name: &str, body: &[u8]) -> Result<(), ArkivError> {
        let envelope = EncryptedEnvelope::from_bytes(body)?;
        let payload = self.cipher.decrypt(&envelope)?;
        let unpacked = archive::unpack(&payload)?;
        tracing::debug!(tenant = %self.tenant, archive = %name, entries = unpacked.len(), "archive unpacked");

        for (entry_name, data) in unpacked.iter() {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            if entry_name.ends_with(".metadata") {
                // Sidecars are consumed together with their blob entry.
                continue;
            }

            if snapshot::is_snapshot_entry(entry_name) {
                snapshot::restore_record(data, self.records.as_ref()).await?;
            } else {
                let sidecar = match unpacked.entry(&format!("{entry_name}.metadata")) {
                    Some(raw) => {
                        Some(serde_json::from_slice(raw).map_err(|e| {
                            ArkivError::Deserialization {
                                message: format!("invalid sidecar for {entry_name}: {e}"),
                            }
                        })?)
                    }
                    None => None,
                };
                self.files
                    .write_known_metadata(entry_name, data, sidecar.as_ref())
                    .await?;
            }
        }

        Ok(())
    }
}

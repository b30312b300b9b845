use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::archive;
use crate::crypto::CipherService;
use crate::destination::BackupDestination;
use crate::error::ArkivError;
use crate::jobs::CancelHandle;
use crate::model::{Record, TenantId};
use crate::snapshot;
use crate::store::{DataStore, FileStore, TenantFiles, TenantRecords};

/// Lifecycle of a tenant's periodic backup job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupStatus {
    NotStarted,
    Running,
    Stopped,
}

/// Observable state of one tenant's backup job.
#[derive(Debug, Clone, Serialize)]
pub struct BackupJobInfo {
    pub tenant_id: TenantId,
    pub interval: Duration,
    pub status: BackupStatus,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
}

struct BackupJob {
    info: Arc<RwLock<BackupJobInfo>>,
    cancel: Arc<CancelHandle>,
}

type JobRegistry = Arc<RwLock<HashMap<TenantId, BackupJob>>>;

/// Owns the periodic per-tenant backup jobs. At most one active job per
/// tenant; the registry is the source of truth and is safe against
/// concurrent start/stop calls from different requests.
pub struct TenantBackupManager {
    jobs: JobRegistry,
    destination: Arc<dyn BackupDestination>,
    data_store: Arc<dyn DataStore>,
    file_store: Arc<dyn FileStore>,
    cipher: Arc<CipherService>,
}

impl TenantBackupManager {
    pub fn new(
        destination: Arc<dyn BackupDestination>,
        data_store: Arc<dyn DataStore>,
        file_store: Arc<dyn FileStore>,
        cipher: Arc<CipherService>,
    ) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            destination,
            data_store,
            file_store,
            cipher,
        }
    }

    /// Start a periodic backup job for the tenant. Returns `false` without
    /// side effects when a job for that tenant already exists. The return
    /// value acknowledges the state transition only; job progress is
    /// observed through [`backup_information`].
    ///
    /// [`backup_information`]: TenantBackupManager::backup_information
    pub async fn start_tenant(&self, tenant: TenantId, interval: Duration) -> bool {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&tenant) {
            tracing::debug!(tenant = %tenant, "backup start refused, job already registered");
            return false;
        }

        let cancel = Arc::new(CancelHandle::new());
        let info = Arc::new(RwLock::new(BackupJobInfo {
            tenant_id: tenant,
            interval,
            status: BackupStatus::NotStarted,
            last_run: None,
            next_run: None,
        }));

        // Store handles are bound to this tenant once, for the job's whole
        // lifetime; background work never reads ambient request context.
        let worker = BackupWorker {
            tenant,
            interval,
            destination: self.destination.clone(),
            records: self.data_store.for_tenant(tenant),
            files: self.file_store.for_tenant(tenant),
            cipher: self.cipher.clone(),
            info: info.clone(),
            cancel: cancel.clone(),
            jobs: self.jobs.clone(),
        };
        tokio::spawn(worker.run());

        jobs.insert(tenant, BackupJob { info, cancel });
        tracing::info!(tenant = %tenant, interval_secs = interval.as_secs(), "backup job started");
        true
    }

    /// Signal cancellation and drop the tenant's job from the registry.
    /// Returns `false` when no job existed.
    pub async fn stop_tenant(&self, tenant: TenantId) -> bool {
        let mut jobs = self.jobs.write().await;
        match jobs.remove(&tenant) {
            Some(job) => {
                job.cancel.cancel();
                tracing::info!(tenant = %tenant, "backup job stopped");
                true
            }
            None => false,
        }
    }

    /// Read-only lookup of the tenant's current job state.
    pub async fn backup_information(&self, tenant: TenantId) -> Option<BackupJobInfo> {
        let jobs = self.jobs.read().await;
        match jobs.get(&tenant) {
            Some(job) => Some(job.info.read().await.clone()),
            None => None,
        }
    }

    /// Tenants with a registered job, for observability surfaces.
    pub async fn active_tenants(&self) -> Vec<TenantId> {
        let jobs = self.jobs.read().await;
        jobs.keys().copied().collect()
    }
}

struct BackupWorker {
    tenant: TenantId,
    interval: Duration,
    destination: Arc<dyn BackupDestination>,
    records: Arc<dyn TenantRecords>,
    files: Arc<dyn TenantFiles>,
    cipher: Arc<CipherService>,
    info: Arc<RwLock<BackupJobInfo>>,
    cancel: Arc<CancelHandle>,
    jobs: JobRegistry,
}

impl BackupWorker {
    async fn run(self) {
        eprintln!("[DBG] {} worker RUN enter", self.tenant);
        self.set_status(BackupStatus::Running).await;
        eprintln!("[DBG] {} status set Running", self.tenant);

        if let Err(err) = self.run_loop().await {
            tracing::error!(tenant = %self.tenant, error = %err, "backup job terminated");
        }

        self.set_status(BackupStatus::Stopped).await;

        // Drop the registry entry only if it is still ours; a stop/start
        // pair may have re-registered the tenant with a new job.
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get(&self.tenant) {
            if Arc::ptr_eq(&job.cancel, &self.cancel) {
                jobs.remove(&self.tenant);
            }
        }
    }

    async fn run_loop(&self) -> Result<(), ArkivError> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            eprintln!("[DBG] {} before connect", self.tenant);
            self.destination.connect().await?;
            eprintln!("[DBG] {} after connect", self.tenant);

            let mut records = self.records.records_with_blobs().await?;
            records.sort_by_key(|record| record.id);
            eprintln!("[DBG] {} pass START records={}", self.tenant, records.len());
            tracing::debug!(tenant = %self.tenant, records = records.len(), "backup pass started");

            for record in &records {
                if self.cancel.is_cancelled() {
                    return Ok(());
                }
                // One record fully at a time. A failed record is logged and
                // skipped; the walk continues with the next one.
                if let Err(err) = self.backup_record(record).await {
                    tracing::warn!(
                        tenant = %self.tenant,
                        record = %record.id,
                        error = %err,
                        "record skipped during backup pass"
                    );
                }
            }

            let now = Utc::now();
            {
                let mut info = self.info.write().await;
                info.last_run = Some(now);
                info.next_run = chrono::Duration::from_std(self.interval)
                    .ok()
                    .map(|step| now + step);
            }
            eprintln!("[DBG] {} pass FINISH", self.tenant);
            tracing::info!(tenant = %self.tenant, records = records.len(), "backup pass finished");

            if self.cancel.is_cancelled() {
                return Ok(());
            }
            self.cancel.sleep(self.interval).await;
        }
    }

    async fn backup_record(&self, record: &Record) -> Result<(), ArkivError> {
        let mut entries = BTreeMap::new();
        entries.insert(
            snapshot::snapshot_entry_name(record.id),
            snapshot::snapshot_record(record)?,
        );

        for blob in &record.blobs {
            let (data, sidecar) = self.files.read(&blob.content_path).await?;
            entries.insert(format!("{}.metadata", blob.name), serde_json::to_vec(&sidecar)?);
            entries.insert(blob.name.clone(), data);
        }

        let packed = archive::pack(&entries)?;
        let envelope = self.cipher.encrypt(&packed)?;
        let body = envelope.to_bytes()?;

        if self.cancel.is_cancelled() {
            return Ok(());
        }
        self.destination
            .push(self.tenant, &snapshot::archive_object_name(record.id), &body)
            .await
    }

    async fn set_status(&self, status: BackupStatus) {
        self.info.write().await.status = status;
    }
}

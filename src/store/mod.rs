//! Tenant-scoped data-store and file-store seams.
//!
//! Backup and restore jobs never read tenant context from anything ambient.
//! A provider hands out a handle bound to one tenant id, constructed once
//! per job and used for the job's whole lifetime.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ArkivError;
use crate::model::{BlobSidecar, Record, TenantId};

mod local_files;
mod memory;

pub use local_files::LocalFileStore;
pub use memory::MemoryDataStore;

/// Provider of tenant-bound record handles.
pub trait DataStore: Send + Sync {
    fn for_tenant(&self, tenant: TenantId) -> Arc<dyn TenantRecords>;
}

/// Record access scoped to a single fixed tenant.
#[async_trait]
pub trait TenantRecords: Send + Sync {
    /// All of the tenant's records with their owned blob collections
    /// loaded. Tag collections are left empty: tags fan out across the
    /// tenant's whole record set and are excluded from the walk.
    async fn records_with_blobs(&self) -> Result<Vec<Record>, ArkivError>;

    async fn find(&self, id: Uuid) -> Result<Option<Record>, ArkivError>;

    /// Update-or-insert by primary key. An existing row has its scalar
    /// fields overwritten; its collections are left untouched. An absent
    /// key inserts the record as given. Collection merging is not part of
    /// this primitive.
    async fn upsert(&self, record: Record) -> Result<(), ArkivError>;
}

/// Provider of tenant-bound file handles.
pub trait FileStore: Send + Sync {
    fn for_tenant(&self, tenant: TenantId) -> Arc<dyn TenantFiles>;
}

/// Blob access scoped to a single fixed tenant.
#[async_trait]
pub trait TenantFiles: Send + Sync {
    /// Read a blob's bytes and its metadata sidecar.
    async fn read(&self, path: &str) -> Result<(Vec<u8>, BlobSidecar), ArkivError>;

    /// Write blob bytes under `name`, persisting the sidecar when one is
    /// supplied. Returns the stored path.
    async fn write_known_metadata(
        &self,
        name: &str,
        data: &[u8],
        sidecar: Option<&BlobSidecar>,
    ) -> Result<String, ArkivError>;
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ArkivError;
use crate::model::{Record, TenantId};
use crate::store::{DataStore, TenantRecords};

type TenantMap = HashMap<TenantId, HashMap<Uuid, Record>>;

/// In-memory record store keyed by tenant. The reference implementation
/// used by the engine's tests and by embedders without a database.
#[derive(Default)]
pub struct MemoryDataStore {
    tenants: Arc<RwLock<TenantMap>>,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record verbatim, collections included. Seeding helper for
    /// tests and fixtures; normal writes go through the tenant handle.
    pub async fn seed(&self, record: Record) {
        let mut tenants = self.tenants.write().await;
        tenants
            .entry(record.tenant_id)
            .or_default()
            .insert(record.id, record);
    }
}

impl DataStore for MemoryDataStore {
    fn for_tenant(&self, tenant: TenantId) -> Arc<dyn TenantRecords> {
        Arc::new(MemoryTenantRecords {
            tenant,
            tenants: self.tenants.clone(),
        })
    }
}

struct MemoryTenantRecords {
    tenant: TenantId,
    tenants: Arc<RwLock<TenantMap>>,
}

#[async_trait]
impl TenantRecords for MemoryTenantRecords {
    async fn records_with_blobs(&self) -> Result<Vec<Record>, ArkivError> {
        let tenants = self.tenants.read().await;
        let mut records: Vec<Record> = tenants
            .get(&self.tenant)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();
        for record in &mut records {
            record.tags.clear();
        }
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Record>, ArkivError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(&self.tenant).and_then(|rows| rows.get(&id)).cloned())
    }

    async fn upsert(&self, record: Record) -> Result<(), ArkivError> {
        if record.tenant_id != self.tenant {
            return Err(ArkivError::Configuration {
                message: format!(
                    "record {} belongs to tenant {}, handle is bound to {}",
                    record.id, record.tenant_id, self.tenant
                ),
            });
        }

        let mut tenants = self.tenants.write().await;
        let rows = tenants.entry(self.tenant).or_default();
        match rows.get_mut(&record.id) {
            Some(existing) => {
                // Scalar overwrite only; blobs and tags stay as they are.
                existing.title = record.title;
                existing.notes = record.notes;
                existing.created_at = record.created_at;
                existing.updated_at = record.updated_at;
            }
            None => {
                rows.insert(record.id, record);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Blob, Tag};
    use chrono::Utc;

    fn record(tenant: TenantId, title: &str) -> Record {
        let id = Uuid::new_v4();
        Record {
            id,
            tenant_id: tenant,
            title: title.to_string(),
            notes: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            blobs: vec![Blob {
                id: Uuid::new_v4(),
                record_id: id,
                name: "scan.pdf".to_string(),
                content_path: "scan.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                size: 4,
            }],
            tags: vec![Tag {
                id: Uuid::new_v4(),
                name: "invoices".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn upsert_on_existing_key_overwrites_scalars_only() {
        let store = MemoryDataStore::new();
        let tenant = TenantId::new();
        let original = record(tenant, "original");
        store.seed(original.clone()).await;

        let handle = store.for_tenant(tenant);
        let mut incoming = original.clone();
        incoming.title = "updated".to_string();
        incoming.blobs.clear();
        handle.upsert(incoming).await.unwrap();

        let stored = handle.find(original.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "updated");
        // Collections survive the scalar overwrite.
        assert_eq!(stored.blobs.len(), 1);
        assert_eq!(stored.tags.len(), 1);

        let all = handle.records_with_blobs().await.unwrap();
        assert_eq!(all.len(), 1, "upsert must not create a duplicate row");
    }

    #[tokio::test]
    async fn upsert_on_absent_key_inserts_one_row() {
        let store = MemoryDataStore::new();
        let tenant = TenantId::new();
        let handle = store.for_tenant(tenant);

        handle.upsert(record(tenant, "fresh")).await.unwrap();
        assert_eq!(handle.records_with_blobs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn records_with_blobs_excludes_tags_and_other_tenants() {
        let store = MemoryDataStore::new();
        let tenant = TenantId::new();
        store.seed(record(tenant, "mine")).await;
        store.seed(record(TenantId::new(), "theirs")).await;

        let records = store.for_tenant(tenant).records_with_blobs().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "mine");
        assert_eq!(records[0].blobs.len(), 1);
        assert!(records[0].tags.is_empty());
    }

    #[tokio::test]
    async fn upsert_rejects_foreign_tenant_rows() {
        let store = MemoryDataStore::new();
        let handle = store.for_tenant(TenantId::new());
        let err = handle.upsert(record(TenantId::new(), "foreign")).await.unwrap_err();
        assert!(err.is_configuration());
    }
}

// Shared across the integration test binaries; not every binary uses every
// helper.
#![allow(dead_code)]

use std::sync::OnceLock;

use arkiv::crypto::{generate_master_keypair, MasterPrivateKey, MasterPublicKey};
use arkiv::model::{Blob, BlobSidecar, Record, TenantId};
use chrono::Utc;
use uuid::Uuid;

/// One master keypair shared by every test in a binary; RSA generation is
/// too slow to repeat per test.
pub fn master_keys() -> &'static (MasterPublicKey, MasterPrivateKey) {
    static KEYS: OnceLock<(MasterPublicKey, MasterPrivateKey)> = OnceLock::new();
    KEYS.get_or_init(|| generate_master_keypair().expect("master keypair"))
}

pub fn record(tenant: TenantId, title: &str) -> Record {
    Record {
        id: Uuid::new_v4(),
        tenant_id: tenant,
        title: title.to_string(),
        notes: String::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        blobs: Vec::new(),
        tags: Vec::new(),
    }
}

pub fn record_with_blob(tenant: TenantId, title: &str, blob_name: &str, size: u64) -> Record {
    let mut rec = record(tenant, title);
    rec.blobs.push(Blob {
        id: Uuid::new_v4(),
        record_id: rec.id,
        name: blob_name.to_string(),
        content_path: blob_name.to_string(),
        content_type: "application/pdf".to_string(),
        size,
    });
    rec
}

pub fn sidecar(name: &str, content_type: &str, size: u64) -> BlobSidecar {
    BlobSidecar {
        name: name.to_string(),
        content_type: content_type.to_string(),
        size,
        modified_at: Utc::now(),
    }
}

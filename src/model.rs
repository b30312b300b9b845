use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ArkivError;

/// Identifier of an isolated tenant. A tenant's data is never visible to,
/// or processed alongside, another tenant's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TenantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Root entity of the document archive: one archived record together with
/// its owned file blobs and its tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub title: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub blobs: Vec<Blob>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// File payload owned by exactly one record. `record_id` is the
/// back-reference that closes the record/blob cycle in the entity graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blob {
    pub id: Uuid,
    pub record_id: Uuid,
    pub name: String,
    pub content_path: String,
    pub content_type: String,
    pub size: u64,
}

/// Label shared across records. Tag collections fan out across the whole
/// tenant and are excluded from the backup walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

/// JSON sidecar stored next to each blob entry inside an archive, and next
/// to each blob file in the tenant file store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobSidecar {
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}

/// Output of envelope encryption. All four fields are required to decrypt;
/// an envelope missing any of them is permanently unreadable.
///
/// Fields are base64 strings so the serialized form is a plain JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub ciphertext: String,
    pub wrapped_key: String,
    pub nonce: String,
    pub tag: String,
}

impl EncryptedEnvelope {
    /// Serialize the envelope to the byte form exchanged with a destination.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArkivError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ArkivError> {
        serde_json::from_slice(data).map_err(|e| ArkivError::Deserialization {
            message: format!("invalid envelope: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_roundtrips_through_bytes() {
        let envelope = EncryptedEnvelope {
            ciphertext: "Y2lwaGVy".to_string(),
            wrapped_key: "a2V5".to_string(),
            nonce: "bm9uY2U=".to_string(),
            tag: "dGFn".to_string(),
        };

        let bytes = envelope.to_bytes().unwrap();
        let parsed = EncryptedEnvelope::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.ciphertext, envelope.ciphertext);
        assert_eq!(parsed.wrapped_key, envelope.wrapped_key);
        assert_eq!(parsed.nonce, envelope.nonce);
        assert_eq!(parsed.tag, envelope.tag);
    }

    #[test]
    fn envelope_with_missing_field_is_unreadable() {
        let mut value: serde_json::Value = serde_json::json!({
            "ciphertext": "Y2lwaGVy",
            "wrapped_key": "a2V5",
            "nonce": "bm9uY2U=",
            "tag": "dGFn",
        });
        value.as_object_mut().unwrap().remove("tag");
        let bytes = serde_json::to_vec(&value).unwrap();

        let err = EncryptedEnvelope::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ArkivError::Deserialization { .. }));
    }
}

//! Serializes a record's entity graph to a portable snapshot and applies
//! snapshots back through an upsert.
//!
//! The entity graph is cyclic (record↔blob, record↔tag), so encoding keeps
//! an explicit visited-node table: the first visit of a node assigns it the
//! next `$id` and emits its body; every later visit emits `{"$ref": n}`.
//! Decoding mirrors the table. Nothing here relies on a serializer's
//! built-in reference preservation; the table is in the output and can be
//! inspected.

use std::collections::HashMap;

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::ArkivError;
use crate::model::{Blob, Record, Tag, TenantId};
use crate::store::TenantRecords;

const RECORD_KIND: &str = "Record";

/// Name of the snapshot entry inside a record's archive.
pub fn snapshot_entry_name(id: Uuid) -> String {
    format!("{RECORD_KIND}_{id}.json")
}

/// Name of the encrypted archive object pushed to a destination.
pub fn archive_object_name(id: Uuid) -> String {
    format!("{RECORD_KIND}_{id}.zip.enc")
}

/// Whether an archive entry holds a record snapshot (as opposed to blob
/// bytes or a metadata sidecar).
pub fn is_snapshot_entry(name: &str) -> bool {
    name.starts_with("Record_") && name.ends_with(".json")
}

/// Serialize one record with its reachable graph.
pub fn snapshot_record(record: &Record) -> Result<Vec<u8>, ArkivError> {
    let mut encoder = Encoder::default();
    let root = encoder.encode_record(record);
    let doc = json!({ "kind": RECORD_KIND, "root": root });
    Ok(serde_json::to_vec(&doc)?)
}

/// Decode one snapshot back into a record.
pub fn decode_record(data: &[u8]) -> Result<Record, ArkivError> {
    let doc: Value = serde_json::from_slice(data).map_err(|e| ArkivError::Deserialization {
        message: format!("invalid snapshot: {e}"),
    })?;

    let kind = doc.get("kind").and_then(Value::as_str).unwrap_or_default();
    if kind != RECORD_KIND {
        return Err(ArkivError::Deserialization {
            message: format!("unexpected snapshot kind: {kind:?}"),
        });
    }

    let root = doc.get("root").ok_or_else(|| ArkivError::Deserialization {
        message: "snapshot has no root node".to_string(),
    })?;

    let mut decoder = Decoder::default();
    decoder.decode_record(root)
}

/// Decode a snapshot and apply it as exactly one upsert against the
/// tenant's record store.
pub async fn restore_record(
    data: &[u8],
    records: &dyn TenantRecords,
) -> Result<Uuid, ArkivError> {
    let record = decode_record(data)?;
    let id = record.id;
    records.upsert(record).await?;
    Ok(id)
}

#[derive(Default)]
struct Encoder {
    next_id: u64,
    seen: HashMap<Uuid, u64>,
}

impl Encoder {
    fn assign(&mut self, entity: Uuid) -> u64 {
        self.next_id += 1;
        self.seen.insert(entity, self.next_id);
        self.next_id
    }

    fn encode_record(&mut self, record: &Record) -> Value {
        let record_ref = self.assign(record.id);
        let blobs: Vec<Value> = record
            .blobs
            .iter()
            .map(|blob| self.encode_blob(blob))
            .collect();
        let tags: Vec<Value> = record.tags.iter().map(|tag| self.encode_tag(tag)).collect();

        json!({
            "$id": record_ref,
            "id": record.id,
            "tenant_id": record.tenant_id,
            "title": record.title,
            "notes": record.notes,
            "created_at": record.created_at,
            "updated_at": record.updated_at,
            "blobs": blobs,
            "tags": tags,
        })
    }

    fn encode_blob(&mut self, blob: &Blob) -> Value {
        if let Some(reference) = self.seen.get(&blob.id) {
            return json!({ "$ref": reference });
        }
        let blob_ref = self.assign(blob.id);

        // The owning record was encoded before its blobs, so the
        // back-reference always resolves through the table.
        let owner: Value = match self.seen.get(&blob.record_id) {
            Some(reference) => json!({ "$ref": reference }),
            None => json!(blob.record_id),
        };

        json!({
            "$id": blob_ref,
            "id": blob.id,
            "record": owner,
            "name": blob.name,
            "content_path": blob.content_path,
            "content_type": blob.content_type,
            "size": blob.size,
        })
    }

    fn encode_tag(&mut self, tag: &Tag) -> Value {
        if let Some(reference) = self.seen.get(&tag.id) {
            return json!({ "$ref": reference });
        }
        let tag_ref = self.assign(tag.id);
        json!({ "$id": tag_ref, "id": tag.id, "name": tag.name })
    }
}

#[derive(Default)]
struct Decoder {
    ids: HashMap<u64, Uuid>,
    blobs: HashMap<u64, Blob>,
    tags: HashMap<u64, Tag>,
}

impl Decoder {
    fn decode_record(&mut self, value: &Value) -> Result<Record, ArkivError> {
        let node = object(value, "record")?;
        let record_ref = node_id(node, "record")?;
        let id = uuid_field(node, "id")?;
        self.ids.insert(record_ref, id);

        let mut blobs = Vec::new();
        for item in array_field(node, "blobs")? {
            blobs.push(self.decode_blob(item)?);
        }
        let mut tags = Vec::new();
        for item in array_field(node, "tags")? {
            tags.push(self.decode_tag(item)?);
        }

        Ok(Record {
            id,
            tenant_id: TenantId(uuid_field(node, "tenant_id")?),
            title: string_field(node, "title")?,
            notes: string_field(node, "notes")?,
            created_at: time_field(node, "created_at")?,
            updated_at: time_field(node, "updated_at")?,
            blobs,
            tags,
        })
    }

    fn decode_blob(&mut self, value: &Value) -> Result<Blob, ArkivError> {
        let node = object(value, "blob")?;
        if let Some(reference) = node_ref(node) {
            return self.blobs.get(&reference).cloned().ok_or_else(|| {
                ArkivError::Deserialization {
                    message: format!("blob $ref {reference} points at no known node"),
                }
            });
        }

        let blob_ref = node_id(node, "blob")?;
        let id = uuid_field(node, "id")?;
        self.ids.insert(blob_ref, id);

        let record_id = match node.get("record") {
            Some(owner) => self.resolve_owner(owner)?,
            None => uuid_field(node, "record_id")?,
        };

        let blob = Blob {
            id,
            record_id,
            name: string_field(node, "name")?,
            content_path: string_field(node, "content_path")?,
            content_type: string_field(node, "content_type")?,
            size: u64_field(node, "size")?,
        };
        self.blobs.insert(blob_ref, blob.clone());
        Ok(blob)
    }

    fn decode_tag(&mut self, value: &Value) -> Result<Tag, ArkivError> {
        let node = object(value, "tag")?;
        if let Some(reference) = node_ref(node) {
            return self.tags.get(&reference).cloned().ok_or_else(|| {
                ArkivError::Deserialization {
                    message: format!("tag $ref {reference} points at no known node"),
                }
            });
        }

        let tag_ref = node_id(node, "tag")?;
        let id = uuid_field(node, "id")?;
        self.ids.insert(tag_ref, id);

        let tag = Tag {
            id,
            name: string_field(node, "name")?,
        };
        self.tags.insert(tag_ref, tag.clone());
        Ok(tag)
    }

    fn resolve_owner(&self, owner: &Value) -> Result<Uuid, ArkivError> {
        if let Some(node) = owner.as_object() {
            if let Some(reference) = node_ref(node) {
                return self.ids.get(&reference).copied().ok_or_else(|| {
                    ArkivError::Deserialization {
                        message: format!("owner $ref {reference} points at no known node"),
                    }
                });
            }
        }
        parse_uuid(owner, "record")
    }
}

fn object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, ArkivError> {
    value.as_object().ok_or_else(|| ArkivError::Deserialization {
        message: format!("{what} node is not an object"),
    })
}

fn node_id(node: &Map<String, Value>, what: &str) -> Result<u64, ArkivError> {
    node.get("$id")
        .and_then(Value::as_u64)
        .ok_or_else(|| ArkivError::Deserialization {
            message: format!("{what} node has no $id"),
        })
}

fn node_ref(node: &Map<String, Value>) -> Option<u64> {
    node.get("$ref").and_then(Value::as_u64)
}

fn string_field(node: &Map<String, Value>, name: &str) -> Result<String, ArkivError> {
    node.get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ArkivError::Deserialization {
            message: format!("missing field {name}"),
        })
}

fn array_field<'a>(
    node: &'a Map<String, Value>,
    name: &str,
) -> Result<&'a Vec<Value>, ArkivError> {
    node.get(name)
        .and_then(Value::as_array)
        .ok_or_else(|| ArkivError::Deserialization {
            message: format!("missing field {name}"),
        })
}

fn u64_field(node: &Map<String, Value>, name: &str) -> Result<u64, ArkivError> {
    node.get(name)
        .and_then(Value::as_u64)
        .ok_or_else(|| ArkivError::Deserialization {
            message: format!("missing field {name}"),
        })
}

fn uuid_field(node: &Map<String, Value>, name: &str) -> Result<Uuid, ArkivError> {
    let value = node.get(name).ok_or_else(|| ArkivError::Deserialization {
        message: format!("missing field {name}"),
    })?;
    parse_uuid(value, name)
}

fn parse_uuid(value: &Value, name: &str) -> Result<Uuid, ArkivError> {
    value
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| ArkivError::Deserialization {
            message: format!("field {name} is not a UUID"),
        })
}

fn time_field(
    node: &Map<String, Value>,
    name: &str,
) -> Result<chrono::DateTime<chrono::Utc>, ArkivError> {
    let raw = node.get(name).and_then(Value::as_str).ok_or_else(|| {
        ArkivError::Deserialization {
            message: format!("missing field {name}"),
        }
    })?;
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&chrono::Utc))
        .map_err(|e| ArkivError::Deserialization {
            message: format!("field {name} is not a timestamp: {e}"),
        })
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;

use crate::error::ArkivError;
use crate::model::{BlobSidecar, TenantId};
use crate::store::{FileStore, TenantFiles};

/// Filesystem-backed blob store with one directory per tenant. Writes go
/// through a temporary file and a rename so a crash never leaves a partial
/// blob under its final name.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, ArkivError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}

impl FileStore for LocalFileStore {
    fn for_tenant(&self, tenant: TenantId) -> Arc<dyn TenantFiles> {
        Arc::new(LocalTenantFiles {
            dir: self.root.join(tenant.to_string()),
        })
    }
}

struct LocalTenantFiles {
    dir: PathBuf,
}

impl LocalTenantFiles {
    fn blob_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn sidecar_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.metadata"))
    }
}

#[async_trait]
impl TenantFiles for LocalTenantFiles {
    async fn read(&self, path: &str) -> Result<(Vec<u8>, BlobSidecar), ArkivError> {
        let blob_path = self.blob_path(path);
        let data = fs::read(&blob_path).await?;

        let sidecar_path = self.sidecar_path(path);
        let sidecar = match fs::read(&sidecar_path).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| ArkivError::Deserialization {
                message: format!("invalid sidecar for {path}: {e}"),
            })?,
            // No sidecar on disk: derive one from the file itself.
            Err(_) => {
                let meta = fs::metadata(&blob_path).await?;
                let modified_at: DateTime<Utc> =
                    meta.modified().map(DateTime::from).unwrap_or_else(|_| Utc::now());
                BlobSidecar {
                    name: path.to_string(),
                    content_type: "application/octet-stream".to_string(),
                    size: data.len() as u64,
                    modified_at,
                }
            }
        };

        Ok((data, sidecar))
    }

    async fn write_known_metadata(
        &self,
        name: &str,
        data: &[u8],
        sidecar: Option<&BlobSidecar>,
    ) -> Result<String, ArkivError> {
        fs::create_dir_all(&self.dir).await?;

        let blob_path = self.blob_path(name);
        let temp_path = blob_path.with_extension("tmp");
        fs::write(&temp_path, data).await?;
        fs::rename(&temp_path, &blob_path).await?;

        if let Some(sidecar) = sidecar {
            let sidecar_path = self.sidecar_path(name);
            let temp_path = sidecar_path.with_extension("tmp");
            fs::write(&temp_path, serde_json::to_vec(sidecar)?).await?;
            fs::rename(&temp_path, &sidecar_path).await?;
        }

        Ok(blob_path.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_then_read_returns_bytes_and_sidecar() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).unwrap();
        let files = store.for_tenant(TenantId::new());

        let sidecar = BlobSidecar {
            name: "scan.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size: 4,
            modified_at: Utc::now(),
        };
        files
            .write_known_metadata("scan.pdf", b"%PDF", Some(&sidecar))
            .await
            .unwrap();

        let (data, loaded) = files.read("scan.pdf").await.unwrap();
        assert_eq!(data, b"%PDF");
        assert_eq!(loaded.content_type, "application/pdf");
        assert_eq!(loaded.size, 4);
    }

    #[tokio::test]
    async fn read_without_sidecar_derives_metadata() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).unwrap();
        let files = store.for_tenant(TenantId::new());

        files.write_known_metadata("notes.txt", b"hello", None).await.unwrap();

        let (data, sidecar) = files.read("notes.txt").await.unwrap();
        assert_eq!(data, b"hello");
        assert_eq!(sidecar.name, "notes.txt");
        assert_eq!(sidecar.size, 5);
        assert_eq!(sidecar.content_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn tenants_do_not_share_directories() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).unwrap();
        let a = store.for_tenant(TenantId::new());
        let b = store.for_tenant(TenantId::new());

        a.write_known_metadata("doc.bin", b"a-bytes", None).await.unwrap();
        assert!(b.read("doc.bin").await.is_err());
    }
}

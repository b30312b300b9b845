use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::destination::backend::{
    BackupDestination, DestinationKind, LocalDestinationConfig,
};
use crate::error::ArkivError;
use crate::model::TenantId;

/// Filesystem destination with one directory per tenant. Uploads go
/// through a temporary file and a rename so a crash never leaves a partial
/// object under its final name.
#[derive(Debug)]
pub struct LocalDestination {
    base_path: PathBuf,
}

impl LocalDestination {
    pub fn new(config: LocalDestinationConfig) -> Result<Self, ArkivError> {
        let base_path = PathBuf::from(&config.base_path);

        if config.create_dirs.unwrap_or(true) {
            std::fs::create_dir_all(&base_path)?;
        }
        if !base_path.is_dir() {
            return Err(ArkivError::Configuration {
                message: format!("base path is not a directory: {}", base_path.display()),
            });
        }

        Ok(Self { base_path })
    }

    fn tenant_dir(&self, tenant: TenantId) -> PathBuf {
        self.base_path.join(tenant.to_string())
    }

    fn object_path(&self, tenant: TenantId, name: &str) -> PathBuf {
        self.tenant_dir(tenant).join(name)
    }
}

#[async_trait]
impl BackupDestination for LocalDestination {
    async fn connect(&self) -> Result<(), ArkivError> {
        // Probe with a write and a delete, as a remote session check would.
        let probe = self.base_path.join(".connect_probe");
        fs::write(&probe, b"probe").await?;
        fs::remove_file(&probe).await?;
        Ok(())
    }

    async fn push(&self, tenant: TenantId, name: &str, data: &[u8]) -> Result<(), ArkivError> {
        fs::create_dir_all(self.tenant_dir(tenant)).await?;

        let object_path = self.object_path(tenant, name);
        let temp_path = object_path.with_extension("tmp");
        fs::write(&temp_path, data).await?;
        fs::rename(&temp_path, &object_path).await?;
        Ok(())
    }

    async fn list(&self, tenant: TenantId) -> Result<Vec<String>, ArkivError> {
        let dir = self.tenant_dir(tenant);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if !name.ends_with(".tmp") {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn fetch(&self, tenant: TenantId, name: &str) -> Result<Vec<u8>, ArkivError> {
        let object_path = self.object_path(tenant, name);
        if !object_path.exists() {
            return Err(ArkivError::Transport {
                message: format!("object not found: {name}"),
            });
        }
        Ok(fs::read(&object_path).await?)
    }

    fn kind(&self) -> DestinationKind {
        DestinationKind::Local
    }
}

impl LocalDestination {
    /// Convenience constructor used by tests and tooling.
    pub fn at<P: AsRef<Path>>(base_path: P) -> Result<Self, ArkivError> {
        Self::new(LocalDestinationConfig {
            base_path: base_path.as_ref().to_string_lossy().into_owned(),
            create_dirs: Some(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn push_list_fetch_roundtrip() {
        let dir = tempdir().unwrap();
        let destination = LocalDestination::at(dir.path()).unwrap();
        let tenant = TenantId::new();

        destination.connect().await.unwrap();
        destination.push(tenant, "a.zip.enc", b"alpha").await.unwrap();
        destination.push(tenant, "b.zip.enc", b"beta").await.unwrap();

        let names = destination.list(tenant).await.unwrap();
        assert_eq!(names, vec!["a.zip.enc".to_string(), "b.zip.enc".to_string()]);
        assert_eq!(destination.fetch(tenant, "b.zip.enc").await.unwrap(), b"beta");
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let dir = tempdir().unwrap();
        let destination = LocalDestination::at(dir.path()).unwrap();
        let a = TenantId::new();
        let b = TenantId::new();

        destination.push(a, "only-a.zip.enc", b"secret").await.unwrap();

        assert!(destination.list(b).await.unwrap().is_empty());
        assert!(destination.fetch(b, "only-a.zip.enc").await.is_err());
    }

    #[tokio::test]
    async fn missing_object_is_a_transport_error() {
        let dir = tempdir().unwrap();
        let destination = LocalDestination::at(dir.path()).unwrap();
        let err = destination.fetch(TenantId::new(), "nope.zip.enc").await.unwrap_err();
        assert!(matches!(err, ArkivError::Transport { .. }));
    }
}

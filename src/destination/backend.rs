use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ArkivError;
use crate::model::TenantId;

/// Destination kinds supported by the engine. Exactly one implementation
/// is active at a time, selected by the factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DestinationKind {
    #[default]
    Local,
    Http,
}

impl std::str::FromStr for DestinationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(DestinationKind::Local),
            "http" => Ok(DestinationKind::Http),
            _ => Err(format!("Unknown destination kind: {}", s)),
        }
    }
}

/// Remote destination for a tenant's encrypted archives.
#[async_trait]
pub trait BackupDestination: Send + Sync + std::fmt::Debug {
    /// Establish or re-establish the session/target. Safe to call
    /// repeatedly; jobs call it at the start of every pass.
    async fn connect(&self) -> Result<(), ArkivError>;

    /// Upload one named archive for the tenant.
    async fn push(&self, tenant: TenantId, name: &str, data: &[u8]) -> Result<(), ArkivError>;

    /// Server-enumerated names of the tenant's stored archives.
    async fn list(&self, tenant: TenantId) -> Result<Vec<String>, ArkivError>;

    /// Bytes of one stored archive.
    async fn fetch(&self, tenant: TenantId, name: &str) -> Result<Vec<u8>, ArkivError>;

    fn kind(&self) -> DestinationKind;
}

/// Single-pass cursor over a tenant's stored archives: the name list is
/// enumerated once up front, bytes are fetched lazily per [`next`] call,
/// and the sequence is not restartable.
///
/// [`next`]: DestinationCursor::next
pub struct DestinationCursor {
    destination: Arc<dyn BackupDestination>,
    tenant: TenantId,
    names: std::vec::IntoIter<String>,
}

impl DestinationCursor {
    pub async fn open(
        destination: Arc<dyn BackupDestination>,
        tenant: TenantId,
    ) -> Result<Self, ArkivError> {
        let names = destination.list(tenant).await?;
        Ok(Self {
            destination,
            tenant,
            names: names.into_iter(),
        })
    }

    pub async fn next(&mut self) -> Result<Option<(String, Vec<u8>)>, ArkivError> {
        match self.names.next() {
            Some(name) => {
                let data = self.destination.fetch(self.tenant, &name).await?;
                Ok(Some((name, data)))
            }
            None => Ok(None),
        }
    }
}

/// Destination configuration. The section matching `kind` must be present.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DestinationConfig {
    pub kind: DestinationKind,
    pub local: Option<LocalDestinationConfig>,
    pub http: Option<HttpDestinationConfig>,
}

/// Local filesystem destination configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalDestinationConfig {
    pub base_path: String,
    pub create_dirs: Option<bool>,
}

/// HTTP destination configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpDestinationConfig {
    pub base_url: String,
    pub timeout_secs: Option<u64>,
}

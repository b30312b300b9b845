use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::destination::backend::{BackupDestination, DestinationKind, HttpDestinationConfig};
use crate::error::ArkivError;
use crate::model::TenantId;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// HTTP destination speaking the reference backup wire protocol:
///
/// - `POST {base}/api/Backup/backup?tenantId=&name=` with raw bytes
/// - `GET  {base}/api/Backup/list?tenantId=` returning a JSON name array
/// - `GET  {base}/api/Backup/restore?tenantId=&name=` returning raw bytes
#[derive(Debug)]
pub struct HttpDestination {
    client: Client,
    base_url: String,
}

impl HttpDestination {
    pub fn new(config: HttpDestinationConfig) -> Result<Self, ArkivError> {
        if config.base_url.is_empty() {
            return Err(ArkivError::Configuration {
                message: "HTTP destination base URL cannot be empty".to_string(),
            });
        }

        let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArkivError::Configuration {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/api/Backup/{}", self.base_url, operation)
    }

    fn transport_error(operation: &str, status: StatusCode) -> ArkivError {
        ArkivError::Transport {
            message: format!("{operation} failed with HTTP {status}"),
        }
    }
}

#[async_trait]
impl BackupDestination for HttpDestination {
    async fn connect(&self) -> Result<(), ArkivError> {
        // Reachability probe; any HTTP response proves the target answers.
        self.client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| ArkivError::Transport {
                message: format!("destination unreachable: {e}"),
            })?;
        Ok(())
    }

    async fn push(&self, tenant: TenantId, name: &str, data: &[u8]) -> Result<(), ArkivError> {
        let response = self
            .client
            .post(self.endpoint("backup"))
            .query(&[("tenantId", tenant.to_string()), ("name", name.to_string())])
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| ArkivError::Transport {
                message: format!("push of {name} failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(Self::transport_error("push", response.status()));
        }
        Ok(())
    }

    async fn list(&self, tenant: TenantId) -> Result<Vec<String>, ArkivError> {
        let response = self
            .client
            .get(self.endpoint("list"))
            .query(&[("tenantId", tenant.to_string())])
            .send()
            .await
            .map_err(|e| ArkivError::Transport {
                message: format!("list failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(Self::transport_error("list", response.status()));
        }

        let body = response.bytes().await.map_err(|e| ArkivError::Transport {
            message: format!("list body read failed: {e}"),
        })?;
        serde_json::from_slice(&body).map_err(|e| ArkivError::Deserialization {
            message: format!("list response is not a JSON name array: {e}"),
        })
    }

    async fn fetch(&self, tenant: TenantId, name: &str) -> Result<Vec<u8>, ArkivError> {
        let response = self
            .client
            .get(self.endpoint("restore"))
            .query(&[("tenantId", tenant.to_string()), ("name", name.to_string())])
            .send()
            .await
            .map_err(|e| ArkivError::Transport {
                message: format!("fetch of {name} failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(Self::transport_error("fetch", response.status()));
        }

        let body = response.bytes().await.map_err(|e| ArkivError::Transport {
            message: format!("fetch body read failed: {e}"),
        })?;
        Ok(body.to_vec())
    }

    fn kind(&self) -> DestinationKind {
        DestinationKind::Http
    }
}

//! Engine configuration. Master key material is provisioned externally as
//! inline PEM or a path to a PEM file, and is validated before any job runs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::MasterPublicKey;
use crate::destination::DestinationConfig;
use crate::error::ArkivError;

const DEFAULT_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub destination: DestinationConfig,
    /// Inline master public key PEM. Takes precedence over the path.
    pub master_public_key_pem: Option<String>,
    /// Path to a master public key PEM file.
    pub master_public_key_path: Option<PathBuf>,
    /// Backup interval applied when a start request does not name one.
    pub default_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            destination: DestinationConfig::default(),
            master_public_key_pem: None,
            master_public_key_path: None,
            default_interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArkivError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&raw).map_err(|e| ArkivError::Configuration {
            message: format!("invalid config file {}: {e}", path.as_ref().display()),
        })
    }

    pub fn validate(&self) -> Result<(), ArkivError> {
        if self.master_public_key_pem.is_none() && self.master_public_key_path.is_none() {
            return Err(ArkivError::Configuration {
                message: "no master public key configured".to_string(),
            });
        }
        if self.default_interval_secs == 0 {
            return Err(ArkivError::Configuration {
                message: "default backup interval must be positive".to_string(),
            });
        }
        // Parse eagerly so a bad key fails configuration, not the first job.
        self.master_public_key()?;
        Ok(())
    }

    /// Resolve the master public key from inline PEM or the configured path.
    pub fn master_public_key(&self) -> Result<MasterPublicKey, ArkivError> {
        if let Some(pem) = &self.master_public_key_pem {
            return MasterPublicKey::from_pem(pem);
        }
        if let Some(path) = &self.master_public_key_path {
            let pem = std::fs::read_to_string(path)?;
            return MasterPublicKey::from_pem(&pem);
        }
        Err(ArkivError::Configuration {
            message: "no master public key configured".to_string(),
        })
    }
}

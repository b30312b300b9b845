use std::sync::Arc;

use crate::destination::backend::{BackupDestination, DestinationConfig, DestinationKind};
use crate::destination::backends::{HttpDestination, LocalDestination};
use crate::error::ArkivError;

/// Constructs the one active destination implementation from configuration.
pub struct DestinationFactory;

impl DestinationFactory {
    pub fn create(config: DestinationConfig) -> Result<Arc<dyn BackupDestination>, ArkivError> {
        match config.kind {
            DestinationKind::Local => {
                let local_config = config.local.ok_or_else(|| ArkivError::Configuration {
                    message: "local destination config is required".to_string(),
                })?;
                Ok(Arc::new(LocalDestination::new(local_config)?))
            }

            DestinationKind::Http => {
                let http_config = config.http.ok_or_else(|| ArkivError::Configuration {
                    message: "HTTP destination config is required".to_string(),
                })?;
                Ok(Arc::new(HttpDestination::new(http_config)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::backend::LocalDestinationConfig;
    use tempfile::tempdir;

    #[test]
    fn missing_section_is_a_configuration_error() {
        let err = DestinationFactory::create(DestinationConfig {
            kind: DestinationKind::Http,
            local: None,
            http: None,
        })
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn local_destination_is_built_from_its_section() {
        let dir = tempdir().unwrap();
        let destination = DestinationFactory::create(DestinationConfig {
            kind: DestinationKind::Local,
            local: Some(LocalDestinationConfig {
                base_path: dir.path().to_string_lossy().into_owned(),
                create_dirs: Some(true),
            }),
            http: None,
        })
        .unwrap();
        assert_eq!(destination.kind(), DestinationKind::Local);
    }
}

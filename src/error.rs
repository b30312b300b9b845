use thiserror::Error;

/// Errors surfaced by the backup/restore engine.
///
/// Per-unit failures (one record during a backup walk, one archive during a
/// restore) are caught and logged by the job loops; everything else
/// propagates and terminates the enclosing job.
#[derive(Debug, Error)]
pub enum ArkivError {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Authentication tag mismatch or content-key unwrap failure. Decrypt
    /// never returns plaintext on this path.
    #[error("integrity error: {message}")]
    Integrity { message: String },

    #[error("transport error: {message}")]
    Transport { message: String },

    /// Duplicate start request for a tenant that already has an active job.
    #[error("concurrency error: {message}")]
    Concurrency { message: String },

    #[error("deserialization error: {message}")]
    Deserialization { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ArkivError {
    pub fn is_integrity(&self) -> bool {
        matches!(self, ArkivError::Integrity { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, ArkivError::Configuration { .. })
    }
}

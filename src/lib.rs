//! # arkiv - Tenant-Scoped Backup and Restore Engine
//!
//! arkiv is the backup subsystem of a multi-tenant document archive. It
//! periodically snapshots each tenant's records and file blobs,
//! envelope-encrypts them, ships them to a pluggable remote destination,
//! and can later rehydrate a tenant's state from that destination.
//!
//! ## Features
//!
//! - **Envelope Encryption**: per-object AES-256-GCM content keys wrapped
//!   with a long-lived RSA-OAEP master key
//! - **Pluggable Destinations**: HTTP and local-filesystem providers behind
//!   one trait, selected by a factory
//! - **Per-Tenant Job Lifecycle**: interval-scheduled backup loops and
//!   one-shot restores with cooperative cancellation
//! - **Reference-Preserving Snapshots**: cyclic entity graphs serialized
//!   with an explicit visited-node table and merged back via upsert
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use arkiv::config::EngineConfig;
//! use arkiv::crypto::CipherService;
//! use arkiv::destination::DestinationFactory;
//! use arkiv::jobs::TenantBackupManager;
//! use arkiv::model::TenantId;
//! use arkiv::store::{LocalFileStore, MemoryDataStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), arkiv::ArkivError> {
//!     let config = EngineConfig::load("arkiv.json")?;
//!     config.validate()?;
//!
//!     let destination = DestinationFactory::create(config.destination.clone())?;
//!     let cipher = Arc::new(CipherService::for_backup(config.master_public_key()?));
//!     let data_store = Arc::new(MemoryDataStore::new());
//!     let file_store = Arc::new(LocalFileStore::new("blobs")?);
//!
//!     let backups = TenantBackupManager::new(destination, data_store, file_store, cipher);
//!     backups.start_tenant(TenantId::new(), Duration::from_secs(3600)).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`crypto`] - envelope encryption primitive
//! - [`archive`] - archive packaging with random-access unpack
//! - [`destination`] - pluggable backup destination and factory
//! - [`snapshot`] - entity graph serialization and upsert-merge restore
//! - [`jobs`] - per-tenant backup and restore job managers
//! - [`store`] - tenant-scoped data-store and file-store seams
//! - [`config`] / [`logging`] - engine configuration and tracing setup

pub mod archive;
pub mod config;
pub mod crypto;
pub mod destination;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod model;
pub mod snapshot;
pub mod store;

pub use error::ArkivError;
pub use model::{Blob, BlobSidecar, EncryptedEnvelope, Record, Tag, TenantId};
pub use crypto::{generate_master_keypair, CipherService, MasterPrivateKey, MasterPublicKey};
pub use destination::{
    BackupDestination, DestinationConfig, DestinationCursor, DestinationFactory, DestinationKind,
    HttpDestination, LocalDestination,
};
pub use jobs::{
    BackupJobInfo, BackupStatus, CancelHandle, RestoreJobInfo, RestoreStatus,
    TenantBackupManager, TenantRestoreManager,
};
pub use store::{
    DataStore, FileStore, LocalFileStore, MemoryDataStore, TenantFiles, TenantRecords,
};

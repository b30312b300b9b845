use std::sync::Arc;
use std::time::{Duration, Instant};

use arkiv::crypto::CipherService;
use arkiv::destination::{BackupDestination, LocalDestination};
use arkiv::jobs::{BackupStatus, TenantBackupManager};
use arkiv::model::TenantId;
use arkiv::store::{FileStore, LocalFileStore, MemoryDataStore};
use tempfile::tempdir;

mod common;

struct BackupFixture {
    manager: TenantBackupManager,
    destination: Arc<LocalDestination>,
    data_store: Arc<MemoryDataStore>,
    file_store: Arc<LocalFileStore>,
    _dest_dir: tempfile::TempDir,
    _blob_dir: tempfile::TempDir,
}

fn fixture() -> anyhow::Result<BackupFixture> {
    let dest_dir = tempdir()?;
    let blob_dir = tempdir()?;
    let destination = Arc::new(LocalDestination::at(dest_dir.path())?);
    let data_store = Arc::new(MemoryDataStore::new());
    let file_store = Arc::new(LocalFileStore::new(blob_dir.path())?);
    let (public, _) = master_pair();
    let cipher = Arc::new(CipherService::for_backup(public));

    let manager = TenantBackupManager::new(
        destination.clone(),
        data_store.clone(),
        file_store.clone(),
        cipher,
    );
    Ok(BackupFixture {
        manager,
        destination,
        data_store,
        file_store,
        _dest_dir: dest_dir,
        _blob_dir: blob_dir,
    })
}

fn master_pair() -> (
    arkiv::crypto::MasterPublicKey,
    arkiv::crypto::MasterPrivateKey,
) {
    let (public, private) = common::master_keys();
    (public.clone(), private.clone())
}

async fn wait_for_first_pass(manager: &TenantBackupManager, tenant: TenantId) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(info) = manager.backup_information(tenant).await {
            if info.last_run.is_some() {
                return;
            }
        }
        assert!(
            Instant::now() < deadline,
            "backup pass did not finish in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn one_pass_pushes_one_archive_per_record() -> anyhow::Result<()> {
    let fx = fixture()?;
    let tenant = TenantId::new();

    let with_blob = common::record_with_blob(tenant, "lease", "contract.pdf", 17);
    let without_blob = common::record(tenant, "memo");
    fx.file_store
        .for_tenant(tenant)
        .write_known_metadata(
            "contract.pdf",
            b"%PDF-1.7 contract",
            Some(&common::sidecar("contract.pdf", "application/pdf", 17)),
        )
        .await?;
    fx.data_store.seed(with_blob.clone()).await;
    fx.data_store.seed(without_blob.clone()).await;

    assert!(fx.manager.start_tenant(tenant, Duration::from_secs(60)).await);
    wait_for_first_pass(&fx.manager, tenant).await;

    let info = fx.manager.backup_information(tenant).await.unwrap();
    assert_eq!(info.status, BackupStatus::Running);
    let last_run = info.last_run.unwrap();
    assert_eq!(info.next_run.unwrap(), last_run + chrono::Duration::seconds(60));

    let names = fx.destination.list(tenant).await?;
    assert_eq!(names.len(), 2);
    assert!(names.contains(&format!("Record_{}.zip.enc", with_blob.id)));
    assert!(names.contains(&format!("Record_{}.zip.enc", without_blob.id)));

    assert!(fx.manager.stop_tenant(tenant).await);
    Ok(())
}

#[tokio::test]
async fn second_start_for_a_running_tenant_is_refused() -> anyhow::Result<()> {
    let fx = fixture()?;
    let tenant = TenantId::new();
    fx.data_store.seed(common::record(tenant, "only")).await;

    assert!(fx.manager.start_tenant(tenant, Duration::from_secs(60)).await);
    assert!(!fx.manager.start_tenant(tenant, Duration::from_secs(60)).await);

    assert!(fx.manager.stop_tenant(tenant).await);
    Ok(())
}

#[tokio::test]
async fn stop_without_a_job_returns_false() -> anyhow::Result<()> {
    let fx = fixture()?;
    assert!(!fx.manager.stop_tenant(TenantId::new()).await);
    Ok(())
}

#[tokio::test]
async fn stopped_tenant_can_be_started_again() -> anyhow::Result<()> {
    let fx = fixture()?;
    let tenant = TenantId::new();
    fx.data_store.seed(common::record(tenant, "again")).await;

    assert!(fx.manager.start_tenant(tenant, Duration::from_secs(60)).await);
    wait_for_first_pass(&fx.manager, tenant).await;
    assert!(fx.manager.stop_tenant(tenant).await);

    assert!(fx.manager.start_tenant(tenant, Duration::from_secs(60)).await);
    wait_for_first_pass(&fx.manager, tenant).await;
    assert!(fx.manager.stop_tenant(tenant).await);
    Ok(())
}

#[tokio::test]
async fn information_lookup_is_none_for_unknown_tenant() -> anyhow::Result<()> {
    let fx = fixture()?;
    assert!(fx.manager.backup_information(TenantId::new()).await.is_none());
    Ok(())
}

#[tokio::test]
async fn tenants_run_independently() -> anyhow::Result<()> {
    let fx = fixture()?;
    let first = TenantId::new();
    let second = TenantId::new();
    fx.data_store.seed(common::record(first, "first")).await;
    fx.data_store.seed(common::record(second, "second")).await;

    assert!(fx.manager.start_tenant(first, Duration::from_secs(60)).await);
    assert!(fx.manager.start_tenant(second, Duration::from_secs(60)).await);
    wait_for_first_pass(&fx.manager, first).await;
    wait_for_first_pass(&fx.manager, second).await;

    assert_eq!(fx.destination.list(first).await?.len(), 1);
    assert_eq!(fx.destination.list(second).await?.len(), 1);

    assert!(fx.manager.stop_tenant(first).await);
    assert!(fx.manager.stop_tenant(second).await);
    Ok(())
}

//! ZFS-backed persistent disks

use crate::error::{Error, Result};
use crate::exec::{CommandRunner, IdSource};
use crate::types::{DiskId, VmId};
use std::fs;
use std::path::{Path, PathBuf};

/// Reservation applied to every new disk dataset.
///
/// Disks are fixed-size; the requested size is not honored yet.
pub const DISK_RESERVATION: &str = "1024";

/// Quota applied to every new disk dataset
pub const DISK_QUOTA: &str = "1024";

/// Persistent disks as datasets under one base dataset
pub struct DatasetManager<'a> {
    runner: &'a dyn CommandRunner,
    ids: &'a dyn IdSource,
    base: String,
    zones_root: PathBuf,
}

impl<'a> DatasetManager<'a> {
    /// Wrap an existing base dataset; see [`DatasetManager::create_dataset`]
    pub fn new(
        runner: &'a dyn CommandRunner,
        ids: &'a dyn IdSource,
        base: impl Into<String>,
        zones_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            ids,
            base: base.into(),
            zones_root: zones_root.into(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Create `path` unless `zfs list` already finds it
    pub fn create_dataset(runner: &dyn CommandRunner, path: &str) -> Result<()> {
        if runner.succeeds("zfs", &["list", path])? {
            tracing::debug!(dataset = %path, "dataset already present");
            return Ok(());
        }
        tracing::info!(dataset = %path, "creating dataset");
        runner.sh("zfs", &["create", path])?;
        Ok(())
    }

    /// Full dataset name for a disk
    pub fn dataset(&self, disk_id: &DiskId) -> String {
        format!("{}/{}", self.base, disk_id)
    }

    /// Where a zone sees its persistent disk
    pub fn mount_path(&self, zone_id: &VmId) -> PathBuf {
        self.zones_root
            .join(zone_id.as_str())
            .join("root/var/vcap/store")
    }

    pub fn create(&self, size: u64) -> Result<DiskId> {
        let disk_id = DiskId::new(self.ids.mint()).map_err(Error::InvalidArgument)?;
        let dataset = self.dataset(&disk_id);
        tracing::info!(%dataset, requested_mb = size, quota = DISK_QUOTA, "creating disk");

        self.runner.sh(
            "zfs",
            &[
                "create",
                "-o",
                &format!("reservation={}", DISK_RESERVATION),
                "-o",
                &format!("quota={}", DISK_QUOTA),
                &dataset,
            ],
        )?;
        Ok(disk_id)
    }

    pub fn destroy(&self, disk_id: &DiskId) -> Result<()> {
        self.runner.sh("zfs", &["destroy", &self.dataset(disk_id)])?;
        Ok(())
    }

    /// Point the disk's mountpoint into the zone and mount it
    pub fn mount(&self, zone_id: &VmId, disk_id: &DiskId) -> Result<()> {
        let path = self.mount_path(zone_id);
        ensure_dir(&path)?;

        let dataset = self.dataset(disk_id);
        self.runner.sh(
            "zfs",
            &[
                "set",
                "-o",
                &format!("mountpoint={}", path.display()),
                &dataset,
            ],
        )?;
        self.runner.sh("zfs", &["mount", &dataset])?;
        Ok(())
    }

    /// Unmount the disk. The mountpoint property is left as `mount` set it.
    pub fn unmount(&self, _zone_id: &VmId, disk_id: &DiskId) -> Result<()> {
        self.runner.sh("zfs", &["unmount", &self.dataset(disk_id)])?;
        Ok(())
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRunner, FixedId, SequentialIds};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    const BASE: &str = "zones/persistent";

    fn zone() -> VmId {
        VmId::new("1234").unwrap()
    }

    fn disk() -> DiskId {
        DiskId::new("5678").unwrap()
    }

    #[test]
    fn create_uses_fixed_reservation_and_quota() {
        let runner = FakeRunner::new();
        let ids = FixedId("1234");
        let zfs = DatasetManager::new(&runner, &ids, BASE, "/zones");

        let id = zfs.create(2048).unwrap();

        assert_eq!(id.as_str(), "1234");
        assert_eq!(
            runner.commands(),
            vec!["zfs create -o reservation=1024 -o quota=1024 zones/persistent/1234"]
        );
    }

    #[test]
    fn create_mints_unique_ids() {
        let runner = FakeRunner::new();
        let ids = SequentialIds::default();
        let zfs = DatasetManager::new(&runner, &ids, BASE, "/zones");

        let minted: HashSet<DiskId> = (0..5).map(|_| zfs.create(1024).unwrap()).collect();
        assert_eq!(minted.len(), 5);
    }

    #[test]
    fn destroy_targets_base_and_id() {
        let runner = FakeRunner::new();
        let ids = SequentialIds::default();
        let zfs = DatasetManager::new(&runner, &ids, BASE, "/zones");

        let id = zfs.create(1024).unwrap();
        zfs.destroy(&id).unwrap();

        assert_eq!(
            runner.commands().last().unwrap(),
            &format!("zfs destroy zones/persistent/{}", id)
        );
    }

    #[test]
    fn destroy_surfaces_busy_dataset() {
        let runner = FakeRunner::new();
        runner.respond(
            "zfs destroy zones/persistent/5678",
            FakeRunner::failure("cannot destroy: dataset is busy"),
        );
        let ids = SequentialIds::default();
        let zfs = DatasetManager::new(&runner, &ids, BASE, "/zones");

        assert!(matches!(
            zfs.destroy(&disk()),
            Err(Error::CommandFailed { .. })
        ));
    }

    #[test]
    fn mount_creates_directory_before_setting_mountpoint() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new();
        let ids = SequentialIds::default();
        let zfs = DatasetManager::new(&runner, &ids, BASE, root.path());
        let path = zfs.mount_path(&zone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let probe = path.clone();
        let record = seen.clone();
        runner.on_run(move |_| record.lock().unwrap().push(probe.is_dir()));

        assert!(!path.exists());
        zfs.mount(&zone(), &disk()).unwrap();

        assert!(path.is_dir());
        assert_eq!(*seen.lock().unwrap(), vec![true, true]);
        assert_eq!(
            runner.commands(),
            vec![
                format!("zfs set -o mountpoint={} zones/persistent/5678", path.display()),
                "zfs mount zones/persistent/5678".to_string(),
            ]
        );
    }

    #[test]
    fn mount_reuses_existing_directory() {
        let root = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new();
        let ids = SequentialIds::default();
        let zfs = DatasetManager::new(&runner, &ids, BASE, root.path());
        let path = zfs.mount_path(&zone());
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("keep"), b"data").unwrap();

        zfs.mount(&zone(), &disk()).unwrap();

        assert!(path.join("keep").exists());
        assert_eq!(runner.commands().len(), 2);
    }

    #[test]
    fn mount_path_follows_zone_layout() {
        let runner = FakeRunner::new();
        let ids = SequentialIds::default();
        let zfs = DatasetManager::new(&runner, &ids, BASE, "/zones");

        assert_eq!(
            zfs.mount_path(&zone()),
            PathBuf::from("/zones/1234/root/var/vcap/store")
        );
    }

    // Known asymmetry: unmount leaves the mountpoint property in place.
    #[test]
    fn unmount_only_unmounts() {
        let runner = FakeRunner::new();
        let ids = SequentialIds::default();
        let zfs = DatasetManager::new(&runner, &ids, BASE, "/zones");

        zfs.unmount(&zone(), &disk()).unwrap();

        assert_eq!(runner.commands(), vec!["zfs unmount zones/persistent/5678"]);
    }

    #[test]
    fn create_dataset_when_absent() {
        let runner = FakeRunner::new();
        runner.respond("zfs list zones/persistent", FakeRunner::failure("does not exist"));

        DatasetManager::create_dataset(&runner, "zones/persistent").unwrap();

        assert_eq!(
            runner.commands(),
            vec!["zfs list zones/persistent", "zfs create zones/persistent"]
        );
    }

    #[test]
    fn create_dataset_is_idempotent() {
        let runner = FakeRunner::new();

        DatasetManager::create_dataset(&runner, "zones/persistent").unwrap();
        DatasetManager::create_dataset(&runner, "zones/persistent").unwrap();

        assert!(!runner
            .commands()
            .iter()
            .any(|c| c == "zfs create zones/persistent"));
    }
}

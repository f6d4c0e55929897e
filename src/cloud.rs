//! Cloud provider interface and its SmartOS implementation
//!
//! Stemcells are zone images managed with `imgadm`, VMs are zones managed with
//! `vmadm`, and persistent disks are ZFS datasets. The host is the only source
//! of truth; nothing here caches state between calls.

use crate::config::CloudOptions;
use crate::error::{Error, Result};
use crate::exec::{CommandRunner, HostRunner, IdSource, RandomIds};
use crate::host::{DatasetManager, Zone};
use crate::types::{
    DiskId, Metadata, Network, Networks, Nic, RebootMode, StemcellId, VmConfig, VmId,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Operations a director may request from a provider.
///
/// Capabilities a provider lacks keep the default body, which fails with
/// [`Error::NotImplemented`] so callers can tell "unsupported" from "failed".
pub trait Cloud {
    // === Stemcells ===

    /// Import an image; `properties` must carry its `uuid`
    fn create_stemcell(&self, image_path: &Path, properties: &Value) -> Result<StemcellId>;

    /// Destroy an imported image (must not be in use)
    fn delete_stemcell(&self, stemcell_id: &StemcellId) -> Result<()>;

    // === VMs ===

    /// Create and boot a VM from a stemcell
    fn create_vm(
        &self,
        agent_id: &str,
        stemcell_id: &StemcellId,
        resource_pool: &Value,
        networks: &Networks,
        disk_locality: &[DiskId],
        env: Option<&Value>,
    ) -> Result<VmId>;

    fn delete_vm(&self, vm_id: &VmId) -> Result<()>;

    /// Check whether the VM still exists on the host
    fn has_vm(&self, vm_id: &VmId) -> Result<bool>;

    fn reboot_vm(&self, vm_id: &VmId, mode: RebootMode) -> Result<()>;

    /// Attach key/value metadata, one pair at a time, without rollback
    fn set_vm_metadata(&self, vm_id: &VmId, metadata: &Metadata) -> Result<()>;

    fn configure_networks(&self, _vm_id: &VmId, _networks: &Networks) -> Result<()> {
        Err(Error::not_implemented("configure_networks"))
    }

    // === Disks ===

    fn create_disk(&self, _size: u64, _vm_locality: Option<&VmId>) -> Result<DiskId> {
        Err(Error::not_implemented("create_disk"))
    }

    fn delete_disk(&self, _disk_id: &DiskId) -> Result<()> {
        Err(Error::not_implemented("delete_disk"))
    }

    fn attach_disk(&self, _vm_id: &VmId, _disk_id: &DiskId) -> Result<()> {
        Err(Error::not_implemented("attach_disk"))
    }

    fn detach_disk(&self, _vm_id: &VmId, _disk_id: &DiskId) -> Result<()> {
        Err(Error::not_implemented("detach_disk"))
    }

    // === Deployments ===

    fn validate_deployment(&self, _old_manifest: &Value, _new_manifest: &Value) -> Result<()> {
        Err(Error::not_implemented("validate_deployment"))
    }
}

/// SmartOS provider
pub struct SmartOsCloud {
    runner: Arc<dyn CommandRunner>,
    ids: Arc<dyn IdSource>,
    options: CloudOptions,
}

impl SmartOsCloud {
    /// Create a provider that runs the real host tools
    pub fn from_host(options: CloudOptions) -> Result<Self> {
        Self::new(Arc::new(HostRunner::new()?), Arc::new(RandomIds), options)
    }

    /// Create a provider over the given runner and id source.
    ///
    /// With a persistent disk base configured, its dataset is created if missing.
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        ids: Arc<dyn IdSource>,
        options: CloudOptions,
    ) -> Result<Self> {
        if let Some(base) = &options.persistent_disk_base {
            DatasetManager::create_dataset(runner.as_ref(), base)?;
        }
        Ok(Self {
            runner,
            ids,
            options,
        })
    }

    pub fn options(&self) -> &CloudOptions {
        &self.options
    }

    /// The vmadm payload for one VM on one network
    pub fn vm_config(&self, stemcell_id: &StemcellId, network: &Network) -> VmConfig {
        VmConfig {
            brand: self.options.brand.clone(),
            dataset_uuid: stemcell_id.clone(),
            nics: vec![Nic {
                nic_tag: self.options.nic_tag.clone(),
                ip: network.ip.clone(),
                netmask: network.netmask.clone(),
                gateway: network.gateway.clone(),
            }],
        }
    }

    fn zone(&self, vm_id: &VmId) -> Zone<'_> {
        Zone::new(self.runner.as_ref(), vm_id.clone())
    }

    fn disks(&self, operation: &'static str) -> Result<DatasetManager<'_>> {
        let base = self
            .options
            .persistent_disk_base
            .as_deref()
            .ok_or(Error::not_implemented(operation))?;
        Ok(DatasetManager::new(
            self.runner.as_ref(),
            self.ids.as_ref(),
            base,
            self.options.zones_root.clone(),
        ))
    }

    /// Write `config` to a fresh temp file, removed when the handle drops
    fn config_file(&self, config: &VmConfig) -> Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("vmcfg").suffix(".json");
        let mut file = match &self.options.tmp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        serde_json::to_writer(&mut file, config)?;
        file.flush()?;
        Ok(file)
    }
}

lazy_static! {
    static ref CREATED: Regex =
        Regex::new(r"(?m)^Successfully created (.+)$").expect("vmadm create pattern");
}

/// Pull the new zone uuid out of `vmadm create` output
fn parse_created(output: &str) -> Result<VmId> {
    CREATED
        .captures(output)
        .and_then(|caps| VmId::new(caps[1].trim()).ok())
        .ok_or_else(|| Error::UnexpectedOutput {
            command: "vmadm create".to_string(),
            output: output.to_string(),
        })
}

impl Cloud for SmartOsCloud {
    fn create_stemcell(&self, image_path: &Path, properties: &Value) -> Result<StemcellId> {
        let uuid = properties
            .get("uuid")
            .and_then(Value::as_str)
            .ok_or(Error::MissingProperty("uuid"))?;
        let stemcell_id = StemcellId::new(uuid).map_err(Error::InvalidArgument)?;

        tracing::info!(stemcell = %stemcell_id, image = %image_path.display(), "importing stemcell");
        self.runner.sh("imgadm", &["import", stemcell_id.as_str()])?;
        Ok(stemcell_id)
    }

    fn delete_stemcell(&self, stemcell_id: &StemcellId) -> Result<()> {
        tracing::info!(stemcell = %stemcell_id, "destroying stemcell");
        self.runner.sh("imgadm", &["destroy", stemcell_id.as_str()])?;
        Ok(())
    }

    fn create_vm(
        &self,
        agent_id: &str,
        stemcell_id: &StemcellId,
        _resource_pool: &Value,
        networks: &Networks,
        _disk_locality: &[DiskId],
        _env: Option<&Value>,
    ) -> Result<VmId> {
        // Only the first network is wired up.
        let (network_name, network) = networks.first().ok_or_else(|| {
            Error::InvalidArgument("create_vm needs at least one network".to_string())
        })?;
        if networks.len() > 1 {
            tracing::warn!(count = networks.len(), "ignoring all networks but the first");
        }

        let config = self.vm_config(stemcell_id, network);
        let file = self.config_file(&config)?;
        let path = file.path().to_string_lossy().into_owned();

        let output = self.runner.sh("vmadm", &["create", "-f", &path])?;
        let vm_id = parse_created(&output)?;

        tracing::info!(vm = %vm_id, agent = %agent_id, stemcell = %stemcell_id, network = %network_name, "created vm");
        Ok(vm_id)
    }

    fn delete_vm(&self, vm_id: &VmId) -> Result<()> {
        tracing::info!(vm = %vm_id, "deleting vm");
        self.runner.sh("vmadm", &["delete", vm_id.as_str()])?;
        Ok(())
    }

    fn has_vm(&self, vm_id: &VmId) -> Result<bool> {
        self.zone(vm_id).is_valid()
    }

    fn reboot_vm(&self, vm_id: &VmId, mode: RebootMode) -> Result<()> {
        if mode == RebootMode::Hard {
            return Err(Error::not_implemented("reboot_vm (hard)"));
        }
        tracing::info!(vm = %vm_id, "rebooting vm");
        self.runner.sh("vmadm", &["reboot", vm_id.as_str()])?;
        Ok(())
    }

    fn set_vm_metadata(&self, vm_id: &VmId, metadata: &Metadata) -> Result<()> {
        for (name, value) in metadata {
            self.zone(vm_id).set_attr(name, value)?;
        }
        Ok(())
    }

    fn create_disk(&self, size: u64, vm_locality: Option<&VmId>) -> Result<DiskId> {
        // Single host, so locality has nothing to choose between.
        if let Some(vm_id) = vm_locality {
            tracing::debug!(vm = %vm_id, "ignoring disk locality");
        }
        self.disks("create_disk")?.create(size)
    }

    fn delete_disk(&self, disk_id: &DiskId) -> Result<()> {
        self.disks("delete_disk")?.destroy(disk_id)
    }

    fn attach_disk(&self, vm_id: &VmId, disk_id: &DiskId) -> Result<()> {
        let disks = self.disks("attach_disk")?;
        if !self.zone(vm_id).is_valid()? {
            return Err(Error::VmNotFound(vm_id.clone()));
        }
        tracing::info!(vm = %vm_id, disk = %disk_id, "attaching disk");
        disks.mount(vm_id, disk_id)
    }

    fn detach_disk(&self, vm_id: &VmId, disk_id: &DiskId) -> Result<()> {
        tracing::info!(vm = %vm_id, disk = %disk_id, "detaching disk");
        self.disks("detach_disk")?.unmount(vm_id, disk_id)
    }
}

//! Provider configuration

use crate::error::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Options for [`SmartOsCloud`](crate::cloud::SmartOsCloud)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CloudOptions {
    /// Root of zone filesystems (e.g., /zones)
    pub zones_root: PathBuf,
    /// Base dataset for persistent disks (e.g., zones/persistent).
    /// Disk operations are unsupported while unset.
    pub persistent_disk_base: Option<String>,
    /// Directory for transient vmadm payloads; system temp dir if unset
    pub tmp_dir: Option<PathBuf>,
    /// Zone brand written into every VM config
    pub brand: String,
    /// Nic tag for the VM's interface
    pub nic_tag: String,
}

impl Default for CloudOptions {
    fn default() -> Self {
        Self {
            zones_root: PathBuf::from("/zones"),
            persistent_disk_base: None,
            tmp_dir: None,
            brand: "joyent".to_string(),
            nic_tag: "admin".to_string(),
        }
    }
}

impl CloudOptions {
    /// Load options from a JSON file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

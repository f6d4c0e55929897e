//! smartos-cpi: Cloud provider interface for SmartOS
//!
//! Maps provider operations onto SmartOS primitives: stemcells are zone
//! images (`imgadm`), VMs are zones (`vmadm`, `zonecfg`, `zoneadm`), and
//! persistent disks are ZFS datasets (`zfs`). All host interaction goes
//! through an injected [`CommandRunner`].

pub mod cloud;
pub mod config;
pub mod error;
pub mod exec;
pub mod host;
pub mod rpc;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use cloud::{Cloud, SmartOsCloud};
pub use config::CloudOptions;
pub use error::{Error, Result};
pub use exec::{CommandOutput, CommandRunner, HostRunner, IdSource, RandomIds};
pub use host::{DatasetManager, Zone};
pub use types::{DiskId, Metadata, Network, Networks, RebootMode, StemcellId, VmConfig, VmId};

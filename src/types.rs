//! Core types for the SmartOS provider

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reject identifiers the host tools would misread as paths or extra arguments
fn validate_id(kind: &str, id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} cannot be empty", kind));
    }
    if id.contains('/') || id.contains('@') || id.chars().any(char::is_whitespace) {
        return Err(format!(
            "{} '{}' cannot contain '/', '@' or whitespace",
            kind, id
        ));
    }
    Ok(())
}

macro_rules! host_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Result<Self, String> {
                let id = id.into();
                validate_id($kind, &id)?;
                Ok($name(id))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                $name::new(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

host_id!(
    /// Image uuid, identical to the uuid the image was imported under
    StemcellId,
    "Stemcell id"
);

host_id!(
    /// Zone uuid reported by vmadm when the zone was created
    VmId,
    "VM id"
);

host_id!(
    /// Dataset name under the persistent disk base
    DiskId,
    "Disk id"
);

/// Settings for one network a VM joins
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub ip: String,
    pub netmask: String,
    pub gateway: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub cloud_properties: serde_json::Value,
}

/// Networks keyed by name, in the order the director sent them
pub type Networks = IndexMap<String, Network>;

/// Metadata pairs applied to a VM, in request order
pub type Metadata = IndexMap<String, String>;

/// One entry of the `nics` array vmadm consumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nic {
    pub nic_tag: String,
    pub ip: String,
    pub netmask: String,
    pub gateway: String,
}

/// Document handed to `vmadm create -f`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmConfig {
    pub brand: String,
    pub dataset_uuid: StemcellId,
    pub nics: Vec<Nic>,
}

/// How a VM should be rebooted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebootMode {
    #[default]
    Soft,
    Hard,
}

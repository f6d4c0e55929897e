//! JSON request/response envelope for driving a [`Cloud`] from a director

use crate::cloud::Cloud;
use crate::error::Error;
use crate::types::{DiskId, Metadata, Networks, RebootMode, StemcellId, VmId};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// One provider call
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub method: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
    #[serde(default)]
    pub context: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub ok_to_retry: bool,
}

/// Outcome of one provider call; exactly one of `result`/`error` is meaningful
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub result: Value,
    pub error: Option<ResponseError>,
    pub log: String,
}

impl Response {
    fn ok(result: Value) -> Self {
        Self {
            result,
            error: None,
            log: String::new(),
        }
    }

    fn failed(kind: &str, message: String) -> Self {
        Self {
            result: Value::Null,
            error: Some(ResponseError {
                kind: kind.to_string(),
                message,
                ok_to_retry: false,
            }),
            log: String::new(),
        }
    }
}

enum Failure {
    InvalidCall(String),
    Cloud(Error),
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Failure::Cloud(err)
    }
}

struct Arguments<'r> {
    method: &'r str,
    values: &'r [Value],
}

impl Arguments<'_> {
    fn get<T: DeserializeOwned>(&self, index: usize, name: &str) -> Result<T, Failure> {
        let value = self.values.get(index).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| {
            Failure::InvalidCall(format!(
                "{}: invalid argument {} ({}): {}",
                self.method, index, name, e
            ))
        })
    }
}

/// Metadata values may arrive as any JSON scalar; zone attrs are strings
fn stringify_metadata(raw: IndexMap<String, Value>) -> Metadata {
    raw.into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => (key, s),
            other => (key, other.to_string()),
        })
        .collect()
}

fn call(cloud: &dyn Cloud, request: &Request) -> Result<Value, Failure> {
    let args = Arguments {
        method: &request.method,
        values: &request.arguments,
    };

    let result = match request.method.as_str() {
        "create_stemcell" => {
            let image_path: PathBuf = args.get(0, "image_path")?;
            let properties: Value = args.get(1, "cloud_properties")?;
            Value::from(String::from(cloud.create_stemcell(&image_path, &properties)?))
        }
        "delete_stemcell" => {
            cloud.delete_stemcell(&args.get::<StemcellId>(0, "stemcell_cid")?)?;
            Value::Null
        }
        "create_vm" => {
            let agent_id: String = args.get(0, "agent_id")?;
            let stemcell_id: StemcellId = args.get(1, "stemcell_cid")?;
            let resource_pool: Value = args.get(2, "cloud_properties")?;
            let networks: Networks = args.get(3, "networks")?;
            let disk_locality: Option<Vec<DiskId>> = args.get(4, "disk_cids")?;
            let env: Option<Value> = args.get(5, "env")?;
            let vm_id = cloud.create_vm(
                &agent_id,
                &stemcell_id,
                &resource_pool,
                &networks,
                disk_locality.as_deref().unwrap_or(&[]),
                env.as_ref(),
            )?;
            Value::from(String::from(vm_id))
        }
        "delete_vm" => {
            cloud.delete_vm(&args.get::<VmId>(0, "vm_cid")?)?;
            Value::Null
        }
        "has_vm" => Value::from(cloud.has_vm(&args.get::<VmId>(0, "vm_cid")?)?),
        "reboot_vm" => {
            let vm_id: VmId = args.get(0, "vm_cid")?;
            let mode: Option<RebootMode> = args.get(1, "mode")?;
            cloud.reboot_vm(&vm_id, mode.unwrap_or_default())?;
            Value::Null
        }
        "set_vm_metadata" => {
            let vm_id: VmId = args.get(0, "vm_cid")?;
            let metadata = stringify_metadata(args.get(1, "metadata")?);
            cloud.set_vm_metadata(&vm_id, &metadata)?;
            Value::Null
        }
        "configure_networks" => {
            let vm_id: VmId = args.get(0, "vm_cid")?;
            let networks: Networks = args.get(1, "networks")?;
            cloud.configure_networks(&vm_id, &networks)?;
            Value::Null
        }
        "create_disk" => {
            let size: u64 = args.get(0, "size")?;
            let vm_locality: Option<VmId> = args.get(2, "vm_locality")?;
            Value::from(String::from(cloud.create_disk(size, vm_locality.as_ref())?))
        }
        "delete_disk" => {
            cloud.delete_disk(&args.get::<DiskId>(0, "disk_cid")?)?;
            Value::Null
        }
        "attach_disk" => {
            let vm_id: VmId = args.get(0, "vm_cid")?;
            let disk_id: DiskId = args.get(1, "disk_cid")?;
            cloud.attach_disk(&vm_id, &disk_id)?;
            Value::Null
        }
        "detach_disk" => {
            let vm_id: VmId = args.get(0, "vm_cid")?;
            let disk_id: DiskId = args.get(1, "disk_cid")?;
            cloud.detach_disk(&vm_id, &disk_id)?;
            Value::Null
        }
        "validate_deployment" => {
            let old_manifest: Value = args.get(0, "old_manifest")?;
            let new_manifest: Value = args.get(1, "new_manifest")?;
            cloud.validate_deployment(&old_manifest, &new_manifest)?;
            Value::Null
        }
        other => return Err(Failure::InvalidCall(format!("unknown method '{}'", other))),
    };
    Ok(result)
}

/// Run one request against `cloud`; failures become error responses, never panics
pub fn dispatch(cloud: &dyn Cloud, request: &Request) -> Response {
    tracing::debug!(method = %request.method, "dispatching request");
    match call(cloud, request) {
        Ok(result) => Response::ok(result),
        Err(Failure::InvalidCall(message)) => Response::failed("InvalidCall", message),
        Err(Failure::Cloud(err)) => {
            let kind = match &err {
                Error::NotImplemented { .. } => "Bosh::Clouds::NotImplemented",
                Error::VmNotFound(_) => "Bosh::Clouds::VMNotFound",
                _ => "Bosh::Clouds::CloudError",
            };
            tracing::error!(method = %request.method, error = %err, "request failed");
            Response::failed(kind, err.to_string())
        }
    }
}

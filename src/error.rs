//! Error types for smartos-cpi

use crate::types::VmId;
use thiserror::Error;

/// Result type alias for smartos-cpi operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during provider operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Command failed: {command} (exit status {status})\nstderr: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Unexpected output from {command}: {output}")]
    UnexpectedOutput { command: String, output: String },

    /// The provider does not offer this capability
    #[error("`{operation}' is not implemented by SmartOsCloud")]
    NotImplemented { operation: &'static str },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Missing required property '{0}'")]
    MissingProperty(&'static str),

    #[error("VM '{0}' does not exist")]
    VmNotFound(VmId),

    #[error("Permission denied: must run as root")]
    PermissionDenied,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn not_implemented(operation: &'static str) -> Self {
        Error::NotImplemented { operation }
    }

    /// True when the error signals an absent capability rather than a failure
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Error::NotImplemented { .. })
    }
}

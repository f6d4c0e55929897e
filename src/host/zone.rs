//! Zone handle: attribute metadata and liveness via zonecfg/zoneadm

use crate::error::{Error, Result};
use crate::exec::{command_line, CommandRunner};
use crate::types::VmId;
use lazy_static::lazy_static;
use regex::Regex;

/// zonecfg's answer when an attr resource is missing
const NO_SUCH_ATTR: &str = "No such attr resource.";

lazy_static! {
    static ref ATTR_VALUE: Regex =
        Regex::new(r"(?m)value: (\S+)$").expect("attr value pattern");
}

/// Characters that would split or terminate the zonecfg transaction
fn validate_attr_token(what: &str, token: &str) -> Result<()> {
    if token.contains([';', '\n', '\'']) {
        return Err(Error::InvalidArgument(format!(
            "zone attr {} '{}' cannot contain ';', quotes or newlines",
            what, token
        )));
    }
    Ok(())
}

/// One zone on the host, addressed by uuid.
///
/// Holds no state beyond its uuid; every call goes to the host.
pub struct Zone<'a> {
    runner: &'a dyn CommandRunner,
    uuid: VmId,
}

impl<'a> Zone<'a> {
    pub fn new(runner: &'a dyn CommandRunner, uuid: VmId) -> Self {
        Self { runner, uuid }
    }

    pub fn uuid(&self) -> &VmId {
        &self.uuid
    }

    /// Read a string attr, `None` if the zone has no attr of that name
    pub fn get_attr(&self, name: &str) -> Result<Option<String>> {
        validate_attr_token("name", name)?;
        let query = format!("info attr name={}", name);
        let args = ["-z", self.uuid.as_str(), query.as_str()];
        let output = self.runner.run("zonecfg", &args)?;

        if output.stdout.contains(NO_SUCH_ATTR) || output.stderr.contains(NO_SUCH_ATTR) {
            return Ok(None);
        }
        if !output.success() {
            return Err(Error::CommandFailed {
                command: command_line("zonecfg", &args),
                status: output.status,
                stderr: output.stderr,
            });
        }

        Ok(ATTR_VALUE
            .captures(&output.stdout)
            .map(|caps| caps[1].to_string()))
    }

    /// Add a string attr in one committed transaction, without checking for an existing one
    pub fn set_attr(&self, name: &str, value: &str) -> Result<()> {
        validate_attr_token("name", name)?;
        validate_attr_token("value", value)?;
        let transaction = format!(
            "add attr; set type=string; set name={}; set value={}; end; commit",
            name, value
        );
        self.runner
            .sh("zonecfg", &["-z", self.uuid.as_str(), &transaction])?;
        Ok(())
    }

    pub fn has_attr(&self, name: &str) -> Result<bool> {
        Ok(self.get_attr(name)?.is_some())
    }

    /// True if the uuid is among the zones the host currently lists
    pub fn is_valid(&self) -> Result<bool> {
        let zones = Zone::zones(self.runner)?;
        Ok(zones.iter().any(|zone| zone == self.uuid.as_str()))
    }

    /// Every zone name `zoneadm list` reports, including `global`
    pub fn zones(runner: &dyn CommandRunner) -> Result<Vec<String>> {
        let output = runner.sh("zoneadm", &["list"])?;
        Ok(output.lines().map(str::to_string).collect())
    }
}

//! `HostControl` backed by the node's own CLIs: `hosted-engine`, `ceph`, `poweroff`.
//!
//! Fire-and-forget calls (maintenance mode, engine shutdown, storage flags)
//! only fail when the binary cannot be started; a non-zero exit is logged
//! and the sequence carries on. The status query must succeed and parse.

use std::process::Output;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use super::{EngineHostState, HostControl, ManagementPlaneStatus};
use crate::error::{PowerError, PowerResult};

/// Binaries used for each action. Overridable for tests and odd installs.
#[derive(Debug, Clone)]
pub struct CommandHost {
    pub hosted_engine: String,
    pub ceph: String,
    pub poweroff: String,
}

impl Default for CommandHost {
    fn default() -> Self {
        Self {
            hosted_engine: "hosted-engine".to_string(),
            ceph: "ceph".to_string(),
            poweroff: "poweroff".to_string(),
        }
    }
}

fn describe(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run to completion. Only a failure to start is an error.
async fn run(program: &str, args: &[&str]) -> PowerResult<(String, Output)> {
    let command = describe(program, args);
    trace!("Executing: {}", command);

    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| PowerError::Command {
            command: command.clone(),
            reason: e.to_string(),
        })?;
    Ok((command, output))
}

/// Run to completion and return stdout. Non-zero exit is an error.
async fn run_checked(program: &str, args: &[&str]) -> PowerResult<String> {
    let (command, output) = run(program, args).await?;
    if !output.status.success() {
        return Err(PowerError::Command {
            command,
            reason: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Run to completion; a non-zero exit is logged and tolerated.
async fn run_fire_and_forget(program: &str, args: &[&str]) -> PowerResult<()> {
    let (command, output) = run(program, args).await?;
    if !output.status.success() {
        warn!(
            "`{}` exited unsuccessfully ({}): {}",
            command,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// Parse `hosted-engine --vm-status --json`.
///
/// The top-level object holds one entry per host plus bookkeeping keys such
/// as `global_maintenance`. Host entries carry `engine-status`, which some
/// releases emit as an object and others as a JSON-encoded string, and
/// `live-data`, which is false once the host's entry has gone stale.
pub fn parse_vm_status(json: &str) -> PowerResult<ManagementPlaneStatus> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| vm_status_error(format!("unparseable output: {}", e)))?;
    let Some(entries) = root.as_object() else {
        return Err(vm_status_error("expected a JSON object".to_string()));
    };

    let mut hosts = Vec::new();
    for (key, entry) in entries {
        let Some(engine_status) = entry.get("engine-status") else {
            continue;
        };
        let engine_status = match engine_status {
            Value::String(s) => serde_json::from_str(s).map_err(|e| {
                vm_status_error(format!("unparseable engine-status for {}: {}", key, e))
            })?,
            other => other.clone(),
        };
        let vm = engine_status
            .get("vm")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let host = entry
            .get("hostname")
            .and_then(Value::as_str)
            .unwrap_or(key.as_str())
            .to_string();
        // Older releases omit the flag; treat those hosts as reachable.
        let live = entry
            .get("live-data")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        hosts.push(EngineHostState { host, vm, live });
    }

    Ok(ManagementPlaneStatus { hosts })
}

fn vm_status_error(reason: String) -> PowerError {
    PowerError::Command {
        command: "hosted-engine --vm-status --json".to_string(),
        reason,
    }
}

#[async_trait]
impl HostControl for CommandHost {
    async fn set_global_maintenance(&self) -> PowerResult<()> {
        run_fire_and_forget(&self.hosted_engine, &["--set-maintenance", "--mode=global"]).await
    }

    async fn shutdown_management_plane(&self) -> PowerResult<()> {
        run_fire_and_forget(&self.hosted_engine, &["--vm-shutdown"]).await
    }

    async fn management_plane_status(&self) -> PowerResult<ManagementPlaneStatus> {
        let stdout = run_checked(&self.hosted_engine, &["--vm-status", "--json"]).await?;
        let status = parse_vm_status(&stdout)?;
        debug!(
            "Hosted engine down on {}/{} reachable hosts ({} listed)",
            status.count_down(),
            status.count_live(),
            status.hosts.len()
        );
        Ok(status)
    }

    async fn set_storage_flag(&self, flag: &str) -> PowerResult<()> {
        run_fire_and_forget(&self.ceph, &["osd", "set", flag]).await
    }

    async fn power_off(&self) -> PowerResult<()> {
        let command = describe(&self.poweroff, &[]);
        trace!("Executing: {}", command);
        Command::new(&self.poweroff)
            .spawn()
            .map_err(|e| PowerError::Command {
                command,
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

//! SNMPv3 UPS source for Eaton cards (XUPS MIB), via net-snmp's `snmpget`.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace};

use super::UpsStatusSource;
use crate::config::SnmpConfig;
use crate::constants::*;
use crate::error::{PowerError, PowerResult};
use crate::models::UpsAppliance;

/// Queries UPS units with `snmpget -v3 -l noAuthNoPriv`.
pub struct SnmpUpsSource {
    config: SnmpConfig,
}

impl SnmpUpsSource {
    pub fn new(config: SnmpConfig) -> Self {
        Self { config }
    }

    /// Agent address in net-snmp transport syntax.
    fn target(&self, appliance: &UpsAppliance) -> String {
        if appliance.address.contains(':') {
            format!("udp6:[{}]:{}", appliance.address, self.config.port)
        } else {
            format!("udp:{}:{}", appliance.address, self.config.port)
        }
    }

    fn build_command(&self, appliance: &UpsAppliance, oid: &str) -> Command {
        let mut cmd = Command::new(&self.config.snmpget);
        cmd.args(["-v3", "-l", "noAuthNoPriv", "-u", &self.config.user, "-Oqv", "-r", "0"])
            .arg("-t")
            .arg(self.config.timeout_secs.to_string())
            .arg(self.target(appliance))
            .arg(oid)
            .kill_on_drop(true);
        cmd
    }

    /// Fetch the raw value of a single OID.
    async fn get_oid_value(&self, appliance: &UpsAppliance, oid: &str) -> PowerResult<String> {
        let mut cmd = self.build_command(appliance, oid);
        trace!("Executing: {:?}", cmd.as_std());

        let output = cmd.output().await.map_err(|e| PowerError::UpsQuery {
            appliance: appliance.address.clone(),
            reason: format!("failed to execute {}: {}", self.config.snmpget, e),
        })?;

        if !output.status.success() {
            return Err(PowerError::UpsQuery {
                appliance: appliance.address.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("{} {} = {}", appliance, oid, value);
        Ok(value)
    }
}

#[async_trait]
impl UpsStatusSource for SnmpUpsSource {
    async fn is_on_mains(&self, appliance: &UpsAppliance) -> PowerResult<bool> {
        let raw = self.get_oid_value(appliance, OID_INPUT_SOURCE).await?;
        parse_input_source(appliance, &raw)
    }

    async fn battery_seconds_remaining(&self, appliance: &UpsAppliance) -> PowerResult<u64> {
        let raw = self.get_oid_value(appliance, OID_BATTERY_TIME_REMAINING).await?;
        parse_battery_seconds(appliance, &raw)
    }
}

/// Integer value from `-Oqv` output. Tolerates a leading type tag
/// ("INTEGER: 2") in case the local snmp.conf overrides output options.
fn parse_integer(raw: &str) -> Option<i64> {
    raw.split_whitespace().last()?.trim_matches('"').parse().ok()
}

/// Map xupsInputSource to "on mains". Anything but battery/mains is an error.
pub fn parse_input_source(appliance: &UpsAppliance, raw: &str) -> PowerResult<bool> {
    match parse_integer(raw) {
        Some(INPUT_SOURCE_MAINS) => Ok(true),
        Some(INPUT_SOURCE_BATTERY) => Ok(false),
        _ => Err(PowerError::UpsResponse {
            appliance: appliance.address.clone(),
            oid: OID_INPUT_SOURCE.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Parse xupsBatTimeRemaining (seconds). Negative values are rejected.
pub fn parse_battery_seconds(appliance: &UpsAppliance, raw: &str) -> PowerResult<u64> {
    parse_integer(raw)
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| PowerError::UpsResponse {
            appliance: appliance.address.clone(),
            oid: OID_BATTERY_TIME_REMAINING.to_string(),
            value: raw.to_string(),
        })
}

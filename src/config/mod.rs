use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::constants::*;
use crate::error::{PowerError, PowerResult};
use crate::models::{MatchBy, ProtectedSet, UpsAppliance};

/// Immutable runtime configuration, built once at startup and handed to
/// each component by reference.
#[derive(Debug, Clone)]
pub struct Config {
    /// UPS units protecting this node (at least one).
    pub ups: Vec<UpsAppliance>,
    /// Management API connection settings.
    pub rhvm: RhvmConfig,
    /// Workloads never shut down by this tool.
    pub protected: ProtectedSet,
    /// Polling interval while every UPS is on mains.
    pub monitor_frequency: Duration,
    /// Polling interval while some UPS are on battery.
    pub escalated_frequency: Duration,
    /// Remaining battery seconds below which shutting-down workloads are force-stopped.
    pub hard_stop_threshold_secs: u64,
    /// Delay between workload drain passes.
    pub drain_poll: Duration,
    /// Delay between hosted engine status checks.
    pub management_plane_poll: Duration,
    /// Optional Discord-compatible webhook.
    pub discord_webhook: Option<String>,
    /// SNMP query settings.
    pub snmp: SnmpConfig,
}

/// Management API (RHV Manager) connection settings.
#[derive(Clone)]
pub struct RhvmConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub ca_bundle: PathBuf,
}

// Keeps the password out of debug logs.
impl std::fmt::Debug for RhvmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhvmConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("ca_bundle", &self.ca_bundle)
            .finish()
    }
}

/// SNMPv3 query settings.
#[derive(Debug, Clone)]
pub struct SnmpConfig {
    pub user: String,
    pub port: u16,
    pub timeout_secs: u64,
    pub snmpget: String,
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            user: DEFAULT_SNMP_USER.to_string(),
            port: DEFAULT_SNMP_PORT,
            timeout_secs: DEFAULT_SNMP_TIMEOUT_SECS,
            snmpget: DEFAULT_SNMPGET_BIN.to_string(),
        }
    }
}

/// TOML-deserializable config file format.
/// Optional fields fall back to defaults; required ones are checked in `validate`.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    ups: Option<Vec<String>>,
    rhvm_url: Option<String>,
    rhvm_username: Option<String>,
    rhvm_password: Option<String>,
    ca_bundle: Option<PathBuf>,
    protected_vms: Option<Vec<String>>,
    protected_match: Option<MatchBy>,
    monitor_frequency: Option<u64>,
    escalated_frequency: Option<u64>,
    hard_stop_threshold_secs: Option<u64>,
    drain_poll_ms: Option<u64>,
    management_plane_poll_secs: Option<u64>,
    discord_webhook: Option<String>,
    snmp: Option<FileSnmpConfig>,
}

/// TOML-deserializable `[snmp]` section.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileSnmpConfig {
    user: Option<String>,
    port: Option<u16>,
    timeout_secs: Option<u64>,
    snmpget: Option<String>,
}

impl Config {
    /// Read and validate the config file at `path`.
    pub fn load(path: &Path) -> PowerResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PowerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| PowerError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse config text, merging file values over defaults.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        let file: FileConfig = toml::from_str(content).map_err(|e| e.to_string())?;

        let ups: Vec<UpsAppliance> = file
            .ups
            .unwrap_or_default()
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .map(UpsAppliance::new)
            .collect();
        if ups.is_empty() {
            return Err("`ups` must list at least one UPS address".to_string());
        }

        let rhvm = RhvmConfig {
            url: required(file.rhvm_url, "rhvm_url")?
                .trim_end_matches('/')
                .to_string(),
            username: required(file.rhvm_username, "rhvm_username")?,
            password: required(file.rhvm_password, "rhvm_password")?,
            ca_bundle: file
                .ca_bundle
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CA_BUNDLE)),
        };

        let protected_names = file
            .protected_vms
            .unwrap_or_else(|| vec![DEFAULT_PROTECTED_VM.to_string()]);
        let protected = ProtectedSet::new(file.protected_match.unwrap_or_default(), protected_names);

        let mut snmp = SnmpConfig::default();
        if let Some(s) = file.snmp {
            if let Some(v) = s.user {
                if !v.is_empty() {
                    snmp.user = v;
                }
            }
            if let Some(v) = s.port {
                snmp.port = v;
            }
            if let Some(v) = s.timeout_secs {
                snmp.timeout_secs = v.max(1);
            }
            if let Some(v) = s.snmpget {
                if !v.is_empty() {
                    snmp.snmpget = v;
                }
            }
        }

        Ok(Self {
            ups,
            rhvm,
            protected,
            monitor_frequency: secs(file.monitor_frequency, DEFAULT_MONITOR_FREQUENCY_SECS),
            escalated_frequency: secs(file.escalated_frequency, DEFAULT_ESCALATED_FREQUENCY_SECS),
            hard_stop_threshold_secs: file
                .hard_stop_threshold_secs
                .unwrap_or(DEFAULT_HARD_STOP_THRESHOLD_SECS),
            drain_poll: Duration::from_millis(
                file.drain_poll_ms.unwrap_or(DEFAULT_DRAIN_POLL_MS).max(1),
            ),
            management_plane_poll: secs(
                file.management_plane_poll_secs,
                DEFAULT_MANAGEMENT_PLANE_POLL_SECS,
            ),
            discord_webhook: file.discord_webhook.filter(|w| !w.trim().is_empty()),
            snmp,
        })
    }
}

fn required(value: Option<String>, key: &str) -> Result<String, String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(format!("`{}` is required", key)),
    }
}

fn secs(value: Option<u64>, default: u64) -> Duration {
    Duration::from_secs(value.unwrap_or(default).max(MIN_FREQUENCY_SECS))
}

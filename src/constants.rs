//! Application-wide constants.
//!
//! Centralizes defaults, thresholds, and the fixed identifiers used when
//! talking to the UPS fleet, the hosted engine, and the storage cluster.

use std::path::PathBuf;

// ── Timing ────────────────────────────────────────────────────────
/// Default UPS polling interval while every unit is on mains (seconds).
pub const DEFAULT_MONITOR_FREQUENCY_SECS: u64 = 60;
/// Polling interval while some, but not all, units are on battery (seconds).
pub const DEFAULT_ESCALATED_FREQUENCY_SECS: u64 = 10;
/// Delay between workload drain passes (ms).
pub const DEFAULT_DRAIN_POLL_MS: u64 = 1000;
/// Delay between hosted engine status checks (seconds).
pub const DEFAULT_MANAGEMENT_PLANE_POLL_SECS: u64 = 5;
/// Smallest accepted polling interval (seconds).
pub const MIN_FREQUENCY_SECS: u64 = 1;

// ── Battery ───────────────────────────────────────────────────────
/// Remaining battery time below which shutting-down workloads are force-stopped.
pub const DEFAULT_HARD_STOP_THRESHOLD_SECS: u64 = 240;

// ── SNMP (Eaton XUPS MIB) ─────────────────────────────────────────
/// xupsInputSource: 1 = battery, 2 = mains.
pub const OID_INPUT_SOURCE: &str = "1.3.6.1.4.1.705.1.7.3.0";
/// xupsBatTimeRemaining, in seconds.
pub const OID_BATTERY_TIME_REMAINING: &str = "1.3.6.1.4.1.705.1.5.1.0";
/// xupsInputSource value reported while on battery.
pub const INPUT_SOURCE_BATTERY: i64 = 1;
/// xupsInputSource value reported while on mains.
pub const INPUT_SOURCE_MAINS: i64 = 2;
/// Default SNMPv3 user (noAuthNoPriv).
pub const DEFAULT_SNMP_USER: &str = "readuser";
/// Default SNMP agent port.
pub const DEFAULT_SNMP_PORT: u16 = 161;
/// Default per-request SNMP timeout (seconds).
pub const DEFAULT_SNMP_TIMEOUT_SECS: u64 = 5;
/// Default net-snmp `snmpget` binary.
pub const DEFAULT_SNMPGET_BIN: &str = "snmpget";

// ── Cluster ───────────────────────────────────────────────────────
/// Workload protected from shutdown when the config names none.
pub const DEFAULT_PROTECTED_VM: &str = "HostedEngine";
/// CA bundle trusted for the management API when the config names none.
pub const DEFAULT_CA_BUNDLE: &str = "ca-bundle.pem";
/// Storage flags applied, in order, before the host loses power.
pub const STORAGE_FLAGS: &[&str] = &[
    "noout",
    "norecover",
    "norebalance",
    "nobackfill",
    "nodown",
    "pause",
];
/// Timeout for a single management API request (seconds).
pub const VIRT_REQUEST_TIMEOUT_SECS: u64 = 30;

// ── Notifications ─────────────────────────────────────────────────
/// Embed title used for every webhook post.
pub const NOTIFY_TITLE: &str = "UPS Notification";
/// Embed colour for critical messages (red).
pub const COLOR_CRITICAL: u32 = 16_711_680;
/// Embed colour for warnings (orange).
pub const COLOR_WARNING: u32 = 16_753_920;
/// Embed colour for informational messages (green).
pub const COLOR_INFO: u32 = 65_280;
/// Timeout for a single webhook post (seconds).
pub const NOTIFY_TIMEOUT_SECS: u64 = 10;

// ── Paths ─────────────────────────────────────────────────────────

/// Returns `/etc/upsguard/config.toml`.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("/etc/upsguard").join("config.toml")
}

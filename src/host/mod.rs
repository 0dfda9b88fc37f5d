//! Node-local control: hosted engine, storage flags, and host power.

pub mod commands;

use async_trait::async_trait;

use crate::error::PowerResult;

/// Hosted engine VM state as seen from one cluster host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineHostState {
    pub host: String,
    pub vm: String,
    /// False when the host's entry is stale (host off or unreachable).
    pub live: bool,
}

impl EngineHostState {
    fn is_down(&self) -> bool {
        self.vm == "down"
    }
}

/// Aggregate hosted engine status across every reachable host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagementPlaneStatus {
    pub hosts: Vec<EngineHostState>,
}

impl ManagementPlaneStatus {
    fn live_hosts(&self) -> impl Iterator<Item = &EngineHostState> {
        self.hosts.iter().filter(|h| h.live)
    }

    /// True when no reachable host reports the engine VM as anything but
    /// down. Stale entries are ignored.
    pub fn is_down(&self) -> bool {
        self.live_hosts().all(EngineHostState::is_down)
    }

    /// Reachable hosts reporting the engine VM down.
    pub fn count_down(&self) -> usize {
        self.live_hosts().filter(|h| h.is_down()).count()
    }

    pub fn count_live(&self) -> usize {
        self.live_hosts().count()
    }
}

/// Actions the shutdown sequencer takes on this node and its cluster.
#[async_trait]
pub trait HostControl: Send + Sync {
    /// Put the cluster in global maintenance mode.
    async fn set_global_maintenance(&self) -> PowerResult<()>;

    /// Ask the management-plane appliance to shut down.
    async fn shutdown_management_plane(&self) -> PowerResult<()>;

    /// Current management-plane appliance state on every host.
    async fn management_plane_status(&self) -> PowerResult<ManagementPlaneStatus>;

    /// Apply one protective storage cluster flag.
    async fn set_storage_flag(&self, flag: &str) -> PowerResult<()>;

    /// Power off this host. Does not wait for the host to go down.
    async fn power_off(&self) -> PowerResult<()>;
}

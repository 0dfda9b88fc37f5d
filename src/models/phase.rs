use std::fmt;

/// Progress marker of the cluster shutdown sequence.
/// Strictly forward: the derived ordering is the execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShutdownPhase {
    NotStarted,
    MaintenanceSet,
    DrainingWorkloads,
    ManagementPlaneDown,
    StorageQuiesced,
    HostPoweringOff,
    Complete,
}

impl ShutdownPhase {
    /// Human-readable label for the current phase.
    pub fn label(&self) -> &'static str {
        match self {
            ShutdownPhase::NotStarted => "not started",
            ShutdownPhase::MaintenanceSet => "global maintenance set",
            ShutdownPhase::DrainingWorkloads => "draining workloads",
            ShutdownPhase::ManagementPlaneDown => "management plane down",
            ShutdownPhase::StorageQuiesced => "storage quiesced",
            ShutdownPhase::HostPoweringOff => "host powering off",
            ShutdownPhase::Complete => "complete",
        }
    }
}

impl fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

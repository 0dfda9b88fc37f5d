//! Cluster shutdown sequence.
//!
//! State flow: NotStarted → MaintenanceSet → DrainingWorkloads →
//! ManagementPlaneDown → [StorageQuiesced] → HostPoweringOff → Complete
//!
//! Each step is attempted once. The first error ends the sequence where it
//! stands; nothing is rolled back. Storage quiescing runs only on nodes that
//! host the storage cluster.

use std::time::Duration;

use tracing::{info, warn};

use crate::clock::Sleeper;
use crate::constants::STORAGE_FLAGS;
use crate::drain::DrainController;
use crate::error::PowerResult;
use crate::host::HostControl;
use crate::models::ShutdownPhase;
use crate::notifications::{local_hostname, notify_best_effort, Notifier, Severity};

#[derive(Debug, Clone)]
pub struct SequencerSettings {
    /// This node also hosts the storage cluster.
    pub hosts_storage: bool,
    /// Delay between management-plane status checks.
    pub management_plane_poll: Duration,
}

pub struct ClusterShutdownSequencer<'a> {
    host: &'a dyn HostControl,
    drain: DrainController<'a>,
    notifier: &'a dyn Notifier,
    sleeper: &'a dyn Sleeper,
    settings: SequencerSettings,
    phase: ShutdownPhase,
    history: Vec<ShutdownPhase>,
}

impl<'a> ClusterShutdownSequencer<'a> {
    pub fn new(
        host: &'a dyn HostControl,
        drain: DrainController<'a>,
        notifier: &'a dyn Notifier,
        sleeper: &'a dyn Sleeper,
        settings: SequencerSettings,
    ) -> Self {
        Self {
            host,
            drain,
            notifier,
            sleeper,
            settings,
            phase: ShutdownPhase::NotStarted,
            history: vec![ShutdownPhase::NotStarted],
        }
    }

    pub fn phase(&self) -> ShutdownPhase {
        self.phase
    }

    /// Every phase reached so far, in order.
    pub fn history(&self) -> &[ShutdownPhase] {
        &self.history
    }

    fn advance(&mut self, next: ShutdownPhase) {
        if next <= self.phase {
            warn!("Ignoring backward phase change {} → {}", self.phase, next);
            return;
        }
        info!("Shutdown phase: {} → {}", self.phase, next);
        self.phase = next;
        self.history.push(next);
    }

    /// Run the whole sequence. Returns the final phase on success.
    pub async fn run(&mut self) -> PowerResult<ShutdownPhase> {
        info!("Starting graceful shutdown procedure");
        notify_best_effort(
            self.notifier,
            &format!("Starting cluster shutdown from {}", local_hostname()),
            Severity::Critical,
        )
        .await;

        self.host.set_global_maintenance().await?;
        self.advance(ShutdownPhase::MaintenanceSet);

        self.advance(ShutdownPhase::DrainingWorkloads);
        let report = self.drain.drain_workloads().await?;
        info!(
            "Drained {} VMs in {} passes ({} forced)",
            report.drained, report.passes, report.stop_requests
        );

        self.host.shutdown_management_plane().await?;
        self.wait_for_management_plane().await?;
        self.advance(ShutdownPhase::ManagementPlaneDown);

        if self.settings.hosts_storage {
            info!("Setting ceph flags");
            for flag in STORAGE_FLAGS {
                self.host.set_storage_flag(flag).await?;
            }
            self.advance(ShutdownPhase::StorageQuiesced);
        }

        notify_best_effort(
            self.notifier,
            &format!("Powering off {}", local_hostname()),
            Severity::Critical,
        )
        .await;
        self.host.power_off().await?;
        self.advance(ShutdownPhase::HostPoweringOff);

        self.advance(ShutdownPhase::Complete);
        info!("Completed");
        Ok(self.phase)
    }

    /// Poll until every reachable host reports the engine VM down.
    async fn wait_for_management_plane(&self) -> PowerResult<()> {
        loop {
            let status = self.host.management_plane_status().await?;
            if status.is_down() {
                return Ok(());
            }
            info!(
                "Waiting for hosted engine: down on {}/{} reachable hosts",
                status.count_down(),
                status.count_live()
            );
            self.sleeper.sleep(self.settings.management_plane_poll).await;
        }
    }
}

//! Drain Controller: walks every non-protected workload down.
//!
//! Each pass re-lists the inventory and pushes each workload one step
//! toward `Down`: running workloads get a graceful shutdown request,
//! workloads already shutting down are force-stopped once every UPS has
//! less than the hard-stop threshold left. Any API error aborts the drain.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::Sleeper;
use crate::error::PowerResult;
use crate::models::{ProtectedSet, UpsAppliance, Workload, WorkloadStatus};
use crate::ups::{battery_margin, UpsStatusSource};
use crate::virt::VirtControl;

#[derive(Debug, Clone)]
pub struct DrainSettings {
    /// Delay between passes.
    pub poll_interval: Duration,
    /// Force-stop when every UPS is strictly below this many seconds.
    pub hard_stop_threshold_secs: u64,
}

/// Outcome of one pass over the inventory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassProgress {
    /// Non-protected workloads reporting down.
    pub down: usize,
    /// Workloads that must reach down (total minus protected).
    pub target: usize,
    pub shutdown_requests: usize,
    pub stop_requests: usize,
}

impl PassProgress {
    pub fn is_complete(&self) -> bool {
        self.down == self.target
    }
}

/// Totals over a finished drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub passes: u64,
    pub drained: usize,
    pub shutdown_requests: usize,
    pub stop_requests: usize,
}

pub struct DrainController<'a> {
    virt: &'a dyn VirtControl,
    ups: &'a dyn UpsStatusSource,
    sleeper: &'a dyn Sleeper,
    appliances: &'a [UpsAppliance],
    protected: &'a ProtectedSet,
    settings: DrainSettings,
}

impl<'a> DrainController<'a> {
    pub fn new(
        virt: &'a dyn VirtControl,
        ups: &'a dyn UpsStatusSource,
        sleeper: &'a dyn Sleeper,
        appliances: &'a [UpsAppliance],
        protected: &'a ProtectedSet,
        settings: DrainSettings,
    ) -> Self {
        Self {
            virt,
            ups,
            sleeper,
            appliances,
            protected,
            settings,
        }
    }

    /// Block until every non-protected workload reports down.
    pub async fn drain_workloads(&self) -> PowerResult<DrainReport> {
        if self.protected.is_empty() {
            info!("No protected VMs, draining everything");
        } else {
            info!(
                "Excluding {} VMs: {}",
                self.protected.len(),
                self.protected.describe()
            );
        }
        let mut report = DrainReport::default();

        loop {
            report.passes += 1;
            let workloads = self.virt.list_workloads().await?;
            let progress = self.drain_pass(&workloads).await?;
            report.shutdown_requests += progress.shutdown_requests;
            report.stop_requests += progress.stop_requests;

            info!("VMs shut off {}/{}", progress.down, progress.target);
            debug!("Loop number: {}", report.passes);

            if progress.is_complete() {
                report.drained = progress.down;
                return Ok(report);
            }
            self.sleeper.sleep(self.settings.poll_interval).await;
        }
    }

    /// Act once on every non-protected workload in `workloads`.
    async fn drain_pass(&self, workloads: &[Workload]) -> PowerResult<PassProgress> {
        let protected_count = workloads.iter().filter(|w| self.protected.contains(w)).count();
        let mut progress = PassProgress {
            target: workloads.len() - protected_count,
            ..PassProgress::default()
        };
        // Battery margin is polled at most once per pass, and only if needed.
        let mut critical: Option<bool> = None;

        for workload in workloads.iter().filter(|w| !self.protected.contains(w)) {
            info!("{}: {}", workload.name, workload.status);
            match &workload.status {
                WorkloadStatus::Up => {
                    self.virt.shutdown_workload(workload).await?;
                    progress.shutdown_requests += 1;
                }
                WorkloadStatus::ShuttingDown => {
                    let is_critical = match critical {
                        Some(c) => c,
                        None => {
                            let margin = battery_margin(self.ups, self.appliances).await?;
                            let c = margin.all_below(self.settings.hard_stop_threshold_secs);
                            debug!("Battery margin {:?}s, critical: {}", margin.min(), c);
                            critical = Some(c);
                            c
                        }
                    };
                    if is_critical {
                        warn!(
                            "{}: every UPS below {}s, forcing stop",
                            workload.name, self.settings.hard_stop_threshold_secs
                        );
                        self.virt.stop_workload(workload).await?;
                        progress.stop_requests += 1;
                    }
                }
                WorkloadStatus::Down => progress.down += 1,
                WorkloadStatus::Unknown(status) => {
                    warn!("{}: status {} is not handled, waiting", workload.name, status);
                }
            }
        }

        Ok(progress)
    }
}

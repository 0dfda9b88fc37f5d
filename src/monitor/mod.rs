//! Power Monitor: polls the UPS fleet and decides when to shut down.
//!
//! The decision fires only when every configured UPS reports battery power
//! in the same polling cycle. A single unit on mains holds the whole fleet
//! back, because the cluster can still draw good power through it. While
//! part of the fleet is on battery the polling interval shrinks so the
//! unanimous condition is caught quickly.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::Sleeper;
use crate::error::PowerResult;
use crate::models::{FleetBatteryState, UpsAppliance};
use crate::notifications::{notify_best_effort, Notifier, Severity};
use crate::ups::{read_appliance, UpsStatusSource};

/// Polling cadence and escalation settings.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Interval while every UPS is on mains.
    pub poll_interval: Duration,
    /// Interval while some UPS are on battery.
    pub escalated_interval: Duration,
    /// Fleet battery margin below which a warning is logged each cycle.
    pub escalation_threshold_secs: u64,
}

/// How the watch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Every UPS is on battery: start the shutdown sequence.
    InitiateShutdown(FleetBatteryState),
    /// The operator interrupted monitoring.
    Cancelled,
}

pub struct PowerMonitor<'a> {
    source: &'a dyn UpsStatusSource,
    notifier: &'a dyn Notifier,
    sleeper: &'a dyn Sleeper,
    appliances: &'a [UpsAppliance],
    settings: MonitorSettings,
    /// Appliances on battery in the previous cycle, for transition reporting.
    on_battery: HashSet<UpsAppliance>,
    cycles: u64,
}

impl<'a> PowerMonitor<'a> {
    pub fn new(
        source: &'a dyn UpsStatusSource,
        notifier: &'a dyn Notifier,
        sleeper: &'a dyn Sleeper,
        appliances: &'a [UpsAppliance],
        settings: MonitorSettings,
    ) -> Self {
        Self {
            source,
            notifier,
            sleeper,
            appliances,
            settings,
            on_battery: HashSet::new(),
            cycles: 0,
        }
    }

    /// Completed polling cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Poll every appliance once. The first failed query aborts the cycle.
    pub async fn poll_fleet(&self) -> PowerResult<FleetBatteryState> {
        let mut readings = Vec::with_capacity(self.appliances.len());
        for appliance in self.appliances {
            let reading = read_appliance(self.source, appliance).await?;
            debug!(
                "{}: {} ({:?}s remaining)",
                appliance,
                if reading.on_mains { "mains" } else { "battery" },
                reading.seconds_remaining
            );
            readings.push(reading);
        }
        Ok(FleetBatteryState::from_readings(&readings))
    }

    /// Wait before the next cycle: short while degraded, normal otherwise.
    pub fn next_interval(&self, fleet: &FleetBatteryState) -> Duration {
        if fleet.count_on_battery() > 0 {
            self.settings.escalated_interval
        } else {
            self.settings.poll_interval
        }
    }

    /// Notify on every mains→battery and battery→mains change since the last cycle.
    async fn report_transitions(&mut self, fleet: &FleetBatteryState) {
        let current: HashSet<UpsAppliance> = fleet.on_battery.iter().cloned().collect();

        for appliance in self.appliances {
            let now = current.contains(appliance);
            let before = self.on_battery.contains(appliance);
            if now && !before {
                let msg = format!("{} is on battery!", appliance);
                warn!("{}", msg);
                notify_best_effort(self.notifier, &msg, Severity::Warning).await;
            } else if !now && before {
                let msg = format!("{} is back on mains", appliance);
                info!("{}", msg);
                notify_best_effort(self.notifier, &msg, Severity::Info).await;
            }
        }

        self.on_battery = current;
    }

    /// Block until every UPS is on battery. UPS errors end the watch.
    pub async fn watch_for_outage(&mut self) -> PowerResult<FleetBatteryState> {
        info!(
            "Monitoring {} UPS every {}s",
            self.appliances.len(),
            self.settings.poll_interval.as_secs()
        );

        loop {
            let fleet = self.poll_fleet().await?;
            self.cycles += 1;
            self.report_transitions(&fleet).await;

            if fleet.is_unanimous() {
                let msg = "All UPS are on battery. Beginning shutdown!";
                warn!("{}", msg);
                notify_best_effort(self.notifier, msg, Severity::Critical).await;
                return Ok(fleet);
            }

            if let (true, Some(min)) = (fleet.is_degraded(), fleet.min_seconds_remaining) {
                if min < self.settings.escalation_threshold_secs {
                    warn!(
                        "Lowest battery margin {}s is below {}s while mains is still available",
                        min, self.settings.escalation_threshold_secs
                    );
                }
            }

            let wait = self.next_interval(&fleet);
            debug!(
                "Cycle {}: {}/{} on battery, next poll in {}s",
                self.cycles,
                fleet.count_on_battery(),
                fleet.total,
                wait.as_secs()
            );
            self.sleeper.sleep(wait).await;
        }
    }

    /// Watch until the outage decision fires or `cancel` completes first.
    pub async fn watch_until<F>(&mut self, cancel: F) -> PowerResult<MonitorOutcome>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => Ok(MonitorOutcome::Cancelled),
            result = self.watch_for_outage() => result.map(MonitorOutcome::InitiateShutdown),
        }
    }
}

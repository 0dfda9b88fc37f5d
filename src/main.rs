//! # upsguard - UPS-triggered shutdown for an RHV cluster node
//!
//! Polls every UPS feeding the node over SNMP. Once all of them are on
//! battery it puts the cluster in global maintenance, drains the VMs,
//! stops the hosted engine, optionally quiesces Ceph and powers the node off.

mod clock;
mod config;
mod constants;
mod drain;
mod error;
mod host;
mod logging;
mod models;
mod monitor;
mod notifications;
mod sequencer;
#[cfg(test)]
mod testing;
mod ups;
mod virt;

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};

use clock::TokioSleeper;
use config::Config;
use constants::default_config_path;
use drain::{DrainController, DrainSettings};
use error::PowerError;
use host::commands::CommandHost;
use models::ShutdownPhase;
use monitor::{MonitorOutcome, MonitorSettings, PowerMonitor};
use notifications::{DisabledNotifier, Notifier, WebhookNotifier};
use sequencer::{ClusterShutdownSequencer, SequencerSettings};
use ups::snmp::SnmpUpsSource;
use virt::ovirt::OvirtClient;

const EXIT_SUCCESS: u8 = 0;
const EXIT_FAILURE: u8 = 1;

/// upsguard - shut an RHV node down cleanly when every UPS is on battery
#[derive(Parser, Debug)]
#[command(name = "upsguard", version, about = "UPS monitor and graceful RHV cluster shutdown")]
struct Cli {
    /// This node also hosts Ceph: set protective OSD flags before power-off
    #[arg(long)]
    ceph: bool,

    /// Path to the configuration file
    #[arg(long, short = 'c', value_name = "PATH", default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    info!("Starting");
    let config = Config::load(&cli.config)?;
    debug!("{:?}", config);
    ensure_root()?;

    // Everything that can fail on bad configuration is built before monitoring.
    let ups = SnmpUpsSource::new(config.snmp.clone());
    let virt = OvirtClient::connect(&config.rhvm).context("connecting to RHV Manager")?;
    let host = CommandHost::default();
    let notifier: Box<dyn Notifier> = match &config.discord_webhook {
        Some(url) => Box::new(WebhookNotifier::new(url)?),
        None => Box::new(DisabledNotifier),
    };
    let sleeper = TokioSleeper;
    info!("Started");

    let mut monitor = PowerMonitor::new(
        &ups,
        notifier.as_ref(),
        &sleeper,
        &config.ups,
        MonitorSettings {
            poll_interval: config.monitor_frequency,
            escalated_interval: config.escalated_frequency,
            escalation_threshold_secs: config.hard_stop_threshold_secs,
        },
    );
    let drain = DrainController::new(
        &virt,
        &ups,
        &sleeper,
        &config.ups,
        &config.protected,
        DrainSettings {
            poll_interval: config.drain_poll,
            hard_stop_threshold_secs: config.hard_stop_threshold_secs,
        },
    );
    let mut sequencer = ClusterShutdownSequencer::new(
        &host,
        drain,
        notifier.as_ref(),
        &sleeper,
        SequencerSettings {
            hosts_storage: cli.ceph,
            management_plane_poll: config.management_plane_poll,
        },
    );

    Ok(supervise(&mut monitor, &mut sequencer, interrupted(), tokio::signal::ctrl_c).await)
}

/// Watch until the outage decision, then run the shutdown sequence to its
/// end. `cancel` aborts monitoring only; once the sequence has started,
/// every signal from `next_interrupt` is logged and ignored.
/// Returns the process exit status.
async fn supervise<C, S, F>(
    monitor: &mut PowerMonitor<'_>,
    sequencer: &mut ClusterShutdownSequencer<'_>,
    cancel: C,
    next_interrupt: S,
) -> u8
where
    C: Future<Output = ()>,
    S: FnMut() -> F,
    F: Future<Output = io::Result<()>>,
{
    let fleet = match monitor.watch_until(cancel).await {
        Ok(MonitorOutcome::InitiateShutdown(fleet)) => fleet,
        Ok(MonitorOutcome::Cancelled) => {
            error!("Caught CTRL+C - Exiting");
            return EXIT_FAILURE;
        }
        Err(e) => {
            error!("Monitoring failed: {}", e);
            return EXIT_FAILURE;
        }
    };
    info!(
        "{} UPS on battery after {} cycles, lowest margin {:?}s",
        fleet.count_on_battery(),
        monitor.cycles(),
        fleet.min_seconds_remaining
    );

    // Point of no return: interrupts are only logged from here on.
    let result = tokio::select! {
        biased;
        result = sequencer.run() => result,
        never = ignore_interrupts(next_interrupt) => match never {},
    };
    debug!("Phase history: {:?}", sequencer.history());

    match result {
        Ok(ShutdownPhase::Complete) => EXIT_SUCCESS,
        Ok(phase) => {
            error!("Shutdown sequence stopped at: {}", phase);
            EXIT_FAILURE
        }
        Err(e) => {
            error!("Shutdown sequence failed at {}: {}", sequencer.phase(), e);
            EXIT_FAILURE
        }
    }
}

/// Log every interrupt and carry on. Never completes.
async fn ignore_interrupts<S, F>(mut next_interrupt: S) -> Infallible
where
    S: FnMut() -> F,
    F: Future<Output = io::Result<()>>,
{
    while next_interrupt().await.is_ok() {
        warn!("Interrupt ignored: shutdown sequence in progress");
    }
    warn!("Interrupt listener closed");
    std::future::pending().await
}

/// Resolves on the first Ctrl-C. Never resolves if the handler can't be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for interrupts: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Maintenance mode, Ceph flags and power-off all need root.
fn ensure_root() -> Result<(), PowerError> {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        return Err(PowerError::Config(format!(
            "must run as root (effective uid {})",
            euid
        )));
    }
    Ok(())
}

//! Scripted fakes for every external seam. Compiled for tests only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::clock::Sleeper;
use crate::error::{PowerError, PowerResult};
use crate::host::{HostControl, ManagementPlaneStatus};
use crate::models::{UpsAppliance, Workload, WorkloadStatus};
use crate::notifications::{Notifier, Severity};
use crate::ups::UpsStatusSource;
use crate::virt::VirtControl;

/// Shared, ordered record of side effects across fakes.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

fn nth<T: Copy>(values: &[T], i: usize) -> Option<T> {
    values.get(i.min(values.len().saturating_sub(1))).copied()
}

// ── UPS ───────────────────────────────────────────────────────────

/// Per-appliance script. The last entry of each sequence repeats forever.
#[derive(Debug, Clone)]
pub struct UpsScript {
    pub address: String,
    pub mains: Vec<bool>,
    pub seconds: Vec<u64>,
    pub fail: bool,
}

impl UpsScript {
    pub fn mains(address: &str) -> Self {
        Self::sequence(address, vec![true])
    }

    pub fn mains_with_time(address: &str, seconds: u64) -> Self {
        Self::mains(address).with_seconds(vec![seconds])
    }

    pub fn battery(address: &str, seconds: u64) -> Self {
        Self::sequence(address, vec![false]).with_seconds(vec![seconds])
    }

    pub fn sequence(address: &str, mains: Vec<bool>) -> Self {
        Self {
            address: address.to_string(),
            mains,
            seconds: vec![3600],
            fail: false,
        }
    }

    pub fn failing(address: &str) -> Self {
        Self {
            fail: true,
            ..Self::mains(address)
        }
    }

    pub fn with_seconds(mut self, seconds: Vec<u64>) -> Self {
        self.seconds = seconds;
        self
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct UpsCalls {
    mains: usize,
    battery: usize,
}

pub struct ScriptedUps {
    scripts: HashMap<String, UpsScript>,
    calls: Mutex<HashMap<String, UpsCalls>>,
}

impl ScriptedUps {
    pub fn new(scripts: Vec<UpsScript>) -> Self {
        Self {
            scripts: scripts.into_iter().map(|s| (s.address.clone(), s)).collect(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn appliances(&self, order: &[&str]) -> Vec<UpsAppliance> {
        order.iter().map(|a| UpsAppliance::new(*a)).collect()
    }

    pub fn battery_queries(&self) -> usize {
        self.calls.lock().unwrap().values().map(|c| c.battery).sum()
    }

    fn script(&self, appliance: &UpsAppliance) -> PowerResult<&UpsScript> {
        let script = self
            .scripts
            .get(&appliance.address)
            .ok_or_else(|| PowerError::UpsQuery {
                appliance: appliance.address.clone(),
                reason: "unknown appliance".to_string(),
            })?;
        if script.fail {
            return Err(PowerError::UpsQuery {
                appliance: appliance.address.clone(),
                reason: "Timeout: No Response".to_string(),
            });
        }
        Ok(script)
    }
}

#[async_trait]
impl UpsStatusSource for ScriptedUps {
    async fn is_on_mains(&self, appliance: &UpsAppliance) -> PowerResult<bool> {
        let script = self.script(appliance)?;
        let mut calls = self.calls.lock().unwrap();
        let entry = calls.entry(appliance.address.clone()).or_default();
        let value = nth(&script.mains, entry.mains).unwrap_or(true);
        entry.mains += 1;
        Ok(value)
    }

    async fn battery_seconds_remaining(&self, appliance: &UpsAppliance) -> PowerResult<u64> {
        let script = self.script(appliance)?;
        let mut calls = self.calls.lock().unwrap();
        let entry = calls.entry(appliance.address.clone()).or_default();
        let value = nth(&script.seconds, entry.battery).unwrap_or(3600);
        entry.battery += 1;
        Ok(value)
    }
}

// ── Virtualization ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtAction {
    Shutdown(String),
    Stop(String),
}

#[derive(Default)]
struct FakeVirtState {
    workloads: Vec<Workload>,
    actions: Vec<VirtAction>,
    lists: usize,
    /// Listings a graceful shutdown takes before the workload reports down.
    graceful_lists: Option<usize>,
    pending: HashMap<String, usize>,
    fail_on: Option<String>,
    fail_listing: bool,
    /// (listing number, id, new name)
    renames: Vec<(usize, String, String)>,
}

/// In-memory management API. Shutdown moves a workload to ShuttingDown,
/// stop moves it to Down.
pub struct FakeVirt {
    state: Mutex<FakeVirtState>,
    journal: Journal,
}

pub fn workload(id: &str, name: &str, status: WorkloadStatus) -> Workload {
    Workload {
        id: id.to_string(),
        name: name.to_string(),
        status,
    }
}

impl FakeVirt {
    pub fn new(workloads: Vec<Workload>) -> Self {
        Self::with_journal(workloads, journal())
    }

    pub fn with_journal(workloads: Vec<Workload>, journal: Journal) -> Self {
        Self {
            state: Mutex::new(FakeVirtState {
                workloads,
                ..FakeVirtState::default()
            }),
            journal,
        }
    }

    /// Graceful shutdowns complete after `lists` further listings. Applies
    /// to workloads already shutting down as well.
    pub fn graceful_after(self, lists: usize) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.graceful_lists = Some(lists);
            let draining: Vec<String> = state
                .workloads
                .iter()
                .filter(|w| w.status == WorkloadStatus::ShuttingDown)
                .map(|w| w.id.clone())
                .collect();
            for id in draining {
                state.pending.insert(id, lists);
            }
        }
        self
    }

    /// Any action on the named workload fails.
    pub fn failing_on(self, name: &str) -> Self {
        self.state.lock().unwrap().fail_on = Some(name.to_string());
        self
    }

    pub fn failing_listing(self) -> Self {
        self.state.lock().unwrap().fail_listing = true;
        self
    }

    /// Rename workload `id` just before listing number `at_list` (1-based).
    pub fn rename_at(self, at_list: usize, id: &str, new_name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .renames
            .push((at_list, id.to_string(), new_name.to_string()));
        self
    }

    pub fn actions(&self) -> Vec<VirtAction> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn list_count(&self) -> usize {
        self.state.lock().unwrap().lists
    }

    fn act(&self, workload: &Workload, action: VirtAction, status: WorkloadStatus) -> PowerResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_on.as_deref() == Some(workload.name.as_str()) {
            return Err(PowerError::Virt(format!("action on {} rejected", workload.name)));
        }
        self.journal.lock().unwrap().push(match &action {
            VirtAction::Shutdown(n) => format!("vm-shutdown:{}", n),
            VirtAction::Stop(n) => format!("vm-stop:{}", n),
        });
        state.actions.push(action);
        if status == WorkloadStatus::ShuttingDown {
            if let Some(n) = state.graceful_lists {
                state.pending.insert(workload.id.clone(), n);
            }
        } else {
            state.pending.remove(&workload.id);
        }
        if let Some(w) = state.workloads.iter_mut().find(|w| w.id == workload.id) {
            w.status = status;
        }
        Ok(())
    }
}

#[async_trait]
impl VirtControl for FakeVirt {
    async fn list_workloads(&self) -> PowerResult<Vec<Workload>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_listing {
            return Err(PowerError::Virt("503 Service Unavailable".to_string()));
        }
        state.lists += 1;
        let list_no = state.lists;

        let renames: Vec<(String, String)> = state
            .renames
            .iter()
            .filter(|(at, _, _)| *at == list_no)
            .map(|(_, id, name)| (id.clone(), name.clone()))
            .collect();
        for (id, name) in renames {
            if let Some(w) = state.workloads.iter_mut().find(|w| w.id == id) {
                w.name = name;
            }
        }

        let mut finished = Vec::new();
        for (id, remaining) in state.pending.iter_mut() {
            if *remaining == 0 {
                finished.push(id.clone());
            } else {
                *remaining -= 1;
            }
        }
        for id in finished {
            state.pending.remove(&id);
            if let Some(w) = state.workloads.iter_mut().find(|w| w.id == id) {
                w.status = WorkloadStatus::Down;
            }
        }

        self.journal.lock().unwrap().push("vm-list".to_string());
        Ok(state.workloads.clone())
    }

    async fn shutdown_workload(&self, workload: &Workload) -> PowerResult<()> {
        self.act(
            workload,
            VirtAction::Shutdown(workload.name.clone()),
            WorkloadStatus::ShuttingDown,
        )
    }

    async fn stop_workload(&self, workload: &Workload) -> PowerResult<()> {
        self.act(workload, VirtAction::Stop(workload.name.clone()), WorkloadStatus::Down)
    }
}

// ── Host ──────────────────────────────────────────────────────────

/// Records host actions into the journal. Engine status answers follow
/// `engine_statuses`, the last one repeating.
pub struct FakeHost {
    journal: Journal,
    engine_statuses: Vec<ManagementPlaneStatus>,
    status_calls: Mutex<usize>,
    fail_status: bool,
}

impl FakeHost {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            engine_statuses: vec![ManagementPlaneStatus::default()],
            status_calls: Mutex::new(0),
            fail_status: false,
        }
    }

    pub fn with_engine_statuses(mut self, statuses: Vec<ManagementPlaneStatus>) -> Self {
        self.engine_statuses = statuses;
        self
    }

    pub fn failing_status(mut self) -> Self {
        self.fail_status = true;
        self
    }

    fn record(&self, entry: impl Into<String>) {
        self.journal.lock().unwrap().push(entry.into());
    }
}

#[async_trait]
impl HostControl for FakeHost {
    async fn set_global_maintenance(&self) -> PowerResult<()> {
        self.record("maintenance");
        Ok(())
    }

    async fn shutdown_management_plane(&self) -> PowerResult<()> {
        self.record("engine-shutdown");
        Ok(())
    }

    async fn management_plane_status(&self) -> PowerResult<ManagementPlaneStatus> {
        self.record("engine-status");
        if self.fail_status {
            return Err(PowerError::Command {
                command: "hosted-engine --vm-status --json".to_string(),
                reason: "exit status: 1".to_string(),
            });
        }
        let mut calls = self.status_calls.lock().unwrap();
        let i = (*calls).min(self.engine_statuses.len().saturating_sub(1));
        *calls += 1;
        Ok(self.engine_statuses.get(i).cloned().unwrap_or_default())
    }

    async fn set_storage_flag(&self, flag: &str) -> PowerResult<()> {
        self.record(format!("storage:{}", flag));
        Ok(())
    }

    async fn power_off(&self) -> PowerResult<()> {
        self.record("poweroff");
        Ok(())
    }
}

// ── Notifier / clock ──────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Severity)>>,
    fail: bool,
}

impl RecordingNotifier {
    /// Records every message, then reports a delivery failure (HTTP 500).
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn sent(&self) -> Vec<(String, Severity)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str, severity: Severity) -> PowerResult<()> {
        self.sent.lock().unwrap().push((message.to_string(), severity));
        if self.fail {
            return Err(PowerError::Notify(
                "server response 500 Internal Server Error".to_string(),
            ));
        }
        Ok(())
    }
}

/// Records requested sleeps and yields instead of waiting.
#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn durations(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

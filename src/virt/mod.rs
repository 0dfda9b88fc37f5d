//! Virtualization control: list workloads and request them down.

pub mod ovirt;

use async_trait::async_trait;

use crate::error::PowerResult;
use crate::models::Workload;

/// Workload inventory and power actions on the management API.
#[async_trait]
pub trait VirtControl: Send + Sync {
    /// Current inventory with live statuses.
    async fn list_workloads(&self) -> PowerResult<Vec<Workload>>;

    /// Ask the guest OS to shut down. Returns once the request is accepted.
    async fn shutdown_workload(&self, workload: &Workload) -> PowerResult<()>;

    /// Pull the virtual power cord.
    async fn stop_workload(&self, workload: &Workload) -> PowerResult<()>;
}

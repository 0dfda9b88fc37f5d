//! oVirt / RHV REST API v4 client.
//!
//! Authenticates with HTTP basic auth on every request and trusts only the
//! configured CA bundle. Actions are POSTed with an empty `{}` action body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

use super::VirtControl;
use crate::config::RhvmConfig;
use crate::constants::VIRT_REQUEST_TIMEOUT_SECS;
use crate::error::{PowerError, PowerResult};
use crate::models::{Workload, WorkloadStatus};

/// `GET /vms` response. The API omits `vm` entirely when there are none.
#[derive(Debug, Deserialize, Default)]
struct VmList {
    #[serde(default)]
    vm: Vec<VmEntry>,
}

#[derive(Debug, Deserialize)]
struct VmEntry {
    id: String,
    name: String,
    #[serde(default)]
    status: String,
}

/// Parse a `GET /vms` JSON body into workloads.
pub fn parse_vm_list(body: &str) -> PowerResult<Vec<Workload>> {
    let list: VmList = serde_json::from_str(body)
        .map_err(|e| PowerError::Virt(format!("invalid VM list: {}", e)))?;
    Ok(list
        .vm
        .into_iter()
        .map(|vm| Workload {
            status: WorkloadStatus::from_api(&vm.status),
            id: vm.id,
            name: vm.name,
        })
        .collect())
}

/// Connection to the RHV Manager API.
pub struct OvirtClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl OvirtClient {
    /// Build a client trusting the configured CA bundle. No request is made.
    pub fn connect(config: &RhvmConfig) -> PowerResult<Self> {
        let pem = std::fs::read(&config.ca_bundle).map_err(|e| {
            PowerError::Config(format!(
                "cannot read CA bundle {}: {}",
                config.ca_bundle.display(),
                e
            ))
        })?;
        let certs = Certificate::from_pem_bundle(&pem)?;
        if certs.is_empty() {
            return Err(PowerError::Config(format!(
                "CA bundle {} contains no certificates",
                config.ca_bundle.display()
            )));
        }

        let mut builder = Client::builder()
            .tls_built_in_root_certs(false)
            .timeout(Duration::from_secs(VIRT_REQUEST_TIMEOUT_SECS));
        for cert in certs {
            builder = builder.add_root_certificate(cert);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .header("Version", "4")
    }

    async fn post_action(&self, workload: &Workload, action: &str) -> PowerResult<()> {
        let url = format!("{}/vms/{}/{}", self.base_url, workload.id, action);
        debug!("POST {}", url);

        let response = self
            .authed(self.client.post(&url))
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PowerError::Virt(format!(
                "{} of {} rejected ({}): {}",
                action,
                workload.name,
                status,
                body.chars().take(300).collect::<String>()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VirtControl for OvirtClient {
    async fn list_workloads(&self) -> PowerResult<Vec<Workload>> {
        let url = format!("{}/vms", self.base_url);
        let response = self.authed(self.client.get(&url)).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PowerError::Virt(format!(
                "listing VMs failed ({}): {}",
                status,
                body.chars().take(300).collect::<String>()
            )));
        }
        parse_vm_list(&body)
    }

    async fn shutdown_workload(&self, workload: &Workload) -> PowerResult<()> {
        self.post_action(workload, "shutdown").await
    }

    async fn stop_workload(&self, workload: &Workload) -> PowerResult<()> {
        self.post_action(workload, "stop").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn vm_list_is_parsed() {
        let body = r#"{
            "vm": [
                {"id": "a1", "name": "HostedEngine", "status": "up", "memory": "17179869184"},
                {"id": "b2", "name": "db01", "status": "powering_down"},
                {"id": "c3", "name": "web01", "status": "down"},
                {"id": "d4", "name": "batch", "status": "paused"}
            ]
        }"#;
        let vms = parse_vm_list(body).unwrap();
        assert_eq!(vms.len(), 4);
        assert_eq!(vms[0].name, "HostedEngine");
        assert_eq!(vms[0].status, WorkloadStatus::Up);
        assert_eq!(vms[1].status, WorkloadStatus::ShuttingDown);
        assert_eq!(vms[2].status, WorkloadStatus::Down);
        assert_eq!(vms[3].status, WorkloadStatus::Unknown("paused".to_string()));
    }

    #[test]
    fn empty_inventory_omits_vm_key() {
        assert!(parse_vm_list("{}").unwrap().is_empty());
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(matches!(parse_vm_list("<html>"), Err(PowerError::Virt(_))));
    }

    #[test]
    fn missing_ca_bundle_is_a_config_error() {
        let config = RhvmConfig {
            url: "https://rhvm.example.com/ovirt-engine/api".to_string(),
            username: "admin@internal".to_string(),
            password: "secret".to_string(),
            ca_bundle: PathBuf::from("/nonexistent/ca-bundle.pem"),
        };
        assert!(matches!(
            OvirtClient::connect(&config),
            Err(PowerError::Config(_))
        ));
    }

    #[test]
    fn empty_ca_bundle_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = RhvmConfig {
            url: "https://rhvm.example.com/ovirt-engine/api".to_string(),
            username: "admin@internal".to_string(),
            password: "secret".to_string(),
            ca_bundle: file.path().to_path_buf(),
        };
        assert!(OvirtClient::connect(&config).is_err());
    }
}

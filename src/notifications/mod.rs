//! Best-effort operator notifications over a Discord-compatible webhook.
//!
//! Delivery failures are returned to the caller, but every call site in the
//! monitoring and shutdown paths goes through [`notify_best_effort`], which
//! logs and swallows them: a dead webhook must never stop a shutdown.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::constants::*;
use crate::error::{PowerError, PowerResult};

/// Message severity, rendered as the embed colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn color(&self) -> u32 {
        match self {
            Severity::Info => COLOR_INFO,
            Severity::Warning => COLOR_WARNING,
            Severity::Critical => COLOR_CRITICAL,
        }
    }
}

/// Delivers short human-readable status text.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str, severity: Severity) -> PowerResult<()>;
}

/// Used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify(&self, message: &str, _severity: Severity) -> PowerResult<()> {
        debug!("Notification (no webhook configured): {}", message);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    tts: bool,
    username: &'a str,
    embeds: Vec<Embed<'a>>,
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    color: u32,
    title: &'a str,
    description: &'a str,
}

/// Posts embeds to a Discord-style webhook, signed with the local hostname.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    username: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> PowerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(NOTIFY_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            username: local_hostname(),
        })
    }

    fn payload<'a>(&'a self, message: &'a str, severity: Severity) -> WebhookPayload<'a> {
        WebhookPayload {
            tts: true,
            username: &self.username,
            embeds: vec![Embed {
                color: severity.color(),
                title: NOTIFY_TITLE,
                description: message,
            }],
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str, severity: Severity) -> PowerResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.payload(message, severity))
            .send()
            .await
            .map_err(|e| PowerError::Notify(format!("webhook unreachable: {}", e)))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(300).collect();
            return Err(PowerError::Notify(format!("server response {}: {}", status, body)));
        }
        Ok(())
    }
}

/// Send and log failures as warnings. Never fails.
pub async fn notify_best_effort(notifier: &dyn Notifier, message: &str, severity: Severity) {
    if let Err(e) = notifier.notify(message, severity).await {
        warn!("Notification not delivered: {}", e);
    }
}

/// Get the system hostname (best-effort).
pub fn local_hostname() -> String {
    std::fs::read_to_string("/etc/hostname")
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "upsguard".to_string())
}

use std::collections::HashSet;
use std::fmt;

use serde::Deserialize;

/// One manageable virtual machine as last reported by the management API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    pub id: String,
    pub name: String,
    pub status: WorkloadStatus,
}

/// Closed set of statuses the drain logic acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadStatus {
    Up,
    ShuttingDown,
    Down,
    /// Any other API status, kept verbatim for logging.
    Unknown(String),
}

impl WorkloadStatus {
    /// Map a management API status string.
    pub fn from_api(raw: &str) -> Self {
        match raw {
            "up" => WorkloadStatus::Up,
            "powering_down" => WorkloadStatus::ShuttingDown,
            "down" => WorkloadStatus::Down,
            other => WorkloadStatus::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for WorkloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadStatus::Up => write!(f, "up"),
            WorkloadStatus::ShuttingDown => write!(f, "powering_down"),
            WorkloadStatus::Down => write!(f, "down"),
            WorkloadStatus::Unknown(s) => write!(f, "{}", s),
        }
    }
}

/// Which workload attribute the protected set is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchBy {
    /// Display name. A rename between listings drops the protection.
    #[default]
    Name,
    /// Stable API identifier.
    Id,
}

/// Workloads excluded from any shutdown or stop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedSet {
    by: MatchBy,
    entries: HashSet<String>,
}

impl ProtectedSet {
    pub fn new(by: MatchBy, entries: impl IntoIterator<Item = String>) -> Self {
        Self {
            by,
            entries: entries.into_iter().collect(),
        }
    }

    #[cfg(test)]
    pub fn by_name(names: impl IntoIterator<Item = String>) -> Self {
        Self::new(MatchBy::Name, names)
    }

    #[cfg(test)]
    pub fn empty() -> Self {
        Self::new(MatchBy::Name, Vec::new())
    }

    pub fn contains(&self, workload: &Workload) -> bool {
        let key = match self.by {
            MatchBy::Name => &workload.name,
            MatchBy::Id => &workload.id,
        };
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted entries, for log output.
    pub fn describe(&self) -> String {
        let mut names: Vec<&str> = self.entries.iter().map(String::as_str).collect();
        names.sort_unstable();
        format!("{:?} by {:?}", names, self.by)
    }
}

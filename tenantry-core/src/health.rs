//! Health reports returned by the backing stores.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Whether a store can currently serve registry traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    /// Serving, but slow or partially unavailable.
    Degraded,
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        })
    }
}

/// One store's answer to a health probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub store: String,
    pub status: HealthStatus,
    pub reason: Option<String>,
    /// Time the probe took, when the store measured it.
    pub latency: Option<Duration>,
    /// Store-specific figures such as collection or tenant counts.
    pub details: BTreeMap<String, serde_json::Value>,
}

impl HealthCheck {
    fn with_status(store: impl Into<String>, status: HealthStatus, reason: Option<String>) -> Self {
        Self {
            store: store.into(),
            status,
            reason,
            latency: None,
            details: BTreeMap::new(),
        }
    }

    pub fn healthy(store: impl Into<String>) -> Self {
        Self::with_status(store, HealthStatus::Healthy, None)
    }

    pub fn degraded(store: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_status(store, HealthStatus::Degraded, Some(reason.into()))
    }

    pub fn unhealthy(store: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_status(store, HealthStatus::Unhealthy, Some(reason.into()))
    }

    pub fn measured(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

impl fmt::Display for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.store, self.status)?;
        if let Some(reason) = &self.reason {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}

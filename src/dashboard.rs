//! Read-only dashboard data: monitor statistics, incidents, and site settings.
//!
//! Failed calls surface the backend's `{"error": ...}` text through
//! [`Error::Backend`](crate::Error::Backend); `204 No Content` decodes to an
//! empty value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::HttpBackend;
use crate::error::{Error, Result};
use crate::platform::MonitorId;

/// Statistics window the dashboard opens with, in seconds (24 hours).
pub const DEFAULT_WINDOW_SECS: u64 = 86_400;

/// Site-wide settings served by `GET /config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Page title.
    pub title: String,
    /// Subtitle shown under the title.
    pub description: String,
    /// IANA zone timestamps are displayed in.
    pub timezone: String,
    /// Chart style, e.g. `"line"` or `"status"`.
    pub chart_type: String,
    /// Whether the incidents page is available.
    pub incidents_enabled: bool,
}

/// Response time percentiles in milliseconds; absent without data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Percentiles {
    /// Median.
    pub p50: Option<i64>,
    /// 75th percentile.
    pub p75: Option<i64>,
    /// 90th percentile.
    pub p90: Option<i64>,
    /// 95th percentile.
    pub p95: Option<i64>,
    /// 99th percentile.
    pub p99: Option<i64>,
}

/// One bucket of a monitor's chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDataPoint {
    /// Start of the bucket.
    pub timestamp: DateTime<Utc>,
    /// Average response time in milliseconds.
    #[serde(default)]
    pub response_time: Option<i64>,
    /// Whether the monitor was up.
    #[serde(default)]
    pub is_up: bool,
    /// Share of checks that were up (status charts only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_ratio: Option<f64>,
    /// Share of checks that were degraded (status charts only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_ratio: Option<f64>,
    /// Share of checks that were down (status charts only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_ratio: Option<f64>,
}

/// A monitor with its statistics over the requested window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorStats {
    /// Monitor identifier, as used for push subscriptions.
    pub id: MonitorId,
    /// Display name.
    pub name: String,
    /// Checked URL.
    pub url: String,
    /// Seconds between checks.
    pub check_interval: i64,
    /// Percentage of successful checks, 0-100.
    pub uptime_pct: f64,
    /// Mean response time in milliseconds.
    pub avg_response_time: Option<i64>,
    /// Response time distribution.
    pub percentiles: Percentiles,
    /// Chart buckets, oldest first.
    pub data_points: Vec<ChartDataPoint>,
}

/// A status update posted to an incident.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncidentUpdate {
    /// Update text.
    pub message: String,
    /// Incident status as of this update.
    pub status: String,
    /// When the update was posted.
    pub created_at: DateTime<Utc>,
}

/// A published incident.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Incident {
    /// Slug identifying the incident.
    pub id: String,
    /// Headline.
    pub title: String,
    /// Markdown body.
    pub description: String,
    /// e.g. `"minor"`, `"major"`, `"critical"`.
    pub severity: String,
    /// e.g. `"investigating"`, `"resolved"`.
    pub status: String,
    /// Names of the monitors affected.
    pub affected_monitors: Vec<String>,
    /// When the incident began.
    pub started_at: DateTime<Utc>,
    /// Absent while the incident is ongoing.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Updates, oldest first.
    pub updates: Vec<IncidentUpdate>,
}

impl Incident {
    /// Whether the incident has been resolved.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

impl HttpBackend {
    /// Fetches every monitor's statistics over the last `window_secs` seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it.
    pub async fn monitor_stats(&self, window_secs: u64) -> Result<Vec<MonitorStats>> {
        self.get_json(&format!("/monitors?seconds={window_secs}"))
            .await
    }

    /// Fetches all incidents.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or incidents are not configured.
    pub async fn incidents(&self) -> Result<Vec<Incident>> {
        self.get_json("/incidents").await
    }

    /// Fetches one incident by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] for ids that are not a single path
    /// segment, or the backend's error if the incident does not exist.
    pub async fn incident(&self, id: &str) -> Result<Incident> {
        if id.is_empty() || id.contains(['/', '?', '#']) {
            return Err(Error::InvalidUrl(format!("invalid incident id {id:?}")));
        }
        self.get_json(&format!("/incidents/{id}")).await
    }

    /// Fetches the site settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it.
    pub async fn dashboard_config(&self) -> Result<DashboardConfig> {
        self.get_json("/config").await
    }
}

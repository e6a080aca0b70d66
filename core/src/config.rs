use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::contracts::NoradId;
use crate::scene::orbit::{THREAT_MARKER_CAP, TRAIL_STEPS, TRAIL_STEP_SECONDS};
use crate::scene::sampler::SAMPLE_PERIOD;
use crate::tracking::tracker::{DEFAULT_MAX_POLLS, POLL_INTERVAL};

/// Runtime knobs for the mission-tracking core. Defaults reproduce the dashboard's
/// fixed cadences; a YAML file may override any subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    pub service_url: String,
    pub request_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// `None` polls until the service reports a terminal status.
    pub max_polls: Option<u32>,
    pub sample_period_ms: u64,
    pub trail_steps: u32,
    pub trail_step_seconds: f64,
    pub threat_marker_cap: usize,
    /// NORAD ids sampled for the scene even before any event names them.
    pub protected_assets: Vec<NoradId>,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            service_url: "http://127.0.0.1:8000".into(),
            request_timeout_ms: 30_000,
            poll_interval_ms: POLL_INTERVAL.as_millis() as u64,
            max_polls: Some(DEFAULT_MAX_POLLS),
            sample_period_ms: SAMPLE_PERIOD.as_millis() as u64,
            trail_steps: TRAIL_STEPS,
            trail_step_seconds: TRAIL_STEP_SECONDS,
            threat_marker_cap: THREAT_MARKER_CAP,
            protected_assets: Vec::new(),
        }
    }
}

impl MissionConfig {
    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = url.into();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_cadences() {
        let config = MissionConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(1500));
        assert_eq!(config.sample_period(), Duration::from_secs(5));
        assert_eq!(config.trail_steps, 360);
        assert_eq!(config.trail_step_seconds, 60.0);
        assert_eq!(config.threat_marker_cap, 20);
        assert!(config.protected_assets.is_empty());
    }

    #[test]
    fn partial_documents_keep_defaults() {
        let config: MissionConfig =
            serde_json::from_str(
                r#"{"service_url": "http://ops:9000", "max_polls": null, "protected_assets": [25544]}"#,
            )
            .unwrap();
        assert_eq!(config.protected_assets, vec![25544]);
        assert_eq!(config.service_url, "http://ops:9000");
        assert_eq!(config.max_polls, None);
        assert_eq!(config.poll_interval_ms, 1500);
    }
}

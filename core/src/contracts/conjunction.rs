use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{NoradId, PLACEHOLDER};

/// Discrete risk bucket derived from collision probability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatLevel {
    Critical,
    High,
    Moderate,
    #[default]
    Low,
}

impl ThreatLevel {
    pub const ALL: [ThreatLevel; 4] = [
        ThreatLevel::Critical,
        ThreatLevel::High,
        ThreatLevel::Moderate,
        ThreatLevel::Low,
    ];

    /// Buckets: CRITICAL above 1e-3, HIGH above 1e-4, MODERATE above 1e-5.
    pub fn from_probability(pc: f64) -> Self {
        if pc > 1e-3 {
            ThreatLevel::Critical
        } else if pc > 1e-4 {
            ThreatLevel::High
        } else if pc > 1e-5 {
            ThreatLevel::Moderate
        } else {
            ThreatLevel::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThreatLevel::Critical => "CRITICAL",
            ThreatLevel::High => "HIGH",
            ThreatLevel::Moderate => "MODERATE",
            ThreatLevel::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryObject {
    #[serde(default = "unknown_name")]
    pub name: String,
    pub norad_id: NoradId,
    #[serde(default)]
    pub maneuverable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryObject {
    #[serde(default)]
    pub name: Option<String>,
    pub norad_id: NoradId,
    #[serde(default)]
    pub object_type: Option<String>,
}

/// ECI positions (km) of both objects at the true time of closest approach.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TcaPositions {
    pub primary_eci: [f64; 3],
    pub secondary_eci: [f64; 3],
}

/// One-sigma position uncertainty of both objects in the radial, in-track and
/// cross-track frame, in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionUncertainty {
    pub primary_sigma_radial_m: Option<f64>,
    pub primary_sigma_in_track_m: Option<f64>,
    pub primary_sigma_cross_track_m: Option<f64>,
    pub secondary_sigma_radial_m: Option<f64>,
    pub secondary_sigma_in_track_m: Option<f64>,
    pub secondary_sigma_cross_track_m: Option<f64>,
}

/// Immutable snapshot of one close-approach event.
///
/// List rows leave the analysis fields (time to TCA, miss components and
/// uncertainty) empty; the single-event lookup fills them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conjunction {
    pub id: u64,
    pub primary: PrimaryObject,
    pub secondary: SecondaryObject,
    #[serde(default)]
    pub tca: Option<DateTime<Utc>>,
    #[serde(default)]
    pub miss_distance_m: Option<f64>,
    #[serde(default)]
    pub relative_velocity_kms: Option<f64>,
    #[serde(default)]
    pub collision_probability: Option<f64>,
    #[serde(default)]
    pub threat_level: ThreatLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tca_positions: Option<TcaPositions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_tca_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radial_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_track_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_track_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<PositionUncertainty>,
}

fn unknown_name() -> String {
    "Unknown".to_string()
}

impl Conjunction {
    pub fn secondary_name(&self) -> &str {
        self.secondary.name.as_deref().unwrap_or(PLACEHOLDER)
    }

    pub fn label(&self) -> String {
        format!(
            "{} vs {} [{}]",
            self.primary.name,
            self.secondary_name(),
            self.threat_level.as_str()
        )
    }

    pub fn miss_distance_text(&self) -> String {
        self.miss_distance_m
            .map(|meters| format!("{:.0} m", meters))
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }

    pub fn probability_text(&self) -> String {
        self.collision_probability
            .map(|pc| format!("{:.2e}", pc))
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }

    /// Drops the analysis fields that only the single-event lookup carries.
    pub fn without_detail(mut self) -> Self {
        self.time_to_tca_hours = None;
        self.radial_m = None;
        self.in_track_m = None;
        self.cross_track_m = None;
        self.uncertainty = None;
        self
    }

    /// Radial / in-track / cross-track miss components, when all three are known.
    pub fn miss_components_text(&self) -> String {
        match (self.radial_m, self.in_track_m, self.cross_track_m) {
            (Some(radial), Some(in_track), Some(cross_track)) => format!(
                "R {:.0} m / I {:.0} m / C {:.0} m",
                radial, in_track, cross_track
            ),
            _ => PLACEHOLDER.to_string(),
        }
    }

    pub fn time_to_tca_text(&self) -> String {
        self.time_to_tca_hours
            .map(|hours| format!("{:.1} h", hours))
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }

    pub fn tca_text(&self) -> String {
        self.tca
            .map(|tca| tca.format("%Y-%m-%d %H:%M:%SZ").to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }
}

/// Active-event counts per threat level.
///
/// Levels are kept as plain strings so buckets this client does not know about
/// still decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConjunctionSummary {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub by_level: BTreeMap<String, u64>,
}

impl ConjunctionSummary {
    pub fn from_conjunctions(conjunctions: &[Conjunction]) -> Self {
        let mut by_level: BTreeMap<String, u64> = ThreatLevel::ALL
            .iter()
            .map(|level| (level.as_str().to_string(), 0))
            .collect();
        for conjunction in conjunctions {
            *by_level
                .entry(conjunction.threat_level.as_str().to_string())
                .or_default() += 1;
        }
        Self {
            total: conjunctions.len() as u64,
            by_level,
        }
    }

    pub fn count(&self, level: ThreatLevel) -> u64 {
        self.by_level.get(level.as_str()).copied().unwrap_or(0)
    }
}

//! Orbit trails, the time-of-closest-approach marker and threat markers.

use futures::future::join_all;
use std::collections::HashSet;
use std::f64::consts::TAU;

use crate::contracts::{Conjunction, NoradId, ThreatLevel};
use crate::math::{eci_to_scene, ScenePosition};
use crate::prelude::{MissionError, MissionResult, MissionService};

/// Samples per trail: one revolution for a low orbit at [`TRAIL_STEP_SECONDS`].
pub const TRAIL_STEPS: u32 = 360;
pub const TRAIL_STEP_SECONDS: f64 = 60.0;

/// Pulse phase advance in rad/s.
pub const PULSE_RATE: f64 = 2.0;
pub const PULSE_AMPLITUDE: f64 = 0.3;

/// Upper bound on threat-marker lookups per refresh.
pub const THREAT_MARKER_CAP: usize = 20;

/// Step size of the single-sample threat lookups.
const MARKER_STEP_SECONDS: f64 = 60.0;

#[derive(Debug, Clone, PartialEq)]
pub struct OrbitTrail {
    pub norad_id: NoradId,
    pub points: Vec<ScenePosition>,
}

impl OrbitTrail {
    pub fn first(&self) -> Option<&ScenePosition> {
        self.points.first()
    }
}

/// Encounter points of the primary and secondary object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TcaMarker {
    pub primary: ScenePosition,
    pub secondary: ScenePosition,
    /// Set when the points are the first trail samples rather than true TCA
    /// state vectors.
    pub approximate: bool,
}

impl TcaMarker {
    /// First sample of each trail; needs both trails.
    pub fn from_trails(primary: Option<&OrbitTrail>, secondary: Option<&OrbitTrail>) -> Option<Self> {
        let primary = primary?.first()?;
        let secondary = secondary?.first()?;
        Some(Self {
            primary: *primary,
            secondary: *secondary,
            approximate: true,
        })
    }

    /// Exact positions when the service supplied ECI state at TCA.
    pub fn from_conjunction(conjunction: &Conjunction) -> Option<Self> {
        let positions = conjunction.tca_positions.as_ref()?;
        Some(Self {
            primary: eci_to_scene(positions.primary_eci),
            secondary: eci_to_scene(positions.secondary_eci),
            approximate: false,
        })
    }

    pub fn dashed(&self, dash: f64, gap: f64) -> Vec<(ScenePosition, ScenePosition)> {
        dashed_segments(&self.primary, &self.secondary, dash, gap)
    }
}

/// Splits `a → b` into dashes of length `dash` separated by `gap`.
pub fn dashed_segments(
    a: &ScenePosition,
    b: &ScenePosition,
    dash: f64,
    gap: f64,
) -> Vec<(ScenePosition, ScenePosition)> {
    let span = b - a;
    let length = span.norm();
    if length <= f64::EPSILON {
        return Vec::new();
    }
    if dash <= 0.0 || dash + gap.max(0.0) <= 0.0 {
        return vec![(*a, *b)];
    }

    let direction = span / length;
    let stride = dash + gap.max(0.0);
    let mut segments = Vec::new();
    let mut offset = 0.0;
    while offset < length {
        let end = (offset + dash).min(length);
        segments.push((a + direction * offset, a + direction * end));
        offset += stride;
    }
    segments
}

pub fn pulse_scale(phase: f64) -> f64 {
    1.0 + PULSE_AMPLITUDE * phase.sin()
}

/// Breathing animation applied to the secondary TCA point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PulseAnimation {
    phase: f64,
}

impl PulseAnimation {
    pub fn advance(&mut self, dt_seconds: f64) {
        self.phase = (self.phase + dt_seconds.max(0.0) * PULSE_RATE) % TAU;
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn scale(&self) -> f64 {
        pulse_scale(self.phase)
    }
}

/// Everything drawn for the selected conjunction. Missing trails are omitted.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitGeometry {
    pub conjunction_id: u64,
    pub primary: Option<OrbitTrail>,
    pub secondary: Option<OrbitTrail>,
    pub tca: Option<TcaMarker>,
    /// Full analysis of the event, once the single-event lookup has answered.
    pub detail: Option<Conjunction>,
}

impl OrbitGeometry {
    /// Adopts the looked-up event; its TCA state vectors replace the
    /// first-sample approximation.
    pub fn apply_detail(&mut self, detail: Conjunction) {
        if let Some(marker) = TcaMarker::from_conjunction(&detail) {
            self.tca = Some(marker);
        }
        self.detail = Some(detail);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreatMarker {
    pub norad_id: NoradId,
    pub name: String,
    pub threat_level: ThreatLevel,
    pub position: ScenePosition,
}

/// Render state owned by the scene: selection geometry, threat markers and the pulse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrbitVisualizationRenderer {
    geometry: Option<OrbitGeometry>,
    threats: Vec<ThreatMarker>,
    pulse: PulseAnimation,
}

impl OrbitVisualizationRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_geometry(&mut self, geometry: OrbitGeometry) {
        self.geometry = Some(geometry);
    }

    pub fn clear_geometry(&mut self) {
        self.geometry = None;
    }

    pub fn geometry(&self) -> Option<&OrbitGeometry> {
        self.geometry.as_ref()
    }

    pub fn set_threats(&mut self, threats: Vec<ThreatMarker>) {
        self.threats = threats;
    }

    pub fn threats(&self) -> &[ThreatMarker] {
        &self.threats
    }

    pub fn advance(&mut self, dt_seconds: f64) {
        self.pulse.advance(dt_seconds);
    }

    pub fn pulse_scale(&self) -> f64 {
        self.pulse.scale()
    }
}

pub async fn fetch_trail(
    service: &dyn MissionService,
    norad_id: NoradId,
    steps: u32,
    step_seconds: f64,
) -> MissionResult<OrbitTrail> {
    let response = service.propagate(norad_id, steps, step_seconds).await?;
    Ok(OrbitTrail {
        norad_id,
        points: response
            .points
            .iter()
            .map(|point| point.geodetic().to_scene())
            .collect(),
    })
}

/// Fetches both trails concurrently. Failed trails are left out of the geometry
/// and handed back so the caller can log them.
pub async fn build_geometry(
    service: &dyn MissionService,
    conjunction: &Conjunction,
    steps: u32,
    step_seconds: f64,
) -> (OrbitGeometry, Vec<MissionError>) {
    let (primary, secondary) = tokio::join!(
        fetch_trail(service, conjunction.primary.norad_id, steps, step_seconds),
        fetch_trail(service, conjunction.secondary.norad_id, steps, step_seconds),
    );

    let mut failures = Vec::new();
    let primary = primary.map_err(|err| failures.push(err)).ok();
    let secondary = secondary.map_err(|err| failures.push(err)).ok();

    let tca = TcaMarker::from_conjunction(conjunction)
        .or_else(|| TcaMarker::from_trails(primary.as_ref(), secondary.as_ref()));

    (
        OrbitGeometry {
            conjunction_id: conjunction.id,
            primary,
            secondary,
            tca,
            detail: None,
        },
        failures,
    )
}

/// Unique secondary objects in list order, at most `cap` of them.
pub fn threat_candidates(conjunctions: &[Conjunction], cap: usize) -> Vec<&Conjunction> {
    let mut seen = HashSet::new();
    conjunctions
        .iter()
        .filter(|conjunction| seen.insert(conjunction.secondary.norad_id))
        .take(cap)
        .collect()
}

/// One position lookup per candidate, all in flight together. Each entry is
/// independent; callers keep the successes.
pub async fn sample_threat_markers(
    service: &dyn MissionService,
    conjunctions: &[Conjunction],
    cap: usize,
) -> Vec<MissionResult<ThreatMarker>> {
    let lookups = threat_candidates(conjunctions, cap)
        .into_iter()
        .map(|conjunction| locate_threat(service, conjunction));
    join_all(lookups).await
}

async fn locate_threat(
    service: &dyn MissionService,
    conjunction: &Conjunction,
) -> MissionResult<ThreatMarker> {
    let norad_id = conjunction.secondary.norad_id;
    let response = service.propagate(norad_id, 1, MARKER_STEP_SECONDS).await?;
    let point = response.points.first().ok_or_else(|| {
        MissionError::Decode(format!("no position returned for NORAD {}", norad_id))
    })?;
    Ok(ThreatMarker {
        norad_id,
        name: conjunction.secondary_name().to_string(),
        threat_level: conjunction.threat_level,
        position: point.geodetic().to_scene(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::TcaPositions;
    use crate::math::EARTH_RADIUS_KM;
    use crate::testing::{sample_conjunction, ScriptedService};
    use nalgebra::Vector3;

    const EPS: f64 = 1e-9;

    #[test]
    fn pulse_scale_stays_within_amplitude() {
        let mut phase = -20.0;
        while phase <= 20.0 {
            let scale = pulse_scale(phase);
            assert!((0.7 - EPS..=1.3 + EPS).contains(&scale), "phase {phase}: {scale}");
            phase += 0.01;
        }

        let mut pulse = PulseAnimation::default();
        for _ in 0..1000 {
            pulse.advance(1.0 / 60.0);
            assert!((0.7 - EPS..=1.3 + EPS).contains(&pulse.scale()));
            assert!((0.0..TAU).contains(&pulse.phase()));
        }
    }

    #[test]
    fn pulse_period_is_pi_seconds() {
        let mut pulse = PulseAnimation::default();
        pulse.advance(std::f64::consts::FRAC_PI_4);
        assert!((pulse.scale() - 1.3).abs() < EPS);
    }

    #[test]
    fn dashes_cover_the_segment_with_gaps() {
        let a = Vector3::zeros();
        let b = Vector3::new(1.0, 0.0, 0.0);
        let dashes = dashed_segments(&a, &b, 0.2, 0.1);
        assert_eq!(dashes.len(), 4);
        assert!((dashes[1].0.x - 0.3).abs() < EPS);
        assert!((dashes[3].1.x - 1.0).abs() < EPS);

        assert!(dashed_segments(&a, &a, 0.2, 0.1).is_empty());
        assert_eq!(dashed_segments(&a, &b, 0.0, 0.1), vec![(a, b)]);
    }

    #[test]
    fn candidates_are_unique_and_capped() {
        let mut conjunctions: Vec<Conjunction> = (0..30)
            .map(|i| sample_conjunction(i, 25544, 40000 + i as NoradId, ThreatLevel::Low))
            .collect();
        conjunctions.insert(1, sample_conjunction(99, 20580, 40000, ThreatLevel::High));

        let candidates = threat_candidates(&conjunctions, THREAT_MARKER_CAP);
        assert_eq!(candidates.len(), 20);
        let ids: HashSet<NoradId> = candidates.iter().map(|c| c.secondary.norad_id).collect();
        assert_eq!(ids.len(), 20);
        assert_eq!(candidates[1].secondary.norad_id, 40001);
    }

    #[tokio::test]
    async fn failed_threat_lookups_are_reported_individually() {
        let service = ScriptedService::new();
        service.fail_object(48078);
        let conjunctions = vec![
            sample_conjunction(1, 25544, 48078, ThreatLevel::Critical),
            sample_conjunction(2, 25544, 22675, ThreatLevel::Moderate),
        ];

        let results = sample_threat_markers(&service, &conjunctions, THREAT_MARKER_CAP).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        let marker = results[1].as_ref().unwrap();
        assert_eq!(marker.norad_id, 22675);
        assert_eq!(marker.threat_level, ThreatLevel::Moderate);
        assert_eq!(service.calls().propagations_of(22675, 1), 1);
    }

    #[tokio::test]
    async fn geometry_uses_first_samples_as_tca_approximation() {
        let service = ScriptedService::new();
        let conjunction = sample_conjunction(5, 25544, 48078, ThreatLevel::High);

        let (geometry, failures) =
            build_geometry(&service, &conjunction, TRAIL_STEPS, TRAIL_STEP_SECONDS).await;
        assert!(failures.is_empty());
        let primary = geometry.primary.as_ref().unwrap();
        assert_eq!(primary.points.len(), 360);
        let tca = geometry.tca.unwrap();
        assert!(tca.approximate);
        assert_eq!(tca.primary, primary.points[0]);
        assert_eq!(tca.secondary, geometry.secondary.as_ref().unwrap().points[0]);
        assert_eq!(service.calls().propagations_of(48078, TRAIL_STEPS), 1);
    }

    #[tokio::test]
    async fn service_tca_positions_take_precedence() {
        let service = ScriptedService::new();
        let mut conjunction = sample_conjunction(5, 25544, 48078, ThreatLevel::High);
        conjunction.tca_positions = Some(TcaPositions {
            primary_eci: [EARTH_RADIUS_KM, 0.0, 0.0],
            secondary_eci: [0.0, 0.0, 2.0 * EARTH_RADIUS_KM],
        });

        let (geometry, _) = build_geometry(&service, &conjunction, 10, 60.0).await;
        let tca = geometry.tca.unwrap();
        assert!(!tca.approximate);
        assert!((tca.primary - Vector3::new(1.0, 0.0, 0.0)).norm() < EPS);
        assert!((tca.secondary - Vector3::new(0.0, 2.0, 0.0)).norm() < EPS);
    }

    #[tokio::test]
    async fn one_failed_trail_keeps_the_other() {
        let service = ScriptedService::new();
        service.fail_object(48078);
        let conjunction = sample_conjunction(5, 25544, 48078, ThreatLevel::High);

        let (geometry, failures) = build_geometry(&service, &conjunction, 10, 60.0).await;
        assert_eq!(failures.len(), 1);
        assert!(geometry.primary.is_some());
        assert!(geometry.secondary.is_none());
        assert!(geometry.tca.is_none());
    }
}

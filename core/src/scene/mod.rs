//! The 3D mission scene: camera, orbit geometry, threat markers and asset positions.
//!
//! Selection changes stamp every fetch with a [`SelectionToken`]; results that
//! arrive after a newer selection are dropped instead of applied.

pub mod camera;
pub mod orbit;
pub mod sampler;
pub mod selection;

pub use camera::{locate_focus, CameraFlight, CameraFlightController, CameraPose, Projected};
pub use orbit::{
    build_geometry, dashed_segments, fetch_trail, pulse_scale, sample_threat_markers,
    threat_candidates, OrbitGeometry, OrbitTrail, OrbitVisualizationRenderer, PulseAnimation,
    TcaMarker, ThreatMarker,
};
pub use sampler::{AssetPositionSampler, PositionMap, SAMPLE_PERIOD};
pub use selection::{SelectionState, SelectionToken};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::MissionConfig;
use crate::contracts::Conjunction;
use crate::telemetry::{LogManager, MetricsRecorder};
use crate::prelude::MissionService;

/// Everything the host needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    pub camera: CameraPose,
    pub flight_progress: Option<f64>,
    pub selected: Option<u64>,
    pub geometry: Option<OrbitGeometry>,
    pub threats: Vec<ThreatMarker>,
    pub pulse_scale: f64,
}

/// Coordinates camera flights and orbit geometry around the selected conjunction.
pub struct MissionScene {
    service: Arc<dyn MissionService>,
    selection: SelectionState,
    camera: Mutex<CameraFlightController>,
    renderer: Mutex<OrbitVisualizationRenderer>,
    threat_round: AtomicU64,
    trail_steps: u32,
    trail_step_seconds: f64,
    threat_marker_cap: usize,
    logger: LogManager,
    metrics: Arc<MetricsRecorder>,
}

impl MissionScene {
    pub fn new(
        service: Arc<dyn MissionService>,
        config: &MissionConfig,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            service,
            selection: SelectionState::new(),
            camera: Mutex::new(CameraFlightController::default()),
            renderer: Mutex::new(OrbitVisualizationRenderer::new()),
            threat_round: AtomicU64::new(0),
            trail_steps: config.trail_steps,
            trail_step_seconds: config.trail_step_seconds,
            threat_marker_cap: config.threat_marker_cap,
            logger: LogManager::new("mission-scene"),
            metrics,
        }
    }

    fn camera(&self) -> MutexGuard<'_, CameraFlightController> {
        self.camera.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn renderer(&self) -> MutexGuard<'_, OrbitVisualizationRenderer> {
        self.renderer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn selected(&self) -> Option<u64> {
        self.selection.current()
    }

    /// Focuses the scene on `conjunction`.
    ///
    /// The camera focus lookup, both trail fetches and the single-event lookup run
    /// concurrently; each result is applied only if no newer selection happened
    /// meanwhile. Reselecting the current conjunction does nothing unless its last
    /// attempt lost the focus or a trail, in which case everything is fetched again.
    pub async fn select(&self, conjunction: &Conjunction) -> SelectionToken {
        let Some(token) = self.selection.select(conjunction.id) else {
            return self.selection.token();
        };
        self.renderer().clear_geometry();
        self.logger
            .record(&format!("selected conjunction {}", conjunction.label()));

        let camera = async {
            let norad_id = conjunction.primary.norad_id;
            match locate_focus(self.service.as_ref(), norad_id).await {
                Ok(point) if self.selection.is_current(token) => {
                    self.camera().fly_to(CameraPose::focusing(point));
                }
                Ok(_) => self.logger.detail(&format!(
                    "discarding focus for NORAD {} from superseded selection",
                    norad_id
                )),
                Err(err) => {
                    self.selection.mark_incomplete(token);
                    self.visualization_failure(&format!(
                        "focus lookup for NORAD {} failed: {}",
                        norad_id, err
                    ));
                }
            }
        };

        let orbits = async {
            let ((mut geometry, failures), detail) = tokio::join!(
                build_geometry(
                    self.service.as_ref(),
                    conjunction,
                    self.trail_steps,
                    self.trail_step_seconds,
                ),
                self.service.conjunction(conjunction.id),
            );
            if !failures.is_empty() {
                self.selection.mark_incomplete(token);
            }
            for err in failures {
                self.visualization_failure(&format!("trail fetch failed: {}", err));
            }
            match detail {
                Ok(detail) => geometry.apply_detail(detail),
                Err(err) => self.visualization_failure(&format!(
                    "detail lookup for conjunction {} failed: {}",
                    conjunction.id, err
                )),
            }
            if self.selection.is_current(token) {
                self.renderer().set_geometry(geometry);
            } else {
                self.logger.detail(&format!(
                    "discarding trails for superseded conjunction {}",
                    conjunction.id
                ));
            }
        };

        tokio::join!(camera, orbits);
        token
    }

    /// Drops the selection; in-flight fetches for it are discarded on arrival.
    pub fn clear_selection(&self) {
        self.selection.clear();
        self.renderer().clear_geometry();
    }

    /// Re-samples threat markers for the current conjunction list. Failed lookups
    /// are logged and counted, and their markers are left out. Returns the number
    /// of markers published, or `None` if a newer refresh overtook this one.
    pub async fn refresh_threats(&self, conjunctions: &[Conjunction]) -> Option<usize> {
        let round = self.threat_round.fetch_add(1, Ordering::SeqCst) + 1;
        let results =
            sample_threat_markers(self.service.as_ref(), conjunctions, self.threat_marker_cap)
                .await;

        let mut markers = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(marker) => markers.push(marker),
                Err(err) => self.visualization_failure(&format!("threat marker lookup failed: {}", err)),
            }
        }

        if self.threat_round.load(Ordering::SeqCst) != round {
            return None;
        }
        let count = markers.len();
        self.renderer().set_threats(markers);
        Some(count)
    }

    /// Per-frame tick: advances the camera flight and the pulse, then snapshots.
    pub fn advance_frame(&self, dt_seconds: f64) -> FrameState {
        self.camera().advance(dt_seconds);
        self.renderer().advance(dt_seconds);
        self.frame()
    }

    pub fn frame(&self) -> FrameState {
        let (camera, flight_progress) = {
            let controller = self.camera();
            (controller.pose(), controller.flight().map(|flight| flight.progress))
        };
        let renderer = self.renderer();
        FrameState {
            camera,
            flight_progress,
            selected: self.selection.current(),
            geometry: renderer.geometry().cloned(),
            threats: renderer.threats().to_vec(),
            pulse_scale: renderer.pulse_scale(),
        }
    }

    pub fn flights_started(&self) -> u64 {
        self.camera().flights_started()
    }

    fn visualization_failure(&self, message: &str) {
        self.logger.degraded(message);
        self.metrics.record_visualization_failure();
    }
}

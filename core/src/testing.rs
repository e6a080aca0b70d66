//! Scripted in-memory [`MissionService`] for exercising the core without a network.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::contracts::{
    BatchPropagationResponse, Conjunction, ConjunctionSummary, JobStatusResponse, NoradId,
    PrimaryObject, PropagationPoint, PropagationResponse, SatelliteFix, ScreeningRequest,
    SecondaryObject, StartScreeningResponse, ThreatLevel,
};
use crate::prelude::{MissionError, MissionResult, MissionService};

/// Every call the service has seen, in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallLog {
    pub starts: usize,
    pub start_requests: Vec<ScreeningRequest>,
    pub status_polls: Vec<String>,
    /// `(norad_id, steps)` per single-object propagation.
    pub propagations: Vec<(NoradId, u32)>,
    pub batches: Vec<Vec<NoradId>>,
    pub list_conjunctions: usize,
    pub summaries: usize,
    pub conjunction_lookups: usize,
}

impl CallLog {
    pub fn propagations_of(&self, norad_id: NoradId, steps: u32) -> usize {
        self.propagations
            .iter()
            .filter(|(id, count)| *id == norad_id && *count == steps)
            .count()
    }
}

#[derive(Default)]
struct Script {
    starts: VecDeque<MissionResult<StartScreeningResponse>>,
    statuses: VecDeque<MissionResult<JobStatusResponse>>,
    repeat_status: Option<JobStatusResponse>,
    conjunctions: Vec<Conjunction>,
    fail_list: bool,
    failing: HashSet<NoradId>,
    delays: HashMap<NoradId, Duration>,
    batch_failure: Option<String>,
    calls: CallLog,
}

/// Replays queued responses and synthesizes propagation samples.
#[derive(Default)]
pub struct ScriptedService {
    script: Mutex<Script>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_start(&self, response: MissionResult<StartScreeningResponse>) {
        self.script().starts.push_back(response);
    }

    pub fn push_status(&self, response: MissionResult<JobStatusResponse>) {
        self.script().statuses.push_back(response);
    }

    /// Served once the status queue is empty.
    pub fn repeat_status(&self, response: JobStatusResponse) {
        self.script().repeat_status = Some(response);
    }

    pub fn set_conjunctions(&self, conjunctions: Vec<Conjunction>) {
        self.script().conjunctions = conjunctions;
    }

    pub fn fail_conjunction_list(&self, fail: bool) {
        self.script().fail_list = fail;
    }

    pub fn fail_object(&self, norad_id: NoradId) {
        self.script().failing.insert(norad_id);
    }

    pub fn restore_object(&self, norad_id: NoradId) {
        self.script().failing.remove(&norad_id);
    }

    pub fn fail_batches(&self, message: Option<&str>) {
        self.script().batch_failure = message.map(str::to_string);
    }

    /// Delays every single-object propagation of `norad_id`.
    pub fn delay_object(&self, norad_id: NoradId, delay: Duration) {
        self.script().delays.insert(norad_id, delay);
    }

    pub fn calls(&self) -> CallLog {
        self.script().calls.clone()
    }
}

/// Deterministic ground-track sample `index` for `norad_id`.
pub fn synthetic_point(norad_id: NoradId, index: u32) -> PropagationPoint {
    let inclination = f64::from(norad_id % 80) + 5.0;
    let angle = f64::from(index) * 0.3 + f64::from(norad_id % 360);
    PropagationPoint {
        datetime_utc: None,
        latitude: inclination * angle.to_radians().sin(),
        longitude: ((angle * 1.7 + 180.0) % 360.0) - 180.0,
        altitude_km: 400.0 + f64::from(norad_id % 500),
        position_eci: Vec::new(),
    }
}

pub fn sample_conjunction(
    id: u64,
    primary: NoradId,
    secondary: NoradId,
    threat_level: ThreatLevel,
) -> Conjunction {
    Conjunction {
        id,
        primary: PrimaryObject {
            name: format!("ASSET {}", primary),
            norad_id: primary,
            maneuverable: true,
        },
        secondary: SecondaryObject {
            name: Some(format!("OBJECT {}", secondary)),
            norad_id: secondary,
            object_type: Some("DEBRIS".to_string()),
        },
        tca: None,
        miss_distance_m: Some(850.0),
        relative_velocity_kms: Some(11.2),
        collision_probability: Some(2.5e-4),
        threat_level,
        tca_positions: None,
        time_to_tca_hours: None,
        radial_m: None,
        in_track_m: None,
        cross_track_m: None,
        uncertainty: None,
    }
}

#[async_trait]
impl MissionService for ScriptedService {
    async fn start_screening(
        &self,
        request: &ScreeningRequest,
    ) -> MissionResult<StartScreeningResponse> {
        let mut script = self.script();
        script.calls.starts += 1;
        script.calls.start_requests.push(request.clone());
        script
            .starts
            .pop_front()
            .unwrap_or_else(|| Ok(StartScreeningResponse::default()))
    }

    async fn screening_status(&self, job_id: &str) -> MissionResult<JobStatusResponse> {
        let mut script = self.script();
        script.calls.status_polls.push(job_id.to_string());
        if let Some(next) = script.statuses.pop_front() {
            return next;
        }
        script
            .repeat_status
            .clone()
            .map(Ok)
            .unwrap_or_else(|| Err(MissionError::Transport("status script exhausted".into())))
    }

    async fn propagate(
        &self,
        norad_id: NoradId,
        steps: u32,
        _step_seconds: f64,
    ) -> MissionResult<PropagationResponse> {
        let (delay, failing) = {
            let mut script = self.script();
            script.calls.propagations.push((norad_id, steps));
            (
                script.delays.get(&norad_id).copied(),
                script.failing.contains(&norad_id),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(MissionError::Service {
                status: 404,
                body: format!("TLE not found for NORAD {}", norad_id),
            });
        }
        Ok(PropagationResponse {
            norad_id: Some(norad_id),
            name: None,
            points: (0..steps.max(1))
                .map(|index| synthetic_point(norad_id, index))
                .collect(),
        })
    }

    async fn propagate_batch(
        &self,
        norad_ids: &[NoradId],
    ) -> MissionResult<BatchPropagationResponse> {
        let mut script = self.script();
        script.calls.batches.push(norad_ids.to_vec());
        if let Some(message) = &script.batch_failure {
            return Err(MissionError::Transport(message.clone()));
        }
        let satellites = norad_ids
            .iter()
            .filter(|id| !script.failing.contains(*id))
            .map(|&norad_id| {
                let point = synthetic_point(norad_id, 0);
                SatelliteFix {
                    norad_id,
                    name: None,
                    latitude: point.latitude,
                    longitude: point.longitude,
                    altitude_km: point.altitude_km,
                }
            })
            .collect();
        Ok(BatchPropagationResponse {
            datetime_utc: None,
            satellites,
        })
    }

    async fn list_conjunctions(&self) -> MissionResult<Vec<Conjunction>> {
        let mut script = self.script();
        script.calls.list_conjunctions += 1;
        if script.fail_list {
            return Err(MissionError::Transport("conjunction list unavailable".into()));
        }
        Ok(script.conjunctions.clone())
    }

    async fn conjunction(&self, id: u64) -> MissionResult<Conjunction> {
        let mut script = self.script();
        script.calls.conjunction_lookups += 1;
        script
            .conjunctions
            .iter()
            .find(|conjunction| conjunction.id == id)
            .cloned()
            .ok_or_else(|| MissionError::Service {
                status: 404,
                body: format!("conjunction {} not found", id),
            })
    }

    async fn conjunction_summary(&self) -> MissionResult<ConjunctionSummary> {
        let mut script = self.script();
        script.calls.summaries += 1;
        Ok(ConjunctionSummary::from_conjunctions(&script.conjunctions))
    }
}

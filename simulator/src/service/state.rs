use chrono::{DateTime, TimeDelta, Utc};
use conjcore::contracts::{
    BatchPropagationResponse, Conjunction, ConjunctionSummary, JobStatusResponse, NoradId,
    PropagationResponse, SatelliteFix, ScreeningRequest, ThreatLevel,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

use crate::generator::catalog::Catalog;
use crate::workflow::config::{AssetSpec, ServiceConfig};
use crate::workflow::runner::ScreeningSimulation;

/// Largest propagation the service will run in one request.
pub const MAX_PROPAGATION_STEPS: u32 = 1000;
/// Widest spacing between propagation samples: thirty days.
pub const MAX_STEP_SECONDS: f64 = 30.0 * 86_400.0;

#[derive(Debug, Error, PartialEq)]
pub enum ServiceError {
    #[error("No assets to screen")]
    NoAssets,
    #[error("TLE not found for NORAD {0}")]
    UnknownObject(NoradId),
    #[error("steps must be between 1 and 1000, got {0}")]
    InvalidSteps(u32),
    #[error("step_seconds must be above 0 and at most 2592000, got {0}")]
    InvalidStepSeconds(f64),
    #[error("Job not found")]
    UnknownJob(u64),
    #[error("Conjunction event not found")]
    UnknownConjunction(u64),
}

impl ServiceError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::NoAssets => 400,
            ServiceError::InvalidSteps(_) | ServiceError::InvalidStepSeconds(_) => 422,
            ServiceError::UnknownObject(_)
            | ServiceError::UnknownJob(_)
            | ServiceError::UnknownConjunction(_) => 404,
        }
    }
}

/// One job accepted by `start_screening`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedJob {
    pub job_id: u64,
    pub asset_id: u64,
    pub status: String,
}

/// Filters for the event list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConjunctionQuery {
    pub threat_level: Option<ThreatLevel>,
    pub asset_id: Option<u64>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

const DEFAULT_LIST_LIMIT: usize = 100;
const MAX_LIST_LIMIT: usize = 1000;

struct StoredEvent {
    job_id: u64,
    asset_id: u64,
    conjunction: Conjunction,
}

/// Everything the simulated service knows: catalog, jobs and published events.
pub struct ServiceState {
    config: ServiceConfig,
    catalog: Catalog,
    jobs: RwLock<HashMap<u64, JobStatusResponse>>,
    events: RwLock<Vec<StoredEvent>>,
    next_job: AtomicU64,
    next_event: AtomicU64,
}

impl ServiceState {
    pub fn new(config: ServiceConfig) -> Arc<Self> {
        let catalog = Catalog::synthetic(config.catalog_size, config.seed, &config.assets);
        info!(
            "catalog ready: {} objects, {} assets",
            catalog.len(),
            config.assets.len()
        );
        if catalog.is_empty() {
            warn!("screening catalog is empty; every job will fail");
        }
        Arc::new(Self {
            config,
            catalog,
            jobs: RwLock::new(HashMap::new()),
            events: RwLock::new(Vec::new()),
            next_job: AtomicU64::new(1),
            next_event: AtomicU64::new(1),
        })
    }

    /// Starts one job per requested asset; an empty list screens every asset.
    ///
    /// Unknown asset ids are skipped. Must be called inside a tokio runtime, since
    /// each job advances on its own task.
    pub fn start_screening(
        self: &Arc<Self>,
        request: &ScreeningRequest,
    ) -> Result<Vec<AcceptedJob>, ServiceError> {
        let assets: Vec<AssetSpec> = if request.asset_ids.is_empty() {
            self.config.assets.clone()
        } else {
            request
                .asset_ids
                .iter()
                .filter_map(|id| self.config.asset(*id).cloned())
                .collect()
        };
        if assets.is_empty() {
            return Err(ServiceError::NoAssets);
        }

        let started = Utc::now();
        let accepted = assets
            .iter()
            .map(|asset| {
                let job_id = self.next_job.fetch_add(1, Ordering::SeqCst);
                let simulation = ScreeningSimulation::plan(
                    job_id,
                    asset,
                    request,
                    &self.catalog,
                    &self.config,
                    started,
                );
                let status = simulation.status().status.as_str().to_string();
                self.record_status(job_id, simulation.status().clone());
                info!(
                    "job {} screening {} ({} days, {} km)",
                    job_id, asset.name, request.time_window_days, request.distance_threshold_km
                );
                tokio::spawn(drive(Arc::clone(self), simulation, asset.id));
                AcceptedJob {
                    job_id,
                    asset_id: asset.id,
                    status,
                }
            })
            .collect();
        Ok(accepted)
    }

    pub fn job_status(&self, job_id: u64) -> Result<JobStatusResponse, ServiceError> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&job_id)
            .cloned()
            .ok_or(ServiceError::UnknownJob(job_id))
    }

    fn record_status(&self, job_id: u64, status: JobStatusResponse) {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id, status);
    }

    fn publish(&self, job_id: u64, asset_id: u64, conjunctions: Vec<Conjunction>) {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        events.extend(conjunctions.into_iter().map(|conjunction| StoredEvent {
            job_id,
            asset_id,
            conjunction,
        }));
    }

    fn next_event_id(&self) -> u64 {
        self.next_event.fetch_add(1, Ordering::SeqCst)
    }

    /// `steps` samples, `step_seconds` apart, starting now.
    pub fn propagate(
        &self,
        norad_id: NoradId,
        steps: u32,
        step_seconds: f64,
    ) -> Result<PropagationResponse, ServiceError> {
        if steps == 0 || steps > MAX_PROPAGATION_STEPS {
            return Err(ServiceError::InvalidSteps(steps));
        }
        let object = self
            .catalog
            .get(norad_id)
            .ok_or(ServiceError::UnknownObject(norad_id))?;
        let invalid_step = || ServiceError::InvalidStepSeconds(step_seconds);
        if !step_seconds.is_finite() || step_seconds <= 0.0 || step_seconds > MAX_STEP_SECONDS {
            return Err(invalid_step());
        }
        let step = TimeDelta::try_milliseconds((step_seconds * 1000.0).round() as i64)
            .ok_or_else(invalid_step)?;
        let start = Utc::now();
        let points = (0..steps)
            .map(|index| {
                i32::try_from(index)
                    .ok()
                    .and_then(|index| step.checked_mul(index))
                    .and_then(|offset| start.checked_add_signed(offset))
                    .map(|at| object.orbit.sample(at))
                    .ok_or_else(invalid_step)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PropagationResponse {
            norad_id: Some(norad_id),
            name: Some(object.name.clone()),
            points,
        })
    }

    /// Current fixes for every known id; unknown ids are left out.
    pub fn propagate_batch(&self, norad_ids: &[NoradId]) -> BatchPropagationResponse {
        let now = Utc::now();
        let satellites = norad_ids
            .iter()
            .filter_map(|id| {
                let object = self.catalog.get(*id);
                if object.is_none() {
                    warn!("batch propagation skipped unknown NORAD {}", id);
                }
                object
            })
            .map(|object| {
                let (latitude, longitude, altitude_km) = object.orbit.geodetic_at(now);
                SatelliteFix {
                    norad_id: object.norad_id,
                    name: Some(object.name.clone()),
                    latitude,
                    longitude,
                    altitude_km,
                }
            })
            .collect();
        BatchPropagationResponse {
            datetime_utc: Some(now.to_rfc3339()),
            satellites,
        }
    }

    /// Most severe first, then soonest TCA.
    pub fn conjunctions(&self, query: &ConjunctionQuery) -> Vec<Conjunction> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        let mut selected: Vec<Conjunction> = events
            .iter()
            .filter(|event| query.asset_id.map_or(true, |id| event.asset_id == id))
            .map(|event| &event.conjunction)
            .filter(|c| query.threat_level.map_or(true, |level| c.threat_level == level))
            .map(|c| self.list_row(c))
            .collect();
        selected.sort_by(|a, b| a.threat_level.cmp(&b.threat_level).then(a.tca.cmp(&b.tca)));
        let limit = query
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .min(MAX_LIST_LIMIT);
        selected.into_iter().skip(query.offset).take(limit).collect()
    }

    pub fn conjunction(&self, id: u64) -> Result<Conjunction, ServiceError> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|event| event.conjunction.id == id)
            .map(|event| with_time_to_tca(event.conjunction.clone(), Utc::now()))
            .ok_or(ServiceError::UnknownConjunction(id))
    }

    /// Event as it appears in lists: no analysis fields, and TCA state vectors
    /// only when configured.
    fn list_row(&self, conjunction: &Conjunction) -> Conjunction {
        let mut row = conjunction.clone().without_detail();
        if !self.config.report_tca_positions {
            row.tca_positions = None;
        }
        row
    }

    /// Events found by one job, highest probability first.
    pub fn job_results(&self, job_id: u64) -> Vec<Conjunction> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        let mut found: Vec<Conjunction> = events
            .iter()
            .filter(|event| event.job_id == job_id)
            .map(|event| self.list_row(&event.conjunction))
            .collect();
        found.sort_by(|a, b| {
            b.collision_probability
                .unwrap_or(0.0)
                .total_cmp(&a.collision_probability.unwrap_or(0.0))
        });
        found
    }

    pub fn summary(&self) -> ConjunctionSummary {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        let conjunctions: Vec<Conjunction> =
            events.iter().map(|event| event.conjunction.clone()).collect();
        ConjunctionSummary::from_conjunctions(&conjunctions)
    }
}

/// Hours until TCA, floored at zero once it has passed.
fn with_time_to_tca(mut conjunction: Conjunction, now: DateTime<Utc>) -> Conjunction {
    conjunction.time_to_tca_hours = conjunction.tca.map(|tca| {
        let seconds = (tca - now).num_milliseconds() as f64 / 1000.0;
        (seconds / 3600.0).max(0.0)
    });
    conjunction
}

/// Advances one job every tick until it reaches a terminal status.
///
/// Events are published before the COMPLETED status, so a client that refreshes
/// on completion always sees them.
async fn drive(state: Arc<ServiceState>, mut simulation: ScreeningSimulation, asset_id: u64) {
    let job_id = simulation.job_id();
    let mut ticker = tokio::time::interval(state.config.job_tick());
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let status = simulation.advance().clone();
        if simulation.is_terminal() {
            let found = simulation.conjunctions(|| state.next_event_id());
            let count = found.len();
            state.publish(job_id, asset_id, found);
            info!(
                "job {} finished {} with {} events",
                job_id,
                status.status.as_str(),
                count
            );
            state.record_status(job_id, status);
            break;
        }
        state.record_status(job_id, status);
    }
}

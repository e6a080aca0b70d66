use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;

use crate::config::MissionConfig;
use crate::contracts::{JobId, ScreeningRequest};
use crate::prelude::{MissionError, MissionResult, MissionService};
use crate::scheduling::{FirstTick, PeriodicTask, TickFlow};
use crate::telemetry::{LogManager, MetricsRecorder};
use crate::tracking::board::ConjunctionBoard;
use crate::tracking::job::{ScreeningJob, Transition, NO_JOBS_CREATED};

/// Fixed poll cadence for an in-flight screening job.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Polls before the tracker stops watching (about ten minutes at the fixed cadence).
pub const DEFAULT_MAX_POLLS: u32 = 400;

/// Contents of the single job slot.
///
/// `generation` increases on every start request; a poll loop only writes to the
/// slot while its captured generation is still current.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackedJob {
    pub generation: u64,
    pub job: Option<ScreeningJob>,
}

struct JobSlot {
    state: watch::Sender<TrackedJob>,
}

impl JobSlot {
    fn new() -> Self {
        let (state, _) = watch::channel(TrackedJob::default());
        Self { state }
    }

    /// Clears the slot for a new start request and returns its generation.
    fn begin(&self) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|slot| {
            slot.generation += 1;
            slot.job = None;
            generation = slot.generation;
        });
        generation
    }

    fn install(&self, generation: u64, job: ScreeningJob) -> bool {
        self.state.send_if_modified(|slot| {
            if slot.generation != generation {
                return false;
            }
            slot.job = Some(job);
            true
        })
    }

    /// Applies `update` to the job if `generation` still owns the slot.
    fn modify<R>(&self, generation: u64, update: impl FnOnce(&mut ScreeningJob) -> R) -> Option<R> {
        let mut outcome = None;
        self.state.send_if_modified(|slot| {
            if slot.generation != generation {
                return false;
            }
            match slot.job.as_mut() {
                Some(job) => {
                    outcome = Some(update(job));
                    true
                }
                None => false,
            }
        });
        outcome
    }
}

/// Drives one screening computation on the external service and republishes its
/// state after every poll.
///
/// Exactly one job is tracked; a new start replaces it and abandons the previous
/// poll loop.
#[derive(Clone)]
pub struct ScreeningJobTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    service: Arc<dyn MissionService>,
    board: Arc<ConjunctionBoard>,
    slot: JobSlot,
    poll_task: Mutex<Option<PeriodicTask>>,
    poll_interval: Duration,
    max_polls: Option<u32>,
    logger: LogManager,
    metrics: Arc<MetricsRecorder>,
}

impl ScreeningJobTracker {
    pub fn new(
        service: Arc<dyn MissionService>,
        board: Arc<ConjunctionBoard>,
        config: &MissionConfig,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                service,
                board,
                slot: JobSlot::new(),
                poll_task: Mutex::new(None),
                poll_interval: config.poll_interval(),
                max_polls: config.max_polls,
                logger: LogManager::new("screening-tracker"),
                metrics,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackedJob> {
        self.inner.slot.state.subscribe()
    }

    pub fn current(&self) -> Option<ScreeningJob> {
        self.inner.slot.state.borrow().job.clone()
    }

    pub fn status_text(&self) -> Option<String> {
        self.inner
            .slot
            .state
            .borrow()
            .job
            .as_ref()
            .map(ScreeningJob::status_text)
    }

    /// Issues the start request and, on success, begins polling.
    ///
    /// A response without a job identifier leaves the tracker in FAILED with
    /// "no screening jobs created"; nothing is retried.
    pub async fn start(
        &self,
        asset_ids: Vec<u64>,
        window_days: u32,
        distance_threshold_km: f64,
    ) -> MissionResult<JobId> {
        let inner = &self.inner;
        inner.cancel_polling();
        let generation = inner.slot.begin();

        let request = ScreeningRequest {
            asset_ids,
            time_window_days: window_days,
            distance_threshold_km,
        };
        inner.logger.record(&format!(
            "starting screening for assets {:?} ({} days, {} km)",
            request.asset_ids, request.time_window_days, request.distance_threshold_km
        ));

        let response = match inner.service.start_screening(&request).await {
            Ok(response) => response,
            Err(err) => {
                inner
                    .logger
                    .transport_failure(&format!("start request failed: {}", err));
                inner.metrics.record_transport_failure();
                inner
                    .slot
                    .install(generation, ScreeningJob::failed_to_start(err.to_string()));
                return Err(err);
            }
        };

        let Some(job_id) = response.first_job_id().cloned() else {
            inner.logger.degraded(NO_JOBS_CREATED);
            inner
                .slot
                .install(generation, ScreeningJob::failed_to_start(NO_JOBS_CREATED));
            return Err(MissionError::NoJobCreated);
        };

        if inner
            .slot
            .install(generation, ScreeningJob::pending(job_id.clone()))
        {
            inner.logger.record(&format!("tracking screening job {}", job_id));
            self.spawn_poll_loop(generation, job_id.clone());
        } else {
            inner.logger.detail(&format!(
                "job {} superseded before polling began",
                job_id
            ));
        }
        Ok(job_id)
    }

    /// Stops polling; the last published state is kept.
    pub fn stop(&self) {
        self.inner.cancel_polling();
    }

    fn spawn_poll_loop(&self, generation: u64, job_id: JobId) {
        let weak: Weak<TrackerInner> = Arc::downgrade(&self.inner);
        let task = PeriodicTask::spawn(
            "screening-poll",
            self.inner.poll_interval,
            FirstTick::AfterPeriod,
            move || {
                let weak = weak.clone();
                let job_id = job_id.clone();
                async move {
                    match weak.upgrade() {
                        Some(inner) => inner.poll_once(generation, &job_id).await,
                        None => TickFlow::Stop,
                    }
                }
            },
        );
        *self
            .inner
            .poll_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
    }
}

impl TrackerInner {
    fn cancel_polling(&self) {
        if let Some(task) = self
            .poll_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.cancel();
        }
    }

    async fn poll_once(&self, generation: u64, job_id: &JobId) -> TickFlow {
        self.metrics.record_poll();
        let response = self.service.screening_status(job_id.as_str()).await;

        let update = match response {
            Ok(update) => update,
            Err(err) => {
                self.logger.transport_failure(&format!(
                    "status poll for job {} failed: {}",
                    job_id, err
                ));
                self.metrics.record_transport_failure();
                self.slot.modify(generation, |job| job.fail(err.to_string()));
                return TickFlow::Stop;
            }
        };

        let max_polls = self.max_polls;
        let outcome = self.slot.modify(generation, |job| {
            job.polls += 1;
            let transition = job.apply(&update);
            if transition != Transition::Terminal
                && max_polls.is_some_and(|limit| job.polls >= limit)
            {
                job.time_out();
                return (transition, true);
            }
            (transition, false)
        });

        match outcome {
            None => {
                self.logger
                    .detail(&format!("discarding status for superseded job {}", job_id));
                TickFlow::Stop
            }
            Some((Transition::Terminal, _)) => {
                self.logger.record(&format!(
                    "job {} finished with status {}",
                    job_id,
                    update.status.as_str()
                ));
                if let Err(err) = self.board.reload(self.service.as_ref()).await {
                    self.logger
                        .degraded(&format!("post-screening reload failed: {}", err));
                }
                TickFlow::Stop
            }
            Some((_, true)) => {
                self.logger.degraded(&format!(
                    "stopped watching job {} after reaching the poll ceiling",
                    job_id
                ));
                TickFlow::Stop
            }
            Some(_) => TickFlow::Continue,
        }
    }
}

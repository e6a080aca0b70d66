use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;

use crate::contracts::NoradId;
use crate::math::ScenePosition;
use crate::prelude::{MissionResult, MissionService};
use crate::scheduling::{FirstTick, PeriodicTask, TickFlow};
use crate::telemetry::{LogManager, MetricsRecorder};

/// Fixed cadence of the batched asset position query.
pub const SAMPLE_PERIOD: Duration = Duration::from_secs(5);

pub type PositionMap = HashMap<NoradId, ScenePosition>;

/// Keeps the scene positions of the tracked assets fresh.
///
/// While at least one asset is tracked a batch query runs every period. A failed
/// query leaves the last good positions published.
#[derive(Clone)]
pub struct AssetPositionSampler {
    inner: Arc<SamplerInner>,
}

struct SamplerInner {
    service: Arc<dyn MissionService>,
    positions: watch::Sender<PositionMap>,
    assets: Mutex<Vec<NoradId>>,
    task: Mutex<Option<PeriodicTask>>,
    period: Duration,
    logger: LogManager,
    metrics: Arc<MetricsRecorder>,
}

impl AssetPositionSampler {
    pub fn new(
        service: Arc<dyn MissionService>,
        period: Duration,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        let (positions, _) = watch::channel(PositionMap::new());
        Self {
            inner: Arc::new(SamplerInner {
                service,
                positions,
                assets: Mutex::new(Vec::new()),
                task: Mutex::new(None),
                period,
                logger: LogManager::new("asset-sampler"),
                metrics,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PositionMap> {
        self.inner.positions.subscribe()
    }

    pub fn positions(&self) -> PositionMap {
        self.inner.positions.borrow().clone()
    }

    pub fn tracked(&self) -> Vec<NoradId> {
        self.inner.assets().clone()
    }

    /// Replaces the tracked set and restarts the schedule with an immediate first
    /// sample. An empty set stops sampling. Must be called inside a tokio runtime.
    pub fn track(&self, mut assets: Vec<NoradId>) {
        assets.sort_unstable();
        assets.dedup();

        let inner = &self.inner;
        inner.cancel();
        inner
            .positions
            .send_if_modified(|map| {
                let before = map.len();
                map.retain(|norad_id, _| assets.binary_search(norad_id).is_ok());
                map.len() != before
            });
        let empty = assets.is_empty();
        *inner.assets() = assets;
        if empty {
            inner.logger.detail("no assets tracked; sampling paused");
            return;
        }

        let weak: Weak<SamplerInner> = Arc::downgrade(inner);
        let task = PeriodicTask::spawn("asset-sampler", inner.period, FirstTick::Immediately, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => {
                        let _ = inner.sample_once().await;
                        TickFlow::Continue
                    }
                    None => TickFlow::Stop,
                }
            }
        });
        *inner.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    pub fn stop(&self) {
        self.inner.cancel();
    }

    /// One batched query outside the schedule. Returns how many positions arrived.
    pub async fn sample_once(&self) -> MissionResult<usize> {
        self.inner.sample_once().await
    }
}

impl SamplerInner {
    fn assets(&self) -> std::sync::MutexGuard<'_, Vec<NoradId>> {
        self.assets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel(&self) {
        if let Some(task) = self.task.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.cancel();
        }
    }

    async fn sample_once(&self) -> MissionResult<usize> {
        let assets = self.assets().clone();
        if assets.is_empty() {
            return Ok(0);
        }

        let response = match self.service.propagate_batch(&assets).await {
            Ok(response) => response,
            Err(err) => {
                self.logger
                    .transport_failure(&format!("asset position sample failed: {}", err));
                self.metrics.record_visualization_failure();
                return Err(err);
            }
        };

        let tracked = self.assets().clone();
        let fixes: Vec<(NoradId, ScenePosition)> = response
            .satellites
            .iter()
            .filter(|fix| tracked.contains(&fix.norad_id))
            .map(|fix| (fix.norad_id, fix.geodetic().to_scene()))
            .collect();
        let count = fixes.len();
        self.positions.send_modify(|map| map.extend(fixes));
        self.metrics.record_position_sample();
        self.logger
            .detail(&format!("sampled {} of {} asset positions", count, assets.len()));
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{synthetic_point, ScriptedService};
    use tokio::time;

    fn sampler(service: &Arc<ScriptedService>) -> (AssetPositionSampler, Arc<MetricsRecorder>) {
        let metrics = Arc::new(MetricsRecorder::new());
        let sampler = AssetPositionSampler::new(service.clone(), SAMPLE_PERIOD, Arc::clone(&metrics));
        (sampler, metrics)
    }

    #[tokio::test(start_paused = true)]
    async fn samples_immediately_then_every_period() {
        let service = Arc::new(ScriptedService::new());
        let (sampler, metrics) = sampler(&service);

        sampler.track(vec![25544, 20580, 25544]);
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(service.calls().batches, vec![vec![20580, 25544]]);

        let positions = sampler.positions();
        assert_eq!(positions.len(), 2);
        assert_eq!(
            positions[&25544],
            synthetic_point(25544, 0).geodetic().to_scene()
        );

        time::sleep(SAMPLE_PERIOD).await;
        assert_eq!(service.calls().batches.len(), 2);
        assert_eq!(metrics.snapshot().position_samples, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_sample_keeps_stale_positions() {
        let service = Arc::new(ScriptedService::new());
        let (sampler, metrics) = sampler(&service);

        sampler.track(vec![25544]);
        time::sleep(Duration::from_millis(10)).await;
        let before = sampler.positions();
        assert_eq!(before.len(), 1);

        service.fail_batches(Some("service unavailable"));
        time::sleep(SAMPLE_PERIOD).await;
        assert_eq!(service.calls().batches.len(), 2);
        assert_eq!(sampler.positions(), before);
        assert_eq!(metrics.snapshot().visualization_failures, 1);

        service.fail_batches(None);
        time::sleep(SAMPLE_PERIOD).await;
        assert_eq!(metrics.snapshot().position_samples, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_asset_set_stops_sampling() {
        let service = Arc::new(ScriptedService::new());
        let (sampler, _) = sampler(&service);

        sampler.track(vec![25544]);
        time::sleep(Duration::from_millis(10)).await;
        sampler.track(Vec::new());
        time::sleep(SAMPLE_PERIOD * 3).await;

        assert_eq!(service.calls().batches.len(), 1);
        assert!(sampler.positions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_sampler_ends_the_schedule() {
        let service = Arc::new(ScriptedService::new());
        let (sampler, _) = sampler(&service);

        sampler.track(vec![25544]);
        time::sleep(Duration::from_millis(10)).await;
        drop(sampler);
        time::sleep(SAMPLE_PERIOD * 3).await;
        assert_eq!(service.calls().batches.len(), 1);
    }

    #[tokio::test]
    async fn objects_missing_from_the_batch_are_skipped() {
        let service = Arc::new(ScriptedService::new());
        service.fail_object(20580);
        let (sampler, _) = sampler(&service);
        *sampler.inner.assets() = vec![20580, 25544];

        assert_eq!(sampler.sample_once().await.unwrap(), 1);
        assert!(sampler.positions().contains_key(&25544));
    }
}

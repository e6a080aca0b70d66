use chrono::{DateTime, Duration as ChronoDuration, Utc};
use conjcore::contracts::{
    Conjunction, JobStatus, JobStatusResponse, NoradId, PositionUncertainty, PrimaryObject,
    ScreeningRequest, SecondaryObject, TcaPositions, ThreatLevel,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::generator::catalog::Catalog;
use crate::generator::orbit::CircularOrbit;
use crate::workflow::config::{AssetSpec, ServiceConfig};

pub const EMPTY_CATALOG_MESSAGE: &str = "TLE catalog is empty - refresh catalog first";

/// Altitude band, on top of the distance threshold, that survives the coarse filter.
const COARSE_BAND_KM: f64 = 75.0;
/// Upper bound of the simulated miss distance for a coarse candidate.
const MAX_MISS_KM: f64 = 10_000.0;
const POSITION_SIGMA_M: f64 = 1_000.0;
/// Per-axis one-sigma spread reported with each event, radial/in-track/cross-track.
const PRIMARY_SIGMA_M: [f64; 3] = [50.0, 200.0, 40.0];
const SECONDARY_SIGMA_M: [f64; 3] = [150.0, 900.0, 120.0];
const HARD_BODY_RADIUS_M: f64 = 50.0;

#[derive(Debug, Clone)]
struct Encounter {
    norad_id: NoradId,
    name: String,
    object_type: String,
    miss_km: f64,
    /// Unit direction of the miss vector in the radial/in-track/cross-track frame.
    miss_direction: [f64; 3],
    tca_offset_s: i64,
    relative_velocity_kms: f64,
}

/// Two-dimensional Gaussian collision probability for a miss distance in meters.
pub fn collision_probability(miss_m: f64) -> f64 {
    let variance = POSITION_SIGMA_M * POSITION_SIGMA_M;
    (HARD_BODY_RADIUS_M * HARD_BODY_RADIUS_M / (2.0 * variance))
        * (-(miss_m * miss_m) / (2.0 * variance)).exp()
}

/// One screening job on the simulated service.
///
/// The outcome is planned up front from the seeded generator; [`advance`] then
/// reveals it one status update at a time: two coarse-filter reports, a fine
/// phase with growing counts, and a terminal report.
///
/// [`advance`]: ScreeningSimulation::advance
pub struct ScreeningSimulation {
    job_id: u64,
    asset: AssetSpec,
    threshold_km: f64,
    total_objects: u64,
    candidates: u64,
    encounters: Vec<Encounter>,
    closest: Option<(f64, String)>,
    failure: Option<(u32, String)>,
    ticks: u32,
    tick: u32,
    started: DateTime<Utc>,
    status: JobStatusResponse,
}

impl ScreeningSimulation {
    pub fn plan(
        job_id: u64,
        asset: &AssetSpec,
        request: &ScreeningRequest,
        catalog: &Catalog,
        config: &ServiceConfig,
        started: DateTime<Utc>,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed ^ job_id.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let threshold_km = request.distance_threshold_km.max(0.0);
        let window_seconds = (i64::from(request.time_window_days.max(1)) * 86_400).max(1);
        let ticks = config.job_ticks.max(3);

        let mut candidates = 0u64;
        let mut encounters = Vec::new();
        let mut closest: Option<(f64, String)> = None;
        for object in catalog.objects() {
            if object.norad_id == asset.norad_id
                || (object.orbit.altitude_km - asset.orbit.altitude_km).abs()
                    > COARSE_BAND_KM + threshold_km
            {
                continue;
            }
            candidates += 1;
            let miss_km: f64 = rng.gen_range(0.0..MAX_MISS_KM);
            if closest.as_ref().map_or(true, |(best, _)| miss_km < *best) {
                closest = Some((miss_km, object.name.clone()));
            }
            if miss_km < threshold_km {
                encounters.push(Encounter {
                    norad_id: object.norad_id,
                    name: object.name.clone(),
                    object_type: object.object_type.clone(),
                    miss_km,
                    miss_direction: random_direction(&mut rng),
                    tca_offset_s: rng.gen_range(0..window_seconds),
                    relative_velocity_kms: rng.gen_range(0.5..15.0),
                });
            }
        }
        encounters.sort_by(|a, b| a.miss_km.total_cmp(&b.miss_km));

        let failure = if rng.gen_bool(config.failure_probability.clamp(0.0, 1.0)) {
            let at = rng.gen_range(3..=ticks);
            Some((at, format!("propagation diverged for NORAD {}", asset.norad_id)))
        } else {
            None
        };

        Self {
            job_id,
            asset: asset.clone(),
            threshold_km,
            total_objects: catalog.len() as u64,
            candidates,
            encounters,
            closest,
            failure,
            ticks,
            tick: 0,
            started,
            status: JobStatusResponse::new(JobStatus::Pending).with_job_id(job_id.to_string()),
        }
    }

    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    pub fn status(&self) -> &JobStatusResponse {
        &self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.status.is_terminal()
    }

    /// Moves the job one update forward. No-op once terminal.
    pub fn advance(&mut self) -> &JobStatusResponse {
        if self.is_terminal() {
            return &self.status;
        }
        self.tick += 1;
        let tick = self.tick;

        let next = if self.total_objects == 0 {
            JobStatusResponse::new(JobStatus::Failed).with_message(EMPTY_CATALOG_MESSAGE)
        } else if let Some((_, message)) = self.failure.as_ref().filter(|(at, _)| *at == tick) {
            JobStatusResponse::new(JobStatus::Failed)
                .with_progress(self.status.progress.unwrap_or(0.0))
                .with_total_objects(self.total_objects)
                .with_message(message.clone())
        } else if tick == 1 || tick == 2 {
            JobStatusResponse::new(JobStatus::Running)
                .with_progress(0.05 * f64::from(tick))
                .with_total_objects(self.total_objects)
                .with_counts(self.candidates, 0)
        } else if tick >= self.ticks {
            self.completion()
        } else {
            let fraction = f64::from(tick - 2) / f64::from(self.ticks - 2);
            let revealed = (self.encounters.len() as f64 * fraction).floor() as u64;
            JobStatusResponse::new(JobStatus::Running)
                .with_progress(0.1 + 0.9 * fraction)
                .with_total_objects(self.total_objects)
                .with_counts(self.candidates, revealed)
        };
        self.status = next.with_job_id(self.job_id.to_string());
        &self.status
    }

    fn completion(&self) -> JobStatusResponse {
        let found = self.encounters.len() as u64;
        let completed = JobStatusResponse::new(JobStatus::Completed)
            .with_progress(1.0)
            .with_total_objects(self.total_objects)
            .with_counts(self.candidates, found);
        match (&self.closest, found) {
            (Some((miss_km, name)), 0) => completed.with_message(format!(
                "Closest approach: {:.1} km ({}) - all above {} km threshold",
                miss_km, name, self.threshold_km
            )),
            _ => completed,
        }
    }

    /// Events found by a completed job, numbered by `next_id`, with the full
    /// analysis the single-event lookup serves.
    pub fn conjunctions(&self, mut next_id: impl FnMut() -> u64) -> Vec<Conjunction> {
        if self.status.status != JobStatus::Completed {
            return Vec::new();
        }
        self.encounters
            .iter()
            .map(|encounter| {
                let tca = self.started + ChronoDuration::seconds(encounter.tca_offset_s);
                let miss_m = encounter.miss_km * 1000.0;
                let probability = collision_probability(miss_m);
                Conjunction {
                    id: next_id(),
                    primary: PrimaryObject {
                        name: self.asset.name.clone(),
                        norad_id: self.asset.norad_id,
                        maneuverable: true,
                    },
                    secondary: SecondaryObject {
                        name: Some(encounter.name.clone()),
                        norad_id: encounter.norad_id,
                        object_type: Some(encounter.object_type.clone()),
                    },
                    tca: Some(tca),
                    miss_distance_m: Some(miss_m),
                    relative_velocity_kms: Some(encounter.relative_velocity_kms),
                    collision_probability: Some(probability),
                    threat_level: ThreatLevel::from_probability(probability),
                    tca_positions: Some(tca_positions(&self.asset.orbit, tca, encounter.miss_km)),
                    time_to_tca_hours: None,
                    radial_m: Some(encounter.miss_direction[0] * miss_m),
                    in_track_m: Some(encounter.miss_direction[1] * miss_m),
                    cross_track_m: Some(encounter.miss_direction[2] * miss_m),
                    uncertainty: Some(PositionUncertainty {
                        primary_sigma_radial_m: Some(PRIMARY_SIGMA_M[0]),
                        primary_sigma_in_track_m: Some(PRIMARY_SIGMA_M[1]),
                        primary_sigma_cross_track_m: Some(PRIMARY_SIGMA_M[2]),
                        secondary_sigma_radial_m: Some(SECONDARY_SIGMA_M[0]),
                        secondary_sigma_in_track_m: Some(SECONDARY_SIGMA_M[1]),
                        secondary_sigma_cross_track_m: Some(SECONDARY_SIGMA_M[2]),
                    }),
                }
            })
            .collect()
    }
}

fn random_direction(rng: &mut StdRng) -> [f64; 3] {
    let z: f64 = rng.gen_range(-1.0..=1.0);
    let azimuth: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
    let planar = (1.0 - z * z).sqrt();
    [planar * azimuth.cos(), planar * azimuth.sin(), z]
}

/// Primary state at TCA, with the secondary offset radially by the miss distance.
fn tca_positions(orbit: &CircularOrbit, tca: DateTime<Utc>, miss_km: f64) -> TcaPositions {
    let primary = orbit.eci_at(tca);
    let radius = orbit.radius_km();
    let scale = (radius + miss_km) / radius;
    TcaPositions {
        primary_eci: primary,
        secondary_eci: primary.map(|component| component * scale),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(threshold_km: f64) -> ScreeningRequest {
        ScreeningRequest {
            asset_ids: vec![1],
            time_window_days: 7,
            distance_threshold_km: threshold_km,
        }
    }

    fn simulate(config: &ServiceConfig, catalog_size: usize, threshold_km: f64) -> ScreeningSimulation {
        let catalog = Catalog::synthetic(catalog_size, config.seed, &config.assets);
        let asset = config.asset(1).unwrap();
        ScreeningSimulation::plan(7, asset, &request(threshold_km), &catalog, config, Utc::now())
    }

    fn run_to_end(simulation: &mut ScreeningSimulation) -> Vec<JobStatusResponse> {
        let mut history = Vec::new();
        while !simulation.is_terminal() {
            history.push(simulation.advance().clone());
            assert!(history.len() <= 100, "job never finished");
        }
        history
    }

    #[test]
    fn job_walks_coarse_then_fine_then_completes() {
        let config = ServiceConfig::default();
        let mut simulation = simulate(&config, 2000, 25.0);
        assert_eq!(simulation.status().status, JobStatus::Pending);

        let history = run_to_end(&mut simulation);
        assert_eq!(history.len(), config.job_ticks as usize);
        assert_eq!(history[0].progress, Some(0.05));
        assert_eq!(history[0].total_objects, Some(2000));
        assert!(history[1].progress.unwrap() < 0.11);
        assert!(history[2].progress.unwrap() > 0.11);

        let progress: Vec<f64> = history.iter().filter_map(|s| s.progress).collect();
        assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]), "{progress:?}");

        let last = history.last().unwrap();
        assert_eq!(last.status, JobStatus::Completed);
        assert_eq!(last.progress, Some(1.0));
        let found = last.conjunctions_found.unwrap() as usize;

        let mut next = 100;
        let events = simulation.conjunctions(|| {
            next += 1;
            next
        });
        assert_eq!(events.len(), found);
        for event in &events {
            assert!(event.miss_distance_m.unwrap() < 25_000.0);
            assert_eq!(
                event.threat_level,
                ThreatLevel::from_probability(event.collision_probability.unwrap())
            );
            assert_eq!(event.primary.norad_id, 25544);
            assert!(event.tca_positions.is_some());
            let components = [
                event.radial_m.unwrap(),
                event.in_track_m.unwrap(),
                event.cross_track_m.unwrap(),
            ];
            let magnitude = components.iter().map(|c| c * c).sum::<f64>().sqrt();
            assert!((magnitude - event.miss_distance_m.unwrap()).abs() < 1e-6);
        }
    }

    #[test]
    fn empty_catalog_fails_on_first_update() {
        let config = ServiceConfig::default();
        let mut simulation = simulate(&config, 0, 25.0);
        let status = simulation.advance().clone();
        assert_eq!(status.status, JobStatus::Failed);
        assert_eq!(status.error_message.as_deref(), Some(EMPTY_CATALOG_MESSAGE));
        assert!(simulation.conjunctions(|| 1).is_empty());
    }

    #[test]
    fn nothing_below_threshold_reports_closest_approach() {
        let config = ServiceConfig::default();
        let mut simulation = simulate(&config, 500, 0.0);
        let last = run_to_end(&mut simulation).pop().unwrap();
        assert_eq!(last.status, JobStatus::Completed);
        assert_eq!(last.conjunctions_found, Some(0));
        let message = last.error_message.unwrap();
        assert!(message.starts_with("Closest approach: "), "{message}");
        assert!(message.ends_with("all above 0 km threshold"), "{message}");
    }

    #[test]
    fn certain_failure_stops_before_completion() {
        let config = ServiceConfig {
            failure_probability: 1.0,
            ..ServiceConfig::default()
        };
        let mut simulation = simulate(&config, 500, 25.0);
        let last = run_to_end(&mut simulation).pop().unwrap();
        assert_eq!(last.status, JobStatus::Failed);
        assert_eq!(
            last.error_message.as_deref(),
            Some("propagation diverged for NORAD 25544")
        );
    }

    #[test]
    fn tca_secondary_sits_one_miss_distance_above_primary() {
        let config = ServiceConfig::default();
        let mut simulation = simulate(&config, 2000, 10_000.0);
        run_to_end(&mut simulation);
        let events = simulation.conjunctions(|| 1);
        assert!(!events.is_empty());
        let positions = events[0].tca_positions.unwrap();
        let primary_radius = positions.primary_eci.iter().map(|c| c * c).sum::<f64>().sqrt();
        let secondary_radius = positions.secondary_eci.iter().map(|c| c * c).sum::<f64>().sqrt();
        let miss_km = events[0].miss_distance_m.unwrap() / 1000.0;
        assert!((secondary_radius - primary_radius - miss_km).abs() < 1e-6);
    }

    #[test]
    fn probability_buckets_by_miss_distance() {
        assert_eq!(ThreatLevel::from_probability(collision_probability(0.0)), ThreatLevel::Critical);
        assert_eq!(ThreatLevel::from_probability(collision_probability(5_000.0)), ThreatLevel::Low);
    }
}

use anyhow::Context;
use conjcore::contracts::NoradId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::generator::orbit::CircularOrbit;

/// A protected asset the simulated service can screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub id: u64,
    pub norad_id: NoradId,
    pub name: String,
    pub orbit: CircularOrbit,
}

/// Behaviour of the simulated screening service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind: SocketAddr,
    /// Objects in the screening catalog; zero reproduces the empty-catalog failure.
    pub catalog_size: usize,
    pub seed: u64,
    /// Wall-clock time between job progress updates.
    pub job_tick_ms: u64,
    /// Updates a job takes from its first RUNNING report to COMPLETED.
    pub job_ticks: u32,
    /// Chance that a job fails part-way through the fine phase.
    pub failure_probability: f64,
    /// Also put true TCA state vectors on list rows; the single-event lookup
    /// always carries them.
    pub report_tca_positions: bool,
    pub assets: Vec<AssetSpec>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            catalog_size: 5000,
            seed: 0,
            job_tick_ms: 500,
            job_ticks: 20,
            failure_probability: 0.0,
            report_tca_positions: false,
            assets: vec![
                AssetSpec {
                    id: 1,
                    norad_id: 25544,
                    name: "ISS (ZARYA)".to_string(),
                    orbit: CircularOrbit {
                        altitude_km: 420.0,
                        inclination_deg: 51.64,
                        raan_deg: 120.0,
                        phase_deg: 0.0,
                    },
                },
                AssetSpec {
                    id: 2,
                    norad_id: 20580,
                    name: "HST".to_string(),
                    orbit: CircularOrbit {
                        altitude_km: 535.0,
                        inclination_deg: 28.47,
                        raan_deg: 45.0,
                        phase_deg: 90.0,
                    },
                },
            ],
        }
    }
}

impl ServiceConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        load_yaml(path, "service config")
    }

    pub fn job_tick(&self) -> Duration {
        Duration::from_millis(self.job_tick_ms.max(1))
    }

    pub fn asset(&self, id: u64) -> Option<&AssetSpec> {
        self.assets.iter().find(|asset| asset.id == id)
    }
}

/// Reads any serde-backed config from YAML, naming `what` in error context.
pub fn load_yaml<T: DeserializeOwned, P: AsRef<Path>>(path: P, what: &str) -> anyhow::Result<T> {
    let path_ref = path.as_ref();
    let contents = fs::read_to_string(path_ref)
        .with_context(|| format!("reading {} {}", what, path_ref.display()))?;
    let config: T = serde_yaml::from_str(&contents)
        .with_context(|| format!("parsing {} {}", what, path_ref.display()))?;
    Ok(config)
}

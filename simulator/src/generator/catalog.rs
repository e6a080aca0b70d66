use conjcore::contracts::NoradId;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::generator::orbit::CircularOrbit;
use crate::workflow::config::AssetSpec;

/// First NORAD id handed out to synthetic catalog objects.
pub const FIRST_SYNTHETIC_ID: NoradId = 30_000;

const FAMILIES: [(&str, &str); 6] = [
    ("COSMOS 2251 DEB", "DEBRIS"),
    ("FENGYUN 1C DEB", "DEBRIS"),
    ("IRIDIUM 33 DEB", "DEBRIS"),
    ("SL-16 R/B", "ROCKET BODY"),
    ("STARLINK", "PAYLOAD"),
    ("ONEWEB", "PAYLOAD"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogObject {
    pub norad_id: NoradId,
    pub name: String,
    pub object_type: String,
    pub orbit: CircularOrbit,
}

/// Tracked objects the service can propagate: the protected assets plus the
/// screening catalog they are screened against.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    assets: Vec<CatalogObject>,
    objects: Vec<CatalogObject>,
    index: HashMap<NoradId, (bool, usize)>,
}

impl Catalog {
    /// Deterministic catalog of `size` low-Earth-orbit objects for `seed`.
    pub fn synthetic(size: usize, seed: u64, assets: &[AssetSpec]) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let objects = (0..size)
            .map(|index| {
                let (family, object_type) = FAMILIES[index % FAMILIES.len()];
                let norad_id = FIRST_SYNTHETIC_ID + index as NoradId;
                let name = match object_type {
                    "PAYLOAD" => format!("{}-{}", family, 1000 + index),
                    _ => format!("{} {}", family, index),
                };
                CatalogObject {
                    norad_id,
                    name,
                    object_type: object_type.to_string(),
                    orbit: CircularOrbit {
                        altitude_km: rng.gen_range(300.0..1200.0),
                        inclination_deg: rng.gen_range(0.0..100.0),
                        raan_deg: rng.gen_range(0.0..360.0),
                        phase_deg: rng.gen_range(0.0..360.0),
                    },
                }
            })
            .collect();

        let assets = assets
            .iter()
            .map(|asset| CatalogObject {
                norad_id: asset.norad_id,
                name: asset.name.clone(),
                object_type: "PAYLOAD".to_string(),
                orbit: asset.orbit,
            })
            .collect();

        Self::from_parts(assets, objects)
    }

    pub fn from_parts(assets: Vec<CatalogObject>, objects: Vec<CatalogObject>) -> Self {
        let mut index = HashMap::new();
        for (position, object) in objects.iter().enumerate() {
            index.insert(object.norad_id, (false, position));
        }
        for (position, asset) in assets.iter().enumerate() {
            index.insert(asset.norad_id, (true, position));
        }
        Self {
            assets,
            objects,
            index,
        }
    }

    pub fn get(&self, norad_id: NoradId) -> Option<&CatalogObject> {
        let (is_asset, position) = *self.index.get(&norad_id)?;
        if is_asset {
            self.assets.get(position)
        } else {
            self.objects.get(position)
        }
    }

    /// Screening population, assets excluded.
    pub fn objects(&self) -> &[CatalogObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::config::ServiceConfig;

    #[test]
    fn same_seed_builds_same_catalog() {
        let assets = ServiceConfig::default().assets;
        let first = Catalog::synthetic(50, 7, &assets);
        let second = Catalog::synthetic(50, 7, &assets);
        assert_eq!(first.objects(), second.objects());
        assert_eq!(first.len(), 50);

        let other = Catalog::synthetic(50, 8, &assets);
        assert_ne!(first.objects(), other.objects());
    }

    #[test]
    fn lookup_covers_assets_and_objects() {
        let catalog = Catalog::synthetic(10, 1, &ServiceConfig::default().assets);
        assert_eq!(catalog.get(25544).unwrap().name, "ISS (ZARYA)");
        let debris = catalog.get(FIRST_SYNTHETIC_ID).unwrap();
        assert_eq!(debris.object_type, "DEBRIS");
        assert!((300.0..1200.0).contains(&debris.orbit.altitude_km));
        assert!(catalog.get(1).is_none());
    }
}

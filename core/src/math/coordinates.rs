//! Geodetic and inertial positions mapped into the normalized 3D scene.
//!
//! The scene uses Earth-radius units with scene-Y as the polar axis. Both
//! conversions are pure and recomputed on every refresh.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Equatorial Earth radius (WGS84 semi-major axis).
pub const EARTH_RADIUS_KM: f64 = 6378.137;

/// A point in the scene, in Earth-radius units.
pub type ScenePosition = Vector3<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticPosition {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
}

impl GeodeticPosition {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_km: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_km,
        }
    }

    pub fn to_scene(&self) -> ScenePosition {
        geodetic_to_scene(self.latitude_deg, self.longitude_deg, self.altitude_km)
    }
}

/// Spherical-to-Cartesian map with a 180° longitude offset.
pub fn geodetic_to_scene(latitude_deg: f64, longitude_deg: f64, altitude_km: f64) -> ScenePosition {
    let phi = (90.0 - latitude_deg) * PI / 180.0;
    let theta = (longitude_deg + 180.0) * PI / 180.0;
    let r = (EARTH_RADIUS_KM + altitude_km) / EARTH_RADIUS_KM;

    Vector3::new(
        -r * phi.sin() * theta.cos(),
        r * phi.cos(),
        r * phi.sin() * theta.sin(),
    )
}

/// Scales an ECI vector (km) by Earth radius and turns inertial Z into scene-up.
pub fn eci_to_scene(eci_km: [f64; 3]) -> ScenePosition {
    let [x, y, z] = eci_km;
    Vector3::new(x / EARTH_RADIUS_KM, z / EARTH_RADIUS_KM, -y / EARTH_RADIUS_KM)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn surface_points_sit_on_the_unit_sphere() {
        let mut latitude = -90.0;
        while latitude <= 90.0 {
            let mut longitude = -180.0;
            while longitude <= 180.0 {
                let point = geodetic_to_scene(latitude, longitude, 0.0);
                assert!(
                    (point.norm() - 1.0).abs() < EPS,
                    "lat {latitude} lon {longitude} -> norm {}",
                    point.norm()
                );
                longitude += 15.0;
            }
            latitude += 7.5;
        }
    }

    #[test]
    fn origin_fixture_maps_to_positive_x() {
        // phi = 90°, theta = 180°: (-sin φ cos θ, cos φ, sin φ sin θ) = (1, 0, 0)
        let point = geodetic_to_scene(0.0, 0.0, 0.0);
        assert!((point.x - 1.0).abs() < EPS);
        assert!(point.y.abs() < EPS);
        assert!(point.z.abs() < EPS);
    }

    #[test]
    fn north_pole_is_scene_up() {
        let point = geodetic_to_scene(90.0, 37.0, 0.0);
        assert!(point.x.abs() < EPS);
        assert!((point.y - 1.0).abs() < EPS);
        assert!(point.z.abs() < EPS);
    }

    #[test]
    fn altitude_scales_radius() {
        let point = geodetic_to_scene(0.0, -90.0, EARTH_RADIUS_KM);
        assert!((point.norm() - 2.0).abs() < EPS);
        assert!((point.z - 2.0).abs() < EPS);
    }

    #[test]
    fn eci_axes_are_permuted_into_scene_axes() {
        let r = EARTH_RADIUS_KM;
        assert_eq!(eci_to_scene([r, 0.0, 0.0]), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(eci_to_scene([0.0, r, 0.0]), Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(eci_to_scene([0.0, 0.0, r]), Vector3::new(0.0, 1.0, 0.0));

        let leo = eci_to_scene([6778.0, -1200.0, 300.0]);
        assert!((leo.x - 6778.0 / r).abs() < EPS);
        assert!((leo.y - 300.0 / r).abs() < EPS);
        assert!((leo.z - 1200.0 / r).abs() < EPS);
    }

    #[test]
    fn geodetic_wrapper_matches_free_function() {
        let position = GeodeticPosition::new(51.6, -12.25, 420.0);
        assert_eq!(position.to_scene(), geodetic_to_scene(51.6, -12.25, 420.0));
    }
}

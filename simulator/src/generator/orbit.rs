use chrono::{DateTime, Utc};
use conjcore::contracts::PropagationPoint;
use conjcore::math::EARTH_RADIUS_KM;
use serde::{Deserialize, Serialize};

/// Earth gravitational parameter, km³/s².
pub const MU_EARTH: f64 = 398_600.4418;
/// Earth rotation rate, rad/s.
pub const EARTH_ROTATION: f64 = 7.292_115_9e-5;
/// Greenwich sidereal angle at the J2000 epoch, degrees.
const GMST_J2000_DEG: f64 = 280.460_618_37;

/// Unix time of the J2000 epoch (2000-01-01T12:00:00Z).
const J2000_UNIX_SECONDS: f64 = 946_728_000.0;

/// Circular two-body orbit used in place of full TLE propagation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircularOrbit {
    pub altitude_km: f64,
    pub inclination_deg: f64,
    pub raan_deg: f64,
    /// Argument of latitude at the J2000 epoch.
    pub phase_deg: f64,
}

impl CircularOrbit {
    pub fn radius_km(&self) -> f64 {
        EARTH_RADIUS_KM + self.altitude_km
    }

    /// Mean motion in rad/s.
    pub fn mean_motion(&self) -> f64 {
        (MU_EARTH / self.radius_km().powi(3)).sqrt()
    }

    fn seconds_since_epoch(at: DateTime<Utc>) -> f64 {
        at.timestamp_millis() as f64 / 1000.0 - J2000_UNIX_SECONDS
    }

    /// Inertial position in km.
    pub fn eci_at(&self, at: DateTime<Utc>) -> [f64; 3] {
        let t = Self::seconds_since_epoch(at);
        let r = self.radius_km();
        let u = self.phase_deg.to_radians() + self.mean_motion() * t;
        let (sin_u, cos_u) = u.sin_cos();
        let (sin_raan, cos_raan) = self.raan_deg.to_radians().sin_cos();
        let (sin_i, cos_i) = self.inclination_deg.to_radians().sin_cos();
        [
            r * (cos_raan * cos_u - sin_raan * sin_u * cos_i),
            r * (sin_raan * cos_u + cos_raan * sin_u * cos_i),
            r * sin_u * sin_i,
        ]
    }

    /// Sub-satellite latitude/longitude (degrees) and altitude over a spherical Earth.
    pub fn geodetic_at(&self, at: DateTime<Utc>) -> (f64, f64, f64) {
        let [x, y, z] = self.eci_at(at);
        let r = self.radius_km();
        let latitude = (z / r).clamp(-1.0, 1.0).asin().to_degrees();
        let gmst = GMST_J2000_DEG.to_radians() + EARTH_ROTATION * Self::seconds_since_epoch(at);
        let longitude = wrap_degrees((y.atan2(x) - gmst).to_degrees());
        (latitude, longitude, self.altitude_km)
    }

    pub fn sample(&self, at: DateTime<Utc>) -> PropagationPoint {
        let (latitude, longitude, altitude_km) = self.geodetic_at(at);
        PropagationPoint {
            datetime_utc: Some(at.to_rfc3339()),
            latitude,
            longitude,
            altitude_km,
            position_eci: self.eci_at(at).to_vec(),
        }
    }
}

/// Maps any angle into [-180, 180).
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iss() -> CircularOrbit {
        CircularOrbit {
            altitude_km: 420.0,
            inclination_deg: 51.6,
            raan_deg: 0.0,
            phase_deg: 0.0,
        }
    }

    #[test]
    fn low_orbit_period_is_about_ninety_minutes() {
        let minutes = std::f64::consts::TAU / iss().mean_motion() / 60.0;
        assert!((90.0..95.0).contains(&minutes), "{minutes}");
    }

    #[test]
    fn eci_radius_is_constant_and_latitude_bounded_by_inclination() {
        let orbit = iss();
        let start = Utc::now();
        for minute in 0..120 {
            let at = start + chrono::Duration::minutes(minute);
            let [x, y, z] = orbit.eci_at(at);
            let radius = (x * x + y * y + z * z).sqrt();
            assert!((radius - orbit.radius_km()).abs() < 1e-6);

            let (latitude, longitude, altitude) = orbit.geodetic_at(at);
            assert!(latitude.abs() <= 51.6 + 1e-9);
            assert!((-180.0..180.0).contains(&longitude));
            assert_eq!(altitude, 420.0);
        }
    }

    #[test]
    fn samples_carry_timestamp_and_eci() {
        let point = iss().sample(Utc::now());
        assert!(point.datetime_utc.is_some());
        assert_eq!(point.position_eci.len(), 3);
    }

    #[test]
    fn wrap_keeps_longitude_in_range() {
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-190.0), 170.0);
        assert_eq!(wrap_degrees(180.0), -180.0);
    }
}

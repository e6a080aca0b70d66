use serde::{Deserialize, Serialize};

use super::NoradId;
use crate::math::coordinates::GeodeticPosition;

/// One propagated sample of a single object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime_utc: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_km: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub position_eci: Vec<f64>,
}

impl PropagationPoint {
    pub fn geodetic(&self) -> GeodeticPosition {
        GeodeticPosition::new(self.latitude, self.longitude, self.altitude_km)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropagationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norad_id: Option<NoradId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub points: Vec<PropagationPoint>,
}

/// Current position of one object in a batch query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteFix {
    pub norad_id: NoradId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_km: f64,
}

impl SatelliteFix {
    pub fn geodetic(&self) -> GeodeticPosition {
        GeodeticPosition::new(self.latitude, self.longitude, self.altitude_km)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchPropagationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime_utc: Option<String>,
    #[serde(default)]
    pub satellites: Vec<SatelliteFix>,
}

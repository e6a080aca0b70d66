pub mod coordinates;
pub mod easing;

pub use coordinates::{
    eci_to_scene, geodetic_to_scene, GeodeticPosition, ScenePosition, EARTH_RADIUS_KM,
};
pub use easing::smoothstep;

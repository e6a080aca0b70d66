//! Camera pose, perspective projection and the eased flight between poses.

use nalgebra::Vector3;

use crate::contracts::NoradId;
use crate::math::{smoothstep, ScenePosition};
use crate::prelude::{MissionError, MissionResult, MissionService};

/// Flight progress gained per second of frame time (a ~0.67 s flight).
pub const FLIGHT_RATE: f64 = 1.5;

/// Distance kept beyond the focus point along its radial direction.
pub const STANDOFF: f64 = 0.8;

/// Step size of the single-sample focus lookup.
pub const FOCUS_STEP_SECONDS: f64 = 60.0;

const NEAR_PLANE: f64 = 1e-3;
const DIRECTION_EPS: f64 = 1e-12;

/// A point projected onto the image plane; `y` grows upwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    pub x: f64,
    pub y: f64,
    pub depth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: ScenePosition,
    pub look_at: ScenePosition,
}

impl CameraPose {
    pub fn new(position: ScenePosition, look_at: ScenePosition) -> Self {
        Self { position, look_at }
    }

    /// Whole-Earth view the scene starts from.
    pub fn overview() -> Self {
        Self::new(Vector3::new(0.0, 1.0, 3.2), Vector3::zeros())
    }

    /// Pose outside `point`, on its radial line, looking back at it.
    pub fn focusing(point: ScenePosition) -> Self {
        let radial = point
            .try_normalize(DIRECTION_EPS)
            .unwrap_or_else(|| Vector3::y());
        Self::new(point + radial * STANDOFF, point)
    }

    pub fn lerp(&self, other: &CameraPose, t: f64) -> CameraPose {
        CameraPose {
            position: self.position.lerp(&other.position, t),
            look_at: self.look_at.lerp(&other.look_at, t),
        }
    }

    /// Pinhole projection with scene-Y as world up. Points behind the near plane
    /// yield `None`.
    pub fn project(&self, point: &ScenePosition, focal_length: f64) -> Option<Projected> {
        let forward = (self.look_at - self.position).try_normalize(DIRECTION_EPS)?;
        let right = forward
            .cross(&Vector3::y())
            .try_normalize(DIRECTION_EPS)
            .unwrap_or_else(|| Vector3::x());
        let up = right.cross(&forward);

        let relative = point - self.position;
        let depth = relative.dot(&forward);
        if depth <= NEAR_PLANE {
            return None;
        }
        Some(Projected {
            x: relative.dot(&right) / depth * focal_length,
            y: relative.dot(&up) / depth * focal_length,
            depth,
        })
    }

    /// True when the unit Earth sphere lies between the camera and `point`.
    pub fn occluded_by_earth(&self, point: &ScenePosition) -> bool {
        let direction = point - self.position;
        let a = direction.dot(&direction);
        if a <= DIRECTION_EPS {
            return false;
        }
        let b = 2.0 * self.position.dot(&direction);
        let c = self.position.dot(&self.position) - 1.0;
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return false;
        }
        let entry = (-b - discriminant.sqrt()) / (2.0 * a);
        entry > 1e-6 && entry < 1.0 - 1e-6
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::overview()
    }
}

/// One eased transition between two poses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFlight {
    pub start: CameraPose,
    pub target: CameraPose,
    pub progress: f64,
}

impl CameraFlight {
    pub fn new(start: CameraPose, target: CameraPose) -> Self {
        Self {
            start,
            target,
            progress: 0.0,
        }
    }

    pub fn advance(&mut self, dt_seconds: f64) {
        if self.progress < 1.0 {
            self.progress = (self.progress + dt_seconds.max(0.0) * FLIGHT_RATE).min(1.0);
        }
    }

    pub fn pose(&self) -> CameraPose {
        self.start.lerp(&self.target, smoothstep(self.progress))
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }
}

/// Owns the live camera pose and at most one flight.
///
/// A new flight always starts from the pose currently on screen, so retargeting
/// mid-flight continues smoothly from the interpolated position.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFlightController {
    pose: CameraPose,
    flight: Option<CameraFlight>,
    flights_started: u64,
}

impl CameraFlightController {
    pub fn new(pose: CameraPose) -> Self {
        Self {
            pose,
            flight: None,
            flights_started: 0,
        }
    }

    pub fn fly_to(&mut self, target: CameraPose) {
        self.flight = Some(CameraFlight::new(self.pose, target));
        self.flights_started += 1;
    }

    /// Per-frame update; finished flights are dropped.
    pub fn advance(&mut self, dt_seconds: f64) {
        if let Some(flight) = self.flight.as_mut() {
            flight.advance(dt_seconds);
            self.pose = flight.pose();
            if flight.is_complete() {
                self.flight = None;
            }
        }
    }

    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    pub fn flight(&self) -> Option<&CameraFlight> {
        self.flight.as_ref()
    }

    pub fn flights_started(&self) -> u64 {
        self.flights_started
    }
}

impl Default for CameraFlightController {
    fn default() -> Self {
        Self::new(CameraPose::overview())
    }
}

/// Current scene position of `norad_id` from a single-sample propagation.
pub async fn locate_focus(
    service: &dyn MissionService,
    norad_id: NoradId,
) -> MissionResult<ScenePosition> {
    let response = service.propagate(norad_id, 1, FOCUS_STEP_SECONDS).await?;
    response
        .points
        .first()
        .map(|point| point.geodetic().to_scene())
        .ok_or_else(|| MissionError::Decode(format!("no position returned for NORAD {}", norad_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{synthetic_point, ScriptedService};

    const EPS: f64 = 1e-9;

    #[test]
    fn focusing_pose_stands_off_radially() {
        let point = Vector3::new(0.0, 0.0, 1.1);
        let pose = CameraPose::focusing(point);
        assert!((pose.position - Vector3::new(0.0, 0.0, 1.9)).norm() < EPS);
        assert_eq!(pose.look_at, point);
    }

    #[test]
    fn flight_needs_two_thirds_of_a_second() {
        let mut flight = CameraFlight::new(CameraPose::overview(), CameraPose::focusing(Vector3::x()));
        let frame = 1.0 / 60.0;
        let mut frames: u32 = 0;
        while !flight.is_complete() {
            flight.advance(frame);
            frames += 1;
            assert!(flight.progress <= 1.0);
        }
        assert!(f64::from(frames) * frame >= 1.0 / FLIGHT_RATE - EPS, "{frames} frames");

        flight.advance(10.0);
        assert_eq!(flight.progress, 1.0);
        assert!((flight.pose().position - flight.target.position).norm() < EPS);
    }

    #[test]
    fn half_second_steps_clamp_at_one() {
        let mut flight = CameraFlight::new(CameraPose::overview(), CameraPose::overview());
        flight.advance(0.5);
        assert!((flight.progress - 0.75).abs() < EPS);
        flight.advance(0.5);
        assert_eq!(flight.progress, 1.0);
    }

    #[test]
    fn retarget_starts_from_interpolated_pose() {
        let mut controller = CameraFlightController::default();
        let first = CameraPose::focusing(Vector3::new(1.1, 0.0, 0.0));
        controller.fly_to(first);
        controller.advance(0.2);
        let midway = controller.pose();
        assert_ne!(midway, first);

        let second = CameraPose::focusing(Vector3::new(0.0, 1.1, 0.0));
        controller.fly_to(second);
        let flight = controller.flight().unwrap();
        assert_eq!(flight.start, midway);
        assert_eq!(flight.target, second);
        assert_eq!(flight.progress, 0.0);
        assert_eq!(controller.flights_started(), 2);

        controller.advance(1.0);
        assert!(controller.flight().is_none());
        assert_eq!(controller.pose(), second);
    }

    #[test]
    fn projection_centres_the_look_at_point() {
        let pose = CameraPose::new(Vector3::new(0.0, 0.0, 3.0), Vector3::zeros());
        let centre = pose.project(&Vector3::zeros(), 500.0).unwrap();
        assert!(centre.x.abs() < EPS && centre.y.abs() < EPS);
        assert!((centre.depth - 3.0).abs() < EPS);

        let above = pose.project(&Vector3::new(0.0, 1.0, 0.0), 500.0).unwrap();
        assert!(above.y > 0.0);
        assert!(pose.project(&Vector3::new(0.0, 0.0, 4.0), 500.0).is_none());
    }

    #[test]
    fn far_side_points_are_hidden_by_the_earth() {
        let pose = CameraPose::new(Vector3::new(0.0, 0.0, 3.0), Vector3::zeros());
        assert!(pose.occluded_by_earth(&Vector3::new(0.0, 0.0, -1.1)));
        assert!(!pose.occluded_by_earth(&Vector3::new(0.0, 0.0, 1.1)));
        assert!(!pose.occluded_by_earth(&Vector3::new(1.5, 0.0, 0.0)));
    }

    #[tokio::test]
    async fn focus_uses_a_single_sample() {
        let service = ScriptedService::new();
        let position = locate_focus(&service, 25544).await.unwrap();
        let expected = synthetic_point(25544, 0).geodetic().to_scene();
        assert!((position - expected).norm() < EPS);
        assert_eq!(service.calls().propagations, vec![(25544, 1)]);
    }
}

//! Mission-tracking core for the conjunction screening dashboard.
//!
//! Drives screening jobs on the external service, keeps the conjunction board
//! current, and turns orbital state into scene geometry for the viewer.

pub mod client;
pub mod config;
pub mod contracts;
pub mod math;
pub mod prelude;
pub mod scene;
pub mod scheduling;
pub mod telemetry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tracking;

pub use client::HttpMissionService;
pub use config::MissionConfig;
pub use prelude::{MissionError, MissionResult, MissionService};
pub use scene::{AssetPositionSampler, FrameState, MissionScene};
pub use tracking::{ConjunctionBoard, ScreeningJob, ScreeningJobTracker};

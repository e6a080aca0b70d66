pub mod board;
pub mod job;
pub mod tracker;

pub use board::{BoardSnapshot, ConjunctionBoard};
pub use job::{ScreeningJob, Transition, COARSE_PHASE_LIMIT, NO_JOBS_CREATED};
pub use tracker::{ScreeningJobTracker, TrackedJob, DEFAULT_MAX_POLLS, POLL_INTERVAL};

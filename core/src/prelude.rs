use async_trait::async_trait;

use crate::contracts::{
    BatchPropagationResponse, Conjunction, ConjunctionSummary, JobStatusResponse, NoradId,
    PropagationResponse, ScreeningRequest, StartScreeningResponse,
};

/// Common error type for every call that crosses the service boundary.
#[derive(thiserror::Error, Debug)]
pub enum MissionError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("service returned {status}: {body}")]
    Service { status: u16, body: String },
    #[error("no screening jobs created")]
    NoJobCreated,
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl MissionError {
    /// True when the failure happened before a usable response arrived.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            MissionError::Transport(_) | MissionError::Decode(_) | MissionError::Service { .. }
        )
    }
}

pub type MissionResult<T> = Result<T, MissionError>;

/// Request/response contract of the external screening and propagation service.
///
/// The core never assumes a transport; [`crate::client::HttpMissionService`] is the
/// production binding and the test suites substitute a scripted implementation.
#[async_trait]
pub trait MissionService: Send + Sync {
    async fn start_screening(
        &self,
        request: &ScreeningRequest,
    ) -> MissionResult<StartScreeningResponse>;

    async fn screening_status(&self, job_id: &str) -> MissionResult<JobStatusResponse>;

    async fn propagate(
        &self,
        norad_id: NoradId,
        steps: u32,
        step_seconds: f64,
    ) -> MissionResult<PropagationResponse>;

    async fn propagate_batch(
        &self,
        norad_ids: &[NoradId],
    ) -> MissionResult<BatchPropagationResponse>;

    async fn list_conjunctions(&self) -> MissionResult<Vec<Conjunction>>;

    async fn conjunction(&self, id: u64) -> MissionResult<Conjunction>;

    async fn conjunction_summary(&self) -> MissionResult<ConjunctionSummary>;
}

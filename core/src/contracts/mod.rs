//! Wire shapes exchanged with the screening and propagation service.

pub mod conjunction;
pub mod orbit;
pub mod screening;

pub use conjunction::{
    Conjunction, ConjunctionSummary, PositionUncertainty, PrimaryObject, SecondaryObject,
    TcaPositions, ThreatLevel,
};
pub use orbit::{BatchPropagationResponse, PropagationPoint, PropagationResponse, SatelliteFix};
pub use screening::{
    CreatedJob, JobId, JobStatus, JobStatusResponse, ScreeningRequest, StartScreeningResponse,
};

/// Catalog identifier for a tracked space object.
pub type NoradId = u32;

/// Rendered in place of any field the service left out.
pub const PLACEHOLDER: &str = "n/a";

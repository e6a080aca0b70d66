use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Server-assigned screening job identifier.
///
/// Services in the wild hand these out either as integers or as strings, so both
/// decode into the same textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawJobId {
            Text(String),
            Number(u64),
        }

        Ok(match RawJobId::deserialize(deserializer)? {
            RawJobId::Text(text) => JobId(text),
            RawJobId::Number(number) => JobId(number.to_string()),
        })
    }
}

/// Body of the start-screening request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningRequest {
    pub asset_ids: Vec<u64>,
    pub time_window_days: u32,
    pub distance_threshold_km: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartScreeningResponse {
    #[serde(default)]
    pub jobs: Vec<CreatedJob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedJob {
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<u64>,
}

impl StartScreeningResponse {
    pub fn single(job_id: impl Into<String>) -> Self {
        Self {
            jobs: vec![CreatedJob {
                job_id: Some(JobId::new(job_id)),
                asset_id: None,
            }],
        }
    }

    /// The job the tracker follows: the first entry that carries an identifier.
    pub fn first_job_id(&self) -> Option<&JobId> {
        self.jobs.iter().find_map(|job| job.job_id.as_ref())
    }
}

/// Lifecycle of a screening job.
///
/// `TimedOut` never comes from the service; the tracker moves a job there when it
/// gives up watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::TimedOut
        )
    }

    /// Position along the one-way lifecycle; a job never moves to a lower rank.
    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Running => 1,
            JobStatus::Completed | JobStatus::Failed | JobStatus::TimedOut => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::TimedOut => "TIMED_OUT",
        }
    }
}

/// Poll-status response. Every field except `status` may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub total_objects: Option<u64>,
    #[serde(default)]
    pub candidates_found: Option<u64>,
    #[serde(default)]
    pub conjunctions_found: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl JobStatusResponse {
    pub fn new(status: JobStatus) -> Self {
        Self {
            job_id: None,
            status,
            progress: None,
            total_objects: None,
            candidates_found: None,
            conjunctions_found: None,
            error_message: None,
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(JobId::new(job_id));
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_total_objects(mut self, total: u64) -> Self {
        self.total_objects = Some(total);
        self
    }

    pub fn with_counts(mut self, candidates: u64, conjunctions: u64) -> Self {
        self.candidates_found = Some(candidates);
        self.conjunctions_found = Some(conjunctions);
        self
    }

    pub fn with_conjunctions(mut self, conjunctions: u64) -> Self {
        self.conjunctions_found = Some(conjunctions);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_accepts_numbers_and_strings() {
        let numeric: StartScreeningResponse =
            serde_json::from_str(r#"{"jobs":[{"job_id":42,"asset_id":1}],"total":1}"#).unwrap();
        assert_eq!(numeric.first_job_id().unwrap().as_str(), "42");

        let textual: StartScreeningResponse =
            serde_json::from_str(r#"{"jobs":[{"job_id":"J1"}]}"#).unwrap();
        assert_eq!(textual.first_job_id().unwrap().as_str(), "J1");
    }

    #[test]
    fn empty_job_list_has_no_identifier() {
        let response: StartScreeningResponse = serde_json::from_str(r#"{"jobs":[]}"#).unwrap();
        assert!(response.first_job_id().is_none());

        let missing: StartScreeningResponse = serde_json::from_str("{}").unwrap();
        assert!(missing.first_job_id().is_none());
    }

    #[test]
    fn status_response_tolerates_missing_fields() {
        let response: JobStatusResponse =
            serde_json::from_str(r#"{"status":"COMPLETED","conjunctions_found":2}"#).unwrap();
        assert_eq!(response.status, JobStatus::Completed);
        assert_eq!(response.progress, None);
        assert_eq!(response.conjunctions_found, Some(2));
        assert!(response.error_message.is_none());
    }

    #[test]
    fn lifecycle_ranks_only_move_forward() {
        assert!(JobStatus::Pending.rank() < JobStatus::Running.rank());
        assert!(JobStatus::Running.rank() < JobStatus::Completed.rank());
        assert_eq!(JobStatus::Failed.rank(), JobStatus::Completed.rank());
        assert!(JobStatus::TimedOut.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }
}

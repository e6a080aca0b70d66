use crate::contracts::{JobId, JobStatus, JobStatusResponse, PLACEHOLDER};

/// Progress below this value belongs to the coarse filter phase.
pub const COARSE_PHASE_LIMIT: f64 = 0.11;

/// Message recorded when the service accepts a start request but creates nothing.
pub const NO_JOBS_CREATED: &str = "no screening jobs created";

/// Result of applying one status update to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Updated,
    Terminal,
    /// Update would have moved the job backwards, or the job was already terminal.
    Ignored,
}

/// The one screening computation currently being observed.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningJob {
    /// `None` only for a start request that produced no job.
    pub job_id: Option<JobId>,
    pub status: JobStatus,
    pub progress: f64,
    pub total_objects: Option<u64>,
    pub candidates_found: Option<u64>,
    pub conjunctions_found: Option<u64>,
    pub error_message: Option<String>,
    pub polls: u32,
}

impl ScreeningJob {
    pub fn pending(job_id: JobId) -> Self {
        Self {
            job_id: Some(job_id),
            status: JobStatus::Pending,
            progress: 0.0,
            total_objects: None,
            candidates_found: None,
            conjunctions_found: None,
            error_message: None,
            polls: 0,
        }
    }

    pub fn failed_to_start(message: impl Into<String>) -> Self {
        Self {
            job_id: None,
            status: JobStatus::Failed,
            progress: 0.0,
            total_objects: None,
            candidates_found: None,
            conjunctions_found: None,
            error_message: Some(message.into()),
            polls: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Folds one poll response into the job.
    ///
    /// Status only moves forward and progress never decreases; absent fields keep
    /// their previous value.
    pub fn apply(&mut self, update: &JobStatusResponse) -> Transition {
        if self.is_terminal() || update.status.rank() < self.status.rank() {
            return Transition::Ignored;
        }

        self.status = update.status;
        if let Some(progress) = update.progress {
            self.progress = self.progress.max(progress.clamp(0.0, 1.0));
        }
        if self.status == JobStatus::Completed {
            self.progress = 1.0;
        }
        if update.total_objects.is_some() {
            self.total_objects = update.total_objects;
        }
        if update.candidates_found.is_some() {
            self.candidates_found = update.candidates_found;
        }
        if update.conjunctions_found.is_some() {
            self.conjunctions_found = update.conjunctions_found;
        }
        if update.error_message.is_some() {
            self.error_message = update.error_message.clone();
        }

        if self.is_terminal() {
            Transition::Terminal
        } else {
            Transition::Updated
        }
    }

    /// Forces the job to FAILED, e.g. after a transport error. No-op once terminal.
    pub fn fail(&mut self, message: impl Into<String>) -> Transition {
        if self.is_terminal() {
            return Transition::Ignored;
        }
        self.status = JobStatus::Failed;
        self.error_message = Some(message.into());
        Transition::Terminal
    }

    /// Stops watching a job that never reached a terminal status.
    pub fn time_out(&mut self) -> Transition {
        if self.is_terminal() {
            return Transition::Ignored;
        }
        self.status = JobStatus::TimedOut;
        Transition::Terminal
    }

    /// What the user is told is happening.
    pub fn status_text(&self) -> String {
        match self.status {
            JobStatus::Pending => "Screening queued".to_string(),
            JobStatus::Running if self.progress < COARSE_PHASE_LIMIT => format!(
                "Coarse filter: scanning {} objects",
                count_text(self.total_objects)
            ),
            JobStatus::Running => format!(
                "Fine screening {:.0}% ({} candidates, {} conjunctions)",
                self.progress * 100.0,
                count_text(self.candidates_found),
                count_text(self.conjunctions_found)
            ),
            JobStatus::Completed => {
                let found = self.conjunctions_found.unwrap_or(0);
                match (&self.error_message, found) {
                    (Some(message), 0) => message.clone(),
                    (_, 1) => "Screening complete: 1 conjunction found".to_string(),
                    _ => format!("Screening complete: {} conjunctions found", found),
                }
            }
            JobStatus::Failed => format!(
                "Screening failed: {}",
                self.error_message.as_deref().unwrap_or("unknown error")
            ),
            JobStatus::TimedOut => format!(
                "Stopped watching after {} polls; screening may still be running on the server",
                self.polls
            ),
        }
    }
}

fn count_text(count: Option<u64>) -> String {
    count
        .map(|value| value.to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(progress: f64) -> JobStatusResponse {
        JobStatusResponse::new(JobStatus::Running).with_progress(progress)
    }

    fn job() -> ScreeningJob {
        ScreeningJob::pending(JobId::new("J1"))
    }

    #[test]
    fn coarse_and_fine_phrasing_split_at_boundary() {
        let mut coarse = job();
        coarse.apply(&running(0.10).with_total_objects(5000));
        assert_eq!(coarse.status_text(), "Coarse filter: scanning 5000 objects");

        let mut fine = job();
        fine.apply(&running(0.12).with_counts(3, 1));
        let text = fine.status_text();
        assert!(text.starts_with("Fine screening 12%"), "{text}");
        assert!(text.contains("3 candidates"));
        assert!(text.contains("1 conjunctions"));

        let mut boundary = job();
        boundary.apply(&running(COARSE_PHASE_LIMIT));
        assert!(boundary.status_text().starts_with("Fine screening"));
    }

    #[test]
    fn absent_counts_render_placeholder() {
        let mut job = job();
        job.apply(&running(0.02));
        assert_eq!(job.status_text(), "Coarse filter: scanning n/a objects");
    }

    #[test]
    fn progress_never_decreases_while_running() {
        let mut job = job();
        let mut seen = Vec::new();
        for progress in [0.2, 0.4, 0.3, 0.35, 0.8] {
            job.apply(&running(progress));
            seen.push(job.progress);
        }
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]), "{seen:?}");
        assert_eq!(job.progress, 0.8);
    }

    #[test]
    fn status_never_moves_backwards() {
        let mut job = job();
        assert_eq!(job.apply(&running(0.5)), Transition::Updated);
        assert_eq!(
            job.apply(&JobStatusResponse::new(JobStatus::Pending)),
            Transition::Ignored
        );
        assert_eq!(job.status, JobStatus::Running);

        assert_eq!(
            job.apply(&JobStatusResponse::new(JobStatus::Completed).with_conjunctions(2)),
            Transition::Terminal
        );
        assert_eq!(job.apply(&running(0.9)), Transition::Ignored);
        assert_eq!(job.fail("late transport error"), Transition::Ignored);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 1.0);
    }

    #[test]
    fn completion_without_conjunctions_surfaces_server_message() {
        let mut job = job();
        job.apply(
            &JobStatusResponse::new(JobStatus::Completed)
                .with_conjunctions(0)
                .with_message("Closest approach: 41.2 km (COSMOS 2251 DEB)"),
        );
        assert_eq!(
            job.status_text(),
            "Closest approach: 41.2 km (COSMOS 2251 DEB)"
        );

        let mut silent = ScreeningJob::pending(JobId::new("J2"));
        silent.apply(&JobStatusResponse::new(JobStatus::Completed).with_conjunctions(0));
        assert_eq!(
            silent.status_text(),
            "Screening complete: 0 conjunctions found"
        );
    }

    #[test]
    fn completion_with_conjunctions_reports_count() {
        let mut job = job();
        job.apply(
            &JobStatusResponse::new(JobStatus::Completed)
                .with_conjunctions(2)
                .with_message("ignored when events exist"),
        );
        assert_eq!(job.status_text(), "Screening complete: 2 conjunctions found");
    }

    #[test]
    fn server_failure_is_reported_verbatim() {
        let mut job = job();
        job.apply(&running(0.3));
        job.apply(
            &JobStatusResponse::new(JobStatus::Failed)
                .with_message("TLE catalog is empty - refresh catalog first"),
        );
        assert_eq!(
            job.status_text(),
            "Screening failed: TLE catalog is empty - refresh catalog first"
        );
    }

    #[test]
    fn start_failure_is_terminal() {
        let job = ScreeningJob::failed_to_start(NO_JOBS_CREATED);
        assert!(job.is_terminal());
        assert!(job.job_id.is_none());
        assert_eq!(job.status_text(), "Screening failed: no screening jobs created");
    }

    #[test]
    fn timed_out_job_stays_terminal() {
        let mut job = job();
        job.apply(&running(0.4));
        job.polls = 12;
        assert_eq!(job.time_out(), Transition::Terminal);
        assert!(job.status_text().starts_with("Stopped watching after 12 polls"));
        assert_eq!(job.apply(&running(0.9)), Transition::Ignored);
    }
}

use anyhow::{Context, Result};
use conjcore::contracts::{JobStatus, ThreatLevel};
use conjcore::telemetry::{MetricsRecorder, MetricsSnapshot};
use conjcore::tracking::BoardSnapshot;
use conjcore::{ConjunctionBoard, MissionConfig, MissionService, ScreeningJob, ScreeningJobTracker};
use log::warn;
use std::sync::Arc;
use tokio::time;

/// Rows of the event table printed after a watched job.
const REPORTED_EVENTS: usize = 10;

/// What a headless watch ended with.
#[derive(Debug, Clone)]
pub struct WatchOutcome {
    pub job: ScreeningJob,
    pub board: BoardSnapshot,
    pub metrics: MetricsSnapshot,
}

/// Screening parameters for one watched run.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchRequest {
    pub asset_ids: Vec<u64>,
    pub window_days: u32,
    pub distance_threshold_km: f64,
}

/// Starts a screening job, prints every status change until it settles, then
/// prints the refreshed conjunction board.
pub async fn watch_screening(
    service: Arc<dyn MissionService>,
    config: &MissionConfig,
    request: WatchRequest,
) -> Result<WatchOutcome> {
    let board = Arc::new(ConjunctionBoard::new());
    let metrics = Arc::new(MetricsRecorder::new());
    let tracker = ScreeningJobTracker::new(service, Arc::clone(&board), config, Arc::clone(&metrics));
    let mut updates = tracker.subscribe();
    let mut board_updates = board.subscribe();

    if let Err(err) = tracker
        .start(
            request.asset_ids,
            request.window_days,
            request.distance_threshold_km,
        )
        .await
    {
        if let Some(status) = tracker.status_text() {
            println!("[watch] {}", status);
        }
        return Err(err).context("starting screening");
    }

    let job = loop {
        let current = updates.borrow_and_update().job.clone();
        if let Some(job) = current {
            println!("[watch] {}", job.status_text());
            if job.is_terminal() {
                break job;
            }
        }
        updates
            .changed()
            .await
            .context("screening tracker stopped publishing")?;
    };

    // The tracker refreshes the board right after publishing the terminal status.
    if job.status == JobStatus::Completed
        && time::timeout(config.request_timeout(), board_updates.changed())
            .await
            .is_err()
    {
        warn!("conjunction board did not refresh after job completion");
    }

    let snapshot = board.snapshot();
    print_board(&snapshot);
    Ok(WatchOutcome {
        job,
        board: snapshot,
        metrics: metrics.snapshot(),
    })
}

fn print_board(board: &BoardSnapshot) {
    let levels: Vec<String> = ThreatLevel::ALL
        .iter()
        .map(|level| format!("{} {}", level.as_str(), board.summary.count(*level)))
        .collect();
    println!(
        "[watch] {} active events ({})",
        board.summary.total,
        levels.join(", ")
    );
    for conjunction in board.conjunctions.iter().take(REPORTED_EVENTS) {
        println!(
            "[watch]   #{} {} miss {} pc {} tca {}",
            conjunction.id,
            conjunction.label(),
            conjunction.miss_distance_text(),
            conjunction.probability_text(),
            conjunction.tca_text()
        );
    }
}

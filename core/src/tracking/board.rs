use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;

use crate::contracts::{Conjunction, ConjunctionSummary};
use crate::prelude::{MissionResult, MissionService};
use crate::telemetry::LogManager;

/// Published state of the conjunction list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardSnapshot {
    /// Bumped on every wholesale replacement.
    pub generation: u64,
    pub conjunctions: Vec<Conjunction>,
    pub summary: ConjunctionSummary,
}

impl BoardSnapshot {
    pub fn find(&self, id: u64) -> Option<&Conjunction> {
        self.conjunctions.iter().find(|conjunction| conjunction.id == id)
    }
}

/// Holds the current conjunction list and threat summary. Both are replaced
/// wholesale on reload, never patched in place.
pub struct ConjunctionBoard {
    state: watch::Sender<BoardSnapshot>,
    reloads: AtomicUsize,
    logger: LogManager,
}

impl ConjunctionBoard {
    pub fn new() -> Self {
        let (state, _) = watch::channel(BoardSnapshot::default());
        Self {
            state,
            reloads: AtomicUsize::new(0),
            logger: LogManager::new("conjunction-board"),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.state.borrow().clone()
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    /// Fetches list and summary together. A failed summary falls back to counts
    /// derived from the list; a failed list leaves the board untouched.
    pub async fn reload(&self, service: &dyn MissionService) -> MissionResult<usize> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        let (list, summary) = tokio::join!(service.list_conjunctions(), service.conjunction_summary());

        let conjunctions = list.map_err(|err| {
            self.logger
                .transport_failure(&format!("conjunction list reload failed: {}", err));
            err
        })?;
        let summary = summary.unwrap_or_else(|err| {
            self.logger
                .degraded(&format!("summary unavailable, deriving from list: {}", err));
            ConjunctionSummary::from_conjunctions(&conjunctions)
        });

        let count = conjunctions.len();
        self.replace(conjunctions, summary);
        self.logger
            .record(&format!("conjunction list reloaded ({} events)", count));
        Ok(count)
    }

    pub fn replace(&self, conjunctions: Vec<Conjunction>, summary: ConjunctionSummary) {
        self.state.send_modify(|board| {
            board.generation += 1;
            board.conjunctions = conjunctions;
            board.summary = summary;
        });
    }
}

impl Default for ConjunctionBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ThreatLevel;
    use crate::testing::{sample_conjunction, ScriptedService};

    #[tokio::test]
    async fn reload_replaces_list_and_summary() {
        let service = ScriptedService::new();
        service.set_conjunctions(vec![
            sample_conjunction(1, 25544, 48078, ThreatLevel::High),
            sample_conjunction(2, 25544, 22675, ThreatLevel::Low),
        ]);

        let board = ConjunctionBoard::new();
        assert_eq!(board.reload(&service).await.unwrap(), 2);

        let snapshot = board.snapshot();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.summary.total, 2);
        assert_eq!(snapshot.summary.count(ThreatLevel::High), 1);
        assert!(snapshot.find(2).is_some());
        assert_eq!(board.reload_count(), 1);
    }

    #[tokio::test]
    async fn failed_list_keeps_previous_board() {
        let service = ScriptedService::new();
        service.set_conjunctions(vec![sample_conjunction(1, 25544, 48078, ThreatLevel::High)]);
        let board = ConjunctionBoard::new();
        board.reload(&service).await.unwrap();

        service.fail_conjunction_list(true);
        assert!(board.reload(&service).await.is_err());
        let snapshot = board.snapshot();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.conjunctions.len(), 1);
    }
}

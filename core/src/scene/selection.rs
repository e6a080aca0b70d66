use std::sync::{Mutex, MutexGuard, PoisonError};

/// Stamp carried by every fetch started for a selection. Results are applied only
/// while their token is still the current one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SelectionToken(u64);

impl SelectionToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
struct Selected {
    token: SelectionToken,
    conjunction_id: Option<u64>,
    incomplete: bool,
}

/// Which conjunction the scene is focused on, and the token of the latest change.
#[derive(Debug, Default)]
pub struct SelectionState {
    inner: Mutex<Selected>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    fn selected(&self) -> MutexGuard<'_, Selected> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a fresh token, or `None` when `conjunction_id` is already selected
    /// and its fetches have not been marked incomplete.
    pub fn select(&self, conjunction_id: u64) -> Option<SelectionToken> {
        let mut selected = self.selected();
        if selected.conjunction_id == Some(conjunction_id) && !selected.incomplete {
            return None;
        }
        selected.token = SelectionToken(selected.token.0 + 1);
        selected.conjunction_id = Some(conjunction_id);
        selected.incomplete = false;
        Some(selected.token)
    }

    pub fn clear(&self) -> SelectionToken {
        let mut selected = self.selected();
        selected.token = SelectionToken(selected.token.0 + 1);
        selected.conjunction_id = None;
        selected.incomplete = false;
        selected.token
    }

    /// Lets the next `select` of the same id through again. Ignored for stale tokens.
    pub fn mark_incomplete(&self, token: SelectionToken) {
        let mut selected = self.selected();
        if selected.token == token {
            selected.incomplete = true;
        }
    }

    pub fn is_current(&self, token: SelectionToken) -> bool {
        self.selected().token == token
    }

    pub fn current(&self) -> Option<u64> {
        self.selected().conjunction_id
    }

    pub fn token(&self) -> SelectionToken {
        self.selected().token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reselecting_the_same_conjunction_is_a_no_op() {
        let state = SelectionState::new();
        let first = state.select(7).unwrap();
        assert!(state.select(7).is_none());
        assert!(state.is_current(first));
        assert_eq!(state.current(), Some(7));
    }

    #[test]
    fn newer_selection_invalidates_older_tokens() {
        let state = SelectionState::new();
        let first = state.select(1).unwrap();
        let second = state.select(2).unwrap();
        assert!(second > first);
        assert!(!state.is_current(first));
        assert!(state.is_current(second));

        let cleared = state.clear();
        assert!(!state.is_current(second));
        assert!(state.is_current(cleared));
        assert_eq!(state.current(), None);

        // Selecting the same id again after a clear is a real change.
        assert!(state.select(2).is_some());
    }

    #[test]
    fn incomplete_selection_can_be_selected_again() {
        let state = SelectionState::new();
        let first = state.select(4).unwrap();
        let second = state.select(5).unwrap();
        state.mark_incomplete(first);
        assert!(state.select(5).is_none());

        state.mark_incomplete(second);
        let retry = state.select(5).unwrap();
        assert!(retry > second);
        assert!(state.select(5).is_none());
    }
}

use crate::addon::Addon;
use thiserror::Error;

/// Oldest snapshots are evicted past this depth, always together with
/// their log entry.
pub const HISTORY_LIMIT: usize = 30;

/// A state stack and its action log drifting apart means a core
/// invariant broke; callers surface this as an internal error, never as
/// a normal user-facing failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("history state and action log out of sync")]
    UndoLogDesync,
    #[error("redo state and action log out of sync")]
    RedoLogDesync,
}

/// Snapshot-based undo/redo over the addon list. Each recorded action
/// stores a full typed copy of the pre-mutation list alongside a
/// human-readable description; undo and redo move whole snapshots
/// between the two stacks.
#[derive(Debug, Default)]
pub struct History {
    undo_states: Vec<Vec<Addon>>,
    undo_log: Vec<String>,
    redo_states: Vec<Vec<Addon>>,
    redo_log: Vec<String>,
    dirty: bool,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures the current list as the pre-mutation snapshot for an
    /// action about to run. Clears the redo stacks and marks the list
    /// dirty.
    pub fn record(&mut self, current: &[Addon], description: impl Into<String>) {
        self.record_snapshot(current.to_vec(), description);
    }

    /// Same as `record`, but with a snapshot taken earlier by the caller.
    /// Used when a mutation spans several intermediate writes (move mode)
    /// and only the start state should be recorded.
    pub fn record_snapshot(&mut self, snapshot: Vec<Addon>, description: impl Into<String>) {
        self.undo_states.push(snapshot);
        self.undo_log.push(description.into());
        self.redo_states.clear();
        self.redo_log.clear();

        if self.undo_states.len() > HISTORY_LIMIT {
            self.undo_states.remove(0);
            self.undo_log.remove(0);
        }

        self.dirty = true;
    }

    /// Restores the most recent snapshot into `current`, moving the
    /// replaced state onto the redo stack. Returns the description of
    /// the action undone, or `None` when there is nothing to undo.
    pub fn undo(&mut self, current: &mut Vec<Addon>) -> Result<Option<String>, HistoryError> {
        if self.undo_states.is_empty() {
            return Ok(None);
        }
        if self.undo_log.is_empty() {
            return Err(HistoryError::UndoLogDesync);
        }

        self.redo_states.push(current.clone());
        let description = self
            .undo_log
            .pop()
            .ok_or(HistoryError::UndoLogDesync)?;
        self.redo_log.push(description.clone());

        *current = self
            .undo_states
            .pop()
            .ok_or(HistoryError::UndoLogDesync)?;

        if self.undo_states.is_empty() {
            self.dirty = false;
        }

        Ok(Some(description))
    }

    /// Inverse of `undo`. Redoing always leaves unsaved changes relative
    /// to the last save baseline.
    pub fn redo(&mut self, current: &mut Vec<Addon>) -> Result<Option<String>, HistoryError> {
        if self.redo_states.is_empty() {
            return Ok(None);
        }
        if self.redo_log.is_empty() {
            return Err(HistoryError::RedoLogDesync);
        }

        self.undo_states.push(current.clone());
        let description = self
            .redo_log
            .pop()
            .ok_or(HistoryError::RedoLogDesync)?;
        self.undo_log.push(description.clone());

        *current = self
            .redo_states
            .pop()
            .ok_or(HistoryError::RedoLogDesync)?;

        self.dirty = true;
        Ok(Some(description))
    }

    /// Establishes a new clean baseline after a successful save or a
    /// full server refresh. History past a save is intentionally not
    /// replayable: the save already committed a specific state.
    pub fn reset(&mut self) {
        self.undo_states.clear();
        self.undo_log.clear();
        self.redo_states.clear();
        self.redo_log.clear();
        self.dirty = false;
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_states.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_states.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_states.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks unsaved changes without a snapshot; used by intermediate
    /// reorder writes whose single history entry is recorded separately.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addon::{Addon, Manifest};

    fn addon(name: &str) -> Addon {
        let mut manifest = Manifest::default();
        manifest.name = name.to_string();
        Addon::new(format!("https://{name}.example/manifest.json"), manifest)
    }

    fn names(list: &[Addon]) -> Vec<String> {
        list.iter().map(|a| a.manifest.name.clone()).collect()
    }

    #[test]
    fn undo_redo_inverse_law() {
        let mut history = History::new();
        let mut list: Vec<Addon> = Vec::new();

        for step in 0..5 {
            history.record(&list, format!("Added a{step}"));
            list.push(addon(&format!("a{step}")));
        }
        let final_names = names(&list);

        let mut undone = Vec::new();
        for _ in 0..5 {
            undone.push(history.undo(&mut list).expect("undo").expect("entry"));
        }
        assert!(list.is_empty());
        assert!(!history.is_dirty());

        let mut redone = Vec::new();
        for _ in 0..5 {
            redone.push(history.redo(&mut list).expect("redo").expect("entry"));
        }
        assert_eq!(names(&list), final_names);
        assert!(history.is_dirty());

        // Descriptions replay newest-first on undo, oldest-first on redo.
        let mut reversed = undone.clone();
        reversed.reverse();
        assert_eq!(redone, reversed);
    }

    #[test]
    fn history_capped_at_limit() {
        let mut history = History::new();
        let list = vec![addon("base")];
        for step in 0..(HISTORY_LIMIT + 10) {
            history.record(&list, format!("step {step}"));
        }
        assert_eq!(history.undo_depth(), HISTORY_LIMIT);
        assert_eq!(history.undo_log.len(), HISTORY_LIMIT);
        // Oldest entries were evicted together with their snapshots.
        assert_eq!(history.undo_log[0], "step 10");
    }

    #[test]
    fn record_clears_redo() {
        let mut history = History::new();
        let mut list = vec![addon("a")];
        history.record(&list, "Added b");
        list.push(addon("b"));
        history.undo(&mut list).expect("undo");
        assert!(history.can_redo());

        history.record(&list, "Added c");
        assert!(!history.can_redo());
        assert!(history.redo(&mut list).expect("redo").is_none());
    }

    #[test]
    fn undo_on_empty_is_noop() {
        let mut history = History::new();
        let mut list = vec![addon("a")];
        assert_eq!(history.undo(&mut list).expect("undo"), None);
        assert_eq!(names(&list), vec!["a"]);
    }

    #[test]
    fn desync_is_detected() {
        let mut history = History::new();
        let list = vec![addon("a")];
        history.record(&list, "Added a");
        history.undo_log.clear();

        let mut current = list.clone();
        assert_eq!(
            history.undo(&mut current).unwrap_err(),
            HistoryError::UndoLogDesync
        );
    }

    #[test]
    fn dirty_clears_only_when_fully_undone() {
        let mut history = History::new();
        let mut list = vec![addon("a")];
        history.record(&list, "Toggled a");
        history.record(&list, "Toggled a");
        assert!(history.is_dirty());

        history.undo(&mut list).expect("undo");
        assert!(history.is_dirty());
        history.undo(&mut list).expect("undo");
        assert!(!history.is_dirty());

        history.redo(&mut list).expect("redo");
        assert!(history.is_dirty());
    }
}
